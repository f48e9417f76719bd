//! Product stock snapshots and severity classification
//!
//! Everything in here is pure: snapshots are supplied fresh by a product
//! provider on every pass and classification performs no I/O.

pub mod classifier;
pub mod model;

pub use classifier::{classify, classify_with, effective_reorder_level, ClassifierConfig};
pub use model::{ProductSnapshot, SeverityTier};
