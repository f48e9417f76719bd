//! stockwatch: Inventory Health Alerting
//!
//! Periodically scans pharmacy stock levels, classifies each product into a
//! severity tier, suppresses repeat alerts with severity-tiered cooldowns, and
//! fans in-app and email notifications out to recipients concurrently.
//!
//! # Features
//!
//! - **Severity Classification**: Out of stock, critical, low and healthy tiers
//!   with a derived reorder level for unconfigured products
//! - **Deduplication**: Cooldowns keyed by `(product, tier)` so escalations
//!   always fire
//! - **Concurrent Dispatch**: Settle-all fan-out with per-call timeouts
//! - **Throttling**: Minimum spacing between unforced runs
//! - **Restart Safety**: Cooldown snapshots on disk
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use stockwatch::alerts::{AlertSettings, HealthCheckOrchestrator};
//! use stockwatch::inventory::ProductSnapshot;
//! use stockwatch::providers::{InMemoryCatalog, InMemoryInbox, Recipient, StaticRecipients};
//!
//! # async fn run() {
//! let catalog = Arc::new(InMemoryCatalog::with_products(vec![
//!     ProductSnapshot::new("amox", "Amoxicillin 500mg", 0).with_reorder_level(20),
//! ]));
//! let recipients = Arc::new(StaticRecipients::new(vec![Recipient::new("pharmacist")]));
//! let inbox = Arc::new(InMemoryInbox::new());
//!
//! let orchestrator =
//!     HealthCheckOrchestrator::new(AlertSettings::default(), catalog, recipients, inbox);
//! let report = orchestrator.run_health_check(true).await;
//! println!("created {}, failed {}", report.notifications_created, report.notifications_failed);
//! # }
//! ```

pub mod alerts;
pub mod api;
pub mod inventory;
pub mod persistence;
pub mod providers;

// Re-export commonly used types
pub use alerts::{AlertSettings, HealthCheckOrchestrator, HealthCheckReport};
pub use inventory::{classify, ProductSnapshot, SeverityTier};
