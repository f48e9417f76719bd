//! Cooldown persistence for restarts
//!
//! The cooldown store lives in memory. Snapshotting it to a JSON file after
//! each run lets a restarted process keep suppressing alerts that already
//! fired instead of re-sending everything on its first pass.

pub mod snapshot;

pub use snapshot::{CooldownSnapshot, CooldownSnapshotFile};

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Unsupported snapshot schema version {found}, expected {expected}")]
    SchemaVersion { found: u32, expected: u32 },
}
