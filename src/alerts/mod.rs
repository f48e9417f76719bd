//! Inventory health alerting
//!
//! Periodically scans stock levels, classifies severity, suppresses repeats
//! with per-tier cooldowns and fans notifications out to recipients.

pub mod clock;
pub mod config;
pub mod cooldown;
pub mod dispatcher;
pub mod message;
pub mod orchestrator;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AlertSettings, ConfigError, RecipientSelection};
pub use cooldown::{CooldownPolicy, CooldownRecord, CooldownStore, NotificationKey};
pub use dispatcher::{DispatchJob, DispatchOutcome, DispatchStatus, Dispatcher, EmailOutcome};
pub use orchestrator::{HealthCheckOrchestrator, HealthCheckReport};
pub use worker::HealthCheckWorker;
