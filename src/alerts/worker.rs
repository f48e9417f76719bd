use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time;

use super::orchestrator::{HealthCheckOrchestrator, HealthCheckReport};

/// Cooldown entries are pruned once this many TTL windows have passed
const PRUNE_RETENTION_CYCLES: u32 = 4;

/// Background scheduler that runs unforced health checks periodically
pub struct HealthCheckWorker {
    orchestrator: Arc<HealthCheckOrchestrator>,
    interval: Duration,
    running: Arc<AtomicBool>,
}

impl HealthCheckWorker {
    pub fn new(orchestrator: Arc<HealthCheckOrchestrator>, interval: Duration) -> Self {
        Self {
            orchestrator,
            interval,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start the background worker
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        if self.interval.is_zero() {
            tracing::error!("Health check worker not started: interval must be non-zero");
            return tokio::spawn(async {});
        }
        self.running.store(true, Ordering::SeqCst);

        tokio::spawn(async move {
            tracing::info!("Health check worker started with interval {:?}", self.interval);

            let mut interval = time::interval(self.interval);
            interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

            while self.running.load(Ordering::SeqCst) {
                interval.tick().await;
                if !self.running.load(Ordering::SeqCst) {
                    break;
                }
                self.tick().await;
            }

            tracing::info!("Health check worker stopped");
        })
    }

    /// One scheduled pass: throttled health check plus cooldown housekeeping
    pub async fn tick(&self) -> HealthCheckReport {
        let report = self.orchestrator.run_health_check(false).await;

        if let Some(error) = &report.error {
            tracing::warn!(error = %error, "Scheduled health check failed");
        }

        let now = self.orchestrator.clock().now();
        let pruned = self
            .orchestrator
            .cooldowns()
            .prune(now, PRUNE_RETENTION_CYCLES);
        if pruned > 0 {
            tracing::debug!("Pruned {} stale cooldown entries", pruned);
        }

        report
    }

    /// Stop the worker
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Check if worker is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::clock::{Clock, ManualClock};
    use crate::alerts::config::AlertSettings;
    use crate::alerts::cooldown::NotificationKey;
    use crate::inventory::{ProductSnapshot, SeverityTier};
    use crate::providers::{InMemoryCatalog, InMemoryInbox, Recipient, StaticRecipients};
    use chrono::{TimeZone, Utc};

    fn orchestrator(clock: Arc<ManualClock>, inbox: Arc<InMemoryInbox>) -> Arc<HealthCheckOrchestrator> {
        Arc::new(
            HealthCheckOrchestrator::new(
                AlertSettings::default(),
                Arc::new(InMemoryCatalog::with_products(vec![ProductSnapshot::new(
                    "p1", "Aspirin", 0,
                )])),
                Arc::new(StaticRecipients::new(vec![Recipient::new("u1")])),
                inbox,
            )
            .with_clock(clock),
        )
    }

    #[tokio::test]
    async fn test_tick_runs_throttled_check_and_prunes() {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()));
        let inbox = Arc::new(InMemoryInbox::new());
        let orchestrator = orchestrator(clock.clone(), inbox.clone());
        let worker = HealthCheckWorker::new(orchestrator.clone(), Duration::from_secs(60));

        let first = worker.tick().await;
        assert_eq!(first.notifications_created, 1);

        let second = worker.tick().await;
        assert!(second.skipped_due_to_throttle);

        // a stale entry from long ago is removed on the next tick
        orchestrator.cooldowns().record_fired(
            NotificationKey::new("gone", SeverityTier::Critical),
            clock.now() - chrono::Duration::days(3),
        );
        worker.tick().await;
        assert!(orchestrator
            .cooldowns()
            .get(&NotificationKey::new("gone", SeverityTier::Critical))
            .is_none());
        assert_eq!(inbox.len(), 1);
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let inbox = Arc::new(InMemoryInbox::new());
        let worker = Arc::new(HealthCheckWorker::new(
            orchestrator(clock, inbox.clone()),
            Duration::from_millis(10),
        ));

        let handle = Arc::clone(&worker).start();
        assert!(worker.is_running());

        tokio::time::sleep(Duration::from_millis(50)).await;
        worker.stop();
        assert!(!worker.is_running());
        handle.await.unwrap();

        // the first tick fires immediately; later ticks are throttled
        assert_eq!(inbox.len(), 1);
    }

    #[tokio::test]
    async fn test_zero_interval_does_not_start() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let inbox = Arc::new(InMemoryInbox::new());
        let worker = Arc::new(HealthCheckWorker::new(
            orchestrator(clock, inbox.clone()),
            Duration::ZERO,
        ));

        let handle = Arc::clone(&worker).start();
        handle.await.unwrap();
        assert!(!worker.is_running());
        assert!(inbox.is_empty());
    }
}
