//! Concurrent notification fan-out
//!
//! A batch of jobs is executed concurrently on the calling task. Every job
//! settles on its own: a failing, hanging or panicking sink call turns into a
//! failed outcome for that job only. Cooldowns are recorded once the batch has
//! settled, for each key that had at least one confirmed in-app notification.

use std::collections::BTreeSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::{stream, FutureExt, StreamExt};
use serde::{Deserialize, Serialize};

use super::clock::{Clock, SystemClock};
use super::cooldown::{CooldownStore, NotificationKey};
use super::message;
use crate::inventory::SeverityTier;
use crate::providers::{
    DeliveryError, EmailMessage, EmailSink, NewNotification, NotificationSink, PersistError,
};

/// One recipient/product/severity notification attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchJob {
    pub recipient_id: String,
    pub recipient_address: Option<String>,
    pub product_id: String,
    pub product_name: String,
    pub stock_quantity: u64,
    /// Reorder level the tier was computed against
    pub reorder_level: u64,
    pub tier: SeverityTier,
    pub created_at: DateTime<Utc>,
}

impl DispatchJob {
    pub fn key(&self) -> NotificationKey {
        NotificationKey::new(self.product_id.clone(), self.tier)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStatus {
    Success,
    Failed,
}

/// What happened to the email side of a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EmailOutcome {
    NotAttempted,
    Sent,
    Failed { error: String },
}

/// Result of one job. `status` reflects the in-app notification only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchOutcome {
    pub job: DispatchJob,
    pub status: DispatchStatus,
    pub error: Option<String>,
    pub email: EmailOutcome,
}

impl DispatchOutcome {
    pub fn is_success(&self) -> bool {
        self.status == DispatchStatus::Success
    }
}

/// Executes dispatch jobs against the notification and email sinks
pub struct Dispatcher {
    notifications: Arc<dyn NotificationSink>,
    email: Option<Arc<dyn EmailSink>>,
    cooldowns: Arc<CooldownStore>,
    clock: Arc<dyn Clock>,
    sink_timeout: Duration,
    max_concurrency: usize,
}

impl Dispatcher {
    pub fn new(notifications: Arc<dyn NotificationSink>, cooldowns: Arc<CooldownStore>) -> Self {
        Self {
            notifications,
            email: None,
            cooldowns,
            clock: Arc::new(SystemClock),
            sink_timeout: Duration::from_secs(10),
            max_concurrency: 32,
        }
    }

    /// Send email for critical and out-of-stock jobs through `sink`
    pub fn with_email(mut self, sink: Arc<dyn EmailSink>) -> Self {
        self.email = Some(sink);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_sink_timeout(mut self, timeout: Duration) -> Self {
        self.sink_timeout = timeout;
        self
    }

    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max.max(1);
        self
    }

    /// Run every job and return one outcome per job, in completion order
    pub async fn dispatch(&self, jobs: Vec<DispatchJob>) -> Vec<DispatchOutcome> {
        if jobs.is_empty() {
            return Vec::new();
        }

        let total = jobs.len();
        let outcomes: Vec<DispatchOutcome> = stream::iter(jobs)
            .map(|job| self.run_guarded(job))
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

        let confirmed: BTreeSet<NotificationKey> = outcomes
            .iter()
            .filter(|o| o.is_success())
            .map(|o| o.job.key())
            .collect();

        let now = self.clock.now();
        for key in &confirmed {
            self.cooldowns.record_fired(key.clone(), now);
        }

        tracing::debug!(
            jobs = total,
            succeeded = outcomes.iter().filter(|o| o.is_success()).count(),
            keys_recorded = confirmed.len(),
            "Dispatch batch settled"
        );

        outcomes
    }

    async fn run_guarded(&self, job: DispatchJob) -> DispatchOutcome {
        let fallback = job.clone();
        match AssertUnwindSafe(self.run_job(job)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::error!(
                    product_id = %fallback.product_id,
                    recipient_id = %fallback.recipient_id,
                    tier = %fallback.tier,
                    "Notification job panicked"
                );
                DispatchOutcome {
                    job: fallback,
                    status: DispatchStatus::Failed,
                    error: Some("notification job panicked".to_string()),
                    email: EmailOutcome::NotAttempted,
                }
            }
        }
    }

    async fn run_job(&self, job: DispatchJob) -> DispatchOutcome {
        let notification = message::render_notification(&job);
        let email = match (&self.email, &job.recipient_address) {
            (Some(sink), Some(to)) if job.tier.wants_email() => {
                Some((sink, message::render_email(&job, to)))
            }
            _ => None,
        };

        let persist = self.persist(notification);
        let send = async {
            match email {
                None => EmailOutcome::NotAttempted,
                Some((sink, outgoing)) => match self.send(sink.as_ref(), outgoing).await {
                    Ok(()) => EmailOutcome::Sent,
                    Err(e) => {
                        tracing::warn!(
                            product_id = %job.product_id,
                            recipient_id = %job.recipient_id,
                            tier = %job.tier,
                            error = %e,
                            "Failed to send alert email"
                        );
                        EmailOutcome::Failed {
                            error: e.to_string(),
                        }
                    }
                },
            }
        };

        let (persisted, email) = tokio::join!(persist, send);

        match persisted {
            Ok(()) => DispatchOutcome {
                job,
                status: DispatchStatus::Success,
                error: None,
                email,
            },
            Err(e) => {
                tracing::warn!(
                    product_id = %job.product_id,
                    recipient_id = %job.recipient_id,
                    tier = %job.tier,
                    error = %e,
                    "Failed to persist notification"
                );
                DispatchOutcome {
                    job,
                    status: DispatchStatus::Failed,
                    error: Some(e.to_string()),
                    email,
                }
            }
        }
    }

    async fn persist(&self, notification: NewNotification) -> Result<(), PersistError> {
        match tokio::time::timeout(
            self.sink_timeout,
            self.notifications.create_notification(notification),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(PersistError::Timeout(self.sink_timeout.as_millis() as u64)),
        }
    }

    async fn send(&self, sink: &dyn EmailSink, message: EmailMessage) -> Result<(), DeliveryError> {
        match tokio::time::timeout(self.sink_timeout, sink.send_email(message)).await {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::Timeout(self.sink_timeout.as_millis() as u64)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::clock::ManualClock;
    use crate::alerts::testing::{FakeEmail, FakeSink};
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
    }

    fn job(recipient: &str, product: &str, tier: SeverityTier) -> DispatchJob {
        DispatchJob {
            recipient_id: recipient.to_string(),
            recipient_address: Some(format!("{}@example.com", recipient)),
            product_id: product.to_string(),
            product_name: format!("Product {}", product),
            stock_quantity: 1,
            reorder_level: 10,
            tier,
            created_at: t0(),
        }
    }

    fn dispatcher(sink: Arc<FakeSink>, store: Arc<CooldownStore>) -> Dispatcher {
        Dispatcher::new(sink, store).with_clock(Arc::new(ManualClock::new(t0())))
    }

    #[tokio::test]
    async fn test_partial_failure_is_isolated() {
        let sink = Arc::new(FakeSink::failing_for(&["p3"]));
        let store = Arc::new(CooldownStore::default());
        let jobs: Vec<DispatchJob> = (0..10)
            .map(|i| job("u1", &format!("p{}", i), SeverityTier::Low))
            .collect();

        let outcomes = dispatcher(sink.clone(), store.clone()).dispatch(jobs).await;

        assert_eq!(outcomes.len(), 10);
        assert_eq!(outcomes.iter().filter(|o| o.is_success()).count(), 9);
        let failed: Vec<_> = outcomes.iter().filter(|o| !o.is_success()).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].job.product_id, "p3");
        assert!(failed[0].error.is_some());

        assert_eq!(store.len(), 9);
        assert!(store.get(&NotificationKey::new("p3", SeverityTier::Low)).is_none());
        assert_eq!(store.get(&NotificationKey::new("p4", SeverityTier::Low)), Some(t0()));
        assert_eq!(sink.created().len(), 9);
    }

    #[tokio::test]
    async fn test_panicking_job_does_not_abort_batch() {
        let sink = Arc::new(FakeSink::panicking_for(&["p1"]));
        let store = Arc::new(CooldownStore::default());
        let jobs = vec![
            job("u1", "p0", SeverityTier::Critical),
            job("u1", "p1", SeverityTier::Critical),
            job("u1", "p2", SeverityTier::Critical),
        ];

        let outcomes = dispatcher(sink, store.clone()).dispatch(jobs).await;

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes.iter().filter(|o| o.is_success()).count(), 2);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_shared_key_recorded_once() {
        let sink = Arc::new(FakeSink::default());
        let store = Arc::new(CooldownStore::default());
        let jobs: Vec<DispatchJob> = (0..5)
            .map(|i| job(&format!("u{}", i), "p1", SeverityTier::OutOfStock))
            .collect();

        let outcomes = dispatcher(sink.clone(), store.clone()).dispatch(jobs).await;

        assert_eq!(outcomes.len(), 5);
        assert_eq!(sink.created().len(), 5);
        assert_eq!(store.records().len(), 1);
    }

    #[tokio::test]
    async fn test_key_recorded_when_some_recipients_fail() {
        let sink = Arc::new(FakeSink::failing_for_recipients(&["u2"]));
        let store = Arc::new(CooldownStore::default());
        let jobs = vec![
            job("u1", "p1", SeverityTier::Low),
            job("u2", "p1", SeverityTier::Low),
            job("u2", "p2", SeverityTier::Low),
        ];

        let outcomes = dispatcher(sink, store.clone()).dispatch(jobs).await;

        assert_eq!(outcomes.iter().filter(|o| o.is_success()).count(), 1);
        assert!(store.get(&NotificationKey::new("p1", SeverityTier::Low)).is_some());
        assert!(store.get(&NotificationKey::new("p2", SeverityTier::Low)).is_none());
    }

    #[tokio::test]
    async fn test_email_only_for_urgent_tiers_with_address() {
        let sink = Arc::new(FakeSink::default());
        let email = Arc::new(FakeEmail::default());
        let store = Arc::new(CooldownStore::default());
        let mut no_address = job("u3", "p3", SeverityTier::OutOfStock);
        no_address.recipient_address = None;
        let jobs = vec![
            job("u1", "p1", SeverityTier::Low),
            job("u2", "p2", SeverityTier::Critical),
            no_address,
        ];

        let outcomes = dispatcher(sink, store)
            .with_email(email.clone())
            .dispatch(jobs)
            .await;

        let by_product = |id: &str| outcomes.iter().find(|o| o.job.product_id == id).unwrap();
        assert_eq!(by_product("p1").email, EmailOutcome::NotAttempted);
        assert_eq!(by_product("p2").email, EmailOutcome::Sent);
        assert_eq!(by_product("p3").email, EmailOutcome::NotAttempted);
        assert_eq!(email.sent().len(), 1);
        assert_eq!(email.sent()[0].to, "u2@example.com");
    }

    #[tokio::test]
    async fn test_email_failure_keeps_in_app_notification() {
        let sink = Arc::new(FakeSink::default());
        let email = Arc::new(FakeEmail::failing());
        let store = Arc::new(CooldownStore::default());

        let outcomes = dispatcher(sink.clone(), store.clone())
            .with_email(email)
            .dispatch(vec![job("u1", "p1", SeverityTier::Critical)])
            .await;

        assert!(outcomes[0].is_success());
        assert!(matches!(outcomes[0].email, EmailOutcome::Failed { .. }));
        assert_eq!(sink.created().len(), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_persist_failure_still_sends_email() {
        let sink = Arc::new(FakeSink::failing_for(&["p1"]));
        let email = Arc::new(FakeEmail::default());
        let store = Arc::new(CooldownStore::default());

        let outcomes = dispatcher(sink, store.clone())
            .with_email(email.clone())
            .dispatch(vec![job("u1", "p1", SeverityTier::OutOfStock)])
            .await;

        assert!(!outcomes[0].is_success());
        assert_eq!(outcomes[0].email, EmailOutcome::Sent);
        assert_eq!(email.sent().len(), 1);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_slow_sink_times_out() {
        let sink = Arc::new(FakeSink::slow_for(&["p2"], Duration::from_secs(30)));
        let store = Arc::new(CooldownStore::default());

        let outcomes = dispatcher(sink, store.clone())
            .with_sink_timeout(Duration::from_millis(50))
            .dispatch(vec![
                job("u1", "p1", SeverityTier::Low),
                job("u1", "p2", SeverityTier::Low),
            ])
            .await;

        let slow = outcomes.iter().find(|o| o.job.product_id == "p2").unwrap();
        assert_eq!(slow.status, DispatchStatus::Failed);
        assert!(slow.error.as_deref().unwrap_or_default().contains("timed out"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_jobs_run_concurrently() {
        let sink = Arc::new(FakeSink::slow_for(
            &["p0", "p1", "p2", "p3", "p4", "p5", "p6", "p7"],
            Duration::from_millis(200),
        ));
        let store = Arc::new(CooldownStore::default());
        let jobs: Vec<DispatchJob> = (0..8)
            .map(|i| job("u1", &format!("p{}", i), SeverityTier::Low))
            .collect();

        let started = std::time::Instant::now();
        let outcomes = dispatcher(sink, store).dispatch(jobs).await;

        assert_eq!(outcomes.len(), 8);
        assert!(outcomes.iter().all(|o| o.is_success()));
        assert!(started.elapsed() < Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let store = Arc::new(CooldownStore::default());
        let outcomes = dispatcher(Arc::new(FakeSink::default()), store.clone())
            .dispatch(Vec::new())
            .await;
        assert!(outcomes.is_empty());
        assert!(store.is_empty());
    }
}
