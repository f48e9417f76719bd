//! Health-check orchestration
//!
//! One run: throttle check, bulk product fetch, classification, cooldown
//! filtering, concurrent dispatch and aggregation into a report.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::clock::{Clock, SystemClock};
use super::config::AlertSettings;
use super::cooldown::CooldownStore;
use super::dispatcher::{DispatchJob, DispatchOutcome, Dispatcher, EmailOutcome};
use crate::inventory::{classify_with, effective_reorder_level, ProductSnapshot, SeverityTier};
use crate::persistence::CooldownSnapshotFile;
use crate::providers::{EmailSink, NotificationSink, ProductProvider, Recipient, RecipientProvider};

/// Summary of one health-check invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub scanned: usize,
    pub tier_counts: BTreeMap<SeverityTier, usize>,
    pub notifications_created: usize,
    pub notifications_failed: usize,
    pub skipped_due_to_cooldown: usize,
    pub skipped_due_to_throttle: bool,
    pub emails_sent: usize,
    pub emails_failed: usize,
    /// Set when the run aborted before classification
    pub error: Option<String>,
}

impl HealthCheckReport {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at: started_at,
            scanned: 0,
            tier_counts: SeverityTier::ALL.iter().map(|t| (*t, 0)).collect(),
            notifications_created: 0,
            notifications_failed: 0,
            skipped_due_to_cooldown: 0,
            skipped_due_to_throttle: false,
            emails_sent: 0,
            emails_failed: 0,
            error: None,
        }
    }

    fn throttled(at: DateTime<Utc>) -> Self {
        Self {
            skipped_due_to_throttle: true,
            ..Self::new(at)
        }
    }

    fn failed(started_at: DateTime<Utc>, finished_at: DateTime<Utc>, error: String) -> Self {
        Self {
            finished_at,
            error: Some(error),
            ..Self::new(started_at)
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn tier_count(&self, tier: SeverityTier) -> usize {
        self.tier_counts.get(&tier).copied().unwrap_or(0)
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }

    fn absorb(&mut self, outcomes: &[DispatchOutcome]) {
        for outcome in outcomes {
            if outcome.is_success() {
                self.notifications_created += 1;
            } else {
                self.notifications_failed += 1;
            }
            match outcome.email {
                EmailOutcome::Sent => self.emails_sent += 1,
                EmailOutcome::Failed { .. } => self.emails_failed += 1,
                EmailOutcome::NotAttempted => {}
            }
        }
    }
}

/// Entry point of the alerting engine
pub struct HealthCheckOrchestrator {
    settings: AlertSettings,
    products: Arc<dyn ProductProvider>,
    recipients: Arc<dyn RecipientProvider>,
    notifications: Arc<dyn NotificationSink>,
    email: Option<Arc<dyn EmailSink>>,
    cooldowns: Arc<CooldownStore>,
    clock: Arc<dyn Clock>,
    state_file: Option<CooldownSnapshotFile>,
    /// Serializes runs; holds when the last successful run finished
    last_finished: Mutex<Option<DateTime<Utc>>>,
    last_report: RwLock<Option<HealthCheckReport>>,
}

impl HealthCheckOrchestrator {
    pub fn new(
        settings: AlertSettings,
        products: Arc<dyn ProductProvider>,
        recipients: Arc<dyn RecipientProvider>,
        notifications: Arc<dyn NotificationSink>,
    ) -> Self {
        let cooldowns = Arc::new(CooldownStore::new(settings.cooldown.clone()));
        Self {
            settings,
            products,
            recipients,
            notifications,
            email: None,
            cooldowns,
            clock: Arc::new(SystemClock),
            state_file: None,
            last_finished: Mutex::new(None),
            last_report: RwLock::new(None),
        }
    }

    /// Email sink used for urgent tiers when email is enabled in settings
    pub fn with_email(mut self, sink: Arc<dyn EmailSink>) -> Self {
        self.email = Some(sink);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Share an existing cooldown store, e.g. one restored from disk
    pub fn with_cooldowns(mut self, cooldowns: Arc<CooldownStore>) -> Self {
        self.cooldowns = cooldowns;
        self
    }

    /// Snapshot the cooldown store to `file` after every completed run
    pub fn with_state_file(mut self, file: CooldownSnapshotFile) -> Self {
        self.state_file = Some(file);
        self
    }

    pub fn settings(&self) -> &AlertSettings {
        &self.settings
    }

    pub fn cooldowns(&self) -> &Arc<CooldownStore> {
        &self.cooldowns
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Report of the most recent run that got past the throttle
    pub fn last_report(&self) -> Option<HealthCheckReport> {
        self.last_report.read().clone()
    }

    fn dispatcher(&self) -> Dispatcher {
        let mut dispatcher = Dispatcher::new(Arc::clone(&self.notifications), Arc::clone(&self.cooldowns))
            .with_clock(Arc::clone(&self.clock))
            .with_sink_timeout(self.settings.sink_timeout)
            .with_max_concurrency(self.settings.max_concurrency);
        if self.settings.email_enabled {
            if let Some(sink) = &self.email {
                dispatcher = dispatcher.with_email(Arc::clone(sink));
            }
        }
        dispatcher
    }

    /// Run one health check. Unforced runs inside the minimum interval
    /// return a throttled report without scanning.
    pub async fn run_health_check(&self, force: bool) -> HealthCheckReport {
        let mut last_finished = self.last_finished.lock().await;
        let started_at = self.clock.now();

        if !force {
            if let Some(previous) = *last_finished {
                let within = (started_at - previous)
                    .to_std()
                    .map(|elapsed| elapsed < self.settings.min_interval)
                    .unwrap_or(true);
                if within {
                    tracing::debug!(last_finished = %previous, "Health check throttled");
                    return HealthCheckReport::throttled(started_at);
                }
            }
        }

        let report = self.execute(started_at).await;

        if report.is_success() {
            *last_finished = Some(report.finished_at);
            self.save_state().await;
        }
        *self.last_report.write() = Some(report.clone());

        report
    }

    async fn execute(&self, started_at: DateTime<Utc>) -> HealthCheckReport {
        let products = match self.products.list_active_products().await {
            Ok(products) => products,
            Err(e) => {
                tracing::error!(error = %e, "Health check aborted: product fetch failed");
                return HealthCheckReport::failed(started_at, self.clock.now(), e.to_string());
            }
        };

        let mut report = HealthCheckReport::new(started_at);
        report.scanned = products.len();

        let mut alerting: Vec<(ProductSnapshot, SeverityTier, u64)> = Vec::new();
        for product in products {
            let tier = classify_with(&product, &self.settings.classifier);
            *report.tier_counts.entry(tier).or_insert(0) += 1;
            if tier.is_alerting() {
                let reorder = effective_reorder_level(&product, &self.settings.classifier);
                alerting.push((product, tier, reorder));
            }
        }

        if self.settings.alerts_enabled && !alerting.is_empty() {
            let recipients = match self.recipients.list_alert_recipients().await {
                Ok(recipients) => self.eligible(recipients),
                Err(e) => {
                    tracing::error!(error = %e, "Health check aborted: recipient fetch failed");
                    return HealthCheckReport::failed(started_at, self.clock.now(), e.to_string());
                }
            };

            let now = self.clock.now();
            let mut jobs = Vec::new();
            for (product, tier, reorder_level) in &alerting {
                for recipient in &recipients {
                    let job = DispatchJob {
                        recipient_id: recipient.id.clone(),
                        recipient_address: recipient.address.clone(),
                        product_id: product.id.clone(),
                        product_name: product.display_name.clone(),
                        stock_quantity: product.stock_quantity,
                        reorder_level: *reorder_level,
                        tier: *tier,
                        created_at: now,
                    };
                    if self.cooldowns.may_fire(&job.key(), now) {
                        jobs.push(job);
                    } else {
                        report.skipped_due_to_cooldown += 1;
                    }
                }
            }

            let outcomes = self.dispatcher().dispatch(jobs).await;
            report.absorb(&outcomes);
        } else if !self.settings.alerts_enabled {
            tracing::debug!("Alerts disabled, skipping dispatch");
        }

        report.finished_at = self.clock.now();

        tracing::info!(
            scanned = report.scanned,
            out_of_stock = report.tier_count(SeverityTier::OutOfStock),
            critical = report.tier_count(SeverityTier::Critical),
            low = report.tier_count(SeverityTier::Low),
            created = report.notifications_created,
            failed = report.notifications_failed,
            skipped_cooldown = report.skipped_due_to_cooldown,
            "Health check complete"
        );

        report
    }

    /// Apply the settings' selection and drop duplicate recipient ids
    fn eligible(&self, recipients: Vec<Recipient>) -> Vec<Recipient> {
        let mut seen = HashSet::new();
        recipients
            .into_iter()
            .filter(|r| self.settings.recipients.includes(&r.id))
            .filter(|r| seen.insert(r.id.clone()))
            .collect()
    }

    /// Write the cooldown snapshot on the blocking pool
    async fn save_state(&self) {
        let Some(file) = self.state_file.clone() else {
            return;
        };
        let records = self.cooldowns.records();
        let saved_at = self.clock.now();
        let path = file.path().to_path_buf();

        match tokio::task::spawn_blocking(move || file.save(&records, saved_at)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to save cooldown state");
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Cooldown state writer did not complete");
            }
        }
    }
}
