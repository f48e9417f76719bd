//! Severity-tiered notification cooldowns
//!
//! The cooldown store is the only state that outlives a single health-check
//! pass. It remembers when each `(product, tier)` bucket last produced a
//! confirmed notification and answers whether that bucket may fire again.

use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use super::config::duration_serde;
use crate::inventory::SeverityTier;

/// Deduplication bucket for one product at one severity
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NotificationKey {
    pub product_id: String,
    pub tier: SeverityTier,
}

impl NotificationKey {
    pub fn new(product_id: impl Into<String>, tier: SeverityTier) -> Self {
        Self {
            product_id: product_id.into(),
            tier,
        }
    }
}

/// Last confirmed firing of a key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooldownRecord {
    pub key: NotificationKey,
    pub last_fired_at: DateTime<Utc>,
}

/// How long each tier stays quiet after firing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooldownPolicy {
    #[serde(with = "duration_serde")]
    pub low: Duration,
    #[serde(with = "duration_serde")]
    pub critical: Duration,
    #[serde(with = "duration_serde")]
    pub out_of_stock: Duration,
}

impl Default for CooldownPolicy {
    fn default() -> Self {
        Self {
            low: Duration::from_secs(24 * 3600),
            critical: Duration::from_secs(6 * 3600),
            out_of_stock: Duration::from_secs(12 * 3600),
        }
    }
}

impl CooldownPolicy {
    /// Cooldown for a tier; `None` means the tier never fires
    pub fn ttl(&self, tier: SeverityTier) -> Option<Duration> {
        match tier {
            SeverityTier::Healthy => None,
            SeverityTier::Low => Some(self.low),
            SeverityTier::Critical => Some(self.critical),
            SeverityTier::OutOfStock => Some(self.out_of_stock),
        }
    }
}

/// Concurrent map of last-fired timestamps
#[derive(Debug, Default)]
pub struct CooldownStore {
    records: DashMap<NotificationKey, DateTime<Utc>>,
    policy: CooldownPolicy,
}

impl CooldownStore {
    pub fn new(policy: CooldownPolicy) -> Self {
        Self {
            records: DashMap::new(),
            policy,
        }
    }

    pub fn policy(&self) -> &CooldownPolicy {
        &self.policy
    }

    /// Whether a notification for `key` may be sent at `now`
    pub fn may_fire(&self, key: &NotificationKey, now: DateTime<Utc>) -> bool {
        let Some(ttl) = self.policy.ttl(key.tier) else {
            return false;
        };

        match self.records.get(key) {
            None => true,
            Some(last) => elapsed_at_least(*last, now, ttl),
        }
    }

    /// Record a confirmed firing, overwriting any earlier one
    pub fn record_fired(&self, key: NotificationKey, now: DateTime<Utc>) {
        self.records.insert(key, now);
    }

    pub fn get(&self, key: &NotificationKey) -> Option<DateTime<Utc>> {
        self.records.get(key).map(|t| *t)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&self) {
        self.records.clear();
    }

    /// All records, sorted by key
    pub fn records(&self) -> Vec<CooldownRecord> {
        let mut records: Vec<CooldownRecord> = self
            .records
            .iter()
            .map(|entry| CooldownRecord {
                key: entry.key().clone(),
                last_fired_at: *entry.value(),
            })
            .collect();
        records.sort_by(|a, b| a.key.cmp(&b.key));
        records
    }

    /// Load records, keeping the newer timestamp when a key already exists
    pub fn restore(&self, records: impl IntoIterator<Item = CooldownRecord>) -> usize {
        let mut restored = 0;
        for record in records {
            let mut entry = self
                .records
                .entry(record.key)
                .or_insert(record.last_fired_at);
            if *entry < record.last_fired_at {
                *entry = record.last_fired_at;
            }
            restored += 1;
        }
        restored
    }

    /// Drop entries whose cooldown ran out more than `retention_cycles`
    /// windows ago. Returns how many were removed.
    pub fn prune(&self, now: DateTime<Utc>, retention_cycles: u32) -> usize {
        let before = self.records.len();
        let cycles = retention_cycles.max(1);
        self.records.retain(|key, last| match self.policy.ttl(key.tier) {
            Some(ttl) => !elapsed_at_least(*last, now, ttl * cycles),
            None => false,
        });
        before.saturating_sub(self.records.len())
    }
}

/// A timestamp in the future (clock skew) never counts as elapsed
fn elapsed_at_least(since: DateTime<Utc>, now: DateTime<Utc>, window: Duration) -> bool {
    match (now - since).to_std() {
        Ok(elapsed) => elapsed >= window,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
    }

    fn hours(h: i64) -> chrono::Duration {
        chrono::Duration::hours(h)
    }

    #[test]
    fn test_unknown_key_may_fire() {
        let store = CooldownStore::default();
        assert!(store.may_fire(&NotificationKey::new("p1", SeverityTier::Low), t0()));
    }

    #[test]
    fn test_healthy_never_fires() {
        let store = CooldownStore::default();
        assert!(!store.may_fire(&NotificationKey::new("p1", SeverityTier::Healthy), t0()));
    }

    #[test]
    fn test_low_suppressed_within_ttl() {
        let store = CooldownStore::default();
        let key = NotificationKey::new("p1", SeverityTier::Low);
        store.record_fired(key.clone(), t0() - hours(1));

        assert!(!store.may_fire(&key, t0()));
        assert!(!store.may_fire(&key, t0() + hours(22)));
        // exactly 24h after firing
        assert!(store.may_fire(&key, t0() + hours(23)));
        assert!(store.may_fire(&key, t0() + hours(30)));
    }

    #[test]
    fn test_tier_specific_ttls() {
        let store = CooldownStore::default();
        let critical = NotificationKey::new("p1", SeverityTier::Critical);
        let out = NotificationKey::new("p2", SeverityTier::OutOfStock);
        store.record_fired(critical.clone(), t0());
        store.record_fired(out.clone(), t0());

        assert!(!store.may_fire(&critical, t0() + hours(5)));
        assert!(store.may_fire(&critical, t0() + hours(6)));
        assert!(!store.may_fire(&out, t0() + hours(11)));
        assert!(store.may_fire(&out, t0() + hours(12)));
    }

    #[test]
    fn test_new_tier_is_a_new_key() {
        let store = CooldownStore::default();
        store.record_fired(NotificationKey::new("p1", SeverityTier::Low), t0());

        let escalated = NotificationKey::new("p1", SeverityTier::Critical);
        assert!(store.may_fire(&escalated, t0() + hours(1)));
        assert!(!store.may_fire(&NotificationKey::new("p1", SeverityTier::Low), t0() + hours(1)));
    }

    #[test]
    fn test_record_overwrites() {
        let store = CooldownStore::default();
        let key = NotificationKey::new("p1", SeverityTier::Critical);
        store.record_fired(key.clone(), t0());
        store.record_fired(key.clone(), t0() + hours(7));

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&key), Some(t0() + hours(7)));
        assert!(!store.may_fire(&key, t0() + hours(8)));
    }

    #[test]
    fn test_future_timestamp_suppresses() {
        let store = CooldownStore::default();
        let key = NotificationKey::new("p1", SeverityTier::Low);
        store.record_fired(key.clone(), t0() + hours(2));
        assert!(!store.may_fire(&key, t0()));
    }

    #[test]
    fn test_prune_removes_long_expired_entries() {
        let store = CooldownStore::default();
        store.record_fired(NotificationKey::new("old", SeverityTier::Critical), t0());
        store.record_fired(NotificationKey::new("recent", SeverityTier::Critical), t0() + hours(20));
        store.record_fired(NotificationKey::new("low", SeverityTier::Low), t0());

        // critical TTL 6h, three cycles = 18h; low would need 72h
        let removed = store.prune(t0() + hours(24), 3);
        assert_eq!(removed, 1);
        assert!(store.get(&NotificationKey::new("old", SeverityTier::Critical)).is_none());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_restore_keeps_newest() {
        let store = CooldownStore::default();
        let key = NotificationKey::new("p1", SeverityTier::Low);
        store.record_fired(key.clone(), t0() + hours(3));

        let restored = store.restore(vec![
            CooldownRecord {
                key: key.clone(),
                last_fired_at: t0(),
            },
            CooldownRecord {
                key: NotificationKey::new("p2", SeverityTier::OutOfStock),
                last_fired_at: t0(),
            },
        ]);

        assert_eq!(restored, 2);
        assert_eq!(store.get(&key), Some(t0() + hours(3)));
        assert_eq!(store.records().len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_records_are_not_lost() {
        let store = std::sync::Arc::new(CooldownStore::default());
        let mut handles = Vec::new();
        for i in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let key = NotificationKey::new(format!("p{}", i), SeverityTier::Low);
                assert!(store.may_fire(&key, t0()));
                store.record_fired(key, t0());
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(store.len(), 50);
    }
}
