//! Alerting settings
//!
//! Owned by the settings layer and injected into the orchestrator at
//! construction; the engine only reads them.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::cooldown::CooldownPolicy;
use crate::inventory::ClassifierConfig;

/// Settings read by the health-check orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertSettings {
    /// Minimum spacing between unforced runs
    #[serde(with = "duration_serde")]
    pub min_interval: Duration,
    /// Period of the background scheduler
    #[serde(with = "duration_serde")]
    pub check_interval: Duration,
    /// Master switch; when off, runs still scan but dispatch nothing
    pub alerts_enabled: bool,
    /// Whether critical and out-of-stock alerts are also emailed
    pub email_enabled: bool,
    /// Who receives alerts
    #[serde(default)]
    pub recipients: RecipientSelection,
    /// Severity thresholds
    #[serde(default)]
    pub classifier: ClassifierConfig,
    /// Per-tier cooldowns
    #[serde(default)]
    pub cooldown: CooldownPolicy,
    /// Upper bound on each notification or email call
    #[serde(with = "duration_serde")]
    pub sink_timeout: Duration,
    /// Maximum jobs in flight during one dispatch
    pub max_concurrency: usize,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_secs(5 * 60),
            check_interval: Duration::from_secs(30 * 60),
            alerts_enabled: true,
            email_enabled: true,
            recipients: RecipientSelection::All,
            classifier: ClassifierConfig::default(),
            cooldown: CooldownPolicy::default(),
            sink_timeout: Duration::from_secs(10),
            max_concurrency: 32,
        }
    }
}

impl AlertSettings {
    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    pub fn with_alerts_enabled(mut self, enabled: bool) -> Self {
        self.alerts_enabled = enabled;
        self
    }

    pub fn with_email_enabled(mut self, enabled: bool) -> Self {
        self.email_enabled = enabled;
        self
    }

    pub fn with_recipients(mut self, recipients: RecipientSelection) -> Self {
        self.recipients = recipients;
        self
    }

    pub fn with_classifier(mut self, classifier: ClassifierConfig) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_cooldown(mut self, cooldown: CooldownPolicy) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn with_sink_timeout(mut self, timeout: Duration) -> Self {
        self.sink_timeout = timeout;
        self
    }

    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max;
        self
    }

    /// Load settings from environment variables, starting from defaults.
    ///
    /// STOCKWATCH_MIN_INTERVAL_SECS=300
    /// STOCKWATCH_CHECK_INTERVAL_SECS=1800
    /// STOCKWATCH_ALERTS_ENABLED=true
    /// STOCKWATCH_EMAIL_ENABLED=true
    /// STOCKWATCH_RECIPIENTS=user-1,user-2 (empty means everyone)
    /// STOCKWATCH_SINK_TIMEOUT_MS=10000
    /// STOCKWATCH_MAX_CONCURRENCY=32
    /// STOCKWATCH_DEFAULT_REORDER_FRACTION=0.2
    /// STOCKWATCH_MIN_DEFAULT_REORDER=5
    /// STOCKWATCH_CRITICAL_FRACTION=0.3
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`AlertSettings::from_env`] with an injectable variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();

        if let Some(secs) = parse_var::<u64, _>(&lookup, "STOCKWATCH_MIN_INTERVAL_SECS")? {
            settings.min_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "STOCKWATCH_CHECK_INTERVAL_SECS")? {
            settings.check_interval = Duration::from_secs(secs);
        }
        if let Some(enabled) = parse_flag(&lookup, "STOCKWATCH_ALERTS_ENABLED")? {
            settings.alerts_enabled = enabled;
        }
        if let Some(enabled) = parse_flag(&lookup, "STOCKWATCH_EMAIL_ENABLED")? {
            settings.email_enabled = enabled;
        }
        if let Some(list) = lookup("STOCKWATCH_RECIPIENTS") {
            let ids: Vec<String> = list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
            settings.recipients = if ids.is_empty() {
                RecipientSelection::All
            } else {
                RecipientSelection::Only(ids)
            };
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "STOCKWATCH_SINK_TIMEOUT_MS")? {
            settings.sink_timeout = Duration::from_millis(ms);
        }
        if let Some(max) = parse_var::<usize, _>(&lookup, "STOCKWATCH_MAX_CONCURRENCY")? {
            settings.max_concurrency = max;
        }
        if let Some(v) = parse_var::<f64, _>(&lookup, "STOCKWATCH_DEFAULT_REORDER_FRACTION")? {
            settings.classifier.default_reorder_fraction = v;
        }
        if let Some(v) = parse_var::<u64, _>(&lookup, "STOCKWATCH_MIN_DEFAULT_REORDER")? {
            settings.classifier.min_default_reorder = v;
        }
        if let Some(v) = parse_var::<f64, _>(&lookup, "STOCKWATCH_CRITICAL_FRACTION")? {
            settings.classifier.critical_fraction = v;
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.classifier.validate().map_err(ConfigError::Classifier)?;
        let zeroed = [
            ("max_concurrency", self.max_concurrency == 0),
            ("check_interval", self.check_interval.is_zero()),
            ("sink_timeout", self.sink_timeout.is_zero()),
        ];
        if let Some((key, _)) = zeroed.iter().find(|(_, zero)| *zero) {
            return Err(ConfigError::Invalid {
                key: key.to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

/// Which recipients are eligible for alerts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "ids", rename_all = "snake_case")]
pub enum RecipientSelection {
    /// Everyone the recipient provider returns
    #[default]
    All,
    /// Only these recipient ids
    Only(Vec<String>),
}

impl RecipientSelection {
    pub fn includes(&self, recipient_id: &str) -> bool {
        match self {
            RecipientSelection::All => true,
            RecipientSelection::Only(ids) => ids.iter().any(|id| id == recipient_id),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    Invalid { key: String, value: String },

    #[error("Invalid classifier settings: {0}")]
    Classifier(String),
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid {
                key: key.to_string(),
                value: raw,
            }),
    }
}

fn parse_flag<F>(lookup: &F, key: &str) -> Result<Option<bool>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(ConfigError::Invalid {
                key: key.to_string(),
                value: raw,
            }),
        },
    }
}

/// Duration serialization helper
pub(crate) mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    #[derive(Serialize, Deserialize)]
    struct DurationHelper {
        secs: u64,
        #[serde(default)]
        nanos: u32,
    }

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        DurationHelper {
            secs: duration.as_secs(),
            nanos: duration.subsec_nanos(),
        }
        .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let helper = DurationHelper::deserialize(deserializer)?;
        Ok(Duration::new(helper.secs, helper.nanos))
    }
}
