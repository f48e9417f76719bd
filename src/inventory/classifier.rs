//! Stock level severity classification

use serde::{Deserialize, Serialize};

use super::model::{ProductSnapshot, SeverityTier};

/// Thresholds used when classifying stock levels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Share of current stock used as the reorder level when none is configured
    pub default_reorder_fraction: f64,
    /// Floor for the derived reorder level
    pub min_default_reorder: u64,
    /// Share of the reorder level at or below which stock is critical
    pub critical_fraction: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            default_reorder_fraction: 0.2,
            min_default_reorder: 5,
            critical_fraction: 0.3,
        }
    }
}

impl ClassifierConfig {
    /// Reject fractions that would make the tiers meaningless
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("default_reorder_fraction", self.default_reorder_fraction),
            ("critical_fraction", self.critical_fraction),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(format!("{} must be in (0, 1], got {}", name, value));
            }
        }
        Ok(())
    }
}

/// Reorder level a snapshot is judged against.
///
/// A missing or zero level falls back to a share of current stock so that
/// products nobody configured are still covered.
pub fn effective_reorder_level(snapshot: &ProductSnapshot, config: &ClassifierConfig) -> u64 {
    match snapshot.reorder_level {
        Some(level) if level > 0 => level,
        _ => {
            let derived =
                (snapshot.stock_quantity as f64 * config.default_reorder_fraction).floor() as u64;
            derived.max(config.min_default_reorder)
        }
    }
}

/// Classify a snapshot with the default thresholds
pub fn classify(snapshot: &ProductSnapshot) -> SeverityTier {
    classify_with(snapshot, &ClassifierConfig::default())
}

/// Classify a snapshot; first matching rule wins
pub fn classify_with(snapshot: &ProductSnapshot, config: &ClassifierConfig) -> SeverityTier {
    let stock = snapshot.stock_quantity;
    if stock == 0 {
        return SeverityTier::OutOfStock;
    }

    let reorder = effective_reorder_level(snapshot, config);
    if stock as f64 <= reorder as f64 * config.critical_fraction {
        SeverityTier::Critical
    } else if stock <= reorder {
        SeverityTier::Low
    } else {
        SeverityTier::Healthy
    }
}
