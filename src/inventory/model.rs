use std::fmt;

use serde::{Deserialize, Serialize};

/// Point-in-time stock level of one active product
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    /// Catalog identifier
    pub id: String,
    /// Name shown to pharmacy staff
    pub display_name: String,
    /// Units on hand
    pub stock_quantity: u64,
    /// Manually configured reorder threshold, if any
    #[serde(default)]
    pub reorder_level: Option<u64>,
}

impl ProductSnapshot {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, stock_quantity: u64) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            stock_quantity,
            reorder_level: None,
        }
    }

    /// Set an explicit reorder level
    pub fn with_reorder_level(mut self, level: u64) -> Self {
        self.reorder_level = Some(level);
        self
    }
}

/// Urgency of a product's stock level.
///
/// Variants are declared in ascending urgency so the derived `Ord` gives
/// `OutOfStock > Critical > Low > Healthy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeverityTier {
    Healthy,
    Low,
    Critical,
    OutOfStock,
}

impl SeverityTier {
    /// All tiers in ascending urgency
    pub const ALL: [SeverityTier; 4] = [
        SeverityTier::Healthy,
        SeverityTier::Low,
        SeverityTier::Critical,
        SeverityTier::OutOfStock,
    ];

    /// Whether this tier produces any notification at all
    pub fn is_alerting(self) -> bool {
        self != SeverityTier::Healthy
    }

    /// Whether this tier also warrants an outbound email
    pub fn wants_email(self) -> bool {
        matches!(self, SeverityTier::Critical | SeverityTier::OutOfStock)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SeverityTier::Healthy => "healthy",
            SeverityTier::Low => "low",
            SeverityTier::Critical => "critical",
            SeverityTier::OutOfStock => "out_of_stock",
        }
    }
}

impl fmt::Display for SeverityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
