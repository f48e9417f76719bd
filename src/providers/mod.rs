//! Boundary contracts consumed by the alerting engine
//!
//! Product data, recipients, notification persistence and email delivery all
//! live outside the engine. Each is a trait so the engine can be driven by the
//! hosted backend in production and by in-memory fakes in tests.

pub mod email;
pub mod memory;
pub mod rest;

pub use email::{FallbackEmailSink, HttpEmailSink, LogEmailSink};
pub use memory::{InMemoryCatalog, InMemoryInbox, StaticRecipients};
pub use rest::RestBackend;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::inventory::{ProductSnapshot, SeverityTier};

/// Someone who receives stock alerts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub id: String,
    /// Email address; recipients without one only get in-app notifications
    #[serde(default)]
    pub address: Option<String>,
}

impl Recipient {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            address: None,
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }
}

/// In-app notification record handed to a [`NotificationSink`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNotification {
    pub recipient_id: String,
    pub product_id: String,
    pub tier: SeverityTier,
    pub title: String,
    pub message: String,
}

/// Outbound email handed to an [`EmailSink`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Supplies the current stock snapshot in one bulk read
#[async_trait]
pub trait ProductProvider: Send + Sync {
    async fn list_active_products(&self) -> Result<Vec<ProductSnapshot>, ProviderError>;
}

/// Supplies everyone eligible for stock alerts
#[async_trait]
pub trait RecipientProvider: Send + Sync {
    async fn list_alert_recipients(&self) -> Result<Vec<Recipient>, ProviderError>;
}

/// Persists in-app notifications
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn create_notification(&self, notification: NewNotification) -> Result<(), PersistError>;
}

/// Delivers email. Implementations may fall back between providers internally.
#[async_trait]
pub trait EmailSink: Send + Sync {
    async fn send_email(&self, message: EmailMessage) -> Result<(), DeliveryError>;
}

/// Product or recipient data could not be fetched
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Provider returned malformed data: {0}")]
    Decode(String),
}

/// A single notification failed to save
#[derive(Debug, Clone, thiserror::Error)]
pub enum PersistError {
    #[error("Persist error: {0}")]
    Backend(String),

    #[error("Persist timed out after {0} ms")]
    Timeout(u64),
}

/// An email failed to send
#[derive(Debug, Clone, thiserror::Error)]
pub enum DeliveryError {
    #[error("Delivery error: {0}")]
    Transport(String),

    #[error("Email provider rejected message with status {0}")]
    Rejected(u16),

    #[error("Delivery timed out after {0} ms")]
    Timeout(u64),

    #[error("All email providers failed: {0:?}")]
    Exhausted(Vec<DeliveryError>),
}
