//! In-process providers and sinks
//!
//! Used when no hosted backend is configured, and as building blocks in tests.

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{
    NewNotification, NotificationSink, PersistError, ProductProvider, ProviderError, Recipient,
    RecipientProvider,
};
use crate::inventory::ProductSnapshot;

/// Product catalog held in memory
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    products: RwLock<Vec<ProductSnapshot>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_products(products: Vec<ProductSnapshot>) -> Self {
        Self {
            products: RwLock::new(products),
        }
    }

    /// Replace the whole catalog, returning the new product count
    pub fn replace(&self, products: Vec<ProductSnapshot>) -> usize {
        let mut guard = self.products.write();
        *guard = products;
        guard.len()
    }

    /// Insert or update a single product by id
    pub fn upsert(&self, product: ProductSnapshot) {
        let mut products = self.products.write();
        match products.iter_mut().find(|p| p.id == product.id) {
            Some(existing) => *existing = product,
            None => products.push(product),
        }
    }

    /// Set the stock quantity of an existing product
    pub fn set_stock(&self, id: &str, stock_quantity: u64) -> bool {
        let mut products = self.products.write();
        if let Some(p) = products.iter_mut().find(|p| p.id == id) {
            p.stock_quantity = stock_quantity;
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.products.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.read().is_empty()
    }
}

#[async_trait]
impl ProductProvider for InMemoryCatalog {
    async fn list_active_products(&self) -> Result<Vec<ProductSnapshot>, ProviderError> {
        Ok(self.products.read().clone())
    }
}

/// Fixed recipient list
#[derive(Debug, Clone, Default)]
pub struct StaticRecipients {
    recipients: Vec<Recipient>,
}

impl StaticRecipients {
    pub fn new(recipients: Vec<Recipient>) -> Self {
        Self { recipients }
    }
}

#[async_trait]
impl RecipientProvider for StaticRecipients {
    async fn list_alert_recipients(&self) -> Result<Vec<Recipient>, ProviderError> {
        Ok(self.recipients.clone())
    }
}

/// Notification sink that keeps every record in memory
#[derive(Debug, Default)]
pub struct InMemoryInbox {
    notifications: RwLock<Vec<NewNotification>>,
}

impl InMemoryInbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored notifications, oldest first
    pub fn list(&self) -> Vec<NewNotification> {
        self.notifications.read().clone()
    }

    /// Notifications addressed to one recipient
    pub fn for_recipient(&self, recipient_id: &str) -> Vec<NewNotification> {
        self.notifications
            .read()
            .iter()
            .filter(|n| n.recipient_id == recipient_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.notifications.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifications.read().is_empty()
    }
}

#[async_trait]
impl NotificationSink for InMemoryInbox {
    async fn create_notification(&self, notification: NewNotification) -> Result<(), PersistError> {
        self.notifications.write().push(notification);
        Ok(())
    }
}
