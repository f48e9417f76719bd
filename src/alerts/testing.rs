//! Fake providers and sinks shared by the alerting tests

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::inventory::ProductSnapshot;
use crate::providers::{
    DeliveryError, EmailMessage, EmailSink, NewNotification, NotificationSink, PersistError,
    ProductProvider, ProviderError, Recipient, RecipientProvider,
};

/// Notification sink with per-product or per-recipient misbehavior
#[derive(Default)]
pub struct FakeSink {
    fail_products: HashSet<String>,
    fail_recipients: HashSet<String>,
    panic_products: HashSet<String>,
    slow_products: HashSet<String>,
    delay: Duration,
    created: Mutex<Vec<NewNotification>>,
}

fn set(ids: &[&str]) -> HashSet<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

impl FakeSink {
    pub fn failing_for(products: &[&str]) -> Self {
        Self {
            fail_products: set(products),
            ..Self::default()
        }
    }

    pub fn failing_for_recipients(recipients: &[&str]) -> Self {
        Self {
            fail_recipients: set(recipients),
            ..Self::default()
        }
    }

    pub fn panicking_for(products: &[&str]) -> Self {
        Self {
            panic_products: set(products),
            ..Self::default()
        }
    }

    pub fn slow_for(products: &[&str], delay: Duration) -> Self {
        Self {
            slow_products: set(products),
            delay,
            ..Self::default()
        }
    }

    pub fn created(&self) -> Vec<NewNotification> {
        self.created.lock().clone()
    }
}

#[async_trait]
impl NotificationSink for FakeSink {
    async fn create_notification(&self, notification: NewNotification) -> Result<(), PersistError> {
        if self.slow_products.contains(&notification.product_id) {
            tokio::time::sleep(self.delay).await;
        }
        if self.panic_products.contains(&notification.product_id) {
            panic!("sink blew up for {}", notification.product_id);
        }
        if self.fail_products.contains(&notification.product_id)
            || self.fail_recipients.contains(&notification.recipient_id)
        {
            return Err(PersistError::Backend("insert rejected".to_string()));
        }
        self.created.lock().push(notification);
        Ok(())
    }
}

/// Email sink that records or rejects everything
#[derive(Default)]
pub struct FakeEmail {
    fail: bool,
    sent: Mutex<Vec<EmailMessage>>,
}

impl FakeEmail {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl EmailSink for FakeEmail {
    async fn send_email(&self, message: EmailMessage) -> Result<(), DeliveryError> {
        if self.fail {
            return Err(DeliveryError::Rejected(503));
        }
        self.sent.lock().push(message);
        Ok(())
    }
}

/// Product provider that counts calls and can be switched to failing
#[derive(Default)]
pub struct FlakyProducts {
    products: Mutex<Vec<ProductSnapshot>>,
    failing: Mutex<bool>,
    calls: AtomicUsize,
}

impl FlakyProducts {
    pub fn new(products: Vec<ProductSnapshot>) -> Self {
        Self {
            products: Mutex::new(products),
            ..Self::default()
        }
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProductProvider for FlakyProducts {
    async fn list_active_products(&self) -> Result<Vec<ProductSnapshot>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if *self.failing.lock() {
            return Err(ProviderError::Unavailable("connection refused".to_string()));
        }
        Ok(self.products.lock().clone())
    }
}

/// Recipient provider that can be switched to failing
#[derive(Default)]
pub struct FlakyRecipients {
    recipients: Vec<Recipient>,
    failing: Mutex<bool>,
}

impl FlakyRecipients {
    pub fn new(recipients: Vec<Recipient>) -> Self {
        Self {
            recipients,
            ..Self::default()
        }
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing;
    }
}

#[async_trait]
impl RecipientProvider for FlakyRecipients {
    async fn list_alert_recipients(&self) -> Result<Vec<Recipient>, ProviderError> {
        if *self.failing.lock() {
            return Err(ProviderError::Unavailable("profiles unreachable".to_string()));
        }
        Ok(self.recipients.clone())
    }
}
