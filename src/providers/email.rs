//! Email delivery sinks

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{DeliveryError, EmailMessage, EmailSink};

/// Sends email by posting JSON to an HTTP email relay
#[derive(Debug, Clone)]
pub struct HttpEmailSink {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl HttpEmailSink {
    pub fn new(
        url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DeliveryError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.into(),
            api_key,
        })
    }
}

#[async_trait]
impl EmailSink for HttpEmailSink {
    async fn send_email(&self, message: EmailMessage) -> Result<(), DeliveryError> {
        let mut request = self.client.post(&self.url).json(&message);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DeliveryError::Rejected(response.status().as_u16()));
        }

        tracing::debug!(to = %message.to, url = %self.url, "Email accepted by relay");
        Ok(())
    }
}

/// Tries each sink in order until one accepts the message
#[derive(Clone)]
pub struct FallbackEmailSink {
    sinks: Vec<Arc<dyn EmailSink>>,
}

impl FallbackEmailSink {
    pub fn new(primary: Arc<dyn EmailSink>) -> Self {
        Self {
            sinks: vec![primary],
        }
    }

    /// Add a sink tried after every earlier one failed
    pub fn with_fallback(mut self, sink: Arc<dyn EmailSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

#[async_trait]
impl EmailSink for FallbackEmailSink {
    async fn send_email(&self, message: EmailMessage) -> Result<(), DeliveryError> {
        let mut errors = Vec::new();

        for (idx, sink) in self.sinks.iter().enumerate() {
            match sink.send_email(message.clone()).await {
                Ok(()) => {
                    if idx > 0 {
                        tracing::info!(to = %message.to, provider = idx, "Email sent via fallback provider");
                    }
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(to = %message.to, provider = idx, error = %e, "Email provider failed");
                    errors.push(e);
                }
            }
        }

        Err(DeliveryError::Exhausted(errors))
    }
}

/// Writes emails to the log instead of sending them
#[derive(Debug, Clone, Default)]
pub struct LogEmailSink;

#[async_trait]
impl EmailSink for LogEmailSink {
    async fn send_email(&self, message: EmailMessage) -> Result<(), DeliveryError> {
        tracing::info!(to = %message.to, subject = %message.subject, "Email notification: {}", message.text);
        Ok(())
    }
}
