//! Hosted relational backend exposed through a PostgREST-style HTTP API

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{
    NewNotification, NotificationSink, PersistError, ProductProvider, ProviderError, Recipient,
    RecipientProvider,
};
use crate::inventory::ProductSnapshot;

/// Rows requested per page; hosted deployments cap responses at 1000
const DEFAULT_PAGE_SIZE: usize = 1000;

/// Client for the hosted backend's REST endpoints
#[derive(Debug, Clone)]
pub struct RestBackend {
    http_client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    page_size: usize,
}

/// Row shape of the `products` table
#[derive(Debug, Deserialize)]
struct ProductRow {
    id: RowId,
    name: String,
    #[serde(default)]
    stock_quantity: Option<i64>,
    #[serde(default)]
    reorder_level: Option<i64>,
}

/// Row shape of the alert recipient view
#[derive(Debug, Deserialize)]
struct RecipientRow {
    id: RowId,
    #[serde(default)]
    email: Option<String>,
}

/// Primary keys may be integers or uuids depending on the table
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RowId {
    Int(i64),
    Text(String),
}

impl RowId {
    fn into_string(self) -> String {
        match self {
            RowId::Int(i) => i.to_string(),
            RowId::Text(s) => s,
        }
    }
}

/// Row inserted into the `notifications` table
#[derive(Debug, Serialize)]
struct NotificationRow<'a> {
    user_id: &'a str,
    product_id: &'a str,
    severity: &'a str,
    title: &'a str,
    message: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
}

impl From<ProductRow> for ProductSnapshot {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id.into_string(),
            display_name: row.name,
            stock_quantity: row.stock_quantity.unwrap_or(0).max(0) as u64,
            reorder_level: row.reorder_level.map(|l| l.max(0) as u64),
        }
    }
}

impl RestBackend {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Unavailable(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    /// Rows requested per page on bulk reads
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request
                .header("apikey", key)
                .header("Authorization", format!("Bearer {}", key)),
            None => request,
        }
    }

    /// Read every row behind `path`, one `Range` page at a time.
    /// A page shorter than requested ends the scan.
    async fn fetch_rows<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Vec<T>, ProviderError> {
        let mut rows = Vec::new();
        loop {
            let start = rows.len();
            let end = start + self.page_size - 1;
            let response = self
                .authorize(self.http_client.get(self.url(path)))
                .header("Range-Unit", "items")
                .header("Range", format!("{}-{}", start, end))
                .send()
                .await
                .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

            // 416 means the offset is past the last row
            if response.status() == reqwest::StatusCode::RANGE_NOT_SATISFIABLE {
                break;
            }
            if !response.status().is_success() {
                return Err(ProviderError::Unavailable(format!(
                    "{} returned status {}",
                    path,
                    response.status()
                )));
            }

            let page: Vec<T> = response
                .json()
                .await
                .map_err(|e| ProviderError::Decode(e.to_string()))?;
            let fetched = page.len();
            rows.extend(page);

            if fetched < self.page_size {
                break;
            }
        }

        tracing::debug!(path = %path, rows = rows.len(), "Fetched backend rows");
        Ok(rows)
    }
}

#[async_trait]
impl ProductProvider for RestBackend {
    async fn list_active_products(&self) -> Result<Vec<ProductSnapshot>, ProviderError> {
        let rows: Vec<ProductRow> = self
            .fetch_rows("products?select=id,name,stock_quantity,reorder_level&is_active=eq.true&order=id.asc")
            .await?;
        Ok(rows.into_iter().map(ProductSnapshot::from).collect())
    }
}

#[async_trait]
impl RecipientProvider for RestBackend {
    async fn list_alert_recipients(&self) -> Result<Vec<Recipient>, ProviderError> {
        let rows: Vec<RecipientRow> = self
            .fetch_rows("profiles?select=id,email&stock_alerts=eq.true&order=id.asc")
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| Recipient {
                id: row.id.into_string(),
                address: row.email.filter(|e| !e.trim().is_empty()),
            })
            .collect())
    }
}

#[async_trait]
impl NotificationSink for RestBackend {
    async fn create_notification(&self, notification: NewNotification) -> Result<(), PersistError> {
        let row = NotificationRow {
            user_id: &notification.recipient_id,
            product_id: &notification.product_id,
            severity: notification.tier.as_str(),
            title: &notification.title,
            message: &notification.message,
            kind: "inventory_alert",
        };

        let response = self
            .authorize(self.http_client.post(self.url("notifications")))
            .header("Prefer", "return=minimal")
            .json(&row)
            .send()
            .await
            .map_err(|e| PersistError::Backend(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PersistError::Backend(format!(
                "notifications insert returned status {}: {}",
                status, body
            )));
        }

        Ok(())
    }
}
