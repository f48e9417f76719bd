use axum::{body::Bytes, extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::alerts::{CooldownRecord, HealthCheckOrchestrator, HealthCheckReport};
use crate::inventory::ProductSnapshot;
use crate::providers::{InMemoryCatalog, InMemoryInbox, NewNotification};

/// Application state shared across handlers
pub struct AppState {
    pub orchestrator: Arc<HealthCheckOrchestrator>,
    /// Present when products are managed in-process rather than by the backend
    pub catalog: Option<Arc<InMemoryCatalog>>,
    /// Present when notifications are kept in-process
    pub inbox: Option<Arc<InMemoryInbox>>,
}

// ============================================================================
// Health Check
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============================================================================
// Inventory Health Checks
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct RunRequest {
    #[serde(default)]
    pub force: bool,
}

/// An empty body is an unforced run; anything else must be a valid `RunRequest`
fn parse_run_request(body: &[u8]) -> Result<RunRequest, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(RunRequest::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid health check request: {}", e)))
}

pub async fn run_health_check(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<(StatusCode, Json<HealthCheckReport>), ApiError> {
    let request = parse_run_request(&body)?;
    let report = state.orchestrator.run_health_check(request.force).await;

    let status = if report.is_success() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    Ok((status, Json(report)))
}

pub async fn last_report(
    State(state): State<Arc<AppState>>,
) -> Result<Json<HealthCheckReport>, ApiError> {
    state
        .orchestrator
        .last_report()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("No health check has run yet".to_string()))
}

#[derive(Serialize)]
pub struct CooldownsResponse {
    pub count: usize,
    pub records: Vec<CooldownRecord>,
}

pub async fn list_cooldowns(State(state): State<Arc<AppState>>) -> Json<CooldownsResponse> {
    let records = state.orchestrator.cooldowns().records();
    Json(CooldownsResponse {
        count: records.len(),
        records,
    })
}

// ============================================================================
// Local Catalog and Inbox
// ============================================================================

#[derive(Serialize)]
pub struct ReplaceProductsResponse {
    pub products: usize,
}

pub async fn replace_products(
    State(state): State<Arc<AppState>>,
    Json(products): Json<Vec<ProductSnapshot>>,
) -> Result<Json<ReplaceProductsResponse>, ApiError> {
    let catalog = state
        .catalog
        .as_ref()
        .ok_or_else(|| ApiError::BadRequest("Products are managed by the backend".to_string()))?;

    Ok(Json(ReplaceProductsResponse {
        products: catalog.replace(products),
    }))
}

#[derive(Serialize)]
pub struct NotificationsResponse {
    pub count: usize,
    pub notifications: Vec<NewNotification>,
}

pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
) -> Result<Json<NotificationsResponse>, ApiError> {
    let inbox = state
        .inbox
        .as_ref()
        .ok_or_else(|| ApiError::NotFound("Notifications are stored by the backend".to_string()))?;

    let notifications = inbox.list();
    Ok(Json(NotificationsResponse {
        count: notifications.len(),
        notifications,
    }))
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
