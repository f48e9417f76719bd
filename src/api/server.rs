use axum::{
    routing::{get, post, put},
    Router,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    health, last_report, list_cooldowns, list_notifications, replace_products, run_health_check,
    AppState,
};
use crate::alerts::{AlertSettings, CooldownStore, HealthCheckOrchestrator, HealthCheckWorker};
use crate::persistence::CooldownSnapshotFile;
use crate::providers::{
    EmailSink, FallbackEmailSink, HttpEmailSink, InMemoryCatalog, InMemoryInbox, LogEmailSink,
    NotificationSink, ProductProvider, Recipient, RecipientProvider, RestBackend, StaticRecipients,
};

/// Hosted backend connection; absent url means in-process catalog and inbox
#[derive(Debug, Clone, Default)]
pub struct BackendConfig {
    pub url: Option<String>,
    pub api_key: Option<String>,
}

/// Email relay endpoints; no primary url means emails are only logged
#[derive(Debug, Clone, Default)]
pub struct EmailConfig {
    pub primary_url: Option<String>,
    pub fallback_url: Option<String>,
    pub api_key: Option<String>,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub settings: AlertSettings,
    pub backend: BackendConfig,
    pub email: EmailConfig,
    /// Recipients used when no backend is configured
    pub local_recipients: Vec<Recipient>,
    /// Where cooldown state is snapshotted between restarts
    pub state_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            settings: AlertSettings::default(),
            backend: BackendConfig::default(),
            email: EmailConfig::default(),
            local_recipients: Vec::new(),
            state_path: None,
        }
    }
}

/// Build the application router
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/health-check", post(run_health_check))
        .route("/health-check/last", get(last_report))
        .route("/cooldowns", get(list_cooldowns))
        .route("/products", put(replace_products))
        .route("/notifications", get(list_notifications))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

fn build_email_sink(config: &EmailConfig, timeout: Duration) -> Result<Arc<dyn EmailSink>, Box<dyn std::error::Error>> {
    let Some(primary_url) = &config.primary_url else {
        tracing::info!("No email relay configured, alert emails will be logged");
        return Ok(Arc::new(LogEmailSink));
    };

    let primary: Arc<dyn EmailSink> = Arc::new(HttpEmailSink::new(primary_url, config.api_key.clone(), timeout)?);
    match &config.fallback_url {
        Some(fallback_url) => {
            let fallback = HttpEmailSink::new(fallback_url, config.api_key.clone(), timeout)?;
            Ok(Arc::new(FallbackEmailSink::new(primary).with_fallback(Arc::new(fallback))))
        }
        None => Ok(primary),
    }
}

/// Wire providers, sinks and restored cooldown state into shared app state
pub fn build_state(config: &ServerConfig) -> Result<Arc<AppState>, Box<dyn std::error::Error>> {
    config.settings.validate()?;

    let (products, recipients, notifications, catalog, inbox): (
        Arc<dyn ProductProvider>,
        Arc<dyn RecipientProvider>,
        Arc<dyn NotificationSink>,
        Option<Arc<InMemoryCatalog>>,
        Option<Arc<InMemoryInbox>>,
    ) = match &config.backend.url {
        Some(url) => {
            tracing::info!("Using hosted backend at {}", url);
            let backend = Arc::new(RestBackend::new(
                url.clone(),
                config.backend.api_key.clone(),
                config.settings.sink_timeout,
            )?);
            let products: Arc<dyn ProductProvider> = backend.clone();
            let recipients: Arc<dyn RecipientProvider> = backend.clone();
            let notifications: Arc<dyn NotificationSink> = backend;
            (products, recipients, notifications, None, None)
        }
        None => {
            tracing::info!("No backend configured, using in-process catalog and inbox");
            let catalog = Arc::new(InMemoryCatalog::new());
            let inbox = Arc::new(InMemoryInbox::new());
            let products: Arc<dyn ProductProvider> = catalog.clone();
            let recipients: Arc<dyn RecipientProvider> =
                Arc::new(StaticRecipients::new(config.local_recipients.clone()));
            let notifications: Arc<dyn NotificationSink> = inbox.clone();
            (products, recipients, notifications, Some(catalog), Some(inbox))
        }
    };

    let cooldowns = Arc::new(CooldownStore::new(config.settings.cooldown.clone()));
    let email = build_email_sink(&config.email, config.settings.sink_timeout)?;

    let mut orchestrator =
        HealthCheckOrchestrator::new(config.settings.clone(), products, recipients, notifications)
            .with_email(email);

    if let Some(path) = &config.state_path {
        let file = CooldownSnapshotFile::new(path);
        let restored = file.restore_into(&cooldowns)?;
        tracing::info!("Restored {} cooldown records from {}", restored, path.display());
        orchestrator = orchestrator.with_state_file(file);
    }
    let orchestrator = orchestrator.with_cooldowns(cooldowns);

    Ok(Arc::new(AppState {
        orchestrator: Arc::new(orchestrator),
        catalog,
        inbox,
    }))
}

/// Run the HTTP server
pub async fn run_server(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let state = build_state(&config)?;

    // Start background worker
    let worker = Arc::new(HealthCheckWorker::new(
        Arc::clone(&state.orchestrator),
        config.settings.check_interval,
    ));
    let worker_handle = Arc::clone(&worker).start();

    // Build router
    let app = build_router(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!("Starting stockwatch server on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(Arc::clone(&worker)))
        .await?;

    worker_handle.abort();

    tracing::info!("stockwatch server stopped");
    Ok(())
}

async fn shutdown_signal(worker: Arc<HealthCheckWorker>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install CTRL+C signal handler: {}", e);
        std::future::pending::<()>().await;
    }

    tracing::info!("Shutdown signal received, stopping health check worker...");
    worker.stop();
}
