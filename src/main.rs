//! stockwatch server
//!
//! Run with: cargo run
//!
//! Environment variables:
//! - STOCKWATCH_HOST: Bind address (default: 0.0.0.0)
//! - STOCKWATCH_PORT: Port number (default: 8080)
//! - STOCKWATCH_BACKEND_URL / STOCKWATCH_BACKEND_API_KEY: Hosted backend (default: in-process catalog)
//! - STOCKWATCH_LOCAL_RECIPIENTS: "id=email,id2" recipients when no backend is configured
//! - STOCKWATCH_EMAIL_PRIMARY_URL / STOCKWATCH_EMAIL_FALLBACK_URL / STOCKWATCH_EMAIL_API_KEY: Email relays
//! - STOCKWATCH_STATE_PATH: File used to keep cooldowns across restarts
//! - RUST_LOG: Log level (default: info)
//!
//! Alerting settings (intervals, thresholds, recipients) are read by
//! `AlertSettings::from_env`.

use std::path::PathBuf;

use stockwatch::alerts::AlertSettings;
use stockwatch::api::{run_server, BackendConfig, EmailConfig, ServerConfig};
use stockwatch::providers::Recipient;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse "id=email,id2" into recipients
fn parse_recipients(raw: &str) -> Vec<Recipient> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| match entry.split_once('=') {
            Some((id, address)) if !address.trim().is_empty() => {
                Recipient::new(id.trim()).with_address(address.trim())
            }
            Some((id, _)) => Recipient::new(id.trim()),
            None => Recipient::new(entry),
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stockwatch=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let host = std::env::var("STOCKWATCH_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("STOCKWATCH_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    let settings = AlertSettings::from_env()?;

    let config = ServerConfig {
        host,
        port,
        settings,
        backend: BackendConfig {
            url: non_empty_var("STOCKWATCH_BACKEND_URL"),
            api_key: non_empty_var("STOCKWATCH_BACKEND_API_KEY"),
        },
        email: EmailConfig {
            primary_url: non_empty_var("STOCKWATCH_EMAIL_PRIMARY_URL"),
            fallback_url: non_empty_var("STOCKWATCH_EMAIL_FALLBACK_URL"),
            api_key: non_empty_var("STOCKWATCH_EMAIL_API_KEY"),
        },
        local_recipients: non_empty_var("STOCKWATCH_LOCAL_RECIPIENTS")
            .map(|raw| parse_recipients(&raw))
            .unwrap_or_default(),
        state_path: non_empty_var("STOCKWATCH_STATE_PATH").map(PathBuf::from),
    };

    tracing::info!("stockwatch configuration:");
    tracing::info!("  Host: {}:{}", config.host, config.port);
    tracing::info!(
        "  Check interval: {} seconds (minimum spacing {} seconds)",
        config.settings.check_interval.as_secs(),
        config.settings.min_interval.as_secs()
    );
    tracing::info!(
        "  Alerts enabled: {}, email enabled: {}",
        config.settings.alerts_enabled,
        config.settings.email_enabled
    );
    tracing::info!(
        "  Backend: {}",
        config.backend.url.as_deref().unwrap_or("in-process")
    );
    if let Some(path) = &config.state_path {
        tracing::info!("  Cooldown state: {}", path.display());
    }

    run_server(config).await
}
