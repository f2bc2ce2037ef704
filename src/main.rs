// ============================================================================
// Mailhook Server
// ============================================================================
//
// Receives mail change notifications, answers subscription validation
// handshakes and appends one workbook row per new message.
//
// Endpoints:
// - GET/POST {WEBHOOK_PATH} - handshake and notification batches
// - GET /health
// - GET /metrics
//
// ============================================================================

use anyhow::{Context, Result};
use mailhook_config::Config;
use mailhook_server::context::AppContext;
use mailhook_server::routes::create_router;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Arc::new(Config::from_env()?);

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.rust_log.clone()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("=== Mailhook Server Starting ===");
    info!("Webhook path: {}", config.webhook_path);
    config.warn_missing();

    let context = Arc::new(
        AppContext::from_config(config.clone()).context("Failed to build application context")?,
    );
    let app = create_router(context);

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address))?;
    info!("Listening on {}", config.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Mailhook server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    info!("Shutdown signal received");
}
