//! Startup helpers for the EHR summarizer server.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;

use crate::config::AppConfig;
use crate::server::{self, AppState};
use crate::storage::SqliteEhrStore;

/// Run the server (used by the `ehr-summarizer` binary).
///
/// # Returns
/// `ExitCode::SUCCESS` on graceful shutdown, `1` on failure.
#[must_use]
pub fn run() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting EHR summarizer v{}", env!("CARGO_PKG_VERSION"));

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {e}");
            return ExitCode::from(1);
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    if let Err(e) = rt.block_on(serve(config)) {
        tracing::error!("Server error: {e:#}");
        return ExitCode::from(1);
    }

    tracing::info!("Server stopped");
    ExitCode::SUCCESS
}

/// Open storage, build state and serve until Ctrl-C.
///
/// # Errors
/// Returns an error if storage, state or the listener cannot be set up.
pub async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let state = initialize(config).await?;
    let port = state.config.server.port;

    server::run_server_with_shutdown(state, port, shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!(e))
        .context("HTTP server failed")
}

/// Initialize application state without starting the server.
///
/// # Errors
/// Returns an error if the database cannot be opened or state creation fails.
pub async fn initialize(config: AppConfig) -> anyhow::Result<Arc<AppState>> {
    if config.auth.uses_default_secret() {
        tracing::warn!("SECRET_KEY is not set; using the development signing key");
    }
    if config.summarizer.is_external_configured() {
        tracing::info!("External summarization enabled");
    } else {
        tracing::info!("External summarization not configured; using local fallback");
    }

    let store = SqliteEhrStore::open(&config.storage.database_path)
        .await
        .with_context(|| {
            format!(
                "failed to open database {}",
                config.storage.database_path.display()
            )
        })?;

    AppState::new(config, Arc::new(store))
        .map_err(|e| anyhow::anyhow!(e))
        .context("failed to create state")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
