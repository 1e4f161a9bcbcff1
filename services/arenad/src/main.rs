//! arenad entry point.
//!
//! Initialises tracing, loads configuration from `ARENA_*` environment
//! variables, wires the orchestrator to its adapters and serves the HTTP API
//! until Ctrl-C.

mod routes;
mod state;

use anyhow::{Context, Result};
use arena_common::DaemonConfig;
use tracing_subscriber::EnvFilter;

use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("arenad starting");

    let config: DaemonConfig = envy::prefixed("ARENA_").from_env().context(
        "failed to load config from ARENA_* env vars \
         (ARENA_SSH_HOST and ARENA_SSH_USER are required)",
    )?;

    tracing::info!(
        listen_addr = %config.listen_addr,
        status_feed = %config.status_feed_url,
        ssh_host = %config.ssh_host,
        ports = %format!("{}..={}", config.port_range_start, config.port_range_end),
        valkey = config.valkey_url.is_some(),
        "configuration loaded",
    );

    let state = AppState::new(&config).await?;
    let orchestrator = state.orchestrator.clone();
    let router = routes::router(state);

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .context("failed to bind TCP listener")?;
    tracing::info!("arenad ready on http://{}", config.listen_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    orchestrator.shutdown();
    tracing::info!("arenad shut down");
    Ok(())
}

/// Wait for SIGINT (Ctrl-C) for graceful shutdown.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("received shutdown signal");
}
