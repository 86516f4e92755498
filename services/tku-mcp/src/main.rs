//! TKU MCP tool server
//!
//! Single-binary Rust service that:
//! 1. Loads portal settings and student credentials
//! 2. Speaks MCP (JSON-RPC 2.0) over stdin/stdout
//! 3. Logs in to TronClass through the TKU SSO gateway for every tool call
//! 4. Optionally serves /health and /metrics on a TCP listener

mod config;
mod error;
mod mcp;
mod metrics;
mod status;
mod tools;

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, DEFAULT_CONFIG_PATH};
use crate::metrics::ServiceMetrics;
use crate::status::StatusState;
use crate::tools::ToolContext;

#[tokio::main]
async fn main() -> Result<()> {
    // JSON logs on stderr; stdout carries the protocol
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "starting tku-mcp");

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config = match Config::resolve_path(cli_config_path) {
        Some(path) => {
            info!(path = %path.display(), "loading configuration");
            Config::load(&path)
                .with_context(|| format!("failed to load config from {}", path.display()))?
        }
        None => Config::load_optional(Path::new(DEFAULT_CONFIG_PATH))
            .with_context(|| format!("failed to load config from {DEFAULT_CONFIG_PATH}"))?,
    };

    info!(
        portal_url = %config.portal.portal_url,
        sso_url = %config.portal.sso_url,
        timeout_secs = config.portal.timeout_secs,
        verify_login = config.portal.verify_login,
        download_dir = %config.transfer.download_dir.display(),
        credentials = config.credentials.resolved.is_some(),
        "configuration loaded"
    );
    if config.credentials.resolved.is_none() {
        warn!("no credentials configured; every tool call will report a config error");
    }

    let service_metrics = ServiceMetrics::new();
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let status_task = match config.status.listen_addr {
        Some(addr) => {
            // Install Prometheus metrics recorder before any metrics are emitted
            let prometheus = metrics::install_recorder()
                .context("failed to install Prometheus recorder")?;
            let listener = TcpListener::bind(addr)
                .await
                .with_context(|| format!("failed to bind status listener to {addr}"))?;
            let app = status::router(StatusState {
                metrics: service_metrics.clone(),
                prometheus,
            });
            info!(%addr, "status listener running");
            Some(tokio::spawn(async move {
                axum::serve(listener, app)
                    .with_graceful_shutdown(async {
                        let _ = shutdown_rx.await;
                    })
                    .await
            }))
        }
        None => None,
    };

    let ctx = Arc::new(ToolContext::from_config(&config, service_metrics));

    tokio::select! {
        result = mcp::serve(tokio::io::stdin(), tokio::io::stdout(), ctx) => {
            result.context("stdio transport failed")?;
            info!("stdin closed, shutting down");
        }
        _ = shutdown_signal() => {}
    }

    let _ = shutdown_tx.send(());
    if let Some(task) = status_task {
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "status listener error during shutdown"),
            Err(e) => error!(error = %e, "status listener task panicked"),
        }
    }

    info!("shutdown complete");
    Ok(())
}

/// Wait for SIGTERM or SIGINT.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
