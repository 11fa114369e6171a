//! Dreamlog Server
//!
//! HTTP backend for a dream journal: per-identity rate limiting actors,
//! rolling dialogue summaries and final interpretations.

use std::io;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use dreamlog_core::{HttpTextGenerator, Storage, SystemClock};
use dreamlog_server::{AppState, Cli, ServerConfig, build_router};

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false);

    if json {
        builder.json().init();
    } else {
        builder.with_ansi(false).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments first (before logging init, so --help/--version work cleanly)
    let cli = Cli::parse();
    let config = ServerConfig::from_env(cli).context("invalid configuration")?;

    init_logging(config.log_json);
    info!("Dreamlog Server v{} starting...", env!("CARGO_PKG_VERSION"));

    let storage = Arc::new(Storage::new(config.db_path.clone()).context("failed to open storage")?);
    info!("Storage initialized successfully");

    let generator = Arc::new(HttpTextGenerator::new(config.llm.clone()));
    let state = AppState::new(storage, generator, config.rate_limit, Arc::new(SystemClock));

    // Identities that went quiet before the restart still need their cleanup alarm
    match state.limiter.resume_alarms().await {
        Ok(count) => info!(count, "Rate limiter alarms resumed"),
        Err(e) => warn!("Could not resume rate limiter alarms: {}", e),
    }

    let addr = config.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Dreamlog listening on http://{}", addr);

    axum::serve(listener, build_router(state.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.limiter.shutdown().await;
    info!("Dreamlog Server shutting down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
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
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
