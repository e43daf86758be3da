//! Clinical data ingestion HTTP server.
//!
//! # Usage
//!
//! ```bash
//! RUST_LOG=debug PORT=8000 cargo run --bin clinical-ingest-server
//! ```
//!
//! # Environment Variables
//!
//! See [`clinical_data_ingest::config::ServerConfig::from_env`]; `RUST_LOG` sets the log filter
//! (default: info).

use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use clinical_data_ingest::config::ServerConfig;
use clinical_data_ingest::http::{AppState, create_router};
use clinical_data_ingest::ingestion::{CommandBridge, DecoderRegistry, IngestionService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let config = ServerConfig::from_env().context("reading configuration")?;
    info!(?config, "starting clinical ingestion server");

    let bridge = Arc::new(CommandBridge::rscript_at(config.sas_bridge_program.clone()));
    let registry = DecoderRegistry::with_defaults(bridge);
    let service = IngestionService::new(registry, config.limits);
    let state = AppState::new(service).with_sensor_interval(config.sensor_interval);
    let app = create_router(state);

    let addr = config.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
