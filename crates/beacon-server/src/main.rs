//! # beacon-server
//!
//! HTTP server for the beacon proximity correlation system.
//!
//! This binary provides:
//! - REST API for region monitoring, sample ingestion and advertising
//! - OpenAPI documentation via Swagger UI
//! - Structured logging to file and stdout
//!
//! ## Running
//!
//! ```bash
//! # Development
//! cargo run --package beacon-server
//!
//! # Production
//! BEACON_ENV=production ./beacon-server
//! ```
//!
//! `BEACON_CONFIG` overrides the configuration path and `BEACON_BIND` the
//! listen address (default `0.0.0.0:3000`).

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use beacon_server::api::create_router;
use beacon_server::logging;
use beacon_server::state::AppState;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

const DEFAULT_BIND: &str = "0.0.0.0:3000";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init(logging::is_production())?;

    info!("Starting beacon-server");

    let config_path = std::env::var_os("BEACON_CONFIG")
        .map_or_else(beacon_core::default_config_path, PathBuf::from);
    let state = AppState::load(&config_path)
        .with_context(|| format!("loading configuration from {}", config_path.display()))?;
    info!(path = %config_path.display(), "Configuration loaded");

    let app = create_router(state.into_shared())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = std::env::var("BEACON_BIND")
        .unwrap_or_else(|_| DEFAULT_BIND.to_string())
        .parse()
        .context("BEACON_BIND must be a socket address")?;
    let listener = TcpListener::bind(addr).await?;

    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("beacon-server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
