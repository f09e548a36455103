//! Tollgate Server - policy proxy daemon
//!
//! Listens for OpenAI-style API calls, applies the tenant's policy, and
//! forwards them to the configured LLM service.

use anyhow::Result;
use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

mod cli;
mod server_utils;

use cli::Cli;
use tollgate_core::modules::{config::load_config, logger::init_logger};
use tollgate_core::proxy::{build_proxy_router, spawn_sweeper, ConfigCache, Orchestrator};

/// Connect timeout for every outbound call (policy service and upstream).
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger(&cli.log_level, cli.log_format)?;

    let defaults = Arc::new(load_config(cli.config.as_deref())?);
    info!(
        "Tollgate {} starting (proxy_id={}, local_mode={})",
        env!("CARGO_PKG_VERSION"),
        defaults.proxy_id_label(),
        defaults.local_mode
    );

    let cache = Arc::new(ConfigCache::from_minutes(defaults.config_cache_minutes));
    let sweeper = spawn_sweeper(Arc::clone(&cache));

    let http = reqwest::Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;
    let orchestrator = Arc::new(Orchestrator::new(defaults, cache, http)?);

    let listener = server_utils::create_listener(&cli.host, cli.port).await?;
    axum::serve(listener, build_app(orchestrator))
        .with_graceful_shutdown(server_utils::shutdown_signal())
        .await?;

    sweeper.abort();
    info!("Server stopped");
    Ok(())
}

/// Health probes plus the catch-all proxy router.
fn build_app(orchestrator: Arc<Orchestrator>) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .merge(build_proxy_router(orchestrator))
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, axum::Json(serde_json::json!({"status": "ok"})))
}
