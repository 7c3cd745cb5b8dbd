//! Application setup and initialization.

pub mod database;
pub mod routes;
pub mod server;
pub mod services;

use std::sync::Arc;

use anyhow::Result;

use granite_core::Config;

use crate::state::AppState;

/// Initialize telemetry, the database, the service graph, and the router.
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    crate::telemetry::init_telemetry();
    tracing::info!(environment = %config.server.environment(), "Configuration loaded");

    let pool = database::setup_database(&config).await?;
    let state = services::initialize_services(&config, pool)?;
    let router = routes::setup_routes(state.clone());

    Ok((state, router))
}
