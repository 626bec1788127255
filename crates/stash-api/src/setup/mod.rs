//! Application setup and initialization

pub mod database;
pub mod routes;
pub mod server;
pub mod services;
pub mod storage;

use crate::state::AppState;
use anyhow::Result;
use stash_core::{Clock, Config, SystemClock};
use std::sync::Arc;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    crate::telemetry::init_telemetry(config.log_format)?;

    tracing::info!(
        data_root = %config.data_root().display(),
        environment = %config.environment,
        "Configuration loaded and validated successfully"
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let state = services::initialize_services(&config, clock).await?;

    let router = routes::setup_routes(&config, state.clone())?;

    Ok((state, router))
}
