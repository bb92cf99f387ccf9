//! Application setup and initialization

pub mod routes;
pub mod server;

use crate::state::AppState;
use anyhow::{Context, Result};
use ladder_core::Config;
use ladder_processing::Pipeline;
use std::sync::Arc;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    // Fail fast on misconfiguration
    config.validate().context("Configuration validation failed")?;

    crate::telemetry::init_telemetry(config.environment())
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    tracing::info!("Configuration loaded and validated successfully");

    let storage = ladder_storage::create_storage(&config)
        .await
        .context("Failed to initialize storage")?;

    let pipeline = Pipeline::from_config(&config, storage)?;
    tracing::info!(
        targets = pipeline.planner().target_count(),
        ffmpeg_path = %config.ffmpeg_path(),
        scratch_root = %config.scratch_root().display(),
        "Pipeline ready"
    );

    let state = Arc::new(AppState::new(config.clone(), pipeline));
    let router = routes::setup_routes(&config, state.clone());

    Ok((state, router))
}
