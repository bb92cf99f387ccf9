//! Route configuration and setup

use crate::handlers::{health, upload};
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use ladder_core::Config;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/upload", post(upload::upload_video))
        .route("/health/live", get(health::liveness_check))
        .route("/health/ready", get(health::readiness_check))
        // Replace axum's 2 MB default with the configured upload limit
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(config.max_upload_size_bytes()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
