//! Health check handlers.

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;
use std::time::Duration;

const CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Key looked up on the object store; absence is the expected answer.
const HEALTH_CHECK_KEY: &str = "health-check-non-existent-key";

/// Liveness probe - process is running.
pub async fn liveness_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "alive" })),
    )
}

/// Readiness probe - object store reachable and scratch root writable.
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let storage = state.pipeline.storage();
    let mut response = serde_json::json!({
        "status": "ready",
        "storage": "unknown",
        "storageBackend": storage.backend_type().to_string(),
        "scratch": "unknown",
    });
    let mut ready = true;

    match tokio::time::timeout(CHECK_TIMEOUT, storage.exists(HEALTH_CHECK_KEY)).await {
        Ok(Ok(_)) => response["storage"] = serde_json::json!("ready"),
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Storage readiness check failed");
            response["storage"] = serde_json::json!(format!("not_ready: {}", e));
            ready = false;
        }
        Err(_) => {
            tracing::error!("Storage readiness check timed out");
            response["storage"] = serde_json::json!("timeout");
            ready = false;
        }
    }

    let scratch_root = state.config.scratch_root().clone();
    let scratch = tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        std::fs::create_dir_all(&scratch_root)?;
        // Dropped immediately; the OS removes it.
        tempfile::tempfile_in(&scratch_root).map(drop)
    })
    .await
    .unwrap_or_else(|e| Err(std::io::Error::other(e)));

    match scratch {
        Ok(()) => response["scratch"] = serde_json::json!("ready"),
        Err(e) => {
            tracing::error!(error = %e, "Scratch root is not writable");
            response["scratch"] = serde_json::json!(format!("not_ready: {}", e));
            ready = false;
        }
    }

    if !ready {
        response["status"] = serde_json::json!("not_ready");
    }

    let status_code = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(response))
}
