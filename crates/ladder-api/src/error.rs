//! HTTP error response conversion
//!
//! Handlers return `Result<_, HttpPipelineError>` for failures that happen
//! before a run exists (malformed multipart bodies, missing file field).
//! Failures inside a run are reported through the run result instead.

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ladder_core::{ErrorMetadata, LogLevel, PipelineError};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Machine-readable error code for programmatic handling
    pub code: String,
    /// Whether this error is recoverable (can be retried)
    pub recoverable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
}

/// Wrapper so `PipelineError` (from ladder-core) can implement `IntoResponse`.
#[derive(Debug)]
pub struct HttpPipelineError(pub PipelineError);

impl From<PipelineError> for HttpPipelineError {
    fn from(err: PipelineError) -> Self {
        HttpPipelineError(err)
    }
}

impl From<MultipartError> for HttpPipelineError {
    fn from(err: MultipartError) -> Self {
        HttpPipelineError(PipelineError::Input(format!(
            "Invalid multipart body: {}",
            err.body_text()
        )))
    }
}

fn log_error(error: &PipelineError) {
    let kind = error.kind();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, kind = kind, "Request rejected");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, kind = kind, "Request failed");
        }
        LogLevel::Error => {
            tracing::error!(error = %error, kind = kind, "Request failed");
        }
    }
}

fn is_production_env() -> bool {
    std::env::var("ENVIRONMENT")
        .or_else(|_| std::env::var("APP_ENV"))
        .map(|env| env.to_lowercase() == "production" || env.to_lowercase() == "prod")
        .unwrap_or(false)
}

impl IntoResponse for HttpPipelineError {
    fn into_response(self) -> Response {
        let err = &self.0;
        let status =
            StatusCode::from_u16(err.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        log_error(err);

        // Production hides details for everything but input errors.
        let show_details = !is_production_env() || err.is_input_error();
        let body = ErrorResponse {
            error: err.client_message(),
            details: show_details.then(|| err.to_string()),
            error_type: show_details.then(|| err.kind().to_string()),
            code: err.error_code().to_string(),
            recoverable: err.is_recoverable(),
            suggested_action: err.suggested_action().map(String::from),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_input_error_renders_bad_request() {
        let response =
            HttpPipelineError(PipelineError::Input("No file uploaded".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "No file uploaded");
        assert_eq!(body["code"], "INVALID_INPUT");
    }

    #[test]
    fn test_cancelled_renders_server_error() {
        let response = HttpPipelineError(PipelineError::Cancelled).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
