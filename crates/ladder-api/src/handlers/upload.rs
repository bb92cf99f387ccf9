//! Upload endpoint: one multipart file in, one pipeline run out.

use crate::error::HttpPipelineError;
use crate::state::AppState;
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use futures::TryStreamExt;
use ladder_core::models::{RunResult, UploadRequest};
use ladder_core::PipelineError;
use std::io;
use std::sync::Arc;
use tokio_util::io::StreamReader;

/// Form field carrying the video.
pub const FILE_FIELD: &str = "file";

/// `POST /api/upload`
///
/// Streams the `file` field straight into the pipeline without buffering it
/// in memory. The run result is returned as-is: 200 when every target was
/// published, 400 for rejected input, 500 otherwise.
///
/// Dropping this future (client disconnect) drops the run, which kills the
/// engine and removes the run's scratch space.
#[tracing::instrument(skip(state, multipart))]
pub async fn upload_video(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Response, HttpPipelineError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let Some(file_name) = field.file_name().map(str::to_string) else {
            return Err(PipelineError::Input("Invalid file format".to_string()).into());
        };
        let content_type = field.content_type().map(str::to_string);

        tracing::info!(
            file_name = %file_name,
            content_type = ?content_type,
            "Receiving upload"
        );

        let body = StreamReader::new(Box::pin(field.map_err(io::Error::other)));
        let mut request = UploadRequest::new(file_name, Box::pin(body));
        if let Some(content_type) = content_type {
            request = request.with_content_type(content_type);
        }

        let result = state.pipeline.submit(request).await;
        return Ok((status_for(&result), Json(result)).into_response());
    }

    Err(PipelineError::Input("No file uploaded".to_string()).into())
}

fn status_for(result: &RunResult) -> StatusCode {
    if result.is_completed() {
        return StatusCode::OK;
    }
    match result.error.as_ref() {
        Some(error) if error.kind == "InputError" => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
