//! Error types module
//!
//! Every failure a pipeline run can report is a [`PipelineError`]. The variant
//! determines the stable `kind` string surfaced to callers and, through
//! [`ErrorMetadata`], how the boundary layer renders it.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like rejected input
    Debug,
    /// Warning level - for recoverable issues
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "TRANSCODE_FAILURE")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Invalid input: {0}")]
    Input(String),

    #[error("Failed to allocate scratch space for {role}: {source}")]
    ScratchAllocation {
        role: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write scratch file {}: {message}", .path.display())]
    ScratchWrite { path: PathBuf, message: String },

    #[error("Transcode failed for {target} ({})", describe_exit(.exit_code))]
    TranscodeFailure {
        target: String,
        exit_code: Option<i32>,
        diagnostics: String,
    },

    #[error("Publish failed for key {key}: {cause}")]
    Publish { key: String, cause: String },

    #[error("Run timed out after {0:?}")]
    Timeout(Duration),

    #[error("Run cancelled")]
    Cancelled,

    #[error("Failed to clean up {}: {message}", .path.display())]
    Cleanup { path: PathBuf, message: String },
}

fn describe_exit(exit_code: &Option<i32>) -> String {
    match exit_code {
        Some(code) => format!("exit code {}", code),
        None => "terminated without exit code".to_string(),
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, suggested_action, log_level).
fn pipeline_error_static_metadata(
    err: &PipelineError,
) -> (u16, &'static str, bool, Option<&'static str>, LogLevel) {
    match err {
        PipelineError::Input(_) => (
            400,
            "INVALID_INPUT",
            false,
            Some("Send the video as the 'file' field of a multipart form"),
            LogLevel::Debug,
        ),
        PipelineError::ScratchAllocation { .. } => (
            500,
            "SCRATCH_ALLOCATION_ERROR",
            true,
            Some("Retry after a short delay"),
            LogLevel::Error,
        ),
        PipelineError::ScratchWrite { .. } => (
            500,
            "SCRATCH_WRITE_ERROR",
            true,
            Some("Retry the upload"),
            LogLevel::Error,
        ),
        PipelineError::TranscodeFailure { .. } => (
            500,
            "TRANSCODE_FAILURE",
            false,
            Some("Check that the file is a playable video"),
            LogLevel::Error,
        ),
        PipelineError::Publish { .. } => (
            500,
            "PUBLISH_ERROR",
            true,
            Some("Retry after a short delay"),
            LogLevel::Error,
        ),
        PipelineError::Timeout(_) => (
            500,
            "TIMEOUT",
            true,
            Some("Retry with a shorter video"),
            LogLevel::Warn,
        ),
        PipelineError::Cancelled => (500, "CANCELLED", true, None, LogLevel::Warn),
        PipelineError::Cleanup { .. } => (500, "CLEANUP_ERROR", true, None, LogLevel::Warn),
    }
}

impl PipelineError {
    /// Stable kind name reported to callers in `RunResult.error.kind`.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Input(_) => "InputError",
            PipelineError::ScratchAllocation { .. } => "ScratchAllocationError",
            PipelineError::ScratchWrite { .. } => "ScratchWriteError",
            PipelineError::TranscodeFailure { .. } => "TranscodeFailure",
            PipelineError::Publish { .. } => "PublishError",
            PipelineError::Timeout(_) => "TimeoutError",
            PipelineError::Cancelled => "CancelledError",
            PipelineError::Cleanup { .. } => "CleanupError",
        }
    }

    pub fn is_input_error(&self) -> bool {
        matches!(self, PipelineError::Input(_))
    }

    /// Captured subprocess output, if this error carries any.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            PipelineError::TranscodeFailure { diagnostics, .. } => Some(diagnostics),
            _ => None,
        }
    }
}

impl ErrorMetadata for PipelineError {
    fn http_status_code(&self) -> u16 {
        pipeline_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        pipeline_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        pipeline_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        pipeline_error_static_metadata(self).3
    }

    fn log_level(&self) -> LogLevel {
        pipeline_error_static_metadata(self).4
    }

    fn client_message(&self) -> String {
        match self {
            PipelineError::Input(ref msg) => msg.clone(),
            PipelineError::ScratchAllocation { .. } | PipelineError::ScratchWrite { .. } => {
                "Failed to store the uploaded file for processing".to_string()
            }
            PipelineError::TranscodeFailure { ref target, .. } => {
                format!("Failed to transcode {}", target)
            }
            PipelineError::Publish { ref key, .. } => format!("Failed to publish {}", key),
            PipelineError::Timeout(_) => "Processing timed out".to_string(),
            PipelineError::Cancelled => "Processing was cancelled".to_string(),
            PipelineError::Cleanup { .. } => "Internal server error".to_string(),
        }
    }
}
