//! Transcode Engine Adapter: drives the external ffmpeg binary.

pub mod args;
pub mod runner;

pub use runner::{CommandOutput, CommandRunner, ProcessRunner};

use std::sync::Arc;

use anyhow::{anyhow, Result};
use ladder_core::models::{RenditionSpec, RenditionTarget};
use ladder_core::PipelineError;

use crate::scratch::{ScratchFile, ScratchRun};

/// Longest diagnostics excerpt written to the log; the error keeps everything.
const LOGGED_DIAGNOSTICS_BYTES: usize = 4096;

fn validate_engine_path(path: &str) -> Result<()> {
    let dangerous_chars = [';', '|', '&', '$', '`', '(', ')', '<', '>', '\n', '\r'];
    if path.is_empty() || path.chars().any(|c| dangerous_chars.contains(&c)) {
        return Err(anyhow!("Invalid ffmpeg_path: contains dangerous characters: {}", path));
    }

    if path.contains("..") {
        return Err(anyhow!("Invalid ffmpeg_path: contains directory traversal: {}", path));
    }

    Ok(())
}

/// Trailing part of the diagnostics, cut on a char boundary.
pub fn diagnostics_tail(diagnostics: &str) -> &str {
    if diagnostics.len() <= LOGGED_DIAGNOSTICS_BYTES {
        return diagnostics;
    }
    let mut start = diagnostics.len() - LOGGED_DIAGNOSTICS_BYTES;
    while !diagnostics.is_char_boundary(start) {
        start += 1;
    }
    &diagnostics[start..]
}

#[derive(Clone)]
pub struct Transcoder {
    ffmpeg_path: String,
    runner: Arc<dyn CommandRunner>,
}

impl Transcoder {
    pub fn new(ffmpeg_path: impl Into<String>, runner: Arc<dyn CommandRunner>) -> Result<Self> {
        let ffmpeg_path = ffmpeg_path.into();
        validate_engine_path(&ffmpeg_path)?;
        Ok(Self { ffmpeg_path, runner })
    }

    /// Transcoder backed by a real ffmpeg process.
    pub fn ffmpeg(ffmpeg_path: impl Into<String>) -> Result<Self> {
        Self::new(ffmpeg_path, Arc::new(ProcessRunner))
    }

    pub fn ffmpeg_path(&self) -> &str {
        &self.ffmpeg_path
    }

    /// Produce the artifact for `spec` from `source` inside the run's scratch
    /// space. One engine invocation per target; never retried.
    #[tracing::instrument(skip(self, run, source, spec), fields(run_id = %run.run_id(), rendition = %spec.label()))]
    pub async fn transcode(
        &self,
        run: &ScratchRun,
        source: &ScratchFile,
        spec: &RenditionSpec,
        safe_name: &str,
    ) -> Result<ScratchFile, PipelineError> {
        let output = run.allocate(spec.scratch_role(), &spec.artifact_name(safe_name)).await?;

        let (args, expected) = match &spec.target {
            RenditionTarget::FixedResolution { height } => (
                args::fixed_rendition_args(source.path(), output.path(), *height),
                output.path().to_path_buf(),
            ),
            RenditionTarget::AdaptivePackage(profile) => (
                args::adaptive_package_args(source.path(), output.path(), profile),
                output.path().join(profile.protocol.manifest_name()),
            ),
        };

        let start = std::time::Instant::now();
        tracing::info!(args = ?args, "Starting transcode");

        let result = self
            .runner
            .run(&self.ffmpeg_path, &args)
            .await
            .map_err(|e| PipelineError::TranscodeFailure {
                target: spec.label(),
                exit_code: None,
                diagnostics: format!("Failed to execute {}: {}", self.ffmpeg_path, e),
            })?;

        if !result.success {
            let diagnostics = result.diagnostics();
            tracing::error!(
                exit_code = ?result.exit_code,
                diagnostics = %diagnostics_tail(&diagnostics),
                "Transcode failed"
            );
            return Err(PipelineError::TranscodeFailure {
                target: spec.label(),
                exit_code: result.exit_code,
                diagnostics,
            });
        }

        if !tokio::fs::try_exists(&expected).await.unwrap_or(false) {
            return Err(PipelineError::TranscodeFailure {
                target: spec.label(),
                exit_code: result.exit_code,
                diagnostics: format!(
                    "engine exited successfully but did not produce {}\n{}",
                    expected.display(),
                    result.diagnostics()
                ),
            });
        }

        tracing::info!(
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Transcode finished"
        );

        Ok(output)
    }
}
