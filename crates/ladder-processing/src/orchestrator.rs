//! Pipeline Orchestrator: one upload in, every rendition and package out.
//!
//! Transcoding runs strictly in plan order. Finished artifacts are handed to
//! a single publisher lane through a bounded queue, so publishing target `i`
//! overlaps with transcoding target `i + 1`. The first fatal error wins:
//!
//! - a transcode failure stops further transcodes; artifacts already queued
//!   are still published;
//! - a publish failure stops everything: the in-flight transcode is killed
//!   and queued artifacts are released unpublished;
//! - timeout and cancellation drop both lanes at once.
//!
//! Whatever happens, the run's scratch root is removed before the result is
//! returned.

use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use ladder_core::constants::{DEFAULT_ROLLBACK_TIMEOUT_SECS, DEFAULT_RUN_TIMEOUT_SECS};
use ladder_core::models::{
    PipelineRun, RenditionSpec, RunResult, RunState, ScratchRole, TargetOutcome, UploadRequest,
};
use ladder_core::validation::sanitize_file_name;
use ladder_core::{Config, PipelineError};
use ladder_storage::Storage;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::planner::RenditionPlanner;
use crate::publisher::Publisher;
use crate::scratch::{ScratchFile, ScratchRun, ScratchStore};
use crate::transcode::Transcoder;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOptions {
    /// `None` disables the per-run timeout.
    pub run_timeout: Option<Duration>,
    /// Transcoded artifacts allowed to wait for the publisher.
    pub publish_queue_depth: usize,
    /// Insert the run ID into every destination key.
    pub scope_keys_by_run: bool,
    /// Delete already published keys when a run fails.
    pub rollback_on_failure: bool,
    /// Upper bound on the rollback, which starts after scratch cleanup.
    pub rollback_timeout: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            run_timeout: Some(Duration::from_secs(DEFAULT_RUN_TIMEOUT_SECS)),
            publish_queue_depth: 1,
            scope_keys_by_run: false,
            rollback_on_failure: false,
            rollback_timeout: Duration::from_secs(DEFAULT_ROLLBACK_TIMEOUT_SECS),
        }
    }
}

impl PipelineOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            run_timeout: config.run_timeout(),
            publish_queue_depth: config.publish_queue_depth(),
            scope_keys_by_run: config.scope_keys_by_run(),
            rollback_on_failure: config.rollback_on_failure(),
            ..Self::default()
        }
    }
}

/// A transcoded artifact waiting for the publisher.
struct Transcoded {
    index: usize,
    artifact: ScratchFile,
}

/// Shared state of one run while both lanes are active.
struct RunContext<'a> {
    run: Mutex<PipelineRun>,
    scratch: &'a ScratchRun,
    safe_name: String,
    key_scope: Option<Uuid>,
    abort: CancellationToken,
    first_error: OnceLock<PipelineError>,
}

impl RunContext<'_> {
    fn update(&self, f: impl FnOnce(&mut PipelineRun)) {
        let mut run = self.run.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut run);
    }

    /// Record a fatal error. Only the first one is reported.
    fn fail(&self, err: PipelineError) {
        if let Err(secondary) = self.first_error.set(err) {
            tracing::warn!(
                error = %secondary,
                kind = secondary.kind(),
                "Secondary failure after run abort"
            );
        }
    }

    async fn release(&self, artifact: &ScratchFile) {
        if let Err(e) = self.scratch.release(artifact).await {
            tracing::warn!(error = %e, role = %artifact.role(), "Failed to release scratch artifact");
        }
    }
}

pub struct Pipeline {
    scratch: ScratchStore,
    planner: RenditionPlanner,
    transcoder: Transcoder,
    publisher: Publisher,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(
        scratch: ScratchStore,
        planner: RenditionPlanner,
        transcoder: Transcoder,
        publisher: Publisher,
        options: PipelineOptions,
    ) -> Self {
        Self {
            scratch,
            planner,
            transcoder,
            publisher,
            options,
        }
    }

    pub fn from_config(config: &Config, storage: Arc<dyn Storage>) -> Result<Self> {
        let transcoder = Transcoder::ffmpeg(config.ffmpeg_path())
            .context("Failed to initialize transcoder: invalid ffmpeg_path")?;

        Ok(Self::new(
            ScratchStore::new(config.scratch_root()),
            RenditionPlanner::from_config(config),
            transcoder,
            Publisher::new(storage),
            PipelineOptions::from_config(config),
        ))
    }

    pub fn planner(&self) -> &RenditionPlanner {
        &self.planner
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        self.publisher.storage()
    }

    pub async fn submit(&self, request: UploadRequest<'_>) -> RunResult {
        self.submit_with_cancel(request, CancellationToken::new()).await
    }

    /// Run the pipeline for one upload. Cancelling `cancel` stops the run at
    /// the next suspension point; the scratch root is removed either way.
    pub async fn submit_with_cancel(
        &self,
        request: UploadRequest<'_>,
        cancel: CancellationToken,
    ) -> RunResult {
        let run_id = Uuid::new_v4();

        // Rejected before anything touches disk or network.
        let file_name = match request.validated_file_name() {
            Ok(name) => name.to_string(),
            Err(err) => {
                tracing::debug!(run_id = %run_id, error = %err, "Upload rejected");
                return RunResult::rejected(run_id, &err);
            }
        };
        let safe_name = sanitize_file_name(&file_name);

        let span = tracing::info_span!("pipeline_run", run_id = %run_id, file_name = %safe_name);
        self.execute(run_id, file_name, safe_name, request, cancel)
            .instrument(span)
            .await
    }

    async fn execute(
        &self,
        run_id: Uuid,
        file_name: String,
        safe_name: String,
        request: UploadRequest<'_>,
        cancel: CancellationToken,
    ) -> RunResult {
        let start = Instant::now();
        let run = PipelineRun::new(run_id, file_name, safe_name.clone());
        tracing::info!(content_length = ?request.content_length, "Pipeline run received");

        let scratch = match self.scratch.begin_run(run_id) {
            Ok(scratch) => scratch,
            Err(err) => {
                tracing::error!(error = %err, "Failed to acquire scratch root");
                return run.finish(Some(&err));
            }
        };

        let ctx = RunContext {
            run: Mutex::new(run),
            scratch: &scratch,
            safe_name,
            key_scope: self.options.scope_keys_by_run.then_some(run_id),
            abort: CancellationToken::new(),
            first_error: OnceLock::new(),
        };

        let guarded = async {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(PipelineError::Cancelled),
                result = self.drive(&ctx, request) => result,
            }
        };
        let outcome = match self.options.run_timeout {
            Some(limit) => match tokio::time::timeout(limit, guarded).await {
                Ok(result) => result,
                Err(_) => Err(PipelineError::Timeout(limit)),
            },
            None => guarded.await,
        };
        if let Err(err) = outcome {
            ctx.fail(err);
        }

        let RunContext {
            run, first_error, ..
        } = ctx;
        let mut run = run.into_inner().unwrap_or_else(PoisonError::into_inner);
        let error = first_error.into_inner();

        if let Err(e) = scratch.teardown() {
            tracing::warn!(error = %e, "Scratch cleanup failed");
        }

        if error.is_some() && self.options.rollback_on_failure {
            let keys = run.published_keys();
            if !keys.is_empty() {
                let removed = self
                    .publisher
                    .retract(&keys, self.options.rollback_timeout)
                    .await;
                tracing::info!(
                    published = keys.len(),
                    retracted = removed.len(),
                    "Rolled back published artifacts"
                );
                for key in &removed {
                    run.forget_published(key);
                }
            }
        }

        let result = run.finish(error.as_ref());
        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
        match &error {
            None => tracing::info!(
                published = result.published_keys.len(),
                duration_ms = duration_ms,
                "Pipeline run completed"
            ),
            Some(err) => tracing::error!(
                error = %err,
                kind = err.kind(),
                published = result.published_keys.len(),
                duration_ms = duration_ms,
                "Pipeline run failed"
            ),
        }

        result
    }

    /// Store the source, then run the transcode and publish lanes to completion.
    async fn drive(
        &self,
        ctx: &RunContext<'_>,
        request: UploadRequest<'_>,
    ) -> Result<(), PipelineError> {
        let content_length = request.content_length;
        let source = ctx.scratch.allocate(ScratchRole::Source, &ctx.safe_name).await?;
        let size = ctx
            .scratch
            .materialize(&source, request.body, content_length)
            .await?;
        ctx.update(|run| run.transition(RunState::SourceStored));
        tracing::info!(size_bytes = size, "Source stored");

        let plan = self.planner.plan();
        ctx.update(|run| run.set_plan(&plan));

        let (tx, rx) = mpsc::channel(self.options.publish_queue_depth.max(1));
        tokio::join!(
            self.transcode_lane(ctx, &source, &plan, tx),
            self.publish_lane(ctx, &plan, rx),
        );

        Ok(())
    }

    async fn transcode_lane(
        &self,
        ctx: &RunContext<'_>,
        source: &ScratchFile,
        plan: &[RenditionSpec],
        tx: mpsc::Sender<Transcoded>,
    ) {
        for (index, spec) in plan.iter().enumerate() {
            if ctx.abort.is_cancelled() {
                break;
            }
            ctx.update(|run| run.transition(RunState::Transcoding(index)));

            // Dropping the transcode future kills the engine process.
            let result = tokio::select! {
                biased;
                _ = ctx.abort.cancelled() => break,
                result = self.transcoder.transcode(ctx.scratch, source, spec, &ctx.safe_name) => result,
            };

            match result {
                Ok(artifact) => {
                    ctx.update(|run| run.mark(index, TargetOutcome::Transcoded));
                    if let Err(mpsc::error::SendError(unsent)) =
                        tx.send(Transcoded { index, artifact }).await
                    {
                        ctx.release(&unsent.artifact).await;
                        break;
                    }
                }
                Err(err) => {
                    ctx.update(|run| run.mark(index, TargetOutcome::Failed));
                    ctx.fail(err);
                    break;
                }
            }
        }
    }

    async fn publish_lane(
        &self,
        ctx: &RunContext<'_>,
        plan: &[RenditionSpec],
        mut rx: mpsc::Receiver<Transcoded>,
    ) {
        while let Some(Transcoded { index, artifact }) = rx.recv().await {
            let spec = &plan[index];

            if ctx.abort.is_cancelled() {
                tracing::debug!(rendition = %spec.label(), "Releasing unpublished artifact");
                ctx.release(&artifact).await;
                continue;
            }

            ctx.update(|run| run.transition(RunState::Publishing(index)));
            let destination = spec.destination(&ctx.safe_name, ctx.key_scope);
            let result = self.publisher.publish(&artifact, &destination).await;

            ctx.update(|run| {
                for key in result.keys() {
                    run.record_published(index, key);
                }
            });

            match result.error {
                None => ctx.update(|run| run.mark(index, TargetOutcome::Published)),
                Some(err) => {
                    ctx.update(|run| run.mark(index, TargetOutcome::Failed));
                    ctx.fail(err);
                    ctx.abort.cancel();
                    rx.close();
                }
            }

            // Only after the store acknowledged (or refused) the artifact.
            ctx.release(&artifact).await;
        }
    }
}
