//! Per-run bookkeeping and the result reported to callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use uuid::Uuid;

use super::rendition::RenditionSpec;
use crate::error::PipelineError;

/// Orchestrator state machine. `Transcoding`/`Publishing` carry the target index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Received,
    SourceStored,
    Transcoding(usize),
    Publishing(usize),
    Completed,
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed)
    }
}

impl Display for RunState {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            RunState::Received => write!(f, "received"),
            RunState::SourceStored => write!(f, "source_stored"),
            RunState::Transcoding(i) => write!(f, "transcoding({})", i),
            RunState::Publishing(i) => write!(f, "publishing({})", i),
            RunState::Completed => write!(f, "completed"),
            RunState::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetOutcome {
    Pending,
    Transcoded,
    Published,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum RunStatus {
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetRecord {
    pub target: String,
    pub outcome: TargetOutcome,
    pub published_keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunError {
    pub kind: String,
    pub message: String,
}

impl From<&PipelineError> for RunError {
    fn from(err: &PipelineError) -> Self {
        RunError {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

/// Final report of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub published_keys: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RunError>,
    pub original_file_name: Option<String>,
    pub targets: Vec<TargetRecord>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunResult {
    /// Result for a request rejected before any run state existed.
    pub fn rejected(run_id: Uuid, err: &PipelineError) -> Self {
        let now = Utc::now();
        RunResult {
            run_id,
            status: RunStatus::Failed,
            published_keys: Vec::new(),
            error: Some(RunError::from(err)),
            original_file_name: None,
            targets: Vec::new(),
            started_at: now,
            finished_at: now,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }
}

/// Mutable record of one run, owned by the orchestrator for the duration of a request.
#[derive(Debug)]
pub struct PipelineRun {
    run_id: Uuid,
    original_file_name: String,
    safe_file_name: String,
    state: RunState,
    targets: Vec<TargetRecord>,
    started_at: DateTime<Utc>,
}

impl PipelineRun {
    pub fn new(run_id: Uuid, original_file_name: String, safe_file_name: String) -> Self {
        Self {
            run_id,
            original_file_name,
            safe_file_name,
            state: RunState::Received,
            targets: Vec::new(),
            started_at: Utc::now(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn safe_file_name(&self) -> &str {
        &self.safe_file_name
    }

    pub fn original_file_name(&self) -> &str {
        &self.original_file_name
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn targets(&self) -> &[TargetRecord] {
        &self.targets
    }

    /// Register the plan; every target starts out `pending`.
    pub fn set_plan(&mut self, plan: &[RenditionSpec]) {
        self.targets = plan
            .iter()
            .map(|spec| TargetRecord {
                target: spec.label(),
                outcome: TargetOutcome::Pending,
                published_keys: Vec::new(),
            })
            .collect();
    }

    pub fn transition(&mut self, next: RunState) {
        if self.state.is_terminal() {
            tracing::warn!(
                run_id = %self.run_id,
                from = %self.state,
                to = %next,
                "Ignoring transition out of terminal state"
            );
            return;
        }
        tracing::debug!(run_id = %self.run_id, from = %self.state, to = %next, "Run state transition");
        self.state = next;
    }

    pub fn mark(&mut self, index: usize, outcome: TargetOutcome) {
        if let Some(record) = self.targets.get_mut(index) {
            record.outcome = outcome;
        }
    }

    pub fn record_published(&mut self, index: usize, key: String) {
        if let Some(record) = self.targets.get_mut(index) {
            record.published_keys.push(key);
        }
    }

    /// Drop a key from the record after it was removed from the store again.
    pub fn forget_published(&mut self, key: &str) {
        for record in &mut self.targets {
            record.published_keys.retain(|k| k != key);
        }
    }

    /// Every key that reached the store, in plan order.
    pub fn published_keys(&self) -> Vec<String> {
        self.targets
            .iter()
            .flat_map(|record| record.published_keys.iter().cloned())
            .collect()
    }

    pub fn all_published(&self) -> bool {
        !self.targets.is_empty()
            && self
                .targets
                .iter()
                .all(|record| record.outcome == TargetOutcome::Published)
    }

    /// Close the run and produce its report. The run is `Completed` only when
    /// no error was raised and every target was published.
    pub fn finish(mut self, error: Option<&PipelineError>) -> RunResult {
        let status = if error.is_none() && self.all_published() {
            RunStatus::Completed
        } else {
            RunStatus::Failed
        };
        self.transition(match status {
            RunStatus::Completed => RunState::Completed,
            RunStatus::Failed => RunState::Failed,
        });

        RunResult {
            run_id: self.run_id,
            status,
            published_keys: self.published_keys(),
            error: error.map(RunError::from),
            original_file_name: Some(self.original_file_name),
            targets: self.targets,
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}
