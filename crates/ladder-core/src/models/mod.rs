//! Domain models for one pipeline run.

pub mod rendition;
pub mod run;
pub mod upload;

pub use rendition::{AdaptiveProfile, AdaptiveProtocol, RenditionSpec, RenditionTarget, ScratchRole, Variant};
pub use run::{PipelineRun, RunError, RunResult, RunState, RunStatus, TargetOutcome, TargetRecord};
pub use upload::{ByteSource, UploadRequest};
