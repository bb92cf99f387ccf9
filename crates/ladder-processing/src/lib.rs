//! Ladder Processing Library
//!
//! The transcode-and-publish pipeline: per-run scratch space, the rendition
//! plan, the ffmpeg adapter, the publisher and the orchestrator driving them.

pub mod orchestrator;
pub mod planner;
pub mod publisher;
pub mod scratch;
pub mod transcode;

// Re-export commonly used types
pub use orchestrator::{Pipeline, PipelineOptions};
pub use planner::{default_profiles, RenditionPlanner};
pub use publisher::{content_type_for, PublishResult, PublishedObject, Publisher};
pub use scratch::{ScratchFile, ScratchKind, ScratchRun, ScratchStore};
pub use transcode::{CommandOutput, CommandRunner, ProcessRunner, Transcoder};
