//! Ladder API Library
//!
//! HTTP boundary for the transcode-and-publish pipeline. The binary in
//! `main.rs` wires these pieces together; integration tests build the same
//! router around an in-memory store.

pub mod error;
pub mod handlers;
pub mod setup;
pub mod state;
pub mod telemetry;

pub use error::{ErrorResponse, HttpPipelineError};
pub use state::AppState;
