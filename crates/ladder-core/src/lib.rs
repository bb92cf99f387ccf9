//! Ladder Core Library
//!
//! This crate provides the domain models, error taxonomy and configuration
//! shared by the storage, processing and API crates.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod storage_types;
pub mod validation;

// Re-export commonly used types
pub use config::{BaseConfig, Config, PipelineConfig};
pub use error::{ErrorMetadata, LogLevel, PipelineError};
pub use storage_types::StorageBackend;
