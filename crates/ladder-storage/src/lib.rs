//! Ladder Storage Library
//!
//! This crate provides the object store abstraction the publisher writes
//! through, with S3-compatible, local filesystem and in-memory backends.
//!
//! # Storage key format
//!
//! Keys are relative, `/`-separated paths such as `renditions/240p_clip.mp4`
//! or `hls/clip.mp4/stream_0_000.ts`. Keys must not be empty, contain
//! `..` segments or a leading `/`; every backend validates them through the
//! `keys` module.

pub mod factory;
pub(crate) mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod memory;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use ladder_core::StorageBackend;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use memory::MemoryStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{ByteReader, Storage, StorageError, StorageResult};
