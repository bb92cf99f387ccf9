//! Object store doubles.

use async_trait::async_trait;
use ladder_storage::{
    ByteReader, MemoryStorage, Storage, StorageBackend, StorageError, StorageResult,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::io::AsyncReadExt;

/// Accepts the first `accept` uploads into `inner`, then refuses everything.
/// Refused uploads still drain the stream, so a refusal proves the artifact
/// was readable on disk when it happened.
pub struct FailingStorage {
    pub inner: MemoryStorage,
    accept: usize,
    attempts: AtomicUsize,
    refused_bytes: AtomicUsize,
}

impl FailingStorage {
    pub fn unreachable() -> Self {
        Self::accepting(0)
    }

    pub fn accepting(accept: usize) -> Self {
        Self {
            inner: MemoryStorage::new("videos"),
            accept,
            attempts: AtomicUsize::new(0),
            refused_bytes: AtomicUsize::new(0),
        }
    }

    pub fn refused_bytes(&self) -> usize {
        self.refused_bytes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Storage for FailingStorage {
    async fn upload_stream(
        &self,
        storage_key: &str,
        content_type: &str,
        content_length: Option<u64>,
        mut reader: ByteReader,
    ) -> StorageResult<String> {
        if self.attempts.fetch_add(1, Ordering::SeqCst) < self.accept {
            return self
                .inner
                .upload_stream(storage_key, content_type, content_length, reader)
                .await;
        }

        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer).await?;
        self.refused_bytes.fetch_add(buffer.len(), Ordering::SeqCst);
        Err(StorageError::BackendError("connection refused".to_string()))
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        self.inner.delete(storage_key).await
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        self.inner.exists(storage_key).await
    }

    fn bucket(&self) -> &str {
        self.inner.bucket()
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}

/// Accepts every upload but never answers a delete.
pub struct StallingDeleteStorage {
    pub inner: MemoryStorage,
}

impl StallingDeleteStorage {
    pub fn new() -> Self {
        Self {
            inner: MemoryStorage::new("videos"),
        }
    }
}

#[async_trait]
impl Storage for StallingDeleteStorage {
    async fn upload_stream(
        &self,
        storage_key: &str,
        content_type: &str,
        content_length: Option<u64>,
        reader: ByteReader,
    ) -> StorageResult<String> {
        self.inner
            .upload_stream(storage_key, content_type, content_length, reader)
            .await
    }

    async fn delete(&self, _storage_key: &str) -> StorageResult<()> {
        tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        Ok(())
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        self.inner.exists(storage_key).await
    }

    fn bucket(&self) -> &str {
        self.inner.bucket()
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}
