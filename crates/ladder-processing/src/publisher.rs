//! Publisher: streams finished scratch artifacts to the object store.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use ladder_core::models::ScratchRole;
use ladder_core::PipelineError;
use ladder_storage::Storage;
use tokio::time::Instant;

use crate::scratch::ScratchFile;

/// Fixed renditions are always muxed as MP4, whatever their file name says.
const RENDITION_CONTENT_TYPE: &str = "video/mp4";

/// One object that reached the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedObject {
    pub key: String,
    pub url: String,
    pub size_bytes: u64,
}

/// Outcome of publishing one artifact. For packages, `objects` lists every
/// file that was stored before `error` (if any) stopped the upload.
#[derive(Debug, Default)]
pub struct PublishResult {
    pub objects: Vec<PublishedObject>,
    pub error: Option<PipelineError>,
}

impl PublishResult {
    pub fn keys(&self) -> Vec<String> {
        self.objects.iter().map(|o| o.key.clone()).collect()
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

pub fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("mp4") => "video/mp4",
        Some("m3u8") => "application/vnd.apple.mpegurl",
        Some("ts") => "video/mp2t",
        Some("mpd") => "application/dash+xml",
        Some("m4s") => "video/iso.segment",
        _ => "application/octet-stream",
    }
}

fn is_manifest(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("m3u8") | Some("mpd")
    )
}

#[derive(Clone)]
pub struct Publisher {
    storage: Arc<dyn Storage>,
}

impl Publisher {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Publish a fixed rendition under `destination`, or every file of a
    /// package under `destination/<relative path>`. Stops at the first
    /// failed upload; nothing is retried.
    pub async fn publish(&self, artifact: &ScratchFile, destination: &str) -> PublishResult {
        let mut result = PublishResult::default();

        if !artifact.is_directory() {
            let content_type = match artifact.role() {
                ScratchRole::Rendition(_) => RENDITION_CONTENT_TYPE,
                _ => content_type_for(artifact.path()),
            };
            match self.put_file(artifact.path(), destination, content_type).await {
                Ok(object) => result.objects.push(object),
                Err(e) => result.error = Some(e),
            }
            return result;
        }

        let files = match package_files(artifact).await {
            Ok(files) => files,
            Err(e) => {
                result.error = Some(PipelineError::Publish {
                    key: destination.to_string(),
                    cause: format!("Failed to list package {}: {}", artifact.path().display(), e),
                });
                return result;
            }
        };

        for (relative, path) in files {
            let key = format!("{}/{}", destination, relative);
            match self.put_file(&path, &key, content_type_for(&path)).await {
                Ok(object) => result.objects.push(object),
                Err(e) => {
                    result.error = Some(e);
                    break;
                }
            }
        }

        result
    }

    async fn put_file(
        &self,
        path: &Path,
        key: &str,
        content_type: &str,
    ) -> Result<PublishedObject, PipelineError> {
        let publish_error = |cause: String| PipelineError::Publish {
            key: key.to_string(),
            cause,
        };

        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| publish_error(format!("Failed to open {}: {}", path.display(), e)))?;
        let size_bytes = file
            .metadata()
            .await
            .map_err(|e| publish_error(e.to_string()))?
            .len();

        let url = self
            .storage
            .upload_stream(key, content_type, Some(size_bytes), Box::pin(file))
            .await
            .map_err(|e| {
                tracing::error!(key = %key, error = %e, "Publish failed");
                publish_error(e.to_string())
            })?;

        tracing::info!(key = %key, size_bytes = size_bytes, "Artifact published");

        Ok(PublishedObject {
            key: key.to_string(),
            url,
            size_bytes,
        })
    }

    /// Best-effort removal of already published keys within `limit`.
    /// Returns the keys that were actually removed; keys not reached before
    /// the deadline stay published.
    pub async fn retract(&self, keys: &[String], limit: Duration) -> Vec<String> {
        let deadline = Instant::now() + limit;
        let mut removed = Vec::with_capacity(keys.len());
        for key in keys {
            match tokio::time::timeout_at(deadline, self.storage.delete(key)).await {
                Ok(Ok(())) => removed.push(key.clone()),
                Ok(Err(e)) => {
                    tracing::warn!(key = %key, error = %e, "Failed to retract published key")
                }
                Err(_) => {
                    tracing::warn!(
                        key = %key,
                        remaining = keys.len() - removed.len(),
                        "Rollback deadline reached"
                    );
                    break;
                }
            }
        }
        removed
    }
}

/// Every regular file of a package as `(relative key path, absolute path)`:
/// segments first, then variant manifests, then the top-level manifest.
async fn package_files(artifact: &ScratchFile) -> std::io::Result<Vec<(String, PathBuf)>> {
    let top_manifest = match artifact.role() {
        ScratchRole::Package(protocol) => Some(protocol.manifest_name()),
        _ => None,
    };

    let root = artifact.path();
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_file() {
                let relative = path
                    .strip_prefix(root)
                    .unwrap_or(&path)
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                files.push((relative, path));
            }
        }
    }

    let rank = |relative: &str, path: &Path| -> u8 {
        if Some(relative) == top_manifest {
            2
        } else if is_manifest(path) {
            1
        } else {
            0
        }
    };
    files.sort_by(|(ra, pa), (rb, pb)| rank(ra, pa).cmp(&rank(rb, pb)).then_with(|| ra.cmp(rb)));

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scratch::ScratchStore;
    use async_trait::async_trait;
    use ladder_core::models::AdaptiveProtocol;
    use ladder_storage::{ByteReader, MemoryStorage, StorageBackend, StorageError, StorageResult};
    use uuid::Uuid;

    struct UnreachableStorage;

    #[async_trait]
    impl Storage for UnreachableStorage {
        async fn upload_stream(
            &self,
            _storage_key: &str,
            _content_type: &str,
            _content_length: Option<u64>,
            _reader: ByteReader,
        ) -> StorageResult<String> {
            Err(StorageError::BackendError("connection refused".to_string()))
        }

        async fn delete(&self, _storage_key: &str) -> StorageResult<()> {
            Err(StorageError::BackendError("connection refused".to_string()))
        }

        async fn exists(&self, _storage_key: &str) -> StorageResult<bool> {
            Ok(false)
        }

        fn bucket(&self) -> &str {
            "videos"
        }

        fn backend_type(&self) -> StorageBackend {
            StorageBackend::S3
        }
    }

    #[tokio::test]
    async fn test_publish_fixed_rendition() {
        let root = tempfile::tempdir().unwrap();
        let run = ScratchStore::new(root.path()).begin_run(Uuid::new_v4()).unwrap();
        let file = run.allocate(ScratchRole::Rendition(240), "240p_clip.mp4").await.unwrap();
        std::fs::write(file.path(), b"rendition").unwrap();

        let storage = MemoryStorage::new("videos");
        let publisher = Publisher::new(Arc::new(storage.clone()));
        let result = publisher.publish(&file, "renditions/240p_clip.mp4").await;

        assert!(result.is_success());
        assert_eq!(result.keys(), vec!["renditions/240p_clip.mp4"]);
        assert_eq!(result.objects[0].size_bytes, 9);
        let stored = storage.get("renditions/240p_clip.mp4").unwrap();
        assert_eq!(&stored.data[..], b"rendition");
        assert_eq!(stored.content_type, "video/mp4");
    }

    #[tokio::test]
    async fn test_package_segments_before_manifests() {
        let root = tempfile::tempdir().unwrap();
        let run = ScratchStore::new(root.path()).begin_run(Uuid::new_v4()).unwrap();
        let package = run
            .allocate(ScratchRole::Package(AdaptiveProtocol::Hls), "clip.mp4")
            .await
            .unwrap();
        for name in ["master.m3u8", "stream_0.m3u8", "stream_0_000.ts", "stream_0_001.ts"] {
            std::fs::write(package.path().join(name), name).unwrap();
        }
        std::fs::create_dir_all(package.path().join("extra")).unwrap();
        std::fs::write(package.path().join("extra/poster.ts"), b"x").unwrap();

        let storage = MemoryStorage::new("videos");
        let result = Publisher::new(Arc::new(storage.clone()))
            .publish(&package, "hls/clip.mp4")
            .await;

        assert!(result.is_success());
        assert_eq!(
            result.keys(),
            vec![
                "hls/clip.mp4/extra/poster.ts",
                "hls/clip.mp4/stream_0_000.ts",
                "hls/clip.mp4/stream_0_001.ts",
                "hls/clip.mp4/stream_0.m3u8",
                "hls/clip.mp4/master.m3u8",
            ]
        );
        assert_eq!(
            storage.get("hls/clip.mp4/master.m3u8").unwrap().content_type,
            "application/vnd.apple.mpegurl"
        );
    }

    /// Stores the first `accept` uploads, refuses the rest.
    struct RefusingAfter {
        inner: MemoryStorage,
        accept: usize,
    }

    #[async_trait]
    impl Storage for RefusingAfter {
        async fn upload_stream(
            &self,
            storage_key: &str,
            content_type: &str,
            content_length: Option<u64>,
            reader: ByteReader,
        ) -> StorageResult<String> {
            if self.inner.len() >= self.accept {
                return Err(StorageError::BackendError("connection reset".to_string()));
            }
            self.inner
                .upload_stream(storage_key, content_type, content_length, reader)
                .await
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

    #[tokio::test]
    async fn test_package_stops_at_first_refused_file() {
        let root = tempfile::tempdir().unwrap();
        let run = ScratchStore::new(root.path()).begin_run(Uuid::new_v4()).unwrap();
        let package = run
            .allocate(ScratchRole::Package(AdaptiveProtocol::Dash), "clip.mp4")
            .await
            .unwrap();
        for name in [
            "manifest.mpd",
            "init-stream0.m4s",
            "chunk-stream0-00001.m4s",
            "chunk-stream0-00002.m4s",
        ] {
            std::fs::write(package.path().join(name), name).unwrap();
        }

        let inner = MemoryStorage::new("videos");
        let storage = RefusingAfter {
            inner: inner.clone(),
            accept: 2,
        };
        let result = Publisher::new(Arc::new(storage))
            .publish(&package, "dash/clip.mp4")
            .await;

        assert_eq!(
            result.keys(),
            vec![
                "dash/clip.mp4/chunk-stream0-00001.m4s",
                "dash/clip.mp4/chunk-stream0-00002.m4s",
            ]
        );
        assert_eq!(inner.keys(), result.keys());
        match result.error {
            Some(PipelineError::Publish { ref key, ref cause }) => {
                assert_eq!(key, "dash/clip.mp4/init-stream0.m4s");
                assert!(cause.contains("connection reset"));
            }
            ref other => panic!("unexpected result: {other:?}"),
        }
        // The manifest was never attempted
        assert!(inner.get("dash/clip.mp4/manifest.mpd").is_none());
    }

    #[tokio::test]
    async fn test_unreachable_store_is_publish_error() {
        let root = tempfile::tempdir().unwrap();
        let run = ScratchStore::new(root.path()).begin_run(Uuid::new_v4()).unwrap();
        let file = run.allocate(ScratchRole::Rendition(360), "360p_clip.mp4").await.unwrap();
        std::fs::write(file.path(), b"rendition").unwrap();

        let result = Publisher::new(Arc::new(UnreachableStorage))
            .publish(&file, "renditions/360p_clip.mp4")
            .await;

        assert!(result.objects.is_empty());
        let err = result.error.unwrap();
        assert_eq!(err.kind(), "PublishError");
        assert!(err.to_string().contains("renditions/360p_clip.mp4"));
        // The artifact is still on disk
        assert!(file.path().is_file());
    }

    #[tokio::test]
    async fn test_retract_is_best_effort() {
        let storage = MemoryStorage::new("videos");
        let publisher = Publisher::new(Arc::new(storage.clone()));
        storage
            .upload_stream("renditions/240p_clip.mp4", "video/mp4", None, Box::pin(&b"x"[..]))
            .await
            .unwrap();

        let removed = publisher
            .retract(
                &["renditions/240p_clip.mp4".to_string(), "../bad".to_string()],
                Duration::from_secs(5),
            )
            .await;
        assert_eq!(removed, vec!["renditions/240p_clip.mp4"]);
        assert!(storage.is_empty());
    }

    #[test]
    fn test_content_types() {
        assert_eq!(content_type_for(Path::new("a/manifest.mpd")), "application/dash+xml");
        assert_eq!(content_type_for(Path::new("chunk-stream0-00001.m4s")), "video/iso.segment");
        assert_eq!(content_type_for(Path::new("seg.TS")), "video/mp2t");
        assert_eq!(content_type_for(Path::new("noext")), "application/octet-stream");
    }
}
