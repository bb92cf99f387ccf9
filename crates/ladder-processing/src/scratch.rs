//! Scratch Store: run-exclusive local disk space for the source copy and
//! every artifact produced from it.
//!
//! Each run gets its own directory under the scratch root, named after the
//! run ID. The directory is owned by a [`tempfile::TempDir`], so it is removed
//! even when the run future is dropped mid-flight (client disconnect, panic).
//! [`ScratchRun::teardown`] performs the same removal explicitly and reports
//! failures so they can be logged.

use std::io;
use std::path::{Path, PathBuf};

use ladder_core::models::{ByteSource, ScratchRole};
use ladder_core::PipelineError;
use tempfile::TempDir;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScratchKind {
    File,
    Directory,
}

/// A path owned by exactly one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScratchFile {
    path: PathBuf,
    role: ScratchRole,
    kind: ScratchKind,
}

impl ScratchFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn role(&self) -> ScratchRole {
        self.role
    }

    pub fn kind(&self) -> ScratchKind {
        self.kind
    }

    pub fn is_directory(&self) -> bool {
        self.kind == ScratchKind::Directory
    }
}

/// Parent directory under which per-run scratch roots are created.
#[derive(Debug, Clone)]
pub struct ScratchStore {
    root: PathBuf,
}

impl ScratchStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Acquire the scratch root of one run.
    pub fn begin_run(&self, run_id: Uuid) -> Result<ScratchRun, PipelineError> {
        let allocation_error = |source: io::Error| PipelineError::ScratchAllocation {
            role: "run".to_string(),
            source,
        };

        std::fs::create_dir_all(&self.root).map_err(allocation_error)?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("ladder-{}-", run_id))
            .tempdir_in(&self.root)
            .map_err(allocation_error)?;

        tracing::debug!(run_id = %run_id, path = %dir.path().display(), "Scratch root acquired");

        Ok(ScratchRun {
            run_id,
            path: dir.path().to_path_buf(),
            dir: Some(dir),
        })
    }
}

/// Scratch root of one run. Dropping it removes everything beneath it.
#[derive(Debug)]
pub struct ScratchRun {
    run_id: Uuid,
    path: PathBuf,
    dir: Option<TempDir>,
}

impl ScratchRun {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Create a unique path for `role`. Packages get a directory of their own;
    /// every other role gets a file path whose parent directory exists.
    pub async fn allocate(&self, role: ScratchRole, name: &str) -> Result<ScratchFile, PipelineError> {
        let allocation_error = |source: io::Error| PipelineError::ScratchAllocation {
            role: role.to_string(),
            source,
        };

        let (path, kind) = match role {
            ScratchRole::Source => (self.path.join("source").join(name), ScratchKind::File),
            ScratchRole::Rendition(_) => {
                (self.path.join("renditions").join(name), ScratchKind::File)
            }
            ScratchRole::Package(protocol) => (
                self.path.join(protocol.category()).join(name),
                ScratchKind::Directory,
            ),
        };

        let dir = match kind {
            ScratchKind::Directory => path.as_path(),
            ScratchKind::File => path.parent().unwrap_or(&self.path),
        };
        fs::create_dir_all(dir).await.map_err(allocation_error)?;

        Ok(ScratchFile { path, role, kind })
    }

    /// Stream `source` into the file. A declared length that the stream does
    /// not reach is a truncated write.
    pub async fn materialize(
        &self,
        file: &ScratchFile,
        mut source: ByteSource<'_>,
        expected_len: Option<u64>,
    ) -> Result<u64, PipelineError> {
        let write_error = |message: String| PipelineError::ScratchWrite {
            path: file.path.clone(),
            message,
        };

        if file.is_directory() {
            return Err(write_error("cannot write a byte stream into a directory".to_string()));
        }

        let mut out = fs::File::create(&file.path)
            .await
            .map_err(|e| write_error(e.to_string()))?;
        let written = tokio::io::copy(&mut source, &mut out)
            .await
            .map_err(|e| write_error(e.to_string()))?;
        out.flush().await.map_err(|e| write_error(e.to_string()))?;

        if let Some(expected) = expected_len {
            if written != expected {
                return Err(write_error(format!(
                    "truncated write: expected {} bytes, received {}",
                    expected, written
                )));
            }
        }

        tracing::debug!(
            run_id = %self.run_id,
            role = %file.role,
            size_bytes = written,
            "Scratch file materialized"
        );

        Ok(written)
    }

    /// Remove one artifact. Directories are removed recursively; a path that
    /// is already gone is not an error.
    pub async fn release(&self, file: &ScratchFile) -> Result<(), PipelineError> {
        let result = match file.kind {
            ScratchKind::File => fs::remove_file(&file.path).await,
            ScratchKind::Directory => fs::remove_dir_all(&file.path).await,
        };

        match result {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PipelineError::Cleanup {
                path: file.path.clone(),
                message: e.to_string(),
            }),
        }
    }

    /// Remove the whole run directory.
    ///
    /// Synchronous, so once started it runs to completion even if the
    /// surrounding task is being cancelled.
    pub fn teardown(mut self) -> Result<(), PipelineError> {
        let Some(dir) = self.dir.take() else {
            return Ok(());
        };

        if let Err(first) = dir.close() {
            // A just-killed engine process may still have been writing; retry once.
            if let Err(e) = std::fs::remove_dir_all(&self.path) {
                if e.kind() != io::ErrorKind::NotFound {
                    return Err(PipelineError::Cleanup {
                        path: self.path.clone(),
                        message: format!("{}; retry failed: {}", first, e),
                    });
                }
            }
        }

        tracing::debug!(run_id = %self.run_id, path = %self.path.display(), "Scratch root removed");
        Ok(())
    }
}
