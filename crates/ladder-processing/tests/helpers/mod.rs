//! Test helpers: a pipeline wired to a fake engine and an in-memory store.
//!
//! Run with: `cargo test -p ladder-processing --test pipeline_test`

#![allow(dead_code)]

pub mod engine;
pub mod storage;

use engine::FakeEngine;
use ladder_core::models::UploadRequest;
use ladder_processing::{
    Pipeline, PipelineOptions, Publisher, RenditionPlanner, ScratchStore, Transcoder,
};
use ladder_storage::Storage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

pub struct TestPipeline {
    pub pipeline: Pipeline,
    pub engine: Arc<FakeEngine>,
    pub scratch_root: PathBuf,
    pub _temp_dir: TempDir,
}

impl TestPipeline {
    /// True when no run left anything behind (or no run ever created the root).
    pub fn scratch_is_empty(&self) -> bool {
        dir_is_empty(&self.scratch_root)
    }
}

pub fn dir_is_empty(path: &Path) -> bool {
    match std::fs::read_dir(path) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => true,
    }
}

pub fn setup_pipeline(
    engine: FakeEngine,
    storage: Arc<dyn Storage>,
    options: PipelineOptions,
) -> TestPipeline {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let scratch_root = temp_dir.path().join("scratch");
    let engine = Arc::new(engine);

    let pipeline = Pipeline::new(
        ScratchStore::new(&scratch_root),
        RenditionPlanner::default(),
        Transcoder::new("ffmpeg", engine.clone()).expect("valid engine path"),
        Publisher::new(storage),
        options,
    );

    TestPipeline {
        pipeline,
        engine,
        scratch_root,
        _temp_dir: temp_dir,
    }
}

pub fn clip_upload() -> UploadRequest<'static> {
    UploadRequest::from_bytes("clip.mp4", b"\x00\x00\x00\x18ftypmp42 fake video".to_vec())
        .with_content_type("video/mp4")
}

pub fn fixed_keys(heights: &[u32]) -> Vec<String> {
    heights
        .iter()
        .map(|h| format!("renditions/{}p_clip.mp4", h))
        .collect()
}
