//! Test helpers: the real router around an in-memory store and a fake engine.
//!
//! Run with: `cargo test -p ladder-api`

#![allow(dead_code)]

pub mod engine;

use axum_test::TestServer;
use engine::StubEngine;
use ladder_api::setup::routes;
use ladder_api::AppState;
use ladder_core::Config;
use ladder_processing::{
    Pipeline, PipelineOptions, Publisher, RenditionPlanner, ScratchStore, Transcoder,
};
use ladder_storage::MemoryStorage;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

pub struct TestApp {
    pub server: TestServer,
    pub storage: MemoryStorage,
    pub engine: Arc<StubEngine>,
    pub scratch_root: PathBuf,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    pub fn scratch_is_empty(&self) -> bool {
        match std::fs::read_dir(&self.scratch_root) {
            Ok(mut entries) => entries.next().is_none(),
            Err(_) => true,
        }
    }
}

fn test_config(scratch_root: &str) -> Config {
    let scratch_root = scratch_root.to_string();
    Config::from_lookup(move |key| match key {
        "STORAGE_BACKEND" => Some("memory".to_string()),
        "STORAGE_BUCKET" => Some("videos".to_string()),
        "SCRATCH_ROOT" => Some(scratch_root.clone()),
        "RENDITION_HEIGHTS" => Some("240,360".to_string()),
        _ => None,
    })
    .expect("Failed to build test config")
}

pub fn setup_test_app() -> TestApp {
    setup_test_app_with(StubEngine::new())
}

pub fn setup_test_app_with(engine: StubEngine) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let scratch_root = temp_dir.path().join("scratch");
    build_test_app(engine, temp_dir, scratch_root)
}

/// App whose scratch root is a regular file, so nothing can be created in it.
pub fn setup_test_app_with_blocked_scratch() -> TestApp {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let scratch_root = temp_dir.path().join("scratch");
    std::fs::write(&scratch_root, b"not a directory").expect("Failed to create file");
    build_test_app(StubEngine::new(), temp_dir, scratch_root)
}

fn build_test_app(engine: StubEngine, temp_dir: TempDir, scratch_root: PathBuf) -> TestApp {
    let config = test_config(&scratch_root.to_string_lossy());

    let storage = MemoryStorage::new("videos");
    let engine = Arc::new(engine);
    let pipeline = Pipeline::new(
        ScratchStore::new(&scratch_root),
        RenditionPlanner::from_config(&config),
        Transcoder::new("ffmpeg", engine.clone()).expect("valid engine path"),
        Publisher::new(Arc::new(storage.clone())),
        PipelineOptions::from_config(&config),
    );

    let state = Arc::new(AppState::new(config.clone(), pipeline));
    let router = routes::setup_routes(&config, state);
    let server = TestServer::new(router).expect("Failed to start test server");

    TestApp {
        server,
        storage,
        engine,
        scratch_root,
        _temp_dir: temp_dir,
    }
}
