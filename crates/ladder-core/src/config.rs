//! Configuration module
//!
//! Settings are read from the environment (a `.env` file is honoured).
//! `Config::from_lookup` takes an arbitrary key lookup so tests never touch
//! process-wide environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{
    DEFAULT_BUCKET, DEFAULT_DASH_SEGMENT_DURATION_SECS, DEFAULT_HLS_SEGMENT_DURATION_SECS,
    DEFAULT_RENDITION_HEIGHTS, DEFAULT_RUN_TIMEOUT_SECS,
};
use crate::storage_types::StorageBackend;

const SERVER_PORT: u16 = 4000;
const MAX_UPLOAD_SIZE_MB: usize = 2048;
const PUBLISH_QUEUE_DEPTH: usize = 1;
const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_LOCAL_BASE_URL: &str = "http://localhost:4000/media";

/// Server-level settings
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub environment: String,
    pub max_upload_size_bytes: usize,
}

/// Transcode-and-publish pipeline settings
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub base: BaseConfig,
    // Storage configuration
    pub storage_backend: StorageBackend,
    pub storage_bucket: String,
    pub s3_region: String,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: String,
    // Transcoding configuration
    pub ffmpeg_path: String,
    pub scratch_root: PathBuf,
    pub rendition_heights: Vec<u32>,
    pub hls_segment_duration: u64,
    pub dash_segment_duration: u64,
    /// 0 disables the per-run timeout.
    pub run_timeout_secs: u64,
    pub publish_queue_depth: usize,
    pub scope_keys_by_run: bool,
    pub rollback_on_failure: bool,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<PipelineConfig>);

impl Config {
    fn as_pipeline(&self) -> &PipelineConfig {
        &self.0
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = PipelineConfig::from_lookup(lookup)?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.as_pipeline().validate()
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let environment = self.as_pipeline().base.environment.to_lowercase();
        environment == "production" || environment == "prod"
    }

    pub fn environment(&self) -> &str {
        &self.as_pipeline().base.environment
    }

    pub fn server_port(&self) -> u16 {
        self.as_pipeline().base.server_port
    }

    pub fn max_upload_size_bytes(&self) -> usize {
        self.as_pipeline().base.max_upload_size_bytes
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.as_pipeline().storage_backend
    }

    pub fn storage_bucket(&self) -> &str {
        &self.as_pipeline().storage_bucket
    }

    pub fn s3_region(&self) -> &str {
        &self.as_pipeline().s3_region
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.as_pipeline().s3_endpoint.as_deref()
    }

    pub fn local_storage_path(&self) -> Option<&str> {
        self.as_pipeline().local_storage_path.as_deref()
    }

    pub fn local_storage_base_url(&self) -> &str {
        &self.as_pipeline().local_storage_base_url
    }

    pub fn ffmpeg_path(&self) -> &str {
        &self.as_pipeline().ffmpeg_path
    }

    pub fn scratch_root(&self) -> &PathBuf {
        &self.as_pipeline().scratch_root
    }

    pub fn rendition_heights(&self) -> &[u32] {
        &self.as_pipeline().rendition_heights
    }

    pub fn hls_segment_duration(&self) -> u64 {
        self.as_pipeline().hls_segment_duration
    }

    pub fn dash_segment_duration(&self) -> u64 {
        self.as_pipeline().dash_segment_duration
    }

    pub fn run_timeout(&self) -> Option<Duration> {
        match self.as_pipeline().run_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn publish_queue_depth(&self) -> usize {
        self.as_pipeline().publish_queue_depth
    }

    pub fn scope_keys_by_run(&self) -> bool {
        self.as_pipeline().scope_keys_by_run
    }

    pub fn rollback_on_failure(&self) -> bool {
        self.as_pipeline().rollback_on_failure
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn parse_bool(value: Option<String>, default: bool) -> bool {
    match value.map(|v| v.trim().to_lowercase()) {
        Some(v) if v == "1" || v == "true" || v == "yes" => true,
        Some(v) if v == "0" || v == "false" || v == "no" => false,
        _ => default,
    }
}

fn parse_heights(value: Option<String>) -> Result<Vec<u32>, anyhow::Error> {
    let Some(raw) = value else {
        return Ok(DEFAULT_RENDITION_HEIGHTS.to_vec());
    };

    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.trim_end_matches('p')
                .parse::<u32>()
                .map_err(|_| anyhow::anyhow!("RENDITION_HEIGHTS contains an invalid height: {}", s))
        })
        .collect()
}

impl PipelineConfig {
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = lookup("ENVIRONMENT")
            .or_else(|| lookup("APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let base = BaseConfig {
            server_port: lookup("PORT")
                .unwrap_or_else(|| SERVER_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            environment,
            max_upload_size_bytes: parse_or(lookup("MAX_UPLOAD_SIZE_MB"), MAX_UPLOAD_SIZE_MB)
                * 1024
                * 1024,
        };

        let storage_backend = match lookup("STORAGE_BACKEND") {
            Some(raw) => raw.parse::<StorageBackend>()?,
            None => StorageBackend::S3,
        };

        let config = PipelineConfig {
            base,
            storage_backend,
            storage_bucket: lookup("STORAGE_BUCKET")
                .or_else(|| lookup("S3_BUCKET"))
                .filter(|b| !b.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_BUCKET.to_string()),
            s3_region: lookup("S3_REGION")
                .or_else(|| lookup("AWS_REGION"))
                .unwrap_or_else(|| DEFAULT_REGION.to_string()),
            s3_endpoint: lookup("S3_ENDPOINT").filter(|e| !e.trim().is_empty()),
            local_storage_path: lookup("LOCAL_STORAGE_PATH"),
            local_storage_base_url: lookup("LOCAL_STORAGE_BASE_URL")
                .unwrap_or_else(|| DEFAULT_LOCAL_BASE_URL.to_string()),
            ffmpeg_path: lookup("FFMPEG_PATH").unwrap_or_else(|| "ffmpeg".to_string()),
            scratch_root: lookup("SCRATCH_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(env::temp_dir),
            rendition_heights: parse_heights(lookup("RENDITION_HEIGHTS"))?,
            hls_segment_duration: parse_or(
                lookup("HLS_SEGMENT_DURATION"),
                DEFAULT_HLS_SEGMENT_DURATION_SECS,
            ),
            dash_segment_duration: parse_or(
                lookup("DASH_SEGMENT_DURATION"),
                DEFAULT_DASH_SEGMENT_DURATION_SECS,
            ),
            run_timeout_secs: parse_or(lookup("RUN_TIMEOUT_SECS"), DEFAULT_RUN_TIMEOUT_SECS),
            publish_queue_depth: parse_or(lookup("PUBLISH_QUEUE_DEPTH"), PUBLISH_QUEUE_DEPTH),
            scope_keys_by_run: parse_bool(lookup("SCOPE_KEYS_BY_RUN"), false),
            rollback_on_failure: parse_bool(lookup("ROLLBACK_ON_FAILURE"), false),
        };

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.rendition_heights.is_empty() {
            return Err(anyhow::anyhow!("RENDITION_HEIGHTS must list at least one height"));
        }

        if let Some(h) = self.rendition_heights.iter().find(|h| **h < 2 || **h % 2 != 0) {
            return Err(anyhow::anyhow!(
                "RENDITION_HEIGHTS must contain even heights of at least 2 pixels, got {}",
                h
            ));
        }

        let dangerous_chars = [';', '|', '&', '$', '`', '(', ')', '<', '>', '\n', '\r'];
        if self.ffmpeg_path.is_empty()
            || self.ffmpeg_path.chars().any(|c| dangerous_chars.contains(&c))
        {
            return Err(anyhow::anyhow!(
                "FFMPEG_PATH is empty or contains dangerous characters"
            ));
        }

        if self.hls_segment_duration == 0 || self.dash_segment_duration == 0 {
            return Err(anyhow::anyhow!("Segment durations must be greater than zero"));
        }

        if self.publish_queue_depth == 0 {
            return Err(anyhow::anyhow!("PUBLISH_QUEUE_DEPTH must be at least 1"));
        }

        if self.storage_backend == StorageBackend::Local && self.local_storage_path.is_none() {
            return Err(anyhow::anyhow!(
                "LOCAL_STORAGE_PATH must be set when STORAGE_BACKEND=local"
            ));
        }

        Ok(())
    }
}
