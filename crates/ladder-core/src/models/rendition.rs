//! Rendition targets: what one run produces and where each output is published.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use uuid::Uuid;

use crate::constants::RENDITION_CATEGORY;

/// Segmented delivery protocols for adaptive packages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdaptiveProtocol {
    Hls,
    Dash,
}

impl AdaptiveProtocol {
    /// Key category under which the package is published.
    pub fn category(&self) -> &'static str {
        match self {
            AdaptiveProtocol::Hls => "hls",
            AdaptiveProtocol::Dash => "dash",
        }
    }

    /// File name of the top-level manifest inside the package directory.
    pub fn manifest_name(&self) -> &'static str {
        match self {
            AdaptiveProtocol::Hls => "master.m3u8",
            AdaptiveProtocol::Dash => "manifest.mpd",
        }
    }

    /// Muxer name passed to the engine's format selector.
    pub fn muxer(&self) -> &'static str {
        match self {
            AdaptiveProtocol::Hls => "hls",
            AdaptiveProtocol::Dash => "dash",
        }
    }
}

impl Display for AdaptiveProtocol {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.category())
    }
}

/// One bitrate/resolution variant of an adaptive package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub name: String,
    pub height: u32,
    pub video_bitrate_kbps: u32,
    pub audio_bitrate_kbps: u32,
}

impl Variant {
    pub fn new(name: &str, height: u32, video_bitrate_kbps: u32, audio_bitrate_kbps: u32) -> Self {
        Self {
            name: name.to_string(),
            height,
            video_bitrate_kbps,
            audio_bitrate_kbps,
        }
    }

    /// Peak video rate allowed to the encoder.
    pub fn max_rate_kbps(&self) -> u32 {
        self.video_bitrate_kbps + self.video_bitrate_kbps / 5
    }

    /// Rate-control buffer size.
    pub fn buffer_size_kbps(&self) -> u32 {
        self.video_bitrate_kbps * 2
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdaptiveProfile {
    pub protocol: AdaptiveProtocol,
    pub segment_duration_secs: u64,
    pub variants: Vec<Variant>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RenditionTarget {
    FixedResolution { height: u32 },
    AdaptivePackage(AdaptiveProfile),
}

/// Logical role of a scratch path within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScratchRole {
    Source,
    Rendition(u32),
    Package(AdaptiveProtocol),
}

impl Display for ScratchRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ScratchRole::Source => write!(f, "source"),
            ScratchRole::Rendition(height) => write!(f, "rendition:{}p", height),
            ScratchRole::Package(protocol) => write!(f, "package:{}", protocol),
        }
    }
}

/// Describes one target output of a run. Built by the planner, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenditionSpec {
    pub target: RenditionTarget,
}

impl RenditionSpec {
    pub fn fixed(height: u32) -> Self {
        Self {
            target: RenditionTarget::FixedResolution { height },
        }
    }

    pub fn adaptive(profile: AdaptiveProfile) -> Self {
        Self {
            target: RenditionTarget::AdaptivePackage(profile),
        }
    }

    /// Human-readable target name used in logs and errors: `720p`, `hls`, `dash`.
    pub fn label(&self) -> String {
        match &self.target {
            RenditionTarget::FixedResolution { height } => format!("{}p", height),
            RenditionTarget::AdaptivePackage(profile) => profile.protocol.to_string(),
        }
    }

    pub fn is_adaptive(&self) -> bool {
        matches!(self.target, RenditionTarget::AdaptivePackage(_))
    }

    pub fn scratch_role(&self) -> ScratchRole {
        match &self.target {
            RenditionTarget::FixedResolution { height } => ScratchRole::Rendition(*height),
            RenditionTarget::AdaptivePackage(profile) => ScratchRole::Package(profile.protocol),
        }
    }

    pub fn category(&self) -> &'static str {
        match &self.target {
            RenditionTarget::FixedResolution { .. } => RENDITION_CATEGORY,
            RenditionTarget::AdaptivePackage(profile) => profile.protocol.category(),
        }
    }

    /// Local file name of the artifact (fixed) or package directory (adaptive).
    pub fn artifact_name(&self, safe_name: &str) -> String {
        match &self.target {
            RenditionTarget::FixedResolution { height } => format!("{}p_{}", height, safe_name),
            RenditionTarget::AdaptivePackage(_) => safe_name.to_string(),
        }
    }

    /// Destination key for a fixed rendition, or the key prefix under which a
    /// package's relative paths are published.
    ///
    /// `run_scope` inserts the run ID after the category so repeated uploads
    /// of the same name never overwrite each other.
    pub fn destination(&self, safe_name: &str, run_scope: Option<Uuid>) -> String {
        let name = self.artifact_name(safe_name);
        match run_scope {
            Some(run_id) => format!("{}/{}/{}", self.category(), run_id, name),
            None => format!("{}/{}", self.category(), name),
        }
    }
}
