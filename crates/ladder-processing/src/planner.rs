//! Rendition Planner: the fixed output ladder of every run.

use ladder_core::constants::{
    DEFAULT_ADAPTIVE_VARIANTS, DEFAULT_DASH_SEGMENT_DURATION_SECS,
    DEFAULT_HLS_SEGMENT_DURATION_SECS, DEFAULT_RENDITION_HEIGHTS,
};
use ladder_core::models::{AdaptiveProfile, AdaptiveProtocol, RenditionSpec, Variant};
use ladder_core::Config;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenditionPlanner {
    heights: Vec<u32>,
    profiles: Vec<AdaptiveProfile>,
}

impl RenditionPlanner {
    pub fn new(heights: Vec<u32>, profiles: Vec<AdaptiveProfile>) -> Self {
        Self { heights, profiles }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.rendition_heights().to_vec(),
            default_profiles(config.hls_segment_duration(), config.dash_segment_duration()),
        )
    }

    /// Fixed renditions in ladder order, then one package per protocol.
    /// Reads nothing but its own configuration.
    pub fn plan(&self) -> Vec<RenditionSpec> {
        self.heights
            .iter()
            .map(|height| RenditionSpec::fixed(*height))
            .chain(self.profiles.iter().cloned().map(RenditionSpec::adaptive))
            .collect()
    }

    pub fn target_count(&self) -> usize {
        self.heights.len() + self.profiles.len()
    }
}

impl Default for RenditionPlanner {
    fn default() -> Self {
        Self::new(
            DEFAULT_RENDITION_HEIGHTS.to_vec(),
            default_profiles(
                DEFAULT_HLS_SEGMENT_DURATION_SECS,
                DEFAULT_DASH_SEGMENT_DURATION_SECS,
            ),
        )
    }
}

/// HLS and DASH profiles over the shared variant ladder.
pub fn default_profiles(hls_segment_secs: u64, dash_segment_secs: u64) -> Vec<AdaptiveProfile> {
    let variants: Vec<Variant> = DEFAULT_ADAPTIVE_VARIANTS
        .iter()
        .map(|(name, height, video, audio)| Variant::new(name, *height, *video, *audio))
        .collect();

    vec![
        AdaptiveProfile {
            protocol: AdaptiveProtocol::Hls,
            segment_duration_secs: hls_segment_secs,
            variants: variants.clone(),
        },
        AdaptiveProfile {
            protocol: AdaptiveProtocol::Dash,
            segment_duration_secs: dash_segment_secs,
            variants,
        },
    ]
}
