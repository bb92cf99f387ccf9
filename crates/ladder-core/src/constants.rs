//! Static defaults for the rendition ladder, packaging profiles and storage.

/// Bucket used when neither `STORAGE_BUCKET` nor `S3_BUCKET` is set.
pub const DEFAULT_BUCKET: &str = "videos";

/// Fixed-resolution ladder, as target heights in pixels.
pub const DEFAULT_RENDITION_HEIGHTS: [u32; 5] = [240, 360, 480, 720, 1080];

/// Key category for fixed-resolution renditions.
pub const RENDITION_CATEGORY: &str = "renditions";

/// Variants shared by both adaptive packaging profiles:
/// (name, height, video kbps, audio kbps).
pub const DEFAULT_ADAPTIVE_VARIANTS: [(&str, u32, u32, u32); 3] = [
    ("360p", 360, 800, 96),
    ("720p", 720, 2800, 128),
    ("1080p", 1080, 5000, 128),
];

pub const DEFAULT_HLS_SEGMENT_DURATION_SECS: u64 = 6;
pub const DEFAULT_DASH_SEGMENT_DURATION_SECS: u64 = 4;

pub const DEFAULT_RUN_TIMEOUT_SECS: u64 = 1800;

/// Budget for deleting a failed run's published keys.
pub const DEFAULT_ROLLBACK_TIMEOUT_SECS: u64 = 30;

/// Upper bound on the length of a sanitized file name.
pub const MAX_SAFE_FILE_NAME_LEN: usize = 128;

/// File name used when sanitizing leaves nothing usable.
pub const FALLBACK_FILE_NAME: &str = "upload";
