//! Engine argument lists. Pure functions of the target and paths.

use std::path::Path;

use ladder_core::models::{AdaptiveProfile, AdaptiveProtocol};

const VIDEO_CODEC: &str = "libx264";
const AUDIO_CODEC: &str = "aac";

/// Muxer for fixed renditions, whatever extension the upload carried.
pub const RENDITION_CONTAINER: &str = "mp4";

/// Scale filter for a target height. `-2` lets the engine derive the width
/// from the source aspect ratio, rounded to an even number.
pub fn scale_filter(height: u32) -> String {
    format!("scale=-2:{}", height)
}

/// One fixed-resolution rendition into a single MP4 container.
pub fn fixed_rendition_args(input: &Path, output: &Path, height: u32) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-hide_banner".to_string(),
        "-i".to_string(),
        input.to_string_lossy().to_string(),
        "-vf".to_string(),
        scale_filter(height),
        "-c:v".to_string(),
        VIDEO_CODEC.to_string(),
        "-preset".to_string(),
        "fast".to_string(),
        "-c:a".to_string(),
        AUDIO_CODEC.to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        "-f".to_string(),
        RENDITION_CONTAINER.to_string(),
        output.to_string_lossy().to_string(),
    ]
}

/// Split the decoded video into one scaled output per variant:
/// `[0:v:0]split=3[v0][v1][v2];[v0]scale=-2:360[v0out];...`
fn split_filter(profile: &AdaptiveProfile) -> String {
    let count = profile.variants.len();
    let labels: String = (0..count).map(|i| format!("[v{}]", i)).collect();
    let mut filter = format!("[0:v:0]split={}{}", count, labels);
    for (i, variant) in profile.variants.iter().enumerate() {
        filter.push_str(&format!(";[v{}]{}[v{}out]", i, scale_filter(variant.height), i));
    }
    filter
}

/// All variants of one adaptive package in a single engine invocation.
pub fn adaptive_package_args(input: &Path, output_dir: &Path, profile: &AdaptiveProfile) -> Vec<String> {
    let mut args = vec![
        "-y".to_string(),
        "-hide_banner".to_string(),
        "-i".to_string(),
        input.to_string_lossy().to_string(),
        "-filter_complex".to_string(),
        split_filter(profile),
    ];

    for (i, variant) in profile.variants.iter().enumerate() {
        args.extend_from_slice(&[
            "-map".to_string(),
            format!("[v{}out]", i),
            format!("-c:v:{}", i),
            VIDEO_CODEC.to_string(),
            format!("-b:v:{}", i),
            format!("{}k", variant.video_bitrate_kbps),
            format!("-maxrate:v:{}", i),
            format!("{}k", variant.max_rate_kbps()),
            format!("-bufsize:v:{}", i),
            format!("{}k", variant.buffer_size_kbps()),
        ]);
    }

    for (i, variant) in profile.variants.iter().enumerate() {
        args.extend_from_slice(&[
            "-map".to_string(),
            "0:a:0".to_string(),
            format!("-c:a:{}", i),
            AUDIO_CODEC.to_string(),
            format!("-b:a:{}", i),
            format!("{}k", variant.audio_bitrate_kbps),
        ]);
    }

    // Keyframes aligned to segment boundaries.
    args.extend_from_slice(&[
        "-preset".to_string(),
        "fast".to_string(),
        "-sc_threshold".to_string(),
        "0".to_string(),
        "-force_key_frames".to_string(),
        format!("expr:gte(t,n_forced*{})", profile.segment_duration_secs),
    ]);

    match profile.protocol {
        AdaptiveProtocol::Hls => args.extend(hls_output_args(output_dir, profile)),
        AdaptiveProtocol::Dash => args.extend(dash_output_args(output_dir, profile)),
    }

    args
}

fn hls_output_args(output_dir: &Path, profile: &AdaptiveProfile) -> Vec<String> {
    let stream_map = profile
        .variants
        .iter()
        .enumerate()
        .map(|(i, variant)| format!("v:{},a:{},name:{}", i, i, variant.name))
        .collect::<Vec<_>>()
        .join(" ");

    vec![
        "-f".to_string(),
        AdaptiveProtocol::Hls.muxer().to_string(),
        "-hls_time".to_string(),
        profile.segment_duration_secs.to_string(),
        "-hls_playlist_type".to_string(),
        "vod".to_string(),
        "-hls_segment_filename".to_string(),
        output_dir.join("stream_%v_%03d.ts").to_string_lossy().to_string(),
        "-master_pl_name".to_string(),
        AdaptiveProtocol::Hls.manifest_name().to_string(),
        "-var_stream_map".to_string(),
        stream_map,
        output_dir.join("stream_%v.m3u8").to_string_lossy().to_string(),
    ]
}

fn dash_output_args(output_dir: &Path, profile: &AdaptiveProfile) -> Vec<String> {
    vec![
        "-f".to_string(),
        AdaptiveProtocol::Dash.muxer().to_string(),
        "-seg_duration".to_string(),
        profile.segment_duration_secs.to_string(),
        "-use_template".to_string(),
        "1".to_string(),
        "-use_timeline".to_string(),
        "1".to_string(),
        "-adaptation_sets".to_string(),
        "id=0,streams=v id=1,streams=a".to_string(),
        "-init_seg_name".to_string(),
        "init-stream$RepresentationID$.m4s".to_string(),
        "-media_seg_name".to_string(),
        "chunk-stream$RepresentationID$-$Number%05d$.m4s".to_string(),
        output_dir
            .join(AdaptiveProtocol::Dash.manifest_name())
            .to_string_lossy()
            .to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::default_profiles;

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn test_fixed_args_overwrite_and_even_width() {
        let args = fixed_rendition_args(Path::new("/s/source/clip.mp4"), Path::new("/s/out.mp4"), 720);
        assert_eq!(args[0], "-y");
        assert_eq!(value_after(&args, "-i"), Some("/s/source/clip.mp4"));
        assert_eq!(value_after(&args, "-vf"), Some("scale=-2:720"));
        assert_eq!(args.last().map(String::as_str), Some("/s/out.mp4"));
    }

    #[test]
    fn test_fixed_args_force_mp4_container() {
        for output in ["/s/renditions/240p_clip.webm", "/s/renditions/240p_myvideo"] {
            let args = fixed_rendition_args(Path::new("/s/source/clip"), Path::new(output), 240);
            assert_eq!(value_after(&args, "-f"), Some("mp4"), "{}", output);
            assert_eq!(value_after(&args, "-c:v"), Some("libx264"));
            // The muxer selector applies to the output, so it must precede it
            let f = args.iter().position(|a| a == "-f").unwrap();
            assert_eq!(f + 2, args.len() - 1);
        }
    }

    #[test]
    fn test_hls_args() {
        let profile = &default_profiles(6, 4)[0];
        let args = adaptive_package_args(Path::new("/s/in.mp4"), Path::new("/s/hls/clip.mp4"), profile);

        assert_eq!(
            value_after(&args, "-filter_complex"),
            Some("[0:v:0]split=3[v0][v1][v2];[v0]scale=-2:360[v0out];[v1]scale=-2:720[v1out];[v2]scale=-2:1080[v2out]")
        );
        assert_eq!(value_after(&args, "-f"), Some("hls"));
        assert_eq!(value_after(&args, "-hls_time"), Some("6"));
        assert_eq!(value_after(&args, "-master_pl_name"), Some("master.m3u8"));
        assert_eq!(
            value_after(&args, "-var_stream_map"),
            Some("v:0,a:0,name:360p v:1,a:1,name:720p v:2,a:2,name:1080p")
        );
        assert_eq!(value_after(&args, "-b:v:1"), Some("2800k"));
        assert_eq!(value_after(&args, "-b:a:0"), Some("96k"));
        assert_eq!(args.iter().filter(|a| *a == "-map").count(), 6);
        assert_eq!(
            args.last().map(String::as_str),
            Some("/s/hls/clip.mp4/stream_%v.m3u8")
        );
    }

    #[test]
    fn test_dash_args() {
        let profile = &default_profiles(6, 4)[1];
        let args = adaptive_package_args(Path::new("/s/in.mp4"), Path::new("/s/dash/clip.mp4"), profile);

        assert_eq!(value_after(&args, "-f"), Some("dash"));
        assert_eq!(value_after(&args, "-seg_duration"), Some("4"));
        assert_eq!(value_after(&args, "-maxrate:v:2"), Some("6000k"));
        assert_eq!(
            args.last().map(String::as_str),
            Some("/s/dash/clip.mp4/manifest.mpd")
        );
    }
}
