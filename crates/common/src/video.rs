//! Video probing and frame extraction.
//!
//! Thin wrappers around ffmpeg/ffprobe subprocesses. The pipeline pulls one
//! representative JPEG per scene through these helpers; callers run them on a
//! blocking thread.

use anyhow::{Context, Result};
use base64::Engine;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::{debug, error};

/// Probe video duration in seconds using ffprobe
pub fn probe_video_duration(video_path: &Path) -> Result<f64> {
    debug!(video = %video_path.display(), "probing video duration");

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "csv=p=0",
            &video_path.to_string_lossy(),
        ])
        .output()
        .context("failed to execute ffprobe")?;

    if !output.status.success() {
        anyhow::bail!("ffprobe failed: {:?}", output.status);
    }

    let output_str =
        String::from_utf8(output.stdout).context("ffprobe output is not valid UTF-8")?;

    let duration: f64 = output_str
        .trim()
        .parse()
        .context("failed to parse duration")?;

    debug!(
        video = %video_path.display(),
        duration_secs = duration,
        "probed duration successfully"
    );

    Ok(duration)
}

/// Extract a single JPEG frame at a timestamp
///
/// # Arguments
/// * `video_path` - Path to the video file
/// * `timestamp_secs` - Timestamp in seconds to extract the frame
/// * `max_width` - Cap on frame width; wider sources are downscaled with the
///   aspect ratio preserved (0 = no cap)
/// * `quality` - JPEG quality (2-31, lower is better quality, default: 5)
///
/// # Returns
/// JPEG image data as bytes
pub fn extract_frame_jpeg(
    video_path: &Path,
    timestamp_secs: f64,
    max_width: u32,
    quality: u32,
) -> Result<Vec<u8>> {
    debug!(
        video = %video_path.display(),
        timestamp = timestamp_secs,
        max_width = max_width,
        quality = quality,
        "extracting frame from video"
    );

    if !video_path.exists() {
        anyhow::bail!("video file does not exist: {}", video_path.display());
    }

    let args = build_frame_args(video_path, timestamp_secs, max_width, quality);

    debug!(args = ?args, "spawning ffmpeg for frame extraction");

    let output = Command::new("ffmpeg")
        .args(&args)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .context("failed to execute ffmpeg")?;

    if !output.status.success() {
        error!(
            video = %video_path.display(),
            status = ?output.status,
            "ffmpeg frame extraction failed"
        );
        anyhow::bail!("ffmpeg exited with error: {:?}", output.status);
    }

    if output.stdout.is_empty() {
        error!(video = %video_path.display(), "ffmpeg returned empty frame data");
        anyhow::bail!("ffmpeg returned no frame data");
    }

    debug!(
        video = %video_path.display(),
        size_bytes = output.stdout.len(),
        "frame extracted successfully"
    );

    Ok(output.stdout)
}

fn build_frame_args(
    video_path: &Path,
    timestamp_secs: f64,
    max_width: u32,
    quality: u32,
) -> Vec<String> {
    let mut args = vec![
        "-ss".to_string(),
        timestamp_secs.to_string(),
        "-i".to_string(),
        video_path.to_string_lossy().to_string(),
        "-vframes".to_string(),
        "1".to_string(),
        "-f".to_string(),
        "image2pipe".to_string(),
    ];

    // Downscale only sources wider than the cap; min() keeps narrower
    // frames at their native size
    if max_width > 0 {
        args.push("-vf".to_string());
        args.push(format!("scale=min(iw\\,{}):-1", max_width));
    }

    // JPEG quality (qscale:v where 2 is high quality, 31 is low quality)
    args.push("-q:v".to_string());
    args.push(quality.clamp(2, 31).to_string());

    args.push("pipe:1".to_string());
    args
}

/// Encode frame bytes as base64 for JSON transport
pub fn encode_frame_base64(data: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(data)
}
