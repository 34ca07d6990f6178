//! Representative frame extraction.
//!
//! Kept behind a trait so the pipeline and the HTTP layer can be tested
//! without shelling out to ffmpeg.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;

#[async_trait]
pub trait FrameExtractor: Send + Sync {
    /// Extract a single JPEG frame at `timestamp_secs`.
    async fn extract(&self, video_path: &Path, timestamp_secs: f64) -> Result<Vec<u8>>;
}

/// Extracts frames with ffmpeg, downscaling anything wider than
/// `max_width` before encoding.
pub struct FfmpegFrameExtractor {
    max_width: u32,
    jpeg_quality: u32,
}

impl FfmpegFrameExtractor {
    pub fn new(max_width: u32, jpeg_quality: u32) -> Self {
        Self {
            max_width,
            jpeg_quality,
        }
    }
}

#[async_trait]
impl FrameExtractor for FfmpegFrameExtractor {
    async fn extract(&self, video_path: &Path, timestamp_secs: f64) -> Result<Vec<u8>> {
        let path: PathBuf = video_path.to_path_buf();
        let max_width = self.max_width;
        let quality = self.jpeg_quality;

        tokio::task::spawn_blocking(move || {
            common::video::extract_frame_jpeg(&path, timestamp_secs, max_width, quality)
        })
        .await
        .context("frame extraction task panicked")?
    }
}

/// Returns fixed bytes, or fails every call. Test-only behavior but kept
/// in the crate so the binary can run end to end without media tooling.
pub struct MockFrameExtractor {
    bytes: Vec<u8>,
    fail: bool,
}

impl MockFrameExtractor {
    pub fn with_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes, fail: false }
    }

    pub fn failing() -> Self {
        Self {
            bytes: Vec::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl FrameExtractor for MockFrameExtractor {
    async fn extract(&self, _video_path: &Path, timestamp_secs: f64) -> Result<Vec<u8>> {
        if self.fail {
            anyhow::bail!("no frame available at {timestamp_secs}");
        }
        Ok(self.bytes.clone())
    }
}
