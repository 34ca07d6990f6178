//! Scene segmentation: splitting a video into time spans worth sampling.
//!
//! The primary implementation shells out to ffmpeg's scene-change filter.
//! When the filter reports no cuts (static slides, screen recordings),
//! segmentation falls back to fixed-interval sampling so the rest of the
//! pipeline still sees work.

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

use common::analysis::Scene;

mod ffmpeg_segmenter;
mod mock_segmenter;

pub use ffmpeg_segmenter::FfmpegSceneSegmenter;
pub use mock_segmenter::MockSceneSegmenter;

/// Errors from scene segmentation. All of these are fatal for the run:
/// without scene spans there is nothing to sample.
#[derive(Debug, Error)]
pub enum SegmentError {
    #[error("failed to probe video: {0}")]
    Probe(String),

    #[error("failed to decode video: {0}")]
    Decode(String),

    #[error("segmentation task failed: {0}")]
    Task(String),
}

#[async_trait]
pub trait SceneSegmenter: Send + Sync {
    /// Split the video into an ordered, non-overlapping list of scenes
    /// covering `[0, duration]`.
    async fn segment(&self, video_path: &Path) -> Result<Vec<Scene>, SegmentError>;
}

/// Build scene spans from detected cut timestamps.
///
/// Cuts closer than `min_scene_secs` to the previous boundary are dropped,
/// as are cuts at or past the end of the video. A trailing span shorter
/// than `min_scene_secs` is merged into the previous scene rather than
/// emitted on its own.
pub(crate) fn scenes_from_cuts(cuts: &[f64], duration: f64, min_scene_secs: f64) -> Vec<Scene> {
    let mut boundaries = vec![0.0];
    for &cut in cuts {
        let last = *boundaries.last().unwrap_or(&0.0);
        if cut <= last + min_scene_secs || cut >= duration {
            continue;
        }
        boundaries.push(cut);
    }

    if duration - boundaries[boundaries.len() - 1] < min_scene_secs && boundaries.len() > 1 {
        boundaries.pop();
    }

    let mut scenes = Vec::with_capacity(boundaries.len());
    for (i, &start) in boundaries.iter().enumerate() {
        let end = boundaries.get(i + 1).copied().unwrap_or(duration);
        scenes.push(Scene::new(start, end));
    }
    scenes
}

/// Sample the video at a fixed interval when no cuts were detected.
///
/// Each sample point `t` becomes a span of width `interval` centered on
/// `t`, clamped to the video bounds. Videos no longer than one interval
/// produce no scenes.
pub(crate) fn fallback_scenes(duration: f64, interval: f64) -> Vec<Scene> {
    let mut scenes = Vec::new();
    let mut t = interval;
    while t < duration {
        let start = (t - interval / 2.0).max(0.0);
        let end = (t + interval / 2.0).min(duration);
        scenes.push(Scene::new(start, end));
        t += interval;
    }
    scenes
}
