//! Scene segmentation backed by ffmpeg's scene-change detection filter.

use std::path::Path;
use std::process::Command;

use async_trait::async_trait;
use tracing::debug;

use common::analysis::Scene;
use common::video::probe_video_duration;

use super::{fallback_scenes, scenes_from_cuts, SceneSegmenter, SegmentError};

/// Runs `ffmpeg -vf select='gt(scene,T)',showinfo` over the whole video
/// and turns the reported cut timestamps into scene spans.
pub struct FfmpegSceneSegmenter {
    scene_threshold: f64,
    fallback_interval_secs: f64,
    min_scene_secs: f64,
}

impl FfmpegSceneSegmenter {
    pub fn new(scene_threshold: f64, fallback_interval_secs: f64, min_scene_secs: f64) -> Self {
        Self {
            scene_threshold,
            fallback_interval_secs,
            min_scene_secs,
        }
    }
}

#[async_trait]
impl SceneSegmenter for FfmpegSceneSegmenter {
    async fn segment(&self, video_path: &Path) -> Result<Vec<Scene>, SegmentError> {
        let path = video_path.to_path_buf();
        let threshold = self.scene_threshold;
        let interval = self.fallback_interval_secs;
        let min_scene = self.min_scene_secs;

        tokio::task::spawn_blocking(move || {
            let duration =
                probe_video_duration(&path).map_err(|e| SegmentError::Probe(e.to_string()))?;

            let cuts = detect_cuts(&path, threshold)?;
            debug!(
                video = %path.display(),
                duration,
                cuts = cuts.len(),
                "scene detection finished"
            );

            if cuts.is_empty() {
                Ok(fallback_scenes(duration, interval))
            } else {
                Ok(scenes_from_cuts(&cuts, duration, min_scene))
            }
        })
        .await
        .map_err(|e| SegmentError::Task(e.to_string()))?
    }
}

fn detect_cuts(video_path: &Path, scene_threshold: f64) -> Result<Vec<f64>, SegmentError> {
    let args = build_detect_args(video_path, scene_threshold);
    let output = Command::new("ffmpeg")
        .args(&args)
        .output()
        .map_err(|e| SegmentError::Decode(format!("failed to run ffmpeg: {e}")))?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    if !output.status.success() {
        let detail = stderr
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .unwrap_or("no output");
        return Err(SegmentError::Decode(format!(
            "ffmpeg exited with {}: {detail}",
            output.status
        )));
    }

    Ok(parse_showinfo_times(&stderr))
}

fn build_detect_args(video_path: &Path, scene_threshold: f64) -> Vec<String> {
    vec![
        "-hide_banner".to_string(),
        "-i".to_string(),
        video_path.to_string_lossy().to_string(),
        "-vf".to_string(),
        format!("select='gt(scene,{scene_threshold})',showinfo"),
        "-f".to_string(),
        "null".to_string(),
        "-".to_string(),
    ]
}

/// Pull `pts_time:` values out of showinfo's stderr log. Each matching
/// line describes one frame that passed the scene-change select filter.
fn parse_showinfo_times(log: &str) -> Vec<f64> {
    let mut times = Vec::new();
    for line in log.lines() {
        if !line.contains("Parsed_showinfo") {
            continue;
        }
        let Some(idx) = line.find("pts_time:") else {
            continue;
        };
        let rest = &line[idx + "pts_time:".len()..];
        if let Some(token) = rest.split_whitespace().next() {
            if let Ok(t) = token.parse::<f64>() {
                times.push(t);
            }
        }
    }
    times
}
