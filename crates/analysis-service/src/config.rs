//! Service configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Runtime configuration for the analysis service.
///
/// Every field has a default suitable for local development; production
/// deployments override them through the environment.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Address the HTTP server binds to.
    pub listen_addr: String,

    /// Root directory for uploaded videos and batch job artifacts.
    pub data_dir: PathBuf,

    /// Which frame labeler backend to run: "onnx" or "mock".
    pub labeler: String,

    /// Path to the ONNX detection model.
    pub model_path: PathBuf,

    /// Minimum confidence for a detection to be kept.
    pub confidence_threshold: f32,

    /// Scene-change score threshold passed to the ffmpeg select filter.
    pub scene_threshold: f64,

    /// Sampling interval in seconds used when no scene cuts are found.
    pub fallback_interval_secs: f64,

    /// Scene cuts closer together than this are collapsed into one scene.
    pub min_scene_secs: f64,

    /// Extracted frames wider than this are downscaled before labeling.
    pub max_frame_width: u32,

    /// ffmpeg JPEG quality for extracted frames (2 best, 31 worst).
    pub jpeg_quality: u32,

    /// API key for the generative describer. Descriptions are skipped
    /// when unset.
    pub gemini_api_key: Option<String>,

    /// Model name sent to the generative describer.
    pub describer_model: String,
}

impl AnalysisConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            listen_addr: env::var("ANALYSIS_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            data_dir: PathBuf::from(env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string())),
            labeler: env::var("LABELER").unwrap_or_else(|_| "onnx".to_string()),
            model_path: PathBuf::from(
                env::var("MODEL_PATH").unwrap_or_else(|_| "models/lecture-elements.onnx".to_string()),
            ),
            confidence_threshold: env_or("CONFIDENCE_THRESHOLD", 0.5)?,
            scene_threshold: env_or("SCENE_THRESHOLD", 0.3)?,
            fallback_interval_secs: env_or("FALLBACK_INTERVAL_SECS", 3.0)?,
            min_scene_secs: env_or("MIN_SCENE_SECS", 0.5)?,
            max_frame_width: env_or("MAX_FRAME_WIDTH", 1024)?,
            jpeg_quality: env_or("JPEG_QUALITY", 5)?,
            gemini_api_key: env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty()),
            describer_model: env::var("DESCRIBER_MODEL")
                .unwrap_or_else(|_| "gemini-1.5-flash".to_string()),
        })
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("invalid value for {key}: {raw}")),
        Err(_) => Ok(default),
    }
}
