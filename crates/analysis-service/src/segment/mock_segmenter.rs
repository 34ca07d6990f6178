//! Canned segmenter for tests and local development without ffmpeg.

use std::path::Path;

use async_trait::async_trait;

use common::analysis::Scene;

use super::{SceneSegmenter, SegmentError};

pub struct MockSceneSegmenter {
    scenes: Vec<Scene>,
    fail_with: Option<String>,
}

impl MockSceneSegmenter {
    /// Always returns the given scenes, in order.
    pub fn with_scenes(scenes: Vec<Scene>) -> Self {
        Self {
            scenes,
            fail_with: None,
        }
    }

    /// Always fails with a decode error carrying the given message.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            scenes: Vec::new(),
            fail_with: Some(message.into()),
        }
    }
}

#[async_trait]
impl SceneSegmenter for MockSceneSegmenter {
    async fn segment(&self, _video_path: &Path) -> Result<Vec<Scene>, SegmentError> {
        if let Some(message) = &self.fail_with {
            return Err(SegmentError::Decode(message.clone()));
        }
        Ok(self.scenes.clone())
    }
}
