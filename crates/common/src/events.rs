//! Pipeline event contracts.
//!
//! Every update the analysis pipeline produces is one `PipelineEvent`,
//! serialized as an internally tagged JSON object (`"type"` field). Consumers
//! switch on the tag; unknown fields never appear outside their variant.

use crate::analysis::{Detection, Summary};
use serde::{Deserialize, Serialize};

/// Pipeline phase reported with progress events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStage {
    /// Scene segmentation is running
    Scenes,

    /// Per-scene frame labeling is running
    Labeling,

    /// All scenes processed, summary pending
    Done,
}

impl std::fmt::Display for ProgressStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProgressStage::Scenes => write!(f, "scenes"),
            ProgressStage::Labeling => write!(f, "labeling"),
            ProgressStage::Done => write!(f, "done"),
        }
    }
}

/// One update from the analysis pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// Heartbeat carrying a human-readable status line
    Progress {
        stage: ProgressStage,
        message: String,

        /// 1-based scene counter, present only during labeling
        #[serde(skip_serializing_if = "Option::is_none")]
        current: Option<usize>,

        #[serde(skip_serializing_if = "Option::is_none")]
        total: Option<usize>,
    },

    /// Segmentation finished; fixes the denominator for the run
    SceneCount { total_scenes: usize },

    /// A representative frame produced at least one relevant detection
    FrameDetected {
        /// Representative-frame timestamp (scene midpoint, seconds)
        timestamp: f64,

        /// Scene span, rounded to two decimals
        scene_start: f64,
        scene_end: f64,

        /// Dense 0-based index in emission order
        scene_index: usize,

        /// Base64 JPEG of the analyzed frame
        image_base64: String,

        /// Relevant detections, boxes in analyzed-frame pixels
        detections: Vec<Detection>,
    },

    /// Terminal: the run finished and totals are final
    Complete { summary: Summary },

    /// Terminal: the run failed before or during analysis
    Error { message: String },
}

impl PipelineEvent {
    pub fn progress(stage: ProgressStage, message: impl Into<String>) -> Self {
        PipelineEvent::Progress {
            stage,
            message: message.into(),
            current: None,
            total: None,
        }
    }

    pub fn progress_at(
        stage: ProgressStage,
        message: impl Into<String>,
        current: usize,
        total: usize,
    ) -> Self {
        PipelineEvent::Progress {
            stage,
            message: message.into(),
            current: Some(current),
            total: Some(total),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        PipelineEvent::Error {
            message: message.into(),
        }
    }

    /// Terminal events close the stream; exactly one is emitted per run
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineEvent::Complete { .. } | PipelineEvent::Error { .. }
        )
    }
}
