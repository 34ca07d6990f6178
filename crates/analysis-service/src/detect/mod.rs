//! Frame labeling: object detection over extracted frames.

use async_trait::async_trait;

use common::analysis::FrameAnalysis;

mod mock_labeler;
mod onnx_labeler;

pub use mock_labeler::{MockFrameLabeler, ScriptedResponse};
pub use onnx_labeler::{OnnxFrameLabeler, OnnxLabelerConfig};

#[async_trait]
pub trait FrameLabeler: Send + Sync {
    /// Short identifier used in logs and metrics labels.
    fn id(&self) -> &'static str;

    /// Run detection over a single JPEG frame.
    async fn label(&self, jpeg: &[u8]) -> anyhow::Result<FrameAnalysis>;

    /// Whether the labeler is ready to serve. Defaults to healthy.
    async fn healthy(&self) -> bool {
        true
    }
}

/// Classes that count as visual elements worth reporting. Detections
/// outside this set still contribute to `raw_count` but are filtered
/// from the reported list.
pub fn default_relevant_classes() -> Vec<String> {
    vec![
        "table".to_string(),
        "chart-graph".to_string(),
        "visual-illustration".to_string(),
        "photographic-image".to_string(),
    ]
}
