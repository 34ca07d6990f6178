//! Analysis contracts shared between the pipeline and its consumers.
//!
//! This module defines the scene and detection types that flow through the
//! incremental analysis pipeline and across the wire.

use serde::{Deserialize, Serialize};

/// A contiguous span of a video, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    /// Span start in seconds
    pub start: f64,

    /// Span end in seconds (exclusive, except the final span)
    pub end: f64,
}

impl Scene {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Midpoint timestamp used to pick the representative frame
    pub fn midpoint(&self) -> f64 {
        (self.start + self.end) / 2.0
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Corner-form bounding box `[x1, y1, x2, y2]` in pixels.
///
/// Coordinates are in the pixel space of the analyzed frame, which is the
/// same (possibly downscaled) frame transported to clients, so boxes overlay
/// the transmitted image without rescaling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoundingBox(pub [f32; 4]);

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self([x1, y1, x2, y2])
    }

    pub fn x1(&self) -> f32 {
        self.0[0]
    }

    pub fn y1(&self) -> f32 {
        self.0[1]
    }

    pub fn x2(&self) -> f32 {
        self.0[2]
    }

    pub fn y2(&self) -> f32 {
        self.0[3]
    }

    pub fn width(&self) -> f32 {
        self.0[2] - self.0[0]
    }

    pub fn height(&self) -> f32 {
        self.0[3] - self.0[1]
    }

    /// Corners rounded to one decimal for transport
    pub fn rounded(&self) -> Self {
        Self([
            round1_f32(self.0[0]),
            round1_f32(self.0[1]),
            round1_f32(self.0[2]),
            round1_f32(self.0[3]),
        ])
    }
}

/// A single labeled region in a frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Element class (e.g., "table", "chart-graph")
    pub class_name: String,

    /// Detection confidence (0.0 to 1.0), rounded to three decimals
    pub confidence: f32,

    /// Bounding box in analyzed-frame pixels
    pub bbox: BoundingBox,
}

impl Detection {
    /// Transport form: confidence to three decimals, box corners to one
    pub fn rounded(&self) -> Self {
        Self {
            class_name: self.class_name.clone(),
            confidence: round3(self.confidence),
            bbox: self.bbox.rounded(),
        }
    }
}

/// Outcome of labeling one frame.
///
/// `detections` holds only the classes relevant to consumers; `raw_count`
/// counts everything above the confidence threshold, so a frame with
/// detections that were all filtered out is distinguishable from a frame
/// with no detections at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameAnalysis {
    pub detections: Vec<Detection>,
    pub raw_count: usize,
}

impl FrameAnalysis {
    /// True when at least one relevant element was found
    pub fn has_relevant(&self) -> bool {
        !self.detections.is_empty()
    }
}

/// End-of-run totals reported with the terminal `complete` event
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Scenes the segmenter produced
    pub total_scenes: usize,

    /// Scenes the labeling loop iterated (equals `total_scenes` on a full run)
    pub total_analyzed: usize,

    /// Frames that produced at least one relevant detection
    pub frames_with_elements: usize,

    /// Wall-clock seconds for the whole run, rounded to one decimal
    pub processing_time: f64,
}

impl Summary {
    pub fn zero(processing_time: f64) -> Self {
        Self {
            total_scenes: 0,
            total_analyzed: 0,
            frames_with_elements: 0,
            processing_time,
        }
    }
}

/// One detected element in the batch result document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneRecord {
    /// Scene start in seconds
    pub start: f64,

    /// Scene end in seconds
    pub end: f64,

    /// Element class of the detection
    pub label: String,

    /// Generated description, or an empty object when none was produced
    #[serde(default)]
    pub description: serde_json::Value,
}

/// Round to one decimal place
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Round to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Round to three decimal places
pub fn round3(value: f32) -> f32 {
    (value * 1000.0).round() / 1000.0
}

fn round1_f32(value: f32) -> f32 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_midpoint() {
        let scene = Scene::new(2.0, 5.0);
        assert_eq!(scene.midpoint(), 3.5);
        assert_eq!(scene.duration(), 3.0);
    }

    #[test]
    fn test_bounding_box_serializes_as_array() {
        let bbox = BoundingBox::new(10.0, 20.0, 110.0, 220.0);
        let json = serde_json::to_string(&bbox).unwrap();
        assert_eq!(json, "[10.0,20.0,110.0,220.0]");

        let deserialized: BoundingBox = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, bbox);
    }

    #[test]
    fn test_detection_rounding() {
        let detection = Detection {
            class_name: "table".to_string(),
            confidence: 0.87654,
            bbox: BoundingBox::new(10.4567, 20.013, 110.99, 220.0),
        };

        let rounded = detection.rounded();
        assert_eq!(rounded.confidence, 0.877);
        assert_eq!(rounded.bbox, BoundingBox::new(10.5, 20.0, 111.0, 220.0));
    }

    #[test]
    fn test_frame_analysis_distinguishes_filtered_from_empty() {
        let empty = FrameAnalysis::default();
        assert!(!empty.has_relevant());
        assert_eq!(empty.raw_count, 0);

        let filtered = FrameAnalysis {
            detections: vec![],
            raw_count: 3,
        };
        assert!(!filtered.has_relevant());
        assert_eq!(filtered.raw_count, 3);
    }

    #[test]
    fn test_scene_record_serialization() {
        let record = SceneRecord {
            start: 1.5,
            end: 4.5,
            label: "chart-graph".to_string(),
            description: serde_json::json!({}),
        };

        let json = serde_json::to_string(&record).unwrap();
        let deserialized: SceneRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.label, record.label);
        assert_eq!(deserialized.description, serde_json::json!({}));
    }

    #[test]
    fn test_rounding_helpers() {
        assert_eq!(round1(12.3456), 12.3);
        assert_eq!(round2(3.14159), 3.14);
        assert_eq!(round3(0.123456), 0.123);
    }
}
