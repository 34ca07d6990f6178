//! Frame labeling with a YOLOv8-style detection model via ONNX Runtime.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use image::DynamicImage;
use ndarray::{Array, IxDyn};
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::Value,
};
use tracing::info;

use common::analysis::{BoundingBox, Detection, FrameAnalysis};

use super::{default_relevant_classes, FrameLabeler};

#[derive(Debug, Clone)]
pub struct OnnxLabelerConfig {
    /// Path to the ONNX model file.
    pub model_path: PathBuf,

    /// Minimum confidence for a detection to be kept.
    pub confidence_threshold: f32,

    /// IoU threshold for non-maximum suppression.
    pub iou_threshold: f32,

    /// Maximum number of detections per frame.
    pub max_detections: usize,

    /// Model input size (width and height).
    pub input_size: u32,

    /// Class names in model output order.
    pub class_names: Vec<String>,

    /// Classes reported as visual elements.
    pub relevant_classes: Vec<String>,

    /// Number of intra-operation threads.
    pub intra_threads: usize,

    /// Number of inter-operation threads.
    pub inter_threads: usize,
}

fn default_lecture_classes() -> Vec<String> {
    vec![
        "table",
        "chart-graph",
        "visual-illustration",
        "photographic-image",
        "person",
        "slide-text",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for OnnxLabelerConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/lecture-elements.onnx"),
            confidence_threshold: 0.5,
            iou_threshold: 0.45,
            max_detections: 100,
            input_size: 640,
            class_names: default_lecture_classes(),
            relevant_classes: default_relevant_classes(),
            intra_threads: 4,
            inter_threads: 1,
        }
    }
}

/// Detection labeler backed by an ONNX Runtime session. The session is
/// shared behind a mutex; inference runs on the blocking thread pool.
pub struct OnnxFrameLabeler {
    config: OnnxLabelerConfig,
    session: Arc<Mutex<Session>>,
}

impl OnnxFrameLabeler {
    pub fn load(config: OnnxLabelerConfig) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(config.intra_threads)?
            .with_inter_threads(config.inter_threads)?
            .commit_from_file(&config.model_path)
            .with_context(|| format!("failed to load model {}", config.model_path.display()))?;

        info!(
            model = %config.model_path.display(),
            confidence = config.confidence_threshold,
            input_size = config.input_size,
            "loaded detection model"
        );

        Ok(Self {
            config,
            session: Arc::new(Mutex::new(session)),
        })
    }
}

#[async_trait]
impl FrameLabeler for OnnxFrameLabeler {
    fn id(&self) -> &'static str {
        "onnx"
    }

    async fn label(&self, jpeg: &[u8]) -> Result<FrameAnalysis> {
        let session = Arc::clone(&self.session);
        let config = self.config.clone();
        let jpeg = jpeg.to_vec();

        tokio::task::spawn_blocking(move || run_inference(&session, &config, &jpeg))
            .await
            .context("inference task panicked")?
    }
}

fn run_inference(
    session: &Mutex<Session>,
    config: &OnnxLabelerConfig,
    jpeg: &[u8],
) -> Result<FrameAnalysis> {
    let img = image::load_from_memory(jpeg).context("failed to load frame image")?;
    let original_width = img.width();
    let original_height = img.height();

    let input_array = preprocess_frame(&img, config.input_size);
    let input_tensor = Value::from_array(input_array)?;

    let mut session = session
        .lock()
        .map_err(|e| anyhow::anyhow!("failed to lock session: {e}"))?;
    let outputs = session.run(ort::inputs![input_tensor])?;

    let output_value = outputs.get("output0").context("no output tensor found")?;
    let (shape, data) = output_value.try_extract_tensor::<f32>()?;
    let shape_usize: Vec<usize> = shape.as_ref().iter().map(|&x| x as usize).collect();
    anyhow::ensure!(
        shape_usize.len() == 3 && shape_usize[1] > 4,
        "unexpected model output shape {shape_usize:?}"
    );

    let output = Array::from_shape_vec(IxDyn(&shape_usize), data.to_vec())?;
    let kept = postprocess_output(&output, config, original_width, original_height);

    Ok(select_relevant(kept, config))
}

/// Name every kept box and keep only allowlisted classes in the reported
/// list. `raw_count` still counts everything above the threshold.
fn select_relevant(kept: Vec<(BoundingBox, f32, usize)>, config: &OnnxLabelerConfig) -> FrameAnalysis {
    let raw_count = kept.len();
    let detections = kept
        .into_iter()
        .map(|(bbox, confidence, class_idx)| {
            let class_name = config
                .class_names
                .get(class_idx)
                .cloned()
                .unwrap_or_else(|| format!("class_{class_idx}"));
            Detection {
                class_name,
                confidence,
                bbox,
            }
        })
        .filter(|d| config.relevant_classes.contains(&d.class_name))
        .collect();

    FrameAnalysis {
        detections,
        raw_count,
    }
}

/// Convert the frame to NCHW float input normalized to [0, 1].
fn preprocess_frame(img: &DynamicImage, input_size: u32) -> Array<f32, IxDyn> {
    let resized = img.resize_exact(input_size, input_size, image::imageops::FilterType::Triangle);
    let rgb = resized.to_rgb8();

    let size = input_size as usize;
    let mut input = Array::zeros(IxDyn(&[1, 3, size, size]));
    for (x, y, pixel) in rgb.enumerate_pixels() {
        input[[0, 0, y as usize, x as usize]] = pixel[0] as f32 / 255.0;
        input[[0, 1, y as usize, x as usize]] = pixel[1] as f32 / 255.0;
        input[[0, 2, y as usize, x as usize]] = pixel[2] as f32 / 255.0;
    }
    input
}

/// Decode YOLOv8 output `[batch, 4 + classes, anchors]` into scored boxes
/// in original-frame pixel coordinates, then suppress overlaps.
fn postprocess_output(
    output: &Array<f32, IxDyn>,
    config: &OnnxLabelerConfig,
    original_width: u32,
    original_height: u32,
) -> Vec<(BoundingBox, f32, usize)> {
    let scale_x = original_width as f32 / config.input_size as f32;
    let scale_y = original_height as f32 / config.input_size as f32;

    let num_classes = output.shape()[1] - 4;
    let num_predictions = output.shape()[2];

    let mut boxes = Vec::new();
    for i in 0..num_predictions {
        let mut best_score = 0.0f32;
        let mut best_class = 0;
        for class_idx in 0..num_classes {
            let score = output[[0, 4 + class_idx, i]];
            if score > best_score {
                best_score = score;
                best_class = class_idx;
            }
        }

        if best_score < config.confidence_threshold {
            continue;
        }

        let cx = output[[0, 0, i]];
        let cy = output[[0, 1, i]];
        let w = output[[0, 2, i]];
        let h = output[[0, 3, i]];

        let x1 = ((cx - w / 2.0) * scale_x).clamp(0.0, original_width as f32);
        let y1 = ((cy - h / 2.0) * scale_y).clamp(0.0, original_height as f32);
        let x2 = ((cx + w / 2.0) * scale_x).clamp(0.0, original_width as f32);
        let y2 = ((cy + h / 2.0) * scale_y).clamp(0.0, original_height as f32);

        boxes.push((BoundingBox([x1, y1, x2, y2]), best_score, best_class));
    }

    nms(boxes, config.iou_threshold)
        .into_iter()
        .take(config.max_detections)
        .collect()
}

fn nms(boxes: Vec<(BoundingBox, f32, usize)>, iou_threshold: f32) -> Vec<(BoundingBox, f32, usize)> {
    if boxes.is_empty() {
        return vec![];
    }

    let mut sorted = boxes;
    sorted.sort_by(|a, b| b.1.total_cmp(&a.1));

    let mut keep = Vec::new();
    while !sorted.is_empty() {
        let current = sorted.remove(0);
        sorted.retain(|candidate| iou(&current.0, &candidate.0) < iou_threshold);
        keep.push(current);
    }
    keep
}

fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let x1 = a.x1().max(b.x1());
    let y1 = a.y1().max(b.y1());
    let x2 = a.x2().min(b.x2());
    let y2 = a.y2().min(b.y2());

    let intersection = if x2 > x1 && y2 > y1 {
        (x2 - x1) * (y2 - y1)
    } else {
        0.0
    };

    let union = a.width() * a.height() + b.width() * b.height() - intersection;
    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}
