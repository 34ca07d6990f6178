//! Batch result collection.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use serde_json::json;
use tracing::{debug, error, warn};

use common::analysis::{BoundingBox, Detection, SceneRecord};
use common::events::PipelineEvent;

use crate::describe::Descriptor;

use super::{EventSink, SinkClosed};

/// Folds pipeline events into a result document on disk.
///
/// Consumes the same event stream the SSE transport sees. Detection crops
/// are described when a descriptor is configured; a failed description
/// degrades to an empty placeholder so one bad crop never sinks the job.
pub struct DocumentSink {
    descriptor: Option<Arc<dyn Descriptor>>,
    result_path: PathBuf,
    records: Vec<SceneRecord>,
}

impl DocumentSink {
    pub fn new(descriptor: Option<Arc<dyn Descriptor>>, result_path: PathBuf) -> Self {
        Self {
            descriptor,
            result_path,
            records: Vec::new(),
        }
    }

    async fn collect_frame(
        &mut self,
        scene_start: f64,
        scene_end: f64,
        image_base64: &str,
        detections: &[Detection],
    ) {
        let frame = match decode_frame(image_base64) {
            Ok(frame) => Some(frame),
            Err(e) => {
                warn!(error = %e, "failed to decode frame for description");
                None
            }
        };

        for detection in detections {
            let description = match &frame {
                Some(frame) => self.describe_crop(frame, detection).await,
                None => json!({}),
            };
            self.records.push(SceneRecord {
                start: scene_start,
                end: scene_end,
                label: detection.class_name.clone(),
                description,
            });
        }
    }

    async fn describe_crop(&self, frame: &DynamicImage, detection: &Detection) -> serde_json::Value {
        let Some(descriptor) = &self.descriptor else {
            return json!({});
        };

        let crop = match crop_detection(frame, &detection.bbox) {
            Ok(crop) => crop,
            Err(e) => {
                warn!(label = %detection.class_name, error = %e, "failed to crop detection");
                return json!({});
            }
        };

        match descriptor.describe(&crop).await {
            Ok(value) => {
                telemetry::metrics::DESCRIBE_REQUESTS
                    .with_label_values(&["success"])
                    .inc();
                value
            }
            Err(e) => {
                telemetry::metrics::DESCRIBE_REQUESTS
                    .with_label_values(&["error"])
                    .inc();
                warn!(label = %detection.class_name, error = %e, "describe failed");
                json!({})
            }
        }
    }

    /// Write the record list as pretty JSON, temp file then rename so a
    /// half-written document is never observable as a result.
    async fn persist(&self) -> anyhow::Result<()> {
        let body = serde_json::to_vec_pretty(&self.records)?;
        let tmp = self.result_path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &body).await?;
        tokio::fs::rename(&tmp, &self.result_path).await?;
        debug!(
            path = %self.result_path.display(),
            records = self.records.len(),
            "persisted result document"
        );
        Ok(())
    }
}

#[async_trait]
impl EventSink for DocumentSink {
    async fn emit(&mut self, event: PipelineEvent) -> Result<(), SinkClosed> {
        match event {
            PipelineEvent::FrameDetected {
                scene_start,
                scene_end,
                image_base64,
                detections,
                ..
            } => {
                self.collect_frame(scene_start, scene_end, &image_base64, &detections)
                    .await;
            }
            PipelineEvent::Complete { .. } => {
                if let Err(e) = self.persist().await {
                    error!(
                        path = %self.result_path.display(),
                        error = %e,
                        "failed to persist result document"
                    );
                }
            }
            PipelineEvent::Error { message } => {
                debug!(message = %message, "batch run failed, result discarded");
            }
            _ => {}
        }
        Ok(())
    }
}

fn decode_frame(image_base64: &str) -> anyhow::Result<DynamicImage> {
    let bytes = base64::engine::general_purpose::STANDARD.decode(image_base64)?;
    Ok(image::load_from_memory(&bytes)?)
}

/// Crop the detection box out of the frame, clamped to image bounds, and
/// re-encode as JPEG for the describer.
fn crop_detection(frame: &DynamicImage, bbox: &BoundingBox) -> anyhow::Result<Vec<u8>> {
    anyhow::ensure!(frame.width() >= 1 && frame.height() >= 1, "empty frame");

    let frame_w = frame.width() as f32;
    let frame_h = frame.height() as f32;

    let x1 = bbox.x1().clamp(0.0, frame_w - 1.0);
    let y1 = bbox.y1().clamp(0.0, frame_h - 1.0);
    let x2 = bbox.x2().clamp(x1 + 1.0, frame_w);
    let y2 = bbox.y2().clamp(y1 + 1.0, frame_h);

    let crop = frame.crop_imm(x1 as u32, y1 as u32, (x2 - x1) as u32, (y2 - y1) as u32);

    let mut buf = Vec::new();
    crop.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, 80))?;
    Ok(buf)
}
