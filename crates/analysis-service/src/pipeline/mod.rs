//! The scene analysis pipeline.
//!
//! One pipeline drives both transports. Streaming analysis pushes events
//! into an SSE channel; batch analysis folds the same events into a result
//! document. The pipeline owns event ordering and wire rounding; sinks
//! only deliver.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use tracing::{debug, instrument, warn};

use common::analysis::{round1, round2, FrameAnalysis, Scene, Summary};
use common::events::{PipelineEvent, ProgressStage};
use common::video::encode_frame_base64;

use crate::detect::FrameLabeler;
use crate::frames::FrameExtractor;
use crate::segment::SceneSegmenter;

mod document_sink;
mod sink;

pub use document_sink::DocumentSink;
pub use sink::{ChannelSink, CollectSink, EventSink, SinkClosed};

/// Pause between scenes so transports can flush progressive updates.
const INTER_SCENE_DELAY: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Stream,
    Batch,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Stream => "stream",
            RunMode::Batch => "batch",
        }
    }
}

enum RunOutcome {
    Completed,
    SegmentFailed,
}

/// Segments a video, labels one representative frame per scene, and
/// reports everything as events.
#[derive(Clone)]
pub struct ScenePipeline {
    segmenter: Arc<dyn SceneSegmenter>,
    extractor: Arc<dyn FrameExtractor>,
    labeler: Arc<dyn FrameLabeler>,
}

impl ScenePipeline {
    pub fn new(
        segmenter: Arc<dyn SceneSegmenter>,
        extractor: Arc<dyn FrameExtractor>,
        labeler: Arc<dyn FrameLabeler>,
    ) -> Self {
        Self {
            segmenter,
            extractor,
            labeler,
        }
    }

    pub fn labeler(&self) -> &Arc<dyn FrameLabeler> {
        &self.labeler
    }

    /// Run the full analysis over `video_path`, emitting events into
    /// `sink`.
    ///
    /// Returns `Err(SinkClosed)` only when the consumer disconnected.
    /// Pipeline failures are reported through the sink: per-frame errors
    /// as progress updates, segmentation failure as a terminal `error`
    /// event.
    #[instrument(skip_all, fields(mode = mode.as_str(), video = %video_path.display()))]
    pub async fn run<S: EventSink>(
        &self,
        video_path: &Path,
        mode: RunMode,
        sink: &mut S,
    ) -> Result<(), SinkClosed> {
        telemetry::metrics::ANALYSIS_ACTIVE_RUNS.inc();
        let result = self.run_inner(video_path, sink).await;
        telemetry::metrics::ANALYSIS_ACTIVE_RUNS.dec();

        let outcome = match &result {
            Ok(RunOutcome::Completed) => "completed",
            Ok(RunOutcome::SegmentFailed) => "error",
            Err(SinkClosed) => "disconnected",
        };
        telemetry::metrics::ANALYSIS_RUNS
            .with_label_values(&[mode.as_str(), outcome])
            .inc();

        result.map(|_| ())
    }

    async fn run_inner<S: EventSink>(
        &self,
        video_path: &Path,
        sink: &mut S,
    ) -> Result<RunOutcome, SinkClosed> {
        let started = Instant::now();

        sink.emit(PipelineEvent::progress(
            ProgressStage::Scenes,
            "Analyzing video and detecting scene transitions...",
        ))
        .await?;

        let segmentation_started = Instant::now();
        let scenes = match self.segmenter.segment(video_path).await {
            Ok(scenes) => scenes,
            Err(e) => {
                warn!(video = %video_path.display(), error = %e, "scene segmentation failed");
                sink.emit(PipelineEvent::error(e.to_string())).await?;
                return Ok(RunOutcome::SegmentFailed);
            }
        };
        telemetry::metrics::ANALYSIS_SEGMENTATION_TIME
            .observe(segmentation_started.elapsed().as_secs_f64());
        telemetry::metrics::ANALYSIS_SCENES_PER_RUN.observe(scenes.len() as f64);

        let total = scenes.len();
        sink.emit(PipelineEvent::SceneCount {
            total_scenes: total,
        })
        .await?;

        if total == 0 {
            sink.emit(PipelineEvent::Complete {
                summary: Summary::zero(round1(started.elapsed().as_secs_f64())),
            })
            .await?;
            return Ok(RunOutcome::Completed);
        }

        sink.emit(PipelineEvent::progress(
            ProgressStage::Scenes,
            format!("{total} scenes detected."),
        ))
        .await?;
        sink.emit(PipelineEvent::progress_at(
            ProgressStage::Labeling,
            "Starting visual element detection...",
            0,
            total,
        ))
        .await?;

        let mut analyzed = 0usize;
        let mut frames_with_elements = 0usize;
        let mut emit_index = 0usize;

        for (i, scene) in scenes.iter().enumerate() {
            sink.emit(PipelineEvent::progress_at(
                ProgressStage::Labeling,
                format!("Analyzing frame {}/{total}...", i + 1),
                i + 1,
                total,
            ))
            .await?;

            analyzed += 1;
            match self.analyze_scene(video_path, scene).await {
                Ok((jpeg, analysis)) => {
                    telemetry::metrics::ANALYSIS_FRAMES_PROCESSED
                        .with_label_values(&["success"])
                        .inc();

                    if analysis.has_relevant() {
                        frames_with_elements += 1;
                        telemetry::metrics::ANALYSIS_FRAMES_WITH_ELEMENTS.inc();

                        sink.emit(PipelineEvent::FrameDetected {
                            timestamp: round2(scene.midpoint()),
                            scene_start: round2(scene.start),
                            scene_end: round2(scene.end),
                            scene_index: emit_index,
                            image_base64: encode_frame_base64(&jpeg),
                            detections: analysis.detections.iter().map(|d| d.rounded()).collect(),
                        })
                        .await?;
                        emit_index += 1;
                    }
                }
                Err(e) => {
                    telemetry::metrics::ANALYSIS_FRAMES_PROCESSED
                        .with_label_values(&["error"])
                        .inc();
                    warn!(scene = i, error = %e, "frame analysis failed, continuing");

                    sink.emit(PipelineEvent::progress_at(
                        ProgressStage::Labeling,
                        format!("Error on frame {}: {e:#}. Continuing...", i + 1),
                        i + 1,
                        total,
                    ))
                    .await?;
                }
            }

            tokio::time::sleep(INTER_SCENE_DELAY).await;
        }

        sink.emit(PipelineEvent::progress(
            ProgressStage::Done,
            "Analysis complete.",
        ))
        .await?;
        sink.emit(PipelineEvent::Complete {
            summary: Summary {
                total_scenes: total,
                total_analyzed: analyzed,
                frames_with_elements,
                processing_time: round1(started.elapsed().as_secs_f64()),
            },
        })
        .await?;

        Ok(RunOutcome::Completed)
    }

    async fn analyze_scene(
        &self,
        video_path: &Path,
        scene: &Scene,
    ) -> anyhow::Result<(Vec<u8>, FrameAnalysis)> {
        let timestamp = scene.midpoint();
        let jpeg = self
            .extractor
            .extract(video_path, timestamp)
            .await
            .with_context(|| format!("failed to extract frame at {timestamp:.2}s"))?;

        let label_started = Instant::now();
        let analysis = self
            .labeler
            .label(&jpeg)
            .await
            .context("failed to label frame")?;
        telemetry::metrics::ANALYSIS_LABEL_TIME
            .with_label_values(&[self.labeler.id()])
            .observe(label_started.elapsed().as_secs_f64());

        debug!(
            timestamp,
            detections = analysis.detections.len(),
            raw = analysis.raw_count,
            "labeled frame"
        );

        Ok((jpeg, analysis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{MockFrameLabeler, ScriptedResponse};
    use crate::frames::MockFrameExtractor;
    use crate::segment::MockSceneSegmenter;
    use common::analysis::{BoundingBox, Detection};

    fn detection(class_name: &str, confidence: f32) -> Detection {
        Detection {
            class_name: class_name.to_string(),
            confidence,
            bbox: BoundingBox([10.0, 20.0, 110.0, 220.0]),
        }
    }

    fn analysis_with(detections: Vec<Detection>) -> FrameAnalysis {
        let raw_count = detections.len();
        FrameAnalysis {
            detections,
            raw_count,
        }
    }

    fn pipeline(
        segmenter: MockSceneSegmenter,
        labeler: MockFrameLabeler,
    ) -> ScenePipeline {
        ScenePipeline::new(
            Arc::new(segmenter),
            Arc::new(MockFrameExtractor::with_bytes(vec![0xff, 0xd8, 0xff])),
            Arc::new(labeler),
        )
    }

    #[tokio::test]
    async fn test_event_order_with_detections() {
        let pipeline = pipeline(
            MockSceneSegmenter::with_scenes(vec![Scene::new(0.0, 4.0), Scene::new(4.0, 8.0)]),
            MockFrameLabeler::with_script(vec![
                ScriptedResponse::Analysis(analysis_with(vec![detection("table", 0.91234)])),
                ScriptedResponse::Analysis(FrameAnalysis::default()),
            ]),
        );

        let mut sink = CollectSink::new();
        pipeline
            .run(Path::new("/tmp/video.mp4"), RunMode::Stream, &mut sink)
            .await
            .unwrap();

        let events = &sink.events;
        assert!(matches!(events[0], PipelineEvent::Progress { .. }));
        assert!(matches!(
            events[1],
            PipelineEvent::SceneCount { total_scenes: 2 }
        ));

        let frames: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, PipelineEvent::FrameDetected { .. }))
            .collect();
        assert_eq!(frames.len(), 1);
        if let PipelineEvent::FrameDetected {
            timestamp,
            scene_index,
            detections,
            ..
        } = frames[0]
        {
            assert_eq!(*timestamp, 2.0);
            assert_eq!(*scene_index, 0);
            assert_eq!(detections[0].confidence, 0.912);
        }

        match events.last() {
            Some(PipelineEvent::Complete { summary }) => {
                assert_eq!(summary.total_scenes, 2);
                assert_eq!(summary.total_analyzed, 2);
                assert_eq!(summary.frames_with_elements, 1);
            }
            other => panic!("expected terminal complete, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_zero_scenes_emits_three_events() {
        let pipeline = pipeline(
            MockSceneSegmenter::with_scenes(vec![]),
            MockFrameLabeler::empty(),
        );

        let mut sink = CollectSink::new();
        pipeline
            .run(Path::new("/tmp/video.mp4"), RunMode::Stream, &mut sink)
            .await
            .unwrap();

        assert_eq!(sink.events.len(), 3);
        assert!(matches!(sink.events[0], PipelineEvent::Progress { .. }));
        assert!(matches!(
            sink.events[1],
            PipelineEvent::SceneCount { total_scenes: 0 }
        ));
        match &sink.events[2] {
            PipelineEvent::Complete { summary } => {
                assert_eq!(summary.total_scenes, 0);
                assert_eq!(summary.frames_with_elements, 0);
            }
            other => panic!("expected complete, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_segmentation_failure_is_terminal_error() {
        let pipeline = pipeline(
            MockSceneSegmenter::failing("corrupt container"),
            MockFrameLabeler::empty(),
        );

        let mut sink = CollectSink::new();
        pipeline
            .run(Path::new("/tmp/video.mp4"), RunMode::Stream, &mut sink)
            .await
            .unwrap();

        match sink.events.last() {
            Some(PipelineEvent::Error { message }) => {
                assert!(message.contains("corrupt container"));
            }
            other => panic!("expected terminal error, got {other:?}"),
        }
        assert_eq!(
            sink.events
                .iter()
                .filter(|e| e.is_terminal())
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_labeler_failure_continues_run() {
        let pipeline = pipeline(
            MockSceneSegmenter::with_scenes(vec![Scene::new(0.0, 4.0), Scene::new(4.0, 8.0)]),
            MockFrameLabeler::with_script(vec![
                ScriptedResponse::Error("inference failed".to_string()),
                ScriptedResponse::Analysis(analysis_with(vec![detection("chart-graph", 0.8)])),
            ]),
        );

        let mut sink = CollectSink::new();
        pipeline
            .run(Path::new("/tmp/video.mp4"), RunMode::Stream, &mut sink)
            .await
            .unwrap();

        let error_progress = sink.events.iter().any(|e| {
            matches!(e, PipelineEvent::Progress { message, .. } if message.contains("inference failed"))
        });
        assert!(error_progress);

        // the failed scene does not consume an emission index
        let frame_indices: Vec<usize> = sink
            .events
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::FrameDetected { scene_index, .. } => Some(*scene_index),
                _ => None,
            })
            .collect();
        assert_eq!(frame_indices, vec![0]);

        match sink.events.last() {
            Some(PipelineEvent::Complete { summary }) => {
                assert_eq!(summary.total_analyzed, 2);
                assert_eq!(summary.frames_with_elements, 1);
            }
            other => panic!("expected complete, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_disconnected_sink_abandons_run() {
        let pipeline = pipeline(
            MockSceneSegmenter::with_scenes(vec![
                Scene::new(0.0, 2.0),
                Scene::new(2.0, 4.0),
                Scene::new(4.0, 6.0),
            ]),
            MockFrameLabeler::empty(),
        );

        let mut sink = CollectSink::failing_after(2);
        let result = pipeline
            .run(Path::new("/tmp/video.mp4"), RunMode::Stream, &mut sink)
            .await;

        assert!(result.is_err());
        assert_eq!(sink.events.len(), 2);
        assert!(!sink.events.iter().any(|e| e.is_terminal()));
    }
}
