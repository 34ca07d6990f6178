//! Shared service state handed to every HTTP handler.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use common::events::PipelineEvent;

use crate::config::AnalysisConfig;
use crate::describe::Descriptor;
use crate::jobs::{JobStore, StoredJob};
use crate::pipeline::{ChannelSink, DocumentSink, RunMode, ScenePipeline};

/// Bounded event queue per streaming run. A slow consumer applies
/// backpressure instead of dropping events.
const STREAM_CHANNEL_CAPACITY: usize = 32;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AnalysisConfig,
    pipeline: ScenePipeline,
    descriptor: Option<Arc<dyn Descriptor>>,
    jobs: JobStore,
}

/// An upload staged in temporary storage. The analysis task owns the
/// `TempDir`, so the staged file is removed when the run completes,
/// fails, or is abandoned.
pub struct StagedUpload {
    pub temp_dir: tempfile::TempDir,
    pub video_path: PathBuf,
}

impl AppState {
    pub fn new(
        config: AnalysisConfig,
        pipeline: ScenePipeline,
        descriptor: Option<Arc<dyn Descriptor>>,
        jobs: JobStore,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pipeline,
                descriptor,
                jobs,
            }),
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.inner.config
    }

    pub fn pipeline(&self) -> &ScenePipeline {
        &self.inner.pipeline
    }

    pub fn jobs(&self) -> &JobStore {
        &self.inner.jobs
    }

    /// Start a streaming analysis over a staged upload. The returned
    /// receiver yields events until the terminal one; dropping it
    /// abandons the run.
    pub fn start_stream(&self, staged: StagedUpload) -> mpsc::Receiver<PipelineEvent> {
        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        let pipeline = self.inner.pipeline.clone();

        tokio::spawn(async move {
            let mut sink = ChannelSink::new(tx);
            let result = pipeline
                .run(&staged.video_path, RunMode::Stream, &mut sink)
                .await;
            if result.is_err() {
                debug!(video = %staged.video_path.display(), "client disconnected, abandoning analysis");
            }
        });

        rx
    }

    /// Run a batch job in the background. Completion is observable only
    /// through the result file.
    pub fn spawn_batch(&self, job: StoredJob) {
        let pipeline = self.inner.pipeline.clone();
        let descriptor = self.inner.descriptor.clone();

        tokio::spawn(async move {
            let mut sink = DocumentSink::new(descriptor, job.result_path.clone());
            // DocumentSink has no consumer to lose, so this cannot fail.
            let _ = pipeline
                .run(&job.video_path, RunMode::Batch, &mut sink)
                .await;
        });
    }
}
