use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::info;

use analysis_service::describe::{Descriptor, GenerativeDescriber};
use analysis_service::detect::{FrameLabeler, MockFrameLabeler, OnnxFrameLabeler, OnnxLabelerConfig};
use analysis_service::frames::FfmpegFrameExtractor;
use analysis_service::jobs::JobStore;
use analysis_service::pipeline::ScenePipeline;
use analysis_service::segment::FfmpegSceneSegmenter;
use analysis_service::{api, AnalysisConfig, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_with_service("analysis-service");

    let config = AnalysisConfig::from_env()?;

    let labeler: Arc<dyn FrameLabeler> = match config.labeler.as_str() {
        "mock" => {
            info!("using mock frame labeler");
            Arc::new(MockFrameLabeler::empty())
        }
        _ => {
            let labeler_config = OnnxLabelerConfig {
                model_path: config.model_path.clone(),
                confidence_threshold: config.confidence_threshold,
                ..OnnxLabelerConfig::default()
            };
            Arc::new(
                OnnxFrameLabeler::load(labeler_config)
                    .context("failed to initialize detection model")?,
            )
        }
    };

    let segmenter = Arc::new(FfmpegSceneSegmenter::new(
        config.scene_threshold,
        config.fallback_interval_secs,
        config.min_scene_secs,
    ));
    let extractor = Arc::new(FfmpegFrameExtractor::new(
        config.max_frame_width,
        config.jpeg_quality,
    ));
    let pipeline = ScenePipeline::new(segmenter, extractor, labeler);

    let descriptor: Option<Arc<dyn Descriptor>> = config.gemini_api_key.clone().map(|key| {
        Arc::new(GenerativeDescriber::new(key, config.describer_model.clone()))
            as Arc<dyn Descriptor>
    });
    if descriptor.is_none() {
        info!("no describer API key configured, batch descriptions disabled");
    }

    let jobs = JobStore::new(config.data_dir.clone());
    tokio::fs::create_dir_all(jobs.jobs_dir())
        .await
        .context("failed to create jobs directory")?;

    let listen_addr = config.listen_addr.clone();
    let state = AppState::new(config, pipeline, descriptor, jobs);
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("failed to bind {listen_addr}"))?;
    info!(addr = %listen_addr, "analysis service listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
