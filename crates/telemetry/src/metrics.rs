use lazy_static::lazy_static;
use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ==== Pipeline Metrics ====
    pub static ref ANALYSIS_RUNS: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new("analysis_runs_total", "Analysis pipeline runs by outcome"),
            &["mode", "outcome"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref ANALYSIS_ACTIVE_RUNS: IntGauge = {
        let metric = IntGauge::new("analysis_active_runs", "Pipeline runs currently in flight")
            .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref ANALYSIS_SCENES_PER_RUN: Histogram = {
        let metric = Histogram::with_opts(
            HistogramOpts::new(
                "analysis_scenes_per_run",
                "Scenes produced by segmentation per run",
            )
            .buckets(vec![0.0, 1.0, 2.0, 5.0, 10.0, 20.0, 50.0, 100.0, 250.0]),
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref ANALYSIS_SEGMENTATION_TIME: Histogram = {
        let metric = Histogram::with_opts(
            HistogramOpts::new(
                "analysis_segmentation_time_seconds",
                "Time spent detecting scene boundaries per run",
            )
            .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0]),
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref ANALYSIS_FRAMES_PROCESSED: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new(
                "analysis_frames_processed_total",
                "Representative frames run through the labeler",
            ),
            &["status"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref ANALYSIS_FRAMES_WITH_ELEMENTS: IntCounter = {
        let metric = IntCounter::new(
            "analysis_frames_with_elements_total",
            "Frames that produced at least one relevant detection",
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref ANALYSIS_LABEL_TIME: HistogramVec = {
        let metric = HistogramVec::new(
            HistogramOpts::new(
                "analysis_label_time_seconds",
                "Time spent labeling one frame (extraction excluded)",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.02, 0.05, 0.1, 0.2, 0.5, 1.0, 2.0]),
            &["labeler"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    // ==== Interface Metrics ====
    pub static ref UPLOADS_REJECTED: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new("uploads_rejected_total", "Rejected uploads by reason"),
            &["reason"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref DESCRIBE_REQUESTS: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new(
                "describe_requests_total",
                "Generative description calls by status",
            ),
            &["status"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };
}

/// Helper function to encode metrics for Prometheus scraping
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| {
        prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e))
    })
}
