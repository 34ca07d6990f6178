/// Integration tests for batch analysis jobs
use analysis_service::detect::{MockFrameLabeler, ScriptedResponse};
use analysis_service::frames::MockFrameExtractor;
use analysis_service::jobs::JobStore;
use analysis_service::pipeline::ScenePipeline;
use analysis_service::segment::{MockSceneSegmenter, SceneSegmenter, SegmentError};
use analysis_service::{api, AnalysisConfig, AppState};
use async_trait::async_trait;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use common::analysis::{BoundingBox, Detection, FrameAnalysis, Scene};
use std::sync::Arc;
use std::time::Duration;

const UPLOAD_BYTES: &[u8] = b"not-really-video-but-stored-verbatim";

/// Segmenter that holds the pipeline in its scene-detection phase long
/// enough for a status poll to observe a processing job.
struct SlowSegmenter {
    scenes: Vec<Scene>,
    delay: Duration,
}

#[async_trait]
impl SceneSegmenter for SlowSegmenter {
    async fn segment(&self, _video_path: &std::path::Path) -> Result<Vec<Scene>, SegmentError> {
        tokio::time::sleep(self.delay).await;
        Ok(self.scenes.clone())
    }
}

/// Helper function to create a test server around the given segmenter
fn server_with(
    segmenter: Arc<dyn SceneSegmenter>,
    labeler: MockFrameLabeler,
    data_dir: &std::path::Path,
) -> TestServer {
    let config = AnalysisConfig {
        data_dir: data_dir.to_path_buf(),
        ..AnalysisConfig::from_env().unwrap()
    };
    let pipeline = ScenePipeline::new(
        segmenter,
        Arc::new(MockFrameExtractor::with_bytes(jpeg_fixture())),
        Arc::new(labeler),
    );
    let jobs = JobStore::new(data_dir);
    let state = AppState::new(config, pipeline, None, jobs);

    TestServer::new(api::router(state)).unwrap()
}

fn video_form() -> MultipartForm {
    MultipartForm::new().add_part(
        "file",
        Part::bytes(UPLOAD_BYTES.to_vec())
            .file_name("lecture.mp4")
            .mime_type("video/mp4"),
    )
}

fn jpeg_fixture() -> Vec<u8> {
    let image = image::RgbImage::from_pixel(8, 8, image::Rgb([120, 40, 40]));
    let mut bytes = Vec::new();
    image
        .write_to(
            &mut std::io::Cursor::new(&mut bytes),
            image::ImageFormat::Jpeg,
        )
        .unwrap();
    bytes
}

fn table_analysis(confidence: f32) -> ScriptedResponse {
    ScriptedResponse::Analysis(FrameAnalysis {
        detections: vec![Detection {
            class_name: "table".to_string(),
            confidence,
            bbox: BoundingBox::new(1.0, 1.0, 6.0, 6.0),
        }],
        raw_count: 1,
    })
}

async fn poll_until_completed(server: &TestServer, job_id: &str) -> serde_json::Value {
    for _ in 0..100 {
        let response = server.get(&format!("/api/jobs/{job_id}")).await;
        assert_eq!(response.status_code(), 200);

        let body: serde_json::Value = response.json();
        if body["status"] == "completed" {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("job {job_id} never completed");
}

#[tokio::test]
async fn test_batch_job_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let server = server_with(
        Arc::new(SlowSegmenter {
            scenes: vec![Scene::new(0.0, 4.0), Scene::new(4.0, 8.0)],
            delay: Duration::from_millis(300),
        }),
        MockFrameLabeler::with_script(vec![table_analysis(0.87654)]),
        dir.path(),
    );

    let response = server.post("/api/jobs").multipart(video_form()).await;
    assert_eq!(response.status_code(), 202);

    let created: serde_json::Value = response.json();
    let job_id = created["job_id"].as_str().unwrap().to_string();

    // still segmenting: the job reports processing with no artifact urls
    let status = server.get(&format!("/api/jobs/{job_id}")).await;
    assert_eq!(status.status_code(), 200);
    let body: serde_json::Value = status.json();
    assert_eq!(body["status"], "processing");
    assert!(body.get("video_url").is_none());

    let body = poll_until_completed(&server, &job_id).await;
    let video_url = body["video_url"].as_str().unwrap().to_string();
    let result_url = body["result_url"].as_str().unwrap().to_string();
    assert!(video_url.ends_with(&format!("jobs/{job_id}/video.mp4")));
    assert!(result_url.ends_with(&format!("jobs/{job_id}/result.json")));

    // stored artifacts are served back over /files
    let result = server.get(&result_url).await;
    assert_eq!(result.status_code(), 200);
    let records: Vec<serde_json::Value> = result.json();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["start"], 0.0);
    assert_eq!(records[0]["end"], 4.0);
    assert_eq!(records[0]["label"], "table");
    assert_eq!(records[0]["description"], serde_json::json!({}));

    let video = server.get(&video_url).await;
    assert_eq!(video.status_code(), 200);
    assert_eq!(video.as_bytes().to_vec(), UPLOAD_BYTES.to_vec());
}

#[tokio::test]
async fn test_job_status_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let server = server_with(
        Arc::new(MockSceneSegmenter::with_scenes(vec![Scene::new(0.0, 2.0)])),
        MockFrameLabeler::empty(),
        dir.path(),
    );

    let response = server.post("/api/jobs").multipart(video_form()).await;
    assert_eq!(response.status_code(), 202);
    let created: serde_json::Value = response.json();
    let job_id = created["job_id"].as_str().unwrap().to_string();

    poll_until_completed(&server, &job_id).await;

    // a fresh server over the same data dir derives the same status from disk
    let restarted = server_with(
        Arc::new(MockSceneSegmenter::with_scenes(vec![])),
        MockFrameLabeler::empty(),
        dir.path(),
    );
    let status = restarted.get(&format!("/api/jobs/{job_id}")).await;
    assert_eq!(status.status_code(), 200);

    let body: serde_json::Value = status.json();
    assert_eq!(body["status"], "completed");
    assert!(body["result_url"].as_str().unwrap().contains(&job_id));
}

#[tokio::test]
async fn test_failed_job_stays_processing() {
    let dir = tempfile::tempdir().unwrap();
    let server = server_with(
        Arc::new(MockSceneSegmenter::failing("moov atom not found")),
        MockFrameLabeler::empty(),
        dir.path(),
    );

    let response = server.post("/api/jobs").multipart(video_form()).await;
    assert_eq!(response.status_code(), 202);
    let created: serde_json::Value = response.json();
    let job_id = created["job_id"].as_str().unwrap().to_string();

    tokio::time::sleep(Duration::from_millis(300)).await;

    let status = server.get(&format!("/api/jobs/{job_id}")).await;
    assert_eq!(status.status_code(), 200);
    let body: serde_json::Value = status.json();
    assert_eq!(body["status"], "processing");

    // no result document was written for the failed run
    let result = server
        .get(&format!("/files/jobs/{job_id}/result.json"))
        .await;
    assert_eq!(result.status_code(), 404);
}
