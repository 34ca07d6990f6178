//! HTTP handlers.

use axum::body::Bytes;
use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, State};
use axum::http::header::CACHE_CONTROL;
use axum::http::{HeaderName, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::{info, warn};
use uuid::Uuid;

use common::jobs::{JobCreated, JobStatusResponse};
use common::validation::{file_extension, validate_upload};

use crate::error::ApiError;
use crate::state::{AppState, StagedUpload};

pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "analysis-service",
        "version": common::VERSION,
    }))
}

pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let labeler_ok = state.pipeline().labeler().healthy().await;
    let storage_ok = tokio::fs::create_dir_all(state.jobs().jobs_dir())
        .await
        .is_ok();

    if labeler_ok && storage_ok {
        (StatusCode::OK, Json(json!({"status": "ready"})))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "not_ready",
                "labeler": labeler_ok,
                "storage": storage_ok,
            })),
        )
    }
}

pub async fn metrics() -> Result<String, ApiError> {
    telemetry::metrics::encode_metrics()
        .map_err(|e| ApiError::internal(format!("failed to encode metrics: {e}")))
}

/// Streaming analysis: validate the upload, stage it, and answer with an
/// SSE stream of pipeline events. Closing the response abandons the run.
pub async fn analyze(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let upload = receive_upload(multipart).await?;
    let staged = stage_upload(&upload).await?;

    info!(
        filename = %upload.filename,
        bytes = upload.bytes.len(),
        "starting streaming analysis"
    );

    let rx = state.start_stream(staged);
    let stream = ReceiverStream::new(rx).map(|event| Event::default().json_data(&event));

    let sse = Sse::new(stream).keep_alive(KeepAlive::default());
    Ok((
        [
            (CACHE_CONTROL, "no-cache"),
            (HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        sse,
    ))
}

/// Batch analysis: store the upload under the job directory, spawn the
/// pipeline detached, answer 202 with the job id.
pub async fn create_job(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let upload = receive_upload(multipart).await?;

    let job = state.jobs().create(&upload.extension).await?;
    tokio::fs::write(&job.video_path, &upload.bytes)
        .await
        .map_err(|e| ApiError::internal(format!("failed to store upload: {e}")))?;

    info!(job_id = %job.id, filename = %upload.filename, "submitted batch job");

    let job_id = job.id;
    state.spawn_batch(job);

    Ok((StatusCode::ACCEPTED, Json(JobCreated { job_id })))
}

pub async fn job_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    match state.jobs().status(id).await {
        Some(status) => Ok(Json(status)),
        None => Err(ApiError::not_found(format!("job {id} not found"))),
    }
}

struct ReceivedUpload {
    filename: String,
    extension: String,
    bytes: Bytes,
}

/// Pull the `file` field out of the multipart body and validate it.
/// Rejections are counted by reason before they become responses.
async fn receive_upload(mut multipart: Multipart) -> Result<ReceivedUpload, ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().map(|s| s.to_string());
        let content_type = field.content_type().map(|s| s.to_string());
        let bytes = field.bytes().await.map_err(multipart_error)?;

        if let Err(e) = validate_upload(
            filename.as_deref(),
            content_type.as_deref(),
            bytes.len() as u64,
        ) {
            telemetry::metrics::UPLOADS_REJECTED
                .with_label_values(&[e.reason()])
                .inc();
            warn!(filename = ?filename, error = %e, "rejected upload");
            return Err(e.into());
        }

        // both present, validation checked them
        let filename = filename.unwrap_or_default();
        let extension = file_extension(&filename).unwrap_or_default();
        return Ok(ReceivedUpload {
            filename,
            extension,
            bytes,
        });
    }

    telemetry::metrics::UPLOADS_REJECTED
        .with_label_values(&["missing_file"])
        .inc();
    Err(ApiError::bad_request("multipart field 'file' is required"))
}

/// Body-limit breaches keep their 413; malformed bodies map to 400.
fn multipart_error(err: MultipartError) -> ApiError {
    ApiError::new(err.status(), err.body_text())
}

async fn stage_upload(upload: &ReceivedUpload) -> Result<StagedUpload, ApiError> {
    let temp_dir = tempfile::tempdir()
        .map_err(|e| ApiError::internal(format!("failed to create temp dir: {e}")))?;
    let video_path = temp_dir
        .path()
        .join(format!("{}.{}", Uuid::new_v4(), upload.extension));

    tokio::fs::write(&video_path, &upload.bytes)
        .await
        .map_err(|e| ApiError::internal(format!("failed to stage upload: {e}")))?;

    Ok(StagedUpload {
        temp_dir,
        video_path,
    })
}
