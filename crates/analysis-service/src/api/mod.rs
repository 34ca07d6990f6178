//! HTTP surface of the analysis service.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use common::validation::MAX_UPLOAD_BYTES;

use crate::state::AppState;

pub mod routes;

pub fn router(state: AppState) -> Router {
    let files = ServeDir::new(state.config().data_dir.clone());

    Router::new()
        .route("/health", get(routes::health))
        .route("/ready", get(routes::ready))
        .route("/metrics", get(routes::metrics))
        .route("/api/analyze", post(routes::analyze))
        .route("/api/jobs", post(routes::create_job))
        .route("/api/jobs/:id", get(routes::job_status))
        .nest_service("/files", files)
        // slack above the payload cap for multipart framing; the handler
        // enforces the cap itself and answers 413
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES as usize + 1024 * 1024))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
