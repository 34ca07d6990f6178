//! Incremental video analysis service.
//!
//! Segments uploaded lecture videos into scenes, labels one
//! representative frame per scene with a detection model, and reports
//! results either as a live SSE event stream or as a polled batch job.

pub mod api;
pub mod config;
pub mod describe;
pub mod detect;
pub mod error;
pub mod frames;
pub mod jobs;
pub mod pipeline;
pub mod segment;
pub mod state;

pub use config::AnalysisConfig;
pub use state::{AppState, StagedUpload};
