//! Structured logging and Prometheus metrics for the analysis service.

pub mod logging;
pub mod metrics;

pub use logging::{init_structured_logging, init_with_service, LogConfig, LogFormat};
