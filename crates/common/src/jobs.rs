//! Batch job contracts.
//!
//! Submitting a video for background analysis returns a job id; clients poll
//! the status endpoint until the result document exists.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Response to a batch job submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobCreated {
    /// Identifier used to poll status and locate stored artifacts
    pub job_id: Uuid,
}

/// Batch job lifecycle, derived from stored artifacts only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Submitted; the result document does not exist yet
    Processing,

    /// The result document exists and can be fetched
    Completed,
}

/// Response to a job status poll
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub status: JobStatus,

    /// URL of the stored source video, present once completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,

    /// URL of the result document, present once completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
}

impl JobStatusResponse {
    pub fn processing() -> Self {
        Self {
            status: JobStatus::Processing,
            video_url: None,
            result_url: None,
        }
    }

    pub fn completed(video_url: String, result_url: String) -> Self {
        Self {
            status: JobStatus::Completed,
            video_url: Some(video_url),
            result_url: Some(result_url),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processing_omits_urls() {
        let response = JobStatusResponse::processing();
        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(json, r#"{"status":"processing"}"#);
    }

    #[test]
    fn test_completed_carries_urls() {
        let response = JobStatusResponse::completed(
            "/files/jobs/abc/video.mp4".to_string(),
            "/files/jobs/abc/result.json".to_string(),
        );
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains(r#""status":"completed""#));
        assert!(json.contains(r#""video_url":"/files/jobs/abc/video.mp4""#));

        let deserialized: JobStatusResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.status, JobStatus::Completed);
    }

    #[test]
    fn test_job_created_round_trip() {
        let created = JobCreated {
            job_id: Uuid::new_v4(),
        };
        let json = serde_json::to_string(&created).unwrap();
        let deserialized: JobCreated = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.job_id, created.job_id);
    }
}
