//! Batch job bookkeeping.
//!
//! Jobs live entirely on the filesystem under `{data_dir}/jobs/{id}/`:
//! the uploaded video plus, once analysis completes, `result.json`.
//! Status derives from what exists on disk, so it survives restarts
//! without a database.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use uuid::Uuid;

use common::jobs::{JobStatus, JobStatusResponse};

#[derive(Debug, Clone)]
pub struct JobStore {
    data_dir: PathBuf,
}

/// Paths allocated for one job.
#[derive(Debug, Clone)]
pub struct StoredJob {
    pub id: Uuid,
    pub dir: PathBuf,
    pub video_path: PathBuf,
    pub result_path: PathBuf,
}

impl JobStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn jobs_dir(&self) -> PathBuf {
        self.data_dir.join("jobs")
    }

    /// Allocate a directory for a new job. The caller writes the upload
    /// into `video_path` before spawning analysis.
    pub async fn create(&self, extension: &str) -> Result<StoredJob> {
        let id = Uuid::new_v4();
        let dir = self.jobs_dir().join(id.to_string());
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("failed to create job directory {}", dir.display()))?;

        Ok(StoredJob {
            id,
            video_path: dir.join(format!("video.{extension}")),
            result_path: dir.join("result.json"),
            dir,
        })
    }

    /// Derive job status from stored artifacts. `None` means the job was
    /// never created (or its directory is gone).
    pub async fn status(&self, id: Uuid) -> Option<JobStatusResponse> {
        let dir = self.jobs_dir().join(id.to_string());
        let metadata = tokio::fs::metadata(&dir).await.ok()?;
        if !metadata.is_dir() {
            return None;
        }

        let has_result = tokio::fs::try_exists(dir.join("result.json"))
            .await
            .unwrap_or(false);
        if !has_result {
            return Some(JobStatusResponse::processing());
        }

        let result_url = format!("/files/jobs/{id}/result.json");
        Some(match find_video_file(&dir).await {
            Some(name) => {
                JobStatusResponse::completed(format!("/files/jobs/{id}/{name}"), result_url)
            }
            None => JobStatusResponse {
                status: JobStatus::Completed,
                video_url: None,
                result_url: Some(result_url),
            },
        })
    }
}

async fn find_video_file(dir: &Path) -> Option<String> {
    let mut entries = tokio::fs::read_dir(dir).await.ok()?;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with("video.") {
            return Some(name);
        }
    }
    None
}
