//! Caller-facing job status.

use std::path::PathBuf;

use serde::Serialize;

use shadowcast_render_model::{JobStatus, RenderJob};

/// What a caller polling a job gets to see.
///
/// `output_path` is present only for completed jobs and `error` only for
/// failed ones.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobStatusView {
    pub id: String,
    pub status: JobStatus,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub estimated_duration_secs: f64,
}

impl From<&RenderJob> for JobStatusView {
    fn from(job: &RenderJob) -> Self {
        Self {
            id: job.id.clone(),
            status: job.status,
            progress: job.progress,
            stage: job.stage.clone(),
            output_path: match job.status {
                JobStatus::Completed => job.output_path.clone(),
                _ => None,
            },
            error: match job.status {
                JobStatus::Failed => job.error.clone(),
                _ => None,
            },
            estimated_duration_secs: job.estimated_duration_secs,
        }
    }
}

impl From<RenderJob> for JobStatusView {
    fn from(job: RenderJob) -> Self {
        Self::from(&job)
    }
}
