//! Render job records and their state machine.
//!
//! A job moves `pending → processing → {completed | failed | cancelled}`.
//! Queued work may also go straight from `pending` to `cancelled`. Once a
//! job is terminal it never changes again.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Job lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Pending, Self::Cancelled)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Failed)
                | (Self::Processing, Self::Cancelled)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a job renders one clip or merges several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Single,
    Batch,
}

/// A persisted render job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderJob {
    pub id: String,
    pub kind: JobKind,

    /// Clip ids in render order. One entry for single-clip jobs.
    pub clip_ids: Vec<String>,

    pub template_id: String,
    pub status: JobStatus,

    /// 0-100, non-decreasing.
    pub progress: u8,

    /// Last reported pipeline stage.
    #[serde(default)]
    pub stage: Option<String>,

    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,

    /// Final artifact. Set only on `completed`.
    #[serde(default)]
    pub output_path: Option<PathBuf>,
    #[serde(default)]
    pub output_size_bytes: Option<u64>,
    /// Probed duration of the artifact. Set only on `completed`.
    #[serde(default)]
    pub output_duration_secs: Option<f64>,

    /// Set only on `failed`.
    #[serde(default)]
    pub error: Option<String>,

    /// Output duration predicted by the compiler.
    pub estimated_duration_secs: f64,

    /// Wall-clock time spent processing.
    #[serde(default)]
    pub elapsed_secs: Option<f64>,
}

/// Request to create a job.
#[derive(Debug, Clone, PartialEq)]
pub struct NewJob {
    pub id: String,
    pub kind: JobKind,
    pub clip_ids: Vec<String>,
    pub template_id: String,
    pub estimated_duration_secs: f64,
}

impl NewJob {
    /// A single-clip job with a freshly generated id.
    pub fn single(clip_id: impl Into<String>, template_id: impl Into<String>) -> Self {
        Self {
            id: new_job_id(),
            kind: JobKind::Single,
            clip_ids: vec![clip_id.into()],
            template_id: template_id.into(),
            estimated_duration_secs: 0.0,
        }
    }

    /// A batch job with a freshly generated id.
    pub fn batch(clip_ids: Vec<String>, template_id: impl Into<String>) -> Self {
        Self {
            id: new_job_id(),
            kind: JobKind::Batch,
            clip_ids,
            template_id: template_id.into(),
            estimated_duration_secs: 0.0,
        }
    }

    pub fn with_estimate(mut self, secs: f64) -> Self {
        self.estimated_duration_secs = secs;
        self
    }

    /// Build the `pending` record.
    pub fn into_job(self, now: DateTime<Utc>) -> RenderJob {
        RenderJob {
            id: self.id,
            kind: self.kind,
            clip_ids: self.clip_ids,
            template_id: self.template_id,
            status: JobStatus::Pending,
            progress: 0,
            stage: None,
            created_at: now,
            started_at: None,
            completed_at: None,
            output_path: None,
            output_size_bytes: None,
            output_duration_secs: None,
            error: None,
            estimated_duration_secs: self.estimated_duration_secs,
            elapsed_secs: None,
        }
    }
}

/// Generate an opaque job id.
pub fn new_job_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Partial update to a job.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobPatch {
    pub status: Option<JobStatus>,
    pub progress: Option<u8>,
    pub stage: Option<String>,
    pub output_path: Option<PathBuf>,
    pub output_size_bytes: Option<u64>,
    pub output_duration_secs: Option<f64>,
    pub error: Option<String>,
    pub elapsed_secs: Option<f64>,
}

impl JobPatch {
    pub fn progress(percent: u8, stage: impl Into<String>) -> Self {
        Self {
            progress: Some(percent),
            stage: Some(stage.into()),
            ..Default::default()
        }
    }

    pub fn processing() -> Self {
        Self {
            status: Some(JobStatus::Processing),
            stage: Some("starting".to_string()),
            ..Default::default()
        }
    }

    pub fn completed(
        output_path: PathBuf,
        size_bytes: u64,
        duration_secs: Option<f64>,
        elapsed_secs: f64,
    ) -> Self {
        Self {
            status: Some(JobStatus::Completed),
            progress: Some(100),
            stage: Some("done".to_string()),
            output_path: Some(output_path),
            output_size_bytes: Some(size_bytes),
            output_duration_secs: duration_secs,
            elapsed_secs: Some(elapsed_secs),
            ..Default::default()
        }
    }

    pub fn failed(error: impl Into<String>, elapsed_secs: Option<f64>) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            error: Some(error.into()),
            elapsed_secs,
            ..Default::default()
        }
    }

    pub fn cancelled(elapsed_secs: Option<f64>) -> Self {
        Self {
            status: Some(JobStatus::Cancelled),
            stage: Some("cancelled".to_string()),
            elapsed_secs,
            ..Default::default()
        }
    }
}

/// Result of applying a patch to a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchEffect {
    Applied,
    /// The job was already terminal; nothing changed.
    IgnoredTerminal,
}

/// A patch requested a transition the state machine forbids.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot transition from {from} to {to}")]
pub struct TransitionError {
    pub from: JobStatus,
    pub to: JobStatus,
}

impl RenderJob {
    /// Merge `patch` into this job, validating the status transition first.
    ///
    /// Progress never decreases and completion forces 100. Output fields are
    /// kept only on completion and the error only on failure.
    pub fn apply(
        &mut self,
        patch: JobPatch,
        now: DateTime<Utc>,
    ) -> Result<PatchEffect, TransitionError> {
        if self.status.is_terminal() {
            return Ok(PatchEffect::IgnoredTerminal);
        }

        let next = patch.status.unwrap_or(self.status);
        if next != self.status && !self.status.can_transition_to(next) {
            return Err(TransitionError {
                from: self.status,
                to: next,
            });
        }

        if next != self.status {
            match next {
                JobStatus::Processing => self.started_at = Some(now),
                status if status.is_terminal() => self.completed_at = Some(now),
                _ => {}
            }
            self.status = next;
        }

        if let Some(percent) = patch.progress {
            if next != JobStatus::Failed && next != JobStatus::Cancelled {
                self.progress = self.progress.max(percent.min(100));
            }
        }
        if let Some(stage) = patch.stage {
            self.stage = Some(stage);
        }
        if let Some(elapsed) = patch.elapsed_secs {
            self.elapsed_secs = Some(elapsed);
        }

        match next {
            JobStatus::Completed => {
                self.progress = 100;
                self.output_path = patch.output_path;
                self.output_size_bytes = patch.output_size_bytes;
                self.output_duration_secs = patch.output_duration_secs;
            }
            JobStatus::Failed => {
                self.error = patch.error;
            }
            _ => {}
        }

        Ok(PatchEffect::Applied)
    }
}
