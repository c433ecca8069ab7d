//! The job store contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use shadowcast_common::error::ShadowcastResult;
use shadowcast_render_model::{JobPatch, NewJob, RenderJob};

/// Result of [`JobStore::update`].
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// The patch was applied; carries the updated job.
    Applied(RenderJob),
    /// The job was already terminal and is unchanged.
    Ignored(RenderJob),
}

impl UpdateOutcome {
    pub fn job(&self) -> &RenderJob {
        match self {
            Self::Applied(job) | Self::Ignored(job) => job,
        }
    }

    pub fn into_job(self) -> RenderJob {
        match self {
            Self::Applied(job) | Self::Ignored(job) => job,
        }
    }

    pub fn was_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

/// Persistent job records.
///
/// Implementations serialize read-modify-write of a single job so two
/// concurrent updates can never race into an invalid transition.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a `pending` job.
    async fn create(&self, job: NewJob) -> ShadowcastResult<RenderJob>;

    /// Merge a patch, validating the status transition first.
    ///
    /// Patching a terminal job is a no-op reported as
    /// [`UpdateOutcome::Ignored`].
    async fn update(&self, id: &str, patch: JobPatch) -> ShadowcastResult<UpdateOutcome>;

    async fn get(&self, id: &str) -> ShadowcastResult<RenderJob>;

    /// `pending` and `processing` jobs, oldest first.
    async fn list_active(&self) -> ShadowcastResult<Vec<RenderJob>>;

    /// At most `limit` jobs, newest first.
    async fn list_recent(&self, limit: usize) -> ShadowcastResult<Vec<RenderJob>>;

    /// Delete terminal jobs that finished before `older_than`. Active jobs
    /// are never deleted. Returns the number removed.
    async fn cleanup(&self, older_than: DateTime<Utc>) -> ShadowcastResult<usize>;

    /// Delete one terminal job.
    async fn delete(&self, id: &str) -> ShadowcastResult<()>;
}
