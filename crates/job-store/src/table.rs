//! Job table shared by the store implementations.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use shadowcast_common::error::{ShadowcastError, ShadowcastResult};
use shadowcast_render_model::{JobPatch, JobStatus, NewJob, PatchEffect, RenderJob};

use crate::store::UpdateOutcome;

/// Error recorded on jobs a previous process left unfinished.
pub const INTERRUPTED_ERROR: &str = "interrupted: the render process exited before the job finished";

/// In-memory job map with the store's semantics. Not synchronized.
#[derive(Debug, Default, Clone)]
pub struct JobTable {
    jobs: HashMap<String, RenderJob>,
}

impl JobTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from a snapshot.
    pub fn from_jobs(jobs: Vec<RenderJob>) -> Self {
        Self {
            jobs: jobs.into_iter().map(|job| (job.id.clone(), job)).collect(),
        }
    }

    /// All jobs, oldest first.
    pub fn snapshot(&self) -> Vec<RenderJob> {
        let mut jobs: Vec<RenderJob> = self.jobs.values().cloned().collect();
        sort_oldest_first(&mut jobs);
        jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn create(&mut self, job: NewJob, now: DateTime<Utc>) -> ShadowcastResult<RenderJob> {
        if self.jobs.contains_key(&job.id) {
            return Err(ShadowcastError::store(format!("job {} already exists", job.id)));
        }
        let job = job.into_job(now);
        self.jobs.insert(job.id.clone(), job.clone());
        tracing::debug!(job_id = %job.id, "Job created");
        Ok(job)
    }

    pub fn update(
        &mut self,
        id: &str,
        patch: JobPatch,
        now: DateTime<Utc>,
    ) -> ShadowcastResult<UpdateOutcome> {
        let job = self
            .jobs
            .get_mut(id)
            .ok_or_else(|| ShadowcastError::job_not_found(id))?;

        match job.apply(patch, now) {
            Ok(PatchEffect::Applied) => Ok(UpdateOutcome::Applied(job.clone())),
            Ok(PatchEffect::IgnoredTerminal) => {
                tracing::debug!(job_id = %id, status = %job.status, "Ignoring update to finished job");
                Ok(UpdateOutcome::Ignored(job.clone()))
            }
            Err(e) => {
                tracing::warn!(job_id = %id, "Rejected job update: {e}");
                Err(ShadowcastError::InvalidTransition {
                    from: e.from.to_string(),
                    to: e.to.to_string(),
                })
            }
        }
    }

    pub fn get(&self, id: &str) -> ShadowcastResult<RenderJob> {
        self.jobs
            .get(id)
            .cloned()
            .ok_or_else(|| ShadowcastError::job_not_found(id))
    }

    pub fn list_active(&self) -> Vec<RenderJob> {
        let mut jobs: Vec<RenderJob> = self
            .jobs
            .values()
            .filter(|job| job.status.is_active())
            .cloned()
            .collect();
        sort_oldest_first(&mut jobs);
        jobs
    }

    pub fn list_recent(&self, limit: usize) -> Vec<RenderJob> {
        let mut jobs: Vec<RenderJob> = self.jobs.values().cloned().collect();
        sort_oldest_first(&mut jobs);
        jobs.reverse();
        jobs.truncate(limit);
        jobs
    }

    /// Age is measured from completion, falling back to creation.
    pub fn cleanup(&mut self, older_than: DateTime<Utc>) -> usize {
        let before = self.jobs.len();
        self.jobs.retain(|_, job| {
            !(job.status.is_terminal() && job.completed_at.unwrap_or(job.created_at) < older_than)
        });
        before - self.jobs.len()
    }

    pub fn delete(&mut self, id: &str) -> ShadowcastResult<()> {
        let job = self
            .jobs
            .get(id)
            .ok_or_else(|| ShadowcastError::job_not_found(id))?;
        if job.status.is_active() {
            return Err(ShadowcastError::unsupported(format!(
                "job {id} is {} and cannot be deleted",
                job.status
            )));
        }
        self.jobs.remove(id);
        Ok(())
    }

    /// Fail every job left active by a previous process. Returns their ids.
    pub fn recover_interrupted(&mut self, now: DateTime<Utc>) -> Vec<String> {
        let mut recovered = Vec::new();
        for job in self.jobs.values_mut().filter(|job| job.status.is_active()) {
            job.status = JobStatus::Failed;
            job.error = Some(INTERRUPTED_ERROR.to_string());
            job.completed_at = Some(now);
            recovered.push(job.id.clone());
        }
        recovered.sort();
        recovered
    }
}

fn sort_oldest_first(jobs: &mut [RenderJob]) {
    jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
}
