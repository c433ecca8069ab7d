//! Process-local job store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use shadowcast_common::error::ShadowcastResult;
use shadowcast_render_model::{JobPatch, NewJob, RenderJob};

use crate::store::{JobStore, UpdateOutcome};
use crate::table::JobTable;

/// Mutex-guarded in-memory store. Contents are lost on exit.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    table: Mutex<JobTable>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create(&self, job: NewJob) -> ShadowcastResult<RenderJob> {
        self.table.lock().create(job, Utc::now())
    }

    async fn update(&self, id: &str, patch: JobPatch) -> ShadowcastResult<UpdateOutcome> {
        self.table.lock().update(id, patch, Utc::now())
    }

    async fn get(&self, id: &str) -> ShadowcastResult<RenderJob> {
        self.table.lock().get(id)
    }

    async fn list_active(&self) -> ShadowcastResult<Vec<RenderJob>> {
        Ok(self.table.lock().list_active())
    }

    async fn list_recent(&self, limit: usize) -> ShadowcastResult<Vec<RenderJob>> {
        Ok(self.table.lock().list_recent(limit))
    }

    async fn cleanup(&self, older_than: DateTime<Utc>) -> ShadowcastResult<usize> {
        Ok(self.table.lock().cleanup(older_than))
    }

    async fn delete(&self, id: &str) -> ShadowcastResult<()> {
        self.table.lock().delete(id)
    }
}
