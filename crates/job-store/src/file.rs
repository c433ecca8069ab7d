//! JSON-file backed job store.
//!
//! The whole table is rewritten to `jobs.json` after every mutation
//! (write to a temp file, then rename), so a crash never leaves a torn file.
//! An exclusive lock on `jobs.lock` keeps a second process from opening the
//! same state directory while the store is alive.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fs2::FileExt;
use tokio::sync::Mutex;

use shadowcast_common::error::{ShadowcastError, ShadowcastResult};
use shadowcast_render_model::{JobPatch, NewJob, RenderJob};

use crate::store::{JobStore, UpdateOutcome};
use crate::table::JobTable;

const STATE_FILE: &str = "jobs.json";
const LOCK_FILE: &str = "jobs.lock";

/// Persistent store under a state directory.
#[derive(Debug)]
pub struct FileJobStore {
    path: PathBuf,
    table: Mutex<JobTable>,
    /// Released when the store is dropped.
    _lock: File,
}

impl FileJobStore {
    /// Open (or create) the store in `state_dir`.
    ///
    /// Fails with a store error while another store holds the directory.
    /// Jobs a previous process left `pending` or `processing` can never
    /// finish, so they are marked `failed` as interrupted.
    pub async fn open(state_dir: &Path) -> ShadowcastResult<Self> {
        tokio::fs::create_dir_all(state_dir).await?;
        let lock = lock_state_dir(state_dir)?;

        let path = state_dir.join(STATE_FILE);
        let mut table = load(&path).await?;

        let recovered = table.recover_interrupted(Utc::now());
        if !recovered.is_empty() {
            tracing::warn!(count = recovered.len(), "Marked interrupted jobs as failed");
            persist(&path, &table).await?;
        }
        tracing::debug!(path = %path.display(), jobs = table.len(), "Opened job store");

        Ok(Self {
            path,
            table: Mutex::new(table),
            _lock: lock,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted jobs without locking, recovering or writing.
    ///
    /// Safe to call while another process owns the store.
    pub async fn inspect(state_dir: &Path) -> ShadowcastResult<JobTable> {
        load(&state_dir.join(STATE_FILE)).await
    }

    /// Apply `change` to a copy of the table and keep it only once it is on
    /// disk. `change` returns whether anything needs persisting.
    async fn commit<T>(
        &self,
        change: impl FnOnce(&mut JobTable) -> ShadowcastResult<(T, bool)>,
    ) -> ShadowcastResult<T> {
        let mut table = self.table.lock().await;
        let mut next = table.clone();
        let (value, dirty) = change(&mut next)?;
        if dirty {
            persist(&self.path, &next).await?;
            *table = next;
        }
        Ok(value)
    }
}

fn lock_state_dir(state_dir: &Path) -> ShadowcastResult<File> {
    let lock_path = state_dir.join(LOCK_FILE);
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(&lock_path)
        .map_err(|e| {
            ShadowcastError::store(format!("failed to open {}: {e}", lock_path.display()))
        })?;
    if let Err(e) = file.try_lock_exclusive() {
        return Err(ShadowcastError::store(format!(
            "job store {} is in use by another process: {e}",
            state_dir.display()
        )));
    }
    Ok(file)
}

async fn load(path: &Path) -> ShadowcastResult<JobTable> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => {
            let jobs: Vec<RenderJob> = serde_json::from_str(&content).map_err(|e| {
                ShadowcastError::store(format!("corrupt job state {}: {e}", path.display()))
            })?;
            Ok(JobTable::from_jobs(jobs))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(JobTable::new()),
        Err(e) => Err(e.into()),
    }
}

async fn persist(path: &Path, table: &JobTable) -> ShadowcastResult<()> {
    let json = serde_json::to_string_pretty(&table.snapshot())?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json).await.map_err(|e| {
        ShadowcastError::store(format!("failed to write {}: {e}", tmp.display()))
    })?;
    tokio::fs::rename(&tmp, path).await.map_err(|e| {
        ShadowcastError::store(format!("failed to replace {}: {e}", path.display()))
    })?;
    Ok(())
}

#[async_trait]
impl JobStore for FileJobStore {
    async fn create(&self, job: NewJob) -> ShadowcastResult<RenderJob> {
        self.commit(|table| Ok((table.create(job, Utc::now())?, true)))
            .await
    }

    async fn update(&self, id: &str, patch: JobPatch) -> ShadowcastResult<UpdateOutcome> {
        self.commit(|table| {
            let outcome = table.update(id, patch, Utc::now())?;
            let dirty = outcome.was_applied();
            Ok((outcome, dirty))
        })
        .await
    }

    async fn get(&self, id: &str) -> ShadowcastResult<RenderJob> {
        self.table.lock().await.get(id)
    }

    async fn list_active(&self) -> ShadowcastResult<Vec<RenderJob>> {
        Ok(self.table.lock().await.list_active())
    }

    async fn list_recent(&self, limit: usize) -> ShadowcastResult<Vec<RenderJob>> {
        Ok(self.table.lock().await.list_recent(limit))
    }

    async fn cleanup(&self, older_than: DateTime<Utc>) -> ShadowcastResult<usize> {
        self.commit(|table| {
            let removed = table.cleanup(older_than);
            Ok((removed, removed > 0))
        })
        .await
    }

    async fn delete(&self, id: &str) -> ShadowcastResult<()> {
        self.commit(|table| Ok((table.delete(id)?, true))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::INTERRUPTED_ERROR;
    use shadowcast_render_model::JobStatus;

    #[tokio::test]
    async fn test_jobs_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let id = {
            let store = FileJobStore::open(dir.path()).await.unwrap();
            let job = store.create(NewJob::single("c", "t")).await.unwrap();
            store.update(&job.id, JobPatch::processing()).await.unwrap();
            store
                .update(
                    &job.id,
                    JobPatch::completed(PathBuf::from("/out/x.mp4"), 42, Some(7.5), 3.0),
                )
                .await
                .unwrap();
            job.id
        };

        let store = FileJobStore::open(dir.path()).await.unwrap();
        let job = store.get(&id).await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.output_size_bytes, Some(42));
        assert_eq!(job.progress, 100);
        assert!(!dir.path().join("jobs.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_active_jobs_are_recovered_as_interrupted() {
        let dir = tempfile::tempdir().unwrap();
        let id = {
            let store = FileJobStore::open(dir.path()).await.unwrap();
            let job = store.create(NewJob::single("c", "t")).await.unwrap();
            store.update(&job.id, JobPatch::processing()).await.unwrap();
            job.id
        };

        let store = FileJobStore::open(dir.path()).await.unwrap();
        let job = store.get(&id).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some(INTERRUPTED_ERROR));
        assert!(store.list_active().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_inspect_leaves_active_jobs_alone() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileJobStore::open(dir.path()).await.unwrap();
        let job = store.create(NewJob::single("c", "t")).await.unwrap();
        store.update(&job.id, JobPatch::processing()).await.unwrap();

        let table = FileJobStore::inspect(dir.path()).await.unwrap();
        assert_eq!(table.get(&job.id).unwrap().status, JobStatus::Processing);
        assert_eq!(
            store.get(&job.id).await.unwrap().status,
            JobStatus::Processing
        );
        assert!(FileJobStore::inspect(&dir.path().join("empty"))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_state_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("jobs.json"), "{ not json").unwrap();
        let err = FileJobStore::open(dir.path()).await.unwrap_err();
        assert!(matches!(err, ShadowcastError::Store { .. }));
    }

    #[tokio::test]
    async fn test_cleanup_persists() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileJobStore::open(dir.path()).await.unwrap();
        let job = store.create(NewJob::single("c", "t")).await.unwrap();
        store.update(&job.id, JobPatch::cancelled(None)).await.unwrap();

        let removed = store
            .cleanup(Utc::now() + chrono::Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        drop(store);

        let reopened = FileJobStore::open(dir.path()).await.unwrap();
        assert!(reopened.list_recent(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_second_open_is_refused_while_store_is_alive() {
        let dir = tempfile::tempdir().unwrap();
        let first = FileJobStore::open(dir.path()).await.unwrap();
        let job = first.create(NewJob::single("c", "t")).await.unwrap();
        first.update(&job.id, JobPatch::processing()).await.unwrap();

        let err = FileJobStore::open(dir.path()).await.unwrap_err();
        assert!(matches!(err, ShadowcastError::Store { .. }), "{err}");

        let on_disk = FileJobStore::inspect(dir.path()).await.unwrap();
        assert_eq!(on_disk.get(&job.id).unwrap().status, JobStatus::Processing);

        first
            .update(&job.id, JobPatch::progress(40, "rendering"))
            .await
            .unwrap();
        drop(first);

        let second = FileJobStore::open(dir.path()).await.unwrap();
        let recovered = second.get(&job.id).await.unwrap();
        assert_eq!(recovered.status, JobStatus::Failed);
        assert_eq!(recovered.progress, 40);
    }

    /// Puts a non-empty directory where `jobs.json` goes, so the final
    /// rename of every later persist fails.
    fn block_state_file(dir: &Path) {
        let state = dir.join(STATE_FILE);
        std::fs::remove_file(&state).unwrap();
        std::fs::create_dir(&state).unwrap();
        std::fs::write(state.join("keep"), b"x").unwrap();
    }

    #[tokio::test]
    async fn test_failed_persist_leaves_memory_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileJobStore::open(dir.path()).await.unwrap();
        let job = store.create(NewJob::single("c", "t")).await.unwrap();
        let finished = store.create(NewJob::single("d", "t")).await.unwrap();
        store
            .update(&finished.id, JobPatch::cancelled(None))
            .await
            .unwrap();
        block_state_file(dir.path());

        let err = store
            .update(&job.id, JobPatch::processing())
            .await
            .unwrap_err();
        assert!(matches!(err, ShadowcastError::Store { .. }), "{err}");
        assert_eq!(store.get(&job.id).await.unwrap().status, JobStatus::Pending);

        assert!(store.create(NewJob::single("e", "t")).await.is_err());
        assert_eq!(store.list_recent(10).await.unwrap().len(), 2);

        assert!(store
            .cleanup(Utc::now() + chrono::Duration::seconds(1))
            .await
            .is_err());
        assert!(store.get(&finished.id).await.is_ok());

        assert!(store.delete(&finished.id).await.is_err());
        assert!(store.get(&finished.id).await.is_ok());
    }
}
