//! Job submission and the background workers that run them.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use shadowcast_common::config::{AppConfig, RetentionConfig, SchedulerConfig};
use shadowcast_common::error::{ShadowcastError, ShadowcastResult};
use shadowcast_job_store::{JobStore, RetentionService};
use shadowcast_render_engine::{
    compile, BatchOrchestrator, BatchPlan, CommandSpec, ProcessExecutor, RenderResult,
};
use shadowcast_render_model::{ClipRef, JobPatch, JobStatus, NewJob, RenderJob, RenderTemplate};

use crate::catalog::ClipCatalog;
use crate::progress::spawn_forwarder;
use crate::view::JobStatusView;

/// Compiled work attached to a job.
enum Work {
    Single(CommandSpec),
    Batch(BatchPlan),
}

struct Inner {
    output_dir: PathBuf,
    temp_dir: PathBuf,
    scheduler: SchedulerConfig,
    retention: RetentionConfig,
    store: Arc<dyn JobStore>,
    catalog: Arc<dyn ClipCatalog>,
    executor: Arc<ProcessExecutor>,
    batches: BatchOrchestrator,
    permits: Arc<Semaphore>,
    /// Cancellation handles of jobs that have not finished yet.
    running: Mutex<HashMap<String, CancellationToken>>,
    /// Stops background services started by this service.
    shutdown: CancellationToken,
}

/// Entry point for rendering: submit, observe and cancel jobs.
///
/// Cloning is cheap; clones share the same scheduler and store.
#[derive(Clone)]
pub struct RenderService {
    inner: Arc<Inner>,
}

impl RenderService {
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn JobStore>,
        catalog: Arc<dyn ClipCatalog>,
    ) -> ShadowcastResult<Self> {
        config.validate()?;
        let executor = Arc::new(ProcessExecutor::new(config.transcoder.clone()));
        Ok(Self {
            inner: Arc::new(Inner {
                output_dir: absolute(&config.output_dir)?,
                temp_dir: absolute(&config.temp_dir)?,
                scheduler: config.scheduler.clone(),
                retention: config.retention.clone(),
                store,
                catalog,
                batches: BatchOrchestrator::new(executor.clone()),
                executor,
                permits: Arc::new(Semaphore::new(config.scheduler.max_concurrent_renders)),
                running: Mutex::new(HashMap::new()),
                shutdown: CancellationToken::new(),
            }),
        })
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.inner.store
    }

    /// Start periodic retention cleanup of this service's store.
    ///
    /// Runs until [`RenderService::shutdown`].
    pub fn start_retention(&self) -> JoinHandle<()> {
        RetentionService::new(self.inner.retention.clone(), self.inner.store.clone())
            .start(self.inner.shutdown.child_token())
    }

    /// Compile `clip_id` with `template` without creating a job.
    pub async fn preview(
        &self,
        clip_id: &str,
        template: &RenderTemplate,
        output_path: &Path,
    ) -> ShadowcastResult<CommandSpec> {
        let clip = self.inner.catalog.clip(clip_id).await?;
        compile(&clip, template, output_path)
    }

    /// Queue a single-clip render. Returns the new job id.
    ///
    /// Compile errors are returned directly and no job is recorded.
    pub async fn submit(&self, clip_id: &str, template: &RenderTemplate) -> ShadowcastResult<String> {
        let clip = self.inner.catalog.clip(clip_id).await?;
        let job = NewJob::single(clip_id, &template.id);
        let output_path = self.output_path(&job.id, template);
        let spec = compile(&clip, template, &output_path)?;

        let job = job.with_estimate(spec.estimated_duration_secs);
        self.launch(job, Work::Single(spec)).await
    }

    /// Queue a batch render merging `clip_ids` in order into one output.
    pub async fn submit_batch(
        &self,
        clip_ids: &[String],
        template: &RenderTemplate,
    ) -> ShadowcastResult<String> {
        let mut clips: Vec<ClipRef> = Vec::with_capacity(clip_ids.len());
        for id in clip_ids {
            clips.push(self.inner.catalog.clip(id).await?);
        }

        let job = NewJob::batch(clip_ids.to_vec(), &template.id);
        let plan = BatchPlan::compile(
            &clips,
            template,
            self.inner.temp_dir.join(format!("batch-{}", job.id)),
            self.output_path(&job.id, template),
            self.inner.scheduler.max_batch_clips,
        )?;

        let job = job.with_estimate(plan.estimated_duration_secs());
        self.launch(job, Work::Batch(plan)).await
    }

    /// Request cancellation.
    ///
    /// A pending job is cancelled immediately. A processing job has its
    /// transcoder terminated and is recorded as cancelled by its worker.
    pub async fn cancel(&self, id: &str) -> ShadowcastResult<JobStatusView> {
        let job = self.inner.store.get(id).await?;
        if job.status.is_terminal() {
            return Err(already_finished(&job));
        }

        let token = self.inner.running.lock().get(id).cloned();
        if let Some(token) = &token {
            token.cancel();
        }

        let job = match (job.status, token) {
            (JobStatus::Processing, Some(_)) => {
                tracing::info!(job_id = %id, "Cancellation requested for running job");
                job
            }
            _ => {
                let outcome = self.inner.store.update(id, JobPatch::cancelled(None)).await?;
                if !outcome.was_applied() {
                    return Err(already_finished(outcome.job()));
                }
                tracing::info!(job_id = %id, "Job cancelled");
                outcome.into_job()
            }
        };
        Ok(JobStatusView::from(&job))
    }

    pub async fn status(&self, id: &str) -> ShadowcastResult<JobStatusView> {
        Ok(JobStatusView::from(self.inner.store.get(id).await?))
    }

    /// Poll until the job reaches a terminal status.
    pub async fn wait(&self, id: &str, poll_interval: Duration) -> ShadowcastResult<RenderJob> {
        loop {
            let job = self.inner.store.get(id).await?;
            if job.status.is_terminal() {
                return Ok(job);
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    pub async fn list_active(&self) -> ShadowcastResult<Vec<RenderJob>> {
        self.inner.store.list_active().await
    }

    pub async fn list_recent(&self, limit: usize) -> ShadowcastResult<Vec<RenderJob>> {
        self.inner.store.list_recent(limit).await
    }

    /// Cancel everything still queued or running and stop background
    /// services.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
        let running = self.inner.running.lock();
        if !running.is_empty() {
            tracing::info!(count = running.len(), "Cancelling unfinished jobs");
        }
        for token in running.values() {
            token.cancel();
        }
    }

    fn output_path(&self, job_id: &str, template: &RenderTemplate) -> PathBuf {
        self.inner
            .output_dir
            .join(format!("{job_id}.{}", template.format.extension()))
    }

    async fn launch(&self, job: NewJob, work: Work) -> ShadowcastResult<String> {
        let job = self.inner.store.create(job).await?;
        let token = CancellationToken::new();
        self.inner
            .running
            .lock()
            .insert(job.id.clone(), token.clone());

        tracing::info!(
            job_id = %job.id,
            clips = job.clip_ids.len(),
            template = %job.template_id,
            estimated_secs = job.estimated_duration_secs,
            "Job queued"
        );

        let inner = self.inner.clone();
        let id = job.id.clone();
        tokio::spawn(async move {
            run_job(&inner, &id, work, &token).await;
            inner.running.lock().remove(&id);
        });
        Ok(job.id)
    }
}

async fn run_job(inner: &Inner, id: &str, work: Work, cancel: &CancellationToken) {
    let permit = tokio::select! {
        permit = inner.permits.clone().acquire_owned() => permit,
        _ = cancel.cancelled() => {
            tracing::debug!(job_id = %id, "Job cancelled while queued");
            record(inner, id, JobPatch::cancelled(None)).await;
            return;
        }
    };
    let _permit = match permit {
        Ok(permit) => permit,
        Err(e) => {
            tracing::warn!(job_id = %id, "Scheduler closed before the job started: {e}");
            record(inner, id, JobPatch::cancelled(None)).await;
            return;
        }
    };

    match inner.store.update(id, JobPatch::processing()).await {
        Ok(outcome) if outcome.was_applied() => {}
        Ok(outcome) => {
            tracing::debug!(job_id = %id, status = %outcome.job().status, "Job finished before it started");
            return;
        }
        Err(e) => {
            tracing::error!(job_id = %id, "Failed to start job: {e}");
            return;
        }
    }

    tracing::info!(job_id = %id, "Job started");
    let started = Instant::now();
    let (reporter, forwarder) =
        spawn_forwarder(inner.store.clone(), id.to_string(), inner.scheduler.progress_buffer);

    let result: ShadowcastResult<RenderResult> = match &work {
        Work::Single(spec) => {
            inner
                .executor
                .execute(spec, cancel, |p| reporter.report(p))
                .await
        }
        Work::Batch(plan) => inner.batches.run(plan, cancel, |p| reporter.report(p)).await,
    };

    drop(reporter);
    if let Err(e) = forwarder.await {
        tracing::warn!(job_id = %id, "Progress forwarder panicked: {e}");
    }

    let elapsed = started.elapsed().as_secs_f64();
    let patch = match result {
        Ok(result) => {
            tracing::info!(
                job_id = %id,
                output = %result.output_path.display(),
                size_bytes = result.size_bytes,
                elapsed_secs = elapsed,
                "Job completed"
            );
            JobPatch::completed(
                result.output_path,
                result.size_bytes,
                result.probed_duration_secs,
                elapsed,
            )
        }
        Err(e) if e.is_cancelled() => {
            tracing::info!(job_id = %id, "Job cancelled");
            JobPatch::cancelled(Some(elapsed))
        }
        Err(e) => {
            tracing::warn!(job_id = %id, "Job failed: {e}");
            JobPatch::failed(e.to_string(), Some(elapsed))
        }
    };
    record(inner, id, patch).await;
}

async fn record(inner: &Inner, id: &str, patch: JobPatch) {
    match inner.store.update(id, patch).await {
        Ok(outcome) if !outcome.was_applied() => {
            tracing::debug!(job_id = %id, status = %outcome.job().status, "Job already finished");
        }
        Ok(_) => {}
        Err(e) => tracing::error!(job_id = %id, "Failed to record job outcome: {e}"),
    }
}

fn already_finished(job: &RenderJob) -> ShadowcastError {
    ShadowcastError::AlreadyFinished {
        id: job.id.clone(),
        status: job.status.to_string(),
    }
}

/// Segment manifests hold absolute paths, so configured directories are
/// resolved against the working directory once.
fn absolute(path: &Path) -> ShadowcastResult<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
