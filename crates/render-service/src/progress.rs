//! Progress delivery from a running render to the job store.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use shadowcast_job_store::JobStore;
use shadowcast_render_engine::RenderProgress;
use shadowcast_render_model::JobPatch;

/// Sending half handed to the executor callback.
///
/// Reports never block the render. When the channel is full the report is
/// dropped; later reports carry a higher percentage anyway.
#[derive(Clone)]
pub struct ProgressReporter {
    job_id: Arc<str>,
    tx: mpsc::Sender<RenderProgress>,
}

impl ProgressReporter {
    pub fn new(job_id: &str, tx: mpsc::Sender<RenderProgress>) -> Self {
        Self {
            job_id: Arc::from(job_id),
            tx,
        }
    }

    pub fn report(&self, progress: RenderProgress) {
        if let Err(mpsc::error::TrySendError::Full(p)) = self.tx.try_send(progress) {
            tracing::trace!(job_id = %self.job_id, percent = p.percent, "Progress channel full, dropping report");
        }
    }
}

/// Spawn the task that applies reports to the store in arrival order.
///
/// The task ends once every [`ProgressReporter`] for the channel is dropped
/// and the backlog is drained.
pub fn spawn_forwarder(
    store: Arc<dyn JobStore>,
    job_id: String,
    capacity: usize,
) -> (ProgressReporter, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<RenderProgress>(capacity.max(1));
    let reporter = ProgressReporter::new(&job_id, tx);

    let handle = tokio::spawn(async move {
        while let Some(progress) = rx.recv().await {
            let patch = JobPatch::progress(progress.percent, progress.stage_label());
            if let Err(e) = store.update(&job_id, patch).await {
                tracing::warn!(job_id = %job_id, "Failed to record progress: {e}");
            }
        }
    });

    (reporter, handle)
}
