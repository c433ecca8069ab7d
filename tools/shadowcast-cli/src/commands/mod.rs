//! Subcommand implementations and the helpers they share.

pub mod batch;
pub mod check;
pub mod cleanup;
pub mod compile;
pub mod init_template;
pub mod jobs;
pub mod render;
pub mod status;
pub mod validate;

use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use shadowcast_common::config::AppConfig;
use shadowcast_common::error::ShadowcastError;
use shadowcast_job_store::FileJobStore;
use shadowcast_render_model::{JobStatus, RenderJob, RenderTemplate};
use shadowcast_render_service::{InMemoryClipCatalog, RenderService};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

pub(crate) fn load_template(path: &Path) -> anyhow::Result<RenderTemplate> {
    RenderTemplate::load(path)
        .map_err(|e| anyhow::anyhow!("Failed to load template {}: {e}", path.display()))
}

pub(crate) fn load_catalog(path: &Path) -> anyhow::Result<InMemoryClipCatalog> {
    InMemoryClipCatalog::load(path)
        .map_err(|e| anyhow::anyhow!("Failed to load clips {}: {e}", path.display()))
}

/// Service backed by the persistent store in `config.state_dir`, with
/// retention cleanup running while the command does.
pub(crate) async fn open_service(
    config: &AppConfig,
    clips: &Path,
) -> anyhow::Result<RenderService> {
    let catalog = load_catalog(clips)?;
    let store = FileJobStore::open(&config.state_dir).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to open job store {}: {e}",
            config.state_dir.display()
        )
    })?;
    let service = RenderService::new(config, Arc::new(store), Arc::new(catalog))?;
    let _retention = service.start_retention();
    Ok(service)
}

/// Print progress until the job finishes. Ctrl-C cancels it.
pub(crate) async fn follow(service: &RenderService, id: &str) -> anyhow::Result<RenderJob> {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    let mut cancel_requested = false;

    loop {
        tokio::select! {
            _ = &mut ctrl_c, if !cancel_requested => {
                cancel_requested = true;
                println!("\n  Cancelling job {id}...");
                match service.cancel(id).await {
                    Ok(_) | Err(ShadowcastError::AlreadyFinished { .. }) => {}
                    Err(e) => println!("  Cancel failed: {e}"),
                }
            }
            _ = ticker.tick() => {
                let view = service.status(id).await?;
                print!(
                    "\r  Progress: {:>3}% ({})          ",
                    view.progress,
                    view.stage.as_deref().unwrap_or("queued")
                );
                std::io::stdout().flush()?;

                if view.status.is_terminal() {
                    println!();
                    return Ok(service.store().get(id).await?);
                }
            }
        }
    }
}

/// Print the outcome of a finished job; failures become the command's error.
pub(crate) fn report(job: &RenderJob) -> anyhow::Result<()> {
    match job.status {
        JobStatus::Completed => {
            println!("Render complete:");
            if let Some(path) = &job.output_path {
                println!("  Output: {}", path.display());
            }
            if let Some(size) = job.output_size_bytes {
                println!("  Size: {:.1} MiB", size as f64 / (1024.0 * 1024.0));
            }
            match job.output_duration_secs {
                Some(secs) => println!(
                    "  Duration: {secs:.2}s (estimated {:.2}s)",
                    job.estimated_duration_secs
                ),
                None => println!("  Estimated duration: {:.2}s", job.estimated_duration_secs),
            }
            if let Some(elapsed) = job.elapsed_secs {
                println!("  Elapsed: {elapsed:.1}s");
            }
            Ok(())
        }
        JobStatus::Cancelled => {
            println!("Render cancelled.");
            Ok(())
        }
        _ => Err(anyhow::anyhow!(
            "Render failed: {}",
            job.error.as_deref().unwrap_or("unknown error")
        )),
    }
}
