//! Show one job.

use shadowcast_common::config::AppConfig;
use shadowcast_common::timecode::format_timecode;
use shadowcast_job_store::FileJobStore;
use shadowcast_render_service::JobStatusView;

pub async fn run(config: &AppConfig, id: String, json: bool) -> anyhow::Result<()> {
    let table = FileJobStore::inspect(&config.state_dir).await?;
    let job = table.get(&id)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&JobStatusView::from(&job))?);
        return Ok(());
    }

    println!("Job {}", job.id);
    println!("  Status: {}", job.status);
    println!("  Progress: {}%", job.progress);
    if let Some(stage) = &job.stage {
        println!("  Stage: {stage}");
    }
    println!("  Template: {}", job.template_id);
    println!("  Clips: {}", job.clip_ids.join(", "));
    println!("  Created: {}", job.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
    if let Some(started) = job.started_at {
        println!("  Started: {}", started.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if let Some(finished) = job.completed_at {
        println!("  Finished: {}", finished.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    println!(
        "  Estimated duration: {}",
        format_timecode(job.estimated_duration_secs)
    );
    if let Some(secs) = job.output_duration_secs {
        println!("  Output duration: {}", format_timecode(secs));
    }
    if let Some(path) = &job.output_path {
        println!("  Output: {}", path.display());
    }
    if let Some(error) = &job.error {
        println!("  Error: {error}");
    }
    Ok(())
}
