//! List jobs.

use shadowcast_common::config::AppConfig;
use shadowcast_job_store::FileJobStore;

pub async fn run(config: &AppConfig, active: bool, limit: Option<usize>) -> anyhow::Result<()> {
    let table = FileJobStore::inspect(&config.state_dir).await?;
    let limit = limit.unwrap_or(config.retention.recent_limit);
    let jobs = if active {
        let mut jobs = table.list_active();
        jobs.truncate(limit);
        jobs
    } else {
        table.list_recent(limit)
    };

    if jobs.is_empty() {
        println!("No jobs.");
        return Ok(());
    }

    println!(
        "{:<36}  {:<10}  {:>4}  {:<19}  CLIPS",
        "ID", "STATUS", "%", "CREATED"
    );
    for job in &jobs {
        println!(
            "{:<36}  {:<10}  {:>4}  {:<19}  {}",
            job.id,
            job.status.as_str(),
            job.progress,
            job.created_at.format("%Y-%m-%d %H:%M:%S"),
            job.clip_ids.join(",")
        );
    }
    println!("\n{} job(s)", jobs.len());
    Ok(())
}
