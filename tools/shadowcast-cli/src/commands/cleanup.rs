//! Delete finished jobs past the retention window.

use std::sync::Arc;

use shadowcast_common::config::AppConfig;
use shadowcast_job_store::{FileJobStore, RetentionService};

pub async fn run(config: &AppConfig, hours: Option<u64>) -> anyhow::Result<()> {
    let mut retention = config.retention.clone();
    if let Some(hours) = hours {
        retention.retention_hours = hours;
    }
    if retention.retention_hours == 0 {
        println!("Retention is disabled (retention_hours = 0); nothing to do.");
        return Ok(());
    }

    let store = FileJobStore::open(&config.state_dir).await?;
    let removed = RetentionService::new(retention.clone(), Arc::new(store))
        .run_once()
        .await?;
    println!(
        "Removed {removed} finished job(s) older than {}h.",
        retention.retention_hours
    );
    Ok(())
}
