//! Background retention cleanup of finished jobs.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use shadowcast_common::config::RetentionConfig;
use shadowcast_common::error::ShadowcastResult;

use crate::store::JobStore;

/// Periodically deletes terminal jobs older than the retention window.
pub struct RetentionService {
    config: RetentionConfig,
    store: Arc<dyn JobStore>,
}

impl RetentionService {
    pub fn new(config: RetentionConfig, store: Arc<dyn JobStore>) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &RetentionConfig {
        &self.config
    }

    /// Run a single cleanup pass. Returns the number of jobs deleted.
    pub async fn run_once(&self) -> ShadowcastResult<usize> {
        if self.config.retention_hours == 0 {
            debug!("Job retention disabled (retention_hours = 0)");
            return Ok(0);
        }

        let Some(cutoff) = retention_cutoff(self.config.retention_hours) else {
            debug!(
                "Retention window of {}h reaches before the earliest date, keeping all jobs",
                self.config.retention_hours
            );
            return Ok(0);
        };
        let deleted = self.store.cleanup(cutoff).await?;
        if deleted > 0 {
            info!(
                "Deleted {} finished jobs (retention: {}h)",
                deleted, self.config.retention_hours
            );
        } else {
            debug!("No jobs past retention");
        }
        Ok(deleted)
    }

    /// Run cleanup every `check_interval_secs` until `cancel` fires.
    pub fn start(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let period = Duration::from_secs(self.config.check_interval_secs.max(1));
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!(
                "Job retention service started (retention: {}h, interval: {}s)",
                self.config.retention_hours,
                period.as_secs()
            );

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("Job retention service shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = self.run_once().await {
                            error!("Retention cycle failed: {}", e);
                        }
                    }
                }
            }
        })
    }
}

/// `now - hours`, or `None` when that is not a representable instant.
fn retention_cutoff(hours: u64) -> Option<DateTime<Utc>> {
    let window = i64::try_from(hours).ok().and_then(TimeDelta::try_hours)?;
    Utc::now().checked_sub_signed(window)
}
