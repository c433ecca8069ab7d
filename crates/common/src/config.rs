//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ShadowcastError, ShadowcastResult};

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory where finished renders are written (`<job-id>.<ext>`).
    pub output_dir: PathBuf,

    /// Directory for per-batch temporary segments.
    pub temp_dir: PathBuf,

    /// Directory holding the persisted job store.
    pub state_dir: PathBuf,

    /// External transcoder settings.
    pub transcoder: TranscoderConfig,

    /// Job scheduling limits.
    pub scheduler: SchedulerConfig,

    /// Job retention policy.
    pub retention: RetentionConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// External transcoder invocation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscoderConfig {
    /// Path to the ffmpeg binary.
    pub ffmpeg_path: PathBuf,

    /// Path to the ffprobe binary. `None` disables output probing.
    pub ffprobe_path: Option<PathBuf>,

    /// Wall-clock budget for a single transcoder process.
    pub timeout_secs: u64,

    /// How long to wait after SIGTERM before escalating to SIGKILL.
    pub kill_grace_secs: u64,

    /// Number of trailing stderr lines kept as failure detail.
    pub error_tail_lines: usize,
}

/// Concurrency and batch limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Maximum transcodes running at the same time.
    pub max_concurrent_renders: usize,

    /// Maximum clips accepted in one batch request.
    pub max_batch_clips: usize,

    /// Capacity of the per-job progress channel.
    pub progress_buffer: usize,
}

/// Retention policy for finished jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Terminal jobs older than this are deleted. 0 keeps jobs forever.
    pub retention_hours: u64,

    /// Interval between cleanup passes.
    pub check_interval_secs: u64,

    /// Default bound for recent-job listings.
    pub recent_limit: usize,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "shadowcast=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            output_dir: data_dir.join("output"),
            temp_dir: data_dir.join("tmp"),
            state_dir: data_dir.join("state"),
            transcoder: TranscoderConfig::default(),
            scheduler: SchedulerConfig::default(),
            retention: RetentionConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: std::env::var("FFMPEG_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("ffmpeg")),
            ffprobe_path: Some(
                std::env::var("FFPROBE_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("ffprobe")),
            ),
            timeout_secs: 600,
            kill_grace_secs: 5,
            error_tail_lines: 40,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_renders: 1,
            max_batch_clips: 50,
            progress_buffer: 64,
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            retention_hours: 24 * 7,
            check_interval_secs: 3600,
            recent_limit: 50,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match Self::load_from(&config_path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Failed to load config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Load config from an explicit file. Missing keys take their defaults.
    pub fn load_from(path: &Path) -> ShadowcastResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ShadowcastError::FileNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                ShadowcastError::Io(e)
            }
        })?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }

    /// Reject values that would make the scheduler or executor unusable.
    pub fn validate(&self) -> ShadowcastResult<()> {
        if self.scheduler.max_concurrent_renders == 0 {
            return Err(ShadowcastError::config(
                "scheduler.max_concurrent_renders must be at least 1",
            ));
        }
        if self.scheduler.max_batch_clips == 0 {
            return Err(ShadowcastError::config(
                "scheduler.max_batch_clips must be at least 1",
            ));
        }
        if self.transcoder.timeout_secs == 0 {
            return Err(ShadowcastError::config(
                "transcoder.timeout_secs must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("shadowcast").join("config.json")
}

/// Default data directory (outputs, temp segments, job state).
fn default_data_dir() -> PathBuf {
    let base = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local").join("share")
        });
    base.join("shadowcast")
}
