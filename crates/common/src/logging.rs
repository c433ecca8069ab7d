//! Logging and tracing initialization.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::{ShadowcastError, ShadowcastResult};

/// Initialize the tracing subscriber with the given configuration.
///
/// `RUST_LOG` takes precedence over `config.level`. When `config.file` is set,
/// output is appended there through a background writer instead of stderr.
/// Keep the returned guard alive until exit so buffered lines are flushed.
pub fn init_logging(config: &LoggingConfig) -> ShadowcastResult<Option<WorkerGuard>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let Some(path) = &config.file else {
        let builder = fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_target(true);
        if config.json {
            tracing::subscriber::set_global_default(builder.json().finish()).ok();
        } else {
            let subscriber = builder
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber).ok();
        }
        return Ok(None);
    };

    let (writer, guard) = tracing_appender::non_blocking(file_appender(path)?);
    let builder = fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true);
    if config.json {
        tracing::subscriber::set_global_default(builder.json().finish()).ok();
    } else {
        tracing::subscriber::set_global_default(builder.finish()).ok();
    }
    Ok(Some(guard))
}

/// Appender writing to exactly `path`, never rotated.
fn file_appender(path: &Path) -> ShadowcastResult<RollingFileAppender> {
    let file_name = path
        .file_name()
        .ok_or_else(|| {
            ShadowcastError::config(format!("log file {} has no file name", path.display()))
        })?
        .to_string_lossy()
        .into_owned();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    std::fs::create_dir_all(dir).map_err(|e| {
        ShadowcastError::config(format!("failed to create log directory {}: {e}", dir.display()))
    })?;
    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(dir)
        .map_err(|e| ShadowcastError::config(format!("failed to open log file {}: {e}", path.display())))
}
