//! Transcoder process execution.
//!
//! [`ProcessExecutor::execute`] runs exactly one ffmpeg process for a
//! [`CommandSpec`], streams its stderr through the progress parser, and
//! resolves to a [`RenderResult`] or a classified error (transcoder failure,
//! timeout, or cancellation).

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

use shadowcast_common::config::TranscoderConfig;
use shadowcast_common::error::{ShadowcastError, ShadowcastResult};

use crate::compile::CommandSpec;
use crate::probe::probe_duration;
use crate::progress::{ProgressParser, ProgressTracker};

/// Pipeline stage reported alongside progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStage {
    Preparing,
    Rendering,
    Merging,
    Finalizing,
    Complete,
}

impl RenderStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Preparing => "preparing",
            Self::Rendering => "rendering",
            Self::Merging => "merging",
            Self::Finalizing => "finalizing",
            Self::Complete => "complete",
        }
    }
}

/// A progress report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderProgress {
    /// 0-100, non-decreasing within one call.
    pub percent: u8,
    pub stage: RenderStage,
    /// `(index, total)` of the clip being rendered inside a batch.
    pub clip: Option<(usize, usize)>,
}

impl RenderProgress {
    pub fn new(percent: u8, stage: RenderStage) -> Self {
        Self {
            percent,
            stage,
            clip: None,
        }
    }

    /// Human-readable stage, e.g. `rendering clip 2/3`.
    pub fn stage_label(&self) -> String {
        match self.clip {
            Some((index, total)) if self.stage == RenderStage::Rendering => {
                format!("{} clip {}/{}", self.stage.as_str(), index + 1, total)
            }
            _ => self.stage.as_str().to_string(),
        }
    }
}

/// Outcome of a successful render.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderResult {
    pub output_path: PathBuf,
    pub size_bytes: u64,
    /// Duration measured by ffprobe; `None` when probing is disabled or failed.
    pub probed_duration_secs: Option<f64>,
    pub estimated_duration_secs: f64,
    /// Wall-clock time spent in the transcoder.
    pub elapsed_secs: f64,
}

/// Output paths with a transcoder currently writing to them.
static ACTIVE_OUTPUTS: Mutex<Vec<PathBuf>> = parking_lot::const_mutex(Vec::new());

/// Reservation of an output path for the lifetime of one process.
struct OutputClaim {
    path: PathBuf,
}

impl OutputClaim {
    fn acquire(path: &Path) -> ShadowcastResult<Self> {
        let mut active = ACTIVE_OUTPUTS.lock();
        if active.iter().any(|p| p == path) {
            return Err(ShadowcastError::OutputBusy {
                path: path.to_path_buf(),
            });
        }
        active.push(path.to_path_buf());
        Ok(Self {
            path: path.to_path_buf(),
        })
    }
}

impl Drop for OutputClaim {
    fn drop(&mut self) {
        ACTIVE_OUTPUTS.lock().retain(|p| p != &self.path);
    }
}

enum Outcome {
    Exited(ExitStatus),
    TimedOut,
    Cancelled,
}

/// Runs transcoder processes.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    config: TranscoderConfig,
}

impl ProcessExecutor {
    pub fn new(config: TranscoderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TranscoderConfig {
        &self.config
    }

    /// Run `spec` to completion.
    ///
    /// `on_progress` receives non-decreasing percentages and exactly one
    /// final 100 on success. Firing `cancel` terminates the process and
    /// yields [`ShadowcastError::Cancelled`].
    pub async fn execute<F>(
        &self,
        spec: &CommandSpec,
        cancel: &CancellationToken,
        on_progress: F,
    ) -> ShadowcastResult<RenderResult>
    where
        F: Fn(RenderProgress) + Send + Sync,
    {
        let _claim = OutputClaim::acquire(&spec.output_path)?;
        if cancel.is_cancelled() {
            return Err(ShadowcastError::Cancelled);
        }
        if let Some(parent) = spec.output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        on_progress(RenderProgress::new(0, RenderStage::Preparing));

        let program = &self.config.ffmpeg_path;
        tracing::debug!(args = ?spec.args, "Running transcoder");
        let start = Instant::now();
        let mut child = Command::new(program)
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ShadowcastError::transcode(
                    None,
                    format!("Failed to start {}: {e}", program.display()),
                )
            })?;

        let pid = child.id();
        tracing::info!(
            pid,
            output = %spec.output_path.display(),
            estimated_secs = spec.estimated_duration_secs,
            "Transcoder started"
        );

        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| ShadowcastError::transcode(None, "Failed to capture transcoder stderr"))?;

        let mut parser = ProgressParser::with_tail(self.config.error_tail_lines);
        let mut tracker = ProgressTracker::new(spec.estimated_duration_secs);
        let report = |secs: Option<f64>, tracker: &mut ProgressTracker| {
            if let Some(percent) = secs.and_then(|s| tracker.observe(s)) {
                // 100 is reserved for the verified result.
                if percent < 100 {
                    on_progress(RenderProgress::new(percent, RenderStage::Rendering));
                }
            }
        };

        let deadline = tokio::time::sleep(Duration::from_secs(self.config.timeout_secs));
        tokio::pin!(deadline);

        let mut buf = [0u8; 4096];
        let mut stderr_open = true;
        let outcome = loop {
            tokio::select! {
                read = stderr.read(&mut buf), if stderr_open => match read {
                    Ok(0) => stderr_open = false,
                    Ok(n) => report(parser.push(&buf[..n]), &mut tracker),
                    Err(e) => {
                        tracing::warn!(pid, "Failed reading transcoder stderr: {e}");
                        stderr_open = false;
                    }
                },
                status = child.wait() => match status {
                    Ok(status) => break Outcome::Exited(status),
                    Err(e) => {
                        return Err(ShadowcastError::transcode(
                            None,
                            format!("Failed to wait on transcoder: {e}"),
                        ))
                    }
                },
                _ = &mut deadline => break Outcome::TimedOut,
                _ = cancel.cancelled() => break Outcome::Cancelled,
            }
        };

        let status = match outcome {
            Outcome::Exited(status) => status,
            Outcome::TimedOut => {
                tracing::warn!(
                    pid,
                    timeout_secs = self.config.timeout_secs,
                    "Transcoder timed out, terminating"
                );
                self.terminate(&mut child).await;
                remove_partial(&spec.output_path).await;
                return Err(ShadowcastError::Timeout {
                    timeout_secs: self.config.timeout_secs,
                });
            }
            Outcome::Cancelled => {
                tracing::info!(pid, "Render cancelled, terminating transcoder");
                self.terminate(&mut child).await;
                remove_partial(&spec.output_path).await;
                return Err(ShadowcastError::Cancelled);
            }
        };

        if stderr_open {
            let mut rest = Vec::new();
            if let Err(e) = stderr.read_to_end(&mut rest).await {
                tracing::debug!(pid, "Failed draining transcoder stderr: {e}");
            }
            report(parser.push(&rest), &mut tracker);
        }
        report(parser.finish(), &mut tracker);

        let elapsed_secs = start.elapsed().as_secs_f64();
        let tail = parser.tail();
        tracing::info!(pid, code = ?status.code(), elapsed_secs, "Transcoder exited");
        if !tail.is_empty() {
            tracing::debug!(pid, stderr_tail = %tail, "Transcoder diagnostics");
        }

        if !status.success() {
            remove_partial(&spec.output_path).await;
            let detail = if tail.is_empty() {
                format!("transcoder exited with {status}")
            } else {
                tail
            };
            return Err(ShadowcastError::transcode(status.code(), detail));
        }

        on_progress(RenderProgress::new(tracker.percent(), RenderStage::Finalizing));
        let metadata = tokio::fs::metadata(&spec.output_path).await.map_err(|e| {
            ShadowcastError::transcode(
                Some(0),
                format!(
                    "Transcoder reported success but {} is unreadable: {e}",
                    spec.output_path.display()
                ),
            )
        })?;

        let probed_duration_secs = match &self.config.ffprobe_path {
            Some(ffprobe) => match probe_duration(ffprobe, &spec.output_path).await {
                Ok(secs) => Some(secs),
                Err(e) => {
                    tracing::warn!(output = %spec.output_path.display(), "Failed to probe output: {e}");
                    None
                }
            },
            None => None,
        };

        tracker.complete();
        on_progress(RenderProgress::new(100, RenderStage::Complete));

        Ok(RenderResult {
            output_path: spec.output_path.clone(),
            size_bytes: metadata.len(),
            probed_duration_secs,
            estimated_duration_secs: spec.estimated_duration_secs,
            elapsed_secs,
        })
    }

    /// SIGTERM, wait for the grace period, then SIGKILL.
    async fn terminate(&self, child: &mut Child) {
        let grace = Duration::from_secs(self.config.kill_grace_secs);

        #[cfg(unix)]
        if let Some(pid) = child.id() {
            // SAFETY: kill(2) has no memory-safety preconditions; the pid
            // belongs to a child we have not reaped yet.
            let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
            if rc == 0 {
                match tokio::time::timeout(grace, child.wait()).await {
                    Ok(Ok(status)) => {
                        tracing::debug!(pid, %status, "Transcoder exited after SIGTERM");
                        return;
                    }
                    Ok(Err(e)) => tracing::warn!(pid, "Failed waiting after SIGTERM: {e}"),
                    Err(_) => tracing::warn!(pid, "Transcoder ignored SIGTERM, killing"),
                }
            }
        }

        #[cfg(not(unix))]
        let _ = grace;

        if let Err(e) = child.kill().await {
            tracing::warn!("Failed to kill transcoder: {e}");
        }
    }
}

async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed partial output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), "Failed to remove partial output: {e}"),
    }
}
