//! Error types shared across Shadowcast crates.

use std::path::PathBuf;

/// Top-level error type for Shadowcast operations.
#[derive(Debug, thiserror::Error)]
pub enum ShadowcastError {
    /// Invalid template/clip combination, detected before any process spawns.
    #[error("Compile error: {message}")]
    Compile { message: String },

    /// The transcoder exited with a non-zero status.
    #[error("Transcoder failed (exit code {}): {detail}", .exit_code.map_or_else(|| "none".to_string(), |c| c.to_string()))]
    Transcode {
        exit_code: Option<i32>,
        detail: String,
    },

    /// The transcoder exceeded its wall-clock budget and was killed.
    #[error("Timeout: transcoder exceeded {timeout_secs}s and was terminated")]
    Timeout { timeout_secs: u64 },

    /// The render was cancelled by an explicit caller request.
    #[error("Cancelled")]
    Cancelled,

    /// A clip inside a batch failed; wraps that clip's error.
    #[error("Batch clip {index} ({clip_id}) failed: {source}")]
    BatchClip {
        index: usize,
        clip_id: String,
        #[source]
        source: Box<ShadowcastError>,
    },

    /// Segments cannot be stream-copied together.
    #[error("Cannot merge without re-encode: {message}")]
    MergeIncompatible { message: String },

    #[error("Invalid state transition: cannot transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Job not found: {id}")]
    JobNotFound { id: String },

    #[error("Clip not found: {id}")]
    ClipNotFound { id: String },

    #[error("Job {id} already {status}")]
    AlreadyFinished { id: String, status: String },

    #[error("Output path is already being rendered: {path}")]
    OutputBusy { path: PathBuf },

    #[error("Job store error: {message}")]
    Store { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using ShadowcastError.
pub type ShadowcastResult<T> = Result<T, ShadowcastError>;

impl ShadowcastError {
    pub fn compile(msg: impl Into<String>) -> Self {
        Self::Compile {
            message: msg.into(),
        }
    }

    pub fn transcode(exit_code: Option<i32>, detail: impl Into<String>) -> Self {
        Self::Transcode {
            exit_code,
            detail: detail.into(),
        }
    }

    pub fn merge_incompatible(msg: impl Into<String>) -> Self {
        Self::MergeIncompatible {
            message: msg.into(),
        }
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }

    pub fn job_not_found(id: impl Into<String>) -> Self {
        Self::JobNotFound { id: id.into() }
    }

    pub fn clip_not_found(id: impl Into<String>) -> Self {
        Self::ClipNotFound { id: id.into() }
    }

    /// Whether this error (or the clip error it wraps) is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::BatchClip { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    /// Whether this error (or the clip error it wraps) is a timeout.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::BatchClip { source, .. } => source.is_timeout(),
            _ => false,
        }
    }
}
