//! Multi-clip batch rendering.
//!
//! Each clip is rendered to a private segment file, then all segments are
//! stream-copied into one artifact with the concat demuxer. The segment
//! directory belongs to exactly one run and is removed whatever the outcome.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use shadowcast_common::error::{ShadowcastError, ShadowcastResult};
use shadowcast_render_model::{ClipRef, RenderTemplate};

use crate::compile::{compile, compile_concat, concat_manifest, CommandSpec, EncodeProfile};
use crate::executor::{ProcessExecutor, RenderProgress, RenderResult, RenderStage};

const MANIFEST_NAME: &str = "concat.txt";

/// A fully compiled batch, ready to run.
#[derive(Debug, Clone)]
pub struct BatchPlan {
    /// Per-clip render commands, in output order, paired with clip ids.
    pub segments: Vec<(String, CommandSpec)>,
    /// Private directory for segment files and the manifest.
    pub temp_dir: PathBuf,
    pub output_path: PathBuf,
}

impl BatchPlan {
    /// Compile every clip. Fails before anything touches the disk.
    pub fn compile(
        clips: &[ClipRef],
        template: &RenderTemplate,
        temp_dir: PathBuf,
        output_path: PathBuf,
        max_clips: usize,
    ) -> ShadowcastResult<Self> {
        if clips.is_empty() {
            return Err(ShadowcastError::compile("batch contains no clips"));
        }
        if clips.len() > max_clips {
            return Err(ShadowcastError::compile(format!(
                "batch of {} clips exceeds the limit of {max_clips}",
                clips.len()
            )));
        }

        let ext = template.format.extension();
        let segments = clips
            .iter()
            .enumerate()
            .map(|(i, clip)| {
                let path = temp_dir.join(format!("segment-{i:03}.{ext}"));
                compile(clip, template, &path)
                    .map(|spec| (clip.id.clone(), spec))
                    .map_err(|e| ShadowcastError::compile(format!("clip {} ({}): {e}", i + 1, clip.id)))
            })
            .collect::<ShadowcastResult<Vec<_>>>()?;

        Ok(Self {
            segments,
            temp_dir,
            output_path,
        })
    }

    pub fn estimated_duration_secs(&self) -> f64 {
        self.segments
            .iter()
            .map(|(_, spec)| spec.estimated_duration_secs)
            .sum()
    }
}

/// Temporary segment directory owned by one batch run.
///
/// Removed on drop; [`TempSegments::remove`] performs the same removal
/// asynchronously and reports failures.
#[derive(Debug)]
pub struct TempSegments {
    dir: PathBuf,
    removed: bool,
}

impl TempSegments {
    pub async fn create(dir: &Path) -> ShadowcastResult<Self> {
        tokio::fs::create_dir_all(dir).await?;
        Ok(Self {
            dir: dir.to_path_buf(),
            removed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub async fn remove(mut self) -> ShadowcastResult<()> {
        self.removed = true;
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for TempSegments {
    fn drop(&mut self) {
        if !self.removed {
            let _ = std::fs::remove_dir_all(&self.dir);
        }
    }
}

/// Aggregate batch percent: `(completed + current/100) / total`.
///
/// Capped at 99 until the merged artifact exists.
pub fn aggregate_percent(completed: usize, current: u8, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let fraction = (completed as f64 + f64::from(current.min(100)) / 100.0) / total as f64;
    ((fraction * 100.0).floor() as u8).min(99)
}

/// Renders batches through a shared [`ProcessExecutor`].
#[derive(Debug, Clone)]
pub struct BatchOrchestrator {
    executor: Arc<ProcessExecutor>,
}

impl BatchOrchestrator {
    pub fn new(executor: Arc<ProcessExecutor>) -> Self {
        Self { executor }
    }

    /// Render `plan` into `plan.output_path`.
    ///
    /// Fails fast on the first clip error. The temp directory is removed on
    /// every exit path.
    pub async fn run<F>(
        &self,
        plan: &BatchPlan,
        cancel: &CancellationToken,
        on_progress: F,
    ) -> ShadowcastResult<RenderResult>
    where
        F: Fn(RenderProgress) + Send + Sync,
    {
        let temp = TempSegments::create(&plan.temp_dir).await?;
        let result = self.run_in(plan, &temp, cancel, &on_progress).await;

        let dir = temp.path().to_path_buf();
        if let Err(e) = temp.remove().await {
            tracing::warn!(dir = %dir.display(), "Failed to remove batch temp dir: {e}");
        }
        result
    }

    async fn run_in<F>(
        &self,
        plan: &BatchPlan,
        temp: &TempSegments,
        cancel: &CancellationToken,
        on_progress: &F,
    ) -> ShadowcastResult<RenderResult>
    where
        F: Fn(RenderProgress) + Send + Sync,
    {
        let start = Instant::now();
        let total = plan.segments.len();
        let mut rendered: Vec<RenderResult> = Vec::with_capacity(total);

        for (index, (clip_id, spec)) in plan.segments.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(ShadowcastError::Cancelled);
            }
            tracing::info!(index, total, clip_id = %clip_id, "Rendering batch clip");

            let result = self
                .executor
                .execute(spec, cancel, |p| {
                    on_progress(RenderProgress {
                        percent: aggregate_percent(index, p.percent, total),
                        stage: RenderStage::Rendering,
                        clip: Some((index, total)),
                    })
                })
                .await;

            match result {
                Ok(result) => rendered.push(result),
                Err(ShadowcastError::Cancelled) => return Err(ShadowcastError::Cancelled),
                Err(e) => {
                    tracing::warn!(index, clip_id = %clip_id, "Batch clip failed: {e}");
                    return Err(ShadowcastError::BatchClip {
                        index,
                        clip_id: clip_id.clone(),
                        source: Box::new(e),
                    });
                }
            }
        }

        let profile = ensure_mergeable(plan)?;
        let mut final_result = if let [single] = rendered.as_slice() {
            on_progress(RenderProgress::new(99, RenderStage::Finalizing));
            relocate(&single.output_path, &plan.output_path).await?;
            RenderResult {
                output_path: plan.output_path.clone(),
                ..single.clone()
            }
        } else {
            on_progress(RenderProgress::new(99, RenderStage::Merging));
            let segments: Vec<PathBuf> = rendered.iter().map(|r| r.output_path.clone()).collect();
            let manifest_path = temp.path().join(MANIFEST_NAME);
            tokio::fs::write(&manifest_path, concat_manifest(&segments)).await?;

            let merge = compile_concat(
                &manifest_path,
                &plan.output_path,
                profile,
                plan.estimated_duration_secs(),
            );
            tracing::info!(segments = total, output = %plan.output_path.display(), "Merging batch segments");
            self.executor
                .execute(&merge, cancel, |_| {})
                .await
                .map_err(|e| match e {
                    ShadowcastError::Transcode { exit_code, detail } => {
                        ShadowcastError::transcode(exit_code, format!("merge failed: {detail}"))
                    }
                    other => other,
                })?
        };

        final_result.estimated_duration_secs = plan.estimated_duration_secs();
        final_result.elapsed_secs = start.elapsed().as_secs_f64();
        on_progress(RenderProgress::new(100, RenderStage::Complete));
        Ok(final_result)
    }
}

/// Every segment must share one encode profile to be stream-copied.
pub fn ensure_mergeable(plan: &BatchPlan) -> ShadowcastResult<EncodeProfile> {
    let mut segments = plan.segments.iter();
    let (_, first) = segments
        .next()
        .ok_or_else(|| ShadowcastError::compile("batch contains no clips"))?;
    for (clip_id, spec) in segments {
        if spec.encode != first.encode {
            return Err(ShadowcastError::merge_incompatible(format!(
                "clip {clip_id} was encoded as {:?}, expected {:?}",
                spec.encode, first.encode
            )));
        }
    }
    Ok(first.encode)
}

/// Move `from` to `to`, copying when a rename crosses filesystems.
async fn relocate(from: &Path, to: &Path) -> ShadowcastResult<()> {
    if let Some(parent) = to.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    if let Err(e) = tokio::fs::rename(from, to).await {
        tracing::debug!("Rename failed ({e}), falling back to copy");
        tokio::fs::copy(from, to).await?;
        tokio::fs::remove_file(from).await?;
    }
    Ok(())
}
