//! Media probing and tool discovery via ffprobe.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;

use shadowcast_common::error::{ShadowcastError, ShadowcastResult};
use shadowcast_render_model::Resolution;

/// Container duration of `media`, in seconds.
pub async fn probe_duration(ffprobe: &Path, media: &Path) -> ShadowcastResult<f64> {
    let raw = run_ffprobe(
        ffprobe,
        &[
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ],
        media,
    )
    .await?;

    let secs: f64 = raw
        .lines()
        .next()
        .map(str::trim)
        .and_then(|line| line.parse().ok())
        .ok_or_else(|| {
            ShadowcastError::unsupported(format!(
                "ffprobe returned no duration for {}",
                media.display()
            ))
        })?;
    Ok(secs)
}

/// Dimensions of the first video stream of `media`.
pub async fn probe_dimensions(ffprobe: &Path, media: &Path) -> ShadowcastResult<Resolution> {
    let raw = run_ffprobe(
        ffprobe,
        &[
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height",
            "-of",
            "csv=p=0:s=x",
        ],
        media,
    )
    .await?;

    parse_dimensions(&raw).ok_or_else(|| {
        ShadowcastError::unsupported(format!(
            "ffprobe returned no video dimensions for {}",
            media.display()
        ))
    })
}

fn parse_dimensions(raw: &str) -> Option<Resolution> {
    let line = raw.lines().next()?.trim();
    let (w, h) = line.split_once('x')?;
    let width = w.parse::<u32>().ok()?;
    let height = h.parse::<u32>().ok()?;
    if width == 0 || height == 0 {
        return None;
    }
    Some(Resolution { width, height })
}

async fn run_ffprobe(ffprobe: &Path, args: &[&str], media: &Path) -> ShadowcastResult<String> {
    let output = Command::new(ffprobe)
        .args(args)
        .arg(media)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| {
            ShadowcastError::unsupported(format!("Failed to run {}: {e}", ffprobe.display()))
        })?;

    if !output.status.success() {
        return Err(ShadowcastError::unsupported(format!(
            "ffprobe failed on {}: {}",
            media.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Whether `binary` resolves to an executable (bare names use `PATH`).
pub fn command_exists(binary: &Path) -> bool {
    if binary.components().count() > 1 {
        return binary.is_file();
    }
    std::process::Command::new("sh")
        .arg("-c")
        .arg(format!("command -v '{}' >/dev/null 2>&1", binary.display()))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}
