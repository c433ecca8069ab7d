//! Timecode helpers for transcoder diagnostics.
//!
//! ffmpeg reports elapsed output time as `HH:MM:SS.fraction`. These helpers
//! convert between that form and seconds.

/// Parse an `HH:MM:SS[.fraction]` timecode into seconds.
///
/// Returns `None` for malformed input, `N/A`, and negative timecodes
/// (ffmpeg prints `-00:00:00.02` for streams with negative start offsets).
pub fn parse_timecode(value: &str) -> Option<f64> {
    let value = value.trim();
    if value.starts_with('-') {
        return None;
    }

    let mut parts = value.split(':');
    let hours = parts.next()?;
    let minutes = parts.next()?;
    let seconds = parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    if hours.is_empty() || minutes.is_empty() || seconds.is_empty() {
        return None;
    }
    if !hours.bytes().all(|b| b.is_ascii_digit()) || !minutes.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if !seconds.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
        return None;
    }

    let hours: f64 = hours.parse().ok()?;
    let minutes: f64 = minutes.parse().ok()?;
    let seconds: f64 = seconds.parse().ok()?;
    if minutes >= 60.0 || seconds >= 60.0 {
        return None;
    }

    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// Format seconds as `HH:MM:SS.mmm`.
pub fn format_timecode(secs: f64) -> String {
    let total_ms = (secs.max(0.0) * 1000.0).round() as u64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let seconds = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;
    format!("{hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
}
