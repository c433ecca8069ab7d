//! Progress extraction from the transcoder's stderr.
//!
//! With `-stats`, ffmpeg rewrites a status line with `\r` roughly twice a
//! second:
//!
//! ```text
//! frame=   48 fps= 31 q=28.0 size=     256kB time=00:00:01.56 bitrate=1343.8kbits/s speed=1.01x
//! ```
//!
//! [`ProgressParser`] turns arbitrary stderr chunks into the latest `time=`
//! cursor and keeps the last few non-status lines as error detail.
//! [`ProgressTracker`] turns that cursor into a monotone percentage.

use std::collections::VecDeque;

use shadowcast_common::timecode::parse_timecode;

/// Incremental stderr parser.
#[derive(Debug)]
pub struct ProgressParser {
    pending: Vec<u8>,
    tail: VecDeque<String>,
    tail_limit: usize,
}

impl Default for ProgressParser {
    fn default() -> Self {
        Self::with_tail(40)
    }
}

impl ProgressParser {
    /// Parser keeping the last `tail_limit` diagnostic lines.
    pub fn with_tail(tail_limit: usize) -> Self {
        Self {
            pending: Vec::new(),
            tail: VecDeque::with_capacity(tail_limit.min(256)),
            tail_limit,
        }
    }

    /// Feed a chunk. Returns the latest elapsed-time marker (seconds) among
    /// the lines completed by this chunk.
    pub fn push(&mut self, chunk: &[u8]) -> Option<f64> {
        self.pending.extend_from_slice(chunk);

        let mut latest = None;
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n' || *b == b'\r') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            if let Some(secs) = self.consume_line(&line[..line.len() - 1]) {
                latest = Some(secs);
            }
        }
        latest
    }

    /// Flush a trailing line that never got a terminator.
    pub fn finish(&mut self) -> Option<f64> {
        if self.pending.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.pending);
        self.consume_line(&line)
    }

    /// Last diagnostic lines, oldest first, joined with newlines.
    pub fn tail(&self) -> String {
        self.tail.iter().cloned().collect::<Vec<_>>().join("\n")
    }

    fn consume_line(&mut self, raw: &[u8]) -> Option<f64> {
        let line = String::from_utf8_lossy(raw);
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        if is_stats_line(line) {
            return extract_time(line);
        }
        if self.tail_limit > 0 {
            if self.tail.len() == self.tail_limit {
                self.tail.pop_front();
            }
            self.tail.push_back(line.to_string());
        }
        None
    }
}

fn is_stats_line(line: &str) -> bool {
    (line.starts_with("frame=") || line.starts_with("size=")) && line.contains("time=")
}

/// Extract the last `time=HH:MM:SS.frac` value from a line.
///
/// `N/A` and negative markers yield `None`.
pub fn extract_time(line: &str) -> Option<f64> {
    let mut latest = None;
    let mut rest = line;
    while let Some(idx) = rest.find("time=") {
        let boundary = idx == 0 || rest[..idx].ends_with(char::is_whitespace);
        let after = &rest[idx + "time=".len()..];
        if boundary {
            let value = after.split_whitespace().next().unwrap_or("");
            if let Some(secs) = parse_timecode(value) {
                latest = Some(secs);
            }
        }
        rest = after;
    }
    latest
}

/// Converts elapsed output seconds into a clamped, non-decreasing percent.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    estimated_secs: f64,
    percent: u8,
}

impl ProgressTracker {
    pub fn new(estimated_secs: f64) -> Self {
        Self {
            estimated_secs,
            percent: 0,
        }
    }

    /// Current percent.
    pub fn percent(&self) -> u8 {
        self.percent
    }

    /// Record an elapsed marker. Returns the new percent when it advanced.
    pub fn observe(&mut self, elapsed_secs: f64) -> Option<u8> {
        if !self.estimated_secs.is_finite() || self.estimated_secs <= 0.0 {
            return None;
        }
        let raw = (100.0 * elapsed_secs / self.estimated_secs).round();
        let percent = raw.clamp(0.0, 100.0) as u8;
        if percent > self.percent {
            self.percent = percent;
            Some(percent)
        } else {
            None
        }
    }

    /// Mark completion. Returns 100 if not already reported.
    pub fn complete(&mut self) -> Option<u8> {
        if self.percent < 100 {
            self.percent = 100;
            Some(100)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SAMPLE: &str = "frame=   12 fps=0.0 q=28.0 size=       0kB time=00:00:00.36 bitrate=   1.1kbits/s speed=0.71x    \r\
frame=   48 fps= 31 q=28.0 size=     256kB time=00:00:01.56 bitrate=1343.8kbits/s speed=1.01x    \r\
frame=  228 fps= 32 q=-1.0 Lsize=    1240kB time=00:00:07.60 bitrate=1336.6kbits/s speed=1.06x    \n";

    #[test]
    fn test_sample_output_yields_latest_marker() {
        let mut parser = ProgressParser::default();
        assert_eq!(parser.push(SAMPLE.as_bytes()), Some(7.6));
        assert_eq!(parser.tail(), "");
    }

    #[test]
    fn test_partial_lines_are_buffered() {
        let mut parser = ProgressParser::default();
        assert_eq!(parser.push(b"frame=1 time=00:00:0"), None);
        assert_eq!(parser.push(b"2.50 speed=1x\r"), Some(2.5));
        assert_eq!(parser.push(b"frame=2 time=00:00:03.00"), None);
        assert_eq!(parser.finish(), Some(3.0));
    }

    #[test]
    fn test_na_and_negative_markers_are_ignored() {
        assert_eq!(extract_time("size=N/A time=N/A bitrate=N/A speed=N/A"), None);
        assert_eq!(extract_time("frame=0 time=-00:00:00.02 bitrate=N/A"), None);
        assert_eq!(extract_time("frame=1 out_time=00:00:04.00"), None);
    }

    #[test]
    fn test_error_lines_go_to_tail() {
        let mut parser = ProgressParser::with_tail(2);
        parser.push(b"first error\nsecond error\n");
        parser.push(b"frame=1 time=00:00:00.10 speed=1x\r");
        parser.push(b"[libx264 @ 0x55] broken\n");
        assert_eq!(parser.tail(), "second error\n[libx264 @ 0x55] broken");
    }

    #[test]
    fn test_tracker_rounds_and_clamps() {
        let mut tracker = ProgressTracker::new(7.6);
        assert_eq!(tracker.observe(3.8), Some(50));
        assert_eq!(tracker.observe(3.0), None);
        assert_eq!(tracker.percent(), 50);
        assert_eq!(tracker.observe(9.0), Some(100));
        assert_eq!(tracker.complete(), None);
    }

    #[test]
    fn test_tracker_without_markers_jumps_to_complete() {
        let mut tracker = ProgressTracker::new(2.0);
        assert_eq!(tracker.complete(), Some(100));
    }

    #[test]
    fn test_tracker_with_zero_estimate_never_advances() {
        let mut tracker = ProgressTracker::new(0.0);
        assert_eq!(tracker.observe(5.0), None);
    }

    proptest! {
        #[test]
        fn prop_tracker_is_monotone(markers in proptest::collection::vec(0.0f64..20.0, 0..50)) {
            let mut tracker = ProgressTracker::new(10.0);
            let mut last = 0u8;
            for m in markers {
                tracker.observe(m);
                prop_assert!(tracker.percent() >= last);
                prop_assert!(tracker.percent() <= 100);
                last = tracker.percent();
            }
        }

        #[test]
        fn prop_chunking_does_not_change_result(split in 0usize..SAMPLE.len()) {
            let (a, b) = SAMPLE.as_bytes().split_at(split);
            let mut parser = ProgressParser::default();
            let first = parser.push(a);
            let second = parser.push(b);
            prop_assert_eq!(second.or(first), Some(7.6));
        }
    }
}
