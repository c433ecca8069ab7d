//! Fake transcoder used by unit tests.

use std::path::{Path, PathBuf};

use shadowcast_common::config::TranscoderConfig;

const FAKE_TRANSCODER: &str = r#"#!/bin/sh
out=""
for arg in "$@"; do out="$arg"; done
mode="__MODE__"
if [ "$mode" = "fail-second" ]; then
  case "$out" in
    *segment-001*) mode=fail ;;
    *) mode=ok ;;
  esac
fi
case "$mode" in
  hang)
    printf 'frame=1 time=00:00:00.10 speed=1x\r' >&2
    exec sleep 30
    ;;
  stubborn)
    trap '' TERM
    printf 'frame=1 time=00:00:00.10 speed=1x\r' >&2
    exec sleep 30
    ;;
  fail)
    printf 'frame=1 time=00:00:00.50 speed=1x\r' >&2
    echo 'Invalid data found when processing input' >&2
    exit 1
    ;;
  *)
    printf 'frame=10 time=00:00:01.00 speed=1x\r' >&2
    printf 'frame=20 time=00:00:02.00 speed=1x\n' >&2
    printf 'fake media' > "$out"
    ;;
esac
"#;

/// Write a POSIX sh stand-in for ffmpeg into `dir`.
///
/// Modes: `ok` writes its last argument, `fail` exits 1 with an error line,
/// `hang` sleeps until killed, `stubborn` also ignores SIGTERM, `fail-second`
/// fails only for `segment-001`.
pub(crate) fn fake_transcoder(dir: &Path, mode: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(format!("fake-ffmpeg-{mode}"));
    std::fs::write(&path, FAKE_TRANSCODER.replace("__MODE__", mode)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

pub(crate) fn transcoder_config(program: &Path, timeout_secs: u64) -> TranscoderConfig {
    TranscoderConfig {
        ffmpeg_path: program.to_path_buf(),
        ffprobe_path: None,
        timeout_secs,
        kill_grace_secs: 1,
        error_tail_lines: 10,
    }
}
