//! End-to-end renders against a real ffmpeg installation.
//!
//! Run with `cargo test -p shadowcast-render-engine -- --ignored`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use shadowcast_common::config::TranscoderConfig;
use shadowcast_render_engine::{
    compile, probe_dimensions, probe_duration, BatchOrchestrator, BatchPlan, ProcessExecutor,
};
use shadowcast_render_model::{
    AspectRatio, BackgroundFill, ClipRef, LayerVisibility, RenderTemplate, RepeatPattern,
    RepeatSlot, TextLayer,
};
use tokio_util::sync::CancellationToken;

fn config() -> TranscoderConfig {
    TranscoderConfig {
        timeout_secs: 120,
        ..TranscoderConfig::default()
    }
}

/// Generate a 4:3 test source with a tone.
async fn make_source(dir: &Path, name: &str, secs: f64) -> PathBuf {
    let path = dir.join(name);
    let status = tokio::process::Command::new(&config().ffmpeg_path)
        .args(["-hide_banner", "-loglevel", "error", "-y", "-f", "lavfi", "-i"])
        .arg(format!("testsrc=size=640x480:rate=25:duration={secs}"))
        .args(["-f", "lavfi", "-i"])
        .arg(format!("sine=frequency=440:duration={secs}"))
        .args(["-c:v", "libx264", "-c:a", "aac", "-shortest"])
        .arg(&path)
        .status()
        .await
        .expect("ffmpeg should be installed for ignored tests");
    assert!(status.success());
    path
}

fn shadowing_template() -> RenderTemplate {
    RenderTemplate::new(
        "shorts",
        AspectRatio::Vertical,
        RepeatPattern::Custom {
            repeats: vec![
                RepeatSlot {
                    layers: LayerVisibility::only(&[TextLayer::English]),
                    pause_secs: 0.5,
                },
                RepeatSlot {
                    layers: LayerVisibility::only(&[TextLayer::Korean]),
                    pause_secs: 0.5,
                },
                RepeatSlot {
                    layers: LayerVisibility::none(),
                    pause_secs: 0.5,
                },
            ],
        },
    )
}

fn ffprobe() -> PathBuf {
    config()
        .ffprobe_path
        .unwrap_or_else(|| PathBuf::from("ffprobe"))
}

#[tokio::test]
#[ignore = "requires ffmpeg and ffprobe"]
async fn test_vertical_repeat_render_matches_estimate() {
    let dir = tempfile::tempdir().unwrap();
    let source = make_source(dir.path(), "source.mp4", 2.2).await;
    let clip = ClipRef::new("clip-1", &source, 2.2)
        .with_text(TextLayer::English, r#"He said: "don't stop""#)
        .with_text(TextLayer::Korean, "멈추지 마");

    let output = dir.path().join("out.mp4");
    let spec = compile(&clip, &shadowing_template(), &output).unwrap();
    assert!((spec.estimated_duration_secs - 7.6).abs() < 1e-9);

    let executor = ProcessExecutor::new(config());
    let result = executor
        .execute(&spec, &CancellationToken::new(), |_| {})
        .await
        .unwrap();

    let dims = probe_dimensions(&ffprobe(), &output).await.unwrap();
    assert_eq!((dims.width, dims.height), (1080, 1920));

    let actual = result.probed_duration_secs.unwrap();
    assert!(
        (actual - 7.6).abs() / 7.6 <= 0.05,
        "probed {actual}s, expected about 7.6s"
    );
}

#[tokio::test]
#[ignore = "requires ffmpeg and ffprobe"]
async fn test_blur_background_keeps_template_resolution() {
    let dir = tempfile::tempdir().unwrap();
    let source = make_source(dir.path(), "source.mp4", 1.0).await;
    let clip = ClipRef::new("clip-1", &source, 1.0);

    let mut template = shadowing_template();
    template.aspect_ratio = AspectRatio::Widescreen;
    template.background = BackgroundFill::Blur { strength: 10 };
    template.pattern = RepeatPattern::Fixed {
        count: 1,
        layers: LayerVisibility::none(),
        pause_secs: 0.0,
    };

    let output = dir.path().join("blur.mp4");
    let spec = compile(&clip, &template, &output).unwrap();
    ProcessExecutor::new(config())
        .execute(&spec, &CancellationToken::new(), |_| {})
        .await
        .unwrap();

    let dims = probe_dimensions(&ffprobe(), &output).await.unwrap();
    assert_eq!((dims.width, dims.height), (1920, 1080));
}

#[tokio::test]
#[ignore = "requires ffmpeg and ffprobe"]
async fn test_batch_duration_is_sum_of_segments() {
    let dir = tempfile::tempdir().unwrap();
    let a = make_source(dir.path(), "a.mp4", 1.5).await;
    let b = make_source(dir.path(), "b.mp4", 2.0).await;
    let clips = vec![
        ClipRef::new("a", &a, 1.5).with_text(TextLayer::English, "First"),
        ClipRef::new("b", &b, 2.0).with_text(TextLayer::English, "Second"),
    ];
    let mut template = shadowing_template();
    template.pattern = RepeatPattern::Fixed {
        count: 2,
        layers: LayerVisibility::only(&[TextLayer::English]),
        pause_secs: 0.5,
    };

    let output = dir.path().join("lesson.mp4");
    let temp_dir = dir.path().join("tmp").join("batch-e2e");
    let plan = BatchPlan::compile(&clips, &template, temp_dir.clone(), output.clone(), 10).unwrap();

    let orchestrator = BatchOrchestrator::new(Arc::new(ProcessExecutor::new(config())));
    orchestrator
        .run(&plan, &CancellationToken::new(), |_| {})
        .await
        .unwrap();

    // (2×1.5 + 0.5) + (2×2.0 + 0.5)
    let expected = 8.0;
    let actual = probe_duration(&ffprobe(), &output).await.unwrap();
    assert!(
        (actual - expected).abs() / expected <= 0.05,
        "probed {actual}s, expected about {expected}s"
    );
    assert!(!temp_dir.exists());
}
