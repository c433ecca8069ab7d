//! Filter graph compiler.
//!
//! Turns a clip plus a template into a complete transcoder invocation. The
//! compiler is pure: it never touches the filesystem or spawns anything, so
//! every rejection happens before a process exists.

use std::path::{Path, PathBuf};

use shadowcast_common::error::{ShadowcastError, ShadowcastResult};
use shadowcast_render_model::{
    round_millis, BackgroundFill, ClipRef, OutputFormat, QualityTier, RenderTemplate, RepeatSlot,
    Resolution, SubtitleAnchor, TextLayer, MAX_REPEATS,
};

use crate::filter::{Chain, DrawText, Filter, FilterGraph, ScaleFit};

/// Output frame rate.
pub const OUTPUT_FPS: u32 = 30;
/// Output pixel format.
pub const OUTPUT_PIX_FMT: &str = "yuv420p";
/// Output audio sample rate.
pub const OUTPUT_SAMPLE_RATE: u32 = 48_000;
/// Output audio channel count.
pub const OUTPUT_CHANNELS: u32 = 2;

/// Arguments every invocation starts with. `-stats` keeps `time=` markers
/// on stderr while `-loglevel error` limits the rest to real errors.
const COMMON_ARGS: [&str; 6] = [
    "-hide_banner",
    "-nostdin",
    "-loglevel",
    "error",
    "-stats",
    "-y",
];

/// Codec and container parameters of an encoded file.
///
/// Two files can be stream-copied into one container only when their
/// profiles are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EncodeProfile {
    pub format: OutputFormat,
    pub quality: QualityTier,
    pub resolution: Resolution,
    pub fps: u32,
    pub sample_rate: u32,
    pub channels: u32,
}

impl EncodeProfile {
    pub fn for_template(template: &RenderTemplate) -> Self {
        Self {
            format: template.format,
            quality: template.quality,
            resolution: template.resolution(),
            fps: OUTPUT_FPS,
            sample_rate: OUTPUT_SAMPLE_RATE,
            channels: OUTPUT_CHANNELS,
        }
    }

    /// Encoder arguments for this profile.
    pub fn encode_args(&self) -> Vec<String> {
        let crf = self.quality.crf().to_string();
        let mut args: Vec<String> = match self.format {
            OutputFormat::Mp4 => vec![
                "-c:v".into(),
                "libx264".into(),
                "-preset".into(),
                self.quality.preset().into(),
                "-crf".into(),
                crf,
            ],
            OutputFormat::Webm => vec![
                "-c:v".into(),
                "libvpx-vp9".into(),
                "-crf".into(),
                crf,
                "-b:v".into(),
                "0".into(),
                "-cpu-used".into(),
                self.quality.vp9_cpu_used().to_string(),
                "-row-mt".into(),
                "1".into(),
            ],
        };

        args.extend([
            "-pix_fmt".into(),
            OUTPUT_PIX_FMT.into(),
            "-r".into(),
            self.fps.to_string(),
            "-c:a".into(),
            self.format.audio_codec().into(),
            "-b:a".into(),
            "192k".into(),
            "-ar".into(),
            self.sample_rate.to_string(),
            "-ac".into(),
            self.channels.to_string(),
        ]);
        if self.format == OutputFormat::Mp4 {
            args.extend(["-movflags".into(), "+faststart".into()]);
        }
        args
    }
}

/// A ready-to-run transcoder invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandSpec {
    /// Arguments after the program name. The output path is last.
    pub args: Vec<String>,
    /// The `-filter_complex` value, if any (kept for diagnostics).
    pub filter_graph: Option<String>,
    pub output_path: PathBuf,
    /// Predicted output duration, used to normalize progress.
    pub estimated_duration_secs: f64,
    pub encode: EncodeProfile,
}

impl CommandSpec {
    /// Render as a copy-pasteable shell command line.
    pub fn command_line(&self, program: &Path) -> String {
        std::iter::once(program.display().to_string())
            .chain(self.args.iter().cloned())
            .map(|arg| shell_quote(&arg))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn shell_quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=+,".contains(c));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', "'\\''"))
    }
}

/// Compile one clip rendered with `template` into a command writing to
/// `output_path`.
pub fn compile(
    clip: &ClipRef,
    template: &RenderTemplate,
    output_path: &Path,
) -> ShadowcastResult<CommandSpec> {
    validate_clip(clip)?;
    validate_style(template)?;
    let repeats = template.pattern.repeat_count();
    if repeats > MAX_REPEATS {
        return Err(ShadowcastError::compile(format!(
            "repeat pattern has {repeats} repeats, the limit is {MAX_REPEATS}"
        )));
    }

    let slots = template.pattern.slots();
    validate_slots(&slots, clip)?;
    let clip = &millisecond_clip(clip)?;
    let slots: Vec<RepeatSlot> = slots
        .into_iter()
        .map(|slot| RepeatSlot {
            pause_secs: round_millis(slot.pause_secs),
            ..slot
        })
        .collect();

    let res = template.resolution();
    let encode = EncodeProfile::for_template(template);
    let graph = build_graph(clip, template, &slots, res);
    let filter_graph = graph.render();

    let mut args: Vec<String> = COMMON_ARGS.iter().map(|s| s.to_string()).collect();
    if clip.start_secs > 0.0 {
        args.extend(["-ss".into(), format!("{:.3}", clip.start_secs)]);
    }
    args.extend([
        "-t".into(),
        format!("{:.3}", clip.duration_secs),
        "-i".into(),
        clip.media_path.display().to_string(),
        "-filter_complex".into(),
        filter_graph.clone(),
        "-map".into(),
        "[vout]".into(),
        "-map".into(),
        "[aout]".into(),
    ]);
    args.extend(encode.encode_args());
    args.push(output_path.display().to_string());

    Ok(CommandSpec {
        args,
        filter_graph: Some(filter_graph),
        output_path: output_path.to_path_buf(),
        estimated_duration_secs: template.estimated_duration(clip.duration_secs),
        encode,
    })
}

/// Compile a stream-copy merge of already-encoded segments listed in
/// `manifest_path` (see [`concat_manifest`]).
pub fn compile_concat(
    manifest_path: &Path,
    output_path: &Path,
    encode: EncodeProfile,
    estimated_duration_secs: f64,
) -> CommandSpec {
    let mut args: Vec<String> = COMMON_ARGS.iter().map(|s| s.to_string()).collect();
    args.extend([
        "-f".into(),
        "concat".into(),
        "-safe".into(),
        "0".into(),
        "-i".into(),
        manifest_path.display().to_string(),
        "-c".into(),
        "copy".into(),
    ]);
    if encode.format == OutputFormat::Mp4 {
        args.extend(["-movflags".into(), "+faststart".into()]);
    }
    args.push(output_path.display().to_string());

    CommandSpec {
        args,
        filter_graph: None,
        output_path: output_path.to_path_buf(),
        estimated_duration_secs,
        encode,
    }
}

/// Concat demuxer manifest listing `segments` in order.
pub fn concat_manifest(segments: &[PathBuf]) -> String {
    let mut manifest = String::from("ffconcat version 1.0\n");
    for segment in segments {
        let path = segment.display().to_string().replace('\'', "'\\''");
        manifest.push_str(&format!("file '{path}'\n"));
    }
    manifest
}

fn validate_clip(clip: &ClipRef) -> ShadowcastResult<()> {
    if !clip.duration_secs.is_finite() || clip.duration_secs <= 0.0 {
        return Err(ShadowcastError::compile(format!(
            "clip {} has invalid duration {}",
            clip.id, clip.duration_secs
        )));
    }
    if !clip.start_secs.is_finite() || clip.start_secs < 0.0 {
        return Err(ShadowcastError::compile(format!(
            "clip {} has invalid start offset {}",
            clip.id, clip.start_secs
        )));
    }
    if clip.media_path.as_os_str().is_empty() {
        return Err(ShadowcastError::compile(format!(
            "clip {} has no media path",
            clip.id
        )));
    }
    Ok(())
}

/// `clip` with its timing at the precision written into the graph.
fn millisecond_clip(clip: &ClipRef) -> ShadowcastResult<ClipRef> {
    let duration_secs = round_millis(clip.duration_secs);
    if duration_secs <= 0.0 {
        return Err(ShadowcastError::compile(format!(
            "clip {} is shorter than one millisecond ({}s)",
            clip.id, clip.duration_secs
        )));
    }
    let mut rounded = clip.clone();
    rounded.duration_secs = duration_secs;
    rounded.start_secs = round_millis(clip.start_secs);
    Ok(rounded)
}

fn validate_style(template: &RenderTemplate) -> ShadowcastResult<()> {
    if template.font.size == 0 {
        return Err(ShadowcastError::compile("font size must be positive"));
    }
    validate_color("font.color", &template.font.color)?;
    validate_color("font.stroke_color", &template.font.stroke_color)?;
    match &template.background {
        BackgroundFill::Solid { color } => validate_color("background.color", color)?,
        BackgroundFill::Blur { .. } => {}
        BackgroundFill::Gradient { from, to } => {
            validate_color("background.from", from)?;
            validate_color("background.to", to)?;
        }
    }
    Ok(())
}

fn validate_slots(slots: &[RepeatSlot], clip: &ClipRef) -> ShadowcastResult<()> {
    if slots.is_empty() {
        return Err(ShadowcastError::compile(
            "repeat pattern must contain at least one repeat",
        ));
    }
    for (i, slot) in slots.iter().enumerate() {
        if !slot.pause_secs.is_finite() || slot.pause_secs < 0.0 {
            return Err(ShadowcastError::compile(format!(
                "repeat {} has invalid pause {}",
                i + 1,
                slot.pause_secs
            )));
        }
        for layer in slot.layers.enabled() {
            if clip.text(layer).is_none() {
                return Err(ShadowcastError::compile(format!(
                    "repeat {} shows the {layer} layer but clip {} has no {layer} text",
                    i + 1,
                    clip.id
                )));
            }
        }
    }
    Ok(())
}

/// Accepts `#RRGGBB`, `#RRGGBBAA`, `0xRRGGBB[AA]` and lowercase color names.
fn validate_color(field: &str, color: &str) -> ShadowcastResult<()> {
    let hex = color
        .strip_prefix('#')
        .or_else(|| color.strip_prefix("0x"));
    let valid = match hex {
        Some(digits) => {
            matches!(digits.len(), 6 | 8) && digits.chars().all(|c| c.is_ascii_hexdigit())
        }
        None => !color.is_empty() && color.chars().all(|c| c.is_ascii_lowercase()),
    };
    if valid {
        Ok(())
    } else {
        Err(ShadowcastError::compile(format!(
            "{field} has invalid color {color:?}"
        )))
    }
}

/// Top edge of each stacked line, outward from the anchor.
fn line_positions(template: &RenderTemplate, height: u32, lines: usize) -> Vec<i64> {
    let size = i64::from(template.font.size);
    let spacing = i64::from(template.layout.line_spacing);
    let margin = i64::from(template.layout.margin);
    let line_height = size + spacing;
    let h = i64::from(height);

    (0..lines as i64)
        .map(|k| match template.layout.anchor {
            SubtitleAnchor::Bottom => h - margin - size - k * line_height,
            SubtitleAnchor::Top => margin + k * line_height,
            SubtitleAnchor::Middle => {
                let block = lines as i64 * size + (lines as i64 - 1) * spacing;
                (h - block) / 2 + k * line_height
            }
        })
        .map(|y| y.max(0))
        .collect()
}

fn build_graph(
    clip: &ClipRef,
    template: &RenderTemplate,
    slots: &[RepeatSlot],
    res: Resolution,
) -> FilterGraph {
    let mut graph = FilterGraph::new();
    let repeats = slots.len();
    let (w, h) = (res.width, res.height);

    // Fit to the exact output size once, then fan out per repeat.
    let finish = |chain: Chain| {
        chain
            .filter(Filter::SetSar)
            .filter(Filter::Fps { rate: OUTPUT_FPS })
            .filter(Filter::Format {
                pix_fmt: OUTPUT_PIX_FMT.to_string(),
            })
            .output("base")
    };
    let fit = Filter::Scale {
        width: w,
        height: h,
        fit: ScaleFit::Contain,
    };
    match &template.background {
        BackgroundFill::Solid { color } => {
            graph.push(finish(Chain::from("0:v").filter(fit).filter(Filter::Pad {
                width: w,
                height: h,
                color: color.clone(),
            })));
        }
        BackgroundFill::Blur { strength } => {
            graph.push(
                Chain::from("0:v")
                    .filter(Filter::Split { outputs: 2 })
                    .outputs(["fg", "bg"]),
            );
            graph.push(
                Chain::from("bg")
                    .filter(Filter::Scale {
                        width: w,
                        height: h,
                        fit: ScaleFit::Cover,
                    })
                    .filter(Filter::Crop {
                        width: w,
                        height: h,
                    })
                    .filter(Filter::BoxBlur {
                        radius: (*strength).max(1),
                    })
                    .output("bgblur"),
            );
            graph.push(Chain::from("fg").filter(fit).output("fgfit"));
            graph.push(finish(
                Chain::new()
                    .inputs(["bgblur", "fgfit"])
                    .filter(Filter::Overlay { shortest: false }),
            ));
        }
        BackgroundFill::Gradient { from, to } => {
            graph.push(
                Chain::new()
                    .filter(Filter::Gradients {
                        from: from.clone(),
                        to: to.clone(),
                        width: w,
                        height: h,
                        rate: OUTPUT_FPS,
                        duration_secs: clip.duration_secs,
                    })
                    .output("grad"),
            );
            graph.push(Chain::from("0:v").filter(fit).output("fgfit"));
            graph.push(finish(
                Chain::new()
                    .inputs(["grad", "fgfit"])
                    .filter(Filter::Overlay { shortest: true }),
            ));
        }
    }

    let video_copies: Vec<String> = (0..repeats).map(|i| format!("v{i}")).collect();
    graph.push(
        Chain::from("base")
            .filter(Filter::Split { outputs: repeats })
            .outputs(video_copies.iter().cloned()),
    );

    let audio_copies: Vec<String> = (0..repeats).map(|i| format!("a{i}")).collect();
    if clip.has_audio {
        graph.push(
            Chain::from("0:a")
                .filter(Filter::AResample {
                    sample_rate: OUTPUT_SAMPLE_RATE,
                })
                .filter(Filter::AFormat {
                    sample_rate: OUTPUT_SAMPLE_RATE,
                })
                .filter(Filter::ASplit { outputs: repeats })
                .outputs(audio_copies.iter().cloned()),
        );
    } else {
        for label in &audio_copies {
            graph.push(silence(clip.duration_secs).output(label.clone()));
        }
    }

    // One (video, audio) pair per segment keeps the concat inputs aligned.
    let mut segments: Vec<(String, String)> = Vec::with_capacity(repeats * 2);
    for (i, slot) in slots.iter().enumerate() {
        let layers = slot.layers.enabled();
        let video = if layers.is_empty() {
            video_copies[i].clone()
        } else {
            let label = format!("t{i}");
            let positions = line_positions(template, h, layers.len());
            let mut chain = Chain::from(video_copies[i].clone());
            for (layer, y) in layers.iter().zip(positions) {
                chain = chain.filter(text_filter(clip, template, *layer, y));
            }
            graph.push(chain.output(label.clone()));
            label
        };
        segments.push((video, audio_copies[i].clone()));

        let is_last = i + 1 == repeats;
        if !is_last && slot.pause_secs > 0.0 {
            let (pv, pa) = (format!("pv{i}"), format!("pa{i}"));
            graph.push(
                Chain::new()
                    .filter(Filter::Color {
                        color: "black".to_string(),
                        width: w,
                        height: h,
                        rate: OUTPUT_FPS,
                        duration_secs: slot.pause_secs,
                    })
                    .filter(Filter::SetSar)
                    .filter(Filter::Format {
                        pix_fmt: OUTPUT_PIX_FMT.to_string(),
                    })
                    .output(pv.clone()),
            );
            graph.push(silence(slot.pause_secs).output(pa.clone()));
            segments.push((pv, pa));
        }
    }

    let segment_count = segments.len();
    graph.push(
        Chain::new()
            .inputs(segments.into_iter().flat_map(|(v, a)| [v, a]))
            .filter(Filter::Concat {
                segments: segment_count,
            })
            .outputs(["vout", "aout"]),
    );
    graph
}

fn silence(duration_secs: f64) -> Chain {
    Chain::new()
        .filter(Filter::ANullSrc {
            sample_rate: OUTPUT_SAMPLE_RATE,
        })
        .filter(Filter::ATrim { duration_secs })
        .filter(Filter::AFormat {
            sample_rate: OUTPUT_SAMPLE_RATE,
        })
}

fn text_filter(clip: &ClipRef, template: &RenderTemplate, layer: TextLayer, y: i64) -> Filter {
    let font = &template.font;
    Filter::draw_text(DrawText {
        text: clip.text(layer).unwrap_or_default().to_string(),
        font: (!font.family.is_empty()).then(|| font.family.clone()),
        font_file: font.file.as_ref().map(|p| p.display().to_string()),
        font_size: font.size,
        font_color: font.color.clone(),
        border_color: font.stroke_color.clone(),
        border_width: font.stroke_width,
        y,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use shadowcast_render_model::{AspectRatio, LayerVisibility, RepeatPattern};

    fn clip() -> ClipRef {
        ClipRef::new("clip-1", "/media/episode-01.mkv", 2.2)
            .with_text(TextLayer::English, "Are you okay?")
            .with_text(TextLayer::Korean, "괜찮아?")
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

    fn concat_segments(spec: &CommandSpec) -> usize {
        let graph = spec.filter_graph.as_deref().unwrap();
        let start = graph.find("concat=n=").unwrap() + "concat=n=".len();
        let end = start + graph[start..].find(':').unwrap();
        graph[start..end].parse().unwrap()
    }

    #[test]
    fn test_example_estimate_and_layout() {
        let spec = compile(&clip(), &shadowing_template(), Path::new("/out/job.mp4")).unwrap();
        assert!((spec.estimated_duration_secs - 7.6).abs() < 1e-9);
        assert_eq!(spec.encode.resolution.to_string(), "1080x1920");
        assert_eq!(spec.args.last().map(String::as_str), Some("/out/job.mp4"));

        // 3 repeats + 2 pauses.
        assert_eq!(concat_segments(&spec), 5);
        let graph = spec.filter_graph.unwrap();
        assert!(graph.contains("[base]split=3[v0][v1][v2]"));
        assert!(graph.contains("[0:a]aresample=48000"));
        assert!(graph.contains("asplit=3[a0][a1][a2]"));
        assert!(graph.contains("[t0][a0][pv0][pa0][t1][a1][pv1][pa1][v2][a2]concat=n=5"));
    }

    #[test]
    fn test_output_always_padded_to_template_resolution() {
        let mut template = shadowing_template();
        template.aspect_ratio = AspectRatio::Widescreen;
        let spec = compile(&clip(), &template, Path::new("/out/a.mp4")).unwrap();
        let graph = spec.filter_graph.unwrap();
        assert!(graph.contains("scale=1920:1080:force_original_aspect_ratio=decrease"));
        assert!(graph.contains("pad=1920:1080:(ow-iw)/2:(oh-ih)/2:color=black"));
    }

    #[test]
    fn test_blur_background() {
        let mut template = shadowing_template();
        template.background = BackgroundFill::Blur { strength: 20 };
        let graph = compile(&clip(), &template, Path::new("/o.mp4"))
            .unwrap()
            .filter_graph
            .unwrap();
        assert!(graph.contains("[0:v]split=2[fg][bg]"));
        assert!(graph.contains("force_original_aspect_ratio=increase:flags=lanczos,crop=1080:1920,boxblur=20:1[bgblur]"));
        assert!(graph.contains("[bgblur][fgfit]overlay=(W-w)/2:(H-h)/2,setsar=1"));
    }

    #[test]
    fn test_gradient_background() {
        let mut template = shadowing_template();
        template.background = BackgroundFill::Gradient {
            from: "#101020".to_string(),
            to: "#402060".to_string(),
        };
        let graph = compile(&clip(), &template, Path::new("/o.mp4"))
            .unwrap()
            .filter_graph
            .unwrap();
        assert!(graph.starts_with("gradients=s=1080x1920:c0=#101020:c1=#402060"));
        assert!(graph.contains("[grad][fgfit]overlay=(W-w)/2:(H-h)/2:shortest=1"));
    }

    #[test]
    fn test_missing_enabled_layer_text_is_rejected() {
        let mut template = shadowing_template();
        template.pattern = RepeatPattern::Fixed {
            count: 2,
            layers: LayerVisibility::only(&[TextLayer::Explanation]),
            pause_secs: 0.0,
        };
        let err = compile(&clip(), &template, Path::new("/o.mp4")).unwrap_err();
        assert!(matches!(err, ShadowcastError::Compile { .. }));
        assert!(err.to_string().contains("explanation"));
    }

    #[test]
    fn test_zero_repeats_is_rejected() {
        let mut template = shadowing_template();
        template.pattern = RepeatPattern::Fixed {
            count: 0,
            layers: LayerVisibility::none(),
            pause_secs: 0.0,
        };
        assert!(matches!(
            compile(&clip(), &template, Path::new("/o.mp4")),
            Err(ShadowcastError::Compile { .. })
        ));
    }

    #[test]
    fn test_repeat_limit_is_checked_before_expansion() {
        let mut template = shadowing_template();
        template.pattern = RepeatPattern::Fixed {
            count: u32::MAX,
            layers: LayerVisibility::none(),
            pause_secs: 0.0,
        };
        let err = compile(&clip(), &template, Path::new("/o.mp4")).unwrap_err();
        assert!(matches!(err, ShadowcastError::Compile { .. }));
        assert!(err.to_string().contains("limit"), "{err}");

        template.pattern = RepeatPattern::Fixed {
            count: MAX_REPEATS as u32 + 1,
            layers: LayerVisibility::none(),
            pause_secs: 0.0,
        };
        assert!(compile(&clip(), &template, Path::new("/o.mp4")).is_err());

        template.pattern = RepeatPattern::Fixed {
            count: MAX_REPEATS as u32,
            layers: LayerVisibility::none(),
            pause_secs: 0.0,
        };
        let spec = compile(&clip(), &template, Path::new("/o.mp4")).unwrap();
        assert_eq!(concat_segments(&spec), MAX_REPEATS);
    }

    #[test]
    fn test_sub_millisecond_pause_adds_no_segment() {
        let mut template = shadowing_template();
        template.pattern = RepeatPattern::Fixed {
            count: 2,
            layers: LayerVisibility::none(),
            pause_secs: 0.0004,
        };
        let spec = compile(&clip(), &template, Path::new("/o.mp4")).unwrap();
        let graph = spec.filter_graph.as_deref().unwrap();
        assert!(!graph.contains("=0.000"), "{graph}");
        assert!(!graph.contains("anullsrc"));
        assert_eq!(concat_segments(&spec), 2);
        assert!((spec.estimated_duration_secs - 4.4).abs() < 1e-9);

        template.pattern = RepeatPattern::Fixed {
            count: 2,
            layers: LayerVisibility::none(),
            pause_secs: 0.0006,
        };
        let spec = compile(&clip(), &template, Path::new("/o.mp4")).unwrap();
        let graph = spec.filter_graph.as_deref().unwrap();
        assert!(graph.contains("atrim=duration=0.001"));
        assert_eq!(concat_segments(&spec), 3);
        assert!((spec.estimated_duration_secs - 4.401).abs() < 1e-9);
    }

    #[test]
    fn test_sub_millisecond_clip_is_rejected() {
        let mut tiny = clip();
        tiny.duration_secs = 0.0004;
        tiny.has_audio = false;
        let err = compile(&tiny, &shadowing_template(), Path::new("/o.mp4")).unwrap_err();
        assert!(matches!(err, ShadowcastError::Compile { .. }));
    }

    #[test]
    fn test_invalid_inputs_are_rejected() {
        let mut bad_duration = clip();
        bad_duration.duration_secs = f64::NAN;
        assert!(compile(&bad_duration, &shadowing_template(), Path::new("/o.mp4")).is_err());

        let mut bad_pause = shadowing_template();
        bad_pause.pattern = RepeatPattern::Fixed {
            count: 2,
            layers: LayerVisibility::none(),
            pause_secs: -1.0,
        };
        assert!(compile(&clip(), &bad_pause, Path::new("/o.mp4")).is_err());

        let mut bad_color = shadowing_template();
        bad_color.font.color = "Not A Color".to_string();
        assert!(compile(&clip(), &bad_color, Path::new("/o.mp4")).is_err());

        let mut no_size = shadowing_template();
        no_size.font.size = 0;
        assert!(compile(&clip(), &no_size, Path::new("/o.mp4")).is_err());
    }

    #[test]
    fn test_silent_source_gets_synthesized_audio() {
        let mut silent = clip();
        silent.has_audio = false;
        let graph = compile(&silent, &shadowing_template(), Path::new("/o.mp4"))
            .unwrap()
            .filter_graph
            .unwrap();
        assert!(!graph.contains("[0:a]"));
        assert!(graph.contains("anullsrc=r=48000:cl=stereo,atrim=duration=2.200"));
    }

    #[test]
    fn test_bottom_anchor_stacks_upward() {
        let mut template = shadowing_template();
        template.font.size = 50;
        template.layout.margin = 100;
        template.layout.line_spacing = 10;
        let ys = line_positions(&template, 1920, 3);
        assert_eq!(ys, vec![1770, 1710, 1650]);

        template.layout.anchor = SubtitleAnchor::Top;
        assert_eq!(line_positions(&template, 1920, 2), vec![100, 160]);

        template.layout.anchor = SubtitleAnchor::Middle;
        assert_eq!(line_positions(&template, 1920, 2), vec![905, 965]);
    }

    #[test]
    fn test_special_characters_stay_inside_drawtext() {
        let tricky = ClipRef::new("c", "/m.mp4", 1.0)
            .with_text(TextLayer::English, r#"He said: "don't stop"; [ok], \done"#);
        let mut template = shadowing_template();
        template.pattern = RepeatPattern::Fixed {
            count: 1,
            layers: LayerVisibility::only(&[TextLayer::English]),
            pause_secs: 0.0,
        };
        let graph = compile(&tricky, &template, Path::new("/o.mp4"))
            .unwrap()
            .filter_graph
            .unwrap();
        let chains = build_graph(&tricky, &template, &template.pattern.slots(), template.resolution())
            .chains()
            .len();
        let mut separators = 0;
        let mut escaped = false;
        for c in graph.chars() {
            match (escaped, c) {
                (false, '\\') => escaped = true,
                (false, ';') => separators += 1,
                _ => escaped = false,
            }
        }
        assert_eq!(separators, chains - 1);
        assert!(graph.contains("expansion=none"));
        assert!(graph.contains(r#"text=\'He said: "don\'\\\'\'t stop"\; \[ok\]\, \\done\'"#));
    }

    #[test]
    fn test_webm_profile() {
        let mut template = shadowing_template();
        template.format = OutputFormat::Webm;
        template.quality = QualityTier::Low;
        let spec = compile(&clip(), &template, Path::new("/o.webm")).unwrap();
        let args = spec.args.join(" ");
        assert!(args.contains("-c:v libvpx-vp9 -crf 28 -b:v 0 -cpu-used 4"));
        assert!(args.contains("-c:a libopus"));
        assert!(!args.contains("faststart"));
    }

    #[test]
    fn test_concat_manifest_quotes_paths() {
        let manifest = concat_manifest(&[
            PathBuf::from("/tmp/batch-1/segment-000.mp4"),
            PathBuf::from("/tmp/it's/segment-001.mp4"),
        ]);
        assert_eq!(
            manifest,
            "ffconcat version 1.0\nfile '/tmp/batch-1/segment-000.mp4'\nfile '/tmp/it'\\''s/segment-001.mp4'\n"
        );
    }

    #[test]
    fn test_concat_command_stream_copies() {
        let profile = EncodeProfile::for_template(&shadowing_template());
        let spec = compile_concat(Path::new("/tmp/b/concat.txt"), Path::new("/out/x.mp4"), profile, 15.2);
        let args = spec.args.join(" ");
        assert!(args.contains("-f concat -safe 0 -i /tmp/b/concat.txt -c copy -movflags +faststart /out/x.mp4"));
    }

    #[test]
    fn test_command_line_quotes_graph() {
        let spec = compile(&clip(), &shadowing_template(), Path::new("/out/job.mp4")).unwrap();
        let line = spec.command_line(Path::new("ffmpeg"));
        assert!(line.starts_with("ffmpeg -hide_banner -nostdin"));
        assert!(line.contains("-filter_complex '"));
    }

    proptest! {
        #[test]
        fn prop_video_and_audio_segments_match(
            count in 1u32..8,
            pause in 0.0f64..2.0,
            duration in 0.1f64..30.0,
            vertical in any::<bool>(),
        ) {
            let mut template = shadowing_template();
            template.aspect_ratio = if vertical { AspectRatio::Vertical } else { AspectRatio::Widescreen };
            template.pattern = RepeatPattern::Fixed { count, layers: LayerVisibility::none(), pause_secs: pause };
            let mut c = clip();
            c.duration_secs = duration;

            let spec = compile(&c, &template, Path::new("/o.mp4")).unwrap();
            let (duration, pause) = (round_millis(duration), round_millis(pause));
            let pauses = if pause > 0.0 { count - 1 } else { 0 };
            prop_assert_eq!(concat_segments(&spec), (count + pauses) as usize);
            prop_assert_eq!(spec.encode.resolution, template.resolution());

            let expected = count as f64 * duration + (count - 1) as f64 * pause;
            prop_assert!((spec.estimated_duration_secs - expected).abs() < 1e-6);
        }
    }
}
