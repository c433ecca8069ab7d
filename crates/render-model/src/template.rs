//! Render templates.
//!
//! A template is one rendering intent: output shape, encode quality, the
//! shadow-practice repeat pattern, which subtitle layers show on each repeat,
//! and how the subtitles and letterbox padding look.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::clip::TextLayer;
use crate::error::{read_json, write_json, ModelError};

/// Most repeats one pattern may expand to.
pub const MAX_REPEATS: usize = 100;

/// Round to the millisecond precision durations are rendered with.
pub fn round_millis(secs: f64) -> f64 {
    (secs * 1000.0).round() / 1000.0
}

/// A rendering intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderTemplate {
    /// Template identifier, recorded on every job rendered with it.
    pub id: String,

    /// Human-readable name.
    #[serde(default)]
    pub name: String,

    /// Output aspect ratio. Dimensions derive from this.
    pub aspect_ratio: AspectRatio,

    /// Encoder quality tier.
    #[serde(default)]
    pub quality: QualityTier,

    /// Output container and codecs.
    #[serde(default)]
    pub format: OutputFormat,

    /// How many times the clip plays and what shows on each repeat.
    pub pattern: RepeatPattern,

    /// Subtitle font settings.
    #[serde(default)]
    pub font: FontSettings,

    /// Subtitle block placement.
    #[serde(default)]
    pub layout: SubtitleLayout,

    /// Fill used around the fitted image.
    #[serde(default)]
    pub background: BackgroundFill,
}

impl RenderTemplate {
    /// Create a template with default styling.
    pub fn new(id: impl Into<String>, aspect_ratio: AspectRatio, pattern: RepeatPattern) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            aspect_ratio,
            quality: QualityTier::default(),
            format: OutputFormat::default(),
            pattern,
            font: FontSettings::default(),
            layout: SubtitleLayout::default(),
            background: BackgroundFill::default(),
        }
    }

    /// Output resolution. Always derived from the aspect ratio.
    pub fn resolution(&self) -> Resolution {
        self.aspect_ratio.resolution()
    }

    /// Estimated output duration for a clip of `clip_secs`.
    ///
    /// Every repeat plays the full clip; every repeat except the last is
    /// followed by its pause. Durations count at millisecond precision.
    pub fn estimated_duration(&self, clip_secs: f64) -> f64 {
        let repeats = self.pattern.repeat_count();
        let pauses: f64 = match &self.pattern {
            RepeatPattern::Fixed { pause_secs, .. } => {
                repeats.saturating_sub(1) as f64 * round_millis(*pause_secs)
            }
            RepeatPattern::Custom { repeats: slots } => slots
                .iter()
                .take(repeats.saturating_sub(1))
                .map(|s| round_millis(s.pause_secs))
                .sum(),
        };
        repeats as f64 * round_millis(clip_secs) + pauses
    }

    /// Load a template from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let template: Self = read_json(path)?;
        if template.id.trim().is_empty() {
            return Err(ModelError::ValidationError {
                message: format!("template in {} has an empty id", path.display()),
            });
        }
        Ok(template)
    }

    /// Save the template to a JSON file.
    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        write_json(path, self)
    }
}

/// Output aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AspectRatio {
    /// 16:9 landscape.
    Widescreen,
    /// 9:16 portrait (shorts/reels).
    Vertical,
}

impl AspectRatio {
    pub fn resolution(self) -> Resolution {
        match self {
            Self::Widescreen => Resolution {
                width: 1920,
                height: 1080,
            },
            Self::Vertical => Resolution {
                width: 1080,
                height: 1920,
            },
        }
    }
}

/// Output dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Encoder quality tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    High,
    #[default]
    Medium,
    Low,
}

impl QualityTier {
    /// x264 preset name.
    pub fn preset(self) -> &'static str {
        match self {
            Self::High => "slow",
            Self::Medium => "medium",
            Self::Low => "veryfast",
        }
    }

    /// Constant rate factor.
    pub fn crf(self) -> u8 {
        match self {
            Self::High => 18,
            Self::Medium => 23,
            Self::Low => 28,
        }
    }

    /// libvpx `-cpu-used` speed.
    pub fn vp9_cpu_used(self) -> u8 {
        match self {
            Self::High => 1,
            Self::Medium => 2,
            Self::Low => 4,
        }
    }
}

/// Output container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// H.264 + AAC in MP4.
    #[default]
    Mp4,
    /// VP9 + Opus in WebM.
    Webm,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Webm => "webm",
        }
    }

    pub fn video_codec(self) -> &'static str {
        match self {
            Self::Mp4 => "libx264",
            Self::Webm => "libvpx-vp9",
        }
    }

    pub fn audio_codec(self) -> &'static str {
        match self {
            Self::Mp4 => "aac",
            Self::Webm => "libopus",
        }
    }
}

/// Which subtitle layers are visible.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerVisibility {
    pub english: bool,
    pub korean: bool,
    pub explanation: bool,
    pub pronunciation: bool,
}

impl LayerVisibility {
    /// No subtitles.
    pub fn none() -> Self {
        Self::default()
    }

    /// Exactly the given layers.
    pub fn only(layers: &[TextLayer]) -> Self {
        let mut visibility = Self::default();
        for layer in layers {
            visibility.set(*layer, true);
        }
        visibility
    }

    pub fn is_enabled(&self, layer: TextLayer) -> bool {
        match layer {
            TextLayer::English => self.english,
            TextLayer::Korean => self.korean,
            TextLayer::Explanation => self.explanation,
            TextLayer::Pronunciation => self.pronunciation,
        }
    }

    pub fn set(&mut self, layer: TextLayer, enabled: bool) {
        match layer {
            TextLayer::English => self.english = enabled,
            TextLayer::Korean => self.korean = enabled,
            TextLayer::Explanation => self.explanation = enabled,
            TextLayer::Pronunciation => self.pronunciation = enabled,
        }
    }

    /// Enabled layers in stacking order.
    pub fn enabled(&self) -> Vec<TextLayer> {
        TextLayer::ALL
            .into_iter()
            .filter(|layer| self.is_enabled(*layer))
            .collect()
    }
}

/// One play of the clip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RepeatSlot {
    /// Layers drawn during this repeat.
    #[serde(default)]
    pub layers: LayerVisibility,

    /// Silent black pause after this repeat. Ignored on the final repeat.
    #[serde(default)]
    pub pause_secs: f64,
}

/// Shadow-practice repeat structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RepeatPattern {
    /// `count` identical repeats.
    Fixed {
        count: u32,
        #[serde(default)]
        layers: LayerVisibility,
        #[serde(default)]
        pause_secs: f64,
    },
    /// One explicit slot per repeat.
    Custom { repeats: Vec<RepeatSlot> },
}

impl RepeatPattern {
    /// Expand into one slot per repeat, in play order.
    pub fn slots(&self) -> Vec<RepeatSlot> {
        match self {
            Self::Fixed {
                count,
                layers,
                pause_secs,
            } => (0..*count)
                .map(|_| RepeatSlot {
                    layers: *layers,
                    pause_secs: *pause_secs,
                })
                .collect(),
            Self::Custom { repeats } => repeats.clone(),
        }
    }

    pub fn repeat_count(&self) -> usize {
        match self {
            Self::Fixed { count, .. } => *count as usize,
            Self::Custom { repeats } => repeats.len(),
        }
    }
}

/// Subtitle font settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontSettings {
    /// Fontconfig family name.
    pub family: String,

    /// Explicit font file; takes precedence over `family`.
    pub file: Option<PathBuf>,

    /// Font size in pixels.
    pub size: u32,

    /// Fill color.
    pub color: String,

    /// Outline color.
    pub stroke_color: String,

    /// Outline width in pixels. 0 disables the outline.
    pub stroke_width: u32,
}

impl Default for FontSettings {
    fn default() -> Self {
        Self {
            family: "Noto Sans CJK KR".to_string(),
            file: None,
            size: 56,
            color: "white".to_string(),
            stroke_color: "black".to_string(),
            stroke_width: 3,
        }
    }
}

/// Vertical anchor of the subtitle block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleAnchor {
    Top,
    Middle,
    #[default]
    Bottom,
}

/// Subtitle block placement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubtitleLayout {
    pub anchor: SubtitleAnchor,

    /// Distance from the anchored frame edge, in pixels.
    pub margin: u32,

    /// Extra gap between stacked lines, in pixels.
    pub line_spacing: u32,
}

impl Default for SubtitleLayout {
    fn default() -> Self {
        Self {
            anchor: SubtitleAnchor::Bottom,
            margin: 120,
            line_spacing: 16,
        }
    }
}

/// Fill for the area around the fitted image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackgroundFill {
    /// Flat color padding.
    Solid { color: String },
    /// Blurred, cover-scaled copy of the clip itself.
    Blur { strength: u32 },
    /// Vertical two-color gradient.
    Gradient { from: String, to: String },
}

impl Default for BackgroundFill {
    fn default() -> Self {
        Self::Solid {
            color: "black".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shadowing_template() -> RenderTemplate {
        RenderTemplate::new(
            "shorts-3x",
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

    #[test]
    fn test_resolution_follows_aspect_ratio() {
        let mut template = shadowing_template();
        assert_eq!(template.resolution().to_string(), "1080x1920");

        template.aspect_ratio = AspectRatio::Widescreen;
        assert_eq!(template.resolution().to_string(), "1920x1080");
    }

    #[test]
    fn test_estimate_skips_trailing_pause() {
        let template = shadowing_template();
        let estimate = template.estimated_duration(2.2);
        assert!((estimate - 7.6).abs() < 1e-9);
    }

    #[test]
    fn test_estimate_counts_whole_milliseconds() {
        let mut template = shadowing_template();
        template.pattern = RepeatPattern::Fixed {
            count: 3,
            layers: LayerVisibility::none(),
            pause_secs: 0.0004,
        };
        assert!((template.estimated_duration(1.0) - 3.0).abs() < 1e-9);
        assert!((template.estimated_duration(1.0004) - 3.0).abs() < 1e-9);

        template.pattern = RepeatPattern::Fixed {
            count: 3,
            layers: LayerVisibility::none(),
            pause_secs: 0.25,
        };
        assert!((template.estimated_duration(1.0) - 3.5).abs() < 1e-9);
    }

    #[test]
    fn test_estimate_of_huge_pattern_does_not_expand_it() {
        let mut template = shadowing_template();
        template.pattern = RepeatPattern::Fixed {
            count: u32::MAX,
            layers: LayerVisibility::none(),
            pause_secs: 0.0,
        };
        assert_eq!(template.estimated_duration(1.0), u32::MAX as f64);
    }

    #[test]
    fn test_round_millis() {
        assert_eq!(round_millis(0.0004), 0.0);
        assert_eq!(round_millis(0.0005), 0.001);
        assert_eq!(round_millis(2.2), 2.2);
    }

    #[test]
    fn test_fixed_pattern_expands_to_slots() {
        let pattern = RepeatPattern::Fixed {
            count: 4,
            layers: LayerVisibility::only(&[TextLayer::English, TextLayer::Explanation]),
            pause_secs: 1.0,
        };
        let slots = pattern.slots();
        assert_eq!(slots.len(), 4);
        assert_eq!(pattern.repeat_count(), 4);
        assert_eq!(
            slots[2].layers.enabled(),
            vec![TextLayer::English, TextLayer::Explanation]
        );
    }

    #[test]
    fn test_enabled_layers_follow_stacking_order() {
        let layers = LayerVisibility::only(&[
            TextLayer::Explanation,
            TextLayer::English,
            TextLayer::Pronunciation,
        ]);
        assert_eq!(
            layers.enabled(),
            vec![
                TextLayer::English,
                TextLayer::Pronunciation,
                TextLayer::Explanation
            ]
        );
    }

    #[test]
    fn test_quality_mapping() {
        assert_eq!(QualityTier::High.preset(), "slow");
        assert_eq!(QualityTier::High.crf(), 18);
        assert_eq!(QualityTier::Low.preset(), "veryfast");
        assert_eq!(QualityTier::Low.vp9_cpu_used(), 4);
    }

    #[test]
    fn test_template_json_round_trip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("templates").join("shorts.json");

        let template = shadowing_template();
        template.save(&path).unwrap();
        let loaded = RenderTemplate::load(&path).unwrap();
        assert_eq!(loaded, template);
    }

    #[test]
    fn test_minimal_template_json() {
        let json = r#"{
            "id": "wide",
            "aspect_ratio": "widescreen",
            "pattern": { "kind": "fixed", "count": 2, "layers": { "english": true } },
            "background": { "kind": "blur", "strength": 20 }
        }"#;
        let template: RenderTemplate = serde_json::from_str(json).unwrap();
        assert_eq!(template.quality, QualityTier::Medium);
        assert_eq!(template.format, OutputFormat::Mp4);
        assert_eq!(template.layout.anchor, SubtitleAnchor::Bottom);
        assert_eq!(template.background, BackgroundFill::Blur { strength: 20 });
        assert_eq!(template.pattern.slots()[1].pause_secs, 0.0);
    }

    #[test]
    fn test_load_rejects_empty_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(
            &path,
            r#"{"id":" ","aspect_ratio":"vertical","pattern":{"kind":"custom","repeats":[]}}"#,
        )
        .unwrap();
        assert!(matches!(
            RenderTemplate::load(&path),
            Err(ModelError::ValidationError { .. })
        ));
    }
}
