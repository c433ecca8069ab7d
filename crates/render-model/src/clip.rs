//! Clip metadata supplied by the clip catalog.
//!
//! The render pipeline only reads clips; it never mutates catalog data.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{read_json, ModelError};

/// A subtitle layer that can be drawn over a clip.
///
/// Declaration order is the stacking order outward from the subtitle anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextLayer {
    English,
    Korean,
    Pronunciation,
    Explanation,
}

impl TextLayer {
    /// All layers in stacking order.
    pub const ALL: [TextLayer; 4] = [
        TextLayer::English,
        TextLayer::Korean,
        TextLayer::Pronunciation,
        TextLayer::Explanation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::English => "english",
            Self::Korean => "korean",
            Self::Pronunciation => "pronunciation",
            Self::Explanation => "explanation",
        }
    }
}

impl std::fmt::Display for TextLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-language text tracks of a clip. Every track is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextTracks {
    pub english: Option<String>,
    pub korean: Option<String>,
    pub explanation: Option<String>,
    pub pronunciation: Option<String>,
}

impl TextTracks {
    /// Text for a layer, or `None` when the track is absent or blank.
    pub fn get(&self, layer: TextLayer) -> Option<&str> {
        let text = match layer {
            TextLayer::English => self.english.as_deref(),
            TextLayer::Korean => self.korean.as_deref(),
            TextLayer::Explanation => self.explanation.as_deref(),
            TextLayer::Pronunciation => self.pronunciation.as_deref(),
        };
        text.filter(|t| !t.trim().is_empty())
    }
}

/// Reference to one clip: a span of a source media file plus its subtitles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipRef {
    /// Catalog identifier.
    pub id: String,

    /// Human-readable title.
    #[serde(default)]
    pub title: String,

    /// Subtitle text tracks.
    #[serde(default)]
    pub text: TextTracks,

    /// Source media file.
    pub media_path: PathBuf,

    /// Offset of the clip inside the source media, in seconds.
    #[serde(default)]
    pub start_secs: f64,

    /// Clip duration in seconds.
    pub duration_secs: f64,

    /// Whether the source carries an audio stream.
    #[serde(default = "default_has_audio")]
    pub has_audio: bool,
}

fn default_has_audio() -> bool {
    true
}

impl ClipRef {
    /// Create a clip spanning `duration_secs` from the start of `media_path`.
    pub fn new(id: impl Into<String>, media_path: impl Into<PathBuf>, duration_secs: f64) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            text: TextTracks::default(),
            media_path: media_path.into(),
            start_secs: 0.0,
            duration_secs,
            has_audio: true,
        }
    }

    /// Set the text for one layer.
    pub fn with_text(mut self, layer: TextLayer, text: impl Into<String>) -> Self {
        let text = Some(text.into());
        match layer {
            TextLayer::English => self.text.english = text,
            TextLayer::Korean => self.text.korean = text,
            TextLayer::Explanation => self.text.explanation = text,
            TextLayer::Pronunciation => self.text.pronunciation = text,
        }
        self
    }

    /// Text for a layer, or `None` when absent or blank.
    pub fn text(&self, layer: TextLayer) -> Option<&str> {
        self.text.get(layer)
    }
}

/// Load a JSON array of clips (the catalog export format).
pub fn load_clips(path: impl AsRef<Path>) -> Result<Vec<ClipRef>, ModelError> {
    read_json(path.as_ref())
}
