//! Clip lookup.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use parking_lot::RwLock;

use shadowcast_common::error::{ShadowcastError, ShadowcastResult};
use shadowcast_render_model::{load_clips, ClipRef, ModelError};

/// Resolves clip ids to media and subtitle text.
#[async_trait]
pub trait ClipCatalog: Send + Sync {
    /// Fails with [`ShadowcastError::ClipNotFound`] for unknown ids.
    async fn clip(&self, id: &str) -> ShadowcastResult<ClipRef>;
}

/// Catalog held in memory, typically loaded from a JSON array of clips.
#[derive(Debug, Default)]
pub struct InMemoryClipCatalog {
    clips: RwLock<HashMap<String, ClipRef>>,
}

impl InMemoryClipCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_clips(clips: impl IntoIterator<Item = ClipRef>) -> Self {
        let catalog = Self::new();
        for clip in clips {
            catalog.insert(clip);
        }
        catalog
    }

    /// Load a JSON array of clips.
    pub fn load(path: &Path) -> ShadowcastResult<Self> {
        let clips = load_clips(path).map_err(|e| match e {
            ModelError::IoError { source, .. } if source.kind() == std::io::ErrorKind::NotFound => {
                ShadowcastError::FileNotFound {
                    path: path.to_path_buf(),
                }
            }
            other => ShadowcastError::config(other.to_string()),
        })?;
        tracing::debug!(path = %path.display(), count = clips.len(), "Loaded clip catalog");
        Ok(Self::from_clips(clips))
    }

    /// Insert or replace a clip.
    pub fn insert(&self, clip: ClipRef) {
        self.clips.write().insert(clip.id.clone(), clip);
    }

    pub fn len(&self) -> usize {
        self.clips.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.read().is_empty()
    }

    /// Clip ids in sorted order.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.clips.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl ClipCatalog for InMemoryClipCatalog {
    async fn clip(&self, id: &str) -> ShadowcastResult<ClipRef> {
        self.clips
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| ShadowcastError::clip_not_found(id))
    }
}
