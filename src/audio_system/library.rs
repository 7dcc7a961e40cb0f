//! Clip library
//!
//! Keeps encoded audio for every clip in memory so switching music never
//! touches the disk mid-game.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;

use super::source::Clip;
use crate::error::MusicError;

/// Shared map from clip handles to encoded audio bytes
#[derive(Clone, Default)]
pub struct ClipLibrary {
    clips: Arc<RwLock<HashMap<Clip, Arc<Vec<u8>>>>>,
}

impl ClipLibrary {
    /// Create an empty library
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a clip from a file. The handle is the path as given.
    pub fn load(&self, audio_path: &Path) -> Result<Clip, MusicError> {
        let clip = Clip::new(audio_path.to_string_lossy());
        self.load_as(clip.clone(), audio_path)?;
        Ok(clip)
    }

    /// Load a file under an existing handle
    pub fn load_as(&self, clip: Clip, audio_path: &Path) -> Result<(), MusicError> {
        if !audio_path.exists() {
            return Err(MusicError::ClipNotFound(audio_path.display().to_string()));
        }

        let audio_data = std::fs::read(audio_path).map_err(|e| MusicError::LoadFailed {
            path: audio_path.display().to_string(),
            source: Box::new(e),
        })?;
        tracing::info!(
            "Loaded clip {} from {} ({} bytes)",
            clip,
            audio_path.display(),
            audio_data.len()
        );

        self.insert(clip, Arc::new(audio_data));
        Ok(())
    }

    /// Register encoded audio already in memory
    pub fn insert(&self, clip: Clip, audio_data: Arc<Vec<u8>>) {
        tracing::debug!("Clip ready: {}", clip);
        self.clips.write().insert(clip, audio_data);
    }

    /// Encoded bytes for `clip`, if loaded
    pub fn get(&self, clip: &Clip) -> Option<Arc<Vec<u8>>> {
        self.clips.read().get(clip).cloned()
    }

    pub fn contains(&self, clip: &Clip) -> bool {
        self.clips.read().contains_key(clip)
    }

    /// Get number of loaded clips
    pub fn len(&self) -> usize {
        self.clips.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.read().is_empty()
    }

    /// Unload a clip
    pub fn unload(&self, clip: &Clip) {
        if self.clips.write().remove(clip).is_some() {
            tracing::debug!("Unloaded clip {}", clip);
        }
    }
}
