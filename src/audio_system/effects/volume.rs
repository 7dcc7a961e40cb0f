//! Target volume
//!
//! The global ceiling every signal is held under.

/// Global volume ceiling (0.0-1.0)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeEffect {
    level: f32,
}

impl VolumeEffect {
    /// Create a new volume ceiling
    pub fn new(level: f32) -> Self {
        Self {
            level: clamp_level(level),
        }
    }

    /// Get the volume level
    pub fn level(&self) -> f32 {
        self.level
    }

    /// Set the volume level, returning the clamped value that was stored
    pub fn set_level(&mut self, level: f32) -> f32 {
        self.level = clamp_level(level);
        self.level
    }

    /// Check if muted
    pub fn is_muted(&self) -> bool {
        self.level <= 0.0
    }

    /// Hold `volume` under the ceiling without ever raising it
    pub fn cap(&self, volume: f32) -> f32 {
        volume.min(self.level)
    }
}

impl Default for VolumeEffect {
    fn default() -> Self {
        Self { level: 0.5 }
    }
}

fn clamp_level(level: f32) -> f32 {
    if level.is_nan() {
        0.0
    } else {
        level.clamp(0.0, 1.0)
    }
}
