//! Linear fades
//!
//! Fades move volume in a straight line over time: a fade of `duration`
//! seconds toward a ceiling of `target` changes volume by
//! `target / duration` per second.

/// A linear fade of fixed length
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FadeEffect {
    /// Fade duration in seconds. Zero means switch instantly.
    duration_secs: f32,
}

impl FadeEffect {
    /// Create a fade. Non-positive or non-finite durations become instant.
    pub fn new(duration_secs: f32) -> Self {
        let duration_secs = if duration_secs.is_finite() && duration_secs > 0.0 {
            duration_secs
        } else {
            0.0
        };
        Self { duration_secs }
    }

    /// An instant switch
    pub fn instant() -> Self {
        Self { duration_secs: 0.0 }
    }

    pub fn duration_secs(&self) -> f32 {
        self.duration_secs
    }

    pub fn is_instant(&self) -> bool {
        self.duration_secs <= 0.0
    }

    /// Volume change over one tick of `tick_secs` toward `target`.
    ///
    /// Instant fades return infinity so a single tick completes them.
    pub fn step(&self, target: f32, tick_secs: f32) -> f32 {
        if self.is_instant() {
            return f32::INFINITY;
        }
        target / self.duration_secs * tick_secs.max(0.0)
    }
}
