//! Music events
//!
//! Events are notifications of things that already happened (past tense).
//! They are broadcast to all subscribers.
use crate::audio_system::Clip;

/// Events published by the music player
#[derive(Debug, Clone, PartialEq)]
pub enum MusicEvent {
    /// A controller became the highest priority controller
    ControllerActivated { name: String },

    /// A controller lost the highest priority
    ControllerDeactivated { name: String },

    /// A controller was added to the queue behind a higher priority one
    ControllerQueued { name: String, position: usize },

    /// A clip started, with the crossfade length used (0 for an instant switch)
    ClipStarted { clip: Clip, transition_secs: f32 },

    /// The current music began fading to silence
    FadeOutStarted { duration_secs: f32 },

    /// A crossfade or fade-out completed
    TransitionFinished,

    /// All music stopped
    Stopped,

    /// Target volume changed
    VolumeChanged { volume: f32 },
}

impl MusicEvent {
    /// Short label for logs
    pub fn label(&self) -> &'static str {
        match self {
            MusicEvent::ControllerActivated { .. } => "controller-activated",
            MusicEvent::ControllerDeactivated { .. } => "controller-deactivated",
            MusicEvent::ControllerQueued { .. } => "controller-queued",
            MusicEvent::ClipStarted { .. } => "clip-started",
            MusicEvent::FadeOutStarted { .. } => "fade-out-started",
            MusicEvent::TransitionFinished => "transition-finished",
            MusicEvent::Stopped => "stopped",
            MusicEvent::VolumeChanged { .. } => "volume-changed",
        }
    }
}
