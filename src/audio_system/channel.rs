//! Output channels
//!
//! One channel is one audible voice. The crossfade engine needs two of them:
//! the active voice and the voice fading out underneath it.

use std::sync::Arc;

use parking_lot::Mutex;

use super::source::Clip;

/// A single audio voice the crossfade engine can drive.
///
/// Implementations must not fail loudly: a clip that cannot be decoded
/// leaves the channel silent and is reported through logging.
pub trait OutputChannel: Send {
    /// Start `clip` from the beginning, replacing whatever was playing
    fn play(&mut self, clip: &Clip, looping: bool);

    /// Stop playback and unload the current clip
    fn stop(&mut self);

    /// Set the channel volume (0.0-1.0)
    fn set_volume(&mut self, volume: f32);

    /// Whether the channel is currently producing sound
    fn is_playing(&self) -> bool;
}

/// Snapshot of what a [`SilentChannel`] is doing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelState {
    pub clip: Option<Clip>,
    pub volume: f32,
    pub playing: bool,
    pub looping: bool,
    /// Number of times `play` was called
    pub starts: usize,
}

/// In-memory channel that tracks state without producing sound.
///
/// Used by headless hosts and tests. Each channel comes with a
/// [`ChannelProbe`] sharing its state.
pub struct SilentChannel {
    state: Arc<Mutex<ChannelState>>,
}

impl SilentChannel {
    /// Create a channel and the probe observing it
    pub fn new() -> (Self, ChannelProbe) {
        let state = Arc::new(Mutex::new(ChannelState::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            ChannelProbe { state },
        )
    }

    /// Create a boxed pair of channels plus their probes
    pub fn pair() -> (Vec<Box<dyn OutputChannel>>, [ChannelProbe; 2]) {
        let (first, first_probe) = Self::new();
        let (second, second_probe) = Self::new();
        let channels: Vec<Box<dyn OutputChannel>> = vec![Box::new(first), Box::new(second)];
        (channels, [first_probe, second_probe])
    }
}

impl OutputChannel for SilentChannel {
    fn play(&mut self, clip: &Clip, looping: bool) {
        let mut state = self.state.lock();
        state.clip = Some(clip.clone());
        state.playing = true;
        state.looping = looping;
        state.starts += 1;
    }

    fn stop(&mut self) {
        let mut state = self.state.lock();
        state.clip = None;
        state.playing = false;
    }

    fn set_volume(&mut self, volume: f32) {
        self.state.lock().volume = volume.clamp(0.0, 1.0);
    }

    fn is_playing(&self) -> bool {
        self.state.lock().playing
    }
}

/// Read side of a [`SilentChannel`]
#[derive(Clone)]
pub struct ChannelProbe {
    state: Arc<Mutex<ChannelState>>,
}

impl ChannelProbe {
    /// Current channel state
    pub fn state(&self) -> ChannelState {
        self.state.lock().clone()
    }

    pub fn is_playing(&self) -> bool {
        self.state.lock().playing
    }

    pub fn clip(&self) -> Option<Clip> {
        self.state.lock().clip.clone()
    }

    pub fn volume(&self) -> f32 {
        self.state.lock().volume
    }

    /// Simulate the clip reaching its end. Looping clips never end.
    pub fn finish(&self) {
        let mut state = self.state.lock();
        if !state.looping {
            state.playing = false;
        }
    }
}
