//! Music cues
//!
//! `MusicCue` is the stock controller. One type covers every playback
//! policy; what it does depends on its [`CuePolicy`]:
//!
//! | clips | looping | transition | behaviour                             |
//! |-------|---------|------------|-----------------------------------------|
//! | 0     | -       | none/some  | silence: stop, or fade to silence       |
//! | 1     | no/yes  | none       | play once / loop, instant switch        |
//! | 1     | no/yes  | some       | fade in, fade out when nothing follows  |
//! | 2+    | ignored | none/some  | shuffle without repeats at the boundary |

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use super::controller::{Handoff, MusicController};
use super::queue::MusicPlayer;
use crate::audio_system::Clip;
use crate::config::{CueDefinition, PlayerConfig};

/// How often shuffling cues check for the end of a clip by default
pub const DEFAULT_SHUFFLE_CHECK_SECS: f32 = 2.5;

/// Playback policy of a cue
#[derive(Debug, Clone, PartialEq)]
pub struct CuePolicy {
    pub clips: Vec<Clip>,
    pub looping: bool,
    /// Crossfade length; `None` switches instantly
    pub transition_secs: Option<f32>,
    /// Shuffle poll period
    pub check_secs: f32,
}

impl Default for CuePolicy {
    fn default() -> Self {
        Self {
            clips: Vec::new(),
            looping: false,
            transition_secs: None,
            check_secs: DEFAULT_SHUFFLE_CHECK_SECS,
        }
    }
}

/// Which behaviour a policy resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CueKind {
    Silence,
    Single,
    Shuffle,
}

struct ShuffleState {
    order: Vec<Clip>,
    /// Position in `order` of the clip last played
    index: Option<usize>,
    /// Next clip uses the transition (first clip after activation)
    fade_next: bool,
    rng: StdRng,
}

impl ShuffleState {
    fn new(rng: StdRng) -> Self {
        Self {
            order: Vec::new(),
            index: None,
            fade_next: false,
            rng,
        }
    }

    /// Step to the next clip, reshuffling once the order is used up
    fn next_clip(&mut self, clips: &[Clip]) -> Option<Clip> {
        let next = self.index.map_or(usize::MAX, |i| i + 1);
        if next >= self.order.len() {
            self.reshuffle(clips);
            self.index = Some(0);
        } else {
            self.index = Some(next);
        }
        self.index.and_then(|i| self.order.get(i)).cloned()
    }

    fn reshuffle(&mut self, clips: &[Clip]) {
        let previous = self.order.last().cloned();
        let mut order = clips.to_vec();
        order.shuffle(&mut self.rng);
        if order.len() > 1 && order.first() == previous.as_ref() {
            let swap = self.rng.gen_range(1..order.len());
            order.swap(0, swap);
        }
        tracing::debug!("Shuffled {} clips", order.len());
        self.order = order;
    }
}

/// Stock music controller
pub struct MusicCue {
    name: String,
    importance: u8,
    policy: CuePolicy,
    shuffle: Mutex<ShuffleState>,
}

impl MusicCue {
    pub fn new(name: impl Into<String>, importance: u8, policy: CuePolicy) -> Self {
        Self::with_rng(name, importance, policy, StdRng::from_entropy())
    }

    /// Create a cue with a seeded shuffle order
    pub fn with_seed(name: impl Into<String>, importance: u8, policy: CuePolicy, seed: u64) -> Self {
        Self::with_rng(name, importance, policy, StdRng::seed_from_u64(seed))
    }

    fn with_rng(name: impl Into<String>, importance: u8, mut policy: CuePolicy, rng: StdRng) -> Self {
        let name = name.into();
        if policy.clips.len() > 1 && policy.looping {
            tracing::warn!("{}: shuffled cues cannot loop, ignoring loop flag", name);
            policy.looping = false;
        }
        Self {
            name,
            importance,
            policy,
            shuffle: Mutex::new(ShuffleState::new(rng)),
        }
    }

    /// Play `clip` once, switching instantly
    pub fn sudden(name: impl Into<String>, importance: u8, clip: Clip) -> Self {
        Self::new(
            name,
            importance,
            CuePolicy {
                clips: vec![clip],
                ..CuePolicy::default()
            },
        )
    }

    /// Loop `clip`, switching instantly
    pub fn looped(name: impl Into<String>, importance: u8, clip: Clip) -> Self {
        Self::new(
            name,
            importance,
            CuePolicy {
                clips: vec![clip],
                looping: true,
                ..CuePolicy::default()
            },
        )
    }

    /// Fade `clip` in, and fade it out if nothing replaces it
    pub fn fade_in(name: impl Into<String>, importance: u8, clip: Clip, transition_secs: f32) -> Self {
        Self::new(
            name,
            importance,
            CuePolicy {
                clips: vec![clip],
                transition_secs: Some(transition_secs),
                ..CuePolicy::default()
            },
        )
    }

    /// Loop `clip` with fades on both ends
    pub fn loop_fade(name: impl Into<String>, importance: u8, clip: Clip, transition_secs: f32) -> Self {
        Self::new(
            name,
            importance,
            CuePolicy {
                clips: vec![clip],
                looping: true,
                transition_secs: Some(transition_secs),
                ..CuePolicy::default()
            },
        )
    }

    /// Shuffle `clips`, optionally fading in the first one
    pub fn shuffle(
        name: impl Into<String>,
        importance: u8,
        clips: Vec<Clip>,
        transition_secs: Option<f32>,
    ) -> Self {
        Self::new(
            name,
            importance,
            CuePolicy {
                clips,
                transition_secs,
                ..CuePolicy::default()
            },
        )
    }

    /// Build from a cue sheet entry
    pub fn from_definition(definition: &CueDefinition, config: &PlayerConfig) -> Self {
        let transition_secs = definition
            .transition_secs
            .or(definition.fade.then_some(config.default_transition_secs));
        Self::new(
            definition.name.clone(),
            definition.importance,
            CuePolicy {
                clips: definition.clips.clone(),
                looping: definition.looping,
                transition_secs,
                check_secs: config.shuffle_check_secs,
            },
        )
    }

    pub fn kind(&self) -> CueKind {
        match self.policy.clips.len() {
            0 => CueKind::Silence,
            1 => CueKind::Single,
            _ => CueKind::Shuffle,
        }
    }

    pub fn policy(&self) -> &CuePolicy {
        &self.policy
    }

    fn transition(&self) -> Option<f32> {
        self.policy.transition_secs.filter(|secs| *secs > 0.0)
    }

    fn start(&self, player: &mut MusicPlayer, clip: Clip, fade: bool) {
        match self.transition().filter(|_| fade) {
            Some(secs) => player.play_with_transition(Some(clip), secs),
            None => player.play(Some(clip)),
        }
    }

    fn play_next(&self, player: &mut MusicPlayer) {
        let (clip, fade) = {
            let mut state = self.shuffle.lock();
            let fade = std::mem::take(&mut state.fade_next);
            (state.next_clip(&self.policy.clips), fade)
        };
        if let Some(clip) = clip {
            self.start(player, clip, fade);
        }
    }
}

impl MusicController for MusicCue {
    fn name(&self) -> &str {
        &self.name
    }

    fn importance(&self) -> u8 {
        self.importance
    }

    fn activate(&self, player: &mut MusicPlayer) {
        match self.kind() {
            CueKind::Silence => match self.transition() {
                Some(secs) => player.request_fade_out(secs),
                None => player.stop(),
            },
            CueKind::Single => {
                if self.policy.looping {
                    player.set_loop(true);
                }
                self.start(player, self.policy.clips[0].clone(), true);
            }
            CueKind::Shuffle => {
                self.shuffle.lock().fade_next = true;
                self.play_next(player);
                player.schedule_poll(self.policy.check_secs);
            }
        }
    }

    fn deactivate(&self, player: &mut MusicPlayer) -> Handoff {
        if self.policy.looping {
            player.set_loop(false);
        }
        Handoff::from_transition(self.transition())
    }

    fn poll(&self, player: &mut MusicPlayer) {
        if self.kind() == CueKind::Shuffle && !player.is_playing() {
            tracing::debug!("{}: clip ended, playing next", self.name);
            self.play_next(player);
        }
    }
}
