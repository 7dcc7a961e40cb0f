//! Crossfade engine
//!
//! Two signal slots share the output: the active signal, which is the music
//! the listener should end up hearing, and the outgoing signal, which is the
//! previous music fading to silence underneath it. Fades are linear and only
//! advance while a transition is in flight.

use super::channel::OutputChannel;
use super::effects::{FadeEffect, VolumeEffect};
use super::source::Clip;
use crate::error::MusicError;

/// Tick length assumed until the first `advance` call (one 60 Hz frame)
pub const DEFAULT_TICK_SECS: f32 = 1.0 / 60.0;

/// One voice plus what the engine believes it is doing
struct Signal {
    channel: Box<dyn OutputChannel>,
    clip: Option<Clip>,
    volume: f32,
    /// Clip is loaded but held silent until the volume comes back up
    parked: bool,
}

impl Signal {
    fn new(channel: Box<dyn OutputChannel>) -> Self {
        Self {
            channel,
            clip: None,
            volume: 0.0,
            parked: false,
        }
    }

    fn start(&mut self, clip: Clip, volume: f32, looping: bool) {
        self.volume = volume;
        self.channel.set_volume(volume);
        self.channel.play(&clip, looping);
        self.clip = Some(clip);
        self.parked = false;
    }

    /// Keep `clip` loaded without producing sound
    fn load(&mut self, clip: Clip) {
        self.channel.stop();
        self.clip = Some(clip);
        self.volume = 0.0;
        self.parked = true;
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
        self.channel.set_volume(volume);
    }

    fn halt(&mut self) {
        self.channel.stop();
        self.volume = 0.0;
        self.parked = self.clip.is_some();
    }

    fn clear(&mut self) {
        self.channel.stop();
        self.clip = None;
        self.parked = false;
    }
}

struct Slots {
    active: Signal,
    outgoing: Signal,
}

impl Slots {
    /// Move the active signal underneath as the outgoing one, unless a
    /// louder outgoing signal is already fading. Only one fade-out ever runs.
    fn hand_off(&mut self, step: f32) {
        if self.active.clip.is_none() {
            return;
        }
        if self.outgoing.clip.is_none() || self.active.volume >= self.outgoing.volume {
            self.outgoing.clear();
            std::mem::swap(&mut self.active, &mut self.outgoing);
            let faded = (self.outgoing.volume - step).max(0.0);
            self.outgoing.set_volume(faded);
        }
    }
}

/// Two-slot linear crossfade state machine
pub struct CrossfadeEngine {
    slots: Option<Slots>,
    target: VolumeEffect,
    fade: FadeEffect,
    tick_secs: f32,
    looping: bool,
    transitioning: bool,
}

impl CrossfadeEngine {
    /// Create an engine driving the first two `channels`.
    ///
    /// With fewer than two channels the engine reports the problem once and
    /// stays silent for its whole lifetime.
    pub fn new(channels: Vec<Box<dyn OutputChannel>>, volume: f32) -> Self {
        let mut engine = Self::disabled(volume);
        if channels.len() < 2 {
            let err = MusicError::NotEnoughChannels {
                found: channels.len(),
            };
            tracing::error!("{}; music playback disabled", err);
            return engine;
        }
        if channels.len() > 2 {
            tracing::debug!("Ignoring {} extra output channels", channels.len() - 2);
        }

        let mut channels = channels.into_iter();
        if let (Some(active), Some(outgoing)) = (channels.next(), channels.next()) {
            engine.slots = Some(Slots {
                active: Signal::new(active),
                outgoing: Signal::new(outgoing),
            });
        }
        engine
    }

    /// An engine with no output at all
    pub fn disabled(volume: f32) -> Self {
        Self {
            slots: None,
            target: VolumeEffect::new(volume),
            fade: FadeEffect::instant(),
            tick_secs: DEFAULT_TICK_SECS,
            looping: false,
            transitioning: false,
        }
    }

    /// Override the tick length used to size the first fade step
    pub fn with_tick_secs(mut self, tick_secs: f32) -> Self {
        if tick_secs.is_finite() && tick_secs > 0.0 {
            self.tick_secs = tick_secs;
        }
        self
    }

    /// Whether the engine has output channels to drive
    pub fn is_enabled(&self) -> bool {
        self.slots.is_some()
    }

    /// Switch to `clip` with no fade. `None` stops all music.
    pub fn play_immediate(&mut self, clip: Option<Clip>) {
        let Some(clip) = clip else {
            self.stop();
            return;
        };
        let target = self.target.level();
        let looping = self.looping;
        let Some(slots) = self.slots.as_mut() else {
            return;
        };
        if slots.active.clip.as_ref() == Some(&clip) {
            return;
        }

        tracing::info!("Playing {} immediately", clip);
        self.fade = FadeEffect::instant();
        if target > 0.0 {
            slots.active.start(clip, target, looping);
        } else {
            slots.active.load(clip);
        }

        if slots.outgoing.clip.is_some() || self.transitioning {
            slots.outgoing.clear();
            slots.outgoing.volume = 0.0;
        }
        self.transitioning = false;
    }

    /// Crossfade from the current music to `clip` over `duration_secs`.
    ///
    /// Returns `true` when a timed crossfade was started.
    pub fn play_crossfade(&mut self, clip: Option<Clip>, duration_secs: f32) -> bool {
        let Some(clip) = clip else {
            self.stop();
            return false;
        };
        if self.active_clip() == Some(&clip) {
            return false;
        }
        let fade = FadeEffect::new(duration_secs);
        if fade.is_instant() {
            self.play_immediate(Some(clip));
            return false;
        }

        let target = self.target.level();
        let looping = self.looping;
        let Some(slots) = self.slots.as_mut() else {
            return false;
        };
        if self.target.is_muted() {
            // Muted: swap silently so raising the volume later plays the new clip
            slots.active.load(clip);
            self.fade = FadeEffect::instant();
            return false;
        }
        self.fade = fade;

        let step = fade.step(target, self.tick_secs);
        tracing::info!("Crossfading to {} over {:.2}s", clip, fade.duration_secs());
        slots.hand_off(step);
        slots.active.start(clip, step.min(target), looping);
        self.transitioning = true;
        true
    }

    /// Fade the current music to silence over `duration_secs` without
    /// starting anything new. Invalid durations stop immediately.
    ///
    /// Returns `true` when a timed fade-out was started.
    pub fn request_fade_out(&mut self, duration_secs: f32) -> bool {
        let fade = FadeEffect::new(duration_secs);
        let target = self.target.level();
        let has_active = self
            .slots
            .as_ref()
            .is_some_and(|slots| slots.active.clip.is_some());

        if !has_active {
            // Nothing new to fade; let a fade already underway finish
            if !self.transitioning {
                self.stop();
            }
            return false;
        }
        if fade.is_instant() || self.target.is_muted() {
            self.stop();
            return false;
        }

        let Some(slots) = self.slots.as_mut() else {
            return false;
        };
        tracing::debug!("Fading out over {:.2}s", fade.duration_secs());
        self.fade = fade;
        slots.hand_off(fade.step(target, self.tick_secs));
        slots.active.clear();
        slots.active.volume = 0.0;
        self.transitioning = true;
        true
    }

    /// Stop all music, unload both clips and cancel any transition
    pub fn stop(&mut self) {
        if let Some(slots) = self.slots.as_mut() {
            slots.active.clear();
            slots.outgoing.clear();
            slots.outgoing.volume = 0.0;
        }
        self.transitioning = false;
        self.fade = FadeEffect::instant();
        tracing::debug!("Music stopped");
    }

    /// Set the global volume ceiling, returning the clamped value.
    ///
    /// Zero hard-stops both signals but keeps the active clip loaded, so a
    /// later non-zero volume resumes it.
    pub fn set_target_volume(&mut self, volume: f32) -> f32 {
        let level = self.target.set_level(volume);
        let looping = self.looping;
        let Some(slots) = self.slots.as_mut() else {
            return level;
        };

        if self.target.is_muted() {
            slots.active.halt();
            slots.outgoing.clear();
            slots.outgoing.volume = 0.0;
            self.transitioning = false;
            self.fade = FadeEffect::instant();
        } else if slots.active.parked {
            if let Some(clip) = slots.active.clip.clone() {
                slots.active.start(clip, level, looping);
            }
        } else if !self.transitioning {
            slots.active.set_volume(level);
        } else {
            // Mid-transition: cap, never re-raise a fading signal
            let active = self.target.cap(slots.active.volume);
            slots.active.set_volume(active);
            if slots.outgoing.clip.is_some() {
                let outgoing = self.target.cap(slots.outgoing.volume);
                slots.outgoing.set_volume(outgoing);
            }
        }
        level
    }

    /// Advance the transition by one tick of `tick_secs`.
    ///
    /// Returns `true` on the tick a transition completes.
    pub fn advance(&mut self, tick_secs: f32) -> bool {
        if tick_secs.is_finite() && tick_secs > 0.0 {
            self.tick_secs = tick_secs;
        }
        if !self.transitioning {
            return false;
        }
        let Some(slots) = self.slots.as_mut() else {
            self.transitioning = false;
            return false;
        };

        let target = self.target.level();
        let step = self.fade.step(target, tick_secs);

        if slots.outgoing.clip.is_some() {
            let volume = slots.outgoing.volume - step;
            if volume <= 0.0 {
                slots.outgoing.clear();
                slots.outgoing.volume = 0.0;
            } else {
                slots.outgoing.set_volume(volume);
            }
        }

        if slots.active.clip.is_some() && slots.active.volume < target {
            slots.active.set_volume((slots.active.volume + step).min(target));
        }

        let settled = slots.active.clip.is_none() || slots.active.volume >= target;
        if settled && slots.outgoing.clip.is_none() {
            self.transitioning = false;
            self.fade = FadeEffect::instant();
            tracing::debug!("Transition finished");
            return true;
        }
        false
    }

    /// Loop clips started from now on
    pub fn set_loop(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn looping(&self) -> bool {
        self.looping
    }

    /// Whether the active signal is producing sound
    pub fn is_playing(&self) -> bool {
        self.slots
            .as_ref()
            .is_some_and(|slots| slots.active.channel.is_playing())
    }

    pub fn is_transitioning(&self) -> bool {
        self.transitioning
    }

    pub fn target_volume(&self) -> f32 {
        self.target.level()
    }

    /// Requested length of the transition in flight (0 when idle)
    pub fn fade_duration(&self) -> f32 {
        self.fade.duration_secs()
    }

    pub fn tick_secs(&self) -> f32 {
        self.tick_secs
    }

    pub fn active_clip(&self) -> Option<&Clip> {
        self.slots.as_ref().and_then(|slots| slots.active.clip.as_ref())
    }

    pub fn active_volume(&self) -> f32 {
        self.slots.as_ref().map_or(0.0, |slots| slots.active.volume)
    }

    pub fn outgoing_clip(&self) -> Option<&Clip> {
        self.slots
            .as_ref()
            .and_then(|slots| slots.outgoing.clip.as_ref())
    }

    pub fn outgoing_volume(&self) -> f32 {
        self.slots
            .as_ref()
            .filter(|slots| slots.outgoing.clip.is_some())
            .map_or(0.0, |slots| slots.outgoing.volume)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_system::channel::{ChannelProbe, SilentChannel};

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    fn engine(volume: f32) -> (CrossfadeEngine, [ChannelProbe; 2]) {
        let (channels, probes) = SilentChannel::pair();
        (CrossfadeEngine::new(channels, volume), probes)
    }

    fn clip(id: &str) -> Option<Clip> {
        Some(Clip::new(id))
    }

    #[test]
    fn test_play_immediate_sets_target_volume() {
        let (mut engine, probes) = engine(0.5);
        engine.play_immediate(clip("a"));

        assert_eq!(engine.active_clip(), Some(&Clip::new("a")));
        assert!(approx(engine.active_volume(), 0.5));
        assert!(!engine.is_transitioning());
        assert!(probes.iter().any(|p| p.is_playing()));
    }

    #[test]
    fn test_play_immediate_same_clip_is_noop() {
        let (mut engine, probes) = engine(0.5);
        engine.play_immediate(clip("a"));
        engine.play_immediate(clip("a"));

        let starts: usize = probes.iter().map(|p| p.state().starts).sum();
        assert_eq!(starts, 1);
    }

    #[test]
    fn test_play_none_stops_everything() {
        let (mut engine, probes) = engine(0.5);
        engine.play_immediate(clip("a"));
        engine.play_crossfade(clip("b"), 1.0);
        engine.play_immediate(None);

        assert_eq!(engine.active_clip(), None);
        assert_eq!(engine.outgoing_clip(), None);
        assert!(!engine.is_transitioning());
        assert!(probes.iter().all(|p| !p.is_playing()));
    }

    #[test]
    fn test_crossfade_linear_ramp() {
        let (mut engine, _probes) = engine(0.5);
        engine.play_immediate(clip("a"));
        engine.advance(0.5);

        assert!(engine.play_crossfade(clip("b"), 2.0));
        assert!(approx(engine.active_volume(), 0.125));
        assert!(approx(engine.outgoing_volume(), 0.375));
        assert_eq!(engine.outgoing_clip(), Some(&Clip::new("a")));

        assert!(!engine.advance(0.5));
        assert!(approx(engine.active_volume(), 0.25));
        assert!(approx(engine.outgoing_volume(), 0.25));

        assert!(!engine.advance(0.5));
        assert!(engine.advance(0.5));
        assert!(approx(engine.active_volume(), 0.5));
        assert_eq!(engine.outgoing_clip(), None);
        assert!(!engine.is_transitioning());
        assert_eq!(engine.fade_duration(), 0.0);

        assert!(!engine.advance(0.5));
        assert!(approx(engine.active_volume(), 0.5));
    }

    #[test]
    fn test_crossfade_sum_bounded() {
        let (mut engine, _probes) = engine(0.8);
        engine.play_immediate(clip("a"));
        engine.advance(0.1);
        engine.play_crossfade(clip("b"), 1.3);

        let mut last_gap = f32::MAX;
        for _ in 0..40 {
            engine.advance(0.1);
            let sum = engine.active_volume() + engine.outgoing_volume();
            assert!(sum <= 2.0 * engine.target_volume() + 1e-4);
            assert!(engine.active_volume() <= engine.target_volume() + 1e-6);
            let gap = (engine.target_volume() - sum).abs();
            assert!(gap <= last_gap + 1e-4);
            last_gap = gap;
        }
        assert!(!engine.is_transitioning());
    }

    #[test]
    fn test_non_positive_duration_is_immediate() {
        let (mut engine, _probes) = engine(0.5);
        engine.play_immediate(clip("a"));
        assert!(!engine.play_crossfade(clip("b"), 0.0));
        assert!(!engine.play_crossfade(clip("c"), -2.0));

        assert_eq!(engine.active_clip(), Some(&Clip::new("c")));
        assert!(approx(engine.active_volume(), 0.5));
        assert!(!engine.is_transitioning());
    }

    #[test]
    fn test_crossfade_none_stops_without_fade() {
        let (mut engine, _probes) = engine(0.5);
        engine.play_immediate(clip("a"));
        assert!(!engine.play_crossfade(None, 3.0));
        assert_eq!(engine.active_clip(), None);
        assert!(!engine.is_transitioning());
    }

    #[test]
    fn test_second_crossfade_keeps_louder_outgoing() {
        let (mut engine, _probes) = engine(1.0);
        engine.play_immediate(clip("a"));
        engine.advance(0.1);
        engine.play_crossfade(clip("b"), 1.0);
        engine.advance(0.1);
        // "a" is still louder than the incoming "b"
        assert!(engine.outgoing_volume() > engine.active_volume());

        engine.play_crossfade(clip("c"), 1.0);
        assert_eq!(engine.outgoing_clip(), Some(&Clip::new("a")));
        assert_eq!(engine.active_clip(), Some(&Clip::new("c")));
    }

    #[test]
    fn test_second_crossfade_replaces_quieter_outgoing() {
        let (mut engine, _probes) = engine(1.0);
        engine.play_immediate(clip("a"));
        engine.advance(0.1);
        engine.play_crossfade(clip("b"), 1.0);
        for _ in 0..7 {
            engine.advance(0.1);
        }
        assert!(engine.active_volume() > engine.outgoing_volume());
        let b_volume = engine.active_volume();

        engine.play_crossfade(clip("c"), 1.0);
        assert_eq!(engine.outgoing_clip(), Some(&Clip::new("b")));
        assert!(approx(engine.outgoing_volume(), b_volume - 0.1));
        assert_eq!(engine.active_clip(), Some(&Clip::new("c")));
    }

    #[test]
    fn test_play_immediate_cancels_crossfade() {
        let (mut engine, _probes) = engine(0.5);
        engine.play_immediate(clip("a"));
        engine.play_crossfade(clip("b"), 2.0);
        engine.play_immediate(clip("c"));

        assert_eq!(engine.outgoing_clip(), None);
        assert!(approx(engine.active_volume(), 0.5));
        assert!(!engine.is_transitioning());
    }

    #[test]
    fn test_muted_crossfade_swaps_silently() {
        let (mut engine, probes) = engine(0.0);
        engine.play_immediate(clip("a"));
        engine.play_crossfade(clip("b"), 1.0);

        assert_eq!(engine.active_clip(), Some(&Clip::new("b")));
        assert!(!engine.is_transitioning());
        assert!(probes.iter().all(|p| !p.is_playing()));
    }

    #[test]
    fn test_volume_round_trip_resumes() {
        let (mut engine, _probes) = engine(0.5);
        engine.play_immediate(clip("a"));
        engine.set_target_volume(0.0);
        assert!(!engine.is_playing());
        assert_eq!(engine.active_clip(), Some(&Clip::new("a")));

        engine.set_target_volume(0.7);
        assert!(engine.is_playing());
        assert!(approx(engine.active_volume(), 0.7));
    }

    #[test]
    fn test_mute_holds_active_under_target() {
        let (mut engine, _probes) = engine(0.5);
        engine.play_immediate(clip("a"));
        engine.set_target_volume(0.0);
        assert_eq!(engine.target_volume(), 0.0);
        assert_eq!(engine.active_volume(), 0.0);

        engine.play_immediate(clip("b"));
        assert_eq!(engine.active_volume(), 0.0);
        engine.play_crossfade(clip("c"), 1.0);
        assert_eq!(engine.active_volume(), 0.0);
        assert_eq!(engine.active_clip(), Some(&Clip::new("c")));
    }

    #[test]
    fn test_muted_crossfade_leaves_no_fade_length() {
        let (mut engine, _probes) = engine(0.0);
        engine.play_immediate(clip("a"));
        engine.play_crossfade(clip("b"), 3.0);
        assert_eq!(engine.fade_duration(), 0.0);

        engine.set_target_volume(0.5);
        engine.advance(0.1);
        assert!(!engine.is_transitioning());
        assert_eq!(engine.fade_duration(), 0.0);
        assert!(approx(engine.active_volume(), 0.5));
    }

    #[test]
    fn test_volume_zero_hard_stops_transition() {
        let (mut engine, _probes) = engine(0.5);
        engine.play_immediate(clip("a"));
        engine.play_crossfade(clip("b"), 2.0);
        engine.set_target_volume(0.0);

        assert!(!engine.is_transitioning());
        assert_eq!(engine.outgoing_clip(), None);
        assert!(!engine.is_playing());
    }

    #[test]
    fn test_volume_change_idle_sets_directly() {
        let (mut engine, _probes) = engine(0.5);
        engine.play_immediate(clip("a"));
        assert_eq!(engine.set_target_volume(1.4), 1.0);
        assert!(approx(engine.active_volume(), 1.0));
        engine.set_target_volume(0.2);
        assert!(approx(engine.active_volume(), 0.2));
    }

    #[test]
    fn test_volume_change_mid_transition_only_caps() {
        let (mut engine, _probes) = engine(1.0);
        engine.play_immediate(clip("a"));
        engine.advance(0.1);
        engine.play_crossfade(clip("b"), 1.0);
        engine.advance(0.1);
        let incoming = engine.active_volume();
        assert!(engine.outgoing_volume() > 0.5);

        engine.set_target_volume(0.5);
        assert!(approx(engine.outgoing_volume(), 0.5));
        assert!(approx(engine.active_volume(), incoming));

        engine.set_target_volume(0.9);
        assert!(approx(engine.outgoing_volume(), 0.5));
        assert!(engine.is_transitioning());
    }

    #[test]
    fn test_request_fade_out() {
        let (mut engine, probes) = engine(0.5);
        engine.play_immediate(clip("a"));
        engine.advance(0.25);
        assert!(engine.request_fade_out(1.0));

        assert_eq!(engine.active_clip(), None);
        assert_eq!(engine.outgoing_clip(), Some(&Clip::new("a")));
        assert!(approx(engine.outgoing_volume(), 0.375));

        let mut ticks = 0;
        while engine.is_transitioning() && ticks < 10 {
            engine.advance(0.25);
            ticks += 1;
        }
        assert_eq!(ticks, 3);
        assert_eq!(engine.outgoing_clip(), None);
        assert!(probes.iter().all(|p| !p.is_playing()));
    }

    #[test]
    fn test_request_fade_out_during_fade_out_continues() {
        let (mut engine, _probes) = engine(0.5);
        engine.play_immediate(clip("a"));
        engine.advance(0.25);
        assert!(engine.request_fade_out(1.0));
        engine.advance(0.25);
        let outgoing = engine.outgoing_volume();
        assert!(approx(outgoing, 0.25));

        // Nothing active to fade: the running fade is left alone
        assert!(!engine.request_fade_out(1.0));
        assert!(engine.is_transitioning());
        assert_eq!(engine.outgoing_clip(), Some(&Clip::new("a")));
        assert!(approx(engine.outgoing_volume(), outgoing));

        engine.advance(0.25);
        assert!(engine.advance(0.25));
        assert_eq!(engine.outgoing_clip(), None);
    }

    #[test]
    fn test_request_fade_out_idle_stops() {
        let (mut engine, _probes) = engine(0.5);
        assert!(!engine.request_fade_out(1.0));
        assert!(!engine.is_transitioning());
        assert_eq!(engine.fade_duration(), 0.0);
    }

    #[test]
    fn test_request_fade_out_instant_stops() {
        let (mut engine, _probes) = engine(0.5);
        engine.play_immediate(clip("a"));
        assert!(!engine.request_fade_out(0.0));
        assert_eq!(engine.active_clip(), None);
        assert!(!engine.is_transitioning());
    }

    #[test]
    fn test_loop_flag_applies_to_new_clips() {
        let (mut engine, probes) = engine(0.5);
        engine.set_loop(true);
        engine.play_immediate(clip("a"));
        assert!(probes.iter().any(|p| p.state().looping));
    }

    #[test]
    fn test_single_channel_degrades_to_silence() {
        let (channel, probe) = SilentChannel::new();
        let channels: Vec<Box<dyn OutputChannel>> = vec![Box::new(channel)];
        let mut engine = CrossfadeEngine::new(channels, 0.5);
        assert!(!engine.is_enabled());

        engine.play_immediate(clip("a"));
        engine.play_crossfade(clip("b"), 1.0);
        engine.advance(0.1);
        assert_eq!(engine.active_clip(), None);
        assert!(!engine.is_playing());
        assert!(!probe.is_playing());
    }
}
