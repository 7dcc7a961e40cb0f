//! Priority queue of music controllers
//!
//! `MusicPlayer` keeps registered controllers sorted by importance (highest
//! first, ties in registration order). Only the head of the queue is active
//! and allowed to drive the crossfade engine.
//!
//! The queue only holds weak references: a controller dropped by its owner
//! without unregistering is skipped when it would otherwise take over.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::controller::{Handoff, MusicController};
use crate::audio_system::{Clip, CrossfadeEngine, OutputChannel};
use crate::config::PlayerConfig;
use crate::messaging::{EventBus, MusicEvent};

/// Player shared with a multi-threaded host. Every tick and every queue
/// mutation goes through the one lock.
pub type SharedMusicPlayer = Arc<Mutex<MusicPlayer>>;

struct QueueEntry {
    importance: u8,
    name: String,
    controller: Weak<dyn MusicController>,
}

impl QueueEntry {
    fn new(controller: &Arc<dyn MusicController>) -> Self {
        Self {
            importance: controller.importance(),
            name: controller.name().to_string(),
            controller: Arc::downgrade(controller),
        }
    }

    fn is(&self, controller: &Arc<dyn MusicController>) -> bool {
        same_controller(&self.controller, controller)
    }
}

/// Periodic callback owned by the controller that scheduled it
struct PollTimer {
    owner: Weak<dyn MusicController>,
    interval: f32,
    remaining: f32,
}

fn same_controller(weak: &Weak<dyn MusicController>, arc: &Arc<dyn MusicController>) -> bool {
    Weak::as_ptr(weak) as *const () == Arc::as_ptr(arc) as *const ()
}

fn same_weak(a: &Weak<dyn MusicController>, b: &Weak<dyn MusicController>) -> bool {
    Weak::as_ptr(a) as *const () == Weak::as_ptr(b) as *const ()
}

/// The music scheduler: priority queue, crossfade engine and poll timer
pub struct MusicPlayer {
    queue: Vec<QueueEntry>,
    engine: CrossfadeEngine,
    active: Option<Weak<dyn MusicController>>,
    hook_owner: Option<Weak<dyn MusicController>>,
    poll: Option<PollTimer>,
    events: Option<EventBus>,
}

impl MusicPlayer {
    /// Create a player driving `channels` (two are needed for crossfades)
    pub fn new(channels: Vec<Box<dyn OutputChannel>>, config: &PlayerConfig) -> Self {
        let engine = CrossfadeEngine::new(channels, config.volume).with_tick_secs(config.tick_secs);
        Self::with_engine(engine)
    }

    pub fn with_engine(engine: CrossfadeEngine) -> Self {
        Self {
            queue: Vec::new(),
            engine,
            active: None,
            hook_owner: None,
            poll: None,
            events: None,
        }
    }

    /// Publish [`MusicEvent`]s on `bus`
    pub fn with_events(mut self, bus: EventBus) -> Self {
        self.events = Some(bus);
        self
    }

    pub fn into_shared(self) -> SharedMusicPlayer {
        Arc::new(Mutex::new(self))
    }

    // ── Queue ────────────────────────────────────────────────────────────

    /// Add a controller to the queue. Already queued controllers are ignored.
    pub fn register(&mut self, controller: &Arc<dyn MusicController>) {
        if self.position(controller).is_some() {
            tracing::debug!("{} is already queued", controller.name());
            return;
        }

        let entry = QueueEntry::new(controller);
        let index = self
            .queue
            .iter()
            .position(|e| entry.importance > e.importance)
            .unwrap_or(self.queue.len());
        tracing::debug!(
            "Queueing {} (importance {}) at position {}",
            entry.name,
            entry.importance,
            index
        );
        self.queue.insert(index, entry);

        if index == 0 {
            self.promote_head();
        } else {
            self.publish(MusicEvent::ControllerQueued {
                name: controller.name().to_string(),
                position: index,
            });
        }
    }

    /// Remove a controller, handing the music to the next one in line.
    ///
    /// If the queue drains, the controller's own [`Handoff`] decides between
    /// fading out and stopping.
    pub fn unregister(&mut self, controller: &Arc<dyn MusicController>) {
        self.remove(controller, None);
    }

    /// Like [`unregister`](Self::unregister), but `handoff` overrides what the
    /// controller asks for when the queue drains
    pub fn unregister_with(&mut self, controller: &Arc<dyn MusicController>, handoff: Handoff) {
        self.remove(controller, Some(handoff));
    }

    fn remove(&mut self, controller: &Arc<dyn MusicController>, handoff: Option<Handoff>) {
        let Some(index) = self.position(controller) else {
            return;
        };
        if index > 0 {
            self.queue.remove(index);
            tracing::debug!("Removed {} from position {}", controller.name(), index);
            return;
        }

        let requested = if self.is_active(controller) {
            Some(self.run_deactivate(controller))
        } else {
            None
        };
        if let Some(index) = self.position(controller) {
            self.queue.remove(index);
        }

        while let Some(head) = self.queue.first() {
            if let Some(next) = head.controller.upgrade() {
                if !self.is_active(&next) {
                    self.run_activate(next);
                }
                return;
            }
            tracing::warn!("Skipping dropped controller {}", head.name);
            self.queue.remove(0);
        }

        let handoff = handoff.or(requested).unwrap_or_default();
        self.drain(handoff);
    }

    /// Replace the whole queue at once, e.g. when a new scene loads.
    ///
    /// Loop and fade state reset. With no controllers, `fallback` plays
    /// immediately or, if absent, the music stops.
    pub fn replace_queue(&mut self, controllers: &[Arc<dyn MusicController>], fallback: Option<Clip>) {
        if let Some(previous) = self.active.as_ref().and_then(Weak::upgrade) {
            self.run_deactivate(&previous);
        }
        self.queue.clear();
        self.active = None;
        self.poll = None;
        self.engine.set_loop(false);

        for controller in controllers {
            if self.position(controller).is_none() {
                self.queue.push(QueueEntry::new(controller));
            }
        }
        // Stable: equal importance keeps the given order
        self.queue.sort_by(|a, b| b.importance.cmp(&a.importance));
        tracing::info!("Queue replaced with {} controllers", self.queue.len());

        if !self.queue.is_empty() {
            self.promote_head();
        } else if fallback.is_some() {
            self.play_clip(fallback);
        } else {
            self.stop_output();
        }
    }

    /// Deactivate whoever is active and activate the queue head
    fn promote_head(&mut self) {
        let head = self.queue.first().and_then(|e| e.controller.upgrade());
        if let Some(head) = &head {
            if self.is_active(head) {
                return;
            }
        }
        if let Some(previous) = self.active.as_ref().and_then(Weak::upgrade) {
            self.run_deactivate(&previous);
        }
        // A hook may have changed the queue
        if let Some(head) = self.queue.first().and_then(|e| e.controller.upgrade()) {
            if !self.is_active(&head) {
                self.run_activate(head);
            }
        }
    }

    fn run_activate(&mut self, controller: Arc<dyn MusicController>) {
        tracing::info!("Activating {}", controller.name());
        self.active = Some(Arc::downgrade(&controller));
        self.publish(MusicEvent::ControllerActivated {
            name: controller.name().to_string(),
        });

        let outer = self.hook_owner.replace(Arc::downgrade(&controller));
        controller.activate(self);
        self.hook_owner = outer;
    }

    fn run_deactivate(&mut self, controller: &Arc<dyn MusicController>) -> Handoff {
        tracing::info!("Deactivating {}", controller.name());
        if self.is_active(controller) {
            self.active = None;
        }
        self.publish(MusicEvent::ControllerDeactivated {
            name: controller.name().to_string(),
        });

        let outer = self.hook_owner.replace(Arc::downgrade(controller));
        let handoff = controller.deactivate(self);
        self.hook_owner = outer;

        if self
            .poll
            .as_ref()
            .is_some_and(|timer| same_controller(&timer.owner, controller))
        {
            self.poll = None;
        }
        handoff
    }

    fn drain(&mut self, handoff: Handoff) {
        tracing::debug!("Queue drained ({:?})", handoff);
        match handoff {
            Handoff::FadeOut(secs) => self.fade_out_output(secs),
            Handoff::Cut => self.stop_output(),
        }
    }

    fn position(&self, controller: &Arc<dyn MusicController>) -> Option<usize> {
        self.queue.iter().rposition(|e| e.is(controller))
    }

    fn is_active(&self, controller: &Arc<dyn MusicController>) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| same_controller(active, controller))
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Queued controller names, highest priority first
    pub fn queue_names(&self) -> Vec<&str> {
        self.queue.iter().map(|e| e.name.as_str()).collect()
    }

    /// Queued importances, highest priority first
    pub fn queue_importances(&self) -> Vec<u8> {
        self.queue.iter().map(|e| e.importance).collect()
    }

    pub fn contains(&self, controller: &Arc<dyn MusicController>) -> bool {
        self.position(controller).is_some()
    }

    /// Name of the controller currently in charge of the music
    pub fn active_name(&self) -> Option<String> {
        self.active
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|c| c.name().to_string())
    }

    // ── Playback entry points ─────────────────────────────────────────────

    /// Whether a hook is running for a controller that no longer holds
    /// priority. Such a controller must not drive the output.
    fn caller_demoted(&self, operation: &str) -> bool {
        let Some(owner) = &self.hook_owner else {
            return false;
        };
        if self.active.as_ref().is_some_and(|active| same_weak(active, owner)) {
            return false;
        }
        tracing::debug!("Ignoring {} from a controller without priority", operation);
        true
    }

    /// Switch to `clip` without fading. `None` stops the music.
    pub fn play(&mut self, clip: Option<Clip>) {
        if !self.caller_demoted("play") {
            self.play_clip(clip);
        }
    }

    fn play_clip(&mut self, clip: Option<Clip>) {
        let before = self.engine.active_clip().cloned();
        let stopping = clip.is_none();
        self.engine.play_immediate(clip);
        if stopping {
            self.publish(MusicEvent::Stopped);
        } else {
            self.announce_clip(before, 0.0);
        }
    }

    /// Crossfade to `clip` over `transition_secs`; non-positive lengths switch instantly
    pub fn play_with_transition(&mut self, clip: Option<Clip>, transition_secs: f32) {
        if self.caller_demoted("crossfade") {
            return;
        }
        let before = self.engine.active_clip().cloned();
        let stopping = clip.is_none();
        let faded = self.engine.play_crossfade(clip, transition_secs);
        if stopping {
            self.publish(MusicEvent::Stopped);
        } else {
            self.announce_clip(before, if faded { transition_secs } else { 0.0 });
        }
    }

    /// Fade the current music to silence without starting anything new
    pub fn request_fade_out(&mut self, duration_secs: f32) {
        if !self.caller_demoted("fade out") {
            self.fade_out_output(duration_secs);
        }
    }

    fn fade_out_output(&mut self, duration_secs: f32) {
        if self.engine.request_fade_out(duration_secs) {
            self.publish(MusicEvent::FadeOutStarted { duration_secs });
        } else if !self.engine.is_transitioning() {
            self.publish(MusicEvent::Stopped);
        }
    }

    /// Stop all music immediately
    pub fn stop(&mut self) {
        if !self.caller_demoted("stop") {
            self.stop_output();
        }
    }

    fn stop_output(&mut self) {
        self.engine.stop();
        self.publish(MusicEvent::Stopped);
    }

    pub fn set_loop(&mut self, looping: bool) {
        self.engine.set_loop(looping);
    }

    pub fn is_playing(&self) -> bool {
        self.engine.is_playing()
    }

    /// Set the music volume (clamped to 0.0-1.0)
    pub fn set_volume(&mut self, volume: f32) {
        let volume = self.engine.set_target_volume(volume);
        tracing::debug!("Music volume set to {:.2}", volume);
        self.publish(MusicEvent::VolumeChanged { volume });
    }

    pub fn volume(&self) -> f32 {
        self.engine.target_volume()
    }

    /// Schedule [`MusicController::poll`] every `interval_secs` for the
    /// controller whose hook is running. Replaces any existing timer.
    pub fn schedule_poll(&mut self, interval_secs: f32) {
        let Some(owner) = self.hook_owner.clone() else {
            tracing::warn!("Poll timers can only be scheduled from a controller hook");
            return;
        };
        if !(interval_secs.is_finite() && interval_secs > 0.0) {
            tracing::warn!("Ignoring poll interval {}", interval_secs);
            return;
        }
        self.poll = Some(PollTimer {
            owner,
            interval: interval_secs,
            remaining: interval_secs,
        });
    }

    pub fn cancel_poll(&mut self) {
        self.poll = None;
    }

    pub fn has_poll(&self) -> bool {
        self.poll.is_some()
    }

    // ── Tick ─────────────────────────────────────────────────────────────

    /// Advance fades and timers by one tick. Call once per frame.
    pub fn advance(&mut self, tick_secs: f32) {
        if self.engine.advance(tick_secs) {
            self.publish(MusicEvent::TransitionFinished);
        }
        self.tick_poll(tick_secs);
    }

    fn tick_poll(&mut self, tick_secs: f32) {
        let Some(timer) = self.poll.as_mut() else {
            return;
        };
        timer.remaining -= tick_secs.max(0.0);
        if timer.remaining > 0.0 {
            return;
        }
        timer.remaining = timer.interval;

        let Some(owner) = timer.owner.upgrade() else {
            self.poll = None;
            return;
        };
        let outer = self.hook_owner.replace(Arc::downgrade(&owner));
        owner.poll(self);
        self.hook_owner = outer;
    }

    /// Read access to the crossfade engine
    pub fn engine(&self) -> &CrossfadeEngine {
        &self.engine
    }

    fn announce_clip(&self, before: Option<Clip>, transition_secs: f32) {
        let after = self.engine.active_clip();
        if after.is_some() && after != before.as_ref() {
            if let Some(clip) = after {
                self.publish(MusicEvent::ClipStarted {
                    clip: clip.clone(),
                    transition_secs,
                });
            }
        }
    }

    fn publish(&self, event: MusicEvent) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }
}
