//! Controller contract
//!
//! A controller is anything that wants music played: a zone, a boss fight,
//! a menu. The player calls exactly two hooks on it, in strict alternation:
//! [`MusicController::activate`] when it becomes the highest priority
//! controller and [`MusicController::deactivate`] when it stops being one.

use super::queue::MusicPlayer;

/// What should happen to the music when a controller loses priority and
/// nothing replaces it
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Handoff {
    /// Stop immediately
    #[default]
    Cut,
    /// Fade the current music to silence over this many seconds
    FadeOut(f32),
}

impl Handoff {
    /// Build from an optional transition length; non-positive lengths cut
    pub fn from_transition(transition_secs: Option<f32>) -> Self {
        match transition_secs {
            Some(secs) if secs > 0.0 => Handoff::FadeOut(secs),
            _ => Handoff::Cut,
        }
    }
}

/// A music source competing for the output.
///
/// Hooks run synchronously inside the player call that caused them. They
/// may register or unregister *other* controllers through `player`, but
/// must not re-register or unregister themselves.
pub trait MusicController: Send + Sync {
    /// Name used in logs and events
    fn name(&self) -> &str;

    /// Priority; higher wins. Must not change while registered.
    fn importance(&self) -> u8;

    /// This controller became the highest priority controller
    fn activate(&self, player: &mut MusicPlayer);

    /// This controller stopped being the highest priority controller.
    ///
    /// The returned handoff is only used when no other controller takes over.
    fn deactivate(&self, player: &mut MusicPlayer) -> Handoff;

    /// A poll timer scheduled from one of this controller's hooks fired
    fn poll(&self, _player: &mut MusicPlayer) {}
}
