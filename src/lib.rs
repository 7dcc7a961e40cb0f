//! Priority-ordered music scheduling with linear crossfades.
//!
//! Controllers (zones, encounters, menus) register interest in playing
//! music; the [`MusicPlayer`] keeps them ordered by importance, hands the
//! music to the highest one and blends between old and new music one tick
//! at a time.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use zone_music::{Clip, MusicController, MusicCue, MusicPlayer, PlayerConfig, SilentChannel};
//!
//! let (channels, _probes) = SilentChannel::pair();
//! let mut player = MusicPlayer::new(channels, &PlayerConfig::default());
//!
//! let town: Arc<dyn MusicController> = Arc::new(MusicCue::looped("town", 1, Clip::new("town.mp3")));
//! let cave: Arc<dyn MusicController> =
//!     Arc::new(MusicCue::loop_fade("cave", 5, Clip::new("cave.mp3"), 1.5));
//!
//! player.register(&town);
//! player.register(&cave); // crossfades town -> cave
//! player.advance(1.0 / 60.0);
//! ```

pub mod audio_system;
pub mod config;
pub mod error;
pub mod messaging;
pub mod scheduler;

pub use audio_system::{
    ChannelProbe, Clip, ClipLibrary, CrossfadeEngine, OutputChannel, RodioOutput, SilentChannel,
};
pub use config::{CueDefinition, CueSheet, PlayerConfig, TimelineAction, TimelineEvent};
pub use error::{AppResult, ConfigError, MusicError};
pub use messaging::{EventBus, MusicEvent};
pub use scheduler::{Handoff, MusicController, MusicCue, MusicPlayer, SharedMusicPlayer};
