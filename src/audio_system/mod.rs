//! Audio system module
//!
//! Everything audible lives here:
//! - Clip handles and the in-memory clip library
//! - Output channels (rodio sinks, or silent in-memory channels)
//! - The two-slot crossfade engine with linear fades
//!
//! ## Architecture
//!
//! ```text
//! CrossfadeEngine
//!   ├── active signal   ── OutputChannel ─┐
//!   └── outgoing signal ── OutputChannel ─┤ RodioOutput (one stream)
//!                                         │   └── ClipLibrary
//! VolumeEffect (target ceiling)           │
//! FadeEffect   (per-tick step)            ┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use zone_music::audio_system::{ClipLibrary, CrossfadeEngine, RodioOutput};
//!
//! let library = ClipLibrary::new();
//! let town = library.load(Path::new("town.mp3"))?;
//! let output = RodioOutput::try_default(library)?;
//!
//! let mut engine = CrossfadeEngine::new(output.channels(2)?, 0.5);
//! engine.play_crossfade(Some(town), 1.5);
//!
//! // once per frame
//! engine.advance(frame_secs);
//! ```

pub mod channel;
pub mod crossfade;
pub mod effects;
pub mod library;
pub mod player;
pub mod source;

// Re-export commonly used types
pub use channel::{ChannelProbe, ChannelState, OutputChannel, SilentChannel};
pub use crossfade::{CrossfadeEngine, DEFAULT_TICK_SECS};
pub use effects::{FadeEffect, VolumeEffect};
pub use library::ClipLibrary;
pub use player::{RodioChannel, RodioOutput};
pub use source::Clip;
