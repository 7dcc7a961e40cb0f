//! Music scheduler
//!
//! Decides which registered controller owns the music:
//!
//! ```text
//! register(cue) ──> MusicPlayer queue (sorted by importance)
//!                      │ head changed?
//!                      ├── old head .deactivate() -> Handoff
//!                      └── new head .activate()   -> play / play_with_transition
//!                                                     │
//!                                                     ▼
//!                                              CrossfadeEngine
//! ```

pub mod controller;
pub mod cue;
pub mod queue;

pub use controller::{Handoff, MusicController};
pub use cue::{CueKind, CuePolicy, MusicCue, DEFAULT_SHUFFLE_CHECK_SECS};
pub use queue::{MusicPlayer, SharedMusicPlayer};
