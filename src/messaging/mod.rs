//! Messaging module
//!
//! The music player broadcasts [`MusicEvent`]s so UI, analytics or debug
//! overlays can follow what is audible without polling the player.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let event_bus = EventBus::new();
//! let (rx, _id) = event_bus.subscribe();
//!
//! let mut player = MusicPlayer::new(channels, &config).with_events(event_bus.clone());
//!
//! while let Ok(event) = rx.try_recv() {
//!     match event {
//!         MusicEvent::ClipStarted { clip, .. } => { /* show track name */ }
//!         _ => {}
//!     }
//! }
//! ```

pub mod bus;
pub mod events;

// Re-export commonly used types
pub use bus::{EventBus, SubscriberId};
pub use events::MusicEvent;
