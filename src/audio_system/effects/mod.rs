//! Volume and fade building blocks used by the crossfade engine.

pub mod fade;
pub mod volume;

pub use fade::FadeEffect;
pub use volume::VolumeEffect;
