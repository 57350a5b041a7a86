//! # CueDeck Common Library
//!
//! Shared code for the CueDeck workspace including:
//! - Cue data model (SoundCue, VoiceOverSpec)
//! - Event types (CueEvent enum) and the EventBus
//! - The published playback state snapshot
//! - Configuration file resolution
//! - Easing curves used by volume automation

pub mod config;
pub mod cue;
pub mod easing;
pub mod error;
pub mod events;
pub mod snapshot;

pub use cue::{FadeOutSpec, MusicSource, SoundCue, VoiceOverSpec, VoiceType};
pub use easing::Easing;
pub use error::{Error, Result};
pub use snapshot::StateSnapshot;
