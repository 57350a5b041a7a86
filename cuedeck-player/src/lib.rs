//! # CueDeck Player Library (cuedeck-player)
//!
//! Cue playback orchestration for live events.
//!
//! **Purpose:** Turn an operator's "play this cue" into a correctly sequenced
//! mix of spoken announcement and music, with fade-out, volume ducking and
//! cancellation, on top of two music backends and two speech engines.
//!
//! **Architecture:** a single orchestrator task owns all playback state;
//! backends, speech and volume sit behind narrow traits; an axum API and an
//! SSE stream expose control and state.

pub mod api;
pub mod backend;
pub mod config;
pub mod error;
pub mod playback;
pub mod speech;
pub mod store;

pub use error::{Error, Result};
