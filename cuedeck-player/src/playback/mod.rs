//! Cue playback: orchestration, sessions, volume automation and timeline

pub mod orchestrator;
pub mod session;
pub mod timeline;
pub mod volume;

pub use orchestrator::{
    spawn, Collaborators, Diagnostics, OrchestratorHandle, StopOutcome, TriggerOutcome,
};
pub use session::{route_for, CrossfadePlan, PlaybackSession};
pub use volume::{SharedVolume, VolumeAutomation, VolumeControl};
