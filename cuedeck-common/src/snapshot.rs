//! Playback state snapshot published to UI clients
//!
//! Supporting types for the orchestrator's phase machine.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sub-phase of a voice-then-music cue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequentialStage {
    /// Announcement is being spoken
    Speaking,
    /// Waiting the post-delay before music starts
    PostDelay,
}

/// Sub-phase of a lineup announcement (voice over ducked music)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnouncementStage {
    /// Voice playing, music not started yet
    VoicePlaying,
    /// Music started ducked and is ramping toward the baseline
    DuckedMusicRamping,
    /// Ramp finished, music at baseline
    FullVolume,
}

/// Orchestrator phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", tag = "phase", content = "stage")]
pub enum PlaybackPhase {
    #[default]
    Idle,
    Preparing,
    PlayingVoiceOnly,
    PlayingMusic,
    SequentialVoiceThenMusic(SequentialStage),
    AnnouncementCrossfade(AnnouncementStage),
    FadingOut,
}

impl PlaybackPhase {
    pub fn is_idle(&self) -> bool {
        matches!(self, PlaybackPhase::Idle)
    }
}

impl std::fmt::Display for PlaybackPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackPhase::Idle => write!(f, "Idle"),
            PlaybackPhase::Preparing => write!(f, "Preparing"),
            PlaybackPhase::PlayingVoiceOnly => write!(f, "PlayingVoiceOnly"),
            PlaybackPhase::PlayingMusic => write!(f, "PlayingMusic"),
            PlaybackPhase::SequentialVoiceThenMusic(stage) => {
                write!(f, "SequentialVoiceThenMusic({:?})", stage)
            }
            PlaybackPhase::AnnouncementCrossfade(stage) => {
                write!(f, "AnnouncementCrossfade({:?})", stage)
            }
            PlaybackPhase::FadingOut => write!(f, "FadingOut"),
        }
    }
}

/// State snapshot for UI clients
///
/// Republished on every phase transition and at the timeline interval while
/// a cue is active. Consumers receive it only when a field changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StateSnapshot {
    pub is_playing: bool,
    pub active_cue_id: Option<Uuid>,
    pub elapsed_seconds: f64,
    pub duration_seconds: f64,
    pub title: Option<String>,
    pub artwork_ref: Option<String>,
    pub is_previewing: bool,
    pub is_loading: bool,
    pub is_fading_out: bool,
    pub is_speaking: bool,
    pub phase: PlaybackPhase,
    /// Dismissible operator notice (e.g. streaming service unavailable)
    pub notice: Option<String>,
}

impl StateSnapshot {
    /// Idle snapshot carrying over an existing notice
    pub fn idle_with_notice(notice: Option<String>) -> Self {
        Self {
            notice,
            ..Default::default()
        }
    }
}
