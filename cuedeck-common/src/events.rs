//! Event types for the CueDeck event system
//!
//! Provides the shared event definitions and the EventBus the player uses to
//! notify SSE clients and tests of orchestrator activity.

use crate::snapshot::{PlaybackPhase, StateSnapshot};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// How a cue is sequenced, decided once when its session starts
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CueRoute {
    /// No voice-over: play the track directly
    MusicOnly,
    /// Speak, no track
    VoiceOnly,
    /// Speak, wait the post-delay, then play the track
    Sequential,
    /// Speak over ducked music that ramps up to the baseline
    Crossfade,
}

impl std::fmt::Display for CueRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CueRoute::MusicOnly => write!(f, "MusicOnly"),
            CueRoute::VoiceOnly => write!(f, "VoiceOnly"),
            CueRoute::Sequential => write!(f, "Sequential"),
            CueRoute::Crossfade => write!(f, "Crossfade"),
        }
    }
}

/// Why a session ended
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Track or voice-only announcement reached its end
    Completed,
    /// Operator stop without fade
    Stopped,
    /// Fade-out ran to its final step
    FadedOut,
    /// Replaced by a newly triggered cue
    Superseded,
    /// Track lookup, connect or speech failure
    Failed,
}

/// CueDeck event types
///
/// Broadcast via EventBus and serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CueEvent {
    /// A new session started for a cue
    CueStarted {
        cue_id: Uuid,
        name: String,
        route: CueRoute,
        is_preview: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A cue was parked to play after the current fade-out
    CueQueued {
        cue_id: Uuid,
        /// Previously queued cue dropped by this one (last write wins)
        replaced: Option<Uuid>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Orchestrator phase transition
    PhaseChanged {
        old_phase: PlaybackPhase,
        new_phase: PlaybackPhase,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Step fade started on the active cue
    FadeOutStarted {
        cue_id: Uuid,
        duration_seconds: f64,
        steps: u32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Session ended
    CueFinished {
        cue_id: Uuid,
        reason: FinishReason,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Cloud synthesis failed and the on-device voice was used instead
    SpeechFallback {
        cue_id: Option<Uuid>,
        error: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Dismissible operator notice raised (e.g. streaming unavailable)
    Notice {
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Published state snapshot changed
    SnapshotUpdated {
        snapshot: StateSnapshot,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl CueEvent {
    /// Get event type as string for filtering and SSE event names
    pub fn event_type(&self) -> &str {
        match self {
            CueEvent::CueStarted { .. } => "CueStarted",
            CueEvent::CueQueued { .. } => "CueQueued",
            CueEvent::PhaseChanged { .. } => "PhaseChanged",
            CueEvent::FadeOutStarted { .. } => "FadeOutStarted",
            CueEvent::CueFinished { .. } => "CueFinished",
            CueEvent::SpeechFallback { .. } => "SpeechFallback",
            CueEvent::Notice { .. } => "Notice",
            CueEvent::SnapshotUpdated { .. } => "SnapshotUpdated",
        }
    }
}

/// Central event distribution bus
///
/// Wraps `tokio::broadcast`: publishing never blocks, slow subscribers see
/// `Lagged` instead of stalling the orchestrator.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<CueEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus buffering `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<CueEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: CueEvent) -> Result<usize, broadcast::error::SendError<CueEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: CueEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
