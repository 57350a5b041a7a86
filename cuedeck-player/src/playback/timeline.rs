//! Timeline sampling and snapshot publication
//!
//! The orchestrator samples the active backend at a fixed interval, folds the
//! result into a [`StateSnapshot`] and hands it to [`SnapshotPublisher`],
//! which forwards it only when a field actually changed.

use super::session::PlaybackSession;
use cuedeck_common::events::{CueEvent, EventBus};
use cuedeck_common::snapshot::PlaybackPhase;
use cuedeck_common::StateSnapshot;
use tokio::sync::watch;

/// Position this close to the duration counts as the natural end
const END_TOLERANCE_SECONDS: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TimelineSample {
    pub elapsed_seconds: f64,
    pub duration_seconds: f64,
}

impl TimelineSample {
    pub fn reached_end(&self) -> bool {
        self.duration_seconds > 0.0
            && self.elapsed_seconds >= self.duration_seconds - END_TOLERANCE_SECONDS
    }
}

/// Read the session's music position, zero until the music has started
pub fn sample(session: &PlaybackSession) -> TimelineSample {
    match (&session.backend, session.music_started) {
        (Some(backend), true) => TimelineSample {
            elapsed_seconds: backend.position(),
            duration_seconds: backend.duration(),
        },
        _ => TimelineSample::default(),
    }
}

/// Build the published snapshot for the current state
pub fn compose(session: Option<&PlaybackSession>, notice: Option<String>) -> StateSnapshot {
    let Some(session) = session else {
        return StateSnapshot::idle_with_notice(notice);
    };
    let timeline = sample(session);

    StateSnapshot {
        is_playing: session.music_started || session.speaking,
        active_cue_id: Some(session.cue.id),
        elapsed_seconds: timeline.elapsed_seconds,
        duration_seconds: timeline.duration_seconds,
        title: Some(session.cue.name.clone()),
        artwork_ref: session.cue.artwork_ref.clone(),
        is_previewing: session.is_preview,
        is_loading: session.loading,
        is_fading_out: session.phase == PlaybackPhase::FadingOut,
        is_speaking: session.speaking,
        phase: session.phase,
        notice,
    }
}

/// Single-writer snapshot channel
pub struct SnapshotPublisher {
    tx: watch::Sender<StateSnapshot>,
    events: EventBus,
}

impl SnapshotPublisher {
    pub fn new(events: EventBus) -> Self {
        let (tx, _rx) = watch::channel(StateSnapshot::default());
        Self { tx, events }
    }

    pub fn subscribe(&self) -> watch::Receiver<StateSnapshot> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> StateSnapshot {
        self.tx.borrow().clone()
    }

    /// Publish `snapshot` if it differs from the last one; returns whether it did
    pub fn publish(&self, snapshot: StateSnapshot) -> bool {
        let mut forwarded = None;
        let changed = self.tx.send_if_modified(|current| {
            if *current == snapshot {
                return false;
            }
            *current = snapshot.clone();
            forwarded = Some(snapshot.clone());
            true
        });
        if let Some(snapshot) = forwarded {
            self.events.emit_lossy(CueEvent::SnapshotUpdated {
                snapshot,
                timestamp: chrono::Utc::now(),
            });
        }
        changed
    }
}
