//! Cue orchestrator
//!
//! **Module Structure:**
//! - `core.rs`: actor loop, trigger/stop contract, fade-out, teardown and settle
//! - `sequencing.rs`: per-route steps (speech, voice, music start, crossfade ramp,
//!   streaming connect with retry)
//! - `scheduler.rs`: epoch-tagged continuations for timers and async work
//! - `handle.rs`: cloneable client handle
//!
//! One task owns all playback state. Operator commands and scheduled
//! continuations arrive on the same channel and are processed strictly in
//! order, so a stop issued after a trigger is always observed after it.
//! Teardown bumps the epoch, which turns every continuation the old session
//! scheduled into a no-op.

mod core;
mod handle;
mod scheduler;
mod sequencing;

pub use handle::OrchestratorHandle;

use crate::backend::BackendSet;
use crate::config::PlaybackTuning;
use crate::error::Result;
use crate::speech::{SpeechError, SpeechOutcome, SpeechRouter, VoiceOutput};
use crate::store::CueStore;
use super::volume::{RampId, VolumeControl};
use self::core::Orchestrator;
use cuedeck_common::events::EventBus;
use cuedeck_common::snapshot::PlaybackPhase;
use cuedeck_common::SoundCue;
use self::scheduler::Scheduler;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

/// External collaborators, constructed once at startup
pub struct Collaborators {
    pub store: Arc<dyn CueStore>,
    pub backends: BackendSet,
    pub speech: SpeechRouter,
    pub voice: Arc<dyn VoiceOutput>,
    pub volume: Arc<dyn VolumeControl>,
    pub events: EventBus,
}

/// What a trigger did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum TriggerOutcome {
    /// A new session started immediately
    Started,
    /// Parked until the current fade-out completes
    Queued { replaced: Option<Uuid> },
}

/// What a stop did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopOutcome {
    /// Nothing was playing
    Idle,
    /// A fade-out is running; the session ends when it completes
    Fading,
    /// Torn down immediately
    Stopped,
}

/// Point-in-time view of orchestrator internals
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostics {
    pub epoch: u64,
    pub phase: PlaybackPhase,
    pub active_cue_id: Option<Uuid>,
    pub pending_cue_id: Option<Uuid>,
    pub ramp_active: bool,
    pub output_level: f32,
    pub baseline: Option<f32>,
    pub scheduled_tasks: usize,
}

pub(crate) enum Command {
    Trigger {
        cue: SoundCue,
        preview: bool,
        reply: oneshot::Sender<Result<TriggerOutcome>>,
    },
    Stop {
        reply: oneshot::Sender<StopOutcome>,
    },
    DismissNotice {
        reply: oneshot::Sender<()>,
    },
    Diagnostics {
        reply: oneshot::Sender<Diagnostics>,
    },
    Resume(Continuation),
}

/// A scheduled step, valid only while its epoch is current
pub(crate) struct Continuation {
    pub epoch: u64,
    pub step: Step,
}

#[derive(Debug)]
pub(crate) enum Step {
    PreDelayElapsed,
    SpeechReady(std::result::Result<SpeechOutcome, SpeechError>),
    VoiceFinished(Result<()>),
    PostDelayElapsed,
    MusicStartDue,
    BackendConnected(Result<()>),
    ConnectRetryDue,
    RampFrame { ramp_id: RampId },
    FadeStep { ramp_id: RampId, step: u32 },
    SettleElapsed,
}

/// Start the orchestrator task
pub fn spawn(collaborators: Collaborators, tuning: PlaybackTuning) -> OrchestratorHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let events = collaborators.events.clone();
    let actor = Orchestrator::new(collaborators, tuning, Scheduler::new(tx.downgrade()));
    let snapshots = actor.subscribe();
    tokio::spawn(actor.run(rx));
    OrchestratorHandle::new(tx, snapshots, events)
}
