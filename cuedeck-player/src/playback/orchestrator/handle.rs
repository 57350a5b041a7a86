//! Client handle to the orchestrator task

use super::{Command, Diagnostics, StopOutcome, TriggerOutcome};
use crate::error::{Error, Result};
use cuedeck_common::events::EventBus;
use cuedeck_common::{SoundCue, StateSnapshot};
use tokio::sync::{mpsc, oneshot, watch};

/// Cloneable handle; the orchestrator shuts down when the last one drops
#[derive(Clone)]
pub struct OrchestratorHandle {
    tx: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<StateSnapshot>,
    events: EventBus,
}

impl OrchestratorHandle {
    pub(super) fn new(
        tx: mpsc::UnboundedSender<Command>,
        snapshots: watch::Receiver<StateSnapshot>,
        events: EventBus,
    ) -> Self {
        Self {
            tx,
            snapshots,
            events,
        }
    }

    /// Play a cue along its route, fading out the current one if it asks for it
    pub async fn trigger(&self, cue: SoundCue) -> Result<TriggerOutcome> {
        self.request(|reply| Command::Trigger {
            cue,
            preview: false,
            reply,
        })
        .await?
    }

    /// Audition a cue's track without its voice-over
    pub async fn preview(&self, cue: SoundCue) -> Result<TriggerOutcome> {
        self.request(|reply| Command::Trigger {
            cue,
            preview: true,
            reply,
        })
        .await?
    }

    pub async fn stop(&self) -> Result<StopOutcome> {
        self.request(|reply| Command::Stop { reply }).await
    }

    pub async fn dismiss_notice(&self) -> Result<()> {
        self.request(|reply| Command::DismissNotice { reply }).await
    }

    pub async fn diagnostics(&self) -> Result<Diagnostics> {
        self.request(|reply| Command::Diagnostics { reply }).await
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> StateSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver notified on every snapshot change
    pub fn watch(&self) -> watch::Receiver<StateSnapshot> {
        self.snapshots.clone()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .map_err(|_| Error::InvalidState("orchestrator is not running".to_string()))?;
        rx.await
            .map_err(|_| Error::InvalidState("orchestrator dropped the request".to_string()))
    }
}
