//! Orchestrator actor - lifecycle and the trigger/stop contract
//!
//! **Responsibilities:**
//! - Actor loop: commands, continuations and the timeline tick
//! - trigger / preview / stop, including the pending-cue handoff
//! - Fade-out, teardown and the post-teardown settle window
//! - Snapshot publication

use super::scheduler::Scheduler;
use super::{Collaborators, Command, Continuation, Diagnostics, Step, StopOutcome, TriggerOutcome};
use crate::backend::BackendSet;
use crate::config::PlaybackTuning;
use crate::error::{Error, Result};
use crate::playback::session::{duration_from_secs, route_for, PlaybackSession};
use crate::playback::timeline::{self, SnapshotPublisher};
use crate::playback::volume::{RampId, VolumeAutomation};
use crate::speech::{SpeechRouter, VoiceOutput};
use crate::store::CueStore;
use cuedeck_common::events::{CueEvent, CueRoute, EventBus, FinishReason};
use cuedeck_common::snapshot::PlaybackPhase;
use cuedeck_common::{SoundCue, StateSnapshot};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::AbortHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Cue waiting for the active fade-out to finish
struct PendingCue {
    cue: SoundCue,
    preview: bool,
}

pub(super) struct Orchestrator {
    pub(super) store: Arc<dyn CueStore>,
    pub(super) backends: BackendSet,
    pub(super) speech: SpeechRouter,
    pub(super) voice: Arc<dyn VoiceOutput>,
    pub(super) automation: VolumeAutomation,
    pub(super) events: EventBus,
    pub(super) tuning: PlaybackTuning,
    pub(super) scheduler: Scheduler,
    publisher: SnapshotPublisher,

    pub(super) session: Option<PlaybackSession>,
    pending: Option<PendingCue>,
    notice: Option<String>,
    /// Bumped on every teardown and session start
    pub(super) epoch: u64,
    settle: Option<AbortHandle>,
}

impl Orchestrator {
    pub(super) fn new(collaborators: Collaborators, tuning: PlaybackTuning, scheduler: Scheduler) -> Self {
        let Collaborators {
            store,
            backends,
            speech,
            voice,
            volume,
            events,
        } = collaborators;

        Self {
            store,
            backends,
            speech,
            voice,
            automation: VolumeAutomation::new(volume),
            publisher: SnapshotPublisher::new(events.clone()),
            events,
            tuning,
            scheduler,
            session: None,
            pending: None,
            notice: None,
            epoch: 0,
            settle: None,
        }
    }

    pub(super) fn subscribe(&self) -> watch::Receiver<StateSnapshot> {
        self.publisher.subscribe()
    }

    pub(super) async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        info!("Cue orchestrator started");

        let mut ticker = interval(self.tuning.timeline_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                command = rx.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => break,
                },
                _ = ticker.tick() => self.on_timeline_tick().await,
            }
        }

        self.teardown(FinishReason::Stopped).await;
        self.automation.complete_restore();
        info!("Cue orchestrator stopped");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Trigger { cue, preview, reply } => {
                let outcome = self.trigger(cue, preview).await;
                let _ = reply.send(outcome);
            }
            Command::Stop { reply } => {
                let outcome = self.stop().await;
                let _ = reply.send(outcome);
            }
            Command::DismissNotice { reply } => {
                if self.notice.take().is_some() {
                    debug!("Notice dismissed");
                    self.publish();
                }
                let _ = reply.send(());
            }
            Command::Diagnostics { reply } => {
                let _ = reply.send(self.diagnostics());
            }
            Command::Resume(Continuation { epoch, step }) => {
                if epoch != self.epoch {
                    debug!("Dropping {:?} from epoch {} (current {})", step, epoch, self.epoch);
                    return;
                }
                self.resume(step).await;
            }
        }
    }

    async fn resume(&mut self, step: Step) {
        match step {
            Step::PreDelayElapsed => self.begin_speech(),
            Step::SpeechReady(result) => self.on_speech_ready(result).await,
            Step::VoiceFinished(result) => self.on_voice_finished(result).await,
            Step::PostDelayElapsed | Step::MusicStartDue => self.begin_music().await,
            Step::BackendConnected(result) => self.on_backend_connected(result).await,
            Step::ConnectRetryDue => self.connect(),
            Step::RampFrame { ramp_id } => self.on_ramp_frame(ramp_id),
            Step::FadeStep { ramp_id, step } => self.on_fade_step(ramp_id, step).await,
            Step::SettleElapsed => self.on_settle().await,
        }
    }

    // ---- trigger / stop -------------------------------------------------

    async fn trigger(&mut self, cue: SoundCue, preview: bool) -> Result<TriggerOutcome> {
        cue.validate()?;

        match self.session.as_ref() {
            Some(session) if session.phase == PlaybackPhase::FadingOut => {
                return Ok(self.queue(cue, preview));
            }
            Some(session) if session.can_fade() => {
                self.begin_fade_out();
                return Ok(self.queue(cue, preview));
            }
            Some(_) => self.teardown(FinishReason::Superseded).await,
            None => {}
        }

        if let Some(dropped) = self.pending.take() {
            info!("Queued cue '{}' dropped for '{}'", dropped.cue.name, cue.name);
        }
        self.start_session(cue, preview).await;
        Ok(TriggerOutcome::Started)
    }

    /// Park a cue for the end of the fade; the newest request wins
    fn queue(&mut self, cue: SoundCue, preview: bool) -> TriggerOutcome {
        let cue_id = cue.id;
        let name = cue.name.clone();
        let replaced = self
            .pending
            .replace(PendingCue { cue, preview })
            .map(|previous| previous.cue.id);

        match replaced {
            Some(previous) => warn!("Cue '{}' replaces queued cue {} (last request wins)", name, previous),
            None => info!("Cue '{}' queued behind fade-out", name),
        }

        self.events.emit_lossy(CueEvent::CueQueued {
            cue_id,
            replaced,
            timestamp: chrono::Utc::now(),
        });
        TriggerOutcome::Queued { replaced }
    }

    async fn stop(&mut self) -> StopOutcome {
        let Some(session) = self.session.as_ref() else {
            if let Some(dropped) = self.pending.take() {
                info!("Stop cancelled queued cue '{}'", dropped.cue.name);
            }
            return StopOutcome::Idle;
        };

        if session.phase == PlaybackPhase::FadingOut {
            if let Some(dropped) = self.pending.take() {
                info!("Stop cancelled queued cue '{}'", dropped.cue.name);
            }
            return StopOutcome::Fading;
        }

        if session.can_fade() {
            self.begin_fade_out();
            return StopOutcome::Fading;
        }

        self.teardown(FinishReason::Stopped).await;
        StopOutcome::Stopped
    }

    // ---- session lifecycle ----------------------------------------------

    pub(super) async fn start_session(&mut self, cue: SoundCue, preview: bool) {
        self.epoch += 1;
        if let Some(settle) = self.settle.take() {
            settle.abort();
        }

        let cue = self.resolve_group_voice(cue).await;
        let route = if preview { CueRoute::MusicOnly } else { route_for(&cue) };
        let baseline = self.automation.capture_baseline();

        info!(
            "Starting cue '{}' ({}) route={} preview={} baseline={:.2}",
            cue.name, cue.id, route, preview, baseline
        );

        self.events.emit_lossy(CueEvent::CueStarted {
            cue_id: cue.id,
            name: cue.name.clone(),
            route,
            is_preview: preview,
            timestamp: chrono::Utc::now(),
        });
        self.events.emit_lossy(CueEvent::PhaseChanged {
            old_phase: PlaybackPhase::Idle,
            new_phase: PlaybackPhase::Preparing,
            timestamp: chrono::Utc::now(),
        });
        self.session = Some(PlaybackSession::new(cue, route, preview));
        self.publish();

        match route {
            CueRoute::MusicOnly => self.begin_music().await,
            _ => self.begin_voice_route(),
        }
    }

    /// Merge the owning group's voice into the cue's voice-over
    async fn resolve_group_voice(&self, mut cue: SoundCue) -> SoundCue {
        let (Some(group_id), Some(_)) = (cue.group_id, cue.voice_over.as_ref()) else {
            return cue;
        };

        match self.store.voice_for_group(group_id).await {
            Ok(Some(group_voice)) => {
                debug!("Using voice '{}' of group {}", group_voice.voice_id, group_id);
                cue.voice_over = cue.voice_over.map(|v| v.with_group_voice(&group_voice));
            }
            Ok(None) => {}
            Err(e) => warn!(
                "Group voice lookup failed for {}: {}; keeping the cue's own voice",
                group_id, e
            ),
        }
        cue
    }

    pub(super) fn begin_fade_out(&mut self) {
        let epoch = self.epoch;
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some(seconds) = session.cue.fade_out_duration() else {
            return;
        };

        session.stop_ramp_ticker();
        let steps = self.tuning.fade_steps.max(1);
        let duration = duration_from_secs(seconds);
        let ramp_id = self.automation.start_step_fade(steps, duration);
        let ticker = self
            .scheduler
            .every(epoch, duration / steps, Some(steps), move |step| Step::FadeStep { ramp_id, step });
        session.set_ramp_ticker(ticker);

        let cue_id = session.cue.id;
        info!(
            "Fading out '{}' over {:.1}s in {} steps",
            session.cue.name, seconds, steps
        );
        self.events.emit_lossy(CueEvent::FadeOutStarted {
            cue_id,
            duration_seconds: seconds,
            steps,
            timestamp: chrono::Utc::now(),
        });
        self.set_phase(PlaybackPhase::FadingOut);
    }

    async fn on_fade_step(&mut self, ramp_id: RampId, step: u32) {
        match self.automation.apply_step(ramp_id, step) {
            Some(outcome) if outcome.finished => self.teardown(FinishReason::FadedOut).await,
            Some(outcome) => debug!("Fade step {} -> {:.3}", outcome.step, outcome.level),
            None => debug!("Ignoring step {} of inactive fade {}", step, ramp_id),
        }
    }

    /// End the active session and start the settle window
    ///
    /// Every continuation the session scheduled becomes stale. The baseline is
    /// written back once the settle delay elapses, then any queued cue starts.
    pub(super) async fn teardown(&mut self, reason: FinishReason) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        self.epoch += 1;
        session.abort_all();
        self.automation.cancel();

        if reason == FinishReason::FadedOut {
            self.backends.stop_all().await;
        } else if let Some(backend) = session.backend.as_ref() {
            if let Err(e) = backend.stop().await {
                warn!("Failed to stop {} backend: {}", backend.source(), e);
            }
        }
        if session.route != CueRoute::MusicOnly {
            self.voice.stop().await;
        }

        info!("Cue '{}' finished: {:?}", session.cue.name, reason);
        self.events.emit_lossy(CueEvent::PhaseChanged {
            old_phase: session.phase,
            new_phase: PlaybackPhase::Idle,
            timestamp: chrono::Utc::now(),
        });
        self.events.emit_lossy(CueEvent::CueFinished {
            cue_id: session.cue.id,
            reason,
            timestamp: chrono::Utc::now(),
        });
        drop(session);

        self.automation.begin_restore();
        self.settle = Some(
            self.scheduler
                .after(self.epoch, self.tuning.settle_delay(), Step::SettleElapsed),
        );
        self.publish();
    }

    async fn on_settle(&mut self) {
        self.settle = None;
        self.automation.complete_restore();
        if let Some(next) = self.pending.take() {
            debug!("Settle window over, starting queued cue '{}'", next.cue.name);
            self.start_session(next.cue, next.preview).await;
        }
    }

    /// End the session after a failed step
    pub(super) async fn fail(&mut self, err: Error) {
        match &err {
            Error::NotFound(what) => warn!("Track not found: {}", what),
            Error::ProviderUnavailable(_) => {
                error!("Streaming backend unavailable: {}", err);
                self.raise_notice("Streaming service unavailable. Check the connection and try again.");
            }
            _ => error!("Playback failed: {}", err),
        }
        self.teardown(FinishReason::Failed).await;
    }

    pub(super) fn raise_notice(&mut self, message: &str) {
        self.notice = Some(message.to_string());
        self.events.emit_lossy(CueEvent::Notice {
            message: message.to_string(),
            timestamp: chrono::Utc::now(),
        });
        self.publish();
    }

    // ---- state publication ----------------------------------------------

    pub(super) fn set_phase(&mut self, phase: PlaybackPhase) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.phase == phase {
            return;
        }
        let old_phase = std::mem::replace(&mut session.phase, phase);
        debug!("Phase {} -> {}", old_phase, phase);
        self.events.emit_lossy(CueEvent::PhaseChanged {
            old_phase,
            new_phase: phase,
            timestamp: chrono::Utc::now(),
        });
        self.publish();
    }

    pub(super) fn publish(&self) {
        self.publisher
            .publish(timeline::compose(self.session.as_ref(), self.notice.clone()));
    }

    async fn on_timeline_tick(&mut self) {
        let ended = self
            .session
            .as_ref()
            .filter(|s| s.music_started)
            .map(|s| (timeline::sample(s).reached_end(), s.phase));

        match ended {
            Some((true, PlaybackPhase::FadingOut)) => self.teardown(FinishReason::FadedOut).await,
            Some((true, _)) => self.teardown(FinishReason::Completed).await,
            _ => self.publish(),
        }
    }

    fn diagnostics(&self) -> Diagnostics {
        Diagnostics {
            epoch: self.epoch,
            phase: self.session.as_ref().map(|s| s.phase).unwrap_or_default(),
            active_cue_id: self.session.as_ref().map(|s| s.cue.id),
            pending_cue_id: self.pending.as_ref().map(|p| p.cue.id),
            ramp_active: self.automation.active_ramp().is_some(),
            output_level: self.automation.level(),
            baseline: self.automation.baseline(),
            scheduled_tasks: self.session.as_ref().map_or(0, |s| s.pending_tasks()),
        }
    }
}
