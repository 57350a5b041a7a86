//! Route sequencing
//!
//! Voice routes wait the pre-delay, generate speech, then play it on the
//! voice channel. Sequential cues start the track after the voice finishes
//! (plus the post-delay); lineup announcements start it ducked partway
//! through the voice and ramp it up to the baseline.

use super::core::Orchestrator;
use super::Step;
use crate::error::Result;
use crate::playback::session::{duration_from_secs, CrossfadePlan};
use crate::playback::volume::RampId;
use crate::speech::{SpeechError, SpeechOutcome, Utterance};
use cuedeck_common::events::{CueEvent, CueRoute, FinishReason};
use cuedeck_common::snapshot::{AnnouncementStage, PlaybackPhase, SequentialStage};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Connect attempts before the streaming backend is reported unavailable
const MAX_CONNECT_ATTEMPTS: u32 = 2;

impl Orchestrator {
    pub(super) fn begin_voice_route(&mut self) {
        let epoch = self.epoch;
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let pre_delay = session
            .cue
            .speakable_voice()
            .map_or(0.0, |v| v.pre_delay_seconds);

        if pre_delay > 0.0 {
            debug!("Waiting {:.2}s pre-delay", pre_delay);
            let timer = self
                .scheduler
                .after(epoch, duration_from_secs(pre_delay), Step::PreDelayElapsed);
            session.track(timer);
        } else {
            self.begin_speech();
        }
    }

    pub(super) fn begin_speech(&mut self) {
        let epoch = self.epoch;
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some(voice) = session.cue.speakable_voice().cloned() else {
            return;
        };
        let phase = match session.route {
            CueRoute::VoiceOnly => PlaybackPhase::PlayingVoiceOnly,
            CueRoute::Sequential => PlaybackPhase::SequentialVoiceThenMusic(SequentialStage::Speaking),
            CueRoute::Crossfade => PlaybackPhase::AnnouncementCrossfade(AnnouncementStage::VoicePlaying),
            CueRoute::MusicOnly => return,
        };

        let router = self.speech.clone();
        let task = self.scheduler.spawn(epoch, async move {
            Step::SpeechReady(router.generate(&voice.text, &voice).await)
        });
        session.track(task);
        self.set_phase(phase);
    }

    pub(super) async fn on_speech_ready(&mut self, result: std::result::Result<SpeechOutcome, SpeechError>) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let cue_id = session.cue.id;
        let route = session.route;

        match result {
            Ok(outcome) => {
                if let Some(cause) = outcome.fallback_from {
                    warn!("Cloud voice unavailable for '{}', speaking on-device: {}", session.cue.name, cause);
                    self.events.emit_lossy(CueEvent::SpeechFallback {
                        cue_id: Some(cue_id),
                        error: cause.to_string(),
                        timestamp: chrono::Utc::now(),
                    });
                }
                self.start_voice(outcome.utterance);
            }
            Err(e) => {
                warn!("No voice available for '{}': {}", session.cue.name, e);
                if route == CueRoute::VoiceOnly {
                    self.teardown(FinishReason::Failed).await;
                } else {
                    self.begin_music().await;
                }
            }
        }
    }

    fn start_voice(&mut self, utterance: Utterance) {
        let epoch = self.epoch;
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.speaking = true;
        session.loading = false;

        if session.route == CueRoute::Crossfade {
            let plan = CrossfadePlan::for_voice(utterance.duration(), &self.tuning);
            debug!(
                "Crossfade: music in {:?}, fade-in {:?}",
                plan.music_delay, plan.fade_in
            );
            session.crossfade = Some(plan);
            let timer = self.scheduler.after(epoch, plan.music_delay, Step::MusicStartDue);
            session.track(timer);
        }

        let voice = self.voice.clone();
        let task = self.scheduler.spawn(epoch, async move {
            Step::VoiceFinished(voice.play(&utterance).await)
        });
        session.track(task);
        self.publish();
    }

    pub(super) async fn on_voice_finished(&mut self, result: Result<()>) {
        let epoch = self.epoch;
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.speaking = false;
        if let Err(e) = result {
            warn!("Voice playback failed for '{}': {}", session.cue.name, e);
        }

        match session.route {
            CueRoute::VoiceOnly => self.teardown(FinishReason::Completed).await,
            CueRoute::Sequential => {
                let post_delay = session
                    .cue
                    .speakable_voice()
                    .map_or(0.0, |v| v.post_delay_seconds);
                if post_delay > 0.0 {
                    let timer = self.scheduler.after(
                        epoch,
                        duration_from_secs(post_delay),
                        Step::PostDelayElapsed,
                    );
                    session.track(timer);
                    self.set_phase(PlaybackPhase::SequentialVoiceThenMusic(SequentialStage::PostDelay));
                } else {
                    self.begin_music().await;
                }
            }
            CueRoute::Crossfade | CueRoute::MusicOnly => self.publish(),
        }
    }

    /// Select the backend and start the track, connecting first if needed
    pub(super) async fn begin_music(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.music_started || session.backend.is_some() {
            return;
        }
        let has_track = session
            .cue
            .track_ref
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty());
        if !has_track {
            warn!("Cue '{}' has no track to play", session.cue.name);
            self.teardown(FinishReason::Failed).await;
            return;
        }

        let backend = self.backends.select(session.cue.music_source);
        let needs_handshake = backend.needs_handshake();
        session.backend = Some(backend);
        session.loading = true;

        if needs_handshake {
            self.connect();
            self.publish();
        } else {
            self.start_track().await;
        }
    }

    pub(super) fn connect(&mut self) {
        let epoch = self.epoch;
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some(backend) = session.backend.clone() else {
            return;
        };
        session.connect_attempts += 1;
        info!(
            "Connecting {} backend (attempt {}/{})",
            backend.source(),
            session.connect_attempts,
            MAX_CONNECT_ATTEMPTS
        );

        let task = self.scheduler.spawn(epoch, async move {
            Step::BackendConnected(backend.ensure_connected().await)
        });
        session.track(task);
    }

    pub(super) async fn on_backend_connected(&mut self, result: Result<()>) {
        let epoch = self.epoch;
        let Some(session) = self.session.as_mut() else {
            return;
        };

        match result {
            Ok(()) => self.start_track().await,
            Err(e) if session.connect_attempts < MAX_CONNECT_ATTEMPTS => {
                let delay = self.tuning.connect_retry_delay();
                warn!("Streaming connect failed ({}), retrying in {:?}", e, delay);
                let timer = self.scheduler.after(epoch, delay, Step::ConnectRetryDue);
                session.track(timer);
            }
            Err(e) => self.fail(e).await,
        }
    }

    async fn start_track(&mut self) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let (Some(backend), Some(track)) = (session.backend.clone(), session.cue.track_ref.clone()) else {
            return;
        };
        let offset = session.cue.start_offset_seconds;
        let plan = session.crossfade.filter(|_| session.route == CueRoute::Crossfade);

        if let Err(e) = backend.load(&track, offset).await {
            self.fail(e).await;
            return;
        }

        let ramp = plan.map(|plan| {
            let baseline = self.automation.baseline().unwrap_or_else(|| self.automation.level());
            let ducked = baseline * self.tuning.duck_ratio;
            self.automation.start_smooth(ducked, baseline, plan.fade_in)
        });

        if let Err(e) = backend.play().await {
            self.fail(e).await;
            return;
        }

        let epoch = self.epoch;
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.music_started = true;
        session.loading = false;
        info!("Music started for '{}' ({} backend)", session.cue.name, backend.source());

        match ramp {
            Some(ramp_id) => {
                let ticker = self.scheduler.every(
                    epoch,
                    self.tuning.ramp_frame_interval(),
                    None,
                    move |_| Step::RampFrame { ramp_id },
                );
                session.set_ramp_ticker(ticker);
                self.set_phase(PlaybackPhase::AnnouncementCrossfade(
                    AnnouncementStage::DuckedMusicRamping,
                ));
            }
            None => self.set_phase(PlaybackPhase::PlayingMusic),
        }
    }

    pub(super) fn on_ramp_frame(&mut self, ramp_id: RampId) {
        let Some(frame) = self.automation.apply_frame(ramp_id, Instant::now()) else {
            return;
        };
        if !frame.complete {
            return;
        }
        if let Some(session) = self.session.as_mut() {
            session.stop_ramp_ticker();
        }
        self.set_phase(PlaybackPhase::AnnouncementCrossfade(AnnouncementStage::FullVolume));
    }
}
