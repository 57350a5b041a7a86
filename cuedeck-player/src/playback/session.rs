//! Active playback session
//!
//! One record per triggered cue, owned by the orchestrator. Everything the
//! session scheduled (timers, speech generation, ramp tickers) is tracked
//! here so teardown can cancel it in one place.

use crate::backend::Backend;
use crate::config::PlaybackTuning;
use cuedeck_common::events::CueRoute;
use cuedeck_common::snapshot::PlaybackPhase;
use cuedeck_common::SoundCue;
use std::time::Duration;
use tokio::task::AbortHandle;
use tracing::warn;

/// Decide how a cue is sequenced
///
/// Voice-only wins over the announcement flag when a record carries both.
pub fn route_for(cue: &SoundCue) -> CueRoute {
    match cue.speakable_voice() {
        None => CueRoute::MusicOnly,
        Some(_) if cue.is_voice_only => CueRoute::VoiceOnly,
        Some(_) if cue.is_lineup_announcement => CueRoute::Crossfade,
        Some(_) => CueRoute::Sequential,
    }
}

/// Music timing under an announcement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrossfadePlan {
    /// Voice time before the music starts
    pub music_delay: Duration,
    /// Smooth ramp length from ducked level to baseline
    pub fade_in: Duration,
}

/// Duration for a seconds value read from a cue or an utterance
///
/// Values `Duration` cannot hold (negative, NaN, infinite, overflowing)
/// become zero.
pub(crate) fn duration_from_secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or_else(|e| {
        warn!("Ignoring out-of-range duration {}: {}", value, e);
        Duration::ZERO
    })
}

impl CrossfadePlan {
    /// Plan for an utterance of known length, or the live-speech defaults
    pub fn for_voice(voice_seconds: Option<f64>, tuning: &PlaybackTuning) -> Self {
        match voice_seconds {
            Some(d) if d.is_finite() && d > 0.0 => {
                let delay = (d * 0.25).min(1.0);
                let fade_in = (d - delay).max(2.0);
                Self {
                    music_delay: duration_from_secs(delay),
                    fade_in: duration_from_secs(fade_in),
                }
            }
            _ => Self {
                music_delay: tuning.live_speech_music_delay(),
                fade_in: Duration::from_secs(2),
            },
        }
    }
}

pub struct PlaybackSession {
    /// Cue with any group voice already merged in
    pub cue: SoundCue,
    pub route: CueRoute,
    pub phase: PlaybackPhase,
    pub is_preview: bool,
    /// Backend chosen when the music phase begins
    pub backend: Option<Backend>,
    pub music_started: bool,
    pub speaking: bool,
    pub loading: bool,
    pub connect_attempts: u32,
    pub crossfade: Option<CrossfadePlan>,
    /// Ticker driving the active volume ramp
    pub ramp_ticker: Option<AbortHandle>,
    tasks: Vec<AbortHandle>,
}

impl PlaybackSession {
    pub fn new(cue: SoundCue, route: CueRoute, is_preview: bool) -> Self {
        Self {
            cue,
            route,
            phase: PlaybackPhase::Preparing,
            is_preview,
            backend: None,
            music_started: false,
            speaking: false,
            loading: true,
            connect_attempts: 0,
            crossfade: None,
            ramp_ticker: None,
            tasks: Vec::new(),
        }
    }

    /// Music is audible, so stopping or superseding may fade
    pub fn can_fade(&self) -> bool {
        self.music_started && self.cue.fade_out_duration().is_some()
    }

    pub fn track(&mut self, handle: AbortHandle) {
        self.tasks.retain(|t| !t.is_finished());
        self.tasks.push(handle);
    }

    pub fn set_ramp_ticker(&mut self, handle: AbortHandle) {
        if let Some(old) = self.ramp_ticker.replace(handle) {
            old.abort();
        }
    }

    pub fn stop_ramp_ticker(&mut self) {
        if let Some(ticker) = self.ramp_ticker.take() {
            ticker.abort();
        }
    }

    /// Cancel everything this session scheduled
    pub fn abort_all(&mut self) {
        self.stop_ramp_ticker();
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }

    pub fn pending_tasks(&self) -> usize {
        self.tasks.iter().filter(|t| !t.is_finished()).count()
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.abort_all();
    }
}
