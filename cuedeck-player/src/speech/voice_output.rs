//! Voice channel
//!
//! Announcements play on their own channel, independent of the music
//! backends and of the process-wide volume automation.

use super::Utterance;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::debug;

#[async_trait]
pub trait VoiceOutput: Send + Sync {
    /// Speak an utterance; resolves when speech ends or is stopped
    async fn play(&self, utterance: &Utterance) -> Result<()>;

    /// Cut off any utterance in progress
    async fn stop(&self);
}

/// Clock-driven voice channel
///
/// Rendered audio lasts its reported duration. Live speech lasts the
/// configured live duration, or an estimate from the word count.
pub struct SimulatedVoiceOutput {
    live_duration: Option<Duration>,
    fail_playback: bool,
    speaking: AtomicBool,
    stopped: Notify,
    spoken: Mutex<Vec<String>>,
}

impl Default for SimulatedVoiceOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedVoiceOutput {
    pub fn new() -> Self {
        Self {
            live_duration: None,
            fail_playback: false,
            speaking: AtomicBool::new(false),
            stopped: Notify::new(),
            spoken: Mutex::new(Vec::new()),
        }
    }

    pub fn with_live_duration(mut self, duration: Duration) -> Self {
        self.live_duration = Some(duration);
        self
    }

    /// Every `play` fails immediately
    pub fn failing(mut self) -> Self {
        self.fail_playback = true;
        self
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst)
    }

    /// Text (live) or file path (rendered) of every utterance started
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn length_of(&self, utterance: &Utterance) -> Duration {
        match utterance {
            Utterance::Rendered { duration, .. } => {
                Duration::try_from_secs_f64(duration.max(0.0)).unwrap_or(Duration::ZERO)
            }
            Utterance::Live { text, voice } => self.live_duration.unwrap_or_else(|| {
                // Roughly 2.5 words per second at the middle rate
                let words = text.split_whitespace().count().max(1) as f64;
                let rate = 0.5 + f64::from(voice.rate);
                Duration::try_from_secs_f64((words / (2.5 * rate)).max(1.0)).unwrap_or(Duration::from_secs(1))
            }),
        }
    }
}

#[async_trait]
impl VoiceOutput for SimulatedVoiceOutput {
    async fn play(&self, utterance: &Utterance) -> Result<()> {
        let label = match utterance {
            Utterance::Rendered { path, .. } => path.to_string_lossy().into_owned(),
            Utterance::Live { text, .. } => text.clone(),
        };
        self.spoken
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(label.clone());

        if self.fail_playback {
            return Err(Error::DecodeError(format!("cannot play '{}'", label)));
        }

        let length = self.length_of(utterance);
        debug!("Speaking '{}' for {:?}", label, length);
        self.speaking.store(true, Ordering::SeqCst);
        tokio::select! {
            _ = tokio::time::sleep(length) => {}
            _ = self.stopped.notified() => {
                debug!("Speech interrupted");
            }
        }
        self.speaking.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) {
        self.stopped.notify_waiters();
        self.speaking.store(false, Ordering::SeqCst);
    }
}
