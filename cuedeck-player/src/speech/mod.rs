//! Speech synthesis
//!
//! - [`CloudSpeechProvider`]: disk-cached cloud synthesis under a monthly quota
//! - [`OnDeviceSpeech`]: live on-device speech, always available
//! - [`SpeechRouter`]: cloud first for cloud voices, on-device fallback for
//!   that utterance only
//! - [`VoiceOutput`]: the independent voice channel that speaks an utterance

mod cache;
mod cloud;
mod http_client;
mod on_device;
mod quota;
mod voice_output;

pub use cache::{CacheMetadata, SpeechCache};
pub use cloud::{CloudSpeechClient, CloudSpeechProvider, SynthesizedAudio};
pub use http_client::HttpSpeechClient;
pub use on_device::OnDeviceSpeech;
pub use quota::{GenerationQuota, QuotaStatus};
pub use voice_output::{SimulatedVoiceOutput, VoiceOutput};

use async_trait::async_trait;
use cuedeck_common::{VoiceOverSpec, VoiceType};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Speech generation failures
#[derive(Error, Debug)]
pub enum SpeechError {
    #[error("network error: {0}")]
    NetworkError(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("decode error: {0}")]
    DecodeError(String),

    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Speakable audio handle
#[derive(Debug, Clone, PartialEq)]
pub enum Utterance {
    /// Rendered audio on disk with a known duration
    Rendered { path: PathBuf, duration: f64 },
    /// Spoken live by the on-device engine; duration unknown ahead of time
    Live { text: String, voice: VoiceOverSpec },
}

impl Utterance {
    /// Duration when known before playback
    pub fn duration(&self) -> Option<f64> {
        match self {
            Utterance::Rendered { duration, .. } => Some(*duration),
            Utterance::Live { .. } => None,
        }
    }
}

#[async_trait]
pub trait SpeechProvider: Send + Sync {
    async fn generate(&self, text: &str, voice: &VoiceOverSpec) -> Result<Utterance, SpeechError>;
}

/// Router result: the utterance, plus the cloud error when on-device speech
/// stood in for it
#[derive(Debug)]
pub struct SpeechOutcome {
    pub utterance: Utterance,
    pub fallback_from: Option<SpeechError>,
}

/// Picks the provider for a voice and falls back to on-device speech
#[derive(Clone)]
pub struct SpeechRouter {
    cloud: Option<Arc<dyn SpeechProvider>>,
    on_device: Arc<dyn SpeechProvider>,
}

impl SpeechRouter {
    pub fn new(cloud: Option<Arc<dyn SpeechProvider>>, on_device: Arc<dyn SpeechProvider>) -> Self {
        Self { cloud, on_device }
    }

    pub async fn generate(&self, text: &str, voice: &VoiceOverSpec) -> Result<SpeechOutcome, SpeechError> {
        let cloud = match (voice.voice_type, &self.cloud) {
            (VoiceType::Cloud, Some(cloud)) => cloud,
            (VoiceType::Cloud, None) => {
                let err = SpeechError::ProviderUnavailable("no cloud speech provider configured".to_string());
                return self.fall_back(text, voice, err).await;
            }
            (VoiceType::OnDevice, _) => {
                let utterance = self.on_device.generate(text, voice).await?;
                return Ok(SpeechOutcome {
                    utterance,
                    fallback_from: None,
                });
            }
        };

        match cloud.generate(text, voice).await {
            Ok(utterance) => {
                debug!("Cloud speech ready for voice {}", voice.voice_id);
                Ok(SpeechOutcome {
                    utterance,
                    fallback_from: None,
                })
            }
            Err(e) => self.fall_back(text, voice, e).await,
        }
    }

    async fn fall_back(
        &self,
        text: &str,
        voice: &VoiceOverSpec,
        cause: SpeechError,
    ) -> Result<SpeechOutcome, SpeechError> {
        warn!("Cloud speech failed ({}), using on-device voice", cause);
        let on_device_voice = VoiceOverSpec {
            voice_type: VoiceType::OnDevice,
            ..voice.clone()
        };
        let utterance = self.on_device.generate(text, &on_device_voice).await?;
        Ok(SpeechOutcome {
            utterance,
            fallback_from: Some(cause),
        })
    }
}
