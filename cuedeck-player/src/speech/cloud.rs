//! Cloud speech provider
//!
//! Order of operations for `generate`:
//! 1. Cache lookup (a hit never touches the quota or the network)
//! 2. Quota check
//! 3. Network synthesis through the [`CloudSpeechClient`]
//! 4. Quota count, then cache store

use super::{GenerationQuota, SpeechCache, SpeechError, SpeechProvider, Utterance};
use async_trait::async_trait;
use cuedeck_common::VoiceOverSpec;
use std::sync::Arc;
use tracing::{debug, info};

/// Rendered audio returned by a synthesis service
#[derive(Debug, Clone)]
pub struct SynthesizedAudio {
    pub bytes: Vec<u8>,
    pub duration_seconds: f64,
}

/// Network client for a text-to-speech service
#[async_trait]
pub trait CloudSpeechClient: Send + Sync {
    async fn synthesize(&self, text: &str, voice: &VoiceOverSpec) -> Result<SynthesizedAudio, SpeechError>;
}

pub struct CloudSpeechProvider {
    client: Arc<dyn CloudSpeechClient>,
    cache: SpeechCache,
    quota: Arc<GenerationQuota>,
}

impl CloudSpeechProvider {
    pub fn new(client: Arc<dyn CloudSpeechClient>, cache: SpeechCache, quota: Arc<GenerationQuota>) -> Self {
        Self { client, cache, quota }
    }

    pub fn quota(&self) -> Arc<GenerationQuota> {
        self.quota.clone()
    }
}

#[async_trait]
impl SpeechProvider for CloudSpeechProvider {
    async fn generate(&self, text: &str, voice: &VoiceOverSpec) -> Result<Utterance, SpeechError> {
        if let Some(cached) = self.cache.lookup(text, &voice.voice_id).await {
            return Ok(cached);
        }

        self.quota.check().await?;

        debug!("Synthesizing {} chars with voice {}", text.len(), voice.voice_id);
        let audio = self.client.synthesize(text, voice).await?;
        // The provider bills the request once synthesis returns
        let status = self.quota.record().await?;
        info!(
            "Generated speech ({:.2}s), quota {}/{} for {}",
            audio.duration_seconds, status.used, status.limit, status.period
        );
        if audio.bytes.is_empty() {
            return Err(SpeechError::DecodeError("empty audio payload".to_string()));
        }

        let utterance = self
            .cache
            .store(text, &voice.voice_id, &audio.bytes, audio.duration_seconds)
            .await?;

        Ok(utterance)
    }
}
