//! HTTP text-to-speech client
//!
//! `POST {base}/v1/text-to-speech/{voice_id}` with the API key header,
//! returning an MP3 payload. Duration is estimated from the payload size at
//! the service's constant bitrate.

use super::{CloudSpeechClient, SpeechError, SynthesizedAudio};
use async_trait::async_trait;
use cuedeck_common::VoiceOverSpec;
use reqwest::StatusCode;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

/// MP3 bitrate the service renders at
const MP3_BITRATE_BPS: f64 = 128_000.0;

#[derive(Debug, Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
    speed: f32,
}

#[derive(Debug, Serialize)]
struct SynthesisRequest<'a> {
    text: &'a str,
    voice_settings: VoiceSettings,
}

pub struct HttpSpeechClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpSpeechClient {
    pub fn new(base_url: &str, api_key: String) -> Result<Self, SpeechError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .map_err(|e| SpeechError::NetworkError(format!("client setup: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn endpoint(&self, voice_id: &str) -> String {
        format!("{}/v1/text-to-speech/{}", self.base_url, voice_id)
    }
}

/// Rendered duration of a constant-bitrate MP3 payload
pub(crate) fn estimate_duration(bytes: usize) -> f64 {
    bytes as f64 * 8.0 / MP3_BITRATE_BPS
}

/// Map a non-success response to the speech error taxonomy
pub(crate) fn classify_failure(status: StatusCode, body: &str) -> SpeechError {
    let lowered = body.to_lowercase();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN if lowered.contains("quota") => {
            SpeechError::QuotaExceeded(format!("service reported: {}", body.trim()))
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            SpeechError::InvalidCredential(format!("HTTP {}", status.as_u16()))
        }
        StatusCode::PAYMENT_REQUIRED => SpeechError::QuotaExceeded(format!("HTTP {}", status.as_u16())),
        StatusCode::TOO_MANY_REQUESTS => SpeechError::RateLimited(format!("HTTP {}", status.as_u16())),
        s if s.is_server_error() => {
            SpeechError::ProviderUnavailable(format!("HTTP {}", status.as_u16()))
        }
        _ => SpeechError::NetworkError(format!("HTTP {}: {}", status.as_u16(), body.trim())),
    }
}

#[async_trait]
impl CloudSpeechClient for HttpSpeechClient {
    async fn synthesize(&self, text: &str, voice: &VoiceOverSpec) -> Result<SynthesizedAudio, SpeechError> {
        if self.api_key.is_empty() {
            return Err(SpeechError::InvalidCredential("no API key configured".to_string()));
        }

        let request = SynthesisRequest {
            text,
            voice_settings: VoiceSettings {
                stability: 0.5,
                similarity_boost: voice.pitch,
                // Normalized rate 0-1 maps onto the service's 0.7-1.2 speed range
                speed: 0.7 + voice.rate * 0.5,
            },
        };

        let response = self
            .client
            .post(self.endpoint(&voice.voice_id))
            .header("xi-api-key", &self.api_key)
            .header("accept", "audio/mpeg")
            .json(&request)
            .send()
            .await
            .map_err(|e| SpeechError::NetworkError(e.to_string()))?;

        let status = response.status();
        debug!(status_code = status.as_u16(), "Speech synthesis response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = classify_failure(status, &body);
            warn!("Speech synthesis failed: {}", err);
            return Err(err);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SpeechError::NetworkError(e.to_string()))?;
        if bytes.is_empty() {
            return Err(SpeechError::DecodeError("empty audio payload".to_string()));
        }

        Ok(SynthesizedAudio {
            duration_seconds: estimate_duration(bytes.len()),
            bytes: bytes.to_vec(),
        })
    }
}
