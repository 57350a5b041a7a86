//! On-device speech
//!
//! The platform engine speaks text directly, so generation only packages the
//! text and voice for the voice channel. Duration is unknown until it finishes.

use super::{SpeechError, SpeechProvider, Utterance};
use async_trait::async_trait;
use cuedeck_common::VoiceOverSpec;

#[derive(Default)]
pub struct OnDeviceSpeech;

impl OnDeviceSpeech {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SpeechProvider for OnDeviceSpeech {
    async fn generate(&self, text: &str, voice: &VoiceOverSpec) -> Result<Utterance, SpeechError> {
        if text.trim().is_empty() {
            return Err(SpeechError::DecodeError("nothing to speak".to_string()));
        }
        Ok(Utterance::Live {
            text: text.to_string(),
            voice: voice.clone().normalized(),
        })
    }
}
