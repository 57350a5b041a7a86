//! Cue data model
//!
//! Records owned by the external cue store. The player only reads them.
//!
//! A cue's playback route follows from three fields:
//! - `voice_over` disabled (or empty text): pure music
//! - `is_voice_only`: speak, no track
//! - `is_lineup_announcement`: voice with music crossfaded underneath
//! - neither flag: voice first, then music

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where the cue's track is played from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MusicSource {
    /// Host media library (always available)
    Local,
    /// Streaming service (requires a connect handshake)
    Streaming,
}

impl MusicSource {
    /// Parse from the store's textual representation
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "local" | "library" => Some(MusicSource::Local),
            "streaming" | "stream" => Some(MusicSource::Streaming),
            _ => None,
        }
    }
}

impl std::fmt::Display for MusicSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MusicSource::Local => write!(f, "local"),
            MusicSource::Streaming => write!(f, "streaming"),
        }
    }
}

/// Speech synthesis engine for a voice-over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceType {
    /// Cloud synthesis (cached on disk, subject to quota)
    Cloud,
    /// On-device synthesis
    OnDevice,
}

impl VoiceType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "cloud" => Some(VoiceType::Cloud),
            "on_device" | "ondevice" | "device" | "system" => Some(VoiceType::OnDevice),
            _ => None,
        }
    }
}

/// Fade-out behaviour when the cue is stopped or superseded
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FadeOutSpec {
    pub enabled: bool,
    pub duration_seconds: f64,
}

impl Default for FadeOutSpec {
    fn default() -> Self {
        Self {
            enabled: false,
            duration_seconds: 2.0,
        }
    }
}

/// Spoken announcement attached to a cue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceOverSpec {
    pub enabled: bool,
    pub text: String,
    pub voice_type: VoiceType,
    pub voice_id: String,
    /// Speaking rate, normalized 0-1
    pub rate: f32,
    /// Pitch, normalized 0-1
    pub pitch: f32,
    /// Voice channel volume, normalized 0-1
    pub volume: f32,
    pub pre_delay_seconds: f64,
    pub post_delay_seconds: f64,
}

impl Default for VoiceOverSpec {
    fn default() -> Self {
        Self {
            enabled: false,
            text: String::new(),
            voice_type: VoiceType::OnDevice,
            voice_id: String::new(),
            rate: 0.5,
            pitch: 0.5,
            volume: 1.0,
            pre_delay_seconds: 0.0,
            post_delay_seconds: 0.0,
        }
    }
}

impl VoiceOverSpec {
    /// True when there is something to say
    pub fn is_speakable(&self) -> bool {
        self.enabled && !self.text.trim().is_empty()
    }

    /// Take the voice identity (engine, voice, rate, pitch, volume) from a
    /// group's assigned voice while keeping this cue's text, enabled flag and
    /// delays.
    pub fn with_group_voice(&self, group: &VoiceOverSpec) -> Self {
        Self {
            voice_type: group.voice_type,
            voice_id: group.voice_id.clone(),
            rate: group.rate,
            pitch: group.pitch,
            volume: group.volume,
            ..self.clone()
        }
    }

    /// Clamp normalized parameters into 0-1 and delays to non-negative
    pub fn normalized(mut self) -> Self {
        self.rate = self.rate.clamp(0.0, 1.0);
        self.pitch = self.pitch.clamp(0.0, 1.0);
        self.volume = self.volume.clamp(0.0, 1.0);
        self.pre_delay_seconds = self.pre_delay_seconds.max(0.0);
        self.post_delay_seconds = self.post_delay_seconds.max(0.0);
        self
    }
}

/// Longest offset, fade or delay a cue may carry
pub const MAX_CUE_SECONDS: f64 = 3600.0;

fn check_seconds(cue: &SoundCue, what: &str, value: f64) -> Result<()> {
    if value.is_finite() && (0.0..=MAX_CUE_SECONDS).contains(&value) {
        return Ok(());
    }
    Err(Error::InvalidInput(format!(
        "cue {} has out-of-range {} {}",
        cue.id, what, value
    )))
}

/// A user-defined unit of playback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoundCue {
    pub id: Uuid,
    pub name: String,
    /// Owning group (category); its assigned voice overrides the cue's own
    #[serde(default)]
    pub group_id: Option<Uuid>,
    pub music_source: MusicSource,
    /// Opaque track id (local library) or URI (streaming)
    #[serde(default)]
    pub track_ref: Option<String>,
    #[serde(default)]
    pub start_offset_seconds: f64,
    #[serde(default)]
    pub fade_out: FadeOutSpec,
    #[serde(default)]
    pub voice_over: Option<VoiceOverSpec>,
    #[serde(default)]
    pub is_voice_only: bool,
    #[serde(default)]
    pub is_lineup_announcement: bool,
    #[serde(default)]
    pub artwork_ref: Option<String>,
}

impl SoundCue {
    /// Plain music cue from the local library
    pub fn music(name: &str, track_ref: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            group_id: None,
            music_source: MusicSource::Local,
            track_ref: Some(track_ref.to_string()),
            start_offset_seconds: 0.0,
            fade_out: FadeOutSpec::default(),
            voice_over: None,
            is_voice_only: false,
            is_lineup_announcement: false,
            artwork_ref: None,
        }
    }

    /// Check record invariants
    ///
    /// `is_voice_only` and `is_lineup_announcement` are mutually exclusive.
    /// Offsets, fade length and voice delays must be finite, non-negative and
    /// no longer than [`MAX_CUE_SECONDS`].
    pub fn validate(&self) -> Result<()> {
        if self.is_voice_only && self.is_lineup_announcement {
            return Err(Error::InvalidInput(format!(
                "cue {} is flagged both voice-only and lineup announcement",
                self.id
            )));
        }
        check_seconds(self, "start offset", self.start_offset_seconds)?;
        if self.fade_out.enabled {
            check_seconds(self, "fade-out duration", self.fade_out.duration_seconds)?;
        }
        if let Some(voice) = &self.voice_over {
            check_seconds(self, "voice pre-delay", voice.pre_delay_seconds)?;
            check_seconds(self, "voice post-delay", voice.post_delay_seconds)?;
        }
        Ok(())
    }

    /// Voice-over that will actually be spoken, if any
    pub fn speakable_voice(&self) -> Option<&VoiceOverSpec> {
        self.voice_over.as_ref().filter(|v| v.is_speakable())
    }

    /// Fade-out duration when fading is enabled
    pub fn fade_out_duration(&self) -> Option<f64> {
        (self.fade_out.enabled && self.fade_out.duration_seconds > 0.0)
            .then_some(self.fade_out.duration_seconds)
    }
}
