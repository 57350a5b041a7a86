//! Configuration management for cuedeck-player
//!
//! Two tiers:
//! 1. **TOML bootstrap**: database path, port, root folder, logging and the
//!    `[playback]` / `[speech]` tunables
//! 2. **Command-line overrides**: `--port`, `--database`, `--root-folder`
//!
//! A missing config file is not an error; every field has a built-in default.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// Cue database (relative paths resolve against the root folder)
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Root folder holding the media library, database and speech cache
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub playback: PlaybackTuning,

    #[serde(default)]
    pub speech: SpeechConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            port: default_port(),
            root_folder: None,
            logging: LoggingConfig::default(),
            playback: PlaybackTuning::default(),
            speech: SpeechConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Orchestrator and volume automation timing
#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackTuning {
    /// Pause before restoring the baseline or starting a queued cue
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Discrete steps in a fade-out
    #[serde(default = "default_fade_steps")]
    pub fade_steps: u32,

    /// Smooth ramp frame rate
    #[serde(default = "default_ramp_rate_hz")]
    pub ramp_rate_hz: u32,

    /// Level music starts at under an announcement, as a fraction of the baseline
    #[serde(default = "default_duck_ratio")]
    pub duck_ratio: f32,

    /// Timeline sampling period
    #[serde(default = "default_timeline_interval_ms")]
    pub timeline_interval_ms: u64,

    /// Streaming connect handshake timeout
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_connect_poll_ms")]
    pub connect_poll_ms: u64,

    /// Wait before the single connect retry
    #[serde(default = "default_connect_retry_delay_ms")]
    pub connect_retry_delay_ms: u64,

    /// Music start delay under live (duration-less) speech
    #[serde(default = "default_live_speech_music_delay_ms")]
    pub live_speech_music_delay_ms: u64,
}

impl Default for PlaybackTuning {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay_ms(),
            fade_steps: default_fade_steps(),
            ramp_rate_hz: default_ramp_rate_hz(),
            duck_ratio: default_duck_ratio(),
            timeline_interval_ms: default_timeline_interval_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            connect_poll_ms: default_connect_poll_ms(),
            connect_retry_delay_ms: default_connect_retry_delay_ms(),
            live_speech_music_delay_ms: default_live_speech_music_delay_ms(),
        }
    }
}

impl PlaybackTuning {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Interval between smooth ramp frames
    pub fn ramp_frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.ramp_rate_hz.max(1) as f64)
    }

    pub fn timeline_interval(&self) -> Duration {
        Duration::from_millis(self.timeline_interval_ms.max(1))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn connect_poll(&self) -> Duration {
        Duration::from_millis(self.connect_poll_ms.max(1))
    }

    pub fn connect_retry_delay(&self) -> Duration {
        Duration::from_millis(self.connect_retry_delay_ms)
    }

    pub fn live_speech_music_delay(&self) -> Duration {
        Duration::from_millis(self.live_speech_music_delay_ms)
    }

    /// Reject values the automation engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.fade_steps == 0 {
            return Err(Error::Config("playback.fade_steps must be at least 1".to_string()));
        }
        if self.ramp_rate_hz == 0 {
            return Err(Error::Config("playback.ramp_rate_hz must be at least 1".to_string()));
        }
        if !(0.0..=1.0).contains(&self.duck_ratio) {
            return Err(Error::Config(format!(
                "playback.duck_ratio must be within 0-1, got {}",
                self.duck_ratio
            )));
        }
        Ok(())
    }
}

/// Cloud speech synthesis settings
#[derive(Debug, Clone, Deserialize)]
pub struct SpeechConfig {
    /// Rendered audio cache (relative paths resolve against the root folder)
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Bumping this invalidates every cached rendering
    #[serde(default = "default_cache_version")]
    pub cache_version: u32,

    /// Generations allowed per calendar month
    #[serde(default = "default_monthly_quota")]
    pub monthly_quota: u32,

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            cache_version: default_cache_version(),
            monthly_quota: default_monthly_quota(),
            api_base_url: default_api_base_url(),
            api_key_env: default_api_key_env(),
        }
    }
}

fn default_database_path() -> PathBuf {
    PathBuf::from("cuedeck.db")
}

fn default_port() -> u16 {
    5780
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_settle_delay_ms() -> u64 {
    150
}

fn default_fade_steps() -> u32 {
    cuedeck_common::easing::DEFAULT_FADE_STEPS
}

fn default_ramp_rate_hz() -> u32 {
    60
}

fn default_duck_ratio() -> f32 {
    0.15
}

fn default_timeline_interval_ms() -> u64 {
    100
}

fn default_connect_timeout_ms() -> u64 {
    2000
}

fn default_connect_poll_ms() -> u64 {
    100
}

fn default_connect_retry_delay_ms() -> u64 {
    1000
}

fn default_live_speech_music_delay_ms() -> u64 {
    800
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("speech_cache")
}

fn default_cache_version() -> u32 {
    1
}

fn default_monthly_quota() -> u32 {
    500
}

fn default_api_base_url() -> String {
    "https://api.elevenlabs.io".to_string()
}

fn default_api_key_env() -> String {
    "CUEDECK_SPEECH_API_KEY".to_string()
}

/// Command-line configuration overrides
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub database_path: Option<PathBuf>,
    pub port: Option<u16>,
    pub root_folder: Option<PathBuf>,
}

/// Resolved application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: PathBuf,
    pub port: u16,
    pub root_folder: PathBuf,
    pub logging: LoggingConfig,
    pub playback: PlaybackTuning,
    pub speech: SpeechConfig,
}

impl Config {
    /// Load TOML (if any) and apply CLI overrides
    ///
    /// Priority: CLI > environment > TOML > built-in defaults.
    pub async fn load(toml_path: Option<&Path>, overrides: ConfigOverrides) -> Result<Self> {
        let toml_config = match toml_path {
            Some(path) => {
                let toml_str = tokio::fs::read_to_string(path).await.map_err(|e| {
                    Error::Config(format!("Failed to read config file {:?}: {}", path, e))
                })?;
                let parsed = Self::parse(&toml_str)?;
                info!("Loaded TOML configuration from {:?}", path);
                parsed
            }
            None => {
                warn!("No config file found, using built-in defaults");
                TomlConfig::default()
            }
        };

        Self::from_toml(toml_config, overrides)
    }

    /// Parse TOML text into the bootstrap structure
    pub fn parse(toml_str: &str) -> Result<TomlConfig> {
        toml::from_str(toml_str).map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))
    }

    pub fn from_toml(toml_config: TomlConfig, overrides: ConfigOverrides) -> Result<Self> {
        toml_config.playback.validate()?;

        let root_folder = cuedeck_common::config::resolve_root_folder(
            overrides.root_folder.as_deref().and_then(|p| p.to_str()),
            toml_config.root_folder.as_deref().and_then(|p| p.to_str()),
        );

        let database_path =
            absolutize(&root_folder, overrides.database_path.unwrap_or(toml_config.database_path));

        let mut speech = toml_config.speech;
        speech.cache_dir = absolutize(&root_folder, speech.cache_dir);

        Ok(Config {
            database_path,
            port: overrides.port.unwrap_or(toml_config.port),
            root_folder,
            logging: toml_config.logging,
            playback: toml_config.playback,
            speech,
        })
    }

    /// Speech quota state file, kept beside the cache
    pub fn quota_path(&self) -> PathBuf {
        self.speech.cache_dir.join("quota.json")
    }
}

fn absolutize(root: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        root.join(path)
    }
}
