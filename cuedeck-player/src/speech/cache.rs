//! Content-addressed speech cache
//!
//! Each rendering is stored as `<key>.mp3` with a `<key>.json` sidecar
//! holding its duration. The key is the SHA-256 of the cache version, voice id
//! and text, so bumping the version invalidates every entry.

use super::{SpeechError, Utterance};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Sidecar metadata for a cached rendering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub cache_version: u32,
    pub voice_id: String,
    pub text: String,
    pub duration_seconds: f64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

pub struct SpeechCache {
    dir: PathBuf,
    version: u32,
}

impl SpeechCache {
    pub fn new(dir: impl Into<PathBuf>, version: u32) -> Self {
        Self {
            dir: dir.into(),
            version,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Hex SHA-256 of `(cache_version, voice_id, text)`
    pub fn key(&self, text: &str, voice_id: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.version.to_le_bytes());
        hasher.update([0u8]);
        hasher.update(voice_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(text.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn audio_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.mp3", key))
    }

    fn metadata_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    /// Cached rendering, if both the audio and its sidecar are present
    pub async fn lookup(&self, text: &str, voice_id: &str) -> Option<Utterance> {
        let key = self.key(text, voice_id);
        let audio = self.audio_path(&key);
        if !tokio::fs::try_exists(&audio).await.unwrap_or(false) {
            return None;
        }

        let raw = match tokio::fs::read(self.metadata_path(&key)).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Speech cache entry {} has no metadata: {}", key, e);
                return None;
            }
        };
        match serde_json::from_slice::<CacheMetadata>(&raw) {
            Ok(meta) => {
                debug!("Speech cache hit {}", key);
                Some(Utterance::Rendered {
                    path: audio,
                    duration: meta.duration_seconds,
                })
            }
            Err(e) => {
                warn!("Speech cache metadata {} unreadable: {}", key, e);
                None
            }
        }
    }

    /// Write a rendering and its sidecar, returning the cached utterance
    pub async fn store(
        &self,
        text: &str,
        voice_id: &str,
        audio: &[u8],
        duration_seconds: f64,
    ) -> Result<Utterance, SpeechError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let key = self.key(text, voice_id);
        let audio_path = self.audio_path(&key);

        let meta = CacheMetadata {
            cache_version: self.version,
            voice_id: voice_id.to_string(),
            text: text.to_string(),
            duration_seconds,
            created_at: chrono::Utc::now(),
        };
        let meta_json = serde_json::to_vec_pretty(&meta)
            .map_err(|e| SpeechError::DecodeError(format!("cache metadata: {}", e)))?;

        write_atomic(&audio_path, audio).await?;
        write_atomic(&self.metadata_path(&key), &meta_json).await?;

        debug!("Cached speech {} ({:.2}s)", key, duration_seconds);
        Ok(Utterance::Rendered {
            path: audio_path,
            duration: duration_seconds,
        })
    }
}

/// Write through `<file>.tmp` so a reader never sees a partial file
async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await
}
