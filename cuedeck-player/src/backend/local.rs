//! Local media library backend

use super::Transport;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Host media library lookup by stable track id
#[async_trait]
pub trait MediaLibrary: Send + Sync {
    /// Resolve a track id to something the transport can prepare
    async fn resolve(&self, track_id: &str) -> Result<String>;
}

/// Media library rooted at a folder; ids are relative paths, with or without
/// an audio extension
pub struct FolderLibrary {
    root: PathBuf,
}

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "m4a", "flac", "wav", "ogg"];

impl FolderLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn candidates(&self, track_id: &str) -> Vec<PathBuf> {
        let base = self.root.join(track_id);
        let mut paths = vec![base.clone()];
        if base.extension().is_none() {
            paths.extend(AUDIO_EXTENSIONS.iter().map(|ext| base.with_extension(ext)));
        }
        paths
    }
}

#[async_trait]
impl MediaLibrary for FolderLibrary {
    async fn resolve(&self, track_id: &str) -> Result<String> {
        let relative = Path::new(track_id);
        let escapes_root = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if track_id.trim().is_empty() || escapes_root {
            return Err(Error::NotFound(format!("track '{}'", track_id)));
        }

        for path in self.candidates(track_id) {
            if tokio::fs::metadata(&path).await.map(|m| m.is_file()).unwrap_or(false) {
                debug!("Resolved track '{}' to {:?}", track_id, path);
                return Ok(path.to_string_lossy().into_owned());
            }
        }

        Err(Error::NotFound(format!("track '{}' in {:?}", track_id, self.root)))
    }
}

/// Local-library adapter: always connected, resolves ids before `prepare`
#[derive(Clone)]
pub struct LocalLibraryBackend {
    transport: Arc<dyn Transport>,
    library: Arc<dyn MediaLibrary>,
}

impl LocalLibraryBackend {
    pub fn new(transport: Arc<dyn Transport>, library: Arc<dyn MediaLibrary>) -> Self {
        Self { transport, library }
    }

    pub(super) fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    pub async fn load(&self, track_id: &str, offset_seconds: f64) -> Result<()> {
        let resolved = self.library.resolve(track_id).await?;
        self.transport.prepare(&resolved).await?;
        if offset_seconds > 0.0 {
            self.transport.seek(offset_seconds).await?;
        }
        Ok(())
    }
}
