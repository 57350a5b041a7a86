//! Playback backend adapters
//!
//! Two adapters sit behind one transport contract:
//! - [`LocalLibraryBackend`]: host media library, always connected, resolves
//!   stable track ids before preparing
//! - [`StreamingBackend`]: streaming service, requires a connect handshake
//!   bounded by a timeout
//!
//! The orchestrator picks one [`Backend`] per session from the cue's
//! `music_source` and never branches on the source again.

mod local;
mod simulated;
mod streaming;

pub use local::{FolderLibrary, LocalLibraryBackend, MediaLibrary};
pub use simulated::{CallLog, ConnectBehavior, SimulatedTransport, TransportCall};
pub use streaming::StreamingBackend;

use crate::error::Result;
use async_trait::async_trait;
use cuedeck_common::MusicSource;

/// Minimal transport contract over a platform player
///
/// Queries are synchronous snapshots; commands are async because a real
/// transport may round-trip to a service.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Load a resolved track (file path or URI)
    async fn prepare(&self, track: &str) -> Result<()>;

    async fn seek(&self, offset_seconds: f64) -> Result<()>;

    async fn play(&self) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    async fn stop(&self) -> Result<()>;

    /// Playback position of the prepared track in seconds
    fn current_position(&self) -> f64;

    /// Duration of the prepared track in seconds (0.0 when unknown)
    fn duration(&self) -> f64;

    fn is_connected(&self) -> bool;

    /// Begin the connect handshake; completion is observed via `is_connected`
    async fn connect(&self) -> Result<()>;

    /// Complete an external authorization handshake
    ///
    /// Returns `true` when the URL belonged to this transport.
    async fn handle_callback_url(&self, url: &str) -> Result<bool>;
}

/// Backend selected for a session
#[derive(Clone)]
pub enum Backend {
    Local(LocalLibraryBackend),
    Streaming(StreamingBackend),
}

impl Backend {
    pub fn source(&self) -> MusicSource {
        match self {
            Backend::Local(_) => MusicSource::Local,
            Backend::Streaming(_) => MusicSource::Streaming,
        }
    }

    /// True when `ensure_connected` has work to do
    pub fn needs_handshake(&self) -> bool {
        match self {
            Backend::Local(_) => false,
            Backend::Streaming(b) => !b.transport().is_connected(),
        }
    }

    /// Run the connect handshake (no-op for the local library)
    pub async fn ensure_connected(&self) -> Result<()> {
        match self {
            Backend::Local(_) => Ok(()),
            Backend::Streaming(b) => b.ensure_connected().await,
        }
    }

    /// Prepare the cue's track and seek to its start offset
    pub async fn load(&self, track_ref: &str, offset_seconds: f64) -> Result<()> {
        match self {
            Backend::Local(b) => b.load(track_ref, offset_seconds).await,
            Backend::Streaming(b) => b.load(track_ref, offset_seconds).await,
        }
    }

    pub async fn play(&self) -> Result<()> {
        self.transport().play().await
    }

    pub async fn stop(&self) -> Result<()> {
        self.transport().stop().await
    }

    pub fn position(&self) -> f64 {
        self.transport().current_position()
    }

    pub fn duration(&self) -> f64 {
        self.transport().duration()
    }

    fn transport(&self) -> &dyn Transport {
        match self {
            Backend::Local(b) => b.transport(),
            Backend::Streaming(b) => b.transport(),
        }
    }
}

/// Both adapters, constructed once at startup
#[derive(Clone)]
pub struct BackendSet {
    pub local: LocalLibraryBackend,
    pub streaming: StreamingBackend,
}

impl BackendSet {
    pub fn select(&self, source: MusicSource) -> Backend {
        match source {
            MusicSource::Local => Backend::Local(self.local.clone()),
            MusicSource::Streaming => Backend::Streaming(self.streaming.clone()),
        }
    }

    /// Stop both transports regardless of which one a session used
    pub async fn stop_all(&self) {
        for backend in [self.select(MusicSource::Local), self.select(MusicSource::Streaming)] {
            if let Err(e) = backend.stop().await {
                tracing::warn!("Failed to stop {} backend: {}", backend.source(), e);
            }
        }
    }

    /// Forward an authorization callback URL to the streaming transport
    pub async fn handle_callback_url(&self, url: &str) -> Result<bool> {
        self.streaming.transport().handle_callback_url(url).await
    }
}
