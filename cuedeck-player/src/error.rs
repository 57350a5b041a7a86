//! Error types for cuedeck-player
//!
//! Taxonomy shared by the orchestrator, the backend adapters and the speech
//! providers. Every variant is recoverable: the orchestrator converges back to
//! `Idle` and the operator can retry.

use crate::speech::SpeechError;
use thiserror::Error;

/// Main error type for cuedeck-player
#[derive(Error, Debug)]
pub enum Error {
    /// Track, cue or voice lookup miss
    #[error("Not found: {0}")]
    NotFound(String),

    /// Backend or provider not connected after the handshake
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Monthly synthesis quota exhausted
    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Remote service throttled the request
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Transport-level failure talking to a remote service
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Audio or payload could not be decoded
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database connection or query errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// Cue record rejected before playback
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using cuedeck-player Error
pub type Result<T> = std::result::Result<T, Error>;

impl From<cuedeck_common::Error> for Error {
    fn from(err: cuedeck_common::Error) -> Self {
        match err {
            cuedeck_common::Error::Io(e) => Error::Io(e),
            cuedeck_common::Error::Config(msg) => Error::Config(msg),
            cuedeck_common::Error::NotFound(msg) => Error::NotFound(msg),
            cuedeck_common::Error::InvalidInput(msg) => Error::InvalidInput(msg),
        }
    }
}

impl From<SpeechError> for Error {
    fn from(err: SpeechError) -> Self {
        match err {
            SpeechError::NetworkError(msg) => Error::NetworkError(msg),
            SpeechError::RateLimited(msg) => Error::RateLimited(msg),
            SpeechError::QuotaExceeded(msg) => Error::QuotaExceeded(msg),
            SpeechError::InvalidCredential(msg) => {
                Error::ProviderUnavailable(format!("invalid credential: {}", msg))
            }
            SpeechError::ProviderUnavailable(msg) => Error::ProviderUnavailable(msg),
            SpeechError::DecodeError(msg) => Error::DecodeError(msg),
            SpeechError::Io(e) => Error::Io(e),
        }
    }
}

impl Error {
    /// True for failures of an external provider (speech service, streaming backend)
    pub fn is_provider_error(&self) -> bool {
        matches!(
            self,
            Error::ProviderUnavailable(_)
                | Error::QuotaExceeded(_)
                | Error::RateLimited(_)
                | Error::NetworkError(_)
        )
    }
}
