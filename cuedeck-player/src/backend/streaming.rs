//! Streaming service backend
//!
//! The transport must be connected before `prepare`. `ensure_connected`
//! starts the handshake and polls `is_connected()` until the timeout, then
//! gives up with `ProviderUnavailable`.

use super::Transport;
use crate::error::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct StreamingBackend {
    transport: Arc<dyn Transport>,
    connect_timeout: Duration,
    connect_poll: Duration,
}

impl StreamingBackend {
    pub fn new(transport: Arc<dyn Transport>, connect_timeout: Duration, connect_poll: Duration) -> Self {
        Self {
            transport,
            connect_timeout,
            connect_poll,
        }
    }

    pub(super) fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    /// Connect handshake bounded by the configured timeout
    pub async fn ensure_connected(&self) -> Result<()> {
        if self.transport.is_connected() {
            return Ok(());
        }

        info!("Streaming backend not connected, starting handshake");
        if let Err(e) = self.transport.connect().await {
            warn!("Streaming connect request failed: {}", e);
            return Err(Error::ProviderUnavailable(format!("streaming connect failed: {}", e)));
        }

        let deadline = Instant::now() + self.connect_timeout;
        loop {
            if self.transport.is_connected() {
                debug!("Streaming backend connected");
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(Error::ProviderUnavailable(format!(
                    "streaming service not connected after {:?}",
                    self.connect_timeout
                )));
            }
            tokio::time::sleep(self.connect_poll).await;
        }
    }

    pub async fn load(&self, uri: &str, offset_seconds: f64) -> Result<()> {
        if !self.transport.is_connected() {
            return Err(Error::ProviderUnavailable("streaming service not connected".to_string()));
        }
        self.transport.prepare(uri).await?;
        if offset_seconds > 0.0 {
            self.transport.seek(offset_seconds).await?;
        }
        Ok(())
    }
}
