//! Clock-driven transport
//!
//! Stands in for a platform player: position advances with the tokio clock
//! while playing, and every command is appended to a call log that can be
//! shared between transports to check cross-backend ordering.

use super::Transport;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Transport command as recorded in the call log
#[derive(Debug, Clone, PartialEq)]
pub enum TransportCall {
    Prepare(String),
    Seek(f64),
    Play,
    Pause,
    Stop,
    Connect,
    Callback(String),
}

/// Ordered log of `(transport name, call)` pairs
#[derive(Clone, Default)]
pub struct CallLog {
    entries: Arc<Mutex<Vec<(String, TransportCall)>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, name: &str, call: TransportCall) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((name.to_string(), call));
    }

    pub fn entries(&self) -> Vec<(String, TransportCall)> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

/// How the simulated connect handshake behaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectBehavior {
    /// `connect()` connects at once
    Immediate,
    /// Connected once this much time has passed since `connect()`
    After(Duration),
    /// Never connects
    Never,
}

#[derive(Default)]
struct SimState {
    track: Option<String>,
    offset: f64,
    playing_since: Option<Instant>,
    connected: bool,
    connect_requested_at: Option<Instant>,
}

pub struct SimulatedTransport {
    name: String,
    log: CallLog,
    connect_behavior: ConnectBehavior,
    default_duration: f64,
    durations: HashMap<String, f64>,
    state: Mutex<SimState>,
}

impl SimulatedTransport {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            log: CallLog::new(),
            connect_behavior: ConnectBehavior::Immediate,
            default_duration: 180.0,
            durations: HashMap::new(),
            state: Mutex::new(SimState::default()),
        }
    }

    pub fn with_log(mut self, log: CallLog) -> Self {
        self.log = log;
        self
    }

    pub fn with_connect_behavior(mut self, behavior: ConnectBehavior) -> Self {
        self.connect_behavior = behavior;
        self
    }

    /// Start already connected
    pub fn connected(self) -> Self {
        self.lock().connected = true;
        self
    }

    pub fn with_default_duration(mut self, seconds: f64) -> Self {
        self.default_duration = seconds;
        self
    }

    pub fn with_track_duration(mut self, track: &str, seconds: f64) -> Self {
        self.durations.insert(track.to_string(), seconds);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn log(&self) -> CallLog {
        self.log.clone()
    }

    /// Calls made on this transport only
    pub fn calls(&self) -> Vec<TransportCall> {
        self.log
            .entries()
            .into_iter()
            .filter(|(name, _)| name == &self.name)
            .map(|(_, call)| call)
            .collect()
    }

    pub fn is_playing(&self) -> bool {
        self.lock().playing_since.is_some()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, call: TransportCall) {
        debug!(transport = %self.name, ?call, "transport call");
        self.log.push(&self.name, call);
    }

    fn track_duration(&self, track: &str) -> f64 {
        self.durations.get(track).copied().unwrap_or(self.default_duration)
    }

    fn position_of(&self, state: &SimState) -> f64 {
        let Some(track) = state.track.as_deref() else {
            return 0.0;
        };
        let running = state
            .playing_since
            .map(|since| since.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        (state.offset + running).min(self.track_duration(track))
    }
}

#[async_trait]
impl Transport for SimulatedTransport {
    async fn prepare(&self, track: &str) -> Result<()> {
        self.record(TransportCall::Prepare(track.to_string()));
        let mut state = self.lock();
        state.track = Some(track.to_string());
        state.offset = 0.0;
        state.playing_since = None;
        Ok(())
    }

    async fn seek(&self, offset_seconds: f64) -> Result<()> {
        self.record(TransportCall::Seek(offset_seconds));
        let mut state = self.lock();
        state.offset = offset_seconds.max(0.0);
        if state.playing_since.is_some() {
            state.playing_since = Some(Instant::now());
        }
        Ok(())
    }

    async fn play(&self) -> Result<()> {
        self.record(TransportCall::Play);
        let mut state = self.lock();
        if state.track.is_some() && state.playing_since.is_none() {
            state.playing_since = Some(Instant::now());
        }
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        self.record(TransportCall::Pause);
        let mut state = self.lock();
        state.offset = self.position_of(&state);
        state.playing_since = None;
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.record(TransportCall::Stop);
        let mut state = self.lock();
        state.track = None;
        state.offset = 0.0;
        state.playing_since = None;
        Ok(())
    }

    fn current_position(&self) -> f64 {
        let state = self.lock();
        self.position_of(&state)
    }

    fn duration(&self) -> f64 {
        self.lock()
            .track
            .as_deref()
            .map(|t| self.track_duration(t))
            .unwrap_or(0.0)
    }

    fn is_connected(&self) -> bool {
        let state = self.lock();
        if state.connected {
            return true;
        }
        match (self.connect_behavior, state.connect_requested_at) {
            (ConnectBehavior::After(delay), Some(requested)) => requested.elapsed() >= delay,
            _ => false,
        }
    }

    async fn connect(&self) -> Result<()> {
        self.record(TransportCall::Connect);
        let mut state = self.lock();
        match self.connect_behavior {
            ConnectBehavior::Immediate => state.connected = true,
            ConnectBehavior::After(_) => state.connect_requested_at = Some(Instant::now()),
            ConnectBehavior::Never => {}
        }
        Ok(())
    }

    async fn handle_callback_url(&self, url: &str) -> Result<bool> {
        self.record(TransportCall::Callback(url.to_string()));
        let authorized = url.contains("code=");
        if authorized {
            self.lock().connected = true;
        }
        Ok(authorized)
    }
}
