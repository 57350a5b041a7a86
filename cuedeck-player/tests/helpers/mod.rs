//! Shared orchestrator test harness
//!
//! Wires the orchestrator to simulated transports sharing one call log, a
//! recording volume control, an in-memory cue store and a clock-driven voice
//! channel. Tests run on a paused tokio clock.

#![allow(dead_code)]

use async_trait::async_trait;
use cuedeck_common::events::{CueEvent, EventBus};
use cuedeck_common::{FadeOutSpec, MusicSource, SoundCue, VoiceOverSpec, VoiceType};
use cuedeck_player::backend::{
    BackendSet, CallLog, ConnectBehavior, LocalLibraryBackend, MediaLibrary, SimulatedTransport,
    StreamingBackend, TransportCall,
};
use cuedeck_player::config::PlaybackTuning;
use cuedeck_player::error::{Error, Result};
use cuedeck_player::playback::{self, Collaborators, OrchestratorHandle, VolumeControl};
use cuedeck_player::speech::{
    OnDeviceSpeech, SimulatedVoiceOutput, SpeechError, SpeechProvider, SpeechRouter, Utterance,
};
use cuedeck_player::store::InMemoryCueStore;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;

/// Volume control that keeps every write with its timestamp
pub struct RecordingVolume {
    level: Mutex<f32>,
    history: Mutex<Vec<(Instant, f32)>>,
}

impl RecordingVolume {
    pub fn new(level: f32) -> Self {
        Self {
            level: Mutex::new(level),
            history: Mutex::new(Vec::new()),
        }
    }

    pub fn history(&self) -> Vec<(Instant, f32)> {
        self.history.lock().unwrap().clone()
    }

    pub fn level_now(&self) -> f32 {
        *self.level.lock().unwrap()
    }

    /// Levels written strictly after `from` and no later than `to`
    pub fn levels_between(&self, from: Instant, to: Instant) -> Vec<f32> {
        self.history()
            .into_iter()
            .filter(|(at, _)| *at > from && *at <= to)
            .map(|(_, level)| level)
            .collect()
    }
}

impl VolumeControl for RecordingVolume {
    fn level(&self) -> f32 {
        *self.level.lock().unwrap()
    }

    fn set_level(&self, level: f32) {
        *self.level.lock().unwrap() = level;
        self.history.lock().unwrap().push((Instant::now(), level));
    }
}

/// Library resolving any id to a media path, except ids starting with "missing"
pub struct StubLibrary;

#[async_trait]
impl MediaLibrary for StubLibrary {
    async fn resolve(&self, track_id: &str) -> Result<String> {
        if track_id.starts_with("missing") {
            return Err(Error::NotFound(format!("track '{}'", track_id)));
        }
        Ok(format!("/media/{}.mp3", track_id))
    }
}

/// Speech provider returning rendered audio of a fixed length, or a fixed error
pub struct FakeCloud {
    duration: f64,
    fail_with: Option<fn() -> SpeechError>,
    pub calls: AtomicUsize,
}

impl FakeCloud {
    pub fn rendering(duration: f64) -> Self {
        Self {
            duration,
            fail_with: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(make: fn() -> SpeechError) -> Self {
        Self {
            duration: 0.0,
            fail_with: Some(make),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechProvider for FakeCloud {
    async fn generate(&self, text: &str, voice: &VoiceOverSpec) -> std::result::Result<Utterance, SpeechError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(make) = self.fail_with {
            return Err(make());
        }
        Ok(Utterance::Rendered {
            path: format!("/cache/{}-{}.mp3", voice.voice_id, text.len()).into(),
            duration: self.duration,
        })
    }
}

pub struct TestHarness {
    pub handle: OrchestratorHandle,
    pub log: CallLog,
    pub volume: Arc<RecordingVolume>,
    pub store: Arc<InMemoryCueStore>,
    pub voice: Arc<SimulatedVoiceOutput>,
    pub events: broadcast::Receiver<CueEvent>,
}

pub struct HarnessBuilder {
    tuning: PlaybackTuning,
    baseline: f32,
    streaming_connect: ConnectBehavior,
    cloud: Option<Arc<dyn SpeechProvider>>,
    on_device: Option<Arc<dyn SpeechProvider>>,
    failing_voice: bool,
    live_voice: Duration,
    track_seconds: f64,
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self {
            tuning: PlaybackTuning::default(),
            baseline: 1.0,
            streaming_connect: ConnectBehavior::Immediate,
            cloud: None,
            on_device: None,
            failing_voice: false,
            live_voice: Duration::from_secs(2),
            track_seconds: 180.0,
        }
    }
}

impl HarnessBuilder {
    pub fn baseline(mut self, level: f32) -> Self {
        self.baseline = level;
        self
    }

    pub fn streaming(mut self, behavior: ConnectBehavior) -> Self {
        self.streaming_connect = behavior;
        self
    }

    pub fn cloud(mut self, provider: Arc<dyn SpeechProvider>) -> Self {
        self.cloud = Some(provider);
        self
    }

    /// Replace the on-device provider the router falls back to
    pub fn on_device(mut self, provider: Arc<dyn SpeechProvider>) -> Self {
        self.on_device = Some(provider);
        self
    }

    /// Voice channel whose every `play` fails
    pub fn failing_voice(mut self) -> Self {
        self.failing_voice = true;
        self
    }

    pub fn live_voice(mut self, length: Duration) -> Self {
        self.live_voice = length;
        self
    }

    pub fn track_seconds(mut self, seconds: f64) -> Self {
        self.track_seconds = seconds;
        self
    }

    pub fn build(self) -> TestHarness {
        let log = CallLog::new();
        let local = LocalLibraryBackend::new(
            Arc::new(
                SimulatedTransport::new("local")
                    .with_log(log.clone())
                    .with_default_duration(self.track_seconds)
                    .connected(),
            ),
            Arc::new(StubLibrary),
        );
        let streaming = StreamingBackend::new(
            Arc::new(
                SimulatedTransport::new("streaming")
                    .with_log(log.clone())
                    .with_default_duration(self.track_seconds)
                    .with_connect_behavior(self.streaming_connect),
            ),
            self.tuning.connect_timeout(),
            self.tuning.connect_poll(),
        );

        let volume = Arc::new(RecordingVolume::new(self.baseline));
        let store = Arc::new(InMemoryCueStore::new());
        let mut output = SimulatedVoiceOutput::new().with_live_duration(self.live_voice);
        if self.failing_voice {
            output = output.failing();
        }
        let voice = Arc::new(output);
        let on_device = self
            .on_device
            .unwrap_or_else(|| Arc::new(OnDeviceSpeech::new()));
        let events = EventBus::new(1024);
        let rx = events.subscribe();

        let handle = playback::spawn(
            Collaborators {
                store: store.clone(),
                backends: BackendSet { local, streaming },
                speech: SpeechRouter::new(self.cloud, on_device),
                voice: voice.clone(),
                volume: volume.clone(),
                events,
            },
            self.tuning,
        );

        TestHarness {
            handle,
            log,
            volume,
            store,
            voice,
            events: rx,
        }
    }
}

impl TestHarness {
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder::default()
    }

    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Events received so far
    pub fn drain_events(&mut self) -> Vec<CueEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    /// Index of the first matching call in the shared log
    pub fn call_index(&self, transport: &str, call: &TransportCall) -> Option<usize> {
        self.log
            .entries()
            .iter()
            .position(|(name, c)| name == transport && c == call)
    }

    pub fn count_calls(&self, transport: &str, call: &TransportCall) -> usize {
        self.log
            .entries()
            .iter()
            .filter(|(name, c)| name == transport && c == call)
            .count()
    }
}

pub fn prepared(track: &str) -> TransportCall {
    TransportCall::Prepare(format!("/media/{}.mp3", track))
}

/// Let the orchestrator drain its queue without moving far in time
pub async fn yield_to_orchestrator() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

pub async fn sleep_until(start: Instant, millis: u64) {
    tokio::time::sleep_until(start + Duration::from_millis(millis)).await;
}

pub fn music_cue(name: &str, track: &str) -> SoundCue {
    SoundCue::music(name, track)
}

pub fn fading_cue(name: &str, track: &str, seconds: f64) -> SoundCue {
    SoundCue {
        fade_out: FadeOutSpec {
            enabled: true,
            duration_seconds: seconds,
        },
        ..SoundCue::music(name, track)
    }
}

pub fn streaming_cue(name: &str, uri: &str) -> SoundCue {
    SoundCue {
        music_source: MusicSource::Streaming,
        ..SoundCue::music(name, uri)
    }
}

pub fn voice(text: &str, voice_type: VoiceType) -> VoiceOverSpec {
    VoiceOverSpec {
        enabled: true,
        text: text.to_string(),
        voice_type,
        voice_id: "announcer".to_string(),
        ..Default::default()
    }
}

/// Voice first, then music
pub fn sequential_cue(name: &str, track: &str, spoken: VoiceOverSpec) -> SoundCue {
    SoundCue {
        voice_over: Some(spoken),
        ..SoundCue::music(name, track)
    }
}

/// Voice over ducked music
pub fn lineup_cue(name: &str, track: &str, spoken: VoiceOverSpec) -> SoundCue {
    SoundCue {
        is_lineup_announcement: true,
        ..sequential_cue(name, track, spoken)
    }
}

pub fn voice_only_cue(name: &str, spoken: VoiceOverSpec) -> SoundCue {
    SoundCue {
        is_voice_only: true,
        track_ref: None,
        ..sequential_cue(name, "", spoken)
    }
}
