//! End-to-end orchestrator scenarios on a paused clock

mod helpers;

use cuedeck_common::events::{CueEvent, CueRoute, FinishReason};
use cuedeck_common::snapshot::{AnnouncementStage, PlaybackPhase, SequentialStage};
use cuedeck_common::{FadeOutSpec, SoundCue, VoiceOverSpec, VoiceType};
use cuedeck_player::backend::{ConnectBehavior, TransportCall};
use cuedeck_player::playback::{StopOutcome, TriggerOutcome};
use cuedeck_player::speech::SpeechError;
use helpers::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

fn finished(events: &[CueEvent], cue: Uuid) -> Option<FinishReason> {
    events.iter().find_map(|e| match e {
        CueEvent::CueFinished { cue_id, reason, .. } if *cue_id == cue => Some(*reason),
        _ => None,
    })
}

#[tokio::test(start_paused = true)]
async fn test_music_cue_replaced_stops_before_next_prepares() {
    let h = TestHarness::new();
    let a = music_cue("Walk-up A", "a");
    let b = music_cue("Walk-up B", "b");

    assert_eq!(h.handle.trigger(a.clone()).await.unwrap(), TriggerOutcome::Started);
    yield_to_orchestrator().await;
    assert_eq!(h.handle.snapshot().phase, PlaybackPhase::PlayingMusic);

    assert_eq!(h.handle.trigger(b.clone()).await.unwrap(), TriggerOutcome::Started);
    yield_to_orchestrator().await;

    let stop_a = h.call_index("local", &TransportCall::Stop).expect("A stopped");
    let prepare_a = h.call_index("local", &prepared("a")).unwrap();
    let prepare_b = h.call_index("local", &prepared("b")).expect("B prepared");
    assert!(prepare_a < stop_a);
    assert!(stop_a < prepare_b);

    let entries = h.log.entries();
    let plays: Vec<usize> = entries
        .iter()
        .enumerate()
        .filter(|(_, (_, c))| *c == TransportCall::Play)
        .map(|(i, _)| i)
        .collect();
    assert_eq!(plays.len(), 2);
    assert!(plays[1] > stop_a);

    let snapshot = h.handle.snapshot();
    assert_eq!(snapshot.active_cue_id, Some(b.id));
    assert_eq!(snapshot.title.as_deref(), Some("Walk-up B"));
}

#[tokio::test(start_paused = true)]
async fn test_lineup_announcement_crossfade_timing() {
    let cloud = Arc::new(FakeCloud::rendering(4.0));
    let h = TestHarness::builder().cloud(cloud.clone()).build();
    let cue = lineup_cue("Starting lineup", "anthem", voice("Your starting lineup", VoiceType::Cloud));

    let t0 = Instant::now();
    h.handle.trigger(cue).await.unwrap();

    sleep_until(t0, 950).await;
    assert!(h.call_index("local", &TransportCall::Play).is_none());
    assert!(h.voice.is_speaking());
    assert_eq!(
        h.handle.snapshot().phase,
        PlaybackPhase::AnnouncementCrossfade(AnnouncementStage::VoicePlaying)
    );

    sleep_until(t0, 1050).await;
    assert!(h.call_index("local", &TransportCall::Play).is_some());
    assert_eq!(
        h.handle.snapshot().phase,
        PlaybackPhase::AnnouncementCrossfade(AnnouncementStage::DuckedMusicRamping)
    );

    // Music enters ducked exactly one second into the voice
    let (ducked_at, ducked) = h.volume.history()[0];
    assert!((ducked - 0.15).abs() < 1e-6);
    assert_eq!(ducked_at - t0, Duration::from_secs(1));

    // Halfway through the 3s fade-in: smoothstep(0.5) = 0.5
    sleep_until(t0, 2500).await;
    let level = h.volume.history().last().unwrap().1;
    assert!((level - 0.575).abs() < 0.01, "level {}", level);

    sleep_until(t0, 4050).await;
    let level = h.volume.history().last().unwrap().1;
    assert!((level - 1.0).abs() < 1e-5);
    assert_eq!(
        h.handle.snapshot().phase,
        PlaybackPhase::AnnouncementCrossfade(AnnouncementStage::FullVolume)
    );
    assert!(!h.handle.diagnostics().await.unwrap().ramp_active);
    assert_eq!(cloud.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_live_announcement_crossfade_timing() {
    let h = TestHarness::builder().live_voice(Duration::from_secs(4)).build();
    let cue = lineup_cue("Starting lineup", "anthem", voice("Your starting lineup", VoiceType::OnDevice));

    let t0 = Instant::now();
    h.handle.trigger(cue).await.unwrap();

    sleep_until(t0, 750).await;
    assert!(h.call_index("local", &TransportCall::Play).is_none());
    assert!(h.voice.is_speaking());

    sleep_until(t0, 850).await;
    assert!(h.call_index("local", &TransportCall::Play).is_some());
    assert_eq!(
        h.handle.snapshot().phase,
        PlaybackPhase::AnnouncementCrossfade(AnnouncementStage::DuckedMusicRamping)
    );

    // Live speech has no length: music enters ducked 0.8s in
    let (ducked_at, ducked) = h.volume.history()[0];
    assert!((ducked - 0.15).abs() < 1e-6);
    assert_eq!(ducked_at - t0, Duration::from_millis(800));

    // Halfway through the 2s fade-in
    sleep_until(t0, 1800).await;
    let level = h.volume.level_now();
    assert!((level - 0.575).abs() < 0.02, "level {}", level);

    sleep_until(t0, 2850).await;
    assert!((h.volume.level_now() - 1.0).abs() < 1e-5);
    assert_eq!(
        h.handle.snapshot().phase,
        PlaybackPhase::AnnouncementCrossfade(AnnouncementStage::FullVolume)
    );
    assert!(h.voice.is_speaking());
    assert!(!h.handle.diagnostics().await.unwrap().ramp_active);
}

#[tokio::test(start_paused = true)]
async fn test_fade_out_hands_off_to_pending_cue() {
    let mut h = TestHarness::builder().baseline(0.8).build();
    let a = fading_cue("Goal horn", "horn", 2.0);
    let b = music_cue("Celebration", "party");

    h.handle.trigger(a.clone()).await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    let tf = Instant::now();
    let outcome = h.handle.trigger(b.clone()).await.unwrap();
    assert_eq!(outcome, TriggerOutcome::Queued { replaced: None });

    let diag = h.handle.diagnostics().await.unwrap();
    assert_eq!(diag.phase, PlaybackPhase::FadingOut);
    assert_eq!(diag.pending_cue_id, Some(b.id));
    assert!(h.handle.snapshot().is_fading_out);

    sleep_until(tf, 1050).await;
    assert!((h.volume.level_now() - 0.4).abs() < 1e-3);

    sleep_until(tf, 2050).await;
    assert_eq!(h.volume.level_now(), 0.0);
    assert!(h.call_index("local", &TransportCall::Stop).is_some());
    assert!(h.call_index("local", &prepared("party")).is_none());
    assert!(h.handle.snapshot().phase.is_idle());

    sleep_until(tf, 2200).await;
    let stop_a = h.call_index("local", &TransportCall::Stop).unwrap();
    let prepare_b = h.call_index("local", &prepared("party")).expect("B started after settle");
    assert!(stop_a < prepare_b);
    assert!((h.volume.level_now() - 0.8).abs() < 1e-6);
    assert_eq!(h.handle.snapshot().active_cue_id, Some(b.id));

    // Twenty discrete steps across the two seconds
    let steps = h.volume.levels_between(tf, tf + Duration::from_secs(2));
    assert_eq!(steps.len(), 20);
    for (i, level) in steps.iter().enumerate() {
        let expected = 0.8_f32 * (1.0 - (i as f32 + 1.0) / 20.0);
        assert!((level - expected).abs() < 1e-6, "step {}: {}", i + 1, level);
    }

    let events = h.drain_events();
    assert_eq!(finished(&events, a.id), Some(FinishReason::FadedOut));
    assert!(events
        .iter()
        .any(|e| matches!(e, CueEvent::FadeOutStarted { steps: 20, .. })));
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_speech_falls_back_and_music_follows() {
    let cloud = Arc::new(FakeCloud::failing(|| SpeechError::RateLimited("429".to_string())));
    let mut h = TestHarness::builder()
        .cloud(cloud.clone())
        .live_voice(Duration::from_secs(2))
        .build();
    let spoken = VoiceOverSpec {
        post_delay_seconds: 0.5,
        ..voice("Please welcome the home team", VoiceType::Cloud)
    };
    let cue = sequential_cue("Home team", "intro", spoken);

    let t0 = Instant::now();
    h.handle.trigger(cue).await.unwrap();
    yield_to_orchestrator().await;

    assert_eq!(cloud.call_count(), 1);
    assert_eq!(h.voice.spoken(), vec!["Please welcome the home team".to_string()]);
    assert_eq!(
        h.handle.snapshot().phase,
        PlaybackPhase::SequentialVoiceThenMusic(SequentialStage::Speaking)
    );

    sleep_until(t0, 2200).await;
    assert_eq!(
        h.handle.snapshot().phase,
        PlaybackPhase::SequentialVoiceThenMusic(SequentialStage::PostDelay)
    );

    sleep_until(t0, 2400).await;
    assert!(h.call_index("local", &TransportCall::Play).is_none());

    sleep_until(t0, 2600).await;
    assert!(h.call_index("local", &TransportCall::Play).is_some());
    assert_eq!(h.handle.snapshot().phase, PlaybackPhase::PlayingMusic);

    let events = h.drain_events();
    assert!(events.iter().any(|e| matches!(
        e,
        CueEvent::SpeechFallback { error, .. } if error.contains("429")
    )));
}

#[tokio::test(start_paused = true)]
async fn test_stop_when_idle_is_noop() {
    let mut h = TestHarness::new();
    yield_to_orchestrator().await;
    h.drain_events();
    let before = h.handle.snapshot();

    assert_eq!(h.handle.stop().await.unwrap(), StopOutcome::Idle);
    assert_eq!(h.handle.stop().await.unwrap(), StopOutcome::Idle);
    yield_to_orchestrator().await;

    assert_eq!(h.handle.snapshot(), before);
    assert!(h.drain_events().is_empty());
    assert!(h.log.entries().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_stop_without_fade_restores_baseline() {
    let mut h = TestHarness::builder().baseline(0.6).build();
    let cue = music_cue("Organ", "organ");

    h.handle.trigger(cue.clone()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(h.handle.stop().await.unwrap(), StopOutcome::Stopped);

    tokio::time::sleep(Duration::from_millis(200)).await;
    let diag = h.handle.diagnostics().await.unwrap();
    assert!(diag.phase.is_idle());
    assert_eq!(diag.pending_cue_id, None);
    assert!((diag.output_level - 0.6).abs() < 1e-6);
    assert!(!h.handle.snapshot().is_playing);
    assert_eq!(finished(&h.drain_events(), cue.id), Some(FinishReason::Stopped));
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_fade_cancels_pending_cue() {
    let h = TestHarness::new();
    let a = fading_cue("Goal horn", "horn", 1.0);
    let b = music_cue("Celebration", "party");

    h.handle.trigger(a).await.unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;
    h.handle.trigger(b).await.unwrap();
    assert_eq!(h.handle.stop().await.unwrap(), StopOutcome::Fading);
    assert_eq!(h.handle.diagnostics().await.unwrap().pending_cue_id, None);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(h.call_index("local", &prepared("party")).is_none());
    let diag = h.handle.diagnostics().await.unwrap();
    assert!(diag.phase.is_idle());
    assert!((diag.output_level - 1.0).abs() < 1e-6);
}

#[tokio::test(start_paused = true)]
async fn test_stop_with_fade_enabled_fades_then_idles() {
    let mut h = TestHarness::builder().baseline(0.9).build();
    let cue = fading_cue("Outro", "outro", 1.0);

    h.handle.trigger(cue.clone()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(h.handle.stop().await.unwrap(), StopOutcome::Fading);
    // A second stop during the fade changes nothing
    assert_eq!(h.handle.stop().await.unwrap(), StopOutcome::Fading);

    tokio::time::sleep(Duration::from_millis(1300)).await;
    let diag = h.handle.diagnostics().await.unwrap();
    assert!(diag.phase.is_idle());
    assert!((diag.output_level - 0.9).abs() < 1e-6);
    assert_eq!(finished(&h.drain_events(), cue.id), Some(FinishReason::FadedOut));
}

#[tokio::test(start_paused = true)]
async fn test_pending_slot_last_write_wins() {
    let mut h = TestHarness::new();
    let a = fading_cue("Goal horn", "horn", 1.0);
    let b = music_cue("Celebration", "party");
    let c = music_cue("Replay", "replay");

    h.handle.trigger(a).await.unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;
    h.handle.trigger(b.clone()).await.unwrap();
    let outcome = h.handle.trigger(c.clone()).await.unwrap();
    assert_eq!(outcome, TriggerOutcome::Queued { replaced: Some(b.id) });

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(h.call_index("local", &prepared("party")).is_none());
    assert!(h.call_index("local", &prepared("replay")).is_some());
    assert_eq!(h.handle.snapshot().active_cue_id, Some(c.id));

    let events = h.drain_events();
    assert!(events.iter().any(|e| matches!(
        e,
        CueEvent::CueQueued { cue_id, replaced: Some(r), .. } if *cue_id == c.id && *r == b.id
    )));
}

#[tokio::test(start_paused = true)]
async fn test_trigger_during_voice_tears_down_immediately() {
    let h = TestHarness::builder().live_voice(Duration::from_secs(5)).build();
    let spoken = VoiceOverSpec {
        post_delay_seconds: 1.0,
        ..voice("Ladies and gentlemen", VoiceType::OnDevice)
    };
    let a = SoundCue {
        fade_out: FadeOutSpec {
            enabled: true,
            duration_seconds: 2.0,
        },
        ..sequential_cue("Intro", "intro", spoken)
    };
    let b = music_cue("Walk-up", "walkup");

    h.handle.trigger(a).await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(h.voice.is_speaking());

    // Music not started yet, so no fade: B replaces A at once
    assert_eq!(h.handle.trigger(b.clone()).await.unwrap(), TriggerOutcome::Started);
    yield_to_orchestrator().await;
    assert!(!h.voice.is_speaking());

    // A's post-delay and music start never happen
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(h.call_index("local", &prepared("intro")).is_none());
    assert_eq!(h.count_calls("local", &prepared("walkup")), 1);
    assert_eq!(h.handle.snapshot().active_cue_id, Some(b.id));
}

#[tokio::test(start_paused = true)]
async fn test_voice_only_cue_completes_without_music() {
    let mut h = TestHarness::builder().live_voice(Duration::from_secs(3)).build();
    let cue = voice_only_cue("Safety notice", voice("Please remain seated", VoiceType::OnDevice));

    h.handle.trigger(cue.clone()).await.unwrap();
    yield_to_orchestrator().await;
    assert_eq!(h.handle.snapshot().phase, PlaybackPhase::PlayingVoiceOnly);
    assert!(h.handle.snapshot().is_speaking);

    tokio::time::sleep(Duration::from_millis(3100)).await;
    assert!(h.handle.snapshot().phase.is_idle());
    assert!(h.log.entries().is_empty());
    assert_eq!(finished(&h.drain_events(), cue.id), Some(FinishReason::Completed));
}

#[tokio::test(start_paused = true)]
async fn test_speech_failure_skips_to_music() {
    let on_device = Arc::new(FakeCloud::failing(|| {
        SpeechError::ProviderUnavailable("engine offline".to_string())
    }));
    let mut h = TestHarness::builder()
        .cloud(Arc::new(FakeCloud::failing(|| SpeechError::RateLimited("429".to_string()))))
        .on_device(on_device.clone())
        .build();
    let spoken = VoiceOverSpec {
        post_delay_seconds: 0.5,
        ..voice("Now batting", VoiceType::Cloud)
    };
    let cue = sequential_cue("Batter", "batter", spoken);

    h.handle.trigger(cue.clone()).await.unwrap();
    yield_to_orchestrator().await;

    // No voice at all, so no post-delay either
    assert_eq!(on_device.call_count(), 1);
    assert!(h.voice.spoken().is_empty());
    assert!(h.call_index("local", &TransportCall::Play).is_some());
    assert_eq!(h.handle.snapshot().phase, PlaybackPhase::PlayingMusic);
    assert_eq!(finished(&h.drain_events(), cue.id), None);
}

#[tokio::test(start_paused = true)]
async fn test_speech_failure_ends_voice_only_cue() {
    let mut h = TestHarness::builder()
        .on_device(Arc::new(FakeCloud::failing(|| {
            SpeechError::ProviderUnavailable("engine offline".to_string())
        })))
        .build();
    let cue = voice_only_cue("Safety notice", voice("Please remain seated", VoiceType::OnDevice));

    h.handle.trigger(cue.clone()).await.unwrap();
    yield_to_orchestrator().await;

    assert!(h.handle.snapshot().phase.is_idle());
    assert!(h.voice.spoken().is_empty());
    assert!(h.log.entries().is_empty());
    assert_eq!(finished(&h.drain_events(), cue.id), Some(FinishReason::Failed));
}

#[tokio::test(start_paused = true)]
async fn test_voice_playback_failure_counts_as_finished() {
    let h = TestHarness::builder().failing_voice().build();
    let spoken = VoiceOverSpec {
        post_delay_seconds: 0.5,
        ..voice("Now batting", VoiceType::OnDevice)
    };
    let cue = sequential_cue("Batter", "batter", spoken);

    let t0 = Instant::now();
    h.handle.trigger(cue).await.unwrap();

    sleep_until(t0, 400).await;
    assert_eq!(h.voice.spoken(), vec!["Now batting".to_string()]);
    assert!(h.call_index("local", &TransportCall::Play).is_none());
    assert_eq!(
        h.handle.snapshot().phase,
        PlaybackPhase::SequentialVoiceThenMusic(SequentialStage::PostDelay)
    );

    sleep_until(t0, 600).await;
    assert!(h.call_index("local", &TransportCall::Play).is_some());
    assert_eq!(h.handle.snapshot().phase, PlaybackPhase::PlayingMusic);
}

#[tokio::test(start_paused = true)]
async fn test_voice_playback_failure_completes_voice_only_cue() {
    let mut h = TestHarness::builder().failing_voice().build();
    let cue = voice_only_cue("Safety notice", voice("Please remain seated", VoiceType::OnDevice));

    h.handle.trigger(cue.clone()).await.unwrap();
    yield_to_orchestrator().await;

    assert!(h.handle.snapshot().phase.is_idle());
    assert_eq!(h.voice.spoken(), vec!["Please remain seated".to_string()]);
    assert_eq!(finished(&h.drain_events(), cue.id), Some(FinishReason::Completed));
}

#[tokio::test(start_paused = true)]
async fn test_pre_delay_precedes_speech() {
    let h = TestHarness::builder().live_voice(Duration::from_secs(1)).build();
    let spoken = VoiceOverSpec {
        pre_delay_seconds: 1.5,
        ..voice("Now batting", VoiceType::OnDevice)
    };
    let cue = sequential_cue("Batter", "batter", spoken);

    let t0 = Instant::now();
    h.handle.trigger(cue).await.unwrap();

    sleep_until(t0, 1400).await;
    assert!(h.voice.spoken().is_empty());
    assert_eq!(h.handle.snapshot().phase, PlaybackPhase::Preparing);

    sleep_until(t0, 1600).await;
    assert_eq!(h.voice.spoken(), vec!["Now batting".to_string()]);

    sleep_until(t0, 2600).await;
    assert!(h.call_index("local", &prepared("batter")).is_some());
}

#[tokio::test(start_paused = true)]
async fn test_preview_skips_voice() {
    let h = TestHarness::new();
    let cue = lineup_cue("Lineup", "anthem", voice("Your starting lineup", VoiceType::OnDevice));

    h.handle.preview(cue.clone()).await.unwrap();
    yield_to_orchestrator().await;

    let snapshot = h.handle.snapshot();
    assert!(snapshot.is_previewing);
    assert_eq!(snapshot.phase, PlaybackPhase::PlayingMusic);
    assert!(h.voice.spoken().is_empty());
    assert!(h.call_index("local", &prepared("anthem")).is_some());
}

#[tokio::test(start_paused = true)]
async fn test_missing_track_returns_to_idle() {
    let mut h = TestHarness::new();
    let cue = music_cue("Broken", "missing-track");

    h.handle.trigger(cue.clone()).await.unwrap();
    yield_to_orchestrator().await;

    let snapshot = h.handle.snapshot();
    assert!(snapshot.phase.is_idle());
    assert_eq!(snapshot.active_cue_id, None);
    assert_eq!(snapshot.title, None);
    assert!(snapshot.notice.is_none());
    assert_eq!(finished(&h.drain_events(), cue.id), Some(FinishReason::Failed));
}

#[tokio::test(start_paused = true)]
async fn test_streaming_connect_retries_once_then_raises_notice() {
    let mut h = TestHarness::builder().streaming(ConnectBehavior::Never).build();
    let cue = streaming_cue("Stream", "stream:track:1");

    let t0 = Instant::now();
    h.handle.trigger(cue.clone()).await.unwrap();
    yield_to_orchestrator().await;
    assert!(h.handle.snapshot().is_loading);

    // First attempt times out at 2s, retry after 1s, second timeout at 5s
    sleep_until(t0, 4900).await;
    assert!(h.handle.snapshot().notice.is_none());
    assert_eq!(h.count_calls("streaming", &TransportCall::Connect), 2);

    sleep_until(t0, 5200).await;
    let snapshot = h.handle.snapshot();
    assert!(snapshot.phase.is_idle());
    assert!(snapshot.notice.is_some());
    assert_eq!(h.count_calls("streaming", &TransportCall::Connect), 2);

    let events = h.drain_events();
    assert!(events.iter().any(|e| matches!(e, CueEvent::Notice { .. })));
    assert_eq!(finished(&events, cue.id), Some(FinishReason::Failed));

    h.handle.dismiss_notice().await.unwrap();
    assert!(h.handle.snapshot().notice.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_streaming_connects_after_handshake() {
    let h = TestHarness::builder()
        .streaming(ConnectBehavior::After(Duration::from_millis(500)))
        .build();
    let cue = streaming_cue("Stream", "stream:track:1");

    h.handle.trigger(cue).await.unwrap();
    tokio::time::sleep(Duration::from_millis(800)).await;

    assert!(h
        .call_index("streaming", &TransportCall::Prepare("stream:track:1".to_string()))
        .is_some());
    assert_eq!(h.handle.snapshot().phase, PlaybackPhase::PlayingMusic);
    assert!(!h.handle.snapshot().is_loading);
}

#[tokio::test(start_paused = true)]
async fn test_group_voice_overrides_cue_voice() {
    let cloud = Arc::new(FakeCloud::rendering(2.0));
    let h = TestHarness::builder().cloud(cloud.clone()).build();

    let group = Uuid::new_v4();
    h.store
        .set_group_voice(
            group,
            Some(VoiceOverSpec {
                voice_type: VoiceType::OnDevice,
                voice_id: "stadium".to_string(),
                ..Default::default()
            }),
        )
        .await;

    let cue = SoundCue {
        group_id: Some(group),
        ..sequential_cue("Visitors", "visitors", voice("Welcome visitors", VoiceType::Cloud))
    };
    h.handle.trigger(cue).await.unwrap();
    yield_to_orchestrator().await;

    // The group's on-device voice wins over the cue's cloud voice
    assert_eq!(cloud.call_count(), 0);
    assert_eq!(h.voice.spoken(), vec!["Welcome visitors".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_track_end_completes_session() {
    let mut h = TestHarness::builder().track_seconds(3.0).build();
    let cue = music_cue("Sting", "sting");

    h.handle.trigger(cue.clone()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    let snapshot = h.handle.snapshot();
    assert!(snapshot.is_playing);
    assert_eq!(snapshot.duration_seconds, 3.0);
    assert!(snapshot.elapsed_seconds > 1.0);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(h.handle.snapshot().phase.is_idle());
    assert_eq!(finished(&h.drain_events(), cue.id), Some(FinishReason::Completed));
}

#[tokio::test(start_paused = true)]
async fn test_invalid_cue_rejected() {
    let h = TestHarness::new();
    let cue = SoundCue {
        is_voice_only: true,
        is_lineup_announcement: true,
        ..music_cue("Bad", "bad")
    };
    let err = h.handle.trigger(cue).await.unwrap_err();
    assert!(matches!(err, cuedeck_player::Error::InvalidInput(_)));
    assert!(h.handle.snapshot().phase.is_idle());
}

#[tokio::test(start_paused = true)]
async fn test_out_of_range_durations_rejected() {
    let h = TestHarness::new();

    let err = h
        .handle
        .trigger(fading_cue("Huge fade", "horn", 1e20))
        .await
        .unwrap_err();
    assert!(matches!(err, cuedeck_player::Error::InvalidInput(_)));

    let spoken = VoiceOverSpec {
        pre_delay_seconds: f64::NAN,
        ..voice("Now batting", VoiceType::OnDevice)
    };
    let err = h
        .handle
        .trigger(sequential_cue("Batter", "batter", spoken))
        .await
        .unwrap_err();
    assert!(matches!(err, cuedeck_player::Error::InvalidInput(_)));

    // The orchestrator is still serving commands
    assert_eq!(h.handle.stop().await.unwrap(), StopOutcome::Idle);
    assert_eq!(
        h.handle.trigger(music_cue("Walk-up", "a")).await.unwrap(),
        TriggerOutcome::Started
    );
    yield_to_orchestrator().await;
    assert_eq!(h.handle.snapshot().phase, PlaybackPhase::PlayingMusic);
}

#[tokio::test(start_paused = true)]
async fn test_single_session_and_ramp_under_rapid_commands() {
    let h = TestHarness::builder()
        .cloud(Arc::new(FakeCloud::rendering(3.0)))
        .baseline(0.7)
        .build();
    let cues = [
        fading_cue("A", "a", 1.0),
        lineup_cue("B", "b", voice("Lineup", VoiceType::Cloud)),
        music_cue("C", "c"),
        fading_cue("D", "d", 0.5),
    ];

    for round in 0..3u64 {
        for (i, cue) in cues.iter().enumerate() {
            h.handle.trigger(cue.clone()).await.unwrap();
            tokio::time::sleep(Duration::from_millis(150 + 170 * i as u64 + 50 * round)).await;
            let diag = h.handle.diagnostics().await.unwrap();
            if diag.phase.is_idle() {
                assert!(!diag.ramp_active);
            }
            if i % 2 == 1 {
                h.handle.stop().await.unwrap();
            }
        }
    }

    h.handle.stop().await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;
    h.handle.stop().await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;

    let diag = h.handle.diagnostics().await.unwrap();
    assert!(diag.phase.is_idle());
    assert!(!diag.ramp_active);
    assert_eq!(diag.pending_cue_id, None);
    assert!((diag.output_level - 0.7).abs() < 1e-6);
    assert!(!h.voice.is_speaking());
}

#[tokio::test(start_paused = true)]
async fn test_cue_started_reports_route() {
    let mut h = TestHarness::new();
    let cue = lineup_cue("Lineup", "anthem", voice("Lineup", VoiceType::OnDevice));
    h.handle.trigger(cue).await.unwrap();
    yield_to_orchestrator().await;

    let events = h.drain_events();
    assert!(events.iter().any(|e| matches!(
        e,
        CueEvent::CueStarted { route: CueRoute::Crossfade, is_preview: false, .. }
    )));
}
