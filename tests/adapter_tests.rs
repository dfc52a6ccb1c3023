// End-to-end tests for the capture adapter lifecycle.
//
// These drive the adapter with the scripted engine and WAV-file capture,
// asserting on the event sequences the host would observe. The tokio clock
// is paused so pacing and timeouts resolve instantly and deterministically.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::time::timeout;
use voice_capture::{
    AudioSource, CaptureAdapter, CaptureEvent, ChannelSink, ErrorKind, RecognitionUpdate,
    ScriptedEngine, SessionConfig,
};

fn write_wav(dir: &TempDir, name: &str, seconds: f64, amplitude: i16) -> PathBuf {
    let path = dir.path().join(name);
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    let total = (16000.0 * seconds) as usize;
    for _ in 0..total {
        writer.write_sample(amplitude).unwrap();
    }
    writer.finalize().unwrap();

    path
}

fn test_config(source: AudioSource) -> SessionConfig {
    SessionConfig {
        source,
        buffer_duration_ms: 50,
        stop_grace: Duration::from_millis(200),
        volume_interval: Duration::from_millis(200),
        ..SessionConfig::default()
    }
}

fn spawn_adapter(
    config: SessionConfig,
    engine: ScriptedEngine,
) -> (CaptureAdapter, mpsc::UnboundedReceiver<CaptureEvent>) {
    let (sink, events) = ChannelSink::new();
    let adapter = CaptureAdapter::spawn(config, Arc::new(engine), Box::new(sink));
    (adapter, events)
}

/// Next event, skipping level reports (their cadence is not under test here).
async fn next_event(events: &mut mpsc::UnboundedReceiver<CaptureEvent>) -> CaptureEvent {
    loop {
        let event = timeout(Duration::from_secs(10), events.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed");
        if !matches!(event, CaptureEvent::VolumeChanged(_)) {
            return event;
        }
    }
}

fn assert_transcript(event: &CaptureEvent, text: &str, is_final: bool) {
    match event {
        CaptureEvent::TranscriptUpdate(p) => {
            assert_eq!(p.text, text);
            assert_eq!(p.is_final, is_final);
        }
        other => panic!("expected transcriptUpdate, got {}", other.name()),
    }
}

fn assert_error(event: &CaptureEvent, kind: ErrorKind) {
    match event {
        CaptureEvent::RecognitionError(p) => assert_eq!(p.kind, kind),
        other => panic!("expected recognitionError, got {}", other.name()),
    }
}

fn partial(text: &str) -> RecognitionUpdate {
    RecognitionUpdate::Partial {
        text: text.to_string(),
        confidence: None,
    }
}

fn final_update(text: &str) -> RecognitionUpdate {
    RecognitionUpdate::Final {
        text: text.to_string(),
        confidence: Some(0.9),
    }
}

#[tokio::test(start_paused = true)]
async fn partials_then_final_then_idle() {
    let dir = TempDir::new().unwrap();
    let wav = write_wav(&dir, "speech.wav", 0.5, 2000);

    let engine = ScriptedEngine::new(vec![
        partial("hel"),
        partial("hello"),
        final_update("hello world"),
    ])
    .with_step_delay(Duration::from_millis(10));

    let (adapter, mut events) = spawn_adapter(
        test_config(AudioSource::File(wav.display().to_string())),
        engine,
    );

    adapter.start_listening().await.unwrap();

    assert!(matches!(
        next_event(&mut events).await,
        CaptureEvent::SpeechStart(_)
    ));
    assert_transcript(&next_event(&mut events).await, "hel", false);
    assert_transcript(&next_event(&mut events).await, "hello", false);
    assert_transcript(&next_event(&mut events).await, "hello world", true);
    assert!(matches!(
        next_event(&mut events).await,
        CaptureEvent::SpeechEnd(_)
    ));

    let stats = adapter.stats().await.unwrap();
    assert!(!stats.is_listening);
    assert_eq!(stats.state, "idle");
    assert_eq!(stats.sessions_completed, 1);

    let transcript = adapter.transcript().await.unwrap();
    assert_eq!(transcript.len(), 3);
    let last = transcript.last().unwrap();
    assert_eq!(last.text, "hello world");
    assert!(!last.partial);
    assert_eq!(last.confidence, Some(0.9));
}

#[tokio::test(start_paused = true)]
async fn is_listening_tracks_state() {
    let dir = TempDir::new().unwrap();
    let wav = write_wav(&dir, "speech.wav", 0.5, 2000);

    let engine = ScriptedEngine::new(vec![]).with_hold_open();
    let (adapter, mut events) = spawn_adapter(
        test_config(AudioSource::File(wav.display().to_string())),
        engine,
    );

    assert!(!adapter.is_listening());

    adapter.start_listening().await.unwrap();
    assert!(matches!(
        next_event(&mut events).await,
        CaptureEvent::SpeechStart(_)
    ));
    assert!(adapter.is_listening());

    adapter.stop_listening().await.unwrap();
    assert!(matches!(
        next_event(&mut events).await,
        CaptureEvent::SpeechEnd(_)
    ));
    assert!(!adapter.is_listening());
}

#[tokio::test(start_paused = true)]
async fn double_start_keeps_single_session() {
    let dir = TempDir::new().unwrap();
    let wav = write_wav(&dir, "speech.wav", 0.5, 2000);

    let engine = ScriptedEngine::new(vec![]).with_hold_open();
    let (adapter, mut events) = spawn_adapter(
        test_config(AudioSource::File(wav.display().to_string())),
        engine,
    );

    adapter.start_listening().await.unwrap();
    let first = next_event(&mut events).await;
    assert!(matches!(first, CaptureEvent::SpeechStart(_)));

    adapter.start_listening().await.unwrap();
    assert_error(&next_event(&mut events).await, ErrorKind::AlreadyListening);

    // The original session is untouched
    assert!(adapter.is_listening());
    let stats = adapter.stats().await.unwrap();
    assert_eq!(stats.state, "listening");
    assert_eq!(stats.sessions_completed, 0);

    adapter.stop_listening().await.unwrap();
    assert!(matches!(
        next_event(&mut events).await,
        CaptureEvent::SpeechEnd(_)
    ));

    let stats = adapter.stats().await.unwrap();
    assert_eq!(stats.sessions_completed, 1);
}

#[tokio::test(start_paused = true)]
async fn stop_while_idle_is_a_silent_noop() {
    let dir = TempDir::new().unwrap();
    let wav = write_wav(&dir, "speech.wav", 0.2, 2000);

    let engine = ScriptedEngine::new(vec![]);
    let (adapter, mut events) = spawn_adapter(
        test_config(AudioSource::File(wav.display().to_string())),
        engine,
    );

    adapter.stop_listening().await.unwrap();

    // Round-trip a query so the stop has been processed before checking
    let stats = adapter.stats().await.unwrap();
    assert_eq!(stats.state, "idle");
    assert!(!adapter.is_listening());
    assert!(events.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn permission_denied_never_listens() {
    let dir = TempDir::new().unwrap();
    let wav = write_wav(&dir, "speech.wav", 0.2, 2000);

    let engine = ScriptedEngine::new(vec![partial("never")])
        .with_authorization(voice_capture::AuthorizationStatus::Denied);
    let (adapter, mut events) = spawn_adapter(
        test_config(AudioSource::File(wav.display().to_string())),
        engine,
    );

    adapter.start_listening().await.unwrap();
    assert_error(&next_event(&mut events).await, ErrorKind::PermissionDenied);
    assert!(!adapter.is_listening());

    let stats = adapter.stats().await.unwrap();
    assert_eq!(stats.state, "idle");
    assert_eq!(stats.sessions_completed, 0);
    assert!(events.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn engine_setup_failure_reverts_to_idle() {
    let dir = TempDir::new().unwrap();
    let wav = write_wav(&dir, "speech.wav", 0.2, 2000);

    let engine = ScriptedEngine::new(vec![]).with_setup_failure();
    let (adapter, mut events) = spawn_adapter(
        test_config(AudioSource::File(wav.display().to_string())),
        engine,
    );

    adapter.start_listening().await.unwrap();
    assert_error(&next_event(&mut events).await, ErrorKind::SetupFailed);

    let stats = adapter.stats().await.unwrap();
    assert_eq!(stats.state, "idle");

    // Retry is permitted after a failed attempt
    adapter.start_listening().await.unwrap();
    assert_error(&next_event(&mut events).await, ErrorKind::SetupFailed);
}

#[tokio::test(start_paused = true)]
async fn missing_audio_input_reports_setup_failure() {
    let engine = ScriptedEngine::new(vec![]);
    let (adapter, mut events) = spawn_adapter(
        test_config(AudioSource::File("/nonexistent/input.wav".to_string())),
        engine,
    );

    adapter.start_listening().await.unwrap();
    assert_error(&next_event(&mut events).await, ErrorKind::SetupFailed);
    assert!(!adapter.is_listening());
}

#[tokio::test(start_paused = true)]
async fn immediate_stop_releases_without_final() {
    let dir = TempDir::new().unwrap();
    let wav = write_wav(&dir, "speech.wav", 1.0, 2000);

    let engine = ScriptedEngine::new(vec![]).with_hold_open();
    let (adapter, mut events) = spawn_adapter(
        test_config(AudioSource::File(wav.display().to_string())),
        engine,
    );

    adapter.start_listening().await.unwrap();
    assert!(matches!(
        next_event(&mut events).await,
        CaptureEvent::SpeechStart(_)
    ));

    adapter.stop_listening().await.unwrap();

    // No final transcript is required; the session still reaches idle
    assert!(matches!(
        next_event(&mut events).await,
        CaptureEvent::SpeechEnd(_)
    ));

    let stats = adapter.stats().await.unwrap();
    assert_eq!(stats.state, "idle");
    assert_eq!(stats.transcript_segments, 0);

    // Handles were released: a fresh session starts cleanly
    adapter.start_listening().await.unwrap();
    assert!(matches!(
        next_event(&mut events).await,
        CaptureEvent::SpeechStart(_)
    ));
    adapter.stop_listening().await.unwrap();
    assert!(matches!(
        next_event(&mut events).await,
        CaptureEvent::SpeechEnd(_)
    ));
}

#[tokio::test(start_paused = true)]
async fn inactivity_times_out_the_session() {
    let dir = TempDir::new().unwrap();
    let wav = write_wav(&dir, "speech.wav", 0.5, 2000);

    let engine = ScriptedEngine::new(vec![]).with_hold_open();
    let mut config = test_config(AudioSource::File(wav.display().to_string()));
    config.inactivity_timeout = Duration::from_millis(300);

    let (adapter, mut events) = spawn_adapter(config, engine);

    adapter.start_listening().await.unwrap();
    assert!(matches!(
        next_event(&mut events).await,
        CaptureEvent::SpeechStart(_)
    ));

    assert_error(&next_event(&mut events).await, ErrorKind::Timeout);
    assert!(matches!(
        next_event(&mut events).await,
        CaptureEvent::SpeechEnd(_)
    ));
    assert!(!adapter.is_listening());
}

#[tokio::test(start_paused = true)]
async fn engine_error_mid_session_is_terminal() {
    let dir = TempDir::new().unwrap();
    let wav = write_wav(&dir, "speech.wav", 0.5, 2000);

    let engine = ScriptedEngine::new(vec![
        partial("so far so"),
        RecognitionUpdate::Error {
            message: "recognizer gave up".to_string(),
        },
    ])
    .with_step_delay(Duration::from_millis(10));

    let (adapter, mut events) = spawn_adapter(
        test_config(AudioSource::File(wav.display().to_string())),
        engine,
    );

    adapter.start_listening().await.unwrap();
    assert!(matches!(
        next_event(&mut events).await,
        CaptureEvent::SpeechStart(_)
    ));
    assert_transcript(&next_event(&mut events).await, "so far so", false);
    assert_error(&next_event(&mut events).await, ErrorKind::Recognition);
    assert!(matches!(
        next_event(&mut events).await,
        CaptureEvent::SpeechEnd(_)
    ));

    let stats = adapter.stats().await.unwrap();
    assert_eq!(stats.state, "idle");
    assert_eq!(stats.sessions_completed, 1);
}

#[tokio::test(start_paused = true)]
async fn volume_events_carry_levels() {
    let dir = TempDir::new().unwrap();
    let wav = write_wav(&dir, "speech.wav", 0.6, 8000);

    let engine = ScriptedEngine::new(vec![]).with_hold_open();
    let mut config = test_config(AudioSource::File(wav.display().to_string()));
    config.volume_interval = Duration::from_millis(100);

    let (adapter, mut events) = spawn_adapter(config, engine);

    adapter.start_listening().await.unwrap();

    let mut levels = Vec::new();
    loop {
        let event = timeout(Duration::from_secs(10), events.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed");

        match event {
            CaptureEvent::VolumeChanged(p) => {
                levels.push(p.rms_db);
                if levels.len() >= 2 {
                    break;
                }
            }
            CaptureEvent::SpeechStart(_) => {}
            other => panic!("unexpected event: {}", other.name()),
        }
    }

    for level in levels {
        assert!(level > -96.0 && level <= 0.0, "implausible level {}", level);
    }

    adapter.stop_listening().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn language_surface_validates_tags() {
    let dir = TempDir::new().unwrap();
    let wav = write_wav(&dir, "speech.wav", 0.2, 2000);

    let engine = ScriptedEngine::new(vec![]);
    let (adapter, _events) = spawn_adapter(
        test_config(AudioSource::File(wav.display().to_string())),
        engine,
    );

    assert!(adapter.is_recognition_available());
    assert!(!adapter.supported_languages().is_empty());

    assert_eq!(adapter.recognition_language().await.unwrap(), "en-US");
    assert!(adapter.set_recognition_language("fr-FR").await.unwrap());
    assert_eq!(adapter.recognition_language().await.unwrap(), "fr-FR");

    // Unsupported tags are rejected and change nothing
    assert!(!adapter.set_recognition_language("xx-XX").await.unwrap());
    assert_eq!(adapter.recognition_language().await.unwrap(), "fr-FR");
}

#[tokio::test(start_paused = true)]
async fn shutdown_tears_down_and_refuses_commands() {
    let dir = TempDir::new().unwrap();
    let wav = write_wav(&dir, "speech.wav", 0.5, 2000);

    let engine = ScriptedEngine::new(vec![]).with_hold_open();
    let (adapter, mut events) = spawn_adapter(
        test_config(AudioSource::File(wav.display().to_string())),
        engine,
    );

    adapter.start_listening().await.unwrap();
    assert!(matches!(
        next_event(&mut events).await,
        CaptureEvent::SpeechStart(_)
    ));

    adapter.shutdown().await.unwrap();
    assert!(matches!(
        next_event(&mut events).await,
        CaptureEvent::SpeechEnd(_)
    ));

    // Give the actor a beat to finish unwinding after its last event
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(!adapter.is_listening());
    assert!(adapter.start_listening().await.is_err());
}
