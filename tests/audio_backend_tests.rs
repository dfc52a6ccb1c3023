// Unit tests for audio backend abstractions
//
// These tests verify the core audio types and the file-backed capture
// backend work correctly.

use tempfile::TempDir;
use voice_capture::audio::{
    AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioFrame, AudioSource, FileBackend,
};

fn write_wav(dir: &TempDir, name: &str, samples: &[i16], sample_rate: u32) -> String {
    let path = dir.path().join(name);
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for &sample in samples {
        writer.write_sample(sample).unwrap();
    }
    writer.finalize().unwrap();

    path.display().to_string()
}

#[test]
fn test_audio_frame_creation() {
    let frame = AudioFrame {
        samples: vec![100, 200, 300],
        sample_rate: 16000,
        channels: 1,
        timestamp_ms: 1000,
    };

    assert_eq!(frame.samples.len(), 3);
    assert_eq!(frame.sample_rate, 16000);
    assert_eq!(frame.channels, 1);
    assert_eq!(frame.timestamp_ms, 1000);
}

#[test]
fn test_audio_frame_duration() {
    let frame = AudioFrame {
        samples: vec![0i16; 1600],
        sample_rate: 16000,
        channels: 1,
        timestamp_ms: 0,
    };
    assert_eq!(frame.duration_ms(), 100);

    let stereo = AudioFrame {
        samples: vec![0i16; 3200],
        sample_rate: 16000,
        channels: 2,
        timestamp_ms: 0,
    };
    assert_eq!(stereo.duration_ms(), 100);
}

#[test]
fn test_audio_backend_config_default() {
    let config = AudioBackendConfig::default();

    assert_eq!(config.target_sample_rate, 16000, "Default should be 16kHz");
    assert_eq!(config.target_channels, 1, "Default should be mono");
    assert_eq!(config.buffer_duration_ms, 100, "Default buffer should be 100ms");
}

#[test]
fn test_audio_backend_config_custom() {
    let config = AudioBackendConfig {
        target_sample_rate: 48000,
        target_channels: 2,
        buffer_duration_ms: 200,
    };

    assert_eq!(config.target_sample_rate, 48000);
    assert_eq!(config.target_channels, 2);
    assert_eq!(config.buffer_duration_ms, 200);
}

#[tokio::test]
async fn file_backend_replays_all_samples() {
    let dir = TempDir::new().unwrap();
    let samples: Vec<i16> = (0..16000).map(|i| (i % 1000) as i16).collect();
    let path = write_wav(&dir, "one-second.wav", &samples, 16000);

    let mut backend = FileBackend::open(&path, AudioBackendConfig::default())
        .unwrap()
        .with_pacing(false);

    assert!(!backend.is_capturing());
    assert_eq!(backend.name(), "file");

    let mut rx = backend.start().await.unwrap();

    let mut collected = Vec::new();
    let mut frames = 0usize;
    let mut expected_timestamp = 0u64;
    while let Some(frame) = rx.recv().await {
        assert_eq!(frame.sample_rate, 16000);
        assert_eq!(frame.channels, 1);
        assert_eq!(frame.timestamp_ms, expected_timestamp);
        expected_timestamp += 100;
        frames += 1;
        collected.extend(frame.samples);
    }

    // 1 second at 100ms buffers
    assert_eq!(frames, 10);
    assert_eq!(collected, samples);
    assert!(!backend.is_capturing());
}

#[tokio::test]
async fn file_backend_stop_ends_delivery() {
    let dir = TempDir::new().unwrap();
    let samples = vec![500i16; 32000];
    let path = write_wav(&dir, "two-seconds.wav", &samples, 16000);

    let mut backend = FileBackend::open(&path, AudioBackendConfig::default())
        .unwrap()
        .with_pacing(false);

    let mut rx = backend.start().await.unwrap();
    let first = rx.recv().await.expect("at least one frame");
    assert_eq!(first.samples.len(), 1600);

    backend.stop().await.unwrap();
    assert!(!backend.is_capturing());

    // Channel drains whatever was in flight, then closes
    while rx.recv().await.is_some() {}
}

#[test]
fn file_backend_rejects_missing_file() {
    let result = FileBackend::open("/nonexistent/input.wav", AudioBackendConfig::default());
    assert!(result.is_err());
}

#[test]
fn factory_creates_configured_backends() {
    let dir = TempDir::new().unwrap();
    let path = write_wav(&dir, "tiny.wav", &[1, 2, 3, 4], 16000);

    let file_backend =
        AudioBackendFactory::create(AudioSource::File(path), AudioBackendConfig::default())
            .unwrap();
    assert_eq!(file_backend.name(), "file");

    let mic_backend =
        AudioBackendFactory::create(AudioSource::Microphone, AudioBackendConfig::default())
            .unwrap();
    assert_eq!(mic_backend.name(), "microphone");
}

#[test]
fn factory_surfaces_open_errors() {
    let result = AudioBackendFactory::create(
        AudioSource::File("/nonexistent/input.wav".to_string()),
        AudioBackendConfig::default(),
    );
    assert!(result.is_err());
}
