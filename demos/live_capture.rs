// Demo: drive a full capture session against the scripted engine
//
// This exercises the complete adapter pipeline:
// 1. Create the capture adapter with a microphone (or WAV file) source
// 2. Start a listening session
// 3. Watch transcript, volume, and lifecycle events arrive
// 4. Stop after a fixed duration and collect the transcript
//
// Usage: cargo run --example live_capture -- --duration 5
//        cargo run --example live_capture -- --file sample.wav

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::time::sleep;
use tracing::{info, Level};
use voice_capture::{
    AudioSource, CaptureAdapter, CaptureEvent, ChannelSink, Config, ScriptedEngine,
};

#[derive(Parser)]
#[command(name = "live_capture")]
#[command(about = "Run one capture session end to end")]
struct Args {
    /// How long to listen before stopping, in seconds
    #[arg(short, long, default_value = "5")]
    duration: u64,

    /// Capture from a WAV file instead of the microphone
    #[arg(long)]
    file: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    let args = Args::parse();

    let source = match args.file {
        Some(path) => AudioSource::File(path),
        None => AudioSource::Microphone,
    };

    let config = Config::default();
    let session_config = config.session_config(source);

    info!("Listening for {} seconds", args.duration);

    let (sink, mut events) = ChannelSink::new();
    let adapter = CaptureAdapter::spawn(
        session_config,
        Arc::new(ScriptedEngine::demo()),
        Box::new(sink),
    );

    adapter.start_listening().await?;

    // Stop after the requested duration, from a separate task the way a
    // host UI would
    let stopper = adapter.clone();
    let duration = args.duration;
    tokio::spawn(async move {
        sleep(Duration::from_secs(duration)).await;
        let _ = stopper.stop_listening().await;
    });

    while let Some(event) = events.recv().await {
        match &event {
            CaptureEvent::TranscriptUpdate(p) => {
                info!("transcript (final={}): {}", p.is_final, p.text);
            }
            CaptureEvent::VolumeChanged(p) => {
                info!("level: {:.1} dBFS", p.rms_db);
            }
            CaptureEvent::RecognitionError(p) => {
                info!("error [{}]: {}", p.kind, p.message);
            }
            other => info!("event: {}", other.name()),
        }

        if matches!(event, CaptureEvent::SpeechEnd(_)) {
            break;
        }
    }

    let transcript = adapter.transcript().await?;
    info!("Collected {} transcript segment(s)", transcript.len());
    for segment in transcript.iter().filter(|s| !s.partial) {
        info!("  {}", segment.text);
    }

    adapter.shutdown().await
}
