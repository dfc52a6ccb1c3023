use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use voice_capture::{
    AudioSource, CaptureAdapter, CaptureEvent, ChannelSink, Config, ErrorKind, ScriptedEngine,
    SpeechEngine,
};

#[derive(Parser)]
#[command(name = "voice-capture")]
#[command(about = "Voice capture adapter bridging audio input and speech recognition")]
struct Cli {
    /// Path to a config file (TOML); defaults apply when omitted
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start a listening session and print events until it ends
    Listen {
        /// Capture from a WAV file instead of the microphone
        #[arg(long)]
        file: Option<String>,

        /// Recognition language tag (e.g. en-US)
        #[arg(long)]
        language: Option<String>,

        /// Print events as JSON lines instead of formatted text
        #[arg(long)]
        json: bool,
    },

    /// List languages the recognition engine supports
    Languages,

    /// Report engine availability and authorization
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    info!("{} starting", config.service.name);

    // The platform recognizer is a host-supplied collaborator; the bundled
    // scripted engine stands in so the adapter can be exercised anywhere.
    let engine: Arc<dyn SpeechEngine> = Arc::new(ScriptedEngine::demo());

    match cli.command {
        Command::Listen {
            file,
            language,
            json,
        } => listen(&config, engine, file, language, json).await,
        Command::Languages => {
            for tag in engine.supported_languages() {
                println!("{}", tag);
            }
            Ok(())
        }
        Command::Check => {
            let status = engine.request_authorization().await;
            println!("engine: {}", engine.name());
            println!("available: {}", engine.is_available());
            println!("authorization: {:?}", status);
            Ok(())
        }
    }
}

async fn listen(
    config: &Config,
    engine: Arc<dyn SpeechEngine>,
    file: Option<String>,
    language: Option<String>,
    json: bool,
) -> Result<()> {
    let source = match file {
        Some(path) => AudioSource::File(path),
        None => AudioSource::Microphone,
    };

    let session_config = config.session_config(source);

    let (sink, mut events) = ChannelSink::new();
    let adapter = CaptureAdapter::spawn(session_config, engine, Box::new(sink));

    if let Some(tag) = language {
        if !adapter.set_recognition_language(&tag).await? {
            anyhow::bail!("Unsupported language: {}", tag);
        }
    }

    adapter.start_listening().await?;
    info!("Listening; press Ctrl+C to stop");

    loop {
        tokio::select! {
            maybe_event = events.recv() => {
                let Some(event) = maybe_event else { break };
                if json {
                    println!("{}", serde_json::to_string(&event)?);
                }
                if render_event(&event, json) {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Stop requested");
                adapter.stop_listening().await?;
            }
        }
    }

    let transcript = adapter.transcript().await?;
    if let Some(last) = transcript.iter().rev().find(|s| !s.partial) {
        println!("\nTranscript: {}", last.text);
    }

    let stats = adapter.stats().await?;
    info!(
        "Done: {} session(s), {} transcript segment(s)",
        stats.sessions_completed, stats.transcript_segments
    );

    adapter.shutdown().await
}

/// Render one event; returns true when the session is over.
fn render_event(event: &CaptureEvent, json: bool) -> bool {
    match event {
        CaptureEvent::SpeechStart(p) => {
            info!("Session {} listening ({})", p.session_id, p.language);
            false
        }
        CaptureEvent::TranscriptUpdate(p) => {
            if !json {
                if p.is_final {
                    println!("\r{}", p.text);
                } else {
                    print!("\r{}", p.text);
                    let _ = std::io::Write::flush(&mut std::io::stdout());
                }
            }
            false
        }
        CaptureEvent::VolumeChanged(p) => {
            tracing::debug!("Input level: {:.1} dBFS", p.rms_db);
            false
        }
        CaptureEvent::RecognitionError(p) => {
            if !json {
                eprintln!("error [{}]: {}", p.kind, p.message);
            }
            // These end the attempt without a speechEnd
            matches!(p.kind, ErrorKind::PermissionDenied | ErrorKind::SetupFailed)
        }
        CaptureEvent::SpeechEnd(p) => {
            info!("Session {} ended", p.session_id);
            true
        }
    }
}
