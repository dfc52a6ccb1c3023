use anyhow::Result;
use tokio::sync::mpsc;

use crate::audio::AudioFrame;

/// Outcome of an authorization request against the recognition engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationStatus {
    /// The user granted microphone/speech access
    Authorized,
    /// The user refused access; retry is a host decision
    Denied,
    /// No decision yet and the engine could not prompt
    Undetermined,
}

/// Parameters for one recognition session.
#[derive(Debug, Clone)]
pub struct RecognitionConfig {
    /// BCP-47 language tag, e.g. "en-US"
    pub language: String,
    /// Sample rate of the audio pushed into the session
    pub sample_rate: u32,
    /// Channel count of the audio pushed into the session
    pub channels: u16,
    /// Whether the engine should emit in-progress results
    pub report_partials: bool,
}

/// One in-flight recognition session.
///
/// Audio goes in through `audio`; results come out of `updates`. Dropping
/// the `audio` sender is the end-of-audio signal: the engine finalizes
/// whatever it has heard and then closes `updates`. There is no abort on
/// this surface; abandoning `updates` tears the session down.
pub struct RecognitionStream {
    pub audio: mpsc::Sender<AudioFrame>,
    pub updates: mpsc::Receiver<RecognitionUpdate>,
}

/// Incremental output from a recognition session.
#[derive(Debug, Clone)]
pub enum RecognitionUpdate {
    /// In-progress result; the text may still change
    Partial {
        text: String,
        confidence: Option<f32>,
    },
    /// Last, stable result for the session
    Final {
        text: String,
        confidence: Option<f32>,
    },
    /// Terminal failure; no further updates follow
    Error { message: String },
}

impl RecognitionUpdate {
    /// Whether this update ends the session.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RecognitionUpdate::Final { .. } | RecognitionUpdate::Error { .. }
        )
    }
}

/// Speech recognition engine trait
///
/// The engine owns its own lifetime; sessions borrow it. One engine may
/// serve many sequential sessions.
#[async_trait::async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Request authorization to recognize speech, prompting if the
    /// platform supports it. Safe to call repeatedly.
    async fn request_authorization(&self) -> AuthorizationStatus;

    /// Whether recognition is currently available on this device
    fn is_available(&self) -> bool;

    /// Language tags this engine can recognize
    fn supported_languages(&self) -> Vec<String>;

    /// Open a recognition session bound to a live audio stream
    async fn start_recognition(&self, config: RecognitionConfig) -> Result<RecognitionStream>;

    /// Get engine name for logging
    fn name(&self) -> &str;
}
