use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Error kinds surfaced to the host on the event channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Authorization refused; retry after the user changes settings
    PermissionDenied,
    /// Caller asked to start while a session was active; informational
    AlreadyListening,
    /// Audio or recognition engine could not initialize
    SetupFailed,
    /// Engine-reported failure mid-session
    Recognition,
    /// No recognition activity within the configured window
    Timeout,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::PermissionDenied => "permission_denied",
            ErrorKind::AlreadyListening => "already_listening",
            ErrorKind::SetupFailed => "setup_failed",
            ErrorKind::Recognition => "recognition",
            ErrorKind::Timeout => "timeout",
        };
        f.write_str(name)
    }
}

/// Event emitted to the host. Delivery order on the sink is emission order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "camelCase")]
pub enum CaptureEvent {
    /// A listening session became active
    SpeechStart(SpeechStartPayload),
    /// A partial or final transcript arrived
    TranscriptUpdate(TranscriptPayload),
    /// Input level report
    VolumeChanged(VolumePayload),
    /// Terminal failure for the attempted or active session
    RecognitionError(ErrorPayload),
    /// The session returned to idle
    SpeechEnd(SpeechEndPayload),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechStartPayload {
    pub session_id: String,
    pub language: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptPayload {
    pub session_id: String,
    pub text: String,
    #[serde(rename = "final")]
    pub is_final: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumePayload {
    pub session_id: String,
    /// RMS input level in dBFS (0.0 = full scale, -96.0 = silence)
    pub rms_db: f32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub session_id: String,
    pub kind: ErrorKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechEndPayload {
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
}

impl CaptureEvent {
    pub fn speech_start(session_id: impl Into<String>, language: impl Into<String>) -> Self {
        CaptureEvent::SpeechStart(SpeechStartPayload {
            session_id: session_id.into(),
            language: language.into(),
            timestamp: Utc::now(),
        })
    }

    pub fn transcript(
        session_id: impl Into<String>,
        text: impl Into<String>,
        is_final: bool,
        confidence: Option<f32>,
    ) -> Self {
        CaptureEvent::TranscriptUpdate(TranscriptPayload {
            session_id: session_id.into(),
            text: text.into(),
            is_final,
            confidence,
            timestamp: Utc::now(),
        })
    }

    pub fn volume(session_id: impl Into<String>, rms_db: f32) -> Self {
        CaptureEvent::VolumeChanged(VolumePayload {
            session_id: session_id.into(),
            rms_db,
            timestamp: Utc::now(),
        })
    }

    pub fn error(
        session_id: impl Into<String>,
        kind: ErrorKind,
        message: impl Into<String>,
    ) -> Self {
        CaptureEvent::RecognitionError(ErrorPayload {
            session_id: session_id.into(),
            kind,
            message: message.into(),
            timestamp: Utc::now(),
        })
    }

    pub fn speech_end(session_id: impl Into<String>) -> Self {
        CaptureEvent::SpeechEnd(SpeechEndPayload {
            session_id: session_id.into(),
            timestamp: Utc::now(),
        })
    }

    /// Event name on the host channel.
    pub fn name(&self) -> &'static str {
        match self {
            CaptureEvent::SpeechStart(_) => "speechStart",
            CaptureEvent::TranscriptUpdate(_) => "transcriptUpdate",
            CaptureEvent::VolumeChanged(_) => "volumeChanged",
            CaptureEvent::RecognitionError(_) => "recognitionError",
            CaptureEvent::SpeechEnd(_) => "speechEnd",
        }
    }

    /// Session the event belongs to.
    pub fn session_id(&self) -> &str {
        match self {
            CaptureEvent::SpeechStart(p) => &p.session_id,
            CaptureEvent::TranscriptUpdate(p) => &p.session_id,
            CaptureEvent::VolumeChanged(p) => &p.session_id,
            CaptureEvent::RecognitionError(p) => &p.session_id,
            CaptureEvent::SpeechEnd(p) => &p.session_id,
        }
    }
}
