use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of the adapter's state and counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    /// Whether a session is currently listening
    pub is_listening: bool,

    /// Adapter state name ("idle", "starting", "listening", "stopping")
    pub state: String,

    /// When the current session started, if one is active
    pub started_at: Option<DateTime<Utc>>,

    /// Sessions that have completed since the adapter was spawned
    pub sessions_completed: usize,

    /// Id of the most recent session, active or completed
    pub last_session_id: Option<String>,

    /// Transcript segments accumulated for the current/last session
    pub transcript_segments: usize,
}

/// A single transcript segment received from the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Transcribed text
    pub text: String,

    /// When this segment was received
    pub timestamp: DateTime<Utc>,

    /// Confidence score (0.0 to 1.0), if the engine supplies one
    pub confidence: Option<f32>,

    /// Whether this is a partial (interim) result
    pub partial: bool,
}
