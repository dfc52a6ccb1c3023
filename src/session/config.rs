use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::audio::AudioSource;

/// Configuration for the capture adapter and its sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Where audio comes from
    pub source: AudioSource,

    /// BCP-47 language tag for recognition (e.g. "en-US")
    pub language: String,

    /// Sample rate frames are normalized to before recognition
    pub sample_rate: u32,

    /// Channel count frames are normalized to (1 = mono)
    pub channels: u16,

    /// Capture buffer granularity in milliseconds
    pub buffer_duration_ms: u64,

    /// Whether in-progress transcripts are forwarded to the host
    pub report_partials: bool,

    /// A session with no recognition activity for this long is torn down
    /// with a timeout error
    pub inactivity_timeout: Duration,

    /// How long a stop waits for the engine to finalize in-flight audio
    /// before forcing teardown
    pub stop_grace: Duration,

    /// Minimum spacing between volume level events
    pub volume_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            source: AudioSource::Microphone,
            language: "en-US".to_string(),
            sample_rate: 16000, // what recognizers expect
            channels: 1,        // Mono
            buffer_duration_ms: 100,
            report_partials: true,
            inactivity_timeout: Duration::from_secs(60),
            stop_grace: Duration::from_secs(2),
            volume_interval: Duration::from_millis(200),
        }
    }
}
