use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;

use crate::audio::AudioSource;
use crate::session::SessionConfig;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub audio: AudioConfig,
    pub session: SessionSettings,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "voice-capture".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub buffer_duration_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
            buffer_duration_ms: 100,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub language: String,
    pub report_partials: bool,
    pub inactivity_timeout_secs: u64,
    pub stop_grace_ms: u64,
    pub volume_interval_ms: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            language: "en-US".to_string(),
            report_partials: true,
            inactivity_timeout_secs: 60,
            stop_grace_ms: 2000,
            volume_interval_ms: 200,
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Build the runtime session configuration for the given audio source.
    pub fn session_config(&self, source: AudioSource) -> SessionConfig {
        SessionConfig {
            source,
            language: self.session.language.clone(),
            sample_rate: self.audio.sample_rate,
            channels: self.audio.channels,
            buffer_duration_ms: self.audio.buffer_duration_ms,
            report_partials: self.session.report_partials,
            inactivity_timeout: Duration::from_secs(self.session.inactivity_timeout_secs),
            stop_grace: Duration::from_millis(self.session.stop_grace_ms),
            volume_interval: Duration::from_millis(self.session.volume_interval_ms),
        }
    }
}
