use std::time::Duration;

use anyhow::{bail, Result};
use tokio::sync::mpsc;
use tracing::info;

use super::engine::{
    AuthorizationStatus, RecognitionConfig, RecognitionStream, RecognitionUpdate, SpeechEngine,
};

/// Deterministic engine that plays back a scripted update sequence.
///
/// Stands in for a platform recognizer in tests, demos, and on machines
/// without one. The script stops at the first terminal update; after the
/// script runs out the session stays open until end-of-audio unless
/// `hold_open` keeps it pinned past that too.
pub struct ScriptedEngine {
    script: Vec<RecognitionUpdate>,
    step_delay: Duration,
    authorization: AuthorizationStatus,
    available: bool,
    fail_setup: bool,
    hold_open: bool,
    languages: Vec<String>,
}

impl ScriptedEngine {
    pub fn new(script: Vec<RecognitionUpdate>) -> Self {
        Self {
            script,
            step_delay: Duration::from_millis(50),
            authorization: AuthorizationStatus::Authorized,
            available: true,
            fail_setup: false,
            hold_open: false,
            languages: vec![
                "en-US".to_string(),
                "en-GB".to_string(),
                "fr-FR".to_string(),
                "de-DE".to_string(),
                "es-ES".to_string(),
                "ja-JP".to_string(),
            ],
        }
    }

    /// Canned demo script used by the CLI and the live_capture demo.
    pub fn demo() -> Self {
        Self::new(vec![
            RecognitionUpdate::Partial {
                text: "hello".to_string(),
                confidence: None,
            },
            RecognitionUpdate::Partial {
                text: "hello world".to_string(),
                confidence: None,
            },
            RecognitionUpdate::Final {
                text: "hello world".to_string(),
                confidence: Some(0.94),
            },
        ])
        .with_step_delay(Duration::from_millis(600))
    }

    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    pub fn with_authorization(mut self, status: AuthorizationStatus) -> Self {
        self.authorization = status;
        self
    }

    pub fn with_availability(mut self, available: bool) -> Self {
        self.available = available;
        self
    }

    /// Make `start_recognition` fail outright.
    pub fn with_setup_failure(mut self) -> Self {
        self.fail_setup = true;
        self
    }

    /// Keep the update stream open after the script runs out, even once
    /// end-of-audio is seen. Lets callers exercise timeout handling.
    pub fn with_hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }
}

#[async_trait::async_trait]
impl SpeechEngine for ScriptedEngine {
    async fn request_authorization(&self) -> AuthorizationStatus {
        self.authorization
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn supported_languages(&self) -> Vec<String> {
        self.languages.clone()
    }

    async fn start_recognition(&self, config: RecognitionConfig) -> Result<RecognitionStream> {
        if self.fail_setup {
            bail!("Scripted engine configured to fail setup");
        }

        info!(
            "Scripted recognition session: language={}, {} Hz, partials={}",
            config.language, config.sample_rate, config.report_partials
        );

        let (audio_tx, mut audio_rx) = mpsc::channel(64);
        let (update_tx, update_rx) = mpsc::channel(64);

        let script = self.script.clone();
        let step_delay = self.step_delay;
        let report_partials = config.report_partials;
        let hold_open = self.hold_open;

        tokio::spawn(async move {
            // Drain incoming audio so the capture pump never backs up;
            // recv returning None is the end-of-audio signal.
            let drained = tokio::spawn(async move { while audio_rx.recv().await.is_some() {} });

            for update in script {
                tokio::time::sleep(step_delay).await;

                let terminal = update.is_terminal();
                if !report_partials && matches!(update, RecognitionUpdate::Partial { .. }) {
                    continue;
                }
                if update_tx.send(update).await.is_err() {
                    break;
                }
                if terminal {
                    break;
                }
            }

            if hold_open {
                // Stay pinned until the session abandons the stream
                update_tx.closed().await;
            } else {
                // Wait for end-of-audio, then close `updates` by dropping
                let _ = drained.await;
            }
        });

        Ok(RecognitionStream {
            audio: audio_tx,
            updates: update_rx,
        })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
