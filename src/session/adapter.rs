use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::config::SessionConfig;
use super::state::AdapterState;
use super::stats::{SessionStats, TranscriptSegment};
use crate::audio::{
    AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioFrame, LevelMeter,
};
use crate::event::{CaptureEvent, ErrorKind, EventSink};
use crate::speech::{AuthorizationStatus, RecognitionConfig, RecognitionUpdate, SpeechEngine};

/// Handle to the capture adapter.
///
/// Methods send commands to an actor task that owns all session state, so
/// host calls and engine callbacks never race: everything is serialized
/// through one queue. Cloning the handle shares the same adapter.
#[derive(Clone)]
pub struct CaptureAdapter {
    commands: mpsc::Sender<Command>,
    is_listening: Arc<AtomicBool>,
    engine: Arc<dyn SpeechEngine>,
}

enum Command {
    Start,
    Stop,
    Shutdown,
    SetLanguage {
        tag: String,
        reply: oneshot::Sender<bool>,
    },
    GetLanguage {
        reply: oneshot::Sender<String>,
    },
    GetStats {
        reply: oneshot::Sender<SessionStats>,
    },
    GetTranscript {
        reply: oneshot::Sender<Vec<TranscriptSegment>>,
    },
}

impl CaptureAdapter {
    /// Spawn the adapter actor and return its handle.
    pub fn spawn(
        config: SessionConfig,
        engine: Arc<dyn SpeechEngine>,
        sink: Box<dyn EventSink>,
    ) -> Self {
        let (commands, command_rx) = mpsc::channel(16);
        let is_listening = Arc::new(AtomicBool::new(false));

        let actor = Actor {
            language: config.language.clone(),
            config,
            engine: Arc::clone(&engine),
            sink,
            state: AdapterState::Idle,
            is_listening: Arc::clone(&is_listening),
            active: None,
            segments: Vec::new(),
            sessions_completed: 0,
            last_session_id: None,
            started_at: None,
        };

        tokio::spawn(actor.run(command_rx));

        Self {
            commands,
            is_listening,
            engine,
        }
    }

    /// Request a new listening session.
    ///
    /// A no-op (reported as an `already_listening` error event) when a
    /// session is already active. Completion is observed through the
    /// event channel: `speechStart` on success, `recognitionError` with
    /// `permission_denied` or `setup_failed` otherwise.
    pub async fn start_listening(&self) -> Result<()> {
        self.send(Command::Start).await
    }

    /// Request teardown of the active session.
    ///
    /// A silent no-op while idle. End-of-audio is signaled rather than
    /// aborting, so an in-flight final transcript may still arrive before
    /// `speechEnd`.
    pub async fn stop_listening(&self) -> Result<()> {
        self.send(Command::Stop).await
    }

    /// Tear down any active session and terminate the adapter.
    pub async fn shutdown(&self) -> Result<()> {
        // Already-gone is fine here
        let _ = self.commands.send(Command::Shutdown).await;
        Ok(())
    }

    /// True while a session is in the listening state.
    pub fn is_listening(&self) -> bool {
        self.is_listening.load(Ordering::SeqCst)
    }

    /// Whether the recognition engine is available on this device.
    pub fn is_recognition_available(&self) -> bool {
        self.engine.is_available()
    }

    /// Language tags the engine can recognize.
    pub fn supported_languages(&self) -> Vec<String> {
        self.engine.supported_languages()
    }

    /// Language used for the next session.
    pub async fn recognition_language(&self) -> Result<String> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::GetLanguage { reply }).await?;
        rx.await.context("Adapter dropped the request")
    }

    /// Set the recognition language for subsequent sessions.
    ///
    /// Returns false (and changes nothing) for unsupported tags. An
    /// active session keeps the language it started with.
    pub async fn set_recognition_language(&self, tag: &str) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::SetLanguage {
            tag: tag.to_string(),
            reply,
        })
        .await?;
        rx.await.context("Adapter dropped the request")
    }

    /// Snapshot of adapter state and counters.
    pub async fn stats(&self) -> Result<SessionStats> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::GetStats { reply }).await?;
        rx.await.context("Adapter dropped the request")
    }

    /// Transcript segments accumulated for the current or last session.
    pub async fn transcript(&self) -> Result<Vec<TranscriptSegment>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::GetTranscript { reply }).await?;
        rx.await.context("Adapter dropped the request")
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| anyhow!("Capture adapter has shut down"))
    }
}

/// Resources owned by one listening session, released together.
struct ActiveSession {
    session_id: String,
    backend: Box<dyn AudioBackend>,
    updates: mpsc::Receiver<RecognitionUpdate>,
    levels: mpsc::Receiver<f32>,
    levels_done: bool,
    pump: JoinHandle<()>,
    deadline: Instant,
}

impl ActiveSession {
    /// Release every session resource in one place. Aborting the pump
    /// drops the engine's audio sender; dropping `updates` lets the
    /// engine task finish.
    async fn teardown(mut self) {
        if let Err(e) = self.backend.stop().await {
            warn!("Failed to stop audio backend: {:#}", e);
        }
        self.pump.abort();
    }
}

enum Wake {
    Command(Option<Command>),
    Update(Option<RecognitionUpdate>),
    Level(Option<f32>),
    Deadline,
}

enum Flow {
    Continue,
    Shutdown,
}

struct Actor {
    config: SessionConfig,
    engine: Arc<dyn SpeechEngine>,
    sink: Box<dyn EventSink>,
    state: AdapterState,
    is_listening: Arc<AtomicBool>,
    language: String,
    active: Option<ActiveSession>,
    segments: Vec<TranscriptSegment>,
    sessions_completed: usize,
    last_session_id: Option<String>,
    started_at: Option<DateTime<Utc>>,
}

impl Actor {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        info!("Capture adapter started (engine: {})", self.engine.name());

        loop {
            let wake = match self.active.as_mut() {
                Some(active) => {
                    tokio::select! {
                        cmd = commands.recv() => Wake::Command(cmd),
                        update = active.updates.recv() => Wake::Update(update),
                        level = active.levels.recv(), if !active.levels_done => Wake::Level(level),
                        _ = tokio::time::sleep_until(active.deadline) => Wake::Deadline,
                    }
                }
                None => Wake::Command(commands.recv().await),
            };

            match wake {
                Wake::Command(None) => {
                    // Every handle dropped; release whatever is held
                    self.finish_session(false).await;
                    break;
                }
                Wake::Command(Some(command)) => {
                    if let Flow::Shutdown = self.handle_command(command).await {
                        break;
                    }
                }
                Wake::Update(update) => self.handle_update(update).await,
                Wake::Level(Some(rms_db)) => {
                    if let Some(active) = self.active.as_ref() {
                        let event = CaptureEvent::volume(&active.session_id, rms_db);
                        self.sink.emit(event).await;
                    }
                }
                Wake::Level(None) => {
                    if let Some(active) = self.active.as_mut() {
                        active.levels_done = true;
                    }
                }
                Wake::Deadline => self.handle_deadline().await,
            }
        }

        info!("Capture adapter terminated");
    }

    async fn handle_command(&mut self, command: Command) -> Flow {
        match command {
            Command::Start => {
                if self.state.is_active() {
                    warn!("Start requested while {}", self.state.as_str());
                    let session_id = self
                        .active
                        .as_ref()
                        .map(|a| a.session_id.clone())
                        .unwrap_or_default();
                    self.sink
                        .emit(CaptureEvent::error(
                            session_id,
                            ErrorKind::AlreadyListening,
                            "Speech recognition already in progress",
                        ))
                        .await;
                } else {
                    self.start_session().await;
                }
                Flow::Continue
            }

            Command::Stop => {
                match self.state {
                    AdapterState::Idle => {
                        debug!("Stop requested while idle; nothing to do");
                    }
                    AdapterState::Stopping => {
                        debug!("Stop requested while already stopping");
                    }
                    _ => self.begin_stop().await,
                }
                Flow::Continue
            }

            Command::Shutdown => {
                info!("Shutting down capture adapter");
                let had_session = self.active.is_some();
                self.finish_session(had_session).await;
                Flow::Shutdown
            }

            Command::SetLanguage { tag, reply } => {
                let supported = self.engine.supported_languages().contains(&tag);
                if supported {
                    info!("Recognition language set to {}", tag);
                    self.language = tag;
                } else {
                    warn!("Rejected unsupported recognition language: {}", tag);
                }
                let _ = reply.send(supported);
                Flow::Continue
            }

            Command::GetLanguage { reply } => {
                let _ = reply.send(self.language.clone());
                Flow::Continue
            }

            Command::GetStats { reply } => {
                let _ = reply.send(SessionStats {
                    is_listening: self.state == AdapterState::Listening,
                    state: self.state.as_str().to_string(),
                    started_at: self.started_at,
                    sessions_completed: self.sessions_completed,
                    last_session_id: self.last_session_id.clone(),
                    transcript_segments: self.segments.len(),
                });
                Flow::Continue
            }

            Command::GetTranscript { reply } => {
                let _ = reply.send(self.segments.clone());
                Flow::Continue
            }
        }
    }

    async fn start_session(&mut self) {
        self.state = AdapterState::Starting;

        let session_id = format!("capture-{}", Uuid::new_v4());
        info!("Starting capture session: {}", session_id);
        self.last_session_id = Some(session_id.clone());

        // Authorization first; nothing is acquired on refusal
        match self.engine.request_authorization().await {
            AuthorizationStatus::Authorized => {}
            status => {
                warn!("Speech authorization refused: {:?}", status);
                self.sink
                    .emit(CaptureEvent::error(
                        &session_id,
                        ErrorKind::PermissionDenied,
                        "Speech recognition authorization was not granted",
                    ))
                    .await;
                self.state = AdapterState::Idle;
                return;
            }
        }

        if !self.engine.is_available() {
            self.sink
                .emit(CaptureEvent::error(
                    &session_id,
                    ErrorKind::SetupFailed,
                    "Speech recognition is not available on this device",
                ))
                .await;
            self.state = AdapterState::Idle;
            return;
        }

        let backend_config = AudioBackendConfig {
            target_sample_rate: self.config.sample_rate,
            target_channels: self.config.channels,
            buffer_duration_ms: self.config.buffer_duration_ms,
        };

        let mut backend =
            match AudioBackendFactory::create(self.config.source.clone(), backend_config) {
                Ok(backend) => backend,
                Err(e) => {
                    self.fail_setup(&session_id, format!("Audio backend unavailable: {:#}", e))
                        .await;
                    return;
                }
            };

        let audio_rx = match backend.start().await {
            Ok(rx) => rx,
            Err(e) => {
                self.fail_setup(&session_id, format!("Audio capture failed to start: {:#}", e))
                    .await;
                return;
            }
        };

        let recognition_config = RecognitionConfig {
            language: self.language.clone(),
            sample_rate: self.config.sample_rate,
            channels: self.config.channels,
            report_partials: self.config.report_partials,
        };

        let stream = match self.engine.start_recognition(recognition_config).await {
            Ok(stream) => stream,
            Err(e) => {
                // Release the partially-acquired audio input
                if let Err(stop_err) = backend.stop().await {
                    warn!("Failed to release audio backend: {:#}", stop_err);
                }
                self.fail_setup(&session_id, format!("Recognition failed to start: {:#}", e))
                    .await;
                return;
            }
        };

        let (level_tx, level_rx) = mpsc::channel(8);
        let pump = tokio::spawn(pump_frames(
            audio_rx,
            stream.audio,
            level_tx,
            self.config.sample_rate,
            self.config.channels,
            self.config.volume_interval,
        ));

        self.segments.clear();
        self.started_at = Some(Utc::now());
        self.active = Some(ActiveSession {
            session_id: session_id.clone(),
            backend,
            updates: stream.updates,
            levels: level_rx,
            levels_done: false,
            pump,
            deadline: Instant::now() + self.config.inactivity_timeout,
        });

        self.state = AdapterState::Listening;
        self.is_listening.store(true, Ordering::SeqCst);
        self.sink
            .emit(CaptureEvent::speech_start(&session_id, &self.language))
            .await;
        info!("Capture session listening: {}", session_id);
    }

    async fn fail_setup(&mut self, session_id: &str, message: String) {
        warn!("Session setup failed: {}", message);
        self.sink
            .emit(CaptureEvent::error(
                session_id,
                ErrorKind::SetupFailed,
                message,
            ))
            .await;
        self.state = AdapterState::Idle;
    }

    async fn begin_stop(&mut self) {
        self.state = AdapterState::Stopping;
        self.is_listening.store(false, Ordering::SeqCst);

        if let Some(active) = self.active.as_mut() {
            info!("Stopping capture session: {}", active.session_id);

            // Stopping the backend closes the frame channel; the pump then
            // drains and drops the engine's audio sender, which is the
            // end-of-audio signal. The engine gets a grace period to
            // finalize in-flight audio before teardown is forced.
            if let Err(e) = active.backend.stop().await {
                warn!("Failed to stop audio backend: {:#}", e);
            }
            active.deadline = Instant::now() + self.config.stop_grace;
        }
    }

    async fn handle_update(&mut self, update: Option<RecognitionUpdate>) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        let session_id = active.session_id.clone();

        match update {
            Some(RecognitionUpdate::Partial { text, confidence }) => {
                self.segments.push(TranscriptSegment {
                    text: text.clone(),
                    timestamp: Utc::now(),
                    confidence,
                    partial: true,
                });

                if self.state == AdapterState::Listening {
                    // Activity observed; push the inactivity deadline out
                    active.deadline = Instant::now() + self.config.inactivity_timeout;
                }

                self.sink
                    .emit(CaptureEvent::transcript(session_id, text, false, confidence))
                    .await;
            }

            Some(RecognitionUpdate::Final { text, confidence }) => {
                info!("Final transcript for {}: {:?}", session_id, text);
                self.segments.push(TranscriptSegment {
                    text: text.clone(),
                    timestamp: Utc::now(),
                    confidence,
                    partial: false,
                });
                self.sink
                    .emit(CaptureEvent::transcript(session_id, text, true, confidence))
                    .await;
                self.finish_session(true).await;
            }

            Some(RecognitionUpdate::Error { message }) => {
                warn!("Recognition error for {}: {}", session_id, message);
                self.sink
                    .emit(CaptureEvent::error(
                        session_id,
                        ErrorKind::Recognition,
                        message,
                    ))
                    .await;
                self.finish_session(true).await;
            }

            // Engine closed the stream without a final result
            None => {
                debug!("Recognition stream closed for {}", session_id);
                self.finish_session(true).await;
            }
        }
    }

    async fn handle_deadline(&mut self) {
        match self.state {
            AdapterState::Listening => {
                let session_id = self
                    .active
                    .as_ref()
                    .map(|a| a.session_id.clone())
                    .unwrap_or_default();
                warn!("Inactivity timeout for {}", session_id);
                self.sink
                    .emit(CaptureEvent::error(
                        session_id,
                        ErrorKind::Timeout,
                        format!(
                            "No recognition activity for {:.0?}",
                            self.config.inactivity_timeout
                        ),
                    ))
                    .await;
                self.finish_session(true).await;
            }
            AdapterState::Stopping => {
                warn!("Stop grace period elapsed; forcing teardown");
                self.finish_session(true).await;
            }
            _ => {}
        }
    }

    async fn finish_session(&mut self, emit_end: bool) {
        if let Some(active) = self.active.take() {
            let session_id = active.session_id.clone();
            active.teardown().await;
            self.sessions_completed += 1;
            info!("Capture session finished: {}", session_id);

            if emit_end {
                self.sink.emit(CaptureEvent::speech_end(session_id)).await;
            }
        }

        self.started_at = None;
        self.state = AdapterState::Idle;
        self.is_listening.store(false, Ordering::SeqCst);
    }
}

/// Forward captured frames into the recognition stream, normalizing format
/// and reporting input levels along the way. Ends when capture stops;
/// dropping the recognition sender is the end-of-audio signal.
async fn pump_frames(
    mut audio_rx: mpsc::Receiver<AudioFrame>,
    audio_tx: mpsc::Sender<AudioFrame>,
    levels: mpsc::Sender<f32>,
    target_sample_rate: u32,
    target_channels: u16,
    volume_interval: Duration,
) {
    let mut meter = LevelMeter::new(volume_interval);

    while let Some(frame) = audio_rx.recv().await {
        let frame = normalize_frame(frame, target_sample_rate, target_channels);

        if let Some(rms_db) = meter.update(&frame) {
            // Level reports are best-effort; never stall audio on them
            let _ = levels.try_send(rms_db);
        }

        if audio_tx.send(frame).await.is_err() {
            break;
        }
    }
}

/// Normalize a frame to the target format
fn normalize_frame(frame: AudioFrame, target_sample_rate: u32, target_channels: u16) -> AudioFrame {
    let mut processed = frame;

    if processed.sample_rate != target_sample_rate {
        processed = downsample_frame(processed, target_sample_rate);
    }

    if processed.channels != target_channels && target_channels == 1 {
        processed = stereo_to_mono(processed);
    }

    processed
}

/// Downsample audio frame by decimation
fn downsample_frame(frame: AudioFrame, target_rate: u32) -> AudioFrame {
    if frame.sample_rate == target_rate {
        return frame;
    }

    let ratio = frame.sample_rate / target_rate;
    if ratio <= 1 {
        return frame; // Can't upsample
    }

    let downsampled: Vec<i16> = frame
        .samples
        .iter()
        .step_by(ratio as usize)
        .copied()
        .collect();

    AudioFrame {
        samples: downsampled,
        sample_rate: target_rate,
        channels: frame.channels,
        timestamp_ms: frame.timestamp_ms,
    }
}

/// Convert stereo to mono by summing channels
fn stereo_to_mono(frame: AudioFrame) -> AudioFrame {
    if frame.channels == 1 {
        return frame;
    }

    if frame.channels != 2 {
        return frame; // Only support stereo -> mono
    }

    let mut mono_samples = Vec::with_capacity(frame.samples.len() / 2);

    for chunk in frame.samples.chunks_exact(2) {
        let left = chunk[0] as i32;
        let right = chunk[1] as i32;
        let sum = left + right;
        let mono = sum.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
        mono_samples.push(mono);
    }

    AudioFrame {
        samples: mono_samples,
        sample_rate: frame.sample_rate,
        channels: 1,
        timestamp_ms: frame.timestamp_ms,
    }
}
