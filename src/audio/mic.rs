use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::backend::{AudioBackend, AudioBackendConfig, AudioFrame};

/// Microphone capture backend built on cpal.
///
/// The cpal stream is not Send, so it lives on a dedicated capture thread.
/// The stream callback accumulates mono i16 samples into a shared buffer;
/// the capture thread drains that buffer once per `buffer_duration_ms` and
/// forwards frames into the backend channel.
pub struct MicrophoneBackend {
    config: AudioBackendConfig,
    capturing: Arc<AtomicBool>,
    stop_signal: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl MicrophoneBackend {
    pub fn new(config: AudioBackendConfig) -> Self {
        Self {
            config,
            capturing: Arc::new(AtomicBool::new(false)),
            stop_signal: Arc::new(AtomicBool::new(false)),
            thread: None,
        }
    }

    fn run_capture(
        tx: mpsc::Sender<AudioFrame>,
        buffer_duration_ms: u64,
        capturing: Arc<AtomicBool>,
        stop_signal: Arc<AtomicBool>,
    ) -> Result<()> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| anyhow!("No input device available"))?;

        let supported = device
            .default_input_config()
            .context("Failed to query default input config")?;
        let sample_format = supported.sample_format();
        let stream_config: cpal::StreamConfig = supported.into();
        let sample_rate = stream_config.sample_rate.0;
        let channels = stream_config.channels as usize;

        info!(
            "Microphone capture: {} Hz, {} channels, {:?} samples",
            sample_rate, channels, sample_format
        );

        // Shared buffer between the stream callback and the drain loop
        let pending: Arc<Mutex<Vec<i16>>> = Arc::new(Mutex::new(Vec::new()));

        let err_fn = |err| {
            error!("Audio stream error: {}", err);
        };

        let stream = match sample_format {
            cpal::SampleFormat::F32 => {
                let pending = Arc::clone(&pending);
                device.build_input_stream(
                    &stream_config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        // Average channels to mono and rescale to i16
                        let samples: Vec<i16> = data
                            .chunks(channels)
                            .map(|frame| {
                                let sum: f32 = frame.iter().sum();
                                let mono = sum / channels as f32;
                                (mono.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
                            })
                            .collect();

                        if let Ok(mut buffer) = pending.lock() {
                            buffer.extend(samples);
                        }
                    },
                    err_fn,
                    None,
                )
            }
            cpal::SampleFormat::I16 => {
                let pending = Arc::clone(&pending);
                device.build_input_stream(
                    &stream_config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        let samples: Vec<i16> = data
                            .chunks(channels)
                            .map(|frame| {
                                let sum: i32 = frame.iter().map(|&s| s as i32).sum();
                                (sum / channels as i32) as i16
                            })
                            .collect();

                        if let Ok(mut buffer) = pending.lock() {
                            buffer.extend(samples);
                        }
                    },
                    err_fn,
                    None,
                )
            }
            other => {
                return Err(anyhow!("Unsupported input sample format: {:?}", other));
            }
        }
        .context("Failed to build input stream")?;

        stream.play().context("Failed to start input stream")?;
        capturing.store(true, Ordering::SeqCst);

        let mut timestamp_ms = 0u64;
        while !stop_signal.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(buffer_duration_ms));

            let samples: Vec<i16> = {
                let mut buffer = pending.lock().unwrap_or_else(|e| e.into_inner());
                std::mem::take(&mut *buffer)
            };

            if samples.is_empty() {
                continue;
            }

            let frame = AudioFrame {
                samples,
                sample_rate,
                channels: 1, // callback already mixed to mono
                timestamp_ms,
            };
            timestamp_ms += buffer_duration_ms;

            if tx.blocking_send(frame).is_err() {
                // Receiver gone, session torn down
                break;
            }
        }

        capturing.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait::async_trait]
impl AudioBackend for MicrophoneBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        let (tx, rx) = mpsc::channel(32);

        self.stop_signal.store(false, Ordering::SeqCst);

        let buffer_duration_ms = self.config.buffer_duration_ms;
        let capturing = Arc::clone(&self.capturing);
        let stop_signal = Arc::clone(&self.stop_signal);

        // The stream must be created and dropped on the same thread
        let handle = thread::spawn(move || {
            if let Err(e) =
                Self::run_capture(tx, buffer_duration_ms, Arc::clone(&capturing), stop_signal)
            {
                error!("Microphone capture failed: {:#}", e);
            }
            capturing.store(false, Ordering::SeqCst);
        });

        self.thread = Some(handle);
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        self.stop_signal.store(true, Ordering::SeqCst);

        if let Some(handle) = self.thread.take() {
            let joined = tokio::task::spawn_blocking(move || handle.join()).await;
            if let Ok(Err(_)) = joined {
                warn!("Microphone capture thread panicked");
            }
        }

        info!("Microphone capture stopped");
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "microphone"
    }
}
