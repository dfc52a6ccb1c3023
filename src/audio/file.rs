use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use hound::WavReader;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use super::backend::{AudioBackend, AudioBackendConfig, AudioFrame};

/// Audio backend that replays a WAV file as if it were live capture.
///
/// Frames are delivered at `buffer_duration_ms` granularity. With pacing
/// enabled (the default) delivery is spaced in real time; with pacing
/// disabled the file drains as fast as the receiver accepts it.
pub struct FileBackend {
    path: String,
    samples: Vec<i16>,
    sample_rate: u32,
    channels: u16,
    config: AudioBackendConfig,
    paced: bool,
    capturing: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl FileBackend {
    /// Open and validate a WAV file, reading all samples up front.
    pub fn open(path: impl AsRef<Path>, config: AudioBackendConfig) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path).context("Failed to open WAV file")?;

        let spec = reader.spec();
        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?;

        let duration_seconds =
            samples.len() as f64 / (spec.sample_rate as f64 * spec.channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            samples,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            config,
            paced: true,
            capturing: Arc::new(AtomicBool::new(false)),
            task: None,
        })
    }

    /// Enable or disable real-time pacing of frame delivery.
    pub fn with_pacing(mut self, paced: bool) -> Self {
        self.paced = paced;
        self
    }

    /// Samples per delivered frame (all channels, one buffer duration).
    fn samples_per_frame(&self) -> usize {
        let per_channel =
            self.sample_rate as u64 * self.config.buffer_duration_ms / 1000;
        (per_channel.max(1) as usize) * self.channels as usize
    }
}

#[async_trait::async_trait]
impl AudioBackend for FileBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        let (tx, rx) = mpsc::channel(32);

        let samples = self.samples.clone();
        let sample_rate = self.sample_rate;
        let channels = self.channels;
        let frame_len = self.samples_per_frame();
        let frame_ms = self.config.buffer_duration_ms;
        let paced = self.paced;
        let capturing = Arc::clone(&self.capturing);

        capturing.store(true, Ordering::SeqCst);
        info!("File capture started: {}", self.path);

        let task = tokio::spawn(async move {
            let mut timestamp_ms = 0u64;

            for chunk in samples.chunks(frame_len) {
                if !capturing.load(Ordering::SeqCst) {
                    break;
                }

                if paced {
                    tokio::time::sleep(Duration::from_millis(frame_ms)).await;
                }

                let frame = AudioFrame {
                    samples: chunk.to_vec(),
                    sample_rate,
                    channels,
                    timestamp_ms,
                };
                timestamp_ms += frame_ms;

                if tx.send(frame).await.is_err() {
                    break;
                }
            }

            capturing.store(false, Ordering::SeqCst);
        });

        self.task = Some(task);
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        self.capturing.store(false, Ordering::SeqCst);

        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }

        info!("File capture stopped: {}", self.path);
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "file"
    }
}
