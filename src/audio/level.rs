use std::time::Duration;

use super::backend::AudioFrame;

/// Floor for level reports; silence and empty frames report this.
pub const SILENCE_DBFS: f32 = -96.0;

/// RMS level of a frame in dBFS (0.0 = full scale).
pub fn rms_dbfs(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return SILENCE_DBFS;
    }

    let sum_squares: f64 = samples
        .iter()
        .map(|&s| {
            let normalized = s as f64 / i16::MAX as f64;
            normalized * normalized
        })
        .sum();

    let rms = (sum_squares / samples.len() as f64).sqrt();
    if rms <= 0.0 {
        return SILENCE_DBFS;
    }

    (20.0 * rms.log10()).max(SILENCE_DBFS as f64) as f32
}

/// Throttles level reports to at most one per interval.
///
/// Driven by frame timestamps rather than wall clock so replayed files
/// produce the same report cadence as live capture.
pub struct LevelMeter {
    interval_ms: u64,
    last_report_ms: Option<u64>,
}

impl LevelMeter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval_ms: interval.as_millis() as u64,
            last_report_ms: None,
        }
    }

    /// Feed one frame; returns a dBFS level when a report is due.
    pub fn update(&mut self, frame: &AudioFrame) -> Option<f32> {
        let due = match self.last_report_ms {
            None => true,
            Some(last) => frame.timestamp_ms.saturating_sub(last) >= self.interval_ms,
        };

        if !due {
            return None;
        }

        self.last_report_ms = Some(frame.timestamp_ms);
        Some(rms_dbfs(&frame.samples))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(samples: Vec<i16>, timestamp_ms: u64) -> AudioFrame {
        AudioFrame {
            samples,
            sample_rate: 16000,
            channels: 1,
            timestamp_ms,
        }
    }

    #[test]
    fn silence_reports_floor() {
        assert_eq!(rms_dbfs(&[0; 160]), SILENCE_DBFS);
        assert_eq!(rms_dbfs(&[]), SILENCE_DBFS);
    }

    #[test]
    fn full_scale_reports_near_zero() {
        let level = rms_dbfs(&[i16::MAX; 160]);
        assert!(level > -0.1 && level <= 0.0, "got {}", level);
    }

    #[test]
    fn half_scale_is_about_minus_six() {
        let level = rms_dbfs(&[i16::MAX / 2; 160]);
        assert!((level - (-6.0)).abs() < 0.2, "got {}", level);
    }

    #[test]
    fn meter_throttles_by_frame_timestamp() {
        let mut meter = LevelMeter::new(Duration::from_millis(200));

        assert!(meter.update(&frame(vec![100; 160], 0)).is_some());
        assert!(meter.update(&frame(vec![100; 160], 100)).is_none());
        assert!(meter.update(&frame(vec![100; 160], 200)).is_some());
        assert!(meter.update(&frame(vec![100; 160], 300)).is_none());
        assert!(meter.update(&frame(vec![100; 160], 450)).is_some());
    }
}
