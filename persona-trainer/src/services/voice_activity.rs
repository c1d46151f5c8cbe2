//! Energy-based voice activity detection
//!
//! Frames louder than a percentile of all frame energies count as voice; consecutive voice
//! frames form one segment.

use crate::dsp::stats::{energy_frames, percentile};
use crate::models::video_analysis::TimeRange;

/// Voice activity detector
#[derive(Debug, Clone)]
pub struct VoiceActivityDetector {
    /// Frame length in seconds (default 25 ms)
    frame_seconds: f64,
    /// Hop in seconds (default 10 ms)
    hop_seconds: f64,
    /// Energy percentile above which a frame is voiced (default 70)
    percentile: f64,
}

impl VoiceActivityDetector {
    pub fn new() -> Self {
        Self {
            frame_seconds: 0.025,
            hop_seconds: 0.010,
            percentile: 70.0,
        }
    }

    /// Voice segments in seconds
    pub fn detect(&self, samples: &[f32], sample_rate: u32) -> Vec<TimeRange> {
        if samples.is_empty() || sample_rate == 0 {
            return Vec::new();
        }
        let sr = sample_rate as f64;
        let frame_len = ((self.frame_seconds * sr) as usize).max(1);
        let hop = ((self.hop_seconds * sr) as usize).max(1);

        let energy = energy_frames(samples, frame_len, hop);
        let threshold = percentile(&energy, self.percentile);
        let end_of_signal = samples.len() as f64 / sr;

        let mut segments = Vec::new();
        let mut start: Option<f64> = None;
        for (i, &e) in energy.iter().enumerate() {
            let time = (i * hop) as f64 / sr;
            match (e > threshold, start) {
                (true, None) => start = Some(time),
                (false, Some(s)) => {
                    segments.push(TimeRange::new(s, time));
                    start = None;
                }
                _ => {}
            }
        }
        if let Some(s) = start {
            segments.push(TimeRange::new(s, end_of_signal));
        }
        segments
    }
}

impl Default for VoiceActivityDetector {
    fn default() -> Self {
        Self::new()
    }
}
