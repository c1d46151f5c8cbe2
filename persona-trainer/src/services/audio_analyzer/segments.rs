//! Voice region isolation
//!
//! Frame energy (2048/512) is median-smoothed and thresholded at its 30th percentile; runs of
//! frames above the threshold lasting at least the minimum duration are voice regions.
//! Each region is trimmed (20 dB below its peak), peak-normalized and high-passed at 80 Hz.

use std::ops::Range;

use crate::dsp::filters::{peak_normalize, trim_range, Biquad};
use crate::dsp::stats::{energy_frames, median_filter, percentile};
use crate::dsp::{FRAME_LENGTH, HOP_LENGTH};

pub const DEFAULT_MIN_SEGMENT_SECONDS: f64 = 3.0;

const SMOOTHING_KERNEL: usize = 5;
const SILENCE_PERCENTILE: f64 = 30.0;
const TRIM_TOP_DB: f32 = 20.0;
const HIGHPASS_HZ: f64 = 80.0;

/// Sample ranges of voiced regions at least `min_duration` seconds long
pub fn detect_voice_regions(samples: &[f32], sample_rate: u32, min_duration: f64) -> Vec<Range<usize>> {
    if samples.is_empty() {
        return Vec::new();
    }
    let energy = energy_frames(samples, FRAME_LENGTH, HOP_LENGTH);
    let smooth = median_filter(&energy, SMOOTHING_KERNEL);
    let threshold = percentile(&smooth, SILENCE_PERCENTILE);
    let min_samples = (min_duration * sample_rate as f64) as usize;

    let mut regions = Vec::new();
    let mut start: Option<usize> = None;
    for (i, &e) in smooth.iter().enumerate() {
        let position = (i * HOP_LENGTH).min(samples.len());
        match (e > threshold, start) {
            (true, None) => start = Some(position),
            (false, Some(s)) => {
                if position - s >= min_samples {
                    regions.push(s..position);
                }
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        if samples.len() - s >= min_samples {
            regions.push(s..samples.len());
        }
    }
    regions
}

/// Detect and clean voice regions, dropping any that cleaning shortens below `min_duration`
pub fn clean_voice_regions(samples: &[f32], sample_rate: u32, min_duration: f64) -> Vec<Vec<f32>> {
    let min_samples = (min_duration * sample_rate as f64) as usize;
    let highpass = Biquad::butterworth_highpass(HIGHPASS_HZ, sample_rate);

    detect_voice_regions(samples, sample_rate, min_duration)
        .into_iter()
        .filter_map(|range| {
            let region = &samples[range];
            let kept = trim_range(region, TRIM_TOP_DB, FRAME_LENGTH, HOP_LENGTH);
            if kept.len() < min_samples.max(1) {
                return None;
            }
            let mut cleaned = region[kept].to_vec();
            peak_normalize(&mut cleaned);
            Some(highpass.process(&cleaned))
        })
        .collect()
}
