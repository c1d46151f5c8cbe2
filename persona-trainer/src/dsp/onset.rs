//! Onset strength, onset picking, tempo estimation and beat tracking

use super::spectrum::Spectrogram;

const ONSET_COMPRESSION: f32 = 1000.0;
const PEAK_HALF_WINDOW: usize = 3;
const PEAK_AVG_WINDOW: usize = 10;
const PEAK_DELTA: f32 = 0.07;
const PEAK_WAIT: usize = 3;

const TEMPO_MIN_BPM: f32 = 30.0;
const TEMPO_MAX_BPM: f32 = 300.0;
const TEMPO_PRIOR_BPM: f32 = 120.0;

/// Half-wave rectified spectral flux on log-compressed magnitudes
pub fn onset_envelope(spec: &Spectrogram) -> Vec<f32> {
    let mut envelope = Vec::with_capacity(spec.frame_count());
    let mut previous: Option<Vec<f32>> = None;
    for row in &spec.magnitudes {
        let compressed: Vec<f32> = row.iter().map(|m| (1.0 + ONSET_COMPRESSION * m).ln()).collect();
        let flux = match &previous {
            Some(prev) => compressed
                .iter()
                .zip(prev)
                .map(|(c, p)| (c - p).max(0.0))
                .sum::<f32>()
                / compressed.len().max(1) as f32,
            None => 0.0,
        };
        envelope.push(flux);
        previous = Some(compressed);
    }
    envelope
}

/// Frame indices of onset peaks
///
/// A frame is an onset when it is the maximum of its ±3 neighbourhood, exceeds the local mean
/// of its ±10 neighbourhood by `PEAK_DELTA` (on the max-normalized envelope), and is at least
/// `PEAK_WAIT` frames after the previous onset.
pub fn detect_onsets(envelope: &[f32]) -> Vec<usize> {
    let peak = envelope.iter().copied().fold(0.0f32, f32::max);
    if peak <= 0.0 {
        return Vec::new();
    }
    let normalized: Vec<f32> = envelope.iter().map(|v| v / peak).collect();
    let n = normalized.len();

    let mut onsets: Vec<usize> = Vec::new();
    for i in 0..n {
        let lo = i.saturating_sub(PEAK_HALF_WINDOW);
        let hi = (i + PEAK_HALF_WINDOW + 1).min(n);
        let local_max = normalized[lo..hi].iter().copied().fold(f32::MIN, f32::max);
        if normalized[i] < local_max {
            continue;
        }

        let lo = i.saturating_sub(PEAK_AVG_WINDOW);
        let hi = (i + PEAK_AVG_WINDOW + 1).min(n);
        let local_mean = normalized[lo..hi].iter().sum::<f32>() / (hi - lo) as f32;
        if normalized[i] < local_mean + PEAK_DELTA {
            continue;
        }

        if onsets.last().is_some_and(|&last| i - last <= PEAK_WAIT) {
            continue;
        }
        onsets.push(i);
    }
    onsets
}

/// Global tempo in BPM from the onset envelope autocorrelation
///
/// Lags are restricted to 30-300 BPM and weighted by a log-normal prior centred on 120 BPM
/// (one octave standard deviation). Returns 0 when the envelope carries no energy.
pub fn estimate_tempo(envelope: &[f32], sample_rate: u32, hop: usize) -> f32 {
    let frames_per_minute = 60.0 * sample_rate as f32 / hop as f32;
    let min_lag = (frames_per_minute / TEMPO_MAX_BPM).floor().max(1.0) as usize;
    let max_lag = ((frames_per_minute / TEMPO_MIN_BPM).ceil() as usize).min(envelope.len().saturating_sub(1));
    if max_lag < min_lag || envelope.iter().all(|&v| v <= 0.0) {
        return 0.0;
    }

    let mean = envelope.iter().sum::<f32>() / envelope.len() as f32;
    let centered: Vec<f32> = envelope.iter().map(|v| v - mean).collect();

    let mut best: Option<(f32, usize)> = None;
    for lag in min_lag..=max_lag {
        let ac: f32 = centered
            .iter()
            .zip(&centered[lag..])
            .map(|(a, b)| a * b)
            .sum();
        let bpm = frames_per_minute / lag as f32;
        let octaves = (bpm / TEMPO_PRIOR_BPM).log2();
        let weighted = ac * (-0.5 * octaves * octaves).exp();
        match best {
            Some((score, _)) if score >= weighted => {}
            _ => best = Some((weighted, lag)),
        }
    }

    match best {
        Some((score, lag)) if score > 0.0 => frames_per_minute / lag as f32,
        _ => 0.0,
    }
}

/// Beat frame indices for a given tempo
///
/// Starts at the strongest frame of the first period, then repeatedly searches ±10% of a
/// period around the next expected position for the strongest frame.
pub fn track_beats(envelope: &[f32], tempo_bpm: f32, sample_rate: u32, hop: usize) -> Vec<usize> {
    if tempo_bpm <= 0.0 || envelope.is_empty() {
        return Vec::new();
    }
    let period = 60.0 * sample_rate as f32 / (hop as f32 * tempo_bpm);
    let period_frames = period.round().max(1.0) as usize;
    let tolerance = ((period * 0.1).round() as usize).max(1);

    let first_window = period_frames.min(envelope.len());
    let mut current = argmax(&envelope[..first_window]);
    let mut beats = vec![current];

    loop {
        let expected = current + period_frames;
        if expected >= envelope.len() {
            break;
        }
        let lo = expected.saturating_sub(tolerance).max(current + 1);
        let hi = (expected + tolerance + 1).min(envelope.len());
        current = lo + argmax(&envelope[lo..hi]);
        beats.push(current);
    }
    beats
}

/// Convert a frame index to seconds
pub fn frames_to_seconds(frame: usize, sample_rate: u32, hop: usize) -> f32 {
    frame as f32 * hop as f32 / sample_rate as f32
}

fn argmax(values: &[f32]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f32::MIN), |acc, (i, &v)| if v > acc.1 { (i, v) } else { acc })
        .0
}
