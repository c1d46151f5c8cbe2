//! Monophonic pitch tracking (YIN)

use super::stats::frames;

/// Lowest tracked pitch (C2)
pub const PITCH_FMIN_HZ: f32 = 65.41;
/// Highest tracked pitch (C7)
pub const PITCH_FMAX_HZ: f32 = 2093.0;
/// Cumulative-mean-normalized difference threshold
pub const YIN_THRESHOLD: f32 = 0.1;

/// Per-frame fundamental frequency, `None` for unvoiced frames
#[derive(Debug, Clone, Default)]
pub struct PitchTrack {
    pub f0: Vec<Option<f32>>,
}

impl PitchTrack {
    pub fn frame_count(&self) -> usize {
        self.f0.len()
    }

    /// Pitches of voiced frames, in frame order
    pub fn voiced(&self) -> Vec<f32> {
        self.f0.iter().flatten().copied().collect()
    }

    pub fn voiced_count(&self) -> usize {
        self.f0.iter().filter(|f| f.is_some()).count()
    }

    pub fn voiced_flags(&self) -> Vec<bool> {
        self.f0.iter().map(Option::is_some).collect()
    }

    pub fn voiced_ratio(&self) -> f64 {
        if self.f0.is_empty() {
            return 0.0;
        }
        self.voiced_count() as f64 / self.f0.len() as f64
    }
}

/// Track pitch with YIN over `frame_len`/`hop` frames
///
/// **Algorithm:**
/// 1. Squared-difference function over lags up to the period of `fmin`
/// 2. Cumulative mean normalization
/// 3. First lag under `threshold` (walked down to its local minimum), refined parabolically
/// 4. Frames with no qualifying lag, near-silent frames, or pitches outside `fmin..fmax` are
///    unvoiced
pub fn yin(
    samples: &[f32],
    sample_rate: u32,
    frame_len: usize,
    hop: usize,
    fmin: f32,
    fmax: f32,
    threshold: f32,
) -> PitchTrack {
    let sr = sample_rate as f32;
    let tau_max = ((sr / fmin).ceil() as usize).min(frame_len / 2);
    let tau_min = ((sr / fmax).floor() as usize).max(2);
    if tau_max <= tau_min + 1 {
        return PitchTrack::default();
    }
    let window = frame_len - tau_max;

    let mut diff = vec![0.0f32; tau_max + 1];
    let mut cmnd = vec![1.0f32; tau_max + 1];

    let f0 = frames(samples, frame_len, hop)
        .map(|frame| {
            let energy: f32 = frame[..window].iter().map(|s| s * s).sum::<f32>() / window as f32;
            if energy < 1e-6 {
                return None;
            }

            for tau in 1..=tau_max {
                diff[tau] = (0..window)
                    .map(|j| {
                        let d = frame[j] - frame[j + tau];
                        d * d
                    })
                    .sum();
            }

            let mut running = 0.0f32;
            for tau in 1..=tau_max {
                running += diff[tau];
                cmnd[tau] = if running > 0.0 {
                    diff[tau] * tau as f32 / running
                } else {
                    1.0
                };
            }

            let mut tau = tau_min;
            while tau <= tau_max {
                if cmnd[tau] < threshold {
                    while tau < tau_max && cmnd[tau + 1] < cmnd[tau] {
                        tau += 1;
                    }
                    let refined = parabolic_refine(&cmnd, tau);
                    let pitch = sr / refined;
                    return (fmin..=fmax).contains(&pitch).then_some(pitch);
                }
                tau += 1;
            }
            None
        })
        .collect();

    PitchTrack { f0 }
}

fn parabolic_refine(values: &[f32], tau: usize) -> f32 {
    if tau == 0 || tau + 1 >= values.len() {
        return tau as f32;
    }
    let (a, b, c) = (values[tau - 1], values[tau], values[tau + 1]);
    let denom = a - 2.0 * b + c;
    if denom.abs() < f32::EPSILON {
        return tau as f32;
    }
    tau as f32 + 0.5 * (a - c) / denom
}
