//! Filtering, trimming and normalization used to clean voice segments

use super::stats::rms_frames;

/// Second-order IIR section (transposed direct form II)
#[derive(Debug, Clone, Copy)]
pub struct Biquad {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl Biquad {
    /// Second-order Butterworth high-pass via the bilinear transform
    pub fn butterworth_highpass(cutoff_hz: f64, sample_rate: u32) -> Self {
        let omega = 2.0 * std::f64::consts::PI * cutoff_hz / sample_rate as f64;
        let (sin, cos) = omega.sin_cos();
        let q = std::f64::consts::FRAC_1_SQRT_2;
        let alpha = sin / (2.0 * q);
        let a0 = 1.0 + alpha;
        Self {
            b0: (1.0 + cos) / 2.0 / a0,
            b1: -(1.0 + cos) / a0,
            b2: (1.0 + cos) / 2.0 / a0,
            a1: -2.0 * cos / a0,
            a2: (1.0 - alpha) / a0,
        }
    }

    pub fn process(&self, samples: &[f32]) -> Vec<f32> {
        let (mut z1, mut z2) = (0.0f64, 0.0f64);
        samples
            .iter()
            .map(|&x| {
                let x = x as f64;
                let y = self.b0 * x + z1;
                z1 = self.b1 * x - self.a1 * y + z2;
                z2 = self.b2 * x - self.a2 * y;
                y as f32
            })
            .collect()
    }
}

/// Sample range left after dropping leading/trailing frames more than `top_db` below the
/// loudest frame. Empty range for silent input.
pub fn trim_range(samples: &[f32], top_db: f32, frame_len: usize, hop: usize) -> std::ops::Range<usize> {
    let rms = rms_frames(samples, frame_len, hop);
    let peak = rms.iter().copied().fold(0.0f32, f32::max);
    if peak <= 0.0 {
        return 0..0;
    }
    let floor = peak * 10f32.powf(-top_db / 20.0);
    let first = rms.iter().position(|&r| r > floor);
    let last = rms.iter().rposition(|&r| r > floor);
    match (first, last) {
        (Some(first), Some(last)) => {
            let start = (first * hop).min(samples.len());
            let end = (last * hop + frame_len).min(samples.len());
            start..end
        }
        _ => 0..0,
    }
}

/// Scale so the largest absolute sample is 1.0; silent input is left untouched
pub fn peak_normalize(samples: &mut [f32]) {
    let peak = samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
    if peak > 0.0 {
        samples.iter_mut().for_each(|s| *s /= peak);
    }
}
