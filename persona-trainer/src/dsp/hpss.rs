//! Median-filter harmonic/percussive separation

use super::spectrum::Spectrogram;

/// Kernel length (frames and bins) for both median filters
pub const HPSS_KERNEL: usize = 31;

/// Result of a harmonic/percussive split
#[derive(Debug, Clone)]
pub struct HpssResult {
    /// Harmonic magnitude spectrogram
    pub harmonic: Spectrogram,
    /// Total harmonic power
    pub harmonic_power: f64,
    /// Total percussive power
    pub percussive_power: f64,
}

impl HpssResult {
    /// Harmonic-to-noise ratio in dB; 40 when the percussive part is silent
    pub fn harmonics_to_noise_db(&self) -> f64 {
        if self.percussive_power <= 0.0 {
            return 40.0;
        }
        if self.harmonic_power <= 0.0 {
            return -40.0;
        }
        10.0 * (self.harmonic_power / self.percussive_power).log10()
    }
}

/// Split `spec` with soft (power 2) Wiener masks
///
/// Harmonic enhancement is a median across time per bin; percussive enhancement is a median
/// across frequency per frame.
pub fn hpss(spec: &Spectrogram, kernel: usize) -> HpssResult {
    let frames = spec.frame_count();
    let bins = spec.bin_count();
    let half = kernel / 2;

    let mut harmonic_enh = vec![vec![0.0f32; bins]; frames];
    let mut window = Vec::with_capacity(kernel);
    for bin in 0..bins {
        for t in 0..frames {
            window.clear();
            let lo = t.saturating_sub(half);
            let hi = (t + half + 1).min(frames);
            window.extend((lo..hi).map(|i| spec.magnitudes[i][bin]));
            harmonic_enh[t][bin] = median_in_place(&mut window);
        }
    }

    let mut percussive_enh = vec![vec![0.0f32; bins]; frames];
    for (t, row) in spec.magnitudes.iter().enumerate() {
        for bin in 0..bins {
            window.clear();
            let lo = bin.saturating_sub(half);
            let hi = (bin + half + 1).min(bins);
            window.extend_from_slice(&row[lo..hi]);
            percussive_enh[t][bin] = median_in_place(&mut window);
        }
    }

    let mut harmonic_power = 0.0f64;
    let mut percussive_power = 0.0f64;
    let mut harmonic = Vec::with_capacity(frames);
    for t in 0..frames {
        let mut row = Vec::with_capacity(bins);
        for bin in 0..bins {
            let s = spec.magnitudes[t][bin];
            let h2 = harmonic_enh[t][bin].powi(2);
            let p2 = percussive_enh[t][bin].powi(2);
            let denom = h2 + p2;
            let (mh, mp) = if denom > 0.0 {
                (h2 / denom, p2 / denom)
            } else {
                (0.0, 0.0)
            };
            let hs = s * mh;
            let ps = s * mp;
            harmonic_power += (hs as f64).powi(2);
            percussive_power += (ps as f64).powi(2);
            row.push(hs);
        }
        harmonic.push(row);
    }

    HpssResult {
        harmonic: Spectrogram {
            magnitudes: harmonic,
            sample_rate: spec.sample_rate,
            n_fft: spec.n_fft,
            hop: spec.hop,
        },
        harmonic_power,
        percussive_power,
    }
}

fn median_in_place(values: &mut [f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let mid = values.len() / 2;
    let (_, median, _) = values.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
    *median
}
