//! Mel filterbank and cepstral coefficients

use std::f32::consts::PI;

use super::spectrum::Spectrogram;

/// Triangular mel filterbank over STFT power bins
pub struct MelBank {
    filters: Vec<Vec<(usize, f32)>>,
}

impl MelBank {
    /// Build `n_mels` filters spanning `f_min..f_max` (clamped to Nyquist)
    ///
    /// Filter weights are evaluated at each bin's continuous frequency, so narrow low-frequency
    /// filters still get non-empty support when they fall between bins.
    pub fn new(sample_rate: u32, n_fft: usize, n_mels: usize, f_min: f32, f_max: f32) -> Self {
        let nyquist = sample_rate as f32 / 2.0;
        let f_max = f_max.min(nyquist).max(f_min);
        let mel_min = hz_to_mel(f_min);
        let mel_max = hz_to_mel(f_max);
        let points: Vec<f32> = (0..n_mels + 2)
            .map(|i| mel_to_hz(mel_min + (mel_max - mel_min) * i as f32 / (n_mels + 1) as f32))
            .collect();

        let bins = n_fft / 2 + 1;
        let bin_hz = sample_rate as f32 / n_fft as f32;

        let filters = (0..n_mels)
            .map(|m| {
                let (left, center, right) = (points[m], points[m + 1], points[m + 2]);
                let mut filter: Vec<(usize, f32)> = (0..bins)
                    .filter_map(|b| {
                        let f = b as f32 * bin_hz;
                        let rising = (f - left) / (center - left).max(f32::EPSILON);
                        let falling = (right - f) / (right - center).max(f32::EPSILON);
                        let weight = rising.min(falling);
                        (weight > 0.0).then_some((b, weight))
                    })
                    .collect();
                if filter.is_empty() {
                    // degenerate band: take the nearest bin
                    let nearest = ((center / bin_hz).round() as usize).min(bins - 1);
                    filter.push((nearest, 1.0));
                }
                filter
            })
            .collect();

        Self { filters }
    }

    pub fn band_count(&self) -> usize {
        self.filters.len()
    }

    /// Mel band energies for one power frame
    pub fn apply(&self, power: &[f32]) -> Vec<f32> {
        self.filters
            .iter()
            .map(|filter| {
                filter
                    .iter()
                    .map(|&(bin, w)| power.get(bin).copied().unwrap_or(0.0).max(0.0) as f64 * w as f64)
                    .sum::<f64>() as f32
            })
            .collect()
    }
}

/// MFCCs per frame: dB mel energies through an orthonormal DCT-II
pub fn mfcc_frames(spec: &Spectrogram, bank: &MelBank, n_mfcc: usize) -> Vec<Vec<f32>> {
    spec.power()
        .iter()
        .map(|power| {
            let log_mel: Vec<f32> = bank
                .apply(power)
                .into_iter()
                .map(|e| 10.0 * e.max(1e-10).log10())
                .collect();
            dct_ortho(&log_mel, n_mfcc)
        })
        .collect()
}

/// First `n_out` coefficients of the orthonormal DCT-II
pub fn dct_ortho(input: &[f32], n_out: usize) -> Vec<f32> {
    let n = input.len();
    if n == 0 {
        return vec![0.0; n_out];
    }
    let scale0 = (1.0 / n as f32).sqrt();
    let scale = (2.0 / n as f32).sqrt();
    (0..n_out)
        .map(|k| {
            let sum: f32 = input
                .iter()
                .enumerate()
                .map(|(i, &x)| x * (PI * k as f32 * (2 * i + 1) as f32 / (2 * n) as f32).cos())
                .sum();
            sum * if k == 0 { scale0 } else { scale }
        })
        .collect()
}

fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10f32.powf(mel / 2595.0) - 1.0)
}
