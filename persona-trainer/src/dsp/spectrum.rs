//! Short-time Fourier transform and frame-wise spectral descriptors

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use std::f32::consts::PI;

use super::stats::frames;

/// Magnitude spectrogram, one row per frame, bins 0..=Nyquist
#[derive(Debug, Clone)]
pub struct Spectrogram {
    pub magnitudes: Vec<Vec<f32>>,
    pub sample_rate: u32,
    pub n_fft: usize,
    pub hop: usize,
}

impl Spectrogram {
    /// Hann-windowed STFT of `samples`
    pub fn compute(samples: &[f32], sample_rate: u32, n_fft: usize, hop: usize) -> Self {
        let n_fft = n_fft.max(2);
        let window = hann_window(n_fft);
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(n_fft);
        let bins = n_fft / 2 + 1;

        let mut buffer = vec![Complex::new(0.0f32, 0.0); n_fft];
        let magnitudes = frames(samples, n_fft, hop)
            .map(|frame| {
                for ((cell, &s), &w) in buffer.iter_mut().zip(frame.iter()).zip(window.iter()) {
                    let s = if s.is_finite() { s } else { 0.0 };
                    *cell = Complex::new(s * w, 0.0);
                }
                fft.process(&mut buffer);
                buffer[..bins].iter().map(|c| c.norm()).collect()
            })
            .collect();

        Self {
            magnitudes,
            sample_rate,
            n_fft,
            hop,
        }
    }

    pub fn frame_count(&self) -> usize {
        self.magnitudes.len()
    }

    pub fn bin_count(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Center frequency of an FFT bin in Hz
    pub fn bin_frequency(&self, bin: usize) -> f32 {
        bin as f32 * self.sample_rate as f32 / self.n_fft as f32
    }

    pub fn frequencies(&self) -> Vec<f32> {
        (0..self.bin_count()).map(|b| self.bin_frequency(b)).collect()
    }

    /// Squared magnitudes
    pub fn power(&self) -> Vec<Vec<f32>> {
        self.magnitudes
            .iter()
            .map(|row| row.iter().map(|m| m * m).collect())
            .collect()
    }
}

/// Symmetric Hann window
pub fn hann_window(length: usize) -> Vec<f32> {
    if length <= 1 {
        return vec![1.0; length.max(1)];
    }
    let denom = (length - 1) as f32;
    (0..length)
        .map(|n| 0.5 * (1.0 - (2.0 * PI * n as f32 / denom).cos()))
        .collect()
}

/// Magnitude-weighted mean frequency per frame (0 for silent frames)
pub fn spectral_centroid(spec: &Spectrogram) -> Vec<f32> {
    let freqs = spec.frequencies();
    spec.magnitudes
        .iter()
        .map(|row| {
            let total: f32 = row.iter().sum();
            if total <= f32::EPSILON {
                return 0.0;
            }
            row.iter().zip(&freqs).map(|(m, f)| m * f).sum::<f32>() / total
        })
        .collect()
}

/// Frequency below which `fraction` of each frame's magnitude lies
pub fn spectral_rolloff(spec: &Spectrogram, fraction: f32) -> Vec<f32> {
    spec.magnitudes
        .iter()
        .map(|row| {
            let total: f32 = row.iter().sum();
            if total <= f32::EPSILON {
                return 0.0;
            }
            let target = total * fraction;
            let mut cumulative = 0.0;
            for (bin, m) in row.iter().enumerate() {
                cumulative += m;
                if cumulative >= target {
                    return spec.bin_frequency(bin);
                }
            }
            spec.bin_frequency(row.len().saturating_sub(1))
        })
        .collect()
}

/// Second-order spectral spread around the centroid
pub fn spectral_bandwidth(spec: &Spectrogram, centroids: &[f32]) -> Vec<f32> {
    let freqs = spec.frequencies();
    spec.magnitudes
        .iter()
        .zip(centroids)
        .map(|(row, &centroid)| {
            let total: f32 = row.iter().sum();
            if total <= f32::EPSILON {
                return 0.0;
            }
            let spread: f32 = row
                .iter()
                .zip(&freqs)
                .map(|(m, f)| m * (f - centroid).powi(2))
                .sum();
            (spread / total).sqrt()
        })
        .collect()
}

/// Geometric over arithmetic mean of the power spectrum, per frame
pub fn spectral_flatness(spec: &Spectrogram) -> Vec<f32> {
    const AMIN: f64 = 1e-10;
    spec.magnitudes
        .iter()
        .map(|row| {
            if row.is_empty() {
                return 0.0;
            }
            let n = row.len() as f64;
            let powers = row.iter().map(|&m| ((m as f64) * (m as f64)).max(AMIN));
            let (log_sum, sum) = powers.fold((0.0, 0.0), |(l, s), p| (l + p.ln(), s + p));
            ((log_sum / n).exp() / (sum / n)) as f32
        })
        .collect()
}

/// Octave-band peak/valley contrast in dB: `n_bands + 1` values per frame
///
/// The first band covers 0..`fmin`; the following bands double in width up to Nyquist.
pub fn spectral_contrast(spec: &Spectrogram, n_bands: usize, fmin: f32, quantile: f32) -> Vec<Vec<f32>> {
    let nyquist = spec.sample_rate as f32 / 2.0;
    let mut edges = vec![0.0f32];
    for k in 0..=n_bands {
        edges.push((fmin * 2f32.powi(k as i32)).min(nyquist));
    }
    let freqs = spec.frequencies();

    let band_bins: Vec<Vec<usize>> = edges
        .windows(2)
        .enumerate()
        .map(|(i, w)| {
            let last = i == edges.len() - 2;
            (0..freqs.len())
                .filter(|&b| freqs[b] >= w[0] && (freqs[b] < w[1] || (last && freqs[b] <= nyquist)))
                .collect()
        })
        .collect();

    spec.magnitudes
        .iter()
        .map(|row| {
            band_bins
                .iter()
                .map(|bins| {
                    if bins.is_empty() {
                        return 0.0;
                    }
                    let mut values: Vec<f32> = bins.iter().map(|&b| row[b]).collect();
                    values.sort_by(|a, b| a.total_cmp(b));
                    let take = ((values.len() as f32 * quantile).round() as usize).max(1);
                    let valley = values[..take].iter().sum::<f32>() / take as f32;
                    let peak = values[values.len() - take..].iter().sum::<f32>() / take as f32;
                    power_db(peak) - power_db(valley)
                })
                .collect()
        })
        .collect()
}

/// Magnitude of the positive-frequency FFT of the whole signal, with bin frequencies
pub fn whole_signal_spectrum(samples: &[f32], sample_rate: u32) -> (Vec<f32>, Vec<f32>) {
    if samples.is_empty() {
        return (Vec::new(), Vec::new());
    }
    let n = samples.len();
    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(n);
    let mut buffer: Vec<Complex<f32>> = samples.iter().map(|&s| Complex::new(s, 0.0)).collect();
    fft.process(&mut buffer);

    let half = n / 2 + 1;
    let magnitudes = buffer[..half].iter().map(|c| c.norm()).collect();
    let freqs = (0..half)
        .map(|k| k as f32 * sample_rate as f32 / n as f32)
        .collect();
    (magnitudes, freqs)
}

fn power_db(value: f32) -> f32 {
    10.0 * value.max(1e-10).log10()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sr: u32, secs: f32) -> Vec<f32> {
        let n = (sr as f32 * secs) as usize;
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f32 / sr as f32).sin())
            .collect()
    }

    #[test]
    fn test_hann_window_shape() {
        let w = hann_window(5);
        assert_eq!(w.len(), 5);
        assert!(w[0].abs() < 1e-6);
        assert!((w[2] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_centroid_tracks_sine_frequency() {
        let samples = sine(1000.0, 22050, 0.5);
        let spec = Spectrogram::compute(&samples, 22050, 2048, 512);
        let centroid = spectral_centroid(&spec);
        let mid = centroid[centroid.len() / 2];
        assert!((mid - 1000.0).abs() < 60.0, "centroid {}", mid);
    }

    #[test]
    fn test_rolloff_above_centroid_for_pure_tone() {
        let samples = sine(2000.0, 22050, 0.5);
        let spec = Spectrogram::compute(&samples, 22050, 2048, 512);
        let rolloff = spectral_rolloff(&spec, 0.85);
        let mid = rolloff[rolloff.len() / 2];
        assert!(mid >= 1900.0 && mid < 2500.0, "rolloff {}", mid);
    }

    #[test]
    fn test_silence_is_zero() {
        let samples = vec![0.0f32; 4096];
        let spec = Spectrogram::compute(&samples, 22050, 2048, 512);
        assert!(spectral_centroid(&spec).iter().all(|&c| c == 0.0));
        let centroids = spectral_centroid(&spec);
        assert!(spectral_bandwidth(&spec, &centroids).iter().all(|&b| b == 0.0));
    }

    #[test]
    fn test_flatness_noise_vs_tone() {
        let tone = sine(440.0, 22050, 0.5);
        // deterministic pseudo-noise
        let mut state = 12345u32;
        let noise: Vec<f32> = (0..tone.len())
            .map(|_| {
                state = state.wrapping_mul(1_103_515_245).wrapping_add(12345);
                (state >> 16) as f32 / 32768.0 - 1.0
            })
            .collect();

        let tone_flat = crate::dsp::stats::mean(&spectral_flatness(&Spectrogram::compute(&tone, 22050, 2048, 512)));
        let noise_flat = crate::dsp::stats::mean(&spectral_flatness(&Spectrogram::compute(&noise, 22050, 2048, 512)));
        assert!(noise_flat > tone_flat * 10.0);
    }

    #[test]
    fn test_contrast_has_seven_bands() {
        let samples = sine(440.0, 22050, 0.3);
        let spec = Spectrogram::compute(&samples, 22050, 2048, 512);
        let contrast = spectral_contrast(&spec, 6, 200.0, 0.02);
        assert_eq!(contrast.len(), spec.frame_count());
        assert!(contrast.iter().all(|row| row.len() == 7));
    }

    #[test]
    fn test_whole_signal_spectrum_peak() {
        let samples = sine(500.0, 8000, 1.0);
        let (mags, freqs) = whole_signal_spectrum(&samples, 8000);
        let (peak_bin, _) = mags
            .iter()
            .enumerate()
            .fold((0, 0.0f32), |acc, (i, &m)| if m > acc.1 { (i, m) } else { acc });
        assert!((freqs[peak_bin] - 500.0).abs() < 2.0);
    }
}
