//! Framing and descriptive statistics helpers

use std::borrow::Cow;

/// Number of frames produced by [`frames`] for a signal of `len` samples
///
/// The final frame may be partial; it is zero padded.
pub fn frame_count(len: usize, frame_len: usize, hop: usize) -> usize {
    let hop = hop.max(1);
    if len == 0 {
        0
    } else if len <= frame_len {
        1
    } else {
        1 + (len - frame_len).div_ceil(hop)
    }
}

/// Iterate fixed-length frames, zero padding the tail frame
pub fn frames(samples: &[f32], frame_len: usize, hop: usize) -> impl Iterator<Item = Cow<'_, [f32]>> {
    let hop = hop.max(1);
    let count = frame_count(samples.len(), frame_len, hop);
    (0..count).map(move |i| {
        let start = i * hop;
        let end = start + frame_len;
        if end <= samples.len() {
            Cow::Borrowed(&samples[start..end])
        } else {
            let mut buf = vec![0.0f32; frame_len];
            let available = samples.len().saturating_sub(start);
            buf[..available].copy_from_slice(&samples[start..start + available]);
            Cow::Owned(buf)
        }
    })
}

/// Root-mean-square energy per frame
pub fn rms_frames(samples: &[f32], frame_len: usize, hop: usize) -> Vec<f32> {
    frames(samples, frame_len, hop)
        .map(|frame| {
            let sum: f64 = frame.iter().map(|&s| (s as f64) * (s as f64)).sum();
            (sum / frame_len.max(1) as f64).sqrt() as f32
        })
        .collect()
}

/// Sum of squared samples per frame
pub fn energy_frames(samples: &[f32], frame_len: usize, hop: usize) -> Vec<f32> {
    frames(samples, frame_len, hop)
        .map(|frame| frame.iter().map(|&s| s * s).sum())
        .collect()
}

/// Fraction of sign changes per frame
pub fn zero_crossing_frames(samples: &[f32], frame_len: usize, hop: usize) -> Vec<f32> {
    frames(samples, frame_len, hop)
        .map(|frame| {
            let crossings = frame
                .windows(2)
                .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
                .count();
            crossings as f32 / frame_len.max(1) as f32
        })
        .collect()
}

pub fn mean(values: &[f32]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().map(|&v| v as f64).sum::<f64>() / values.len() as f64
}

/// Population variance
pub fn variance(values: &[f32]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values
        .iter()
        .map(|&v| {
            let d = v as f64 - m;
            d * d
        })
        .sum::<f64>()
        / values.len() as f64
}

pub fn std_dev(values: &[f32]) -> f64 {
    variance(values).sqrt()
}

pub fn max(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().copied().fold(f32::NEG_INFINITY, f32::max)
}

pub fn min(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().copied().fold(f32::INFINITY, f32::min)
}

/// Percentile with linear interpolation between closest ranks (`q` in 0..=100)
pub fn percentile(values: &[f32], q: f64) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted: Vec<f32> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return 0.0;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));
    let rank = (q.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let frac = (rank - lower as f64) as f32;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

/// Sliding median with an odd kernel, zero padded at both edges
pub fn median_filter(values: &[f32], kernel: usize) -> Vec<f32> {
    let kernel = if kernel % 2 == 0 { kernel + 1 } else { kernel.max(1) };
    let half = kernel / 2;
    let mut window = Vec::with_capacity(kernel);
    (0..values.len())
        .map(|i| {
            window.clear();
            for k in 0..kernel {
                let idx = i as isize + k as isize - half as isize;
                let v = if idx < 0 || idx as usize >= values.len() {
                    0.0
                } else {
                    values[idx as usize]
                };
                window.push(v);
            }
            window.sort_by(|a, b| a.total_cmp(b));
            window[half]
        })
        .collect()
}

/// Consecutive differences
pub fn diff(values: &[f32]) -> Vec<f32> {
    values.windows(2).map(|w| w[1] - w[0]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_count_matches_iteration() {
        let samples = vec![0.5f32; 5000];
        let count = frames(&samples, 2048, 512).count();
        assert_eq!(count, frame_count(5000, 2048, 512));
        assert_eq!(frame_count(0, 2048, 512), 0);
        assert_eq!(frame_count(100, 2048, 512), 1);
    }

    #[test]
    fn test_tail_frame_is_padded() {
        let samples = vec![1.0f32; 10];
        let all: Vec<_> = frames(&samples, 8, 4).collect();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].len(), 8);
        assert_eq!(all[1][5], 0.0);
    }

    #[test]
    fn test_rms_of_constant_signal() {
        let samples = vec![0.5f32; 4096];
        let rms = rms_frames(&samples, 1024, 512);
        assert!(rms.iter().take(rms.len() - 1).all(|&r| (r - 0.5).abs() < 1e-6));
    }

    #[test]
    fn test_zero_crossings_of_alternating_signal() {
        let samples: Vec<f32> = (0..1024).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let zcr = zero_crossing_frames(&samples, 1024, 1024);
        assert!((zcr[0] - 1023.0 / 1024.0).abs() < 1e-6);
    }

    #[test]
    fn test_percentile_interpolates() {
        let values = [1.0f32, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&values, 0.0), 1.0);
        assert_eq!(percentile(&values, 50.0), 3.0);
        assert_eq!(percentile(&values, 100.0), 5.0);
        assert!((percentile(&values, 30.0) - 2.2).abs() < 1e-6);
    }

    #[test]
    fn test_median_filter_removes_spike() {
        let values = [1.0f32, 1.0, 9.0, 1.0, 1.0];
        let filtered = median_filter(&values, 3);
        assert_eq!(filtered[2], 1.0);
        // zero padding pulls the edges down
        assert_eq!(filtered[0], 1.0);
    }

    #[test]
    fn test_mean_variance() {
        let values = [2.0f32, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((mean(&values) - 5.0).abs() < 1e-9);
        assert!((variance(&values) - 4.0).abs() < 1e-9);
        assert!((std_dev(&values) - 2.0).abs() < 1e-9);
        assert_eq!(max(&values), 9.0);
        assert_eq!(min(&values), 2.0);
        assert_eq!(max(&[]), 0.0);
    }
}
