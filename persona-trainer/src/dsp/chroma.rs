//! Pitch-class profiles and tonal centroid features

use std::f32::consts::PI;

use super::spectrum::Spectrogram;

/// Lowest frequency folded into the chroma profile (C1)
const CHROMA_MIN_HZ: f32 = 32.70;

/// 12-bin chroma per frame, C = 0, max-normalized
pub fn chroma_frames(spec: &Spectrogram) -> Vec<[f32; 12]> {
    let pitch_class: Vec<Option<usize>> = (0..spec.bin_count())
        .map(|b| {
            let f = spec.bin_frequency(b);
            if f < CHROMA_MIN_HZ {
                return None;
            }
            let semitones_from_a = (12.0 * (f / 440.0).log2()).round() as i32;
            Some((semitones_from_a + 9).rem_euclid(12) as usize)
        })
        .collect();

    spec.magnitudes
        .iter()
        .map(|row| {
            let mut chroma = [0.0f32; 12];
            for (m, pc) in row.iter().zip(&pitch_class) {
                if let Some(pc) = pc {
                    chroma[*pc] += m * m;
                }
            }
            let peak = chroma.iter().copied().fold(0.0f32, f32::max);
            if peak > 0.0 {
                chroma.iter_mut().for_each(|c| *c /= peak);
            }
            chroma
        })
        .collect()
}

/// Six-dimensional tonal centroid of one chroma vector
///
/// Projects the L1-normalized chroma onto circles of fifths, minor thirds, and major thirds.
pub fn tonnetz(chroma: &[f32; 12]) -> [f32; 6] {
    let total: f32 = chroma.iter().sum();
    if total <= 0.0 {
        return [0.0; 6];
    }
    let axes = [
        (1.0f32, 7.0 * PI / 6.0),
        (1.0, 3.0 * PI / 2.0),
        (0.5, 2.0 * PI / 3.0),
    ];

    let mut out = [0.0f32; 6];
    for (pc, &c) in chroma.iter().enumerate() {
        let weight = c / total;
        for (axis, &(radius, step)) in axes.iter().enumerate() {
            let angle = pc as f32 * step;
            out[axis * 2] += weight * radius * angle.sin();
            out[axis * 2 + 1] += weight * radius * angle.cos();
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_a440_lands_on_pitch_class_a() {
        let samples: Vec<f32> = (0..8192)
            .map(|i| (2.0 * PI * 440.0 * i as f32 / 22050.0).sin())
            .collect();
        let spec = Spectrogram::compute(&samples, 22050, 2048, 512);
        let chroma = chroma_frames(&spec);
        let mid = chroma[chroma.len() / 2];
        let (argmax, _) = mid
            .iter()
            .enumerate()
            .fold((0, 0.0f32), |acc, (i, &v)| if v > acc.1 { (i, v) } else { acc });
        assert_eq!(argmax, 9);
        assert!((mid[9] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_tonnetz_of_silence_is_zero() {
        assert_eq!(tonnetz(&[0.0; 12]), [0.0; 6]);
    }

    #[test]
    fn test_tonnetz_single_class_on_unit_circle() {
        let mut chroma = [0.0f32; 12];
        chroma[0] = 1.0;
        let t = tonnetz(&chroma);
        // pitch class 0 sits at angle 0 on every circle
        assert!((t[1] - 1.0).abs() < 1e-6);
        assert!((t[3] - 1.0).abs() < 1e-6);
        assert!((t[5] - 0.5).abs() < 1e-6);
    }
}
