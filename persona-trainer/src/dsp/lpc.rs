//! Linear prediction and formant estimation

use rustfft::num_complex::Complex;

/// Minimum formant frequency kept (Hz)
const FORMANT_MIN_HZ: f64 = 90.0;
/// Maximum formant bandwidth kept (Hz)
const FORMANT_MAX_BANDWIDTH_HZ: f64 = 400.0;

const ROOT_MAX_ITERATIONS: usize = 500;
const ROOT_TOLERANCE: f64 = 1e-12;

/// LPC polynomial `[1, a1, ..., a_order]` via autocorrelation and Levinson-Durbin
///
/// Returns `None` for silent frames or an unstable recursion.
pub fn lpc_coefficients(frame: &[f32], order: usize) -> Option<Vec<f64>> {
    if frame.len() <= order {
        return None;
    }
    let autocorr: Vec<f64> = (0..=order)
        .map(|lag| {
            frame
                .iter()
                .zip(&frame[lag..])
                .map(|(&a, &b)| a as f64 * b as f64)
                .sum()
        })
        .collect();
    if autocorr[0] <= 1e-12 {
        return None;
    }

    let mut a = vec![0.0f64; order + 1];
    a[0] = 1.0;
    let mut error = autocorr[0];

    for i in 1..=order {
        let acc: f64 = (1..i).map(|j| a[j] * autocorr[i - j]).sum();
        let k = -(autocorr[i] + acc) / error;
        if !k.is_finite() {
            return None;
        }
        let previous = a.clone();
        for j in 1..i {
            a[j] = previous[j] + k * previous[i - j];
        }
        a[i] = k;
        error *= 1.0 - k * k;
        if error <= 0.0 {
            break;
        }
    }
    Some(a)
}

/// Roots of a monic polynomial `coeffs[0]·z^n + ... + coeffs[n]` (Durand-Kerner)
pub fn polynomial_roots(coeffs: &[f64]) -> Vec<Complex<f64>> {
    let degree = coeffs.len().saturating_sub(1);
    if degree == 0 || coeffs[0] == 0.0 {
        return Vec::new();
    }
    let monic: Vec<f64> = coeffs.iter().map(|c| c / coeffs[0]).collect();

    let seed = Complex::new(0.4, 0.9);
    let mut roots: Vec<Complex<f64>> = (0..degree).map(|i| seed.powu(i as u32 + 1)).collect();

    for _ in 0..ROOT_MAX_ITERATIONS {
        let mut max_shift = 0.0f64;
        for i in 0..degree {
            let z = roots[i];
            let value = monic
                .iter()
                .fold(Complex::new(0.0, 0.0), |acc, &c| acc * z + c);
            let mut denom = Complex::new(1.0, 0.0);
            for (j, &other) in roots.iter().enumerate() {
                if j != i {
                    let mut d = z - other;
                    if d.norm() < 1e-14 {
                        d = Complex::new(1e-10, 1e-10);
                    }
                    denom *= d;
                }
            }
            let shift = value / denom;
            if shift.re.is_finite() && shift.im.is_finite() {
                roots[i] = z - shift;
                max_shift = max_shift.max(shift.norm());
            }
        }
        if max_shift < ROOT_TOLERANCE {
            break;
        }
    }
    roots
}

/// Formant frequencies (ascending) from an LPC polynomial
///
/// Keeps upper-half-plane roots whose frequency exceeds 90 Hz and whose bandwidth is
/// under 400 Hz.
pub fn formants_from_lpc(lpc: &[f64], sample_rate: u32) -> Vec<f64> {
    let sr = sample_rate as f64;
    let mut formants: Vec<f64> = polynomial_roots(lpc)
        .into_iter()
        .filter(|r| r.im >= 0.0)
        .filter_map(|r| {
            let freq = r.im.atan2(r.re) * sr / (2.0 * std::f64::consts::PI);
            let radius = r.norm();
            if radius <= 0.0 {
                return None;
            }
            let bandwidth = -0.5 * sr / (2.0 * std::f64::consts::PI) * radius.ln();
            (freq > FORMANT_MIN_HZ && bandwidth < FORMANT_MAX_BANDWIDTH_HZ).then_some(freq)
        })
        .collect();
    formants.sort_by(|a, b| a.total_cmp(b));
    formants
}

/// First-order pre-emphasis `y[n] = x[n] - coef·x[n-1]`
pub fn pre_emphasis(samples: &[f32], coef: f32) -> Vec<f32> {
    let mut out = Vec::with_capacity(samples.len());
    let mut previous = 0.0f32;
    for &s in samples {
        out.push(s - coef * previous);
        previous = s;
    }
    out
}
