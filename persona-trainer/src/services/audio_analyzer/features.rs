//! Feature stages of the audio analyzer
//!
//! Each stage reads a shared [`FeatureContext`] which caches the intermediate representations
//! (spectrogram, pitch track, onsets, harmonic split) that several stages reuse.

use std::cell::OnceCell;

use super::AnalysisError;
use crate::dsp::chroma::{chroma_frames, tonnetz};
use crate::dsp::hpss::{hpss, HpssResult, HPSS_KERNEL};
use crate::dsp::lpc::{formants_from_lpc, lpc_coefficients, pre_emphasis};
use crate::dsp::mel::{mfcc_frames, MelBank};
use crate::dsp::onset::{detect_onsets, estimate_tempo, frames_to_seconds, onset_envelope, track_beats};
use crate::dsp::pitch::{yin, PitchTrack, PITCH_FMAX_HZ, PITCH_FMIN_HZ, YIN_THRESHOLD};
use crate::dsp::spectrum::{
    hann_window, spectral_bandwidth, spectral_centroid, spectral_contrast, spectral_flatness,
    spectral_rolloff, whole_signal_spectrum, Spectrogram,
};
use crate::dsp::stats::{self, rms_frames, zero_crossing_frames};
use crate::dsp::{FRAME_LENGTH, HOP_LENGTH};
use crate::models::audio_analysis::{
    BasicInfo, EmotionScores, EmotionalIndicators, Formants, PausePatterns, ProsodicFeatures,
    QualityComponents, QualityGrade, SpectralFeatures, SpeakingStyle, TimbreFeatures,
    VoiceCharacteristics, VoiceQuality,
};

pub const N_MFCC: usize = 13;
const N_MELS: usize = 128;
const ROLLOFF_FRACTION: f32 = 0.85;
const CONTRAST_BANDS: usize = 6;
const CONTRAST_FMIN_HZ: f32 = 200.0;
const CONTRAST_QUANTILE: f32 = 0.02;

const LPC_ORDER: usize = 12;
const PRE_EMPHASIS: f32 = 0.95;
const MAX_FORMANT_FRAMES: usize = 200;

const SHIMMER_FRAME: usize = 512;
const SHIMMER_HOP: usize = 256;

const PAUSE_PERCENTILE: f64 = 20.0;
const MIN_PAUSE_SECONDS: f64 = 0.1;

const NOISE_FLOOR_PERCENTILE: f64 = 10.0;
const CLIPPING_LEVEL: f32 = 0.95;
const SPEECH_BAND_HZ: (f32, f32) = (80.0, 8000.0);

/// Decoded signal plus lazily computed shared representations
pub struct FeatureContext<'a> {
    samples: &'a [f32],
    sample_rate: u32,
    spectrogram: Spectrogram,
    rms: Vec<f32>,
    centroids: Vec<f32>,
    rolloff: Vec<f32>,
    mfcc: OnceCell<Vec<Vec<f32>>>,
    onset_envelope: OnceCell<Vec<f32>>,
    onset_times: OnceCell<Vec<f64>>,
    pitch: OnceCell<PitchTrack>,
    harmonic: OnceCell<HpssResult>,
}

impl<'a> FeatureContext<'a> {
    pub fn new(samples: &'a [f32], sample_rate: u32) -> Self {
        let spectrogram = Spectrogram::compute(samples, sample_rate, FRAME_LENGTH, HOP_LENGTH);
        let centroids = spectral_centroid(&spectrogram);
        let rolloff = spectral_rolloff(&spectrogram, ROLLOFF_FRACTION);
        Self {
            samples,
            sample_rate,
            rms: rms_frames(samples, FRAME_LENGTH, HOP_LENGTH),
            spectrogram,
            centroids,
            rolloff,
            mfcc: OnceCell::new(),
            onset_envelope: OnceCell::new(),
            onset_times: OnceCell::new(),
            pitch: OnceCell::new(),
            harmonic: OnceCell::new(),
        }
    }

    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn rms(&self) -> &[f32] {
        &self.rms
    }

    pub fn centroids(&self) -> &[f32] {
        &self.centroids
    }

    pub fn rolloff(&self) -> &[f32] {
        &self.rolloff
    }

    /// MFCC rows, one per frame
    pub fn mfcc(&self) -> &[Vec<f32>] {
        self.mfcc.get_or_init(|| {
            let bank = MelBank::new(
                self.sample_rate,
                FRAME_LENGTH,
                N_MELS,
                0.0,
                self.sample_rate as f32 / 2.0,
            );
            mfcc_frames(&self.spectrogram, &bank, N_MFCC)
        })
    }

    fn onset_envelope(&self) -> &[f32] {
        self.onset_envelope
            .get_or_init(|| onset_envelope(&self.spectrogram))
    }

    fn onset_times(&self) -> &[f64] {
        self.onset_times.get_or_init(|| {
            detect_onsets(self.onset_envelope())
                .into_iter()
                .map(|f| frames_to_seconds(f, self.sample_rate, HOP_LENGTH) as f64)
                .collect()
        })
    }

    /// Global tempo in BPM, 0 without periodic onsets
    pub fn tempo(&self) -> f64 {
        estimate_tempo(self.onset_envelope(), self.sample_rate, HOP_LENGTH) as f64
    }

    fn pitch(&self) -> &PitchTrack {
        self.pitch.get_or_init(|| {
            yin(
                self.samples,
                self.sample_rate,
                FRAME_LENGTH,
                HOP_LENGTH,
                PITCH_FMIN_HZ,
                PITCH_FMAX_HZ,
                YIN_THRESHOLD,
            )
        })
    }

    fn harmonic(&self) -> &HpssResult {
        self.harmonic
            .get_or_init(|| hpss(&self.spectrogram, HPSS_KERNEL))
    }
}

fn finite(name: &str, value: f64) -> Result<f64, AnalysisError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(AnalysisError::Degenerate(format!("{name} is not finite")))
    }
}

fn column_means(rows: &[Vec<f32>], width: usize) -> Vec<f64> {
    (0..width)
        .map(|c| {
            let column: Vec<f32> = rows.iter().filter_map(|r| r.get(c).copied()).collect();
            stats::mean(&column)
        })
        .collect()
}

fn column_stds(rows: &[Vec<f32>], width: usize) -> Vec<f64> {
    (0..width)
        .map(|c| {
            let column: Vec<f32> = rows.iter().filter_map(|r| r.get(c).copied()).collect();
            stats::std_dev(&column)
        })
        .collect()
}

fn inter_onset_consistency(onset_times: &[f64]) -> f64 {
    let intervals: Vec<f32> = onset_times.windows(2).map(|w| (w[1] - w[0]) as f32).collect();
    1.0 / (stats::std_dev(&intervals) + 1e-10)
}

pub fn basic_info(ctx: &FeatureContext<'_>, file_size: u64) -> BasicInfo {
    let abs: Vec<f32> = ctx.samples.iter().map(|s| s.abs()).collect();
    let zcr = zero_crossing_frames(ctx.samples, FRAME_LENGTH, HOP_LENGTH);
    BasicInfo {
        duration: ctx.duration(),
        sample_rate: ctx.sample_rate,
        file_size,
        mean_energy: stats::mean(&ctx.rms),
        max_energy: stats::max(&ctx.rms) as f64,
        dynamic_range: (stats::max(&abs) - stats::min(&abs)) as f64,
        mean_zero_crossing_rate: stats::mean(&zcr),
        total_samples: ctx.samples.len(),
    }
}

pub fn spectral_features(ctx: &FeatureContext<'_>) -> Result<SpectralFeatures, AnalysisError> {
    if ctx.spectrogram.frame_count() == 0 {
        return Err(AnalysisError::TooShort("no spectral frames".to_string()));
    }
    let mfcc = ctx.mfcc();
    let bandwidth = spectral_bandwidth(&ctx.spectrogram, &ctx.centroids);
    let contrast = spectral_contrast(
        &ctx.spectrogram,
        CONTRAST_BANDS,
        CONTRAST_FMIN_HZ,
        CONTRAST_QUANTILE,
    );

    let chroma: Vec<Vec<f32>> = chroma_frames(&ctx.spectrogram)
        .iter()
        .map(|c| c.to_vec())
        .collect();
    let tonal: Vec<Vec<f32>> = chroma_frames(&ctx.harmonic().harmonic)
        .iter()
        .map(|c| tonnetz(c).to_vec())
        .collect();

    Ok(SpectralFeatures {
        mfcc_mean: column_means(mfcc, N_MFCC),
        mfcc_std: column_stds(mfcc, N_MFCC),
        spectral_centroid_mean: finite("spectral centroid", stats::mean(&ctx.centroids))?,
        spectral_centroid_std: stats::std_dev(&ctx.centroids),
        spectral_rolloff_mean: finite("spectral rolloff", stats::mean(&ctx.rolloff))?,
        spectral_rolloff_std: stats::std_dev(&ctx.rolloff),
        spectral_bandwidth_mean: finite("spectral bandwidth", stats::mean(&bandwidth))?,
        spectral_bandwidth_std: stats::std_dev(&bandwidth),
        spectral_contrast_mean: column_means(&contrast, CONTRAST_BANDS + 1),
        chroma_mean: column_means(&chroma, 12),
        tonnetz_mean: column_means(&tonal, 6),
    })
}

pub fn prosodic_features(ctx: &FeatureContext<'_>) -> Result<ProsodicFeatures, AnalysisError> {
    let tempo = ctx.tempo();
    let beats = track_beats(
        ctx.onset_envelope(),
        tempo as f32,
        ctx.sample_rate,
        HOP_LENGTH,
    );
    let onset_times = ctx.onset_times();

    let (rhythm_regularity, mean_onset_interval) = if onset_times.len() > 1 {
        let intervals: Vec<f32> = onset_times.windows(2).map(|w| (w[1] - w[0]) as f32).collect();
        (inter_onset_consistency(onset_times), stats::mean(&intervals))
    } else {
        (0.0, 0.0)
    };

    let pitch = ctx.pitch();
    let voiced = pitch.voiced();
    let (pitch_mean, pitch_std, pitch_range, voiced_ratio) = if voiced.is_empty() {
        (0.0, 0.0, 0.0, 0.0)
    } else {
        (
            stats::mean(&voiced),
            stats::std_dev(&voiced),
            (stats::max(&voiced) - stats::min(&voiced)) as f64,
            pitch.voiced_ratio(),
        )
    };

    let frames_per_second_total = ctx.duration() * ctx.sample_rate as f64 / HOP_LENGTH as f64;
    let speech_rate = if frames_per_second_total > 0.0 {
        pitch.voiced_count() as f64 / frames_per_second_total
    } else {
        0.0
    };

    Ok(ProsodicFeatures {
        tempo: finite("tempo", tempo)?,
        beat_count: beats.len(),
        onset_count: onset_times.len(),
        rhythm_regularity,
        mean_onset_interval,
        pitch_mean,
        pitch_std,
        pitch_range,
        voiced_ratio,
        speech_rate,
    })
}

pub fn voice_characteristics(
    ctx: &FeatureContext<'_>,
) -> Result<VoiceCharacteristics, AnalysisError> {
    let (jitter, shimmer) = jitter_shimmer(ctx);
    let mfcc_values: Vec<f32> = ctx.mfcc().iter().flatten().copied().collect();
    let bandwidth = spectral_bandwidth(&ctx.spectrogram, &ctx.centroids);
    let flatness = spectral_flatness(&ctx.spectrogram);

    let timbre = TimbreFeatures {
        mfcc_variance: stats::variance(&mfcc_values),
        spectral_centroid_mean: stats::mean(&ctx.centroids),
        spectral_bandwidth_mean: stats::mean(&bandwidth),
        spectral_rolloff_mean: stats::mean(&ctx.rolloff),
        spectral_flatness_mean: stats::mean(&flatness),
        timbre_complexity: stats::std_dev(&mfcc_values),
    };

    Ok(VoiceCharacteristics {
        formants: formants(ctx),
        jitter,
        shimmer,
        harmonics_to_noise_ratio: finite(
            "harmonics-to-noise ratio",
            ctx.harmonic().harmonics_to_noise_db(),
        )?,
        timbre,
        speaking_style: speaking_style(ctx),
    })
}

fn formants(ctx: &FeatureContext<'_>) -> Formants {
    let voiced = ctx.pitch().voiced_flags();
    let window = hann_window(FRAME_LENGTH);

    let candidates: Vec<usize> = voiced
        .iter()
        .enumerate()
        .filter(|&(i, &v)| v && i * HOP_LENGTH + FRAME_LENGTH <= ctx.samples.len())
        .map(|(i, _)| i)
        .collect();
    let stride = candidates.len().div_ceil(MAX_FORMANT_FRAMES).max(1);

    let mut tracks: [Vec<f64>; 3] = Default::default();
    for &index in candidates.iter().step_by(stride) {
        let start = index * HOP_LENGTH;
        let windowed: Vec<f32> = ctx.samples[start..start + FRAME_LENGTH]
            .iter()
            .zip(&window)
            .map(|(s, w)| s * w)
            .collect();
        let emphasized = pre_emphasis(&windowed, PRE_EMPHASIS);
        let Some(lpc) = lpc_coefficients(&emphasized, LPC_ORDER) else {
            continue;
        };
        let found = formants_from_lpc(&lpc, ctx.sample_rate);
        if found.len() < 2 {
            continue;
        }
        for (track, &f) in tracks.iter_mut().zip(found.iter()) {
            track.push(f);
        }
    }

    let track_mean = |t: &Vec<f64>| (!t.is_empty()).then(|| t.iter().sum::<f64>() / t.len() as f64);
    Formants {
        f1_mean: track_mean(&tracks[0]),
        f2_mean: track_mean(&tracks[1]),
        f3_mean: track_mean(&tracks[2]),
    }
}

/// Period and amplitude perturbation; both 0 with fewer than three voiced frames
fn jitter_shimmer(ctx: &FeatureContext<'_>) -> (f64, f64) {
    let periods: Vec<f32> = ctx
        .pitch()
        .voiced()
        .into_iter()
        .map(|f0| ctx.sample_rate as f32 / f0)
        .collect();
    if periods.len() < 3 {
        return (0.0, 0.0);
    }

    let mean_period = stats::mean(&periods);
    let period_deltas: Vec<f32> = stats::diff(&periods).iter().map(|d| d.abs()).collect();
    let jitter = if mean_period > 0.0 {
        stats::mean(&period_deltas) / mean_period
    } else {
        0.0
    };

    let rms = rms_frames(ctx.samples, SHIMMER_FRAME, SHIMMER_HOP);
    let mean_rms = stats::mean(&rms);
    let rms_deltas: Vec<f32> = stats::diff(&rms).iter().map(|d| d.abs()).collect();
    let shimmer = if mean_rms > 0.0 {
        stats::mean(&rms_deltas) / mean_rms
    } else {
        0.0
    };

    (jitter, shimmer)
}

fn speaking_style(ctx: &FeatureContext<'_>) -> SpeakingStyle {
    let onset_times = ctx.onset_times();
    let rate_consistency = if onset_times.len() > 2 {
        inter_onset_consistency(onset_times)
    } else {
        0.0
    };

    SpeakingStyle {
        pause_patterns: pause_patterns(ctx.samples, ctx.sample_rate),
        volume_variance: stats::variance(&ctx.rms),
        volume_range: (stats::max(&ctx.rms) - stats::min(&ctx.rms)) as f64,
        rate_consistency,
        articulation_clarity: stats::mean(&ctx.centroids) / 1000.0,
    }
}

/// Runs of samples quieter than the 20th amplitude percentile lasting over 100 ms
///
/// A run still open at the end of the signal is not counted.
pub fn pause_patterns(samples: &[f32], sample_rate: u32) -> PausePatterns {
    if samples.is_empty() || sample_rate == 0 {
        return PausePatterns::default();
    }
    let abs: Vec<f32> = samples.iter().map(|s| s.abs()).collect();
    let threshold = stats::percentile(&abs, PAUSE_PERCENTILE);
    let sr = sample_rate as f64;

    let mut pauses: Vec<f32> = Vec::new();
    let mut pause_start: Option<usize> = None;
    for (i, &a) in abs.iter().enumerate() {
        match (a < threshold, pause_start) {
            (true, None) => pause_start = Some(i),
            (false, Some(start)) => {
                let duration = (i - start) as f64 / sr;
                if duration > MIN_PAUSE_SECONDS {
                    pauses.push(duration as f32);
                }
                pause_start = None;
            }
            _ => {}
        }
    }

    if pauses.is_empty() {
        return PausePatterns::default();
    }
    PausePatterns {
        total_pauses: pauses.len(),
        average_pause_duration: stats::mean(&pauses),
        pause_duration_std: stats::std_dev(&pauses),
        longest_pause: stats::max(&pauses) as f64,
        pause_frequency: pauses.len() as f64 / (samples.len() as f64 / sr),
    }
}

pub fn emotional_indicators(
    ctx: &FeatureContext<'_>,
) -> Result<EmotionalIndicators, AnalysisError> {
    let energy_level = stats::mean(&ctx.rms);
    let energy_variation = stats::variance(&ctx.rms);

    let voiced = ctx.pitch().voiced();
    let (pitch_variation, pitch_range) = if voiced.is_empty() {
        (0.0, 0.0)
    } else {
        (
            stats::variance(&voiced),
            (stats::max(&voiced) - stats::min(&voiced)) as f64,
        )
    };

    let voice_brightness = finite("voice brightness", stats::mean(&ctx.centroids))?;
    let slope: Vec<f32> = ctx
        .rolloff
        .iter()
        .zip(&ctx.centroids)
        .map(|(r, c)| r - c)
        .collect();

    let emotion_scores = emotion_scores(
        energy_level,
        energy_variation,
        pitch_variation,
        pitch_range,
        voice_brightness,
    );

    Ok(EmotionalIndicators {
        energy_level,
        energy_variation,
        pitch_variation,
        pitch_range,
        voice_brightness,
        spectral_slope: stats::mean(&slope),
        emotion_scores,
    })
}

/// Heuristic [0, 1] emotion scores from normalized prosodic magnitudes
pub fn emotion_scores(
    energy: f64,
    energy_var: f64,
    pitch_var: f64,
    pitch_range: f64,
    brightness: f64,
) -> EmotionScores {
    let energy_norm = (energy * 10.0).min(1.0);
    let energy_var_norm = (energy_var * 100.0).min(1.0);
    let pitch_var_norm = (pitch_var / 1000.0).min(1.0);
    let pitch_range_norm = (pitch_range / 200.0).min(1.0);
    let brightness_norm = (brightness / 2000.0).min(1.0);

    let excitement = (energy_norm + pitch_var_norm + brightness_norm) / 3.0;
    EmotionScores {
        excitement,
        calmness: 1.0 - excitement,
        expressiveness: (energy_var_norm + pitch_range_norm) / 2.0,
        confidence: (energy_norm + brightness_norm) / 2.0,
    }
}

pub fn voice_quality(ctx: &FeatureContext<'_>) -> Result<VoiceQuality, AnalysisError> {
    let samples = ctx.samples;
    if samples.is_empty() {
        return Err(AnalysisError::TooShort("no samples".to_string()));
    }
    let abs: Vec<f32> = samples.iter().map(|s| s.abs()).collect();
    let peak = stats::max(&abs) as f64;
    if peak <= 0.0 {
        return Err(AnalysisError::Degenerate("signal is silent".to_string()));
    }

    let signal_power = samples.iter().map(|&s| (s as f64) * (s as f64)).sum::<f64>()
        / samples.len() as f64;
    let noise_floor = stats::percentile(&abs, NOISE_FLOOR_PERCENTILE) as f64;
    let snr_db = finite(
        "signal-to-noise ratio",
        10.0 * (signal_power / (noise_floor * noise_floor + 1e-10)).log10(),
    )?;

    let dynamic_range_db = finite(
        "dynamic range",
        20.0 * (peak / (stats::mean(&abs) + 1e-10)).log10(),
    )?;

    let (magnitudes, freqs) = whole_signal_spectrum(samples, ctx.sample_rate);
    let mut speech = 0.0f64;
    let mut total = 0.0f64;
    for (&m, &f) in magnitudes.iter().zip(&freqs) {
        if f > 0.0 {
            total += m as f64;
            if f >= SPEECH_BAND_HZ.0 && f <= SPEECH_BAND_HZ.1 {
                speech += m as f64;
            }
        }
    }
    let frequency_balance = speech / (total + 1e-10);

    let clipped = abs.iter().filter(|&&a| a >= CLIPPING_LEVEL).count();
    let clipping_ratio = clipped as f64 / samples.len() as f64;

    let quality_components = QualityComponents {
        snr_score: ((snr_db - 10.0) / 30.0).clamp(0.0, 1.0),
        dynamic_range_score: (dynamic_range_db / 40.0).clamp(0.0, 1.0),
        frequency_balance_score: frequency_balance,
        clipping_penalty: (1.0 - clipping_ratio * 10.0).max(0.0),
    };
    let overall_quality_score = quality_components.overall();

    Ok(VoiceQuality {
        snr_db,
        dynamic_range_db,
        frequency_balance,
        clipping_ratio,
        quality_components,
        overall_quality_score,
        quality_grade: QualityGrade::from_score(overall_quality_score),
    })
}

/// Frame-wise mean of the zero-crossing rate over the standard analysis frames
pub fn mean_zero_crossing_rate(samples: &[f32]) -> f64 {
    stats::mean(&zero_crossing_frames(samples, FRAME_LENGTH, HOP_LENGTH))
}

pub fn mfcc_mean(ctx: &FeatureContext<'_>) -> Vec<f64> {
    column_means(ctx.mfcc(), N_MFCC)
}
