//! Audio analysis record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::signal_group::SignalGroup;
use super::suitability::{Signals, Suitability};
use crate::services::suitability_scorer::{score, ScoringTable};

/// File-level facts computed straight from the decoded samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicInfo {
    /// Seconds
    pub duration: f64,
    pub sample_rate: u32,
    /// Bytes on disk
    pub file_size: u64,
    /// Mean frame RMS
    pub mean_energy: f64,
    /// Max frame RMS
    pub max_energy: f64,
    /// max|y| - min|y|
    pub dynamic_range: f64,
    pub mean_zero_crossing_rate: f64,
    pub total_samples: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectralFeatures {
    /// 13 coefficients
    pub mfcc_mean: Vec<f64>,
    pub mfcc_std: Vec<f64>,
    pub spectral_centroid_mean: f64,
    pub spectral_centroid_std: f64,
    pub spectral_rolloff_mean: f64,
    pub spectral_rolloff_std: f64,
    pub spectral_bandwidth_mean: f64,
    pub spectral_bandwidth_std: f64,
    /// 7 bands
    pub spectral_contrast_mean: Vec<f64>,
    /// 12 pitch classes
    pub chroma_mean: Vec<f64>,
    /// 6 tonal centroid dimensions
    pub tonnetz_mean: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProsodicFeatures {
    /// BPM, 0 when no periodicity was found
    pub tempo: f64,
    pub beat_count: usize,
    pub onset_count: usize,
    /// 1 / (std of inter-onset intervals + 1e-10)
    pub rhythm_regularity: f64,
    pub mean_onset_interval: f64,
    pub pitch_mean: f64,
    pub pitch_std: f64,
    pub pitch_range: f64,
    pub voiced_ratio: f64,
    pub speech_rate: f64,
}

/// Mean F1-F3 over voiced frames; `None` when no frame produced that formant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Formants {
    pub f1_mean: Option<f64>,
    pub f2_mean: Option<f64>,
    pub f3_mean: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimbreFeatures {
    pub mfcc_variance: f64,
    pub spectral_centroid_mean: f64,
    pub spectral_bandwidth_mean: f64,
    pub spectral_rolloff_mean: f64,
    pub spectral_flatness_mean: f64,
    pub timbre_complexity: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PausePatterns {
    pub total_pauses: usize,
    pub average_pause_duration: f64,
    pub pause_duration_std: f64,
    pub longest_pause: f64,
    /// Pauses per second
    pub pause_frequency: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakingStyle {
    pub pause_patterns: PausePatterns,
    pub volume_variance: f64,
    pub volume_range: f64,
    pub rate_consistency: f64,
    pub articulation_clarity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceCharacteristics {
    pub formants: Formants,
    pub jitter: f64,
    pub shimmer: f64,
    /// dB
    pub harmonics_to_noise_ratio: f64,
    pub timbre: TimbreFeatures,
    pub speaking_style: SpeakingStyle,
}

/// Heuristic emotion scores, each in [0, 1]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionScores {
    pub excitement: f64,
    pub calmness: f64,
    pub expressiveness: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionalIndicators {
    pub energy_level: f64,
    pub energy_variation: f64,
    pub pitch_variation: f64,
    pub pitch_range: f64,
    pub voice_brightness: f64,
    pub spectral_slope: f64,
    pub emotion_scores: EmotionScores,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityGrade {
    Excellent,
    Good,
    Fair,
    Poor,
    #[serde(rename = "Very Poor")]
    VeryPoor,
}

impl QualityGrade {
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s >= 0.8 => QualityGrade::Excellent,
            s if s >= 0.6 => QualityGrade::Good,
            s if s >= 0.4 => QualityGrade::Fair,
            s if s >= 0.2 => QualityGrade::Poor,
            _ => QualityGrade::VeryPoor,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityComponents {
    pub snr_score: f64,
    pub dynamic_range_score: f64,
    pub frequency_balance_score: f64,
    pub clipping_penalty: f64,
}

impl QualityComponents {
    pub fn overall(&self) -> f64 {
        (self.snr_score + self.dynamic_range_score + self.frequency_balance_score + self.clipping_penalty)
            / 4.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceQuality {
    pub snr_db: f64,
    pub dynamic_range_db: f64,
    pub frequency_balance: f64,
    pub clipping_ratio: f64,
    pub quality_components: QualityComponents,
    pub overall_quality_score: f64,
    pub quality_grade: QualityGrade,
}

/// Full analysis of one audio file
///
/// The suitability verdict is computed in [`AudioAnalysis::new`] from the other fields and
/// cannot be set independently.
#[derive(Debug, Clone, Serialize)]
pub struct AudioAnalysis {
    file_path: PathBuf,
    analysis_timestamp: DateTime<Utc>,
    basic_info: BasicInfo,
    spectral_features: SignalGroup<SpectralFeatures>,
    prosodic_features: SignalGroup<ProsodicFeatures>,
    voice_characteristics: SignalGroup<VoiceCharacteristics>,
    emotional_indicators: SignalGroup<EmotionalIndicators>,
    voice_quality: SignalGroup<VoiceQuality>,
    training_suitability: Suitability,
}

/// Signal groups of an audio record before scoring
#[derive(Debug, Clone)]
pub struct AudioSignalGroups {
    pub spectral_features: SignalGroup<SpectralFeatures>,
    pub prosodic_features: SignalGroup<ProsodicFeatures>,
    pub voice_characteristics: SignalGroup<VoiceCharacteristics>,
    pub emotional_indicators: SignalGroup<EmotionalIndicators>,
    pub voice_quality: SignalGroup<VoiceQuality>,
}

impl AudioAnalysis {
    pub fn new(
        file_path: impl Into<PathBuf>,
        basic_info: BasicInfo,
        groups: AudioSignalGroups,
        table: &ScoringTable,
    ) -> Self {
        let signals = scoring_signals(&basic_info, &groups);
        let training_suitability = score(&signals, table);
        Self {
            file_path: file_path.into(),
            analysis_timestamp: Utc::now(),
            basic_info,
            spectral_features: groups.spectral_features,
            prosodic_features: groups.prosodic_features,
            voice_characteristics: groups.voice_characteristics,
            emotional_indicators: groups.emotional_indicators,
            voice_quality: groups.voice_quality,
            training_suitability,
        }
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn analysis_timestamp(&self) -> DateTime<Utc> {
        self.analysis_timestamp
    }

    pub fn basic_info(&self) -> &BasicInfo {
        &self.basic_info
    }

    pub fn spectral_features(&self) -> &SignalGroup<SpectralFeatures> {
        &self.spectral_features
    }

    pub fn prosodic_features(&self) -> &SignalGroup<ProsodicFeatures> {
        &self.prosodic_features
    }

    pub fn voice_characteristics(&self) -> &SignalGroup<VoiceCharacteristics> {
        &self.voice_characteristics
    }

    pub fn emotional_indicators(&self) -> &SignalGroup<EmotionalIndicators> {
        &self.emotional_indicators
    }

    pub fn voice_quality(&self) -> &SignalGroup<VoiceQuality> {
        &self.voice_quality
    }

    pub fn training_suitability(&self) -> &Suitability {
        &self.training_suitability
    }

    /// Whether the record clears `threshold` (0-100)
    pub fn is_suitable(&self, threshold: f64) -> bool {
        self.training_suitability.score as f64 >= threshold
    }
}

fn scoring_signals(basic: &BasicInfo, groups: &AudioSignalGroups) -> Signals {
    let quality = groups.voice_quality.ok();
    Signals::new()
        .with("duration", Some(basic.duration))
        .with("overall_quality", quality.map(|q| q.overall_quality_score))
        .with("snr_db", quality.map(|q| q.snr_db))
        .with("clipping_ratio", quality.map(|q| q.clipping_ratio))
        .with(
            "harmonics_to_noise_ratio",
            groups
                .voice_characteristics
                .ok()
                .map(|v| v.harmonics_to_noise_ratio),
        )
}
