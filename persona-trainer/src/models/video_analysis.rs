//! Video analysis record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::signal_group::SignalGroup;
use super::suitability::{Signals, Suitability};
use crate::services::suitability_scorer::{score, ScoringTable};

/// Container metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoBasicInfo {
    /// Seconds
    pub duration: f64,
    pub fps: f64,
    pub frame_count: u64,
    pub width: u32,
    pub height: u32,
    pub aspect_ratio: f64,
    pub file_size: u64,
    pub has_audio: bool,
}

/// Half-open time range in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }
}

/// Features of the embedded audio track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoAudioFeatures {
    pub duration: f64,
    /// Mean frame RMS
    pub mean_energy: f64,
    pub spectral_centroid_mean: f64,
    pub spectral_rolloff_mean: f64,
    pub zero_crossing_rate_mean: f64,
    /// 13 coefficients
    pub mfcc_mean: Vec<f64>,
    pub tempo: f64,
    pub voice_segments: Vec<TimeRange>,
    /// Voice segments per second of audio
    pub voice_activity_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceStats {
    /// Fraction of inspected frames with at least one face
    pub face_detection_rate: f64,
    pub average_face_confidence: f64,
    pub face_frames: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementStats {
    pub average_movement: f64,
    pub movement_variability: f64,
    pub total_movement: f64,
    /// Deltas above mean + std
    pub movement_peaks: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GestureStats {
    pub gesture_types: BTreeMap<String, usize>,
    /// "none" when no hands were seen
    pub most_common_gesture: String,
    pub gesture_variety: usize,
    pub average_activity: f64,
    /// Hand detections per second between the first and last detection
    pub gesture_frequency: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualFeatures {
    pub analyzed_frames: usize,
    pub face_detection: SignalGroup<FaceStats>,
    pub pose_landmarks_count: usize,
    pub hand_gestures_count: usize,
    pub movement_analysis: SignalGroup<MovementStats>,
    pub gesture_analysis: SignalGroup<GestureStats>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeakingPace {
    Slow,
    Moderate,
    Fast,
}

impl SpeakingPace {
    pub fn from_tempo(tempo: f64) -> Self {
        if tempo < 100.0 {
            SpeakingPace::Slow
        } else if tempo > 150.0 {
            SpeakingPace::Fast
        } else {
            SpeakingPace::Moderate
        }
    }
}

/// Heuristic personality indicators; each present only when its source signal is
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonalityIndicators {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub energy_level: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaking_pace: Option<SpeakingPace>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visual_confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expressiveness: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engagement_duration: Option<f64>,
}

impl PersonalityIndicators {
    pub fn derive(
        basic_info: &VideoBasicInfo,
        audio: &SignalGroup<VideoAudioFeatures>,
        visual: &SignalGroup<VisualFeatures>,
    ) -> Self {
        let audio = audio.ok();
        let visual = visual.ok();
        Self {
            energy_level: audio.map(|a| (a.mean_energy * 10.0).min(1.0)),
            speaking_pace: audio.map(|a| SpeakingPace::from_tempo(a.tempo)),
            visual_confidence: visual
                .and_then(|v| v.face_detection.ok())
                .map(|f| f.average_face_confidence),
            expressiveness: visual
                .and_then(|v| v.movement_analysis.ok())
                .map(|m| (m.average_movement * 100.0).min(1.0)),
            engagement_duration: Some((basic_info.duration / 60.0).min(1.0)),
        }
    }
}

/// Full analysis of one video file
///
/// As with audio records, suitability is derived in [`VideoAnalysis::new`].
#[derive(Debug, Clone, Serialize)]
pub struct VideoAnalysis {
    file_path: PathBuf,
    analysis_timestamp: DateTime<Utc>,
    basic_info: VideoBasicInfo,
    audio_features: SignalGroup<VideoAudioFeatures>,
    visual_features: SignalGroup<VisualFeatures>,
    personality_indicators: PersonalityIndicators,
    training_suitability: Suitability,
}

impl VideoAnalysis {
    pub fn new(
        file_path: impl Into<PathBuf>,
        basic_info: VideoBasicInfo,
        audio_features: SignalGroup<VideoAudioFeatures>,
        visual_features: SignalGroup<VisualFeatures>,
        table: &ScoringTable,
    ) -> Self {
        let personality_indicators =
            PersonalityIndicators::derive(&basic_info, &audio_features, &visual_features);
        let signals = scoring_signals(&basic_info, &audio_features, &visual_features);
        let training_suitability = score(&signals, table);
        Self {
            file_path: file_path.into(),
            analysis_timestamp: Utc::now(),
            basic_info,
            audio_features,
            visual_features,
            personality_indicators,
            training_suitability,
        }
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn analysis_timestamp(&self) -> DateTime<Utc> {
        self.analysis_timestamp
    }

    pub fn basic_info(&self) -> &VideoBasicInfo {
        &self.basic_info
    }

    pub fn audio_features(&self) -> &SignalGroup<VideoAudioFeatures> {
        &self.audio_features
    }

    pub fn visual_features(&self) -> &SignalGroup<VisualFeatures> {
        &self.visual_features
    }

    pub fn personality_indicators(&self) -> &PersonalityIndicators {
        &self.personality_indicators
    }

    pub fn training_suitability(&self) -> &Suitability {
        &self.training_suitability
    }

    pub fn is_suitable(&self, threshold: f64) -> bool {
        self.training_suitability.score as f64 >= threshold
    }
}

fn scoring_signals(
    basic: &VideoBasicInfo,
    audio: &SignalGroup<VideoAudioFeatures>,
    visual: &SignalGroup<VisualFeatures>,
) -> Signals {
    let audio = audio.ok();
    let visual = visual.ok();
    Signals::new()
        .with("duration", Some(basic.duration))
        .with("audio_energy", audio.map(|a| a.mean_energy))
        .with(
            "face_detection_rate",
            visual
                .and_then(|v| v.face_detection.ok())
                .map(|f| f.face_detection_rate),
        )
        .with("voice_activity_ratio", audio.map(|a| a.voice_activity_ratio))
        .with(
            "average_movement",
            visual
                .and_then(|v| v.movement_analysis.ok())
                .map(|m| m.average_movement),
        )
}
