//! Persona model and its per-modality section documents

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::feature_summary::FeatureSummary;

/// Unified persona model written at the end of a successful run
///
/// A section is present only when its modality had at least one suitable file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaModel {
    pub persona_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_model: Option<VoiceProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual_model: Option<VisualProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personality_model: Option<PersonalityProfile>,
    pub training_timestamp: DateTime<Utc>,
}

impl PersonaModel {
    /// Names of the sections present, in model order
    pub fn sections(&self) -> Vec<&'static str> {
        let mut sections = Vec::new();
        if self.voice_model.is_some() {
            sections.push("voice_model");
        }
        if self.visual_model.is_some() {
            sections.push("visual_model");
        }
        if self.personality_model.is_some() {
            sections.push("personality_model");
        }
        sections
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetadata {
    pub total_files: usize,
    pub source_files: Vec<String>,
    pub analysis_timestamp: DateTime<Utc>,
}

/// `advanced_voice_features.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_characteristics: Option<VoiceCharacteristicsSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prosodic_patterns: Option<ProsodicPatterns>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotional_profile: Option<EmotionalProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_metrics: Option<QualityMetrics>,
    pub training_metadata: TrainingMetadata,
    pub feature_statistics: FeatureSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceCharacteristicsSummary {
    /// Mean spectral centroid across files
    pub average_pitch: f64,
    /// Std of per-file spectral centroid means
    pub pitch_variance: f64,
    /// Mean spectral rolloff
    pub spectral_brightness: f64,
    /// Mean MFCC vector (13)
    pub voice_timbre: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProsodicPatterns {
    pub speaking_rate: f64,
    pub rhythm_regularity: f64,
    pub pitch_range: f64,
    /// 1 / (std of per-file tempo + 1e-10)
    pub tempo_consistency: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionalProfile {
    pub energy_level: f64,
    pub expressiveness: f64,
    pub voice_confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub average_quality: f64,
    pub quality_consistency: f64,
    pub minimum_quality: f64,
    pub maximum_quality: f64,
}

/// Three-level qualitative band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    High,
    Medium,
    Low,
}

impl Level {
    /// `High` above `high`, `Medium` above `medium`, else `Low`
    pub fn classify(value: f64, high: f64, medium: f64) -> Self {
        if value > high {
            Level::High
        } else if value > medium {
            Level::Medium
        } else {
            Level::Low
        }
    }
}

/// `advanced_visual_features.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual_characteristics: Option<VisualCharacteristics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavioral_patterns: Option<BehavioralPatterns>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personality_indicators: Option<VisualPersonality>,
    pub training_metadata: TrainingMetadata,
    pub feature_statistics: FeatureSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualCharacteristics {
    pub average_visibility: f64,
    pub visibility_consistency: f64,
    pub camera_presence: Level,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehavioralPatterns {
    pub activity_level: f64,
    pub movement_consistency: f64,
    pub expressiveness: Level,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualPersonality {
    pub energy_profile: f64,
    pub expressiveness_profile: f64,
    pub visual_confidence: f64,
}

/// `personality_features.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalityProfile {
    pub writing_style: WritingStyle,
    pub source_files: usize,
    pub analysis_timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WritingStyle {
    /// Words per '.'-separated piece
    pub average_sentence_length: f64,
    /// Distinct lowercase words
    pub vocabulary_complexity: usize,
    /// Count of '!' and '?'
    pub punctuation_usage: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_sections_are_not_serialized() {
        let model = PersonaModel {
            persona_id: "p1".to_string(),
            voice_model: None,
            visual_model: None,
            personality_model: Some(PersonalityProfile {
                writing_style: WritingStyle {
                    average_sentence_length: 4.0,
                    vocabulary_complexity: 10,
                    punctuation_usage: 1,
                },
                source_files: 1,
                analysis_timestamp: Utc::now(),
            }),
            training_timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&model).unwrap();
        assert!(json.get("voice_model").is_none());
        assert!(json.get("visual_model").is_none());
        assert_eq!(json["personality_model"]["writing_style"]["punctuation_usage"], 1);
        assert_eq!(model.sections(), vec!["personality_model"]);

        let back: PersonaModel = serde_json::from_value(json).unwrap();
        assert_eq!(back, model);
    }

    #[test]
    fn test_level_classification() {
        assert_eq!(Level::classify(0.8, 0.7, 0.4), Level::High);
        assert_eq!(Level::classify(0.7, 0.7, 0.4), Level::Medium);
        assert_eq!(Level::classify(0.4, 0.7, 0.4), Level::Low);
    }
}
