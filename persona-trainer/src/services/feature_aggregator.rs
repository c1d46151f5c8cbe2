//! Feature aggregation across analysis records
//!
//! Records expose their numeric sub-fields as a flat map of dotted keys
//! (`spectral_features.mfcc_mean.3`). Aggregation computes per-key statistics over whichever
//! records carry the key, so a record missing a group is excluded from those keys only.
//! Values are sorted before summation; any ordering of the input gives identical output.

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

use crate::models::audio_analysis::AudioAnalysis;
use crate::models::feature_summary::{FeatureStat, FeatureSummary};
use crate::models::persona_model::{
    BehavioralPatterns, EmotionalProfile, Level, ProsodicPatterns, QualityMetrics,
    TrainingMetadata, VisualCharacteristics, VisualPersonality, VisualProfile,
    VoiceCharacteristicsSummary, VoiceProfile,
};
use crate::models::video_analysis::VideoAnalysis;
use crate::services::audio_analyzer::features::N_MFCC;

/// Guards reciprocal consistency measures against zero spread
const CONSISTENCY_EPSILON: f64 = 1e-10;

/// A record whose numeric sub-fields can be aggregated
pub trait FeatureSource {
    /// Finite numeric leaves keyed by dotted path
    fn numeric_features(&self) -> BTreeMap<String, f64>;

    /// Identifies the record in training metadata
    fn source_name(&self) -> String;
}

impl FeatureSource for AudioAnalysis {
    fn numeric_features(&self) -> BTreeMap<String, f64> {
        flatten_record(self)
    }

    fn source_name(&self) -> String {
        self.file_path().display().to_string()
    }
}

impl FeatureSource for VideoAnalysis {
    fn numeric_features(&self) -> BTreeMap<String, f64> {
        // Per-segment boundaries are positional, not features
        let mut features = flatten_record(self);
        features.retain(|key, _| !key.starts_with("audio_features.voice_segments."));
        features
    }

    fn source_name(&self) -> String {
        self.file_path().display().to_string()
    }
}

impl FeatureSource for Value {
    fn numeric_features(&self) -> BTreeMap<String, f64> {
        let mut out = BTreeMap::new();
        flatten_into("", self, &mut out);
        out
    }

    fn source_name(&self) -> String {
        self.get("file_path")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }
}

fn flatten_record<T: Serialize>(record: &T) -> BTreeMap<String, f64> {
    match serde_json::to_value(record) {
        Ok(value) => value.numeric_features(),
        Err(e) => {
            warn!(error = %e, "Record could not be flattened for aggregation");
            BTreeMap::new()
        }
    }
}

fn flatten_into(prefix: &str, value: &Value, out: &mut BTreeMap<String, f64>) {
    let key = |name: &str| {
        if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{prefix}.{name}")
        }
    };
    match value {
        Value::Number(n) => {
            if let Some(v) = n.as_f64().filter(|v| v.is_finite()) {
                out.insert(prefix.to_string(), v);
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                flatten_into(&key(&i.to_string()), item, out);
            }
        }
        Value::Object(map) => {
            // Signal groups that are not ok carry no features
            if let Some(status) = map.get("status").and_then(Value::as_str) {
                if status != "ok" {
                    return;
                }
            }
            for (name, child) in map {
                if name != "status" {
                    flatten_into(&key(name), child, out);
                }
            }
        }
        Value::Null | Value::Bool(_) | Value::String(_) => {}
    }
}

/// Per-key statistics across `records`
pub fn aggregate<'a, R, I>(records: I) -> FeatureSummary
where
    R: FeatureSource + 'a + ?Sized,
    I: IntoIterator<Item = &'a R>,
{
    let mut columns: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    let mut record_count = 0;
    for record in records {
        record_count += 1;
        for (key, value) in record.numeric_features() {
            columns.entry(key).or_default().push(value);
        }
    }

    let features = columns
        .into_iter()
        .map(|(key, mut values)| {
            values.sort_by(f64::total_cmp);
            (key, statistic(&values))
        })
        .collect();

    FeatureSummary {
        record_count,
        features,
    }
}

/// Statistics of sorted, non-empty `values`
fn statistic(values: &[f64]) -> FeatureStat {
    let count = values.len();
    let mean = values.iter().sum::<f64>() / count as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64;
    FeatureStat {
        count,
        mean,
        variance,
        min: values[0],
        max: values[count - 1],
    }
}

fn consistency(stat: &FeatureStat) -> f64 {
    1.0 / (stat.std_dev() + CONSISTENCY_EPSILON)
}

fn training_metadata<R: FeatureSource>(records: &[&R]) -> TrainingMetadata {
    TrainingMetadata {
        total_files: records.len(),
        source_files: records.iter().map(|r| r.source_name()).collect(),
        analysis_timestamp: Utc::now(),
    }
}

/// Voice section of the persona model from suitable audio records
pub fn voice_profile(records: &[&AudioAnalysis]) -> VoiceProfile {
    let summary = aggregate(records.iter().copied());
    VoiceProfile {
        voice_characteristics: voice_characteristics(&summary),
        prosodic_patterns: prosodic_patterns(&summary),
        emotional_profile: emotional_profile(&summary),
        quality_metrics: quality_metrics(&summary),
        training_metadata: training_metadata(records),
        feature_statistics: summary,
    }
}

fn voice_characteristics(summary: &FeatureSummary) -> Option<VoiceCharacteristicsSummary> {
    let centroid = summary.get("spectral_features.spectral_centroid_mean")?;
    Some(VoiceCharacteristicsSummary {
        average_pitch: centroid.mean,
        pitch_variance: centroid.std_dev(),
        spectral_brightness: summary.mean("spectral_features.spectral_rolloff_mean")?,
        voice_timbre: (0..N_MFCC)
            .map(|i| {
                summary
                    .mean(&format!("spectral_features.mfcc_mean.{i}"))
                    .unwrap_or(0.0)
            })
            .collect(),
    })
}

fn prosodic_patterns(summary: &FeatureSummary) -> Option<ProsodicPatterns> {
    Some(ProsodicPatterns {
        speaking_rate: summary.mean("prosodic_features.speech_rate")?,
        rhythm_regularity: summary.mean("prosodic_features.rhythm_regularity")?,
        pitch_range: summary.mean("prosodic_features.pitch_range")?,
        tempo_consistency: consistency(summary.get("prosodic_features.tempo")?),
    })
}

fn emotional_profile(summary: &FeatureSummary) -> Option<EmotionalProfile> {
    Some(EmotionalProfile {
        energy_level: summary.mean("emotional_indicators.energy_level")?,
        expressiveness: summary.mean("emotional_indicators.energy_variation")?,
        voice_confidence: summary.mean("emotional_indicators.voice_brightness")? / 1000.0,
    })
}

fn quality_metrics(summary: &FeatureSummary) -> Option<QualityMetrics> {
    let quality = summary.get("voice_quality.overall_quality_score")?;
    Some(QualityMetrics {
        average_quality: quality.mean,
        quality_consistency: consistency(quality),
        minimum_quality: quality.min,
        maximum_quality: quality.max,
    })
}

/// Visual section of the persona model from suitable video records
pub fn visual_profile(records: &[&VideoAnalysis]) -> VisualProfile {
    let summary = aggregate(records.iter().copied());
    let face_rate = summary.get("visual_features.face_detection.face_detection_rate");

    let visual_characteristics = face_rate.map(|rate| VisualCharacteristics {
        average_visibility: rate.mean,
        visibility_consistency: consistency(rate),
        camera_presence: Level::classify(rate.mean, 0.7, 0.4),
    });

    let behavioral_patterns = summary
        .get("visual_features.movement_analysis.average_movement")
        .map(|movement| BehavioralPatterns {
            activity_level: movement.mean,
            movement_consistency: consistency(movement),
            expressiveness: Level::classify(movement.mean, 0.01, 0.005),
        });

    let energy = summary.mean("personality_indicators.energy_level");
    let expressiveness = summary.mean("personality_indicators.expressiveness");
    let personality_indicators = (energy.is_some() || expressiveness.is_some()).then(|| {
        VisualPersonality {
            energy_profile: energy.unwrap_or(0.5),
            expressiveness_profile: expressiveness.unwrap_or(0.5),
            visual_confidence: face_rate.map(|r| r.mean).unwrap_or(0.0),
        }
    });

    VisualProfile {
        visual_characteristics,
        behavioral_patterns,
        personality_indicators,
        training_metadata: training_metadata(records),
        feature_statistics: summary,
    }
}
