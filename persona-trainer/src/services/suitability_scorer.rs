//! Training suitability scoring
//!
//! A weighted checklist over named signals. Each criterion present in the signal set
//! contributes its maximum points to the denominator and the points of the band the value
//! falls into to the numerator. Poor bands report issues, acceptable bands report
//! recommendations, and the good outcome reports a strength.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::suitability::{Signals, Suitability, SuitabilityTier};

#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("Invalid scoring table: {0}")]
    InvalidTable(String),
}

/// Which side of a threshold is worse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Values below a band's threshold fall into it
    HigherIsBetter,
    /// Values above a band's threshold fall into it
    LowerIsBetter,
}

/// A scored band below the good outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub threshold: f64,
    pub points: u32,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub points: u32,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criterion {
    pub signal: String,
    pub max_points: u32,
    pub direction: Direction,
    #[serde(default)]
    pub poor: Option<Band>,
    #[serde(default)]
    pub acceptable: Option<Band>,
    pub good: Outcome,
}

impl Criterion {
    fn falls_in(&self, band: &Band, value: f64) -> bool {
        match self.direction {
            Direction::HigherIsBetter => value < band.threshold,
            Direction::LowerIsBetter => value > band.threshold,
        }
    }

    fn validate(&self) -> Result<(), ScoringError> {
        let bands = [self.poor.as_ref(), self.acceptable.as_ref()];
        let over_max = bands
            .iter()
            .flatten()
            .map(|b| b.points)
            .chain(std::iter::once(self.good.points))
            .any(|p| p > self.max_points);
        if over_max {
            return Err(ScoringError::InvalidTable(format!(
                "criterion '{}' awards more than its {} max points",
                self.signal, self.max_points
            )));
        }
        let thresholds_ok = bands
            .iter()
            .flatten()
            .all(|b| b.threshold.is_finite());
        if !thresholds_ok {
            return Err(ScoringError::InvalidTable(format!(
                "criterion '{}' has a non-finite threshold",
                self.signal
            )));
        }
        if let (Some(poor), Some(acceptable)) = (&self.poor, &self.acceptable) {
            let ordered = match self.direction {
                Direction::HigherIsBetter => poor.threshold <= acceptable.threshold,
                Direction::LowerIsBetter => poor.threshold >= acceptable.threshold,
            };
            if !ordered {
                return Err(ScoringError::InvalidTable(format!(
                    "criterion '{}' has its poor band beyond its acceptable band",
                    self.signal
                )));
            }
        }
        Ok(())
    }
}

/// Verdict text per tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerdictLabels {
    pub excellent: String,
    pub good: String,
    pub acceptable: String,
    pub poor: String,
}

impl VerdictLabels {
    pub fn label(&self, tier: SuitabilityTier) -> &str {
        match tier {
            SuitabilityTier::Excellent => &self.excellent,
            SuitabilityTier::Good => &self.good,
            SuitabilityTier::Acceptable => &self.acceptable,
            SuitabilityTier::Poor => &self.poor,
        }
    }
}

/// Declarative criteria table for one media type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringTable {
    pub verdicts: VerdictLabels,
    pub criteria: Vec<Criterion>,
}

fn band(threshold: f64, points: u32, message: &str) -> Option<Band> {
    Some(Band {
        threshold,
        points,
        message: message.to_string(),
    })
}

fn criterion(
    signal: &str,
    max_points: u32,
    direction: Direction,
    poor: Option<Band>,
    acceptable: Option<Band>,
    good: &str,
) -> Criterion {
    Criterion {
        signal: signal.to_string(),
        max_points,
        direction,
        poor,
        acceptable,
        good: Outcome {
            points: max_points,
            message: good.to_string(),
        },
    }
}

impl ScoringTable {
    /// Criteria for directly uploaded voice recordings
    pub fn default_audio() -> Self {
        use Direction::*;
        Self {
            verdicts: VerdictLabels {
                excellent: "Excellent for voice training".to_string(),
                good: "Good for voice training".to_string(),
                acceptable: "Acceptable for voice training".to_string(),
                poor: "Poor quality - recommend re-recording".to_string(),
            },
            criteria: vec![
                criterion(
                    "duration",
                    20,
                    HigherIsBetter,
                    band(5.0, 5, "Audio too short (minimum 5 seconds)"),
                    band(30.0, 15, "Longer audio (30+ seconds) improves training quality"),
                    "Good duration for voice training",
                ),
                criterion(
                    "overall_quality",
                    25,
                    HigherIsBetter,
                    band(0.3, 5, "Poor audio quality - consider re-recording"),
                    band(0.6, 15, "Audio quality could be improved"),
                    "Good audio quality",
                ),
                criterion(
                    "snr_db",
                    20,
                    HigherIsBetter,
                    band(10.0, 5, "High background noise - record in quiet environment"),
                    band(20.0, 15, "Reduce background noise for better results"),
                    "Low background noise",
                ),
                criterion(
                    "clipping_ratio",
                    15,
                    LowerIsBetter,
                    band(0.01, 5, "Audio clipping detected - reduce recording level"),
                    band(0.001, 10, "Minor clipping detected"),
                    "No audio clipping",
                ),
                criterion(
                    "harmonics_to_noise_ratio",
                    20,
                    HigherIsBetter,
                    band(5.0, 5, "Voice quality issues detected"),
                    band(15.0, 15, "Voice clarity could be improved"),
                    "Clear voice characteristics",
                ),
            ],
        }
    }

    /// Criteria for video recordings
    pub fn default_video() -> Self {
        use Direction::*;
        Self {
            verdicts: VerdictLabels {
                excellent: "Excellent for training".to_string(),
                good: "Good for training".to_string(),
                acceptable: "Acceptable for training".to_string(),
                poor: "Poor quality - consider re-recording".to_string(),
            },
            criteria: vec![
                criterion(
                    "duration",
                    20,
                    HigherIsBetter,
                    band(10.0, 5, "Video too short (minimum 10 seconds recommended)"),
                    band(30.0, 15, "Longer videos (30+ seconds) provide better training data"),
                    "Good video duration for training",
                ),
                criterion(
                    "audio_energy",
                    20,
                    HigherIsBetter,
                    band(0.01, 5, "Audio level very low - may affect voice training"),
                    band(0.05, 15, "Audio could be louder for better voice training"),
                    "Good audio levels detected",
                ),
                criterion(
                    "face_detection_rate",
                    20,
                    HigherIsBetter,
                    band(0.3, 5, "Face not consistently visible - affects visual training"),
                    band(0.7, 15, "Face should be visible more consistently"),
                    "Face consistently visible throughout video",
                ),
                criterion(
                    "voice_activity_ratio",
                    20,
                    HigherIsBetter,
                    band(0.3, 5, "Limited voice activity detected"),
                    band(0.6, 15, "More continuous speech would improve training"),
                    "Good voice activity throughout video",
                ),
                criterion(
                    "average_movement",
                    20,
                    HigherIsBetter,
                    None,
                    band(0.001, 10, "More natural movement would enhance persona character"),
                    "Natural movement patterns detected",
                ),
            ],
        }
    }

    /// Parse a table override from config, checking it is internally consistent
    pub fn from_toml(value: toml::Value) -> Result<Self, ScoringError> {
        let table: ScoringTable = value
            .try_into()
            .map_err(|e: toml::de::Error| ScoringError::InvalidTable(e.to_string()))?;
        table.validate()?;
        Ok(table)
    }

    /// Use `value` when given, otherwise `default`
    pub fn or_default(
        value: Option<&toml::Value>,
        default: fn() -> ScoringTable,
    ) -> Result<Self, ScoringError> {
        match value {
            Some(v) => Self::from_toml(v.clone()),
            None => Ok(default()),
        }
    }

    pub fn validate(&self) -> Result<(), ScoringError> {
        self.criteria.iter().try_for_each(Criterion::validate)
    }
}

/// Score a signal set against a criteria table
///
/// Criteria whose signal is absent are skipped entirely. With no criteria present the
/// score is 0.
pub fn score(signals: &Signals, table: &ScoringTable) -> Suitability {
    let mut earned = 0u32;
    let mut possible = 0u32;
    let mut issues = Vec::new();
    let mut recommendations = Vec::new();
    let mut strengths = Vec::new();

    for criterion in &table.criteria {
        let Some(value) = signals.get(&criterion.signal) else {
            continue;
        };
        possible += criterion.max_points;

        if let Some(poor) = criterion.poor.as_ref().filter(|b| criterion.falls_in(b, value)) {
            earned += poor.points;
            issues.push(poor.message.clone());
        } else if let Some(acceptable) = criterion
            .acceptable
            .as_ref()
            .filter(|b| criterion.falls_in(b, value))
        {
            earned += acceptable.points;
            recommendations.push(acceptable.message.clone());
        } else {
            earned += criterion.good.points;
            strengths.push(criterion.good.message.clone());
        }
    }

    let score = if possible == 0 {
        0
    } else {
        ((100.0 * earned as f64 / possible as f64).round() as u32).min(100)
    };
    let tier = SuitabilityTier::from_score(score);

    Suitability {
        score,
        tier,
        verdict: table.verdicts.label(tier).to_string(),
        issues,
        recommendations,
        strengths,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean_voice() -> Signals {
        Signals::new()
            .with("duration", Some(45.0))
            .with("overall_quality", Some(0.75))
            .with("snr_db", Some(25.0))
            .with("clipping_ratio", Some(0.0))
            .with("harmonics_to_noise_ratio", Some(18.0))
    }

    #[test]
    fn test_clean_voice_is_excellent() {
        let result = score(&clean_voice(), &ScoringTable::default_audio());
        assert_eq!(result.score, 100);
        assert_eq!(result.tier, SuitabilityTier::Excellent);
        assert_eq!(result.verdict, "Excellent for voice training");
        assert!(result.issues.is_empty());
        assert_eq!(result.strengths.len(), 5);
    }

    #[test]
    fn test_short_clip_reports_duration_issue() {
        let signals = Signals::new()
            .with("duration", Some(3.0))
            .with("overall_quality", Some(0.2))
            .with("snr_db", Some(5.0));
        let result = score(&signals, &ScoringTable::default_audio());
        // 5 + 5 + 5 of 65
        assert_eq!(result.score, 23);
        assert_eq!(result.tier, SuitabilityTier::Poor);
        assert_eq!(result.verdict, "Poor quality - recommend re-recording");
        assert!(result
            .issues
            .contains(&"Audio too short (minimum 5 seconds)".to_string()));
    }

    #[test]
    fn test_lower_is_better_bands() {
        let table = ScoringTable::default_audio();
        let minor = score(&Signals::new().with("clipping_ratio", Some(0.005)), &table);
        assert_eq!(minor.recommendations, vec!["Minor clipping detected".to_string()]);
        // 10 of 15
        assert_eq!(minor.score, 67);

        let heavy = score(&Signals::new().with("clipping_ratio", Some(0.05)), &table);
        assert_eq!(heavy.issues.len(), 1);
        assert_eq!(heavy.score, 33);
    }

    #[test]
    fn test_thresholds_are_exclusive() {
        let table = ScoringTable::default_audio();
        let at_bar = score(&Signals::new().with("duration", Some(30.0)), &table);
        assert_eq!(at_bar.score, 100);
        let at_poor_bar = score(&Signals::new().with("duration", Some(5.0)), &table);
        assert_eq!(at_poor_bar.score, 75);
    }

    #[test]
    fn test_no_signals_scores_zero() {
        let result = score(&Signals::new(), &ScoringTable::default_video());
        assert_eq!(result.score, 0);
        assert_eq!(result.tier, SuitabilityTier::Poor);
        assert_eq!(result.verdict, "Poor quality - consider re-recording");
    }

    #[test]
    fn test_movement_without_poor_band() {
        let table = ScoringTable::default_video();
        let still = score(&Signals::new().with("average_movement", Some(0.0)), &table);
        assert_eq!(still.score, 50);
        assert!(still.issues.is_empty());
        assert_eq!(still.recommendations.len(), 1);
    }

    #[test]
    fn test_partial_video_signals() {
        let signals = Signals::new()
            .with("duration", Some(20.0))
            .with("face_detection_rate", Some(0.5));
        let result = score(&signals, &ScoringTable::default_video());
        assert_eq!(result.score, 75);
        assert_eq!(result.tier, SuitabilityTier::Good);
        assert_eq!(result.verdict, "Good for training");
    }

    #[test]
    fn test_score_always_in_range() {
        let table = ScoringTable::default_audio();
        for duration in [0.0, 1.0, 5.0, 29.0, 30.0, 600.0] {
            for snr in [-10.0, 0.0, 15.0, 40.0] {
                let signals = Signals::new()
                    .with("duration", Some(duration))
                    .with("snr_db", Some(snr));
                let result = score(&signals, &table);
                assert!(result.score <= 100);
                assert_eq!(result.tier, SuitabilityTier::from_score(result.score));
            }
        }
    }

    #[test]
    fn test_table_override_from_toml() {
        let value: toml::Value = toml::from_str(
            r#"
            [verdicts]
            excellent = "great"
            good = "fine"
            acceptable = "meh"
            poor = "bad"

            [[criteria]]
            signal = "duration"
            max_points = 10
            direction = "higher_is_better"
            poor = { threshold = 2.0, points = 1, message = "short" }
            good = { points = 10, message = "long enough" }
            "#,
        )
        .unwrap();
        let table = ScoringTable::from_toml(value).unwrap();
        let result = score(&Signals::new().with("duration", Some(1.0)), &table);
        assert_eq!(result.score, 10);
        assert_eq!(result.verdict, "bad");
        assert_eq!(result.issues, vec!["short".to_string()]);
    }

    #[test]
    fn test_invalid_table_rejected() {
        let mut table = ScoringTable::default_audio();
        table.criteria[0].good.points = 50;
        assert!(table.validate().is_err());

        let mut swapped = ScoringTable::default_audio();
        swapped.criteria[3].poor = band(0.0001, 5, "x");
        assert!(swapped.validate().is_err());

        assert!(ScoringTable::default_video().validate().is_ok());
    }
}
