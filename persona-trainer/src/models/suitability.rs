//! Training suitability verdicts and scoring signals

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Verdict tier, fixed thresholds shared by every modality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuitabilityTier {
    /// score >= 80
    Excellent,
    /// score >= 60
    Good,
    /// score >= 40
    Acceptable,
    Poor,
}

impl SuitabilityTier {
    pub fn from_score(score: u32) -> Self {
        match score {
            s if s >= 80 => SuitabilityTier::Excellent,
            s if s >= 60 => SuitabilityTier::Good,
            s if s >= 40 => SuitabilityTier::Acceptable,
            _ => SuitabilityTier::Poor,
        }
    }
}

/// Scored training suitability of one media file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suitability {
    /// 0-100
    pub score: u32,
    pub tier: SuitabilityTier,
    /// Human-readable verdict for the tier
    pub verdict: String,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
    pub strengths: Vec<String>,
}

/// Named numeric signals fed to the scorer
///
/// Absent and non-finite signals are simply not present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Signals(BTreeMap<String, f64>);

impl Signals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a signal; `None` and non-finite values are dropped
    pub fn with(mut self, name: &str, value: Option<f64>) -> Self {
        if let Some(v) = value.filter(|v| v.is_finite()) {
            self.0.insert(name.to_string(), v);
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_thresholds() {
        assert_eq!(SuitabilityTier::from_score(100), SuitabilityTier::Excellent);
        assert_eq!(SuitabilityTier::from_score(80), SuitabilityTier::Excellent);
        assert_eq!(SuitabilityTier::from_score(79), SuitabilityTier::Good);
        assert_eq!(SuitabilityTier::from_score(60), SuitabilityTier::Good);
        assert_eq!(SuitabilityTier::from_score(40), SuitabilityTier::Acceptable);
        assert_eq!(SuitabilityTier::from_score(39), SuitabilityTier::Poor);
        assert_eq!(SuitabilityTier::from_score(0), SuitabilityTier::Poor);
    }

    #[test]
    fn test_signals_drop_missing_and_non_finite() {
        let signals = Signals::new()
            .with("duration", Some(12.0))
            .with("snr_db", None)
            .with("hnr", Some(f64::NAN))
            .with("clipping_ratio", Some(f64::INFINITY));
        assert_eq!(signals.len(), 1);
        assert_eq!(signals.get("duration"), Some(12.0));
        assert_eq!(signals.get("snr_db"), None);
    }
}
