//! Per-persona statistical summary of one modality

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Statistics of one numeric sub-field across the records that carry it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureStat {
    /// Records that contributed a value
    pub count: usize,
    pub mean: f64,
    /// Population variance
    pub variance: f64,
    pub min: f64,
    pub max: f64,
}

impl FeatureStat {
    pub fn std_dev(&self) -> f64 {
        self.variance.max(0.0).sqrt()
    }
}

/// Dotted feature key → statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureSummary {
    /// Records in the aggregation input
    pub record_count: usize,
    pub features: BTreeMap<String, FeatureStat>,
}

impl FeatureSummary {
    pub fn get(&self, key: &str) -> Option<&FeatureStat> {
        self.features.get(key)
    }

    pub fn mean(&self, key: &str) -> Option<f64> {
        self.get(key).map(|s| s.mean)
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}
