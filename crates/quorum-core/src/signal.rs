//! Detection outputs
//!
//! Per-detector `AlgorithmResult`s and the aggregated `EnsembleResult` handed to
//! whatever downstream system persists or alerts on anomalies. Both are
//! immutable once built and serialize with serde.

use crate::config::VotingStrategy;
use crate::detector::DetectorKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// One observation; dimensionality is fixed by the reference set.
pub type FeatureVector = Vec<f64>;

/// Clamp into [0, 1]; NaN maps to 0.
#[inline]
pub(crate) fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Output of a single detector for a single feature vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlgorithmResult {
    pub detector: DetectorKind,
    /// Anomaly score, higher = more anomalous (0.0 - 1.0)
    pub score: f64,
    /// Detector's self-assessed confidence (0.0 - 1.0)
    pub confidence: f64,
    pub is_anomaly: bool,
    /// Wall time spent scoring
    pub elapsed: Duration,
    /// Algorithm-specific values (path length, LOF ratio, ...)
    pub diagnostics: BTreeMap<String, f64>,
}

impl AlgorithmResult {
    pub fn new(detector: DetectorKind, score: f64, confidence: f64, is_anomaly: bool) -> Self {
        Self {
            detector,
            score: clamp_unit(score),
            confidence: clamp_unit(confidence),
            is_anomaly,
            elapsed: Duration::ZERO,
            diagnostics: BTreeMap::new(),
        }
    }

    pub fn with_diagnostic(mut self, name: &str, value: f64) -> Self {
        self.diagnostics.insert(name.to_string(), value);
        self
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    pub fn diagnostic(&self, name: &str) -> Option<f64> {
        self.diagnostics.get(name).copied()
    }
}

/// Severity levels for anomalies
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.9 {
            Self::Critical
        } else if score >= 0.6 {
            Self::High
        } else if score >= 0.3 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-detector ensemble weights.
///
/// Weights are raw blends of performance and diversity and need not sum to 1;
/// voting normalizes them over whichever detectors took part.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WeightTable(BTreeMap<DetectorKind, f64>);

impl WeightTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, detector: DetectorKind, weight: f64) {
        self.0.insert(detector, weight);
    }

    pub fn get(&self, detector: DetectorKind) -> Option<f64> {
        self.0.get(&detector).copied()
    }

    pub fn contains(&self, detector: DetectorKind) -> bool {
        self.0.contains_key(&detector)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }

    pub fn detectors(&self) -> impl Iterator<Item = DetectorKind> + '_ {
        self.0.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DetectorKind, f64)> + '_ {
        self.0.iter().map(|(k, w)| (*k, *w))
    }

    /// Table restricted to the given detectors.
    pub fn restricted_to(&self, detectors: impl IntoIterator<Item = DetectorKind>) -> Self {
        Self(
            detectors
                .into_iter()
                .filter_map(|d| self.get(d).map(|w| (d, w)))
                .collect(),
        )
    }
}

impl FromIterator<(DetectorKind, f64)> for WeightTable {
    fn from_iter<I: IntoIterator<Item = (DetectorKind, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Aggregated decision for one feature vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleResult {
    pub final_score: f64,
    pub is_anomaly: bool,
    pub confidence: f64,
    pub voting: VotingStrategy,
    /// Results of the detectors that took part, in configuration order
    pub results: Vec<AlgorithmResult>,
    /// Enabled detectors that failed and were left out of the vote
    pub excluded: Vec<DetectorKind>,
    pub consensus: f64,
    pub explanation: Vec<String>,
    pub severity: Severity,
    /// Weights of the participating detectors
    pub weights: WeightTable,
}

impl EnsembleResult {
    pub fn flagged_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_anomaly).count()
    }

    pub fn result_for(&self, detector: DetectorKind) -> Option<&AlgorithmResult> {
        self.results.iter().find(|r| r.detector == detector)
    }

    /// Generate a compact reason string
    pub fn reason(&self) -> String {
        if !self.is_anomaly {
            return String::from("Normal behavior");
        }
        format!(
            "{} anomaly (score: {:.2}, confidence: {:.0}%, consensus: {:.2}) - {}/{} detectors flagged",
            self.severity,
            self.final_score,
            self.confidence * 100.0,
            self.consensus,
            self.flagged_count(),
            self.results.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_from_score() {
        assert_eq!(Severity::from_score(0.0), Severity::Low);
        assert_eq!(Severity::from_score(0.29), Severity::Low);
        assert_eq!(Severity::from_score(0.3), Severity::Medium);
        assert_eq!(Severity::from_score(0.59), Severity::Medium);
        assert_eq!(Severity::from_score(0.6), Severity::High);
        assert_eq!(Severity::from_score(0.89), Severity::High);
        assert_eq!(Severity::from_score(0.9), Severity::Critical);
        assert_eq!(Severity::from_score(1.0), Severity::Critical);
    }

    #[test]
    fn test_severity_is_monotone() {
        let mut previous = Severity::Low;
        for step in 0..=1000 {
            let severity = Severity::from_score(step as f64 / 1000.0);
            assert!(severity >= previous);
            previous = severity;
        }
    }

    #[test]
    fn test_algorithm_result_clamps() {
        let result = AlgorithmResult::new(DetectorKind::OneClassSvm, 1.7, -0.2, true);
        assert_eq!(result.score, 1.0);
        assert_eq!(result.confidence, 0.0);

        let result = AlgorithmResult::new(DetectorKind::OneClassSvm, f64::NAN, 0.5, false);
        assert_eq!(result.score, 0.0);
    }

    #[test]
    fn test_weight_table_restriction() {
        let table: WeightTable = [
            (DetectorKind::IsolationForest, 0.9),
            (DetectorKind::Dbscan, 0.7),
            (DetectorKind::OneClassSvm, 0.8),
        ]
        .into_iter()
        .collect();

        let restricted = table.restricted_to([DetectorKind::Dbscan, DetectorKind::LocalOutlierFactor]);
        assert_eq!(restricted.len(), 1);
        assert_eq!(restricted.get(DetectorKind::Dbscan), Some(0.7));
        assert!(!restricted.contains(DetectorKind::LocalOutlierFactor));
    }

    #[test]
    fn test_weight_table_serializes_as_named_map() {
        let table: WeightTable = [(DetectorKind::LocalOutlierFactor, 0.5)].into_iter().collect();
        let json = serde_json::to_string(&table).unwrap();
        assert_eq!(json, r#"{"local_outlier_factor":0.5}"#);
    }
}
