//! Performance tracking and weight derivation
//!
//! Each enabled detector owns a bounded history of observed performance
//! samples. Its profile is the mean of that history, or the detector's
//! built-in prior while the history is empty, and its ensemble weight blends
//! the profile with the detector family's diversity:
//!
//! `weight = performance_weight * (accuracy + f1) / 2 + diversity_weight * diversity`

use crate::config::EnsembleConfig;
use crate::detector::DetectorKind;
use crate::signal::{WeightTable, clamp_unit};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// Samples kept per detector; the oldest is evicted first.
pub const HISTORY_CAPACITY: usize = 100;

/// One observation of how a detector performed, as fed to rebalancing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSample {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub false_positive_rate: f64,
}

impl PerformanceSample {
    pub fn new(accuracy: f64, precision: f64, recall: f64, f1: f64, false_positive_rate: f64) -> Self {
        Self {
            accuracy: clamp_unit(accuracy),
            precision: clamp_unit(precision),
            recall: clamp_unit(recall),
            f1: clamp_unit(f1),
            false_positive_rate: clamp_unit(false_positive_rate),
        }
    }

    /// Derive a sample from confusion counts. Empty denominators fall back to
    /// a 0.5 prior.
    pub fn from_confusion(tp: u64, fp: u64, tn: u64, fn_: u64) -> Self {
        let ratio = |num: u64, denom: u64| {
            if denom == 0 {
                0.5
            } else {
                num as f64 / denom as f64
            }
        };
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1 = if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        };
        Self::new(
            ratio(tp + tn, tp + fp + tn + fn_),
            precision,
            recall,
            f1,
            ratio(fp, fp + tn),
        )
    }
}

/// Performance and weight of one detector as currently used by the ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceProfile {
    pub detector: DetectorKind,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub false_positive_rate: f64,
    /// Static property of the detector family
    pub diversity: f64,
    pub weight: f64,
    /// Number of observed samples behind the figures (0 = prior)
    pub samples: usize,
}

impl PerformanceProfile {
    /// Built-in prior for a detector kind, weighted with the default blend.
    pub fn prior(detector: DetectorKind) -> Self {
        let (sample, diversity) = prior_sample(detector);
        let defaults = EnsembleConfig::default();
        Self::from_sample(detector, sample, diversity, 0).with_blended_weight(
            defaults.performance_weight,
            defaults.diversity_weight,
        )
    }

    fn from_sample(detector: DetectorKind, sample: PerformanceSample, diversity: f64, samples: usize) -> Self {
        Self {
            detector,
            accuracy: sample.accuracy,
            precision: sample.precision,
            recall: sample.recall,
            f1: sample.f1,
            false_positive_rate: sample.false_positive_rate,
            diversity,
            weight: 0.0,
            samples,
        }
    }

    fn with_blended_weight(mut self, performance_weight: f64, diversity_weight: f64) -> Self {
        self.weight = performance_weight * (self.accuracy + self.f1) / 2.0
            + diversity_weight * self.diversity;
        self
    }
}

fn prior_sample(detector: DetectorKind) -> (PerformanceSample, f64) {
    match detector {
        DetectorKind::IsolationForest => (PerformanceSample::new(0.92, 0.89, 0.87, 0.88, 0.08), 0.85),
        DetectorKind::OneClassSvm => (PerformanceSample::new(0.88, 0.85, 0.83, 0.84, 0.10), 0.75),
        DetectorKind::LocalOutlierFactor => (PerformanceSample::new(0.90, 0.87, 0.85, 0.86, 0.09), 0.80),
        DetectorKind::Dbscan => (PerformanceSample::new(0.86, 0.82, 0.80, 0.81, 0.12), 0.70),
    }
}

#[derive(Debug, Clone, Default)]
struct History {
    samples: VecDeque<PerformanceSample>,
}

impl History {
    fn push(&mut self, sample: PerformanceSample) {
        self.samples.push_back(sample);
        if self.samples.len() > HISTORY_CAPACITY {
            self.samples.pop_front();
        }
    }

    fn mean(&self) -> Option<PerformanceSample> {
        if self.samples.is_empty() {
            return None;
        }
        let n = self.samples.len() as f64;
        let sum = |f: fn(&PerformanceSample) -> f64| self.samples.iter().map(f).sum::<f64>() / n;
        Some(PerformanceSample::new(
            sum(|s| s.accuracy),
            sum(|s| s.precision),
            sum(|s| s.recall),
            sum(|s| s.f1),
            sum(|s| s.false_positive_rate),
        ))
    }
}

/// Rolling performance histories of the enabled detectors.
#[derive(Debug, Clone, Default)]
pub struct PerformanceLedger {
    histories: BTreeMap<DetectorKind, History>,
}

impl PerformanceLedger {
    pub fn new(detectors: &[DetectorKind]) -> Self {
        Self {
            histories: detectors.iter().map(|d| (*d, History::default())).collect(),
        }
    }

    /// Ledger for a new detector set, carrying over the histories of detectors
    /// that stay enabled.
    pub fn carried_over(&self, detectors: &[DetectorKind]) -> Self {
        Self {
            histories: detectors
                .iter()
                .map(|d| (*d, self.histories.get(d).cloned().unwrap_or_default()))
                .collect(),
        }
    }

    #[cfg(test)]
    fn tracks(&self, detector: DetectorKind) -> bool {
        self.histories.contains_key(&detector)
    }

    /// Append a sample. Returns false when the detector is not tracked.
    pub fn record(&mut self, detector: DetectorKind, sample: PerformanceSample) -> bool {
        match self.histories.get_mut(&detector) {
            Some(history) => {
                history.push(sample);
                true
            }
            None => false,
        }
    }

    #[cfg(test)]
    fn history_len(&self, detector: DetectorKind) -> usize {
        self.histories.get(&detector).map_or(0, |h| h.samples.len())
    }

    pub fn profile(&self, detector: DetectorKind, config: &EnsembleConfig) -> PerformanceProfile {
        let (prior, diversity) = prior_sample(detector);
        let history = self.histories.get(&detector);
        let sample = history.and_then(History::mean).unwrap_or(prior);
        let count = history.map_or(0, |h| h.samples.len());

        let mut profile = PerformanceProfile::from_sample(detector, sample, diversity, count)
            .with_blended_weight(config.performance_weight, config.diversity_weight);
        if let Some(weight) = config.weight_overrides.get(&detector) {
            profile.weight = *weight;
        }
        profile
    }

    /// Profiles of the configured detectors, in configuration order.
    pub fn profiles(&self, config: &EnsembleConfig) -> Vec<PerformanceProfile> {
        config
            .detectors
            .iter()
            .map(|d| self.profile(*d, config))
            .collect()
    }

    pub fn weights(&self, config: &EnsembleConfig) -> WeightTable {
        self.profiles(config)
            .into_iter()
            .map(|p| (p.detector, p.weight))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_confusion() {
        let sample = PerformanceSample::from_confusion(8, 2, 85, 5);
        assert!((sample.accuracy - 0.93).abs() < 1e-12);
        assert!((sample.precision - 0.8).abs() < 1e-12);
        assert!((sample.recall - 8.0 / 13.0).abs() < 1e-12);
        assert!((sample.false_positive_rate - 2.0 / 87.0).abs() < 1e-12);

        let empty = PerformanceSample::from_confusion(0, 0, 0, 0);
        assert_eq!(empty.precision, 0.5);
        assert_eq!(empty.recall, 0.5);
        assert_eq!(empty.f1, 0.5);
    }

    #[test]
    fn test_prior_weights_follow_blend() {
        let config = EnsembleConfig::default();
        let ledger = PerformanceLedger::new(&config.detectors);
        let weights = ledger.weights(&config);

        // 0.7 * (0.92 + 0.88) / 2 + 0.3 * 0.85
        let iso = weights.get(DetectorKind::IsolationForest).unwrap();
        assert!((iso - 0.885).abs() < 1e-12);
        assert_eq!(PerformanceProfile::prior(DetectorKind::IsolationForest).weight, iso);

        let dbscan = weights.get(DetectorKind::Dbscan).unwrap();
        assert!(iso > dbscan);
    }

    #[test]
    fn test_profile_is_mean_of_history() {
        let config = EnsembleConfig::default();
        let mut ledger = PerformanceLedger::new(&config.detectors);
        ledger.record(DetectorKind::Dbscan, PerformanceSample::new(1.0, 1.0, 1.0, 1.0, 0.0));
        ledger.record(DetectorKind::Dbscan, PerformanceSample::new(0.5, 0.5, 0.5, 0.5, 0.2));

        let profile = ledger.profile(DetectorKind::Dbscan, &config);
        assert_eq!(profile.samples, 2);
        assert!((profile.accuracy - 0.75).abs() < 1e-12);
        assert!((profile.false_positive_rate - 0.1).abs() < 1e-12);
        assert!((profile.weight - (0.7 * 0.75 + 0.3 * 0.70)).abs() < 1e-12);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut ledger = PerformanceLedger::new(&[DetectorKind::OneClassSvm]);
        for _ in 0..HISTORY_CAPACITY {
            ledger.record(DetectorKind::OneClassSvm, PerformanceSample::new(0.0, 0.0, 0.0, 0.0, 1.0));
        }
        for _ in 0..HISTORY_CAPACITY {
            ledger.record(DetectorKind::OneClassSvm, PerformanceSample::new(1.0, 1.0, 1.0, 1.0, 0.0));
        }
        assert_eq!(ledger.history_len(DetectorKind::OneClassSvm), HISTORY_CAPACITY);

        let profile = ledger.profile(DetectorKind::OneClassSvm, &EnsembleConfig::default());
        assert_eq!(profile.accuracy, 1.0);
    }

    #[test]
    fn test_untracked_detector_is_rejected() {
        let mut ledger = PerformanceLedger::new(&[DetectorKind::IsolationForest]);
        assert!(!ledger.record(DetectorKind::Dbscan, PerformanceSample::from_confusion(1, 0, 1, 0)));
        assert!(!ledger.tracks(DetectorKind::Dbscan));
    }

    #[test]
    fn test_override_pins_weight() {
        let config = EnsembleConfig::default().with_weight_override(DetectorKind::LocalOutlierFactor, 3.0);
        let mut ledger = PerformanceLedger::new(&config.detectors);
        ledger.record(
            DetectorKind::LocalOutlierFactor,
            PerformanceSample::new(0.1, 0.1, 0.1, 0.1, 0.9),
        );
        assert_eq!(ledger.weights(&config).get(DetectorKind::LocalOutlierFactor), Some(3.0));
    }

    #[test]
    fn test_carried_over_keeps_retained_histories() {
        let mut ledger = PerformanceLedger::new(&[DetectorKind::IsolationForest, DetectorKind::Dbscan]);
        ledger.record(DetectorKind::Dbscan, PerformanceSample::from_confusion(3, 1, 5, 1));

        let next = ledger.carried_over(&[DetectorKind::Dbscan, DetectorKind::OneClassSvm]);
        assert_eq!(next.history_len(DetectorKind::Dbscan), 1);
        assert!(next.tracks(DetectorKind::OneClassSvm));
        assert!(!next.tracks(DetectorKind::IsolationForest));
    }
}
