//! Benchmark reporting
//!
//! Confusion-matrix metrics for the ensemble and for each detector over a
//! labeled dataset, plus per-sample latency percentiles.

use crate::config::VotingStrategy;
use crate::detector::DetectorKind;
use crate::performance::PerformanceSample;
use crate::signal::{EnsembleResult, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

fn ratio(num: u64, denom: u64) -> f64 {
    if denom == 0 {
        0.0
    } else {
        num as f64 / denom as f64
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_positives: u64,
    pub false_positives: u64,
    pub true_negatives: u64,
    pub false_negatives: u64,
}

impl ConfusionMatrix {
    pub fn record(&mut self, predicted: bool, actual: bool) {
        match (predicted, actual) {
            (true, true) => self.true_positives += 1,
            (true, false) => self.false_positives += 1,
            (false, false) => self.true_negatives += 1,
            (false, true) => self.false_negatives += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.true_positives + self.false_positives + self.true_negatives + self.false_negatives
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.true_positives + self.true_negatives, self.total())
    }

    pub fn precision(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_positives)
    }

    pub fn recall(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_negatives)
    }

    pub fn f1_score(&self) -> f64 {
        let (p, r) = (self.precision(), self.recall());
        if p + r > 0.0 { 2.0 * p * r / (p + r) } else { 0.0 }
    }

    pub fn false_positive_rate(&self) -> f64 {
        ratio(self.false_positives, self.false_positives + self.true_negatives)
    }
}

/// Ensemble outcome for one labeled sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplePrediction {
    pub index: usize,
    pub label: bool,
    pub predicted: bool,
    pub final_score: f64,
    pub confidence: f64,
    pub consensus: f64,
    pub severity: Severity,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectorMetrics {
    pub confusion: ConfusionMatrix,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub trigger_count: u64,
    pub avg_score: f64,
    /// Samples this detector produced a result for
    pub evaluated: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LatencyMetrics {
    pub p50_micros: f64,
    pub p95_micros: f64,
    pub p99_micros: f64,
    pub avg_micros: f64,
}

impl LatencyMetrics {
    pub fn from_samples(latencies: &[u64]) -> Self {
        if latencies.is_empty() {
            return Self::default();
        }
        let mut sorted = latencies.to_vec();
        sorted.sort_unstable();

        let len = sorted.len();
        Self {
            p50_micros: sorted[len / 2] as f64,
            p95_micros: sorted[len * 95 / 100] as f64,
            p99_micros: sorted[len * 99 / 100] as f64,
            avg_micros: sorted.iter().sum::<u64>() as f64 / len as f64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub generated_at: DateTime<Utc>,
    pub voting: VotingStrategy,
    pub samples_total: usize,
    pub samples_evaluated: usize,
    /// Samples on which every detector failed
    pub failed_samples: usize,
    /// False when the run was cancelled before the end of the dataset
    pub complete: bool,
    pub confusion: ConfusionMatrix,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub false_positive_rate: f64,
    pub predictions: Vec<SamplePrediction>,
    pub detector_metrics: BTreeMap<DetectorKind, DetectorMetrics>,
    pub latency: LatencyMetrics,
}

impl BenchmarkReport {
    /// Per-detector results as rebalance feedback.
    pub fn performance_samples(&self) -> HashMap<DetectorKind, PerformanceSample> {
        self.detector_metrics
            .iter()
            .filter(|(_, m)| m.evaluated > 0)
            .map(|(detector, m)| {
                let c = &m.confusion;
                (
                    *detector,
                    PerformanceSample::new(
                        c.accuracy(),
                        m.precision,
                        m.recall,
                        m.f1_score,
                        c.false_positive_rate(),
                    ),
                )
            })
            .collect()
    }
}

#[derive(Debug, Default)]
struct DetectorTally {
    confusion: ConfusionMatrix,
    triggers: u64,
    total_score: f64,
}

/// Collects per-sample outcomes while a benchmark runs.
#[derive(Debug, Default)]
pub(crate) struct BenchmarkAccumulator {
    confusion: ConfusionMatrix,
    predictions: Vec<SamplePrediction>,
    detectors: BTreeMap<DetectorKind, DetectorTally>,
    latencies: Vec<u64>,
    failed: usize,
}

impl BenchmarkAccumulator {
    pub(crate) fn record(&mut self, index: usize, label: bool, result: &EnsembleResult, latency: Duration) {
        self.confusion.record(result.is_anomaly, label);
        self.latencies
            .push(u64::try_from(latency.as_micros()).unwrap_or(u64::MAX));
        self.predictions.push(SamplePrediction {
            index,
            label,
            predicted: result.is_anomaly,
            final_score: result.final_score,
            confidence: result.confidence,
            consensus: result.consensus,
            severity: result.severity,
        });

        for detector_result in &result.results {
            let tally = self.detectors.entry(detector_result.detector).or_default();
            tally.confusion.record(detector_result.is_anomaly, label);
            if detector_result.is_anomaly {
                tally.triggers += 1;
            }
            tally.total_score += detector_result.score;
        }
    }

    pub(crate) fn record_failure(&mut self) {
        self.failed += 1;
    }

    pub(crate) fn finish(self, voting: VotingStrategy, samples_total: usize, complete: bool) -> BenchmarkReport {
        let detector_metrics = self
            .detectors
            .into_iter()
            .map(|(detector, tally)| {
                let c = tally.confusion;
                let evaluated = c.total();
                let metrics = DetectorMetrics {
                    confusion: c,
                    precision: c.precision(),
                    recall: c.recall(),
                    f1_score: c.f1_score(),
                    trigger_count: tally.triggers,
                    avg_score: if evaluated == 0 {
                        0.0
                    } else {
                        tally.total_score / evaluated as f64
                    },
                    evaluated,
                };
                (detector, metrics)
            })
            .collect();

        let c = self.confusion;
        BenchmarkReport {
            generated_at: Utc::now(),
            voting,
            samples_total,
            samples_evaluated: self.predictions.len(),
            failed_samples: self.failed,
            complete,
            confusion: c,
            accuracy: c.accuracy(),
            precision: c.precision(),
            recall: c.recall(),
            f1_score: c.f1_score(),
            false_positive_rate: c.false_positive_rate(),
            predictions: self.predictions,
            detector_metrics,
            latency: LatencyMetrics::from_samples(&self.latencies),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confusion_metrics() {
        let mut c = ConfusionMatrix::default();
        for (predicted, actual) in [(true, true), (true, true), (true, false), (false, false), (false, true)] {
            c.record(predicted, actual);
        }
        assert_eq!(c.total(), 5);
        assert!((c.accuracy() - 0.6).abs() < 1e-12);
        assert!((c.precision() - 2.0 / 3.0).abs() < 1e-12);
        assert!((c.recall() - 2.0 / 3.0).abs() < 1e-12);
        assert!((c.f1_score() - 2.0 / 3.0).abs() < 1e-12);
        assert!((c.false_positive_rate() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_zero_denominators_are_zero() {
        let c = ConfusionMatrix::default();
        assert_eq!(c.accuracy(), 0.0);
        assert_eq!(c.precision(), 0.0);
        assert_eq!(c.recall(), 0.0);
        assert_eq!(c.f1_score(), 0.0);
        assert_eq!(c.false_positive_rate(), 0.0);
    }

    #[test]
    fn test_latency_percentiles() {
        let latencies: Vec<u64> = (1..=100).collect();
        let metrics = LatencyMetrics::from_samples(&latencies);
        assert_eq!(metrics.p50_micros, 51.0);
        assert_eq!(metrics.p95_micros, 96.0);
        assert_eq!(metrics.p99_micros, 100.0);
        assert!((metrics.avg_micros - 50.5).abs() < 1e-12);
        assert_eq!(LatencyMetrics::from_samples(&[]).p99_micros, 0.0);
    }

    #[test]
    fn test_empty_accumulator_finishes() {
        let report = BenchmarkAccumulator::default().finish(VotingStrategy::Hard, 10, false);
        assert_eq!(report.samples_total, 10);
        assert_eq!(report.samples_evaluated, 0);
        assert!(!report.complete);
        assert!(report.detector_metrics.is_empty());
        assert!(report.performance_samples().is_empty());
    }
}
