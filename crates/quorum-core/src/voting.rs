//! Voting strategies
//!
//! Pure aggregation over per-detector results. Weights are normalized over
//! the detectors that produced a result, so a failed detector never drags the
//! final score toward zero.

use crate::config::VotingStrategy;
use crate::error::DetectionError;
use crate::signal::{AlgorithmResult, EnsembleResult, Severity, WeightTable, clamp_unit};

/// Weights of `results` normalized to sum to 1. Falls back to uniform when
/// the raw weights carry no mass.
pub fn normalized_weights(results: &[AlgorithmResult], weights: &WeightTable) -> Vec<f64> {
    let raw: Vec<f64> = results
        .iter()
        .map(|r| {
            weights
                .get(r.detector)
                .filter(|w| w.is_finite())
                .unwrap_or(0.0)
                .max(0.0)
        })
        .collect();
    let total: f64 = raw.iter().sum();
    if total > 0.0 {
        raw.iter().map(|w| w / total).collect()
    } else {
        vec![1.0 / results.len().max(1) as f64; results.len()]
    }
}

/// `1 - population stddev` of the boolean decisions.
pub fn consensus(results: &[AlgorithmResult]) -> f64 {
    if results.is_empty() {
        return 1.0;
    }
    let flagged = results.iter().filter(|r| r.is_anomaly).count() as f64;
    let mean = flagged / results.len() as f64;
    1.0 - (mean * (1.0 - mean)).sqrt()
}

fn weighted_mean(weights: &[f64], values: impl Iterator<Item = f64>) -> f64 {
    weights.iter().zip(values).map(|(w, v)| w * v).sum()
}

/// Final score and aggregate confidence for one strategy.
pub fn aggregate(strategy: VotingStrategy, results: &[AlgorithmResult], weights: &WeightTable) -> (f64, f64) {
    match results {
        [] => return (0.0, 0.0),
        // a lone survivor's result stands as the ensemble result
        [single] => return (single.score, single.confidence),
        _ => {}
    }
    let base = normalized_weights(results, weights);
    let scores = || results.iter().map(|r| r.score);
    let confidences = || results.iter().map(|r| r.confidence);

    let (score, confidence) = match strategy {
        VotingStrategy::Hard => (
            weighted_mean(&base, results.iter().map(|r| if r.is_anomaly { 1.0 } else { 0.0 })),
            weighted_mean(&base, confidences()),
        ),
        VotingStrategy::Soft => (weighted_mean(&base, scores()), weighted_mean(&base, confidences())),
        VotingStrategy::Weighted => {
            let scaled: Vec<f64> = base
                .iter()
                .zip(confidences())
                .map(|(w, c)| w * (1.0 + c))
                .collect();
            let total: f64 = scaled.iter().sum();
            let adjusted: Vec<f64> = scaled.iter().map(|w| w / total).collect();
            (weighted_mean(&adjusted, scores()), weighted_mean(&adjusted, confidences()))
        }
    };

    let score = match strategy {
        VotingStrategy::Hard => score,
        // convex combination; clamp away rounding drift
        VotingStrategy::Soft | VotingStrategy::Weighted => {
            let lo = scores().fold(f64::INFINITY, f64::min);
            let hi = scores().fold(f64::NEG_INFINITY, f64::max);
            score.clamp(lo, hi)
        }
    };
    (clamp_unit(score), clamp_unit(confidence))
}

fn explain(
    strategy: VotingStrategy,
    results: &[AlgorithmResult],
    failures: &[DetectionError],
) -> Vec<String> {
    let mut lines = vec![
        format!("Voting strategy: {strategy}"),
        format!(
            "{}/{} detectors flagged anomaly",
            results.iter().filter(|r| r.is_anomaly).count(),
            results.len()
        ),
    ];

    // stable sort keeps configuration order among equal scores
    let mut ranked: Vec<&AlgorithmResult> = results.iter().collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    for result in ranked.iter().take(2) {
        lines.push(format!(
            "{}: score {:.3}, confidence {:.3}{}",
            result.detector,
            result.score,
            result.confidence,
            if result.is_anomaly { " (anomaly)" } else { "" }
        ));
    }

    for failure in failures {
        lines.push(format!("Excluded {failure}"));
    }
    lines
}

/// Apply `strategy` and assemble the full ensemble result.
pub fn vote(
    strategy: VotingStrategy,
    threshold: f64,
    results: Vec<AlgorithmResult>,
    weights: &WeightTable,
    failures: &[DetectionError],
) -> EnsembleResult {
    let (final_score, confidence) = aggregate(strategy, &results, weights);
    let is_anomaly = match results.as_slice() {
        [single] => single.is_anomaly,
        _ => final_score > threshold,
    };

    EnsembleResult {
        final_score,
        is_anomaly,
        confidence,
        voting: strategy,
        consensus: consensus(&results),
        explanation: explain(strategy, &results, failures),
        severity: Severity::from_score(final_score),
        weights: weights.restricted_to(results.iter().map(|r| r.detector)),
        excluded: failures.iter().map(DetectionError::detector).collect(),
        results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::DetectorKind;

    fn result(detector: DetectorKind, score: f64, confidence: f64, is_anomaly: bool) -> AlgorithmResult {
        AlgorithmResult::new(detector, score, confidence, is_anomaly)
    }

    fn sample() -> (Vec<AlgorithmResult>, WeightTable) {
        let results = vec![
            result(DetectorKind::IsolationForest, 0.9, 0.8, true),
            result(DetectorKind::OneClassSvm, 0.7, 0.4, true),
            result(DetectorKind::LocalOutlierFactor, 0.2, 0.6, false),
            result(DetectorKind::Dbscan, 0.1, 0.9, false),
        ];
        let weights = [
            (DetectorKind::IsolationForest, 2.0),
            (DetectorKind::OneClassSvm, 1.0),
            (DetectorKind::LocalOutlierFactor, 1.0),
            (DetectorKind::Dbscan, 0.0),
        ]
        .into_iter()
        .collect();
        (results, weights)
    }

    #[test]
    fn test_hard_vote_is_weighted_fraction() {
        let (results, weights) = sample();
        let (score, _) = aggregate(VotingStrategy::Hard, &results, &weights);
        assert!((score - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_soft_vote_is_weighted_mean() {
        let (results, weights) = sample();
        let (score, confidence) = aggregate(VotingStrategy::Soft, &results, &weights);
        assert!((score - (2.0 * 0.9 + 0.7 + 0.2) / 4.0).abs() < 1e-12);
        assert!((confidence - (2.0 * 0.8 + 0.4 + 0.6) / 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_weighted_vote_scales_by_confidence() {
        let (results, weights) = sample();
        let (score, _) = aggregate(VotingStrategy::Weighted, &results, &weights);
        let w = [2.0 * 1.8, 1.0 * 1.4, 1.0 * 1.6];
        let expected = (w[0] * 0.9 + w[1] * 0.7 + w[2] * 0.2) / w.iter().sum::<f64>();
        assert!((score - expected).abs() < 1e-12);
    }

    #[test]
    fn test_final_score_stays_within_detector_range() {
        let (results, weights) = sample();
        for strategy in [VotingStrategy::Soft, VotingStrategy::Weighted] {
            let (score, _) = aggregate(strategy, &results, &weights);
            assert!((0.1..=0.9).contains(&score));
        }
    }

    #[test]
    fn test_zero_weights_fall_back_to_uniform() {
        let (results, _) = sample();
        let zero: WeightTable = DetectorKind::ALL.iter().map(|d| (*d, 0.0)).collect();
        let normalized = normalized_weights(&results, &zero);
        assert_eq!(normalized, vec![0.25; 4]);
    }

    #[test]
    fn test_consensus_drops_with_minority() {
        let make = |flags: &[bool]| -> Vec<AlgorithmResult> {
            flags
                .iter()
                .zip(DetectorKind::ALL)
                .map(|(f, d)| result(d, 0.5, 0.5, *f))
                .collect()
        };
        let all = consensus(&make(&[true, true, true, true]));
        let one = consensus(&make(&[true, true, true, false]));
        let two = consensus(&make(&[true, true, false, false]));
        assert_eq!(all, 1.0);
        assert_eq!(consensus(&make(&[false, false, false, false])), 1.0);
        assert!(all > one && one > two);
        assert!((two - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_single_detector_passes_through() {
        let single = vec![result(DetectorKind::OneClassSvm, 0.42, 0.3, true)];
        let weights: WeightTable = [(DetectorKind::OneClassSvm, 0.77)].into_iter().collect();

        let vote = vote(VotingStrategy::Weighted, 0.5, single, &weights, &[]);
        assert_eq!(vote.final_score, 0.42);
        assert!(vote.is_anomaly);
        assert_eq!(vote.consensus, 1.0);
        assert_eq!(vote.severity, Severity::Medium);
    }

    #[test]
    fn test_explanation_and_exclusions() {
        let (mut results, weights) = sample();
        results.pop();
        let failures = vec![DetectionError::Timeout {
            detector: DetectorKind::Dbscan,
            timeout_ms: 250,
        }];

        let vote = vote(VotingStrategy::Soft, 0.5, results, &weights, &failures);
        assert_eq!(vote.excluded, vec![DetectorKind::Dbscan]);
        assert!(!vote.weights.contains(DetectorKind::Dbscan));
        assert_eq!(vote.weights.len(), 3);
        assert_eq!(vote.explanation[0], "Voting strategy: soft");
        assert_eq!(vote.explanation[1], "2/3 detectors flagged anomaly");
        assert!(vote.explanation[2].starts_with("isolation_forest"));
        assert!(vote.explanation[3].starts_with("one_class_svm"));
        assert_eq!(
            vote.explanation[4],
            "Excluded dbscan: timed out after 250 ms"
        );
    }

    #[test]
    fn test_hard_vote_with_single_survivor_keeps_its_score() {
        let single = vec![result(DetectorKind::IsolationForest, 0.48, 0.2, false)];
        let failures = vec![DetectionError::Timeout {
            detector: DetectorKind::Dbscan,
            timeout_ms: 250,
        }];

        let vote = vote(VotingStrategy::Hard, 0.5, single, &WeightTable::new(), &failures);
        assert_eq!(vote.final_score, 0.48);
        assert_eq!(vote.confidence, 0.2);
        assert!(!vote.is_anomaly);
        assert_eq!(vote.severity, Severity::Medium);
    }

    #[test]
    fn test_ties_follow_configuration_order() {
        let results = vec![
            result(DetectorKind::LocalOutlierFactor, 0.5, 0.0, false),
            result(DetectorKind::IsolationForest, 0.5, 0.0, false),
            result(DetectorKind::Dbscan, 0.5, 0.0, false),
        ];
        let vote = vote(VotingStrategy::Hard, 0.5, results, &WeightTable::new(), &[]);
        assert!(vote.explanation[2].starts_with("local_outlier_factor"));
        assert!(vote.explanation[3].starts_with("isolation_forest"));
    }
}
