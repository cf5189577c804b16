//! DBSCAN-style neighbourhood test
//!
//! A query is normal when it would be a core point of the reference set: at
//! least `min_pts` reference points lie within `epsilon` of it.

use crate::config::ClusteringParams;
use crate::detector::{Detector, DetectorKind, check_features};
use crate::error::{DetectionError, EnsembleError, Result};
use crate::reference::ReferenceSet;
use crate::signal::AlgorithmResult;
use std::time::Instant;

const MIN_EPSILON: f64 = 1e-9;
const EPSILON_PERCENTILE: f64 = 0.9;

pub struct DensityNeighborhood {
    reference: ReferenceSet,
    epsilon: f64,
    min_pts: usize,
}

/// 90th percentile of the reference points' `min_pts`-distances.
fn estimate_epsilon(reference: &ReferenceSet, min_pts: usize) -> f64 {
    let tree = reference.index();
    let k = min_pts.min(reference.len() - 1);
    let mut distances: Vec<f64> = (0..reference.len())
        .map(|i| {
            tree.nearest(tree.point(i), k, Some(i))
                .last()
                .map_or(0.0, |n| n.distance)
        })
        .collect();
    distances.sort_by(f64::total_cmp);
    let index = ((distances.len() - 1) as f64 * EPSILON_PERCENTILE).floor() as usize;
    distances[index].max(MIN_EPSILON)
}

impl DensityNeighborhood {
    pub fn train(reference: &ReferenceSet, params: &ClusteringParams) -> Result<Self> {
        if params.min_pts > reference.len() {
            return Err(EnsembleError::config(format!(
                "clustering.min_pts ({}) exceeds reference size ({})",
                params.min_pts,
                reference.len()
            )));
        }
        let epsilon = match params.epsilon {
            Some(epsilon) => epsilon,
            None => estimate_epsilon(reference, params.min_pts),
        };
        Ok(Self {
            reference: reference.clone(),
            epsilon,
            min_pts: params.min_pts.max(1),
        })
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn min_pts(&self) -> usize {
        self.min_pts
    }
}

impl Detector for DensityNeighborhood {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Dbscan
    }

    fn dimensions(&self) -> usize {
        self.reference.dimensions()
    }

    fn score(&self, features: &[f64]) -> std::result::Result<AlgorithmResult, DetectionError> {
        let start = Instant::now();
        check_features(self.kind(), self.dimensions(), features)?;

        let count = self.reference.index().count_within(features, self.epsilon);
        let min_pts = self.min_pts as f64;
        let score = 1.0 - (count as f64 / min_pts).min(1.0);
        let confidence = ((count as f64 - min_pts).abs() / min_pts).min(1.0);

        Ok(
            AlgorithmResult::new(self.kind(), score, confidence, count < self.min_pts)
                .with_diagnostic("neighbor_count", count as f64)
                .with_diagnostic("epsilon", self.epsilon)
                .with_elapsed(start.elapsed()),
        )
    }

    /// The threshold is `min_pts`.
    fn threshold(&self) -> f64 {
        self.min_pts as f64
    }

    fn set_threshold(&mut self, threshold: f64) {
        self.min_pts = threshold.round().max(1.0) as usize;
    }

    fn get_stats(&self) -> String {
        format!(
            "DensityNeighborhood: epsilon={:.4}, min_pts={}",
            self.epsilon, self.min_pts
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: usize) -> ReferenceSet {
        ReferenceSet::new((0..n).map(|i| vec![i as f64]).collect()).unwrap()
    }

    #[test]
    fn test_epsilon_estimate() {
        // every point's 5th nearest neighbour on a unit-spaced line is at
        // distance 3 (interior) up to 5 (ends)
        let detector = DensityNeighborhood::train(&line(100), &ClusteringParams::default()).unwrap();
        assert_eq!(detector.epsilon(), 3.0);
    }

    #[test]
    fn test_counts_neighbors_within_epsilon() {
        let params = ClusteringParams {
            epsilon: Some(1.5),
            min_pts: 3,
        };
        let detector = DensityNeighborhood::train(&line(20), &params).unwrap();

        let inside = detector.score(&[10.0]).unwrap();
        assert_eq!(inside.diagnostic("neighbor_count"), Some(3.0));
        assert_eq!(inside.score, 0.0);
        assert!(!inside.is_anomaly);

        let edge = detector.score(&[20.0]).unwrap();
        assert_eq!(edge.diagnostic("neighbor_count"), Some(1.0));
        assert!((edge.score - 2.0 / 3.0).abs() < 1e-12);
        assert!(edge.is_anomaly);

        let far = detector.score(&[100.0]).unwrap();
        assert_eq!(far.score, 1.0);
        assert_eq!(far.confidence, 1.0);
    }

    #[test]
    fn test_min_pts_larger_than_reference_is_rejected() {
        let params = ClusteringParams {
            epsilon: None,
            min_pts: 50,
        };
        let err = DensityNeighborhood::train(&line(10), &params).err().unwrap();
        assert!(matches!(err, EnsembleError::Configuration(_)));
    }

    #[test]
    fn test_set_threshold_rounds_min_pts() {
        let mut detector = DensityNeighborhood::train(&line(30), &ClusteringParams::default()).unwrap();
        detector.set_threshold(7.6);
        assert_eq!(detector.min_pts(), 8);
        detector.set_threshold(-2.0);
        assert_eq!(detector.threshold(), 1.0);
    }
}
