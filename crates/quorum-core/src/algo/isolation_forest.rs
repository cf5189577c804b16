//! Isolation Forest
//!
//! Anomalies are few and different, so random axis-aligned partitions
//! separate them in fewer steps than normal points. Each tree is grown on a
//! subsample of the reference set; the anomaly score is derived from the
//! average path length needed to isolate a query.
//!
//! Like a random cut forest, every node keeps the bounding box of its training
//! points. A query outside a node's box could have been cut away at that node;
//! the probability of that is folded into the expected path length, so points
//! far outside the observed range isolate at the root instead of sliding down
//! to whichever leaf their coordinates happen to select.
//!
//! Reference: Liu, Ting & Zhou, "Isolation Forest" (ICDM 2008)

use crate::config::IsolationParams;
use crate::detector::{Detector, DetectorKind, check_features};
use crate::error::{DetectionError, EnsembleError, Result};
use crate::signal::{AlgorithmResult, FeatureVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Instant;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Average path length of an unsuccessful BST search over `n` points.
pub(crate) fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

#[derive(Debug, Clone)]
struct BoundingBox {
    min: Vec<f64>,
    max: Vec<f64>,
}

impl BoundingBox {
    fn around(points: &[&[f64]]) -> Option<Self> {
        let first = points.first()?;
        let mut min = first.to_vec();
        let mut max = first.to_vec();
        for point in &points[1..] {
            for (d, v) in point.iter().enumerate() {
                min[d] = min[d].min(*v);
                max[d] = max[d].max(*v);
            }
        }
        Some(Self { min, max })
    }

    /// Probability that a uniformly placed cut over the box extended to the
    /// query separates the query from the box.
    fn separation_probability(&self, query: &[f64]) -> f64 {
        let mut gap = 0.0;
        let mut span = 0.0;
        for (d, v) in query.iter().enumerate() {
            let lo = self.min[d].min(*v);
            let hi = self.max[d].max(*v);
            span += hi - lo;
            gap += (self.min[d] - v).max(0.0) + (v - self.max[d]).max(0.0);
        }
        if span > 0.0 { gap / span } else { 0.0 }
    }
}

#[derive(Debug)]
enum IsolationNode {
    External {
        size: usize,
        bbox: Option<BoundingBox>,
    },
    Internal {
        feature: usize,
        split: f64,
        left: Box<IsolationNode>,
        right: Box<IsolationNode>,
        bbox: BoundingBox,
    },
}

impl IsolationNode {
    fn grow(points: Vec<&[f64]>, depth: usize, height_limit: usize, rng: &mut StdRng) -> Self {
        let Some(bbox) = BoundingBox::around(&points) else {
            return Self::External { size: 0, bbox: None };
        };
        if depth >= height_limit || points.len() <= 1 {
            return Self::External {
                size: points.len(),
                bbox: Some(bbox),
            };
        }

        let splittable: Vec<usize> = (0..bbox.min.len())
            .filter(|&d| bbox.max[d] > bbox.min[d])
            .collect();
        if splittable.is_empty() {
            return Self::External {
                size: points.len(),
                bbox: Some(bbox),
            };
        }

        let feature = splittable[rng.random_range(0..splittable.len())];
        let split = rng.random_range(bbox.min[feature]..bbox.max[feature]);
        let (left, right): (Vec<&[f64]>, Vec<&[f64]>) =
            points.into_iter().partition(|p| p[feature] < split);

        Self::Internal {
            feature,
            split,
            left: Box::new(Self::grow(left, depth + 1, height_limit, rng)),
            right: Box::new(Self::grow(right, depth + 1, height_limit, rng)),
            bbox,
        }
    }

    fn expected_path(&self, query: &[f64], depth: f64) -> f64 {
        match self {
            Self::External { bbox: None, .. } => depth,
            Self::External {
                size,
                bbox: Some(bbox),
            } => {
                let p = bbox.separation_probability(query);
                p * (depth + 1.0) + (1.0 - p) * (depth + average_path_length(*size))
            }
            Self::Internal {
                feature,
                split,
                left,
                right,
                bbox,
            } => {
                let p = bbox.separation_probability(query);
                let child = if query[*feature] < *split { left } else { right };
                let through = if p < 1.0 {
                    child.expected_path(query, depth + 1.0)
                } else {
                    0.0
                };
                p * (depth + 1.0) + (1.0 - p) * through
            }
        }
    }
}

/// Trained isolation forest.
pub struct IsolationForest {
    trees: Vec<IsolationNode>,
    sample_size: usize,
    /// c(ψ), the expected path length of an average point
    normalizer: f64,
    dimensions: usize,
    threshold: f64,
}

impl IsolationForest {
    /// Grow `num_trees` trees, each over a subsample drawn without replacement.
    pub fn train(points: &[FeatureVector], params: &IsolationParams) -> Result<Self> {
        let dimensions = points.first().map_or(0, Vec::len);
        if points.len() < 2 || dimensions == 0 {
            return Err(EnsembleError::config(
                "isolation forest needs at least 2 reference points",
            ));
        }

        let sample_size = params.subsample_size.min(points.len());
        let height_limit = (sample_size as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(params.seed);

        let trees = (0..params.num_trees)
            .map(|_| {
                let sample: Vec<&[f64]> = rand::seq::index::sample(&mut rng, points.len(), sample_size)
                    .into_iter()
                    .map(|i| points[i].as_slice())
                    .collect();
                IsolationNode::grow(sample, 0, height_limit, &mut rng)
            })
            .collect();

        Ok(Self {
            trees,
            sample_size,
            normalizer: average_path_length(sample_size),
            dimensions,
            threshold: params.threshold,
        })
    }

    /// Mean expected isolation depth of `features` across the forest.
    pub fn path_length(&self, features: &[f64]) -> f64 {
        let total: f64 = self
            .trees
            .iter()
            .map(|tree| tree.expected_path(features, 0.0))
            .sum();
        total / self.trees.len().max(1) as f64
    }
}

impl Detector for IsolationForest {
    fn kind(&self) -> DetectorKind {
        DetectorKind::IsolationForest
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn score(&self, features: &[f64]) -> std::result::Result<AlgorithmResult, DetectionError> {
        let start = Instant::now();
        check_features(self.kind(), self.dimensions, features)?;

        let path_length = self.path_length(features);
        let score = 2f64.powf(-path_length / self.normalizer);
        let confidence = (2.0 * (score - 0.5).abs()).min(1.0);

        Ok(
            AlgorithmResult::new(self.kind(), score, confidence, score > self.threshold)
                .with_diagnostic("path_length", path_length)
                .with_diagnostic("normalizer", self.normalizer)
                .with_elapsed(start.elapsed()),
        )
    }

    fn threshold(&self) -> f64 {
        self.threshold
    }

    fn set_threshold(&mut self, threshold: f64) {
        self.threshold = threshold;
    }

    fn get_stats(&self) -> String {
        format!(
            "IsolationForest: trees={}, sample_size={}, c(psi)={:.3}",
            self.trees.len(),
            self.sample_size,
            self.normalizer
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn blob(n: usize, seed: u64) -> Vec<FeatureVector> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| vec![rng.random_range(-1.0..1.0), rng.random_range(-1.0..1.0)])
            .collect()
    }

    #[test]
    fn test_average_path_length() {
        assert_eq!(average_path_length(0), 0.0);
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        assert!((average_path_length(256) - 10.244).abs() < 1e-2);
    }

    #[test]
    fn test_far_point_scores_high() {
        let forest = IsolationForest::train(&blob(500, 1), &IsolationParams::default()).unwrap();
        let far = forest.score(&[60.0, 80.0]).unwrap();
        let center = forest.score(&[0.0, 0.0]).unwrap();

        assert!(far.is_anomaly);
        assert!(far.score > 0.9, "far score {}", far.score);
        assert!(!center.is_anomaly);
        assert!(center.score < far.score);
        assert!(far.diagnostic("path_length").unwrap() < center.diagnostic("path_length").unwrap());
    }

    #[test]
    fn test_same_seed_same_forest() {
        let data = blob(300, 2);
        let a = IsolationForest::train(&data, &IsolationParams::default()).unwrap();
        let b = IsolationForest::train(&data, &IsolationParams::default()).unwrap();
        for query in blob(20, 3) {
            assert_eq!(a.score(&query).unwrap().score, b.score(&query).unwrap().score);
        }
    }

    #[test]
    fn test_subsample_capped_at_reference_size() {
        let forest = IsolationForest::train(&blob(40, 4), &IsolationParams::default()).unwrap();
        assert_eq!(forest.sample_size, 40);
        assert!((forest.normalizer - average_path_length(40)).abs() < 1e-12);
    }

    #[test]
    fn test_constant_reference_does_not_panic() {
        let data = vec![vec![1.0, 1.0]; 50];
        let forest = IsolationForest::train(&data, &IsolationParams::default()).unwrap();
        let same = forest.score(&[1.0, 1.0]).unwrap();
        let other = forest.score(&[3.0, 1.0]).unwrap();
        assert!((same.score - 0.5).abs() < 1e-9);
        assert!(other.score > same.score);
    }

    #[test]
    fn test_rejects_malformed_input() {
        let forest = IsolationForest::train(&blob(50, 5), &IsolationParams::default()).unwrap();
        assert!(matches!(
            forest.score(&[1.0]),
            Err(DetectionError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            forest.score(&[f64::NAN, 0.0]),
            Err(DetectionError::NonFinite { .. })
        ));
    }

    #[test]
    fn test_outputs_stay_in_unit_range() {
        let forest = IsolationForest::train(&blob(200, 6), &IsolationParams::default()).unwrap();
        for query in [[0.0, 0.0], [1e9, -1e9], [0.99, -0.99], [5.0, 0.0]] {
            let result = forest.score(&query).unwrap();
            assert!((0.0..=1.0).contains(&result.score));
            assert!((0.0..=1.0).contains(&result.confidence));
        }
    }
}
