//! Local Outlier Factor
//!
//! Compares the local reachability density of a query with that of its k
//! nearest reference neighbours. k-distances and densities of the reference
//! points are computed once at training, each point excluding itself.

use crate::config::DensityParams;
use crate::detector::{Detector, DetectorKind, check_features};
use crate::error::{DetectionError, EnsembleError, Result};
use crate::reference::ReferenceSet;
use crate::signal::AlgorithmResult;
use std::time::Instant;

use super::kdtree::Neighbor;

const MIN_REACH_SUM: f64 = 1e-10;

/// LOF ratio that maps to a score of 1.
pub const RATIO_CEILING: f64 = 3.0;

pub struct LocalOutlierFactor {
    reference: ReferenceSet,
    k: usize,
    k_distances: Vec<f64>,
    densities: Vec<f64>,
    threshold: f64,
}

impl LocalOutlierFactor {
    pub fn train(reference: &ReferenceSet, params: &DensityParams) -> Result<Self> {
        let n = reference.len();
        if n < 2 {
            return Err(EnsembleError::config("LOF needs at least 2 reference points"));
        }
        let k = params.k.min(n - 1);
        let tree = reference.index();

        let neighborhoods: Vec<Vec<Neighbor>> = (0..n)
            .map(|i| tree.nearest(tree.point(i), k, Some(i)))
            .collect();
        let k_distances: Vec<f64> = neighborhoods
            .iter()
            .map(|hood| hood.last().map_or(0.0, |n| n.distance))
            .collect();
        let densities = neighborhoods
            .iter()
            .map(|hood| local_density(hood, &k_distances, k))
            .collect();

        Ok(Self {
            reference: reference.clone(),
            k,
            k_distances,
            densities,
            threshold: params.threshold.min(RATIO_CEILING),
        })
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// LOF ratio, query k-distance and query LRD.
    pub fn ratio(&self, features: &[f64]) -> (f64, f64, f64) {
        let hood = self.reference.index().nearest(features, self.k, None);
        let density = local_density(&hood, &self.k_distances, self.k);
        let neighbor_density =
            hood.iter().map(|n| self.densities[n.index]).sum::<f64>() / hood.len().max(1) as f64;
        let k_distance = hood.last().map_or(0.0, |n| n.distance);
        (neighbor_density / density, k_distance, density)
    }
}

/// `k / Σ max(dist(p, o), k-distance(o))`
fn local_density(hood: &[Neighbor], k_distances: &[f64], k: usize) -> f64 {
    let reach: f64 = hood
        .iter()
        .map(|n| n.distance.max(k_distances[n.index]))
        .sum();
    k as f64 / reach.max(MIN_REACH_SUM)
}

impl Detector for LocalOutlierFactor {
    fn kind(&self) -> DetectorKind {
        DetectorKind::LocalOutlierFactor
    }

    fn dimensions(&self) -> usize {
        self.reference.dimensions()
    }

    fn score(&self, features: &[f64]) -> std::result::Result<AlgorithmResult, DetectionError> {
        let start = Instant::now();
        check_features(self.kind(), self.dimensions(), features)?;

        let (ratio, k_distance, density) = self.ratio(features);
        let score = (ratio / RATIO_CEILING).min(1.0);
        let confidence = (ratio - 1.0).abs().min(1.0);

        Ok(
            AlgorithmResult::new(self.kind(), score, confidence, ratio > self.threshold)
                .with_diagnostic("lof_ratio", ratio)
                .with_diagnostic("k_distance", k_distance)
                .with_diagnostic("lrd", density)
                .with_elapsed(start.elapsed()),
        )
    }

    fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Ratios past the ceiling all score 1, so the threshold is capped there.
    fn set_threshold(&mut self, threshold: f64) {
        self.threshold = threshold.min(RATIO_CEILING);
    }

    fn get_stats(&self) -> String {
        format!(
            "LocalOutlierFactor: k={}, reference={}",
            self.k,
            self.reference.len()
        )
    }
}
