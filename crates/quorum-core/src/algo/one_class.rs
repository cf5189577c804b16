//! One-class kernel boundary
//!
//! Support points drawn from the reference set carry equal dual coefficients;
//! the decision function is their mean RBF kernel value minus a bias ρ chosen
//! so that roughly a `nu` fraction of the reference points fall outside the
//! boundary. Negative decision values lie outside.

use crate::config::BoundaryParams;
use crate::detector::{Detector, DetectorKind, check_features};
use crate::error::{DetectionError, EnsembleError, Result};
use crate::signal::{AlgorithmResult, FeatureVector};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::time::Instant;

use super::kdtree::squared_euclidean;

const MIN_BIAS: f64 = 1e-12;

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

pub struct OneClassBoundary {
    support: Vec<FeatureVector>,
    gamma: f64,
    /// Decision bias ρ
    bias: f64,
    steepness: f64,
    dimensions: usize,
    threshold: f64,
}

/// `1 / (dims * mean per-feature variance)`, or 1 for a degenerate set.
fn default_gamma(points: &[FeatureVector]) -> f64 {
    let n = points.len() as f64;
    let dims = points[0].len();
    let mut total_variance = 0.0;
    for d in 0..dims {
        let mean = points.iter().map(|p| p[d]).sum::<f64>() / n;
        total_variance += points.iter().map(|p| (p[d] - mean).powi(2)).sum::<f64>() / n;
    }
    let variance = total_variance / dims as f64;
    if variance > 0.0 {
        1.0 / (dims as f64 * variance)
    } else {
        1.0
    }
}

impl OneClassBoundary {
    pub fn train(points: &[FeatureVector], params: &BoundaryParams) -> Result<Self> {
        if points.len() < 2 || points[0].is_empty() {
            return Err(EnsembleError::config(
                "one-class boundary needs at least 2 reference points",
            ));
        }
        let dimensions = points[0].len();

        let support: Vec<FeatureVector> = if points.len() <= params.max_support {
            points.to_vec()
        } else {
            let mut rng = StdRng::seed_from_u64(params.seed);
            let mut picked = rand::seq::index::sample(&mut rng, points.len(), params.max_support).into_vec();
            picked.sort_unstable();
            picked.into_iter().map(|i| points[i].clone()).collect()
        };
        let gamma = params.gamma.unwrap_or_else(|| default_gamma(points));

        let mut model = Self {
            support,
            gamma,
            bias: 0.0,
            steepness: params.steepness,
            dimensions,
            threshold: params.threshold,
        };
        model.bias = model.fit_bias(params.nu);
        Ok(model)
    }

    /// ν-quantile of leave-one-out decision values over the support set.
    fn fit_bias(&self, nu: f64) -> f64 {
        let m = self.support.len();
        let mut values: Vec<f64> = (0..m)
            .map(|i| {
                let sum: f64 = (0..m)
                    .filter(|&j| j != i)
                    .map(|j| self.kernel(&self.support[i], &self.support[j]))
                    .sum();
                sum / (m - 1) as f64
            })
            .collect();
        values.sort_by(f64::total_cmp);
        let index = ((m - 1) as f64 * nu).floor() as usize;
        values[index.min(m - 1)].max(MIN_BIAS)
    }

    fn kernel(&self, a: &[f64], b: &[f64]) -> f64 {
        (-self.gamma * squared_euclidean(a, b)).exp()
    }

    /// `Σ αᵢ K(x, svᵢ) − ρ`; negative outside the boundary.
    pub fn decision_value(&self, features: &[f64]) -> f64 {
        let alpha = 1.0 / self.support.len() as f64;
        let sum: f64 = self.support.iter().map(|sv| self.kernel(features, sv)).sum();
        alpha * sum - self.bias
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }
}

impl Detector for OneClassBoundary {
    fn kind(&self) -> DetectorKind {
        DetectorKind::OneClassSvm
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn score(&self, features: &[f64]) -> std::result::Result<AlgorithmResult, DetectionError> {
        let start = Instant::now();
        check_features(self.kind(), self.dimensions, features)?;

        let d = self.decision_value(features);
        let score = sigmoid(-self.steepness * d / self.bias);
        let confidence = (d.abs() / self.bias).min(1.0);

        Ok(
            AlgorithmResult::new(self.kind(), score, confidence, d < self.threshold)
                .with_diagnostic("decision_value", d)
                .with_diagnostic("bias", self.bias)
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
            "OneClassBoundary: support={}, gamma={:.4}, rho={:.4}",
            self.support.len(),
            self.gamma,
            self.bias
        )
    }
}
