#![allow(dead_code)]

use quorum_core::{EnsembleConfig, FeatureVector, Orchestrator};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;
use std::time::Duration;

pub const REFERENCE_SIZE: usize = 500;

/// Uniform points in a disk of the given radius around the origin.
pub fn disk(n: usize, radius: f64, seed: u64) -> Vec<FeatureVector> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            let r = radius * rng.random::<f64>().sqrt();
            let theta = 2.0 * PI * rng.random::<f64>();
            vec![r * theta.cos(), r * theta.sin()]
        })
        .collect()
}

pub fn reference() -> Vec<FeatureVector> {
    disk(REFERENCE_SIZE, 1.0, 7)
}

/// Default config with a deadline generous enough for debug builds.
pub fn config() -> EnsembleConfig {
    EnsembleConfig::default().with_timeout(Duration::from_secs(10))
}

pub fn engine(config: EnsembleConfig) -> Orchestrator {
    Orchestrator::configure(config, reference()).expect("fixture config is valid")
}

/// Normals inside the dense core plus points far outside the corpus.
pub fn separable_dataset() -> Vec<(FeatureVector, bool)> {
    let mut dataset: Vec<(FeatureVector, bool)> =
        disk(20, 0.5, 99).into_iter().map(|p| (p, false)).collect();
    for i in 0..20 {
        let angle = i as f64 * PI / 10.0;
        dataset.push((vec![80.0 * angle.cos(), 80.0 * angle.sin()], true));
    }
    dataset
}

/// Probe points from the centre out to far beyond the corpus.
pub fn probes() -> Vec<FeatureVector> {
    let mut probes = disk(40, 1.2, 3);
    for step in 0..40 {
        let distance = 0.05 * (step * step) as f64;
        probes.push(vec![distance, -0.5 * distance]);
    }
    probes.push(vec![1e6, -1e6]);
    probes
}
