//! Benchmark Suite for Quorum
//!
//! Seeded synthetic datasets (Gaussian clusters plus far outliers) run through
//! the ensemble orchestrator:
//! - Accuracy, Precision, Recall, F1-Score overall and per detector
//! - Latency percentiles (p50, p95, p99)
//! - Side-by-side comparison of voting strategies

use quorum_core::{
    BenchmarkReport, EnsembleConfig, EnsembleError, FeatureVector, Orchestrator, Result,
    VotingStrategy,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Shape of a synthetic labeled dataset.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct DatasetSpec {
    pub name: String,
    pub dimensions: usize,
    /// Number of Gaussian clusters normal data is drawn from
    pub clusters: usize,
    /// Distance between the origin and each cluster centre
    pub cluster_spread: f64,
    pub cluster_std: f64,
    pub reference_size: usize,
    pub normal_samples: usize,
    pub anomaly_samples: usize,
    /// Distance of injected outliers from the origin
    pub outlier_distance: f64,
    pub seed: u64,
}

impl Default for DatasetSpec {
    fn default() -> Self {
        Self {
            name: "Default Dataset".to_string(),
            dimensions: 2,
            clusters: 1,
            cluster_spread: 0.0,
            cluster_std: 1.0,
            reference_size: 500,
            normal_samples: 200,
            anomaly_samples: 20,
            outlier_distance: 25.0,
            seed: 42,
        }
    }
}

/// Reference corpus plus a labeled evaluation set (`true` = anomaly).
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Dataset {
    pub reference: Vec<FeatureVector>,
    pub labeled: Vec<(FeatureVector, bool)>,
}

impl Dataset {
    pub fn anomaly_count(&self) -> usize {
        self.labeled.iter().filter(|(_, label)| *label).count()
    }
}

fn unit_direction(rng: &mut StdRng, dimensions: usize, normal: &Normal<f64>) -> Vec<f64> {
    loop {
        let v: Vec<f64> = (0..dimensions).map(|_| normal.sample(rng)).collect();
        let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm > 1e-9 {
            return v.into_iter().map(|x| x / norm).collect();
        }
    }
}

/// Generate a dataset from `spec`; the same spec always yields the same data.
pub fn generate(spec: &DatasetSpec) -> Result<Dataset> {
    if spec.dimensions == 0 || spec.clusters == 0 {
        return Err(EnsembleError::Configuration(
            "dataset needs at least one dimension and one cluster".to_string(),
        ));
    }
    let noise = Normal::new(0.0, spec.cluster_std)
        .map_err(|e| EnsembleError::Configuration(format!("invalid cluster_std: {e}")))?;
    let standard = Normal::new(0.0, 1.0)
        .map_err(|e| EnsembleError::Configuration(format!("invalid distribution: {e}")))?;
    let mut rng = StdRng::seed_from_u64(spec.seed);

    let centers: Vec<Vec<f64>> = (0..spec.clusters)
        .map(|_| {
            unit_direction(&mut rng, spec.dimensions, &standard)
                .into_iter()
                .map(|x| x * spec.cluster_spread)
                .collect()
        })
        .collect();

    let normal_point = |rng: &mut StdRng| -> FeatureVector {
        let center = &centers[rng.random_range(0..centers.len())];
        center.iter().map(|c| c + noise.sample(rng)).collect()
    };

    let reference = (0..spec.reference_size).map(|_| normal_point(&mut rng)).collect();
    let mut labeled: Vec<(FeatureVector, bool)> = (0..spec.normal_samples)
        .map(|_| (normal_point(&mut rng), false))
        .collect();
    for _ in 0..spec.anomaly_samples {
        let distance = spec.outlier_distance * rng.random_range(1.0..1.5);
        let point = unit_direction(&mut rng, spec.dimensions, &standard)
            .into_iter()
            .map(|x| x * distance)
            .collect();
        labeled.push((point, true));
    }

    Ok(Dataset { reference, labeled })
}

/// Result of one benchmark scenario
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ScenarioResult {
    pub scenario: String,
    pub detectors: Vec<String>,
    pub report: BenchmarkReport,
}

/// Train an orchestrator on the scenario's reference set and benchmark it.
pub async fn run_scenario(spec: &DatasetSpec, config: EnsembleConfig) -> Result<ScenarioResult> {
    let dataset = generate(spec)?;
    info!(
        scenario = %spec.name,
        reference = dataset.reference.len(),
        samples = dataset.labeled.len(),
        anomalies = dataset.anomaly_count(),
        "Running scenario"
    );

    let detectors = config.detectors.iter().map(|d| d.to_string()).collect();
    let engine = Orchestrator::configure(config, dataset.reference)?;
    let report = engine.benchmark(&dataset.labeled).await?;

    Ok(ScenarioResult {
        scenario: spec.name.clone(),
        detectors,
        report,
    })
}

/// Benchmark the same dataset under every voting strategy.
pub async fn compare_strategies(spec: &DatasetSpec, config: &EnsembleConfig) -> Result<Vec<ScenarioResult>> {
    let mut results = Vec::with_capacity(VotingStrategy::ALL.len());
    for voting in VotingStrategy::ALL {
        let mut result = run_scenario(spec, config.clone().with_voting(voting)).await?;
        result.scenario = format!("{} [{voting}]", spec.name);
        results.push(result);
    }
    Ok(results)
}

pub fn print_report(result: &ScenarioResult) {
    let report = &result.report;
    let c = &report.confusion;
    println!("\n╔══════════════════════════════════════════════════════════════╗");
    println!("║                    BENCHMARK RESULTS                         ║");
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!("║ Scenario: {:50} ║", result.scenario);
    println!("║ Voting:   {:50} ║", report.voting.to_string());
    println!("╠──────────────────────────────────────────────────────────────╣");
    println!(
        "║ Samples:            {:>10} / {:<10}                   ║",
        report.samples_evaluated, report.samples_total
    );
    println!("║ Failed Samples:     {:>10}                               ║", report.failed_samples);
    println!("╠──────────────────────────────────────────────────────────────╣");
    println!("║ True Positives:     {:>10}                               ║", c.true_positives);
    println!("║ False Positives:    {:>10}                               ║", c.false_positives);
    println!("║ True Negatives:     {:>10}                               ║", c.true_negatives);
    println!("║ False Negatives:    {:>10}                               ║", c.false_negatives);
    println!("║                                                              ║");
    println!("║ Accuracy:           {:>10.2}%                              ║", report.accuracy * 100.0);
    println!("║ Precision:          {:>10.2}%                              ║", report.precision * 100.0);
    println!("║ Recall:             {:>10.2}%                              ║", report.recall * 100.0);
    println!("║ F1-Score:           {:>10.3}                               ║", report.f1_score);
    println!("║ FP Rate:            {:>10.2}%                              ║", report.false_positive_rate * 100.0);
    println!("╠──────────────────────────────────────────────────────────────╣");
    println!("║ LATENCY (microseconds)                                       ║");
    println!("╠──────────────────────────────────────────────────────────────╣");
    println!("║ Average:            {:>10.2} µs                            ║", report.latency.avg_micros);
    println!("║ P50:                {:>10.2} µs                            ║", report.latency.p50_micros);
    println!("║ P95:                {:>10.2} µs                            ║", report.latency.p95_micros);
    println!("║ P99:                {:>10.2} µs                            ║", report.latency.p99_micros);
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!("║ PER-DETECTOR BREAKDOWN                                       ║");
    println!("╠──────────────────────────────────────────────────────────────╣");
    for (detector, metrics) in &report.detector_metrics {
        println!(
            "║ {:22} | P: {:5.1}% | R: {:5.1}% | F1: {:5.3}   ║",
            detector.to_string(),
            metrics.precision * 100.0,
            metrics.recall * 100.0,
            metrics.f1_score
        );
    }
    if !report.complete {
        println!("║ (run cancelled before the end of the dataset)                ║");
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
}

/// Predefined benchmark scenarios
pub mod scenarios {
    use super::*;

    pub const NAMES: [&str; 4] = ["single-cluster", "multi-cluster", "high-dimensional", "quick"];

    /// One tight cluster, outliers far outside it
    pub fn single_cluster() -> DatasetSpec {
        DatasetSpec {
            name: "Single Cluster".to_string(),
            ..Default::default()
        }
    }

    /// Three separated clusters; outliers must not be confused with gaps
    pub fn multi_cluster() -> DatasetSpec {
        DatasetSpec {
            name: "Multi Cluster".to_string(),
            clusters: 3,
            cluster_spread: 8.0,
            cluster_std: 0.8,
            reference_size: 900,
            normal_samples: 300,
            anomaly_samples: 30,
            outlier_distance: 30.0,
            seed: 7,
            ..Default::default()
        }
    }

    /// Eight features, single cluster
    pub fn high_dimensional() -> DatasetSpec {
        DatasetSpec {
            name: "High Dimensional".to_string(),
            dimensions: 8,
            reference_size: 800,
            outlier_distance: 20.0,
            seed: 11,
            ..Default::default()
        }
    }

    /// Small run for smoke checks
    pub fn quick() -> DatasetSpec {
        DatasetSpec {
            name: "Quick Validation".to_string(),
            reference_size: 200,
            normal_samples: 40,
            anomaly_samples: 10,
            ..Default::default()
        }
    }

    pub fn by_name(name: &str) -> Option<DatasetSpec> {
        match name {
            "single-cluster" => Some(single_cluster()),
            "multi-cluster" => Some(multi_cluster()),
            "high-dimensional" => Some(high_dimensional()),
            "quick" => Some(quick()),
            _ => None,
        }
    }
}
