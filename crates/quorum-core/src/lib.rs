//! Quorum: ensemble anomaly detection
//!
//! Four independently trained detectors (isolation forest, one-class kernel
//! boundary, local outlier factor, DBSCAN neighbourhood) score each feature
//! vector; a voting layer turns their results into one decision with a
//! confidence, an agreement measure and a short explanation.
//!
//! ```no_run
//! use quorum_core::{EnsembleConfig, Orchestrator};
//!
//! # async fn run(reference: Vec<Vec<f64>>) -> quorum_core::Result<()> {
//! let engine = Orchestrator::configure(EnsembleConfig::default(), reference)?;
//! let result = engine.detect(&[0.4, 1.3]).await?;
//! println!("{} ({})", result.reason(), result.severity);
//! # Ok(())
//! # }
//! ```

pub mod algo;
pub mod benchmark;
pub mod config;
pub mod detector;
pub mod engine;
pub mod error;
pub mod performance;
pub mod reference;
pub mod signal;
pub mod voting;

pub use benchmark::{BenchmarkReport, ConfusionMatrix, DetectorMetrics, LatencyMetrics, SamplePrediction};
pub use config::{
    BoundaryParams, ClusteringParams, DensityParams, EnsembleConfig, IsolationParams, VotingStrategy,
};
pub use detector::{Detector, DetectorKind, EnsembleMember};
pub use engine::Orchestrator;
pub use error::{DetectionError, EnsembleError, Result};
pub use performance::{PerformanceProfile, PerformanceSample};
pub use reference::ReferenceSet;
pub use signal::{AlgorithmResult, EnsembleResult, FeatureVector, Severity, WeightTable};
pub use tokio_util::sync::CancellationToken;
