//! Detector contract and the closed set of ensemble members.

use crate::algo::{DensityNeighborhood, IsolationForest, LocalOutlierFactor, OneClassBoundary};
use crate::config::EnsembleConfig;
use crate::error::{DetectionError, EnsembleError, Result};
use crate::performance::PerformanceProfile;
use crate::reference::ReferenceSet;
use crate::signal::AlgorithmResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Detector identifiers, in canonical configuration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    #[serde(alias = "isolation")]
    IsolationForest,
    #[serde(alias = "boundary", alias = "svm")]
    OneClassSvm,
    #[serde(alias = "density", alias = "lof")]
    LocalOutlierFactor,
    #[serde(alias = "clustering")]
    Dbscan,
}

impl DetectorKind {
    pub const ALL: [DetectorKind; 4] = [
        DetectorKind::IsolationForest,
        DetectorKind::OneClassSvm,
        DetectorKind::LocalOutlierFactor,
        DetectorKind::Dbscan,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::IsolationForest => "isolation_forest",
            Self::OneClassSvm => "one_class_svm",
            Self::LocalOutlierFactor => "local_outlier_factor",
            Self::Dbscan => "dbscan",
        }
    }

    /// Family the detector belongs to (isolation, boundary, density, clustering).
    pub fn family(&self) -> &'static str {
        match self {
            Self::IsolationForest => "isolation",
            Self::OneClassSvm => "boundary",
            Self::LocalOutlierFactor => "density",
            Self::Dbscan => "clustering",
        }
    }
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DetectorKind {
    type Err = EnsembleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "isolation_forest" | "isolation" => Ok(Self::IsolationForest),
            "one_class_svm" | "boundary" | "svm" => Ok(Self::OneClassSvm),
            "local_outlier_factor" | "density" | "lof" => Ok(Self::LocalOutlierFactor),
            "dbscan" | "clustering" => Ok(Self::Dbscan),
            _ => Err(EnsembleError::config(format!("unknown detector '{s}'"))),
        }
    }
}

/// Trait for all anomaly detectors.
///
/// Models are trained once and scoring never mutates them, so a detector can
/// be shared across concurrent detections behind an `Arc`.
pub trait Detector: Send + Sync {
    fn kind(&self) -> DetectorKind;

    /// Feature count the model was trained on.
    fn dimensions(&self) -> usize;

    /// Score one feature vector. Higher scores are more anomalous and the
    /// verdict never flips from anomalous to normal as the score grows.
    fn score(&self, features: &[f64]) -> std::result::Result<AlgorithmResult, DetectionError>;

    fn threshold(&self) -> f64;

    fn set_threshold(&mut self, threshold: f64);

    /// Built-in prior used until observed feedback arrives.
    fn performance_profile(&self) -> PerformanceProfile {
        PerformanceProfile::prior(self.kind())
    }

    fn get_stats(&self) -> String {
        String::new()
    }
}

/// Reject empty, wrongly-sized or non-finite input before it reaches a model.
pub(crate) fn check_features(
    detector: DetectorKind,
    expected: usize,
    features: &[f64],
) -> std::result::Result<(), DetectionError> {
    if features.is_empty() {
        return Err(DetectionError::EmptyInput { detector });
    }
    if features.len() != expected {
        return Err(DetectionError::DimensionMismatch {
            detector,
            expected,
            actual: features.len(),
        });
    }
    if let Some(index) = features.iter().position(|v| !v.is_finite()) {
        return Err(DetectionError::NonFinite { detector, index });
    }
    Ok(())
}

/// Static-dispatch registry over the four detector families.
pub enum EnsembleMember {
    Isolation(IsolationForest),
    Boundary(OneClassBoundary),
    Density(LocalOutlierFactor),
    Clustering(DensityNeighborhood),
}

impl EnsembleMember {
    /// Train the detector of the given kind against the reference set.
    pub fn train(kind: DetectorKind, reference: &ReferenceSet, config: &EnsembleConfig) -> Result<Self> {
        let member = match kind {
            DetectorKind::IsolationForest => {
                Self::Isolation(IsolationForest::train(reference.points(), &config.isolation)?)
            }
            DetectorKind::OneClassSvm => {
                Self::Boundary(OneClassBoundary::train(reference.points(), &config.boundary)?)
            }
            DetectorKind::LocalOutlierFactor => {
                Self::Density(LocalOutlierFactor::train(reference, &config.density)?)
            }
            DetectorKind::Dbscan => {
                Self::Clustering(DensityNeighborhood::train(reference, &config.clustering)?)
            }
        };
        Ok(member)
    }

    fn inner(&self) -> &dyn Detector {
        match self {
            Self::Isolation(d) => d,
            Self::Boundary(d) => d,
            Self::Density(d) => d,
            Self::Clustering(d) => d,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Detector {
        match self {
            Self::Isolation(d) => d,
            Self::Boundary(d) => d,
            Self::Density(d) => d,
            Self::Clustering(d) => d,
        }
    }
}

impl Detector for EnsembleMember {
    fn kind(&self) -> DetectorKind {
        self.inner().kind()
    }

    fn dimensions(&self) -> usize {
        self.inner().dimensions()
    }

    fn score(&self, features: &[f64]) -> std::result::Result<AlgorithmResult, DetectionError> {
        self.inner().score(features)
    }

    fn threshold(&self) -> f64 {
        self.inner().threshold()
    }

    fn set_threshold(&mut self, threshold: f64) {
        self.inner_mut().set_threshold(threshold)
    }

    fn performance_profile(&self) -> PerformanceProfile {
        self.inner().performance_profile()
    }

    fn get_stats(&self) -> String {
        self.inner().get_stats()
    }
}
