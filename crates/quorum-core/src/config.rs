//! Ensemble configuration
//!
//! Every struct here deserializes with defaults for missing fields, so a JSON
//! document only needs to name what it changes:
//!
//! ```json
//! { "detectors": ["isolation", "lof"], "voting": "soft", "threshold": 0.45 }
//! ```

use crate::detector::DetectorKind;
use crate::error::{EnsembleError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Aggregation policy applied over per-detector results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VotingStrategy {
    /// Weighted fraction of detectors that flagged the input
    Hard,
    /// Weighted mean of scores
    Soft,
    /// Weighted mean of scores, weights scaled by detector confidence
    #[default]
    Weighted,
}

impl VotingStrategy {
    pub const ALL: [VotingStrategy; 3] = [Self::Hard, Self::Soft, Self::Weighted];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Hard => "hard",
            Self::Soft => "soft",
            Self::Weighted => "weighted",
        }
    }
}

impl fmt::Display for VotingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for VotingStrategy {
    type Err = EnsembleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hard" => Ok(Self::Hard),
            "soft" => Ok(Self::Soft),
            "weighted" => Ok(Self::Weighted),
            _ => Err(EnsembleError::config(format!("unknown voting strategy '{s}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IsolationParams {
    pub num_trees: usize,
    /// Points per tree, capped at the reference size
    pub subsample_size: usize,
    pub threshold: f64,
    pub seed: u64,
}

impl Default for IsolationParams {
    fn default() -> Self {
        Self {
            num_trees: 100,
            subsample_size: 256,
            threshold: 0.6,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundaryParams {
    /// RBF kernel width; derived from the reference variance when unset
    pub gamma: Option<f64>,
    /// Fraction of reference points allowed outside the boundary
    pub nu: f64,
    pub max_support: usize,
    pub steepness: f64,
    pub threshold: f64,
    pub seed: u64,
}

impl Default for BoundaryParams {
    fn default() -> Self {
        Self {
            gamma: None,
            nu: 0.05,
            max_support: 512,
            steepness: 6.0,
            threshold: 0.0,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DensityParams {
    pub k: usize,
    /// LOF ratio above which a point is anomalous
    pub threshold: f64,
}

impl Default for DensityParams {
    fn default() -> Self {
        Self {
            k: 10,
            threshold: 1.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringParams {
    /// Neighbourhood radius; the 90th percentile of min_pts-distances when unset
    pub epsilon: Option<f64>,
    pub min_pts: usize,
}

impl Default for ClusteringParams {
    fn default() -> Self {
        Self {
            epsilon: None,
            min_pts: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleConfig {
    /// Enabled detectors, in the order results are reported
    pub detectors: Vec<DetectorKind>,
    pub voting: VotingStrategy,
    /// Pinned weights that survive rebalancing
    pub weight_overrides: BTreeMap<DetectorKind, f64>,
    /// Decision threshold on the final score, in (0, 1)
    pub threshold: f64,
    pub performance_weight: f64,
    pub diversity_weight: f64,
    pub detector_timeout_ms: u64,
    pub isolation: IsolationParams,
    pub boundary: BoundaryParams,
    pub density: DensityParams,
    pub clustering: ClusteringParams,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            detectors: DetectorKind::ALL.to_vec(),
            voting: VotingStrategy::default(),
            weight_overrides: BTreeMap::new(),
            threshold: 0.5,
            performance_weight: 0.7,
            diversity_weight: 0.3,
            detector_timeout_ms: 250,
            isolation: IsolationParams::default(),
            boundary: BoundaryParams::default(),
            density: DensityParams::default(),
            clustering: ClusteringParams::default(),
        }
    }
}

fn check_coefficient(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(EnsembleError::config(format!(
            "{name} must be finite and non-negative, got {value}"
        )));
    }
    Ok(())
}

impl EnsembleConfig {
    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| EnsembleError::config(format!("invalid ensemble config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| EnsembleError::config(format!("failed to serialize config: {e}")))
    }

    /// Enable the named detectors, in order.
    pub fn with_detector_names<I, S>(self, names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let detectors = names
            .into_iter()
            .map(|n| n.as_ref().parse())
            .collect::<Result<Vec<DetectorKind>>>()?;
        Ok(self.with_detectors(detectors))
    }

    pub fn with_detectors(mut self, detectors: impl IntoIterator<Item = DetectorKind>) -> Self {
        self.detectors = detectors.into_iter().collect();
        self
    }

    pub fn with_voting(mut self, voting: VotingStrategy) -> Self {
        self.voting = voting;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_coefficients(mut self, performance_weight: f64, diversity_weight: f64) -> Self {
        self.performance_weight = performance_weight;
        self.diversity_weight = diversity_weight;
        self
    }

    pub fn with_weight_override(mut self, detector: DetectorKind, weight: f64) -> Self {
        self.weight_overrides.insert(detector, weight);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.detector_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.detector_timeout_ms)
    }

    pub fn is_enabled(&self, detector: DetectorKind) -> bool {
        self.detectors.contains(&detector)
    }

    pub fn validate(&self) -> Result<()> {
        if self.detectors.is_empty() {
            return Err(EnsembleError::config("no detectors enabled"));
        }
        let mut seen = BTreeSet::new();
        for detector in &self.detectors {
            if !seen.insert(*detector) {
                return Err(EnsembleError::config(format!(
                    "detector '{detector}' enabled more than once"
                )));
            }
        }

        if !(self.threshold > 0.0 && self.threshold < 1.0) {
            return Err(EnsembleError::config(format!(
                "threshold must lie in (0, 1), got {}",
                self.threshold
            )));
        }

        check_coefficient("performance_weight", self.performance_weight)?;
        check_coefficient("diversity_weight", self.diversity_weight)?;
        if self.performance_weight + self.diversity_weight <= 0.0 {
            return Err(EnsembleError::config(
                "performance_weight and diversity_weight cannot both be zero",
            ));
        }

        for (detector, weight) in &self.weight_overrides {
            if !self.is_enabled(*detector) {
                return Err(EnsembleError::config(format!(
                    "weight override for disabled detector '{detector}'"
                )));
            }
            check_coefficient(&format!("weight override for '{detector}'"), *weight)?;
        }

        if self.detector_timeout_ms == 0 {
            return Err(EnsembleError::config("detector_timeout_ms must be positive"));
        }

        self.validate_params()
    }

    fn validate_params(&self) -> Result<()> {
        let iso = &self.isolation;
        if iso.num_trees == 0 {
            return Err(EnsembleError::config("isolation.num_trees must be positive"));
        }
        if iso.subsample_size < 2 {
            return Err(EnsembleError::config("isolation.subsample_size must be at least 2"));
        }
        if !(iso.threshold > 0.0 && iso.threshold < 1.0) {
            return Err(EnsembleError::config("isolation.threshold must lie in (0, 1)"));
        }

        let svm = &self.boundary;
        if let Some(gamma) = svm.gamma {
            if !gamma.is_finite() || gamma <= 0.0 {
                return Err(EnsembleError::config("boundary.gamma must be positive"));
            }
        }
        if !(svm.nu > 0.0 && svm.nu < 1.0) {
            return Err(EnsembleError::config("boundary.nu must lie in (0, 1)"));
        }
        if svm.max_support < 2 {
            return Err(EnsembleError::config("boundary.max_support must be at least 2"));
        }
        if !svm.steepness.is_finite() || svm.steepness <= 0.0 {
            return Err(EnsembleError::config("boundary.steepness must be positive"));
        }
        if !svm.threshold.is_finite() {
            return Err(EnsembleError::config("boundary.threshold must be finite"));
        }

        if self.density.k == 0 {
            return Err(EnsembleError::config("density.k must be positive"));
        }
        if !self.density.threshold.is_finite() || self.density.threshold <= 0.0 {
            return Err(EnsembleError::config("density.threshold must be positive"));
        }

        if let Some(epsilon) = self.clustering.epsilon {
            if !epsilon.is_finite() || epsilon <= 0.0 {
                return Err(EnsembleError::config("clustering.epsilon must be positive"));
            }
        }
        if self.clustering.min_pts == 0 {
            return Err(EnsembleError::config("clustering.min_pts must be positive"));
        }
        Ok(())
    }
}
