//! Error taxonomy for the ensemble.
//!
//! `DetectionError` is scoped to one detector on one input and is always
//! recovered inside `detect()`. `EnsembleError` is what callers see.

use crate::detector::DetectorKind;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EnsembleError>;

/// Failure of a single detector on a single feature vector.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DetectionError {
    #[error("{detector}: expected {expected} features, got {actual}")]
    DimensionMismatch {
        detector: DetectorKind,
        expected: usize,
        actual: usize,
    },
    #[error("{detector}: empty feature vector")]
    EmptyInput { detector: DetectorKind },
    #[error("{detector}: non-finite value at index {index}")]
    NonFinite { detector: DetectorKind, index: usize },
    #[error("{detector}: timed out after {timeout_ms} ms")]
    Timeout {
        detector: DetectorKind,
        timeout_ms: u64,
    },
    #[error("{detector}: scoring task aborted: {reason}")]
    Aborted {
        detector: DetectorKind,
        reason: String,
    },
}

impl DetectionError {
    /// Detector that produced this error.
    pub fn detector(&self) -> DetectorKind {
        match self {
            Self::DimensionMismatch { detector, .. }
            | Self::EmptyInput { detector }
            | Self::NonFinite { detector, .. }
            | Self::Timeout { detector, .. }
            | Self::Aborted { detector, .. } => *detector,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EnsembleError {
    /// Invalid configuration or reference data; raised at construction.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Every enabled detector failed on the same input.
    #[error("all {} detectors failed: {}", .0.len(), join_errors(.0))]
    AllDetectorsFailed(Vec<DetectionError>),
    #[error("insufficient data: {0}")]
    InsufficientData(String),
    #[error("operation cancelled")]
    Cancelled,
}

impl EnsembleError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

fn join_errors(errors: &[DetectionError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_error_reports_detector() {
        let err = DetectionError::DimensionMismatch {
            detector: DetectorKind::Dbscan,
            expected: 3,
            actual: 2,
        };
        assert_eq!(err.detector(), DetectorKind::Dbscan);
        assert_eq!(err.to_string(), "dbscan: expected 3 features, got 2");
    }

    #[test]
    fn test_all_failed_message_lists_every_detector() {
        let err = EnsembleError::AllDetectorsFailed(vec![
            DetectionError::EmptyInput {
                detector: DetectorKind::IsolationForest,
            },
            DetectionError::Timeout {
                detector: DetectorKind::LocalOutlierFactor,
                timeout_ms: 10,
            },
        ]);
        let message = err.to_string();
        assert!(message.starts_with("all 2 detectors failed"));
        assert!(message.contains("isolation_forest: empty feature vector"));
        assert!(message.contains("local_outlier_factor: timed out after 10 ms"));
    }
}
