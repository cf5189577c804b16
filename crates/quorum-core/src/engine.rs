//! Ensemble orchestrator
//!
//! Runs every enabled detector against a feature vector, votes over the
//! results and keeps the weight table current as performance feedback
//! arrives.
//!
//! The mutable part of the ensemble (configuration, trained members,
//! performance ledger, weight table) is published as one immutable snapshot.
//! Detections clone the current `Arc` under a short read lock and never see a
//! half-applied rebalance; writers build a complete replacement and swap it in.

use crate::benchmark::{BenchmarkAccumulator, BenchmarkReport};
use crate::config::EnsembleConfig;
use crate::detector::{Detector, DetectorKind, EnsembleMember};
use crate::error::{DetectionError, EnsembleError, Result};
use crate::performance::{PerformanceLedger, PerformanceProfile, PerformanceSample};
use crate::reference::ReferenceSet;
use crate::signal::{AlgorithmResult, EnsembleResult, FeatureVector, WeightTable};
use crate::voting;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

struct EnsembleSnapshot {
    config: EnsembleConfig,
    /// Trained detectors, in configuration order
    members: Vec<Arc<EnsembleMember>>,
    ledger: PerformanceLedger,
    weights: WeightTable,
}

pub struct Orchestrator {
    reference: ReferenceSet,
    state: RwLock<Arc<EnsembleSnapshot>>,
}

fn train_members(config: &EnsembleConfig, reference: &ReferenceSet) -> Result<Vec<Arc<EnsembleMember>>> {
    config
        .detectors
        .iter()
        .map(|kind| EnsembleMember::train(*kind, reference, config).map(Arc::new))
        .collect()
}

impl Orchestrator {
    /// Validate `config`, index the reference set and train every enabled
    /// detector against it.
    pub fn configure(config: EnsembleConfig, reference: Vec<FeatureVector>) -> Result<Self> {
        config.validate()?;
        let reference = ReferenceSet::new(reference)?;
        let members = train_members(&config, &reference)?;
        let ledger = PerformanceLedger::new(&config.detectors);
        let weights = ledger.weights(&config);

        info!(
            detectors = config.detectors.len(),
            voting = %config.voting,
            reference = reference.len(),
            dimensions = reference.dimensions(),
            "Ensemble configured"
        );
        for member in &members {
            debug!(detector = %member.kind(), stats = %member.get_stats(), "Detector trained");
        }

        Ok(Self {
            reference,
            state: RwLock::new(Arc::new(EnsembleSnapshot {
                config,
                members,
                ledger,
                weights,
            })),
        })
    }

    fn snapshot(&self) -> Arc<EnsembleSnapshot> {
        Arc::clone(&*self.state.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn config(&self) -> EnsembleConfig {
        self.snapshot().config.clone()
    }

    /// Weight table currently used by detection.
    pub fn weights(&self) -> WeightTable {
        self.snapshot().weights.clone()
    }

    pub fn profiles(&self) -> Vec<PerformanceProfile> {
        let snapshot = self.snapshot();
        snapshot.ledger.profiles(&snapshot.config)
    }

    pub fn dimensions(&self) -> usize {
        self.reference.dimensions()
    }

    pub fn reference(&self) -> &ReferenceSet {
        &self.reference
    }

    /// One stats line per trained detector.
    pub fn detector_stats(&self) -> Vec<String> {
        self.snapshot().members.iter().map(|m| m.get_stats()).collect()
    }

    pub async fn detect(&self, features: &[f64]) -> Result<EnsembleResult> {
        self.detect_with_cancel(features, &CancellationToken::new()).await
    }

    /// Score `features` with every enabled detector and vote.
    ///
    /// Detectors run as blocking tasks sharing one deadline. Detectors that
    /// fail or miss the deadline are excluded; the call fails only when none
    /// of them produced a result.
    pub async fn detect_with_cancel(
        &self,
        features: &[f64],
        cancel: &CancellationToken,
    ) -> Result<EnsembleResult> {
        if cancel.is_cancelled() {
            return Err(EnsembleError::Cancelled);
        }
        let snapshot = self.snapshot();
        let timeout_ms = snapshot.config.detector_timeout_ms;
        let deadline = tokio::time::Instant::now() + snapshot.config.timeout();
        let input: Arc<[f64]> = Arc::from(features);

        let handles: Vec<_> = snapshot
            .members
            .iter()
            .map(|member| {
                let member = Arc::clone(member);
                let input = Arc::clone(&input);
                (member.kind(), tokio::task::spawn_blocking(move || member.score(&input)))
            })
            .collect();

        let gather = async move {
            let mut results: Vec<AlgorithmResult> = Vec::with_capacity(handles.len());
            let mut failures: Vec<DetectionError> = Vec::new();
            for (detector, handle) in handles {
                match tokio::time::timeout_at(deadline, handle).await {
                    Ok(Ok(Ok(result))) => results.push(result),
                    Ok(Ok(Err(error))) => failures.push(error),
                    Ok(Err(join_error)) => failures.push(DetectionError::Aborted {
                        detector,
                        reason: join_error.to_string(),
                    }),
                    Err(_) => failures.push(DetectionError::Timeout {
                        detector,
                        timeout_ms,
                    }),
                }
            }
            (results, failures)
        };

        let (results, failures) = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(EnsembleError::Cancelled),
            gathered = gather => gathered,
        };

        for failure in &failures {
            warn!(detector = %failure.detector(), error = %failure, "Detector excluded from vote");
        }
        if results.is_empty() {
            return Err(EnsembleError::AllDetectorsFailed(failures));
        }

        let config = &snapshot.config;
        let result = voting::vote(config.voting, config.threshold, results, &snapshot.weights, &failures);
        debug!(
            score = result.final_score,
            anomaly = result.is_anomaly,
            consensus = result.consensus,
            severity = %result.severity,
            "Detection complete"
        );
        Ok(result)
    }

    /// Fold performance feedback into the detector histories and publish the
    /// recomputed weight table. `None` recomputes from the current histories.
    pub fn rebalance(
        &self,
        feedback: Option<&HashMap<DetectorKind, PerformanceSample>>,
    ) -> Result<WeightTable> {
        if let Some(feedback) = feedback {
            for (detector, sample) in feedback {
                let values = [
                    sample.accuracy,
                    sample.precision,
                    sample.recall,
                    sample.f1,
                    sample.false_positive_rate,
                ];
                if values.iter().any(|v| !v.is_finite()) {
                    return Err(EnsembleError::config(format!(
                        "non-finite performance sample for '{detector}'"
                    )));
                }
                if values.iter().any(|v| !(0.0..=1.0).contains(v)) {
                    return Err(EnsembleError::config(format!(
                        "performance sample for '{detector}' has a metric outside [0, 1]"
                    )));
                }
            }
        }

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let current = Arc::clone(&*state);
        let mut ledger = current.ledger.clone();

        if let Some(feedback) = feedback {
            for (detector, sample) in feedback {
                if !ledger.record(*detector, *sample) {
                    warn!(detector = %detector, "Ignoring feedback for detector that is not enabled");
                }
            }
        }

        let weights = ledger.weights(&current.config);
        *state = Arc::new(EnsembleSnapshot {
            config: current.config.clone(),
            members: current.members.clone(),
            ledger,
            weights: weights.clone(),
        });

        info!(
            feedback = feedback.map_or(0, HashMap::len),
            total_weight = weights.total(),
            "Weights rebalanced"
        );
        Ok(weights)
    }

    /// Retrain against the stored reference set with a new configuration.
    /// Histories of detectors that stay enabled carry over.
    pub fn reconfigure(&self, config: EnsembleConfig) -> Result<()> {
        config.validate()?;
        let members = train_members(&config, &self.reference)?;

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let ledger = state.ledger.carried_over(&config.detectors);
        let weights = ledger.weights(&config);

        info!(
            detectors = config.detectors.len(),
            voting = %config.voting,
            "Ensemble reconfigured"
        );
        *state = Arc::new(EnsembleSnapshot {
            config,
            members,
            ledger,
            weights,
        });
        Ok(())
    }

    pub async fn benchmark(&self, dataset: &[(FeatureVector, bool)]) -> Result<BenchmarkReport> {
        self.benchmark_with_cancel(dataset, &CancellationToken::new())
            .await
    }

    /// Run full detection over a labeled dataset. Cancellation stops the run
    /// and returns what was gathered so far, marked incomplete.
    pub async fn benchmark_with_cancel(
        &self,
        dataset: &[(FeatureVector, bool)],
        cancel: &CancellationToken,
    ) -> Result<BenchmarkReport> {
        if dataset.is_empty() {
            return Err(EnsembleError::InsufficientData(
                "benchmark dataset is empty".to_string(),
            ));
        }

        let voting = self.snapshot().config.voting;
        let mut accumulator = BenchmarkAccumulator::default();
        let mut complete = true;

        for (index, (features, label)) in dataset.iter().enumerate() {
            if cancel.is_cancelled() {
                complete = false;
                break;
            }
            let start = std::time::Instant::now();
            match self.detect_with_cancel(features, cancel).await {
                Ok(result) => accumulator.record(index, *label, &result, start.elapsed()),
                Err(EnsembleError::Cancelled) => {
                    complete = false;
                    break;
                }
                Err(EnsembleError::AllDetectorsFailed(errors)) => {
                    warn!(sample = index, failures = errors.len(), "Sample skipped, every detector failed");
                    accumulator.record_failure();
                }
                Err(other) => return Err(other),
            }
        }

        let report = accumulator.finish(voting, dataset.len(), complete);
        info!(
            evaluated = report.samples_evaluated,
            total = report.samples_total,
            accuracy = report.accuracy,
            f1 = report.f1_score,
            complete = report.complete,
            "Benchmark finished"
        );
        Ok(report)
    }
}
