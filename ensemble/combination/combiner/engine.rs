use anyhow::Context;
use ndarray::{Array1, ArrayBase, Data, Ix3};
use serde::{Deserialize, Serialize};
use serde_json::json;
use shared_logging::LogLevel;
use uuid::Uuid;

use super::{reviewer::CombinationReviewer, CombinationRule, Combiner};
use crate::{
    config::CombinerConfig,
    telemetry::{self, CombinationTelemetry},
};

/// Result produced by the combination engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinationResult {
    /// Run identifier.
    pub id: Uuid,
    /// Rule used for the run.
    pub rule: CombinationRule,
    /// One class label per sample.
    pub predictions: Vec<f64>,
    /// Whether classifier weights were applied.
    pub weighted: bool,
    /// Number of classifiers in the ensemble.
    pub n_classifiers: usize,
    /// Reviewer notes.
    pub notes: String,
}

impl CombinationResult {
    /// Renders a concise summary string.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "[COMBINE] rule={} samples={} classifiers={} weighted={}",
            self.rule,
            self.predictions.len(),
            self.n_classifiers,
            self.weighted
        )
    }
}

/// Engine that runs a combiner with configured weights and validates the output.
#[derive(Debug, Clone)]
pub struct CombinationEngine {
    combiner: Combiner,
    reviewer: CombinationReviewer,
    weights: Option<Array1<f64>>,
    parallel: bool,
    telemetry: Option<CombinationTelemetry>,
}

impl CombinationEngine {
    /// Creates a sequential, unweighted engine.
    #[must_use]
    pub const fn new(combiner: Combiner, reviewer: CombinationReviewer) -> Self {
        Self {
            combiner,
            reviewer,
            weights: None,
            parallel: false,
            telemetry: None,
        }
    }

    /// Builds an engine from a loaded config.
    #[must_use]
    pub fn from_config(config: &CombinerConfig) -> Self {
        Self {
            weights: config.weight_vector(),
            parallel: config.parallel,
            ..Self::new(Combiner::new(config.rule), CombinationReviewer)
        }
    }

    /// Sets default classifier weights used on every run.
    #[must_use]
    pub fn with_weights(mut self, weights: Array1<f64>) -> Self {
        self.weights = Some(weights);
        self
    }

    /// Toggles parallel per-sample reduction.
    #[must_use]
    pub const fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Attaches telemetry to the engine and its combiner.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: CombinationTelemetry) -> Self {
        self.combiner = self.combiner.with_telemetry(telemetry.clone());
        self.telemetry = Some(telemetry);
        self
    }

    /// The wrapped combiner.
    #[must_use]
    pub const fn combiner(&self) -> &Combiner {
        &self.combiner
    }

    /// Combines `results` with the configured weights and returns reviewed predictions.
    pub fn run<S>(&self, results: &ArrayBase<S, Ix3>) -> anyhow::Result<CombinationResult>
    where
        S: Data,
        S::Elem: Copy + Into<f64>,
    {
        let (n_samples, n_classes, n_classifiers) = results.dim();
        let rule = self.combiner.rule();
        let weights = self.weights.as_ref().map(|weights| weights.view());
        let predictions = if self.parallel {
            self.combiner.combine_parallel(results, weights)
        } else {
            self.combiner.combine(results, weights)
        }
        .with_context(|| format!("combining {n_samples} samples with rule {rule}"))?;

        let predictions = predictions.to_vec();
        if let Err(err) = self.reviewer.review(&predictions, n_classes) {
            telemetry::log(
                self.telemetry.as_ref(),
                LogLevel::Error,
                "engine.review_failed",
                json!({ "rule": rule.as_str(), "error": err.to_string() }),
            );
            return Err(err);
        }

        let weighted = self.combiner.applies_weights(weights);
        let notes = if weights.is_some() && !weighted {
            format!("ensemble validated; weights ignored by rule {rule}")
        } else {
            "ensemble validated".to_string()
        };
        let result = CombinationResult {
            id: Uuid::new_v4(),
            rule,
            predictions,
            weighted,
            n_classifiers,
            notes,
        };
        let payload = json!({
            "id": result.id,
            "rule": rule.as_str(),
            "samples": n_samples,
            "classifiers": n_classifiers,
            "weighted": weighted,
            "parallel": self.parallel,
        });
        telemetry::log(
            self.telemetry.as_ref(),
            LogLevel::Info,
            "engine.run_complete",
            payload.clone(),
        );
        telemetry::event(self.telemetry.as_ref(), "combination.completed", payload);
        Ok(result)
    }
}
