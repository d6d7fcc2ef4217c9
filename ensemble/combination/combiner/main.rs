//! Rule-based combination of per-classifier ensemble outputs.
//!
//! A [`Combiner`] resolves one [`CombinationRule`] at construction and reduces a
//! `(n_samples, n_classes, n_classifiers)` result tensor to one class label per sample.
//! Weights are applied only for [`CombinationRule::supports_weights`] rules; every other
//! rule ignores them and logs a warning.

/// Ensemble engine wrapping a combiner with review and telemetry.
pub mod engine;
/// Weight validation, scaling, and normalization.
pub mod func;
/// Prediction reviewers.
pub mod reviewer;
/// The closed set of combination rules.
pub mod rule;
/// Per-sample rule primitives.
pub mod rules;

use std::fmt;

use ndarray::{Array1, Array3, ArrayBase, ArrayView1, Axis, Data, Ix3};
use rayon::prelude::*;
use serde_json::json;
use shared_logging::LogLevel;

pub use engine::{CombinationEngine, CombinationResult};
pub use reviewer::CombinationReviewer;
pub use rule::CombinationRule;

use crate::{
    error::{CombinationError, RuleError},
    telemetry::{self, CombinationTelemetry},
};
use func::{apply_weights, validate_weights};
use rules::RuleFn;

/// Reduces ensemble result tensors to per-sample class predictions.
#[derive(Clone)]
pub struct Combiner {
    rule: CombinationRule,
    apply: RuleFn,
    telemetry: Option<CombinationTelemetry>,
}

impl fmt::Debug for Combiner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Combiner")
            .field("rule", &self.rule)
            .field("telemetry", &self.telemetry)
            .finish_non_exhaustive()
    }
}

impl Default for Combiner {
    fn default() -> Self {
        Self::new(CombinationRule::default())
    }
}

impl Combiner {
    /// Creates a combiner for the given rule.
    #[must_use]
    pub fn new(rule: CombinationRule) -> Self {
        Self {
            rule,
            apply: rule.rule_fn(),
            telemetry: None,
        }
    }

    /// Resolves a rule by its canonical name (`majority_vote`, `max`, `min`, `mean`, `median`).
    pub fn from_name(name: &str) -> Result<Self, CombinationError> {
        Ok(Self::new(name.parse()?))
    }

    /// Attaches telemetry for structured logs.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: CombinationTelemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// The resolved rule.
    #[must_use]
    pub const fn rule(&self) -> CombinationRule {
        self.rule
    }

    /// Canonical name of the resolved rule.
    #[must_use]
    pub const fn rule_name(&self) -> &'static str {
        self.rule.as_str()
    }

    /// Whether `weights` would be applied by this combiner.
    #[must_use]
    pub fn applies_weights(&self, weights: Option<ArrayView1<'_, f64>>) -> bool {
        weights.is_some() && self.rule.supports_weights()
    }

    /// Combines `results` of shape `(n_samples, n_classes, n_classifiers)` into one label per sample.
    ///
    /// `results` holds vote counts for majority vote and per-class scores otherwise; which one is
    /// not checked. The caller's tensor is never modified.
    ///
    /// # Errors
    ///
    /// * [`CombinationError::ShapeMismatch`] when an eligible rule gets weights whose length
    ///   differs from `n_classifiers`.
    /// * [`CombinationError::InvalidWeights`] for negative or non-finite weights on an eligible rule.
    /// * [`CombinationError::Rule`] when the rule fails on a sample.
    pub fn combine<S>(
        &self,
        results: &ArrayBase<S, Ix3>,
        weights: Option<ArrayView1<'_, f64>>,
    ) -> Result<Array1<f64>, CombinationError>
    where
        S: Data,
        S::Elem: Copy + Into<f64>,
    {
        let working = self.prepare(results, weights)?;
        let mut predictions = Array1::<f64>::zeros(working.len_of(Axis(0)));
        for (sample, (slice, label)) in working
            .outer_iter()
            .zip(predictions.iter_mut())
            .enumerate()
        {
            let class = (self.apply)(slice).map_err(|source| self.rule_failure(sample, source))?;
            *label = class_label(class);
        }
        self.completed(&predictions, false);
        Ok(predictions)
    }

    /// Same contract as [`Self::combine`], reducing samples on the rayon pool.
    ///
    /// Weighting completes before any sample is reduced. When several samples fail, the error
    /// for the lowest sample index is returned.
    pub fn combine_parallel<S>(
        &self,
        results: &ArrayBase<S, Ix3>,
        weights: Option<ArrayView1<'_, f64>>,
    ) -> Result<Array1<f64>, CombinationError>
    where
        S: Data,
        S::Elem: Copy + Into<f64>,
    {
        let working = self.prepare(results, weights)?;
        let apply = self.apply;
        let outcomes: Vec<Result<usize, RuleError>> = working
            .axis_iter(Axis(0))
            .into_par_iter()
            .map(apply)
            .collect();
        let mut predictions = Array1::<f64>::zeros(outcomes.len());
        for (sample, (outcome, label)) in outcomes
            .into_iter()
            .zip(predictions.iter_mut())
            .enumerate()
        {
            let class = outcome.map_err(|source| self.rule_failure(sample, source))?;
            *label = class_label(class);
        }
        self.completed(&predictions, true);
        Ok(predictions)
    }

    /// Copies `results` to `f64` and applies weights when the rule supports them.
    fn prepare<S>(
        &self,
        results: &ArrayBase<S, Ix3>,
        weights: Option<ArrayView1<'_, f64>>,
    ) -> Result<Array3<f64>, CombinationError>
    where
        S: Data,
        S::Elem: Copy + Into<f64>,
    {
        let mut working: Array3<f64> = results.mapv(Into::into);
        let (n_samples, n_classes, n_classifiers) = working.dim();
        self.log(
            LogLevel::Debug,
            "combine.start",
            json!({
                "rule": self.rule_name(),
                "samples": n_samples,
                "classes": n_classes,
                "classifiers": n_classifiers,
                "weighted": weights.is_some(),
            }),
        );

        let Some(weights) = weights else {
            return Ok(working);
        };
        if !self.rule.supports_weights() {
            self.log(
                LogLevel::Warn,
                "combine.weights_ignored",
                json!({ "rule": self.rule_name(), "weights": weights.len() }),
            );
            return Ok(working);
        }
        if let Err(err) = validate_weights(weights, n_classifiers) {
            self.log(
                LogLevel::Error,
                "combine.invalid_weights",
                json!({ "rule": self.rule_name(), "error": err.to_string() }),
            );
            return Err(err);
        }
        apply_weights(&mut working, weights);
        Ok(working)
    }

    fn rule_failure(&self, sample: usize, source: RuleError) -> CombinationError {
        let err = CombinationError::Rule { sample, source };
        self.log(
            LogLevel::Error,
            "combine.rule_failed",
            json!({ "rule": self.rule_name(), "sample": sample, "error": err.to_string() }),
        );
        err
    }

    fn completed(&self, predictions: &Array1<f64>, parallel: bool) {
        self.log(
            LogLevel::Debug,
            "combine.complete",
            json!({ "rule": self.rule_name(), "samples": predictions.len(), "parallel": parallel }),
        );
    }

    fn log(&self, level: LogLevel, message: &str, metadata: serde_json::Value) {
        telemetry::log(self.telemetry.as_ref(), level, message, metadata);
    }
}

#[allow(clippy::cast_precision_loss)]
const fn class_label(class: usize) -> f64 {
    class as f64
}
