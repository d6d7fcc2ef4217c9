use thiserror::Error;

/// Failures raised by an individual combination rule while reducing one sample.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum RuleError {
    /// The per-sample slice had no classes or no classifiers.
    #[error("sample slice is empty ({classes} classes x {classifiers} classifiers)")]
    EmptySample {
        /// Number of classes in the slice.
        classes: usize,
        /// Number of classifiers in the slice.
        classifiers: usize,
    },
    /// A score feeding the rule was NaN or infinite, or its aggregate was NaN.
    #[error("non-finite score for class {class}")]
    NonFinite {
        /// Class whose scores were not finite.
        class: usize,
    },
}

/// Errors raised while building a [`crate::Combiner`] or combining results.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CombinationError {
    /// Unknown combination rule name.
    #[error(
        "invalid argument rule for Combiner: {rule:?} (expected one of majority_vote, max, min, mean, median)"
    )]
    InvalidArgument {
        /// Name that failed to resolve.
        rule: String,
    },
    /// Weight vector length differs from the classifier axis.
    #[error("weights and classifiers must have same size (weights={weights}, classifiers={classifiers})")]
    ShapeMismatch {
        /// Length of the supplied weight vector.
        weights: usize,
        /// Classifier count (third tensor dimension).
        classifiers: usize,
    },
    /// Weight entry is negative or not finite.
    #[error("weight {index} must be a finite non-negative scalar, got {value}")]
    InvalidWeights {
        /// Offending classifier index.
        index: usize,
        /// Offending value.
        value: f64,
    },
    /// The rule failed on a sample; no predictions are returned.
    #[error("combination rule failed on sample {sample}: {source}")]
    Rule {
        /// Sample index that failed.
        sample: usize,
        /// Underlying rule failure.
        #[source]
        source: RuleError,
    },
}
