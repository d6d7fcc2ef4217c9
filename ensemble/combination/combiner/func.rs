use ndarray::{Array3, ArrayView1, Axis};

use crate::error::CombinationError;

/// Checks that `weights` has one finite, non-negative entry per classifier.
pub fn validate_weights(
    weights: ArrayView1<'_, f64>,
    n_classifiers: usize,
) -> Result<(), CombinationError> {
    if weights.len() != n_classifiers {
        return Err(CombinationError::ShapeMismatch {
            weights: weights.len(),
            classifiers: n_classifiers,
        });
    }
    if let Some((index, &value)) = weights
        .iter()
        .enumerate()
        .find(|(_, value)| !value.is_finite() || **value < 0.0)
    {
        return Err(CombinationError::InvalidWeights { index, value });
    }
    Ok(())
}

/// Scales every classifier's `(samples, classes)` slice by its weight.
///
/// Callers validate the weight length first; extra or missing weights are not checked here.
pub fn apply_weights(results: &mut Array3<f64>, weights: ArrayView1<'_, f64>) {
    for (mut classifier, &weight) in results.axis_iter_mut(Axis(2)).zip(weights.iter()) {
        classifier.mapv_inplace(|value| value * weight);
    }
}

/// Rescales weights so they add up to one.
#[must_use]
pub fn normalize_weights(weights: &[f64]) -> Vec<f64> {
    let total = weights.iter().sum::<f64>().max(1e-12);
    weights.iter().map(|weight| weight / total).collect()
}
