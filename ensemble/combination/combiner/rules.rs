//! Per-sample combination rules.
//!
//! Every rule receives one sample's `(n_classes, n_classifiers)` slice and returns the
//! winning class index. Ties go to the lowest class index.

use ndarray::{ArrayView1, ArrayView2};

use crate::error::RuleError;

/// Signature shared by every rule primitive.
pub type RuleFn = fn(ArrayView2<'_, f64>) -> Result<usize, RuleError>;

/// Class with the highest vote total summed across classifiers.
pub fn majority_vote_rule(votes: ArrayView2<'_, f64>) -> Result<usize, RuleError> {
    best_class(votes, |row| row.sum())
}

/// Class whose highest classifier score is the largest.
pub fn max_rule(probs: ArrayView2<'_, f64>) -> Result<usize, RuleError> {
    best_class(probs, |row| row.fold(f64::NEG_INFINITY, |acc, &v| acc.max(v)))
}

/// Class whose lowest classifier score is the largest (best of the worst).
pub fn min_rule(probs: ArrayView2<'_, f64>) -> Result<usize, RuleError> {
    best_class(probs, |row| row.fold(f64::INFINITY, |acc, &v| acc.min(v)))
}

/// Class with the highest classifier-averaged score.
pub fn mean_rule(probs: ArrayView2<'_, f64>) -> Result<usize, RuleError> {
    best_class(probs, |row| row.mean().unwrap_or(f64::NAN))
}

/// Class with the highest classifier-median score.
pub fn median_rule(probs: ArrayView2<'_, f64>) -> Result<usize, RuleError> {
    best_class(probs, median)
}

fn median(row: ArrayView1<'_, f64>) -> f64 {
    let mut values = row.to_vec();
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// Reduces each class row to a score and returns the first index holding the maximum.
fn best_class<F>(slice: ArrayView2<'_, f64>, score: F) -> Result<usize, RuleError>
where
    F: Fn(ArrayView1<'_, f64>) -> f64,
{
    let (classes, classifiers) = slice.dim();
    if classes == 0 || classifiers == 0 {
        return Err(RuleError::EmptySample {
            classes,
            classifiers,
        });
    }

    let mut best = (0, f64::NEG_INFINITY);
    for (class, row) in slice.outer_iter().enumerate() {
        if row.iter().any(|value| !value.is_finite()) {
            return Err(RuleError::NonFinite { class });
        }
        // Finite inputs may still overflow to +inf; only NaN is unrankable.
        let value = score(row);
        if value.is_nan() {
            return Err(RuleError::NonFinite { class });
        }
        if class == 0 || value > best.1 {
            best = (class, value);
        }
    }
    Ok(best.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn majority_vote_sums_across_classifiers() {
        let votes = array![[1.0, 0.0, 1.0], [0.0, 1.0, 0.0]];
        assert_eq!(majority_vote_rule(votes.view()).unwrap(), 0);
        let votes = array![[0.0, 1.0, 0.0], [1.0, 0.0, 1.0]];
        assert_eq!(majority_vote_rule(votes.view()).unwrap(), 1);
    }

    #[test]
    fn ties_break_to_lowest_class() {
        let votes = array![[1.0, 0.0], [0.0, 1.0], [0.0, 0.0]];
        assert_eq!(majority_vote_rule(votes.view()).unwrap(), 0);
        let probs = array![[0.1, 0.2], [0.5, 0.5], [0.5, 0.5]];
        assert_eq!(mean_rule(probs.view()).unwrap(), 1);
    }

    #[test]
    fn max_and_min_disagree_on_confident_outlier() {
        // Class 0 has one very confident classifier, class 1 is uniformly decent.
        let probs = array![[0.95, 0.05, 0.1], [0.1, 0.6, 0.6]];
        assert_eq!(max_rule(probs.view()).unwrap(), 0);
        assert_eq!(min_rule(probs.view()).unwrap(), 1);
    }

    #[test]
    fn median_ignores_single_outlier() {
        let probs = array![[1.0, 0.3, 0.3], [0.0, 0.35, 0.35]];
        assert_eq!(mean_rule(probs.view()).unwrap(), 0);
        assert_eq!(median_rule(probs.view()).unwrap(), 1);
    }

    #[test]
    fn median_averages_middle_pair_for_even_count() {
        let row = array![0.4, 0.1, 0.3, 0.2];
        assert!((median(row.view()) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn empty_slices_fail() {
        let empty = ndarray::Array2::<f64>::zeros((0, 3));
        assert_eq!(
            max_rule(empty.view()).unwrap_err(),
            RuleError::EmptySample {
                classes: 0,
                classifiers: 3
            }
        );
        let empty = ndarray::Array2::<f64>::zeros((2, 0));
        assert!(matches!(
            mean_rule(empty.view()),
            Err(RuleError::EmptySample { classifiers: 0, .. })
        ));
    }

    #[test]
    fn overflowing_totals_still_rank() {
        let votes = array![[1e308, 1e308, 0.0], [0.0, 0.0, 1.0]];
        assert_eq!(majority_vote_rule(votes.view()).unwrap(), 0);
        let probs = array![[1.0, 2.0], [1e308, 1e308]];
        assert_eq!(mean_rule(probs.view()).unwrap(), 1);
        assert_eq!(median_rule(probs.view()).unwrap(), 1);
    }

    #[test]
    fn non_finite_scores_fail() {
        let probs = array![[0.2, 0.3], [f64::NAN, 0.1]];
        assert_eq!(
            median_rule(probs.view()).unwrap_err(),
            RuleError::NonFinite { class: 1 }
        );
        let probs = array![[f64::INFINITY, 0.3], [0.2, 0.1]];
        assert_eq!(
            max_rule(probs.view()).unwrap_err(),
            RuleError::NonFinite { class: 0 }
        );
    }
}
