use std::{fs, path::Path};

use anyhow::Context;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::combiner::{func::normalize_weights, CombinationRule};

/// File-backed configuration for a [`crate::CombinationEngine`].
///
/// ```json
/// { "rule": "mean", "weights": [0.5, 1.0, 2.0], "parallel": true }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CombinerConfig {
    /// Combination rule name.
    pub rule: CombinationRule,
    /// Optional per-classifier weights.
    pub weights: Option<Vec<f64>>,
    /// Reduce samples on the rayon pool.
    pub parallel: bool,
    /// Rescale `weights` to unit sum before use.
    pub normalize_weights: bool,
}

impl CombinerConfig {
    /// Loads a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("reading {:?}", path.as_ref()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("parsing combiner config {:?}", path.as_ref()))
    }

    /// Weight vector to hand to the combiner, normalized when requested.
    #[must_use]
    pub fn weight_vector(&self) -> Option<Array1<f64>> {
        self.weights.as_deref().map(|weights| {
            if self.normalize_weights {
                Array1::from_vec(normalize_weights(weights))
            } else {
                Array1::from_vec(weights.to_vec())
            }
        })
    }
}
