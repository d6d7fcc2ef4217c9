use serde::{Deserialize, Serialize};

/// Reviewer that validates combined predictions before they leave the engine.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct CombinationReviewer;

impl CombinationReviewer {
    /// Ensures every prediction is a finite, integral class index below `n_classes`.
    pub fn review(&self, predictions: &[f64], n_classes: usize) -> anyhow::Result<()> {
        #[allow(clippy::cast_precision_loss)]
        let class_count = n_classes as f64;
        for (sample, &label) in predictions.iter().enumerate() {
            if !label.is_finite() {
                anyhow::bail!("combination produced non-finite label for sample {sample}");
            }
            if label < 0.0 || label.fract() != 0.0 {
                anyhow::bail!("combination produced non-index label {label} for sample {sample}");
            }
            if label >= class_count {
                anyhow::bail!(
                    "combination produced label {label} for sample {sample} but only {n_classes} classes exist"
                );
            }
        }
        Ok(())
    }
}
