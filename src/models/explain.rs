//! Ranked, human-readable explanations for a single prediction.
//!
//! Explanations are best effort: the predictor drops the field when anything
//! here fails, the score itself is never affected.

use crate::models::model::ChurnModel;
use crate::schema;
use crate::types::prediction::{round_to, Direction, FeatureAttribution};
use std::cmp::Ordering;
use tracing::debug;

/// Default number of entries returned.
pub const DEFAULT_TOP_K: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum ExplainError {
    #[error("model exposes neither attributions nor feature importances")]
    Unsupported,

    #[error("attribution has {actual} values for {expected} features")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("attribution failed: {0}")]
    Failed(String),
}

/// Produces the top-k attributions for one scored vector.
#[derive(Debug, Clone)]
pub struct ExplainabilityRanker {
    top_k: usize,
}

impl ExplainabilityRanker {
    pub fn new(top_k: usize) -> Self {
        Self { top_k }
    }

    /// Explain `model`'s output on the scaled vector.
    ///
    /// Uses per-instance attributions when the model has them. Otherwise falls
    /// back to global feature importances, whose direction cannot be inferred
    /// and is always reported as `increases`.
    pub fn explain(
        &self,
        model: &dyn ChurnModel,
        feature_names: &[&str],
        scaled: &[f64],
    ) -> Result<Vec<FeatureAttribution>, ExplainError> {
        let capabilities = model.capabilities();

        if capabilities.attribution {
            let values = model
                .attribution(scaled)?
                .into_positive_class()
                .ok_or_else(|| ExplainError::Failed("empty attribution".to_string()))?;
            check_len(feature_names, &values)?;
            return Ok(self.rank(feature_names, &values, None));
        }

        if capabilities.feature_importances {
            let importances = model
                .feature_importances()
                .ok_or(ExplainError::Unsupported)?;
            check_len(feature_names, &importances)?;
            debug!(model = %model.name(), "No per-instance attribution, using global importances");
            return Ok(self.rank(feature_names, &importances, Some(Direction::Increases)));
        }

        Err(ExplainError::Unsupported)
    }

    fn rank(
        &self,
        feature_names: &[&str],
        values: &[f64],
        fixed_direction: Option<Direction>,
    ) -> Vec<FeatureAttribution> {
        let mut pairs: Vec<(&str, f64)> = feature_names
            .iter()
            .copied()
            .zip(values.iter().copied())
            .collect();
        // stable: equal magnitudes keep schema order
        pairs.sort_by(|a, b| b.1.abs().partial_cmp(&a.1.abs()).unwrap_or(Ordering::Equal));

        pairs
            .into_iter()
            .take(self.top_k)
            .map(|(name, value)| FeatureAttribution {
                feature: schema::display_name(name),
                impact: round_to(value.abs() * 100.0, 1),
                direction: fixed_direction.unwrap_or(if value > 0.0 {
                    Direction::Increases
                } else {
                    Direction::Decreases
                }),
                value: round_to(value, 4),
            })
            .collect()
    }
}

impl Default for ExplainabilityRanker {
    fn default() -> Self {
        Self::new(DEFAULT_TOP_K)
    }
}

fn check_len(feature_names: &[&str], values: &[f64]) -> Result<(), ExplainError> {
    if values.len() != feature_names.len() {
        return Err(ExplainError::LengthMismatch {
            expected: feature_names.len(),
            actual: values.len(),
        });
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(ExplainError::Failed("non-finite attribution".to_string()));
    }
    Ok(())
}
