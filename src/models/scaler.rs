//! Standard scaler fitted by the training pipeline.
//!
//! Stored as JSON: `{"feature_names": [...], "mean": [...], "scale": [...]}`,
//! the `mean_` / `scale_` attributes of the fitted scaler in fit order.

use crate::error::{ServingError, ServingResult};
use crate::feature_extractor::FeatureVector;
use serde::Deserialize;

/// Per-feature centering and scaling.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StandardScaler {
    /// Column order the scaler was fit on
    pub feature_names: Vec<String>,
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn new(feature_names: Vec<String>, mean: Vec<f64>, scale: Vec<f64>) -> Self {
        Self {
            feature_names,
            mean,
            scale,
        }
    }

    /// Parse and validate a scaler from its JSON form.
    pub fn from_json(raw: &str) -> Result<Self, String> {
        let scaler: Self = serde_json::from_str(raw).map_err(|e| e.to_string())?;
        scaler.validate()?;
        Ok(scaler)
    }

    fn validate(&self) -> Result<(), String> {
        let n = self.feature_names.len();
        if n == 0 {
            return Err("scaler has no features".to_string());
        }
        if self.mean.len() != n || self.scale.len() != n {
            return Err(format!(
                "scaler shape mismatch: {} names, {} means, {} scales",
                n,
                self.mean.len(),
                self.scale.len()
            ));
        }
        if self.mean.iter().chain(&self.scale).any(|v| !v.is_finite()) {
            return Err("scaler contains non-finite parameters".to_string());
        }
        Ok(())
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    /// Confirm a feature vector has exactly the columns, in order, this
    /// scaler was fit on.
    pub fn check_features(&self, features: &FeatureVector) -> ServingResult<()> {
        if features.len() != self.n_features() {
            return Err(ServingError::FeatureMismatch(format!(
                "built {} features, scaler expects {}",
                features.len(),
                self.n_features()
            )));
        }
        for (i, (built, fitted)) in features.names().iter().zip(&self.feature_names).enumerate() {
            if *built != fitted.as_str() {
                return Err(ServingError::FeatureMismatch(format!(
                    "slot {i} is {built}, scaler was fit on {fitted}"
                )));
            }
        }
        Ok(())
    }

    /// Scale raw values. Zero scales are treated as 1, matching how constant
    /// columns were handled at fit time.
    pub fn transform(&self, values: &[f64]) -> ServingResult<Vec<f64>> {
        self.check_len(values)?;
        Ok(values
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(x, (mean, scale))| (x - mean) / effective_scale(*scale))
            .collect())
    }

    /// Undo [`Self::transform`].
    pub fn inverse_transform(&self, scaled: &[f64]) -> ServingResult<Vec<f64>> {
        self.check_len(scaled)?;
        Ok(scaled
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(z, (mean, scale))| z * effective_scale(*scale) + mean)
            .collect())
    }

    fn check_len(&self, values: &[f64]) -> ServingResult<()> {
        if values.len() != self.n_features() {
            return Err(ServingError::FeatureMismatch(format!(
                "got {} values, scaler expects {}",
                values.len(),
                self.n_features()
            )));
        }
        Ok(())
    }
}

fn effective_scale(scale: f64) -> f64 {
    if scale == 0.0 {
        1.0
    } else {
        scale
    }
}
