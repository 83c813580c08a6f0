//! Model interface shared by every candidate backend.

use crate::error::ServingResult;
use crate::models::explain::ExplainError;

/// What a loaded model can do, checked once by the loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModelCapabilities {
    /// Exposes a usable P(churn = 1). Models without it are never selected.
    pub probability: bool,
    /// Exposes a global feature-importance vector.
    pub feature_importances: bool,
    /// Exposes per-instance signed attributions.
    pub attribution: bool,
}

/// Per-instance attribution as produced by a backend.
#[derive(Debug, Clone, PartialEq)]
pub enum Attribution {
    /// One vector, already for the churn class.
    Single(Vec<f64>),
    /// One vector per class, indexed by class label.
    PerClass(Vec<Vec<f64>>),
}

impl Attribution {
    /// Vector for the positive (churn = 1) class.
    pub fn into_positive_class(self) -> Option<Vec<f64>> {
        match self {
            Attribution::Single(values) => Some(values),
            Attribution::PerClass(mut per_class) => {
                if per_class.len() > 1 {
                    Some(per_class.swap_remove(1))
                } else {
                    per_class.pop()
                }
            }
        }
    }
}

/// A trained churn classifier.
///
/// Inputs are always scaled feature vectors in schema order.
pub trait ChurnModel: Send + Sync {
    fn name(&self) -> &str;

    fn capabilities(&self) -> ModelCapabilities;

    /// Probability mass on the churn = 1 class.
    fn predict_proba(&self, features: &[f64]) -> ServingResult<f64>;

    /// Hard class label.
    fn predict(&self, features: &[f64]) -> ServingResult<u8> {
        Ok(u8::from(self.predict_proba(features)? > 0.5))
    }

    fn feature_importances(&self) -> Option<Vec<f64>> {
        None
    }

    fn attribution(&self, _features: &[f64]) -> Result<Attribution, ExplainError> {
        Err(ExplainError::Unsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Constant(f64);

    impl ChurnModel for Constant {
        fn name(&self) -> &str {
            "constant"
        }

        fn capabilities(&self) -> ModelCapabilities {
            ModelCapabilities {
                probability: true,
                ..Default::default()
            }
        }

        fn predict_proba(&self, _features: &[f64]) -> ServingResult<f64> {
            Ok(self.0)
        }
    }

    #[test]
    fn test_default_predict_thresholds_at_half() {
        assert_eq!(Constant(0.5).predict(&[]).unwrap(), 0);
        assert_eq!(Constant(0.51).predict(&[]).unwrap(), 1);
        assert!(Constant(0.9).feature_importances().is_none());
        assert!(matches!(
            Constant(0.9).attribution(&[]),
            Err(ExplainError::Unsupported)
        ));
    }

    #[test]
    fn test_positive_class_selection() {
        let per_class = Attribution::PerClass(vec![vec![-0.2, 0.1], vec![0.2, -0.1]]);
        assert_eq!(per_class.into_positive_class(), Some(vec![0.2, -0.1]));
        assert_eq!(
            Attribution::Single(vec![0.3]).into_positive_class(),
            Some(vec![0.3])
        );
        assert_eq!(Attribution::PerClass(vec![]).into_positive_class(), None);
    }
}
