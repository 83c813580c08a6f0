//! Prediction result data structures

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Risk level classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Bucket a churn probability.
    ///
    /// Comparisons are strict: a probability exactly on a threshold falls
    /// into the lower bucket.
    pub fn from_probability(probability: f64, thresholds: &RiskLevelThresholds) -> Self {
        if probability > thresholds.high {
            RiskLevel::High
        } else if probability > thresholds.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configurable risk level thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskLevelThresholds {
    /// Probabilities above this are at least medium risk
    pub medium: f64,
    /// Probabilities above this are high risk
    pub high: f64,
}

impl Default for RiskLevelThresholds {
    fn default() -> Self {
        Self {
            medium: 0.4,
            high: 0.7,
        }
    }
}

/// Direction in which a feature moved the churn score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Increases,
    Decreases,
}

/// One entry of a ranked explanation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureAttribution {
    /// Display name, e.g. `Days Since Last Transaction`
    pub feature: String,
    /// `|value| * 100`, one decimal
    pub impact: f64,
    pub direction: Direction,
    /// Signed raw value, four decimals
    pub value: f64,
}

/// Scoring output for a single customer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// P(churn = 1), 0.0 - 1.0
    pub churn_probability: f64,
    /// Hard class from the model, 0 or 1
    pub churn_prediction: u8,
    /// Probability on a 0 - 100 scale, one decimal
    pub churn_score: f64,
    pub risk_level: RiskLevel,
    /// Ranked attributions, present only when requested and computable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shap_values: Option<Vec<FeatureAttribution>>,
    /// Set when a business rule decided the outcome instead of the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl PredictionResult {
    /// Build a result from a probability and the model's hard class.
    pub fn from_probability(
        churn_probability: f64,
        churn_prediction: u8,
        thresholds: &RiskLevelThresholds,
    ) -> Self {
        Self {
            churn_probability,
            churn_prediction,
            churn_score: churn_score(churn_probability),
            risk_level: RiskLevel::from_probability(churn_probability, thresholds),
            shap_values: None,
            note: None,
        }
    }

    pub fn with_shap_values(mut self, shap_values: Vec<FeatureAttribution>) -> Self {
        self.shap_values = Some(shap_values);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// `probability * 100` rounded to one decimal, halves away from zero.
pub fn churn_score(probability: f64) -> f64 {
    round_to(probability * 100.0, 1)
}

/// Round to `decimals` places, halves away from zero.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// One slot of a batch response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BatchEntry {
    Scored {
        customer_id: Value,
        #[serde(flatten)]
        prediction: PredictionResult,
    },
    Failed {
        customer_id: Value,
        error: String,
    },
}

impl BatchEntry {
    pub fn customer_id(&self) -> &Value {
        match self {
            BatchEntry::Scored { customer_id, .. } | BatchEntry::Failed { customer_id, .. } => {
                customer_id
            }
        }
    }

    pub fn prediction(&self) -> Option<&PredictionResult> {
        match self {
            BatchEntry::Scored { prediction, .. } => Some(prediction),
            BatchEntry::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            BatchEntry::Scored { .. } => None,
            BatchEntry::Failed { error, .. } => Some(error),
        }
    }
}
