//! Regulatory overrides applied before the model is consulted.
//!
//! Deposit products cannot churn, and a current account with no transaction
//! for a year is already churned. Both outcomes are decided here and the model
//! is skipped.

use crate::config::RulesConfig;
use crate::schema;
use crate::types::customer::CustomerRecord;
use crate::types::prediction::{PredictionResult, RiskLevelThresholds};
use serde_json::Value;
use tracing::debug;

/// Override evaluator built from `[rules]`.
#[derive(Debug, Clone)]
pub struct BusinessRules {
    config: RulesConfig,
}

impl BusinessRules {
    pub fn new(config: RulesConfig) -> Self {
        Self { config }
    }

    /// Rules that never fire.
    pub fn disabled() -> Self {
        Self::new(RulesConfig {
            enabled: false,
            ..RulesConfig::default()
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// The overriding result for `record`, or `None` when the model decides.
    pub fn evaluate(
        &self,
        record: &CustomerRecord,
        thresholds: &RiskLevelThresholds,
    ) -> Option<PredictionResult> {
        if !self.config.enabled {
            return None;
        }

        let account_type = record
            .resolve(schema::ACCOUNT_TYPE)
            .and_then(Value::as_str)
            .map(str::trim)?;

        if self.matches(&self.config.non_churnable_account_types, account_type) {
            debug!(account_type = %account_type, "Non-churnable account type, model skipped");
            return Some(
                PredictionResult::from_probability(0.0, 0, thresholds)
                    .with_note(format!("{account_type} accounts cannot churn per BNR regulations")),
            );
        }

        if self.matches(&self.config.dormant_account_types, account_type) {
            let days = record
                .resolve(schema::DAYS_SINCE_LAST_TRANSACTION)
                .and_then(days_value)
                .unwrap_or(0.0);
            if days >= f64::from(self.config.dormant_days) {
                debug!(account_type = %account_type, days = days, "Dormant account, model skipped");
                return Some(
                    PredictionResult::from_probability(self.config.dormant_probability, 1, thresholds)
                        .with_note(format!(
                            "No transaction in {} days - already churned per BK rules",
                            self.config.dormant_days
                        )),
                );
            }
        }

        None
    }

    fn matches(&self, types: &[String], account_type: &str) -> bool {
        types.iter().any(|t| t == account_type)
    }
}

impl Default for BusinessRules {
    fn default() -> Self {
        Self::new(RulesConfig::default())
    }
}

fn days_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
