//! Feature extraction for churn model inference.
//!
//! Maps an arbitrarily shaped customer record onto the exact ordered feature
//! vector the scaler and models were fit on. Extraction never fails: missing or
//! malformed inputs degrade to typed defaults, so bad input yields a plausible
//! score rather than an error. Callers that need strict validation must do it
//! upstream.

use crate::encoding::{CategoricalEncoders, FALLBACK_CODE};
use crate::normalize::{normalize_amount, normalize_date, normalize_transaction_value};
use crate::schema::{self, FEATURE_COUNT, FEATURE_NAMES};
use crate::types::customer::CustomerRecord;
use chrono::Datelike;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

/// Ordered feature values in [`FEATURE_NAMES`] order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    values: Vec<f64>,
}

impl FeatureVector {
    /// Wrap raw values; `None` unless exactly [`FEATURE_COUNT`] are given.
    pub fn from_values(values: Vec<f64>) -> Option<Self> {
        (values.len() == FEATURE_COUNT).then_some(Self { values })
    }

    pub fn names(&self) -> &'static [&'static str] {
        &FEATURE_NAMES
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        FEATURE_NAMES
            .iter()
            .position(|n| *n == name)
            .map(|i| self.values[i])
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `(name, value)` pairs in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        FEATURE_NAMES.iter().copied().zip(self.values.iter().copied())
    }
}

/// Feature extractor that transforms customer records into model input features.
///
/// Matches the preprocessing done by the training pipeline.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    encoders: Arc<CategoricalEncoders>,
}

impl FeatureExtractor {
    /// Create a new feature extractor over a fitted encoder bundle.
    pub fn new(encoders: Arc<CategoricalEncoders>) -> Self {
        Self { encoders }
    }

    /// Extract features from a customer record.
    pub fn extract(&self, record: &CustomerRecord) -> FeatureVector {
        let mut cells = reconcile_names(record);

        clean_monetary(&mut cells);
        derive_date_features(&mut cells);
        self.encode_categoricals(&mut cells);

        let mut defaulted = 0usize;
        let values = FEATURE_NAMES
            .iter()
            .map(|&name| {
                let base = schema::base_name(name);
                let cell = cells.get(name).or_else(|| {
                    if base != name {
                        cells.get(base)
                    } else {
                        None
                    }
                });
                match cell {
                    // present but empty or unparseable: filled with 0
                    Some(value) => numeric_value(value).unwrap_or(0.0),
                    None => {
                        defaulted += 1;
                        schema::default_value(name)
                    }
                }
            })
            .collect();

        debug!(
            input_fields = record.len(),
            defaulted = defaulted,
            "Features extracted"
        );

        FeatureVector { values }
    }

    /// Get the number of features produced.
    pub fn feature_count(&self) -> usize {
        FEATURE_COUNT
    }

    /// Get feature names in model order.
    pub fn feature_names(&self) -> &'static [&'static str] {
        &FEATURE_NAMES
    }

    fn encode_categoricals(&self, cells: &mut Map<String, Value>) {
        for field in schema::CATEGORICAL_FIELDS {
            let Some(raw) = cells.get(field) else {
                continue;
            };
            let code = match category_label(raw) {
                Some(label) => self.encoders.encode(field, &label),
                None => FALLBACK_CODE,
            };
            cells.insert(format!("{field}{}", schema::ENCODED_SUFFIX), Value::from(code));
        }
    }
}

/// Copy aliased input keys onto their canonical names. An existing canonical
/// key is never overwritten.
fn reconcile_names(record: &CustomerRecord) -> Map<String, Value> {
    let mut cells = record.fields().clone();
    for (canonical, _) in schema::FIELD_ALIASES {
        if cells.contains_key(*canonical) {
            continue;
        }
        if let Some(value) = record.resolve(canonical) {
            cells.insert((*canonical).to_string(), value.clone());
        }
    }
    cells
}

fn clean_monetary(cells: &mut Map<String, Value>) {
    if let Some(raw) = cells.get(schema::BALANCE) {
        let cleaned = normalize_amount(raw);
        cells.insert(schema::BALANCE.to_string(), Value::from(cleaned));
    }
    if let Some(raw) = cells.get(schema::AVERAGE_TRANSACTION_VALUE) {
        let cleaned = normalize_transaction_value(raw);
        cells.insert(
            schema::AVERAGE_TRANSACTION_VALUE.to_string(),
            Value::from(cleaned),
        );
    }
}

/// Month/year slots come from the parsed date, or 0 when it did not parse.
fn derive_date_features(cells: &mut Map<String, Value>) {
    for (date_field, month_slot, year_slot) in schema::DATE_FIELDS {
        let parsed = cells.get(date_field).and_then(normalize_date);
        let (month, year) = match parsed {
            Some(date) => (i64::from(date.month()), i64::from(date.year())),
            None => (0, 0),
        };
        cells.insert(month_slot.to_string(), Value::from(month));
        cells.insert(year_slot.to_string(), Value::from(year));
    }
}

/// String form used for encoder lookup; `None` for null.
fn category_label(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(if *b { "True" } else { "False" }.to_string()),
        other => Some(other.to_string()),
    }
}

fn numeric_value(value: &Value) -> Option<f64> {
    let v = match value {
        Value::Number(n) => n.as_f64()?,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    v.is_finite().then_some(v)
}
