//! Customer records and request envelopes.

use crate::error::{ServingError, ServingResult};
use crate::schema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keys checked, in order, for a customer identifier.
const CUSTOMER_ID_KEYS: [&str; 3] = ["customer_id", "Customer_ID", "id"];

/// A customer record in whatever shape the caller sent it.
///
/// Field names may use any casing or separator convention; [`Self::resolve`]
/// reconciles them against the canonical schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerRecord {
    fields: Map<String, Value>,
}

impl CustomerRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Add or replace a field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Raw lookup by exact key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Look up a canonical field, falling back to its aliases.
    ///
    /// The canonical key wins when both it and an alias are present.
    pub fn resolve(&self, canonical: &str) -> Option<&Value> {
        self.fields.get(canonical).or_else(|| {
            schema::aliases_for(canonical)
                .iter()
                .find_map(|alias| self.fields.get(*alias))
        })
    }

    /// Customer identifier echoed back in batch results.
    pub fn customer_id(&self) -> Value {
        CUSTOMER_ID_KEYS
            .iter()
            .filter_map(|key| self.fields.get(*key))
            .find(|v| !v.is_null())
            .cloned()
            .unwrap_or(Value::Null)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl From<Map<String, Value>> for CustomerRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self::new(fields)
    }
}

/// Parsed request payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ScoringRequest {
    /// One record, as a bare object or `{customer_data, include_shap}`.
    Single {
        record: CustomerRecord,
        include_shap: bool,
    },
    /// A JSON array of records or `{customers: [...], include_shap}`.
    Batch {
        records: Vec<CustomerRecord>,
        include_shap: bool,
    },
}

impl ScoringRequest {
    /// Parse a request from raw JSON text.
    pub fn from_json(raw: &str) -> ServingResult<Self> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| ServingError::InputParse(format!("Invalid JSON input: {e}")))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> ServingResult<Self> {
        match value {
            Value::Array(items) => Ok(ScoringRequest::Batch {
                records: records_from(items)?,
                include_shap: false,
            }),
            Value::Object(mut obj) => {
                let include_shap = obj
                    .get("include_shap")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);

                if let Some(Value::Array(items)) = obj.remove("customers") {
                    return Ok(ScoringRequest::Batch {
                        records: records_from(items)?,
                        include_shap,
                    });
                }

                let record = match obj.remove("customer_data") {
                    Some(Value::Object(data)) => CustomerRecord::new(data),
                    Some(_) => {
                        return Err(ServingError::InputParse(
                            "customer_data must be a JSON object".to_string(),
                        ))
                    }
                    None => CustomerRecord::new(obj),
                };
                Ok(ScoringRequest::Single {
                    record,
                    include_shap,
                })
            }
            other => Err(ServingError::InputParse(format!(
                "Expected a JSON object or array, got {}",
                json_kind(&other)
            ))),
        }
    }
}

fn records_from(items: Vec<Value>) -> ServingResult<Vec<CustomerRecord>> {
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Object(fields) => Ok(CustomerRecord::new(fields)),
            other => Err(ServingError::InputParse(format!(
                "Batch entry {i} must be a JSON object, got {}",
                json_kind(&other)
            ))),
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
