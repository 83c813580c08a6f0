//! Fitted label encoders for categorical columns.
//!
//! The bundle file maps each column to its fitted class list, e.g.
//! `{"Gender": ["Female", "Male"], "Branch": ["Huye", "Kigali", "Musanze"]}`.
//! A class's code is its position in that list.

use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

/// Code returned for unknown columns and unseen categories.
pub const FALLBACK_CODE: i64 = 0;

/// Label encoder for a single categorical column.
#[derive(Debug, Clone, Default)]
pub struct LabelEncoder {
    classes: Vec<String>,
    index: HashMap<String, i64>,
}

impl LabelEncoder {
    /// Build an encoder from classes in fitted order.
    pub fn new(classes: Vec<String>) -> Self {
        let mut index = HashMap::with_capacity(classes.len());
        for (code, class) in classes.iter().enumerate() {
            // first occurrence keeps its code if the file repeats a class
            index.entry(class.clone()).or_insert(code as i64);
        }
        Self { classes, index }
    }

    /// Code for `category`, or `None` when the encoder never saw it.
    pub fn transform(&self, category: &str) -> Option<i64> {
        self.index.get(category).copied()
    }

    /// Class for a code.
    pub fn inverse_transform(&self, code: i64) -> Option<&str> {
        usize::try_from(code)
            .ok()
            .and_then(|i| self.classes.get(i))
            .map(String::as_str)
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }
}

impl<'de> Deserialize<'de> for LabelEncoder {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Vec::<String>::deserialize(deserializer).map(LabelEncoder::new)
    }
}

/// Per-column encoder bundle shared read-only by every prediction.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct CategoricalEncoders {
    encoders: HashMap<String, LabelEncoder>,
}

impl CategoricalEncoders {
    pub fn new(encoders: HashMap<String, LabelEncoder>) -> Self {
        Self { encoders }
    }

    /// Parse a bundle from its JSON form.
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    /// Encode `raw` for `column`.
    ///
    /// A column without a fitted encoder and a category the encoder never saw
    /// both map to [`FALLBACK_CODE`], which is indistinguishable from the first
    /// trained class. One unknown value must not block scoring.
    pub fn encode(&self, column: &str, raw: &str) -> i64 {
        let Some(encoder) = self.encoders.get(column) else {
            debug!(column = %column, "No fitted encoder for column, using fallback code");
            return FALLBACK_CODE;
        };
        encoder.transform(raw).unwrap_or_else(|| {
            debug!(column = %column, category = %raw, "Unseen category, using fallback code");
            FALLBACK_CODE
        })
    }

    pub fn get(&self, column: &str) -> Option<&LabelEncoder> {
        self.encoders.get(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.encoders.contains_key(column)
    }

    pub fn len(&self) -> usize {
        self.encoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.encoders.is_empty()
    }
}
