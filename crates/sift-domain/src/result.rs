//! Extraction result module - typed output for one record

use crate::RecordId;
use std::fmt;

/// A single typed value produced by extraction
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Free text or a category label
    Text(String),

    /// Whole number (scores, counts)
    Integer(i64),

    /// Floating point number (probabilities, ratios)
    Number(f64),

    /// Yes/no flag
    Boolean(bool),
}

impl FieldValue {
    /// Name of the value's type, as used in validation messages
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Text(_) => "text",
            FieldValue::Integer(_) => "integer",
            FieldValue::Number(_) => "number",
            FieldValue::Boolean(_) => "boolean",
        }
    }
}

impl fmt::Display for FieldValue {
    /// Cell rendering used by the output dataset
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(value) => f.write_str(value),
            FieldValue::Integer(value) => write!(f, "{}", value),
            FieldValue::Number(value) => write!(f, "{}", value),
            FieldValue::Boolean(value) => write!(f, "{}", value),
        }
    }
}

/// Structured, schema-validated output for one record
///
/// Fields are kept in schema order; optional fields the service omitted are
/// simply absent.
///
/// # Examples
///
/// ```
/// use sift_domain::{ExtractionResult, FieldValue};
///
/// let result = ExtractionResult::new("12")
///     .with_field("sentiment", FieldValue::Text("negative".into()))
///     .with_field("satisfaction", FieldValue::Integer(2));
///
/// assert_eq!(result.len(), 2);
/// assert_eq!(result.get("satisfaction"), Some(&FieldValue::Integer(2)));
/// assert_eq!(result.get("missing"), None);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionResult {
    /// Record this result belongs to
    pub record_id: RecordId,

    /// Named field values in schema order
    pub fields: Vec<(String, FieldValue)>,
}

impl ExtractionResult {
    /// Create an empty result for a record
    pub fn new(record_id: impl Into<RecordId>) -> Self {
        Self {
            record_id: record_id.into(),
            fields: Vec::new(),
        }
    }

    /// Append a field (builder style)
    pub fn with_field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.fields.push((name.into(), value));
        self
    }

    /// Append a field
    pub fn push(&mut self, name: impl Into<String>, value: FieldValue) {
        self.fields.push((name.into(), value));
    }

    /// Look up a field by name
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    /// Number of fields present
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether no fields are present
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
