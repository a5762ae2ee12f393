//! Expected payload structure and its validation
//!
//! A schema is a list of named sections, each holding typed fields. The
//! service must answer with a JSON object keyed by section name, each section
//! an object keyed by field name:
//!
//! ```json
//! {
//!   "classification": { "sentiment": "negative", "resolution_status": "escalated" },
//!   "scores": { "customer_satisfaction": 2 }
//! }
//! ```
//!
//! Every field becomes one output column named after the field.

use crate::error::{AttemptError, ExtractorError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sift_domain::{ExtractionResult, FieldValue, RecordId};
use std::collections::HashSet;

/// Output column holding the success flag
pub const SUCCESS_COLUMN: &str = "extraction_success";

/// Output column holding the failure reason
pub const ERROR_COLUMN: &str = "extraction_error";

/// Type and constraints of one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    /// Free text, optionally bounded in characters
    Text {
        /// Maximum length in characters
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_length: Option<usize>,
    },

    /// Whole number within an inclusive range
    Integer {
        /// Inclusive lower bound
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<i64>,
        /// Inclusive upper bound
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<i64>,
    },

    /// Floating point number within an inclusive range
    Number {
        /// Inclusive lower bound
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        /// Inclusive upper bound
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },

    /// One label out of a fixed set (matched case-insensitively)
    Category {
        /// Allowed labels
        values: Vec<String>,
    },

    /// true / false
    Boolean,
}

/// One field of a section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Field name, also the output column name
    pub name: String,

    /// Type and constraints
    #[serde(flatten)]
    pub kind: FieldKind,

    /// Whether the field must be present and non-null
    #[serde(default = "default_true")]
    pub required: bool,

    /// Hint rendered into the prompt
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// A named group of fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionSpec {
    /// Section key in the payload
    pub name: String,

    /// Fields of the section
    pub fields: Vec<FieldSpec>,
}

/// Expected structure of an extraction payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionSchema {
    /// Sections in output order
    pub sections: Vec<SectionSpec>,
}

fn default_true() -> bool {
    true
}

impl FieldSpec {
    fn new(name: &str, kind: FieldKind, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            required: true,
            description: description.to_string(),
        }
    }

    fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Check a raw JSON value against this field, producing the typed value
    fn check(&self, value: &Value) -> Result<FieldValue, String> {
        match &self.kind {
            FieldKind::Text { max_length } => {
                let text = value
                    .as_str()
                    .ok_or_else(|| format!("'{}' must be a string", self.name))?;
                if self.required && text.trim().is_empty() {
                    return Err(format!("'{}' must not be empty", self.name));
                }
                if let Some(max) = max_length {
                    let len = text.chars().count();
                    if len > *max {
                        return Err(format!(
                            "'{}' is {} characters (max: {})",
                            self.name, len, max
                        ));
                    }
                }
                Ok(FieldValue::Text(text.trim().to_string()))
            }
            FieldKind::Integer { min, max } => {
                let number = value
                    .as_i64()
                    .or_else(|| {
                        value
                            .as_f64()
                            .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                            .map(|f| f as i64)
                    })
                    .ok_or_else(|| format!("'{}' must be an integer", self.name))?;
                if min.is_some_and(|min| number < min) || max.is_some_and(|max| number > max) {
                    return Err(format!(
                        "'{}' value {} out of range {}",
                        self.name,
                        number,
                        describe_range(min.map(|v| v as f64), max.map(|v| v as f64))
                    ));
                }
                Ok(FieldValue::Integer(number))
            }
            FieldKind::Number { min, max } => {
                let number = value
                    .as_f64()
                    .ok_or_else(|| format!("'{}' must be a number", self.name))?;
                if min.is_some_and(|min| number < min) || max.is_some_and(|max| number > max) {
                    return Err(format!(
                        "'{}' value {} out of range {}",
                        self.name,
                        number,
                        describe_range(*min, *max)
                    ));
                }
                Ok(FieldValue::Number(number))
            }
            FieldKind::Category { values } => {
                let label = value
                    .as_str()
                    .ok_or_else(|| format!("'{}' must be a string label", self.name))?;
                values
                    .iter()
                    .find(|allowed| allowed.eq_ignore_ascii_case(label.trim()))
                    .map(|allowed| FieldValue::Text(allowed.clone()))
                    .ok_or_else(|| {
                        format!(
                            "'{}' value '{}' is not one of [{}]",
                            self.name,
                            label,
                            values.join(", ")
                        )
                    })
            }
            FieldKind::Boolean => value
                .as_bool()
                .map(FieldValue::Boolean)
                .ok_or_else(|| format!("'{}' must be true or false", self.name)),
        }
    }

    /// Prompt rendering of the field's expected value
    fn describe(&self) -> String {
        let shape = match &self.kind {
            FieldKind::Text { max_length: Some(max) } => format!("string (max {} chars)", max),
            FieldKind::Text { max_length: None } => "string".to_string(),
            FieldKind::Integer { min, max } => format!(
                "integer {}",
                describe_range(min.map(|v| v as f64), max.map(|v| v as f64))
            ),
            FieldKind::Number { min, max } => format!("number {}", describe_range(*min, *max)),
            FieldKind::Category { values } => format!(
                "one of [{}]",
                values
                    .iter()
                    .map(|v| format!("\"{}\"", v))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            FieldKind::Boolean => "true or false".to_string(),
        };
        let requirement = if self.required { "required" } else { "optional, may be null" };
        if self.description.is_empty() {
            format!("\"{}\": {} ({})", self.name, shape, requirement)
        } else {
            format!(
                "\"{}\": {} ({}) - {}",
                self.name, shape, requirement, self.description
            )
        }
    }
}

fn describe_range(min: Option<f64>, max: Option<f64>) -> String {
    match (min, max) {
        (Some(min), Some(max)) => format!("[{}, {}]", min, max),
        (Some(min), None) => format!(">= {}", min),
        (None, Some(max)) => format!("<= {}", max),
        (None, None) => "(any)".to_string(),
    }
}

impl ExtractionSchema {
    /// Built-in schema for customer interaction transcripts
    pub fn interaction_default() -> Self {
        Self {
            sections: vec![
                SectionSpec {
                    name: "classification".to_string(),
                    fields: vec![
                        FieldSpec::new(
                            "sentiment",
                            FieldKind::Category {
                                values: vec![
                                    "positive".to_string(),
                                    "neutral".to_string(),
                                    "negative".to_string(),
                                    "mixed".to_string(),
                                ],
                            },
                            "overall customer sentiment",
                        ),
                        FieldSpec::new(
                            "primary_topic",
                            FieldKind::Text { max_length: Some(80) },
                            "short label for the main reason for contact",
                        ),
                        FieldSpec::new(
                            "resolution_status",
                            FieldKind::Category {
                                values: vec![
                                    "resolved".to_string(),
                                    "unresolved".to_string(),
                                    "escalated".to_string(),
                                ],
                            },
                            "state of the issue at the end of the interaction",
                        ),
                    ],
                },
                SectionSpec {
                    name: "scores".to_string(),
                    fields: vec![
                        FieldSpec::new(
                            "customer_satisfaction",
                            FieldKind::Integer { min: Some(1), max: Some(5) },
                            "1 = very dissatisfied, 5 = very satisfied",
                        ),
                        FieldSpec::new(
                            "agent_empathy",
                            FieldKind::Integer { min: Some(1), max: Some(5) },
                            "how well the agent acknowledged the customer",
                        ),
                        FieldSpec::new(
                            "churn_risk",
                            FieldKind::Number { min: Some(0.0), max: Some(1.0) },
                            "probability the customer leaves",
                        )
                        .optional(),
                    ],
                },
                SectionSpec {
                    name: "summary".to_string(),
                    fields: vec![
                        FieldSpec::new(
                            "summary",
                            FieldKind::Text { max_length: Some(500) },
                            "one or two sentences",
                        ),
                        FieldSpec::new(
                            "follow_up_required",
                            FieldKind::Boolean,
                            "whether someone must contact the customer again",
                        ),
                    ],
                },
            ],
        }
    }

    /// Output column names in schema order
    pub fn columns(&self) -> Vec<&str> {
        self.sections
            .iter()
            .flat_map(|section| section.fields.iter().map(|field| field.name.as_str()))
            .collect()
    }

    /// Check that the schema itself is usable
    pub fn validate_definition(&self) -> Result<(), ExtractorError> {
        if self.sections.is_empty() {
            return Err(ExtractorError::Schema("schema has no sections".to_string()));
        }

        let mut section_names = HashSet::new();
        let mut field_names = HashSet::new();

        for section in &self.sections {
            if section.name.trim().is_empty() {
                return Err(ExtractorError::Schema("section name is empty".to_string()));
            }
            if !section_names.insert(section.name.as_str()) {
                return Err(ExtractorError::Schema(format!(
                    "duplicate section '{}'",
                    section.name
                )));
            }
            if section.fields.is_empty() {
                return Err(ExtractorError::Schema(format!(
                    "section '{}' has no fields",
                    section.name
                )));
            }

            for field in &section.fields {
                if field.name.trim().is_empty() {
                    return Err(ExtractorError::Schema(format!(
                        "section '{}' has a field with an empty name",
                        section.name
                    )));
                }
                if field.name == SUCCESS_COLUMN || field.name == ERROR_COLUMN {
                    return Err(ExtractorError::Schema(format!(
                        "field name '{}' is reserved",
                        field.name
                    )));
                }
                if !field_names.insert(field.name.as_str()) {
                    return Err(ExtractorError::Schema(format!(
                        "duplicate field '{}'",
                        field.name
                    )));
                }
                validate_kind(field)?;
            }
        }

        Ok(())
    }

    /// Validate a parsed payload, producing the typed result for `record_id`
    ///
    /// All violations are collected and reported together so the next
    /// attempt's prompt can address every problem at once.
    pub fn validate_payload(
        &self,
        record_id: &RecordId,
        payload: &Map<String, Value>,
    ) -> Result<ExtractionResult, AttemptError> {
        let mut result = ExtractionResult::new(record_id.clone());
        let mut violations = Vec::new();

        for section in &self.sections {
            let body = match payload.get(&section.name) {
                Some(Value::Object(body)) => Some(body),
                Some(Value::Null) | None => {
                    if section.fields.iter().any(|f| f.required) {
                        violations.push(format!("missing section '{}'", section.name));
                    }
                    None
                }
                Some(_) => {
                    violations.push(format!("section '{}' must be an object", section.name));
                    None
                }
            };

            let Some(body) = body else {
                continue;
            };

            for field in &section.fields {
                match body.get(&field.name) {
                    None | Some(Value::Null) => {
                        if field.required {
                            violations.push(format!(
                                "missing required field '{}.{}'",
                                section.name, field.name
                            ));
                        }
                    }
                    Some(value) => match field.check(value) {
                        Ok(typed) => result.push(field.name.clone(), typed),
                        Err(violation) => violations.push(violation),
                    },
                }
            }
        }

        if violations.is_empty() {
            Ok(result)
        } else {
            Err(AttemptError::validation(violations.join("; ")))
        }
    }

    /// Render the expected structure for inclusion in a prompt
    pub fn describe(&self) -> String {
        let mut out = String::from("{\n");
        for (idx, section) in self.sections.iter().enumerate() {
            out.push_str(&format!("  \"{}\": {{\n", section.name));
            for field in &section.fields {
                out.push_str(&format!("    {}\n", field.describe()));
            }
            out.push_str("  }");
            if idx + 1 < self.sections.len() {
                out.push(',');
            }
            out.push('\n');
        }
        out.push('}');
        out
    }
}

impl Default for ExtractionSchema {
    fn default() -> Self {
        Self::interaction_default()
    }
}

fn validate_kind(field: &FieldSpec) -> Result<(), ExtractorError> {
    let inverted = match &field.kind {
        FieldKind::Integer { min: Some(min), max: Some(max) } => min > max,
        FieldKind::Number { min: Some(min), max: Some(max) } => min > max,
        FieldKind::Category { values } if values.is_empty() => {
            return Err(ExtractorError::Schema(format!(
                "category field '{}' has no allowed values",
                field.name
            )));
        }
        FieldKind::Text { max_length: Some(0) } => {
            return Err(ExtractorError::Schema(format!(
                "text field '{}' has max_length 0",
                field.name
            )));
        }
        _ => false,
    };
    if inverted {
        return Err(ExtractorError::Schema(format!(
            "field '{}' has min greater than max",
            field.name
        )));
    }
    Ok(())
}
