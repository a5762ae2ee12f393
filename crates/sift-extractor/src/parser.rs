//! Parse raw service output into a payload object

use crate::error::AttemptError;
use serde_json::{Map, Value};

/// Parse a raw response into a JSON object
///
/// Models sometimes wrap JSON in markdown code fences or surround it with
/// prose; both are tolerated. Anything that does not yield a JSON object is a
/// malformed payload.
pub fn parse_payload(response: &str) -> Result<Map<String, Value>, AttemptError> {
    let json_str = extract_json(response)?;

    let json: Value = serde_json::from_str(json_str)
        .map_err(|e| AttemptError::malformed(format!("JSON parse error: {}", e)))?;

    match json {
        Value::Object(map) => Ok(map),
        other => Err(AttemptError::malformed(format!(
            "Expected a JSON object, got {}",
            json_type(&other)
        ))),
    }
}

/// Extract the JSON text from a response, handling markdown code blocks
fn extract_json(response: &str) -> Result<&str, AttemptError> {
    let trimmed = response.trim();
    if trimmed.is_empty() {
        return Err(AttemptError::malformed("Response is empty"));
    }

    let unfenced = if trimmed.starts_with("```") {
        // Skip the opening fence line (```json or ```) and the closing fence
        let body = trimmed
            .split_once('\n')
            .map(|(_, rest)| rest)
            .ok_or_else(|| AttemptError::malformed("Empty code block"))?;
        body.trim_end().trim_end_matches("```").trim()
    } else {
        trimmed
    };

    if unfenced.starts_with('{') {
        return Ok(unfenced);
    }

    // Prose around the object: take the outermost braces
    match (unfenced.find('{'), unfenced.rfind('}')) {
        (Some(start), Some(end)) if start < end => Ok(&unfenced[start..=end]),
        _ => Ok(unfenced),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
