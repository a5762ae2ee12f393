//! Prompt assembly for one extraction attempt

use crate::error::AttemptError;
use crate::schema::ExtractionSchema;
use sift_domain::{PromptPayload, Record};
use tracing::warn;

/// Builds the request sent to the inference service for one record
pub struct PromptBuilder<'a> {
    record: &'a Record,
    schema: &'a ExtractionSchema,
    instructions: Option<&'a str>,
    previous_error: Option<&'a AttemptError>,
    max_text_length: usize,
}

impl<'a> PromptBuilder<'a> {
    /// Create a new prompt builder
    pub fn new(record: &'a Record, schema: &'a ExtractionSchema) -> Self {
        Self {
            record,
            schema,
            instructions: None,
            previous_error: None,
            max_text_length: usize::MAX,
        }
    }

    /// Replace the built-in instruction preamble
    pub fn with_instructions(mut self, instructions: Option<&'a str>) -> Self {
        self.instructions = instructions;
        self
    }

    /// Include the previous attempt's error so the service can correct itself
    pub fn with_previous_error(mut self, error: Option<&'a AttemptError>) -> Self {
        self.previous_error = error;
        self
    }

    /// Cap the characters of record text included in the prompt
    pub fn with_max_text_length(mut self, max_text_length: usize) -> Self {
        self.max_text_length = max_text_length;
        self
    }

    /// Build the request for the given attempt number
    pub fn build(&self, attempt: u32) -> PromptPayload {
        PromptPayload {
            record_id: self.record.id().clone(),
            attempt,
            system: self.build_system(),
            prompt: self.build_prompt(),
        }
    }

    fn build_system(&self) -> String {
        let mut system = String::new();

        // 1. Instructions
        system.push_str(self.instructions.unwrap_or(EXTRACTION_INSTRUCTIONS));
        system.push_str("\n\n");

        // 2. Expected structure
        system.push_str("Expected JSON structure:\n");
        system.push_str(&self.schema.describe());
        system.push_str("\n\n");

        // 3. Output rules
        system.push_str(OUTPUT_FORMAT_REMINDER);
        system
    }

    fn build_prompt(&self) -> String {
        let mut prompt = String::new();
        let mut budget = self.max_text_length;

        prompt.push_str(&format!("Record: {}\n\n", self.record.id()));

        for blob in self.record.texts().iter().filter(|blob| !blob.is_blank()) {
            let text = blob.text.trim();
            let (text, truncated) = truncate_chars(text, budget);
            if truncated {
                warn!(
                    record_id = %self.record.id(),
                    column = %blob.column,
                    max_text_length = self.max_text_length,
                    "Record text truncated"
                );
            }
            budget = budget.saturating_sub(text.chars().count());

            prompt.push_str(&format!("[{}]\n---\n{}\n---\n\n", blob.column, text));
        }

        if let Some(error) = self.previous_error {
            prompt.push_str("Your previous response was rejected:\n");
            prompt.push_str(&error.to_string());
            prompt.push_str("\nReturn a corrected JSON object that fixes every problem listed.\n");
        }

        prompt
    }
}

/// Cut `text` to at most `max_chars` characters, on a character boundary
fn truncate_chars(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => (&text[..byte_idx], true),
        None => (text, false),
    }
}

const EXTRACTION_INSTRUCTIONS: &str = r#"You analyze customer interaction records (call transcripts, chat logs, agent notes) and label them for analytics.

Rules:
- Base every label only on the text provided
- When the text does not support a value for an optional field, use null
- Scores are whole numbers unless the structure says otherwise
- Keep free-text fields short and factual"#;

const OUTPUT_FORMAT_REMINDER: &str = r#"Output format: a single JSON object with exactly the sections and fields above.
Return ONLY valid JSON, no markdown code blocks, no explanations."#;
