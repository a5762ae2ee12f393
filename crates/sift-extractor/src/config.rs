//! Configuration for per-record extraction

use crate::error::AttemptErrorKind;
use crate::state::retryable;
use serde::{Deserialize, Serialize};

/// Configuration for the row state machine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Maximum gateway calls per record (including the first)
    pub max_attempts: u32,

    /// Whether schema validation failures consume the retry budget
    ///
    /// When false, a payload that parses but fails validation ends the row in
    /// `FAIL` immediately.
    pub retry_on_validation_error: bool,

    /// Maximum characters of record text sent per request; longer text is truncated
    pub max_text_length: usize,

    /// Optional replacement for the built-in instruction preamble
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

impl ExtractionConfig {
    /// Whether a failure of this kind may be retried under this configuration
    pub fn is_retryable(&self, kind: AttemptErrorKind) -> bool {
        retryable(kind, self.retry_on_validation_error)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("max_attempts must be at least 1".to_string());
        }
        if self.max_text_length == 0 {
            return Err("max_text_length must be greater than 0".to_string());
        }
        if let Some(instructions) = &self.instructions {
            if instructions.trim().is_empty() {
                return Err("instructions must not be blank when set".to_string());
            }
        }
        Ok(())
    }

    /// Aggressive preset: fewer retries, shorter prompts
    pub fn aggressive() -> Self {
        Self {
            max_attempts: 2,
            retry_on_validation_error: false,
            max_text_length: 8_000,
            instructions: None,
        }
    }

    /// Lenient preset: more retries, longer prompts
    pub fn lenient() -> Self {
        Self {
            max_attempts: 5,
            retry_on_validation_error: true,
            max_text_length: 50_000,
            instructions: None,
        }
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format!("Failed to parse TOML: {}", e))
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize to TOML: {}", e))
    }
}

impl Default for ExtractionConfig {
    /// Three attempts, one shared retry budget for all retryable failures
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_on_validation_error: true,
            max_text_length: 20_000,
            instructions: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_valid() {
        assert!(ExtractionConfig::default().validate().is_ok());
        assert!(ExtractionConfig::aggressive().validate().is_ok());
        assert!(ExtractionConfig::lenient().validate().is_ok());
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let config = ExtractionConfig {
            max_attempts: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_blank_instructions_rejected() {
        let config = ExtractionConfig {
            instructions: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_retryability() {
        let config = ExtractionConfig::default();
        assert!(config.is_retryable(AttemptErrorKind::Transport));
        assert!(config.is_retryable(AttemptErrorKind::Timeout));
        assert!(config.is_retryable(AttemptErrorKind::MalformedPayload));
        assert!(config.is_retryable(AttemptErrorKind::Validation));
        assert!(!config.is_retryable(AttemptErrorKind::EmptyInput));

        let strict = ExtractionConfig {
            retry_on_validation_error: false,
            ..Default::default()
        };
        assert!(!strict.is_retryable(AttemptErrorKind::Validation));
        assert!(strict.is_retryable(AttemptErrorKind::Transport));
    }

    #[test]
    fn test_toml_defaults_for_optional_keys() {
        let config = ExtractionConfig::from_toml(
            "max_attempts = 4\nmax_text_length = 1000\n",
        )
        .unwrap();
        assert_eq!(config.max_attempts, 4);
        assert!(config.retry_on_validation_error);
        assert!(config.instructions.is_none());
    }
}
