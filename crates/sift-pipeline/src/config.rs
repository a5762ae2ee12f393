//! Pipeline configuration
//!
//! Loaded from a TOML file with one table per concern:
//!
//! ```toml
//! [input]
//! path = "interactions.csv"
//! id_column = "id"
//! text_columns = ["transcript"]
//!
//! [output]
//! path = "interactions_extracted.csv"
//!
//! [checkpoint]
//! path = ".sift_checkpoint.json"
//!
//! [batch]
//! batch_size = 10
//! max_concurrency = 4
//!
//! [extraction]
//! max_attempts = 3
//!
//! [gateway]
//! endpoint = "http://localhost:11434"
//! model = "llama3.1"
//! timeout_secs = 120
//! ```
//!
//! Missing tables fall back to their defaults; `[schema]` defaults to the
//! built-in interaction schema.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use sift_extractor::{ExtractionConfig, ExtractionSchema, ERROR_COLUMN, SUCCESS_COLUMN};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

/// Where records come from and how columns map onto them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Input CSV file
    pub path: PathBuf,

    /// Column holding the stable unique record id
    pub id_column: String,

    /// Columns holding free text to analyze
    pub text_columns: Vec<String>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("interactions.csv"),
            id_column: "id".to_string(),
            text_columns: vec!["transcript".to_string()],
        }
    }
}

/// Where the merged dataset is written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output CSV file
    pub path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("interactions_extracted.csv"),
        }
    }
}

/// Where progress is persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    /// Checkpoint JSON file
    pub path: PathBuf,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".sift_checkpoint.json"),
        }
    }
}

/// Batch sizing and concurrency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Records per batch (one durability commit per batch)
    pub batch_size: usize,

    /// Maximum rows extracted concurrently within a batch
    pub max_concurrency: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            max_concurrency: 4,
        }
    }
}

/// Inference service connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Base URL of the service
    pub endpoint: String,

    /// Model name
    pub model: String,

    /// Per-call timeout in seconds
    pub timeout_secs: u64,
}

impl GatewayConfig {
    /// Per-call timeout as a Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            model: "llama3.1".to_string(),
            timeout_secs: 120,
        }
    }
}

/// Run metrics options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Input column to break success/failure counts down by (e.g. agent)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_by: Option<String>,
}

/// Complete configuration of a pipeline run
///
/// # Examples
///
/// ```
/// use sift_pipeline::PipelineConfig;
///
/// let config = PipelineConfig::default();
/// assert_eq!(config.batch.batch_size, 10);
/// assert!(config.validate().is_ok());
///
/// let config = PipelineConfig::aggressive();
/// assert_eq!(config.extraction.max_attempts, 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Input dataset
    pub input: InputConfig,

    /// Output dataset
    pub output: OutputConfig,

    /// Checkpoint file
    pub checkpoint: CheckpointConfig,

    /// Batching
    pub batch: BatchConfig,

    /// Per-record extraction
    pub extraction: ExtractionConfig,

    /// Inference service
    pub gateway: GatewayConfig,

    /// Expected payload structure
    pub schema: ExtractionSchema,

    /// Run metrics
    pub metrics: MetricsConfig,
}

impl PipelineConfig {
    /// Aggressive preset: large batches, high concurrency, few retries
    pub fn aggressive() -> Self {
        Self {
            batch: BatchConfig {
                batch_size: 50,
                max_concurrency: 16,
            },
            extraction: ExtractionConfig::aggressive(),
            ..Self::default()
        }
    }

    /// Lenient preset: small batches, low concurrency, more retries
    pub fn lenient() -> Self {
        Self {
            batch: BatchConfig {
                batch_size: 5,
                max_concurrency: 2,
            },
            extraction: ExtractionConfig::lenient(),
            gateway: GatewayConfig {
                timeout_secs: 300,
                ..GatewayConfig::default()
            },
            ..Self::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.input.id_column.trim().is_empty() {
            return Err("input.id_column must not be empty".to_string());
        }
        if self.input.text_columns.is_empty() {
            return Err("input.text_columns must name at least one column".to_string());
        }
        if self.input.text_columns.contains(&self.input.id_column) {
            return Err(format!(
                "id column '{}' cannot also be a text column",
                self.input.id_column
            ));
        }
        if self.batch.batch_size == 0 {
            return Err("batch.batch_size must be greater than 0".to_string());
        }
        if self.batch.max_concurrency == 0 {
            return Err("batch.max_concurrency must be greater than 0".to_string());
        }
        if self.gateway.timeout_secs == 0 {
            return Err("gateway.timeout_secs must be greater than 0".to_string());
        }
        if self.gateway.model.trim().is_empty() {
            return Err("gateway.model must not be empty".to_string());
        }
        if self.input.path == self.output.path {
            return Err("output.path must differ from input.path".to_string());
        }
        if self.checkpoint.path == self.input.path || self.checkpoint.path == self.output.path {
            return Err("checkpoint.path must differ from input.path and output.path".to_string());
        }

        self.extraction.validate()?;
        self.schema
            .validate_definition()
            .map_err(|e| e.to_string())?;

        let mut configured = vec![self.input.id_column.as_str()];
        configured.extend(self.input.text_columns.iter().map(String::as_str));
        self.check_collisions(&configured)
    }

    /// Check that the schema's output columns do not collide with input columns
    pub fn check_input_columns(&self, headers: &[String]) -> Result<()> {
        let headers: Vec<&str> = headers.iter().map(String::as_str).collect();
        self.check_collisions(&headers)
            .map_err(PipelineError::Config)?;

        if let Some(group_by) = &self.metrics.group_by {
            if !headers.contains(&group_by.as_str()) {
                return Err(PipelineError::Config(format!(
                    "metrics.group_by column '{}' not found in input",
                    group_by
                )));
            }
        }
        Ok(())
    }

    fn check_collisions(&self, input_columns: &[&str]) -> std::result::Result<(), String> {
        let input: HashSet<&str> = input_columns.iter().copied().collect();
        for column in self.schema.columns() {
            if input.contains(column) {
                return Err(format!(
                    "schema field '{}' collides with an input column",
                    column
                ));
            }
        }
        for reserved in [SUCCESS_COLUMN, ERROR_COLUMN] {
            if input.contains(reserved) {
                return Err(format!("input column '{}' is reserved", reserved));
            }
        }
        Ok(())
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> std::result::Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format!("Failed to parse TOML: {}", e))
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> std::result::Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize to TOML: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.input.id_column, "id");
        assert_eq!(config.batch.max_concurrency, 4);
        assert_eq!(config.extraction.max_attempts, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets_are_valid() {
        assert!(PipelineConfig::aggressive().validate().is_ok());
        assert!(PipelineConfig::lenient().validate().is_ok());
        assert_eq!(PipelineConfig::lenient().batch.batch_size, 5);
    }

    #[test]
    fn test_invalid_batch_size() {
        let mut config = PipelineConfig::default();
        config.batch.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_checkpoint_path_must_be_distinct() {
        let mut config = PipelineConfig::default();
        config.checkpoint.path = config.output.path.clone();
        assert!(config.validate().unwrap_err().contains("checkpoint.path"));

        let mut config = PipelineConfig::default();
        config.input.path = PathBuf::from("interactions.csv");
        config.checkpoint.path = PathBuf::from("interactions.csv");
        assert!(config.validate().unwrap_err().contains("checkpoint.path"));
    }

    #[test]
    fn test_schema_collision_with_text_column() {
        let mut config = PipelineConfig::default();
        config.input.text_columns = vec!["summary".to_string()];
        let err = config.validate().unwrap_err();
        assert!(err.contains("summary"));
    }

    #[test]
    fn test_reserved_input_column() {
        let config = PipelineConfig::default();
        let headers = vec![
            "id".to_string(),
            "transcript".to_string(),
            SUCCESS_COLUMN.to_string(),
        ];
        assert!(config.check_input_columns(&headers).is_err());
    }

    #[test]
    fn test_group_by_must_exist() {
        let mut config = PipelineConfig::default();
        config.metrics.group_by = Some("agent".to_string());
        let headers = vec!["id".to_string(), "transcript".to_string()];
        assert!(config.check_input_columns(&headers).is_err());

        let headers = vec![
            "id".to_string(),
            "transcript".to_string(),
            "agent".to_string(),
        ];
        assert!(config.check_input_columns(&headers).is_ok());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = PipelineConfig::lenient();
        let toml_str = config.to_toml().unwrap();
        let parsed = PipelineConfig::from_toml(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_toml() {
        let config = PipelineConfig::from_toml(
            r#"
            [input]
            path = "calls.csv"
            text_columns = ["customer", "agent_notes"]

            [batch]
            batch_size = 25

            [metrics]
            group_by = "agent"
            "#,
        )
        .unwrap();

        assert_eq!(config.input.path, PathBuf::from("calls.csv"));
        assert_eq!(config.input.id_column, "id");
        assert_eq!(config.input.text_columns.len(), 2);
        assert_eq!(config.batch.batch_size, 25);
        assert_eq!(config.batch.max_concurrency, 4);
        assert_eq!(config.metrics.group_by.as_deref(), Some("agent"));
        assert_eq!(config.schema, ExtractionSchema::default());
    }

    #[test]
    fn test_custom_schema_from_toml() {
        let config = PipelineConfig::from_toml(
            r#"
            [[schema.sections]]
            name = "triage"

            [[schema.sections.fields]]
            name = "urgency"
            type = "integer"
            min = 1
            max = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.schema.columns(), vec!["urgency"]);
        assert!(config.validate().is_ok());
    }
}
