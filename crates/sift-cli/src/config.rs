//! Configuration loading for the CLI.
//!
//! The pipeline configuration comes from, in increasing precedence: built-in
//! defaults, the TOML file (`--config`, or `./sift.toml` when present), and
//! command-line flags.

use crate::cli::{RunArgs, StatusArgs};
use crate::error::{CliError, Result};
use sift_pipeline::PipelineConfig;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Configuration file picked up from the working directory
pub const DEFAULT_CONFIG_FILE: &str = "sift.toml";

/// Load the pipeline configuration.
///
/// An explicitly named file must exist; the implicit `./sift.toml` is
/// optional.
pub fn load(path: Option<&Path>) -> Result<PipelineConfig> {
    let path = match path {
        Some(path) => path,
        None => {
            let implicit = Path::new(DEFAULT_CONFIG_FILE);
            if !implicit.exists() {
                debug!("No {} found, using defaults", DEFAULT_CONFIG_FILE);
                return Ok(PipelineConfig::default());
            }
            implicit
        }
    };

    let contents = fs::read_to_string(path).map_err(|e| {
        CliError::Config(format!("cannot read {}: {}", path.display(), e))
    })?;
    let config: PipelineConfig = toml::from_str(&contents)?;
    debug!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Apply `run`/`fresh` flag overrides on top of a loaded configuration.
pub fn apply_run_overrides(config: &mut PipelineConfig, args: &RunArgs) {
    if let Some(input) = &args.input {
        config.input.path = input.clone();
    }
    if let Some(output) = &args.output {
        config.output.path = output.clone();
    }
    if let Some(checkpoint) = &args.checkpoint {
        config.checkpoint.path = checkpoint.clone();
    }
    if let Some(batch_size) = args.batch_size {
        config.batch.batch_size = batch_size;
    }
    if let Some(concurrency) = args.concurrency {
        config.batch.max_concurrency = concurrency;
    }
    if let Some(max_attempts) = args.max_attempts {
        config.extraction.max_attempts = max_attempts;
    }
    if let Some(model) = &args.model {
        config.gateway.model = model.clone();
    }
    if let Some(endpoint) = &args.endpoint {
        config.gateway.endpoint = endpoint.clone();
    }
    if let Some(group_by) = &args.group_by {
        config.metrics.group_by = Some(group_by.clone());
    }
}

/// Apply `status` flag overrides.
pub fn apply_status_overrides(config: &mut PipelineConfig, args: &StatusArgs) {
    if let Some(checkpoint) = &args.checkpoint {
        config.checkpoint.path = checkpoint.clone();
    }
}
