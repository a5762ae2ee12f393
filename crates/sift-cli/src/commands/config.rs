//! Config command implementation.

use crate::cli::{ConfigArgs, Preset};
use crate::error::{CliError, Result};
use sift_pipeline::PipelineConfig;

/// Render a preset as TOML.
pub fn render_preset(preset: Preset) -> Result<String> {
    let config = match preset {
        Preset::Default => PipelineConfig::default(),
        Preset::Aggressive => PipelineConfig::aggressive(),
        Preset::Lenient => PipelineConfig::lenient(),
    };
    config.to_toml().map_err(CliError::Config)
}

/// Execute the config command.
pub fn execute_config(args: ConfigArgs) -> Result<i32> {
    println!("{}", render_preset(args.preset)?);
    Ok(0)
}
