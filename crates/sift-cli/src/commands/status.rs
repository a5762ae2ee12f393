//! Status command implementation.

use crate::cli::StatusArgs;
use crate::config;
use crate::error::Result;
use crate::output::Formatter;
use sift_pipeline::CheckpointStore;
use std::path::Path;

/// Execute the status command.
pub fn execute_status(args: StatusArgs, config_path: Option<&Path>, formatter: &Formatter) -> Result<i32> {
    let mut config = config::load(config_path)?;
    config::apply_status_overrides(&mut config, &args);

    let store = CheckpointStore::new(config.checkpoint.path.clone());
    let checkpoint = store.load()?;

    println!("{}", formatter.format_status(store.path(), checkpoint.as_ref())?);
    Ok(0)
}
