//! Run and fresh command implementation.

use crate::cli::RunArgs;
use crate::config;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use sift_llm::OllamaGateway;
use sift_pipeline::{BatchScheduler, RunOptions, RunOutcome};
use std::path::Path;
use tokio::sync::watch;
use tracing::info;

/// Exit code after an interrupt (128 + SIGINT)
pub const EXIT_INTERRUPTED: i32 = 130;

/// Exit code when `--max-batches` stopped the run with work remaining
pub const EXIT_INCOMPLETE: i32 = 3;

/// Process exit code for a finished run.
///
/// Only a run that gave every record a terminal outcome exits with 0;
/// individual record failures do not count against it.
pub fn exit_code(outcome: RunOutcome) -> i32 {
    match outcome {
        RunOutcome::Completed => 0,
        RunOutcome::Interrupted => EXIT_INTERRUPTED,
        RunOutcome::Stopped => EXIT_INCOMPLETE,
    }
}

/// Execute the run (or fresh) command.
pub async fn execute_run(
    args: RunArgs,
    fresh: bool,
    config_path: Option<&Path>,
    formatter: &Formatter,
) -> Result<i32> {
    let mut config = config::load(config_path)?;
    config::apply_run_overrides(&mut config, &args);
    config.validate().map_err(CliError::Config)?;

    let gateway = OllamaGateway::new(
        config.gateway.endpoint.clone(),
        config.gateway.model.clone(),
        config.gateway.timeout(),
    )?;

    // Ctrl-C lets the in-flight batch commit before the run stops
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received, finishing current batch");
            shutdown_tx.send_replace(true);
        }
    });

    let scheduler = BatchScheduler::new(config, gateway)?.with_shutdown(shutdown_rx);
    let options = RunOptions {
        fresh,
        max_batches: args.max_batches,
    };

    let report = scheduler.run(options).await?;
    println!("{}", formatter.format_report(&report)?);

    Ok(exit_code(report.outcome))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(RunOutcome::Completed), 0);
        assert_eq!(exit_code(RunOutcome::Interrupted), 130);
        assert_eq!(exit_code(RunOutcome::Stopped), EXIT_INCOMPLETE);
    }

    #[tokio::test]
    async fn test_invalid_override_fails_before_running() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("sift.toml");
        std::fs::write(&config_path, "").unwrap();

        let args = RunArgs {
            batch_size: Some(0),
            ..RunArgs::default()
        };
        let formatter = Formatter::new(crate::OutputFormat::Table, false);

        let result = execute_run(args, false, Some(&config_path), &formatter).await;
        assert!(matches!(result, Err(CliError::Config(_))));
    }
}
