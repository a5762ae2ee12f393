//! Sift CLI - resumable structured extraction over tabular transcripts.

use clap::Parser;
use sift_cli::{commands, Cli, Command, Formatter};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so stdout carries only the summary
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    let formatter = Formatter::new(cli.format.into(), !cli.no_color);

    match run(cli, &formatter).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{}", formatter.error(&format!("Error: {}", e)));
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli, formatter: &Formatter) -> sift_cli::Result<i32> {
    let config_path = cli.config.as_deref();

    match cli.command {
        Command::Run(args) => commands::execute_run(args, false, config_path, formatter).await,
        Command::Fresh(args) => commands::execute_run(args, true, config_path, formatter).await,
        Command::Status(args) => commands::execute_status(args, config_path, formatter),
        Command::Config(args) => commands::execute_config(args),
    }
}
