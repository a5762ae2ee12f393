//! CLI command definitions and argument parsing.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Sift - extract structured, validated fields from transcript datasets.
#[derive(Debug, Parser)]
#[command(name = "sift")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to ./sift.toml when present)
    #[arg(short, long, global = true, env = "SIFT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, global = true, default_value = "table")]
    pub format: CliFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Log filter used when RUST_LOG is not set (e.g. info, debug, sift_pipeline=debug)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CliFormat {
    /// Table format (default)
    Table,
    /// JSON format
    Json,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start a run, or resume from the existing checkpoint
    Run(RunArgs),

    /// Start from scratch, discarding any existing checkpoint
    Fresh(RunArgs),

    /// Show checkpoint progress without running anything
    Status(StatusArgs),

    /// Print a configuration file
    Config(ConfigArgs),
}

/// Arguments shared by `run` and `fresh`; each overrides the config file.
#[derive(Debug, Default, Parser)]
pub struct RunArgs {
    /// Input CSV file
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Output CSV file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Checkpoint file
    #[arg(long)]
    pub checkpoint: Option<PathBuf>,

    /// Records per batch
    #[arg(short, long)]
    pub batch_size: Option<usize>,

    /// Maximum concurrent extractions within a batch
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Maximum gateway calls per record
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Stop after this many batches (the checkpoint stays resumable)
    #[arg(long)]
    pub max_batches: Option<usize>,

    /// Model name
    #[arg(short, long)]
    pub model: Option<String>,

    /// Inference service endpoint
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Input column to break metrics down by
    #[arg(long)]
    pub group_by: Option<String>,
}

/// Arguments for the status command.
#[derive(Debug, Default, Parser)]
pub struct StatusArgs {
    /// Checkpoint file
    #[arg(long)]
    pub checkpoint: Option<PathBuf>,
}

/// Arguments for the config command.
#[derive(Debug, Parser)]
pub struct ConfigArgs {
    /// Preset to print
    #[arg(short, long, value_enum, default_value = "default")]
    pub preset: Preset,
}

/// Configuration presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Preset {
    /// Balanced defaults
    Default,
    /// Large batches, high concurrency, few retries
    Aggressive,
    /// Small batches, low concurrency, more retries
    Lenient,
}
