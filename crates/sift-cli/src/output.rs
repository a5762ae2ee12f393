//! Output formatting for the CLI.

use crate::cli::CliFormat;
use crate::error::Result;
use colored::*;
use sift_pipeline::{Checkpoint, RunOutcome, RunReport};
use std::path::Path;
use tabled::{
    builder::Builder,
    settings::{object::Rows, Alignment, Modify, Style},
};

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Table format
    Table,
    /// JSON format
    Json,
}

impl From<CliFormat> for OutputFormat {
    fn from(format: CliFormat) -> Self {
        match format {
            CliFormat::Table => OutputFormat::Table,
            CliFormat::Json => OutputFormat::Json,
        }
    }
}

/// Output formatter.
pub struct Formatter {
    format: OutputFormat,
    color_enabled: bool,
}

impl Formatter {
    /// Create a new formatter.
    pub fn new(format: OutputFormat, color_enabled: bool) -> Self {
        Self {
            format,
            color_enabled,
        }
    }

    /// Format the end-of-run report.
    pub fn format_report(&self, report: &RunReport) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let value = serde_json::json!({
                    "outcome": outcome_label(report.outcome),
                    "run_id": report.run_id,
                    "metrics": report.metrics,
                });
                Ok(serde_json::to_string_pretty(&value)?)
            }
            OutputFormat::Table => Ok(self.format_report_table(report)),
        }
    }

    fn format_report_table(&self, report: &RunReport) -> String {
        let metrics = &report.metrics;
        let mut sections = Vec::new();

        let headline = format!(
            "Run {} {}",
            report.run_id,
            outcome_label(report.outcome)
        );
        sections.push(match report.outcome {
            RunOutcome::Completed => self.success(&headline),
            RunOutcome::Interrupted | RunOutcome::Stopped => self.warning(&headline),
        });

        if !metrics.batches.is_empty() {
            let mut builder = Builder::default();
            builder.push_record(["Batch", "Records", "Succeeded", "Failed", "Calls", "Duration"]);
            for batch in &metrics.batches {
                builder.push_record([
                    batch.index.to_string(),
                    batch.size.to_string(),
                    batch.succeeded.to_string(),
                    batch.failed.to_string(),
                    batch.gateway_calls.to_string(),
                    format!("{}ms", batch.duration_ms),
                ]);
            }
            sections.push(styled(builder));
        }

        let mut totals = Builder::default();
        totals.push_record(["Records", "Skipped", "Succeeded", "Failed", "Remaining", "Calls"]);
        totals.push_record([
            metrics.total_records.to_string(),
            metrics.skipped.to_string(),
            metrics.total_succeeded().to_string(),
            metrics.total_failed().to_string(),
            metrics.remaining().to_string(),
            metrics.total_gateway_calls().to_string(),
        ]);
        sections.push(styled(totals));

        if !metrics.failure_kinds.is_empty() {
            let mut builder = Builder::default();
            builder.push_record(["Failure kind", "Rows"]);
            for (kind, count) in &metrics.failure_kinds {
                builder.push_record([kind.clone(), count.to_string()]);
            }
            sections.push(styled(builder));
        }

        if !metrics.groups.is_empty() {
            let mut builder = Builder::default();
            builder.push_record(["Group", "Succeeded", "Failed"]);
            for (group, counts) in &metrics.groups {
                builder.push_record([
                    group.clone(),
                    counts.succeeded.to_string(),
                    counts.failed.to_string(),
                ]);
            }
            sections.push(styled(builder));
        }

        sections.join("\n")
    }

    /// Format checkpoint progress.
    pub fn format_status(&self, path: &Path, checkpoint: Option<&Checkpoint>) -> Result<String> {
        let Some(checkpoint) = checkpoint else {
            return Ok(match self.format {
                OutputFormat::Json => serde_json::to_string_pretty(&serde_json::json!({
                    "checkpoint": path.display().to_string(),
                    "exists": false,
                }))?,
                OutputFormat::Table => {
                    self.info(&format!("No checkpoint at {}", path.display()))
                }
            });
        };

        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(&serde_json::json!({
                "checkpoint": path.display().to_string(),
                "exists": true,
                "run_id": checkpoint.run_id,
                "completed": checkpoint.len(),
                "total_records": checkpoint.summary.total_records,
                "succeeded": checkpoint.summary.succeeded,
                "failed": checkpoint.summary.failed,
                "last_batch": checkpoint.last_batch,
                "updated_at": checkpoint.updated_at,
            }))?),
            OutputFormat::Table => {
                let mut builder = Builder::default();
                builder.push_record(["Run", "Completed", "Succeeded", "Failed", "Last batch", "Updated at"]);
                builder.push_record([
                    checkpoint.run_id.clone(),
                    format!("{} / {}", checkpoint.len(), checkpoint.summary.total_records),
                    checkpoint.summary.succeeded.to_string(),
                    checkpoint.summary.failed.to_string(),
                    checkpoint.last_batch.to_string(),
                    checkpoint.updated_at.to_string(),
                ]);
                Ok(styled(builder))
            }
        }
    }

    /// Format a success message.
    pub fn success(&self, message: &str) -> String {
        self.colorize(&format!("✓ {}", message), "green")
    }

    /// Format an error message.
    pub fn error(&self, message: &str) -> String {
        self.colorize(&format!("✗ {}", message), "red")
    }

    /// Format an info message.
    pub fn info(&self, message: &str) -> String {
        self.colorize(&format!("ℹ {}", message), "blue")
    }

    /// Format a warning message.
    pub fn warning(&self, message: &str) -> String {
        self.colorize(&format!("⚠ {}", message), "yellow")
    }

    /// Colorize text if color is enabled.
    fn colorize(&self, text: &str, color: &str) -> String {
        if !self.color_enabled {
            return text.to_string();
        }

        match color {
            "red" => text.red().to_string(),
            "green" => text.green().to_string(),
            "blue" => text.blue().to_string(),
            "yellow" => text.yellow().to_string(),
            _ => text.to_string(),
        }
    }
}

fn styled(builder: Builder) -> String {
    let mut table = builder.build();
    table
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()));
    table.to_string()
}

/// Lower-case label of a run outcome.
pub fn outcome_label(outcome: RunOutcome) -> &'static str {
    match outcome {
        RunOutcome::Completed => "completed",
        RunOutcome::Interrupted => "interrupted",
        RunOutcome::Stopped => "stopped",
    }
}
