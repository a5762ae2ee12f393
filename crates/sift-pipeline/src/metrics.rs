//! Metrics collected during a run

use serde::Serialize;
use sift_extractor::AttemptErrorKind;
use std::collections::BTreeMap;

/// What happened in one committed batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// 1-based batch number, continuing across resumes
    pub index: usize,

    /// Records in the batch
    pub size: usize,

    /// Rows that completed successfully
    pub succeeded: usize,

    /// Rows that failed permanently
    pub failed: usize,

    /// Gateway calls made for the batch
    pub gateway_calls: usize,

    /// Wall time from batch start to checkpoint commit
    pub duration_ms: u64,
}

/// Success and failure counts for one group
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GroupCounts {
    /// Successful rows
    pub succeeded: usize,

    /// Failed rows
    pub failed: usize,
}

/// Aggregated metrics of one run, returned by the scheduler
///
/// Tracks per-batch reports, failure kinds and optional per-group counts.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunMetrics {
    /// Records in the input
    pub total_records: usize,

    /// Records skipped because an earlier run completed them
    pub skipped: usize,

    /// Committed batches, in order
    pub batches: Vec<BatchReport>,

    /// Final failure kinds of failed rows
    pub failure_kinds: BTreeMap<String, usize>,

    /// Counts per value of the configured group column
    pub groups: BTreeMap<String, GroupCounts>,

    /// Total runtime in milliseconds
    pub total_runtime_ms: u64,
}

impl RunMetrics {
    /// Create new empty metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a committed batch
    pub fn record_batch(&mut self, report: BatchReport) {
        self.batches.push(report);
    }

    /// Record the final failure kind of a failed row
    pub fn record_failure(&mut self, kind: AttemptErrorKind) {
        *self
            .failure_kinds
            .entry(kind.as_str().to_string())
            .or_insert(0) += 1;
    }

    /// Record a row outcome under its group
    pub fn record_group(&mut self, group: &str, succeeded: bool) {
        let counts = self.groups.entry(group.to_string()).or_default();
        if succeeded {
            counts.succeeded += 1;
        } else {
            counts.failed += 1;
        }
    }

    /// Record records skipped through resume
    pub fn record_skipped(&mut self, count: usize) {
        self.skipped += count;
    }

    /// Rows processed in this run
    pub fn total_processed(&self) -> usize {
        self.batches.iter().map(|b| b.size).sum()
    }

    /// Rows that succeeded in this run
    pub fn total_succeeded(&self) -> usize {
        self.batches.iter().map(|b| b.succeeded).sum()
    }

    /// Rows that failed in this run
    pub fn total_failed(&self) -> usize {
        self.batches.iter().map(|b| b.failed).sum()
    }

    /// Gateway calls made in this run
    pub fn total_gateway_calls(&self) -> usize {
        self.batches.iter().map(|b| b.gateway_calls).sum()
    }

    /// Records still without an outcome after this run
    pub fn remaining(&self) -> usize {
        self.total_records
            .saturating_sub(self.skipped + self.total_processed())
    }

    /// Success rate over rows processed in this run (0.0 when none)
    pub fn success_rate(&self) -> f64 {
        let processed = self.total_processed();
        if processed == 0 {
            0.0
        } else {
            self.total_succeeded() as f64 / processed as f64
        }
    }

    /// Generate a summary report of metrics
    pub fn summary(&self) -> String {
        let mut lines = vec![
            "Run Summary".to_string(),
            "===========".to_string(),
            format!("Records: {}", self.total_records),
            format!("Skipped (already completed): {}", self.skipped),
            format!("Processed: {}", self.total_processed()),
            format!("Succeeded: {}", self.total_succeeded()),
            format!("Failed: {}", self.total_failed()),
            format!("Remaining: {}", self.remaining()),
            format!("Gateway calls: {}", self.total_gateway_calls()),
            format!("Total runtime: {}ms", self.total_runtime_ms),
            String::new(),
        ];

        if !self.batches.is_empty() {
            lines.push("Batches:".to_string());
            for batch in &self.batches {
                lines.push(format!(
                    "  #{}: {} records, {} succeeded, {} failed, {} calls, {}ms",
                    batch.index,
                    batch.size,
                    batch.succeeded,
                    batch.failed,
                    batch.gateway_calls,
                    batch.duration_ms
                ));
            }
            lines.push(String::new());
        }

        if !self.failure_kinds.is_empty() {
            lines.push("Failures by kind:".to_string());
            for (kind, count) in &self.failure_kinds {
                lines.push(format!("  {}: {}", kind, count));
            }
            lines.push(String::new());
        }

        if !self.groups.is_empty() {
            lines.push("By group:".to_string());
            for (group, counts) in &self.groups {
                lines.push(format!(
                    "  {}: {} succeeded, {} failed",
                    group, counts.succeeded, counts.failed
                ));
            }
        }

        lines.join("\n")
    }
}
