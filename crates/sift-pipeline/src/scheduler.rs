//! Batch scheduler: resume, batching, merge and checkpoint sequencing
//!
//! ```text
//! load input ─▶ subtract checkpoint ─▶ for each batch:
//!                                        WorkerPool::run_batch (join)
//!                                        ResultMerger::merge ─▶ output save
//!                                        CheckpointStore::save
//! ```
//!
//! Batch N+1 never starts before batch N's checkpoint is on disk.

use crate::checkpoint::{Checkpoint, CheckpointStore, CheckpointSummary};
use crate::config::PipelineConfig;
use crate::dataset::InputDataset;
use crate::error::{PipelineError, Result};
use crate::merger::ResultMerger;
use crate::metrics::{BatchReport, RunMetrics};
use crate::output::OutputDataset;
use crate::pool::{RowReport, WorkerPool};
use sift_domain::{GatewayFailure, InferenceGateway, Record, RecordId};
use sift_extractor::{ExtractionSchema, RowMachine, RowOutcome, ERROR_COLUMN, SUCCESS_COLUMN};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Options for one invocation of [`BatchScheduler::run`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Ignore and delete any existing checkpoint, starting from scratch
    pub fresh: bool,

    /// Stop after this many batches, leaving a resumable checkpoint
    pub max_batches: Option<usize>,
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every record has a terminal outcome; the checkpoint was cleared
    Completed,

    /// A shutdown signal stopped the run between batches
    Interrupted,

    /// `max_batches` was reached with work remaining
    Stopped,
}

impl RunOutcome {
    /// Whether every record was processed
    pub fn is_complete(&self) -> bool {
        matches!(self, RunOutcome::Completed)
    }
}

/// Result of a run
#[derive(Debug, Clone)]
pub struct RunReport {
    /// How the run ended
    pub outcome: RunOutcome,

    /// Identifier shared by every invocation resuming the same checkpoint
    pub run_id: String,

    /// Aggregated metrics
    pub metrics: RunMetrics,
}

/// Drives a dataset through extraction batch by batch
pub struct BatchScheduler<G> {
    config: PipelineConfig,
    schema: Arc<ExtractionSchema>,
    pool: WorkerPool<G>,
    merger: ResultMerger,
    checkpoints: CheckpointStore,
    shutdown: Option<watch::Receiver<bool>>,
}

impl<G> BatchScheduler<G>
where
    G: InferenceGateway + Send + Sync + 'static,
    G::Error: GatewayFailure,
{
    /// Create a scheduler from a validated configuration
    pub fn new(config: PipelineConfig, gateway: G) -> Result<Self> {
        config.validate().map_err(PipelineError::Config)?;

        let schema = Arc::new(config.schema.clone());
        let machine = RowMachine::new(
            Arc::new(gateway),
            Arc::clone(&schema),
            config.extraction.clone(),
        );

        Ok(Self {
            pool: WorkerPool::new(machine, config.batch.max_concurrency),
            merger: ResultMerger::new(Arc::clone(&schema)),
            checkpoints: CheckpointStore::new(config.checkpoint.path.clone()),
            schema,
            config,
            shutdown: None,
        })
    }

    /// Observe `shutdown`; once it reads `true` no further batch starts
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Configuration in use
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Checkpoint store in use
    pub fn checkpoints(&self) -> &CheckpointStore {
        &self.checkpoints
    }

    /// Process every record not yet completed
    ///
    /// # Errors
    ///
    /// Only infrastructure failures (input unreadable, output or checkpoint
    /// not writable, output inconsistent with input) are returned. The last
    /// saved checkpoint stays valid.
    pub async fn run(&self, options: RunOptions) -> Result<RunReport> {
        let started = Instant::now();

        let input = InputDataset::load(&self.config.input)?;
        self.config.check_input_columns(input.headers())?;

        let (mut output, mut checkpoint) = self.prepare(&input, options.fresh)?;

        let mut metrics = RunMetrics::new();
        metrics.total_records = input.len();
        metrics.record_skipped(checkpoint.len());

        let remaining: Vec<Arc<Record>> = input
            .records()
            .iter()
            .filter(|record| !checkpoint.contains(record.id()))
            .cloned()
            .map(Arc::new)
            .collect();

        info!(
            run_id = %checkpoint.run_id,
            "Processing {} of {} records in batches of {}",
            remaining.len(),
            input.len(),
            self.config.batch.batch_size
        );

        let mut outcome = RunOutcome::Completed;
        let mut batches_run = 0;

        for batch in remaining.chunks(self.config.batch.batch_size) {
            if self.shutdown_requested() {
                info!("Shutdown requested, stopping before next batch");
                outcome = RunOutcome::Interrupted;
                break;
            }
            if options.max_batches.is_some_and(|max| batches_run >= max) {
                info!("Reached batch limit of {}", batches_run);
                outcome = RunOutcome::Stopped;
                break;
            }

            let report = self
                .run_batch(batch, &mut output, &mut checkpoint, &mut metrics)
                .await?;
            info!(
                batch = report.index,
                "Batch committed: {} succeeded, {} failed, {} gateway calls",
                report.succeeded,
                report.failed,
                report.gateway_calls
            );
            metrics.record_batch(report);
            batches_run += 1;
        }

        if outcome.is_complete() {
            self.checkpoints.clear()?;
        }

        metrics.total_runtime_ms = started.elapsed().as_millis() as u64;
        info!(
            "Run {:?}: {} processed, {} succeeded, {} failed, {} remaining",
            outcome,
            metrics.total_processed(),
            metrics.total_succeeded(),
            metrics.total_failed(),
            metrics.remaining()
        );

        Ok(RunReport {
            outcome,
            run_id: checkpoint.run_id,
            metrics,
        })
    }

    async fn run_batch(
        &self,
        batch: &[Arc<Record>],
        output: &mut OutputDataset,
        checkpoint: &mut Checkpoint,
        metrics: &mut RunMetrics,
    ) -> Result<BatchReport> {
        let started = Instant::now();
        let index = checkpoint.last_batch + 1;

        info!(batch = index, "Starting batch of {} records", batch.len());
        let reports = self.pool.run_batch(batch).await?;

        // 1. Merge and commit the output
        let outcomes: Vec<(RecordId, RowOutcome)> = reports
            .iter()
            .map(|r| (r.record_id.clone(), r.outcome.clone()))
            .collect();
        self.merger.merge(output, &outcomes)?;
        output.save(&self.config.output.path).map_err(|e| {
            error!(batch = index, "Failed to write output: {}", e);
            e
        })?;

        // 2. Only then persist the checkpoint
        let succeeded = reports.iter().filter(|r| r.outcome.is_success()).count();
        let failed = reports.len() - succeeded;
        let summary = CheckpointSummary {
            total_records: checkpoint.summary.total_records,
            succeeded: checkpoint.summary.succeeded + succeeded,
            failed: checkpoint.summary.failed + failed,
        };
        checkpoint.record_batch(reports.iter().map(|r| &r.record_id), summary);
        self.checkpoints.save(checkpoint).map_err(|e| {
            error!(batch = index, "Failed to write checkpoint: {}", e);
            e
        })?;

        self.record_rows(&reports, output, metrics);

        Ok(BatchReport {
            index,
            size: reports.len(),
            succeeded,
            failed,
            gateway_calls: reports.iter().map(|r| r.gateway_calls).sum(),
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }

    fn record_rows(&self, reports: &[RowReport], output: &OutputDataset, metrics: &mut RunMetrics) {
        for report in reports {
            if let RowOutcome::Failure(err) = &report.outcome {
                metrics.record_failure(err.kind);
            }
            if let Some(group_by) = &self.config.metrics.group_by {
                let group = output.get(&report.record_id, group_by).unwrap_or_default();
                metrics.record_group(group, report.outcome.is_success());
            }
        }
    }

    /// Load or create the output dataset and checkpoint for this run
    fn prepare(&self, input: &InputDataset, fresh: bool) -> Result<(OutputDataset, Checkpoint)> {
        if fresh {
            info!("Fresh run requested, discarding any checkpoint");
            self.checkpoints.clear()?;
            return self.start_over(input);
        }

        let Some(mut checkpoint) = self.checkpoints.load()? else {
            return self.start_over(input);
        };

        let id_column = &self.config.input.id_column;
        let Some(mut output) = OutputDataset::load(&self.config.output.path, id_column)? else {
            warn!(
                "Checkpoint {} found but {} is missing, starting over",
                self.checkpoints.path().display(),
                self.config.output.path.display()
            );
            return self.start_over(input);
        };

        output.check_matches(input).map_err(|e| {
            PipelineError::Output(format!(
                "{} does not match the input ({}); run fresh to start over",
                self.config.output.path.display(),
                e
            ))
        })?;
        output.ensure_columns(&self.extraction_columns());

        let stale: Vec<String> = checkpoint
            .ids()
            .filter(|id| !output.has_marker(&RecordId::new(*id)))
            .map(str::to_string)
            .collect();
        for id in stale {
            if output.contains(&RecordId::new(id.as_str())) {
                warn!(record_id = %id, "Checkpointed record has no outcome in the output, will reprocess");
            } else {
                warn!(record_id = %id, "Checkpointed record is not in the input, ignoring");
            }
            checkpoint.remove(&id);
        }

        checkpoint.summary = summarize(&output, &checkpoint, input.len());
        info!(
            run_id = %checkpoint.run_id,
            "Resuming after batch {}: {} of {} records completed",
            checkpoint.last_batch,
            checkpoint.len(),
            input.len()
        );

        Ok((output, checkpoint))
    }

    /// Initialize the output (first write) and a new checkpoint
    fn start_over(&self, input: &InputDataset) -> Result<(OutputDataset, Checkpoint)> {
        let output = OutputDataset::initialize(input, &self.config.input.id_column, &self.schema)?;
        output.save(&self.config.output.path)?;

        let mut checkpoint = Checkpoint::new();
        checkpoint.summary.total_records = input.len();
        info!(run_id = %checkpoint.run_id, "Starting new run");

        Ok((output, checkpoint))
    }

    fn extraction_columns(&self) -> Vec<&str> {
        let mut columns = self.schema.columns();
        columns.push(SUCCESS_COLUMN);
        columns.push(ERROR_COLUMN);
        columns
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown.as_ref().is_some_and(|rx| *rx.borrow())
    }
}

/// Counts of checkpointed records as recorded in the output
fn summarize(output: &OutputDataset, checkpoint: &Checkpoint, total_records: usize) -> CheckpointSummary {
    let mut summary = CheckpointSummary {
        total_records,
        ..CheckpointSummary::default()
    };
    for id in checkpoint.ids() {
        match output.get(&RecordId::new(id), SUCCESS_COLUMN) {
            Some("true") => summary.succeeded += 1,
            Some("false") => summary.failed += 1,
            _ => {}
        }
    }
    summary
}
