//! Sift Pipeline
//!
//! Resumable batch extraction over a tabular dataset.
//!
//! # Overview
//!
//! The pipeline loads every input record, skips those a previous run already
//! completed, and processes the rest in ordered batches. Each batch runs row
//! machines concurrently up to a bound, then merges their outcomes into the
//! output dataset and only afterwards persists the checkpoint.
//!
//! # Guarantees
//!
//! - The output always has exactly one row per input record
//! - The checkpoint never names a record whose output row lacks an outcome
//! - A record's permanent failure is written as data and never aborts the run
//! - Resuming after any batch yields the same output as an uninterrupted run
//!
//! # Usage
//!
//! ```no_run
//! use sift_pipeline::{BatchScheduler, PipelineConfig, RunOptions};
//! use sift_llm::MockGateway;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::default();
//!     let scheduler = BatchScheduler::new(config, MockGateway::default())?;
//!
//!     let report = scheduler.run(RunOptions::default()).await?;
//!     println!("{}", report.metrics.summary());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

mod checkpoint;
mod config;
mod dataset;
mod error;
mod merger;
mod metrics;
mod output;
mod pool;
mod scheduler;

pub use checkpoint::{Checkpoint, CheckpointStore, CheckpointSummary, CHECKPOINT_VERSION};
pub use config::{
    BatchConfig, CheckpointConfig, GatewayConfig, InputConfig, MetricsConfig, OutputConfig,
    PipelineConfig,
};
pub use dataset::InputDataset;
pub use error::{PipelineError, Result};
pub use merger::ResultMerger;
pub use metrics::{BatchReport, GroupCounts, RunMetrics};
pub use output::OutputDataset;
pub use pool::{RowReport, WorkerPool};
pub use scheduler::{BatchScheduler, RunOptions, RunOutcome, RunReport};
