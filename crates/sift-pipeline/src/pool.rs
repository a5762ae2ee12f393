//! Bounded-concurrency execution of row machines within one batch

use crate::error::{PipelineError, Result};
use sift_domain::{GatewayFailure, InferenceGateway, Record, RecordId};
use sift_extractor::{AttemptError, AttemptErrorKind, RowMachine, RowOutcome};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Terminal result of one row, as seen by the scheduler
#[derive(Debug, Clone, PartialEq)]
pub struct RowReport {
    /// Record the row belongs to
    pub record_id: RecordId,

    /// Terminal outcome
    pub outcome: RowOutcome,

    /// Gateway calls made for the row
    pub gateway_calls: usize,
}

/// Runs row machines for a batch with at most `max_concurrency` in flight
pub struct WorkerPool<G> {
    machine: RowMachine<G>,
    max_concurrency: usize,
}

impl<G> WorkerPool<G>
where
    G: InferenceGateway + Send + Sync + 'static,
    G::Error: GatewayFailure,
{
    /// Create a pool around a row machine
    pub fn new(machine: RowMachine<G>, max_concurrency: usize) -> Self {
        Self {
            machine,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Pool size used for a batch of `batch_len` records
    pub fn size_for(&self, batch_len: usize) -> usize {
        batch_len.min(self.max_concurrency).max(1)
    }

    /// Run every record of the batch to a terminal state (join barrier)
    ///
    /// Reports come back in batch order regardless of completion order.
    pub async fn run_batch(&self, records: &[Arc<Record>]) -> Result<Vec<RowReport>> {
        let size = self.size_for(records.len());
        let semaphore = Arc::new(Semaphore::new(size));
        let mut join_set = JoinSet::new();

        debug!("Running {} rows with {} workers", records.len(), size);

        for (position, record) in records.iter().enumerate() {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| PipelineError::Worker(format!("Semaphore closed: {}", e)))?;

            let machine = self.machine.clone();
            let record = Arc::clone(record);
            join_set.spawn(async move {
                let _permit = permit;
                let state = machine.run(&record).await;
                let report = RowReport {
                    record_id: state.record_id().clone(),
                    gateway_calls: state.extract_calls(),
                    outcome: state.into_outcome(),
                };
                (position, report)
            });
        }

        let mut slots: Vec<Option<RowReport>> = vec![None; records.len()];
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((position, report)) => slots[position] = Some(report),
                Err(join_err) => warn!("Row task did not finish: {}", join_err),
            }
        }

        // A row whose task died still gets a terminal failure
        Ok(slots
            .into_iter()
            .zip(records)
            .map(|(slot, record)| {
                slot.unwrap_or_else(|| RowReport {
                    record_id: record.id().clone(),
                    outcome: RowOutcome::Failure(AttemptError::new(
                        AttemptErrorKind::Transport,
                        "worker task failed before reaching a terminal state",
                    )),
                    gateway_calls: 0,
                })
            })
            .collect())
    }
}
