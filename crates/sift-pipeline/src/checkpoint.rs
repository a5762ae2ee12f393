//! Durable record of completed work
//!
//! The checkpoint is a small JSON document replaced atomically after every
//! batch commit:
//!
//! ```json
//! {
//!   "version": 1,
//!   "run_id": "0190b2c4-...",
//!   "completed_ids": ["1", "10", "2"],
//!   "last_batch": 2,
//!   "summary": { "total_records": 23, "succeeded": 19, "failed": 1 },
//!   "updated_at": 1718000000
//! }
//! ```

use crate::error::{PipelineError, Result};
use crate::output::tmp_path;
use serde::{Deserialize, Serialize};
use sift_domain::RecordId;
use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};
use uuid::Uuid;

/// Current checkpoint format version
pub const CHECKPOINT_VERSION: u32 = 1;

/// Counts stored alongside the completed ids
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointSummary {
    /// Records in the input
    pub total_records: usize,

    /// Completed records that succeeded
    pub succeeded: usize,

    /// Completed records that failed permanently
    pub failed: usize,
}

impl CheckpointSummary {
    /// Records with a terminal outcome
    pub fn completed(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Persisted progress of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Format version
    pub version: u32,

    /// Identifier of the run that created this checkpoint
    pub run_id: String,

    /// Ids of records whose outcome is committed to the output
    completed_ids: BTreeSet<String>,

    /// Number of batches committed so far
    pub last_batch: usize,

    /// Counts at the last commit
    pub summary: CheckpointSummary,

    /// Last update, seconds since Unix epoch
    pub updated_at: u64,
}

impl Checkpoint {
    /// Start a checkpoint for a new run
    pub fn new() -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            run_id: Uuid::now_v7().to_string(),
            completed_ids: BTreeSet::new(),
            last_batch: 0,
            summary: CheckpointSummary::default(),
            updated_at: current_timestamp(),
        }
    }

    /// Completed ids as a set
    pub fn completed(&self) -> BTreeSet<RecordId> {
        self.completed_ids.iter().map(RecordId::new).collect()
    }

    /// Whether `id` is completed
    pub fn contains(&self, id: &RecordId) -> bool {
        self.completed_ids.contains(id.as_str())
    }

    /// Number of completed ids
    pub fn len(&self) -> usize {
        self.completed_ids.len()
    }

    /// Whether no ids are completed
    pub fn is_empty(&self) -> bool {
        self.completed_ids.is_empty()
    }

    /// Remove an id from the completed set; returns whether it was present
    pub fn remove(&mut self, id: &str) -> bool {
        self.completed_ids.remove(id)
    }

    /// Ids in the completed set
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.completed_ids.iter().map(String::as_str)
    }

    /// Record a committed batch
    pub fn record_batch<'a>(
        &mut self,
        ids: impl IntoIterator<Item = &'a RecordId>,
        summary: CheckpointSummary,
    ) {
        self.completed_ids
            .extend(ids.into_iter().map(|id| id.as_str().to_string()));
        self.last_batch += 1;
        self.summary = summary;
        self.updated_at = current_timestamp();
    }
}

impl Default for Checkpoint {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads and atomically replaces the checkpoint file
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    /// Create a store for the file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Checkpoint file location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a checkpoint file exists
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the checkpoint, or `None` when there is none
    pub fn load(&self) -> Result<Option<Checkpoint>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&self.path)?;
        let checkpoint: Checkpoint = serde_json::from_str(&content)?;
        if checkpoint.version > CHECKPOINT_VERSION {
            return Err(PipelineError::Checkpoint(format!(
                "{} has version {}, newest supported is {}",
                self.path.display(),
                checkpoint.version,
                CHECKPOINT_VERSION
            )));
        }

        debug!(
            "Loaded checkpoint {} with {} completed ids",
            checkpoint.run_id,
            checkpoint.len()
        );
        Ok(Some(checkpoint))
    }

    /// Completed ids, empty when there is no checkpoint
    pub fn load_completed(&self) -> Result<BTreeSet<RecordId>> {
        Ok(self
            .load()?
            .map(|checkpoint| checkpoint.completed())
            .unwrap_or_default())
    }

    /// Atomically replace the checkpoint (write to a temp file, then rename)
    pub fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        let tmp = tmp_path(&self.path);
        {
            let mut file = std::fs::File::create(&tmp)?;
            serde_json::to_writer_pretty(&mut file, checkpoint)?;
            file.write_all(b"\n")?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp, &self.path)?;

        debug!(
            "Checkpoint saved: {} ids after batch {}",
            checkpoint.len(),
            checkpoint.last_batch
        );
        Ok(())
    }

    /// Delete the checkpoint file if present
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                info!("Cleared checkpoint {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Current timestamp in seconds since Unix epoch
fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
