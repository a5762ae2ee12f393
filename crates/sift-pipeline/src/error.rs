//! Error types for pipeline operations

use sift_extractor::ExtractorError;
use thiserror::Error;

/// Infrastructure errors that abort a run
///
/// Per-record extraction failures never surface here; they are written to the
/// output dataset as data.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reading or writing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Checkpoint serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Schema or extraction configuration error
    #[error(transparent)]
    Extractor(#[from] ExtractorError),

    /// Input dataset is unusable
    #[error("Input error: {0}")]
    Input(String),

    /// Output dataset is inconsistent with the input
    #[error("Output error: {0}")]
    Output(String),

    /// Checkpoint file is unusable
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// Worker pool failure (tokio runtime issues)
    #[error("Worker error: {0}")]
    Worker(String),
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
