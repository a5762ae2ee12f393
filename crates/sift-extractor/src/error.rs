//! Error types for the Extractor

use std::fmt;
use thiserror::Error;

/// Errors raised while configuring extraction
///
/// Per-record failures are never reported through this type; they are
/// [`AttemptError`] values carried inside a row's state.
#[derive(Error, Debug)]
pub enum ExtractorError {
    /// Schema definition is unusable
    #[error("Schema error: {0}")]
    Schema(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Category of a failed extraction attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AttemptErrorKind {
    /// Connection or protocol failure reaching the service
    Transport,

    /// The service call exceeded its deadline
    Timeout,

    /// The service answered with no content
    EmptyResponse,

    /// The response could not be parsed as a payload at all
    MalformedPayload,

    /// The payload parsed but violated the schema
    Validation,

    /// The record has no text to analyze
    EmptyInput,
}

impl AttemptErrorKind {
    /// Stable snake_case name, used in summaries and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptErrorKind::Transport => "transport",
            AttemptErrorKind::Timeout => "timeout",
            AttemptErrorKind::EmptyResponse => "empty_response",
            AttemptErrorKind::MalformedPayload => "malformed_payload",
            AttemptErrorKind::Validation => "validation",
            AttemptErrorKind::EmptyInput => "empty_input",
        }
    }
}

impl fmt::Display for AttemptErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a single extraction attempt failed
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind}: {message}")]
pub struct AttemptError {
    /// Failure category
    pub kind: AttemptErrorKind,

    /// Human-readable detail
    pub message: String,
}

impl AttemptError {
    /// Create an attempt error
    pub fn new(kind: AttemptErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Shorthand for a schema validation failure
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(AttemptErrorKind::Validation, message)
    }

    /// Shorthand for an unparseable payload
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(AttemptErrorKind::MalformedPayload, message)
    }
}
