//! Row state machine: phases, the pure transition function, and per-row state
//!
//! ```text
//! PREPARE ──▶ EXTRACT ──▶ VALIDATE ──▶ COMPLETE
//!    │           │            │
//!    │           ▼            ▼
//!    │        CHECK_RETRY ◀───┘
//!    │           │   │
//!    │           │   └──▶ EXTRACT (attempt + 1)
//!    ▼           ▼
//!   FAIL ◀───────┘
//! ```

use crate::error::{AttemptError, AttemptErrorKind};
use sift_domain::{ExtractionResult, RecordId};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Phase of a row's extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Check the record has text to analyze
    Prepare,

    /// Render the prompt, call the inference gateway once and parse the reply
    Extract,

    /// Check the parsed payload against the schema
    Validate,

    /// Decide between another attempt and failure
    CheckRetry,

    /// Terminal success
    Complete,

    /// Terminal failure
    Fail,
}

impl Phase {
    /// Whether the phase is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Complete | Phase::Fail)
    }

    /// Upper-case name used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Prepare => "PREPARE",
            Phase::Extract => "EXTRACT",
            Phase::Validate => "VALIDATE",
            Phase::CheckRetry => "CHECK_RETRY",
            Phase::Complete => "COMPLETE",
            Phase::Fail => "FAIL",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of executing the current phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// The phase succeeded
    Ok,

    /// The phase failed (for `CHECK_RETRY`: the error being considered)
    Failed(AttemptErrorKind),
}

/// Inputs the transition function needs besides phase and signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionContext {
    /// Current 1-based attempt number (0 before the first extract)
    pub attempt: u32,

    /// Maximum gateway calls for the row
    pub max_attempts: u32,

    /// Whether validation failures may be retried
    pub retry_on_validation_error: bool,
}

/// Whether a failure of `kind` may consume another attempt
pub(crate) fn retryable(kind: AttemptErrorKind, retry_on_validation_error: bool) -> bool {
    match kind {
        AttemptErrorKind::EmptyInput => false,
        AttemptErrorKind::Validation => retry_on_validation_error,
        _ => true,
    }
}

/// Pure transition function of the row state machine
pub fn transition(phase: Phase, signal: Signal, ctx: TransitionContext) -> Phase {
    match (phase, signal) {
        (Phase::Prepare, Signal::Ok) => Phase::Extract,
        (Phase::Prepare, Signal::Failed(_)) => Phase::Fail,
        (Phase::Extract, Signal::Ok) => Phase::Validate,
        (Phase::Extract, Signal::Failed(_)) => Phase::CheckRetry,
        (Phase::Validate, Signal::Ok) => Phase::Complete,
        (Phase::Validate, Signal::Failed(_)) => Phase::CheckRetry,
        (Phase::CheckRetry, Signal::Failed(kind))
            if retryable(kind, ctx.retry_on_validation_error) && ctx.attempt < ctx.max_attempts =>
        {
            Phase::Extract
        }
        (Phase::CheckRetry, _) => Phase::Fail,
        (terminal @ (Phase::Complete | Phase::Fail), _) => terminal,
    }
}

/// One call to the gateway and what came of it
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionAttempt {
    /// 1-based attempt number
    pub number: u32,

    /// Start time, seconds since Unix epoch
    pub started_at: u64,

    /// Failure of this attempt, if any
    pub error: Option<AttemptError>,

    /// Validated result, if this attempt succeeded
    pub result: Option<ExtractionResult>,
}

/// Terminal result of a row, ready to merge
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    /// Validated extraction
    Success(ExtractionResult),

    /// Permanent failure with the last error
    Failure(AttemptError),
}

impl RowOutcome {
    /// Whether the row succeeded
    pub fn is_success(&self) -> bool {
        matches!(self, RowOutcome::Success(_))
    }
}

/// Per-record mutable progress
#[derive(Debug, Clone)]
pub struct RowState {
    record_id: RecordId,
    phase: Phase,
    attempt: u32,
    attempts: Vec<ExtractionAttempt>,
    last_error: Option<AttemptError>,
    outcome: Option<RowOutcome>,
    history: Vec<Phase>,
}

impl RowState {
    /// Create a row in `PREPARE`
    pub fn new(record_id: RecordId) -> Self {
        Self {
            record_id,
            phase: Phase::Prepare,
            attempt: 0,
            attempts: Vec::new(),
            last_error: None,
            outcome: None,
            history: vec![Phase::Prepare],
        }
    }

    /// Record this state tracks
    pub fn record_id(&self) -> &RecordId {
        &self.record_id
    }

    /// Current phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Current attempt number (0 before the first extract)
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Attempts made so far
    pub fn attempts(&self) -> &[ExtractionAttempt] {
        &self.attempts
    }

    /// Number of gateway calls made so far
    pub fn extract_calls(&self) -> usize {
        self.attempts.len()
    }

    /// Error of the most recent failed step
    pub fn last_error(&self) -> Option<&AttemptError> {
        self.last_error.as_ref()
    }

    /// Terminal outcome, once reached
    pub fn outcome(&self) -> Option<&RowOutcome> {
        self.outcome.as_ref()
    }

    /// Every phase entered so far, starting with `PREPARE`
    pub fn history(&self) -> &[Phase] {
        &self.history
    }

    /// Whether a terminal phase has been reached
    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Consume the state, returning the terminal outcome
    ///
    /// A row that never reached a terminal phase is reported as a failure.
    pub fn into_outcome(self) -> RowOutcome {
        self.outcome.unwrap_or_else(|| {
            RowOutcome::Failure(self.last_error.unwrap_or_else(|| {
                AttemptError::new(
                    AttemptErrorKind::Transport,
                    format!("row stopped in {} before finishing", self.phase),
                )
            }))
        })
    }

    pub(crate) fn clear_error(&mut self) {
        self.last_error = None;
    }

    pub(crate) fn begin_attempt(&mut self) {
        self.attempts.push(ExtractionAttempt {
            number: self.attempt,
            started_at: current_timestamp(),
            error: None,
            result: None,
        });
    }

    pub(crate) fn record_error(&mut self, error: AttemptError) {
        if let Some(current) = self.attempts.last_mut() {
            current.error = Some(error.clone());
        }
        self.last_error = Some(error);
    }

    pub(crate) fn record_result(&mut self, result: ExtractionResult) {
        if let Some(current) = self.attempts.last_mut() {
            current.result = Some(result);
        }
    }

    /// Move to `next`, applying the side effects of entering it
    pub(crate) fn advance(&mut self, next: Phase) {
        match (self.phase, next) {
            (Phase::Prepare, Phase::Extract) => self.attempt = 1,
            (Phase::CheckRetry, Phase::Extract) => self.attempt += 1,
            _ => {}
        }

        match next {
            Phase::Complete => {
                let result = self
                    .attempts
                    .last()
                    .and_then(|attempt| attempt.result.clone());
                self.outcome = Some(match result {
                    Some(result) => RowOutcome::Success(result),
                    None => RowOutcome::Failure(AttemptError::validation(
                        "completed without a validated result",
                    )),
                });
            }
            Phase::Fail => {
                let error = self.last_error.clone().unwrap_or_else(|| {
                    AttemptError::new(AttemptErrorKind::Transport, "failed without a recorded error")
                });
                self.outcome = Some(RowOutcome::Failure(error));
            }
            _ => {}
        }

        self.phase = next;
        self.history.push(next);
    }
}

/// Current timestamp in seconds since Unix epoch
fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
