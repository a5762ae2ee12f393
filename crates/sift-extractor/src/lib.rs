//! Sift Extractor
//!
//! Turns one record's free text into a validated, typed result by driving a
//! per-row state machine against an inference gateway.
//!
//! # Architecture
//!
//! ```text
//! Record → PromptBuilder → InferenceGateway → parse_payload → ExtractionSchema
//!             ▲                                                    │
//!             └──────────── previous error (retry) ◀───────────────┘
//! ```
//!
//! # Key Features
//!
//! - **Explicit row states**: `PREPARE → EXTRACT → VALIDATE → COMPLETE`, with
//!   failures routed through `CHECK_RETRY` and a pure [`transition`] function
//! - **Bounded retries**: at most `max_attempts` gateway calls per record
//! - **Self-correction**: a retried prompt carries the previous error
//! - **Schema as data**: sections and typed fields loaded from configuration
//! - **Failure containment**: [`RowMachine::run`] never returns an error; every
//!   problem becomes the row's terminal [`RowOutcome`]
//!
//! # Example Usage
//!
//! ```no_run
//! use sift_extractor::{ExtractionConfig, ExtractionSchema, RowMachine, RowOutcome};
//! use sift_domain::{Record, TextBlob};
//! use sift_llm::MockGateway;
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let machine = RowMachine::new(
//!     Arc::new(MockGateway::default()),
//!     Arc::new(ExtractionSchema::default()),
//!     ExtractionConfig::default(),
//! );
//!
//! let record = Record::new("42", vec![], vec![TextBlob::new("transcript", "Hi, my bill is wrong.")]);
//! let state = machine.run(&record).await;
//!
//! match state.into_outcome() {
//!     RowOutcome::Success(result) => println!("{} fields", result.len()),
//!     RowOutcome::Failure(err) => println!("failed: {}", err),
//! }
//! # }
//! ```

#![warn(missing_docs)]

mod error;
mod config;
mod schema;
mod parser;
mod prompt;
mod state;
mod machine;

#[cfg(test)]
mod tests;

pub use error::{AttemptError, AttemptErrorKind, ExtractorError};
pub use config::ExtractionConfig;
pub use schema::{ExtractionSchema, FieldKind, FieldSpec, SectionSpec, ERROR_COLUMN, SUCCESS_COLUMN};
pub use parser::parse_payload;
pub use prompt::PromptBuilder;
pub use state::{
    transition, ExtractionAttempt, Phase, RowOutcome, RowState, Signal, TransitionContext,
};
pub use machine::RowMachine;
