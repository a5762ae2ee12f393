//! Sift Domain Layer
//!
//! This crate contains the core domain model for Sift. It has no external
//! dependencies and defines the records, extraction results and trait
//! boundaries that every other layer builds on.
//!
//! ## Key Concepts
//!
//! - **Record**: One immutable input row with a stable id and the text to analyze
//! - **ExtractionResult**: Typed, schema-validated output for one record
//! - **PromptPayload**: The request sent to an inference service for one attempt
//! - **InferenceGateway**: The boundary to the external text-to-structure service
//!
//! ## Architecture
//!
//! - No external crate dependencies
//! - Pure data and trait definitions only
//! - Gateway implementations live in `sift-llm`
//! - Orchestration lives in `sift-extractor` and `sift-pipeline`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod record;
pub mod result;
pub mod traits;

// Re-exports for convenience
pub use record::{Record, RecordId, TextBlob};
pub use result::{ExtractionResult, FieldValue};
pub use traits::{FailureClass, GatewayFailure, InferenceGateway, PromptPayload};
