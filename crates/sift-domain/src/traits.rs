//! Trait definitions for external interactions
//!
//! These traits define the boundaries between domain logic and infrastructure.
//! Infrastructure implementations live in other crates.

use crate::RecordId;

/// Request sent to an inference service for one extraction attempt
#[derive(Debug, Clone, PartialEq)]
pub struct PromptPayload {
    /// Record the request is for
    pub record_id: RecordId,

    /// 1-based attempt number
    pub attempt: u32,

    /// System instructions (schema description, output rules)
    pub system: String,

    /// User prompt (record text, previous error if any)
    pub prompt: String,
}

/// Coarse classification of a gateway failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    /// Connection, HTTP status or protocol failure
    Transport,

    /// The call exceeded its deadline
    Timeout,

    /// The service answered successfully but with no content
    EmptyResponse,
}

/// Trait implemented by gateway error types so callers can classify failures
/// without knowing the concrete gateway
pub trait GatewayFailure: std::fmt::Display {
    /// Classify this failure
    fn class(&self) -> FailureClass;
}

/// Trait for the external text-to-structure service
///
/// Implemented by the infrastructure layer (sift-llm). Calls are synchronous
/// request/response; implementations must be safe to share between workers.
/// Any non-success, empty or timed-out response is an `Err`. Attempt-level
/// timeouts belong to the implementation.
pub trait InferenceGateway {
    /// Error type for gateway operations
    type Error;

    /// Send one request and return the raw structured payload text
    fn extract(&self, request: &PromptPayload) -> Result<String, Self::Error>;

    /// Name of the model serving requests (recorded in logs)
    fn model_name(&self) -> &str;
}
