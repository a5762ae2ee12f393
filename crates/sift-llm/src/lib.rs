//! Sift Inference Gateways
//!
//! Implementations of the `InferenceGateway` trait from `sift-domain`.
//!
//! # Gateways
//!
//! - `MockGateway`: Deterministic, scripted per record id, for tests and dry runs
//! - `OllamaGateway`: Local Ollama API integration
//!
//! # Examples
//!
//! ```
//! use sift_llm::MockGateway;
//! use sift_domain::{InferenceGateway, PromptPayload, RecordId};
//!
//! let gateway = MockGateway::new(r#"{"summary": {"text": "ok"}}"#);
//! let request = PromptPayload {
//!     record_id: RecordId::new("1"),
//!     attempt: 1,
//!     system: String::new(),
//!     prompt: "analyze".to_string(),
//! };
//! assert_eq!(gateway.extract(&request).unwrap(), r#"{"summary": {"text": "ok"}}"#);
//! assert_eq!(gateway.calls_for(&RecordId::new("1")), 1);
//! ```

#![warn(missing_docs)]

pub mod ollama;

use sift_domain::{FailureClass, GatewayFailure, InferenceGateway, PromptPayload, RecordId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

pub use ollama::OllamaGateway;

/// Placeholder replaced with the record id in mock payloads
pub const RECORD_ID_PLACEHOLDER: &str = "{record_id}";

/// Errors that can occur while calling an inference service
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    /// Network or API communication error
    #[error("Communication error: {0}")]
    Communication(String),

    /// The request exceeded its deadline
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The service answered without content
    #[error("Empty response from model")]
    EmptyResponse,

    /// Invalid response envelope from the service
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Model not available
    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    /// Gateway could not be constructed
    #[error("Gateway configuration error: {0}")]
    Config(String),
}

impl GatewayFailure for GatewayError {
    fn class(&self) -> FailureClass {
        match self {
            GatewayError::Timeout(_) => FailureClass::Timeout,
            GatewayError::EmptyResponse => FailureClass::EmptyResponse,
            _ => FailureClass::Transport,
        }
    }
}

/// One scripted reply of the mock gateway
#[derive(Debug, Clone, PartialEq)]
pub enum MockReply {
    /// Return this payload text
    Payload(String),

    /// Fail with a communication error carrying this message
    Fail(String),

    /// Fail with a timeout
    Timeout,
}

/// Mock gateway for deterministic testing
///
/// Replies are scripted per record id. A script is a list of replies consumed
/// one per call; once exhausted the last reply repeats. Records without a
/// script receive the default payload. Every call is counted per record id and
/// its request kept for inspection.
///
/// # Examples
///
/// ```
/// use sift_llm::{MockGateway, MockReply};
/// use sift_domain::{InferenceGateway, PromptPayload, RecordId};
///
/// let mut gateway = MockGateway::new("{}");
/// gateway.add_failure("5");
/// gateway.script("6", vec![MockReply::Fail("flaky".into()), MockReply::Payload("[]".into())]);
///
/// let request = |id: &str| PromptPayload {
///     record_id: RecordId::new(id),
///     attempt: 1,
///     system: String::new(),
///     prompt: String::new(),
/// };
///
/// assert!(gateway.extract(&request("5")).is_err());
/// assert!(gateway.extract(&request("6")).is_err());
/// assert_eq!(gateway.extract(&request("6")).unwrap(), "[]");
/// assert_eq!(gateway.extract(&request("7")).unwrap(), "{}");
/// assert_eq!(gateway.call_count(), 4);
/// ```
#[derive(Debug, Clone)]
pub struct MockGateway {
    default_response: String,
    scripts: Arc<Mutex<HashMap<RecordId, Vec<MockReply>>>>,
    calls: Arc<Mutex<HashMap<RecordId, u32>>>,
    requests: Arc<Mutex<HashMap<RecordId, Vec<PromptPayload>>>>,
}

impl MockGateway {
    /// Create a mock returning `response` for every record without a script
    ///
    /// `{record_id}` inside the response is replaced with the request's record id.
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            default_response: response.into(),
            scripts: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(Mutex::new(HashMap::new())),
            requests: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Script the replies for one record id
    pub fn script(&mut self, id: impl Into<RecordId>, replies: Vec<MockReply>) {
        lock(&self.scripts).insert(id.into(), replies);
    }

    /// Always return `payload` for this record id
    pub fn add_response(&mut self, id: impl Into<RecordId>, payload: impl Into<String>) {
        self.script(id, vec![MockReply::Payload(payload.into())]);
    }

    /// Always fail for this record id
    pub fn add_failure(&mut self, id: impl Into<RecordId>) {
        self.script(id, vec![MockReply::Fail("Mock failure".to_string())]);
    }

    /// Fail the first `failures` calls for this record id, then answer with the default payload
    pub fn add_transient_failures(&mut self, id: impl Into<RecordId>, failures: usize) {
        let mut replies = vec![MockReply::Fail("Mock transient failure".to_string()); failures];
        replies.push(MockReply::Payload(self.default_response.clone()));
        self.script(id, replies);
    }

    /// Total number of calls across all records
    pub fn call_count(&self) -> usize {
        lock(&self.calls).values().map(|count| *count as usize).sum()
    }

    /// Number of calls made for one record id
    pub fn calls_for(&self, id: &RecordId) -> u32 {
        lock(&self.calls).get(id).copied().unwrap_or(0)
    }

    /// Snapshot of the per-record call counts
    pub fn call_counts(&self) -> HashMap<RecordId, u32> {
        lock(&self.calls).clone()
    }

    /// Requests received for one record id, in call order
    pub fn requests_for(&self, id: &RecordId) -> Vec<PromptPayload> {
        lock(&self.requests).get(id).cloned().unwrap_or_default()
    }

    /// Reset all call counters and recorded requests (scripts restart from their first reply)
    pub fn reset_call_count(&self) {
        lock(&self.calls).clear();
        lock(&self.requests).clear();
    }

    fn reply_for(&self, id: &RecordId, call_index: u32) -> MockReply {
        let scripts = lock(&self.scripts);
        match scripts.get(id) {
            Some(replies) if !replies.is_empty() => {
                let idx = (call_index as usize).min(replies.len() - 1);
                replies[idx].clone()
            }
            _ => MockReply::Payload(self.default_response.clone()),
        }
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new("{}")
    }
}

impl InferenceGateway for MockGateway {
    type Error = GatewayError;

    fn extract(&self, request: &PromptPayload) -> Result<String, Self::Error> {
        let call_index = {
            let mut calls = lock(&self.calls);
            let count = calls.entry(request.record_id.clone()).or_insert(0);
            *count += 1;
            *count - 1
        };
        lock(&self.requests)
            .entry(request.record_id.clone())
            .or_default()
            .push(request.clone());

        match self.reply_for(&request.record_id, call_index) {
            MockReply::Payload(payload) => {
                Ok(payload.replace(RECORD_ID_PLACEHOLDER, request.record_id.as_str()))
            }
            MockReply::Fail(message) => Err(GatewayError::Communication(message)),
            MockReply::Timeout => Err(GatewayError::Timeout("mock deadline exceeded".to_string())),
        }
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
