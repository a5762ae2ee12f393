//! Ollama Gateway Implementation
//!
//! Provides integration with Ollama's local LLM API.
//!
//! # Features
//!
//! - HTTP communication with the Ollama generate API
//! - JSON output mode so responses parse as a structured payload
//! - Per-request timeout owned by the HTTP client
//! - No internal retries: retrying is the row state machine's job
//!
//! # Examples
//!
//! ```no_run
//! use sift_llm::OllamaGateway;
//! use std::time::Duration;
//!
//! let gateway = OllamaGateway::new("http://localhost:11434", "llama3.1", Duration::from_secs(60))
//!     .expect("client builds");
//! ```

use crate::GatewayError;
use serde::{Deserialize, Serialize};
use sift_domain::{InferenceGateway, PromptPayload};
use std::time::Duration;
use tracing::debug;

/// Default Ollama API endpoint
pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

/// Default timeout for a single request (120 seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Ollama API gateway for local LLM inference
#[derive(Debug, Clone)]
pub struct OllamaGateway {
    endpoint: String,
    model: String,
    timeout: Duration,
    client: reqwest::Client,
}

/// Request body for Ollama generate API
#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
    stream: bool,
    format: &'a str,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

/// Response from Ollama generate API
#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
    #[allow(dead_code)]
    done: bool,
}

impl OllamaGateway {
    /// Create a new Ollama gateway
    ///
    /// # Parameters
    ///
    /// - `endpoint`: Ollama API endpoint (e.g., "http://localhost:11434")
    /// - `model`: Model to use (e.g., "llama3.1", "mistral")
    /// - `timeout`: Deadline for each request
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Config` if the HTTP client cannot be built.
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            timeout,
            client,
        })
    }

    /// Create a new Ollama gateway on `http://localhost:11434` with the default timeout
    pub fn default_endpoint(model: impl Into<String>) -> Result<Self, GatewayError> {
        Self::new(
            DEFAULT_ENDPOINT,
            model,
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        )
    }

    /// Configured request timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send one generate request
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Ollama is not running or the request times out
    /// - Model is not available
    /// - The response envelope is invalid or the model produced no content
    pub async fn generate(&self, request: &PromptPayload) -> Result<String, GatewayError> {
        let url = format!("{}/api/generate", self.endpoint);

        let body = OllamaGenerateRequest {
            model: &self.model,
            system: &request.system,
            prompt: &request.prompt,
            stream: false,
            format: "json",
            options: OllamaOptions { temperature: 0.0 },
        };

        debug!(
            record_id = %request.record_id,
            attempt = request.attempt,
            prompt_len = request.prompt.len(),
            "Sending generate request"
        );

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(GatewayError::ModelNotAvailable(self.model.clone()));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(GatewayError::RateLimitExceeded);
        }
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(GatewayError::Communication(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        let envelope = response
            .json::<OllamaGenerateResponse>()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout(e.to_string())
                } else {
                    GatewayError::InvalidResponse(format!("Failed to parse response: {}", e))
                }
            })?;

        if envelope.response.trim().is_empty() {
            return Err(GatewayError::EmptyResponse);
        }

        Ok(envelope.response)
    }
}

fn map_transport_error(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout(e.to_string())
    } else {
        GatewayError::Communication(format!("Request failed: {}", e))
    }
}

impl InferenceGateway for OllamaGateway {
    type Error = GatewayError;

    /// Blocking wrapper around [`OllamaGateway::generate`]
    ///
    /// Must be called from a blocking context (e.g. `spawn_blocking`) when a
    /// Tokio runtime is running; otherwise a private runtime is created.
    fn extract(&self, request: &PromptPayload) -> Result<String, Self::Error> {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle.block_on(self.generate(request)),
            Err(_) => tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| GatewayError::Config(format!("Failed to start runtime: {}", e)))?
                .block_on(self.generate(request)),
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
