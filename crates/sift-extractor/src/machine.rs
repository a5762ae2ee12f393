//! Drives one record through the row state machine

use crate::config::ExtractionConfig;
use crate::error::{AttemptError, AttemptErrorKind};
use crate::parser::parse_payload;
use crate::prompt::PromptBuilder;
use crate::schema::ExtractionSchema;
use crate::state::{transition, Phase, RowState, Signal, TransitionContext};
use serde_json::{Map, Value};
use sift_domain::{FailureClass, GatewayFailure, InferenceGateway, PromptPayload, Record};
use std::sync::Arc;
use tracing::{debug, warn};

/// Runs the per-record extraction state machine against a gateway
///
/// `run` never fails: every gateway, parse or validation problem ends up as
/// the row's terminal [`RowOutcome`](crate::RowOutcome).
pub struct RowMachine<G> {
    gateway: Arc<G>,
    schema: Arc<ExtractionSchema>,
    config: ExtractionConfig,
}

impl<G> Clone for RowMachine<G> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
            schema: Arc::clone(&self.schema),
            config: self.config.clone(),
        }
    }
}

impl<G> RowMachine<G>
where
    G: InferenceGateway + Send + Sync + 'static,
    G::Error: GatewayFailure,
{
    /// Create a new row machine
    pub fn new(gateway: Arc<G>, schema: Arc<ExtractionSchema>, config: ExtractionConfig) -> Self {
        Self {
            gateway,
            schema,
            config,
        }
    }

    /// Extraction configuration in use
    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Schema results are validated against
    pub fn schema(&self) -> &ExtractionSchema {
        &self.schema
    }

    /// Drive `record` from `PREPARE` to a terminal phase
    pub async fn run(&self, record: &Record) -> RowState {
        let mut state = RowState::new(record.id().clone());
        let mut payload: Option<Map<String, Value>> = None;

        while !state.is_terminal() {
            let phase = state.phase();
            let signal = match phase {
                Phase::Prepare => self.prepare(record, &mut state),
                Phase::Extract => {
                    let request = self.build_payload(record, &state);
                    state.begin_attempt();
                    match self.call_gateway(request).await.and_then(|raw| parse_payload(&raw)) {
                        Ok(parsed) => {
                            payload = Some(parsed);
                            Signal::Ok
                        }
                        Err(err) => {
                            let kind = err.kind;
                            state.record_error(err);
                            Signal::Failed(kind)
                        }
                    }
                }
                Phase::Validate => {
                    let parsed = payload.take().unwrap_or_default();
                    match self.schema.validate_payload(record.id(), &parsed) {
                        Ok(result) => {
                            state.record_result(result);
                            Signal::Ok
                        }
                        Err(err) => {
                            let kind = err.kind;
                            state.record_error(err);
                            Signal::Failed(kind)
                        }
                    }
                }
                Phase::CheckRetry => match state.last_error() {
                    Some(err) => Signal::Failed(err.kind),
                    None => Signal::Ok,
                },
                Phase::Complete | Phase::Fail => break,
            };

            let ctx = TransitionContext {
                attempt: state.attempt(),
                max_attempts: self.config.max_attempts,
                retry_on_validation_error: self.config.retry_on_validation_error,
            };
            let next = transition(phase, signal, ctx);

            debug!(
                record_id = %record.id(),
                attempt = state.attempt(),
                "{} -> {}",
                phase,
                next
            );

            if phase == Phase::CheckRetry && next == Phase::Fail {
                if let Some(err) = state.last_error() {
                    warn!(
                        record_id = %record.id(),
                        attempts = state.attempt(),
                        "Extraction failed permanently: {}",
                        err
                    );
                }
            }

            state.advance(next);
        }

        state
    }

    /// Reject records with no text; the prompt itself is rendered per attempt in `EXTRACT`
    fn prepare(&self, record: &Record, state: &mut RowState) -> Signal {
        state.clear_error();

        if !record.has_text() {
            warn!(record_id = %record.id(), "Record has no text to analyze");
            state.record_error(AttemptError::new(
                AttemptErrorKind::EmptyInput,
                "record has no text to analyze",
            ));
            return Signal::Failed(AttemptErrorKind::EmptyInput);
        }

        Signal::Ok
    }

    fn build_payload(&self, record: &Record, state: &RowState) -> PromptPayload {
        let attempt = state.attempt();
        // Only a failure from an earlier attempt is fed back
        let previous_error = if attempt > 1 { state.last_error() } else { None };

        PromptBuilder::new(record, &self.schema)
            .with_instructions(self.config.instructions.as_deref())
            .with_previous_error(previous_error)
            .with_max_text_length(self.config.max_text_length)
            .build(attempt)
    }

    /// Call the gateway in a blocking context since `InferenceGateway` is not async
    async fn call_gateway(&self, payload: PromptPayload) -> Result<String, AttemptError> {
        let gateway = Arc::clone(&self.gateway);

        debug!(
            record_id = %payload.record_id,
            attempt = payload.attempt,
            model = gateway.model_name(),
            "Calling inference gateway"
        );

        tokio::task::spawn_blocking(move || gateway.extract(&payload).map_err(|e| classify(&e)))
            .await
            .unwrap_or_else(|e| {
                Err(AttemptError::new(
                    AttemptErrorKind::Transport,
                    format!("Task join error: {}", e),
                ))
            })
    }
}

/// Map a gateway failure onto the attempt error taxonomy
fn classify<E: GatewayFailure>(error: &E) -> AttemptError {
    let kind = match error.class() {
        FailureClass::Transport => AttemptErrorKind::Transport,
        FailureClass::Timeout => AttemptErrorKind::Timeout,
        FailureClass::EmptyResponse => AttemptErrorKind::EmptyResponse,
    };
    AttemptError::new(kind, error.to_string())
}
