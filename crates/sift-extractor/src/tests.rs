//! Row machine flow tests against the mock gateway

#[cfg(test)]
mod tests {
    use crate::{
        AttemptErrorKind, ExtractionConfig, ExtractionSchema, Phase, RowMachine, RowOutcome,
    };
    use sift_domain::{FieldValue, Record, RecordId, TextBlob};
    use sift_llm::{MockGateway, MockReply};
    use std::sync::Arc;

    const VALID: &str = r#"{
        "classification": {"sentiment": "negative", "primary_topic": "billing", "resolution_status": "resolved"},
        "scores": {"customer_satisfaction": 2, "agent_empathy": 5},
        "summary": {"summary": "Refund issued for record {record_id}.", "follow_up_required": false}
    }"#;

    fn record(id: &str) -> Record {
        Record::new(
            id,
            vec![("channel".to_string(), "phone".to_string())],
            vec![TextBlob::new("transcript", "My bill doubled and nobody called back.")],
        )
    }

    fn machine(gateway: MockGateway, config: ExtractionConfig) -> RowMachine<MockGateway> {
        RowMachine::new(
            Arc::new(gateway),
            Arc::new(ExtractionSchema::default()),
            config,
        )
    }

    #[tokio::test]
    async fn test_full_extraction_flow() {
        let gateway = MockGateway::new(VALID);
        let machine = machine(gateway.clone(), ExtractionConfig::default());

        let state = machine.run(&record("1")).await;

        assert_eq!(state.phase(), Phase::Complete);
        assert_eq!(state.extract_calls(), 1);
        assert_eq!(gateway.calls_for(&RecordId::new("1")), 1);

        match state.into_outcome() {
            RowOutcome::Success(result) => {
                assert_eq!(result.record_id, RecordId::new("1"));
                assert_eq!(
                    result.get("customer_satisfaction"),
                    Some(&FieldValue::Integer(2))
                );
                assert_eq!(
                    result.get("summary"),
                    Some(&FieldValue::Text("Refund issued for record 1.".to_string()))
                );
                assert_eq!(result.get("churn_risk"), None);
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_transient_failures_recover() {
        let mut gateway = MockGateway::new(VALID);
        gateway.add_transient_failures("7", 2);
        let machine = machine(gateway.clone(), ExtractionConfig::default());

        let state = machine.run(&record("7")).await;

        assert_eq!(state.phase(), Phase::Complete);
        assert_eq!(state.attempt(), 3);
        assert_eq!(gateway.calls_for(&RecordId::new("7")), 3);
        assert_eq!(
            state.attempts()[0].error.as_ref().map(|e| e.kind),
            Some(AttemptErrorKind::Transport)
        );
        assert!(state.attempts()[2].result.is_some());
    }

    #[tokio::test]
    async fn test_permanent_failure_exhausts_budget() {
        let mut gateway = MockGateway::new(VALID);
        gateway.add_failure("5");
        let machine = machine(gateway.clone(), ExtractionConfig::default());

        let state = machine.run(&record("5")).await;

        assert_eq!(state.phase(), Phase::Fail);
        assert_eq!(gateway.calls_for(&RecordId::new("5")), 3);
        match state.into_outcome() {
            RowOutcome::Failure(err) => {
                assert_eq!(err.kind, AttemptErrorKind::Transport);
                assert!(err.message.contains("Mock failure"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_timeout_is_classified() {
        let mut gateway = MockGateway::new(VALID);
        gateway.script("3", vec![MockReply::Timeout]);
        let config = ExtractionConfig {
            max_attempts: 1,
            ..ExtractionConfig::default()
        };
        let machine = machine(gateway.clone(), config);

        let state = machine.run(&record("3")).await;

        assert_eq!(gateway.calls_for(&RecordId::new("3")), 1);
        assert_eq!(state.last_error().map(|e| e.kind), Some(AttemptErrorKind::Timeout));
    }

    #[tokio::test]
    async fn test_malformed_then_valid() {
        let mut gateway = MockGateway::new(VALID);
        gateway.script(
            "9",
            vec![
                MockReply::Payload("I could not produce JSON, sorry".to_string()),
                MockReply::Payload(VALID.to_string()),
            ],
        );
        let machine = machine(gateway.clone(), ExtractionConfig::default());

        let state = machine.run(&record("9")).await;

        assert_eq!(state.phase(), Phase::Complete);
        assert_eq!(gateway.calls_for(&RecordId::new("9")), 2);
        assert_eq!(
            state.attempts()[0].error.as_ref().map(|e| e.kind),
            Some(AttemptErrorKind::MalformedPayload)
        );
    }

    #[tokio::test]
    async fn test_unparseable_reply_skips_validate() {
        let mut gateway = MockGateway::new(VALID);
        gateway.add_response("8", "this is not json at all");
        let machine = machine(gateway.clone(), ExtractionConfig::default());

        let state = machine.run(&record("8")).await;

        assert_eq!(
            state.history(),
            &[
                Phase::Prepare,
                Phase::Extract,
                Phase::CheckRetry,
                Phase::Extract,
                Phase::CheckRetry,
                Phase::Extract,
                Phase::CheckRetry,
                Phase::Fail,
            ]
        );
        assert_eq!(gateway.calls_for(&RecordId::new("8")), 3);
        assert_eq!(
            state.last_error().map(|e| e.kind),
            Some(AttemptErrorKind::MalformedPayload)
        );
    }

    #[tokio::test]
    async fn test_schema_mismatch_goes_through_validate() {
        let mut gateway = MockGateway::new(VALID);
        gateway.add_response("4", r#"{"classification": {"sentiment": "angry"}}"#);
        let config = ExtractionConfig {
            retry_on_validation_error: false,
            ..ExtractionConfig::default()
        };
        let machine = machine(gateway, config);

        let state = machine.run(&record("4")).await;

        assert_eq!(
            state.history(),
            &[
                Phase::Prepare,
                Phase::Extract,
                Phase::Validate,
                Phase::CheckRetry,
                Phase::Fail,
            ]
        );
    }

    #[tokio::test]
    async fn test_retry_prompt_carries_previous_error() {
        let mut gateway = MockGateway::new(VALID);
        gateway.script(
            "6",
            vec![
                MockReply::Payload("no JSON here".to_string()),
                MockReply::Payload(VALID.to_string()),
            ],
        );
        let machine = machine(gateway.clone(), ExtractionConfig::default());

        let state = machine.run(&record("6")).await;

        assert_eq!(state.phase(), Phase::Complete);
        let first_error = state.attempts()[0]
            .error
            .clone()
            .expect("first attempt failed");

        let requests = gateway.requests_for(&RecordId::new("6"));
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].attempt, 1);
        assert!(!requests[0].prompt.contains("previous response"));
        assert_eq!(requests[1].attempt, 2);
        assert!(requests[1].prompt.contains("previous response was rejected"));
        assert!(requests[1].prompt.contains(&first_error.message));
    }

    #[tokio::test]
    async fn test_first_prompt_has_no_feedback() {
        let gateway = MockGateway::new(VALID);
        let machine = machine(gateway.clone(), ExtractionConfig::default());

        let state = machine.run(&record("2")).await;

        assert_eq!(state.phase(), Phase::Complete);
        let requests = gateway.requests_for(&RecordId::new("2"));
        assert_eq!(requests.len(), 1);
        assert!(!requests[0].prompt.contains("previous response"));
    }

    #[tokio::test]
    async fn test_validation_failure_retried_by_default() {
        let mut gateway = MockGateway::new(VALID);
        gateway.add_response("4", r#"{"classification": {"sentiment": "angry"}}"#);
        let machine = machine(gateway.clone(), ExtractionConfig::default());

        let state = machine.run(&record("4")).await;

        assert_eq!(state.phase(), Phase::Fail);
        assert_eq!(gateway.calls_for(&RecordId::new("4")), 3);
        assert_eq!(state.last_error().map(|e| e.kind), Some(AttemptErrorKind::Validation));
    }

    #[tokio::test]
    async fn test_validation_failure_not_retried_when_disabled() {
        let mut gateway = MockGateway::new(VALID);
        gateway.add_response("4", r#"{"classification": {"sentiment": "angry"}}"#);
        let config = ExtractionConfig {
            retry_on_validation_error: false,
            ..ExtractionConfig::default()
        };
        let machine = machine(gateway.clone(), config);

        let state = machine.run(&record("4")).await;

        assert_eq!(state.phase(), Phase::Fail);
        assert_eq!(gateway.calls_for(&RecordId::new("4")), 1);
    }

    #[tokio::test]
    async fn test_empty_input_never_calls_gateway() {
        let gateway = MockGateway::new(VALID);
        let machine = machine(gateway.clone(), ExtractionConfig::default());
        let blank = Record::new("11", vec![], vec![TextBlob::new("transcript", "   ")]);

        let state = machine.run(&blank).await;

        assert_eq!(state.phase(), Phase::Fail);
        assert_eq!(state.extract_calls(), 0);
        assert_eq!(gateway.call_count(), 0);
        assert_eq!(
            state.last_error().map(|e| e.kind),
            Some(AttemptErrorKind::EmptyInput)
        );
    }

    #[tokio::test]
    async fn test_concurrent_rows_are_independent() {
        let mut gateway = MockGateway::new(VALID);
        gateway.add_failure("2");
        let machine = machine(gateway.clone(), ExtractionConfig::default());

        let mut handles = Vec::new();
        for id in ["1", "2", "3", "4"] {
            let machine = machine.clone();
            handles.push(tokio::spawn(async move { machine.run(&record(id)).await }));
        }

        let mut succeeded = 0;
        for handle in handles {
            let state = handle.await.unwrap();
            if state.outcome().map(|o| o.is_success()).unwrap_or(false) {
                succeeded += 1;
            } else {
                assert_eq!(state.record_id(), &RecordId::new("2"));
            }
        }

        assert_eq!(succeeded, 3);
        assert_eq!(gateway.call_count(), 6);
    }
}
