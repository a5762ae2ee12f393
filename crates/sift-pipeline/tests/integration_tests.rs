//! Integration tests for sift-pipeline
//!
//! These tests run the full scheduler against CSV files in a temp directory
//! with the deterministic mock gateway.

use sift_domain::{InferenceGateway, PromptPayload, RecordId};
use sift_extractor::{ERROR_COLUMN, SUCCESS_COLUMN};
use sift_llm::{GatewayError, MockGateway};
use sift_pipeline::{
    BatchScheduler, Checkpoint, CheckpointStore, CheckpointSummary, OutputDataset, PipelineConfig,
    PipelineError, RunOptions, RunOutcome,
};
use std::path::Path;
use tempfile::TempDir;
use tokio::sync::watch;

const VALID: &str = r#"{
    "classification": {"sentiment": "Negative", "primary_topic": "billing", "resolution_status": "resolved"},
    "scores": {"customer_satisfaction": 2, "agent_empathy": 4, "churn_risk": 0.25},
    "summary": {"summary": "Handled request {record_id}.", "follow_up_required": true}
}"#;

struct Fixture {
    dir: TempDir,
    config: PipelineConfig,
}

impl Fixture {
    fn new(records: usize) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut csv = String::from("id,agent,transcript\n");
        for i in 1..=records {
            let agent = ["ana", "bo", "cy"][i % 3];
            csv.push_str(&format!("{},{},\"Customer {} asked about a charge, twice.\"\n", i, agent, i));
        }
        std::fs::write(dir.path().join("input.csv"), csv).unwrap();

        let mut config = PipelineConfig::default();
        config.input.path = dir.path().join("input.csv");
        config.output.path = dir.path().join("output.csv");
        config.checkpoint.path = dir.path().join("checkpoint.json");
        config.batch.batch_size = 10;
        config.batch.max_concurrency = 4;
        config.extraction.max_attempts = 3;

        Self { dir, config }
    }

    fn scheduler(&self, gateway: MockGateway) -> BatchScheduler<MockGateway> {
        BatchScheduler::new(self.config.clone(), gateway).unwrap()
    }

    fn output(&self) -> OutputDataset {
        OutputDataset::load(&self.config.output.path, "id").unwrap().unwrap()
    }

    fn output_bytes(&self) -> Vec<u8> {
        std::fs::read(&self.config.output.path).unwrap()
    }

    fn checkpoints(&self) -> CheckpointStore {
        CheckpointStore::new(self.config.checkpoint.path.clone())
    }

    fn path(&self, name: &str) -> std::path::PathBuf {
        self.dir.path().join(name)
    }
}

fn gateway_failing_on(ids: &[&str]) -> MockGateway {
    let mut gateway = MockGateway::new(VALID);
    for id in ids {
        gateway.add_failure(*id);
    }
    gateway
}

fn id(raw: &str) -> RecordId {
    RecordId::new(raw)
}

fn row_count(path: &Path) -> usize {
    let mut reader = csv::Reader::from_path(path).unwrap();
    reader.records().count()
}

#[tokio::test]
async fn test_end_to_end_with_permanent_failures() {
    let fixture = Fixture::new(23);
    let gateway = gateway_failing_on(&["5", "17"]);

    let report = fixture
        .scheduler(gateway.clone())
        .run(RunOptions::default())
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);

    let sizes: Vec<usize> = report.metrics.batches.iter().map(|b| b.size).collect();
    assert_eq!(sizes, vec![10, 10, 3]);
    let indices: Vec<usize> = report.metrics.batches.iter().map(|b| b.index).collect();
    assert_eq!(indices, vec![1, 2, 3]);

    assert_eq!(report.metrics.total_succeeded(), 21);
    assert_eq!(report.metrics.total_failed(), 2);
    assert_eq!(report.metrics.failure_kinds["transport"], 2);

    for i in 1..=23 {
        let expected = if i == 5 || i == 17 { 3 } else { 1 };
        assert_eq!(
            gateway.calls_for(&id(&i.to_string())),
            expected,
            "gateway calls for record {}",
            i
        );
    }
    assert_eq!(report.metrics.total_gateway_calls(), 27);

    let output = fixture.output();
    assert_eq!(output.len(), 23);
    assert_eq!(output.get(&id("5"), SUCCESS_COLUMN), Some("false"));
    assert!(output
        .get(&id("5"), ERROR_COLUMN)
        .unwrap()
        .starts_with("transport:"));
    assert_eq!(output.get(&id("5"), "sentiment"), Some(""));
    assert_eq!(output.get(&id("6"), SUCCESS_COLUMN), Some("true"));
    assert_eq!(output.get(&id("6"), "sentiment"), Some("negative"));
    assert_eq!(output.get(&id("6"), "summary"), Some("Handled request 6."));
    assert_eq!(output.get(&id("6"), "agent"), Some("ana"));

    assert!(!fixture.checkpoints().exists(), "checkpoint cleared after full run");
}

#[tokio::test]
async fn test_checkpoint_written_after_each_batch() {
    let fixture = Fixture::new(23);
    let gateway = gateway_failing_on(&["5", "17"]);
    let one_batch = RunOptions {
        max_batches: Some(1),
        ..RunOptions::default()
    };

    let mut expected_completed = 0;
    for expected_batch in 1..=2 {
        let report = fixture
            .scheduler(gateway.clone())
            .run(one_batch.clone())
            .await
            .unwrap();
        assert_eq!(report.outcome, RunOutcome::Stopped);

        expected_completed += 10;
        let checkpoint = fixture.checkpoints().load().unwrap().unwrap();
        assert_eq!(checkpoint.last_batch, expected_batch);
        assert_eq!(checkpoint.len(), expected_completed);
        assert_eq!(checkpoint.summary.completed(), expected_completed);
        assert_eq!(checkpoint.summary.failed, expected_batch);
        assert_eq!(row_count(&fixture.config.output.path), 23);

        // Every checkpointed id has an outcome marker in the output
        let output = fixture.output();
        for completed in checkpoint.ids() {
            assert!(output.has_marker(&id(completed)));
        }
    }

    let report = fixture
        .scheduler(gateway.clone())
        .run(RunOptions::default())
        .await
        .unwrap();
    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.metrics.skipped, 20);
    assert_eq!(report.metrics.batches.len(), 1);
    assert_eq!(report.metrics.batches[0].index, 3);
    assert_eq!(report.metrics.batches[0].size, 3);
}

#[tokio::test]
async fn test_resume_matches_uninterrupted_run() {
    let uninterrupted = Fixture::new(23);
    uninterrupted
        .scheduler(gateway_failing_on(&["5", "17"]))
        .run(RunOptions::default())
        .await
        .unwrap();

    let resumed = Fixture::new(23);
    let gateway = gateway_failing_on(&["5", "17"]);
    let first = resumed
        .scheduler(gateway.clone())
        .run(RunOptions {
            max_batches: Some(1),
            ..RunOptions::default()
        })
        .await
        .unwrap();
    let second = resumed
        .scheduler(gateway.clone())
        .run(RunOptions::default())
        .await
        .unwrap();

    assert_eq!(second.outcome, RunOutcome::Completed);
    assert_eq!(second.run_id, first.run_id);
    assert_eq!(resumed.output_bytes(), uninterrupted.output_bytes());

    // No record was extracted twice across the two invocations
    assert_eq!(gateway.call_count(), 27);
    assert_eq!(gateway.calls_for(&id("1")), 1);
    assert_eq!(gateway.calls_for(&id("17")), 3);
}

#[tokio::test]
async fn test_fully_checkpointed_input_makes_no_calls() {
    let fixture = Fixture::new(12);
    let gateway = gateway_failing_on(&[]);
    fixture
        .scheduler(gateway.clone())
        .run(RunOptions::default())
        .await
        .unwrap();
    let before = fixture.output_bytes();

    // Simulate a crash between the last checkpoint write and its removal
    let ids: Vec<RecordId> = (1..=12).map(|i| id(&i.to_string())).collect();
    let mut checkpoint = Checkpoint::new();
    checkpoint.record_batch(
        &ids,
        CheckpointSummary {
            total_records: 12,
            succeeded: 12,
            failed: 0,
        },
    );
    fixture.checkpoints().save(&checkpoint).unwrap();
    gateway.reset_call_count();

    let report = fixture
        .scheduler(gateway.clone())
        .run(RunOptions::default())
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(gateway.call_count(), 0);
    assert_eq!(report.metrics.skipped, 12);
    assert!(report.metrics.batches.is_empty());
    assert_eq!(fixture.output_bytes(), before);
}

#[tokio::test]
async fn test_stale_checkpoint_ids_are_reprocessed() {
    let fixture = Fixture::new(15);
    let gateway = gateway_failing_on(&[]);
    fixture
        .scheduler(gateway.clone())
        .run(RunOptions {
            max_batches: Some(1),
            ..RunOptions::default()
        })
        .await
        .unwrap();

    // "12" has no outcome in the output yet; "999" is not in the input
    let store = fixture.checkpoints();
    let mut checkpoint = store.load().unwrap().unwrap();
    let summary = checkpoint.summary;
    checkpoint.record_batch(&[id("12"), id("999")], summary);
    store.save(&checkpoint).unwrap();

    let report = fixture
        .scheduler(gateway.clone())
        .run(RunOptions::default())
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.metrics.skipped, 10);
    assert_eq!(gateway.calls_for(&id("12")), 1);
    assert_eq!(gateway.call_count(), 15);
    assert_eq!(fixture.output().get(&id("12"), SUCCESS_COLUMN), Some("true"));
}

#[tokio::test]
async fn test_failure_containment_and_empty_input() {
    let fixture = Fixture::new(0);
    std::fs::write(
        &fixture.config.input.path,
        "id,agent,transcript\n1,ana,hello\n2,bo,\"   \"\n3,cy,goodbye\n",
    )
    .unwrap();
    let gateway = gateway_failing_on(&["3"]);

    let report = fixture
        .scheduler(gateway.clone())
        .run(RunOptions::default())
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.metrics.total_succeeded(), 1);
    assert_eq!(report.metrics.failure_kinds["empty_input"], 1);
    assert_eq!(report.metrics.failure_kinds["transport"], 1);
    assert_eq!(gateway.calls_for(&id("2")), 0);

    let output = fixture.output();
    assert_eq!(output.len(), 3);
    assert_eq!(output.get(&id("2"), SUCCESS_COLUMN), Some("false"));
    assert!(output
        .get(&id("2"), ERROR_COLUMN)
        .unwrap()
        .starts_with("empty_input:"));
}

#[tokio::test]
async fn test_group_metrics() {
    let mut fixture = Fixture::new(6);
    fixture.config.metrics.group_by = Some("agent".to_string());
    let gateway = gateway_failing_on(&["3"]);

    let report = fixture
        .scheduler(gateway)
        .run(RunOptions::default())
        .await
        .unwrap();

    // ids 3 and 6 belong to "ana"
    let ana = report.metrics.groups["ana"];
    assert_eq!(ana.succeeded, 1);
    assert_eq!(ana.failed, 1);
    assert_eq!(report.metrics.groups["bo"].succeeded, 2);
    assert_eq!(report.metrics.groups["cy"].succeeded, 2);
}

#[tokio::test]
async fn test_fresh_run_discards_checkpoint() {
    let fixture = Fixture::new(15);
    let gateway = gateway_failing_on(&[]);
    fixture
        .scheduler(gateway.clone())
        .run(RunOptions {
            max_batches: Some(1),
            ..RunOptions::default()
        })
        .await
        .unwrap();

    let report = fixture
        .scheduler(gateway.clone())
        .run(RunOptions {
            fresh: true,
            ..RunOptions::default()
        })
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.metrics.skipped, 0);
    assert_eq!(report.metrics.total_processed(), 15);
    assert_eq!(gateway.calls_for(&id("1")), 2);
    assert_eq!(gateway.calls_for(&id("15")), 1);
}

#[tokio::test]
async fn test_changed_input_is_fatal_on_resume() {
    let fixture = Fixture::new(15);
    fixture
        .scheduler(gateway_failing_on(&[]))
        .run(RunOptions {
            max_batches: Some(1),
            ..RunOptions::default()
        })
        .await
        .unwrap();
    let checkpoint_before = fixture.checkpoints().load().unwrap();

    std::fs::write(
        &fixture.config.input.path,
        "id,agent,transcript\n1,ana,hello\n2,bo,goodbye\n",
    )
    .unwrap();

    let result = fixture
        .scheduler(gateway_failing_on(&[]))
        .run(RunOptions::default())
        .await;

    assert!(matches!(result, Err(PipelineError::Output(_))));
    assert_eq!(fixture.checkpoints().load().unwrap(), checkpoint_before);
}

#[tokio::test]
async fn test_missing_input_is_fatal() {
    let mut fixture = Fixture::new(3);
    fixture.config.input.path = fixture.path("missing.csv");

    let result = fixture
        .scheduler(gateway_failing_on(&[]))
        .run(RunOptions::default())
        .await;

    assert!(matches!(result, Err(PipelineError::Input(_))));
    assert!(!fixture.checkpoints().exists());
}

/// Gateway that raises the shutdown flag on its first call
struct InterruptingGateway {
    inner: MockGateway,
    shutdown: watch::Sender<bool>,
}

impl InferenceGateway for InterruptingGateway {
    type Error = GatewayError;

    fn extract(&self, request: &PromptPayload) -> Result<String, Self::Error> {
        self.shutdown.send_replace(true);
        self.inner.extract(request)
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

#[tokio::test]
async fn test_interrupt_finishes_in_flight_batch() {
    let fixture = Fixture::new(23);
    let (tx, rx) = watch::channel(false);
    let inner = MockGateway::new(VALID);
    let gateway = InterruptingGateway {
        inner: inner.clone(),
        shutdown: tx,
    };

    let report = BatchScheduler::new(fixture.config.clone(), gateway)
        .unwrap()
        .with_shutdown(rx)
        .run(RunOptions::default())
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Interrupted);
    assert_eq!(report.metrics.batches.len(), 1);
    assert_eq!(inner.call_count(), 10);

    let checkpoint = fixture.checkpoints().load().unwrap().unwrap();
    assert_eq!(checkpoint.len(), 10);
    assert_eq!(row_count(&fixture.config.output.path), 23);
}
