//! Idempotent merge of row outcomes into the output dataset

use crate::error::{PipelineError, Result};
use crate::output::OutputDataset;
use sift_domain::RecordId;
use sift_extractor::{ExtractionSchema, RowOutcome, ERROR_COLUMN, SUCCESS_COLUMN};
use std::sync::Arc;

/// Folds terminal row outcomes into an [`OutputDataset`]
///
/// Merging overwrites only the extraction columns of existing rows, so
/// merging the same outcome twice leaves the dataset unchanged.
#[derive(Debug, Clone)]
pub struct ResultMerger {
    schema: Arc<ExtractionSchema>,
}

impl ResultMerger {
    /// Create a merger for the given schema
    pub fn new(schema: Arc<ExtractionSchema>) -> Self {
        Self { schema }
    }

    /// Merge a batch of outcomes; returns how many rows were written
    ///
    /// Fails without touching any row when an id has no output row.
    pub fn merge(&self, output: &mut OutputDataset, outcomes: &[(RecordId, RowOutcome)]) -> Result<usize> {
        for (id, _) in outcomes {
            if !output.contains(id) {
                return Err(PipelineError::Output(format!(
                    "no output row for record '{}'",
                    id
                )));
            }
        }

        for (id, outcome) in outcomes {
            self.merge_one(output, id, outcome)?;
        }
        Ok(outcomes.len())
    }

    fn merge_one(&self, output: &mut OutputDataset, id: &RecordId, outcome: &RowOutcome) -> Result<()> {
        match outcome {
            RowOutcome::Success(result) => {
                for column in self.schema.columns() {
                    let cell = result
                        .get(column)
                        .map(|value| value.to_string())
                        .unwrap_or_default();
                    output.set(id, column, cell)?;
                }
                output.set(id, SUCCESS_COLUMN, "true")?;
                output.set(id, ERROR_COLUMN, "")?;
            }
            RowOutcome::Failure(error) => {
                for column in self.schema.columns() {
                    output.set(id, column, "")?;
                }
                output.set(id, SUCCESS_COLUMN, "false")?;
                output.set(id, ERROR_COLUMN, error.to_string())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InputConfig;
    use crate::dataset::InputDataset;
    use sift_domain::{ExtractionResult, FieldValue};
    use sift_extractor::{AttemptError, AttemptErrorKind};

    fn setup() -> (ResultMerger, OutputDataset) {
        let csv = "id,transcript\n1,a\n2,b\n3,c\n";
        let input = InputDataset::from_reader(csv.as_bytes(), &InputConfig::default()).unwrap();
        let schema = Arc::new(ExtractionSchema::default());
        let output = OutputDataset::initialize(&input, "id", &schema).unwrap();
        (ResultMerger::new(schema), output)
    }

    fn success(id: &str) -> (RecordId, RowOutcome) {
        let result = ExtractionResult::new(id)
            .with_field("sentiment", FieldValue::Text("positive".to_string()))
            .with_field("customer_satisfaction", FieldValue::Integer(5))
            .with_field("follow_up_required", FieldValue::Boolean(false));
        (RecordId::new(id), RowOutcome::Success(result))
    }

    #[test]
    fn test_merge_success_and_failure() {
        let (merger, mut output) = setup();
        let failure = (
            RecordId::new("3"),
            RowOutcome::Failure(AttemptError::new(AttemptErrorKind::Timeout, "slow")),
        );

        let written = merger.merge(&mut output, &[success("1"), failure]).unwrap();
        assert_eq!(written, 2);
        assert_eq!(output.len(), 3);

        let one = RecordId::new("1");
        assert_eq!(output.get(&one, "sentiment"), Some("positive"));
        assert_eq!(output.get(&one, "customer_satisfaction"), Some("5"));
        assert_eq!(output.get(&one, "follow_up_required"), Some("false"));
        assert_eq!(output.get(&one, "churn_risk"), Some(""));
        assert_eq!(output.get(&one, SUCCESS_COLUMN), Some("true"));

        let three = RecordId::new("3");
        assert_eq!(output.get(&three, SUCCESS_COLUMN), Some("false"));
        assert_eq!(output.get(&three, ERROR_COLUMN), Some("timeout: slow"));
        assert_eq!(output.get(&three, "sentiment"), Some(""));

        assert!(!output.has_marker(&RecordId::new("2")));
    }

    #[test]
    fn test_merge_is_idempotent() {
        let (merger, mut output) = setup();
        merger.merge(&mut output, &[success("2")]).unwrap();
        let once = output.clone();
        merger.merge(&mut output, &[success("2")]).unwrap();
        assert_eq!(output, once);
    }

    #[test]
    fn test_success_overwrites_earlier_failure() {
        let (merger, mut output) = setup();
        let failure = (
            RecordId::new("2"),
            RowOutcome::Failure(AttemptError::validation("bad")),
        );
        merger.merge(&mut output, &[failure]).unwrap();
        merger.merge(&mut output, &[success("2")]).unwrap();

        let two = RecordId::new("2");
        assert_eq!(output.get(&two, SUCCESS_COLUMN), Some("true"));
        assert_eq!(output.get(&two, ERROR_COLUMN), Some(""));
    }

    #[test]
    fn test_unknown_id_leaves_rows_untouched() {
        let (merger, mut output) = setup();
        let before = output.clone();
        let result = merger.merge(&mut output, &[success("1"), success("99")]);
        assert!(result.is_err());
        assert_eq!(output, before);
    }
}
