//! Input dataset loading

use crate::config::InputConfig;
use crate::error::{PipelineError, Result};
use sift_domain::{Record, RecordId, TextBlob};
use std::collections::HashSet;
use std::io::Read;
use tracing::info;

/// Input records in file order, plus the raw rows they came from
#[derive(Debug, Clone)]
pub struct InputDataset {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    records: Vec<Record>,
}

impl InputDataset {
    /// Load the input CSV described by `config`
    pub fn load(config: &InputConfig) -> Result<Self> {
        let file = std::fs::File::open(&config.path).map_err(|e| {
            PipelineError::Input(format!("cannot open {}: {}", config.path.display(), e))
        })?;
        let dataset = Self::from_reader(file, config)?;
        info!(
            "Loaded {} records from {}",
            dataset.len(),
            config.path.display()
        );
        Ok(dataset)
    }

    /// Parse CSV from any reader
    pub fn from_reader<R: Read>(reader: R, config: &InputConfig) -> Result<Self> {
        let mut reader = csv::Reader::from_reader(reader);
        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

        let id_index = column_index(&headers, &config.id_column)?;
        let text_indices = config
            .text_columns
            .iter()
            .map(|column| column_index(&headers, column))
            .collect::<Result<Vec<_>>>()?;

        let mut rows = Vec::new();
        let mut records = Vec::new();
        let mut seen = HashSet::new();

        for (line, row) in reader.records().enumerate() {
            let row = row?;
            let cells: Vec<String> = row.iter().map(str::to_string).collect();

            let id = cells[id_index].trim();
            if id.is_empty() {
                return Err(PipelineError::Input(format!(
                    "row {} has an empty '{}'",
                    line + 1,
                    config.id_column
                )));
            }
            if !seen.insert(id.to_string()) {
                return Err(PipelineError::Input(format!(
                    "duplicate record id '{}' at row {}",
                    id,
                    line + 1
                )));
            }

            let texts = text_indices
                .iter()
                .map(|&i| TextBlob::new(headers[i].as_str(), cells[i].as_str()))
                .collect();
            let fields = headers
                .iter()
                .zip(&cells)
                .enumerate()
                .filter(|(i, _)| *i != id_index && !text_indices.contains(i))
                .map(|(_, (name, value))| (name.clone(), value.clone()))
                .collect();

            records.push(Record::new(id, fields, texts));
            rows.push(cells);
        }

        Ok(Self {
            headers,
            rows,
            records,
        })
    }

    /// Column names in file order
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Raw cells of each row in file order
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Records in file order
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Record ids in file order
    pub fn ids(&self) -> impl Iterator<Item = &RecordId> {
        self.records.iter().map(Record::id)
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the dataset has no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn column_index(headers: &[String], column: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| PipelineError::Input(format!("column '{}' not found in input", column)))
}
