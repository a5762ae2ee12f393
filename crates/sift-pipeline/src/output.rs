//! Output dataset: input rows plus extraction columns
//!
//! Rows are fixed at initialization, one per input record in input order.
//! Later writes only ever change extraction cells of existing rows.

use crate::dataset::InputDataset;
use crate::error::{PipelineError, Result};
use sift_domain::RecordId;
use sift_extractor::{ExtractionSchema, ERROR_COLUMN, SUCCESS_COLUMN};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::Path;
use tracing::debug;

/// Row-indexed union of input fields and extraction fields
#[derive(Debug, Clone, PartialEq)]
pub struct OutputDataset {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    id_column: usize,
    index: HashMap<RecordId, usize>,
}

impl OutputDataset {
    /// One row per input record, with empty extraction columns
    pub fn initialize(input: &InputDataset, id_column: &str, schema: &ExtractionSchema) -> Result<Self> {
        let mut headers = input.headers().to_vec();
        headers.extend(schema.columns().into_iter().map(str::to_string));
        headers.push(SUCCESS_COLUMN.to_string());
        headers.push(ERROR_COLUMN.to_string());

        let width = headers.len();
        let rows = input
            .rows()
            .iter()
            .map(|row| {
                let mut row = row.clone();
                row.resize(width, String::new());
                row
            })
            .collect();

        Self::from_parts(headers, rows, id_column)
    }

    /// Load a previously written output file, if one exists
    pub fn load(path: &Path, id_column: &str) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let file = std::fs::File::open(path)?;
        Self::from_reader(file, id_column).map(Some)
    }

    /// Parse an output dataset from CSV
    pub fn from_reader<R: Read>(reader: R, id_column: &str) -> Result<Self> {
        let mut reader = csv::Reader::from_reader(reader);
        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let rows = reader
            .records()
            .map(|row| row.map(|r| r.iter().map(str::to_string).collect()))
            .collect::<std::result::Result<Vec<Vec<String>>, csv::Error>>()?;

        Self::from_parts(headers, rows, id_column)
    }

    fn from_parts(headers: Vec<String>, rows: Vec<Vec<String>>, id_column: &str) -> Result<Self> {
        let id_index = headers
            .iter()
            .position(|h| h == id_column)
            .ok_or_else(|| {
                PipelineError::Output(format!("id column '{}' missing from output", id_column))
            })?;

        let mut index = HashMap::with_capacity(rows.len());
        for (position, row) in rows.iter().enumerate() {
            let id = RecordId::new(row[id_index].trim());
            if index.insert(id.clone(), position).is_some() {
                return Err(PipelineError::Output(format!("duplicate record id '{}'", id)));
            }
        }

        Ok(Self {
            headers,
            rows,
            id_column: id_index,
            index,
        })
    }

    /// Write CSV to any writer
    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Atomically replace the file at `path` (write to a temp file, then rename)
    pub fn save(&self, path: &Path) -> Result<()> {
        let tmp = tmp_path(path);
        {
            let file = std::fs::File::create(&tmp)?;
            let mut file = std::io::BufWriter::new(file);
            self.write_to(&mut file)?;
            file.flush()?;
            file.get_ref().sync_all()?;
        }
        std::fs::rename(&tmp, path)?;
        debug!("Wrote {} rows to {}", self.rows.len(), path.display());
        Ok(())
    }

    /// Check that the dataset holds exactly the input's ids, in input order
    pub fn check_matches(&self, input: &InputDataset) -> Result<()> {
        if self.rows.len() != input.len() {
            return Err(PipelineError::Output(format!(
                "output has {} rows but input has {} records",
                self.rows.len(),
                input.len()
            )));
        }
        for (position, id) in input.ids().enumerate() {
            let found = self.rows[position][self.id_column].trim();
            if found != id.as_str() {
                return Err(PipelineError::Output(format!(
                    "row {} holds id '{}' but input has '{}'",
                    position + 1,
                    found,
                    id
                )));
            }
        }
        Ok(())
    }

    /// Append any of `columns` not already present, with empty cells
    pub fn ensure_columns(&mut self, columns: &[&str]) {
        for column in columns {
            if !self.headers.iter().any(|h| h == column) {
                self.headers.push(column.to_string());
                for row in &mut self.rows {
                    row.push(String::new());
                }
            }
        }
    }

    /// Set one cell of the row for `id`
    pub fn set(&mut self, id: &RecordId, column: &str, value: impl Into<String>) -> Result<()> {
        let column_index = self.column_index(column)?;
        let row = self.row_index(id)?;
        self.rows[row][column_index] = value.into();
        Ok(())
    }

    /// Value of one cell
    pub fn get(&self, id: &RecordId, column: &str) -> Option<&str> {
        let column = self.headers.iter().position(|h| h == column)?;
        let row = *self.index.get(id)?;
        Some(self.rows[row][column].as_str())
    }

    /// Whether the row for `id` carries a success-or-failure marker
    pub fn has_marker(&self, id: &RecordId) -> bool {
        matches!(self.get(id, SUCCESS_COLUMN), Some("true") | Some("false"))
    }

    /// Whether `id` has a row
    pub fn contains(&self, id: &RecordId) -> bool {
        self.index.contains_key(id)
    }

    /// Column names
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Rows in input order
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the dataset has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn column_index(&self, column: &str) -> Result<usize> {
        self.headers
            .iter()
            .position(|h| h == column)
            .ok_or_else(|| PipelineError::Output(format!("unknown output column '{}'", column)))
    }

    fn row_index(&self, id: &RecordId) -> Result<usize> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| PipelineError::Output(format!("no output row for record '{}'", id)))
    }
}

/// Temp file next to `path`, so the final rename stays on one filesystem
pub(crate) fn tmp_path(path: &Path) -> std::path::PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
