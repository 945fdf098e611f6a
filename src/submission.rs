//! Persistence of predictions as a `;`-delimited submission file.
//!
//! One row per test id, ascending id order, columns `id;method;path`. The
//! write is atomic: rows are serialized to a sibling temp file which is then
//! renamed over the target, so an interrupted run never leaves a file that
//! passes validation as complete.

use crate::parser::HttpMethod;
use std::path::Path;
use thiserror::Error;

/// Method label used for degraded rows
pub const UNKNOWN_LABEL: &str = "UNKNOWN";

/// Errors that can occur while reading or writing a submission
#[derive(Error, Debug)]
pub enum SubmissionError {
    #[error("submission file not found: {0}")]
    NotFound(String),

    #[error("duplicate prediction for id {0}")]
    DuplicateId(u64),

    #[error("{file}: row {row}: {message}")]
    BadRow {
        file: String,
        row: usize,
        message: String,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// One prediction for one test question
///
/// `method` is `None` for degraded rows (gateway exhaustion or parse
/// failure), serialized as `UNKNOWN` with an empty path. `raw_response` and
/// `cost` are run-local diagnostics and are not persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Test case id
    pub id: u64,
    /// Predicted verb, `None` for UNKNOWN
    pub method: Option<HttpMethod>,
    /// Predicted path, empty for UNKNOWN
    pub path: String,
    /// The model's raw answer text
    pub raw_response: String,
    /// Billed dollar cost of producing this row
    pub cost: f64,
}

impl Prediction {
    /// A well-formed prediction
    #[must_use]
    pub fn answered(id: u64, method: HttpMethod, path: String, raw_response: String, cost: f64) -> Self {
        Self {
            id,
            method: Some(method),
            path,
            raw_response,
            cost,
        }
    }

    /// A degraded prediction, always scored incorrect
    #[must_use]
    pub fn unknown(id: u64, raw_response: String, cost: f64) -> Self {
        Self {
            id,
            method: None,
            path: String::new(),
            raw_response,
            cost,
        }
    }

    /// Method column value as written to the file
    #[must_use]
    pub fn method_label(&self) -> &str {
        self.method.map_or(UNKNOWN_LABEL, HttpMethod::as_str)
    }

    /// Whether this row is degraded
    #[must_use]
    pub const fn is_unknown(&self) -> bool {
        self.method.is_none()
    }
}

/// Accumulates predictions and persists them in submission order
#[derive(Debug, Default)]
pub struct SubmissionStore {
    rows: Vec<Prediction>,
}

impl SubmissionStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one prediction
    ///
    /// # Errors
    ///
    /// Returns `SubmissionError::DuplicateId` if the id was already appended.
    pub fn append(&mut self, prediction: Prediction) -> Result<(), SubmissionError> {
        if self.rows.iter().any(|p| p.id == prediction.id) {
            return Err(SubmissionError::DuplicateId(prediction.id));
        }
        self.rows.push(prediction);
        Ok(())
    }

    /// Number of accumulated predictions
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Predictions in ascending id order
    #[must_use]
    pub fn sorted(&self) -> Vec<&Prediction> {
        let mut rows: Vec<&Prediction> = self.rows.iter().collect();
        rows.sort_by_key(|p| p.id);
        rows
    }

    /// Write all predictions to `path`, atomically, ascending id order
    ///
    /// # Errors
    ///
    /// Returns an error if the temp file cannot be written or renamed.
    pub fn write_all<P: AsRef<Path>>(&self, path: P) -> Result<(), SubmissionError> {
        let path = path.as_ref();
        let tmp = path.with_extension("csv.tmp");

        {
            let mut writer = csv::WriterBuilder::new()
                .delimiter(crate::dataset::DELIMITER)
                .from_path(&tmp)?;
            writer.write_record(["id", "method", "path"])?;
            for prediction in self.sorted() {
                writer.write_record([
                    prediction.id.to_string().as_str(),
                    prediction.method_label(),
                    prediction.path.as_str(),
                ])?;
            }
            writer.flush()?;
        }

        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Read a submission file back into predictions
    ///
    /// Diagnostics (`raw_response`, `cost`) are not persisted and come back
    /// empty; the persisted `(id, method, path)` triple round-trips exactly.
    ///
    /// # Errors
    ///
    /// Returns an error for a missing file or a row whose id or method does
    /// not parse.
    pub fn read_all<P: AsRef<Path>>(path: P) -> Result<Vec<Prediction>, SubmissionError> {
        let path = path.as_ref();
        let file = path.display().to_string();

        if !path.exists() {
            return Err(SubmissionError::NotFound(file));
        }

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(crate::dataset::DELIMITER)
            .from_path(path)?;

        let mut rows = Vec::new();
        for (row, record) in reader.records().enumerate() {
            let record = record?;
            let bad_row = |message: String| SubmissionError::BadRow {
                file: file.clone(),
                row: row + 2,
                message,
            };

            let id: u64 = record
                .get(0)
                .unwrap_or_default()
                .parse()
                .map_err(|_| bad_row(format!("unparseable id `{}`", record.get(0).unwrap_or_default())))?;

            let method_field = record.get(1).unwrap_or_default();
            let method = if method_field == UNKNOWN_LABEL {
                None
            } else {
                Some(
                    method_field
                        .parse::<HttpMethod>()
                        .map_err(|_| bad_row(format!("unknown method `{method_field}`")))?,
                )
            };

            rows.push(Prediction {
                id,
                method,
                path: record.get(2).unwrap_or_default().to_string(),
                raw_response: String::new(),
                cost: 0.0,
            });
        }

        Ok(rows)
    }
}
