//! Submission schema validation.
//!
//! Checks a persisted submission against the test set before scoring, and
//! collects every violation in one pass instead of failing fast, so a broken
//! file surfaces all of its problems at once. Any violation blocks scoring.

use crate::parser::HttpMethod;
use crate::submission::UNKNOWN_LABEL;
use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use thiserror::Error;

/// One schema violation found in a submission file
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    #[error("bad header: expected `id;method;path`, found `{0}`")]
    BadHeader(String),

    #[error("row {row}: unparseable id `{value}`")]
    BadId { row: usize, value: String },

    #[error("row {row}: method `{value}` is not an allowed verb or UNKNOWN")]
    BadMethod { row: usize, value: String },

    #[error("row {row}: id {id} has an empty path")]
    EmptyPath { row: usize, id: u64 },

    #[error("row {row}: id {id} has a path not starting with `/`")]
    UnrootedPath { row: usize, id: u64 },

    #[error("duplicate id {0}")]
    DuplicateId(u64),

    #[error("missing id {0}")]
    MissingId(u64),

    #[error("unexpected id {0} not present in the test set")]
    UnexpectedId(u64),

    #[error("expected {expected} rows, found {found}")]
    RowCount { expected: usize, found: usize },
}

/// Result of validating one submission file
#[derive(Debug, Clone)]
pub struct ValidationReport {
    /// All violations found, in scan order
    pub violations: Vec<Violation>,
    /// Data rows seen (header excluded)
    pub row_count: usize,
}

impl ValidationReport {
    /// Whether the submission may be scored
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Validates submissions against the expected test-set ids
#[derive(Debug)]
pub struct Validator {
    expected_ids: BTreeSet<u64>,
}

impl Validator {
    /// Create a validator for the given expected ids
    pub fn new<I: IntoIterator<Item = u64>>(expected_ids: I) -> Self {
        Self {
            expected_ids: expected_ids.into_iter().collect(),
        }
    }

    /// Validate the file at `path`, collecting all violations
    ///
    /// # Errors
    ///
    /// Returns an IO/CSV error only when the file cannot be read at all;
    /// malformed content is reported as violations, not errors.
    pub fn validate<P: AsRef<Path>>(&self, path: P) -> Result<ValidationReport, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        Ok(self.validate_content(&content))
    }

    fn validate_content(&self, content: &str) -> ValidationReport {
        let mut violations = Vec::new();
        let mut seen: HashSet<u64> = HashSet::new();
        let mut row_count = 0usize;

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(crate::dataset::DELIMITER)
            .flexible(true)
            .from_reader(content.as_bytes());

        match reader.headers() {
            Ok(headers) => {
                let fields: Vec<&str> = headers.iter().collect();
                if fields != ["id", "method", "path"] {
                    violations.push(Violation::BadHeader(fields.join(";")));
                }
            }
            Err(_) => violations.push(Violation::BadHeader(String::new())),
        }

        for (index, record) in reader.records().enumerate() {
            let row = index + 2;
            let Ok(record) = record else {
                violations.push(Violation::BadId {
                    row,
                    value: String::new(),
                });
                continue;
            };
            row_count += 1;

            let id_field = record.get(0).unwrap_or_default();
            let id = match id_field.parse::<u64>() {
                Ok(id) => {
                    if !seen.insert(id) {
                        violations.push(Violation::DuplicateId(id));
                    }
                    if !self.expected_ids.contains(&id) {
                        violations.push(Violation::UnexpectedId(id));
                    }
                    Some(id)
                }
                Err(_) => {
                    violations.push(Violation::BadId {
                        row,
                        value: id_field.to_string(),
                    });
                    None
                }
            };

            let method_field = record.get(1).unwrap_or_default();
            let is_unknown = method_field == UNKNOWN_LABEL;
            if !is_unknown && method_field.parse::<HttpMethod>().is_err() {
                violations.push(Violation::BadMethod {
                    row,
                    value: method_field.to_string(),
                });
            }

            // Degraded rows carry an empty path by contract; everything else
            // must be a rooted path.
            let path_field = record.get(2).unwrap_or_default();
            if !is_unknown {
                if let Some(id) = id {
                    if path_field.is_empty() {
                        violations.push(Violation::EmptyPath { row, id });
                    } else if !path_field.starts_with('/') {
                        violations.push(Violation::UnrootedPath { row, id });
                    }
                }
            }
        }

        for id in &self.expected_ids {
            if !seen.contains(id) {
                violations.push(Violation::MissingId(*id));
            }
        }

        if row_count != self.expected_ids.len() {
            violations.push(Violation::RowCount {
                expected: self.expected_ids.len(),
                found: row_count,
            });
        }

        ValidationReport {
            violations,
            row_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator(n: u64) -> Validator {
        Validator::new(1..=n)
    }

    #[test]
    fn test_valid_submission() {
        let content = "id;method;path\n1;GET;/v1/exchanges\n2;POST;/v1/sessions\n3;UNKNOWN;\n";
        let report = validator(3).validate_content(content);
        assert!(report.is_valid(), "{:?}", report.violations);
        assert_eq!(report.row_count, 3);
    }

    #[test]
    fn test_missing_id_is_reported() {
        // id 2 of 3 absent
        let content = "id;method;path\n1;GET;/v1/exchanges\n3;GET;/v1/assets\n";
        let report = validator(3).validate_content(content);
        assert!(!report.is_valid());
        assert!(report.violations.contains(&Violation::MissingId(2)));
        assert!(report
            .violations
            .contains(&Violation::RowCount { expected: 3, found: 2 }));
    }

    #[test]
    fn test_duplicate_id_is_reported() {
        let content = "id;method;path\n1;GET;/v1/exchanges\n1;GET;/v1/assets\n2;GET;/v1/assets\n";
        let report = validator(3).validate_content(content);
        assert!(report.violations.contains(&Violation::DuplicateId(1)));
        assert!(report.violations.contains(&Violation::MissingId(3)));
    }

    #[test]
    fn test_unexpected_id_is_reported() {
        let content = "id;method;path\n1;GET;/v1/exchanges\n99;GET;/v1/assets\n";
        let report = validator(1).validate_content(content);
        assert!(report.violations.contains(&Violation::UnexpectedId(99)));
    }

    #[test]
    fn test_bad_method_is_reported() {
        let content = "id;method;path\n1;FETCH;/v1/exchanges\n";
        let report = validator(1).validate_content(content);
        assert!(report.violations.iter().any(|v| matches!(
            v,
            Violation::BadMethod { row: 2, value } if value == "FETCH"
        )));
    }

    #[test]
    fn test_unknown_rows_are_schema_valid() {
        let content = "id;method;path\n1;UNKNOWN;\n";
        let report = validator(1).validate_content(content);
        assert!(report.is_valid(), "{:?}", report.violations);
    }

    #[test]
    fn test_empty_path_on_known_method_is_reported() {
        let content = "id;method;path\n1;GET;\n";
        let report = validator(1).validate_content(content);
        assert!(report
            .violations
            .contains(&Violation::EmptyPath { row: 2, id: 1 }));
    }

    #[test]
    fn test_unrooted_path_is_reported() {
        let content = "id;method;path\n1;GET;v1/exchanges\n";
        let report = validator(1).validate_content(content);
        assert!(report
            .violations
            .contains(&Violation::UnrootedPath { row: 2, id: 1 }));
    }

    #[test]
    fn test_bad_header_is_reported() {
        let content = "uid;type;request\n1;GET;/v1/exchanges\n";
        let report = validator(1).validate_content(content);
        assert!(report
            .violations
            .iter()
            .any(|v| matches!(v, Violation::BadHeader(_))));
    }

    #[test]
    fn test_all_violations_surface_in_one_pass() {
        // bad method, unrooted path, duplicate, missing
        let content = "id;method;path\n1;FETCH;v1/x\n1;GET;/v1/y\n";
        let report = validator(3).validate_content(content);
        assert!(report.violations.len() >= 5, "{:?}", report.violations);
    }

    #[test]
    fn test_validate_missing_file_is_an_error() {
        let result = validator(1).validate("/nonexistent/submission.csv");
        assert!(result.is_err());
    }
}
