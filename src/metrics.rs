//! Exact-match scoring of a submission against the reference answers.
//!
//! A prediction is correct iff its normalized `(method, path)` pair is
//! byte-identical to the reference pair for the same id. No partial credit,
//! no fuzzy matching; UNKNOWN rows are always incorrect. Alongside the
//! headline accuracy the report carries method-only and path-only match
//! rates and a per-method precision/recall/F1 breakdown.

use crate::parser::HttpMethod;
use crate::submission::{Prediction, SubmissionError, SubmissionStore};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while loading reference answers
#[derive(Error, Debug)]
pub enum ReferenceError {
    #[error("reference row for id {0} has method UNKNOWN")]
    UnknownMethod(u64),

    #[error(transparent)]
    Submission(#[from] SubmissionError),
}

/// One reference (ground truth) answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceAnswer {
    /// Test case id
    pub id: u64,
    /// Expected verb
    pub method: HttpMethod,
    /// Expected path
    pub path: String,
}

/// Load reference answers from a file in submission schema
///
/// # Errors
///
/// Returns an error if the file cannot be read or carries UNKNOWN rows,
/// which have no place in ground truth.
pub fn load_references<P: AsRef<Path>>(path: P) -> Result<Vec<ReferenceAnswer>, ReferenceError> {
    let rows = SubmissionStore::read_all(path)?;
    rows.into_iter()
        .map(|row| {
            let method = row.method.ok_or(ReferenceError::UnknownMethod(row.id))?;
            Ok(ReferenceAnswer {
                id: row.id,
                method,
                path: row.path,
            })
        })
        .collect()
}

/// Per-method tally against the reference set
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct MethodStats {
    /// Rows whose reference uses this method
    pub expected: usize,
    /// Rows predicted with this method
    pub predicted: usize,
    /// Fully correct rows with this reference method
    pub correct: usize,
    /// Method predicted and expected
    pub true_positives: usize,
    /// Method predicted, different method expected
    pub false_positives: usize,
    /// Method expected, different method predicted
    pub false_negatives: usize,
}

impl MethodStats {
    /// tp / (tp + fp), zero when undefined
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn precision(&self) -> f64 {
        let denominator = self.true_positives + self.false_positives;
        if denominator == 0 {
            0.0
        } else {
            self.true_positives as f64 / denominator as f64
        }
    }

    /// tp / (tp + fn), zero when undefined
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn recall(&self) -> f64 {
        let denominator = self.true_positives + self.false_negatives;
        if denominator == 0 {
            0.0
        } else {
            self.true_positives as f64 / denominator as f64
        }
    }

    /// Harmonic mean of precision and recall, zero when undefined
    #[must_use]
    pub fn f1(&self) -> f64 {
        let p = self.precision();
        let r = self.recall();
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }
}

/// One mismatched row, for diagnostic display
#[derive(Debug, Clone, Serialize)]
pub struct SampleError {
    /// Test case id
    pub id: u64,
    /// Predicted method label (UNKNOWN/MISSING included)
    pub predicted_method: String,
    /// Predicted path
    pub predicted_path: String,
    /// Expected method label
    pub expected_method: String,
    /// Expected path
    pub expected_path: String,
}

/// The scoring result
#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    /// correct / total, in [0, 1]
    pub accuracy: f64,
    /// Fully correct rows
    pub correct_count: usize,
    /// Reference rows scored
    pub total_count: usize,
    /// Rows whose method alone matched
    pub method_accuracy: f64,
    /// Rows whose path alone matched
    pub path_accuracy: f64,
    /// Degraded (UNKNOWN) predictions
    pub unknown_count: usize,
    /// Per-method breakdown, keyed by reference method
    pub per_method: BTreeMap<HttpMethod, MethodStats>,
    /// Up to the configured count of mismatches, ascending id
    pub sample_errors: Vec<SampleError>,
}

/// Computes exact-match metrics for a prediction set
#[derive(Debug, Clone)]
pub struct MetricsCalculator {
    /// Cap on `sample_errors` in the report
    pub max_sample_errors: usize,
}

impl Default for MetricsCalculator {
    fn default() -> Self {
        Self {
            max_sample_errors: 10,
        }
    }
}

impl MetricsCalculator {
    /// Create a calculator with a custom error-sample cap
    #[must_use]
    pub const fn new(max_sample_errors: usize) -> Self {
        Self { max_sample_errors }
    }

    /// Score predictions against the reference set
    ///
    /// Iterates the references (never mutating them); predictions missing a
    /// reference id are ignored, reference ids missing a prediction count as
    /// errors.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn score(&self, predictions: &[Prediction], references: &[ReferenceAnswer]) -> MetricsReport {
        let by_id: HashMap<u64, &Prediction> = predictions.iter().map(|p| (p.id, p)).collect();

        let total_count = references.len();
        let mut correct_count = 0usize;
        let mut method_matches = 0usize;
        let mut path_matches = 0usize;
        let mut unknown_count = 0usize;
        let mut per_method: BTreeMap<HttpMethod, MethodStats> = BTreeMap::new();
        let mut errors: Vec<SampleError> = Vec::new();

        for reference in references {
            let expected_stats = per_method.entry(reference.method).or_default();
            expected_stats.expected += 1;

            let Some(prediction) = by_id.get(&reference.id) else {
                per_method.entry(reference.method).or_default().false_negatives += 1;
                errors.push(SampleError {
                    id: reference.id,
                    predicted_method: "MISSING".to_string(),
                    predicted_path: String::new(),
                    expected_method: reference.method.to_string(),
                    expected_path: reference.path.clone(),
                });
                continue;
            };

            if prediction.is_unknown() {
                unknown_count += 1;
            }

            if let Some(method) = prediction.method {
                per_method.entry(method).or_default().predicted += 1;
            }

            let method_match = prediction.method == Some(reference.method);
            let path_match = prediction.path == reference.path;

            if method_match {
                method_matches += 1;
            }
            if path_match {
                path_matches += 1;
            }

            if method_match && path_match {
                correct_count += 1;
                let stats = per_method.entry(reference.method).or_default();
                stats.correct += 1;
                stats.true_positives += 1;
            } else {
                // tp/fp/fn track verb confusion only; a right-verb wrong-path
                // row counts as an error without touching them
                if !method_match {
                    per_method.entry(reference.method).or_default().false_negatives += 1;
                    if let Some(method) = prediction.method {
                        per_method.entry(method).or_default().false_positives += 1;
                    }
                }
                errors.push(SampleError {
                    id: reference.id,
                    predicted_method: prediction.method_label().to_string(),
                    predicted_path: prediction.path.clone(),
                    expected_method: reference.method.to_string(),
                    expected_path: reference.path.clone(),
                });
            }
        }

        errors.sort_by_key(|e| e.id);
        let sample_errors = errors.into_iter().take(self.max_sample_errors).collect();

        let rate = |n: usize| {
            if total_count == 0 {
                0.0
            } else {
                n as f64 / total_count as f64
            }
        };

        MetricsReport {
            accuracy: rate(correct_count),
            correct_count,
            total_count,
            method_accuracy: rate(method_matches),
            path_accuracy: rate(path_matches),
            unknown_count,
            per_method,
            sample_errors,
        }
    }
}
