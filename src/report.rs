//! Console rendering of run summaries, validation reports, and metrics.

use crate::gateway::CostTracker;
use crate::metrics::MetricsReport;
use crate::submission::SubmissionStore;
use crate::validate::ValidationReport;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt::Write as FmtWrite;
use tabled::{Table, Tabled};

/// Summary of one generation run, reported even when degraded
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Predictions produced
    pub total_rows: usize,
    /// Degraded (UNKNOWN) predictions
    pub unknown_count: usize,
    /// Prediction counts per method label
    pub method_counts: BTreeMap<String, usize>,
    /// Total billed dollars
    pub total_cost: f64,
    /// Attempts submitted to the provider
    pub billed_calls: u64,
    /// Completion timestamp
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    /// Build a summary from the accumulated store and cost tracker
    #[must_use]
    pub fn collect(store: &SubmissionStore, tracker: &CostTracker) -> Self {
        let mut method_counts: BTreeMap<String, usize> = BTreeMap::new();
        let mut unknown_count = 0usize;

        for prediction in store.sorted() {
            *method_counts
                .entry(prediction.method_label().to_string())
                .or_default() += 1;
            if prediction.is_unknown() {
                unknown_count += 1;
            }
        }

        Self {
            total_rows: store.len(),
            unknown_count,
            method_counts,
            total_cost: tracker.total(),
            billed_calls: tracker.billed_calls(),
            finished_at: Utc::now(),
        }
    }
}

#[derive(Tabled)]
struct MethodCountRow {
    #[tabled(rename = "Method")]
    method: String,
    #[tabled(rename = "Predictions")]
    count: usize,
}

#[derive(Tabled)]
struct MethodStatsRow {
    #[tabled(rename = "Method")]
    method: String,
    #[tabled(rename = "Expected")]
    expected: usize,
    #[tabled(rename = "Correct")]
    correct: usize,
    #[tabled(rename = "Precision")]
    precision: String,
    #[tabled(rename = "Recall")]
    recall: String,
    #[tabled(rename = "F1")]
    f1: String,
}

/// Render a run summary for the console
#[must_use]
pub fn render_run_summary(summary: &RunSummary) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Run summary ({})", summary.finished_at.format("%Y-%m-%d %H:%M:%S UTC"));
    let _ = writeln!(out, "Predictions: {}", summary.total_rows);
    let _ = writeln!(out, "UNKNOWN rows: {}", summary.unknown_count);
    let _ = writeln!(out, "Billed attempts: {}", summary.billed_calls);
    let _ = writeln!(out, "Total cost: ${:.4}", summary.total_cost);
    if summary.total_rows > 0 {
        let _ = writeln!(
            out,
            "Average cost per row: ${:.6}",
            summary.total_cost / summary.total_rows as f64
        );
    }

    let rows: Vec<MethodCountRow> = summary
        .method_counts
        .iter()
        .map(|(method, count)| MethodCountRow {
            method: method.clone(),
            count: *count,
        })
        .collect();
    if !rows.is_empty() {
        let _ = writeln!(out, "\n{}", Table::new(rows));
    }

    out
}

/// Render a metrics report for the console
#[must_use]
pub fn render_metrics(report: &MetricsReport) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "Accuracy: {}/{} = {:.4} ({:.2}%)",
        report.correct_count,
        report.total_count,
        report.accuracy,
        report.accuracy * 100.0
    );
    let _ = writeln!(out, "Method-only accuracy: {:.2}%", report.method_accuracy * 100.0);
    let _ = writeln!(out, "Path-only accuracy:   {:.2}%", report.path_accuracy * 100.0);
    let _ = writeln!(out, "UNKNOWN predictions:  {}", report.unknown_count);

    let rows: Vec<MethodStatsRow> = report
        .per_method
        .iter()
        .map(|(method, stats)| MethodStatsRow {
            method: method.to_string(),
            expected: stats.expected,
            correct: stats.correct,
            precision: format!("{:.4}", stats.precision()),
            recall: format!("{:.4}", stats.recall()),
            f1: format!("{:.4}", stats.f1()),
        })
        .collect();
    if !rows.is_empty() {
        let _ = writeln!(out, "\n{}", Table::new(rows));
    }

    if !report.sample_errors.is_empty() {
        let _ = writeln!(out, "\nSample errors (first {}):", report.sample_errors.len());
        for error in &report.sample_errors {
            let _ = writeln!(
                out,
                "  id {}: predicted `{} {}`, expected `{} {}`",
                error.id,
                error.predicted_method,
                error.predicted_path,
                error.expected_method,
                error.expected_path
            );
        }
    }

    out
}

/// Render a validation report for the console
#[must_use]
pub fn render_validation(report: &ValidationReport) -> String {
    let mut out = String::new();

    if report.is_valid() {
        let _ = writeln!(out, "Submission is valid ({} rows)", report.row_count);
    } else {
        let _ = writeln!(
            out,
            "Submission has {} violation(s):",
            report.violations.len()
        );
        for violation in &report.violations {
            let _ = writeln!(out, "  - {violation}");
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::HttpMethod;
    use crate::submission::Prediction;
    use crate::validate::{Validator, Violation};

    fn sample_summary() -> RunSummary {
        let mut store = SubmissionStore::new();
        store
            .append(Prediction::answered(
                1,
                HttpMethod::Get,
                "/v1/exchanges".into(),
                String::new(),
                0.002,
            ))
            .unwrap();
        store
            .append(Prediction::unknown(2, String::new(), 0.0))
            .unwrap();

        let tracker = CostTracker::new();
        tracker.record_attempt(0.002);
        tracker.record_attempt(0.0);

        RunSummary::collect(&store, &tracker)
    }

    #[test]
    fn test_collect_counts_methods_and_unknowns() {
        let summary = sample_summary();
        assert_eq!(summary.total_rows, 2);
        assert_eq!(summary.unknown_count, 1);
        assert_eq!(summary.method_counts["GET"], 1);
        assert_eq!(summary.method_counts["UNKNOWN"], 1);
        assert_eq!(summary.billed_calls, 2);
    }

    #[test]
    fn test_render_run_summary() {
        let rendered = render_run_summary(&sample_summary());
        assert!(rendered.contains("Predictions: 2"));
        assert!(rendered.contains("UNKNOWN rows: 1"));
        assert!(rendered.contains("Total cost: $0.0020"));
        assert!(rendered.contains("GET"));
    }

    #[test]
    fn test_render_validation_valid() {
        let report = crate::validate::ValidationReport {
            violations: vec![],
            row_count: 3,
        };
        assert!(render_validation(&report).contains("valid (3 rows)"));
    }

    #[test]
    fn test_render_validation_lists_violations() {
        let report = crate::validate::ValidationReport {
            violations: vec![Violation::MissingId(7)],
            row_count: 299,
        };
        let rendered = render_validation(&report);
        assert!(rendered.contains("1 violation"));
        assert!(rendered.contains("missing id 7"));
    }

    #[test]
    fn test_render_metrics_shows_accuracy_and_errors() {
        let references = vec![crate::metrics::ReferenceAnswer {
            id: 1,
            method: HttpMethod::Get,
            path: "/v1/exchanges".into(),
        }];
        let predictions = vec![Prediction::unknown(1, String::new(), 0.0)];
        let report = crate::metrics::MetricsCalculator::default().score(&predictions, &references);

        let rendered = render_metrics(&report);
        assert!(rendered.contains("Accuracy: 0/1"));
        assert!(rendered.contains("Sample errors"));
        assert!(rendered.contains("id 1"));
    }

    #[test]
    fn test_validator_roundtrip_through_render() {
        let validator = Validator::new([1, 2]);
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("submission.csv");
        std::fs::write(&path, "id;method;path\n1;GET;/v1/exchanges\n2;UNKNOWN;\n").unwrap();

        let report = validator.validate(&path).unwrap();
        assert!(render_validation(&report).contains("valid"));
    }
}
