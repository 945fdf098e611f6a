//! End-to-end tests for the generate → validate → score pipeline.

use std::io::Write;
use std::time::Duration;
use tempfile::TempDir;

use tradeapi_bench::{
    load_references, load_test_cases, parse, ExampleBank, GatewayError, HttpMethod,
    MetricsCalculator, MockClient, Pipeline, PromptBuilder, RetryPolicy, RunnerConfig,
    SubmissionStore, Validator,
};

fn write_train(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("train.csv");
    let mut f = std::fs::File::create(&path).unwrap();
    writeln!(f, "question;method;path").unwrap();
    writeln!(f, "which exchanges are available;GET;/v1/exchanges").unwrap();
    writeln!(f, "latest SBER quote;GET;/v1/instruments/SBER@MISX/quotes/latest").unwrap();
    writeln!(f, "GAZP order book;GET;/v1/instruments/GAZP@MISX/orderbook").unwrap();
    writeln!(f, "my account details;GET;/v1/accounts/A1").unwrap();
    writeln!(f, "open a session;POST;/v1/sessions").unwrap();
    writeln!(f, "place an order for LKOH;POST;/v1/accounts/A1/orders").unwrap();
    writeln!(f, "cancel order 7;DELETE;/v1/accounts/A1/orders/7").unwrap();
    path
}

fn write_test_set(dir: &TempDir, n: u64) -> std::path::PathBuf {
    let path = dir.path().join("test.csv");
    let mut f = std::fs::File::create(&path).unwrap();
    writeln!(f, "id;question").unwrap();
    for id in 1..=n {
        writeln!(f, "{id};question number {id}").unwrap();
    }
    path
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 4,
        base_delay: Duration::from_millis(1),
    }
}

// ============================================================================
// Full pipeline
// ============================================================================

#[tokio::test]
async fn test_generate_validate_score_round_trip() {
    let dir = TempDir::new().unwrap();
    let bank = ExampleBank::load(write_train(&dir)).unwrap();
    let cases = load_test_cases(write_test_set(&dir, 3)).unwrap();

    let client = MockClient::scripted(
        vec![
            Ok("GET /v1/exchanges".to_string()),
            Ok("POST /v1/sessions".to_string()),
            Ok("Use GET /v1/instruments/SBER@MISX/quotes/latest to get the quote.".to_string()),
        ],
        "GET /v1/assets",
    );

    let pipeline = Pipeline::new(&client, "openai/gpt-4o-mini").with_config(RunnerConfig {
        batch_size: 1,
        ..RunnerConfig::default()
    });
    let outcome = pipeline.run(&bank, &cases).await.unwrap();

    // persist
    let submission = dir.path().join("submission.csv");
    outcome.store.write_all(&submission).unwrap();

    // validate
    let validator = Validator::new(cases.iter().map(|c| c.id));
    let report = validator.validate(&submission).unwrap();
    assert!(report.is_valid(), "{:?}", report.violations);

    // score against a matching reference
    let reference = dir.path().join("reference.csv");
    std::fs::write(
        &reference,
        "id;method;path\n\
         1;GET;/v1/exchanges\n\
         2;POST;/v1/sessions\n\
         3;GET;/v1/instruments/SBER@MISX/quotes/latest\n",
    )
    .unwrap();

    let predictions = SubmissionStore::read_all(&submission).unwrap();
    let references = load_references(&reference).unwrap();
    let metrics = MetricsCalculator::default().score(&predictions, &references);

    assert!((metrics.accuracy - 1.0).abs() < f64::EPSILON);
    assert_eq!(metrics.correct_count, 3);
}

#[tokio::test]
async fn test_prose_wrapped_answer_scores_correct() {
    let dir = TempDir::new().unwrap();
    let bank = ExampleBank::load(write_train(&dir)).unwrap();
    let cases = load_test_cases(write_test_set(&dir, 1)).unwrap();

    let client =
        MockClient::always("Use GET /v1/instruments/SBER@MISX/quotes/latest to get the quote.");
    let pipeline = Pipeline::new(&client, "openai/gpt-4o-mini");
    let outcome = pipeline.run(&bank, &cases).await.unwrap();

    let sorted = outcome.store.sorted();
    assert_eq!(sorted[0].method, Some(HttpMethod::Get));
    assert_eq!(sorted[0].path, "/v1/instruments/SBER@MISX/quotes/latest");
}

#[tokio::test]
async fn test_unparseable_row_degrades_but_submission_stays_valid() {
    let dir = TempDir::new().unwrap();
    let bank = ExampleBank::load(write_train(&dir)).unwrap();
    let cases = load_test_cases(write_test_set(&dir, 2)).unwrap();

    let client = MockClient::scripted(
        vec![Ok("No request matches this question.".to_string())],
        "GET /v1/exchanges",
    );

    let pipeline = Pipeline::new(&client, "openai/gpt-4o-mini").with_config(RunnerConfig {
        batch_size: 1,
        ..RunnerConfig::default()
    });
    let outcome = pipeline.run(&bank, &cases).await.unwrap();

    let submission = dir.path().join("submission.csv");
    outcome.store.write_all(&submission).unwrap();

    // UNKNOWN rows are schema-valid
    let validator = Validator::new(cases.iter().map(|c| c.id));
    assert!(validator.validate(&submission).unwrap().is_valid());

    // but always incorrect
    let reference = dir.path().join("reference.csv");
    std::fs::write(
        &reference,
        "id;method;path\n1;GET;/v1/assets\n2;GET;/v1/exchanges\n",
    )
    .unwrap();
    let metrics = MetricsCalculator::default().score(
        &SubmissionStore::read_all(&submission).unwrap(),
        &load_references(&reference).unwrap(),
    );
    assert_eq!(metrics.correct_count, 1);
    assert_eq!(metrics.unknown_count, 1);
}

#[tokio::test]
async fn test_transient_failures_bill_every_attempt() {
    let dir = TempDir::new().unwrap();
    let bank = ExampleBank::load(write_train(&dir)).unwrap();
    let cases = load_test_cases(write_test_set(&dir, 1)).unwrap();

    let client = MockClient::scripted(
        vec![
            Err(GatewayError::Transient("timeout".into())),
            Err(GatewayError::Transient("503".into())),
            Err(GatewayError::Transient("429".into())),
        ],
        "GET /v1/exchanges",
    );

    let pipeline = Pipeline::new(&client, "openai/gpt-4o-mini").with_retry(fast_retry());
    let outcome = pipeline.run(&bank, &cases).await.unwrap();

    let sorted = outcome.store.sorted();
    assert_eq!(sorted[0].path, "/v1/exchanges");
    assert!(!sorted[0].is_unknown());
    assert_eq!(outcome.summary.billed_calls, 4);
}

// ============================================================================
// Validation gate
// ============================================================================

#[test]
fn test_missing_row_blocks_scoring() {
    let dir = TempDir::new().unwrap();

    // a 300-row test set with id 7 absent from the submission
    let expected: Vec<u64> = (1..=300).collect();
    let submission = dir.path().join("submission.csv");
    let mut content = String::from("id;method;path\n");
    for id in &expected {
        if *id == 7 {
            continue;
        }
        content.push_str(&format!("{id};GET;/v1/exchanges\n"));
    }
    std::fs::write(&submission, content).unwrap();

    let report = Validator::new(expected).validate(&submission).unwrap();
    assert!(!report.is_valid());
    assert!(report
        .violations
        .contains(&tradeapi_bench::Violation::MissingId(7)));
    assert!(report.violations.contains(&tradeapi_bench::Violation::RowCount {
        expected: 300,
        found: 299
    }));
}

// ============================================================================
// Determinism
// ============================================================================

#[test]
fn test_prompts_are_reproducible_end_to_end() {
    let dir = TempDir::new().unwrap();
    let bank = ExampleBank::load(write_train(&dir)).unwrap();
    let builder = PromptBuilder::new();

    let first = builder
        .build(&bank.select(5, 42), "cancel my GAZP order")
        .unwrap();
    let second = builder
        .build(&bank.select(5, 42), "cancel my GAZP order")
        .unwrap();

    assert_eq!(first, second);
}

#[test]
fn test_parser_agrees_with_store_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("submission.csv");

    let answer = parse("GET //v1//exchanges").unwrap();
    let mut store = SubmissionStore::new();
    store
        .append(tradeapi_bench::Prediction::answered(
            1,
            answer.method,
            answer.path.clone(),
            String::new(),
            0.0,
        ))
        .unwrap();
    store.write_all(&path).unwrap();

    let rows = SubmissionStore::read_all(&path).unwrap();
    assert_eq!(rows[0].method, Some(answer.method));
    assert_eq!(rows[0].path, "/v1/exchanges");
}
