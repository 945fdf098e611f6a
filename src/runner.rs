//! Generation pipeline: turns the test set into a full prediction set.
//!
//! Test cases are processed in fixed-size batches; rows within a batch run
//! concurrently against the gateway, bounded by the batch size to respect
//! provider rate limits. Row-level failures (retry exhaustion, unparseable
//! answers) degrade that row to UNKNOWN and the run continues; fatal gateway
//! failures abort the whole run. The id-to-prediction mapping never depends
//! on completion order: rows carry their id and the store sorts on write.

use crate::dataset::{ExampleBank, TestCase};
use crate::gateway::{
    complete_with_retry, CompletionClient, CompletionOptions, CostTracker, GatewayError,
    RetryPolicy,
};
use crate::parser;
use crate::prompt::{PromptBuilder, PromptError};
use crate::report::RunSummary;
use crate::submission::{Prediction, SubmissionError, SubmissionStore};
use futures::future::join_all;
use thiserror::Error;

/// Errors that abort a generation run
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Submission(#[from] SubmissionError),
}

/// Knobs for one generation run
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Few-shot examples per prompt
    pub num_examples: usize,
    /// Seed driving example selection
    pub seed: u64,
    /// Rows processed concurrently
    pub batch_size: usize,
    /// Sampling temperature
    pub temperature: f32,
    /// Completion length cap
    pub max_tokens: u32,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            num_examples: 10,
            seed: 42,
            batch_size: 5,
            temperature: 0.0,
            max_tokens: 200,
        }
    }
}

/// Outcome of a completed (possibly degraded) run
#[derive(Debug)]
pub struct RunOutcome {
    /// All predictions, one per test case
    pub store: SubmissionStore,
    /// Cost and composition summary
    pub summary: RunSummary,
}

/// Drives the question-to-request pipeline for a whole test set
pub struct Pipeline<'a> {
    client: &'a dyn CompletionClient,
    model: String,
    config: RunnerConfig,
    retry: RetryPolicy,
    prompt_builder: PromptBuilder,
}

impl<'a> Pipeline<'a> {
    /// Create a pipeline with default config and retry policy
    #[must_use]
    pub fn new(client: &'a dyn CompletionClient, model: &str) -> Self {
        Self {
            client,
            model: model.to_string(),
            config: RunnerConfig::default(),
            retry: RetryPolicy::default(),
            prompt_builder: PromptBuilder::new(),
        }
    }

    /// Override the run configuration
    #[must_use]
    pub fn with_config(mut self, config: RunnerConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the retry policy
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Current run configuration
    #[must_use]
    pub const fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Run the pipeline over the whole test set
    ///
    /// Each test case is submitted to the gateway exactly once (plus
    /// transient retries for that same case). An interrupted or aborted run
    /// produces no submission file at all: the store is only handed back on
    /// a complete pass.
    ///
    /// # Errors
    ///
    /// Returns an error on oversized prompts, fatal gateway failures, or a
    /// duplicate test-case id.
    pub async fn run(
        &self,
        bank: &ExampleBank,
        cases: &[TestCase],
    ) -> Result<RunOutcome, RunnerError> {
        let examples = bank.select(self.config.num_examples, self.config.seed);
        let options = CompletionOptions {
            model: self.model.clone(),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };
        let tracker = CostTracker::new();

        tracing::info!(
            cases = cases.len(),
            examples = examples.len(),
            model = %self.model,
            batch_size = self.config.batch_size,
            "starting generation run"
        );

        let mut store = SubmissionStore::new();
        let batch_size = self.config.batch_size.max(1);

        for batch in cases.chunks(batch_size) {
            let futures = batch
                .iter()
                .map(|case| self.process_case(case, &examples, &options, &tracker));
            for result in join_all(futures).await {
                store.append(result?)?;
            }
            tracing::debug!(
                done = store.len(),
                total = cases.len(),
                cost = tracker.total(),
                "batch complete"
            );
        }

        let summary = RunSummary::collect(&store, &tracker);
        Ok(RunOutcome { store, summary })
    }

    /// Process one test case into a prediction
    ///
    /// Row-level failures come back as degraded predictions; only fatal
    /// errors propagate.
    async fn process_case(
        &self,
        case: &TestCase,
        examples: &[&crate::dataset::Example],
        options: &CompletionOptions,
        tracker: &CostTracker,
    ) -> Result<Prediction, RunnerError> {
        let prompt = self.prompt_builder.build(examples, &case.question)?;

        let completion =
            match complete_with_retry(self.client, &prompt, options, &self.retry, tracker).await {
                Ok(completion) => completion,
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    tracing::warn!(id = case.id, error = %e, "row degraded: gateway unavailable");
                    return Ok(Prediction::unknown(case.id, String::new(), 0.0));
                }
            };

        match parser::parse(&completion.text) {
            Ok(answer) => Ok(Prediction::answered(
                case.id,
                answer.method,
                answer.path,
                completion.text,
                completion.cost,
            )),
            Err(e) => {
                tracing::warn!(id = case.id, error = %e, "row degraded: unparseable answer");
                Ok(Prediction::unknown(case.id, completion.text, completion.cost))
            }
        }
    }
}
