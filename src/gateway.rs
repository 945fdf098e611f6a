//! Model gateway: completion calls, retry policy, and cost accounting.
//!
//! The gateway is the pipeline's only suspension point. Transient provider
//! failures (timeouts, rate limits, 5xx) are retried with exponential
//! backoff; auth rejections and malformed requests are fatal since they
//! signal a systemic misconfiguration rather than a per-row issue.

use crate::config;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during a completion call
#[derive(Error, Debug, Clone)]
pub enum GatewayError {
    #[error("transient completion failure: {0}")]
    Transient(String),

    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    #[error("authentication rejected by the completion service: {0}")]
    Auth(String),

    #[error("completion service rejected the request: {0}")]
    BadRequest(String),
}

impl GatewayError {
    /// Whether this error aborts the whole run rather than one row
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Auth(_) | Self::BadRequest(_))
    }
}

/// Sampling options for one completion call
#[derive(Debug, Clone)]
pub struct CompletionOptions {
    /// Model identifier
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Completion length cap
    pub max_tokens: u32,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            model: config::DEFAULT_MODEL.to_string(),
            temperature: 0.0,
            max_tokens: 200,
        }
    }
}

/// Token usage reported by the provider
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens billed for the prompt
    #[serde(default)]
    pub prompt_tokens: u64,
    /// Tokens billed for the completion
    #[serde(default)]
    pub completion_tokens: u64,
}

/// One raw completion with its billed cost
#[derive(Debug, Clone)]
pub struct RawCompletion {
    /// The model's text answer, verbatim
    pub text: String,
    /// Provider-reported usage
    pub usage: Usage,
    /// Billed dollar cost of this call
    pub cost: f64,
}

/// A completion service the pipeline can call
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Submit one prompt and return the raw completion
    ///
    /// # Errors
    ///
    /// Returns a `GatewayError` classified as transient or fatal.
    async fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<RawCompletion, GatewayError>;
}

// ============================================================================
// OpenRouter-compatible HTTP client
// ============================================================================

/// Chat-completions client for OpenRouter-compatible endpoints
pub struct OpenRouterClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageContent,
}

#[derive(Deserialize)]
struct ChatMessageContent {
    content: String,
}

impl OpenRouterClient {
    /// Per-request timeout
    const TIMEOUT: Duration = Duration::from_secs(60);

    /// Create a client from resolved settings
    #[must_use]
    pub fn new(settings: &config::Settings) -> Self {
        Self {
            api_key: settings.api_key.clone(),
            base_url: settings.base_url.clone(),
            client: reqwest::Client::builder()
                .timeout(Self::TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl CompletionClient for OpenRouterClient {
    async fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<RawCompletion, GatewayError> {
        let request = ChatRequest {
            model: options.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    GatewayError::Transient(e.to_string())
                } else {
                    GatewayError::BadRequest(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let payload: ChatResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Transient(format!("malformed completion payload: {e}")))?;

        let text = payload
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| GatewayError::Transient("empty choices in completion".to_string()))?;

        let cost = config::billed_cost(
            &options.model,
            payload.usage.prompt_tokens,
            payload.usage.completion_tokens,
        );

        Ok(RawCompletion {
            text,
            usage: payload.usage,
            cost,
        })
    }
}

fn classify_status(status: reqwest::StatusCode, body: &str) -> GatewayError {
    let detail = format!("{status}: {body}");
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        GatewayError::Transient(detail)
    } else if status == reqwest::StatusCode::UNAUTHORIZED
        || status == reqwest::StatusCode::FORBIDDEN
    {
        GatewayError::Auth(detail)
    } else {
        GatewayError::BadRequest(detail)
    }
}

// ============================================================================
// Retry policy and cost tracking
// ============================================================================

/// Bounded-retry policy with exponential backoff
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles per attempt after that
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Backoff before the given retry (attempt numbering starts at 1)
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * 2_u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// Ledger of billed gateway traffic for one run
#[derive(Debug)]
struct CostLedger {
    total: f64,
    billed_calls: u64,
}

/// Shared cost counter, safe to update from concurrent rows
#[derive(Debug)]
pub struct CostTracker {
    ledger: Mutex<CostLedger>,
}

impl Default for CostTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl CostTracker {
    /// Create an empty tracker
    #[must_use]
    pub fn new() -> Self {
        Self {
            ledger: Mutex::new(CostLedger {
                total: 0.0,
                billed_calls: 0,
            }),
        }
    }

    /// Record one billed attempt and its known cost (zero for failed calls,
    /// whose usage the provider does not report)
    pub fn record_attempt(&self, cost: f64) {
        let mut ledger = self.ledger.lock().expect("cost ledger poisoned");
        ledger.total += cost;
        ledger.billed_calls += 1;
    }

    /// Total dollars accumulated so far
    #[must_use]
    pub fn total(&self) -> f64 {
        self.ledger.lock().expect("cost ledger poisoned").total
    }

    /// Number of attempts submitted to the provider
    #[must_use]
    pub fn billed_calls(&self) -> u64 {
        self.ledger.lock().expect("cost ledger poisoned").billed_calls
    }
}

/// Call the gateway with retries for transient failures
///
/// Every attempt that reaches the provider is recorded in the tracker.
/// Fatal errors propagate immediately; transient errors retry with
/// exponential backoff until the policy is exhausted.
///
/// # Errors
///
/// Returns `GatewayError::RetriesExhausted` after the last transient
/// failure, or the fatal error unchanged.
pub async fn complete_with_retry(
    client: &dyn CompletionClient,
    prompt: &str,
    options: &CompletionOptions,
    policy: &RetryPolicy,
    tracker: &CostTracker,
) -> Result<RawCompletion, GatewayError> {
    let mut last_error = String::new();

    for attempt in 1..=policy.max_attempts {
        match client.complete(prompt, options).await {
            Ok(completion) => {
                tracker.record_attempt(completion.cost);
                return Ok(completion);
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracker.record_attempt(0.0);
                last_error = e.to_string();
                tracing::warn!(attempt, error = %last_error, "transient gateway failure");
                if attempt < policy.max_attempts {
                    tokio::time::sleep(policy.delay_for(attempt)).await;
                }
            }
        }
    }

    Err(GatewayError::RetriesExhausted {
        attempts: policy.max_attempts,
        last: last_error,
    })
}

// ============================================================================
// Mock client for tests
// ============================================================================

/// Scripted completion client used by tests in place of the network
pub struct MockClient {
    script: Mutex<VecDeque<Result<String, GatewayError>>>,
    fallback: String,
}

impl MockClient {
    /// Fixed usage reported per mock completion
    pub const MOCK_USAGE: Usage = Usage {
        prompt_tokens: 1000,
        completion_tokens: 20,
    };

    /// Create a mock that always answers with `fallback`
    #[must_use]
    pub fn always(fallback: &str) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: fallback.to_string(),
        }
    }

    /// Create a mock that plays the script in order, then the fallback
    #[must_use]
    pub fn scripted(script: Vec<Result<String, GatewayError>>, fallback: &str) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: fallback.to_string(),
        }
    }
}

#[async_trait]
impl CompletionClient for MockClient {
    async fn complete(
        &self,
        _prompt: &str,
        options: &CompletionOptions,
    ) -> Result<RawCompletion, GatewayError> {
        let next = self.script.lock().expect("mock script poisoned").pop_front();
        let text = match next {
            Some(Ok(text)) => text,
            Some(Err(e)) => return Err(e),
            None => self.fallback.clone(),
        };

        let usage = Self::MOCK_USAGE;
        Ok(RawCompletion {
            text,
            usage,
            cost: config::billed_cost(&options.model, usage.prompt_tokens, usage.completion_tokens),
        })
    }
}
