//! Environment-sourced gateway settings and the per-model pricing table.

use thiserror::Error;

/// Errors that can occur while resolving settings
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("OPENROUTER_API_KEY is not set")]
    MissingApiKey,
}

/// Default completion endpoint base
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Default model identifier
pub const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";

/// Connection settings for the completion service
#[derive(Debug, Clone)]
pub struct Settings {
    /// Bearer credential for the completion service
    pub api_key: String,
    /// Endpoint base URL
    pub base_url: String,
    /// Model identifier submitted with every request
    pub model: String,
}

impl Settings {
    /// Resolve settings from the environment
    ///
    /// Reads `OPENROUTER_API_KEY` (required), `OPENROUTER_BASE`, and
    /// `OPENROUTER_MODEL`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingApiKey` when the credential is absent.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("OPENROUTER_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        Ok(Self {
            api_key,
            base_url: std::env::var("OPENROUTER_BASE")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            model: std::env::var("OPENROUTER_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
        })
    }
}

/// Billing rates for one model, in dollars per million tokens
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPricing {
    /// Prompt-token rate
    pub prompt_per_million: f64,
    /// Completion-token rate
    pub completion_per_million: f64,
}

/// Pricing table, dollars per 1M tokens
const PRICING: &[(&str, ModelPricing)] = &[
    (
        "openai/gpt-4o-mini",
        ModelPricing {
            prompt_per_million: 0.15,
            completion_per_million: 0.60,
        },
    ),
    (
        "openai/gpt-4o",
        ModelPricing {
            prompt_per_million: 2.50,
            completion_per_million: 10.00,
        },
    ),
    (
        "openai/gpt-3.5-turbo",
        ModelPricing {
            prompt_per_million: 0.50,
            completion_per_million: 1.50,
        },
    ),
    (
        "anthropic/claude-3-sonnet",
        ModelPricing {
            prompt_per_million: 3.00,
            completion_per_million: 15.00,
        },
    ),
    (
        "anthropic/claude-3-haiku",
        ModelPricing {
            prompt_per_million: 0.25,
            completion_per_million: 1.25,
        },
    ),
];

/// Look up billing rates for a model, falling back to the cheapest tier
#[must_use]
pub fn pricing_for(model: &str) -> ModelPricing {
    PRICING.iter().find(|(id, _)| *id == model).map_or(
        ModelPricing {
            prompt_per_million: 0.15,
            completion_per_million: 0.60,
        },
        |(_, pricing)| *pricing,
    )
}

/// Billed dollar cost of one completion call
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn billed_cost(model: &str, prompt_tokens: u64, completion_tokens: u64) -> f64 {
    let pricing = pricing_for(model);
    (prompt_tokens as f64 / 1_000_000.0) * pricing.prompt_per_million
        + (completion_tokens as f64 / 1_000_000.0) * pricing.completion_per_million
}
