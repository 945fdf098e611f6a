//! Prompt assembly for the question-to-request task.
//!
//! A prompt is one text blob: instruction preamble, the endpoint catalog,
//! the few-shot examples, and the target question with an answer cue. The
//! builder is a pure function of its inputs, which is what makes prompt
//! fixtures reproducible byte for byte.

use crate::catalog;
use crate::dataset::Example;
use std::fmt::Write as FmtWrite;
use thiserror::Error;

/// Errors that can occur during prompt assembly
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PromptError {
    #[error("assembled prompt is {actual} bytes, over the {limit}-byte bound")]
    TooLarge { actual: usize, limit: usize },
}

/// Default upper bound on assembled prompt size, in bytes
pub const DEFAULT_PROMPT_LIMIT: usize = 32 * 1024;

const INSTRUCTION: &str = "You are an expert on a trading platform's TradeAPI. \
Convert the user's question into an HTTP request against the API.\n\
Answer with exactly one line of the form `METHOD PATH`, where METHOD is one of \
GET, POST, PUT, DELETE, PATCH and PATH begins with `/`. No explanations.";

/// Assembles prompts from a fixed instruction, the endpoint catalog, and
/// few-shot examples
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    limit: usize,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PROMPT_LIMIT,
        }
    }
}

impl PromptBuilder {
    /// Create a builder with the default size bound
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder with a custom size bound
    #[must_use]
    pub const fn with_limit(limit: usize) -> Self {
        Self { limit }
    }

    /// Assemble the prompt for one question
    ///
    /// Identical `(examples, question)` inputs always yield byte-identical
    /// output. Content is never truncated: a prompt over the size bound fails
    /// instead, since silent truncation would corrupt the expected-output
    /// grammar.
    ///
    /// # Errors
    ///
    /// Returns `PromptError::TooLarge` when the assembled text exceeds the
    /// configured bound.
    pub fn build(&self, examples: &[&Example], question: &str) -> Result<String, PromptError> {
        let mut prompt = String::new();

        prompt.push_str(INSTRUCTION);
        prompt.push_str("\n\n");
        prompt.push_str(&catalog::reference_block());
        prompt.push_str("\nExamples:\n\n");

        for example in examples {
            let _ = writeln!(prompt, "Question: \"{}\"", example.question);
            let _ = writeln!(prompt, "Answer: {} {}", example.method, example.path);
            prompt.push('\n');
        }

        let _ = writeln!(prompt, "Question: \"{question}\"");
        prompt.push_str("Answer (HTTP method and path only):");

        if prompt.len() > self.limit {
            return Err(PromptError::TooLarge {
                actual: prompt.len(),
                limit: self.limit,
            });
        }

        Ok(prompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::HttpMethod;

    fn example(question: &str, method: HttpMethod, path: &str) -> Example {
        Example {
            question: question.to_string(),
            method,
            path: path.to_string(),
        }
    }

    #[test]
    fn test_build_is_pure() {
        let examples = [
            example("list exchanges", HttpMethod::Get, "/v1/exchanges"),
            example("open a session", HttpMethod::Post, "/v1/sessions"),
        ];
        let refs: Vec<&Example> = examples.iter().collect();

        let builder = PromptBuilder::new();
        let first = builder.build(&refs, "cancel my order").unwrap();
        let second = builder.build(&refs, "cancel my order").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_build_contains_all_blocks() {
        let examples = [example("list exchanges", HttpMethod::Get, "/v1/exchanges")];
        let refs: Vec<&Example> = examples.iter().collect();

        let prompt = PromptBuilder::new().build(&refs, "show the GAZP orderbook").unwrap();
        assert!(prompt.contains("METHOD PATH"));
        assert!(prompt.contains("API reference:"));
        assert!(prompt.contains("Question: \"list exchanges\""));
        assert!(prompt.contains("Answer: GET /v1/exchanges"));
        assert!(prompt.contains("Question: \"show the GAZP orderbook\""));
        assert!(prompt.ends_with("Answer (HTTP method and path only):"));
    }

    #[test]
    fn test_build_renders_examples_in_given_order() {
        let examples = [
            example("b question", HttpMethod::Post, "/v1/sessions"),
            example("a question", HttpMethod::Get, "/v1/exchanges"),
        ];
        let refs: Vec<&Example> = examples.iter().collect();

        let prompt = PromptBuilder::new().build(&refs, "q").unwrap();
        let b_at = prompt.find("b question").unwrap();
        let a_at = prompt.find("a question").unwrap();
        assert!(b_at < a_at);
    }

    #[test]
    fn test_build_rejects_oversized_prompt() {
        let long_question = "x".repeat(512);
        let examples = [example(&long_question, HttpMethod::Get, "/v1/exchanges")];
        let refs: Vec<&Example> = examples.iter().collect();

        let result = PromptBuilder::with_limit(256).build(&refs, "q");
        assert!(matches!(
            result,
            Err(PromptError::TooLarge { limit: 256, .. })
        ));
    }

    #[test]
    fn test_build_never_truncates() {
        // A prompt just under the bound passes through whole.
        let examples: [&Example; 0] = [];
        let prompt = PromptBuilder::new().build(&examples, "short").unwrap();
        assert!(prompt.len() <= DEFAULT_PROMPT_LIMIT);
        assert!(prompt.contains("short"));
    }
}
