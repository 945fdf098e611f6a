//! Extraction of a normalized `(method, path)` pair from free-text model output.
//!
//! The model is instructed to answer with a single `METHOD /path` line, but
//! real completions arrive wrapped in prose, markdown fences, or multiple
//! candidate lines. The parser scans for the first token pair matching the
//! grammar and never panics on malformed input.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur while parsing a model answer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("no line matches the `METHOD /path` grammar")]
    NoMatch,

    #[error("method `{0}` is outside the allowed verb set")]
    UnknownMethod(String),
}

/// HTTP verbs the trading API accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpMethod {
    /// All verbs, in grammar-scan order
    pub const ALL: [Self; 5] = [Self::Get, Self::Post, Self::Put, Self::Delete, Self::Patch];

    /// Uppercase wire representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = ParseError;

    /// Parse a verb token, case-insensitively
    ///
    /// # Errors
    ///
    /// Returns `ParseError::UnknownMethod` for tokens outside the closed set.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            "PATCH" => Ok(Self::Patch),
            _ => Err(ParseError::UnknownMethod(s.to_string())),
        }
    }
}

/// A successfully extracted and normalized answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAnswer {
    /// Extracted HTTP verb
    pub method: HttpMethod,
    /// Normalized request path, always starting with `/`
    pub path: String,
}

/// Extract the first `(method, path)` pair from raw model output
///
/// Scans line by line, then token by token within each line, so the pair may
/// sit mid-sentence ("Use GET /v1/... to get the quote."). Surrounding prose,
/// markdown backticks, and trailing punctuation on the path token are ignored.
///
/// # Errors
///
/// Returns `ParseError::NoMatch` if no token pair matches the grammar.
pub fn parse(raw: &str) -> Result<ParsedAnswer, ParseError> {
    for line in raw.lines() {
        let tokens: Vec<&str> = line.split_whitespace().collect();

        for pair in tokens.windows(2) {
            let verb = strip_markup(pair[0]);
            let Ok(method) = HttpMethod::from_str(verb) else {
                continue;
            };

            let candidate = strip_markup(pair[1].trim_end_matches(['.', ',', ';', ')']));
            if candidate.starts_with('/') {
                return Ok(ParsedAnswer {
                    method,
                    path: normalize_path(candidate),
                });
            }
        }
    }

    Err(ParseError::NoMatch)
}

/// Strip markdown emphasis and code markup from a token
fn strip_markup(token: &str) -> &str {
    token.trim_matches(['`', '*', '"', '\''])
}

/// Normalize a path: trim trailing whitespace, collapse duplicate slashes
#[must_use]
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_end();
    let mut out = String::with_capacity(trimmed.len());
    let mut previous_slash = false;

    for c in trimmed.chars() {
        if c == '/' {
            if previous_slash {
                continue;
            }
            previous_slash = true;
        } else {
            previous_slash = false;
        }
        out.push(c);
    }

    out
}
