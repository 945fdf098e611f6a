//! Loading of the labeled training set and the held-out test set.
//!
//! Both files are `;`-delimited CSV. The training set labels each question
//! with its expected `method` and `path`; the test set carries only an `id`
//! and a `question`. Few-shot selection is deterministic for a fixed seed.

use crate::parser::HttpMethod;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Delimiter shared by every data file in the benchmark
pub const DELIMITER: u8 = b';';

/// Errors that can occur while loading data files
#[derive(Error, Debug)]
pub enum DataError {
    #[error("data file not found: {0}")]
    NotFound(String),

    #[error("{file}: missing required column `{column}`")]
    MissingColumn { file: String, column: String },

    #[error("{file}: row {row}: {message}")]
    BadRow {
        file: String,
        row: usize,
        message: String,
    },

    #[error("no rows found in {0}")]
    Empty(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A labeled training example shown to the model as an in-context demonstration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Example {
    /// Natural-language question
    pub question: String,
    /// Expected HTTP verb
    pub method: HttpMethod,
    /// Expected request path
    pub path: String,
}

/// One held-out question to predict a request for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    /// Row identifier, preserved in the submission
    pub id: u64,
    /// Natural-language question
    pub question: String,
}

#[derive(Debug, Deserialize)]
struct TrainRow {
    question: String,
    method: String,
    path: String,
}

#[derive(Debug, Deserialize)]
struct TestRow {
    id: u64,
    question: String,
}

/// The bank of labeled examples used for few-shot conditioning
#[derive(Debug)]
pub struct ExampleBank {
    examples: Vec<Example>,
}

impl ExampleBank {
    /// Load the training set from a `;`-delimited CSV file
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, a required column is absent,
    /// a method value is outside the allowed verb set, or no rows are found.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DataError> {
        let path = path.as_ref();
        let file = path.display().to_string();

        if !path.exists() {
            return Err(DataError::NotFound(file));
        }

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(DELIMITER)
            .from_path(path)?;
        require_columns(&mut reader, &file, &["question", "method", "path"])?;

        let mut examples = Vec::new();
        for (row, record) in reader.deserialize::<TrainRow>().enumerate() {
            let record = record?;
            let method =
                record
                    .method
                    .parse::<HttpMethod>()
                    .map_err(|_| DataError::BadRow {
                        file: file.clone(),
                        row: row + 2,
                        message: format!("method `{}` is not an allowed verb", record.method),
                    })?;
            examples.push(Example {
                question: record.question,
                method,
                path: record.path,
            });
        }

        if examples.is_empty() {
            return Err(DataError::Empty(file));
        }

        Ok(Self { examples })
    }

    /// Number of examples in the bank
    #[must_use]
    pub fn len(&self) -> usize {
        self.examples.len()
    }

    /// Check if the bank is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    /// Iterator over all examples in load order
    pub fn iter(&self) -> impl Iterator<Item = &Example> {
        self.examples.iter()
    }

    /// Select `n` examples for few-shot conditioning, deterministically
    ///
    /// The selection is method-balanced: mostly GET exemplars, topped up with
    /// up to two POST and one DELETE when the bank has them, so the prompt
    /// demonstrates every verb the benchmark submits. Identical `(n, seed)`
    /// pairs always return the identical ordered subset. An `n` larger than
    /// the bank clamps to the bank size with a logged warning.
    #[must_use]
    pub fn select(&self, n: usize, seed: u64) -> Vec<&Example> {
        let n = if n > self.examples.len() {
            tracing::warn!(
                requested = n,
                available = self.examples.len(),
                "few-shot request exceeds the bank, clamping"
            );
            self.examples.len()
        } else {
            n
        };

        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let mut gets: Vec<&Example> = self.by_method(HttpMethod::Get);
        let mut posts: Vec<&Example> = self.by_method(HttpMethod::Post);
        let mut deletes: Vec<&Example> = self.by_method(HttpMethod::Delete);
        gets.shuffle(&mut rng);
        posts.shuffle(&mut rng);
        deletes.shuffle(&mut rng);

        let post_take = posts.len().min(2).min(n);
        let delete_take = deletes.len().min(1).min(n.saturating_sub(post_take));
        let get_take = gets
            .len()
            .min(n.saturating_sub(post_take + delete_take));

        let mut selected: Vec<&Example> = Vec::with_capacity(n);
        selected.extend(gets.iter().take(get_take).copied());
        selected.extend(posts.iter().take(post_take).copied());
        selected.extend(deletes.iter().take(delete_take).copied());

        // Top up from the remaining verbs (PUT, PATCH, surplus POST/DELETE)
        // when the balanced draw comes up short.
        if selected.len() < n {
            let mut rest: Vec<&Example> = self
                .examples
                .iter()
                .filter(|e| !selected.iter().any(|s| std::ptr::eq(*s, *e)))
                .collect();
            rest.shuffle(&mut rng);
            let missing = n - selected.len();
            selected.extend(rest.into_iter().take(missing));
        }

        selected.truncate(n);
        selected
    }

    fn by_method(&self, method: HttpMethod) -> Vec<&Example> {
        self.examples
            .iter()
            .filter(|e| e.method == method)
            .collect()
    }
}

/// Load the held-out test set from a `;`-delimited CSV file
///
/// Ordering is preserved; it drives the order of gateway submission.
///
/// # Errors
///
/// Returns an error if the file is missing, the `id`/`question` columns are
/// absent, an id is unparseable, or no rows are found.
pub fn load_test_cases<P: AsRef<Path>>(path: P) -> Result<Vec<TestCase>, DataError> {
    let path = path.as_ref();
    let file = path.display().to_string();

    if !path.exists() {
        return Err(DataError::NotFound(file));
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(DELIMITER)
        .from_path(path)?;
    require_columns(&mut reader, &file, &["id", "question"])?;

    let mut cases = Vec::new();
    for record in reader.deserialize::<TestRow>() {
        let record = record?;
        cases.push(TestCase {
            id: record.id,
            question: record.question,
        });
    }

    if cases.is_empty() {
        return Err(DataError::Empty(file));
    }

    Ok(cases)
}

fn require_columns<R: std::io::Read>(
    reader: &mut csv::Reader<R>,
    file: &str,
    columns: &[&str],
) -> Result<(), DataError> {
    let headers = reader.headers()?.clone();
    for column in columns {
        if !headers.iter().any(|h| h == *column) {
            return Err(DataError::MissingColumn {
                file: file.to_string(),
                column: (*column).to_string(),
            });
        }
    }
    Ok(())
}
