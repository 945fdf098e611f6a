//! TradeAPI Bench CLI
//!
//! Generate, validate, and score submissions for the question-to-request
//! benchmark.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use tradeapi_bench::{
    load_references, load_test_cases, render_metrics, render_run_summary, render_validation,
    ExampleBank, MetricsCalculator, OpenRouterClient, Pipeline, RunnerConfig, Settings,
    SubmissionStore, Validator,
};

#[derive(Parser)]
#[command(name = "tradeapi-bench")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a submission file from the test set
    Generate {
        /// Path to the test set
        #[arg(long, default_value = "data/test.csv")]
        test_file: PathBuf,

        /// Path to the labeled training set
        #[arg(long, default_value = "data/train.csv")]
        train_file: PathBuf,

        /// Path to write the submission to
        #[arg(long, default_value = "data/submission.csv")]
        output_file: PathBuf,

        /// Few-shot examples per prompt
        #[arg(long, default_value = "10")]
        num_examples: usize,

        /// Seed for example selection
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Rows processed concurrently
        #[arg(long, default_value = "5")]
        batch_size: usize,

        /// Model identifier (overrides OPENROUTER_MODEL)
        #[arg(long)]
        model: Option<String>,
    },

    /// Validate a submission file against the test set
    Validate {
        /// Submission file to check
        #[arg(long, default_value = "data/submission.csv")]
        file: PathBuf,

        /// Path to the test set the submission must cover
        #[arg(long, default_value = "data/test.csv")]
        test_file: PathBuf,
    },

    /// Score a submission against reference answers
    Score {
        /// Submission file with predictions
        #[arg(long, default_value = "data/submission.csv")]
        pred: PathBuf,

        /// Reference answer file
        #[arg(long, default_value = "data/reference.csv")]
        reference: PathBuf,

        /// Number of sample errors to display
        #[arg(long, default_value = "5")]
        show_errors: usize,

        /// Write all mismatches to this CSV file
        #[arg(long)]
        save_errors: Option<PathBuf>,

        /// Emit the report as JSON instead of tables
        #[arg(long)]
        json: bool,
    },

    /// Show training-set statistics
    DatasetStats {
        /// Path to the labeled training set
        #[arg(long, default_value = "data/train.csv")]
        train_file: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if cli.verbose {
        tracing::info!("Verbose mode enabled");
    }

    if let Err(e) = run(cli.command).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Generate {
            test_file,
            train_file,
            output_file,
            num_examples,
            seed,
            batch_size,
            model,
        } => {
            let settings = Settings::from_env().context("resolving gateway settings")?;
            let model = model.unwrap_or_else(|| settings.model.clone());

            let bank = ExampleBank::load(&train_file)
                .with_context(|| format!("loading {}", train_file.display()))?;
            let cases = load_test_cases(&test_file)
                .with_context(|| format!("loading {}", test_file.display()))?;

            tracing::info!(
                examples = bank.len(),
                cases = cases.len(),
                model = %model,
                "inputs loaded"
            );

            let client = OpenRouterClient::new(&settings);
            let pipeline = Pipeline::new(&client, &model).with_config(RunnerConfig {
                num_examples,
                seed,
                batch_size,
                ..RunnerConfig::default()
            });

            let outcome = pipeline
                .run(&bank, &cases)
                .await
                .context("generation run failed")?;

            if let Some(parent) = output_file.parent() {
                std::fs::create_dir_all(parent)?;
            }
            outcome
                .store
                .write_all(&output_file)
                .with_context(|| format!("writing {}", output_file.display()))?;

            println!("{}", render_run_summary(&outcome.summary));
            println!(
                "Wrote {} predictions to {}",
                outcome.store.len(),
                output_file.display()
            );
        }

        Commands::Validate { file, test_file } => {
            let cases = load_test_cases(&test_file)
                .with_context(|| format!("loading {}", test_file.display()))?;
            let validator = Validator::new(cases.iter().map(|c| c.id));

            let report = validator
                .validate(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            print!("{}", render_validation(&report));

            if !report.is_valid() {
                std::process::exit(1);
            }
        }

        Commands::Score {
            pred,
            reference,
            show_errors,
            save_errors,
            json,
        } => {
            let predictions = SubmissionStore::read_all(&pred)
                .with_context(|| format!("reading {}", pred.display()))?;
            let references = load_references(&reference)
                .with_context(|| format!("reading {}", reference.display()))?;

            let calculator = MetricsCalculator::new(show_errors);
            let metrics = calculator.score(&predictions, &references);
            if json {
                println!("{}", serde_json::to_string_pretty(&metrics)?);
            } else {
                print!("{}", render_metrics(&metrics));
            }

            if let Some(path) = save_errors {
                // Re-score with an uncapped sample to dump every mismatch.
                let full = MetricsCalculator::new(usize::MAX).score(&predictions, &references);
                write_error_dump(&path, &full.sample_errors)
                    .with_context(|| format!("writing {}", path.display()))?;
                println!("Saved {} mismatches to {}", full.sample_errors.len(), path.display());
            }
        }

        Commands::DatasetStats { train_file } => {
            let bank = ExampleBank::load(&train_file)
                .with_context(|| format!("loading {}", train_file.display()))?;

            println!("Training set: {}", train_file.display());
            println!("Examples: {}", bank.len());
            for method in tradeapi_bench::HttpMethod::ALL {
                let count = bank.iter().filter(|e| e.method == method).count();
                if count > 0 {
                    println!("  {method}: {count}");
                }
            }
        }
    }

    Ok(())
}

fn write_error_dump(
    path: &PathBuf,
    errors: &[tradeapi_bench::SampleError],
) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::WriterBuilder::new().delimiter(b';').from_path(path)?;
    writer.write_record([
        "id",
        "predicted_method",
        "predicted_path",
        "expected_method",
        "expected_path",
    ])?;
    for error in errors {
        writer.write_record([
            error.id.to_string().as_str(),
            error.predicted_method.as_str(),
            error.predicted_path.as_str(),
            error.expected_method.as_str(),
            error.expected_path.as_str(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
