//! Churn Scoring - Command Line Entry Point
//!
//! Reads a customer record (or a batch of them) as JSON from stdin or the
//! first argument, scores it and writes the result as JSON to stdout.
//!
//! Usage:
//! ```text
//! echo '{"customer_data": {...}, "include_shap": true}' | churn-scoring
//! churn-scoring --config config/config.toml '[{...}, {...}]'
//! ```

use anyhow::Result;
use churn_scoring::{
    config::{AppConfig, LoggingConfig},
    metrics::BatchSummary,
    models::{ArtifactLoader, ContextCache, Predictor},
    types::ScoringRequest,
    ServingError,
};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use serde_json::json;
use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Score bank customers for churn risk")]
struct Args {
    /// Configuration file (default: config/config.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Request JSON; read from stdin when piped
    input: Option<String>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let input = match read_input(args.input.as_deref()) {
        Ok(Some(input)) => input,
        Ok(None) => Args::command()
            .error(
                ErrorKind::MissingRequiredArgument,
                "no input: pipe a JSON request on stdin or pass it as an argument",
            )
            .exit(),
        Err(e) => return report_failure(&e.into()),
    };

    match run(args.config.as_deref(), &input) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => report_failure(&e),
    }
}

/// `{"error"}` on stdout, the full chain on stderr.
fn report_failure(e: &anyhow::Error) -> ExitCode {
    println!("{}", json!({ "error": e.to_string() }));
    eprintln!("Error: {e}");
    eprintln!("{e:?}");
    ExitCode::FAILURE
}

/// Stdin when it is piped and non-empty, otherwise the positional argument.
/// Unreadable stdin is an input error, not a missing input.
fn read_input(arg: Option<&str>) -> Result<Option<String>, ServingError> {
    let stdin = io::stdin();
    if !stdin.is_terminal() {
        let mut bytes = Vec::new();
        stdin
            .lock()
            .read_to_end(&mut bytes)
            .map_err(|e| ServingError::InputParse(format!("Failed to read stdin: {e}")))?;
        let buffer = String::from_utf8(bytes).map_err(|e| {
            ServingError::InputParse(format!("Invalid JSON input: stdin is not UTF-8 ({e})"))
        })?;
        if !buffer.trim().is_empty() {
            return Ok(Some(buffer));
        }
    }
    Ok(arg.filter(|s| !s.trim().is_empty()).map(str::to_string))
}

fn run(config_path: Option<&std::path::Path>, input: &str) -> Result<String> {
    let config = AppConfig::load_or_default(config_path)?;
    init_tracing(&config.logging)?;
    debug!(?config_path, "Configuration loaded");

    let request = ScoringRequest::from_json(input)?;

    let loader = ArtifactLoader::from_config(&config.artifacts);
    let cache = ContextCache::new();
    let context = cache.get_or_load(&loader)?;
    let predictor = Predictor::from_config(Arc::clone(&context), &config);

    let output = match request {
        ScoringRequest::Single {
            record,
            include_shap,
        } => {
            let result = predictor.predict(&record, include_shap)?;
            serde_json::to_string(&result)?
        }
        ScoringRequest::Batch {
            records,
            include_shap,
        } => {
            info!(records = records.len(), "Scoring batch");
            let predictions = predictor.predict_batch(&records, include_shap);
            let summary = BatchSummary::from_entries(&predictions);
            predictor.metrics().print_summary();
            serde_json::to_string(&json!({
                "predictions": predictions,
                "summary": summary,
            }))?
        }
    };

    Ok(output)
}

/// Logs go to stderr; stdout carries only the result.
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);

    if logging.format == "json" {
        builder.json().try_init().map_err(|e| anyhow::anyhow!(e))?;
    } else {
        builder.try_init().map_err(|e| anyhow::anyhow!(e))?;
    }
    Ok(())
}
