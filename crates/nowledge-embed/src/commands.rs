//! Embed command implementation.
//!
//! One invocation loads one model and computes one embedding. Failures are not
//! recovered; they surface at `run`, which maps them to an exit status.

use std::io::{self, Read};
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use nowledge_embeddings::{load_model, EmbedOptions, Embedding};
use tracing::debug;

use crate::cli::Cli;

/// Exit status for usage errors (missing or malformed arguments).
pub const EXIT_USAGE: u8 = 1;

/// Exit status when the model cannot be loaded or the embedding fails.
pub const EXIT_FAILURE: u8 = 2;

/// Read the request from stdin, embed it and print the JSON array.
pub fn run(cli: Cli) -> ExitCode {
    if let Err(err) = init_logging(&cli.log_level) {
        eprintln!("Error: {:#}", err);
        return ExitCode::from(EXIT_FAILURE);
    }

    let result = EmbedOptions::with_context_window(cli.context_window)
        .map_err(anyhow::Error::from)
        .and_then(|options| {
            let text = read_request(io::stdin().lock()).context("Failed to read stdin")?;
            embed_text(&cli.model_path, &text, &options)
        })
        .and_then(|embedding| embedding.to_json().context("Failed to serialize embedding"));

    match result {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("Error: {:?}", err);
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

/// Read the whole request and trim surrounding whitespace.
pub fn read_request<R: Read>(mut reader: R) -> io::Result<String> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    Ok(text.trim().to_string())
}

/// Load the model at `model_path` and embed `text` with it.
pub fn embed_text(model_path: &Path, text: &str, options: &EmbedOptions) -> Result<Embedding> {
    let model = load_model(model_path, options)
        .with_context(|| format!("Failed to load model from {}", model_path.display()))?;

    let info = model.info();
    debug!(
        model = %info.name,
        backend = %info.backend,
        dim = info.dimension,
        chars = text.len(),
        "Computing embedding"
    );

    model.embed(text).context("Failed to compute embedding")
}

/// Logs go to stderr; stdout carries only the JSON array.
fn init_logging(level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}
