//! CLI argument parsing for the embedder.

use std::path::PathBuf;

use clap::Parser;
use nowledge_embeddings::DEFAULT_CONTEXT_WINDOW;

/// Embed text from stdin with a local model and print a JSON array
#[derive(Parser, Debug)]
#[command(name = "nowledge-embed")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Model directory, weights file or .gguf file
    pub model_path: PathBuf,

    /// Maximum tokens per embedding; longer input is truncated
    #[arg(long, default_value_t = DEFAULT_CONTEXT_WINDOW, value_parser = clap::value_parser!(u32).range(1..))]
    pub context_window: u32,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn")]
    pub log_level: String,
}
