//! nowledge model downloader
//!
//! Ensures an embedding model's files are present in a local directory.
//!
//! # Usage
//!
//! ```bash
//! nowledge-download [--model-id ID] [--model-path DIR] [--max-workers N]
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults (`TaylorAI/bge-micro-v2` into `./models`)
//! 2. Config file (~/.config/nowledge/config.toml, or `--config`)
//! 3. Environment variables (NOWLEDGE_MODEL_ID, NOWLEDGE_MODEL_PATH, ...)
//! 4. CLI flags
//!
//! Exits 0 once the directory holds the full snapshot, 1 on any failure.

use std::process::ExitCode;

use clap::Parser;

use nowledge_download::{run, Cli};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    run(Cli::parse()).await
}
