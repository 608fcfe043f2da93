//! Embedding command library exports.
//!
//! - `cli`: command-line argument parsing with clap
//! - `commands`: request reading, model loading and output

pub mod cli;
pub mod commands;

pub use cli::Cli;
pub use commands::{embed_text, read_request, run, EXIT_FAILURE, EXIT_USAGE};
