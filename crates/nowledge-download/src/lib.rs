//! Model downloader library exports.
//!
//! - `cli`: command-line argument parsing with clap
//! - `commands`: settings resolution and the download run

pub mod cli;
pub mod commands;

pub use cli::Cli;
pub use commands::{apply_overrides, resolve_settings, run};
