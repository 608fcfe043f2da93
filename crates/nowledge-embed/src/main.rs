//! nowledge embedder
//!
//! Reads text from stdin and prints its embedding as one JSON array.
//!
//! # Usage
//!
//! ```bash
//! echo "hello world" | nowledge-embed ./models
//! ```
//!
//! Exit status: 0 on success, 1 on usage errors, 2 when the model cannot be
//! loaded or the embedding cannot be computed.

use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::Parser;

use nowledge_embed::{run, Cli, EXIT_USAGE};

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
                err.exit();
            }
            let _ = err.print();
            return ExitCode::from(EXIT_USAGE);
        }
    };

    run(cli)
}
