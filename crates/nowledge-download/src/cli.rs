//! CLI argument parsing for the model downloader.
//!
//! Flags override config file and environment values.

use clap::Parser;

/// Fetch an embedding model snapshot into a local directory
#[derive(Parser, Debug, Default)]
#[command(name = "nowledge-download")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/nowledge/config.toml)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Model identifier on the hub, e.g. TaylorAI/bge-micro-v2
    #[arg(long)]
    pub model_id: Option<String>,

    /// Directory that receives the model files
    #[arg(long)]
    pub model_path: Option<String>,

    /// Branch, tag or commit to fetch
    #[arg(long)]
    pub revision: Option<String>,

    /// Maximum concurrent file transfers
    #[arg(long)]
    pub max_workers: Option<usize>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    pub log_level: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_arguments_required() {
        let cli = Cli::parse_from(["nowledge-download"]);
        assert!(cli.model_id.is_none());
        assert!(cli.model_path.is_none());
        assert!(cli.max_workers.is_none());
    }

    #[test]
    fn test_overrides_parse() {
        let cli = Cli::parse_from([
            "nowledge-download",
            "--model-id",
            "acme/embed",
            "--model-path",
            "./models-test",
            "--max-workers",
            "4",
            "-l",
            "debug",
        ]);
        assert_eq!(cli.model_id.as_deref(), Some("acme/embed"));
        assert_eq!(cli.model_path.as_deref(), Some("./models-test"));
        assert_eq!(cli.max_workers, Some(4));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_rejects_non_numeric_workers() {
        assert!(Cli::try_parse_from(["nowledge-download", "--max-workers", "many"]).is_err());
    }
}
