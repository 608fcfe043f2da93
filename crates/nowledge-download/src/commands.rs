//! Download command implementation.
//!
//! Settings are resolved once, then a single acquisition attempt runs. Only
//! this module turns the outcome into an exit status.

use std::process::ExitCode;

use anyhow::{Context, Result};
use nowledge_embeddings::acquire_snapshot;
use nowledge_types::DownloadSettings;
use tracing::{debug, info};

use crate::cli::Cli;

/// Resolve settings, fetch the snapshot and report the result.
///
/// Returns exit code 0 on success, 1 on configuration or transfer failure.
pub async fn run(cli: Cli) -> ExitCode {
    let settings = match resolve_settings(&cli) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("✗ {:#}", err);
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = init_logging(&settings.log_level) {
        eprintln!("✗ {:#}", err);
        return ExitCode::FAILURE;
    }

    let target_dir = settings.target_dir();
    println!("Downloading {} → {}", settings.model_id, target_dir.display());
    debug!(
        revision = %settings.revision,
        max_workers = settings.max_workers,
        authenticated = settings.token.is_some(),
        "Resolved settings"
    );

    match acquire_snapshot(&settings).await {
        Ok(report) => {
            info!(
                sha = %report.sha,
                files = report.files.len(),
                copied = report.copied,
                already_present = report.already_present,
                "Download finished"
            );
            println!(
                "✓ Downloaded model {} to {}",
                report.model_id,
                report.target_dir.display()
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("✗ Failed to download model {}: {}", settings.model_id, err);
            ExitCode::FAILURE
        }
    }
}

/// Load layered settings and apply CLI flags on top.
pub fn resolve_settings(cli: &Cli) -> Result<DownloadSettings> {
    let settings =
        DownloadSettings::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let settings = apply_overrides(settings, cli);
    settings.validate().context("Invalid configuration")?;
    Ok(settings)
}

/// CLI flags take precedence over every other source.
pub fn apply_overrides(mut settings: DownloadSettings, cli: &Cli) -> DownloadSettings {
    if let Some(model_id) = &cli.model_id {
        settings.model_id = model_id.clone();
    }
    if let Some(model_path) = &cli.model_path {
        settings.model_path = model_path.clone();
    }
    if let Some(revision) = &cli.revision {
        settings.revision = revision.clone();
    }
    if let Some(max_workers) = cli.max_workers {
        settings.max_workers = max_workers;
    }
    if let Some(log_level) = &cli.log_level {
        settings.log_level = log_level.clone();
    }
    settings
}

/// Logs go to stderr; stdout carries only the status lines.
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
