//! Error types shared by the nowledge crates.

use thiserror::Error;

/// Errors raised while assembling configuration.
#[derive(Debug, Error)]
pub enum NowledgeError {
    /// Configuration source could not be read or deserialized
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration loaded but holds an unusable value
    #[error("Invalid setting `{key}`: {reason}")]
    InvalidSetting { key: &'static str, reason: String },
}

impl From<config::ConfigError> for NowledgeError {
    fn from(err: config::ConfigError) -> Self {
        NowledgeError::Config(err.to_string())
    }
}
