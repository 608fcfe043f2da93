//! Error types for acquisition and embedding.

use std::path::PathBuf;

use hf_hub::api::tokio::ApiError;
use thiserror::Error;

/// Errors that can occur while loading a model or computing an embedding.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Candle model error
    #[error("Candle error: {0}")]
    Candle(#[from] candle_core::Error),

    /// Tokenizer error
    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    /// llama.cpp backend error
    #[error("llama.cpp error: {0}")]
    Llama(String),

    /// Model file not found
    #[error("Model file not found: {0}")]
    ModelNotFound(String),

    /// Path exists but no backend can load it
    #[error("Unsupported model: {0}")]
    UnsupportedModel(String),

    /// Model configuration present but unreadable
    #[error("Invalid model config: {0}")]
    InvalidConfig(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Errors that can occur while fetching a model snapshot.
#[derive(Debug, Error)]
pub enum AcquireError {
    /// Registry-level failure: auth, not found, rate limit, connectivity
    #[error("registry request for {model_id} failed: {source}")]
    Registry {
        model_id: String,
        #[source]
        source: ApiError,
    },

    /// A single file of the snapshot could not be fetched
    #[error("failed to fetch {file} from {model_id}: {source}")]
    Transfer {
        model_id: String,
        file: String,
        #[source]
        source: ApiError,
    },

    /// Writing into the target directory failed
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Remote file name would escape the target directory
    #[error("refusing to write remote file outside target directory: {file}")]
    UnsafePath { file: String },
}

impl AcquireError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AcquireError::Io {
            path: path.into(),
            source,
        }
    }
}
