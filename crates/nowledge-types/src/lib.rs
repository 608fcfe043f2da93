//! # nowledge-types
//!
//! Shared types for the nowledge model tools.
//!
//! - `config`: layered settings for model acquisition
//! - `error`: configuration error type

pub mod config;
pub mod error;

pub use self::config::{
    DownloadSettings, DEFAULT_LOG_LEVEL, DEFAULT_MAX_WORKERS, DEFAULT_MODEL_ID, DEFAULT_MODEL_PATH,
    DEFAULT_REVISION, ENV_PREFIX,
};
pub use error::NowledgeError;
