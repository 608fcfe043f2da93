//! # nowledge-embeddings
//!
//! Model acquisition and local embedding generation for nowledge.
//!
//! ## Features
//! - Snapshot download from HuggingFace Hub into a plain local directory
//!   (real files, resumable, bounded concurrency)
//! - BERT-family embeddings via Candle (no Python, no API)
//! - GGUF embeddings via llama.cpp behind the `llama-cpp` feature
//! - One vector per request, serialized as a bare JSON array

pub mod acquire;
pub mod candle;
pub mod error;
#[cfg(feature = "llama-cpp")]
pub mod llama;
pub mod loader;
pub mod model;

pub use crate::candle::{CandleEmbedder, Pooling};
pub use acquire::{
    acquire_snapshot, plan_snapshot, DownloadRecord, LocalFile, RemoteFile, SnapshotPlan,
    SnapshotReport,
};
pub use error::{AcquireError, EmbeddingError};
#[cfg(feature = "llama-cpp")]
pub use llama::LlamaCppEmbedder;
pub use loader::{load_model, ModelSource};
pub use model::{Backend, EmbedOptions, Embedding, EmbeddingModel, ModelInfo, DEFAULT_CONTEXT_WINDOW};
