//! Embedding model trait and types.
//!
//! Defines the interface for generating vector embeddings from text.

use std::fmt;

use serde::Serialize;

use crate::error::EmbeddingError;

/// Context window requested from the inference engine, in tokens.
pub const DEFAULT_CONTEXT_WINDOW: u32 = 512;

/// Vector embedding as produced by the engine.
///
/// Serializes as a bare JSON array of numbers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    /// Scale to unit length. A zero vector is returned unchanged.
    pub fn normalized(self) -> Self {
        let norm: f32 = self.values.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            Self::new(self.values.iter().map(|x| x / norm).collect())
        } else {
            self
        }
    }

    /// Single-line JSON array, the wire format of the embed command.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Inference engine behind a loaded model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// BERT-family safetensors/PyTorch weights through candle
    Candle,
    /// GGUF weights through llama.cpp
    LlamaCpp,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Candle => f.write_str("candle"),
            Backend::LlamaCpp => f.write_str("llama.cpp"),
        }
    }
}

/// Model information
#[derive(Debug, Clone)]
pub struct ModelInfo {
    /// Model name, taken from the directory or file name
    pub name: String,
    /// Embedding dimension
    pub dimension: usize,
    pub backend: Backend,
}

/// Options applied when a model is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbedOptions {
    /// Maximum tokens per embedding
    pub context_window: u32,
}

impl Default for EmbedOptions {
    fn default() -> Self {
        Self {
            context_window: DEFAULT_CONTEXT_WINDOW,
        }
    }
}

impl EmbedOptions {
    pub fn with_context_window(context_window: u32) -> Result<Self, EmbeddingError> {
        if context_window == 0 {
            return Err(EmbeddingError::InvalidInput(
                "context window must be > 0".to_string(),
            ));
        }
        Ok(Self { context_window })
    }
}

/// Trait for embedding models.
pub trait EmbeddingModel {
    /// Get model information
    fn info(&self) -> &ModelInfo;

    /// Generate embedding for a single text.
    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_keeps_engine_values() {
        let emb = Embedding::new(vec![3.0, 4.0]);
        assert_eq!(emb.values, vec![3.0, 4.0]);
    }

    #[test]
    fn test_normalized() {
        let emb = Embedding::new(vec![3.0, 4.0]).normalized();
        // 3-4-5 triangle: normalized should be [0.6, 0.8]
        assert!((emb.values[0] - 0.6).abs() < 0.001);
        assert!((emb.values[1] - 0.8).abs() < 0.001);
    }

    #[test]
    fn test_zero_vector_left_alone() {
        let emb = Embedding::new(vec![0.0, 0.0, 0.0]).normalized();
        assert_eq!(emb.values, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_json_is_bare_array() {
        let emb = Embedding::new(vec![0.0, 2.5]);
        let json = emb.to_json().unwrap();
        assert_eq!(json, "[0.0,2.5]");
        assert!(!json.contains('\n'));
    }

    #[test]
    fn test_json_parses_back_to_numbers() {
        let emb = Embedding::new(vec![1.0, -2.0, 0.125]);
        let parsed: Vec<f64> = serde_json::from_str(&emb.to_json().unwrap()).unwrap();
        assert_eq!(parsed, vec![1.0, -2.0, 0.125]);
    }

    #[test]
    fn test_embed_options_default_window() {
        assert_eq!(EmbedOptions::default().context_window, 512);
        assert!(EmbedOptions::with_context_window(0).is_err());
        assert_eq!(
            EmbedOptions::with_context_window(128).unwrap().context_window,
            128
        );
    }

    #[test]
    fn test_backend_display() {
        assert_eq!(Backend::Candle.to_string(), "candle");
        assert_eq!(Backend::LlamaCpp.to_string(), "llama.cpp");
    }
}
