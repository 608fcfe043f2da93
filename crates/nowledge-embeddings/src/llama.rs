//! llama.cpp-based embedding provider for GGUF models.

use std::num::NonZeroU32;
use std::path::Path;

use llama_cpp_2::context::params::LlamaContextParams;
use llama_cpp_2::llama_backend::LlamaBackend;
use llama_cpp_2::llama_batch::LlamaBatch;
use llama_cpp_2::model::params::LlamaModelParams;
use llama_cpp_2::model::{AddBos, LlamaModel};
use tracing::{debug, info};

use crate::error::EmbeddingError;
use crate::model::{Backend, EmbedOptions, Embedding, EmbeddingModel, ModelInfo};

/// GGUF embedder. A fresh embeddings-only context is created per request.
pub struct LlamaCppEmbedder {
    backend: LlamaBackend,
    model: LlamaModel,
    context_window: u32,
    info: ModelInfo,
}

impl LlamaCppEmbedder {
    pub fn load(model_path: &Path, options: &EmbedOptions) -> Result<Self, EmbeddingError> {
        info!(path = %model_path.display(), "Loading GGUF model...");

        let backend = LlamaBackend::init()
            .map_err(|e| EmbeddingError::Llama(format!("failed to initialize backend: {}", e)))?;

        // CPU only
        let model_params = LlamaModelParams::default();
        let model = LlamaModel::load_from_file(&backend, model_path, &model_params)
            .map_err(|e| EmbeddingError::Llama(format!("failed to load model: {}", e)))?;

        let dimension = model.n_embd() as usize;
        let name = model_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| model_path.display().to_string());

        info!(model = %name, dim = dimension, n_ctx = options.context_window, "Model loaded successfully");

        Ok(Self {
            backend,
            model,
            context_window: options.context_window,
            info: ModelInfo {
                name,
                dimension,
                backend: Backend::LlamaCpp,
            },
        })
    }
}

/// Embeddings-only context sized to hold one truncated input.
fn context_params(window: u32) -> LlamaContextParams {
    LlamaContextParams::default()
        .with_n_ctx(NonZeroU32::new(window))
        .with_n_batch(window)
        // Non-causal models decode the whole sequence in one micro-batch
        .with_n_ubatch(window)
        .with_embeddings(true)
}

impl EmbeddingModel for LlamaCppEmbedder {
    fn info(&self) -> &ModelInfo {
        &self.info
    }

    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        let mut context = self
            .model
            .new_context(&self.backend, context_params(self.context_window))
            .map_err(|e| EmbeddingError::Llama(format!("failed to create context: {}", e)))?;

        let mut tokens = self
            .model
            .str_to_token(text, AddBos::Always)
            .map_err(|e| EmbeddingError::Llama(format!("tokenization failed: {}", e)))?;

        let window = self.context_window as usize;
        if tokens.len() > window {
            debug!(tokens = tokens.len(), window, "Truncating input to context window");
            tokens.truncate(window);
        }

        let mut batch = LlamaBatch::new(window, 1);
        batch
            .add_sequence(&tokens, 0, false)
            .map_err(|e| EmbeddingError::Llama(format!("failed to fill batch: {}", e)))?;

        context
            .decode(&mut batch)
            .map_err(|e| EmbeddingError::Llama(format!("decode failed: {}", e)))?;

        let values = context
            .embeddings_seq_ith(0)
            .map_err(|e| EmbeddingError::Llama(format!("failed to read embeddings: {}", e)))?
            .to_vec();

        // Returned as the engine computed it
        Ok(Embedding::new(values))
    }
}
