//! Candle-based embedding implementation.
//!
//! Loads BERT-family sentence-transformer checkpoints (for example
//! bge-micro-v2) from a model directory.

use std::path::{Path, PathBuf};

use candle_core::{DType, Device, IndexOp, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use serde::Deserialize;
use tokenizers::{Tokenizer, TruncationParams};
use tracing::{debug, info};

use crate::error::EmbeddingError;
use crate::model::{Backend, EmbedOptions, Embedding, EmbeddingModel, ModelInfo};

const CONFIG_FILE: &str = "config.json";
const TOKENIZER_FILE: &str = "tokenizer.json";
const SAFETENSORS_FILE: &str = "model.safetensors";
const PYTORCH_FILE: &str = "pytorch_model.bin";

/// sentence-transformers pooling module config, relative to the model dir
const POOLING_CONFIG: &str = "1_Pooling/config.json";

/// sentence-transformers module pipeline
const MODULES_FILE: &str = "modules.json";

/// How token embeddings are reduced to one vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pooling {
    /// Average over real (non-padding) tokens
    Mean,
    /// First token ([CLS]) hidden state
    Cls,
}

#[derive(Debug, Default, Deserialize)]
struct PoolingConfig {
    #[serde(default)]
    pooling_mode_cls_token: bool,
    #[serde(default)]
    pooling_mode_mean_tokens: bool,
}

impl Pooling {
    /// Read the pooling mode from `1_Pooling/config.json`, defaulting to mean.
    pub fn from_model_dir(dir: &Path) -> Result<Self, EmbeddingError> {
        let path = dir.join(POOLING_CONFIG);
        if !path.exists() {
            return Ok(Pooling::Mean);
        }
        let raw = std::fs::read_to_string(&path)?;
        let config: PoolingConfig = serde_json::from_str(&raw)
            .map_err(|e| EmbeddingError::InvalidConfig(format!("{}: {}", path.display(), e)))?;

        if config.pooling_mode_cls_token && !config.pooling_mode_mean_tokens {
            Ok(Pooling::Cls)
        } else {
            Ok(Pooling::Mean)
        }
    }
}

#[derive(Debug, Deserialize)]
struct ModuleEntry {
    #[serde(rename = "type")]
    kind: String,
}

/// Whether the sentence-transformers pipeline ends in a `Normalize` module.
/// Models without `modules.json` emit the pooled vector as is.
pub fn normalizes_output(dir: &Path) -> Result<bool, EmbeddingError> {
    let path = dir.join(MODULES_FILE);
    if !path.exists() {
        return Ok(false);
    }
    let raw = std::fs::read_to_string(&path)?;
    let modules: Vec<ModuleEntry> = serde_json::from_str(&raw)
        .map_err(|e| EmbeddingError::InvalidConfig(format!("{}: {}", path.display(), e)))?;

    // e.g. "sentence_transformers.models.Normalize"
    Ok(modules
        .iter()
        .any(|module| module.kind.rsplit('.').next() == Some("Normalize")))
}

/// Fields of `config.json` the embedder needs beyond what `BertModel` consumes.
#[derive(Debug, Deserialize)]
struct BertDims {
    hidden_size: usize,
    #[serde(default = "default_max_positions")]
    max_position_embeddings: usize,
}

fn default_max_positions() -> usize {
    512
}

/// Candle-based BERT embedder.
pub struct CandleEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    pooling: Pooling,
    normalize: bool,
    info: ModelInfo,
}

impl CandleEmbedder {
    /// Load from a directory holding config.json, tokenizer.json and weights.
    pub fn load(model_dir: &Path, options: &EmbedOptions) -> Result<Self, EmbeddingError> {
        info!(path = %model_dir.display(), "Loading embedding model...");

        // CPU only
        let device = Device::Cpu;

        let config_path = model_dir.join(CONFIG_FILE);
        let config_str = std::fs::read_to_string(&config_path).map_err(|e| {
            EmbeddingError::ModelNotFound(format!("{}: {}", config_path.display(), e))
        })?;
        let config: BertConfig = serde_json::from_str(&config_str)
            .map_err(|e| EmbeddingError::InvalidConfig(format!("{}: {}", config_path.display(), e)))?;
        let dims: BertDims = serde_json::from_str(&config_str)
            .map_err(|e| EmbeddingError::InvalidConfig(format!("{}: {}", config_path.display(), e)))?;

        let context_window = (options.context_window as usize).min(dims.max_position_embeddings);

        let tokenizer = load_tokenizer(&model_dir.join(TOKENIZER_FILE), context_window)?;
        let pooling = Pooling::from_model_dir(model_dir)?;
        let normalize = normalizes_output(model_dir)?;

        let vb = match weights_path(model_dir)? {
            Weights::Safetensors(path) => unsafe {
                VarBuilder::from_mmaped_safetensors(&[path], DType::F32, &device)?
            },
            Weights::Pytorch(path) => VarBuilder::from_pth(path, DType::F32, &device)?,
        };

        let model = BertModel::load(vb, &config)?;

        let name = model_dir
            .canonicalize()
            .ok()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
            .unwrap_or_else(|| model_dir.display().to_string());

        info!(
            model = %name,
            dim = dims.hidden_size,
            max_seq = context_window,
            pooling = ?pooling,
            normalize,
            "Model loaded successfully"
        );

        Ok(Self {
            model,
            tokenizer,
            device,
            pooling,
            normalize,
            info: ModelInfo {
                name,
                dimension: dims.hidden_size,
                backend: Backend::Candle,
            },
        })
    }
}

enum Weights {
    Safetensors(PathBuf),
    Pytorch(PathBuf),
}

fn weights_path(model_dir: &Path) -> Result<Weights, EmbeddingError> {
    let safetensors = model_dir.join(SAFETENSORS_FILE);
    if safetensors.is_file() {
        return Ok(Weights::Safetensors(safetensors));
    }
    let pytorch = model_dir.join(PYTORCH_FILE);
    if pytorch.is_file() {
        return Ok(Weights::Pytorch(pytorch));
    }
    Err(EmbeddingError::ModelNotFound(format!(
        "no {} or {} in {}",
        SAFETENSORS_FILE,
        PYTORCH_FILE,
        model_dir.display()
    )))
}

/// Load the tokenizer, truncating to `max_len` tokens and without padding.
fn load_tokenizer(path: &Path, max_len: usize) -> Result<Tokenizer, EmbeddingError> {
    let mut tokenizer = Tokenizer::from_file(path)
        .map_err(|e| EmbeddingError::Tokenizer(format!("{}: {}", path.display(), e)))?;
    tokenizer.with_padding(None);
    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length: max_len,
            ..Default::default()
        }))
        .map_err(|e| EmbeddingError::Tokenizer(e.to_string()))?;
    Ok(tokenizer)
}

/// Mean pooling over token embeddings (excluding padding)
fn mean_pooling(embeddings: &Tensor, attention_mask: &Tensor) -> Result<Tensor, EmbeddingError> {
    // Expand attention mask to embedding dimension
    let mask = attention_mask
        .unsqueeze(2)?
        .broadcast_as(embeddings.shape())?;
    let mask_f32 = mask.to_dtype(DType::F32)?;

    let masked = embeddings.broadcast_mul(&mask_f32)?;
    let sum = masked.sum(1)?;

    let mask_sum = mask_f32.sum(1)?;
    let mask_sum = mask_sum.clamp(1e-9, f64::MAX)?;

    Ok(sum.broadcast_div(&mask_sum)?)
}

impl EmbeddingModel for CandleEmbedder {
    fn info(&self) -> &ModelInfo {
        &self.info
    }

    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| EmbeddingError::Tokenizer(e.to_string()))?;

        debug!(tokens = encoding.get_ids().len(), "Encoded input");

        let input_ids = Tensor::new(encoding.get_ids(), &self.device)?.unsqueeze(0)?;
        let attention_mask = Tensor::new(encoding.get_attention_mask(), &self.device)?.unsqueeze(0)?;
        let token_type_ids = input_ids.zeros_like()?;

        let output = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))?;

        let pooled = match self.pooling {
            Pooling::Mean => mean_pooling(&output, &attention_mask)?,
            Pooling::Cls => output.i((.., 0))?,
        };

        let values: Vec<f32> = pooled.squeeze(0)?.to_vec1()?;
        let embedding = Embedding::new(values);
        if self.normalize {
            Ok(embedding.normalized())
        } else {
            Ok(embedding)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_pooling(dir: &Path, body: &str) {
        std::fs::create_dir_all(dir.join("1_Pooling")).unwrap();
        std::fs::write(dir.join(POOLING_CONFIG), body).unwrap();
    }

    #[test]
    fn test_pooling_defaults_to_mean() {
        let temp = TempDir::new().unwrap();
        assert_eq!(Pooling::from_model_dir(temp.path()).unwrap(), Pooling::Mean);
    }

    #[test]
    fn test_pooling_cls_from_config() {
        let temp = TempDir::new().unwrap();
        write_pooling(
            temp.path(),
            r#"{"word_embedding_dimension": 384, "pooling_mode_cls_token": true, "pooling_mode_mean_tokens": false}"#,
        );
        assert_eq!(Pooling::from_model_dir(temp.path()).unwrap(), Pooling::Cls);
    }

    #[test]
    fn test_pooling_mean_from_config() {
        let temp = TempDir::new().unwrap();
        write_pooling(
            temp.path(),
            r#"{"pooling_mode_cls_token": false, "pooling_mode_mean_tokens": true}"#,
        );
        assert_eq!(Pooling::from_model_dir(temp.path()).unwrap(), Pooling::Mean);
    }

    #[test]
    fn test_pooling_malformed_config() {
        let temp = TempDir::new().unwrap();
        write_pooling(temp.path(), "not json");
        assert!(matches!(
            Pooling::from_model_dir(temp.path()),
            Err(EmbeddingError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_normalize_module_listed() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(MODULES_FILE),
            r#"[
                {"idx": 0, "name": "0", "path": "", "type": "sentence_transformers.models.Transformer"},
                {"idx": 1, "name": "1", "path": "1_Pooling", "type": "sentence_transformers.models.Pooling"},
                {"idx": 2, "name": "2", "path": "2_Normalize", "type": "sentence_transformers.models.Normalize"}
            ]"#,
        )
        .unwrap();
        assert!(normalizes_output(temp.path()).unwrap());
    }

    #[test]
    fn test_no_normalize_module() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(MODULES_FILE),
            r#"[
                {"idx": 0, "name": "0", "path": "", "type": "sentence_transformers.models.Transformer"},
                {"idx": 1, "name": "1", "path": "1_Pooling", "type": "sentence_transformers.models.Pooling"}
            ]"#,
        )
        .unwrap();
        assert!(!normalizes_output(temp.path()).unwrap());
    }

    #[test]
    fn test_no_modules_file_keeps_raw_output() {
        let temp = TempDir::new().unwrap();
        assert!(!normalizes_output(temp.path()).unwrap());
    }

    #[test]
    fn test_malformed_modules_file() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(MODULES_FILE), b"{}").unwrap();
        assert!(matches!(
            normalizes_output(temp.path()),
            Err(EmbeddingError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_mean_pooling_ignores_padding() {
        let device = Device::Cpu;
        // [batch=1, seq=3, hidden=2]; last token is padding
        let embeddings = Tensor::new(
            &[[[1.0f32, 2.0], [3.0, 4.0], [100.0, 100.0]]],
            &device,
        )
        .unwrap();
        let mask = Tensor::new(&[[1u32, 1, 0]], &device).unwrap();

        let pooled = mean_pooling(&embeddings, &mask).unwrap();
        let values: Vec<Vec<f32>> = pooled.to_vec2().unwrap();
        assert_eq!(values, vec![vec![2.0, 3.0]]);
    }

    #[test]
    fn test_weights_missing() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            weights_path(temp.path()),
            Err(EmbeddingError::ModelNotFound(_))
        ));
    }

    #[test]
    fn test_weights_prefers_safetensors() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(PYTORCH_FILE), b"pt").unwrap();
        std::fs::write(temp.path().join(SAFETENSORS_FILE), b"st").unwrap();
        assert!(matches!(
            weights_path(temp.path()).unwrap(),
            Weights::Safetensors(_)
        ));
    }

    #[test]
    fn test_load_without_config_is_not_found() {
        let temp = TempDir::new().unwrap();
        let result = CandleEmbedder::load(temp.path(), &EmbedOptions::default());
        assert!(matches!(result, Err(EmbeddingError::ModelNotFound(_))));
    }
}
