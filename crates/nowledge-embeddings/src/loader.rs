//! Resolve a model path to the backend that can load it.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::candle::CandleEmbedder;
use crate::error::EmbeddingError;
use crate::model::{EmbedOptions, EmbeddingModel};

/// Where a model's weights live and which engine reads them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    /// Directory with config.json, tokenizer.json and BERT weights
    Bert { dir: PathBuf },
    /// Single GGUF file
    Gguf { file: PathBuf },
}

impl ModelSource {
    /// Inspect `path` and decide how to load it. Nothing is read beyond
    /// directory listings and file extensions.
    pub fn resolve(path: &Path) -> Result<Self, EmbeddingError> {
        if !path.exists() {
            return Err(EmbeddingError::ModelNotFound(path.display().to_string()));
        }

        if path.is_file() {
            return match extension(path).as_deref() {
                Some("gguf") => Ok(ModelSource::Gguf {
                    file: path.to_path_buf(),
                }),
                Some("safetensors") | Some("bin") => {
                    let dir = match path.parent() {
                        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                        _ => PathBuf::from("."),
                    };
                    Ok(ModelSource::Bert { dir })
                }
                _ => Err(EmbeddingError::UnsupportedModel(format!(
                    "{}: expected a .gguf, .safetensors or .bin file",
                    path.display()
                ))),
            };
        }

        if path.join("config.json").is_file() {
            return Ok(ModelSource::Bert {
                dir: path.to_path_buf(),
            });
        }

        let mut ggufs = Vec::new();
        for entry in std::fs::read_dir(path)? {
            let entry_path = entry?.path();
            if entry_path.is_file() && extension(&entry_path).as_deref() == Some("gguf") {
                ggufs.push(entry_path);
            }
        }

        match ggufs.len() {
            0 => Err(EmbeddingError::ModelNotFound(format!(
                "{}: no config.json or .gguf file",
                path.display()
            ))),
            1 => Ok(ModelSource::Gguf {
                file: ggufs.remove(0),
            }),
            n => Err(EmbeddingError::UnsupportedModel(format!(
                "{}: {} .gguf files found, pass one explicitly",
                path.display(),
                n
            ))),
        }
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
}

/// Load whatever model lives at `path`.
pub fn load_model(
    path: &Path,
    options: &EmbedOptions,
) -> Result<Box<dyn EmbeddingModel>, EmbeddingError> {
    let source = ModelSource::resolve(path)?;
    debug!(?source, "Resolved model source");

    match source {
        ModelSource::Bert { dir } => Ok(Box::new(CandleEmbedder::load(&dir, options)?)),
        ModelSource::Gguf { file } => load_gguf(&file, options),
    }
}

#[cfg(feature = "llama-cpp")]
fn load_gguf(
    file: &Path,
    options: &EmbedOptions,
) -> Result<Box<dyn EmbeddingModel>, EmbeddingError> {
    Ok(Box::new(crate::llama::LlamaCppEmbedder::load(file, options)?))
}

#[cfg(not(feature = "llama-cpp"))]
fn load_gguf(
    file: &Path,
    _options: &EmbedOptions,
) -> Result<Box<dyn EmbeddingModel>, EmbeddingError> {
    Err(EmbeddingError::UnsupportedModel(format!(
        "{}: built without llama.cpp support (enable the `llama-cpp` feature)",
        file.display()
    )))
}
