//! Configuration loading for the model acquisition step.
//!
//! Settings are layered: defaults -> config file -> `NOWLEDGE_*` environment
//! variables -> CLI flags (applied by the caller). Everything is resolved once
//! at process start into a plain [`DownloadSettings`] value.

use config::{Config, Environment, File, Map};
use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::NowledgeError;

/// Model fetched when nothing else is configured.
pub const DEFAULT_MODEL_ID: &str = "TaylorAI/bge-micro-v2";

/// Target directory used when nothing else is configured.
pub const DEFAULT_MODEL_PATH: &str = "./models";

/// Repository revision (branch, tag or commit sha).
pub const DEFAULT_REVISION: &str = "main";

/// Upper bound on concurrent file transfers.
pub const DEFAULT_MAX_WORKERS: usize = 8;

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Prefix for environment overrides, e.g. `NOWLEDGE_MODEL_ID`.
pub const ENV_PREFIX: &str = "NOWLEDGE";

/// Settings for fetching a model snapshot into a local directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadSettings {
    /// Registry identifier, `<namespace>/<name>`
    #[serde(default = "default_model_id")]
    pub model_id: String,

    /// Directory that receives the model files
    #[serde(default = "default_model_path")]
    pub model_path: String,

    #[serde(default = "default_revision")]
    pub revision: String,

    /// Maximum number of files transferred at once
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Access token for gated or private repositories
    #[serde(default)]
    pub token: Option<String>,

    /// Overrides the hub cache location (defaults to the hf-hub cache)
    #[serde(default)]
    pub cache_dir: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_model_id() -> String {
    DEFAULT_MODEL_ID.to_string()
}

fn default_model_path() -> String {
    DEFAULT_MODEL_PATH.to_string()
}

fn default_revision() -> String {
    DEFAULT_REVISION.to_string()
}

fn default_max_workers() -> usize {
    DEFAULT_MAX_WORKERS
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            model_id: default_model_id(),
            model_path: default_model_path(),
            revision: default_revision(),
            max_workers: default_max_workers(),
            token: None,
            cache_dir: None,
            log_level: default_log_level(),
        }
    }
}

impl DownloadSettings {
    /// Load settings from defaults, config files and the process environment.
    ///
    /// CLI flags should be applied by the caller after this returns, followed
    /// by [`DownloadSettings::validate`].
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, NowledgeError> {
        Self::load_with_env(cli_config_path, None)
    }

    /// Same as [`DownloadSettings::load`], but reads environment overrides from
    /// `env` instead of the process environment when it is `Some`.
    pub fn load_with_env(
        cli_config_path: Option<&str>,
        env: Option<Map<String, String>>,
    ) -> Result<Self, NowledgeError> {
        let mut builder = Config::builder()
            .set_default("model_id", default_model_id())?
            .set_default("model_path", default_model_path())?
            .set_default("revision", default_revision())?
            .set_default("max_workers", default_max_workers() as i64)?
            .set_default("log_level", default_log_level())?;

        if let Some(default_config) = default_config_file() {
            builder = builder
                .add_source(File::with_name(&default_config.to_string_lossy()).required(false));
        }

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // NOWLEDGE_MODEL_ID, NOWLEDGE_MODEL_PATH, NOWLEDGE_MAX_WORKERS, ...
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .source(env),
        );

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Reject values that would make the acquisition meaningless.
    pub fn validate(&self) -> Result<(), NowledgeError> {
        if self.model_id.trim().is_empty() {
            return Err(NowledgeError::InvalidSetting {
                key: "model_id",
                reason: "must not be empty".to_string(),
            });
        }
        if self.model_path.trim().is_empty() {
            return Err(NowledgeError::InvalidSetting {
                key: "model_path",
                reason: "must not be empty".to_string(),
            });
        }
        if self.revision.trim().is_empty() {
            return Err(NowledgeError::InvalidSetting {
                key: "revision",
                reason: "must not be empty".to_string(),
            });
        }
        if self.max_workers == 0 {
            return Err(NowledgeError::InvalidSetting {
                key: "max_workers",
                reason: "must be > 0".to_string(),
            });
        }
        Ok(())
    }

    /// Target directory with a leading `~/` expanded.
    pub fn target_dir(&self) -> PathBuf {
        expand_home(&self.model_path)
    }

    /// Hub cache directory with a leading `~/` expanded, if overridden.
    pub fn cache_path(&self) -> Option<PathBuf> {
        self.cache_dir.as_deref().map(expand_home)
    }
}

/// `<config dir>/nowledge/config` (extension resolved by the `config` crate).
fn default_config_file() -> Option<PathBuf> {
    ProjectDirs::from("", "", "nowledge").map(|p| p.config_dir().join("config"))
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(base) = BaseDirs::new() {
            return base.home_dir().join(rest);
        }
    }
    PathBuf::from(path)
}
