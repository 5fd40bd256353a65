//! Application configuration.
//!
//! Process-level settings (where the encrypted store lives, embedding client
//! behavior, folder walking limits, log level) are read from a TOML file.
//! Retrieval and chunking parameters are *not* here: they are persisted
//! inside the store itself as [`RagConfig`](crate::models::RagConfig) so the
//! user can change them at runtime.
//!
//! ```toml
//! [store]
//! path = "./data/rag-store.enc"
//! key_path = "./data/rag-store.key"
//!
//! [embedding]
//! timeout_secs = 60
//! max_retries = 2
//!
//! [loader]
//! max_files = 2000
//! exclude_globs = ["**/node_modules/**"]
//!
//! [log]
//! level = "info"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub loader: LoaderConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    #[serde(default = "default_key_path")]
    pub key_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            key_path: default_key_path(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("./data/rag-store.enc")
}
fn default_key_path() -> PathBuf {
    PathBuf::from("./data/rag-store.key")
}

/// HTTP client settings for the embedding service.
///
/// The service URL and model name are part of the persisted retrieval
/// config, not of this file.
#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    60
}
fn default_max_retries() -> u32 {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoaderConfig {
    #[serde(default = "default_max_files")]
    pub max_files: usize,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_files: default_max_files(),
            exclude_globs: Vec::new(),
        }
    }
}

fn default_max_files() -> usize {
    2000
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: AppConfig =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

/// Load `path` if it exists, otherwise fall back to built-in defaults.
pub fn load_or_default(path: &Path) -> Result<AppConfig> {
    if path.exists() {
        load_config(path)
    } else {
        Ok(AppConfig::default())
    }
}

fn validate(config: &AppConfig) -> Result<()> {
    if config.store.path.as_os_str().is_empty() {
        anyhow::bail!("store.path must not be empty");
    }
    if config.store.key_path.as_os_str().is_empty() {
        anyhow::bail!("store.key_path must not be empty");
    }
    if config.store.path == config.store.key_path {
        anyhow::bail!("store.path and store.key_path must differ");
    }
    if config.loader.max_files == 0 {
        anyhow::bail!("loader.max_files must be > 0");
    }
    if config.embedding.timeout_secs == 0 {
        anyhow::bail!("embedding.timeout_secs must be > 0");
    }
    Ok(())
}
