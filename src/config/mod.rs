//! Configuration system for qdrant-mcp.
//!
//! Values are layered: built-in defaults < TOML file < environment variables.
//! The result is validated once at startup and never reloaded.

mod env_parser;
mod loader;
mod overrides;
mod paths;
mod validation;

#[cfg(test)]
mod tests_utils;

use crate::backend::BackendKind;
use crate::embedding::{Device, ProviderKind, openai};
use crate::errors::Error;
use secrecy::SecretString;
use std::path::{Path, PathBuf};

pub use loader::{ConfigFile, default_config_path};
pub use validation::MAX_DEFAULT_LIMIT;

pub const DEFAULT_COLLECTION_NAME: &str = "mcp_memory";
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";
pub const DEFAULT_LIMIT: u64 = 10;

/// Fully resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Which embedding provider to run.
    pub embedding_provider: ProviderKind,

    /// Model identifier for the provider (HuggingFace id for `local`).
    pub embedding_model: String,

    /// Explicit vector size; overrides the built-in model table.
    pub embedding_dimensions: Option<u64>,

    pub openai_api_key: Option<SecretString>,

    pub openai_base_url: String,

    /// Device for local inference.
    pub device: Device,

    /// Directory for caching downloaded models.
    pub model_cache: PathBuf,

    /// Vector database to use.
    pub backend: BackendKind,

    /// Qdrant gRPC endpoint.
    pub qdrant_url: String,

    pub qdrant_api_key: Option<SecretString>,

    /// SQLite file for the `sqlite` backend.
    pub database_path: PathBuf,

    /// Collection used when a request names none.
    pub default_collection_name: String,

    /// Result count when `find` is called without a limit.
    pub default_limit: u64,

    /// Minimum similarity for `find`; `<= 0` disables the cutoff.
    pub score_threshold: f64,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = paths::data_dir();
        let provider = ProviderKind::default();

        Self {
            embedding_provider: provider,
            embedding_model: provider.default_model().to_string(),
            embedding_dimensions: None,
            openai_api_key: None,
            openai_base_url: openai::DEFAULT_BASE_URL.to_string(),
            device: Device::default(),
            model_cache: data_dir.join("models"),
            backend: BackendKind::default(),
            qdrant_url: DEFAULT_QDRANT_URL.to_string(),
            qdrant_api_key: None,
            database_path: data_dir.join("vectors.db"),
            default_collection_name: DEFAULT_COLLECTION_NAME.to_string(),
            default_limit: DEFAULT_LIMIT,
            score_threshold: 0.0,
        }
    }
}

impl Config {
    /// Load configuration with defaults, file values, and environment overrides.
    ///
    /// `config_path` replaces the default file location; it must exist when given.
    pub fn load(config_path: Option<&Path>) -> Result<Self, Error> {
        let file = loader::load_from_file(config_path)?.unwrap_or_default();
        let env = overrides::env_layer()?;
        Self::from_layer(file.merge(env))
    }

    /// Resolve a merged layer over the defaults and validate the result.
    pub fn from_layer(layer: ConfigFile) -> Result<Self, Error> {
        let mut config = Config::default();

        if let Some(provider) = layer.embedding_provider {
            config.embedding_provider = provider;
        }
        // The default model follows the provider unless one is named.
        config.embedding_model = layer
            .embedding_model
            .unwrap_or_else(|| config.embedding_provider.default_model().to_string());
        config.embedding_dimensions = layer.embedding_dimensions;
        config.openai_api_key = layer.openai_api_key.map(SecretString::new);
        if let Some(url) = layer.openai_base_url {
            config.openai_base_url = url;
        }
        if let Some(device) = layer.device {
            config.device = device;
        }
        if let Some(mut cache) = layer.model_cache {
            paths::expand_tilde(&mut cache);
            config.model_cache = cache;
        }
        if let Some(backend) = layer.backend {
            config.backend = backend;
        }
        if let Some(url) = layer.qdrant_url {
            config.qdrant_url = url;
        }
        config.qdrant_api_key = layer.qdrant_api_key.map(SecretString::new);
        if let Some(mut path) = layer.database_path {
            paths::expand_tilde(&mut path);
            config.database_path = path;
        }
        if let Some(name) = layer.default_collection_name {
            config.default_collection_name = name;
        }
        if let Some(limit) = layer.default_limit {
            config.default_limit = limit;
        }
        if let Some(threshold) = layer.score_threshold {
            config.score_threshold = threshold;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), Error> {
        validation::ConfigValidator::new(self).validate()
    }

    /// The score cutoff to apply by default, or `None` when disabled.
    pub fn default_score_threshold(&self) -> Option<f32> {
        (self.score_threshold > 0.0).then_some(self.score_threshold as f32)
    }

    /// Ensure parent directories for database and cache paths exist.
    pub fn ensure_directories(&self) -> Result<(), Error> {
        if self.backend == BackendKind::Sqlite {
            if let Some(parent) = self.database_path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        Error::Config(format!(
                            "Failed to create database directory {}: {e}",
                            parent.display()
                        ))
                    })?;
                }
            }
        }

        if self.embedding_provider == ProviderKind::Local && !self.model_cache.as_os_str().is_empty()
        {
            std::fs::create_dir_all(&self.model_cache).map_err(|e| {
                Error::Config(format!(
                    "Failed to create model cache directory {}: {e}",
                    self.model_cache.display()
                ))
            })?;
        }

        Ok(())
    }
}
