//! Text-to-vector embedding providers.
//!
//! Exactly one provider is active per process, chosen at startup by
//! [`create_provider`] from the configured [`ProviderKind`] and model name.

pub mod local;
pub mod openai;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::config::Config;
use crate::errors::Error;

pub use self::local::{Device, LocalEmbeddingProvider};
pub use self::openai::OpenAiEmbeddingProvider;

/// Errors raised while turning text into a vector.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("embedding API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("input exceeds the model's length limit: {0}")]
    InputTooLong(String),

    #[error("tokenization failed: {0}")]
    Tokenization(String),

    #[error("ONNX runtime error: {0}")]
    Onnx(#[from] ort::Error),

    #[error("model download failed: {0}")]
    HfHub(#[from] hf_hub::api::sync::ApiError),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("embedding provider unavailable: {0}")]
    Unavailable(String),
}

impl From<ort::Error<ort::session::builder::SessionBuilder>> for ProviderError {
    fn from(err: ort::Error<ort::session::builder::SessionBuilder>) -> Self {
        ProviderError::Onnx(err.into())
    }
}

impl From<tokenizers::Error> for ProviderError {
    fn from(err: tokenizers::Error) -> Self {
        ProviderError::Tokenization(err.to_string())
    }
}

/// Converts text into fixed-length vectors.
///
/// Implementations must accept concurrent `embed` calls.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text. The result has exactly `dimensions()` elements.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;

    /// Output dimensionality, fixed once the provider is configured.
    fn dimensions(&self) -> u64;

    fn model_name(&self) -> &str;

    /// Short provider identifier recorded in every stored payload.
    fn provider_name(&self) -> &'static str;
}

/// Which embedding provider to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Local,
    #[serde(alias = "open_ai")]
    OpenAi,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Local => "local",
            ProviderKind::OpenAi => "openai",
        }
    }

    /// Model used when none is configured.
    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Local => local::DEFAULT_MODEL,
            ProviderKind::OpenAi => openai::DEFAULT_MODEL,
        }
    }

    /// Output size of a model this provider knows about.
    pub fn known_dimensions(&self, model: &str) -> Option<u64> {
        match self {
            ProviderKind::Local => local::known_dimensions(model),
            ProviderKind::OpenAi => openai::known_dimensions(model),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" | "sentence-transformers" => Ok(ProviderKind::Local),
            "openai" | "open_ai" => Ok(ProviderKind::OpenAi),
            other => Err(format!(
                "unknown embedding provider '{other}' (expected 'local' or 'openai')"
            )),
        }
    }
}

/// Resolve the vector size for a provider/model pair, preferring an explicit override.
pub fn resolve_dimensions(kind: ProviderKind, model: &str, explicit: Option<u64>) -> Option<u64> {
    explicit.or_else(|| kind.known_dimensions(model))
}

/// Build the configured provider.
///
/// The local model is not loaded here; it loads on first `embed`.
pub fn create_provider(config: &Config) -> Result<Arc<dyn EmbeddingProvider>, Error> {
    let model = config.embedding_model.as_str();
    let dimensions = resolve_dimensions(
        config.embedding_provider,
        model,
        config.embedding_dimensions,
    )
    .ok_or_else(|| {
        Error::Config(format!(
            "unknown embedding model '{model}': set embedding_dimensions (EMBEDDING_DIMENSIONS)"
        ))
    })?;

    match config.embedding_provider {
        ProviderKind::OpenAi => {
            let api_key = config.openai_api_key.clone().ok_or_else(|| {
                Error::Config("openai provider requires OPENAI_API_KEY".to_string())
            })?;
            let provider = OpenAiEmbeddingProvider::new(api_key)
                .with_base_url(&config.openai_base_url)
                .with_model(model, dimensions, config.embedding_dimensions.is_some());
            Ok(Arc::new(provider))
        }
        ProviderKind::Local => Ok(Arc::new(LocalEmbeddingProvider::new(
            model,
            dimensions,
            config.device,
            config.model_cache.clone(),
        ))),
    }
}
