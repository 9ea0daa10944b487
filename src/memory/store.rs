//! Core memory store struct combining embedding generation and persistence.

use std::future::Future;
use std::sync::Arc;

use tracing::{info, warn};

use crate::backend::{BackendError, BackendKind, QdrantBackend, SqliteBackend, VectorBackend};
use crate::config::Config;
use crate::embedding::{self, EmbeddingProvider, ProviderError};
use crate::errors::Error;
use crate::registry::CollectionRegistry;

/// Maximum allowed input length (100,000 characters).
pub const MAX_INPUT_LENGTH: usize = 100_000;
/// Maximum allowed limit for search operations.
pub const MAX_SEARCH_LIMIT: u64 = 10_000;

/// Defaults applied when a request leaves a parameter out.
#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub default_collection: String,
    pub default_limit: u64,
    /// `None` disables the score cutoff.
    pub default_score_threshold: Option<f32>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            default_collection: crate::config::DEFAULT_COLLECTION_NAME.to_string(),
            default_limit: crate::config::DEFAULT_LIMIT,
            default_score_threshold: None,
        }
    }
}

impl From<&Config> for StoreSettings {
    fn from(config: &Config) -> Self {
        Self {
            default_collection: config.default_collection_name.clone(),
            default_limit: config.default_limit,
            default_score_threshold: config.default_score_threshold(),
        }
    }
}

/// Semantic memory over dynamically named collections.
///
/// Every operation resolves its target collection (explicit or default),
/// ensures it exists through the [`CollectionRegistry`], and reports the
/// collection it acted on. Safe to share across concurrent requests.
pub struct MemoryStore {
    pub(crate) backend: Arc<dyn VectorBackend>,
    pub(crate) embedder: Arc<dyn EmbeddingProvider>,
    pub(crate) registry: CollectionRegistry,
    pub(crate) settings: StoreSettings,
}

impl MemoryStore {
    /// Assemble a store from an already built backend and provider.
    pub fn new(
        backend: Arc<dyn VectorBackend>,
        embedder: Arc<dyn EmbeddingProvider>,
        settings: StoreSettings,
    ) -> Self {
        let registry = CollectionRegistry::new(Arc::clone(&backend), embedder.dimensions());
        Self {
            backend,
            embedder,
            registry,
            settings,
        }
    }

    /// Build the configured backend and embedding provider.
    ///
    /// # Errors
    ///
    /// Returns error if directories cannot be created, the SQLite database
    /// cannot be opened, or the provider configuration is incomplete.
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        config.ensure_directories()?;

        let backend: Arc<dyn VectorBackend> = match config.backend {
            BackendKind::Qdrant => Arc::new(QdrantBackend::connect(
                &config.qdrant_url,
                config.qdrant_api_key.as_ref(),
            )?),
            BackendKind::Sqlite => Arc::new(SqliteBackend::open(&config.database_path)?),
        };
        let embedder = embedding::create_provider(config)?;

        info!(
            backend = backend.name(),
            location = %backend_location(config),
            default_collection = %config.default_collection_name,
            provider = embedder.provider_name(),
            model = embedder.model_name(),
            dimensions = embedder.dimensions(),
            "Memory store ready"
        );

        Ok(Self::new(backend, embedder, StoreSettings::from(config)))
    }

    pub fn default_collection(&self) -> &str {
        &self.settings.default_collection
    }

    pub fn embedder(&self) -> &dyn EmbeddingProvider {
        self.embedder.as_ref()
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Explicit collection name, or the default when absent or blank.
    pub fn resolve_target(&self, collection: Option<&str>) -> String {
        match collection.map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self.settings.default_collection.clone(),
        }
    }

    /// Validate input length (rejects empty and whitespace-only inputs).
    pub(crate) fn validate_input_length(text: &str) -> Result<(), Error> {
        if text.trim().is_empty() {
            return Err(Error::EmptyInput);
        }
        if text.len() > MAX_INPUT_LENGTH {
            return Err(Error::InputTooLong {
                max_length: MAX_INPUT_LENGTH,
                actual_length: text.len(),
            });
        }
        Ok(())
    }

    /// Embed text and check the provider honoured its dimensionality.
    pub(crate) async fn embed(&self, text: &str) -> Result<Vec<f32>, Error> {
        let vector = self.embedder.embed(text).await?;
        let expected = self.embedder.dimensions();
        if vector.len() as u64 != expected {
            return Err(ProviderError::Inference(format!(
                "provider returned {} dimensions, expected {expected}",
                vector.len()
            ))
            .into());
        }
        Ok(vector)
    }

    /// Ensure `collection`, run `op` against it, and retry once if the
    /// backend reports the collection missing (stale registry entry).
    pub(crate) async fn with_collection<T, F, Fut>(&self, collection: &str, op: F) -> Result<T, Error>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        self.registry.ensure(collection).await?;
        match op().await {
            Err(BackendError::CollectionNotFound(_)) => {
                warn!(collection = %collection, "Collection vanished from backend; recreating");
                self.registry.invalidate(collection).await;
                self.registry.ensure(collection).await?;
                Ok(op().await?)
            }
            other => Ok(other?),
        }
    }
}

/// Validate a caller-supplied search limit.
pub(crate) fn validate_limit(limit: u64) -> Result<(), Error> {
    if limit == 0 {
        return Err(Error::InvalidLimit("limit must be at least 1".to_string()));
    }
    if limit > MAX_SEARCH_LIMIT {
        return Err(Error::InvalidLimit(format!(
            "limit {limit} exceeds maximum of {MAX_SEARCH_LIMIT}"
        )));
    }
    Ok(())
}

fn backend_location(config: &Config) -> String {
    match config.backend {
        BackendKind::Qdrant => config.qdrant_url.clone(),
        BackendKind::Sqlite => config.database_path.display().to_string(),
    }
}
