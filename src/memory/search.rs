//! Similarity search for the memory store.

use tracing::debug;

use crate::backend::{MetadataFilter, SearchQuery};
use crate::errors::Error;
use crate::types::SearchResult;

use super::store::{MemoryStore, validate_limit};

/// Optional parameters of [`MemoryStore::find`].
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    /// Result cap; `None` or 0 uses the configured default.
    pub limit: Option<u64>,
    /// Metadata conditions that must all hold.
    pub filter: Option<MetadataFilter>,
    /// Minimum score; `None` or `<= 0` uses the configured default.
    pub score_threshold: Option<f32>,
    /// Target collection; the default when absent or blank.
    pub collection: Option<String>,
}

impl MemoryStore {
    #[must_use = "handle the error or results may be lost"]
    /// Search memories by semantic similarity.
    ///
    /// Generates an embedding for the query and returns the closest stored
    /// memories in the target collection, highest score first. Every result
    /// names the collection it came from. An empty collection yields an empty
    /// list.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Query is empty or exceeds 100,000 characters
    /// - Limit exceeds MAX_SEARCH_LIMIT
    /// - Score threshold is not a finite value in [-1, 1]
    /// - Embedding generation or the backend search fails
    pub async fn find(&self, query: &str, options: FindOptions) -> Result<Vec<SearchResult>, Error> {
        let query = query.trim();
        Self::validate_input_length(query)?;

        let limit = match options.limit {
            Some(limit) if limit > 0 => limit,
            _ => self.settings.default_limit,
        };
        validate_limit(limit)?;

        let score_threshold = match options.score_threshold {
            Some(t) if !t.is_finite() || !(-1.0..=1.0).contains(&t) => {
                return Err(Error::Validation(format!(
                    "score_threshold must be between -1 and 1, got {t}"
                )));
            }
            Some(t) if t > 0.0 => Some(t),
            _ => self.settings.default_score_threshold,
        };

        let target = self.resolve_target(options.collection.as_deref());
        self.registry.ensure(&target).await?;
        let vector = self.embed(query).await?;

        let search = SearchQuery {
            vector,
            limit,
            filter: options.filter.filter(|f| !f.is_empty()),
            score_threshold,
        };
        let hits = self
            .with_collection(&target, || self.backend.search(&target, &search))
            .await?;

        debug!(collection = %target, limit, hits = hits.len(), "Search complete");
        Ok(hits
            .into_iter()
            .map(|hit| SearchResult {
                id: hit.id,
                score: hit.score,
                content: hit.payload.content,
                timestamp: hit.payload.timestamp,
                metadata: hit.payload.metadata.unwrap_or_default(),
                embedding_model: hit.payload.embedding_model,
                embedding_provider: hit.payload.embedding_provider,
                collection: target.clone(),
            })
            .collect())
    }
}
