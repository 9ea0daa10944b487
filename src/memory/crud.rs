//! Store and delete operations for the memory store.

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::backend::VectorPoint;
use crate::errors::Error;
use crate::types::{DeleteSummary, Metadata, PointPayload, StoreReceipt};

use super::store::MemoryStore;

impl MemoryStore {
    #[must_use = "handle the error or results may be lost"]
    /// Store content with optional metadata.
    ///
    /// # Arguments
    ///
    /// * `content` - Text content to store (1 to 100,000 characters)
    /// * `metadata` - Optional metadata kept in the payload and usable in filters
    /// * `id` - Caller-chosen id; a UUID is generated when absent or blank
    /// * `collection` - Target collection; the default when absent or blank
    ///
    /// Storing an id that already exists in the collection overwrites it.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Input is empty or exceeds 100,000 characters
    /// - The collection cannot be created
    /// - Embedding generation fails
    /// - The backend rejects the write, including a dimension mismatch
    ///   with a collection created under a different model
    pub async fn store(
        &self,
        content: &str,
        metadata: Option<Metadata>,
        id: Option<&str>,
        collection: Option<&str>,
    ) -> Result<StoreReceipt, Error> {
        Self::validate_input_length(content)?;
        let target = self.resolve_target(collection);

        let id = match id.map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => Uuid::new_v4().to_string(),
        };

        self.registry.ensure(&target).await?;
        let vector = self.embed(content).await?;

        let point = VectorPoint {
            id: id.clone(),
            vector,
            payload: PointPayload {
                content: content.to_string(),
                timestamp: Utc::now().to_rfc3339(),
                embedding_model: self.embedder.model_name().to_string(),
                embedding_provider: self.embedder.provider_name().to_string(),
                metadata: metadata.filter(|m| !m.is_empty()),
            },
        };

        self.with_collection(&target, || self.backend.upsert(&target, point.clone()))
            .await?;

        debug!(collection = %target, id = %id, "Stored memory");
        Ok(StoreReceipt {
            id,
            collection: target,
        })
    }

    #[must_use = "handle the error or results may be lost"]
    /// Delete memories by id.
    ///
    /// Ids are trimmed and de-duplicated. Ids not present in the collection
    /// are ignored; `deleted_count` counts only the ones that existed.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if no non-blank id is given.
    pub async fn delete(
        &self,
        ids: &[String],
        collection: Option<&str>,
    ) -> Result<DeleteSummary, Error> {
        let mut unique: Vec<String> = Vec::with_capacity(ids.len());
        for id in ids.iter().map(|id| id.trim()).filter(|id| !id.is_empty()) {
            if !unique.iter().any(|seen| seen == id) {
                unique.push(id.to_string());
            }
        }
        if unique.is_empty() {
            return Err(Error::Validation("No IDs provided".to_string()));
        }

        let target = self.resolve_target(collection);
        let deleted_count = self
            .with_collection(&target, || self.backend.delete(&target, &unique))
            .await?;

        debug!(collection = %target, requested = unique.len(), deleted_count, "Deleted memories");
        Ok(DeleteSummary {
            deleted_count,
            ids: unique,
            collection: target,
        })
    }
}
