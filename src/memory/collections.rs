//! Collection-level operations.

use crate::errors::Error;
use crate::types::CollectionInfo;

use super::store::MemoryStore;

impl MemoryStore {
    /// Describe a collection, creating it empty if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns `Error::CollectionInfo` if the backend cannot be reached or
    /// the collection cannot be read.
    pub async fn collection_info(&self, collection: Option<&str>) -> Result<CollectionInfo, Error> {
        let target = self.resolve_target(collection);

        let stats = self
            .with_collection(&target, || self.backend.collection_info(&target))
            .await
            .map_err(|e| {
                let reason = match e {
                    Error::CollectionCreation { reason, .. } => reason,
                    Error::Backend(inner) => inner.to_string(),
                    other => other.to_string(),
                };
                Error::CollectionInfo {
                    collection: target.clone(),
                    reason,
                }
            })?;

        Ok(CollectionInfo {
            name: target,
            vector_dimensions: stats.vector_dimensions,
            point_count: stats.point_count,
            status: stats.status,
            distance: stats.distance,
        })
    }

    /// All collections in the backend, sorted by name.
    ///
    /// Reflects global backend state; the registry cache is not consulted.
    pub async fn list_collections(&self) -> Result<Vec<String>, Error> {
        let mut names = self.backend.list_collections().await?;
        names.sort();
        Ok(names)
    }
}
