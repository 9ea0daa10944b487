//! Collection registry.
//!
//! Tracks which collections are known to exist and creates missing ones
//! sized to the active embedding provider. The cache only ever saves backend
//! round trips: the backend stays the source of truth, and a stale entry is
//! dropped through [`CollectionRegistry::invalidate`] when the backend reports
//! the collection missing.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::backend::{BackendError, Distance, VectorBackend};
use crate::errors::Error;

/// Similarity metric every collection is created with.
pub const COLLECTION_DISTANCE: Distance = Distance::Cosine;

pub struct CollectionRegistry {
    backend: Arc<dyn VectorBackend>,
    dimensions: u64,
    known: RwLock<HashSet<String>>,
}

impl CollectionRegistry {
    /// `dimensions` is the active provider's output size.
    pub fn new(backend: Arc<dyn VectorBackend>, dimensions: u64) -> Self {
        Self {
            backend,
            dimensions,
            known: RwLock::new(HashSet::new()),
        }
    }

    /// Make sure `collection` exists, creating it if needed. Idempotent.
    ///
    /// A concurrent creator winning the race is treated as success.
    ///
    /// # Errors
    ///
    /// `Error::CollectionCreation` when the existence check or the creation
    /// fails for any reason other than "already exists".
    pub async fn ensure(&self, collection: &str) -> Result<(), Error> {
        if self.known.read().await.contains(collection) {
            return Ok(());
        }

        let creation_error = |e: BackendError| Error::CollectionCreation {
            collection: collection.to_string(),
            reason: e.to_string(),
        };

        let exists = self
            .backend
            .collection_exists(collection)
            .await
            .map_err(creation_error)?;

        if exists {
            debug!(collection = %collection, "Collection exists");
        } else {
            match self
                .backend
                .create_collection(collection, self.dimensions, COLLECTION_DISTANCE)
                .await
            {
                Ok(()) => info!(
                    collection = %collection,
                    dimensions = self.dimensions,
                    backend = self.backend.name(),
                    "Created collection"
                ),
                Err(BackendError::AlreadyExists(_)) => {
                    debug!(collection = %collection, "Collection created concurrently");
                }
                Err(e) => return Err(creation_error(e)),
            }
        }

        self.known.write().await.insert(collection.to_string());
        Ok(())
    }

    /// Forget a cached collection so the next `ensure` asks the backend again.
    pub async fn invalidate(&self, collection: &str) {
        self.known.write().await.remove(collection);
    }

    pub async fn is_known(&self, collection: &str) -> bool {
        self.known.read().await.contains(collection)
    }
}
