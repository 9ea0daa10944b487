//! Vector database boundary.
//!
//! This module provides:
//! - `VectorBackend`: the operations the memory layer needs from a vector database
//! - `BackendError`: backend failures, classified so callers can react to
//!   "already exists", "not found" and dimension mismatches
//! - `qdrant`: Qdrant over gRPC
//! - `sqlite`: embedded single-file backend (offline use and tests)
//! - `filter`: typed metadata filter shared by both backends

pub mod filter;
pub mod qdrant;
pub mod sqlite;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::PointPayload;

pub use self::filter::MetadataFilter;
pub use self::qdrant::QdrantBackend;
pub use self::sqlite::SqliteBackend;

/// Maximum collection name length accepted by Qdrant.
pub const MAX_COLLECTION_NAME_LENGTH: usize = 255;

/// Error types for vector backend operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("collection '{0}' already exists")]
    AlreadyExists(String),

    #[error("collection '{0}' not found")]
    CollectionNotFound(String),

    #[error(
        "vector dimension mismatch in collection '{collection}': collection expects {expected} dimensions, got {actual} (embedding provider or model changed since the collection was created?)"
    )]
    DimensionMismatch {
        collection: String,
        expected: u64,
        actual: u64,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("storage error: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, BackendError>;

/// Which vector database to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Qdrant,
    Sqlite,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Qdrant => "qdrant",
            BackendKind::Sqlite => "sqlite",
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "qdrant" => Ok(BackendKind::Qdrant),
            "sqlite" => Ok(BackendKind::Sqlite),
            other => Err(format!(
                "unknown vector backend '{other}' (expected 'qdrant' or 'sqlite')"
            )),
        }
    }
}

/// Similarity metric a collection is created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Distance {
    Cosine,
    Dot,
    Euclid,
    Manhattan,
}

impl Distance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Distance::Cosine => "Cosine",
            Distance::Dot => "Dot",
            Distance::Euclid => "Euclid",
            Distance::Manhattan => "Manhattan",
        }
    }
}

/// A vector with its payload, ready to be upserted.
#[derive(Debug, Clone)]
pub struct VectorPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: PointPayload,
}

/// Parameters of a similarity search.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub vector: Vec<f32>,
    pub limit: u64,
    pub filter: Option<MetadataFilter>,
    /// Minimum score; `None` means no cutoff.
    pub score_threshold: Option<f32>,
}

/// A search hit as returned by the backend, best first.
#[derive(Debug, Clone)]
pub struct ScoredPoint {
    pub id: String,
    pub score: f32,
    pub payload: PointPayload,
}

/// Collection metadata as reported by the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionStats {
    pub vector_dimensions: u64,
    pub point_count: u64,
    pub status: String,
    pub distance: String,
}

/// Operations the memory layer issues against a vector database.
///
/// Implementations must be safe to call from concurrent requests.
#[async_trait]
pub trait VectorBackend: Send + Sync {
    /// Short backend identifier for logs.
    fn name(&self) -> &'static str;

    async fn collection_exists(&self, collection: &str) -> Result<bool>;

    /// Create a collection.
    ///
    /// Returns `BackendError::AlreadyExists` if it is already there.
    async fn create_collection(
        &self,
        collection: &str,
        dimensions: u64,
        distance: Distance,
    ) -> Result<()>;

    /// Insert or overwrite a point by id.
    async fn upsert(&self, collection: &str, point: VectorPoint) -> Result<()>;

    /// Similarity search ordered by descending score.
    async fn search(&self, collection: &str, query: &SearchQuery) -> Result<Vec<ScoredPoint>>;

    /// Delete points by id, returning how many existed.
    ///
    /// Unknown ids are ignored.
    async fn delete(&self, collection: &str, ids: &[String]) -> Result<usize>;

    async fn collection_info(&self, collection: &str) -> Result<CollectionStats>;

    /// All collections known to the backend, not only the ones this process touched.
    async fn list_collections(&self) -> Result<Vec<String>>;
}

/// Validate a collection name with the rules Qdrant applies.
pub fn validate_collection_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(BackendError::InvalidRequest(
            "collection name cannot be empty".to_string(),
        ));
    }
    if name.chars().count() > MAX_COLLECTION_NAME_LENGTH {
        return Err(BackendError::InvalidRequest(format!(
            "collection name exceeds {MAX_COLLECTION_NAME_LENGTH} characters"
        )));
    }
    if let Some(c) = name
        .chars()
        .find(|c| c.is_control() || matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
    {
        return Err(BackendError::InvalidRequest(format!(
            "collection name '{name}' contains forbidden character {c:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_collection_names() {
        assert!(validate_collection_name("mcp_memory").is_ok());
        assert!(validate_collection_name("clara-agent").is_ok());
        assert!(validate_collection_name("notes.2025").is_ok());
    }

    #[test]
    fn test_invalid_collection_names() {
        assert!(matches!(
            validate_collection_name(""),
            Err(BackendError::InvalidRequest(_))
        ));
        assert!(validate_collection_name("a/b").is_err());
        assert!(validate_collection_name("what?").is_err());
        assert!(validate_collection_name("tab\there").is_err());
        assert!(validate_collection_name(&"x".repeat(256)).is_err());
        assert!(validate_collection_name(&"x".repeat(255)).is_ok());
    }

    #[test]
    fn test_backend_kind_parsing() {
        assert_eq!("Qdrant".parse::<BackendKind>().unwrap(), BackendKind::Qdrant);
        assert_eq!("sqlite".parse::<BackendKind>().unwrap(), BackendKind::Sqlite);
        assert!("chroma".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_distance_names() {
        assert_eq!(Distance::Cosine.as_str(), "Cosine");
        assert_eq!(Distance::Euclid.as_str(), "Euclid");
    }
}
