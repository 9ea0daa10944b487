//! Memory store data types.

use serde::{Deserialize, Serialize};

/// Caller-supplied metadata: string keys to arbitrary JSON values.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Payload persisted next to every vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointPayload {
    #[serde(default)]
    pub content: String,
    /// RFC 3339 UTC time of the write.
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub embedding_model: String,
    #[serde(default)]
    pub embedding_provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

/// Result of a store operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreReceipt {
    /// ID actually used (caller-supplied or generated).
    pub id: String,
    /// Collection written to.
    pub collection: String,
}

/// A single similarity search hit.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub id: String,
    pub score: f32,
    pub content: String,
    pub timestamp: String,
    pub metadata: Metadata,
    pub embedding_model: String,
    pub embedding_provider: String,
    /// Collection the hit was found in.
    pub collection: String,
}

/// Result of a delete operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeleteSummary {
    /// Number of ids that existed when the deletion was issued.
    pub deleted_count: usize,
    pub ids: Vec<String>,
    pub collection: String,
}

/// Collection statistics and configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionInfo {
    pub name: String,
    pub vector_dimensions: u64,
    pub point_count: u64,
    pub status: String,
    pub distance: String,
}
