//! qdrant-mcp - semantic memory for AI agents over named Qdrant collections.
//!
//! Every agent can keep its memories in its own collection. Collections are
//! created on first reference with the active embedding provider's vector
//! size, so callers never manage schema.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use qdrant_mcp::{Config, FindOptions, MemoryStore};
//!
//! # async fn demo() -> Result<(), qdrant_mcp::Error> {
//! let config = Config::load(None)?;
//! let store = Arc::new(MemoryStore::from_config(&config)?);
//!
//! let receipt = store
//!     .store("Alice works at Microsoft", None, None, Some("clara-agent"))
//!     .await?;
//! println!("stored {} in {}", receipt.id, receipt.collection);
//!
//! let options = FindOptions {
//!     collection: Some("clara-agent".to_string()),
//!     ..Default::default()
//! };
//! for hit in store.find("where does alice work", options).await? {
//!     println!("{:.2}: {}", hit.score, hit.content);
//! }
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod embedding;
pub mod errors;
pub mod memory;
pub mod registry;
pub mod server;
pub mod tools;
pub mod types;

// Re-export public API
pub use backend::{BackendError, BackendKind, MetadataFilter, QdrantBackend, SqliteBackend, VectorBackend};
pub use config::Config;
pub use embedding::{EmbeddingProvider, ProviderError, ProviderKind};
pub use errors::Error;
pub use memory::store::{MAX_INPUT_LENGTH, MAX_SEARCH_LIMIT};
pub use memory::{FindOptions, MemoryStore, StoreSettings};
pub use registry::CollectionRegistry;
pub use server::McpServer;
pub use tools::ToolSurface;
pub use types::{CollectionInfo, DeleteSummary, Metadata, SearchResult, StoreReceipt};
