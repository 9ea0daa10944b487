//! Integration tests exercising the qdrant-mcp library API from an external crate.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use qdrant_mcp::config::ConfigFile;
use qdrant_mcp::{
    BackendKind, Config, EmbeddingProvider, FindOptions, MemoryStore, ProviderError,
    ProviderKind, SqliteBackend, StoreSettings, ToolSurface,
};
use serde_json::json;
use tempfile::TempDir;

/// Word-hashing embedder: texts that share words score above zero.
struct WordHashEmbedder {
    dims: u64,
}

#[async_trait]
impl EmbeddingProvider for WordHashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let mut vector = vec![0.0f32; self.dims as usize];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
            for byte in word.to_lowercase().bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(0x0100_0000_01b3);
            }
            vector[(hash % self.dims) as usize] += 1.0;
        }
        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        Ok(vector)
    }

    fn dimensions(&self) -> u64 {
        self.dims
    }

    fn model_name(&self) -> &str {
        "word-hash"
    }

    fn provider_name(&self) -> &'static str {
        "test"
    }
}

fn store_at(path: &Path, dims: u64) -> MemoryStore {
    let backend = Arc::new(SqliteBackend::open(path).unwrap());
    MemoryStore::new(
        backend,
        Arc::new(WordHashEmbedder { dims }),
        StoreSettings::default(),
    )
}

fn in_collection(name: &str) -> FindOptions {
    FindOptions {
        collection: Some(name.to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_store_without_collection_is_found_in_default() {
    let dir = TempDir::new().unwrap();
    let store = store_at(&dir.path().join("vectors.db"), 64);

    let receipt = store
        .store("Paris is the capital of France", None, None, None)
        .await
        .unwrap();
    assert_eq!(receipt.collection, "mcp_memory");
    assert!(uuid::Uuid::parse_str(&receipt.id).is_ok());

    let results = store
        .find("capital of France", in_collection("mcp_memory"))
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, receipt.id);
    assert_eq!(results[0].collection, "mcp_memory");
    assert!(results[0].score > 0.0);
}

#[tokio::test]
async fn test_collections_are_isolated() {
    let dir = TempDir::new().unwrap();
    let store = store_at(&dir.path().join("vectors.db"), 64);

    store
        .store("Clara's note", None, None, Some("clara-agent"))
        .await
        .unwrap();

    let results = store
        .find("note", in_collection("assistant-agent"))
        .await
        .unwrap();
    assert!(results.is_empty());

    let results = store.find("note", in_collection("clara-agent")).await.unwrap();
    assert_eq!(results.len(), 1);
}

#[tokio::test]
async fn test_same_id_overwrites() {
    let dir = TempDir::new().unwrap();
    let store = store_at(&dir.path().join("vectors.db"), 64);

    store.store("X", None, Some("fixed-1"), None).await.unwrap();
    store.store("Y", None, Some("fixed-1"), None).await.unwrap();

    let results = store.find("Y", FindOptions::default()).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, "fixed-1");
    assert_eq!(results[0].content, "Y");
    assert_eq!(store.collection_info(None).await.unwrap().point_count, 1);
}

#[tokio::test]
async fn test_dimension_change_is_rejected_without_corrupting_data() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("vectors.db");

    let original = store_at(&path, 64);
    original
        .store("written by the old model", None, Some("old-1"), Some("notes"))
        .await
        .unwrap();

    let switched = store_at(&path, 32);
    let err = switched
        .store("written by the new model", None, None, Some("notes"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "E_DIMENSION_MISMATCH");
    assert!(err.to_string().contains("notes"));

    let reopened = store_at(&path, 64);
    let info = reopened.collection_info(Some("notes")).await.unwrap();
    assert_eq!(info.vector_dimensions, 64);
    assert_eq!(info.point_count, 1);
    let results = reopened
        .find("old model", in_collection("notes"))
        .await
        .unwrap();
    assert_eq!(results[0].id, "old-1");
}

#[tokio::test]
async fn test_tool_surface_round_trip() {
    let dir = TempDir::new().unwrap();
    let tools = ToolSurface::new(Arc::new(store_at(&dir.path().join("vectors.db"), 64)));

    let text = tools
        .call(
            "qdrant_store",
            json!({
                "content": "standup moved to ten",
                "metadata": "{\"type\": \"meeting\"}",
                "collection_name": "team"
            }),
        )
        .await
        .unwrap();
    assert!(text.starts_with("Stored successfully in collection 'team' with ID: "));

    let found: serde_json::Value = serde_json::from_str(
        &tools
            .call(
                "qdrant_find",
                json!({"query": "standup", "filter": {"type": "meeting"}, "collection_name": "team"}),
            )
            .await
            .unwrap(),
    )
    .unwrap();
    assert_eq!(found[0]["collection"], "team");
    assert_eq!(found[0]["metadata"]["type"], "meeting");

    let err = tools
        .call("qdrant_store", json!({"content": "x", "metadata": "{oops"}))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "E_VALIDATION");
}

#[tokio::test]
async fn test_store_from_config_with_sqlite_backend() {
    let dir = TempDir::new().unwrap();
    let layer = ConfigFile {
        embedding_provider: Some(ProviderKind::OpenAi),
        openai_api_key: Some("sk-test".to_string()),
        backend: Some(BackendKind::Sqlite),
        database_path: Some(dir.path().join("data/vectors.db")),
        default_collection_name: Some("agent-default".to_string()),
        ..Default::default()
    };
    let config = Config::from_layer(layer).unwrap();
    let store = MemoryStore::from_config(&config).unwrap();

    assert_eq!(store.backend_name(), "sqlite");
    assert_eq!(store.embedder().dimensions(), 1536);

    // Info creates the default collection without embedding anything.
    let info = store.collection_info(None).await.unwrap();
    assert_eq!(info.name, "agent-default");
    assert_eq!(info.vector_dimensions, 1536);
    assert_eq!(store.list_collections().await.unwrap(), vec!["agent-default"]);
    assert!(dir.path().join("data/vectors.db").exists());
}
