//! Tests for the memory store.

use std::sync::Arc;

use serde_json::json;

use super::*;
use crate::backend::{Distance, MetadataFilter, SqliteBackend, VectorBackend};
use crate::embedding::testing::HashEmbedder;
use crate::errors::Error;
use crate::types::Metadata;

const DIMS: u64 = 64;

fn test_store() -> MemoryStore {
    test_store_with(StoreSettings::default())
}

fn test_store_with(settings: StoreSettings) -> MemoryStore {
    let backend = Arc::new(SqliteBackend::open_in_memory().unwrap());
    MemoryStore::new(backend, Arc::new(HashEmbedder::new(DIMS)), settings)
}

fn meta(value: serde_json::Value) -> Metadata {
    value.as_object().unwrap().clone()
}

fn in_collection(name: &str) -> FindOptions {
    FindOptions {
        collection: Some(name.to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_store_without_collection_lands_in_default() {
    let store = test_store();

    let receipt = store
        .store("Paris is the capital of France", None, None, None)
        .await
        .unwrap();
    assert_eq!(receipt.collection, "mcp_memory");
    assert!(!receipt.id.is_empty());

    let results = store
        .find("capital of France", FindOptions::default())
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, receipt.id);
    assert_eq!(results[0].collection, "mcp_memory");
    assert!(results[0].score > 0.0);
}

#[tokio::test]
async fn test_explicit_collection_is_isolated() {
    let store = test_store();

    store
        .store("Clara's note", None, None, Some("clara-agent"))
        .await
        .unwrap();

    let other = store
        .find("note", in_collection("assistant-agent"))
        .await
        .unwrap();
    assert!(other.is_empty());

    let default = store.find("note", FindOptions::default()).await.unwrap();
    assert!(default.is_empty());

    let own = store.find("note", in_collection("clara-agent")).await.unwrap();
    assert_eq!(own.len(), 1);
    assert_eq!(own[0].collection, "clara-agent");
}

#[tokio::test]
async fn test_store_same_id_overwrites() {
    let store = test_store();

    store.store("X", None, Some("fixed-1"), None).await.unwrap();
    store.store("Y", None, Some("fixed-1"), None).await.unwrap();

    let results = store.find("Y", FindOptions::default()).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, "fixed-1");
    assert_eq!(results[0].content, "Y");
}

#[tokio::test]
async fn test_store_rejects_empty_and_oversized_content() {
    let store = test_store();

    assert!(matches!(
        store.store("   ", None, None, None).await,
        Err(Error::EmptyInput)
    ));

    let huge = "a".repeat(store::MAX_INPUT_LENGTH + 1);
    assert!(matches!(
        store.store(&huge, None, None, None).await,
        Err(Error::InputTooLong { .. })
    ));
}

#[tokio::test]
async fn test_blank_collection_and_id_fall_back() {
    let store = test_store();

    let receipt = store.store("content", None, Some("  "), Some(" ")).await.unwrap();
    assert_eq!(receipt.collection, "mcp_memory");
    assert_eq!(receipt.id.len(), 36);
}

#[tokio::test]
async fn test_payload_bookkeeping_and_metadata_returned() {
    let store = test_store();

    store
        .store(
            "meeting notes from monday",
            Some(meta(json!({"type": "meeting", "priority": 2}))),
            None,
            None,
        )
        .await
        .unwrap();

    let results = store.find("meeting notes", FindOptions::default()).await.unwrap();
    let hit = &results[0];
    assert_eq!(hit.metadata["type"], "meeting");
    assert_eq!(hit.embedding_model, "hash-bow");
    assert_eq!(hit.embedding_provider, "test");
    assert!(chrono::DateTime::parse_from_rfc3339(&hit.timestamp).is_ok());
}

#[tokio::test]
async fn test_find_with_filter() {
    let store = test_store();

    store
        .store("work task alpha", Some(meta(json!({"type": "work"}))), None, None)
        .await
        .unwrap();
    store
        .store("home task beta", Some(meta(json!({"type": "home"}))), None, None)
        .await
        .unwrap();

    let filter = MetadataFilter::from_json(&meta(json!({"type": "home"}))).unwrap();
    let results = store
        .find(
            "task",
            FindOptions {
                filter: Some(filter),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].content, "home task beta");
}

#[tokio::test]
async fn test_find_limit_and_ordering() {
    let store = test_store();
    for content in ["rust async runtime", "rust borrow checker", "gardening tips"] {
        store.store(content, None, None, None).await.unwrap();
    }

    let results = store
        .find(
            "rust async",
            FindOptions {
                limit: Some(2),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].content, "rust async runtime");
    assert!(results[0].score >= results[1].score);
}

#[tokio::test]
async fn test_find_zero_limit_uses_default() {
    let store = test_store_with(StoreSettings {
        default_limit: 1,
        ..Default::default()
    });
    store.store("one shared", None, None, None).await.unwrap();
    store.store("two shared", None, None, None).await.unwrap();

    let results = store
        .find(
            "shared",
            FindOptions {
                limit: Some(0),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
}

#[tokio::test]
async fn test_find_rejects_excessive_limit_and_bad_threshold() {
    let store = test_store();

    assert!(matches!(
        store
            .find(
                "q",
                FindOptions {
                    limit: Some(store::MAX_SEARCH_LIMIT + 1),
                    ..Default::default()
                }
            )
            .await,
        Err(Error::InvalidLimit(_))
    ));
    assert!(matches!(
        store
            .find(
                "q",
                FindOptions {
                    score_threshold: Some(2.0),
                    ..Default::default()
                }
            )
            .await,
        Err(Error::Validation(_))
    ));
}

#[tokio::test]
async fn test_score_threshold_excludes_weak_matches() {
    let store = test_store();
    store.store("alpha beta gamma", None, None, None).await.unwrap();
    store.store("completely unrelated words", None, None, None).await.unwrap();

    let results = store
        .find(
            "alpha beta gamma",
            FindOptions {
                score_threshold: Some(0.9),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].content, "alpha beta gamma");
}

#[tokio::test]
async fn test_default_score_threshold_applies() {
    let store = test_store_with(StoreSettings {
        default_score_threshold: Some(0.99),
        ..Default::default()
    });
    store.store("alpha beta", None, None, None).await.unwrap();

    let results = store.find("alpha", FindOptions::default()).await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn test_find_on_never_used_collection_is_empty() {
    let store = test_store();
    let results = store.find("anything", in_collection("fresh")).await.unwrap();
    assert!(results.is_empty());
    assert!(store.list_collections().await.unwrap().contains(&"fresh".to_string()));
}

#[tokio::test]
async fn test_delete_mixed_ids() {
    let store = test_store();
    store.store("first", None, Some("a"), None).await.unwrap();
    store.store("second", None, Some("b"), None).await.unwrap();

    let summary = store
        .delete(&["a".to_string(), " missing ".to_string(), "a".to_string()], None)
        .await
        .unwrap();
    assert_eq!(summary.deleted_count, 1);
    assert_eq!(summary.ids, vec!["a".to_string(), "missing".to_string()]);
    assert_eq!(summary.collection, "mcp_memory");

    let info = store.collection_info(None).await.unwrap();
    assert_eq!(info.point_count, 1);
}

#[tokio::test]
async fn test_delete_requires_ids() {
    let store = test_store();
    assert!(matches!(
        store.delete(&[" ".to_string()], None).await,
        Err(Error::Validation(msg)) if msg == "No IDs provided"
    ));
}

#[tokio::test]
async fn test_collection_info_creates_default() {
    let store = test_store();

    let info = store.collection_info(None).await.unwrap();
    assert_eq!(info.name, "mcp_memory");
    assert_eq!(info.vector_dimensions, DIMS);
    assert_eq!(info.point_count, 0);
    assert_eq!(info.status, "green");
}

#[tokio::test]
async fn test_collection_info_invalid_name_is_info_error() {
    let store = test_store();
    let err = store.collection_info(Some("bad/name")).await.unwrap_err();
    assert_eq!(err.code(), "E_COLLECTION_INFO");
}

#[tokio::test]
async fn test_list_collections_is_global_and_sorted() {
    let backend = Arc::new(SqliteBackend::open_in_memory().unwrap());
    backend
        .create_collection("zeta", DIMS, Distance::Cosine)
        .await
        .unwrap();
    let store = MemoryStore::new(
        backend,
        Arc::new(HashEmbedder::new(DIMS)),
        StoreSettings::default(),
    );
    store.store("x", None, None, Some("alpha")).await.unwrap();

    assert_eq!(
        store.list_collections().await.unwrap(),
        vec!["alpha".to_string(), "zeta".to_string()]
    );
}

#[tokio::test]
async fn test_dimension_mismatch_surfaces_as_backend_error() {
    let backend = Arc::new(SqliteBackend::open_in_memory().unwrap());
    backend
        .create_collection("legacy", 32, Distance::Cosine)
        .await
        .unwrap();
    let store = MemoryStore::new(
        backend,
        Arc::new(HashEmbedder::new(DIMS)),
        StoreSettings::default(),
    );

    let err = store
        .store("new content", None, None, Some("legacy"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "E_DIMENSION_MISMATCH");
    assert!(err.to_string().contains("legacy"));
}

#[tokio::test]
async fn test_recreates_collection_dropped_behind_cache() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("vectors.db");
    let backend = Arc::new(SqliteBackend::open(&path).unwrap());
    let store = MemoryStore::new(
        backend,
        Arc::new(HashEmbedder::new(DIMS)),
        StoreSettings::default(),
    );

    store.store("before", None, None, None).await.unwrap();

    // Drop the collection out from under the registry cache.
    let conn = rusqlite::Connection::open(&path).unwrap();
    conn.execute("DELETE FROM collections WHERE name = 'mcp_memory'", [])
        .unwrap();
    drop(conn);

    let receipt = store.store("after", None, None, None).await.unwrap();
    assert_eq!(receipt.collection, "mcp_memory");
    let info = store.collection_info(None).await.unwrap();
    assert_eq!(info.vector_dimensions, DIMS);
}

#[tokio::test]
async fn test_concurrent_stores_to_new_collection() {
    let store = Arc::new(test_store());

    let handles: Vec<_> = (0..10)
        .map(|i| {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                store
                    .store(&format!("note number {i}"), None, None, Some("burst"))
                    .await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let info = store.collection_info(Some("burst")).await.unwrap();
    assert_eq!(info.point_count, 10);
}
