//! Embedded SQLite vector backend.
//!
//! Stores each collection's points in one table keyed by `(collection, id)`,
//! vectors as little-endian f32 BLOBs and payloads as JSON text. Search is a
//! brute-force cosine scan of the collection, which is fine for the sizes an
//! agent memory reaches on a single machine.

pub mod vectors;

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

use super::{
    BackendError, CollectionStats, Distance, Result, ScoredPoint, SearchQuery, VectorBackend,
    VectorPoint, validate_collection_name,
};
use crate::types::PointPayload;

use self::vectors::{blob_to_vec, cosine_similarity, ensure_finite, vec_to_blob};

impl From<rusqlite::Error> for BackendError {
    fn from(err: rusqlite::Error) -> Self {
        BackendError::Storage(err.to_string())
    }
}

/// SQLite-backed implementation of [`VectorBackend`].
#[derive(Clone)]
pub struct SqliteBackend {
    conn: Arc<Mutex<Connection>>,
}

/// Initialize database schema.
fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS collections (
            name TEXT PRIMARY KEY,
            dimensions INTEGER NOT NULL,
            distance TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS points (
            collection TEXT NOT NULL,
            id TEXT NOT NULL,
            vector BLOB NOT NULL,
            payload TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (collection, id)
        );
        "#,
    )?;
    Ok(())
}

/// Look up the dimensionality a collection was created with.
fn collection_dimensions(conn: &Connection, collection: &str) -> Result<u64> {
    let dims: Option<i64> = conn
        .query_row(
            "SELECT dimensions FROM collections WHERE name = ?1",
            [collection],
            |row| row.get(0),
        )
        .optional()?;
    match dims {
        Some(d) => Ok(d as u64),
        None => Err(BackendError::CollectionNotFound(collection.to_string())),
    }
}

fn check_dimensions(collection: &str, expected: u64, vector: &[f32]) -> Result<()> {
    if vector.len() as u64 != expected {
        return Err(BackendError::DimensionMismatch {
            collection: collection.to_string(),
            expected,
            actual: vector.len() as u64,
        });
    }
    Ok(())
}

impl SqliteBackend {
    /// Open or create a SQLite vector store at the given path.
    ///
    /// # Errors
    ///
    /// Returns error if the database cannot be opened or schema initialization fails.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        create_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open a private in-memory store.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        create_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a closure against the connection on the blocking thread pool.
    async fn run<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| BackendError::Storage("connection lock poisoned".to_string()))?;
            op(&guard)
        })
        .await
        .map_err(|e| BackendError::Storage(format!("database task failed: {e}")))?
    }
}

#[async_trait]
impl VectorBackend for SqliteBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn collection_exists(&self, collection: &str) -> Result<bool> {
        let collection = collection.to_string();
        self.run(move |conn| {
            let found: Option<String> = conn
                .query_row(
                    "SELECT name FROM collections WHERE name = ?1",
                    [&collection],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
        .await
    }

    async fn create_collection(
        &self,
        collection: &str,
        dimensions: u64,
        distance: Distance,
    ) -> Result<()> {
        validate_collection_name(collection)?;
        if dimensions == 0 {
            return Err(BackendError::InvalidRequest(
                "vector size must be greater than 0".to_string(),
            ));
        }
        if distance != Distance::Cosine {
            return Err(BackendError::InvalidRequest(format!(
                "sqlite backend only supports Cosine distance, got {}",
                distance.as_str()
            )));
        }

        let collection = collection.to_string();
        self.run(move |conn| {
            let inserted = conn.execute(
                r#"
                INSERT OR IGNORE INTO collections (name, dimensions, distance, created_at)
                VALUES (?1, ?2, ?3, ?4)
                "#,
                params![
                    &collection,
                    dimensions as i64,
                    distance.as_str(),
                    Utc::now().to_rfc3339()
                ],
            )?;
            if inserted == 0 {
                return Err(BackendError::AlreadyExists(collection));
            }
            Ok(())
        })
        .await
    }

    async fn upsert(&self, collection: &str, point: VectorPoint) -> Result<()> {
        ensure_finite(&point.vector)?;
        let payload = serde_json::to_string(&point.payload)
            .map_err(|e| BackendError::InvalidRequest(format!("unserializable payload: {e}")))?;

        let collection = collection.to_string();
        self.run(move |conn| {
            let expected = collection_dimensions(conn, &collection)?;
            check_dimensions(&collection, expected, &point.vector)?;

            conn.execute(
                r#"
                INSERT INTO points (collection, id, vector, payload, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(collection, id) DO UPDATE SET
                    vector = excluded.vector,
                    payload = excluded.payload,
                    updated_at = excluded.updated_at
                "#,
                params![
                    &collection,
                    &point.id,
                    vec_to_blob(&point.vector),
                    payload,
                    Utc::now().to_rfc3339()
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn search(&self, collection: &str, query: &SearchQuery) -> Result<Vec<ScoredPoint>> {
        ensure_finite(&query.vector)?;

        let collection = collection.to_string();
        let query = query.clone();
        self.run(move |conn| {
            let expected = collection_dimensions(conn, &collection)?;
            check_dimensions(&collection, expected, &query.vector)?;

            let mut stmt =
                conn.prepare("SELECT id, vector, payload FROM points WHERE collection = ?1")?;
            let rows = stmt.query_map([&collection], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Vec<u8>>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?;

            let mut hits = Vec::new();
            for row in rows {
                let (id, blob, payload) = row?;
                let payload: PointPayload = serde_json::from_str(&payload).map_err(|e| {
                    BackendError::Storage(format!("corrupt payload for point '{id}': {e}"))
                })?;
                if let Some(filter) = &query.filter {
                    if !filter.matches(payload.metadata.as_ref()) {
                        continue;
                    }
                }

                let stored = blob_to_vec(&blob)?;
                let score = cosine_similarity(&query.vector, &stored)? as f32;
                if query.score_threshold.is_some_and(|t| score < t) {
                    continue;
                }
                hits.push(ScoredPoint { id, score, payload });
            }

            hits.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            hits.truncate(query.limit as usize);
            Ok(hits)
        })
        .await
    }

    async fn delete(&self, collection: &str, ids: &[String]) -> Result<usize> {
        let collection = collection.to_string();
        let ids = ids.to_vec();
        self.run(move |conn| {
            collection_dimensions(conn, &collection)?;

            let tx = conn.unchecked_transaction()?;
            let mut deleted = 0;
            for id in &ids {
                deleted += tx.execute(
                    "DELETE FROM points WHERE collection = ?1 AND id = ?2",
                    params![&collection, id],
                )?;
            }
            tx.commit()?;
            Ok(deleted)
        })
        .await
    }

    async fn collection_info(&self, collection: &str) -> Result<CollectionStats> {
        let collection = collection.to_string();
        self.run(move |conn| {
            let row: Option<(i64, String)> = conn
                .query_row(
                    "SELECT dimensions, distance FROM collections WHERE name = ?1",
                    [&collection],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            let (dimensions, distance) =
                row.ok_or_else(|| BackendError::CollectionNotFound(collection.clone()))?;

            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM points WHERE collection = ?1",
                [&collection],
                |row| row.get(0),
            )?;

            Ok(CollectionStats {
                vector_dimensions: dimensions as u64,
                point_count: count as u64,
                status: "green".to_string(),
                distance,
            })
        })
        .await
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        self.run(|conn| {
            let mut stmt = conn.prepare("SELECT name FROM collections ORDER BY name")?;
            let names = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(names)
        })
        .await
    }
}
