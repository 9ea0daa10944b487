//! Qdrant backend over gRPC.
//!
//! Qdrant only accepts unsigned integers and UUIDs as point ids. Any other
//! caller-supplied id is mapped to a deterministic UUIDv5 and the original
//! string is kept in the payload under `external_id`, so results report the
//! id the caller chose and re-storing the same id overwrites the same point.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use qdrant_client::{Payload, Qdrant};
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::vectors_config::Config as VectorsConfigKind;
use qdrant_client::qdrant::{
    Condition as QdrantCondition, CreateCollectionBuilder, DeletePointsBuilder,
    Distance as QdrantDistance, Filter, GetPointsBuilder, PointId, PointStruct,
    PointsIdsList, Range, SearchPointsBuilder, UpsertPointsBuilder, Value as QdrantValue,
    VectorParamsBuilder,
};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use super::filter::{Condition, MatchValue};
use super::{
    BackendError, CollectionStats, Distance, MetadataFilter, Result, ScoredPoint, SearchQuery,
    VectorBackend, VectorPoint, validate_collection_name,
};
use crate::types::PointPayload;

/// Payload key holding the caller's id when it is not a native Qdrant id.
pub const EXTERNAL_ID_KEY: &str = "external_id";

/// Namespace for deriving UUIDv5 point ids from arbitrary strings.
const POINT_ID_NAMESPACE: Uuid = Uuid::from_u128(0x6f2a_4c1e_93d7_4b0a_8e55_1f3c_9a7d_2e41);

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Qdrant implementation of [`VectorBackend`].
pub struct QdrantBackend {
    client: Qdrant,
}

impl QdrantBackend {
    /// Build a client for the given gRPC URL.
    ///
    /// No request is made; connection problems surface on first use.
    pub fn connect(url: &str, api_key: Option<&SecretString>) -> Result<Self> {
        debug!("Connecting to Qdrant at {}", url);

        let client = Qdrant::from_url(url)
            .api_key(api_key.map(|k| k.expose_secret().to_string()))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| BackendError::Unavailable(format!("failed to create Qdrant client: {e}")))?;

        Ok(Self { client })
    }
}

/// Map a caller id to the point id Qdrant stores.
///
/// Returns the point id and whether the caller id must be kept in the payload.
fn to_point_id(id: &str) -> (PointId, bool) {
    match Uuid::parse_str(id) {
        Ok(uuid) if uuid.hyphenated().to_string() == id => (PointId::from(id.to_string()), false),
        _ => {
            let derived = Uuid::new_v5(&POINT_ID_NAMESPACE, id.as_bytes());
            (PointId::from(derived.to_string()), true)
        }
    }
}

fn point_id_to_string(id: Option<PointId>) -> String {
    match id.and_then(|p| p.point_id_options) {
        Some(PointIdOptions::Uuid(uuid)) => uuid,
        Some(PointIdOptions::Num(n)) => n.to_string(),
        None => String::new(),
    }
}

/// Serialize a point's payload, keeping the caller id when Qdrant cannot.
fn encode_payload(id: &str, payload: &PointPayload) -> Result<(PointId, Payload)> {
    let (point_id, keep_external) = to_point_id(id);

    let mut json = serde_json::to_value(payload)
        .map_err(|e| BackendError::InvalidRequest(format!("unserializable payload: {e}")))?;
    if keep_external {
        if let Value::Object(map) = &mut json {
            map.insert(EXTERNAL_ID_KEY.to_string(), Value::String(id.to_string()));
        }
    }
    let payload = Payload::try_from(json)
        .map_err(|e| BackendError::InvalidRequest(format!("invalid payload: {e}")))?;
    Ok((point_id, payload))
}

/// Rebuild the caller-facing id and typed payload from a Qdrant hit.
fn decode_point(
    id: Option<PointId>,
    payload: HashMap<String, QdrantValue>,
) -> Result<(String, PointPayload)> {
    let mut json: serde_json::Map<String, Value> = payload
        .into_iter()
        .map(|(k, v)| (k, v.into_json()))
        .collect();

    let id = match json.remove(EXTERNAL_ID_KEY) {
        Some(Value::String(external)) => external,
        _ => point_id_to_string(id),
    };

    let payload = serde_json::from_value(Value::Object(json)).map_err(|e| {
        warn!(point = %id, error = %e, "Point payload does not match the memory schema");
        BackendError::Storage(format!("corrupt payload for point {id}: {e}"))
    })?;
    Ok((id, payload))
}

/// Translate a metadata filter into Qdrant conditions on `metadata.<key>`.
fn to_qdrant_filter(filter: &MetadataFilter) -> Filter {
    let conditions: Vec<QdrantCondition> = filter
        .conditions()
        .map(|(key, condition)| {
            let field = format!("metadata.{key}");
            match condition {
                Condition::Match(MatchValue::Keyword(s)) => QdrantCondition::matches(field, s.clone()),
                Condition::Match(MatchValue::Integer(i)) => QdrantCondition::matches(field, *i),
                Condition::Match(MatchValue::Bool(b)) => QdrantCondition::matches(field, *b),
                Condition::Match(MatchValue::AnyKeyword(options)) => {
                    QdrantCondition::matches(field, options.clone())
                }
                Condition::Match(MatchValue::AnyInteger(options)) => {
                    QdrantCondition::matches(field, options.clone())
                }
                Condition::Range(bounds) => QdrantCondition::range(
                    field,
                    Range {
                        gt: bounds.gt,
                        gte: bounds.gte,
                        lt: bounds.lt,
                        lte: bounds.lte,
                    },
                ),
            }
        })
        .collect();
    Filter::must(conditions)
}

fn to_qdrant_distance(distance: Distance) -> QdrantDistance {
    match distance {
        Distance::Cosine => QdrantDistance::Cosine,
        Distance::Dot => QdrantDistance::Dot,
        Distance::Euclid => QdrantDistance::Euclid,
        Distance::Manhattan => QdrantDistance::Manhattan,
    }
}

fn classify_error(collection: &str, err: qdrant_client::QdrantError) -> BackendError {
    classify_message(collection, err.to_string())
}

/// Classify a Qdrant error by its message text.
fn classify_message(collection: &str, message: String) -> BackendError {
    let lower = message.to_lowercase();

    if lower.contains("already exists") {
        BackendError::AlreadyExists(collection.to_string())
    } else if lower.contains("doesn't exist") || lower.contains("not found") {
        BackendError::CollectionNotFound(collection.to_string())
    } else if lower.contains("dimension error") {
        match parse_dimension_error(&lower) {
            Some((expected, actual)) => BackendError::DimensionMismatch {
                collection: collection.to_string(),
                expected,
                actual,
            },
            None => BackendError::InvalidRequest(message),
        }
    } else if lower.contains("transport error")
        || lower.contains("connection refused")
        || lower.contains("unavailable")
        || lower.contains("deadline")
        || lower.contains("timed out")
    {
        BackendError::Unavailable(message)
    } else if lower.contains("wrong input") || lower.contains("invalid") {
        BackendError::InvalidRequest(message)
    } else {
        BackendError::Storage(message)
    }
}

/// Extract `(expected, got)` from "... expected dim: 384, got 1536".
fn parse_dimension_error(message: &str) -> Option<(u64, u64)> {
    let after_expected = &message[message.find("expected dim:")? + "expected dim:".len()..];
    let expected_str: String = after_expected
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    let after_got = &after_expected[after_expected.find("got")? + "got".len()..];
    let actual_str: String = after_got
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    Some((expected_str.parse().ok()?, actual_str.parse().ok()?))
}

#[async_trait]
impl VectorBackend for QdrantBackend {
    fn name(&self) -> &'static str {
        "qdrant"
    }

    async fn collection_exists(&self, collection: &str) -> Result<bool> {
        self.client
            .collection_exists(collection)
            .await
            .map_err(|e| classify_error(collection, e))
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

        self.client
            .create_collection(
                CreateCollectionBuilder::new(collection)
                    .vectors_config(VectorParamsBuilder::new(dimensions, to_qdrant_distance(distance))),
            )
            .await
            .map_err(|e| classify_error(collection, e))?;
        Ok(())
    }

    async fn upsert(&self, collection: &str, point: VectorPoint) -> Result<()> {
        let (point_id, payload) = encode_payload(&point.id, &point.payload)?;

        self.client
            .upsert_points(
                UpsertPointsBuilder::new(
                    collection,
                    vec![PointStruct::new(point_id, point.vector, payload)],
                )
                .wait(true),
            )
            .await
            .map_err(|e| classify_error(collection, e))?;
        Ok(())
    }

    async fn search(&self, collection: &str, query: &SearchQuery) -> Result<Vec<ScoredPoint>> {
        let mut request = SearchPointsBuilder::new(collection, query.vector.clone(), query.limit)
            .with_payload(true);
        if let Some(filter) = query.filter.as_ref().filter(|f| !f.is_empty()) {
            request = request.filter(to_qdrant_filter(filter));
        }
        if let Some(threshold) = query.score_threshold {
            request = request.score_threshold(threshold);
        }

        let response = self
            .client
            .search_points(request)
            .await
            .map_err(|e| classify_error(collection, e))?;

        response
            .result
            .into_iter()
            .map(|hit| {
                let (id, payload) = decode_point(hit.id, hit.payload)?;
                Ok(ScoredPoint {
                    id,
                    score: hit.score,
                    payload,
                })
            })
            .collect()
    }

    async fn delete(&self, collection: &str, ids: &[String]) -> Result<usize> {
        let point_ids: Vec<PointId> = ids.iter().map(|id| to_point_id(id).0).collect();

        let existing = self
            .client
            .get_points(
                GetPointsBuilder::new(collection, point_ids.clone())
                    .with_payload(false)
                    .with_vectors(false),
            )
            .await
            .map_err(|e| classify_error(collection, e))?
            .result
            .len();

        self.client
            .delete_points(
                DeletePointsBuilder::new(collection)
                    .points(PointsIdsList { ids: point_ids })
                    .wait(true),
            )
            .await
            .map_err(|e| classify_error(collection, e))?;

        Ok(existing)
    }

    async fn collection_info(&self, collection: &str) -> Result<CollectionStats> {
        let response = self
            .client
            .collection_info(collection)
            .await
            .map_err(|e| classify_error(collection, e))?;
        let info = response
            .result
            .ok_or_else(|| BackendError::CollectionNotFound(collection.to_string()))?;

        let params = info
            .config
            .as_ref()
            .and_then(|c| c.params.as_ref())
            .and_then(|p| p.vectors_config.as_ref())
            .and_then(|v| v.config.as_ref());
        let (vector_dimensions, distance) = match params {
            Some(VectorsConfigKind::Params(p)) => (p.size, p.distance().as_str_name().to_string()),
            Some(VectorsConfigKind::ParamsMap(map)) => map
                .map
                .values()
                .next()
                .map(|p| (p.size, p.distance().as_str_name().to_string()))
                .unwrap_or((0, "Unknown".to_string())),
            None => (0, "Unknown".to_string()),
        };

        Ok(CollectionStats {
            vector_dimensions,
            point_count: info.points_count.unwrap_or(0),
            status: info.status().as_str_name().to_lowercase(),
            distance,
        })
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .list_collections()
            .await
            .map_err(|e| classify_error("", e))?;
        let mut names: Vec<String> = response.collections.into_iter().map(|c| c.name).collect();
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_uuid_ids_pass_through() {
        let id = "550e8400-e29b-41d4-a716-446655440000";
        let (point_id, external) = to_point_id(id);
        assert!(!external);
        assert_eq!(point_id_to_string(Some(point_id)), id);
    }

    #[test]
    fn test_custom_ids_map_deterministically() {
        let (a, external) = to_point_id("fixed-1");
        let (b, _) = to_point_id("fixed-1");
        let (c, _) = to_point_id("fixed-2");
        assert!(external);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_uppercase_uuid_keeps_external_id() {
        let (_, external) = to_point_id("550E8400-E29B-41D4-A716-446655440000");
        assert!(external);
    }

    #[test]
    fn test_decode_point_prefers_external_id() {
        let raw = json!({
            "content": "hello",
            "timestamp": "2025-01-01T00:00:00Z",
            "embedding_model": "m",
            "embedding_provider": "local",
            "external_id": "fixed-1",
            "metadata": {"type": "note"}
        });
        let payload: HashMap<String, QdrantValue> = raw
            .as_object()
            .unwrap()
            .iter()
            .map(|(k, v)| (k.clone(), QdrantValue::from(v.clone())))
            .collect();
        let (id, decoded) = decode_point(Some(to_point_id("fixed-1").0), payload).unwrap();
        assert_eq!(id, "fixed-1");
        assert_eq!(decoded.content, "hello");
        assert_eq!(decoded.metadata.unwrap()["type"], "note");
    }

    #[test]
    fn test_decode_point_rejects_corrupt_payload() {
        let payload: HashMap<String, QdrantValue> = [
            ("content".to_string(), QdrantValue::from(json!(42))),
            ("timestamp".to_string(), QdrantValue::from(json!("2025-01-01T00:00:00Z"))),
        ]
        .into_iter()
        .collect();
        let err = decode_point(Some(to_point_id("fixed-1").0), payload).unwrap_err();
        assert!(matches!(err, BackendError::Storage(ref m) if m.contains("corrupt payload")));
    }

    #[test]
    fn test_encoded_payload_keeps_custom_id() {
        let payload = PointPayload {
            content: "hello".into(),
            timestamp: "2025-01-01T00:00:00Z".into(),
            embedding_model: "m".into(),
            embedding_provider: "local".into(),
            metadata: None,
        };

        let (point_id, encoded) = encode_payload("fixed-1", &payload).unwrap();
        let fields: HashMap<String, QdrantValue> = encoded.into();
        assert!(fields.contains_key(EXTERNAL_ID_KEY));
        let (id, decoded) = decode_point(Some(point_id), fields).unwrap();
        assert_eq!(id, "fixed-1");
        assert_eq!(decoded.content, "hello");

        let uuid = "550e8400-e29b-41d4-a716-446655440000";
        let (_, encoded) = encode_payload(uuid, &payload).unwrap();
        let fields: HashMap<String, QdrantValue> = encoded.into();
        assert!(!fields.contains_key(EXTERNAL_ID_KEY));
    }

    #[test]
    fn test_classify_collection_errors() {
        let err = classify_message(
            "notes",
            "status: AlreadyExists, message: \"Wrong input: Collection `notes` already exists!\"".into(),
        );
        assert!(matches!(err, BackendError::AlreadyExists(ref c) if c == "notes"));

        let err = classify_message(
            "notes",
            "status: NotFound, message: \"Not found: Collection `notes` doesn't exist!\"".into(),
        );
        assert!(matches!(err, BackendError::CollectionNotFound(ref c) if c == "notes"));
    }

    #[test]
    fn test_classify_dimension_errors() {
        let err = classify_message(
            "notes",
            "status: InvalidArgument, message: \"Wrong input: Vector dimension error: expected dim: 384, got 1536\"".into(),
        );
        match err {
            BackendError::DimensionMismatch {
                collection,
                expected,
                actual,
            } => {
                assert_eq!(collection, "notes");
                assert_eq!(expected, 384);
                assert_eq!(actual, 1536);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // Unparseable sizes still count as a bad request.
        let err = classify_message("notes", "Vector dimension error".into());
        assert!(matches!(err, BackendError::InvalidRequest(_)));
    }

    #[test]
    fn test_classify_transport_and_fallback_errors() {
        for message in [
            "status: Unavailable, message: \"error trying to connect\"",
            "transport error",
            "tcp connect error: Connection refused (os error 111)",
            "status: Cancelled, message: \"Timeout expired\", deadline exceeded",
            "operation timed out",
        ] {
            let err = classify_message("notes", message.into());
            assert!(matches!(err, BackendError::Unavailable(_)), "{message}");
        }

        let err = classify_message("notes", "Wrong input: payload key is empty".into());
        assert!(matches!(err, BackendError::InvalidRequest(_)));

        let err = classify_message("notes", "Service internal error: disk full".into());
        assert!(matches!(err, BackendError::Storage(ref m) if m.contains("disk full")));
    }

    #[test]
    fn test_parse_dimension_error() {
        let message = "status: invalidargument, message: \"wrong input: vector dimension error: expected dim: 384, got 1536\"";
        assert_eq!(parse_dimension_error(message), Some((384, 1536)));
        assert_eq!(parse_dimension_error("dimension error"), None);
    }

    #[test]
    fn test_filter_translation_prefixes_metadata() {
        let filter =
            MetadataFilter::from_json(json!({"type": "note", "priority": {"gte": 3}}).as_object().unwrap())
                .unwrap();
        let translated = to_qdrant_filter(&filter);
        assert_eq!(translated.must.len(), 2);
        let rendered = format!("{translated:?}");
        assert!(rendered.contains("metadata.type"));
        assert!(rendered.contains("metadata.priority"));
    }

    #[tokio::test]
    #[ignore] // Requires a running Qdrant on localhost:6334
    async fn test_live_roundtrip() {
        let backend = QdrantBackend::connect("http://localhost:6334", None).unwrap();
        let collection = format!("qdrant_mcp_test_{}", Uuid::new_v4().simple());
        backend
            .create_collection(&collection, 4, Distance::Cosine)
            .await
            .unwrap();

        let payload = PointPayload {
            content: "live".into(),
            timestamp: "2025-01-01T00:00:00Z".into(),
            embedding_model: "m".into(),
            embedding_provider: "test".into(),
            metadata: None,
        };
        backend
            .upsert(
                &collection,
                VectorPoint {
                    id: "fixed-1".into(),
                    vector: vec![1.0, 0.0, 0.0, 0.0],
                    payload,
                },
            )
            .await
            .unwrap();

        let hits = backend
            .search(
                &collection,
                &SearchQuery {
                    vector: vec![1.0, 0.0, 0.0, 0.0],
                    limit: 5,
                    filter: None,
                    score_threshold: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(hits[0].id, "fixed-1");

        let deleted = backend
            .delete(&collection, &["fixed-1".into(), "missing".into()])
            .await
            .unwrap();
        assert_eq!(deleted, 1);

        backend.client.delete_collection(&collection).await.unwrap();
    }
}
