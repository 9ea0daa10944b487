//! Tool surface: argument parsing and response formatting over [`MemoryStore`].
//!
//! Each tool accepts loosely typed JSON arguments as sent by an agent,
//! validates them, calls exactly one memory store operation and renders the
//! outcome. Nothing here talks to the backend or the embedding provider.

use std::sync::Arc;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;

use crate::backend::MetadataFilter;
use crate::errors::Error;
use crate::memory::{FindOptions, MemoryStore};
use crate::types::{CollectionInfo, DeleteSummary, Metadata, SearchResult, StoreReceipt};

pub const TOOL_STORE: &str = "qdrant_store";
pub const TOOL_FIND: &str = "qdrant_find";
pub const TOOL_DELETE: &str = "qdrant_delete";
pub const TOOL_LIST_COLLECTIONS: &str = "qdrant_list_collections";
pub const TOOL_COLLECTION_INFO: &str = "qdrant_collection_info";

pub const TOOL_NAMES: [&str; 5] = [
    TOOL_STORE,
    TOOL_FIND,
    TOOL_DELETE,
    TOOL_LIST_COLLECTIONS,
    TOOL_COLLECTION_INFO,
];

/// Arguments of `qdrant_store`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreArgs {
    pub content: String,
    /// JSON object, or a string holding one.
    #[serde(default)]
    pub metadata: Option<Value>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub collection_name: Option<String>,
}

/// Arguments of `qdrant_find`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FindArgs {
    pub query: String,
    #[serde(default)]
    pub limit: Option<u64>,
    /// JSON object, or a string holding one.
    #[serde(default)]
    pub filter: Option<Value>,
    #[serde(default)]
    pub score_threshold: Option<f32>,
    #[serde(default)]
    pub collection_name: Option<String>,
}

/// Arguments of `qdrant_delete`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeleteArgs {
    /// Comma separated ids. A JSON array of strings is accepted too.
    pub ids: Value,
    #[serde(default)]
    pub collection_name: Option<String>,
}

/// Arguments of `qdrant_collection_info`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollectionArgs {
    #[serde(default)]
    pub collection_name: Option<String>,
}

/// Tool dispatch over a shared memory store.
#[derive(Clone)]
pub struct ToolSurface {
    store: Arc<MemoryStore>,
}

impl ToolSurface {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }

    pub fn is_known(name: &str) -> bool {
        TOOL_NAMES.contains(&name)
    }

    /// Collection a request naming `collection` would act on.
    pub fn resolve_collection(&self, collection: Option<&str>) -> String {
        self.store.resolve_target(collection)
    }

    /// Run a tool by name and render its response text.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` for an unknown tool or malformed
    /// arguments, and whatever the memory store reports otherwise.
    pub async fn call(&self, name: &str, arguments: Value) -> Result<String, Error> {
        debug!(tool = name, "Calling tool");
        match name {
            TOOL_STORE => {
                let receipt = self.store(parse_arguments(arguments)?).await?;
                Ok(format_store_receipt(&receipt))
            }
            TOOL_FIND => {
                let results = self.find(parse_arguments(arguments)?).await?;
                to_pretty_json(&results)
            }
            TOOL_DELETE => {
                let summary = self.delete(parse_arguments(arguments)?).await?;
                to_pretty_json(&summary)
            }
            TOOL_LIST_COLLECTIONS => {
                let names = self.list_collections().await?;
                to_pretty_json(&names)
            }
            TOOL_COLLECTION_INFO => {
                let info = self.collection_info(parse_arguments(arguments)?).await?;
                to_pretty_json(&info)
            }
            other => Err(Error::Validation(format!("Unknown tool: {other}"))),
        }
    }

    pub async fn store(&self, args: StoreArgs) -> Result<StoreReceipt, Error> {
        let metadata = parse_mapping("metadata", args.metadata)?;
        self.store
            .store(
                &args.content,
                metadata,
                args.id.as_deref(),
                args.collection_name.as_deref(),
            )
            .await
    }

    pub async fn find(&self, args: FindArgs) -> Result<Vec<SearchResult>, Error> {
        let filter = match parse_mapping("filter", args.filter)? {
            Some(map) => Some(MetadataFilter::from_json(&map).map_err(Error::Validation)?),
            None => None,
        };
        let options = FindOptions {
            limit: args.limit,
            filter,
            score_threshold: args.score_threshold,
            collection: args.collection_name,
        };
        self.store.find(&args.query, options).await
    }

    pub async fn delete(&self, args: DeleteArgs) -> Result<DeleteSummary, Error> {
        let ids = parse_ids(&args.ids)?;
        self.store
            .delete(&ids, args.collection_name.as_deref())
            .await
    }

    pub async fn list_collections(&self) -> Result<Vec<String>, Error> {
        self.store.list_collections().await
    }

    pub async fn collection_info(&self, args: CollectionArgs) -> Result<CollectionInfo, Error> {
        self.store
            .collection_info(args.collection_name.as_deref())
            .await
    }
}

pub fn format_store_receipt(receipt: &StoreReceipt) -> String {
    format!(
        "Stored successfully in collection '{}' with ID: {}",
        receipt.collection, receipt.id
    )
}

fn to_pretty_json<T: serde::Serialize>(value: &T) -> Result<String, Error> {
    Ok(serde_json::to_string_pretty(value)?)
}

fn parse_arguments<T: DeserializeOwned>(arguments: Value) -> Result<T, Error> {
    match arguments {
        Value::Null => serde_json::from_value(json!({})).map_err(invalid_arguments),
        other => serde_json::from_value(other).map_err(invalid_arguments),
    }
}

fn invalid_arguments(e: serde_json::Error) -> Error {
    Error::Validation(format!("Invalid arguments: {e}"))
}

/// Accept a mapping given inline or as serialized JSON text.
///
/// Absent, null and blank-string values mean "no mapping".
pub fn parse_mapping(field: &str, value: Option<Value>) -> Result<Option<Metadata>, Error> {
    let parsed = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(text)) => {
            if text.trim().is_empty() {
                return Ok(None);
            }
            serde_json::from_str::<Value>(&text)
                .map_err(|e| Error::Validation(format!("Invalid JSON in {field}: {e}")))?
        }
        Some(other) => other,
    };

    match parsed {
        Value::Object(map) => Ok(Some(map)),
        other => Err(Error::Validation(format!(
            "{field} must be a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

/// Split a comma separated id list, trimming blanks away.
pub fn parse_ids(value: &Value) -> Result<Vec<String>, Error> {
    let ids: Vec<String> = match value {
        Value::String(list) => list
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect(),
        Value::Array(items) => {
            let mut ids = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(id) if !id.trim().is_empty() => ids.push(id.trim().to_string()),
                    Value::String(_) => {}
                    other => {
                        return Err(Error::Validation(format!(
                            "ids must be strings, got {}",
                            json_kind(other)
                        )));
                    }
                }
            }
            ids
        }
        other => {
            return Err(Error::Validation(format!(
                "ids must be a comma separated string, got {}",
                json_kind(other)
            )));
        }
    };

    if ids.is_empty() {
        return Err(Error::Validation("No IDs provided".to_string()));
    }
    Ok(ids)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// MCP tool definitions with their JSON input schemas.
pub fn tool_definitions() -> Vec<Value> {
    let collection_name = json!({
        "type": "string",
        "description": "Collection to use; the configured default when omitted"
    });

    vec![
        json!({
            "name": TOOL_STORE,
            "description": "Store information in Qdrant with semantic embeddings.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "content": {"type": "string", "description": "The text content to store"},
                    "metadata": {
                        "type": ["object", "string"],
                        "description": "Optional metadata as a JSON object or JSON string"
                    },
                    "id": {"type": "string", "description": "Optional ID; generated when omitted"},
                    "collection_name": collection_name.clone()
                },
                "required": ["content"]
            }
        }),
        json!({
            "name": TOOL_FIND,
            "description": "Find relevant information using semantic search.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Search query text"},
                    "limit": {"type": "integer", "minimum": 0, "description": "Maximum number of results"},
                    "filter": {
                        "type": ["object", "string"],
                        "description": "Metadata conditions as a JSON object or JSON string"
                    },
                    "score_threshold": {"type": "number", "description": "Minimum similarity score"},
                    "collection_name": collection_name.clone()
                },
                "required": ["query"]
            }
        }),
        json!({
            "name": TOOL_DELETE,
            "description": "Delete items from Qdrant by their IDs.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "ids": {"type": "string", "description": "Comma-separated list of IDs to delete"},
                    "collection_name": collection_name.clone()
                },
                "required": ["ids"]
            }
        }),
        json!({
            "name": TOOL_LIST_COLLECTIONS,
            "description": "List all collections in the Qdrant database.",
            "inputSchema": {"type": "object", "properties": {}}
        }),
        json!({
            "name": TOOL_COLLECTION_INFO,
            "description": "Get information about a collection.",
            "inputSchema": {
                "type": "object",
                "properties": {"collection_name": collection_name}
            }
        }),
    ]
}
