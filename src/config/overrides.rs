//! Environment variable overrides for configuration.

use crate::errors::Error;

use super::env_parser::{
    parse_env_enum, parse_env_float, parse_env_path, parse_env_string, parse_env_u64,
};
use super::loader::ConfigFile;

pub const EMBEDDING_PROVIDER: &str = "EMBEDDING_PROVIDER";
pub const EMBEDDING_MODEL: &str = "EMBEDDING_MODEL";
pub const EMBEDDING_DIMENSIONS: &str = "EMBEDDING_DIMENSIONS";
pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const OPENAI_BASE_URL: &str = "OPENAI_BASE_URL";
pub const DEVICE: &str = "DEVICE";
pub const MODEL_CACHE: &str = "MODEL_CACHE";
pub const VECTOR_BACKEND: &str = "VECTOR_BACKEND";
pub const QDRANT_URL: &str = "QDRANT_URL";
pub const QDRANT_API_KEY: &str = "QDRANT_API_KEY";
pub const DATABASE_PATH: &str = "DATABASE_PATH";
pub const DEFAULT_COLLECTION_NAME: &str = "DEFAULT_COLLECTION_NAME";
pub const DEFAULT_LIMIT: &str = "DEFAULT_LIMIT";
pub const SCORE_THRESHOLD: &str = "SCORE_THRESHOLD";

/// Every variable the configuration reads.
pub const ALL_VARS: &[&str] = &[
    EMBEDDING_PROVIDER,
    EMBEDDING_MODEL,
    EMBEDDING_DIMENSIONS,
    OPENAI_API_KEY,
    OPENAI_BASE_URL,
    DEVICE,
    MODEL_CACHE,
    VECTOR_BACKEND,
    QDRANT_URL,
    QDRANT_API_KEY,
    DATABASE_PATH,
    DEFAULT_COLLECTION_NAME,
    DEFAULT_LIMIT,
    SCORE_THRESHOLD,
];

/// Build a configuration layer from the process environment.
pub fn env_layer() -> Result<ConfigFile, Error> {
    env_layer_from(|name| std::env::var(name).ok())
}

/// Build a configuration layer from an arbitrary variable lookup.
pub fn env_layer_from<F>(lookup: F) -> Result<ConfigFile, Error>
where
    F: Fn(&str) -> Option<String>,
{
    let mut layer = ConfigFile::default();
    if let Some(v) = lookup(EMBEDDING_PROVIDER) {
        layer.embedding_provider = Some(parse_env_enum(EMBEDDING_PROVIDER, &v)?);
    }
    if let Some(v) = lookup(EMBEDDING_MODEL) {
        layer.embedding_model = Some(parse_env_string(EMBEDDING_MODEL, &v)?);
    }
    if let Some(v) = lookup(EMBEDDING_DIMENSIONS) {
        layer.embedding_dimensions = Some(parse_env_u64(EMBEDDING_DIMENSIONS, &v)?);
    }
    if let Some(v) = lookup(OPENAI_API_KEY) {
        layer.openai_api_key = Some(parse_env_string(OPENAI_API_KEY, &v)?);
    }
    if let Some(v) = lookup(OPENAI_BASE_URL) {
        layer.openai_base_url = Some(parse_env_string(OPENAI_BASE_URL, &v)?);
    }
    if let Some(v) = lookup(DEVICE) {
        layer.device = Some(parse_env_enum(DEVICE, &v)?);
    }
    if let Some(v) = lookup(MODEL_CACHE) {
        layer.model_cache = Some(parse_env_path(MODEL_CACHE, &v)?);
    }
    if let Some(v) = lookup(VECTOR_BACKEND) {
        layer.backend = Some(parse_env_enum(VECTOR_BACKEND, &v)?);
    }
    if let Some(v) = lookup(QDRANT_URL) {
        layer.qdrant_url = Some(parse_env_string(QDRANT_URL, &v)?);
    }
    if let Some(v) = lookup(QDRANT_API_KEY) {
        layer.qdrant_api_key = Some(parse_env_string(QDRANT_API_KEY, &v)?);
    }
    if let Some(v) = lookup(DATABASE_PATH) {
        layer.database_path = Some(parse_env_path(DATABASE_PATH, &v)?);
    }
    if let Some(v) = lookup(DEFAULT_COLLECTION_NAME) {
        layer.default_collection_name = Some(parse_env_string(DEFAULT_COLLECTION_NAME, &v)?);
    }
    if let Some(v) = lookup(DEFAULT_LIMIT) {
        layer.default_limit = Some(parse_env_u64(DEFAULT_LIMIT, &v)?);
    }
    if let Some(v) = lookup(SCORE_THRESHOLD) {
        layer.score_threshold = Some(parse_env_float(SCORE_THRESHOLD, &v)?);
    }
    Ok(layer)
}
