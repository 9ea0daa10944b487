//! Configuration file loading and parsing.

use crate::backend::BackendKind;
use crate::embedding::{Device, ProviderKind};
use crate::errors::Error;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// One configuration layer (TOML file or environment). Unset keys are `None`.
#[derive(Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub embedding_provider: Option<ProviderKind>,
    pub embedding_model: Option<String>,
    pub embedding_dimensions: Option<u64>,
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub device: Option<Device>,
    pub model_cache: Option<PathBuf>,
    pub backend: Option<BackendKind>,
    pub qdrant_url: Option<String>,
    pub qdrant_api_key: Option<String>,
    pub database_path: Option<PathBuf>,
    pub default_collection_name: Option<String>,
    pub default_limit: Option<u64>,
    pub score_threshold: Option<f64>,
}

impl ConfigFile {
    /// Overlay `other` on top of `self`; keys set in `other` win.
    pub fn merge(self, other: ConfigFile) -> ConfigFile {
        ConfigFile {
            embedding_provider: other.embedding_provider.or(self.embedding_provider),
            embedding_model: other.embedding_model.or(self.embedding_model),
            embedding_dimensions: other.embedding_dimensions.or(self.embedding_dimensions),
            openai_api_key: other.openai_api_key.or(self.openai_api_key),
            openai_base_url: other.openai_base_url.or(self.openai_base_url),
            device: other.device.or(self.device),
            model_cache: other.model_cache.or(self.model_cache),
            backend: other.backend.or(self.backend),
            qdrant_url: other.qdrant_url.or(self.qdrant_url),
            qdrant_api_key: other.qdrant_api_key.or(self.qdrant_api_key),
            database_path: other.database_path.or(self.database_path),
            default_collection_name: other.default_collection_name.or(self.default_collection_name),
            default_limit: other.default_limit.or(self.default_limit),
            score_threshold: other.score_threshold.or(self.score_threshold),
        }
    }
}

/// Default location: `~/.config/qdrant-mcp/config.toml` (platform config dir).
pub fn default_config_path() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    let config_dir = dirs::config_dir().unwrap_or_else(|| home.join(".config"));
    config_dir.join("qdrant-mcp/config.toml")
}

/// Load configuration from a TOML file.
///
/// An explicit path must exist; the default path is optional.
pub fn load_from_file(explicit: Option<&Path>) -> Result<Option<ConfigFile>, Error> {
    let config_path = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file {} does not exist",
                    path.display()
                )));
            }
            path.to_path_buf()
        }
        None => {
            let path = default_config_path();
            if !path.exists() {
                return Ok(None);
            }
            path
        }
    };

    let content = std::fs::read_to_string(&config_path).map_err(|e| {
        Error::Config(format!(
            "Failed to read config file {}: {e}",
            config_path.display()
        ))
    })?;

    let config = parse(&content).map_err(|e| {
        Error::Config(format!(
            "Failed to parse config file {}: {e}",
            config_path.display()
        ))
    })?;

    Ok(Some(config))
}

fn parse(content: &str) -> Result<ConfigFile, toml::de::Error> {
    toml::from_str(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_malformed_toml() {
        let content = r#"
This is not valid TOML
 [[unclosed bracket
 "#;
        assert!(parse(content).is_err());
    }

    #[test]
    fn test_empty_config_file() {
        let config = parse("").unwrap();
        assert!(config.embedding_provider.is_none());
        assert!(config.database_path.is_none());
        assert!(config.default_limit.is_none());
    }

    #[test]
    fn test_config_file_partial_toml() {
        let content = r#"
            embedding_provider = "openai"
            backend = "sqlite"
            database_path = "/test/vectors.db"
            default_limit = 25
            device = "cuda"
        "#;

        let config = parse(content).unwrap();
        assert_eq!(config.embedding_provider, Some(ProviderKind::OpenAi));
        assert_eq!(config.backend, Some(BackendKind::Sqlite));
        assert_eq!(config.database_path, Some(PathBuf::from("/test/vectors.db")));
        assert_eq!(config.default_limit, Some(25));
        assert_eq!(config.device, Some(Device::Cuda));
        assert!(config.score_threshold.is_none());
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(parse("similarity_threshold = 0.5").is_err());
        assert!(parse(r#"embedding_provider = "cohere""#).is_err());
    }

    #[test]
    fn test_merge_prefers_later_layer() {
        let base = parse(
            r#"
            default_collection_name = "from_file"
            default_limit = 5
        "#,
        )
        .unwrap();
        let top = ConfigFile {
            default_collection_name: Some("from_env".to_string()),
            ..Default::default()
        };

        let merged = base.merge(top);
        assert_eq!(merged.default_collection_name.as_deref(), Some("from_env"));
        assert_eq!(merged.default_limit, Some(5));
    }

    #[test]
    fn test_explicit_path_must_exist() {
        let result = load_from_file(Some(Path::new("/nonexistent/qdrant-mcp.toml")));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_load_explicit_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "default_collection_name = \"agent_notes\"").unwrap();

        let config = load_from_file(Some(file.path())).unwrap().unwrap();
        assert_eq!(config.default_collection_name.as_deref(), Some("agent_notes"));
    }

    #[test]
    fn test_load_reports_parse_errors_with_path() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "default_limit = \"ten\"").unwrap();

        let err = load_from_file(Some(file.path())).err().unwrap();
        assert!(err.to_string().contains(&file.path().display().to_string()));
    }
}
