//! Configuration validation logic.

use crate::backend::{BackendKind, validate_collection_name};
use crate::embedding::{ProviderKind, resolve_dimensions};
use crate::errors::Error;

use super::Config;

/// Largest accepted `default_limit`.
pub const MAX_DEFAULT_LIMIT: u64 = 10_000;

/// Validates resolved configuration values.
pub struct ConfigValidator<'a> {
    config: &'a Config,
}

impl<'a> ConfigValidator<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Validate all configuration values for correctness and constraints.
    ///
    /// Checks that:
    /// - Embedding model is not empty and its dimensionality is known or configured
    /// - The openai provider has an API key
    /// - Default collection name is a valid collection name
    /// - Default limit is between 1 and 10000
    /// - Score threshold is finite and between -1.0 and 1.0
    /// - The selected backend has a URL or database path
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if any validation check fails.
    pub fn validate(&self) -> Result<(), Error> {
        self.validate_embedding_model()?;
        self.validate_dimensions()?;
        self.validate_api_key()?;
        self.validate_collection_name()?;
        self.validate_default_limit()?;
        self.validate_score_threshold()?;
        self.validate_backend_location()?;
        Ok(())
    }

    fn validate_embedding_model(&self) -> Result<(), Error> {
        if self.config.embedding_model.trim().is_empty() {
            return Err(Error::Config("Embedding model cannot be empty".to_string()));
        }
        Ok(())
    }

    fn validate_dimensions(&self) -> Result<(), Error> {
        if self.config.embedding_dimensions == Some(0) {
            return Err(Error::Config(
                "Embedding dimensions must be greater than 0".to_string(),
            ));
        }
        let config = self.config;
        if resolve_dimensions(
            config.embedding_provider,
            &config.embedding_model,
            config.embedding_dimensions,
        )
        .is_none()
        {
            return Err(Error::Config(format!(
                "Unknown {} model '{}': set embedding_dimensions (EMBEDDING_DIMENSIONS)",
                config.embedding_provider, config.embedding_model
            )));
        }
        Ok(())
    }

    fn validate_api_key(&self) -> Result<(), Error> {
        if self.config.embedding_provider == ProviderKind::OpenAi
            && self.config.openai_api_key.is_none()
        {
            return Err(Error::Config(
                "The openai embedding provider requires OPENAI_API_KEY".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_collection_name(&self) -> Result<(), Error> {
        validate_collection_name(&self.config.default_collection_name)
            .map_err(|e| Error::Config(format!("Invalid default collection name: {e}")))
    }

    fn validate_default_limit(&self) -> Result<(), Error> {
        let limit = self.config.default_limit;
        if limit == 0 || limit > MAX_DEFAULT_LIMIT {
            return Err(Error::Config(format!(
                "Invalid default limit: {limit} (must be between 1 and {MAX_DEFAULT_LIMIT})"
            )));
        }
        Ok(())
    }

    fn validate_score_threshold(&self) -> Result<(), Error> {
        let threshold = self.config.score_threshold;
        if !threshold.is_finite() {
            return Err(Error::Config(
                "Invalid score threshold: NaN and infinity are not allowed".into(),
            ));
        }
        if !(-1.0..=1.0).contains(&threshold) {
            return Err(Error::Config(format!(
                "Invalid score threshold: {threshold} (must be between -1.0 and 1.0)"
            )));
        }
        Ok(())
    }

    fn validate_backend_location(&self) -> Result<(), Error> {
        match self.config.backend {
            BackendKind::Qdrant if self.config.qdrant_url.trim().is_empty() => {
                Err(Error::Config("Qdrant URL cannot be empty".to_string()))
            }
            BackendKind::Sqlite if self.config.database_path.as_os_str().is_empty() => {
                Err(Error::Config("Database path cannot be empty".to_string()))
            }
            _ => Ok(()),
        }
    }
}
