//! Error types for qdrant-mcp.

use thiserror::Error;

use crate::backend::BackendError;
use crate::embedding::ProviderError;

/// Main error type for qdrant-mcp operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Embedding generation failed.
    #[error("Embedding provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The backend rejected collection creation for a reason other than pre-existence.
    #[error("Failed to initialize collection '{collection}': {reason}")]
    CollectionCreation { collection: String, reason: String },

    /// Collection metadata could not be read.
    #[error("Failed to get info for collection '{collection}': {reason}")]
    CollectionInfo { collection: String, reason: String },

    /// Malformed caller input.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Empty or whitespace-only content or query.
    #[error("Input cannot be empty")]
    EmptyInput,

    /// Content or query over the accepted length.
    #[error("Input too long: {actual_length} characters (max {max_length})")]
    InputTooLong {
        max_length: usize,
        actual_length: usize,
    },

    /// Result limit out of range.
    #[error("Invalid limit: {0}")]
    InvalidLimit(String),

    /// Vector database failure on store/find/delete.
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Stable machine-readable code reported alongside tool failures.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Provider(_) => "E_PROVIDER",
            Error::CollectionCreation { .. } => "E_COLLECTION_CREATE",
            Error::CollectionInfo { .. } => "E_COLLECTION_INFO",
            Error::Validation(_)
            | Error::EmptyInput
            | Error::InputTooLong { .. }
            | Error::InvalidLimit(_) => "E_VALIDATION",
            Error::Backend(BackendError::DimensionMismatch { .. }) => "E_DIMENSION_MISMATCH",
            Error::Backend(_) => "E_BACKEND",
            Error::Config(_) => "E_CONFIG",
            Error::Io(_) | Error::Json(_) => "E_INTERNAL",
        }
    }

    /// True for errors caused by the caller's arguments rather than the system.
    pub fn is_validation(&self) -> bool {
        self.code() == "E_VALIDATION"
    }
}
