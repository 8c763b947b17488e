use crate::embedding::EmbeddingError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for SkyWise
#[derive(Error, Debug)]
pub enum SkywiseError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Connection pool errors
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// Persisted data that cannot be interpreted
    #[error("Storage error: {0}")]
    Storage(String),

    /// Embedding provider failures (network, quota, malformed response)
    #[error("Embedding provider error: {0}")]
    Provider(#[from] EmbeddingError),

    /// The embedding index has not been populated yet
    #[error("{0}")]
    ServiceUnavailable(String),

    /// Well-formed query with no eligible courses
    #[error("{0}")]
    NotFound(String),

    /// Query that cannot be answered as asked
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SkywiseError {
    /// Classify the error into the status taxonomy exposed to callers
    pub fn status(&self) -> Status {
        match self {
            SkywiseError::ServiceUnavailable(_) => Status::ServiceUnavailable,
            SkywiseError::NotFound(_) => Status::NotFound,
            SkywiseError::InvalidQuery(_) => Status::BadRequest,
            SkywiseError::Provider(_) => Status::ProviderError,
            SkywiseError::Database(_) | SkywiseError::Pool(_) | SkywiseError::Storage(_) => {
                Status::StorageError
            }
            _ => Status::Internal,
        }
    }

    /// Whether the caller may succeed by retrying the same request later
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SkywiseError::ServiceUnavailable(_) | SkywiseError::Provider(_)
        )
    }
}

/// Abstract outcome of a recommendation request, mapped to a transport by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Ok,
    ServiceUnavailable,
    NotFound,
    BadRequest,
    ProviderError,
    StorageError,
    Internal,
}

impl Status {
    /// HTTP-equivalent status code
    pub fn http_code(self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::ServiceUnavailable => 503,
            Status::NotFound => 404,
            Status::BadRequest => 400,
            Status::ProviderError => 502,
            Status::StorageError | Status::Internal => 500,
        }
    }
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for SkyWise operations
pub type Result<T> = std::result::Result<T, SkywiseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let unavailable = SkywiseError::ServiceUnavailable("indexing".to_string());
        assert_eq!(unavailable.status(), Status::ServiceUnavailable);
        assert_eq!(unavailable.status().http_code(), 503);
        assert!(unavailable.is_retryable());

        let not_found = SkywiseError::NotFound("none".to_string());
        assert_eq!(not_found.status().http_code(), 404);
        assert!(!not_found.is_retryable());

        let provider = SkywiseError::Provider(EmbeddingError::RateLimited {
            retry_after_secs: 5,
        });
        assert_eq!(provider.status(), Status::ProviderError);
        assert!(provider.is_retryable());

        let storage = SkywiseError::Storage("bad blob".to_string());
        assert_eq!(storage.status(), Status::StorageError);
        assert_eq!(Status::Ok.http_code(), 200);
    }

    #[test]
    fn test_user_facing_messages_are_unwrapped() {
        let err = SkywiseError::NotFound("No similar courses found".to_string());
        assert_eq!(err.to_string(), "No similar courses found");
    }
}
