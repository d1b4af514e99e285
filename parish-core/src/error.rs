//! Error types for the parish ecosystem.

use thiserror::Error;

/// Errors that can occur in parish operations.
#[derive(Error, Debug)]
pub enum ParishError {
    /// The backing store could not be reached or failed mid-operation.
    /// Recoverable: the cache keeps serving last-known data.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Document '{id}' not found in collection '{collection}'")]
    NotFound { collection: String, id: String },

    /// Rejected before any store call; never persisted.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ParishError {
    pub fn not_found(collection: &str, id: &str) -> Self {
        ParishError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }

    /// Whether the failure is transient and a later retry may succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ParishError::StoreUnavailable(_) | ParishError::Io(_))
    }
}

impl From<serde_json::Error> for ParishError {
    fn from(e: serde_json::Error) -> Self {
        ParishError::Serialization(e.to_string())
    }
}

/// Result type alias for parish operations.
pub type ParishResult<T> = Result<T, ParishError>;
