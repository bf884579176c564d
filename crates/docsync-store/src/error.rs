//! Index store error types.

use thiserror::Error;

/// Errors that can occur in index store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No index (or alias) with that name
    #[error("Index not found: {0}")]
    IndexNotFound(String),

    /// An index with that name already exists
    #[error("Index already exists: {0}")]
    IndexExists(String),

    /// The index is closed and cannot serve reads or writes
    #[error("Index is closed: {0}")]
    IndexClosed(String),

    /// Changing an existing mapping requires a closed index
    #[error("Mapping conflict on {index} for doc type {doc_type}: close the index first")]
    MappingConflict { index: String, doc_type: String },

    /// Field name not usable in a script
    #[error("Invalid field name: {0}")]
    InvalidFieldName(String),

    /// Script could not be applied to a document
    #[error("Script error: {0}")]
    Script(String),

    /// Refresh interval could not be parsed
    #[error("Invalid refresh interval: {0}")]
    InvalidRefreshInterval(String),

    /// Internal state lock was poisoned
    #[error("Store is locked: {0}")]
    Locked(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}
