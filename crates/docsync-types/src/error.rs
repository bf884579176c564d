//! Error types shared by the docsync crates.

use thiserror::Error;

/// Errors raised while loading configuration or interpreting raw documents.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid input error
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
