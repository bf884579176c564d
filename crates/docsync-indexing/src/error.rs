//! Error types for the synchronization engine.

use docsync_store::{BulkFailure, StoreError};
use docsync_types::DocType;
use thiserror::Error;

/// Errors that can occur while building or updating an index
#[derive(Error, Debug)]
pub enum IndexingError {
    /// Index store operation failed
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Record enumeration failed; fatal to the affected indexer
    #[error("Source error: {0}")]
    Source(String),

    /// Partial update refused: source rows and index documents disagree
    #[error(
        "Can not update index for {doc_type}: index holds {index_docs} documents \
         but the source has {source_rows} rows"
    )]
    Consistency {
        doc_type: DocType,
        index_docs: u64,
        source_rows: u64,
    },

    /// The store rejected some items of a bulk write
    #[error("Bulk write for {doc_type} rejected {} documents", .failures.len())]
    BulkRejected {
        doc_type: DocType,
        failures: Vec<BulkFailure>,
    },

    /// An extracted document cannot be written
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// The alias does not point at any index yet
    #[error("Alias {0} has no index; run a full rebuild first")]
    AliasNotBuilt(String),

    /// `indexing()` entered twice on the same alias
    #[error("Alias {0} is already being built")]
    AlreadyBuilding(String),

    /// Indexer selection could not be resolved
    #[error("Selection error: {0}")]
    Selection(String),

    /// Conflicting indexer registration
    #[error("Registry error: {0}")]
    Registry(String),

    /// One or more indexers of an alias group failed (continue mode)
    #[error("Alias group {alias} failed: {}", .failures.join("; "))]
    AliasGroup { alias: String, failures: Vec<String> },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding/decoding errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for IndexingError {
    fn from(err: serde_json::Error) -> Self {
        IndexingError::Serialization(err.to_string())
    }
}
