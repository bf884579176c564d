//! The index store contract consumed by the synchronization engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use docsync_types::{DocId, DocType, Mapping, RawDoc};

use crate::bulk::{BulkOp, BulkResponse};
use crate::error::StoreError;
use crate::query::Query;
use crate::settings::IndexSettings;

/// A document as held by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: DocId,
    pub doc_type: DocType,
    pub source: RawDoc,
}

/// Summary of a physical index, for status reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub open: bool,
    pub settings: IndexSettings,
    /// Aliases currently pointing at this index
    pub aliases: Vec<String>,
    /// Searchable document count per doc type
    pub doc_counts: Vec<(DocType, u64)>,
}

/// Operations the engine needs from a document search engine.
///
/// Read operations (`count`, `search`) see only refreshed documents and
/// accept either a physical index name or an alias. Write operations
/// address physical indices.
pub trait IndexStore: Send + Sync {
    /// Create an empty, open physical index.
    fn create_index(&self, name: &str, settings: &IndexSettings) -> Result<(), StoreError>;

    /// Drop a physical index and all its documents.
    fn delete_index(&self, name: &str) -> Result<(), StoreError>;

    fn index_exists(&self, name: &str) -> bool;

    fn close_index(&self, name: &str) -> Result<(), StoreError>;

    fn open_index(&self, name: &str) -> Result<(), StoreError>;

    fn is_open(&self, name: &str) -> Result<bool, StoreError>;

    fn put_settings(&self, name: &str, settings: &IndexSettings) -> Result<(), StoreError>;

    fn get_settings(&self, name: &str) -> Result<IndexSettings, StoreError>;

    /// Make every write so far visible to reads.
    fn refresh(&self, name: &str) -> Result<(), StoreError>;

    /// Declare the mapping of a doc type.
    ///
    /// Replacing a different existing mapping requires the index to be closed.
    fn put_mapping(&self, name: &str, doc_type: &DocType, mapping: &Mapping)
        -> Result<(), StoreError>;

    fn has_mapping(&self, name: &str, doc_type: &DocType) -> Result<bool, StoreError>;

    /// Execute a batch of operations; per-item rejections are reported in
    /// the response rather than as an error.
    fn bulk(&self, ops: Vec<BulkOp>) -> Result<BulkResponse, StoreError>;

    /// Delete every document of `doc_type` matching `query`; returns the count.
    fn delete_by_query(
        &self,
        name: &str,
        doc_type: &DocType,
        query: &Query,
    ) -> Result<u64, StoreError>;

    fn count(&self, name: &str, doc_type: &DocType, query: &Query) -> Result<u64, StoreError>;

    fn search(
        &self,
        name: &str,
        doc_type: Option<&DocType>,
        query: &Query,
    ) -> Result<Vec<StoredDocument>, StoreError>;

    /// Realtime get by doc type and id (sees unrefreshed writes).
    fn get_document(
        &self,
        name: &str,
        doc_type: &DocType,
        id: &DocId,
    ) -> Result<Option<StoredDocument>, StoreError>;

    /// Copy the documents (and mappings) of `doc_types` from `source` into
    /// `dest`, overwriting documents of the same doc type and id; returns
    /// the number of copied documents.
    fn copy_documents(
        &self,
        source: &str,
        dest: &str,
        doc_types: &[DocType],
    ) -> Result<u64, StoreError>;

    /// Physical index an alias points at.
    fn resolve_alias(&self, alias: &str) -> Result<Option<String>, StoreError>;

    /// Atomically point `alias` at `index`; returns the previous target.
    fn swap_alias(&self, alias: &str, index: &str) -> Result<Option<String>, StoreError>;

    fn list_indices(&self) -> Result<Vec<IndexInfo>, StoreError>;
}
