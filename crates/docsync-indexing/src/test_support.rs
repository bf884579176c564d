//! Fixture indexers and stores shared by the unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};

use docsync_store::{
    BulkOp, BulkResponse, FieldName, IndexInfo, IndexSettings, IndexStore, MemoryIndexStore,
    Query, StoreError, StoredDocument,
};
use docsync_types::{DocId, DocType, Mapping, RawDoc};

use crate::alias::IndexAlias;
use crate::error::IndexingError;
use crate::indexer::{Extracted, FullIndexer, Indexer, PartialIndexer, UpdateKeySet};
use crate::merge::MergeStrategy;

pub(crate) fn store_and_alias(name: &str) -> (Arc<MemoryIndexStore>, Arc<IndexAlias>) {
    let store = Arc::new(MemoryIndexStore::new());
    let alias = Arc::new(IndexAlias::new(name, store.clone()));
    (store, alias)
}

pub(crate) fn rows(ids: &[u64]) -> Vec<RawDoc> {
    ids.iter()
        .map(|id| {
            json!({"id": id, "name": format!("row {id}"), "rank": "Officer"})
                .as_object()
                .cloned()
                .unwrap_or_default()
        })
        .collect()
}

pub(crate) fn row_indexer(alias: &Arc<IndexAlias>, doc_type: &str, records: Vec<RawDoc>) -> RowIndexer {
    RowIndexer {
        alias: Arc::clone(alias),
        doc_type: DocType::new(doc_type),
        records,
        mapping: Mapping::dynamic(),
        fanout: 1,
        failing: false,
        keys: UpdateKeySet::default(),
    }
}

/// Indexer over in-memory rows keyed by their integer `id`.
pub(crate) struct RowIndexer {
    alias: Arc<IndexAlias>,
    doc_type: DocType,
    pub(crate) records: Vec<RawDoc>,
    mapping: Mapping,
    fanout: usize,
    failing: bool,
    keys: UpdateKeySet<u64>,
}

impl RowIndexer {
    /// Emit `n` documents per row, with ids `<id>-<k>`.
    pub(crate) fn with_fanout(mut self, n: usize) -> Self {
        self.fanout = n;
        self
    }

    pub(crate) fn with_mapping(mut self, mapping: Mapping) -> Self {
        self.mapping = mapping;
        self
    }

    pub(crate) fn failing_source(mut self) -> Self {
        self.failing = true;
        self
    }

    pub(crate) fn with_keys(mut self, keys: &[u64]) -> Self {
        self.keys = keys.iter().copied().collect();
        self
    }
}

impl Indexer for RowIndexer {
    type Source = Vec<RawDoc>;

    fn doc_type(&self) -> &DocType {
        &self.doc_type
    }

    fn index_alias(&self) -> &Arc<IndexAlias> {
        &self.alias
    }

    fn mapping(&self) -> Mapping {
        self.mapping.clone()
    }

    fn extract_datum<'a>(&'a self, record: &'a RawDoc) -> Result<Extracted<'a>, IndexingError> {
        if self.fanout == 1 {
            return Ok(Extracted::Single(record.clone()));
        }
        let id = record.get("id").cloned().unwrap_or(Value::Null);
        Ok(Extracted::many((0..self.fanout).map(move |k| {
            let mut doc = record.clone();
            doc.insert("id".to_string(), json!(format!("{id}-{k}")));
            doc
        })))
    }

    fn name(&self) -> &str {
        "RowIndexer"
    }
}

impl FullIndexer for RowIndexer {
    fn get_queryset(&self) -> Result<Vec<RawDoc>, IndexingError> {
        if self.failing {
            return Err(IndexingError::Source("connection refused".to_string()));
        }
        Ok(self.records.clone())
    }
}

impl PartialIndexer for RowIndexer {
    type Key = u64;

    fn update_keys(&self) -> &UpdateKeySet<u64> {
        &self.keys
    }

    fn get_batch_queryset(&self, keys: &[u64]) -> Result<Vec<RawDoc>, IndexingError> {
        Ok(self
            .get_queryset()?
            .into_iter()
            .filter(|record| self.record_key(record).is_some_and(|k| keys.contains(&k)))
            .collect())
    }

    fn get_batch_update_docs_queries(&self, keys: &[u64]) -> Query {
        Query::ids(keys)
    }

    fn record_key(&self, record: &RawDoc) -> Option<u64> {
        record.get("id").and_then(Value::as_u64)
    }
}

pub(crate) fn child_indexer(
    alias: &Arc<IndexAlias>,
    doc_type: &str,
    property: &str,
    children: Vec<(&str, i64)>,
) -> ChildIndexer {
    ChildIndexer {
        alias: Arc::clone(alias),
        doc_type: DocType::new(doc_type),
        property: property.to_string(),
        children: children
            .into_iter()
            .map(|(parent, seq)| (parent.to_string(), seq))
            .collect(),
    }
}

/// Embed indexer appending `{"seq": n}` children to parent documents.
pub(crate) struct ChildIndexer {
    alias: Arc<IndexAlias>,
    doc_type: DocType,
    property: String,
    children: Vec<(String, i64)>,
}

impl Indexer for ChildIndexer {
    type Source = Vec<(String, i64)>;

    fn doc_type(&self) -> &DocType {
        &self.doc_type
    }

    fn index_alias(&self) -> &Arc<IndexAlias> {
        &self.alias
    }

    fn merge_strategy(&self) -> MergeStrategy {
        match FieldName::new(self.property.clone()) {
            Ok(property) => MergeStrategy::Embed { property },
            Err(_) => MergeStrategy::Overwrite,
        }
    }

    fn extract_datum<'a>(
        &'a self,
        record: &'a (String, i64),
    ) -> Result<Extracted<'a>, IndexingError> {
        let (parent, seq) = record;
        Ok(Extracted::Single(
            json!({"id": parent, "seq": seq})
                .as_object()
                .cloned()
                .unwrap_or_default(),
        ))
    }

    fn name(&self) -> &str {
        "ChildIndexer"
    }
}

impl FullIndexer for ChildIndexer {
    fn get_queryset(&self) -> Result<Vec<(String, i64)>, IndexingError> {
        Ok(self.children.clone())
    }
}

/// Memory store that can be told to refuse mapping changes.
#[derive(Default)]
pub(crate) struct RefusingStore {
    inner: MemoryIndexStore,
    refuse: AtomicBool,
}

impl RefusingStore {
    pub(crate) fn refuse_mappings(&self) {
        self.refuse.store(true, Ordering::SeqCst);
    }
}

impl IndexStore for RefusingStore {
    fn create_index(&self, name: &str, settings: &IndexSettings) -> Result<(), StoreError> {
        self.inner.create_index(name, settings)
    }
    fn delete_index(&self, name: &str) -> Result<(), StoreError> {
        self.inner.delete_index(name)
    }
    fn index_exists(&self, name: &str) -> bool {
        self.inner.index_exists(name)
    }
    fn close_index(&self, name: &str) -> Result<(), StoreError> {
        self.inner.close_index(name)
    }
    fn open_index(&self, name: &str) -> Result<(), StoreError> {
        self.inner.open_index(name)
    }
    fn is_open(&self, name: &str) -> Result<bool, StoreError> {
        self.inner.is_open(name)
    }
    fn put_settings(&self, name: &str, settings: &IndexSettings) -> Result<(), StoreError> {
        self.inner.put_settings(name, settings)
    }
    fn get_settings(&self, name: &str) -> Result<IndexSettings, StoreError> {
        self.inner.get_settings(name)
    }
    fn refresh(&self, name: &str) -> Result<(), StoreError> {
        self.inner.refresh(name)
    }
    fn put_mapping(&self, name: &str, doc_type: &DocType, mapping: &Mapping) -> Result<(), StoreError> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(StoreError::MappingConflict {
                index: name.to_string(),
                doc_type: doc_type.to_string(),
            });
        }
        self.inner.put_mapping(name, doc_type, mapping)
    }
    fn has_mapping(&self, name: &str, doc_type: &DocType) -> Result<bool, StoreError> {
        self.inner.has_mapping(name, doc_type)
    }
    fn bulk(&self, ops: Vec<BulkOp>) -> Result<BulkResponse, StoreError> {
        self.inner.bulk(ops)
    }
    fn delete_by_query(&self, name: &str, doc_type: &DocType, query: &Query) -> Result<u64, StoreError> {
        self.inner.delete_by_query(name, doc_type, query)
    }
    fn count(&self, name: &str, doc_type: &DocType, query: &Query) -> Result<u64, StoreError> {
        self.inner.count(name, doc_type, query)
    }
    fn search(
        &self,
        name: &str,
        doc_type: Option<&DocType>,
        query: &Query,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        self.inner.search(name, doc_type, query)
    }
    fn get_document(
        &self,
        name: &str,
        doc_type: &DocType,
        id: &DocId,
    ) -> Result<Option<StoredDocument>, StoreError> {
        self.inner.get_document(name, doc_type, id)
    }
    fn copy_documents(&self, source: &str, dest: &str, doc_types: &[DocType]) -> Result<u64, StoreError> {
        self.inner.copy_documents(source, dest, doc_types)
    }
    fn resolve_alias(&self, alias: &str) -> Result<Option<String>, StoreError> {
        self.inner.resolve_alias(alias)
    }
    fn swap_alias(&self, alias: &str, index: &str) -> Result<Option<String>, StoreError> {
        self.inner.swap_alias(alias, index)
    }
    fn list_indices(&self) -> Result<Vec<IndexInfo>, StoreError> {
        self.inner.list_indices()
    }
}
