//! In-process index store.
//!
//! Keeps two views per physical index: `docs` (every accepted write) and
//! `visible` (the state as of the last refresh). Reads see `visible`,
//! so with refresh disabled a bulk load stays invisible until the
//! explicit refresh that ends it.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use ulid::Ulid;

use docsync_types::{DocId, DocType, Mapping, RawDoc};

use crate::bulk::{BulkFailure, BulkOp, BulkResponse, UpdateAction};
use crate::error::StoreError;
use crate::query::Query;
use crate::settings::IndexSettings;
use crate::store::{IndexInfo, IndexStore, StoredDocument};

/// Documents of one physical index, keyed by doc type and then id.
///
/// Each doc type has its own id space.
type Documents = BTreeMap<DocType, BTreeMap<DocId, StoredDocument>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PhysicalIndex {
    created_at: DateTime<Utc>,
    open: bool,
    settings: IndexSettings,
    mappings: BTreeMap<DocType, Mapping>,
    docs: Documents,
    visible: Documents,
}

impl PhysicalIndex {
    fn new(settings: IndexSettings) -> Self {
        Self {
            created_at: Utc::now(),
            open: true,
            settings,
            mappings: BTreeMap::new(),
            docs: BTreeMap::new(),
            visible: BTreeMap::new(),
        }
    }

    fn refresh(&mut self) {
        self.visible = self.docs.clone();
    }

    /// Periodic refresh is modelled as a refresh after every write.
    fn after_write(&mut self) {
        if !self.settings.refresh_interval.is_disabled() {
            self.refresh();
        }
    }

    fn stored(&self, doc_type: &DocType, id: &DocId) -> Option<&StoredDocument> {
        self.docs.get(doc_type).and_then(|docs| docs.get(id))
    }

    fn store(&mut self, doc: StoredDocument) {
        self.docs
            .entry(doc.doc_type.clone())
            .or_default()
            .insert(doc.id.clone(), doc);
    }

    fn visible_matching<'a>(
        &'a self,
        doc_type: Option<&'a DocType>,
        query: &'a Query,
    ) -> impl Iterator<Item = &'a StoredDocument> + 'a {
        self.visible
            .iter()
            .filter(move |(dt, _)| doc_type.map_or(true, |wanted| *dt == wanted))
            .flat_map(|(_, docs)| docs.values())
            .filter(move |doc| query.matches(doc))
    }

    /// Reason a document body is refused by the doc type's mapping.
    fn rejection(&self, doc_type: &DocType, source: &RawDoc) -> Option<String> {
        let Some(mapping) = self.mappings.get(doc_type) else {
            return Some(format!("no mapping declared for doc type [{doc_type}]"));
        };
        let undeclared = mapping.undeclared_fields(source.keys());
        if undeclared.is_empty() {
            None
        } else {
            Some(format!(
                "strict mapping for [{doc_type}] does not allow fields {undeclared:?}"
            ))
        }
    }

    fn apply(&mut self, op: BulkOp) -> Result<(), String> {
        let doc_type = op.doc_type().clone();
        match op {
            BulkOp::Index { id, source, .. } => {
                if let Some(reason) = self.rejection(&doc_type, &source) {
                    return Err(reason);
                }
                let id = id.unwrap_or_else(|| DocId::new(Ulid::new().to_string()));
                self.store(StoredDocument {
                    id,
                    doc_type,
                    source,
                });
                Ok(())
            }
            BulkOp::Update { id, action, .. } => match action {
                UpdateAction::Merge { doc } => {
                    let mut merged = match self.stored(&doc_type, &id) {
                        Some(existing) => existing.source.clone(),
                        None => return Err(format!("document_missing: [{id}]")),
                    };
                    merged.extend(doc);
                    if let Some(reason) = self.rejection(&doc_type, &merged) {
                        return Err(reason);
                    }
                    self.store(StoredDocument {
                        id,
                        doc_type,
                        source: merged,
                    });
                    Ok(())
                }
                UpdateAction::Upsert { script, upsert } => {
                    let source = match self.stored(&doc_type, &id) {
                        Some(existing) => {
                            let mut source = existing.source.clone();
                            script.apply(&mut source).map_err(|e| e.to_string())?;
                            source
                        }
                        None => upsert,
                    };
                    if let Some(reason) = self.rejection(&doc_type, &source) {
                        return Err(reason);
                    }
                    self.store(StoredDocument {
                        id,
                        doc_type,
                        source,
                    });
                    Ok(())
                }
            },
            BulkOp::Delete { id, .. } => {
                if let Some(docs) = self.docs.get_mut(&doc_type) {
                    docs.remove(&id);
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreState {
    indices: BTreeMap<String, PhysicalIndex>,
    aliases: BTreeMap<String, String>,
}

impl StoreState {
    /// Physical index name for an index or alias name.
    fn resolve(&self, name: &str) -> Result<String, StoreError> {
        if self.indices.contains_key(name) {
            return Ok(name.to_string());
        }
        self.aliases
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::IndexNotFound(name.to_string()))
    }

    fn index(&self, name: &str) -> Result<&PhysicalIndex, StoreError> {
        let physical = self.resolve(name)?;
        self.indices
            .get(&physical)
            .ok_or(StoreError::IndexNotFound(physical))
    }

    fn index_mut(&mut self, name: &str) -> Result<&mut PhysicalIndex, StoreError> {
        let physical = self.resolve(name)?;
        self.indices
            .get_mut(&physical)
            .ok_or(StoreError::IndexNotFound(physical))
    }

    fn open_index(&self, name: &str) -> Result<&PhysicalIndex, StoreError> {
        let index = self.index(name)?;
        if !index.open {
            return Err(StoreError::IndexClosed(name.to_string()));
        }
        Ok(index)
    }

    fn open_index_mut(&mut self, name: &str) -> Result<&mut PhysicalIndex, StoreError> {
        let index = self.index_mut(name)?;
        if !index.open {
            return Err(StoreError::IndexClosed(name.to_string()));
        }
        Ok(index)
    }
}

/// In-memory [`IndexStore`] with optional JSON snapshot persistence.
#[derive(Debug, Default)]
pub struct MemoryIndexStore {
    state: RwLock<StoreState>,
}

impl MemoryIndexStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a snapshot written by [`save_snapshot`](Self::save_snapshot).
    ///
    /// A missing file yields an empty store.
    pub fn load_snapshot(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            debug!(path = ?path, "No store snapshot, starting empty");
            return Ok(Self::new());
        }
        let bytes = fs::read(path)?;
        let state: StoreState = serde_json::from_slice(&bytes)?;
        info!(
            path = ?path,
            indices = state.indices.len(),
            aliases = state.aliases.len(),
            "Loaded store snapshot"
        );
        Ok(Self {
            state: RwLock::new(state),
        })
    }

    /// Write the whole store to `path` (via a temp file and rename).
    pub fn save_snapshot(&self, path: &Path) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let bytes = {
            let state = self.read()?;
            serde_json::to_vec(&*state)?
        };
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, path)?;
        debug!(path = ?path, "Saved store snapshot");
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, StoreState>, StoreError> {
        self.state
            .read()
            .map_err(|e| StoreError::Locked(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, StoreState>, StoreError> {
        self.state
            .write()
            .map_err(|e| StoreError::Locked(e.to_string()))
    }
}

impl IndexStore for MemoryIndexStore {
    fn create_index(&self, name: &str, settings: &IndexSettings) -> Result<(), StoreError> {
        let mut state = self.write()?;
        if state.indices.contains_key(name) || state.aliases.contains_key(name) {
            return Err(StoreError::IndexExists(name.to_string()));
        }
        state
            .indices
            .insert(name.to_string(), PhysicalIndex::new(settings.clone()));
        debug!(index = name, "Created index");
        Ok(())
    }

    fn delete_index(&self, name: &str) -> Result<(), StoreError> {
        let mut state = self.write()?;
        if state.indices.remove(name).is_none() {
            return Err(StoreError::IndexNotFound(name.to_string()));
        }
        state.aliases.retain(|_, target| target != name);
        debug!(index = name, "Deleted index");
        Ok(())
    }

    fn index_exists(&self, name: &str) -> bool {
        self.read()
            .map(|state| state.indices.contains_key(name))
            .unwrap_or(false)
    }

    fn close_index(&self, name: &str) -> Result<(), StoreError> {
        self.write()?.index_mut(name)?.open = false;
        Ok(())
    }

    fn open_index(&self, name: &str) -> Result<(), StoreError> {
        self.write()?.index_mut(name)?.open = true;
        Ok(())
    }

    fn is_open(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.read()?.index(name)?.open)
    }

    fn put_settings(&self, name: &str, settings: &IndexSettings) -> Result<(), StoreError> {
        self.write()?.index_mut(name)?.settings = settings.clone();
        Ok(())
    }

    fn get_settings(&self, name: &str) -> Result<IndexSettings, StoreError> {
        Ok(self.read()?.index(name)?.settings.clone())
    }

    fn refresh(&self, name: &str) -> Result<(), StoreError> {
        self.write()?.open_index_mut(name)?.refresh();
        Ok(())
    }

    fn put_mapping(
        &self,
        name: &str,
        doc_type: &DocType,
        mapping: &Mapping,
    ) -> Result<(), StoreError> {
        let mut state = self.write()?;
        let index = state.index_mut(name)?;
        match index.mappings.get(doc_type) {
            Some(existing) if existing == mapping => return Ok(()),
            Some(_) if index.open => {
                return Err(StoreError::MappingConflict {
                    index: name.to_string(),
                    doc_type: doc_type.to_string(),
                })
            }
            _ => {}
        }
        index.mappings.insert(doc_type.clone(), mapping.clone());
        debug!(index = name, doc_type = %doc_type, "Put mapping");
        Ok(())
    }

    fn has_mapping(&self, name: &str, doc_type: &DocType) -> Result<bool, StoreError> {
        Ok(self.read()?.index(name)?.mappings.contains_key(doc_type))
    }

    fn bulk(&self, ops: Vec<BulkOp>) -> Result<BulkResponse, StoreError> {
        let mut state = self.write()?;
        let mut response = BulkResponse::default();
        let mut touched = BTreeSet::new();

        for op in ops {
            let physical = match state.resolve(op.index()) {
                Ok(physical) => physical,
                Err(_) => {
                    response
                        .failures
                        .push(BulkFailure::for_op(&op, "index_not_found"));
                    continue;
                }
            };
            let Some(index) = state.indices.get_mut(&physical) else {
                response
                    .failures
                    .push(BulkFailure::for_op(&op, "index_not_found"));
                continue;
            };
            if !index.open {
                response
                    .failures
                    .push(BulkFailure::for_op(&op, "index_closed"));
                continue;
            }
            let failure_template = BulkFailure::for_op(&op, "");
            match index.apply(op) {
                Ok(()) => {
                    response.applied += 1;
                    touched.insert(physical);
                }
                Err(reason) => response.failures.push(BulkFailure {
                    reason,
                    ..failure_template
                }),
            }
        }

        for name in touched {
            if let Some(index) = state.indices.get_mut(&name) {
                index.after_write();
            }
        }

        debug!(
            applied = response.applied,
            failed = response.failures.len(),
            "Bulk request complete"
        );
        Ok(response)
    }

    fn delete_by_query(
        &self,
        name: &str,
        doc_type: &DocType,
        query: &Query,
    ) -> Result<u64, StoreError> {
        let mut state = self.write()?;
        let index = state.open_index_mut(name)?;
        let deleted = match index.docs.get_mut(doc_type) {
            Some(docs) => {
                let before = docs.len();
                docs.retain(|_, doc| !query.matches(doc));
                (before - docs.len()) as u64
            }
            None => 0,
        };
        index.after_write();
        debug!(index = name, doc_type = %doc_type, deleted, "Deleted by query");
        Ok(deleted)
    }

    fn count(&self, name: &str, doc_type: &DocType, query: &Query) -> Result<u64, StoreError> {
        let state = self.read()?;
        let index = state.open_index(name)?;
        Ok(index.visible_matching(Some(doc_type), query).count() as u64)
    }

    fn search(
        &self,
        name: &str,
        doc_type: Option<&DocType>,
        query: &Query,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        let state = self.read()?;
        let index = state.open_index(name)?;
        Ok(index.visible_matching(doc_type, query).cloned().collect())
    }

    fn get_document(
        &self,
        name: &str,
        doc_type: &DocType,
        id: &DocId,
    ) -> Result<Option<StoredDocument>, StoreError> {
        let state = self.read()?;
        let index = state.open_index(name)?;
        Ok(index.stored(doc_type, id).cloned())
    }

    fn copy_documents(
        &self,
        source: &str,
        dest: &str,
        doc_types: &[DocType],
    ) -> Result<u64, StoreError> {
        let mut state = self.write()?;
        let (mappings, docs) = {
            let src = state.open_index(source)?;
            let mappings: Vec<(DocType, Mapping)> = doc_types
                .iter()
                .filter_map(|dt| src.mappings.get(dt).map(|m| (dt.clone(), m.clone())))
                .collect();
            let docs: Vec<StoredDocument> = doc_types
                .iter()
                .filter_map(|dt| src.visible.get(dt))
                .flat_map(|docs| docs.values().cloned())
                .collect();
            (mappings, docs)
        };

        let dst = state.open_index_mut(dest)?;
        for (doc_type, mapping) in mappings {
            dst.mappings.entry(doc_type).or_insert(mapping);
        }
        let copied = docs.len() as u64;
        for doc in docs {
            dst.store(doc);
        }
        dst.after_write();
        debug!(source, dest, copied, "Copied documents");
        Ok(copied)
    }

    fn resolve_alias(&self, alias: &str) -> Result<Option<String>, StoreError> {
        Ok(self.read()?.aliases.get(alias).cloned())
    }

    fn swap_alias(&self, alias: &str, index: &str) -> Result<Option<String>, StoreError> {
        let mut state = self.write()?;
        if state.indices.contains_key(alias) {
            return Err(StoreError::IndexExists(alias.to_string()));
        }
        if !state.indices.contains_key(index) {
            return Err(StoreError::IndexNotFound(index.to_string()));
        }
        let previous = state.aliases.insert(alias.to_string(), index.to_string());
        info!(alias, index, previous = ?previous, "Alias repointed");
        Ok(previous)
    }

    fn list_indices(&self) -> Result<Vec<IndexInfo>, StoreError> {
        let state = self.read()?;
        Ok(state
            .indices
            .iter()
            .map(|(name, index)| {
                let counts = index
                    .visible
                    .iter()
                    .filter(|(_, docs)| !docs.is_empty())
                    .map(|(doc_type, docs)| (doc_type.clone(), docs.len() as u64));
                IndexInfo {
                    name: name.clone(),
                    created_at: index.created_at,
                    open: index.open,
                    settings: index.settings.clone(),
                    aliases: state
                        .aliases
                        .iter()
                        .filter(|(_, target)| *target == name)
                        .map(|(alias, _)| alias.clone())
                        .collect(),
                    doc_counts: counts.collect(),
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{EmbedScript, FieldName};
    use crate::settings::RefreshInterval;
    use docsync_types::FieldType;
    use serde_json::{json, Value};

    fn raw(value: Value) -> RawDoc {
        value.as_object().cloned().unwrap()
    }

    fn officer() -> DocType {
        DocType::new("officer")
    }

    fn store_with_index(name: &str) -> MemoryIndexStore {
        let store = MemoryIndexStore::new();
        store.create_index(name, &IndexSettings::default()).unwrap();
        store.put_mapping(name, &officer(), &Mapping::dynamic()).unwrap();
        store
    }

    fn index_op(index: &str, id: &str, source: Value) -> BulkOp {
        BulkOp::Index {
            index: index.to_string(),
            doc_type: officer(),
            id: Some(DocId::new(id)),
            source: raw(source),
        }
    }

    #[test]
    fn test_bulk_index_and_count() {
        let store = store_with_index("i1");
        let resp = store
            .bulk(vec![
                index_op("i1", "1", json!({"name": "a"})),
                index_op("i1", "2", json!({"name": "b"})),
            ])
            .unwrap();
        assert!(resp.is_ok());
        assert_eq!(resp.applied, 2);
        assert_eq!(store.count("i1", &officer(), &Query::MatchAll).unwrap(), 2);
    }

    #[test]
    fn test_disabled_refresh_hides_writes_until_refresh() {
        let store = store_with_index("i1");
        store
            .put_settings(
                "i1",
                &IndexSettings::with_refresh_interval(RefreshInterval::disabled()),
            )
            .unwrap();
        store
            .bulk(vec![index_op("i1", "1", json!({"name": "a"}))])
            .unwrap();
        assert_eq!(store.count("i1", &officer(), &Query::MatchAll).unwrap(), 0);
        // realtime get still sees it
        assert!(store
            .get_document("i1", &officer(), &DocId::new("1"))
            .unwrap()
            .is_some());

        store.refresh("i1").unwrap();
        assert_eq!(store.count("i1", &officer(), &Query::MatchAll).unwrap(), 1);
    }

    #[test]
    fn test_closed_index_rejects_reads_and_writes() {
        let store = store_with_index("i1");
        store.close_index("i1").unwrap();
        assert!(matches!(
            store.count("i1", &officer(), &Query::MatchAll),
            Err(StoreError::IndexClosed(_))
        ));
        let resp = store
            .bulk(vec![index_op("i1", "1", json!({}))])
            .unwrap();
        assert_eq!(resp.failures.len(), 1);
        assert_eq!(resp.failures[0].reason, "index_closed");
    }

    #[test]
    fn test_strict_mapping_rejects_undeclared_fields() {
        let store = MemoryIndexStore::new();
        store.create_index("i1", &IndexSettings::default()).unwrap();
        let mapping = Mapping::strict().with_field("name", FieldType::Text);
        store.put_mapping("i1", &officer(), &mapping).unwrap();

        let resp = store
            .bulk(vec![
                index_op("i1", "1", json!({"name": "a"})),
                index_op("i1", "2", json!({"name": "b", "rank": "x"})),
            ])
            .unwrap();
        assert_eq!(resp.applied, 1);
        assert_eq!(resp.failures.len(), 1);
        assert_eq!(resp.failures[0].id, Some(DocId::new("2")));
    }

    #[test]
    fn test_missing_mapping_rejects_documents() {
        let store = MemoryIndexStore::new();
        store.create_index("i1", &IndexSettings::default()).unwrap();
        let resp = store
            .bulk(vec![index_op("i1", "1", json!({}))])
            .unwrap();
        assert!(!resp.is_ok());
    }

    #[test]
    fn test_mapping_change_requires_closed_index() {
        let store = store_with_index("i1");
        let strict = Mapping::strict();
        assert!(matches!(
            store.put_mapping("i1", &officer(), &strict),
            Err(StoreError::MappingConflict { .. })
        ));
        store.close_index("i1").unwrap();
        store.put_mapping("i1", &officer(), &strict).unwrap();
        // same mapping is a no-op even when open
        store.open_index("i1").unwrap();
        store.put_mapping("i1", &officer(), &strict).unwrap();
    }

    #[test]
    fn test_upsert_script_then_append() {
        let store = store_with_index("i1");
        let field = FieldName::new("items").unwrap();
        let upsert = |a: i64| {
            let child = raw(json!({"a": a}));
            BulkOp::Update {
                index: "i1".to_string(),
                doc_type: officer(),
                id: DocId::new("P1"),
                action: UpdateAction::Upsert {
                    script: EmbedScript::append_to(field.clone(), child.clone()),
                    upsert: raw(json!({"items": [child]})),
                },
            }
        };
        store.bulk(vec![upsert(1)]).unwrap();
        store.bulk(vec![upsert(2)]).unwrap();
        let doc = store
            .get_document("i1", &officer(), &DocId::new("P1"))
            .unwrap()
            .unwrap();
        assert_eq!(doc.source["items"], json!([{"a": 1}, {"a": 2}]));
    }

    #[test]
    fn test_merge_update_requires_existing_document() {
        let store = store_with_index("i1");
        let merge = BulkOp::Update {
            index: "i1".to_string(),
            doc_type: officer(),
            id: DocId::new("1"),
            action: UpdateAction::Merge {
                doc: raw(json!({"rank": "Sergeant"})),
            },
        };
        let resp = store.bulk(vec![merge.clone()]).unwrap();
        assert!(resp.failures[0].reason.starts_with("document_missing"));

        store
            .bulk(vec![index_op("i1", "1", json!({"name": "a"}))])
            .unwrap();
        assert!(store.bulk(vec![merge]).unwrap().is_ok());
        let doc = store
            .get_document("i1", &officer(), &DocId::new("1"))
            .unwrap()
            .unwrap();
        assert_eq!(doc.source["name"], "a");
        assert_eq!(doc.source["rank"], "Sergeant");
    }

    #[test]
    fn test_generated_ids() {
        let store = store_with_index("i1");
        store
            .bulk(vec![BulkOp::Index {
                index: "i1".to_string(),
                doc_type: officer(),
                id: None,
                source: RawDoc::new(),
            }])
            .unwrap();
        assert_eq!(store.count("i1", &officer(), &Query::MatchAll).unwrap(), 1);
    }

    #[test]
    fn test_delete_by_query_scoped_to_doc_type() {
        let store = store_with_index("i1");
        let other = DocType::new("unit");
        store.put_mapping("i1", &other, &Mapping::dynamic()).unwrap();
        store
            .bulk(vec![
                index_op("i1", "1", json!({})),
                index_op("i1", "2", json!({})),
                BulkOp::Index {
                    index: "i1".to_string(),
                    doc_type: other.clone(),
                    id: Some(DocId::new("u1")),
                    source: RawDoc::new(),
                },
            ])
            .unwrap();
        let deleted = store
            .delete_by_query("i1", &officer(), &Query::MatchAll)
            .unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(store.count("i1", &other, &Query::MatchAll).unwrap(), 1);
    }

    #[test]
    fn test_same_id_in_two_doc_types() {
        let store = store_with_index("i1");
        let award = DocType::new("award");
        store.put_mapping("i1", &award, &Mapping::dynamic()).unwrap();
        let award_op = |id: &str, source: Value| BulkOp::Index {
            index: "i1".to_string(),
            doc_type: award.clone(),
            id: Some(DocId::new(id)),
            source: raw(source),
        };
        store
            .bulk(vec![
                index_op("i1", "1", json!({"name": "a"})),
                award_op("1", json!({"title": "Honorable mention"})),
            ])
            .unwrap();

        assert_eq!(store.count("i1", &officer(), &Query::MatchAll).unwrap(), 1);
        assert_eq!(store.count("i1", &award, &Query::MatchAll).unwrap(), 1);
        let officer_doc = store
            .get_document("i1", &officer(), &DocId::new("1"))
            .unwrap()
            .unwrap();
        assert_eq!(officer_doc.source["name"], "a");

        // delete and copy only touch their own doc type
        store
            .bulk(vec![BulkOp::Delete {
                index: "i1".to_string(),
                doc_type: award.clone(),
                id: DocId::new("1"),
            }])
            .unwrap();
        assert_eq!(store.count("i1", &officer(), &Query::MatchAll).unwrap(), 1);
        assert_eq!(store.count("i1", &award, &Query::MatchAll).unwrap(), 0);

        store.bulk(vec![award_op("1", json!({"title": "Commendation"}))]).unwrap();
        store.create_index("i2", &IndexSettings::default()).unwrap();
        store.put_mapping("i2", &officer(), &Mapping::dynamic()).unwrap();
        store
            .bulk(vec![index_op("i2", "1", json!({"name": "b"}))])
            .unwrap();
        assert_eq!(store.copy_documents("i1", "i2", &[award.clone()]).unwrap(), 1);
        assert_eq!(store.count("i2", &officer(), &Query::MatchAll).unwrap(), 1);
        assert_eq!(store.count("i2", &award, &Query::MatchAll).unwrap(), 1);
        let kept = store
            .get_document("i2", &officer(), &DocId::new("1"))
            .unwrap()
            .unwrap();
        assert_eq!(kept.source["name"], "b");
    }

    #[test]
    fn test_same_id_survives_snapshot() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        let store = store_with_index("i1");
        let award = DocType::new("award");
        store.put_mapping("i1", &award, &Mapping::dynamic()).unwrap();
        store
            .bulk(vec![
                index_op("i1", "1", json!({})),
                BulkOp::Index {
                    index: "i1".to_string(),
                    doc_type: award.clone(),
                    id: Some(DocId::new("1")),
                    source: RawDoc::new(),
                },
            ])
            .unwrap();
        store.save_snapshot(&path).unwrap();

        let loaded = MemoryIndexStore::load_snapshot(&path).unwrap();
        let infos = loaded.list_indices().unwrap();
        assert_eq!(infos[0].doc_counts, vec![(award, 1), (officer(), 1)]);
    }

    #[test]
    fn test_alias_swap_and_resolution() {
        let store = store_with_index("i1");
        store.create_index("i2", &IndexSettings::default()).unwrap();
        store.put_mapping("i2", &officer(), &Mapping::dynamic()).unwrap();
        store
            .bulk(vec![index_op("i1", "1", json!({}))])
            .unwrap();

        assert_eq!(store.swap_alias("officers", "i1").unwrap(), None);
        assert_eq!(store.count("officers", &officer(), &Query::MatchAll).unwrap(), 1);

        assert_eq!(
            store.swap_alias("officers", "i2").unwrap(),
            Some("i1".to_string())
        );
        assert_eq!(store.count("officers", &officer(), &Query::MatchAll).unwrap(), 0);
        assert!(store.swap_alias("officers", "missing").is_err());
    }

    #[test]
    fn test_delete_index_drops_aliases() {
        let store = store_with_index("i1");
        store.swap_alias("officers", "i1").unwrap();
        store.delete_index("i1").unwrap();
        assert_eq!(store.resolve_alias("officers").unwrap(), None);
    }

    #[test]
    fn test_copy_documents_brings_mappings() {
        let store = store_with_index("i1");
        store
            .bulk(vec![index_op("i1", "1", json!({"name": "a"}))])
            .unwrap();
        store.create_index("i2", &IndexSettings::default()).unwrap();
        let copied = store.copy_documents("i1", "i2", &[officer()]).unwrap();
        assert_eq!(copied, 1);
        assert!(store.has_mapping("i2", &officer()).unwrap());
        assert_eq!(store.count("i2", &officer(), &Query::MatchAll).unwrap(), 1);
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("store.json");

        let store = store_with_index("i1");
        store
            .bulk(vec![index_op("i1", "1", json!({"name": "a"}))])
            .unwrap();
        store.swap_alias("officers", "i1").unwrap();
        store.save_snapshot(&path).unwrap();

        let loaded = MemoryIndexStore::load_snapshot(&path).unwrap();
        assert_eq!(loaded.resolve_alias("officers").unwrap(), Some("i1".to_string()));
        assert_eq!(loaded.count("officers", &officer(), &Query::MatchAll).unwrap(), 1);

        let missing = MemoryIndexStore::load_snapshot(&dir.path().join("none.json")).unwrap();
        assert!(missing.list_indices().unwrap().is_empty());
    }

    #[test]
    fn test_list_indices_reports_counts_and_aliases() {
        let store = store_with_index("i1");
        store
            .bulk(vec![index_op("i1", "1", json!({}))])
            .unwrap();
        store.swap_alias("officers", "i1").unwrap();
        let infos = store.list_indices().unwrap();
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].aliases, vec!["officers".to_string()]);
        assert_eq!(infos[0].doc_counts, vec![(officer(), 1)]);
    }
}
