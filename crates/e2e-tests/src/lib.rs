//! End-to-end test infrastructure for docsync.
//!
//! Provides a shared TestHarness with an in-memory "database" of officers,
//! complaint records and their timelines, plus the indexers publishing them
//! into an in-memory index store.
//!
//! Layout of the fixture:
//! - alias `officers`: doc types `officer` (group `officers`) and `accused`
//!   (group `cr`, one document per accused officer of a complaint)
//! - alias `cr`: doc type `cr` (group `cr`), with a `timeline` list embedded
//!   by a second indexer of group `cr`
//! - optionally, doc type `award` (group `awards`) on alias `officers`,
//!   keyed by officer id so its ids overlap the `officer` documents

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use docsync_indexing::{
    Extracted, FullIndexer, FullReindexer, Indexer, IndexAlias, IndexBuildOrchestrator,
    IndexerRegistry, IndexingError, MergeStrategy, PartialIndexer, PartialReindexer, RebuildConfig,
    RebuildSummary, RecordOf, RegistryBuilder, Reindex, ReindexReport, Selection, UpdateKeySet,
};
use docsync_store::{FieldName, IndexStore, MemoryIndexStore, Query};
use docsync_types::{DocType, FieldType, Mapping, RawDoc};

/// A mutable in-memory table standing in for the relational source.
pub struct SourceTable<T> {
    rows: RwLock<Vec<T>>,
}

impl<T: Clone> SourceTable<T> {
    pub fn new(rows: Vec<T>) -> Arc<Self> {
        Arc::new(Self {
            rows: RwLock::new(rows),
        })
    }

    pub fn rows(&self) -> Vec<T> {
        self.rows.read().expect("source table lock").clone()
    }

    pub fn update<F: FnOnce(&mut Vec<T>)>(&self, change: F) {
        change(&mut self.rows.write().expect("source table lock"));
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Officer {
    pub id: u64,
    pub first_name: String,
    pub last_name: String,
    pub rank: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Allegation {
    pub crid: String,
    pub category: String,
    pub accused: Vec<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub crid: String,
    pub seq: u32,
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Award {
    pub officer_id: u64,
    pub title: String,
}

pub fn officer(id: u64, first_name: &str, last_name: &str, rank: &str) -> Officer {
    Officer {
        id,
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        rank: rank.to_string(),
    }
}

pub fn allegation(crid: &str, category: &str, accused: &[u64]) -> Allegation {
    Allegation {
        crid: crid.to_string(),
        category: category.to_string(),
        accused: accused.to_vec(),
    }
}

pub fn event(crid: &str, seq: u32, kind: &str) -> TimelineEvent {
    TimelineEvent {
        crid: crid.to_string(),
        seq,
        kind: kind.to_string(),
    }
}

pub fn award(officer_id: u64, title: &str) -> Award {
    Award {
        officer_id,
        title: title.to_string(),
    }
}

fn raw(value: Value) -> RawDoc {
    value.as_object().cloned().unwrap_or_default()
}

/// Officer profiles, one document per officer; full and partial.
pub struct OfficerIndexer {
    alias: Arc<IndexAlias>,
    doc_type: DocType,
    table: Arc<SourceTable<Officer>>,
    mapping: Mapping,
    keys: UpdateKeySet<u64>,
}

impl OfficerIndexer {
    pub fn new(alias: &Arc<IndexAlias>, table: &Arc<SourceTable<Officer>>) -> Self {
        Self {
            alias: Arc::clone(alias),
            doc_type: DocType::new("officer"),
            table: Arc::clone(table),
            mapping: Mapping::strict()
                .with_field("full_name", FieldType::Text)
                .with_field("rank", FieldType::Keyword),
            keys: UpdateKeySet::default(),
        }
    }

    pub fn with_keys(mut self, keys: &[u64]) -> Self {
        self.keys = UpdateKeySet::new(keys.iter().copied());
        self
    }

    /// Declare `rank` only, so documents carrying `full_name` are rejected.
    pub fn with_narrow_mapping(mut self) -> Self {
        self.mapping = Mapping::strict().with_field("rank", FieldType::Keyword);
        self
    }
}

impl Indexer for OfficerIndexer {
    type Source = Vec<Officer>;

    fn doc_type(&self) -> &DocType {
        &self.doc_type
    }

    fn index_alias(&self) -> &Arc<IndexAlias> {
        &self.alias
    }

    fn mapping(&self) -> Mapping {
        self.mapping.clone()
    }

    fn extract_datum<'a>(&'a self, record: &'a RecordOf<Self>) -> Result<Extracted<'a>, IndexingError> {
        Ok(Extracted::Single(raw(json!({
            "id": record.id,
            "full_name": format!("{} {}", record.first_name, record.last_name),
            "rank": record.rank,
        }))))
    }

    fn name(&self) -> &str {
        "OfficerIndexer"
    }
}

impl FullIndexer for OfficerIndexer {
    fn get_queryset(&self) -> Result<Vec<Officer>, IndexingError> {
        Ok(self.table.rows())
    }
}

impl PartialIndexer for OfficerIndexer {
    type Key = u64;

    fn update_keys(&self) -> &UpdateKeySet<u64> {
        &self.keys
    }

    fn get_batch_queryset(&self, keys: &[u64]) -> Result<Vec<Officer>, IndexingError> {
        Ok(self
            .table
            .rows()
            .into_iter()
            .filter(|o| keys.contains(&o.id))
            .collect())
    }

    fn get_batch_update_docs_queries(&self, keys: &[u64]) -> Query {
        Query::ids(keys)
    }

    fn record_key(&self, record: &Officer) -> Option<u64> {
        Some(record.id)
    }
}

/// Complaint records, one document per allegation.
pub struct CrIndexer {
    alias: Arc<IndexAlias>,
    doc_type: DocType,
    table: Arc<SourceTable<Allegation>>,
}

impl Indexer for CrIndexer {
    type Source = Vec<Allegation>;

    fn doc_type(&self) -> &DocType {
        &self.doc_type
    }

    fn index_alias(&self) -> &Arc<IndexAlias> {
        &self.alias
    }

    fn extract_datum<'a>(&'a self, record: &'a RecordOf<Self>) -> Result<Extracted<'a>, IndexingError> {
        Ok(Extracted::Single(raw(json!({
            "id": record.crid,
            "category": record.category,
            "accused_count": record.accused.len(),
        }))))
    }

    fn name(&self) -> &str {
        "CrIndexer"
    }
}

impl FullIndexer for CrIndexer {
    fn get_queryset(&self) -> Result<Vec<Allegation>, IndexingError> {
        Ok(self.table.rows())
    }
}

/// One document per (allegation, accused officer) pair.
pub struct AccusedIndexer {
    alias: Arc<IndexAlias>,
    doc_type: DocType,
    table: Arc<SourceTable<Allegation>>,
}

impl Indexer for AccusedIndexer {
    type Source = Vec<Allegation>;

    fn doc_type(&self) -> &DocType {
        &self.doc_type
    }

    fn index_alias(&self) -> &Arc<IndexAlias> {
        &self.alias
    }

    fn extract_datum<'a>(&'a self, record: &'a RecordOf<Self>) -> Result<Extracted<'a>, IndexingError> {
        Ok(Extracted::many(record.accused.iter().map(move |officer_id| {
            raw(json!({
                "id": format!("{}-{officer_id}", record.crid),
                "crid": record.crid,
                "officer_id": officer_id,
            }))
        })))
    }

    fn name(&self) -> &str {
        "AccusedIndexer"
    }
}

impl FullIndexer for AccusedIndexer {
    fn get_queryset(&self) -> Result<Vec<Allegation>, IndexingError> {
        Ok(self.table.rows())
    }
}

/// Appends timeline events to their complaint's `timeline` list.
pub struct TimelineIndexer {
    alias: Arc<IndexAlias>,
    doc_type: DocType,
    table: Arc<SourceTable<TimelineEvent>>,
}

impl Indexer for TimelineIndexer {
    type Source = Vec<TimelineEvent>;

    fn doc_type(&self) -> &DocType {
        &self.doc_type
    }

    fn index_alias(&self) -> &Arc<IndexAlias> {
        &self.alias
    }

    fn merge_strategy(&self) -> MergeStrategy {
        MergeStrategy::Embed {
            property: FieldName::new("timeline").expect("valid field name"),
        }
    }

    fn extract_datum<'a>(&'a self, record: &'a RecordOf<Self>) -> Result<Extracted<'a>, IndexingError> {
        Ok(Extracted::Single(raw(json!({
            "id": record.crid,
            "seq": record.seq,
            "kind": record.kind,
        }))))
    }

    fn name(&self) -> &str {
        "TimelineIndexer"
    }
}

impl FullIndexer for TimelineIndexer {
    fn get_queryset(&self) -> Result<Vec<TimelineEvent>, IndexingError> {
        Ok(self.table.rows())
    }
}

/// Latest award of each officer, stored under the officer's id.
pub struct AwardIndexer {
    alias: Arc<IndexAlias>,
    doc_type: DocType,
    table: Arc<SourceTable<Award>>,
}

impl Indexer for AwardIndexer {
    type Source = Vec<Award>;

    fn doc_type(&self) -> &DocType {
        &self.doc_type
    }

    fn index_alias(&self) -> &Arc<IndexAlias> {
        &self.alias
    }

    fn extract_datum<'a>(&'a self, record: &'a RecordOf<Self>) -> Result<Extracted<'a>, IndexingError> {
        Ok(Extracted::Single(raw(json!({
            "id": record.officer_id,
            "title": record.title,
        }))))
    }

    fn name(&self) -> &str {
        "AwardIndexer"
    }
}

impl FullIndexer for AwardIndexer {
    fn get_queryset(&self) -> Result<Vec<Award>, IndexingError> {
        Ok(self.table.rows())
    }
}

/// Shared test harness for E2E tests.
pub struct TestHarness {
    /// Keeps temp dir alive for the lifetime of the harness
    pub _temp_dir: tempfile::TempDir,
    pub snapshot_path: PathBuf,
    pub store: Arc<MemoryIndexStore>,
    pub officers_alias: Arc<IndexAlias>,
    pub cr_alias: Arc<IndexAlias>,
    pub officers: Arc<SourceTable<Officer>>,
    pub allegations: Arc<SourceTable<Allegation>>,
    pub timeline: Arc<SourceTable<TimelineEvent>>,
    pub awards: Arc<SourceTable<Award>>,
    pub config: RebuildConfig,
}

impl TestHarness {
    /// Seeded with 3 officers, 2 complaints (3 accused pairs),
    /// 3 timeline events and an award for each officer.
    pub fn new() -> Self {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let snapshot_path = temp_dir.path().join("index-store.json");
        let store = Arc::new(MemoryIndexStore::new());

        Self {
            _temp_dir: temp_dir,
            snapshot_path,
            officers_alias: Arc::new(IndexAlias::new("officers", store.clone())),
            cr_alias: Arc::new(IndexAlias::new("cr", store.clone())),
            store,
            officers: SourceTable::new(vec![
                officer(1, "Jerome", "Finnigan", "Officer"),
                officer(2, "Ronald", "Watts", "Sergeant"),
                officer(3, "Kallatt", "Mohammed", "Officer"),
            ]),
            allegations: SourceTable::new(vec![
                allegation("C100", "Use of force", &[1, 2]),
                allegation("C200", "Illegal search", &[3]),
            ]),
            timeline: SourceTable::new(vec![
                event("C100", 1, "filed"),
                event("C100", 2, "investigated"),
                event("C200", 1, "filed"),
            ]),
            awards: SourceTable::new(vec![
                award(1, "Honorable mention"),
                award(2, "Department commendation"),
                award(3, "Life saving award"),
            ]),
            config: RebuildConfig::default().with_bulk_chunk_size(2),
        }
    }

    pub fn officer_indexer(&self) -> OfficerIndexer {
        OfficerIndexer::new(&self.officers_alias, &self.officers)
    }

    pub fn cr_indexer(&self) -> CrIndexer {
        CrIndexer {
            alias: Arc::clone(&self.cr_alias),
            doc_type: DocType::new("cr"),
            table: Arc::clone(&self.allegations),
        }
    }

    pub fn accused_indexer(&self) -> AccusedIndexer {
        AccusedIndexer {
            alias: Arc::clone(&self.officers_alias),
            doc_type: DocType::new("accused"),
            table: Arc::clone(&self.allegations),
        }
    }

    pub fn timeline_indexer(&self) -> TimelineIndexer {
        TimelineIndexer {
            alias: Arc::clone(&self.cr_alias),
            doc_type: DocType::new("cr"),
            table: Arc::clone(&self.timeline),
        }
    }

    pub fn award_indexer(&self) -> AwardIndexer {
        AwardIndexer {
            alias: Arc::clone(&self.officers_alias),
            doc_type: DocType::new("award"),
            table: Arc::clone(&self.awards),
        }
    }

    /// Register every fixture indexer, in the order parents before children.
    pub fn registry(&self) -> IndexerRegistry {
        self.registry_with(self.officer_indexer())
    }

    /// Same as [`registry`](Self::registry) with a custom officer indexer.
    pub fn registry_with(&self, officers: OfficerIndexer) -> IndexerRegistry {
        let mut builder = RegistryBuilder::new();
        builder
            .register("officers", FullReindexer::new(officers, self.config.clone()))
            .and_then(|b| b.register("cr", FullReindexer::new(self.cr_indexer(), self.config.clone())))
            .and_then(|b| b.register("cr", FullReindexer::new(self.timeline_indexer(), self.config.clone())))
            .and_then(|b| b.register("cr", FullReindexer::new(self.accused_indexer(), self.config.clone())))
            .expect("Failed to register fixture indexers");
        builder.build()
    }

    /// [`registry`](Self::registry) plus the `awards` group.
    pub fn registry_with_awards(&self) -> IndexerRegistry {
        let mut builder = RegistryBuilder::new();
        builder
            .register("officers", FullReindexer::new(self.officer_indexer(), self.config.clone()))
            .and_then(|b| b.register("cr", FullReindexer::new(self.cr_indexer(), self.config.clone())))
            .and_then(|b| b.register("cr", FullReindexer::new(self.timeline_indexer(), self.config.clone())))
            .and_then(|b| b.register("cr", FullReindexer::new(self.accused_indexer(), self.config.clone())))
            .and_then(|b| b.register("awards", FullReindexer::new(self.award_indexer(), self.config.clone())))
            .expect("Failed to register fixture indexers");
        builder.build()
    }

    /// Rebuild `tokens` (everything when empty) with the harness config.
    pub fn rebuild(&self, registry: &IndexerRegistry, tokens: &[&str]) -> RebuildSummary {
        let selection = Selection::parse(tokens).expect("Invalid selection");
        IndexBuildOrchestrator::new(registry, self.config.clone())
            .rebuild(&selection)
            .expect("Selection did not resolve")
    }

    /// Partial update of the given officer keys, in place.
    pub fn update_officers(&self, keys: &[u64]) -> Result<ReindexReport, IndexingError> {
        PartialReindexer::new(self.officer_indexer().with_keys(keys), self.config.clone()).reindex()
    }

    /// Searchable documents of `doc_type` behind `alias`.
    pub fn count(&self, alias: &str, doc_type: &str) -> u64 {
        self.store
            .count(alias, &DocType::new(doc_type), &Query::MatchAll)
            .expect("count failed")
    }

    /// Source of the searchable document `id` of `doc_type` behind `alias`.
    pub fn doc(&self, alias: &str, doc_type: &str, id: &str) -> Option<RawDoc> {
        self.store
            .search(alias, Some(&DocType::new(doc_type)), &Query::ids([id]))
            .expect("search failed")
            .into_iter()
            .next()
            .map(|doc| doc.source)
    }

    /// Physical index currently behind `alias`.
    pub fn index_behind(&self, alias: &str) -> Option<String> {
        self.store.resolve_alias(alias).expect("resolve failed")
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
