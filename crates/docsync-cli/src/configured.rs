//! Indexers declared in the config file.
//!
//! Each `[[indexers]]` entry reads one JSON-lines file and publishes one
//! record per document. Entries with a `parent_doc_type_property` embed
//! their records into the parent document named by the record's `id`.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;

use docsync_indexing::{
    Extracted, FullIndexer, FullReindexer, Indexer, IndexAlias, IndexerModule, IndexingError,
    JsonLinesSource, MergeStrategy, PartialIndexer, ProgressCallback, RebuildConfig, RecordOf,
    RegistryBuilder, UpdateKeySet,
};
use docsync_store::{IndexSettings, IndexStore, Query};
use docsync_types::{DocId, DocType, IndexerSettings, Mapping, ID_FIELD};

/// Indexer over one JSON-lines file.
pub struct ConfiguredIndexer {
    name: String,
    alias: Arc<IndexAlias>,
    doc_type: DocType,
    source: PathBuf,
    key_field: String,
    mapping: Mapping,
    strategy: MergeStrategy,
    keys: UpdateKeySet<DocId>,
}

impl ConfiguredIndexer {
    pub fn new(settings: &IndexerSettings, alias: Arc<IndexAlias>) -> Result<Self, IndexingError> {
        let strategy =
            MergeStrategy::from_parts(settings.parent_doc_type_property.as_deref(), settings.op_type)?;
        let name = match &settings.parent_doc_type_property {
            Some(property) => format!("{}.{}[{property}]", settings.group, settings.doc_type),
            None => format!("{}.{}", settings.group, settings.doc_type),
        };
        Ok(Self {
            name,
            alias,
            doc_type: settings.doc_type.clone(),
            source: PathBuf::from(&settings.source),
            key_field: settings.key_field.clone(),
            mapping: settings.mapping.clone(),
            strategy,
            keys: UpdateKeySet::default(),
        })
    }

    /// Restrict partial updates to `keys`.
    pub fn with_update_keys<I: IntoIterator<Item = DocId>>(mut self, keys: I) -> Self {
        self.keys = UpdateKeySet::new(keys);
        self
    }
}

impl Indexer for ConfiguredIndexer {
    type Source = JsonLinesSource;

    fn doc_type(&self) -> &DocType {
        &self.doc_type
    }

    fn index_alias(&self) -> &Arc<IndexAlias> {
        &self.alias
    }

    fn mapping(&self) -> Mapping {
        self.mapping.clone()
    }

    fn merge_strategy(&self) -> MergeStrategy {
        self.strategy.clone()
    }

    fn extract_datum<'a>(&'a self, record: &'a RecordOf<Self>) -> Result<Extracted<'a>, IndexingError> {
        Ok(Extracted::Single(record.clone()))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl FullIndexer for ConfiguredIndexer {
    fn get_queryset(&self) -> Result<JsonLinesSource, IndexingError> {
        Ok(JsonLinesSource::new(&self.source))
    }
}

impl PartialIndexer for ConfiguredIndexer {
    type Key = DocId;

    fn update_keys(&self) -> &UpdateKeySet<DocId> {
        &self.keys
    }

    fn get_batch_queryset(&self, keys: &[DocId]) -> Result<JsonLinesSource, IndexingError> {
        Ok(JsonLinesSource::new(&self.source)
            .with_key_filter(&self.key_field, keys.iter().map(|k| k.as_str().to_string())))
    }

    fn get_batch_update_docs_queries(&self, keys: &[DocId]) -> Query {
        if self.key_field == ID_FIELD {
            return Query::ids(keys);
        }
        Query::terms(&self.key_field, keys.iter().flat_map(key_values))
    }

    fn record_key(&self, record: &RecordOf<Self>) -> Option<DocId> {
        record
            .get(&self.key_field)
            .and_then(|value| DocId::from_value(value).ok())
    }
}

/// A key given on the command line is a string; the stored field may
/// hold it as a number.
fn key_values(key: &DocId) -> Vec<Value> {
    let mut values = vec![Value::from(key.as_str())];
    if let Ok(n) = key.as_str().parse::<i64>() {
        values.push(Value::from(n));
    }
    values
}

/// Registers every configured indexer as a full reindexer.
pub struct ConfigModule {
    indexers: Vec<IndexerSettings>,
    aliases: BTreeMap<String, Arc<IndexAlias>>,
    config: RebuildConfig,
    progress: Arc<dyn ProgressCallback>,
}

impl ConfigModule {
    pub fn new(
        indexers: &[IndexerSettings],
        store: Arc<dyn IndexStore>,
        config: RebuildConfig,
        progress: Arc<dyn ProgressCallback>,
    ) -> Self {
        let mut aliases = BTreeMap::new();
        for entry in indexers {
            aliases.entry(entry.alias.clone()).or_insert_with(|| {
                Arc::new(
                    IndexAlias::new(entry.alias.clone(), Arc::clone(&store)).with_settings(
                        IndexSettings::with_refresh_interval(config.refresh_interval.clone()),
                    ),
                )
            });
        }
        Self {
            indexers: indexers.to_vec(),
            aliases,
            config,
            progress,
        }
    }

    /// The non-embed indexer configured for `group.doc_type`.
    pub fn find(&self, group: &str, doc_type: &str) -> Option<&IndexerSettings> {
        self.indexers.iter().find(|entry| {
            entry.group == group
                && entry.doc_type.as_str() == doc_type
                && entry.parent_doc_type_property.is_none()
        })
    }

    pub fn alias(&self, name: &str) -> Result<Arc<IndexAlias>, IndexingError> {
        self.aliases
            .get(name)
            .cloned()
            .ok_or_else(|| IndexingError::Registry(format!("alias '{name}' is not configured")))
    }

    pub fn config(&self) -> &RebuildConfig {
        &self.config
    }

    pub fn progress(&self) -> Arc<dyn ProgressCallback> {
        Arc::clone(&self.progress)
    }
}

impl IndexerModule for ConfigModule {
    fn register(&self, registry: &mut RegistryBuilder) -> Result<(), IndexingError> {
        for entry in &self.indexers {
            let indexer = ConfiguredIndexer::new(entry, self.alias(&entry.alias)?)?;
            registry.register(
                entry.group.clone(),
                FullReindexer::new(indexer, self.config.clone()).with_progress(self.progress()),
            )?;
        }
        Ok(())
    }
}
