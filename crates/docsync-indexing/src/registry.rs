//! Indexer registry.
//!
//! Built once at startup by a discovery pass over [`IndexerModule`]s and
//! read-only afterwards. Maps logical group -> indexers and
//! (alias, doc type) -> owning indexer.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::debug;

use docsync_types::DocType;

use crate::alias::IndexAlias;
use crate::error::IndexingError;
use crate::reindex::Reindex;

/// A source of indexer registrations, typically one per domain area.
pub trait IndexerModule {
    fn register(&self, registry: &mut RegistryBuilder) -> Result<(), IndexingError>;
}

/// An indexer together with the group it was registered under.
pub struct RegisteredIndexer {
    position: usize,
    group: String,
    unit: Box<dyn Reindex>,
}

impl RegisteredIndexer {
    /// Registration order.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn unit(&self) -> &dyn Reindex {
        self.unit.as_ref()
    }

    /// `group.doc_type` label used in logs and selections.
    pub fn label(&self) -> String {
        format!("{}.{}", self.group, self.unit.doc_type())
    }
}

impl std::fmt::Debug for RegisteredIndexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredIndexer")
            .field("group", &self.group)
            .field("name", &self.unit.name())
            .field("doc_type", self.unit.doc_type())
            .finish()
    }
}

/// Mutable registry used during discovery.
#[derive(Default)]
pub struct RegistryBuilder {
    entries: Vec<RegisteredIndexer>,
    aliases: BTreeMap<String, Arc<IndexAlias>>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `unit` under `group`.
    ///
    /// Its owned mapping is declared on the target alias. Two aliases
    /// with the same name, or two owners of one doc type in an alias,
    /// are rejected.
    pub fn register<R: Reindex + 'static>(
        &mut self,
        group: impl Into<String>,
        unit: R,
    ) -> Result<&mut Self, IndexingError> {
        let group = group.into();
        if group.is_empty() || group.contains('.') {
            return Err(IndexingError::Registry(format!("invalid group name '{group}'")));
        }

        let alias = unit.index_alias();
        match self.aliases.get(alias.name()) {
            Some(known) if !Arc::ptr_eq(known, alias) => {
                return Err(IndexingError::Registry(format!(
                    "alias '{}' is registered by two different alias objects",
                    alias.name()
                )));
            }
            Some(_) => {}
            None => {
                self.aliases.insert(alias.name().to_string(), Arc::clone(alias));
            }
        }

        if let Some(mapping) = unit.owned_mapping() {
            if let Some(owner) = self.owner(alias.name(), unit.doc_type()) {
                return Err(IndexingError::Registry(format!(
                    "doc type '{}' of alias '{}' is already owned by {}",
                    unit.doc_type(),
                    alias.name(),
                    owner.unit.name()
                )));
            }
            alias.declare_doc_type(unit.doc_type().clone(), mapping)?;
        }

        debug!(group = %group, indexer = unit.name(), doc_type = %unit.doc_type(), "Registered indexer");
        self.entries.push(RegisteredIndexer {
            position: self.entries.len(),
            group,
            unit: Box::new(unit),
        });
        Ok(self)
    }

    /// Let a module register its indexers.
    pub fn discover(&mut self, module: &dyn IndexerModule) -> Result<&mut Self, IndexingError> {
        module.register(self)?;
        Ok(self)
    }

    pub fn build(self) -> IndexerRegistry {
        IndexerRegistry {
            entries: self.entries,
            aliases: self.aliases,
        }
    }

    fn owner(&self, alias: &str, doc_type: &DocType) -> Option<&RegisteredIndexer> {
        find_owner(&self.entries, alias, doc_type)
    }
}

fn find_owner<'a>(
    entries: &'a [RegisteredIndexer],
    alias: &str,
    doc_type: &DocType,
) -> Option<&'a RegisteredIndexer> {
    entries.iter().find(|entry| {
        entry.unit.index_alias().name() == alias
            && entry.unit.doc_type() == doc_type
            && entry.unit.owned_mapping().is_some()
    })
}

/// Read-only registry of every known indexer.
pub struct IndexerRegistry {
    entries: Vec<RegisteredIndexer>,
    aliases: BTreeMap<String, Arc<IndexAlias>>,
}

impl IndexerRegistry {
    /// Run the discovery pass over `modules` and freeze the result.
    pub fn discover(modules: &[&dyn IndexerModule]) -> Result<Self, IndexingError> {
        let mut builder = RegistryBuilder::new();
        for module in modules {
            builder.discover(*module)?;
        }
        Ok(builder.build())
    }

    /// Every indexer in registration order.
    pub fn all(&self) -> impl Iterator<Item = &RegisteredIndexer> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn groups(&self) -> BTreeSet<&str> {
        self.entries.iter().map(|e| e.group.as_str()).collect()
    }

    pub fn has_group(&self, group: &str) -> bool {
        self.entries.iter().any(|e| e.group == group)
    }

    /// Indexers registered under `group`.
    pub fn group(&self, group: &str) -> Vec<&RegisteredIndexer> {
        self.entries.iter().filter(|e| e.group == group).collect()
    }

    /// Indexers of `group` producing `doc_type`.
    pub fn find(&self, group: &str, doc_type: &str) -> Vec<&RegisteredIndexer> {
        self.entries
            .iter()
            .filter(|e| e.group == group && e.unit.doc_type().as_str() == doc_type)
            .collect()
    }

    /// The indexer owning the mapping of `doc_type` in `alias`.
    pub fn owner_of(&self, alias: &str, doc_type: &DocType) -> Option<&RegisteredIndexer> {
        find_owner(&self.entries, alias, doc_type)
    }

    pub fn aliases(&self) -> impl Iterator<Item = &Arc<IndexAlias>> {
        self.aliases.values()
    }

    pub fn alias(&self, name: &str) -> Option<&Arc<IndexAlias>> {
        self.aliases.get(name)
    }
}
