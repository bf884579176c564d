//! Logical index aliases and blue-green rebuild scopes.
//!
//! An [`IndexAlias`] maps a stable logical name to the physical index that
//! serves reads. A full rebuild happens inside [`IndexAlias::indexing`]:
//! a fresh physical index is created, populated, and only swapped in when
//! the whole scope succeeds. Outside a scope the write index *is* the read
//! index, which is how partial updates mutate the live index in place.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info, warn};
use ulid::Ulid;

use docsync_store::{IndexSettings, IndexStore, RefreshInterval, StoreError};
use docsync_types::{DocType, Mapping};

use crate::error::IndexingError;

/// Lifecycle phase of an alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AliasPhase {
    /// The read index serves queries; no build in progress.
    Idle,
    /// A write index is being populated.
    Building,
    /// The last build failed; its write index is kept for inspection.
    BuildFailed,
}

#[derive(Debug)]
struct AliasState {
    phase: AliasPhase,
    write_index: Option<String>,
    failed_index: Option<String>,
    builds_started: u64,
}

/// A logical index name with read and write pointers.
pub struct IndexAlias {
    name: String,
    store: Arc<dyn IndexStore>,
    settings: IndexSettings,
    state: RwLock<AliasState>,
    doc_types: RwLock<BTreeMap<DocType, Mapping>>,
}

impl std::fmt::Debug for IndexAlias {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexAlias")
            .field("name", &self.name)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl IndexAlias {
    pub fn new(name: impl Into<String>, store: Arc<dyn IndexStore>) -> Self {
        Self {
            name: name.into(),
            store,
            settings: IndexSettings::default(),
            state: RwLock::new(AliasState {
                phase: AliasPhase::Idle,
                write_index: None,
                failed_index: None,
                builds_started: 0,
            }),
            doc_types: RwLock::new(BTreeMap::new()),
        }
    }

    /// Settings applied to physical indices created by [`indexing`](Self::indexing).
    pub fn with_settings(mut self, settings: IndexSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn store(&self) -> &Arc<dyn IndexStore> {
        &self.store
    }

    /// Refresh interval the alias's indices run with outside bulk loads.
    pub fn refresh_interval(&self) -> &RefreshInterval {
        &self.settings.refresh_interval
    }

    pub fn phase(&self) -> Result<AliasPhase, IndexingError> {
        Ok(self.read_state()?.phase)
    }

    /// Write index left behind by the last failed build.
    pub fn failed_index(&self) -> Result<Option<String>, IndexingError> {
        Ok(self.read_state()?.failed_index.clone())
    }

    /// Number of `indexing()` scopes entered on this alias.
    pub fn builds_started(&self) -> Result<u64, IndexingError> {
        Ok(self.read_state()?.builds_started)
    }

    /// Physical index currently serving reads.
    pub fn read_index_name(&self) -> Result<Option<String>, IndexingError> {
        Ok(self.store.resolve_alias(&self.name)?)
    }

    /// Physical index receiving writes: the index under construction while
    /// building, otherwise the read index.
    pub fn write_index_name(&self) -> Result<String, IndexingError> {
        if let Some(index) = self.read_state()?.write_index.clone() {
            return Ok(index);
        }
        self.read_index_name()?
            .ok_or_else(|| IndexingError::AliasNotBuilt(self.name.clone()))
    }

    pub fn write_index(&self) -> Result<IndexHandle, IndexingError> {
        Ok(IndexHandle {
            store: Arc::clone(&self.store),
            name: self.write_index_name()?,
        })
    }

    pub fn is_building(&self) -> Result<bool, IndexingError> {
        Ok(self.phase()? == AliasPhase::Building)
    }

    /// Declare that `doc_type` lives in this alias with `mapping`.
    pub fn declare_doc_type(&self, doc_type: DocType, mapping: Mapping) -> Result<(), IndexingError> {
        self.doc_types
            .write()
            .map_err(|e| IndexingError::Registry(e.to_string()))?
            .insert(doc_type, mapping);
        Ok(())
    }

    /// Every doc type declared on this alias, with its mapping.
    pub fn declared_doc_types(&self) -> Result<Vec<(DocType, Mapping)>, IndexingError> {
        Ok(self
            .doc_types
            .read()
            .map_err(|e| IndexingError::Registry(e.to_string()))?
            .iter()
            .map(|(dt, m)| (dt.clone(), m.clone()))
            .collect())
    }

    /// Run `build` against a fresh write index and swap it in on success.
    ///
    /// On error (or panic) the read pointer is left untouched and the
    /// write index is retained; the alias moves to [`AliasPhase::BuildFailed`].
    pub fn indexing<T, F>(&self, build: F) -> Result<T, IndexingError>
    where
        F: FnOnce() -> Result<T, IndexingError>,
    {
        let index = self.begin_build()?;
        let guard = BuildGuard {
            alias: self,
            index: index.clone(),
            armed: true,
        };

        let value = build()?;
        self.commit(&index)?;
        guard.disarm();
        Ok(value)
    }

    /// Bring `doc_types` from the read index into the write index.
    ///
    /// While idle the write index is the read index and nothing moves.
    /// While building, the named doc types are copied so they survive the
    /// swap. Returns the number of copied documents.
    pub fn migrate(&self, doc_types: &[DocType]) -> Result<u64, IndexingError> {
        let Some(write) = self.read_state()?.write_index.clone() else {
            debug!(alias = %self.name, "Migrate while idle: writing in place");
            return Ok(0);
        };
        if doc_types.is_empty() {
            return Ok(0);
        }
        let Some(read) = self.read_index_name()? else {
            debug!(alias = %self.name, "Migrate on first build: nothing to copy");
            return Ok(0);
        };

        self.store.open_index(&write)?;
        let copied = self.store.copy_documents(&read, &write, doc_types)?;
        info!(
            alias = %self.name,
            from = %read,
            to = %write,
            doc_types = ?doc_types,
            copied,
            "Migrated documents into write index"
        );
        Ok(copied)
    }

    fn begin_build(&self) -> Result<String, IndexingError> {
        let mut state = self.write_state()?;
        if state.phase == AliasPhase::Building {
            return Err(IndexingError::AlreadyBuilding(self.name.clone()));
        }

        if let Some(stale) = state.failed_index.take() {
            if self.store.index_exists(&stale) {
                info!(alias = %self.name, index = %stale, "Dropping index of failed build");
                self.store.delete_index(&stale)?;
            }
        }
        self.drop_orphaned_indices()?;

        let index = format!("{}_{}", self.name, Ulid::new().to_string().to_lowercase());
        self.store.create_index(&index, &self.settings)?;
        state.phase = AliasPhase::Building;
        state.write_index = Some(index.clone());
        state.builds_started += 1;
        info!(alias = %self.name, index = %index, "Started index build");
        Ok(index)
    }

    /// Delete build indices of this alias that no alias points to.
    ///
    /// Failed builds of earlier processes are only known through the store,
    /// so they are found by name: `<alias>_<ulid>`.
    fn drop_orphaned_indices(&self) -> Result<(), IndexingError> {
        let prefix = format!("{}_", self.name);
        for info in self.store.list_indices()? {
            let is_build_index = info
                .name
                .strip_prefix(&prefix)
                .is_some_and(|suffix| Ulid::from_string(&suffix.to_uppercase()).is_ok());
            if is_build_index && info.aliases.is_empty() {
                info!(alias = %self.name, index = %info.name, "Dropping orphaned build index");
                self.store.delete_index(&info.name)?;
            }
        }
        Ok(())
    }

    fn commit(&self, index: &str) -> Result<(), IndexingError> {
        self.store.open_index(index)?;
        self.store.refresh(index)?;
        let previous = self.store.swap_alias(&self.name, index)?;

        {
            let mut state = self.write_state()?;
            state.phase = AliasPhase::Idle;
            state.write_index = None;
        }

        if let Some(previous) = previous.filter(|p| p != index) {
            if let Err(e) = self.store.delete_index(&previous) {
                warn!(alias = %self.name, index = %previous, error = %e, "Failed to drop previous index");
            }
        }
        info!(alias = %self.name, index = %index, "Alias swapped to new index");
        Ok(())
    }

    fn mark_failed(&self, index: &str) {
        match self.state.write() {
            Ok(mut state) => {
                state.phase = AliasPhase::BuildFailed;
                state.write_index = None;
                state.failed_index = Some(index.to_string());
            }
            Err(e) => warn!(alias = %self.name, error = %e, "Alias state lock poisoned"),
        }
        warn!(
            alias = %self.name,
            index = %index,
            "Index build failed; read index untouched, write index kept for inspection"
        );
    }

    fn read_state(&self) -> Result<RwLockReadGuard<'_, AliasState>, IndexingError> {
        self.state
            .read()
            .map_err(|e| IndexingError::Store(StoreError::Locked(e.to_string())))
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, AliasState>, IndexingError> {
        self.state
            .write()
            .map_err(|e| IndexingError::Store(StoreError::Locked(e.to_string())))
    }
}

/// Marks the build failed unless disarmed after a successful swap.
struct BuildGuard<'a> {
    alias: &'a IndexAlias,
    index: String,
    armed: bool,
}

impl BuildGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for BuildGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.alias.mark_failed(&self.index);
        }
    }
}

/// A physical index addressed by name.
#[derive(Clone)]
pub struct IndexHandle {
    store: Arc<dyn IndexStore>,
    name: String,
}

impl IndexHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn store(&self) -> &Arc<dyn IndexStore> {
        &self.store
    }

    pub fn open(&self) -> Result<(), IndexingError> {
        Ok(self.store.open_index(&self.name)?)
    }

    pub fn close(&self) -> Result<(), IndexingError> {
        Ok(self.store.close_index(&self.name)?)
    }

    pub fn refresh(&self) -> Result<(), IndexingError> {
        Ok(self.store.refresh(&self.name)?)
    }

    pub fn set_refresh_interval(&self, interval: RefreshInterval) -> Result<(), IndexingError> {
        let mut settings = self.store.get_settings(&self.name)?;
        settings.refresh_interval = interval;
        Ok(self.store.put_settings(&self.name, &settings)?)
    }

    pub fn has_mapping(&self, doc_type: &DocType) -> Result<bool, IndexingError> {
        Ok(self.store.has_mapping(&self.name, doc_type)?)
    }

    pub fn put_mapping(&self, doc_type: &DocType, mapping: &Mapping) -> Result<(), IndexingError> {
        Ok(self.store.put_mapping(&self.name, doc_type, mapping)?)
    }

    /// Disable periodic refresh until the returned guard is restored or dropped.
    pub fn suspend_refresh(&self, restore: RefreshInterval) -> Result<RefreshSuspension<'_>, IndexingError> {
        self.set_refresh_interval(RefreshInterval::disabled())?;
        Ok(RefreshSuspension {
            handle: self,
            restore: Some(restore),
        })
    }
}

/// Refresh-disabled window of a bulk load.
pub struct RefreshSuspension<'a> {
    handle: &'a IndexHandle,
    restore: Option<RefreshInterval>,
}

impl RefreshSuspension<'_> {
    /// Restore the refresh interval, reporting failures.
    pub fn restore(mut self) -> Result<(), IndexingError> {
        match self.restore.take() {
            Some(interval) => self.handle.set_refresh_interval(interval),
            None => Ok(()),
        }
    }
}

impl Drop for RefreshSuspension<'_> {
    fn drop(&mut self) {
        if let Some(interval) = self.restore.take() {
            if let Err(e) = self.handle.set_refresh_interval(interval) {
                warn!(index = %self.handle.name, error = %e, "Failed to restore refresh interval");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsync_store::{BulkOp, MemoryIndexStore, Query};
    use docsync_types::{DocId, RawDoc};

    fn officer() -> DocType {
        DocType::new("officer")
    }

    fn setup() -> (Arc<MemoryIndexStore>, IndexAlias) {
        let store = Arc::new(MemoryIndexStore::new());
        let alias = IndexAlias::new("officers", store.clone());
        (store, alias)
    }

    fn write_one(alias: &IndexAlias, id: &str) -> Result<(), IndexingError> {
        let index = alias.write_index()?;
        index.put_mapping(&officer(), &Mapping::dynamic())?;
        index.store().bulk(vec![BulkOp::Index {
            index: index.name().to_string(),
            doc_type: officer(),
            id: Some(DocId::new(id)),
            source: RawDoc::new(),
        }])?;
        Ok(())
    }

    fn visible(store: &MemoryIndexStore) -> u64 {
        store.count("officers", &officer(), &Query::MatchAll).unwrap()
    }

    #[test]
    fn test_unbuilt_alias_has_no_write_index() {
        let (_, alias) = setup();
        assert!(matches!(
            alias.write_index_name(),
            Err(IndexingError::AliasNotBuilt(_))
        ));
        assert_eq!(alias.phase().unwrap(), AliasPhase::Idle);
    }

    #[test]
    fn test_indexing_swaps_on_success() {
        let (store, alias) = setup();
        alias.indexing(|| write_one(&alias, "1")).unwrap();

        let first = alias.read_index_name().unwrap().unwrap();
        assert!(first.starts_with("officers_"));
        assert_eq!(visible(&store), 1);
        assert_eq!(alias.phase().unwrap(), AliasPhase::Idle);

        alias.indexing(|| write_one(&alias, "2")).unwrap();
        let second = alias.read_index_name().unwrap().unwrap();
        assert_ne!(first, second);
        assert!(!store.index_exists(&first));
        assert_eq!(alias.builds_started().unwrap(), 2);
    }

    #[test]
    fn test_indexing_failure_keeps_read_index() {
        let (store, alias) = setup();
        alias.indexing(|| write_one(&alias, "1")).unwrap();
        let before = alias.read_index_name().unwrap();

        let result: Result<(), _> = alias.indexing(|| {
            write_one(&alias, "2")?;
            Err(IndexingError::Source("db down".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(alias.read_index_name().unwrap(), before);
        assert_eq!(alias.phase().unwrap(), AliasPhase::BuildFailed);

        let failed = alias.failed_index().unwrap().unwrap();
        assert!(store.index_exists(&failed));
        assert_eq!(visible(&store), 1);

        // the next build cleans up the failed one
        alias.indexing(|| write_one(&alias, "3")).unwrap();
        assert!(!store.index_exists(&failed));
    }

    #[test]
    fn test_failed_build_of_earlier_alias_is_dropped() {
        let (store, alias) = setup();
        alias.indexing(|| write_one(&alias, "1")).unwrap();
        let _: Result<(), _> = alias.indexing(|| {
            write_one(&alias, "2")?;
            Err(IndexingError::Source("db down".to_string()))
        });
        let failed = alias.failed_index().unwrap().unwrap();
        let unrelated = "officers_archive";
        store.create_index(unrelated, &IndexSettings::default()).unwrap();
        let other_alias = format!("officers_{}", Ulid::new().to_string().to_lowercase());
        store.create_index(&other_alias, &IndexSettings::default()).unwrap();
        store.swap_alias("officers_live", &other_alias).unwrap();

        // a new alias object over the same store knows nothing of `failed`
        let restarted = IndexAlias::new("officers", store.clone());
        assert_eq!(restarted.failed_index().unwrap(), None);
        restarted.indexing(|| write_one(&restarted, "3")).unwrap();

        assert!(!store.index_exists(&failed));
        assert!(store.index_exists(unrelated));
        assert!(store.index_exists(&other_alias));
        let unaliased: Vec<String> = store
            .list_indices()
            .unwrap()
            .into_iter()
            .filter(|info| info.aliases.is_empty())
            .map(|info| info.name)
            .collect();
        assert_eq!(unaliased, vec![unrelated.to_string()]);
        assert_eq!(visible(&store), 1);
    }

    #[test]
    fn test_indexing_panic_marks_failed() {
        let (_, alias) = setup();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _: Result<(), IndexingError> = alias.indexing(|| panic!("boom"));
        }));
        assert!(outcome.is_err());
        assert_eq!(alias.phase().unwrap(), AliasPhase::BuildFailed);
        assert_eq!(alias.read_index_name().unwrap(), None);
    }

    #[test]
    fn test_reentry_rejected() {
        let (_, alias) = setup();
        let result = alias.indexing(|| alias.indexing(|| Ok(())));
        assert!(matches!(result, Err(IndexingError::AlreadyBuilding(_))));
    }

    #[test]
    fn test_write_index_is_read_index_when_idle() {
        let (_, alias) = setup();
        alias.indexing(|| write_one(&alias, "1")).unwrap();
        assert_eq!(
            Some(alias.write_index_name().unwrap()),
            alias.read_index_name().unwrap()
        );
        assert_eq!(alias.migrate(&[officer()]).unwrap(), 0);
    }

    #[test]
    fn test_migrate_copies_while_building() {
        let (store, alias) = setup();
        alias.indexing(|| write_one(&alias, "1")).unwrap();

        alias
            .indexing(|| {
                let copied = alias.migrate(&[officer()])?;
                assert_eq!(copied, 1);
                Ok(())
            })
            .unwrap();
        assert_eq!(visible(&store), 1);
    }

    #[test]
    fn test_refresh_suspension_restores_on_drop() {
        let (store, alias) = setup();
        alias.indexing(|| write_one(&alias, "1")).unwrap();
        let index = alias.write_index().unwrap();
        {
            let _suspended = index.suspend_refresh(RefreshInterval::default()).unwrap();
            assert!(store
                .get_settings(index.name())
                .unwrap()
                .refresh_interval
                .is_disabled());
        }
        assert_eq!(
            store.get_settings(index.name()).unwrap().refresh_interval,
            RefreshInterval::default()
        );
    }
}
