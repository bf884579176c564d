//! Object-safe reindex units and their reports.
//!
//! [`FullIndexer`] and [`PartialIndexer`] carry associated types, so the
//! registry and orchestrator work through the [`Reindex`] trait instead.
//! [`FullReindexer`] and [`PartialReindexer`] bind an indexer to its
//! engine configuration and progress callback.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{info, warn};

use docsync_types::{DocType, Mapping};

use crate::alias::IndexAlias;
use crate::config::RebuildConfig;
use crate::error::IndexingError;
use crate::indexer::{FullIndexer, PartialIndexer};
use crate::progress::{NoOpProgressCallback, ProgressCallback, ReindexProgress};
use crate::{full, partial};

/// Which engine a reindex unit runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReindexMode {
    Full,
    Partial,
}

impl fmt::Display for ReindexMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReindexMode::Full => write!(f, "full"),
            ReindexMode::Partial => write!(f, "partial"),
        }
    }
}

/// Outcome of one indexer's reindex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReindexReport {
    pub indexer: String,
    pub doc_type: DocType,
    pub mode: ReindexMode,
    pub records_read: u64,
    pub docs_written: u64,
    pub docs_deleted: u64,
    pub docs_migrated: u64,
    pub mappings_created: usize,
    pub elapsed_ms: u64,
}

impl ReindexReport {
    pub fn new(indexer: impl Into<String>, doc_type: DocType, mode: ReindexMode) -> Self {
        Self {
            indexer: indexer.into(),
            doc_type,
            mode,
            records_read: 0,
            docs_written: 0,
            docs_deleted: 0,
            docs_migrated: 0,
            mappings_created: 0,
            elapsed_ms: 0,
        }
    }

    /// Fold engine progress counters into the report.
    pub fn record_progress(&mut self, progress: &ReindexProgress) {
        self.records_read += progress.records_read;
        self.docs_written += progress.docs_written;
        self.docs_deleted += progress.docs_deleted;
    }

    /// Merge another report's counters into this one.
    pub fn merge(&mut self, other: &ReindexReport) {
        self.records_read += other.records_read;
        self.docs_written += other.docs_written;
        self.docs_deleted += other.docs_deleted;
        self.docs_migrated += other.docs_migrated;
        self.mappings_created += other.mappings_created;
        self.elapsed_ms += other.elapsed_ms;
    }
}

/// A reindex unit as seen by the registry and the orchestrator.
pub trait Reindex: Send + Sync {
    fn name(&self) -> &str;

    fn doc_type(&self) -> &DocType;

    fn index_alias(&self) -> &Arc<IndexAlias>;

    fn mode(&self) -> ReindexMode;

    /// Mapping this unit owns; `None` for embed indexers, whose parent
    /// doc type owns the mapping.
    fn owned_mapping(&self) -> Option<Mapping>;

    /// Checks that must pass before anything is written.
    fn prepare(&self) -> Result<(), IndexingError> {
        Ok(())
    }

    /// Declare mappings on the write index; returns how many were declared.
    fn create_mapping(&self) -> Result<usize, IndexingError>;

    /// Write this unit's documents into the write index.
    fn populate(&self) -> Result<ReindexReport, IndexingError>;

    /// Run the whole reindex: prepare, create mappings, populate.
    fn reindex(&self) -> Result<ReindexReport, IndexingError> {
        let started = Instant::now();
        self.prepare()?;
        let created = self.create_mapping()?;
        let mut report = self.populate()?;
        report.mappings_created += created;
        report.elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            indexer = self.name(),
            doc_type = %self.doc_type(),
            mode = %self.mode(),
            written = report.docs_written,
            deleted = report.docs_deleted,
            elapsed_ms = report.elapsed_ms,
            "Reindex complete"
        );
        Ok(report)
    }
}

/// A [`FullIndexer`] bound to its engine configuration.
pub struct FullReindexer<I> {
    indexer: I,
    config: RebuildConfig,
    progress: Arc<dyn ProgressCallback>,
}

impl<I: FullIndexer> FullReindexer<I> {
    pub fn new(indexer: I, config: RebuildConfig) -> Self {
        Self {
            indexer,
            config,
            progress: Arc::new(NoOpProgressCallback),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    pub fn indexer(&self) -> &I {
        &self.indexer
    }
}

impl<I: FullIndexer> Reindex for FullReindexer<I> {
    fn name(&self) -> &str {
        self.indexer.name()
    }

    fn doc_type(&self) -> &DocType {
        self.indexer.doc_type()
    }

    fn index_alias(&self) -> &Arc<IndexAlias> {
        self.indexer.index_alias()
    }

    fn mode(&self) -> ReindexMode {
        ReindexMode::Full
    }

    fn owned_mapping(&self) -> Option<Mapping> {
        (!self.indexer.merge_strategy().is_embed()).then(|| self.indexer.mapping())
    }

    fn create_mapping(&self) -> Result<usize, IndexingError> {
        full::create_mapping(&self.indexer)
    }

    fn populate(&self) -> Result<ReindexReport, IndexingError> {
        let started = Instant::now();
        let mut progress = ReindexProgress::new();
        full::add_new_data(&self.indexer, &self.config, &*self.progress, &mut progress)?;

        let mut report = ReindexReport::new(self.name(), self.doc_type().clone(), ReindexMode::Full);
        report.record_progress(&progress);
        report.elapsed_ms = started.elapsed().as_millis() as u64;
        Ok(report)
    }
}

/// A [`PartialIndexer`] bound to its engine configuration.
pub struct PartialReindexer<I> {
    indexer: I,
    config: RebuildConfig,
    progress: Arc<dyn ProgressCallback>,
}

impl<I: PartialIndexer> PartialReindexer<I> {
    pub fn new(indexer: I, config: RebuildConfig) -> Self {
        Self {
            indexer,
            config,
            progress: Arc::new(NoOpProgressCallback),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    pub fn indexer(&self) -> &I {
        &self.indexer
    }

    fn apply(&self) -> Result<ReindexReport, IndexingError> {
        let started = Instant::now();
        let mut report = ReindexReport::new(self.name(), self.doc_type().clone(), ReindexMode::Partial);

        report.docs_migrated = self
            .indexer
            .index_alias()
            .migrate(std::slice::from_ref(self.indexer.doc_type()))?;

        let mut progress = ReindexProgress::new();
        progress.record_deleted(partial::delete_existing_docs(&self.indexer, &self.config)?);
        partial::add_new_data(&self.indexer, &self.config, &*self.progress, &mut progress)?;

        report.record_progress(&progress);
        report.elapsed_ms = started.elapsed().as_millis() as u64;
        Ok(report)
    }
}

impl<I: PartialIndexer> Reindex for PartialReindexer<I> {
    fn name(&self) -> &str {
        self.indexer.name()
    }

    fn doc_type(&self) -> &DocType {
        self.indexer.doc_type()
    }

    fn index_alias(&self) -> &Arc<IndexAlias> {
        self.indexer.index_alias()
    }

    fn mode(&self) -> ReindexMode {
        ReindexMode::Partial
    }

    fn owned_mapping(&self) -> Option<Mapping> {
        (!self.indexer.merge_strategy().is_embed()).then(|| self.indexer.mapping())
    }

    fn prepare(&self) -> Result<(), IndexingError> {
        partial::validate_updated_docs(&self.indexer, &self.config).map(|_| ())
    }

    fn create_mapping(&self) -> Result<usize, IndexingError> {
        partial::create_mapping(&self.indexer)
    }

    fn populate(&self) -> Result<ReindexReport, IndexingError> {
        let result = self.apply();
        if let Err(e) = &result {
            if !self.indexer.index_alias().is_building().unwrap_or(false) {
                warn!(
                    indexer = self.name(),
                    doc_type = %self.doc_type(),
                    error = %e,
                    "Partial update failed; the live index may hold a mix of old and new documents"
                );
            }
        }
        result
    }
}
