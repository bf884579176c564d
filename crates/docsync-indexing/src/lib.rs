//! # docsync-indexing
//!
//! Keeps search indices in sync with a relational source.
//!
//! Every logical index is reached through an [`IndexAlias`]. Full rebuilds
//! run inside [`IndexAlias::indexing`], which builds a fresh physical index
//! and swaps the alias onto it only when the whole build succeeded. Partial
//! updates rework the documents of a bounded key set in place, after a
//! count-parity check between the source and the live index.
//!
//! ## Pieces
//! - [`FullIndexer`] / [`PartialIndexer`]: domain code describing one doc type
//! - [`MergeStrategy`]: overwrite, partial update, or embed into a parent
//! - [`FullReindexer`] / [`PartialReindexer`]: the engines behind [`Reindex`]
//! - [`IndexerRegistry`]: discovery of every indexer by group
//! - [`IndexBuildOrchestrator`]: one `indexing()` scope per alias
//!
//! ## Usage
//!
//! ```rust,ignore
//! let registry = IndexerRegistry::discover(&[&officers_module, &cr_module])?;
//! let summary = IndexBuildOrchestrator::new(&registry, RebuildConfig::default())
//!     .rebuild(&Selection::parse(["officers", "cr.cr"])?)?;
//! assert!(!summary.has_failures());
//! ```

pub mod alias;
pub mod config;
pub mod error;
pub mod full;
pub mod indexer;
pub mod merge;
pub mod orchestrator;
pub mod partial;
pub mod progress;
pub mod registry;
pub mod reindex;
pub mod selection;
pub mod source;

#[cfg(test)]
mod test_support;

pub use alias::{AliasPhase, IndexAlias, IndexHandle, RefreshSuspension};
pub use config::RebuildConfig;
pub use error::IndexingError;
pub use indexer::{Extracted, FullIndexer, Indexer, PartialIndexer, RecordOf, UpdateKeySet};
pub use merge::{doc_dict, MergeStrategy};
pub use orchestrator::{AliasGroupOutcome, IndexBuildOrchestrator, RebuildSummary};
pub use progress::{LoggingProgressCallback, NoOpProgressCallback, ProgressCallback, ReindexProgress};
pub use registry::{IndexerModule, IndexerRegistry, RegisteredIndexer, RegistryBuilder};
pub use reindex::{FullReindexer, PartialReindexer, Reindex, ReindexMode, ReindexReport};
pub use selection::{Selection, SelectionItem};
pub use source::{JsonLinesSource, RecordIter, RecordSource};
