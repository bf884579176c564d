//! Partial-mode engine: rework the documents of a bounded key set.
//!
//! Order of operations matters: the parity check runs before anything
//! destructive, and every batch's deletes complete before any insert.
//! Partial mode is not atomic across batches; a failure part-way leaves
//! earlier batches applied.

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::config::RebuildConfig;
use crate::error::IndexingError;
use crate::full::{put_mapping_or_reopen, write_docs};
use crate::indexer::{Indexer, PartialIndexer};
use crate::progress::{ProgressCallback, ReindexProgress};
use crate::source::{RecordIter, RecordSource};

/// Check that the source and the index agree on the key set.
///
/// Per batch, source rows are counted and index documents are counted
/// for the keys the source still holds. Keys gone from the source are
/// left out of the document count since their documents are about to be
/// deleted. Any difference in the totals is a consistency error.
/// Returns the number of source rows.
pub fn validate_updated_docs<I: PartialIndexer + ?Sized>(
    indexer: &I,
    config: &RebuildConfig,
) -> Result<u64, IndexingError> {
    let keys = indexer.update_keys();
    if keys.is_empty() {
        return Ok(0);
    }

    let alias = indexer.index_alias();
    let read_index = alias
        .read_index_name()?
        .ok_or_else(|| IndexingError::AliasNotBuilt(alias.name().to_string()))?;
    let doc_type = indexer.doc_type();

    let mut source_rows = 0;
    let mut index_docs = 0;
    for batch in keys.batches(config.batch_size) {
        let source = indexer.get_batch_queryset(batch)?;
        source_rows += source.count()?;

        let mut present = BTreeSet::new();
        for record in source.iterate()? {
            if let Some(key) = indexer.record_key(&record?) {
                present.insert(key);
            }
        }
        if present.is_empty() {
            continue;
        }
        let present: Vec<I::Key> = present.into_iter().collect();
        let query = indexer.get_batch_update_docs_queries(&present);
        index_docs += alias.store().count(&read_index, doc_type, &query)?;
    }

    if source_rows != index_docs {
        return Err(IndexingError::Consistency {
            doc_type: doc_type.clone(),
            index_docs,
            source_rows,
        });
    }
    debug!(doc_type = %doc_type, keys = keys.len(), rows = source_rows, "Partial update validated");
    Ok(source_rows)
}

/// Declare the alias's doc types missing from the write index.
///
/// Never replaces an existing mapping. The index is only closed when
/// something is missing, and is reopened afterwards. Returns the number
/// of mappings declared.
pub fn create_mapping<I: Indexer + ?Sized>(indexer: &I) -> Result<usize, IndexingError> {
    let alias = indexer.index_alias();
    let index = alias.write_index()?;

    let mut wanted = alias.declared_doc_types()?;
    if !indexer.merge_strategy().is_embed()
        && !wanted.iter().any(|(doc_type, _)| doc_type == indexer.doc_type())
    {
        wanted.push((indexer.doc_type().clone(), indexer.mapping()));
    }

    let mut missing = Vec::new();
    for (doc_type, mapping) in wanted {
        if !index.has_mapping(&doc_type)? {
            missing.push((doc_type, mapping));
        }
    }
    if missing.is_empty() {
        return Ok(0);
    }

    index.close()?;
    for (doc_type, mapping) in &missing {
        put_mapping_or_reopen(&index, doc_type, mapping)?;
        info!(index = index.name(), doc_type = %doc_type, "Created missing mapping");
    }
    index.open()?;
    Ok(missing.len())
}

/// Delete the existing documents of every key batch; refreshes once.
///
/// Driven by the key batches, so keys deleted upstream lose their
/// documents too. Returns the number of deleted documents.
pub fn delete_existing_docs<I: PartialIndexer + ?Sized>(
    indexer: &I,
    config: &RebuildConfig,
) -> Result<u64, IndexingError> {
    let index = indexer.index_alias().write_index()?;
    let doc_type = indexer.doc_type();
    index.open()?;

    let mut deleted = 0;
    for batch in indexer.update_keys().batches(config.batch_size) {
        let query = indexer.get_batch_update_docs_queries(batch);
        deleted += index.store().delete_by_query(index.name(), doc_type, &query)?;
    }
    index.refresh()?;

    info!(index = index.name(), doc_type = %doc_type, deleted, "Deleted stale documents");
    Ok(deleted)
}

/// Bulk-write the replacement documents of every key batch.
pub fn add_new_data<I: PartialIndexer + ?Sized>(
    indexer: &I,
    config: &RebuildConfig,
    callback: &dyn ProgressCallback,
    progress: &mut ReindexProgress,
) -> Result<(), IndexingError> {
    let sources = indexer
        .update_keys()
        .batches(config.batch_size)
        .map(|batch| indexer.get_batch_queryset(batch))
        .collect::<Result<Vec<_>, _>>()?;
    let records = sources.iter().flat_map(iterate_or_fail);
    write_docs(indexer, records, config, callback, progress)
}

fn iterate_or_fail<S: RecordSource>(source: &S) -> RecordIter<'_, S::Record> {
    source
        .iterate()
        .unwrap_or_else(|e| Box::new(std::iter::once(Err(e))))
}
