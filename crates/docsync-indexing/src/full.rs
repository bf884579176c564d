//! Full-mode engine: declare the mapping and stream every record into
//! the alias's write index.

use tracing::{debug, info, warn};

use docsync_store::{BulkFailure, BulkOp};
use docsync_types::{DocType, Mapping};

use crate::alias::IndexHandle;
use crate::config::RebuildConfig;
use crate::error::IndexingError;
use crate::indexer::{FullIndexer, Indexer, RecordOf};
use crate::merge::doc_dict;
use crate::progress::{ProgressCallback, ReindexProgress};
use crate::source::RecordSource;

/// Close the write index and declare the indexer's mapping.
///
/// The index is left closed; the bulk load reopens it. Embed indexers
/// declare nothing: the parent doc type's indexer owns that mapping.
/// Returns the number of mappings declared.
pub fn create_mapping<I: Indexer + ?Sized>(indexer: &I) -> Result<usize, IndexingError> {
    let index = indexer.index_alias().write_index()?;
    index.close()?;

    if indexer.merge_strategy().is_embed() {
        debug!(
            indexer = indexer.name(),
            doc_type = %indexer.doc_type(),
            "Embed indexer, mapping owned by parent doc type"
        );
        return Ok(0);
    }

    put_mapping_or_reopen(&index, indexer.doc_type(), &indexer.mapping())?;
    info!(index = index.name(), doc_type = %indexer.doc_type(), "Created mapping");
    Ok(1)
}

/// Declare a mapping on a closed index, reopening it if the store refuses.
pub(crate) fn put_mapping_or_reopen(
    index: &IndexHandle,
    doc_type: &DocType,
    mapping: &Mapping,
) -> Result<(), IndexingError> {
    if let Err(e) = index.put_mapping(doc_type, mapping) {
        warn!(index = index.name(), doc_type = %doc_type, error = %e, "Mapping creation failed, reopening index");
        if let Err(reopen) = index.open() {
            warn!(index = index.name(), error = %reopen, "Failed to reopen index");
        }
        return Err(e);
    }
    Ok(())
}

/// Bulk-write every document of the indexer's queryset.
pub fn add_new_data<I: FullIndexer + ?Sized>(
    indexer: &I,
    config: &RebuildConfig,
    callback: &dyn ProgressCallback,
    progress: &mut ReindexProgress,
) -> Result<(), IndexingError> {
    let source = indexer.get_queryset()?;
    info!(indexer = indexer.name(), doc_type = %indexer.doc_type(), "Indexing");
    let records = source.iterate()?;
    write_docs(indexer, records, config, callback, progress)
}

/// Stream `records` through extraction and the merge strategy into the
/// write index.
///
/// Periodic refresh is disabled for the duration of the load and
/// restored afterwards, also when the load fails. Every rejected item is
/// collected; any rejection fails the load after the refresh.
pub(crate) fn write_docs<I, R>(
    indexer: &I,
    records: R,
    config: &RebuildConfig,
    callback: &dyn ProgressCallback,
    progress: &mut ReindexProgress,
) -> Result<(), IndexingError>
where
    I: Indexer + ?Sized,
    R: Iterator<Item = Result<RecordOf<I>, IndexingError>>,
{
    let doc_type = indexer.doc_type();
    let strategy = indexer.merge_strategy();
    let index = indexer.index_alias().write_index()?;

    let suspension = index.suspend_refresh(config.refresh_interval.clone())?;
    index.open()?;

    let mut failures = Vec::new();
    let mut chunk = Vec::with_capacity(config.bulk_chunk_size);
    for record in records {
        let record = record?;
        progress.record_read();
        for raw in indexer.extract_datum(&record)? {
            chunk.push(doc_dict(&strategy, index.name(), doc_type, raw)?);
            if chunk.len() >= config.bulk_chunk_size {
                flush(&index, &mut chunk, progress, &mut failures)?;
            }
        }
        if progress
            .records_read
            .is_multiple_of(config.progress_every as u64)
        {
            callback.on_progress(doc_type, progress);
        }
    }
    flush(&index, &mut chunk, progress, &mut failures)?;

    suspension.restore()?;
    index.refresh()?;

    if !failures.is_empty() {
        for failure in failures.iter().take(10) {
            warn!(doc_type = %doc_type, %failure, "Document rejected");
        }
        return Err(IndexingError::BulkRejected {
            doc_type: doc_type.clone(),
            failures,
        });
    }

    progress.mark_completed();
    callback.on_progress(doc_type, progress);
    debug!(
        index = index.name(),
        doc_type = %doc_type,
        records = progress.records_read,
        written = progress.docs_written,
        "Bulk load complete"
    );
    Ok(())
}

fn flush(
    index: &IndexHandle,
    chunk: &mut Vec<BulkOp>,
    progress: &mut ReindexProgress,
    failures: &mut Vec<BulkFailure>,
) -> Result<(), IndexingError> {
    if chunk.is_empty() {
        return Ok(());
    }
    let response = index.store().bulk(std::mem::take(chunk))?;
    progress.record_written(response.applied);
    progress.record_rejected(response.failures.len());
    failures.extend(response.failures);
    Ok(())
}
