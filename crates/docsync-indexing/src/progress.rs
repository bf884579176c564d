//! Progress tracking for reindex operations.

use tracing::info;

use docsync_types::DocType;

/// Running counters of one indexer's reindex.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReindexProgress {
    /// Source records read.
    pub records_read: u64,
    /// Documents accepted by the store.
    pub docs_written: u64,
    /// Documents rejected by the store.
    pub docs_rejected: u64,
    /// Documents removed by delete-by-query.
    pub docs_deleted: u64,
    /// Whether the reindex completed.
    pub completed: bool,
}

impl ReindexProgress {
    /// Create a new progress tracker.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_read(&mut self) {
        self.records_read += 1;
    }

    pub fn record_written(&mut self, count: usize) {
        self.docs_written += count as u64;
    }

    pub fn record_rejected(&mut self, count: usize) {
        self.docs_rejected += count as u64;
    }

    pub fn record_deleted(&mut self, count: u64) {
        self.docs_deleted += count;
    }

    /// Mark as completed.
    pub fn mark_completed(&mut self) {
        self.completed = true;
    }
}

/// Trait for receiving reindex progress updates.
pub trait ProgressCallback: Send + Sync {
    /// Called periodically while documents are written, and once on completion.
    fn on_progress(&self, doc_type: &DocType, progress: &ReindexProgress);
}

/// A no-op progress callback for when progress reporting isn't needed.
pub struct NoOpProgressCallback;

impl ProgressCallback for NoOpProgressCallback {
    fn on_progress(&self, _doc_type: &DocType, _progress: &ReindexProgress) {}
}

/// A callback that logs progress at info level.
pub struct LoggingProgressCallback {
    every: u64,
}

impl LoggingProgressCallback {
    /// Log every `every` records, and on completion.
    pub fn new(every: usize) -> Self {
        Self {
            every: every.max(1) as u64,
        }
    }
}

impl ProgressCallback for LoggingProgressCallback {
    fn on_progress(&self, doc_type: &DocType, progress: &ReindexProgress) {
        if progress.completed || progress.records_read.is_multiple_of(self.every) {
            info!(
                doc_type = %doc_type,
                records = progress.records_read,
                written = progress.docs_written,
                rejected = progress.docs_rejected,
                deleted = progress.docs_deleted,
                completed = progress.completed,
                "Reindex progress"
            );
        }
    }
}
