//! Engine configuration.

use docsync_store::RefreshInterval;
use docsync_types::RebuildSettings;

use crate::error::IndexingError;

/// Configuration for reindex operations.
#[derive(Debug, Clone)]
pub struct RebuildConfig {
    /// Keys per partial-update batch.
    pub batch_size: usize,
    /// Documents per bulk request.
    pub bulk_chunk_size: usize,
    /// Refresh interval restored after a bulk load.
    pub refresh_interval: RefreshInterval,
    /// Abort the rest of an alias group on the first indexer failure.
    pub fail_fast: bool,
    /// Report progress every N source records.
    pub progress_every: usize,
}

impl Default for RebuildConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            bulk_chunk_size: 500,
            refresh_interval: RefreshInterval::default(),
            fail_fast: true,
            progress_every: 1000,
        }
    }
}

impl RebuildConfig {
    /// Set the partial-update batch size.
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Set the bulk request size.
    pub fn with_bulk_chunk_size(mut self, size: usize) -> Self {
        self.bulk_chunk_size = size.max(1);
        self
    }

    /// Set the refresh interval restored after bulk loads.
    pub fn with_refresh_interval(mut self, interval: RefreshInterval) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Set whether an alias group stops at its first failure.
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Set the progress reporting interval.
    pub fn with_progress_every(mut self, every: usize) -> Self {
        self.progress_every = every.max(1);
        self
    }
}

impl TryFrom<&RebuildSettings> for RebuildConfig {
    type Error = IndexingError;

    fn try_from(settings: &RebuildSettings) -> Result<Self, Self::Error> {
        Ok(Self::default()
            .with_batch_size(settings.batch_size)
            .with_bulk_chunk_size(settings.bulk_chunk_size)
            .with_refresh_interval(RefreshInterval::parse(&settings.refresh_interval)?)
            .with_fail_fast(settings.fail_fast)
            .with_progress_every(settings.progress_every))
    }
}
