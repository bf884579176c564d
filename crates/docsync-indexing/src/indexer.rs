//! Indexer authoring contract.
//!
//! An indexer declares the doc type it produces, the alias it publishes
//! to, where its records come from and how one record becomes one or
//! more documents. [`FullIndexer`] rebuilds from the whole source;
//! [`PartialIndexer`] reworks the documents of a bounded set of keys.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use docsync_store::Query;
use docsync_types::{DocType, Mapping, RawDoc};

use crate::alias::IndexAlias;
use crate::error::IndexingError;
use crate::merge::MergeStrategy;
use crate::source::RecordSource;

/// Record type of an indexer's source.
pub type RecordOf<I> = <<I as Indexer>::Source as RecordSource>::Record;

/// Documents extracted from one record.
pub enum Extracted<'a> {
    Single(RawDoc),
    /// A finite, not necessarily restartable, sequence.
    Many(Box<dyn Iterator<Item = RawDoc> + 'a>),
}

impl<'a> Extracted<'a> {
    pub fn many<I>(docs: I) -> Self
    where
        I: IntoIterator<Item = RawDoc>,
        I::IntoIter: 'a,
    {
        Extracted::Many(Box::new(docs.into_iter()))
    }
}

impl<'a> IntoIterator for Extracted<'a> {
    type Item = RawDoc;
    type IntoIter = Box<dyn Iterator<Item = RawDoc> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        match self {
            Extracted::Single(doc) => Box::new(std::iter::once(doc)),
            Extracted::Many(docs) => docs,
        }
    }
}

impl fmt::Debug for Extracted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Extracted::Single(doc) => f.debug_tuple("Single").field(doc).finish(),
            Extracted::Many(_) => f.write_str("Many(..)"),
        }
    }
}

/// Common part of every indexer.
pub trait Indexer: Send + Sync {
    type Source: RecordSource;

    /// Doc type the produced documents are written as. Embed indexers
    /// return the parent's doc type.
    fn doc_type(&self) -> &DocType;

    fn index_alias(&self) -> &Arc<IndexAlias>;

    /// Field schema of the doc type.
    fn mapping(&self) -> Mapping {
        Mapping::dynamic()
    }

    fn merge_strategy(&self) -> MergeStrategy {
        MergeStrategy::Overwrite
    }

    /// Transform one record. Must be free of side effects.
    fn extract_datum<'a>(&'a self, record: &'a RecordOf<Self>)
        -> Result<Extracted<'a>, IndexingError>;

    /// Name used in logs and reports.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Indexer that rebuilds its doc type from every source record.
pub trait FullIndexer: Indexer {
    /// Lazy, restartable sequence of every record.
    fn get_queryset(&self) -> Result<Self::Source, IndexingError>;
}

/// Indexer that rewrites the documents of changed keys only.
pub trait PartialIndexer: Indexer {
    type Key: Clone + Ord + fmt::Debug + Send + Sync;

    fn update_keys(&self) -> &UpdateKeySet<Self::Key>;

    /// Records for exactly this key batch.
    fn get_batch_queryset(&self, keys: &[Self::Key]) -> Result<Self::Source, IndexingError>;

    /// Query selecting exactly the existing documents of this key batch.
    fn get_batch_update_docs_queries(&self, keys: &[Self::Key]) -> Query;

    /// Key a source record belongs to.
    fn record_key(&self, record: &RecordOf<Self>) -> Option<Self::Key>;
}

/// Ordered, de-duplicated set of changed source keys.
///
/// Keeps first-seen order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateKeySet<K> {
    keys: Vec<K>,
}

impl<K> Default for UpdateKeySet<K> {
    fn default() -> Self {
        Self { keys: Vec::new() }
    }
}

impl<K: Clone + Ord> UpdateKeySet<K> {
    pub fn new<I: IntoIterator<Item = K>>(keys: I) -> Self {
        let mut seen = BTreeSet::new();
        let keys = keys
            .into_iter()
            .filter(|key| seen.insert(key.clone()))
            .collect();
        Self { keys }
    }

    pub fn keys(&self) -> &[K] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Fixed-size batches; the last one may be shorter.
    pub fn batches(&self, size: usize) -> impl Iterator<Item = &[K]> {
        self.keys.chunks(size.max(1))
    }
}

impl<K: Clone + Ord> FromIterator<K> for UpdateKeySet<K> {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        Self::new(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_update_key_set_dedupes_in_order() {
        let keys = UpdateKeySet::new([3, 1, 3, 2, 1]);
        assert_eq!(keys.keys(), &[3, 1, 2]);
        assert_eq!(keys.len(), 3);
    }

    #[test]
    fn test_update_key_set_batches() {
        let keys: UpdateKeySet<u32> = (0..5).collect();
        let batches: Vec<&[u32]> = keys.batches(2).collect();
        assert_eq!(batches, vec![&[0, 1][..], &[2, 3][..], &[4][..]]);
        assert_eq!(UpdateKeySet::<u32>::default().batches(2).count(), 0);
    }

    #[test]
    fn test_extracted_into_iter() {
        let doc = json!({"a": 1}).as_object().cloned().unwrap();
        assert_eq!(Extracted::Single(doc.clone()).into_iter().count(), 1);
        assert_eq!(
            Extracted::many(vec![doc.clone(), doc]).into_iter().count(),
            2
        );
    }
}
