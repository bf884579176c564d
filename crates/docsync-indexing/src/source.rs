//! Record sources feeding the indexers.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use docsync_types::{DocId, RawDoc};

use crate::error::IndexingError;

/// Iterator over the records of a source.
pub type RecordIter<'a, R> = Box<dyn Iterator<Item = Result<R, IndexingError>> + 'a>;

/// An enumerable source of typed records.
///
/// `iterate` may be called more than once; each call restarts from the
/// beginning.
pub trait RecordSource {
    type Record;

    fn iterate(&self) -> Result<RecordIter<'_, Self::Record>, IndexingError>;

    fn count(&self) -> Result<u64, IndexingError>;
}

impl<R: Clone> RecordSource for Vec<R> {
    type Record = R;

    fn iterate(&self) -> Result<RecordIter<'_, R>, IndexingError> {
        Ok(Box::new(self.iter().cloned().map(Ok)))
    }

    fn count(&self) -> Result<u64, IndexingError> {
        Ok(self.len() as u64)
    }
}

/// Records stored one JSON object per line.
#[derive(Debug, Clone)]
pub struct JsonLinesSource {
    path: PathBuf,
    key_filter: Option<(String, BTreeSet<String>)>,
}

impl JsonLinesSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            key_filter: None,
        }
    }

    /// Only yield records whose `field` is one of `keys`.
    pub fn with_key_filter<I, S>(mut self, field: impl Into<String>, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.key_filter = Some((field.into(), keys.into_iter().map(Into::into).collect()));
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn keep(&self, record: &RawDoc) -> bool {
        let Some((field, keys)) = &self.key_filter else {
            return true;
        };
        record
            .get(field)
            .and_then(|value| DocId::from_value(value).ok())
            .is_some_and(|key| keys.contains(key.as_str()))
    }
}

impl RecordSource for JsonLinesSource {
    type Record = RawDoc;

    fn iterate(&self) -> Result<RecordIter<'_, RawDoc>, IndexingError> {
        let file = File::open(&self.path).map_err(|e| {
            IndexingError::Source(format!("cannot open {}: {e}", self.path.display()))
        })?;
        let path = self.path.display().to_string();

        let records = BufReader::new(file)
            .lines()
            .enumerate()
            .filter_map(move |(n, line)| {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => return Some(Err(IndexingError::Source(format!("{path}: {e}")))),
                };
                if line.trim().is_empty() {
                    return None;
                }
                Some(serde_json::from_str::<RawDoc>(&line).map_err(|e| {
                    IndexingError::Source(format!("{path}:{}: {e}", n + 1))
                }))
            })
            .filter(move |record| match record {
                Ok(record) => self.keep(record),
                Err(_) => true,
            });
        Ok(Box::new(records))
    }

    fn count(&self) -> Result<u64, IndexingError> {
        let mut count = 0;
        for record in self.iterate()? {
            record?;
            count += 1;
        }
        Ok(count)
    }
}
