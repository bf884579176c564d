//! Document-level types: doc types, raw field maps and ids.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SyncError;

/// Key under which a raw document carries its primary key.
pub const ID_FIELD: &str = "id";

/// A raw extracted document: field name -> JSON value.
pub type RawDoc = serde_json::Map<String, Value>;

/// Name of a document shape (doc type) in the index.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocType(String);

impl DocType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for DocType {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Identifier of a document in the index (`_id`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocId(String);

impl DocId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Interpret a JSON value as a document id.
    ///
    /// Strings are used verbatim and integers are rendered in decimal.
    /// Anything else cannot act as a primary key.
    pub fn from_value(value: &Value) -> Result<Self, SyncError> {
        match value {
            Value::String(s) if !s.is_empty() => Ok(Self(s.clone())),
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(Self(n.to_string())),
            other => Err(SyncError::InvalidInput(format!(
                "document id must be a non-empty string or an integer, got {other}"
            ))),
        }
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Bulk operation requested by an indexer for the documents it produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpType {
    /// Replace the document stored under the id
    #[default]
    Index,
    /// Merge into (or script-update) an existing document
    Update,
}

impl fmt::Display for OpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpType::Index => write!(f, "index"),
            OpType::Update => write!(f, "update"),
        }
    }
}
