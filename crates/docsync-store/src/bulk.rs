//! Bulk operation envelopes.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use docsync_types::{DocId, DocType, RawDoc};

use crate::script::EmbedScript;

/// Body of an `update` operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateAction {
    /// Merge fields into an existing document; a missing document is rejected.
    Merge { doc: RawDoc },
    /// Run `script` on an existing document, or insert `upsert` if missing.
    Upsert { script: EmbedScript, upsert: RawDoc },
}

/// One operation of a bulk request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BulkOp {
    Index {
        index: String,
        doc_type: DocType,
        /// `None` lets the store generate an id
        id: Option<DocId>,
        source: RawDoc,
    },
    Update {
        index: String,
        doc_type: DocType,
        id: DocId,
        action: UpdateAction,
    },
    Delete {
        index: String,
        doc_type: DocType,
        id: DocId,
    },
}

impl BulkOp {
    pub fn op_type(&self) -> &'static str {
        match self {
            BulkOp::Index { .. } => "index",
            BulkOp::Update { .. } => "update",
            BulkOp::Delete { .. } => "delete",
        }
    }

    pub fn index(&self) -> &str {
        match self {
            BulkOp::Index { index, .. }
            | BulkOp::Update { index, .. }
            | BulkOp::Delete { index, .. } => index,
        }
    }

    pub fn doc_type(&self) -> &DocType {
        match self {
            BulkOp::Index { doc_type, .. }
            | BulkOp::Update { doc_type, .. }
            | BulkOp::Delete { doc_type, .. } => doc_type,
        }
    }

    pub fn id(&self) -> Option<&DocId> {
        match self {
            BulkOp::Index { id, .. } => id.as_ref(),
            BulkOp::Update { id, .. } | BulkOp::Delete { id, .. } => Some(id),
        }
    }

    /// Wire envelope: `_op_type`, `_index`, `_type`, `_id` and `_source`.
    pub fn to_envelope(&self) -> Value {
        let mut envelope = json!({
            "_op_type": self.op_type(),
            "_index": self.index(),
            "_type": self.doc_type(),
        });
        if let Some(id) = self.id() {
            envelope["_id"] = json!(id);
        }
        match self {
            BulkOp::Index { source, .. } => {
                envelope["_source"] = Value::Object(source.clone());
            }
            BulkOp::Update {
                action: UpdateAction::Merge { doc },
                ..
            } => {
                envelope["_source"] = json!({ "doc": doc });
            }
            BulkOp::Update {
                action: UpdateAction::Upsert { script, upsert },
                ..
            } => {
                envelope["_source"] = json!({
                    "upsert": upsert,
                    "script": script.to_json(),
                });
            }
            BulkOp::Delete { .. } => {}
        }
        envelope
    }
}

/// A bulk item the store refused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkFailure {
    pub index: String,
    pub op_type: String,
    pub id: Option<DocId>,
    pub reason: String,
}

impl BulkFailure {
    pub fn for_op(op: &BulkOp, reason: impl Into<String>) -> Self {
        Self {
            index: op.index().to_string(),
            op_type: op.op_type().to_string(),
            id: op.id().cloned(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for BulkFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "{} {}/{}: {}", self.op_type, self.index, id, self.reason),
            None => write!(f, "{} {}: {}", self.op_type, self.index, self.reason),
        }
    }
}

/// Outcome of a bulk request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkResponse {
    /// Number of items that were applied
    pub applied: usize,
    pub failures: Vec<BulkFailure>,
}

impl BulkResponse {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn total(&self) -> usize {
        self.applied + self.failures.len()
    }
}
