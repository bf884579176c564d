//! Document merge strategies: how an extracted document becomes a bulk op.

use serde_json::Value;

use docsync_store::{BulkOp, EmbedScript, FieldName, UpdateAction};
use docsync_types::{DocId, DocType, OpType, RawDoc, ID_FIELD};

use crate::error::IndexingError;

/// How an indexer's documents are written.
#[derive(Debug, Clone, PartialEq)]
pub enum MergeStrategy {
    /// `index` op: replace the document at `_id`.
    Overwrite,
    /// `update` op with a `doc` body: merge into an existing document.
    Update,
    /// `update` op with upsert + script: append the document to the list
    /// field `property` of the parent document `_id`.
    Embed { property: FieldName },
}

impl MergeStrategy {
    /// Strategy for an optional parent property and an op type override.
    pub fn from_parts(parent_property: Option<&str>, op_type: OpType) -> Result<Self, IndexingError> {
        match (parent_property, op_type) {
            (Some(property), _) => Ok(MergeStrategy::Embed {
                property: FieldName::new(property)?,
            }),
            (None, OpType::Update) => Ok(MergeStrategy::Update),
            (None, OpType::Index) => Ok(MergeStrategy::Overwrite),
        }
    }

    pub fn op_type(&self) -> OpType {
        match self {
            MergeStrategy::Overwrite => OpType::Index,
            MergeStrategy::Update | MergeStrategy::Embed { .. } => OpType::Update,
        }
    }

    pub fn is_embed(&self) -> bool {
        matches!(self, MergeStrategy::Embed { .. })
    }
}

/// Wrap a raw document into the bulk op for `strategy`.
///
/// The `id` key is lifted out of the body into `_id`. For embed, that id
/// names the parent document and the rest of the body is the child.
pub fn doc_dict(
    strategy: &MergeStrategy,
    index: &str,
    doc_type: &DocType,
    mut raw: RawDoc,
) -> Result<BulkOp, IndexingError> {
    let id = raw
        .remove(ID_FIELD)
        .map(|value| DocId::from_value(&value))
        .transpose()
        .map_err(|e| IndexingError::InvalidDocument(e.to_string()))?;

    let op = match strategy {
        MergeStrategy::Overwrite => BulkOp::Index {
            index: index.to_string(),
            doc_type: doc_type.clone(),
            id,
            source: raw,
        },
        MergeStrategy::Update => BulkOp::Update {
            index: index.to_string(),
            doc_type: doc_type.clone(),
            id: require_id(id, doc_type)?,
            action: UpdateAction::Merge { doc: raw },
        },
        MergeStrategy::Embed { property } => {
            let mut upsert = RawDoc::new();
            upsert.insert(
                property.as_str().to_string(),
                Value::Array(vec![Value::Object(raw.clone())]),
            );
            BulkOp::Update {
                index: index.to_string(),
                doc_type: doc_type.clone(),
                id: require_id(id, doc_type)?,
                action: UpdateAction::Upsert {
                    script: EmbedScript::append_to(property.clone(), raw),
                    upsert,
                },
            }
        }
    };
    Ok(op)
}

fn require_id(id: Option<DocId>, doc_type: &DocType) -> Result<DocId, IndexingError> {
    id.ok_or_else(|| {
        IndexingError::InvalidDocument(format!(
            "{doc_type} document has no '{ID_FIELD}' to address the update"
        ))
    })
}
