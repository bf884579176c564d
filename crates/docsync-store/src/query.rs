//! Queries selecting documents for count, search and delete-by-query.
//!
//! The engine treats a query as opaque: indexers build one for a key
//! batch and the store evaluates it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::StoredDocument;

/// A document query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Query {
    /// Every document
    MatchAll,
    /// Documents whose `_id` is one of the values
    Ids { values: Vec<String> },
    /// Documents whose field equals the value (any element for list fields)
    Term { field: String, value: Value },
    /// Documents whose field equals any of the values
    Terms { field: String, values: Vec<Value> },
    /// Documents matching all sub-queries
    Bool { must: Vec<Query> },
}

impl Query {
    pub fn ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        Query::Ids {
            values: ids.into_iter().map(|id| id.to_string()).collect(),
        }
    }

    pub fn term(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Query::Term {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn terms<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Query::Terms {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether `doc` matches this query.
    pub fn matches(&self, doc: &StoredDocument) -> bool {
        match self {
            Query::MatchAll => true,
            Query::Ids { values } => values.iter().any(|v| v == doc.id.as_str()),
            Query::Term { field, value } => field_matches(doc, field, std::slice::from_ref(value)),
            Query::Terms { field, values } => field_matches(doc, field, values),
            Query::Bool { must } => must.iter().all(|q| q.matches(doc)),
        }
    }
}

fn field_matches(doc: &StoredDocument, field: &str, wanted: &[Value]) -> bool {
    let Some(found) = lookup(&doc.source, field) else {
        return false;
    };
    match found {
        Value::Array(items) => items.iter().any(|item| wanted.iter().any(|w| values_equal(item, w))),
        other => wanted.iter().any(|w| values_equal(other, w)),
    }
}

/// Resolve a dotted path such as `area.name`.
fn lookup<'a>(source: &'a serde_json::Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = source.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        _ => a == b,
    }
}
