//! Typed update scripts for embedding child documents into a parent.
//!
//! An [`EmbedScript`] is built from structured inputs (a validated
//! [`FieldName`] and the child payload), never by splicing strings, so
//! the rendered script cannot be altered by document content.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use docsync_types::RawDoc;

use crate::error::StoreError;

/// Script parameter carrying the appended child document.
pub const NEW_DOC_PARAM: &str = "new_doc";

/// A field name usable inside a script: `[A-Za-z_][A-Za-z0-9_]*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldName(String);

impl FieldName {
    pub fn new(name: impl Into<String>) -> Result<Self, StoreError> {
        let name = name.into();
        let mut chars = name.chars();
        let valid_start = chars
            .next()
            .map(|c| c.is_ascii_alphabetic() || c == '_')
            .unwrap_or(false);
        if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            Ok(Self(name))
        } else {
            Err(StoreError::InvalidFieldName(name))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for FieldName {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<FieldName> for String {
    fn from(value: FieldName) -> Self {
        value.0
    }
}

/// One instruction of an update script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ScriptStep {
    /// Create `field` as an empty list when the document lacks it
    EnsureList { field: FieldName },
    /// Append the named parameter to the list `field`
    Append { field: FieldName, param: FieldName },
}

/// Guard-and-append update script.
///
/// Applying the same script twice appends twice: delivery of a child
/// into one rebuild cycle must happen at most once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedScript {
    steps: Vec<ScriptStep>,
    params: BTreeMap<String, Value>,
}

impl EmbedScript {
    /// Script appending `child` to the list `field`, creating it if absent.
    pub fn append_to(field: FieldName, child: RawDoc) -> Self {
        let mut params = BTreeMap::new();
        params.insert(NEW_DOC_PARAM.to_string(), Value::Object(child));
        Self {
            steps: vec![
                ScriptStep::EnsureList {
                    field: field.clone(),
                },
                ScriptStep::Append {
                    field,
                    param: FieldName(NEW_DOC_PARAM.to_string()),
                },
            ],
            params,
        }
    }

    pub fn steps(&self) -> &[ScriptStep] {
        &self.steps
    }

    pub fn params(&self) -> &BTreeMap<String, Value> {
        &self.params
    }

    /// Painless source equivalent of the steps.
    ///
    /// Field and parameter names are interpolated as-is. That is sound only
    /// because every one of them is a [`FieldName`], whose constructor and
    /// deserializer admit nothing but `[A-Za-z_][A-Za-z0-9_]*`; widening
    /// [`FieldName::new`] would make this rendering injectable.
    pub fn source(&self) -> String {
        self.steps
            .iter()
            .map(|step| match step {
                ScriptStep::EnsureList { field } => format!(
                    "if (!ctx._source.containsKey('{field}')) {{ ctx._source.{field} = [] }}"
                ),
                ScriptStep::Append { field, param } => {
                    format!("ctx._source.{field}.add(params.{param})")
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Wire form: `{"source": ..., "lang": "painless", "params": {...}}`.
    pub fn to_json(&self) -> Value {
        json!({
            "source": self.source(),
            "lang": "painless",
            "params": self.params,
        })
    }

    /// Run the script against a stored document body.
    pub fn apply(&self, target: &mut RawDoc) -> Result<(), StoreError> {
        for step in &self.steps {
            match step {
                ScriptStep::EnsureList { field } => {
                    target
                        .entry(field.as_str().to_string())
                        .or_insert_with(|| Value::Array(Vec::new()));
                }
                ScriptStep::Append { field, param } => {
                    let value = self
                        .params
                        .get(param.as_str())
                        .cloned()
                        .ok_or_else(|| StoreError::Script(format!("missing param '{param}'")))?;
                    match target.get_mut(field.as_str()) {
                        Some(Value::Array(items)) => items.push(value),
                        Some(_) => {
                            return Err(StoreError::Script(format!(
                                "field '{field}' is not a list"
                            )))
                        }
                        None => {
                            return Err(StoreError::Script(format!(
                                "field '{field}' does not exist"
                            )))
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
