//! Field schema declared for a doc type.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Type of a mapped field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Keyword,
    Text,
    Long,
    Double,
    Boolean,
    Date,
    Object,
    Nested,
}

/// Mapping (schema) of one doc type.
///
/// A dynamic mapping accepts any field. A strict mapping rejects
/// documents carrying top-level fields it does not declare.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapping {
    #[serde(default = "default_dynamic")]
    pub dynamic: bool,

    #[serde(default)]
    pub fields: BTreeMap<String, FieldType>,
}

fn default_dynamic() -> bool {
    true
}

impl Default for Mapping {
    fn default() -> Self {
        Self::dynamic()
    }
}

impl Mapping {
    /// A mapping that accepts every field.
    pub fn dynamic() -> Self {
        Self {
            dynamic: true,
            fields: BTreeMap::new(),
        }
    }

    /// A mapping that only accepts declared fields.
    pub fn strict() -> Self {
        Self {
            dynamic: false,
            fields: BTreeMap::new(),
        }
    }

    /// Declare a field.
    pub fn with_field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.insert(name.into(), field_type);
        self
    }

    /// Fields of `source` this mapping does not accept.
    pub fn undeclared_fields<'a, I>(&self, field_names: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        if self.dynamic {
            return Vec::new();
        }
        field_names
            .into_iter()
            .filter(|name| !self.fields.contains_key(*name))
            .cloned()
            .collect()
    }
}
