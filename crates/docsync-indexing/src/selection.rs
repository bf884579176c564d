//! Indexer selection: which registered indexers a rebuild runs.
//!
//! Tokens are either `group` or `group.doc_type`. A selection file maps
//! groups to doc type patterns, where `*` matches any run of characters:
//!
//! ```json
//! {"officers": ["*"], "cr": ["cr", "timeline_*"]}
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use tracing::warn;

use crate::error::IndexingError;
use crate::registry::{IndexerRegistry, RegisteredIndexer};

/// One selection criterion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionItem {
    /// Every indexer of the group
    Group(String),
    /// Indexers of the group producing exactly this doc type
    DocType { group: String, doc_type: String },
    /// Indexers of the group whose doc type matches a `*` pattern
    Pattern { group: String, pattern: String },
}

/// A set of selection criteria; empty selects every indexer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    items: Vec<SelectionItem>,
}

impl Selection {
    /// Select every registered indexer.
    pub fn all() -> Self {
        Self::default()
    }

    /// Parse `group` / `group.doc_type` tokens.
    pub fn parse<I, S>(tokens: I) -> Result<Self, IndexingError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let items = tokens
            .into_iter()
            .map(|token| parse_token(token.as_ref()))
            .collect::<Result<_, _>>()?;
        Ok(Self { items })
    }

    /// Parse a `{"group": ["doc_type" | pattern, ...]}` document.
    pub fn from_json_str(json: &str) -> Result<Self, IndexingError> {
        let groups: BTreeMap<String, Vec<String>> = serde_json::from_str(json)
            .map_err(|e| IndexingError::Selection(format!("invalid selection file: {e}")))?;

        let mut items = Vec::new();
        for (group, patterns) in groups {
            check_part(&group, &group)?;
            for pattern in patterns {
                check_part(&pattern, &format!("{group}: {pattern}"))?;
                items.push(if pattern == "*" {
                    SelectionItem::Group(group.clone())
                } else if pattern.contains('*') {
                    SelectionItem::Pattern {
                        group: group.clone(),
                        pattern,
                    }
                } else {
                    SelectionItem::DocType {
                        group: group.clone(),
                        doc_type: pattern,
                    }
                });
            }
        }
        Ok(Self { items })
    }

    pub fn from_file(path: &Path) -> Result<Self, IndexingError> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Add the criteria of `other` to this selection.
    pub fn extend(&mut self, other: Selection) {
        self.items.extend(other.items);
    }

    pub fn items(&self) -> &[SelectionItem] {
        &self.items
    }

    pub fn is_all(&self) -> bool {
        self.items.is_empty()
    }

    /// Resolve against `registry`, de-duplicated, in registration order.
    ///
    /// Unknown groups and unmatched explicit doc types are errors; a
    /// pattern matching nothing is only logged.
    pub fn resolve<'r>(
        &self,
        registry: &'r IndexerRegistry,
    ) -> Result<Vec<&'r RegisteredIndexer>, IndexingError> {
        if self.is_all() {
            return Ok(registry.all().collect());
        }

        let mut selected = BTreeSet::new();
        for item in &self.items {
            let group = match item {
                SelectionItem::Group(group)
                | SelectionItem::DocType { group, .. }
                | SelectionItem::Pattern { group, .. } => group,
            };
            if !registry.has_group(group) {
                return Err(IndexingError::Selection(format!("unknown indexer group '{group}'")));
            }

            let matched: Vec<&RegisteredIndexer> = match item {
                SelectionItem::Group(group) => registry.group(group),
                SelectionItem::DocType { group, doc_type } => {
                    let found = registry.find(group, doc_type);
                    if found.is_empty() {
                        return Err(IndexingError::Selection(format!(
                            "no indexer for '{group}.{doc_type}'"
                        )));
                    }
                    found
                }
                SelectionItem::Pattern { group, pattern } => {
                    let found: Vec<_> = registry
                        .group(group)
                        .into_iter()
                        .filter(|e| wildcard_match(pattern, e.unit().doc_type().as_str()))
                        .collect();
                    if found.is_empty() {
                        warn!(group = %group, pattern = %pattern, "Selection pattern matched no indexer");
                    }
                    found
                }
            };
            selected.extend(matched.into_iter().map(RegisteredIndexer::position));
        }

        Ok(registry
            .all()
            .filter(|e| selected.contains(&e.position()))
            .collect())
    }
}

fn parse_token(token: &str) -> Result<SelectionItem, IndexingError> {
    let token = token.trim();
    match token.split_once('.') {
        None => {
            check_part(token, token)?;
            Ok(SelectionItem::Group(token.to_string()))
        }
        Some((group, doc_type)) => {
            check_part(group, token)?;
            check_part(doc_type, token)?;
            if doc_type.contains('.') {
                return Err(IndexingError::Selection(format!(
                    "expected 'group' or 'group.doc_type', got '{token}'"
                )));
            }
            Ok(if doc_type == "*" {
                SelectionItem::Group(group.to_string())
            } else if doc_type.contains('*') {
                SelectionItem::Pattern {
                    group: group.to_string(),
                    pattern: doc_type.to_string(),
                }
            } else {
                SelectionItem::DocType {
                    group: group.to_string(),
                    doc_type: doc_type.to_string(),
                }
            })
        }
    }
}

fn check_part(part: &str, context: &str) -> Result<(), IndexingError> {
    if part.trim().is_empty() {
        return Err(IndexingError::Selection(format!("empty name in '{context}'")));
    }
    Ok(())
}

/// Match `text` against a pattern where `*` stands for any run of characters.
fn wildcard_match(pattern: &str, text: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == text;
    }

    let (first, last) = (parts[0], parts[parts.len() - 1]);
    if !text.starts_with(first) || text.len() < first.len() + last.len() || !text.ends_with(last) {
        return false;
    }

    let mut rest = &text[first.len()..text.len() - last.len()];
    for middle in &parts[1..parts.len() - 1] {
        match rest.find(middle) {
            Some(at) => rest = &rest[at + middle.len()..],
            None => return false,
        }
    }
    true
}
