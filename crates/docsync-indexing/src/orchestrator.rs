//! Index build orchestrator.
//!
//! Resolves a selection, groups the selected indexers by target alias and
//! rebuilds each alias inside exactly one `indexing()` scope, so indexers
//! sharing an alias publish together in a single swap.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use docsync_types::DocType;

use crate::alias::IndexAlias;
use crate::config::RebuildConfig;
use crate::error::IndexingError;
use crate::registry::{IndexerRegistry, RegisteredIndexer};
use crate::reindex::ReindexReport;
use crate::selection::Selection;

/// Outcome of one alias group.
#[derive(Debug, Clone, Serialize)]
pub struct AliasGroupOutcome {
    pub alias: String,
    /// `group.doc_type` labels of the indexers in the group
    pub indexers: Vec<String>,
    pub reports: Vec<ReindexReport>,
    /// Documents of unselected doc types carried into the new index
    pub docs_migrated: u64,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    /// Failure message; `None` when the alias was swapped
    pub error: Option<String>,
}

impl AliasGroupOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of an orchestrated rebuild.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RebuildSummary {
    pub groups: Vec<AliasGroupOutcome>,
}

impl RebuildSummary {
    pub fn has_failures(&self) -> bool {
        self.groups.iter().any(|g| !g.succeeded())
    }

    pub fn failed_aliases(&self) -> Vec<&str> {
        self.groups
            .iter()
            .filter(|g| !g.succeeded())
            .map(|g| g.alias.as_str())
            .collect()
    }

    /// Documents written across every successful group.
    pub fn docs_written(&self) -> u64 {
        self.groups
            .iter()
            .filter(|g| g.succeeded())
            .flat_map(|g| g.reports.iter())
            .map(|r| r.docs_written)
            .sum()
    }
}

/// Runs selected indexers, one `indexing()` scope per alias.
pub struct IndexBuildOrchestrator<'r> {
    registry: &'r IndexerRegistry,
    config: RebuildConfig,
}

impl<'r> IndexBuildOrchestrator<'r> {
    pub fn new(registry: &'r IndexerRegistry, config: RebuildConfig) -> Self {
        Self { registry, config }
    }

    /// Resolve `selection` and rebuild every alias it touches.
    ///
    /// Only selection errors are returned as `Err`; indexer failures are
    /// reported per alias group in the summary.
    pub fn rebuild(&self, selection: &Selection) -> Result<RebuildSummary, IndexingError> {
        let selected = selection.resolve(self.registry)?;
        if selected.is_empty() {
            warn!("Selection matched no indexers");
        }
        Ok(self.rebuild_indexers(&selected))
    }

    /// Rebuild the given indexers, grouped by alias.
    ///
    /// Alias groups are independent: a failing group does not stop the
    /// others.
    pub fn rebuild_indexers(&self, selected: &[&RegisteredIndexer]) -> RebuildSummary {
        let mut groups: BTreeMap<&str, (&Arc<IndexAlias>, Vec<&RegisteredIndexer>)> = BTreeMap::new();
        for entry in selected {
            let alias = entry.unit().index_alias();
            groups
                .entry(alias.name())
                .or_insert_with(|| (alias, Vec::new()))
                .1
                .push(*entry);
        }

        let mut summary = RebuildSummary::default();
        for (name, (alias, members)) in groups {
            let started_at = Utc::now();
            let started = Instant::now();
            let labels: Vec<String> = members.iter().map(|m| m.label()).collect();
            info!(alias = name, indexers = ?labels, "Rebuilding alias");

            let result = self.rebuild_alias_group(alias, &members);
            let elapsed_ms = started.elapsed().as_millis() as u64;
            let outcome = match result {
                Ok((reports, docs_migrated)) => {
                    info!(alias = name, elapsed_ms, "Alias rebuilt");
                    AliasGroupOutcome {
                        alias: name.to_string(),
                        indexers: labels,
                        reports,
                        docs_migrated,
                        started_at,
                        elapsed_ms,
                        error: None,
                    }
                }
                Err(e) => {
                    error!(alias = name, error = %e, "Alias rebuild failed");
                    AliasGroupOutcome {
                        alias: name.to_string(),
                        indexers: labels,
                        reports: Vec::new(),
                        docs_migrated: 0,
                        started_at,
                        elapsed_ms,
                        error: Some(e.to_string()),
                    }
                }
            };
            summary.groups.push(outcome);
        }
        summary
    }

    /// Prepare every member, then inside one scope: create every mapping,
    /// carry over unselected doc types, populate every member.
    fn rebuild_alias_group(
        &self,
        alias: &IndexAlias,
        members: &[&RegisteredIndexer],
    ) -> Result<(Vec<ReindexReport>, u64), IndexingError> {
        let mut failures = Vec::new();

        for member in members {
            if let Err(e) = member.unit().prepare() {
                self.record_failure(member, e, &mut failures)?;
            }
        }
        if !failures.is_empty() {
            return Err(IndexingError::AliasGroup {
                alias: alias.name().to_string(),
                failures,
            });
        }

        alias.indexing(|| {
            let mut mappings = BTreeMap::new();
            for member in members {
                match member.unit().create_mapping() {
                    Ok(created) => {
                        mappings.insert(member.position(), created);
                    }
                    Err(e) => self.record_failure(member, e, &mut failures)?,
                }
            }

            let rebuilt: BTreeSet<&DocType> = members
                .iter()
                .filter(|m| m.unit().owned_mapping().is_some())
                .map(|m| m.unit().doc_type())
                .collect();
            let carried: Vec<DocType> = alias
                .declared_doc_types()?
                .into_iter()
                .map(|(doc_type, _)| doc_type)
                .filter(|doc_type| !rebuilt.contains(doc_type))
                .collect();
            let docs_migrated = alias.migrate(&carried)?;

            let mut reports = Vec::new();
            for member in members {
                match member.unit().populate() {
                    Ok(mut report) => {
                        report.mappings_created += mappings.get(&member.position()).copied().unwrap_or(0);
                        reports.push(report);
                    }
                    Err(e) => self.record_failure(member, e, &mut failures)?,
                }
            }

            if !failures.is_empty() {
                return Err(IndexingError::AliasGroup {
                    alias: alias.name().to_string(),
                    failures: std::mem::take(&mut failures),
                });
            }
            Ok((reports, docs_migrated))
        })
    }

    /// Fail fast, or note the failure and carry on with the group.
    fn record_failure(
        &self,
        member: &RegisteredIndexer,
        error: IndexingError,
        failures: &mut Vec<String>,
    ) -> Result<(), IndexingError> {
        if self.config.fail_fast {
            return Err(error);
        }
        warn!(indexer = %member.label(), error = %error, "Indexer failed, continuing alias group");
        failures.push(format!("{}: {error}", member.label()));
        Ok(())
    }
}
