//! Command implementations.
//!
//! Every command loads the store snapshot, works on it in memory and
//! writes it back, so aliases and indices persist across invocations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use tracing::{info, warn};

use docsync_indexing::{
    IndexBuildOrchestrator, IndexerRegistry, LoggingProgressCallback, PartialReindexer,
    RebuildConfig, RebuildSummary, Reindex, ReindexReport, Selection,
};
use docsync_store::{IndexInfo, IndexStore, MemoryIndexStore};
use docsync_types::{DocId, Settings};

use crate::configured::{ConfigModule, ConfiguredIndexer};

/// Load settings and apply CLI overrides (highest precedence).
pub fn load_settings(
    config_path: Option<&str>,
    store_path_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Settings> {
    let mut settings = Settings::load(config_path).context("Failed to load configuration")?;
    if let Some(store_path) = store_path_override {
        settings.store_path = store_path.to_string();
    }
    if let Some(log_level) = log_level_override {
        settings.log_level = log_level.to_string();
    }
    Ok(settings)
}

/// Install the global tracing subscriber; `RUST_LOG` wins over `log_level`.
pub fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

/// Store snapshot plus the indexers configured over it.
struct Engine {
    store: Arc<MemoryIndexStore>,
    store_path: PathBuf,
    module: ConfigModule,
}

impl Engine {
    fn open(settings: &Settings, fail_fast: bool) -> Result<Self> {
        let store_path = settings.expanded_store_path();
        info!(path = %store_path.display(), "Opening index store");
        let store = Arc::new(
            MemoryIndexStore::load_snapshot(&store_path).context("Failed to open index store")?,
        );

        let config = RebuildConfig::try_from(&settings.rebuild)
            .context("Invalid rebuild settings")?
            .with_fail_fast(fail_fast);
        let progress = Arc::new(LoggingProgressCallback::new(config.progress_every));
        let module = ConfigModule::new(&settings.indexers, store.clone(), config, progress);

        Ok(Self {
            store,
            store_path,
            module,
        })
    }

    fn registry(&self) -> Result<IndexerRegistry> {
        IndexerRegistry::discover(&[&self.module]).context("Failed to register indexers")
    }

    fn save(&self) -> Result<()> {
        self.store
            .save_snapshot(&self.store_path)
            .context("Failed to save index store")
    }
}

/// Rebuild the selected indexers; an empty selection rebuilds everything.
pub fn rebuild(
    settings: &Settings,
    tokens: &[String],
    from_file: Option<&str>,
    continue_on_error: bool,
) -> Result<RebuildSummary> {
    let mut selection = Selection::parse(tokens)?;
    if let Some(path) = from_file {
        selection.extend(
            Selection::from_file(Path::new(path))
                .with_context(|| format!("Failed to read selection file {path}"))?,
        );
    }

    let engine = Engine::open(settings, settings.rebuild.fail_fast && !continue_on_error)?;
    let registry = engine.registry()?;
    let summary = IndexBuildOrchestrator::new(&registry, engine.module.config().clone())
        .rebuild(&selection)?;
    engine.save()?;
    Ok(summary)
}

pub fn handle_rebuild(
    settings: &Settings,
    tokens: &[String],
    from_file: Option<&str>,
    continue_on_error: bool,
    json: bool,
) -> Result<()> {
    let summary = rebuild(settings, tokens, from_file, continue_on_error)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }

    let failed = summary.failed_aliases();
    if !failed.is_empty() {
        bail!("Rebuild failed for aliases: {}", failed.join(", "));
    }
    Ok(())
}

fn print_summary(summary: &RebuildSummary) {
    if summary.groups.is_empty() {
        println!("Nothing to rebuild");
        return;
    }
    for group in &summary.groups {
        match &group.error {
            None => println!(
                "{}: rebuilt in {} ms ({} migrated)",
                group.alias, group.elapsed_ms, group.docs_migrated
            ),
            Some(error) => println!("{}: FAILED: {error}", group.alias),
        }
        for report in &group.reports {
            println!(
                "  {:<32} read {:>8}  written {:>8}",
                report.indexer, report.records_read, report.docs_written
            );
        }
    }
    println!("Total documents written: {}", summary.docs_written());
}

/// Re-index the documents of `keys` for the indexer named by `target`.
pub fn update(settings: &Settings, target: &str, keys: &[String]) -> Result<ReindexReport> {
    let (group, doc_type) = target
        .split_once('.')
        .ok_or_else(|| anyhow!("Expected 'group.doc_type', got '{target}'"))?;

    let engine = Engine::open(settings, settings.rebuild.fail_fast)?;
    // Registration declares every doc type on its alias, so missing
    // mappings can be created.
    let _registry = engine.registry()?;

    let entry = engine.module.find(group, doc_type).ok_or_else(|| {
        anyhow!("No configured indexer for '{target}' (embedding indexers only support rebuild)")
    })?;
    let indexer = ConfiguredIndexer::new(entry, engine.module.alias(&entry.alias)?)?
        .with_update_keys(keys.iter().map(|key| DocId::new(key.trim())));
    let unit = PartialReindexer::new(indexer, engine.module.config().clone())
        .with_progress(engine.module.progress());

    let result = unit.reindex();
    if result.is_err() {
        warn!(indexer = target, "Partial update failed; saving the store as it stands");
    }
    engine.save()?;
    result.with_context(|| format!("Partial update of {target} failed"))
}

pub fn handle_update(settings: &Settings, target: &str, keys: &[String]) -> Result<()> {
    let report = update(settings, target, keys)?;
    println!(
        "{}: deleted {}, written {} ({} records read, {} migrated)",
        report.indexer, report.docs_deleted, report.docs_written, report.records_read, report.docs_migrated
    );
    Ok(())
}

/// Physical indices in the store snapshot.
pub fn status(settings: &Settings) -> Result<Vec<IndexInfo>> {
    let store = MemoryIndexStore::load_snapshot(&settings.expanded_store_path())
        .context("Failed to open index store")?;
    Ok(store.list_indices()?)
}

pub fn handle_status(settings: &Settings, json: bool) -> Result<()> {
    let indices = status(settings)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&indices)?);
        return Ok(());
    }

    println!("Index store: {}", settings.expanded_store_path().display());
    if indices.is_empty() {
        println!("No indices");
        return Ok(());
    }
    for index in &indices {
        let aliases = if index.aliases.is_empty() {
            "-".to_string()
        } else {
            index.aliases.join(", ")
        };
        println!(
            "{} [{}] aliases: {aliases} refresh: {} created: {}",
            index.name,
            if index.open { "open" } else { "closed" },
            index.settings.refresh_interval,
            index.created_at.format("%Y-%m-%d %H:%M:%S")
        );
        for (doc_type, count) in &index.doc_counts {
            println!("  {doc_type:<24} {count:>10}");
        }
    }
    Ok(())
}

/// Print the configured indexers by group.
pub fn handle_list(settings: &Settings) -> Result<()> {
    let module = ConfigModule::new(
        &settings.indexers,
        Arc::new(MemoryIndexStore::new()),
        RebuildConfig::default(),
        Arc::new(LoggingProgressCallback::new(settings.rebuild.progress_every)),
    );
    let registry = IndexerRegistry::discover(&[&module]).context("Failed to register indexers")?;

    if registry.is_empty() {
        println!("No indexers configured");
        return Ok(());
    }
    for group in registry.groups() {
        println!("{group}");
        for entry in registry.group(group) {
            let unit = entry.unit();
            println!(
                "  {:<24} -> {} ({})",
                unit.name(),
                unit.index_alias().name(),
                if unit.owned_mapping().is_some() { "owner" } else { "embed" }
            );
        }
    }
    Ok(())
}
