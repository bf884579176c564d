//! Configuration loading for docsync.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! The default config file lives at ~/.config/docsync/config.toml.

use std::path::PathBuf;

use config::{Config, Environment, File};
use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};

use crate::document::{DocType, OpType, ID_FIELD};
use crate::error::SyncError;
use crate::mapping::Mapping;

/// Tuning knobs of the rebuild engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebuildSettings {
    /// Keys per partial-update batch (bounds query and delete-by-query size).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Documents per bulk request.
    #[serde(default = "default_bulk_chunk_size")]
    pub bulk_chunk_size: usize,

    /// Refresh interval restored after a bulk load (e.g. "1s").
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: String,

    /// Abort the remaining indexers of an alias group on the first failure.
    #[serde(default = "default_fail_fast")]
    pub fail_fast: bool,

    /// Log progress every N source records.
    #[serde(default = "default_progress_every")]
    pub progress_every: usize,
}

fn default_batch_size() -> usize {
    1000
}

fn default_bulk_chunk_size() -> usize {
    500
}

fn default_refresh_interval() -> String {
    "1s".to_string()
}

fn default_fail_fast() -> bool {
    true
}

fn default_progress_every() -> usize {
    1000
}

impl Default for RebuildSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            bulk_chunk_size: default_bulk_chunk_size(),
            refresh_interval: default_refresh_interval(),
            fail_fast: default_fail_fast(),
            progress_every: default_progress_every(),
        }
    }
}

/// One config-declared indexer over a JSON-lines record file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerSettings {
    /// Logical group the indexer is registered under
    pub group: String,

    /// Doc type the indexer produces
    pub doc_type: DocType,

    /// Logical index alias the documents are published to
    pub alias: String,

    /// Path to the JSON-lines file holding the source records
    pub source: String,

    /// List field on the parent document that records are appended to
    #[serde(default)]
    pub parent_doc_type_property: Option<String>,

    /// Bulk operation used for the produced documents
    #[serde(default)]
    pub op_type: OpType,

    /// Record field identifying a record for partial updates
    #[serde(default = "default_key_field")]
    pub key_field: String,

    /// Field schema of the doc type
    #[serde(default)]
    pub mapping: Mapping,
}

fn default_key_field() -> String {
    ID_FIELD.to_string()
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Path of the index store snapshot file
    #[serde(default = "default_store_path")]
    pub store_path: String,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Rebuild engine tuning
    #[serde(default)]
    pub rebuild: RebuildSettings,

    /// Indexers declared in the config file
    #[serde(default)]
    pub indexers: Vec<IndexerSettings>,
}

fn default_store_path() -> String {
    ProjectDirs::from("", "", "docsync")
        .map(|p| p.data_local_dir().join("index-store.json"))
        .unwrap_or_else(|| PathBuf::from("./index-store.json"))
        .to_string_lossy()
        .to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            log_level: default_log_level(),
            rebuild: RebuildSettings::default(),
            indexers: Vec::new(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/docsync/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (DOCSYNC__*, nested keys joined by `__`)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, SyncError> {
        let config_dir = ProjectDirs::from("", "", "docsync")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");
        let rebuild = RebuildSettings::default();

        let mut builder = Config::builder()
            .set_default("store_path", default_store_path())
            .map_err(|e| SyncError::Config(e.to_string()))?
            .set_default("log_level", default_log_level())
            .map_err(|e| SyncError::Config(e.to_string()))?
            .set_default("rebuild.batch_size", rebuild.batch_size as i64)
            .map_err(|e| SyncError::Config(e.to_string()))?
            .set_default("rebuild.bulk_chunk_size", rebuild.bulk_chunk_size as i64)
            .map_err(|e| SyncError::Config(e.to_string()))?
            .set_default("rebuild.refresh_interval", rebuild.refresh_interval)
            .map_err(|e| SyncError::Config(e.to_string()))?
            .set_default("rebuild.fail_fast", rebuild.fail_fast)
            .map_err(|e| SyncError::Config(e.to_string()))?
            .set_default("rebuild.progress_every", rebuild.progress_every as i64)
            .map_err(|e| SyncError::Config(e.to_string()))?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // DOCSYNC__STORE_PATH, DOCSYNC__REBUILD__BATCH_SIZE, ...
        builder = builder.add_source(
            Environment::with_prefix("DOCSYNC")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| SyncError::Config(e.to_string()))?;

        let settings: Settings = config
            .try_deserialize()
            .map_err(|e| SyncError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.rebuild.batch_size == 0 {
            return Err(SyncError::Config("rebuild.batch_size must be > 0".to_string()));
        }
        if self.rebuild.bulk_chunk_size == 0 {
            return Err(SyncError::Config(
                "rebuild.bulk_chunk_size must be > 0".to_string(),
            ));
        }
        for indexer in &self.indexers {
            if indexer.group.is_empty() || indexer.alias.is_empty() {
                return Err(SyncError::Config(format!(
                    "indexer for doc type '{}' needs a group and an alias",
                    indexer.doc_type
                )));
            }
            if indexer.group.contains('.') {
                return Err(SyncError::Config(format!(
                    "group name '{}' must not contain '.'",
                    indexer.group
                )));
            }
        }
        Ok(())
    }

    /// Expand ~ in store_path to the home directory
    pub fn expanded_store_path(&self) -> PathBuf {
        if let Some(rest) = self.store_path.strip_prefix("~/") {
            if let Some(dirs) = BaseDirs::new() {
                return dirs.home_dir().join(rest);
            }
        }
        PathBuf::from(&self.store_path)
    }
}
