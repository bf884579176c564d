//! # docsync-store
//!
//! The document index store the synchronization engine publishes into.
//!
//! The engine only talks to the [`IndexStore`] trait. This crate also ships
//! [`MemoryIndexStore`], an in-process implementation with near-real-time
//! refresh semantics, strict/dynamic mappings, alias pointers and JSON
//! snapshot persistence.
//!
//! ## Features
//! - Bulk envelopes with `index` / `update` / `delete` operations
//! - Update-by-script upserts through the typed [`EmbedScript`] builder
//! - Delete-by-query and count over [`Query`] objects
//! - Atomic alias swaps for blue-green index replacement

pub mod bulk;
pub mod error;
pub mod memory;
pub mod query;
pub mod script;
pub mod settings;
pub mod store;

pub use bulk::{BulkFailure, BulkOp, BulkResponse, UpdateAction};
pub use error::StoreError;
pub use memory::MemoryIndexStore;
pub use query::Query;
pub use script::{EmbedScript, FieldName, ScriptStep, NEW_DOC_PARAM};
pub use settings::{IndexSettings, RefreshInterval};
pub use store::{IndexInfo, IndexStore, StoredDocument};
