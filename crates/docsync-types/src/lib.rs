//! # docsync-types
//!
//! Shared types for the docsync search-index synchronization engine.
//!
//! This crate defines the data structures every other crate agrees on:
//! - Documents: doc-type names, raw field maps and document ids
//! - Mappings: the field schema declared for a doc type
//! - Settings: layered configuration for the CLI and the rebuild engine
//!
//! ## Usage
//!
//! ```rust
//! use docsync_types::{DocType, Mapping, FieldType};
//!
//! let doc_type = DocType::new("officer");
//! let mapping = Mapping::strict().with_field("full_name", FieldType::Text);
//! assert_eq!(doc_type.as_str(), "officer");
//! assert!(!mapping.dynamic);
//! ```

pub mod config;
pub mod document;
pub mod error;
pub mod mapping;

pub use config::{IndexerSettings, RebuildSettings, Settings};
pub use document::{DocId, DocType, OpType, RawDoc, ID_FIELD};
pub use error::SyncError;
pub use mapping::{FieldType, Mapping};
