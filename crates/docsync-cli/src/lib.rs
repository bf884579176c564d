//! docsync command-line library.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations (rebuild, update, status, list)
//! - `configured`: Indexers declared in the config file

pub mod cli;
pub mod commands;
pub mod configured;

pub use cli::{Cli, Commands};
pub use commands::{
    handle_list, handle_rebuild, handle_status, handle_update, init_logging, load_settings,
};
pub use configured::{ConfigModule, ConfiguredIndexer};
