//! docsync
//!
//! Keeps search indices in sync with their source records.
//!
//! # Usage
//!
//! ```bash
//! docsync rebuild [SELECTION]... [--from-file FILE] [--continue-on-error]
//! docsync update <group.doc_type> --keys 1,2,3
//! docsync status
//! docsync list
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/docsync/config.toml)
//! 3. Environment variables (DOCSYNC__*)
//! 4. CLI flags

use anyhow::Result;
use clap::Parser;

use docsync_cli::{
    handle_list, handle_rebuild, handle_status, handle_update, init_logging, load_settings, Cli,
    Commands,
};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = load_settings(
        cli.config.as_deref(),
        cli.store_path.as_deref(),
        cli.log_level.as_deref(),
    )?;
    init_logging(&settings.log_level)?;

    match cli.command {
        Commands::Rebuild {
            selection,
            from_file,
            continue_on_error,
            json,
        } => {
            handle_rebuild(
                &settings,
                &selection,
                from_file.as_deref(),
                continue_on_error,
                json,
            )?;
        }
        Commands::Update { target, keys } => {
            handle_update(&settings, &target, &keys)?;
        }
        Commands::Status { json } => {
            handle_status(&settings, json)?;
        }
        Commands::List => {
            handle_list(&settings)?;
        }
    }

    Ok(())
}
