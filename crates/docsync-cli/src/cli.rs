//! CLI argument parsing for docsync.
//!
//! CLI flags override every other configuration source.

use clap::{Parser, Subcommand};

/// docsync
///
/// Keeps search indices in sync with their source records.
#[derive(Parser, Debug)]
#[command(name = "docsync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/docsync/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Override the index store snapshot path
    #[arg(long, global = true)]
    pub store_path: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// docsync commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Rebuild indices from scratch and swap their aliases
    ///
    /// SELECTION is a list of `group` or `group.doc_type` names; empty
    /// rebuilds every configured indexer.
    Rebuild {
        /// Indexers to rebuild
        selection: Vec<String>,

        /// JSON file mapping groups to doc type patterns
        #[arg(short, long)]
        from_file: Option<String>,

        /// Keep running the other indexers of an alias after a failure
        #[arg(long)]
        continue_on_error: bool,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Re-index the documents of changed keys in place
    Update {
        /// Indexer to run, as `group.doc_type`
        target: String,

        /// Changed source keys, comma separated
        #[arg(short, long, value_delimiter = ',', required = true)]
        keys: Vec<String>,
    },

    /// Show aliases, physical indices and document counts
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// List configured indexers by group
    List,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_rebuild_all() {
        let cli = Cli::parse_from(["docsync", "rebuild"]);
        match cli.command {
            Commands::Rebuild {
                selection,
                from_file,
                continue_on_error,
                json,
            } => {
                assert!(selection.is_empty());
                assert!(from_file.is_none());
                assert!(!continue_on_error);
                assert!(!json);
            }
            _ => panic!("Expected Rebuild command"),
        }
    }

    #[test]
    fn test_cli_rebuild_selection() {
        let cli = Cli::parse_from(["docsync", "rebuild", "officers", "cr.cr", "--continue-on-error"]);
        match cli.command {
            Commands::Rebuild {
                selection,
                continue_on_error,
                ..
            } => {
                assert_eq!(selection, vec!["officers", "cr.cr"]);
                assert!(continue_on_error);
            }
            _ => panic!("Expected Rebuild command"),
        }
    }

    #[test]
    fn test_cli_rebuild_from_file() {
        let cli = Cli::parse_from(["docsync", "rebuild", "-f", "/tmp/selection.json"]);
        match cli.command {
            Commands::Rebuild { from_file, .. } => {
                assert_eq!(from_file, Some("/tmp/selection.json".to_string()))
            }
            _ => panic!("Expected Rebuild command"),
        }
    }

    #[test]
    fn test_cli_update_keys() {
        let cli = Cli::parse_from(["docsync", "update", "officers.officer", "--keys", "1,2,3"]);
        match cli.command {
            Commands::Update { target, keys } => {
                assert_eq!(target, "officers.officer");
                assert_eq!(keys, vec!["1", "2", "3"]);
            }
            _ => panic!("Expected Update command"),
        }
    }

    #[test]
    fn test_cli_update_requires_keys() {
        assert!(Cli::try_parse_from(["docsync", "update", "officers.officer"]).is_err());
    }

    #[test]
    fn test_cli_status() {
        let cli = Cli::parse_from(["docsync", "status"]);
        assert!(matches!(cli.command, Commands::Status { json: false }));
    }

    #[test]
    fn test_cli_list() {
        let cli = Cli::parse_from(["docsync", "list"]);
        assert!(matches!(cli.command, Commands::List));
    }

    #[test]
    fn test_cli_global_flags() {
        let cli = Cli::parse_from([
            "docsync",
            "status",
            "--config",
            "/path/to/config.toml",
            "--log-level",
            "debug",
            "--store-path",
            "/tmp/store.json",
        ]);
        assert_eq!(cli.config, Some("/path/to/config.toml".to_string()));
        assert_eq!(cli.log_level, Some("debug".to_string()));
        assert_eq!(cli.store_path, Some("/tmp/store.json".to_string()));
    }
}
