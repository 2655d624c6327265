//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//! - `--config <path>`: TOML config file (default `taxonomy.toml`, optional)
//! - `--database <path>`: SQLite database, overrides the config file
//! - `--log-level <level>` / `--log-dir <path>`: file logging overrides

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Manage taxonomy vocabularies and their dimension variants
#[derive(Parser, Debug)]
#[command(name = "taxonomy")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file to read
    #[arg(long, global = true, value_name = "PATH", default_value = "taxonomy.toml")]
    pub config: PathBuf,

    /// Database file, overriding `database` from the config
    #[arg(long, global = true, value_name = "PATH")]
    pub database: Option<PathBuf>,

    /// Log level: trace|debug|info|warn|error
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Directory for rolling log files; enables file logging
    #[arg(long, global = true, value_name = "PATH")]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List all vocabularies
    List,

    /// Import taxonomy content from an XML file
    Import {
        /// XML file to read
        filename: PathBuf,

        /// Only import vocabularies whose name matches this glob
        #[arg(long, value_name = "GLOB")]
        vocabulary: Option<String>,
    },

    /// Export taxonomy content to an XML file
    Export {
        /// XML file to write
        filename: PathBuf,

        /// Only export vocabularies whose name matches this glob
        #[arg(long, value_name = "GLOB")]
        vocabulary: Option<String>,
    },

    /// Delete vocabularies and their terms in every dimension
    Prune {
        /// Vocabulary name glob
        vocabulary: String,
    },

    /// Remove all vocabulary and term variants of one dimension value
    PruneDimension {
        /// Dimension name, e.g. `language`
        name: String,
        /// Dimension value, e.g. `de`
        value: String,
    },

    /// Copy all vocabularies and terms from the default dimensions into one
    /// dimension value
    PopulateDimension {
        /// Dimension name, e.g. `language`
        name: String,
        /// Dimension value, e.g. `de`
        value: String,
    },
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command};
    use clap::Parser;
    use std::path::PathBuf;

    #[test]
    fn parses_dimension_command_with_global_flags() {
        let cli = Cli::try_parse_from([
            "taxonomy",
            "populate-dimension",
            "language",
            "de",
            "--database",
            "store.sqlite3",
        ])
        .unwrap();

        assert_eq!(cli.config, PathBuf::from("taxonomy.toml"));
        assert_eq!(cli.database, Some(PathBuf::from("store.sqlite3")));
        assert!(matches!(
            cli.command,
            Command::PopulateDimension { ref name, ref value } if name == "language" && value == "de"
        ));
    }

    #[test]
    fn import_takes_optional_vocabulary_glob() {
        let cli =
            Cli::try_parse_from(["taxonomy", "import", "dump.xml", "--vocabulary", "col*"]).unwrap();
        match cli.command {
            Command::Import {
                filename,
                vocabulary,
            } => {
                assert_eq!(filename, PathBuf::from("dump.xml"));
                assert_eq!(vocabulary.as_deref(), Some("col*"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn prune_requires_pattern() {
        assert!(Cli::try_parse_from(["taxonomy", "prune"]).is_err());
    }
}
