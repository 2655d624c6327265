//! `taxonomy` command-line entry point.
//!
//! # Responsibility
//! - Merge config file and flags, start logging, open the database.
//! - Run one command and print its progress lines to stdout.
//!
//! # Invariants
//! - Guard and not-found refusals print their message and exit with status 1
//!   without touching the store.

mod args;

use args::{Cli, Command};
use clap::Parser;
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::{self, Write};
use std::process::ExitCode;
use taxonomy_core::db::{open_db, DbError};
use taxonomy_core::{
    default_log_level, export_to_file, import_from_file, init_logging, CodecError, ConfigError,
    ErrorKind, LineProgress, LoggingError, NameFilter, SqliteTaxonomyRepository, SyncReport,
    TaxonomyConfig, TaxonomyRepoError, TaxonomyService, TaxonomyServiceError,
};

#[derive(Debug)]
enum CliError {
    Config(ConfigError),
    Logging(LoggingError),
    Db(DbError),
    Repo(TaxonomyRepoError),
    Service(TaxonomyServiceError),
    Codec(CodecError),
}

impl CliError {
    /// Refusals that are reported as plain operator messages.
    fn is_refusal(&self) -> bool {
        let kind = match self {
            Self::Service(err) => err.kind(),
            Self::Codec(err) => err.kind(),
            _ => return false,
        };
        matches!(kind, ErrorKind::NotFound | ErrorKind::GuardViolation)
    }
}

impl Display for CliError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Logging(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Service(err) => write!(f, "{err}"),
            Self::Codec(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CliError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Logging(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::Service(err) => Some(err),
            Self::Codec(err) => Some(err),
        }
    }
}

macro_rules! impl_from {
    ($($source:ty => $variant:ident),* $(,)?) => {
        $(impl From<$source> for CliError {
            fn from(value: $source) -> Self {
                Self::$variant(value)
            }
        })*
    };
}

impl_from! {
    ConfigError => Config,
    LoggingError => Logging,
    DbError => Db,
    TaxonomyRepoError => Repo,
    TaxonomyServiceError => Service,
    CodecError => Codec,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(err) if err.is_refusal() => {
            println!("{err}");
            ExitCode::FAILURE
        }
        Err(err) => {
            error!("event=cli_command module=cli status=error error={err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, CliError> {
    let config = TaxonomyConfig::load(&cli.config)?;
    if let Some(log_dir) = cli.log_dir.as_ref().or(config.logging.dir.as_ref()) {
        let level = cli
            .log_level
            .as_deref()
            .or(config.logging.level.as_deref())
            .unwrap_or(default_log_level());
        init_logging(level, log_dir)?;
    }

    let dimensions = config.dimension_space()?;
    let database = cli.database.clone().unwrap_or_else(|| config.database_path());
    let conn = open_db(&database)?;
    let repo = SqliteTaxonomyRepository::try_new(&conn)?;
    let service = TaxonomyService::new(repo, dimensions);
    service.root()?;

    let mut progress = LineProgress::new(io::stdout().lock());
    info!(
        "event=cli_command module=cli status=start command={:?} database={}",
        cli.command,
        database.display()
    );

    match cli.command {
        Command::List => {
            let mut out = progress.into_inner();
            for vocabulary in service.list_vocabularies()? {
                if writeln!(out, "{}", vocabulary.name).is_err() {
                    break;
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Import {
            filename,
            vocabulary,
        } => {
            let filter = NameFilter::new(vocabulary.as_deref());
            import_from_file(&service, &filename, &filter, &mut progress)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Export {
            filename,
            vocabulary,
        } => {
            let filter = NameFilter::new(vocabulary.as_deref());
            export_to_file(&service, &filename, &filter, &mut progress)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Prune { vocabulary } => {
            let filter = NameFilter::new(Some(&vocabulary));
            service.prune_vocabularies(&filter, &mut progress)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::PruneDimension { name, value } => {
            let report = service.prune_dimension(&name, &value, &mut progress)?;
            Ok(sync_exit_code(&report))
        }
        Command::PopulateDimension { name, value } => {
            let report = service.populate_dimension(&name, &value, &mut progress)?;
            Ok(sync_exit_code(&report))
        }
    }
}

/// A completed run exits successfully; skipped nodes are summarized on stderr.
fn sync_exit_code(report: &SyncReport) -> ExitCode {
    if let Some(summary) = skipped_summary(report) {
        eprintln!("{summary}");
    }
    ExitCode::SUCCESS
}

fn skipped_summary(report: &SyncReport) -> Option<String> {
    if report.is_clean() {
        return None;
    }
    Some(format!(
        "{} node(s) skipped in {}; see messages above",
        report.failures.len(),
        report.subgraph
    ))
}
