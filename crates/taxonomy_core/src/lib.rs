//! Core of the taxonomy tool: dimension-aware vocabulary trees, subgraph
//! synchronization and the XML exchange format.

pub mod codec;
pub mod config;
pub mod db;
pub mod dimension;
pub mod glob;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use codec::{
    export_to_file, export_vocabularies, import_from_file, import_vocabularies, CodecError,
    ExportSummary, ImportReport, ImportedVocabulary,
};
pub use config::{ConfigError, TaxonomyConfig};
pub use dimension::{Dimension, DimensionPreset, DimensionSpace, Subgraph};
pub use glob::{GlobPattern, NameFilter};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::node::{ImportedNode, NodeIdentity, NodeKind, TaxonomyNode, ROOT_IDENTITY};
pub use repo::taxonomy_repo::{
    AdoptOutcome, SqliteTaxonomyRepository, TaxonomyRepoError, TaxonomyRepoResult,
    TaxonomyRepository, VariantRemoval,
};
pub use service::progress::{LineProgress, ProgressEvent, ProgressSink};
pub use service::taxonomy_service::{
    ErrorKind, RunPhase, SyncReport, TaxonomyService, TaxonomyServiceError,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
