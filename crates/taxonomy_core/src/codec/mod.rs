//! Streaming XML exchange format for vocabularies.
//!
//! # Responsibility
//! - Export vocabularies of the default subgraph while walking the tree.
//! - Import vocabularies from a forward-only event stream, one vocabulary
//!   subtree at a time.
//!
//! # Format
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <root>
//!   <vocabulary name="colors">
//!     <node identifier="..." name="colors" type="vocabulary">
//!       <properties>
//!         <property name="title">Colors</property>
//!       </properties>
//!       <node identifier="..." name="red" type="term"/>
//!     </node>
//!   </vocabulary>
//! </root>
//! ```
//!
//! # Invariants
//! - At most one vocabulary subtree is held in memory.
//! - Vocabularies rejected by the name filter are skipped without being
//!   materialized.
//! - Indentation is cosmetic; text inside `<property>` is kept verbatim.

mod export;
mod import;

pub use export::{export_to_file, export_vocabularies, ExportSummary};
pub use import::{import_from_file, import_vocabularies, ImportReport, ImportedVocabulary};

use crate::repo::taxonomy_repo::TaxonomyRepoError;
use crate::service::taxonomy_service::{ErrorKind, TaxonomyServiceError};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

const ROOT_ELEMENT: &str = "root";
const VOCABULARY_ELEMENT: &str = "vocabulary";
const NODE_ELEMENT: &str = "node";
const PROPERTIES_ELEMENT: &str = "properties";
const PROPERTY_ELEMENT: &str = "property";

const NAME_ATTRIBUTE: &str = "name";
const IDENTIFIER_ATTRIBUTE: &str = "identifier";
const TYPE_ATTRIBUTE: &str = "type";

/// Errors from import/export runs. All of them abort the run.
#[derive(Debug)]
pub enum CodecError {
    /// File could not be opened, read or written.
    Io {
        path: Option<PathBuf>,
        source: std::io::Error,
    },
    /// Token stream is not well-formed XML.
    Xml(quick_xml::Error),
    /// Well-formed XML that does not follow the exchange format.
    Malformed(String),
    /// Store or root lookup failed.
    Service(TaxonomyServiceError),
}

impl CodecError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io { .. } | Self::Xml(_) | Self::Malformed(_) => ErrorKind::IoFailure,
            Self::Service(err) => err.kind(),
        }
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }
}

impl Display for CodecError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io {
                path: Some(path),
                source,
            } => write!(f, "I/O error on `{}`: {source}", path.display()),
            Self::Io { path: None, source } => write!(f, "I/O error: {source}"),
            Self::Xml(err) => write!(f, "XML error: {err}"),
            Self::Malformed(message) => write!(f, "malformed taxonomy document: {message}"),
            Self::Service(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CodecError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Xml(err) => Some(err),
            Self::Malformed(_) => None,
            Self::Service(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for CodecError {
    fn from(value: std::io::Error) -> Self {
        Self::Io {
            path: None,
            source: value,
        }
    }
}

impl From<quick_xml::Error> for CodecError {
    fn from(value: quick_xml::Error) -> Self {
        Self::Xml(value)
    }
}

impl From<TaxonomyServiceError> for CodecError {
    fn from(value: TaxonomyServiceError) -> Self {
        Self::Service(value)
    }
}

impl From<TaxonomyRepoError> for CodecError {
    fn from(value: TaxonomyRepoError) -> Self {
        Self::Service(TaxonomyServiceError::Repo(value))
    }
}
