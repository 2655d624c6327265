//! Resolved points in the dimension space.

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Name of the single content snapshot every subgraph belongs to.
pub const LIVE_WORKSPACE: &str = "live";

const PAIR_SEPARATOR: char = ';';
const VALUE_SEPARATOR: char = '=';

/// Complete dimension-name to value mapping.
pub type DimensionCoordinate = BTreeMap<String, String>;

/// Fully resolved dimension coordinate under which tree operations execute.
///
/// Subgraphs are plain values; equality means "same point in the dimension
/// space". The storage key is `name=value;name=value` ordered by dimension
/// name, and the empty string when no dimensions are configured.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Subgraph {
    coordinate: DimensionCoordinate,
}

impl Subgraph {
    /// Builds a subgraph from an already validated coordinate.
    pub fn new(coordinate: DimensionCoordinate) -> Self {
        Self { coordinate }
    }

    /// Subgraph of a dimensionless content repository.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Full dimension coordinate of this subgraph.
    pub fn coordinate(&self) -> &DimensionCoordinate {
        &self.coordinate
    }

    /// Selected value for one dimension.
    pub fn value(&self, dimension: &str) -> Option<&str> {
        self.coordinate.get(dimension).map(String::as_str)
    }

    /// Stable storage key.
    pub fn key(&self) -> String {
        self.coordinate
            .iter()
            .map(|(name, value)| format!("{name}{VALUE_SEPARATOR}{value}"))
            .collect::<Vec<_>>()
            .join(&PAIR_SEPARATOR.to_string())
    }

    /// Parses a storage key produced by [`Subgraph::key`].
    pub fn from_key(key: &str) -> Result<Self, SubgraphKeyError> {
        let mut coordinate = DimensionCoordinate::new();
        if key.is_empty() {
            return Ok(Self { coordinate });
        }
        for pair in key.split(PAIR_SEPARATOR) {
            let (name, value) = pair
                .split_once(VALUE_SEPARATOR)
                .ok_or_else(|| SubgraphKeyError(key.to_string()))?;
            if name.is_empty() || value.is_empty() {
                return Err(SubgraphKeyError(key.to_string()));
            }
            if coordinate
                .insert(name.to_string(), value.to_string())
                .is_some()
            {
                return Err(SubgraphKeyError(key.to_string()));
            }
        }
        Ok(Self { coordinate })
    }

    /// Context path of a node path inside this subgraph, e.g.
    /// `/taxonomies/colors@live;language=de`.
    pub fn context_path(&self, path: &str) -> String {
        let key = self.key();
        if key.is_empty() {
            format!("{path}@{LIVE_WORKSPACE}")
        } else {
            format!("{path}@{LIVE_WORKSPACE}{PAIR_SEPARATOR}{key}")
        }
    }
}

/// Whether `token` can be stored as a dimension name or value in a subgraph
/// key without breaking [`Subgraph::from_key`].
pub(crate) fn is_key_token(token: &str) -> bool {
    !token.is_empty() && !token.contains([PAIR_SEPARATOR, VALUE_SEPARATOR])
}

impl Display for Subgraph {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let key = self.key();
        if key.is_empty() {
            write!(f, "{LIVE_WORKSPACE}")
        } else {
            write!(f, "{LIVE_WORKSPACE}{PAIR_SEPARATOR}{key}")
        }
    }
}

/// Stored subgraph key could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubgraphKeyError(pub String);

impl Display for SubgraphKeyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid subgraph key `{}`", self.0)
    }
}

impl Error for SubgraphKeyError {}
