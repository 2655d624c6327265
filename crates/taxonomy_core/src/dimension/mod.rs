//! Dimension space and subgraph resolution.
//!
//! # Responsibility
//! - Model content dimensions (e.g. `language`) with their presets and
//!   fallback order.
//! - Resolve partial dimension hints into one concrete subgraph.
//!
//! # Invariants
//! - A subgraph always carries a value for every configured dimension.
//! - Exactly one subgraph is the default one: every dimension at its default.

mod space;
mod subgraph;

pub use space::{Dimension, DimensionConfigError, DimensionPreset, DimensionSpace};
pub use subgraph::{DimensionCoordinate, Subgraph, SubgraphKeyError, LIVE_WORKSPACE};
