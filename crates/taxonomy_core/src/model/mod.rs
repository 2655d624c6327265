//! Taxonomy domain model.
//!
//! # Responsibility
//! - Define the identity/variant split shared by every taxonomy layer.
//!
//! # Invariants
//! - One `NodeIdentity` names the same logical node in every subgraph.
//! - A node's path is stable across its variants.

pub mod node;
