//! Taxonomy use-case services.
//!
//! # Responsibility
//! - Orchestrate repository primitives into the taxonomy commands: list,
//!   prune, prune-dimension and populate-dimension.
//! - Report per-node progress without knowing how it is displayed.
//!
//! # Invariants
//! - Guards (subgraph lookup, root lookup, default-subgraph check) run before
//!   any mutation.
//! - Once traversal starts, per-node failures are recorded and skipped.

mod dimension_sync;
pub mod progress;
pub mod taxonomy_service;
