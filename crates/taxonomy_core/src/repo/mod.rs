//! Repository layer: the tree store adapter and its SQLite implementation.
//!
//! # Responsibility
//! - Define the tree primitives the taxonomy services are built from.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repository APIs return semantic errors (missing variant, structural
//!   violation) in addition to DB transport errors.

pub mod taxonomy_repo;
