//! Taxonomy use-case service.
//!
//! # Responsibility
//! - Locate the taxonomy root, in the default subgraph or through the
//!   fallback chain of another subgraph.
//! - List and prune vocabularies.
//! - Host the dimension synchronization runs (see `dimension_sync`).
//!
//! # Invariants
//! - Vocabularies are the `Vocabulary` children of the root's default variant.
//! - Pruning a vocabulary removes its identity and every descendant identity
//!   from every subgraph.

use crate::dimension::{DimensionSpace, Subgraph};
use crate::glob::NameFilter;
use crate::model::node::{NodeIdentity, NodeKind, TaxonomyNode, ROOT_IDENTITY};
use crate::repo::taxonomy_repo::{
    AdoptOutcome, TaxonomyRepoError, TaxonomyRepository, VariantRemoval,
};
use crate::service::progress::{ProgressEvent, ProgressSink};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Coarse classification of failures, used for exit status and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Subgraph, root or subtree is missing.
    NotFound,
    /// Attempt to prune or populate the default subgraph.
    GuardViolation,
    /// Per-subgraph tree connectivity would be broken.
    StructuralViolation,
    /// Unreadable/unwritable file or malformed exchange document.
    IoFailure,
    /// Storage-level failure.
    Storage,
}

/// Stages of one synchronization run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Resolving,
    Guarding,
    Traversing,
    Done,
    Aborted,
}

impl RunPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Resolving => "resolving",
            Self::Guarding => "guarding",
            Self::Traversing => "traversing",
            Self::Done => "done",
            Self::Aborted => "aborted",
        }
    }
}

/// Synchronization operation that refused the default subgraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardedOperation {
    PruneDimension,
    PopulateDimension,
}

/// Errors from taxonomy service operations.
#[derive(Debug)]
pub enum TaxonomyServiceError {
    /// Dimension hint resolves to no subgraph.
    SubgraphNotFound { dimension: String, value: String },
    /// No root variant is visible from the subgraph.
    RootNotFound { subgraph: Subgraph },
    /// The resolved subgraph is the default one.
    DefaultSubgraph {
        operation: GuardedOperation,
        subgraph: Subgraph,
    },
    /// Repository-level failure.
    Repo(TaxonomyRepoError),
}

impl TaxonomyServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SubgraphNotFound { .. } | Self::RootNotFound { .. } => ErrorKind::NotFound,
            Self::DefaultSubgraph { .. } => ErrorKind::GuardViolation,
            Self::Repo(err) if err.is_structural() => ErrorKind::StructuralViolation,
            Self::Repo(TaxonomyRepoError::NodeNotFound(_))
            | Self::Repo(TaxonomyRepoError::VariantNotFound { .. }) => ErrorKind::NotFound,
            Self::Repo(_) => ErrorKind::Storage,
        }
    }
}

impl Display for TaxonomyServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SubgraphNotFound { dimension, value } => {
                write!(f, "Target subgraph not found for {dimension}={value}")
            }
            Self::RootNotFound { subgraph } => {
                write!(f, "No root in target context found ({subgraph})")
            }
            Self::DefaultSubgraph {
                operation: GuardedOperation::PruneDimension,
                ..
            } => write!(f, "The root is the default context and cannot be pruned"),
            Self::DefaultSubgraph {
                operation: GuardedOperation::PopulateDimension,
                ..
            } => write!(f, "The root is the default context and cannot be recreated"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TaxonomyServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TaxonomyRepoError> for TaxonomyServiceError {
    fn from(value: TaxonomyRepoError) -> Self {
        Self::Repo(value)
    }
}

pub type TaxonomyServiceResult<T> = Result<T, TaxonomyServiceError>;

/// What happened to one traversed node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeAction {
    Adopted(AdoptOutcome),
    Removed(VariantRemoval),
}

/// Successful per-node step of a synchronization run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeOutcome {
    pub identity: NodeIdentity,
    pub context_path: String,
    pub action: NodeAction,
}

/// Node skipped after a failure during traversal.
#[derive(Debug)]
pub struct NodeFailure {
    pub identity: NodeIdentity,
    pub context_path: String,
    pub error: TaxonomyRepoError,
}

/// Result of a completed synchronization run.
#[derive(Debug)]
pub struct SyncReport {
    pub subgraph: Subgraph,
    /// Always [`RunPhase::Done`]: aborted runs return an error instead.
    pub phase: RunPhase,
    pub processed: Vec<NodeOutcome>,
    pub failures: Vec<NodeFailure>,
}

impl SyncReport {
    pub(crate) fn new(subgraph: Subgraph) -> Self {
        Self {
            subgraph,
            phase: RunPhase::Traversing,
            processed: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// One pruned vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrunedVocabulary {
    pub name: String,
    pub identity: NodeIdentity,
    /// Descendant identities removed by the subtree delete.
    pub removed_descendants: usize,
    /// Vocabulary variants removed by the path cleanup.
    pub removed_variants: usize,
}

/// Taxonomy service facade.
pub struct TaxonomyService<R: TaxonomyRepository> {
    pub(crate) repo: R,
    pub(crate) dimensions: DimensionSpace,
}

impl<R: TaxonomyRepository> TaxonomyService<R> {
    /// Creates service from repository implementation and dimension space.
    pub fn new(repo: R, dimensions: DimensionSpace) -> Self {
        Self { repo, dimensions }
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    pub fn dimensions(&self) -> &DimensionSpace {
        &self.dimensions
    }

    /// Returns the root's default variant, creating it on first use.
    pub fn root(&self) -> TaxonomyServiceResult<TaxonomyNode> {
        Ok(self
            .repo
            .ensure_root(&self.dimensions.default_subgraph())?)
    }

    /// Finds the root as seen from `subgraph`: its own variant, or the first
    /// variant along the subgraph's fallback chain.
    pub fn root_in(&self, subgraph: &Subgraph) -> TaxonomyServiceResult<Option<TaxonomyNode>> {
        for candidate in self.dimensions.fallback_chain(subgraph) {
            if let Some(root) = self.repo.get_node(ROOT_IDENTITY, &candidate)? {
                return Ok(Some(root));
            }
        }
        Ok(None)
    }

    /// Lists top-level vocabularies of the default subgraph in stored order.
    pub fn list_vocabularies(&self) -> TaxonomyServiceResult<Vec<TaxonomyNode>> {
        let root = self.root()?;
        Ok(self.children_of_kind(root.identity, &root.subgraph, &[NodeKind::Vocabulary])?)
    }

    /// Deletes every vocabulary whose name matches `filter`, across all
    /// subgraphs.
    ///
    /// Each vocabulary is removed by a transitive delete of everything below
    /// its path, followed by a cleanup of the variants stored at the path
    /// itself; the cleanup also catches variants that child links no longer
    /// reach.
    pub fn prune_vocabularies(
        &self,
        filter: &NameFilter,
        progress: &mut dyn ProgressSink,
    ) -> TaxonomyServiceResult<Vec<PrunedVocabulary>> {
        info!(
            "event=prune module=service status=start filter={}",
            filter.pattern().unwrap_or("*")
        );
        let mut pruned = Vec::new();
        for vocabulary in self.list_vocabularies()? {
            if !filter.matches(&vocabulary.name) {
                continue;
            }

            let removed_descendants = self.repo.remove_all_in_path(&vocabulary.path)?;
            let mut removed_variants = 0;
            for variant in self.repo.find_by_path(&vocabulary.path)? {
                self.repo
                    .remove_variant(variant.identity, &variant.subgraph)?;
                removed_variants += 1;
            }

            info!(
                "event=prune_vocabulary module=service status=ok vocabulary={} descendants={} variants={}",
                vocabulary.name, removed_descendants, removed_variants
            );
            progress.emit(ProgressEvent::Pruned {
                vocabulary: vocabulary.name.clone(),
            });
            pruned.push(PrunedVocabulary {
                name: vocabulary.name,
                identity: vocabulary.identity,
                removed_descendants,
                removed_variants,
            });
        }
        info!(
            "event=prune module=service status=ok vocabularies={}",
            pruned.len()
        );
        Ok(pruned)
    }

    pub(crate) fn children_of_kind(
        &self,
        parent: NodeIdentity,
        subgraph: &Subgraph,
        kinds: &[NodeKind],
    ) -> Result<Vec<TaxonomyNode>, TaxonomyRepoError> {
        let mut children = self.repo.list_children(parent, subgraph)?;
        children.retain(|child| kinds.contains(&child.kind));
        Ok(children)
    }
}
