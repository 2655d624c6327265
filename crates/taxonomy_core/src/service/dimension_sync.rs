//! Cross-subgraph synchronization: prune-dimension and populate-dimension.
//!
//! # Invariants
//! - Runs move through `resolving -> guarding -> traversing -> done`; only the
//!   first two phases abort, and neither mutates anything.
//! - Populate adopts in pre-order, so a parent variant always exists before
//!   its children are adopted.
//! - Prune removes in reverse pre-order, so no child variant outlives its
//!   parent variant, even when a run is interrupted.
//! - A failing node is recorded in the report and skipped.

use super::taxonomy_service::{
    GuardedOperation, NodeAction, NodeFailure, NodeOutcome, RunPhase, SyncReport,
    TaxonomyService, TaxonomyServiceError, TaxonomyServiceResult,
};
use crate::dimension::Subgraph;
use crate::model::node::{NodeKind, TaxonomyNode, ROOT_IDENTITY, ROOT_PATH};
use crate::repo::taxonomy_repo::{TaxonomyRepoError, TaxonomyRepository};
use crate::service::progress::{ProgressEvent, ProgressSink};
use log::{debug, info, warn};

const CONTENT_KINDS: &[NodeKind] = &[NodeKind::Vocabulary, NodeKind::Term];

impl<R: TaxonomyRepository> TaxonomyService<R> {
    /// Removes every vocabulary and term variant of the non-default subgraph
    /// selected by `dimension = value`. Variants in other subgraphs stay.
    pub fn prune_dimension(
        &self,
        dimension: &str,
        value: &str,
        progress: &mut dyn ProgressSink,
    ) -> TaxonomyServiceResult<SyncReport> {
        let operation = GuardedOperation::PruneDimension;
        let target = self.resolve_target(operation, dimension, value)?;

        log_phase(operation, RunPhase::Traversing, &target);
        progress.emit(ProgressEvent::RemovingBelow {
            context_path: target.context_path(ROOT_PATH),
        });

        let mut report = SyncReport::new(target.clone());
        let nodes = self.collect_pre_order(&target)?;
        for node in nodes.into_iter().rev() {
            let context_path = node.context_path();
            match self.repo.remove_variant(node.identity, &target) {
                Ok(removal) => {
                    debug!(
                        "event=remove_variant module=service status=ok node_uuid={} subgraph={}",
                        node.identity, target
                    );
                    progress.emit(ProgressEvent::Removed {
                        context_path: context_path.clone(),
                    });
                    report.processed.push(NodeOutcome {
                        identity: node.identity,
                        context_path,
                        action: NodeAction::Removed(removal),
                    });
                }
                Err(error) => record_failure(&mut report, progress, &node, context_path, error),
            }
        }

        finish(operation, &mut report, progress);
        Ok(report)
    }

    /// Adopts every vocabulary and term of the default subgraph into the
    /// non-default subgraph selected by `dimension = value`.
    ///
    /// Adoption is idempotent: nodes already present in the target count as
    /// processed, not failed.
    pub fn populate_dimension(
        &self,
        dimension: &str,
        value: &str,
        progress: &mut dyn ProgressSink,
    ) -> TaxonomyServiceResult<SyncReport> {
        let operation = GuardedOperation::PopulateDimension;
        let target = self.resolve_target(operation, dimension, value)?;
        let source = self.dimensions.default_subgraph();

        // The root may only be visible through fallback; give it a variant of
        // its own so vocabularies have a parent to attach to.
        if let Some(root) = self.root_in(&target)? {
            self.repo
                .adopt(ROOT_IDENTITY, &root.subgraph, &target)
                .map_err(|err| abort(operation, err.into()))?;
        }

        log_phase(operation, RunPhase::Traversing, &target);
        progress.emit(ProgressEvent::PopulatingBelow {
            context_path: target.context_path(ROOT_PATH),
        });

        let mut report = SyncReport::new(target.clone());
        let mut stack = self.children_of_kind(ROOT_IDENTITY, &source, CONTENT_KINDS)?;
        stack.reverse();
        while let Some(node) = stack.pop() {
            let context_path = target.context_path(&node.path);
            match self.repo.adopt(node.identity, &source, &target) {
                Ok(outcome) => {
                    debug!(
                        "event=adopt_variant module=service status=ok node_uuid={} subgraph={} outcome={:?}",
                        node.identity, target, outcome
                    );
                    progress.emit(ProgressEvent::Adopted {
                        context_path: context_path.clone(),
                        outcome,
                    });
                    report.processed.push(NodeOutcome {
                        identity: node.identity,
                        context_path,
                        action: NodeAction::Adopted(outcome),
                    });
                }
                Err(error) => record_failure(&mut report, progress, &node, context_path, error),
            }

            let mut children = self.children_of_kind(node.identity, &source, CONTENT_KINDS)?;
            children.reverse();
            stack.extend(children);
        }

        finish(operation, &mut report, progress);
        Ok(report)
    }

    /// Resolving and guarding phases shared by both runs. Read-only.
    fn resolve_target(
        &self,
        operation: GuardedOperation,
        dimension: &str,
        value: &str,
    ) -> TaxonomyServiceResult<Subgraph> {
        info!(
            "event={} module=service status=start phase={} dimension={} value={}",
            operation_name(operation),
            RunPhase::Resolving.as_str(),
            dimension,
            value
        );

        let Some(target) = self.dimensions.resolve_subgraph([(dimension, value)]) else {
            return Err(abort(
                operation,
                TaxonomyServiceError::SubgraphNotFound {
                    dimension: dimension.to_string(),
                    value: value.to_string(),
                },
            ));
        };

        if self.root_in(&target)?.is_none() {
            return Err(abort(
                operation,
                TaxonomyServiceError::RootNotFound { subgraph: target },
            ));
        }

        log_phase(operation, RunPhase::Guarding, &target);
        if self.dimensions.is_default(&target) {
            return Err(abort(
                operation,
                TaxonomyServiceError::DefaultSubgraph {
                    operation,
                    subgraph: target,
                },
            ));
        }

        Ok(target)
    }

    /// Vocabulary and term variants of `subgraph`, ancestors first.
    fn collect_pre_order(&self, subgraph: &Subgraph) -> TaxonomyServiceResult<Vec<TaxonomyNode>> {
        let mut ordered = Vec::new();
        let mut stack = self.children_of_kind(ROOT_IDENTITY, subgraph, CONTENT_KINDS)?;
        stack.reverse();
        while let Some(node) = stack.pop() {
            let mut children = self.children_of_kind(node.identity, subgraph, CONTENT_KINDS)?;
            children.reverse();
            stack.extend(children);
            ordered.push(node);
        }
        Ok(ordered)
    }
}

fn record_failure(
    report: &mut SyncReport,
    progress: &mut dyn ProgressSink,
    node: &TaxonomyNode,
    context_path: String,
    error: TaxonomyRepoError,
) {
    warn!(
        "event=sync_node module=service status=skipped node_uuid={} structural={} error={}",
        node.identity,
        error.is_structural(),
        error
    );
    progress.emit(ProgressEvent::Skipped {
        context_path: context_path.clone(),
        reason: error.to_string(),
    });
    report.failures.push(NodeFailure {
        identity: node.identity,
        context_path,
        error,
    });
}

fn finish(operation: GuardedOperation, report: &mut SyncReport, progress: &mut dyn ProgressSink) {
    report.phase = RunPhase::Done;
    info!(
        "event={} module=service status=ok phase={} subgraph={} processed={} failed={}",
        operation_name(operation),
        report.phase.as_str(),
        report.subgraph,
        report.processed.len(),
        report.failures.len()
    );
    progress.emit(ProgressEvent::Done);
}

fn abort(operation: GuardedOperation, error: TaxonomyServiceError) -> TaxonomyServiceError {
    warn!(
        "event={} module=service status=error phase={} error={}",
        operation_name(operation),
        RunPhase::Aborted.as_str(),
        error
    );
    error
}

fn log_phase(operation: GuardedOperation, phase: RunPhase, subgraph: &Subgraph) {
    info!(
        "event={} module=service status=progress phase={} subgraph={}",
        operation_name(operation),
        phase.as_str(),
        subgraph
    );
}

fn operation_name(operation: GuardedOperation) -> &'static str {
    match operation {
        GuardedOperation::PruneDimension => "prune_dimension",
        GuardedOperation::PopulateDimension => "populate_dimension",
    }
}
