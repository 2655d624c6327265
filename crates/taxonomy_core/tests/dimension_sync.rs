use rusqlite::Connection;
use taxonomy_core::db::open_db_in_memory;
use taxonomy_core::model::node::NodeContent;
use taxonomy_core::repo::taxonomy_repo::ImportSummary;
use taxonomy_core::service::taxonomy_service::{NodeAction, PrunedVocabulary};
use taxonomy_core::{
    AdoptOutcome, Dimension, DimensionPreset, DimensionSpace, ErrorKind, ImportedNode, NodeKind,
    NodeIdentity, ProgressEvent, RunPhase, SqliteTaxonomyRepository, Subgraph, TaxonomyNode,
    TaxonomyRepoError, TaxonomyRepoResult, TaxonomyRepository, TaxonomyService,
    TaxonomyServiceError, VariantRemoval, ROOT_IDENTITY,
};

fn languages() -> DimensionSpace {
    DimensionSpace::new(vec![Dimension {
        name: "language".to_string(),
        default_value: "en".to_string(),
        presets: vec![
            DimensionPreset::new("en", ["en"]),
            DimensionPreset::new("de", ["de", "en"]),
            DimensionPreset::new("fr", ["fr"]),
        ],
    }])
    .unwrap()
}

fn colors() -> ImportedNode {
    let mut vocabulary = ImportedNode::new(NodeKind::Vocabulary, "colors");
    vocabulary
        .content
        .insert("title".to_string(), "Colors".to_string());
    let mut red = ImportedNode::new(NodeKind::Term, "red");
    red.children.push(ImportedNode::new(NodeKind::Term, "crimson"));
    vocabulary.children.push(red);
    vocabulary.children.push(ImportedNode::new(NodeKind::Term, "blue"));
    vocabulary
}

fn service_with_colors(conn: &Connection) -> TaxonomyService<SqliteTaxonomyRepository<'_>> {
    let repo = SqliteTaxonomyRepository::try_new(conn).unwrap();
    let service = TaxonomyService::new(repo, languages());
    let root = service.root().unwrap();
    service
        .repo()
        .import_subtree(root.identity, &colors(), &root.subgraph)
        .unwrap();
    service
}

fn subgraph(service: &TaxonomyService<impl TaxonomyRepository>, value: &str) -> Subgraph {
    service
        .dimensions()
        .resolve_subgraph([("language", value)])
        .unwrap()
}

fn paths_in(service: &TaxonomyService<impl TaxonomyRepository>, value: &str) -> Vec<String> {
    let target = subgraph(service, value);
    let mut paths = Vec::new();
    let mut stack = vec![ROOT_IDENTITY];
    while let Some(parent) = stack.pop() {
        for child in service.repo().list_children(parent, &target).unwrap() {
            stack.push(child.identity);
            paths.push(child.path);
        }
    }
    paths.sort();
    paths
}

#[test]
fn populate_refuses_default_subgraph_without_mutation() {
    let conn = open_db_in_memory().unwrap();
    let service = service_with_colors(&conn);
    let mut events = Vec::new();

    let err = service
        .populate_dimension("language", "en", &mut events)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::GuardViolation);
    assert_eq!(
        err.to_string(),
        "The root is the default context and cannot be recreated"
    );
    assert!(events.is_empty());
    assert!(paths_in(&service, "de").is_empty());
}

#[test]
fn prune_dimension_refuses_default_subgraph_without_mutation() {
    let conn = open_db_in_memory().unwrap();
    let service = service_with_colors(&conn);
    let mut events = Vec::new();

    let err = service
        .prune_dimension("language", "en", &mut events)
        .unwrap_err();
    assert!(matches!(err, TaxonomyServiceError::DefaultSubgraph { .. }));
    assert_eq!(
        err.to_string(),
        "The root is the default context and cannot be pruned"
    );
    assert!(events.is_empty());
    assert_eq!(paths_in(&service, "en").len(), 4);
}

#[test]
fn unknown_dimension_or_value_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let service = service_with_colors(&conn);
    let mut events = Vec::new();

    for (dimension, value) in [("language", "xx"), ("country", "de")] {
        let err = service
            .populate_dimension(dimension, value, &mut events)
            .unwrap_err();
        assert!(matches!(err, TaxonomyServiceError::SubgraphNotFound { .. }));
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().starts_with("Target subgraph not found"));
    }
    assert!(events.is_empty());
}

#[test]
fn subgraph_without_rooted_fallback_reports_root_not_found() {
    let conn = open_db_in_memory().unwrap();
    let service = service_with_colors(&conn);
    let mut events = Vec::new();

    let err = service
        .populate_dimension("language", "fr", &mut events)
        .unwrap_err();
    assert!(matches!(err, TaxonomyServiceError::RootNotFound { .. }));
    assert!(err.to_string().starts_with("No root in target context found"));
    assert!(events.is_empty());
    assert!(paths_in(&service, "fr").is_empty());
}

#[test]
fn without_dimensions_every_hint_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTaxonomyRepository::try_new(&conn).unwrap();
    let service = TaxonomyService::new(repo, DimensionSpace::default());
    service.root().unwrap();

    let err = service
        .prune_dimension("language", "de", &mut Vec::new())
        .unwrap_err();
    assert!(matches!(err, TaxonomyServiceError::SubgraphNotFound { .. }));
}

#[test]
fn populate_adopts_in_pre_order_and_materializes_root() {
    let conn = open_db_in_memory().unwrap();
    let service = service_with_colors(&conn);
    let de = subgraph(&service, "de");
    assert!(service.repo().get_node(ROOT_IDENTITY, &de).unwrap().is_none());
    let mut events = Vec::new();

    let report = service
        .populate_dimension("language", "de", &mut events)
        .unwrap();

    assert_eq!(report.phase, RunPhase::Done);
    assert!(report.is_clean());
    assert!(service.repo().get_node(ROOT_IDENTITY, &de).unwrap().is_some());
    assert_eq!(
        events,
        vec![
            ProgressEvent::PopulatingBelow {
                context_path: "/taxonomies@live;language=de".to_string()
            },
            adopted("/taxonomies/colors", AdoptOutcome::Created),
            adopted("/taxonomies/colors/red", AdoptOutcome::Created),
            adopted("/taxonomies/colors/red/crimson", AdoptOutcome::Created),
            adopted("/taxonomies/colors/blue", AdoptOutcome::Created),
            ProgressEvent::Done,
        ]
    );
    assert_eq!(paths_in(&service, "de"), paths_in(&service, "en"));

    let vocabulary = &service.list_vocabularies().unwrap()[0];
    let german = service
        .repo()
        .get_node(vocabulary.identity, &de)
        .unwrap()
        .unwrap();
    assert_eq!(german.content, vocabulary.content);
}

#[test]
fn populate_twice_reports_already_present() {
    let conn = open_db_in_memory().unwrap();
    let service = service_with_colors(&conn);
    service
        .populate_dimension("language", "de", &mut Vec::new())
        .unwrap();

    let report = service
        .populate_dimension("language", "de", &mut Vec::new())
        .unwrap();
    assert_eq!(report.processed.len(), 4);
    assert!(report
        .processed
        .iter()
        .all(|outcome| outcome.action == NodeAction::Adopted(AdoptOutcome::AlreadyPresent)));
    assert!(report.is_clean());
}

#[test]
fn prune_dimension_removes_deepest_first_and_keeps_other_subgraphs() {
    let conn = open_db_in_memory().unwrap();
    let service = service_with_colors(&conn);
    service
        .populate_dimension("language", "de", &mut Vec::new())
        .unwrap();
    let mut events = Vec::new();

    let report = service
        .prune_dimension("language", "de", &mut events)
        .unwrap();

    assert_eq!(report.phase, RunPhase::Done);
    assert_eq!(
        events,
        vec![
            ProgressEvent::RemovingBelow {
                context_path: "/taxonomies@live;language=de".to_string()
            },
            removed("/taxonomies/colors/blue"),
            removed("/taxonomies/colors/red/crimson"),
            removed("/taxonomies/colors/red"),
            removed("/taxonomies/colors"),
            ProgressEvent::Done,
        ]
    );
    assert!(report
        .processed
        .iter()
        .all(|outcome| outcome.action == NodeAction::Removed(VariantRemoval::VariantOnly)));
    assert!(paths_in(&service, "de").is_empty());
    assert_eq!(paths_in(&service, "en").len(), 4);
    let de = subgraph(&service, "de");
    assert!(service.repo().get_node(ROOT_IDENTITY, &de).unwrap().is_some());
}

#[test]
fn prune_dimension_on_empty_subgraph_completes() {
    let conn = open_db_in_memory().unwrap();
    let service = service_with_colors(&conn);
    let mut events = Vec::new();

    let report = service
        .prune_dimension("language", "de", &mut events)
        .unwrap();
    assert!(report.processed.is_empty());
    assert_eq!(events.last(), Some(&ProgressEvent::Done));
}

/// Delegates to SQLite but refuses to adopt one identity.
struct RefusingRepo<'conn> {
    inner: SqliteTaxonomyRepository<'conn>,
    refused: Option<NodeIdentity>,
}

impl TaxonomyRepository for RefusingRepo<'_> {
    fn ensure_root(&self, subgraph: &Subgraph) -> TaxonomyRepoResult<TaxonomyNode> {
        self.inner.ensure_root(subgraph)
    }

    fn get_node(
        &self,
        identity: NodeIdentity,
        subgraph: &Subgraph,
    ) -> TaxonomyRepoResult<Option<TaxonomyNode>> {
        self.inner.get_node(identity, subgraph)
    }

    fn list_children(
        &self,
        parent: NodeIdentity,
        subgraph: &Subgraph,
    ) -> TaxonomyRepoResult<Vec<TaxonomyNode>> {
        self.inner.list_children(parent, subgraph)
    }

    fn find_by_path(&self, path: &str) -> TaxonomyRepoResult<Vec<TaxonomyNode>> {
        self.inner.find_by_path(path)
    }

    fn list_variants(&self, identity: NodeIdentity) -> TaxonomyRepoResult<Vec<Subgraph>> {
        self.inner.list_variants(identity)
    }

    fn remove_all_in_path(&self, path: &str) -> TaxonomyRepoResult<usize> {
        self.inner.remove_all_in_path(path)
    }

    fn remove_variant(
        &self,
        identity: NodeIdentity,
        subgraph: &Subgraph,
    ) -> TaxonomyRepoResult<VariantRemoval> {
        self.inner.remove_variant(identity, subgraph)
    }

    fn adopt(
        &self,
        identity: NodeIdentity,
        from: &Subgraph,
        into: &Subgraph,
    ) -> TaxonomyRepoResult<AdoptOutcome> {
        if self.refused == Some(identity) {
            return Err(TaxonomyRepoError::InvalidData("refused".to_string()));
        }
        self.inner.adopt(identity, from, into)
    }

    fn import_subtree(
        &self,
        anchor: NodeIdentity,
        subtree: &ImportedNode,
        subgraph: &Subgraph,
    ) -> TaxonomyRepoResult<ImportSummary> {
        self.inner.import_subtree(anchor, subtree, subgraph)
    }
}

#[test]
fn failing_node_is_skipped_and_run_still_completes() {
    let conn = open_db_in_memory().unwrap();
    let seeded = service_with_colors(&conn);
    let vocabulary = seeded.list_vocabularies().unwrap().remove(0);
    let red = seeded
        .repo()
        .list_children(vocabulary.identity, &vocabulary.subgraph)
        .unwrap()
        .remove(0);
    assert_eq!(red.name, "red");

    let repo = RefusingRepo {
        inner: SqliteTaxonomyRepository::try_new(&conn).unwrap(),
        refused: Some(red.identity),
    };
    let service = TaxonomyService::new(repo, languages());
    let mut events = Vec::new();

    let report = service
        .populate_dimension("language", "de", &mut events)
        .unwrap();

    assert_eq!(report.phase, RunPhase::Done);
    assert_eq!(events.last(), Some(&ProgressEvent::Done));
    let failed: Vec<&str> = report
        .failures
        .iter()
        .map(|failure| failure.context_path.as_str())
        .collect();
    assert_eq!(
        failed,
        vec![
            "/taxonomies/colors/red@live;language=de",
            "/taxonomies/colors/red/crimson@live;language=de",
        ]
    );
    assert!(report.failures[1].error.is_structural());
    let processed: Vec<&str> = report
        .processed
        .iter()
        .map(|outcome| outcome.context_path.as_str())
        .collect();
    assert_eq!(
        processed,
        vec![
            "/taxonomies/colors@live;language=de",
            "/taxonomies/colors/blue@live;language=de",
        ]
    );
    assert_eq!(
        paths_in(&service, "de"),
        vec!["/taxonomies/colors", "/taxonomies/colors/blue"]
    );
    assert!(events
        .iter()
        .any(|event| matches!(event, ProgressEvent::Skipped { .. })));
}

#[test]
fn failed_root_adoption_aborts_before_traversal() {
    let conn = open_db_in_memory().unwrap();
    service_with_colors(&conn);
    let repo = RefusingRepo {
        inner: SqliteTaxonomyRepository::try_new(&conn).unwrap(),
        refused: Some(ROOT_IDENTITY),
    };
    let service = TaxonomyService::new(repo, languages());
    let mut events = Vec::new();

    let err = service
        .populate_dimension("language", "de", &mut events)
        .unwrap_err();

    assert!(matches!(
        err,
        TaxonomyServiceError::Repo(TaxonomyRepoError::InvalidData(_))
    ));
    assert_eq!(err.kind(), ErrorKind::Storage);
    assert!(events.is_empty());
    assert!(paths_in(&service, "de").is_empty());
}

#[test]
fn prune_vocabularies_removes_matches_in_every_subgraph() {
    let conn = open_db_in_memory().unwrap();
    let service = service_with_colors(&conn);
    let root = service.root().unwrap();
    let mut extra = ImportedNode::new(NodeKind::Vocabulary, "colors_extra");
    extra.children.push(ImportedNode::new(NodeKind::Term, "teal"));
    service
        .repo()
        .import_subtree(root.identity, &extra, &root.subgraph)
        .unwrap();
    service
        .repo()
        .import_subtree(
            root.identity,
            &ImportedNode::new(NodeKind::Vocabulary, "shapes"),
            &root.subgraph,
        )
        .unwrap();
    service
        .populate_dimension("language", "de", &mut Vec::new())
        .unwrap();
    let colors = service.list_vocabularies().unwrap().remove(0);
    let mut events = Vec::new();

    let pruned = service
        .prune_vocabularies(&taxonomy_core::NameFilter::new(Some("colors*")), &mut events)
        .unwrap();

    let names: Vec<&str> = pruned.iter().map(|entry| entry.name.as_str()).collect();
    assert_eq!(names, vec!["colors", "colors_extra"]);
    assert_eq!(
        pruned[0],
        PrunedVocabulary {
            name: "colors".to_string(),
            identity: colors.identity,
            removed_descendants: 3,
            removed_variants: 2,
        }
    );
    assert_eq!(
        events,
        vec![
            ProgressEvent::Pruned {
                vocabulary: "colors".to_string()
            },
            ProgressEvent::Pruned {
                vocabulary: "colors_extra".to_string()
            },
        ]
    );
    assert!(service.repo().list_variants(colors.identity).unwrap().is_empty());
    assert_eq!(paths_in(&service, "en"), vec!["/taxonomies/shapes"]);
    assert_eq!(paths_in(&service, "de"), vec!["/taxonomies/shapes"]);

    let leftover: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM taxonomy_nodes WHERE path LIKE '/taxonomies/colors%';",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(leftover, 0);
}

#[test]
fn prune_vocabularies_exact_name_leaves_prefixed_siblings() {
    let conn = open_db_in_memory().unwrap();
    let service = service_with_colors(&conn);
    let root = service.root().unwrap();
    service
        .repo()
        .import_subtree(
            root.identity,
            &ImportedNode::new(NodeKind::Vocabulary, "colors_extra"),
            &root.subgraph,
        )
        .unwrap();

    let pruned = service
        .prune_vocabularies(&taxonomy_core::NameFilter::new(Some("colors")), &mut Vec::new())
        .unwrap();
    assert_eq!(pruned.len(), 1);
    let remaining: Vec<String> = service
        .list_vocabularies()
        .unwrap()
        .into_iter()
        .map(|node| node.name)
        .collect();
    assert_eq!(remaining, vec!["colors_extra"]);
}

#[test]
fn vocabulary_content_survives_populate_unchanged() {
    let conn = open_db_in_memory().unwrap();
    let service = service_with_colors(&conn);
    service
        .populate_dimension("language", "de", &mut Vec::new())
        .unwrap();
    let de = subgraph(&service, "de");
    let vocabulary = service.list_vocabularies().unwrap().remove(0);

    let expected = NodeContent::from([("title".to_string(), "Colors".to_string())]);
    let german = service
        .repo()
        .get_node(vocabulary.identity, &de)
        .unwrap()
        .unwrap();
    assert_eq!(german.content, expected);
}

fn adopted(path: &str, outcome: AdoptOutcome) -> ProgressEvent {
    ProgressEvent::Adopted {
        context_path: format!("{path}@live;language=de"),
        outcome,
    }
}

fn removed(path: &str) -> ProgressEvent {
    ProgressEvent::Removed {
        context_path: format!("{path}@live;language=de"),
    }
}
