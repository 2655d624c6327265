use std::collections::BTreeMap;
use taxonomy_core::db::open_db_in_memory;
use taxonomy_core::{
    AdoptOutcome, ImportedNode, NodeKind, SqliteTaxonomyRepository, Subgraph, TaxonomyRepoError,
    TaxonomyRepository, VariantRemoval, ROOT_IDENTITY,
};
use uuid::Uuid;

fn language(value: &str) -> Subgraph {
    Subgraph::new(BTreeMap::from([(
        "language".to_string(),
        value.to_string(),
    )]))
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

#[test]
fn ensure_root_is_idempotent_per_subgraph() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTaxonomyRepository::try_new(&conn).unwrap();

    let first = repo.ensure_root(&language("en")).unwrap();
    let second = repo.ensure_root(&language("en")).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.identity, ROOT_IDENTITY);
    assert_eq!(first.path, "/taxonomies");
    assert_eq!(first.kind, NodeKind::Root);
    assert_eq!(repo.list_variants(ROOT_IDENTITY).unwrap(), vec![language("en")]);
}

#[test]
fn import_subtree_creates_then_updates() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTaxonomyRepository::try_new(&conn).unwrap();
    let en = language("en");
    repo.ensure_root(&en).unwrap();

    let created = repo.import_subtree(ROOT_IDENTITY, &colors(), &en).unwrap();
    assert_eq!(created.created, 4);
    assert_eq!(created.updated, 0);

    let mut changed = colors();
    changed
        .content
        .insert("title".to_string(), "Farben".to_string());
    let updated = repo.import_subtree(ROOT_IDENTITY, &changed, &en).unwrap();
    assert_eq!(updated.identity, created.identity);
    assert_eq!(updated.created, 0);
    assert_eq!(updated.updated, 4);

    let vocabulary = repo.get_node(created.identity, &en).unwrap().unwrap();
    assert_eq!(vocabulary.path, "/taxonomies/colors");
    assert_eq!(vocabulary.content["title"], "Farben");

    let terms: Vec<String> = repo
        .list_children(created.identity, &en)
        .unwrap()
        .into_iter()
        .map(|node| node.name)
        .collect();
    assert_eq!(terms, vec!["red", "blue"]);
}

#[test]
fn import_keeps_identities_from_document() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTaxonomyRepository::try_new(&conn).unwrap();
    let en = language("en");
    repo.ensure_root(&en).unwrap();

    let identity = Uuid::parse_str("11111111-2222-4333-8444-555555555555").unwrap();
    let mut vocabulary = colors();
    vocabulary.identity = Some(identity);
    let summary = repo.import_subtree(ROOT_IDENTITY, &vocabulary, &en).unwrap();
    assert_eq!(summary.identity, identity);
}

#[test]
fn import_rejects_path_bound_to_other_identity() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTaxonomyRepository::try_new(&conn).unwrap();
    let en = language("en");
    repo.ensure_root(&en).unwrap();
    repo.import_subtree(ROOT_IDENTITY, &colors(), &en).unwrap();

    let mut other = colors();
    other.identity = Some(Uuid::new_v4());
    let err = repo.import_subtree(ROOT_IDENTITY, &other, &en).unwrap_err();
    assert!(matches!(err, TaxonomyRepoError::PathConflict { ref path, .. } if path == "/taxonomies/colors"));
}

#[test]
fn import_rejects_identity_bound_to_other_path() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTaxonomyRepository::try_new(&conn).unwrap();
    let en = language("en");
    repo.ensure_root(&en).unwrap();
    let summary = repo.import_subtree(ROOT_IDENTITY, &colors(), &en).unwrap();

    let mut renamed = ImportedNode::new(NodeKind::Vocabulary, "shapes");
    renamed.identity = Some(summary.identity);
    let err = repo.import_subtree(ROOT_IDENTITY, &renamed, &en).unwrap_err();
    assert!(matches!(err, TaxonomyRepoError::IdentityConflict { .. }));
}

#[test]
fn failed_import_rolls_back_whole_vocabulary() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTaxonomyRepository::try_new(&conn).unwrap();
    let en = language("en");
    repo.ensure_root(&en).unwrap();

    let mut broken = colors();
    broken
        .children
        .push(ImportedNode::new(NodeKind::Vocabulary, "nested"));
    let err = repo.import_subtree(ROOT_IDENTITY, &broken, &en).unwrap_err();
    assert!(matches!(err, TaxonomyRepoError::InvalidHierarchy(_)));
    assert!(repo.find_by_path("/taxonomies/colors").unwrap().is_empty());
}

#[test]
fn adopt_copies_content_and_is_idempotent() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTaxonomyRepository::try_new(&conn).unwrap();
    let (en, de) = (language("en"), language("de"));
    repo.ensure_root(&en).unwrap();
    repo.ensure_root(&de).unwrap();
    let summary = repo.import_subtree(ROOT_IDENTITY, &colors(), &en).unwrap();

    assert_eq!(
        repo.adopt(summary.identity, &en, &de).unwrap(),
        AdoptOutcome::Created
    );
    assert_eq!(
        repo.adopt(summary.identity, &en, &de).unwrap(),
        AdoptOutcome::AlreadyPresent
    );

    let adopted = repo.get_node(summary.identity, &de).unwrap().unwrap();
    assert_eq!(adopted.content["title"], "Colors");
    assert_eq!(adopted.subgraph, de);
}

#[test]
fn adopt_requires_parent_variant_in_target() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTaxonomyRepository::try_new(&conn).unwrap();
    let (en, de) = (language("en"), language("de"));
    repo.ensure_root(&en).unwrap();
    repo.ensure_root(&de).unwrap();
    let summary = repo.import_subtree(ROOT_IDENTITY, &colors(), &en).unwrap();
    let red = repo.list_children(summary.identity, &en).unwrap()[0].identity;

    let err = repo.adopt(red, &en, &de).unwrap_err();
    assert!(err.is_structural());
    assert!(matches!(
        err,
        TaxonomyRepoError::ParentVariantMissing { parent, .. } if parent == summary.identity
    ));
    assert!(repo.get_node(red, &de).unwrap().is_none());
}

#[test]
fn remove_variant_refuses_while_children_remain() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTaxonomyRepository::try_new(&conn).unwrap();
    let en = language("en");
    repo.ensure_root(&en).unwrap();
    let summary = repo.import_subtree(ROOT_IDENTITY, &colors(), &en).unwrap();

    let err = repo.remove_variant(summary.identity, &en).unwrap_err();
    assert!(matches!(err, TaxonomyRepoError::ChildVariantsPresent { .. }));
    assert!(repo.get_node(summary.identity, &en).unwrap().is_some());
}

#[test]
fn remove_variant_retires_identity_with_last_variant() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTaxonomyRepository::try_new(&conn).unwrap();
    let (en, de) = (language("en"), language("de"));
    repo.ensure_root(&en).unwrap();
    repo.ensure_root(&de).unwrap();
    let vocabulary = ImportedNode::new(NodeKind::Vocabulary, "empty");
    let summary = repo.import_subtree(ROOT_IDENTITY, &vocabulary, &en).unwrap();
    repo.adopt(summary.identity, &en, &de).unwrap();

    assert_eq!(
        repo.remove_variant(summary.identity, &de).unwrap(),
        VariantRemoval::VariantOnly
    );
    assert_eq!(
        repo.remove_variant(summary.identity, &en).unwrap(),
        VariantRemoval::LastVariant
    );
    assert!(repo.list_variants(summary.identity).unwrap().is_empty());
    assert!(repo.find_by_path("/taxonomies/empty").unwrap().is_empty());
}

#[test]
fn root_cannot_be_removed() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTaxonomyRepository::try_new(&conn).unwrap();
    let en = language("en");
    repo.ensure_root(&en).unwrap();

    let err = repo.remove_variant(ROOT_IDENTITY, &en).unwrap_err();
    assert!(matches!(err, TaxonomyRepoError::RootImmutable));
}

#[test]
fn remove_all_in_path_deletes_descendants_in_every_subgraph() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTaxonomyRepository::try_new(&conn).unwrap();
    let (en, de) = (language("en"), language("de"));
    repo.ensure_root(&en).unwrap();
    repo.ensure_root(&de).unwrap();
    let summary = repo.import_subtree(ROOT_IDENTITY, &colors(), &en).unwrap();
    repo.adopt(summary.identity, &en, &de).unwrap();
    let red = repo.list_children(summary.identity, &en).unwrap()[0].identity;
    repo.adopt(red, &en, &de).unwrap();

    let removed = repo.remove_all_in_path("/taxonomies/colors").unwrap();
    assert_eq!(removed, 3);
    assert!(repo.list_children(summary.identity, &en).unwrap().is_empty());
    assert!(repo.list_children(summary.identity, &de).unwrap().is_empty());
    assert_eq!(repo.find_by_path("/taxonomies/colors").unwrap().len(), 2);
}

#[test]
fn remove_all_in_path_does_not_touch_sibling_prefixes() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTaxonomyRepository::try_new(&conn).unwrap();
    let en = language("en");
    repo.ensure_root(&en).unwrap();
    repo.import_subtree(ROOT_IDENTITY, &colors(), &en).unwrap();
    let mut extra = ImportedNode::new(NodeKind::Vocabulary, "colors_extra");
    extra.children.push(ImportedNode::new(NodeKind::Term, "teal"));
    repo.import_subtree(ROOT_IDENTITY, &extra, &en).unwrap();

    repo.remove_all_in_path("/taxonomies/colors").unwrap();
    assert_eq!(
        repo.find_by_path("/taxonomies/colors_extra/teal")
            .unwrap()
            .len(),
        1
    );
}
