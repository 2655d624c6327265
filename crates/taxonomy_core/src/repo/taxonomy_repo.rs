//! Taxonomy tree repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist the identity arena (`taxonomy_nodes`) and the per-subgraph
//!   variant table (`node_variants` + `variant_properties`).
//! - Provide the tree primitives the synchronization engine and the codec
//!   are built from: lookup, typed child listing, path deletes, adoption and
//!   bulk import.
//!
//! # Invariants
//! - A variant exists in subgraph S only if its parent's variant exists in S.
//! - The root identity is never removed.
//! - An identity row is deleted together with its last variant.
//! - Child listing is deterministic: `sort_order ASC, node_uuid ASC`.
//! - Every mutating call runs in one immediate transaction.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::dimension::Subgraph;
use crate::model::node::{
    child_path, is_valid_node_name, ImportedNode, NodeContent, NodeIdentity, NodeKind,
    TaxonomyNode, ROOT_IDENTITY, ROOT_NAME, ROOT_PATH,
};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const NODE_SELECT_SQL: &str = "SELECT
    n.node_uuid AS node_uuid,
    n.kind AS kind,
    n.parent_uuid AS parent_uuid,
    n.name AS name,
    n.path AS path,
    n.sort_order AS sort_order,
    v.subgraph AS subgraph
FROM taxonomy_nodes n
INNER JOIN node_variants v ON v.node_uuid = n.node_uuid";

/// Result type used by taxonomy repository operations.
pub type TaxonomyRepoResult<T> = Result<T, TaxonomyRepoError>;

/// Errors from taxonomy repository operations.
#[derive(Debug)]
pub enum TaxonomyRepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Identity does not exist in any subgraph.
    NodeNotFound(NodeIdentity),
    /// Identity has no variant in the given subgraph.
    VariantNotFound {
        identity: NodeIdentity,
        subgraph: Subgraph,
    },
    /// Creating a variant would leave it without its parent's variant.
    ParentVariantMissing {
        identity: NodeIdentity,
        parent: NodeIdentity,
        subgraph: Subgraph,
    },
    /// Removing a variant would orphan child variants in the same subgraph.
    ChildVariantsPresent {
        identity: NodeIdentity,
        subgraph: Subgraph,
    },
    /// The root identity cannot be removed.
    RootImmutable,
    /// Path is already bound to another identity.
    PathConflict {
        path: String,
        existing: NodeIdentity,
    },
    /// Identity is already bound to another path.
    IdentityConflict {
        identity: NodeIdentity,
        path: String,
    },
    /// Node kind/name does not fit at the requested place in the tree.
    InvalidHierarchy(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
}

impl TaxonomyRepoError {
    /// Whether the error is a violation of per-subgraph tree connectivity.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::ParentVariantMissing { .. } | Self::ChildVariantsPresent { .. }
        )
    }
}

impl Display for TaxonomyRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NodeNotFound(id) => write!(f, "taxonomy node not found: {id}"),
            Self::VariantNotFound { identity, subgraph } => {
                write!(f, "taxonomy node {identity} has no variant in {subgraph}")
            }
            Self::ParentVariantMissing {
                identity,
                parent,
                subgraph,
            } => write!(
                f,
                "cannot create variant of {identity} in {subgraph}: parent {parent} has no variant there"
            ),
            Self::ChildVariantsPresent { identity, subgraph } => write!(
                f,
                "cannot remove variant of {identity} in {subgraph}: child variants still exist"
            ),
            Self::RootImmutable => write!(f, "the taxonomy root cannot be removed"),
            Self::PathConflict { path, existing } => {
                write!(f, "path `{path}` is already bound to node {existing}")
            }
            Self::IdentityConflict { identity, path } => {
                write!(f, "node {identity} already exists at path `{path}`")
            }
            Self::InvalidHierarchy(message) => write!(f, "invalid taxonomy hierarchy: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "taxonomy repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "taxonomy repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "taxonomy repository requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid taxonomy data: {message}"),
        }
    }
}

impl Error for TaxonomyRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for TaxonomyRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for TaxonomyRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Outcome of adopting a node into a subgraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdoptOutcome {
    /// A new variant was created from the source variant.
    Created,
    /// The target subgraph already had a variant; nothing changed.
    AlreadyPresent,
}

/// Outcome of removing one variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantRemoval {
    /// Other variants of the identity remain.
    VariantOnly,
    /// The removed variant was the last one; the identity is gone.
    LastVariant,
}

/// Counters for one bulk import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    /// Identity of the subtree's top node.
    pub identity: NodeIdentity,
    /// Identities created by this import.
    pub created: usize,
    /// Existing identities whose variant content was written.
    pub updated: usize,
}

/// Tree store seam used by the synchronization engine and the codec.
pub trait TaxonomyRepository {
    /// Creates the root identity and its variant in `subgraph` when missing.
    fn ensure_root(&self, subgraph: &Subgraph) -> TaxonomyRepoResult<TaxonomyNode>;
    /// Re-resolves one identity into `subgraph` (exact variant, no fallback).
    fn get_node(
        &self,
        identity: NodeIdentity,
        subgraph: &Subgraph,
    ) -> TaxonomyRepoResult<Option<TaxonomyNode>>;
    /// Lists children of `parent` that have a variant in `subgraph`.
    fn list_children(
        &self,
        parent: NodeIdentity,
        subgraph: &Subgraph,
    ) -> TaxonomyRepoResult<Vec<TaxonomyNode>>;
    /// Lists every variant stored at exactly `path`.
    fn find_by_path(&self, path: &str) -> TaxonomyRepoResult<Vec<TaxonomyNode>>;
    /// Lists the subgraphs an identity has variants in.
    fn list_variants(&self, identity: NodeIdentity) -> TaxonomyRepoResult<Vec<Subgraph>>;
    /// Deletes every identity strictly below `path`, in all subgraphs.
    ///
    /// Returns the number of identities removed.
    fn remove_all_in_path(&self, path: &str) -> TaxonomyRepoResult<usize>;
    /// Deletes the variant of `identity` in `subgraph` only.
    fn remove_variant(
        &self,
        identity: NodeIdentity,
        subgraph: &Subgraph,
    ) -> TaxonomyRepoResult<VariantRemoval>;
    /// Creates the variant of `identity` in `into` from its variant in `from`.
    fn adopt(
        &self,
        identity: NodeIdentity,
        from: &Subgraph,
        into: &Subgraph,
    ) -> TaxonomyRepoResult<AdoptOutcome>;
    /// Inserts or updates one subtree below `anchor` in `subgraph`.
    fn import_subtree(
        &self,
        anchor: NodeIdentity,
        subtree: &ImportedNode,
        subgraph: &Subgraph,
    ) -> TaxonomyRepoResult<ImportSummary>;
}

/// SQLite-backed taxonomy repository.
pub struct SqliteTaxonomyRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTaxonomyRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> TaxonomyRepoResult<Self> {
        ensure_taxonomy_connection_ready(conn)?;
        Ok(Self { conn })
    }

    fn begin(&self) -> TaxonomyRepoResult<Transaction<'conn>> {
        Ok(Transaction::new_unchecked(
            self.conn,
            TransactionBehavior::Immediate,
        )?)
    }
}

impl TaxonomyRepository for SqliteTaxonomyRepository<'_> {
    fn ensure_root(&self, subgraph: &Subgraph) -> TaxonomyRepoResult<TaxonomyNode> {
        let tx = self.begin()?;
        tx.execute(
            "INSERT OR IGNORE INTO taxonomy_nodes (
                node_uuid,
                kind,
                parent_uuid,
                name,
                path,
                sort_order
            ) VALUES (?1, 'root', NULL, ?2, ?3, 0);",
            params![ROOT_IDENTITY.to_string(), ROOT_NAME, ROOT_PATH],
        )?;
        tx.execute(
            "INSERT OR IGNORE INTO node_variants (node_uuid, subgraph) VALUES (?1, ?2);",
            params![ROOT_IDENTITY.to_string(), subgraph.key()],
        )?;
        tx.commit()?;

        self.get_node(ROOT_IDENTITY, subgraph)?
            .ok_or_else(|| TaxonomyRepoError::VariantNotFound {
                identity: ROOT_IDENTITY,
                subgraph: subgraph.clone(),
            })
    }

    fn get_node(
        &self,
        identity: NodeIdentity,
        subgraph: &Subgraph,
    ) -> TaxonomyRepoResult<Option<TaxonomyNode>> {
        let sql = format!("{NODE_SELECT_SQL} WHERE n.node_uuid = ?1 AND v.subgraph = ?2;");
        let mut nodes = query_nodes(
            self.conn,
            &sql,
            params![identity.to_string(), subgraph.key()],
        )?;
        Ok(nodes.pop())
    }

    fn list_children(
        &self,
        parent: NodeIdentity,
        subgraph: &Subgraph,
    ) -> TaxonomyRepoResult<Vec<TaxonomyNode>> {
        let sql = format!(
            "{NODE_SELECT_SQL}
             WHERE n.parent_uuid = ?1
               AND v.subgraph = ?2
             ORDER BY n.sort_order ASC, n.node_uuid ASC;"
        );
        query_nodes(self.conn, &sql, params![parent.to_string(), subgraph.key()])
    }

    fn find_by_path(&self, path: &str) -> TaxonomyRepoResult<Vec<TaxonomyNode>> {
        let sql = format!("{NODE_SELECT_SQL} WHERE n.path = ?1 ORDER BY v.subgraph ASC;");
        query_nodes(self.conn, &sql, params![path])
    }

    fn list_variants(&self, identity: NodeIdentity) -> TaxonomyRepoResult<Vec<Subgraph>> {
        let mut stmt = self.conn.prepare(
            "SELECT subgraph
             FROM node_variants
             WHERE node_uuid = ?1
             ORDER BY subgraph ASC;",
        )?;
        let mut rows = stmt.query([identity.to_string()])?;
        let mut subgraphs = Vec::new();
        while let Some(row) = rows.next()? {
            let key: String = row.get(0)?;
            subgraphs.push(parse_subgraph(&key)?);
        }
        Ok(subgraphs)
    }

    fn remove_all_in_path(&self, path: &str) -> TaxonomyRepoResult<usize> {
        let pattern = format!("{}/%", escape_like(path));
        let tx = self.begin()?;
        // Cascading deletes do not show up in `changes()`; count up front.
        let count: i64 = tx.query_row(
            "SELECT COUNT(*) FROM taxonomy_nodes WHERE path LIKE ?1 ESCAPE '\\';",
            [pattern.as_str()],
            |row| row.get(0),
        )?;
        tx.execute(
            "DELETE FROM taxonomy_nodes WHERE path LIKE ?1 ESCAPE '\\';",
            [pattern.as_str()],
        )?;
        tx.commit()?;
        Ok(count as usize)
    }

    fn remove_variant(
        &self,
        identity: NodeIdentity,
        subgraph: &Subgraph,
    ) -> TaxonomyRepoResult<VariantRemoval> {
        if identity == ROOT_IDENTITY {
            return Err(TaxonomyRepoError::RootImmutable);
        }

        let tx = self.begin()?;
        if !variant_exists(&tx, identity, subgraph)? {
            return Err(TaxonomyRepoError::VariantNotFound {
                identity,
                subgraph: subgraph.clone(),
            });
        }

        let has_child_variants: i64 = tx.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM taxonomy_nodes n
                INNER JOIN node_variants v ON v.node_uuid = n.node_uuid
                WHERE n.parent_uuid = ?1
                  AND v.subgraph = ?2
            );",
            params![identity.to_string(), subgraph.key()],
            |row| row.get(0),
        )?;
        if has_child_variants == 1 {
            return Err(TaxonomyRepoError::ChildVariantsPresent {
                identity,
                subgraph: subgraph.clone(),
            });
        }

        tx.execute(
            "DELETE FROM node_variants WHERE node_uuid = ?1 AND subgraph = ?2;",
            params![identity.to_string(), subgraph.key()],
        )?;
        let retired = tx.execute(
            "DELETE FROM taxonomy_nodes
             WHERE node_uuid = ?1
               AND NOT EXISTS(SELECT 1 FROM node_variants WHERE node_uuid = ?1);",
            [identity.to_string()],
        )?;
        tx.commit()?;

        Ok(if retired == 0 {
            VariantRemoval::VariantOnly
        } else {
            VariantRemoval::LastVariant
        })
    }

    fn adopt(
        &self,
        identity: NodeIdentity,
        from: &Subgraph,
        into: &Subgraph,
    ) -> TaxonomyRepoResult<AdoptOutcome> {
        let tx = self.begin()?;
        if variant_exists(&tx, identity, into)? {
            return Ok(AdoptOutcome::AlreadyPresent);
        }
        if !variant_exists(&tx, identity, from)? {
            return Err(TaxonomyRepoError::VariantNotFound {
                identity,
                subgraph: from.clone(),
            });
        }

        let parent = load_parent(&tx, identity)?;
        if let Some(parent) = parent {
            if !variant_exists(&tx, parent, into)? {
                return Err(TaxonomyRepoError::ParentVariantMissing {
                    identity,
                    parent,
                    subgraph: into.clone(),
                });
            }
        }

        tx.execute(
            "INSERT INTO node_variants (node_uuid, subgraph) VALUES (?1, ?2);",
            params![identity.to_string(), into.key()],
        )?;
        tx.execute(
            "INSERT INTO variant_properties (node_uuid, subgraph, name, value)
             SELECT node_uuid, ?3, name, value
             FROM variant_properties
             WHERE node_uuid = ?1
               AND subgraph = ?2;",
            params![identity.to_string(), from.key(), into.key()],
        )?;
        tx.commit()?;
        Ok(AdoptOutcome::Created)
    }

    fn import_subtree(
        &self,
        anchor: NodeIdentity,
        subtree: &ImportedNode,
        subgraph: &Subgraph,
    ) -> TaxonomyRepoResult<ImportSummary> {
        let tx = self.begin()?;
        let anchor_row =
            load_identity_row(&tx, anchor)?.ok_or(TaxonomyRepoError::NodeNotFound(anchor))?;
        if !variant_exists(&tx, anchor, subgraph)? {
            return Err(TaxonomyRepoError::VariantNotFound {
                identity: anchor,
                subgraph: subgraph.clone(),
            });
        }

        let mut summary = ImportSummary {
            identity: anchor,
            created: 0,
            updated: 0,
        };
        let identity = import_node(&tx, &anchor_row, subtree, subgraph, &mut summary)?;
        summary.identity = identity;
        tx.commit()?;
        Ok(summary)
    }
}

/// Identity-level columns of one `taxonomy_nodes` row.
struct IdentityRow {
    identity: NodeIdentity,
    kind: NodeKind,
    path: String,
}

fn import_node(
    conn: &Connection,
    parent: &IdentityRow,
    node: &ImportedNode,
    subgraph: &Subgraph,
    summary: &mut ImportSummary,
) -> TaxonomyRepoResult<NodeIdentity> {
    if !is_valid_node_name(&node.name) {
        return Err(TaxonomyRepoError::InvalidHierarchy(format!(
            "invalid node name `{}` below `{}`",
            node.name, parent.path
        )));
    }
    if !node.kind.allowed_below(parent.kind) {
        return Err(TaxonomyRepoError::InvalidHierarchy(format!(
            "{} `{}` cannot be placed below {} `{}`",
            node.kind.as_str(),
            node.name,
            parent.kind.as_str(),
            parent.path
        )));
    }

    let path = child_path(&parent.path, &node.name);
    let existing = load_identity_row_by_path(conn, &path)?;
    let identity = match (node.identity, existing) {
        (Some(identity), Some(existing)) if identity != existing.identity => {
            return Err(TaxonomyRepoError::PathConflict {
                path,
                existing: existing.identity,
            });
        }
        (_, Some(existing)) => {
            if existing.kind != node.kind {
                return Err(TaxonomyRepoError::InvalidHierarchy(format!(
                    "`{path}` is stored as {} but imported as {}",
                    existing.kind.as_str(),
                    node.kind.as_str()
                )));
            }
            summary.updated += 1;
            existing.identity
        }
        (requested, None) => {
            let identity = requested.unwrap_or_else(Uuid::new_v4);
            if let Some(other) = load_identity_row(conn, identity)? {
                return Err(TaxonomyRepoError::IdentityConflict {
                    identity,
                    path: other.path,
                });
            }
            let sort_order = next_sort_order(conn, parent.identity)?;
            conn.execute(
                "INSERT INTO taxonomy_nodes (
                    node_uuid,
                    kind,
                    parent_uuid,
                    name,
                    path,
                    sort_order
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
                params![
                    identity.to_string(),
                    node.kind.as_str(),
                    parent.identity.to_string(),
                    node.name,
                    path,
                    sort_order,
                ],
            )?;
            summary.created += 1;
            identity
        }
    };

    conn.execute(
        "INSERT INTO node_variants (node_uuid, subgraph) VALUES (?1, ?2)
         ON CONFLICT (node_uuid, subgraph)
         DO UPDATE SET updated_at = (strftime('%s', 'now') * 1000);",
        params![identity.to_string(), subgraph.key()],
    )?;
    write_content(conn, identity, subgraph, &node.content)?;

    let current = IdentityRow {
        identity,
        kind: node.kind,
        path,
    };
    for child in &node.children {
        import_node(conn, &current, child, subgraph, summary)?;
    }
    Ok(identity)
}

fn write_content(
    conn: &Connection,
    identity: NodeIdentity,
    subgraph: &Subgraph,
    content: &NodeContent,
) -> TaxonomyRepoResult<()> {
    conn.execute(
        "DELETE FROM variant_properties WHERE node_uuid = ?1 AND subgraph = ?2;",
        params![identity.to_string(), subgraph.key()],
    )?;
    let mut stmt = conn.prepare(
        "INSERT INTO variant_properties (node_uuid, subgraph, name, value)
         VALUES (?1, ?2, ?3, ?4);",
    )?;
    for (name, value) in content {
        stmt.execute(params![identity.to_string(), subgraph.key(), name, value])?;
    }
    Ok(())
}

fn query_nodes(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> TaxonomyRepoResult<Vec<TaxonomyNode>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    let mut nodes = Vec::new();
    while let Some(row) = rows.next()? {
        nodes.push(parse_node_row(row)?);
    }
    drop(rows);

    for node in &mut nodes {
        node.content = load_content(conn, node.identity, &node.subgraph)?;
    }
    Ok(nodes)
}

fn load_content(
    conn: &Connection,
    identity: NodeIdentity,
    subgraph: &Subgraph,
) -> TaxonomyRepoResult<NodeContent> {
    let mut stmt = conn.prepare(
        "SELECT name, value
         FROM variant_properties
         WHERE node_uuid = ?1
           AND subgraph = ?2
         ORDER BY name ASC;",
    )?;
    let mut rows = stmt.query(params![identity.to_string(), subgraph.key()])?;
    let mut content = NodeContent::new();
    while let Some(row) = rows.next()? {
        content.insert(row.get(0)?, row.get(1)?);
    }
    Ok(content)
}

fn variant_exists(
    conn: &Connection,
    identity: NodeIdentity,
    subgraph: &Subgraph,
) -> TaxonomyRepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM node_variants
            WHERE node_uuid = ?1
              AND subgraph = ?2
        );",
        params![identity.to_string(), subgraph.key()],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn load_parent(
    conn: &Connection,
    identity: NodeIdentity,
) -> TaxonomyRepoResult<Option<NodeIdentity>> {
    let parent: Option<Option<String>> = conn
        .query_row(
            "SELECT parent_uuid FROM taxonomy_nodes WHERE node_uuid = ?1;",
            [identity.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    match parent {
        None => Err(TaxonomyRepoError::NodeNotFound(identity)),
        Some(None) => Ok(None),
        Some(Some(value)) => parse_uuid(&value, "taxonomy_nodes.parent_uuid").map(Some),
    }
}

fn load_identity_row(
    conn: &Connection,
    identity: NodeIdentity,
) -> TaxonomyRepoResult<Option<IdentityRow>> {
    load_identity_row_where(conn, "node_uuid = ?1", &identity.to_string())
}

fn load_identity_row_by_path(
    conn: &Connection,
    path: &str,
) -> TaxonomyRepoResult<Option<IdentityRow>> {
    load_identity_row_where(conn, "path = ?1", path)
}

fn load_identity_row_where(
    conn: &Connection,
    predicate: &str,
    value: &str,
) -> TaxonomyRepoResult<Option<IdentityRow>> {
    let row: Option<(String, String, String)> = conn
        .query_row(
            &format!("SELECT node_uuid, kind, path FROM taxonomy_nodes WHERE {predicate};"),
            [value],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;

    row.map(|(identity, kind, path)| -> TaxonomyRepoResult<IdentityRow> {
        Ok(IdentityRow {
            identity: parse_uuid(&identity, "taxonomy_nodes.node_uuid")?,
            kind: parse_kind(&kind)?,
            path,
        })
    })
    .transpose()
}

fn next_sort_order(conn: &Connection, parent: NodeIdentity) -> TaxonomyRepoResult<i64> {
    let next = conn.query_row(
        "SELECT COALESCE(MAX(sort_order), -1) + 1
         FROM taxonomy_nodes
         WHERE parent_uuid = ?1;",
        [parent.to_string()],
        |row| row.get(0),
    )?;
    Ok(next)
}

fn parse_node_row(row: &Row<'_>) -> TaxonomyRepoResult<TaxonomyNode> {
    let identity_text: String = row.get("node_uuid")?;
    let identity = parse_uuid(&identity_text, "taxonomy_nodes.node_uuid")?;

    let parent = row
        .get::<_, Option<String>>("parent_uuid")?
        .map(|value| parse_uuid(&value, "taxonomy_nodes.parent_uuid"))
        .transpose()?;

    let kind_text: String = row.get("kind")?;
    let subgraph_key: String = row.get("subgraph")?;

    Ok(TaxonomyNode {
        identity,
        kind: parse_kind(&kind_text)?,
        parent,
        name: row.get("name")?,
        path: row.get("path")?,
        sort_order: row.get("sort_order")?,
        subgraph: parse_subgraph(&subgraph_key)?,
        content: NodeContent::new(),
    })
}

fn parse_kind(value: &str) -> TaxonomyRepoResult<NodeKind> {
    NodeKind::parse(value).ok_or_else(|| {
        TaxonomyRepoError::InvalidData(format!(
            "invalid node kind `{value}` in taxonomy_nodes.kind"
        ))
    })
}

fn parse_subgraph(value: &str) -> TaxonomyRepoResult<Subgraph> {
    Subgraph::from_key(value)
        .map_err(|err| TaxonomyRepoError::InvalidData(format!("{err} in node_variants.subgraph")))
}

fn parse_uuid(value: &str, column: &'static str) -> TaxonomyRepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| TaxonomyRepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn ensure_taxonomy_connection_ready(conn: &Connection) -> TaxonomyRepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(TaxonomyRepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    let required: [(&'static str, &[&'static str]); 3] = [
        (
            "taxonomy_nodes",
            &["node_uuid", "kind", "parent_uuid", "name", "path", "sort_order"],
        ),
        ("node_variants", &["node_uuid", "subgraph"]),
        ("variant_properties", &["node_uuid", "subgraph", "name", "value"]),
    ];
    for (table, columns) in required {
        if !table_exists(conn, table)? {
            return Err(TaxonomyRepoError::MissingRequiredTable(table));
        }
        for column in columns {
            if !table_has_column(conn, table, column)? {
                return Err(TaxonomyRepoError::MissingRequiredColumn {
                    table,
                    column: *column,
                });
            }
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> TaxonomyRepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> TaxonomyRepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
