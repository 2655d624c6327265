//! Taxonomy node model.
//!
//! A logical node (identity, kind, name, path) is stored once; its content is
//! projected per subgraph. [`TaxonomyNode`] is the read model of one such
//! projection.

use crate::dimension::Subgraph;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Stable key shared by every dimension variant of one logical node.
pub type NodeIdentity = Uuid;

/// Opaque per-variant content: property name to value.
pub type NodeContent = BTreeMap<String, String>;

/// Well-known identity of the taxonomy root.
pub const ROOT_IDENTITY: NodeIdentity = Uuid::from_u128(0x7a8f_3c1e_4d2b_4e6a_9b05_1c3d_5e7f_9a01);

/// Node name of the taxonomy root.
pub const ROOT_NAME: &str = "taxonomies";

/// Path of the taxonomy root.
pub const ROOT_PATH: &str = "/taxonomies";

/// Node kind. Only vocabularies and terms are ever traversed by the
/// synchronization engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// The single taxonomy container node.
    Root,
    /// Top-level taxonomy entry directly below the root.
    Vocabulary,
    /// Node inside a vocabulary's hierarchy.
    Term,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::Vocabulary => "vocabulary",
            Self::Term => "term",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "root" => Some(Self::Root),
            "vocabulary" => Some(Self::Vocabulary),
            "term" => Some(Self::Term),
            _ => None,
        }
    }

    /// Whether the node takes part in vocabulary/term traversals.
    pub fn is_taxonomy_content(self) -> bool {
        matches!(self, Self::Vocabulary | Self::Term)
    }

    /// Whether a node of this kind may be placed directly below `parent`.
    pub fn allowed_below(self, parent: NodeKind) -> bool {
        matches!(
            (parent, self),
            (NodeKind::Root, NodeKind::Vocabulary)
                | (NodeKind::Vocabulary, NodeKind::Term)
                | (NodeKind::Term, NodeKind::Term)
        )
    }
}

/// Read model of one node variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxonomyNode {
    pub identity: NodeIdentity,
    pub kind: NodeKind,
    /// `None` only for the root.
    pub parent: Option<NodeIdentity>,
    pub name: String,
    /// Slash-separated names from the root, e.g. `/taxonomies/colors/red`.
    pub path: String,
    /// Order among siblings.
    pub sort_order: i64,
    /// Subgraph this variant belongs to.
    pub subgraph: Subgraph,
    pub content: NodeContent,
}

impl TaxonomyNode {
    /// Path qualified with workspace and subgraph, used in progress output.
    pub fn context_path(&self) -> String {
        self.subgraph.context_path(&self.path)
    }
}

/// Node subtree read from an exchange document, ready for bulk insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedNode {
    /// Identity carried by the document; a fresh one is minted when absent.
    pub identity: Option<NodeIdentity>,
    pub kind: NodeKind,
    pub name: String,
    pub content: NodeContent,
    pub children: Vec<ImportedNode>,
}

impl ImportedNode {
    pub fn new(kind: NodeKind, name: impl Into<String>) -> Self {
        Self {
            identity: None,
            kind,
            name: name.into(),
            content: NodeContent::new(),
            children: Vec::new(),
        }
    }

    /// Number of nodes in this subtree, including itself.
    pub fn node_count(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(ImportedNode::node_count)
            .sum::<usize>()
    }
}

/// Validates a node name: non-blank, no path separator, no surrounding space.
pub fn is_valid_node_name(name: &str) -> bool {
    !name.is_empty() && name.trim() == name && !name.contains('/') && !name.contains('@')
}

/// Path of a child node below `parent_path`.
pub fn child_path(parent_path: &str, name: &str) -> String {
    format!("{parent_path}/{name}")
}
