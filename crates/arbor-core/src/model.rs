//! Core data structures for the semantic code graph

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Discriminates what kind of code element a node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Module,
    Class,
    Interface,
    Trait,
    Function,
    Method,
    Field,
    Property,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Module => "module",
            NodeKind::Class => "class",
            NodeKind::Interface => "interface",
            NodeKind::Trait => "trait",
            NodeKind::Function => "function",
            NodeKind::Method => "method",
            NodeKind::Field => "field",
            NodeKind::Property => "property",
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What kind of relationship a directed edge represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Defines,
    Imports,
    Calls,
    Inherits,
    Implements,
    Uses,
    Reads,
    Writes,
    Throws,
}

impl EdgeKind {
    /// Every edge kind, in declaration order.
    pub const ALL: [EdgeKind; 9] = [
        EdgeKind::Defines,
        EdgeKind::Imports,
        EdgeKind::Calls,
        EdgeKind::Inherits,
        EdgeKind::Implements,
        EdgeKind::Uses,
        EdgeKind::Reads,
        EdgeKind::Writes,
        EdgeKind::Throws,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Defines => "defines",
            EdgeKind::Imports => "imports",
            EdgeKind::Calls => "calls",
            EdgeKind::Inherits => "inherits",
            EdgeKind::Implements => "implements",
            EdgeKind::Uses => "uses",
            EdgeKind::Reads => "reads",
            EdgeKind::Writes => "writes",
            EdgeKind::Throws => "throws",
        }
    }
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared visibility of a node, where the producer knows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Protected,
    Private,
    Unknown,
}

/// How a producer derived an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Evidence {
    Chunker,
    Lsp,
    StaticAnalysis,
    Heuristic,
    LlmScore,
}

/// Half-open character span `[start, end)` within a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Span(pub u64, pub u64);

impl Span {
    pub fn start(&self) -> u64 {
        self.0
    }

    pub fn end(&self) -> u64 {
        self.1
    }

    /// A span is well-formed when `end >= start`.
    pub fn is_well_formed(&self) -> bool {
        self.1 >= self.0
    }
}

/// A single code element in the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Node {
    /// Opaque stable identifier, unique across the store.
    pub id: String,
    pub kind: NodeKind,
    /// Display name.
    pub name: String,
    /// Source language tag.
    pub language: String,
    /// File path the element lives in.
    pub file: String,
    pub span: Span,
    /// Identifier of the node that syntactically contains this one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Dotted fully qualified symbol path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_hash: Option<String>,
}

/// A directed typed relationship between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Opaque identifier, unique across the store.
    pub id: String,
    pub kind: EdgeKind,
    pub src: String,
    pub dst: String,
    /// Producer confidence in `[0, 1]`.
    pub confidence: f64,
    /// How the edge was derived. Order is data and is preserved.
    pub evidence: Vec<Evidence>,
    /// Opaque producer metadata, not interpreted by the core.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Map<String, Value>>,
}

/// A free-form tag set attached to exactly one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// The node this annotation targets.
    pub node_id: String,
    pub tags: Vec<String>,
    /// Optional scalar key/value payload.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub values: BTreeMap<String, Value>,
}

/// The node id(s) bound to a single pattern role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RoleBinding {
    One(String),
    Many(Vec<String>),
}

impl RoleBinding {
    /// Every node id in this binding, singletons included.
    pub fn node_ids(&self) -> &[String] {
        match self {
            RoleBinding::One(id) => std::slice::from_ref(id),
            RoleBinding::Many(ids) => ids,
        }
    }

    pub fn len(&self) -> usize {
        self.node_ids().len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_ids().is_empty()
    }
}

/// A detected (or previously detected) design-pattern instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternInstance {
    pub id: String,
    /// The pattern template this instance was matched against.
    pub pattern_id: String,
    /// Role name to bound node id(s).
    pub roles: BTreeMap<String, RoleBinding>,
    /// Match confidence in `[0, 1]`.
    pub confidence: f64,
    pub evidence: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl PatternInstance {
    /// Whether any role of this instance binds the given node.
    pub fn mentions(&self, node_id: &str) -> bool {
        self.roles
            .values()
            .any(|binding| binding.node_ids().iter().any(|id| id == node_id))
    }
}
