//! Error taxonomy for the graph core

use thiserror::Error;

/// Everything the store and its collaborators can fail with.
///
/// Each variant carries a stable kind tag (see [`StoreError::kind`]) so
/// callers can branch without parsing display strings.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("node id already exists: {0}")]
    DuplicateNode(String),

    #[error("edge id already exists: {0}")]
    DuplicateEdge(String),

    #[error("{entity} {id} references missing node {missing}")]
    InvalidReference {
        /// What was being inserted ("edge" or "annotation").
        entity: &'static str,
        id: String,
        missing: String,
    },

    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("unknown pattern id: {0}")]
    PatternNotFound(String),

    #[error("invalid bundle: {}", summarize(.0))]
    InvalidBundle(Vec<ValidationIssue>),

    #[error("store is closed")]
    Closed,
}

impl StoreError {
    /// Machine-readable kind tag, stable across message changes.
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::DuplicateNode(_) => "duplicate_node",
            StoreError::DuplicateEdge(_) => "duplicate_edge",
            StoreError::InvalidReference { .. } => "invalid_reference",
            StoreError::NodeNotFound(_) => "node_not_found",
            StoreError::PatternNotFound(_) => "pattern_not_found",
            StoreError::InvalidBundle(_) => "invalid_bundle",
            StoreError::Closed => "closed",
        }
    }
}

/// One rule violation found while validating a bundle.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ValidationIssue {
    /// Dotted path to the offending field, e.g. `nodes[3].id`.
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationIssue {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

fn summarize(issues: &[ValidationIssue]) -> String {
    match issues.first() {
        Some(first) if issues.len() == 1 => first.to_string(),
        Some(first) => format!("{} (+{} more)", first, issues.len() - 1),
        None => "no issues recorded".to_string(),
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
