//! Canonical bundle format and its validator

use serde::{Deserialize, Serialize};

use crate::error::ValidationIssue;
use crate::model::{Annotation, Edge, Node, PatternInstance};

/// Minimum length of node and edge identifiers.
pub const MIN_ID_LEN: usize = 8;

/// Minimum length of a repository commit hash.
pub const MIN_COMMIT_LEN: usize = 7;

/// Where a bundle's graph was extracted from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoInfo {
    pub url: String,
    /// Abbreviated or full commit hash, at least 7 characters.
    pub commit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

/// A validated unit of ingest: the whole graph a producer emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Bundle {
    /// Schema version, `vN.N`.
    pub version: String,
    /// RFC 3339 timestamp stamped by the producer.
    pub generated_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<RepoInfo>,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    #[serde(default)]
    pub patterns: Vec<PatternInstance>,
}

impl Bundle {
    /// An empty bundle shell, mostly useful in tests.
    pub fn empty(version: &str, generated_at: &str) -> Self {
        Bundle {
            version: version.to_string(),
            generated_at: generated_at.to_string(),
            repo: None,
            nodes: Vec::new(),
            edges: Vec::new(),
            annotations: Vec::new(),
            patterns: Vec::new(),
        }
    }

    /// Check every structural rule and collect all violations.
    ///
    /// Referential rules (edge endpoints, annotation targets) are enforced
    /// by the store at insert time, not here.
    pub fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        if !version_is_valid(&self.version) {
            issues.push(ValidationIssue::new(
                "version",
                format!("`{}` does not match vN.N", self.version),
            ));
        }

        if chrono::DateTime::parse_from_rfc3339(&self.generated_at).is_err() {
            issues.push(ValidationIssue::new(
                "generated_at",
                format!("`{}` is not an RFC 3339 timestamp", self.generated_at),
            ));
        }

        if let Some(repo) = &self.repo {
            if repo.url.is_empty() {
                issues.push(ValidationIssue::new("repo.url", "must not be empty"));
            }
            if repo.commit.len() < MIN_COMMIT_LEN {
                issues.push(ValidationIssue::new(
                    "repo.commit",
                    format!("shorter than {MIN_COMMIT_LEN} characters"),
                ));
            }
        }

        for (i, node) in self.nodes.iter().enumerate() {
            if node.id.len() < MIN_ID_LEN {
                issues.push(ValidationIssue::new(
                    format!("nodes[{i}].id"),
                    format!("`{}` is shorter than {MIN_ID_LEN} characters", node.id),
                ));
            }
            if !node.span.is_well_formed() {
                issues.push(ValidationIssue::new(
                    format!("nodes[{i}].span"),
                    format!("end {} precedes start {}", node.span.end(), node.span.start()),
                ));
            }
        }

        for (i, edge) in self.edges.iter().enumerate() {
            if edge.id.len() < MIN_ID_LEN {
                issues.push(ValidationIssue::new(
                    format!("edges[{i}].id"),
                    format!("`{}` is shorter than {MIN_ID_LEN} characters", edge.id),
                ));
            }
            if !(0.0..=1.0).contains(&edge.confidence) {
                issues.push(ValidationIssue::new(
                    format!("edges[{i}].confidence"),
                    format!("{} is outside [0, 1]", edge.confidence),
                ));
            }
            if edge.evidence.is_empty() {
                issues.push(ValidationIssue::new(
                    format!("edges[{i}].evidence"),
                    "must contain at least one tag",
                ));
            }
        }

        for (i, pattern) in self.patterns.iter().enumerate() {
            if !(0.0..=1.0).contains(&pattern.confidence) {
                issues.push(ValidationIssue::new(
                    format!("patterns[{i}].confidence"),
                    format!("{} is outside [0, 1]", pattern.confidence),
                ));
            }
        }

        issues
    }
}

fn version_is_valid(version: &str) -> bool {
    // vN.N with no prefix or suffix
    let mut parts = match version.strip_prefix('v') {
        Some(rest) => rest.splitn(2, '.'),
        None => return false,
    };
    let (major, minor) = (parts.next(), parts.next());
    match (major, minor) {
        (Some(major), Some(minor)) => {
            !major.is_empty()
                && !minor.is_empty()
                && major.chars().all(|c| c.is_ascii_digit())
                && minor.chars().all(|c| c.is_ascii_digit())
        }
        _ => false,
    }
}
