//! View projection: filter, exclude, and collapse a stored graph

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::Serialize;

use arbor_core::{Edge, EdgeKind, GraphStore, Node, NodeKind, PatternInstance, Result};
use arbor_patterns::MatcherEngine;

use crate::config::ViewConfig;
use crate::glob;

/// The projected view handed to layout and rendering.
#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionResult {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    /// Echoes the configuration's root, when one was given.
    pub root_id: Option<String>,
    /// Pattern instances detected over the projected scope, when asked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patterns: Option<Vec<PatternInstance>>,
}

/// Project one view: edge-kind selection, collection, confidence
/// threshold, path exclusion, then hierarchical collapse.
pub fn project(store: &GraphStore, config: &ViewConfig) -> Result<ProjectionResult> {
    let kinds = config.effective_edge_kinds();

    // Collection: rooted subgraph, or the whole store filtered by kind.
    let (mut nodes, mut edges) = match &config.root_id {
        Some(root) => {
            let sub = store.subgraph(root, config.depth, Some(&kinds))?;
            (sub.nodes, sub.edges)
        }
        None => {
            let mut nodes: Vec<Node> = store.all_nodes().cloned().collect();
            let mut edges: Vec<Edge> = store
                .all_edges()
                .filter(|e| kinds.contains(&e.kind))
                .cloned()
                .collect();
            nodes.sort_by(|a, b| a.id.cmp(&b.id));
            edges.sort_by(|a, b| a.id.cmp(&b.id));
            (nodes, edges)
        }
    };

    // Confidence threshold; the threshold itself is retained.
    edges.retain(|e| e.confidence >= config.min_confidence);
    if let Some(root) = &config.root_id {
        let referenced: HashSet<&str> = edges
            .iter()
            .flat_map(|e| [e.src.as_str(), e.dst.as_str()])
            .collect();
        nodes.retain(|n| n.id == *root || referenced.contains(n.id.as_str()));
    }

    // Path exclusion.
    if !config.exclude_paths.is_empty() {
        let excludes: Vec<regex::Regex> =
            config.exclude_paths.iter().map(|p| glob::compile(p)).collect();
        let dropped: HashSet<String> = nodes
            .iter()
            .filter(|n| excludes.iter().any(|re| re.is_match(&n.file)))
            .map(|n| n.id.clone())
            .collect();
        if !dropped.is_empty() {
            nodes.retain(|n| !dropped.contains(&n.id));
            edges.retain(|e| !dropped.contains(&e.src) && !dropped.contains(&e.dst));
        }
    }

    // Collapse children of the configured kinds into their parents.
    if !config.collapse_kinds.is_empty() {
        collapse(store, &config.collapse_kinds, &mut nodes, &mut edges);
    }

    tracing::debug!(
        nodes = nodes.len(),
        edges = edges.len(),
        root = config.root_id.as_deref().unwrap_or("-"),
        "view projected"
    );
    Ok(ProjectionResult {
        nodes,
        edges,
        root_id: config.root_id.clone(),
        patterns: None,
    })
}

/// [`project`], then run every registered pattern with the projected
/// node set as the matcher scope.
pub fn project_with_patterns(
    store: &GraphStore,
    engine: &MatcherEngine,
    config: &ViewConfig,
) -> Result<ProjectionResult> {
    let mut result = project(store, config)?;
    let scope: HashSet<String> = result.nodes.iter().map(|n| n.id.clone()).collect();
    result.patterns = Some(engine.match_all(store, Some(&scope)));
    Ok(result)
}

/// Rewrite edges through each collapsed node's surviving ancestor, then
/// drop self-loops, half-dangling edges, and `(src, dst, kind)`
/// duplicates (first occurrence wins).
fn collapse(
    store: &GraphStore,
    collapse_kinds: &[NodeKind],
    nodes: &mut Vec<Node>,
    edges: &mut Vec<Edge>,
) {
    let collapsible: BTreeSet<NodeKind> = collapse_kinds.iter().copied().collect();

    // A node survives unless its parent's kind is collapsible; walking
    // the chain handles nested collapsible containers.
    let mut rewrite: HashMap<String, String> = HashMap::new();
    for node in nodes.iter() {
        let mut target = node.id.as_str();
        let mut parent = node.parent.as_deref().and_then(|id| store.get_node(id));
        while let Some(p) = parent {
            if !collapsible.contains(&p.kind) {
                break;
            }
            target = p.id.as_str();
            parent = p.parent.as_deref().and_then(|id| store.get_node(id));
        }
        rewrite.insert(node.id.clone(), target.to_string());
    }

    nodes.retain(|n| rewrite.get(&n.id).is_none_or(|target| *target == n.id));
    let present: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();

    let mut seen: HashSet<(String, String, EdgeKind)> = HashSet::new();
    let mut kept: Vec<Edge> = Vec::with_capacity(edges.len());
    for mut edge in edges.drain(..) {
        if let Some(src) = rewrite.get(&edge.src) {
            edge.src = src.clone();
        }
        if let Some(dst) = rewrite.get(&edge.dst) {
            edge.dst = dst.clone();
        }
        if edge.src == edge.dst {
            continue;
        }
        if !present.contains(edge.src.as_str()) || !present.contains(edge.dst.as_str()) {
            continue;
        }
        if !seen.insert((edge.src.clone(), edge.dst.clone(), edge.kind)) {
            continue;
        }
        kept.push(edge);
    }
    *edges = kept;
}
