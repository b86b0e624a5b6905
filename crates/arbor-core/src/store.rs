//! Indexed in-memory graph store

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use serde::Serialize;

use crate::bundle::Bundle;
use crate::error::{Result, StoreError};
use crate::model::{Annotation, Edge, EdgeKind, Node, NodeKind, PatternInstance};
use crate::query::{Direction, EdgeQuery, KindFilter, NodeQuery};

/// Counts of what a bundle load actually applied, plus the recoverable
/// errors it skipped over.
#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct LoadReport {
    pub nodes_loaded: usize,
    pub edges_loaded: usize,
    pub annotations_loaded: usize,
    pub patterns_loaded: usize,
    pub errors: Vec<LoadError>,
}

/// One item the bulk loader skipped.
#[derive(Debug, Clone, Serialize)]
pub struct LoadError {
    /// Stable kind tag, mirrors [`StoreError::kind`].
    pub kind: &'static str,
    /// Identifier of the rejected entity, where it has one.
    pub entity: String,
    pub message: String,
}

/// Store-wide entity counts.
#[derive(Debug, Clone, Serialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub annotation_count: usize,
    pub pattern_count: usize,
    pub nodes_by_kind: BTreeMap<NodeKind, usize>,
    pub edges_by_kind: BTreeMap<EdgeKind, usize>,
}

/// A bounded neighborhood extracted from the store, by value.
#[derive(Debug, Clone, Serialize, Default)]
pub struct Subgraph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

/// The indexed graph store.
///
/// Owns every entity it holds; callers observe by value or immutable
/// borrow. Adjacency lives entirely in the secondary indexes, keyed by
/// the entities' opaque string identifiers. Single mutator contract:
/// every operation is an atomic step from the observer's perspective.
pub struct GraphStore {
    nodes: HashMap<String, Node>,
    edges: HashMap<String, Edge>,
    /// Target node id -> annotations in insertion order.
    annotations: HashMap<String, Vec<Annotation>>,
    annotation_count: usize,
    /// Pattern instances in insertion order; duplicates are data.
    patterns: Vec<PatternInstance>,

    // ── Secondary indexes (bucket order = insertion order) ──
    nodes_by_kind: HashMap<NodeKind, Vec<String>>,
    nodes_by_file: HashMap<String, Vec<String>>,
    nodes_by_parent: HashMap<String, Vec<String>>,
    nodes_by_language: HashMap<String, Vec<String>>,
    edges_by_src: HashMap<String, Vec<String>>,
    edges_by_dst: HashMap<String, Vec<String>>,
    edges_by_kind: HashMap<EdgeKind, Vec<String>>,
    patterns_by_node: HashMap<String, Vec<usize>>,

    closed: bool,
}

impl std::fmt::Debug for GraphStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphStore")
            .field("node_count", &self.nodes.len())
            .field("edge_count", &self.edges.len())
            .field("closed", &self.closed)
            .finish()
    }
}

impl GraphStore {
    pub fn new() -> Self {
        GraphStore {
            nodes: HashMap::new(),
            edges: HashMap::new(),
            annotations: HashMap::new(),
            annotation_count: 0,
            patterns: Vec::new(),
            nodes_by_kind: HashMap::new(),
            nodes_by_file: HashMap::new(),
            nodes_by_parent: HashMap::new(),
            nodes_by_language: HashMap::new(),
            edges_by_src: HashMap::new(),
            edges_by_dst: HashMap::new(),
            edges_by_kind: HashMap::new(),
            patterns_by_node: HashMap::new(),
            closed: false,
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }

    // ── Inserts ─────────────────────────────────────────────

    /// Add a node. Fails on identifier collision.
    pub fn add_node(&mut self, node: Node) -> Result<()> {
        self.ensure_open()?;
        if self.nodes.contains_key(&node.id) {
            return Err(StoreError::DuplicateNode(node.id));
        }

        self.nodes_by_kind
            .entry(node.kind)
            .or_default()
            .push(node.id.clone());
        self.nodes_by_file
            .entry(node.file.clone())
            .or_default()
            .push(node.id.clone());
        if let Some(parent) = &node.parent {
            self.nodes_by_parent
                .entry(parent.clone())
                .or_default()
                .push(node.id.clone());
        }
        self.nodes_by_language
            .entry(node.language.clone())
            .or_default()
            .push(node.id.clone());

        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    /// Add an edge. Both endpoints must already exist.
    pub fn add_edge(&mut self, edge: Edge) -> Result<()> {
        self.ensure_open()?;
        if self.edges.contains_key(&edge.id) {
            return Err(StoreError::DuplicateEdge(edge.id));
        }
        for endpoint in [&edge.src, &edge.dst] {
            if !self.nodes.contains_key(endpoint) {
                return Err(StoreError::InvalidReference {
                    entity: "edge",
                    id: edge.id,
                    missing: endpoint.clone(),
                });
            }
        }

        self.edges_by_src
            .entry(edge.src.clone())
            .or_default()
            .push(edge.id.clone());
        self.edges_by_dst
            .entry(edge.dst.clone())
            .or_default()
            .push(edge.id.clone());
        self.edges_by_kind
            .entry(edge.kind)
            .or_default()
            .push(edge.id.clone());

        self.edges.insert(edge.id.clone(), edge);
        Ok(())
    }

    /// Attach an annotation to an existing node.
    pub fn add_annotation(&mut self, annotation: Annotation) -> Result<()> {
        self.ensure_open()?;
        if !self.nodes.contains_key(&annotation.node_id) {
            return Err(StoreError::InvalidReference {
                entity: "annotation",
                id: annotation.node_id.clone(),
                missing: annotation.node_id,
            });
        }
        self.annotations
            .entry(annotation.node_id.clone())
            .or_default()
            .push(annotation);
        self.annotation_count += 1;
        Ok(())
    }

    /// Record a pattern instance as-is. Never fails on content.
    pub fn add_pattern(&mut self, pattern: PatternInstance) -> Result<()> {
        self.ensure_open()?;
        let index = self.patterns.len();
        let mut seen: HashSet<&str> = HashSet::new();
        for binding in pattern.roles.values() {
            for node_id in binding.node_ids() {
                if seen.insert(node_id) {
                    self.patterns_by_node
                        .entry(node_id.clone())
                        .or_default()
                        .push(index);
                }
            }
        }
        self.patterns.push(pattern);
        Ok(())
    }

    /// Bulk ingest: nodes first, then edges, annotations, patterns.
    ///
    /// Duplicates and dangling references are recorded in the report and
    /// skipped; a structurally invalid bundle (when `validate` is set)
    /// aborts before any mutation.
    pub fn load_bundle(&mut self, bundle: Bundle, validate: bool) -> Result<LoadReport> {
        self.ensure_open()?;
        if validate {
            let issues = bundle.validate();
            if !issues.is_empty() {
                return Err(StoreError::InvalidBundle(issues));
            }
        }

        let mut report = LoadReport::default();

        for node in bundle.nodes {
            let id = node.id.clone();
            match self.add_node(node) {
                Ok(()) => report.nodes_loaded += 1,
                Err(err) => report.errors.push(load_error(&err, id)),
            }
        }
        for edge in bundle.edges {
            let id = edge.id.clone();
            match self.add_edge(edge) {
                Ok(()) => report.edges_loaded += 1,
                Err(err) => report.errors.push(load_error(&err, id)),
            }
        }
        for annotation in bundle.annotations {
            let id = annotation.node_id.clone();
            match self.add_annotation(annotation) {
                Ok(()) => report.annotations_loaded += 1,
                Err(err) => report.errors.push(load_error(&err, id)),
            }
        }
        for pattern in bundle.patterns {
            let id = pattern.id.clone();
            match self.add_pattern(pattern) {
                Ok(()) => report.patterns_loaded += 1,
                Err(err) => report.errors.push(load_error(&err, id)),
            }
        }

        tracing::info!(
            nodes = report.nodes_loaded,
            edges = report.edges_loaded,
            annotations = report.annotations_loaded,
            patterns = report.patterns_loaded,
            skipped = report.errors.len(),
            "bundle loaded"
        );
        Ok(report)
    }

    // ── Point lookups ───────────────────────────────────────

    pub fn get_node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn get_edge(&self, id: &str) -> Option<&Edge> {
        self.edges.get(id)
    }

    // ── Local neighborhoods ─────────────────────────────────

    /// Edges incident to a node, insertion order within each direction.
    /// A self-loop is reported once under `Direction::Both`.
    pub fn edges_of(&self, id: &str, direction: Direction) -> Vec<&Edge> {
        let mut result = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();

        let buckets: &[&HashMap<String, Vec<String>>] = match direction {
            Direction::Out => &[&self.edges_by_src],
            Direction::In => &[&self.edges_by_dst],
            Direction::Both => &[&self.edges_by_src, &self.edges_by_dst],
        };
        for bucket in buckets {
            if let Some(edge_ids) = bucket.get(id) {
                for edge_id in edge_ids {
                    if seen.insert(edge_id) {
                        if let Some(edge) = self.edges.get(edge_id) {
                            result.push(edge);
                        }
                    }
                }
            }
        }
        result
    }

    /// Distinct nodes adjacent to `id`, first-appearance order.
    pub fn neighbors(&self, id: &str, direction: Direction) -> Vec<&Node> {
        let mut result = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        for edge in self.edges_of(id, direction) {
            let other = if edge.src == id { &edge.dst } else { &edge.src };
            if seen.insert(other) {
                if let Some(node) = self.nodes.get(other) {
                    result.push(node);
                }
            }
        }
        result
    }

    /// Annotations attached to a node, insertion order.
    pub fn annotations_of(&self, id: &str) -> &[Annotation] {
        self.annotations.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Pattern instances mentioning `id` in any role.
    pub fn patterns_of(&self, id: &str) -> Vec<&PatternInstance> {
        self.patterns_by_node
            .get(id)
            .map(|indices| indices.iter().map(|&i| &self.patterns[i]).collect())
            .unwrap_or_default()
    }

    // ── Set queries ─────────────────────────────────────────

    /// Nodes matching every provided predicate field.
    ///
    /// Seeds the candidate set from the most selective index-backed field
    /// (kind, file, parent, language), intersects the rest, then filters
    /// the residue with a linear scan.
    pub fn find_nodes(&self, query: &NodeQuery) -> Vec<&Node> {
        let mut seeds: Vec<Vec<&String>> = Vec::new();
        if let Some(kind) = &query.kind {
            seeds.push(match kind {
                KindFilter::One(k) => bucket_refs(self.nodes_by_kind.get(k)),
                KindFilter::Any(ks) => ks
                    .iter()
                    .flat_map(|k| bucket_refs(self.nodes_by_kind.get(k)))
                    .collect(),
            });
        }
        if let Some(file) = &query.file {
            seeds.push(bucket_refs(self.nodes_by_file.get(file)));
        }
        if let Some(parent) = &query.parent {
            seeds.push(bucket_refs(self.nodes_by_parent.get(parent)));
        }
        if let Some(language) = &query.language {
            seeds.push(bucket_refs(self.nodes_by_language.get(language)));
        }

        match narrow(seeds) {
            Some(candidates) => candidates
                .into_iter()
                .filter_map(|id| self.nodes.get(id))
                .filter(|node| query.matches(node))
                .collect(),
            // No index-backed field provided: full scan.
            None => self.nodes.values().filter(|n| query.matches(n)).collect(),
        }
    }

    /// Edges matching every provided predicate field, same strategy as
    /// [`GraphStore::find_nodes`].
    pub fn find_edges(&self, query: &EdgeQuery) -> Vec<&Edge> {
        let mut seeds: Vec<Vec<&String>> = Vec::new();
        if let Some(kind) = &query.kind {
            seeds.push(match kind {
                KindFilter::One(k) => bucket_refs(self.edges_by_kind.get(k)),
                KindFilter::Any(ks) => ks
                    .iter()
                    .flat_map(|k| bucket_refs(self.edges_by_kind.get(k)))
                    .collect(),
            });
        }
        if let Some(src) = &query.src {
            seeds.push(bucket_refs(self.edges_by_src.get(src)));
        }
        if let Some(dst) = &query.dst {
            seeds.push(bucket_refs(self.edges_by_dst.get(dst)));
        }

        match narrow(seeds) {
            Some(candidates) => candidates
                .into_iter()
                .filter_map(|id| self.edges.get(id))
                .filter(|edge| query.matches(edge))
                .collect(),
            None => self.edges.values().filter(|e| query.matches(e)).collect(),
        }
    }

    // ── Bounded subgraph extraction ─────────────────────────

    /// Breadth-first closed ball of radius `depth` around `root`, along
    /// undirected edges. A kind whitelist restricts which edges are
    /// followed; the returned edges are every stored edge whose endpoints
    /// both landed in the node set (and whose kind passes the whitelist).
    pub fn subgraph(
        &self,
        root: &str,
        depth: usize,
        kinds: Option<&BTreeSet<EdgeKind>>,
    ) -> Result<Subgraph> {
        if !self.nodes.contains_key(root) {
            return Err(StoreError::NodeNotFound(root.to_string()));
        }
        let allowed = |kind: EdgeKind| kinds.is_none_or(|set| set.contains(&kind));

        let mut visited: HashSet<&str> = HashSet::new();
        let mut order: Vec<&str> = Vec::new();
        let mut queue: VecDeque<(&str, usize)> = VecDeque::new();
        visited.insert(root);
        order.push(root);
        queue.push_back((root, 0));

        while let Some((current, dist)) = queue.pop_front() {
            if dist == depth {
                continue;
            }
            for edge in self.edges_of(current, Direction::Both) {
                if !allowed(edge.kind) {
                    continue;
                }
                let other: &str = if edge.src == current { &edge.dst } else { &edge.src };
                if visited.insert(other) {
                    order.push(other);
                    queue.push_back((other, dist + 1));
                }
            }
        }

        let mut edges = Vec::new();
        for &id in &order {
            if let Some(edge_ids) = self.edges_by_src.get(id) {
                for edge_id in edge_ids {
                    let edge = &self.edges[edge_id];
                    if allowed(edge.kind) && visited.contains(edge.dst.as_str()) {
                        edges.push(edge.clone());
                    }
                }
            }
        }
        let nodes = order.iter().map(|&id| self.nodes[id].clone()).collect();
        Ok(Subgraph { nodes, edges })
    }

    /// Shortest path between two nodes by hop count over undirected
    /// edges. `None` when the nodes are unconnected.
    pub fn get_path(&self, from: &str, to: &str) -> Result<Option<Vec<String>>> {
        for endpoint in [from, to] {
            if !self.nodes.contains_key(endpoint) {
                return Err(StoreError::NodeNotFound(endpoint.to_string()));
            }
        }
        if from == to {
            return Ok(Some(vec![from.to_string()]));
        }

        let mut predecessor: HashMap<&str, &str> = HashMap::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        predecessor.insert(from, from);
        queue.push_back(from);

        while let Some(current) = queue.pop_front() {
            for edge in self.edges_of(current, Direction::Both) {
                let other: &str = if edge.src == current { &edge.dst } else { &edge.src };
                if predecessor.contains_key(other) {
                    continue;
                }
                predecessor.insert(other, current);
                if other == to {
                    let mut path = vec![other.to_string()];
                    let mut cursor = current;
                    while cursor != from {
                        path.push(cursor.to_string());
                        cursor = predecessor[cursor];
                    }
                    path.push(from.to_string());
                    path.reverse();
                    return Ok(Some(path));
                }
                queue.push_back(other);
            }
        }
        Ok(None)
    }

    // ── Lifecycle ───────────────────────────────────────────

    /// Discard every entity and index.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
        self.annotations.clear();
        self.annotation_count = 0;
        self.patterns.clear();
        self.nodes_by_kind.clear();
        self.nodes_by_file.clear();
        self.nodes_by_parent.clear();
        self.nodes_by_language.clear();
        self.edges_by_src.clear();
        self.edges_by_dst.clear();
        self.edges_by_kind.clear();
        self.patterns_by_node.clear();
        tracing::debug!("store cleared");
    }

    /// Release buffers and render every subsequent fallible operation a
    /// fail-fast [`StoreError::Closed`]. Lookups observe an empty store.
    pub fn close(&mut self) {
        self.clear();
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            node_count: self.nodes.len(),
            edge_count: self.edges.len(),
            annotation_count: self.annotation_count,
            pattern_count: self.patterns.len(),
            nodes_by_kind: self
                .nodes_by_kind
                .iter()
                .filter(|(_, ids)| !ids.is_empty())
                .map(|(kind, ids)| (*kind, ids.len()))
                .collect(),
            edges_by_kind: self
                .edges_by_kind
                .iter()
                .filter(|(_, ids)| !ids.is_empty())
                .map(|(kind, ids)| (*kind, ids.len()))
                .collect(),
        }
    }

    /// Iterate every node, no particular order.
    pub fn all_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Iterate every edge, no particular order.
    pub fn all_edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}

fn bucket_refs(bucket: Option<&Vec<String>>) -> Vec<&String> {
    bucket.map(|ids| ids.iter().collect()).unwrap_or_default()
}

/// Pick the smallest seed and intersect the others into it. `None` means
/// no index-backed field was provided at all.
fn narrow(mut seeds: Vec<Vec<&String>>) -> Option<Vec<&String>> {
    if seeds.is_empty() {
        return None;
    }
    let smallest = seeds
        .iter()
        .enumerate()
        .min_by_key(|(_, s)| s.len())
        .map(|(i, _)| i)
        .unwrap_or(0);
    let candidates = seeds.swap_remove(smallest);
    let others: Vec<HashSet<&str>> = seeds
        .iter()
        .map(|s| s.iter().map(|id| id.as_str()).collect())
        .collect();
    Some(
        candidates
            .into_iter()
            .filter(|id| others.iter().all(|set| set.contains(id.as_str())))
            .collect(),
    )
}

fn load_error(err: &StoreError, entity: String) -> LoadError {
    LoadError {
        kind: err.kind(),
        entity,
        message: err.to_string(),
    }
}
