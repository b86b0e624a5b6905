//! Conjunctive query predicates over nodes and edges

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::model::{Edge, EdgeKind, Evidence, Node, NodeKind, Visibility};

/// Which edges around a node a query is interested in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    In,
    Out,
    #[default]
    Both,
}

/// A literal string or a compiled regular expression.
///
/// On the wire a bare string is a literal and `{"regex": "..."}` compiles
/// to the regex variant.
#[derive(Debug, Clone)]
pub enum TextMatcher {
    Literal(String),
    Regex(regex::Regex),
}

impl TextMatcher {
    pub fn literal(text: impl Into<String>) -> Self {
        TextMatcher::Literal(text.into())
    }

    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Ok(TextMatcher::Regex(regex::Regex::new(pattern)?))
    }

    pub fn matches(&self, text: &str) -> bool {
        match self {
            TextMatcher::Literal(lit) => lit == text,
            TextMatcher::Regex(re) => re.is_match(text),
        }
    }
}

impl PartialEq for TextMatcher {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TextMatcher::Literal(a), TextMatcher::Literal(b)) => a == b,
            (TextMatcher::Regex(a), TextMatcher::Regex(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }
}

impl Serialize for TextMatcher {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TextMatcher::Literal(lit) => serializer.serialize_str(lit),
            TextMatcher::Regex(re) => {
                use serde::ser::SerializeMap;
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("regex", re.as_str())?;
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for TextMatcher {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Literal(String),
            Regex { regex: String },
        }

        match Raw::deserialize(deserializer)? {
            Raw::Literal(lit) => Ok(TextMatcher::Literal(lit)),
            Raw::Regex { regex } => TextMatcher::regex(&regex).map_err(D::Error::custom),
        }
    }
}

/// One node kind or a set of acceptable kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KindFilter<K> {
    One(K),
    Any(Vec<K>),
}

impl<K: PartialEq> KindFilter<K> {
    pub fn accepts(&self, kind: &K) -> bool {
        match self {
            KindFilter::One(k) => k == kind,
            KindFilter::Any(ks) => ks.contains(kind),
        }
    }
}

/// Conjunctive node predicate. Every provided field must match; an empty
/// query matches every node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct NodeQuery {
    pub kind: Option<KindFilter<NodeKind>>,
    pub file: Option<String>,
    pub route: Option<TextMatcher>,
    pub visibility: Option<Visibility>,
    pub parent: Option<String>,
    pub name: Option<TextMatcher>,
    pub language: Option<String>,
}

impl NodeQuery {
    pub fn is_empty(&self) -> bool {
        self.kind.is_none()
            && self.file.is_none()
            && self.route.is_none()
            && self.visibility.is_none()
            && self.parent.is_none()
            && self.name.is_none()
            && self.language.is_none()
    }

    /// Full predicate check, used as the residual scan filter.
    pub fn matches(&self, node: &Node) -> bool {
        if let Some(kind) = &self.kind {
            if !kind.accepts(&node.kind) {
                return false;
            }
        }
        if let Some(file) = &self.file {
            if file != &node.file {
                return false;
            }
        }
        if let Some(route) = &self.route {
            match &node.route {
                Some(r) if route.matches(r) => {}
                _ => return false,
            }
        }
        if let Some(visibility) = &self.visibility {
            if node.visibility != Some(*visibility) {
                return false;
            }
        }
        if let Some(parent) = &self.parent {
            if node.parent.as_deref() != Some(parent.as_str()) {
                return false;
            }
        }
        if let Some(name) = &self.name {
            if !name.matches(&node.name) {
                return false;
            }
        }
        if let Some(language) = &self.language {
            if language != &node.language {
                return false;
            }
        }
        true
    }
}

/// Conjunctive edge predicate, analogous to [`NodeQuery`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EdgeQuery {
    pub kind: Option<KindFilter<EdgeKind>>,
    pub src: Option<String>,
    pub dst: Option<String>,
    /// Keep edges with confidence `>=` this threshold.
    pub min_confidence: Option<f64>,
    /// Satisfied when any listed tag appears on the edge.
    pub evidence_any: Option<Vec<Evidence>>,
}

impl EdgeQuery {
    pub fn is_empty(&self) -> bool {
        self.kind.is_none()
            && self.src.is_none()
            && self.dst.is_none()
            && self.min_confidence.is_none()
            && self.evidence_any.is_none()
    }

    pub fn matches(&self, edge: &Edge) -> bool {
        if let Some(kind) = &self.kind {
            if !kind.accepts(&edge.kind) {
                return false;
            }
        }
        if let Some(src) = &self.src {
            if src != &edge.src {
                return false;
            }
        }
        if let Some(dst) = &self.dst {
            if dst != &edge.dst {
                return false;
            }
        }
        if let Some(min) = self.min_confidence {
            if edge.confidence < min {
                return false;
            }
        }
        if let Some(tags) = &self.evidence_any {
            if !tags.iter().any(|tag| edge.evidence.contains(tag)) {
                return false;
            }
        }
        true
    }
}
