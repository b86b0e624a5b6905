//! Declarative pattern definition language

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use arbor_core::{EdgeKind, NodeKind, NodeQuery, TextMatcher};

/// Weight used when a satisfied constraint has no entry in the scoring
/// table under any of its labels.
pub const FALLBACK_WEIGHT: f64 = 0.05;

/// A complete pattern template: named roles plus the constraints that
/// relate them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternDef {
    /// Stable template identifier, e.g. `observer`.
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub roles: BTreeMap<String, RoleSpec>,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    pub scoring: Scoring,
}

/// What a single role may bind to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleSpec {
    /// Required node kind.
    pub kind: NodeKind,
    /// The bound node must be syntactically owned by this role's node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owned_by: Option<String>,
    /// Literal or regex display-name matcher.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<TextMatcher>,
    /// Additional node-query fields forwarded to the store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<NodeQuery>,
}

impl RoleSpec {
    pub fn of_kind(kind: NodeKind) -> Self {
        RoleSpec {
            kind,
            owned_by: None,
            name: None,
            filter: None,
        }
    }
}

/// One role name or a list of alternatives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RoleRef {
    One(String),
    Any(Vec<String>),
}

impl RoleRef {
    pub fn names(&self) -> &[String] {
        match self {
            RoleRef::One(name) => std::slice::from_ref(name),
            RoleRef::Any(names) => names,
        }
    }
}

/// Requires at least one edge of `kind` from the `from` binding to any
/// of the `to` bindings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeConstraint {
    pub kind: EdgeKind,
    pub from: String,
    pub to: RoleRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_confidence: Option<f64>,
}

impl EdgeConstraint {
    /// Scoring label: `<from>_<kind>_<to-role(s)>`.
    pub fn label(&self) -> String {
        format!("{}_{}_{}", self.from, self.kind, self.to.names().join("_"))
    }
}

/// Declares `role` a group role and bounds its cardinality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupConstraint {
    pub role: String,
    pub min_size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size: Option<usize>,
}

impl GroupConstraint {
    pub fn label(&self) -> String {
        format!("group_{}", self.role)
    }

    /// Alternate label some scoring tables use.
    pub fn alt_label(&self) -> String {
        format!("multiple_{}s", self.role)
    }
}

/// The constraint kinds an optional wrapper can carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BaseConstraint {
    Edge(EdgeConstraint),
    Group(GroupConstraint),
}

/// A constraint that can fail without disqualifying the binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionalConstraint {
    pub constraint: Box<BaseConstraint>,
    /// Role name that receives the matched node on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind_as: Option<String>,
}

/// One entry in a pattern's ordered constraint list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Constraint {
    Edge(EdgeConstraint),
    Group(GroupConstraint),
    Optional(OptionalConstraint),
}

impl Constraint {
    pub fn is_optional(&self) -> bool {
        matches!(self, Constraint::Optional(_))
    }

    /// Role names this constraint reads.
    pub fn referenced_roles(&self) -> Vec<&str> {
        fn edge_roles(edge: &EdgeConstraint) -> Vec<&str> {
            let mut roles = vec![edge.from.as_str()];
            roles.extend(edge.to.names().iter().map(String::as_str));
            roles
        }
        match self {
            Constraint::Edge(edge) => edge_roles(edge),
            Constraint::Group(group) => vec![group.role.as_str()],
            Constraint::Optional(opt) => match opt.constraint.as_ref() {
                BaseConstraint::Edge(edge) => edge_roles(edge),
                BaseConstraint::Group(group) => vec![group.role.as_str()],
            },
        }
    }

    /// View any constraint as its base form, unwrapping optionals.
    pub fn as_base(&self) -> BaseConstraint {
        match self {
            Constraint::Edge(edge) => BaseConstraint::Edge(edge.clone()),
            Constraint::Group(group) => BaseConstraint::Group(group.clone()),
            Constraint::Optional(opt) => (*opt.constraint).clone(),
        }
    }
}

/// Base score plus per-constraint-label weights, all in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scoring {
    pub base: f64,
    #[serde(default)]
    pub weights: BTreeMap<String, f64>,
}

impl Scoring {
    /// Look a label up, trying the alternate before the fallback.
    pub fn weight_for(&self, label: &str, alt: Option<&str>) -> f64 {
        if let Some(weight) = self.weights.get(label) {
            return *weight;
        }
        if let Some(alt) = alt {
            if let Some(weight) = self.weights.get(alt) {
                return *weight;
            }
        }
        FALLBACK_WEIGHT
    }
}
