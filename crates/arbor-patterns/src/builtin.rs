//! Built-in pattern catalog

use std::collections::BTreeMap;

use arbor_core::{EdgeKind, NodeKind, TextMatcher};

use crate::definition::{
    BaseConstraint, Constraint, EdgeConstraint, GroupConstraint, OptionalConstraint, PatternDef,
    RoleRef, RoleSpec, Scoring,
};
use crate::error::PatternError;
use crate::matcher::MatcherEngine;

/// Every pattern definition shipped with the engine.
pub fn builtin_patterns() -> Vec<PatternDef> {
    vec![observer(), strategy(), factory_method(), adapter()]
}

/// Register the whole catalog on an engine.
pub fn register_builtins(engine: &mut MatcherEngine) -> Result<(), PatternError> {
    for def in builtin_patterns() {
        engine.register(def)?;
    }
    Ok(())
}

fn scoring(base: f64, weights: &[(&str, f64)]) -> Scoring {
    Scoring {
        base,
        weights: weights
            .iter()
            .map(|(label, weight)| (label.to_string(), *weight))
            .collect(),
    }
}

fn base_edge(kind: EdgeKind, from: &str, to: &str) -> EdgeConstraint {
    EdgeConstraint {
        kind,
        from: from.to_string(),
        to: RoleRef::One(to.to_string()),
        min_confidence: None,
    }
}

fn edge(kind: EdgeKind, from: &str, to: &str) -> Constraint {
    Constraint::Edge(base_edge(kind, from, to))
}

/// A subject that notifies one or more observers.
fn observer() -> PatternDef {
    let mut roles = BTreeMap::new();
    roles.insert("subject".to_string(), RoleSpec::of_kind(NodeKind::Class));
    roles.insert("observer".to_string(), RoleSpec::of_kind(NodeKind::Interface));
    PatternDef {
        id: "observer".to_string(),
        description: Some("subject notifying a set of observer interfaces".to_string()),
        roles,
        constraints: vec![
            edge(EdgeKind::Uses, "subject", "observer"),
            Constraint::Group(GroupConstraint {
                role: "observer".to_string(),
                min_size: 1,
                max_size: None,
            }),
            Constraint::Optional(OptionalConstraint {
                constraint: Box::new(BaseConstraint::Edge(base_edge(
                    EdgeKind::Calls,
                    "subject",
                    "observer",
                ))),
                bind_as: None,
            }),
        ],
        scoring: scoring(
            0.4,
            &[
                ("subject_uses_observer", 0.25),
                ("group_observer", 0.25),
                ("subject_calls_observer", 0.1),
            ],
        ),
    }
}

/// A context delegating to an interchangeable strategy interface.
fn strategy() -> PatternDef {
    let mut roles = BTreeMap::new();
    roles.insert("context".to_string(), RoleSpec::of_kind(NodeKind::Class));
    roles.insert("strategy".to_string(), RoleSpec::of_kind(NodeKind::Interface));
    roles.insert("concrete".to_string(), RoleSpec::of_kind(NodeKind::Class));
    PatternDef {
        id: "strategy".to_string(),
        description: Some("context delegating to interchangeable implementations".to_string()),
        roles,
        constraints: vec![
            edge(EdgeKind::Uses, "context", "strategy"),
            edge(EdgeKind::Implements, "concrete", "strategy"),
            Constraint::Group(GroupConstraint {
                role: "concrete".to_string(),
                min_size: 1,
                max_size: None,
            }),
        ],
        scoring: scoring(
            0.35,
            &[
                ("context_uses_strategy", 0.25),
                ("concrete_implements_strategy", 0.2),
                ("group_concrete", 0.15),
            ],
        ),
    }
}

/// A factory class whose creator method produces a product type.
fn factory_method() -> PatternDef {
    let mut roles = BTreeMap::new();
    roles.insert("factory".to_string(), RoleSpec::of_kind(NodeKind::Class));
    roles.insert(
        "creator".to_string(),
        RoleSpec {
            kind: NodeKind::Method,
            owned_by: Some("factory".to_string()),
            name: Some(TextMatcher::regex("^(create|make|build)").expect("static regex")),
            filter: None,
        },
    );
    roles.insert("product".to_string(), RoleSpec::of_kind(NodeKind::Class));
    PatternDef {
        id: "factory_method".to_string(),
        description: Some("creator method constructing a product type".to_string()),
        roles,
        constraints: vec![edge(EdgeKind::Uses, "creator", "product")],
        scoring: scoring(0.3, &[("creator_uses_product", 0.3)]),
    }
}

/// A class translating one interface into another.
fn adapter() -> PatternDef {
    let mut roles = BTreeMap::new();
    roles.insert("adapter".to_string(), RoleSpec::of_kind(NodeKind::Class));
    roles.insert("target".to_string(), RoleSpec::of_kind(NodeKind::Interface));
    roles.insert("adaptee".to_string(), RoleSpec::of_kind(NodeKind::Class));
    PatternDef {
        id: "adapter".to_string(),
        description: Some("class adapting an existing type to a target interface".to_string()),
        roles,
        constraints: vec![
            edge(EdgeKind::Implements, "adapter", "target"),
            edge(EdgeKind::Uses, "adapter", "adaptee"),
        ],
        scoring: scoring(
            0.3,
            &[
                ("adapter_implements_target", 0.3),
                ("adapter_uses_adaptee", 0.25),
            ],
        ),
    }
}
