//! Unit tests for the pattern matcher

use std::collections::{BTreeMap, HashSet};

use arbor_core::{
    Edge, EdgeKind, Evidence, GraphStore, Node, NodeKind, RoleBinding, Span, TextMatcher,
    Visibility,
};

use crate::builtin::register_builtins;
use crate::definition::{
    BaseConstraint, Constraint, EdgeConstraint, OptionalConstraint, PatternDef, RoleRef, RoleSpec,
    Scoring,
};
use crate::matcher::MatcherEngine;

fn node(id: &str, kind: NodeKind, name: &str) -> Node {
    Node {
        id: id.to_string(),
        kind,
        name: name.to_string(),
        language: "ts".to_string(),
        file: "src/app.ts".to_string(),
        span: Span(0, 50),
        parent: None,
        route: None,
        visibility: Some(Visibility::Public),
        signature: None,
        doc_hash: None,
    }
}

fn owned_node(id: &str, kind: NodeKind, name: &str, parent: &str) -> Node {
    Node {
        parent: Some(parent.to_string()),
        ..node(id, kind, name)
    }
}

fn edge(id: &str, kind: EdgeKind, src: &str, dst: &str) -> Edge {
    Edge {
        id: id.to_string(),
        kind,
        src: src.to_string(),
        dst: dst.to_string(),
        confidence: 1.0,
        evidence: vec![Evidence::StaticAnalysis],
        meta: None,
    }
}

/// The S3 graph: class S using interfaces O1 and O2.
fn observer_store() -> GraphStore {
    let mut store = GraphStore::new();
    store.add_node(node("node000s", NodeKind::Class, "Subject")).unwrap();
    store.add_node(node("node00o1", NodeKind::Interface, "Listener")).unwrap();
    store.add_node(node("node00o2", NodeKind::Interface, "Logger")).unwrap();
    store
        .add_edge(edge("edge0so1", EdgeKind::Uses, "node000s", "node00o1"))
        .unwrap();
    store
        .add_edge(edge("edge0so2", EdgeKind::Uses, "node000s", "node00o2"))
        .unwrap();
    store
}

fn builtin_engine() -> MatcherEngine {
    let mut engine = MatcherEngine::new();
    register_builtins(&mut engine).unwrap();
    engine
}

fn scope(ids: &[&str]) -> HashSet<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

// ── S3: observer ────────────────────────────────────────────

#[test]
fn observer_binds_group_of_interfaces() {
    let store = observer_store();
    let engine = builtin_engine();

    let matches = engine.match_pattern(&store, "observer", None).unwrap();
    assert_eq!(matches.len(), 1);

    let instance = &matches[0];
    assert_eq!(instance.pattern_id, "observer");
    assert_eq!(
        instance.roles.get("subject"),
        Some(&RoleBinding::One("node000s".to_string()))
    );
    match instance.roles.get("observer") {
        Some(RoleBinding::Many(members)) => {
            let set: HashSet<_> = members.iter().map(String::as_str).collect();
            assert_eq!(set, HashSet::from(["node00o1", "node00o2"]));
        }
        other => panic!("expected group binding, got {other:?}"),
    }
    // base 0.40 + group weight 0.25 at minimum.
    assert!(instance.confidence >= 0.65);
    assert!(instance.confidence <= 1.0);
    assert!(instance.evidence[0].starts_with("base"));
    assert!(instance.explanation.as_deref().unwrap().contains("observer=2 nodes"));
}

#[test]
fn unknown_pattern_id_is_fatal() {
    let store = observer_store();
    let engine = builtin_engine();
    let err = engine.match_pattern(&store, "flyweight", None).unwrap_err();
    assert_eq!(err.kind(), "pattern_not_found");
}

#[test]
fn role_with_zero_candidates_yields_no_matches() {
    let mut store = GraphStore::new();
    store.add_node(node("node000s", NodeKind::Class, "Subject")).unwrap();
    let engine = builtin_engine();
    // No interface nodes at all.
    let matches = engine.match_pattern(&store, "observer", None).unwrap();
    assert!(matches.is_empty());
}

#[test]
fn scope_restricts_every_binding() {
    let store = observer_store();
    let engine = builtin_engine();
    let scope = scope(&["node000s", "node00o1"]);

    let matches = engine
        .match_pattern(&store, "observer", Some(&scope))
        .unwrap();
    assert_eq!(matches.len(), 1);
    for binding in matches[0].roles.values() {
        for id in binding.node_ids() {
            assert!(scope.contains(id), "{id} escaped the scope");
        }
    }
}

#[test]
fn out_of_scope_subject_kills_the_match() {
    let store = observer_store();
    let engine = builtin_engine();
    let scope = scope(&["node00o1", "node00o2"]);
    let matches = engine
        .match_pattern(&store, "observer", Some(&scope))
        .unwrap();
    assert!(matches.is_empty());
}

// ── Constraint semantics ────────────────────────────────────

#[test]
fn required_edge_constraint_disqualifies() {
    let mut store = GraphStore::new();
    store.add_node(node("node000s", NodeKind::Class, "Subject")).unwrap();
    store.add_node(node("node00o1", NodeKind::Interface, "Listener")).unwrap();
    // No uses edge.
    let engine = builtin_engine();
    let matches = engine.match_pattern(&store, "observer", None).unwrap();
    assert!(matches.is_empty());
}

#[test]
fn min_confidence_is_inclusive() {
    let def = PatternDef {
        id: "confident_call".to_string(),
        description: None,
        roles: BTreeMap::from([
            ("caller".to_string(), RoleSpec::of_kind(NodeKind::Function)),
            ("callee".to_string(), RoleSpec::of_kind(NodeKind::Function)),
        ]),
        constraints: vec![Constraint::Edge(EdgeConstraint {
            kind: EdgeKind::Calls,
            from: "caller".to_string(),
            to: RoleRef::One("callee".to_string()),
            min_confidence: Some(0.8),
        })],
        scoring: Scoring {
            base: 0.5,
            weights: BTreeMap::new(),
        },
    };

    let mut store = GraphStore::new();
    store.add_node(node("node0001", NodeKind::Function, "f")).unwrap();
    store.add_node(node("node0002", NodeKind::Function, "g")).unwrap();
    let mut call = edge("edge0001", EdgeKind::Calls, "node0001", "node0002");
    call.confidence = 0.8;
    store.add_edge(call).unwrap();

    let mut engine = MatcherEngine::new();
    engine.register(def).unwrap();
    assert_eq!(engine.match_pattern(&store, "confident_call", None).unwrap().len(), 1);

    // Below threshold: drop the edge down and rebuild.
    let mut store = GraphStore::new();
    store.add_node(node("node0001", NodeKind::Function, "f")).unwrap();
    store.add_node(node("node0002", NodeKind::Function, "g")).unwrap();
    let mut call = edge("edge0001", EdgeKind::Calls, "node0001", "node0002");
    call.confidence = 0.79;
    store.add_edge(call).unwrap();
    assert!(engine.match_pattern(&store, "confident_call", None).unwrap().is_empty());
}

#[test]
fn optional_constraint_never_disqualifies() {
    let def = PatternDef {
        id: "loose_pair".to_string(),
        description: None,
        roles: BTreeMap::from([
            ("a".to_string(), RoleSpec::of_kind(NodeKind::Class)),
            ("b".to_string(), RoleSpec::of_kind(NodeKind::Interface)),
        ]),
        constraints: vec![
            Constraint::Edge(EdgeConstraint {
                kind: EdgeKind::Uses,
                from: "a".to_string(),
                to: RoleRef::One("b".to_string()),
                min_confidence: None,
            }),
            Constraint::Optional(OptionalConstraint {
                constraint: Box::new(BaseConstraint::Edge(EdgeConstraint {
                    kind: EdgeKind::Implements,
                    from: "a".to_string(),
                    to: RoleRef::One("b".to_string()),
                    min_confidence: None,
                })),
                bind_as: None,
            }),
        ],
        scoring: Scoring {
            base: 0.5,
            weights: BTreeMap::from([
                ("a_uses_b".to_string(), 0.2),
                ("a_implements_b".to_string(), 0.2),
            ]),
        },
    };

    let mut store = GraphStore::new();
    store.add_node(node("node000a", NodeKind::Class, "A")).unwrap();
    store.add_node(node("node000b", NodeKind::Interface, "B")).unwrap();
    store
        .add_edge(edge("edge0001", EdgeKind::Uses, "node000a", "node000b"))
        .unwrap();

    let mut engine = MatcherEngine::new();
    engine.register(def).unwrap();
    let matches = engine.match_pattern(&store, "loose_pair", None).unwrap();
    assert_eq!(matches.len(), 1);
    // Only base + the satisfied required edge.
    assert!((matches[0].confidence - 0.7).abs() < 1e-9);
}

#[test]
fn optional_bind_as_records_matched_node() {
    let def = PatternDef {
        id: "pair_with_helper".to_string(),
        description: None,
        roles: BTreeMap::from([
            ("a".to_string(), RoleSpec::of_kind(NodeKind::Class)),
            ("b".to_string(), RoleSpec::of_kind(NodeKind::Class)),
        ]),
        constraints: vec![
            Constraint::Edge(EdgeConstraint {
                kind: EdgeKind::Uses,
                from: "a".to_string(),
                to: RoleRef::One("b".to_string()),
                min_confidence: None,
            }),
            Constraint::Optional(OptionalConstraint {
                constraint: Box::new(BaseConstraint::Edge(EdgeConstraint {
                    kind: EdgeKind::Calls,
                    from: "a".to_string(),
                    to: RoleRef::One("b".to_string()),
                    min_confidence: None,
                })),
                bind_as: Some("called".to_string()),
            }),
        ],
        scoring: Scoring {
            base: 0.4,
            weights: BTreeMap::new(),
        },
    };

    let mut store = GraphStore::new();
    store.add_node(node("node000a", NodeKind::Class, "A")).unwrap();
    store.add_node(node("node000b", NodeKind::Class, "B")).unwrap();
    store
        .add_edge(edge("edge0001", EdgeKind::Uses, "node000a", "node000b"))
        .unwrap();
    store
        .add_edge(edge("edge0002", EdgeKind::Calls, "node000a", "node000b"))
        .unwrap();

    let mut engine = MatcherEngine::new();
    engine.register(def).unwrap();
    let matches = engine.match_pattern(&store, "pair_with_helper", None).unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(
        matches[0].roles.get("called"),
        Some(&RoleBinding::One("node000b".to_string()))
    );
}

#[test]
fn confidence_clamps_to_one() {
    let def = PatternDef {
        id: "overweighted".to_string(),
        description: None,
        roles: BTreeMap::from([
            ("a".to_string(), RoleSpec::of_kind(NodeKind::Class)),
            ("b".to_string(), RoleSpec::of_kind(NodeKind::Class)),
        ]),
        constraints: vec![Constraint::Edge(EdgeConstraint {
            kind: EdgeKind::Uses,
            from: "a".to_string(),
            to: RoleRef::One("b".to_string()),
            min_confidence: None,
        })],
        scoring: Scoring {
            base: 0.9,
            weights: BTreeMap::from([("a_uses_b".to_string(), 0.9)]),
        },
    };

    let mut store = GraphStore::new();
    store.add_node(node("node000a", NodeKind::Class, "A")).unwrap();
    store.add_node(node("node000b", NodeKind::Class, "B")).unwrap();
    store
        .add_edge(edge("edge0001", EdgeKind::Uses, "node000a", "node000b"))
        .unwrap();

    let mut engine = MatcherEngine::new();
    engine.register(def).unwrap();
    let matches = engine.match_pattern(&store, "overweighted", None).unwrap();
    assert_eq!(matches[0].confidence, 1.0);
}

// ── owned_by ────────────────────────────────────────────────

#[test]
fn owned_by_respects_parent_links() {
    let mut store = GraphStore::new();
    store.add_node(node("node00fa", NodeKind::Class, "WidgetFactory")).unwrap();
    store.add_node(node("node00gx", NodeKind::Class, "Unrelated")).unwrap();
    store
        .add_node(owned_node("node00cr", NodeKind::Method, "create_widget", "node00fa"))
        .unwrap();
    // A decoy creator owned by the wrong class.
    store
        .add_node(owned_node("node00cx", NodeKind::Method, "create_evil", "node00gx"))
        .unwrap();
    store.add_node(node("node00pr", NodeKind::Class, "Widget")).unwrap();
    store
        .add_edge(edge("edge0001", EdgeKind::Uses, "node00cr", "node00pr"))
        .unwrap();
    store
        .add_edge(edge("edge0002", EdgeKind::Uses, "node00cx", "node00pr"))
        .unwrap();

    let engine = builtin_engine();
    let matches = engine.match_pattern(&store, "factory_method", None).unwrap();
    // One match per factory; create_evil only under its own class.
    assert_eq!(matches.len(), 2);
    for instance in &matches {
        let factory = &instance.roles["factory"];
        let creator = &instance.roles["creator"];
        match (factory, creator) {
            (RoleBinding::One(f), RoleBinding::One(c)) => {
                let parent = store.get_node(c).unwrap().parent.clone().unwrap();
                assert_eq!(&parent, f, "creator bound outside its owner");
            }
            other => panic!("unexpected bindings {other:?}"),
        }
    }
}

#[test]
fn owned_by_accepts_defines_edge() {
    let mut store = GraphStore::new();
    store.add_node(node("node00fa", NodeKind::Class, "ShapeFactory")).unwrap();
    // No parent link; ownership only through a defines edge.
    store
        .add_node(node("node00cr", NodeKind::Method, "create_shape"))
        .unwrap();
    store.add_node(node("node00pr", NodeKind::Class, "Shape")).unwrap();
    store
        .add_edge(edge("edge0001", EdgeKind::Defines, "node00fa", "node00cr"))
        .unwrap();
    store
        .add_edge(edge("edge0002", EdgeKind::Uses, "node00cr", "node00pr"))
        .unwrap();

    let engine = builtin_engine();
    let matches = engine.match_pattern(&store, "factory_method", None).unwrap();
    assert_eq!(matches.len(), 1);
}

#[test]
fn owned_role_with_no_owner_match_yields_nothing() {
    let mut store = GraphStore::new();
    store.add_node(node("node00fa", NodeKind::Class, "Factory")).unwrap();
    // Method floats free of any owner.
    store.add_node(node("node00cr", NodeKind::Method, "create_thing")).unwrap();
    store.add_node(node("node00pr", NodeKind::Class, "Thing")).unwrap();
    store
        .add_edge(edge("edge0001", EdgeKind::Uses, "node00cr", "node00pr"))
        .unwrap();

    let engine = builtin_engine();
    assert!(engine.match_pattern(&store, "factory_method", None).unwrap().is_empty());
}

// ── Deduplication and ids ───────────────────────────────────

#[test]
fn symmetric_bindings_deduplicate() {
    let def = PatternDef {
        id: "mutual".to_string(),
        description: None,
        roles: BTreeMap::from([
            ("a".to_string(), RoleSpec::of_kind(NodeKind::Class)),
            ("b".to_string(), RoleSpec::of_kind(NodeKind::Class)),
        ]),
        constraints: vec![Constraint::Edge(EdgeConstraint {
            kind: EdgeKind::Uses,
            from: "a".to_string(),
            to: RoleRef::One("b".to_string()),
            min_confidence: None,
        })],
        scoring: Scoring {
            base: 0.5,
            weights: BTreeMap::new(),
        },
    };

    let mut store = GraphStore::new();
    store.add_node(node("node000x", NodeKind::Class, "X")).unwrap();
    store.add_node(node("node000y", NodeKind::Class, "Y")).unwrap();
    store
        .add_edge(edge("edge0001", EdgeKind::Uses, "node000x", "node000y"))
        .unwrap();
    store
        .add_edge(edge("edge0002", EdgeKind::Uses, "node000y", "node000x"))
        .unwrap();

    let mut engine = MatcherEngine::new();
    engine.register(def).unwrap();
    // (a=X, b=Y) and (a=Y, b=X) share the same node multiset.
    let matches = engine.match_pattern(&store, "mutual", None).unwrap();
    assert_eq!(matches.len(), 1);
}

#[test]
fn instance_ids_are_unique_per_process() {
    let store = observer_store();
    let engine = builtin_engine();
    let a = engine.match_pattern(&store, "observer", None).unwrap();
    let b = engine.match_pattern(&store, "observer", None).unwrap();
    assert_ne!(a[0].id, b[0].id);
    // Same inputs, same bindings: compare on roles, never ids.
    assert_eq!(a[0].roles, b[0].roles);
}

#[test]
fn match_all_covers_registered_patterns() {
    let store = observer_store();
    let engine = builtin_engine();
    let matches = engine.match_all(&store, None);
    assert!(matches.iter().any(|m| m.pattern_id == "observer"));
    assert!(matches.iter().all(|m| (0.0..=1.0).contains(&m.confidence)));
}

// ── Definition validation ───────────────────────────────────

#[test]
fn register_rejects_unknown_constraint_role() {
    let def = PatternDef {
        id: "broken".to_string(),
        description: None,
        roles: BTreeMap::from([("a".to_string(), RoleSpec::of_kind(NodeKind::Class))]),
        constraints: vec![Constraint::Edge(EdgeConstraint {
            kind: EdgeKind::Uses,
            from: "a".to_string(),
            to: RoleRef::One("ghost".to_string()),
            min_confidence: None,
        })],
        scoring: Scoring {
            base: 0.5,
            weights: BTreeMap::new(),
        },
    };
    let mut engine = MatcherEngine::new();
    assert_eq!(engine.register(def).unwrap_err().kind(), "invalid_pattern");
}

#[test]
fn register_rejects_owned_by_cycles() {
    let def = PatternDef {
        id: "cyclic".to_string(),
        description: None,
        roles: BTreeMap::from([
            (
                "a".to_string(),
                RoleSpec {
                    kind: NodeKind::Class,
                    owned_by: Some("b".to_string()),
                    name: None,
                    filter: None,
                },
            ),
            (
                "b".to_string(),
                RoleSpec {
                    kind: NodeKind::Class,
                    owned_by: Some("a".to_string()),
                    name: None,
                    filter: None,
                },
            ),
        ]),
        constraints: vec![],
        scoring: Scoring {
            base: 0.5,
            weights: BTreeMap::new(),
        },
    };
    let mut engine = MatcherEngine::new();
    assert!(engine.register(def).is_err());
}

#[test]
fn definitions_round_trip_through_json() {
    let raw = r#"{
        "id": "observer_lite",
        "roles": {
            "subject": {"kind": "class"},
            "observer": {"kind": "interface", "name": {"regex": "Listener$"}}
        },
        "constraints": [
            {"type": "edge", "kind": "uses", "from": "subject", "to": "observer"},
            {"type": "group", "role": "observer", "min_size": 1}
        ],
        "scoring": {"base": 0.4, "weights": {"group_observer": 0.3}}
    }"#;
    let def: PatternDef = serde_json::from_str(raw).unwrap();

    let store = observer_store();
    let mut engine = MatcherEngine::new();
    engine.register(def).unwrap();
    let matches = engine.match_pattern(&store, "observer_lite", None).unwrap();
    // Only the interface named `Listener` passes the regex post-filter.
    assert_eq!(matches.len(), 1);
    assert_eq!(
        matches[0].roles.get("observer"),
        Some(&RoleBinding::Many(vec!["node00o1".to_string()]))
    );
}
