//! Integration tests for Arbor
//!
//! These tests drive a bundle through the store, the matcher, and the
//! projector together, the way the CLI and server wire them up.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::json;

use arbor_core::{Bundle, Direction, GraphStore, NodeKind, RoleBinding};
use arbor_patterns::{register_builtins, MatcherEngine};
use arbor_server::ServerState;
use arbor_view::{project, project_with_patterns, ViewClass, ViewConfig};

/// A small service codebase: a module owning a subject class whose
/// methods talk to two observer interfaces, plus a vendored helper.
fn sample_bundle() -> Bundle {
    let bundle = json!({
        "version": "v1.0",
        "generated_at": "2026-05-04T12:00:00Z",
        "repo": {
            "url": "https://example.com/shop.git",
            "commit": "7dd3abc91f0",
            "branch": "main"
        },
        "nodes": [
            {"id": "mod_shop_core", "kind": "module", "name": "shop", "language": "ts",
             "file": "src/shop.ts", "span": [0, 2000]},
            {"id": "cls_subject1", "kind": "class", "name": "OrderFeed", "language": "ts",
             "file": "src/shop.ts", "span": [10, 900], "parent": "mod_shop_core",
             "route": "shop.OrderFeed", "visibility": "public"},
            {"id": "mth_notify01", "kind": "method", "name": "notify", "language": "ts",
             "file": "src/shop.ts", "span": [120, 400], "parent": "cls_subject1"},
            {"id": "mth_refresh1", "kind": "method", "name": "refresh", "language": "ts",
             "file": "src/shop.ts", "span": [410, 700], "parent": "cls_subject1"},
            {"id": "ifc_listen01", "kind": "interface", "name": "OrderListener", "language": "ts",
             "file": "src/listeners.ts", "span": [0, 200]},
            {"id": "ifc_audit001", "kind": "interface", "name": "AuditSink", "language": "ts",
             "file": "src/listeners.ts", "span": [210, 380]},
            {"id": "fun_vendor01", "kind": "function", "name": "leftPad", "language": "ts",
             "file": "node_modules/pad/index.ts", "span": [0, 60]}
        ],
        "edges": [
            {"id": "edge_uses_l1", "kind": "uses", "src": "cls_subject1", "dst": "ifc_listen01",
             "confidence": 1.0, "evidence": ["static_analysis"]},
            {"id": "edge_uses_a1", "kind": "uses", "src": "cls_subject1", "dst": "ifc_audit001",
             "confidence": 0.9, "evidence": ["lsp", "heuristic"]},
            {"id": "edge_call_v1", "kind": "calls", "src": "mth_notify01", "dst": "fun_vendor01",
             "confidence": 0.7, "evidence": ["chunker"], "meta": {"call_site_line": 14}},
            {"id": "edge_call_r1", "kind": "calls", "src": "mth_notify01", "dst": "mth_refresh1",
             "confidence": 1.0, "evidence": ["static_analysis"]},
            {"id": "edge_def_cls", "kind": "defines", "src": "mod_shop_core", "dst": "cls_subject1",
             "confidence": 1.0, "evidence": ["chunker"]}
        ],
        "annotations": [
            {"node_id": "cls_subject1", "tags": ["entrypoint", "hot"],
             "values": {"churn": 17}}
        ],
        "patterns": []
    });
    serde_json::from_value(bundle).expect("fixture bundle parses")
}

fn loaded_store() -> GraphStore {
    let mut store = GraphStore::new();
    let report = store.load_bundle(sample_bundle(), true).unwrap();
    assert!(report.errors.is_empty(), "{:?}", report.errors);
    store
}

#[test]
fn bundle_flows_into_queries() {
    let store = loaded_store();
    let stats = store.stats();
    assert_eq!(stats.node_count, 7);
    assert_eq!(stats.edge_count, 5);
    assert_eq!(stats.annotation_count, 1);

    let subject = store.get_node("cls_subject1").unwrap();
    assert_eq!(subject.kind, NodeKind::Class);
    assert_eq!(subject.parent.as_deref(), Some("mod_shop_core"));

    let annotations = store.annotations_of("cls_subject1");
    assert_eq!(annotations.len(), 1);
    assert!(annotations[0].tags.contains(&"hot".to_string()));

    let out = store.edges_of("cls_subject1", Direction::Out);
    assert_eq!(out.len(), 2);
}

#[test]
fn matcher_runs_over_the_loaded_graph() {
    let store = loaded_store();
    let mut engine = MatcherEngine::new();
    register_builtins(&mut engine).unwrap();

    let matches = engine.match_pattern(&store, "observer", None).unwrap();
    assert_eq!(matches.len(), 1);
    let observer = &matches[0];
    assert_eq!(
        observer.roles.get("subject"),
        Some(&RoleBinding::One("cls_subject1".to_string()))
    );
    match observer.roles.get("observer") {
        Some(RoleBinding::Many(members)) => assert_eq!(members.len(), 2),
        other => panic!("expected a group binding, got {other:?}"),
    }
    assert!((0.0..=1.0).contains(&observer.confidence));

    // Store the result back and look it up by mentioned node.
    let mut store = store;
    store.add_pattern(observer.clone()).unwrap();
    assert_eq!(store.patterns_of("ifc_audit001").len(), 1);
}

#[test]
fn projection_composes_filters_and_collapse() {
    let store = loaded_store();
    let config = ViewConfig {
        view: ViewClass::CallGraph,
        collapse_kinds: vec![NodeKind::Class],
        exclude_paths: vec!["node_modules/**".to_string()],
        ..Default::default()
    };
    let result = project(&store, &config).unwrap();

    let ids: HashSet<&str> = result.nodes.iter().map(|n| n.id.as_str()).collect();
    // Vendored function excluded, methods collapsed into the class.
    assert!(!ids.contains("fun_vendor01"));
    assert!(!ids.contains("mth_notify01"));
    assert!(ids.contains("cls_subject1"));

    // notify -> refresh became a self-loop on the class and is gone;
    // the remaining edges are the two uses edges off the subject.
    assert!(result.edges.iter().all(|e| e.src != e.dst));
    let kinds = config.effective_edge_kinds();
    assert!(result.edges.iter().all(|e| kinds.contains(&e.kind)));
}

#[test]
fn rooted_view_with_pattern_detection() {
    let store = loaded_store();
    let mut engine = MatcherEngine::new();
    register_builtins(&mut engine).unwrap();

    let config = ViewConfig {
        root_id: Some("cls_subject1".to_string()),
        depth: 1,
        ..Default::default()
    };
    let result = project_with_patterns(&store, &engine, &config).unwrap();
    assert_eq!(result.root_id.as_deref(), Some("cls_subject1"));

    let scope: HashSet<&str> = result.nodes.iter().map(|n| n.id.as_str()).collect();
    for instance in result.patterns.as_deref().unwrap() {
        for binding in instance.roles.values() {
            for id in binding.node_ids() {
                assert!(scope.contains(id.as_str()), "{id} escaped the view scope");
            }
        }
    }
}

#[test]
fn bundle_survives_a_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bundle.json");
    std::fs::write(&path, serde_json::to_string_pretty(&sample_bundle()).unwrap()).unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    let bundle: Bundle = serde_json::from_str(&raw).unwrap();
    assert!(bundle.validate().is_empty());

    let mut store = GraphStore::new();
    let report = store.load_bundle(bundle, true).unwrap();
    assert_eq!(report.nodes_loaded, 7);
    assert_eq!(report.edges_loaded, 5);
}

#[test]
fn server_state_serializes_access() {
    let mut engine = MatcherEngine::new();
    register_builtins(&mut engine).unwrap();
    let state = Arc::new(ServerState::new(GraphStore::new(), engine));

    tokio_test::block_on(async {
        {
            let mut store = state.store.write().await;
            store.load_bundle(sample_bundle(), true).unwrap();
        }
        let store = state.store.read().await;
        assert_eq!(store.stats().node_count, 7);
        let matches = state.matcher.match_all(&store, None);
        assert!(matches.iter().any(|m| m.pattern_id == "observer"));
    });
}
