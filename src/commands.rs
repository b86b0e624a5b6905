//! CLI command implementations

use std::collections::HashSet;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::Context;

use arbor_core::{Bundle, GraphStore, LoadReport, NodeKind};
use arbor_patterns::{register_builtins, MatcherEngine};
use arbor_server::{ArborServer, ServerConfig};
use arbor_view::{project, project_with_patterns, ViewClass, ViewConfig};

/// Read a bundle from a file, or stdin when the path is `-`.
fn read_bundle(path: &Path) -> anyhow::Result<Bundle> {
    let raw = if path == Path::new("-") {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("reading bundle from stdin")?;
        buffer
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("reading bundle from {}", path.display()))?
    };
    serde_json::from_str(&raw).context("parsing bundle JSON")
}

fn load_store(path: &Path, validate: bool) -> anyhow::Result<(GraphStore, LoadReport)> {
    let bundle = read_bundle(path)?;
    let mut store = GraphStore::new();
    let report = store.load_bundle(bundle, validate)?;
    Ok((store, report))
}

fn builtin_engine() -> anyhow::Result<MatcherEngine> {
    let mut engine = MatcherEngine::new();
    register_builtins(&mut engine)?;
    Ok(engine)
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn load(bundle: PathBuf, validate: bool) -> anyhow::Result<()> {
    let (_, report) = load_store(&bundle, validate)?;
    if !report.errors.is_empty() {
        tracing::warn!(skipped = report.errors.len(), "some items were not applied");
    }
    print_json(&report)
}

pub fn stats(bundle: PathBuf) -> anyhow::Result<()> {
    let (store, _) = load_store(&bundle, true)?;
    print_json(&store.stats())
}

fn parse_view_class(name: &str) -> anyhow::Result<ViewClass> {
    serde_json::from_value(serde_json::Value::String(name.to_string()))
        .with_context(|| format!("unknown view class `{name}`"))
}

fn parse_node_kind(name: &str) -> anyhow::Result<NodeKind> {
    serde_json::from_value(serde_json::Value::String(name.to_string()))
        .with_context(|| format!("unknown node kind `{name}`"))
}

#[allow(clippy::too_many_arguments)]
pub fn view(
    bundle: PathBuf,
    view: String,
    root: Option<String>,
    depth: usize,
    min_confidence: f64,
    collapse_kinds: Vec<String>,
    exclude_paths: Vec<String>,
    patterns: bool,
) -> anyhow::Result<()> {
    let (store, _) = load_store(&bundle, true)?;
    let config = ViewConfig {
        view: parse_view_class(&view)?,
        root_id: root,
        depth,
        min_confidence,
        edge_kinds: None,
        collapse_kinds: collapse_kinds
            .iter()
            .map(|k| parse_node_kind(k))
            .collect::<anyhow::Result<_>>()?,
        exclude_paths,
    };

    let result = if patterns {
        let engine = builtin_engine()?;
        project_with_patterns(&store, &engine, &config)?
    } else {
        project(&store, &config)?
    };
    tracing::info!(nodes = result.nodes.len(), edges = result.edges.len(), "view ready");
    print_json(&result)
}

pub fn match_patterns(
    bundle: PathBuf,
    pattern: Option<String>,
    scope: Vec<String>,
) -> anyhow::Result<()> {
    let (store, _) = load_store(&bundle, true)?;
    let engine = builtin_engine()?;
    let scope: Option<HashSet<String>> = if scope.is_empty() {
        None
    } else {
        Some(scope.into_iter().collect())
    };

    let matches = match pattern {
        Some(id) => engine.match_pattern(&store, &id, scope.as_ref())?,
        None => engine.match_all(&store, scope.as_ref()),
    };
    tracing::info!(count = matches.len(), "pattern matching finished");
    print_json(&matches)
}

pub async fn serve(bundle: Option<PathBuf>, host: String, port: u16) -> anyhow::Result<()> {
    let store = match bundle {
        Some(path) => {
            let (store, report) = load_store(&path, true)?;
            tracing::info!(
                nodes = report.nodes_loaded,
                edges = report.edges_loaded,
                "preloaded bundle"
            );
            store
        }
        None => GraphStore::new(),
    };

    let engine = builtin_engine()?;
    let server = ArborServer::new(store, engine, ServerConfig { host, port });
    server.start().await
}
