//! View configuration and per-class edge-kind defaults

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use arbor_core::{EdgeKind, NodeKind};

/// The semantic families a view can project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ViewClass {
    CallGraph,
    Inheritance,
    ModuleDeps,
    #[default]
    Full,
}

impl ViewClass {
    /// The edge kinds a view class selects when the configuration does
    /// not name an explicit set.
    pub fn default_edge_kinds(&self) -> BTreeSet<EdgeKind> {
        match self {
            ViewClass::CallGraph => [EdgeKind::Calls, EdgeKind::Uses].into(),
            ViewClass::Inheritance => [EdgeKind::Inherits, EdgeKind::Implements].into(),
            ViewClass::ModuleDeps => [EdgeKind::Imports, EdgeKind::Defines].into(),
            ViewClass::Full => EdgeKind::ALL.into(),
        }
    }
}

fn default_depth() -> usize {
    3
}

/// Everything the projector needs to assemble one view.
///
/// Serde defaults mirror the documented defaults, so deserializing `{}`
/// and re-applying defaults are both the identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub view: ViewClass,
    pub root_id: Option<String>,
    /// Hop budget for the rooted subgraph request.
    pub depth: usize,
    pub min_confidence: f64,
    /// Explicit edge-kind set; `None` falls back to the view class.
    pub edge_kinds: Option<BTreeSet<EdgeKind>>,
    /// Children of nodes with these kinds collapse into their parent.
    pub collapse_kinds: Vec<NodeKind>,
    /// Exclusion globs matched against node file paths.
    pub exclude_paths: Vec<String>,
}

impl Default for ViewConfig {
    fn default() -> Self {
        ViewConfig {
            view: ViewClass::Full,
            root_id: None,
            depth: default_depth(),
            min_confidence: 0.0,
            edge_kinds: None,
            collapse_kinds: Vec::new(),
            exclude_paths: Vec::new(),
        }
    }
}

impl ViewConfig {
    /// The edge-kind set this view actually filters by.
    pub fn effective_edge_kinds(&self) -> BTreeSet<EdgeKind> {
        self.edge_kinds
            .clone()
            .unwrap_or_else(|| self.view.default_edge_kinds())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_class_edge_kind_sets() {
        assert_eq!(
            ViewClass::CallGraph.default_edge_kinds(),
            [EdgeKind::Calls, EdgeKind::Uses].into()
        );
        assert_eq!(
            ViewClass::ModuleDeps.default_edge_kinds(),
            [EdgeKind::Imports, EdgeKind::Defines].into()
        );
        assert_eq!(ViewClass::Full.default_edge_kinds().len(), 9);
    }

    #[test]
    fn empty_json_is_the_default_config() {
        let config: ViewConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ViewConfig::default());
        assert_eq!(config.depth, 3);
        assert_eq!(config.min_confidence, 0.0);
    }

    #[test]
    fn defaulting_is_idempotent() {
        let config = ViewConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: ViewConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn explicit_edge_kinds_win() {
        let config = ViewConfig {
            view: ViewClass::CallGraph,
            edge_kinds: Some([EdgeKind::Throws].into()),
            ..Default::default()
        };
        assert_eq!(config.effective_edge_kinds(), [EdgeKind::Throws].into());
    }
}
