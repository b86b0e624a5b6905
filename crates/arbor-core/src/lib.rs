//! Arbor Core — semantic code graph model, bundle validation, and the
//! indexed in-memory store

pub mod bundle;
pub mod error;
pub mod model;
pub mod query;
pub mod store;


pub use bundle::{Bundle, RepoInfo, MIN_COMMIT_LEN, MIN_ID_LEN};
pub use error::{Result, StoreError, ValidationIssue};
pub use model::{
    Annotation, Edge, EdgeKind, Evidence, Node, NodeKind, PatternInstance, RoleBinding, Span,
    Visibility,
};
pub use query::{Direction, EdgeQuery, KindFilter, NodeQuery, TextMatcher};
pub use store::{GraphStore, LoadError, LoadReport, StoreStats, Subgraph};
