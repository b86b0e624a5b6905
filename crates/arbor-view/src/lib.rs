//! Arbor View — projecting a stored graph into a bounded, semantically
//! filtered subgraph for layout and rendering

pub mod config;
pub mod glob;
pub mod projector;


pub use config::{ViewClass, ViewConfig};
pub use glob::glob_to_regex;
pub use projector::{project, project_with_patterns, ProjectionResult};
