//! Arbor Patterns — declarative design-pattern matching over the graph
//! store

pub mod builtin;
pub mod definition;
pub mod error;
pub mod matcher;

#[cfg(test)]
mod tests;

pub use builtin::{builtin_patterns, register_builtins};
pub use definition::{
    BaseConstraint, Constraint, EdgeConstraint, GroupConstraint, OptionalConstraint, PatternDef,
    RoleRef, RoleSpec, Scoring, FALLBACK_WEIGHT,
};
pub use error::PatternError;
pub use matcher::MatcherEngine;
