//! Dependency-graph builder.
//!
//! `types` holds `Rule` (collected by the evaluator) and `DepNode` (built by
//! the resolver); `builder` implements the four resolution phases: indexing,
//! traversal, per-target variables, and ordering.

pub mod builder;
pub mod types;

pub use builder::{build, Filesystem, RealFilesystem};
pub use types::{DepGraph, DepNode, NodeId, Rule};
