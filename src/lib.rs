//! just-make - a GNU-make-compatible Makefile parser, evaluator, and
//! dependency-graph builder.
//!
//! This library provides the front end and dep builder for a Ninja-emitting
//! build tool: it reads Makefile syntax, evaluates variables/conditionals/
//! functions, and resolves targets into a dependency DAG. It does not run
//! recipes or emit Ninja files itself (see `main.rs` for a minimal harness).

pub mod ast;
pub mod depgraph;
pub mod eval;
pub mod makefile;
pub mod parser;
pub mod symbol;

pub use depgraph::{DepGraph, DepNode, NodeId, Rule};
pub use eval::{MakeError, Warning};
pub use makefile::{Makefile, MakefileOptions};
pub use symbol::{Symbol, SymbolTable};
