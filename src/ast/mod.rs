//! Abstract Syntax Tree Types for Makefiles
//!
//! This module defines the expression tree and statement list shared by the
//! parser, evaluator, and dependency graph builder.
//!
//! Architecture:
//!   Input → Lexer → Expression/Statement Parser → AST → Evaluator → DepGraph

pub mod types;
