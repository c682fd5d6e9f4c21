//! Parser for GNU-make-compatible Makefile syntax
//!
//! Turns raw bytes into a statement list: `lexer` does logical-line
//! splitting (continuations, comments), `expr` parses the right-hand-side
//! expression language, `statement` recognizes rules/assignments/directives
//! and drives `expr` for each sub-expression, and `types` holds the shared
//! parse-error representation and size limits.

pub mod expr;
pub mod lexer;
pub mod statement;
pub mod types;

pub use expr::{check_arity, parse_expr, parse_expr_opt, ParseExprOpt};
pub use lexer::{split_logical_lines, LogicalLine};
pub use statement::{parse_statements, parse_target_specific_assignment};
pub use types::{ParseException, MAX_CONDITIONAL_DEPTH, MAX_INPUT_SIZE, MAX_LOGICAL_LINES};
