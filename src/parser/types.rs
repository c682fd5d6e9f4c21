//! Parser Types and Constants
//!
//! Shared types, limits, and the parse-error representation used by both
//! the lexer and the statement/expression parsers.

use thiserror::Error;

use crate::ast::types::Loc;

// Parser limits to prevent hangs and resource exhaustion on adversarial input.
pub const MAX_INPUT_SIZE: usize = 16_000_000; // 16MB max Makefile source
pub const MAX_LOGICAL_LINES: usize = 500_000;
pub const MAX_PARSE_ITERATIONS: usize = 1_000_000;
/// Max nesting depth for `ifeq`/`ifdef`/... blocks.
pub const MAX_CONDITIONAL_DEPTH: usize = 200;

#[derive(Debug, Error)]
#[error("{loc}: {message}")]
pub struct ParseException {
    pub message: String,
    pub loc: Loc,
}

impl ParseException {
    pub fn new(message: impl Into<String>, loc: Loc) -> Self {
        Self { message: message.into(), loc }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_exception_displays_location() {
        let e = ParseException::new("missing separator", Loc::new("Makefile", 12));
        assert_eq!(e.to_string(), "Makefile:12: missing separator");
    }
}
