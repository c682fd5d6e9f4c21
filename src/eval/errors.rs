//! Evaluator error kinds (spec.md §7 "Error Handling Design").
//!
//! One hand-rolled struct per error kind named in §7 — `EvalError`,
//! `ResolutionError`, `SystemError` — each carrying a `Loc` where available,
//! joined by a `thiserror`-derived `MakeError` umbrella so call sites can use
//! `?` uniformly. `ParseError`, the fourth kind, already lives in
//! `parser::types` and converts into this umbrella too.

use std::fmt;

use thiserror::Error;

use crate::ast::types::Loc;
use crate::parser::types::ParseException;

/// Unknown function argument count, `$(error ...)`, a failed `include`.
#[derive(Debug, Clone)]
pub struct EvalError {
    pub message: String,
    pub loc: Loc,
}

impl EvalError {
    pub fn new(message: impl Into<String>, loc: Loc) -> Self {
        Self { message: message.into(), loc }
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.loc, self.message)
    }
}

impl std::error::Error for EvalError {}

/// No rule to make target, cyclic dependency, conflicting static patterns.
#[derive(Debug, Clone)]
pub struct ResolutionError {
    pub message: String,
    pub loc: Option<Loc>,
}

impl ResolutionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), loc: None }
    }

    pub fn with_loc(message: impl Into<String>, loc: Loc) -> Self {
        Self { message: message.into(), loc: Some(loc) }
    }

    /// "A cyclic dependency detected... is fatal... naming both endpoints"
    /// (spec.md §4.5 "Failure semantics").
    pub fn cycle(target: &str, ancestor: &str) -> Self {
        Self::new(format!("circular dependency dropped: `{target}' <- `{ancestor}'"))
    }
}

impl fmt::Display for ResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.loc {
            Some(loc) => write!(f, "{}: {}", loc, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ResolutionError {}

/// I/O failure or subprocess (`$(shell)`) failure.
#[derive(Debug)]
pub struct SystemError {
    pub message: String,
    pub loc: Option<Loc>,
    pub source: Option<std::io::Error>,
}

impl SystemError {
    pub fn new(message: impl Into<String>, source: std::io::Error) -> Self {
        Self { message: message.into(), loc: None, source: Some(source) }
    }

    pub fn without_source(message: impl Into<String>) -> Self {
        Self { message: message.into(), loc: None, source: None }
    }
}

impl fmt::Display for SystemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(e) => write!(f, "{}: {}", self.message, e),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for SystemError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Umbrella error type unifying the four kinds of spec.md §7. Callers
/// surface it at the top level as a located message (`file:line: text`) plus
/// a non-zero exit per spec.md §6 "Failure exit".
#[derive(Debug, Error)]
pub enum MakeError {
    #[error("{0}")]
    Parse(#[from] ParseException),
    #[error(transparent)]
    Eval(#[from] EvalError),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error(transparent)]
    System(#[from] SystemError),
}

impl MakeError {
    pub fn loc(&self) -> Option<&Loc> {
        match self {
            MakeError::Parse(e) => Some(&e.loc),
            MakeError::Eval(e) => Some(&e.loc),
            MakeError::Resolution(e) => e.loc.as_ref(),
            MakeError::System(e) => e.loc.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eval_error_displays_location() {
        let e = EvalError::new("unterminated call to function", Loc::new("Makefile", 3));
        assert_eq!(e.to_string(), "Makefile:3: unterminated call to function");
    }

    #[test]
    fn resolution_error_cycle_names_both_endpoints() {
        let e = ResolutionError::cycle("a.o", "a.o");
        assert!(e.to_string().contains("a.o"));
    }

    #[test]
    fn make_error_converts_from_eval_error() {
        let e: MakeError = EvalError::new("boom", Loc::new("Makefile", 1)).into();
        assert!(matches!(e, MakeError::Eval(_)));
    }
}
