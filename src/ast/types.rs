//! Abstract Syntax Tree Types for Makefiles
//!
//! This module defines the expression tree (`Value`) and statement list
//! (`Statement`) that the parser produces and the evaluator walks. The
//! design follows make's own grammar while staying Rust-idiomatic: one
//! variant type per closed category, tagged enums rather than virtual
//! dispatch.

use std::fmt;

// =============================================================================
// SOURCE LOCATIONS
// =============================================================================

/// A location in a source Makefile, used for located error messages
/// (`file:line: text`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Loc {
    pub file: String,
    pub line: u32,
}

impl Loc {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self { file: file.into(), line }
    }
}

impl fmt::Display for Loc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

// =============================================================================
// EXPRESSION TREE (Value)
// =============================================================================

/// One built-in function, tagged by name. Argument-count rules for fixed-
/// arity functions are enforced at parse time in `parser::expr`; variadic
/// ones (`$(if)`, `$(or)`, `$(and)`, `$(foreach)`) are checked at evaluation
/// time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuncKind {
    Subst,
    Patsubst,
    Strip,
    Findstring,
    Filter,
    FilterOut,
    Sort,
    Word,
    Wordlist,
    Words,
    Firstword,
    Lastword,
    Dir,
    Notdir,
    Suffix,
    Basename,
    Addsuffix,
    Addprefix,
    Join,
    Wildcard,
    Realpath,
    Abspath,
    If,
    Or,
    And,
    Foreach,
    Call,
    Value,
    Flavor,
    Origin,
    Eval,
    Shell,
    Info,
    Warning,
    Error,
}

impl FuncKind {
    /// Map a bare function-name token (the text before the first space or
    /// comma inside `$(...)`) to its kind, or `None` if it names a variable
    /// rather than a built-in.
    pub fn from_name(name: &[u8]) -> Option<FuncKind> {
        Some(match name {
            b"subst" => FuncKind::Subst,
            b"patsubst" => FuncKind::Patsubst,
            b"strip" => FuncKind::Strip,
            b"findstring" => FuncKind::Findstring,
            b"filter" => FuncKind::Filter,
            b"filter-out" => FuncKind::FilterOut,
            b"sort" => FuncKind::Sort,
            b"word" => FuncKind::Word,
            b"wordlist" => FuncKind::Wordlist,
            b"words" => FuncKind::Words,
            b"firstword" => FuncKind::Firstword,
            b"lastword" => FuncKind::Lastword,
            b"dir" => FuncKind::Dir,
            b"notdir" => FuncKind::Notdir,
            b"suffix" => FuncKind::Suffix,
            b"basename" => FuncKind::Basename,
            b"addsuffix" => FuncKind::Addsuffix,
            b"addprefix" => FuncKind::Addprefix,
            b"join" => FuncKind::Join,
            b"wildcard" => FuncKind::Wildcard,
            b"realpath" => FuncKind::Realpath,
            b"abspath" => FuncKind::Abspath,
            b"if" => FuncKind::If,
            b"or" => FuncKind::Or,
            b"and" => FuncKind::And,
            b"foreach" => FuncKind::Foreach,
            b"call" => FuncKind::Call,
            b"value" => FuncKind::Value,
            b"flavor" => FuncKind::Flavor,
            b"origin" => FuncKind::Origin,
            b"eval" => FuncKind::Eval,
            b"shell" => FuncKind::Shell,
            b"info" => FuncKind::Info,
            b"warning" => FuncKind::Warning,
            b"error" => FuncKind::Error,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FuncKind::Subst => "subst",
            FuncKind::Patsubst => "patsubst",
            FuncKind::Strip => "strip",
            FuncKind::Findstring => "findstring",
            FuncKind::Filter => "filter",
            FuncKind::FilterOut => "filter-out",
            FuncKind::Sort => "sort",
            FuncKind::Word => "word",
            FuncKind::Wordlist => "wordlist",
            FuncKind::Words => "words",
            FuncKind::Firstword => "firstword",
            FuncKind::Lastword => "lastword",
            FuncKind::Dir => "dir",
            FuncKind::Notdir => "notdir",
            FuncKind::Suffix => "suffix",
            FuncKind::Basename => "basename",
            FuncKind::Addsuffix => "addsuffix",
            FuncKind::Addprefix => "addprefix",
            FuncKind::Join => "join",
            FuncKind::Wildcard => "wildcard",
            FuncKind::Realpath => "realpath",
            FuncKind::Abspath => "abspath",
            FuncKind::If => "if",
            FuncKind::Or => "or",
            FuncKind::And => "and",
            FuncKind::Foreach => "foreach",
            FuncKind::Call => "call",
            FuncKind::Value => "value",
            FuncKind::Flavor => "flavor",
            FuncKind::Origin => "origin",
            FuncKind::Eval => "eval",
            FuncKind::Shell => "shell",
            FuncKind::Info => "info",
            FuncKind::Warning => "warning",
            FuncKind::Error => "error",
        }
    }

    /// Fixed argument count, if any; enforced at parse time when fixed.
    /// `None` means variadic or range-bounded; checked later.
    pub fn fixed_arity(&self) -> Option<usize> {
        match self {
            FuncKind::Strip
            | FuncKind::Words
            | FuncKind::Firstword
            | FuncKind::Lastword
            | FuncKind::Dir
            | FuncKind::Notdir
            | FuncKind::Suffix
            | FuncKind::Basename
            | FuncKind::Wildcard
            | FuncKind::Realpath
            | FuncKind::Abspath
            | FuncKind::Value
            | FuncKind::Flavor
            | FuncKind::Origin
            | FuncKind::Eval
            | FuncKind::Shell
            | FuncKind::Sort => Some(1),
            FuncKind::Findstring | FuncKind::Join | FuncKind::Word => Some(2),
            FuncKind::Subst | FuncKind::Patsubst => Some(3),
            FuncKind::Wordlist => Some(3),
            FuncKind::Foreach => Some(3),
            FuncKind::Filter | FuncKind::FilterOut | FuncKind::Addsuffix | FuncKind::Addprefix => Some(2),
            // variadic: if/or/and/call/info/warning/error
            FuncKind::If | FuncKind::Or | FuncKind::And | FuncKind::Call | FuncKind::Info
            | FuncKind::Warning | FuncKind::Error => None,
        }
    }
}

/// An expression node. Immutable after construction; owned by the
/// `Statement` or `Var` that holds it. Exposes evaluate-into-buffer
/// (`eval::evaluator::expand_value`) and debug-string (`Display`) as its
/// only observable operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Literal(Vec<u8>),
    /// `$(name_expr)` — the name is itself a Value, so `$($(foo))` parses.
    VarRef(Box<Value>),
    Func(FuncKind, Vec<Value>),
    /// Ordered concatenation. Consecutive literal fragments are fused and a
    /// single-element Concat collapses to its element at construction time,
    /// the canonical form that keeps expansion cheap.
    Concat(Vec<Value>),
}

impl Value {
    pub fn literal(bytes: impl Into<Vec<u8>>) -> Value {
        Value::Literal(bytes.into())
    }

    pub fn empty() -> Value {
        Value::Literal(Vec::new())
    }

    /// Build a Concat from parts, fusing adjacent literals and collapsing a
    /// single remaining element into the canonical form, so that expansion
    /// is cheap.
    pub fn concat(parts: Vec<Value>) -> Value {
        let mut fused: Vec<Value> = Vec::with_capacity(parts.len());
        for part in parts {
            match (fused.last_mut(), &part) {
                (Some(Value::Literal(prev)), Value::Literal(next)) => {
                    prev.extend_from_slice(next);
                }
                _ => fused.push(part),
            }
        }
        match fused.len() {
            0 => Value::empty(),
            1 => fused.into_iter().next().unwrap(),
            _ => Value::Concat(fused),
        }
    }

    pub fn is_empty_literal(&self) -> bool {
        matches!(self, Value::Literal(b) if b.is_empty())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Literal(b) => write!(f, "{}", String::from_utf8_lossy(b)),
            Value::VarRef(name) => write!(f, "$({})", name),
            Value::Func(kind, args) => {
                write!(f, "$({}", kind.as_str())?;
                for a in args {
                    write!(f, " {}", a)?;
                }
                write!(f, ")")
            }
            Value::Concat(parts) => {
                for p in parts {
                    write!(f, "{}", p)?;
                }
                Ok(())
            }
        }
    }
}

// =============================================================================
// ASSIGNMENT OPERATORS / DIRECTIVES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    /// `=` — recursive.
    Recursive,
    /// `:=` or `::=` — simple.
    Simple,
    /// `+=` — append.
    Append,
    /// `?=` — conditional (only if undefined).
    Conditional,
    /// `!=` — shell-assign (GNU extension: RHS is run through $(shell ...)).
    Shell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AssignDirective {
    #[default]
    None,
    Override,
    Export,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IfOp {
    Ifeq,
    Ifneq,
    Ifdef,
    Ifndef,
}

/// Rule terminator, ambiguous until the evaluator expands the LHS: `foo :
/// bar = baz` can be a target-specific assignment or a rule with a literal
/// `=` in a prerequisite, and only post-expansion text resolves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleTerminator {
    Colon,
    DoubleColon,
    Equals,
    None,
}

// =============================================================================
// STATEMENTS
// =============================================================================

/// A parsed statement. Each carries a `Loc` so a `ParseError` deferred to
/// evaluation time, or an evaluation fault, can be reported against the
/// exact source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub loc: Loc,
    pub kind: StatementKind,
}

impl Statement {
    pub fn new(loc: Loc, kind: StatementKind) -> Self {
        Self { loc, kind }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementKind {
    Rule {
        expr: Value,
        terminator: RuleTerminator,
        after_terminator: Option<Value>,
    },
    Assign {
        lhs: Value,
        rhs: Value,
        raw_rhs: Vec<u8>,
        op: AssignOp,
        directive: AssignDirective,
    },
    Command {
        expr: Value,
    },
    If {
        op: IfOp,
        lhs: Value,
        rhs: Option<Value>,
        then_branch: Vec<Statement>,
        else_branch: Option<Vec<Statement>>,
    },
    Include {
        expr: Value,
        optional: bool,
    },
    Export {
        expr: Option<Value>,
        is_export: bool,
    },
    Vpath {
        pattern: Option<Value>,
        dirs: Option<Value>,
    },
    ParseError {
        message: String,
    },
}

// =============================================================================
// FACTORY
// =============================================================================

/// AST factory for building nodes without repeating field lists at every
/// call site.
pub struct AST;

impl AST {
    pub fn rule(loc: Loc, expr: Value, terminator: RuleTerminator, after_terminator: Option<Value>) -> Statement {
        Statement::new(loc, StatementKind::Rule { expr, terminator, after_terminator })
    }

    pub fn assign(
        loc: Loc,
        lhs: Value,
        rhs: Value,
        raw_rhs: Vec<u8>,
        op: AssignOp,
        directive: AssignDirective,
    ) -> Statement {
        Statement::new(loc, StatementKind::Assign { lhs, rhs, raw_rhs, op, directive })
    }

    pub fn command(loc: Loc, expr: Value) -> Statement {
        Statement::new(loc, StatementKind::Command { expr })
    }

    pub fn if_stmt(
        loc: Loc,
        op: IfOp,
        lhs: Value,
        rhs: Option<Value>,
        then_branch: Vec<Statement>,
        else_branch: Option<Vec<Statement>>,
    ) -> Statement {
        Statement::new(loc, StatementKind::If { op, lhs, rhs, then_branch, else_branch })
    }

    pub fn include(loc: Loc, expr: Value, optional: bool) -> Statement {
        Statement::new(loc, StatementKind::Include { expr, optional })
    }

    pub fn export(loc: Loc, expr: Option<Value>, is_export: bool) -> Statement {
        Statement::new(loc, StatementKind::Export { expr, is_export })
    }

    pub fn vpath(loc: Loc, pattern: Option<Value>, dirs: Option<Value>) -> Statement {
        Statement::new(loc, StatementKind::Vpath { pattern, dirs })
    }

    pub fn parse_error(loc: Loc, message: impl Into<String>) -> Statement {
        Statement::new(loc, StatementKind::ParseError { message: message.into() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concat_fuses_adjacent_literals() {
        let v = Value::concat(vec![Value::literal("a"), Value::literal("b"), Value::literal("c")]);
        assert_eq!(v, Value::literal("abc"));
    }

    #[test]
    fn concat_collapses_single_element() {
        let inner = Value::VarRef(Box::new(Value::literal("X")));
        let v = Value::concat(vec![inner.clone()]);
        assert_eq!(v, inner);
    }

    #[test]
    fn concat_of_nothing_is_empty_literal() {
        assert_eq!(Value::concat(vec![]), Value::empty());
    }

    #[test]
    fn concat_keeps_non_literal_boundaries_separate() {
        let v = Value::concat(vec![
            Value::literal("a"),
            Value::VarRef(Box::new(Value::literal("X"))),
            Value::literal("b"),
            Value::literal("c"),
        ]);
        match v {
            Value::Concat(parts) => {
                assert_eq!(parts.len(), 3);
                assert_eq!(parts[2], Value::literal("bc"));
            }
            _ => panic!("expected Concat"),
        }
    }

    #[test]
    fn func_kind_round_trips_name() {
        for name in ["subst", "patsubst", "wildcard", "call", "shell", "foreach"] {
            let kind = FuncKind::from_name(name.as_bytes()).unwrap();
            assert_eq!(kind.as_str(), name);
        }
    }

    #[test]
    fn func_kind_rejects_unknown_name() {
        assert!(FuncKind::from_name(b"not-a-function").is_none());
    }

    #[test]
    fn display_renders_function_call() {
        let v = Value::Func(FuncKind::Subst, vec![Value::literal("a"), Value::literal("b"), Value::literal("c")]);
        assert_eq!(v.to_string(), "$(subst a b c)");
    }

    #[test]
    fn subst_and_patsubst_both_take_three_fixed_arguments() {
        assert_eq!(FuncKind::Subst.fixed_arity(), Some(3));
        assert_eq!(FuncKind::Patsubst.fixed_arity(), Some(3));
    }

    #[test]
    fn sort_takes_a_single_argument() {
        assert_eq!(FuncKind::Sort.fixed_arity(), Some(1));
    }
}
