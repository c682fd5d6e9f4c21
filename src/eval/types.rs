//! Evaluator types: variables, origins, flavors, and the variable table.
//!
//! Mirrors spec.md §3 "Var (variable)" and "Variable table", and §9's
//! `ScopedVar` RAII guard. Kept separate from `eval::evaluator` (the
//! statement-walking driver) the way the teacher keeps `InterpreterState`
//! separate from the execution functions that mutate it.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;

use crate::ast::types::{AssignOp, Loc, Value};
use crate::depgraph::types::Rule;
use crate::symbol::Symbol;
use crate::symbol::SymbolTable;

/// Provenance of a variable binding; determines assignment precedence
/// (spec.md §3 "Origin").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Undefined,
    Default,
    Environment,
    EnvironmentOverride,
    File,
    CommandLine,
    Override,
    Automatic,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Undefined => "undefined",
            Origin::Default => "default",
            Origin::Environment => "environment",
            Origin::EnvironmentOverride => "environment override",
            Origin::File => "file",
            Origin::CommandLine => "command line",
            Origin::Override => "override",
            Origin::Automatic => "automatic",
        }
    }
}

/// The expansion discipline of a variable (spec.md §3 "Var", GLOSSARY
/// "Flavor").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    Recursive,
    Simple,
    Undefined,
}

impl Flavor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Flavor::Recursive => "recursive",
            Flavor::Simple => "simple",
            Flavor::Undefined => "undefined",
        }
    }
}

/// A make variable binding (spec.md §3 "Var"). `Undefined` is the sentinel
/// returned by lookups that miss; it is never actually stored.
#[derive(Debug, Clone)]
pub enum Var {
    Simple { value: Vec<u8>, origin: Origin },
    Recursive { value: Value, origin: Origin },
    Undefined,
}

impl Var {
    pub fn flavor(&self) -> Flavor {
        match self {
            Var::Simple { .. } => Flavor::Simple,
            Var::Recursive { .. } => Flavor::Recursive,
            Var::Undefined => Flavor::Undefined,
        }
    }

    pub fn origin(&self) -> Origin {
        match self {
            Var::Simple { origin, .. } | Var::Recursive { origin, .. } => *origin,
            Var::Undefined => Origin::Undefined,
        }
    }

    pub fn defined(&self) -> bool {
        !matches!(self, Var::Undefined)
    }

    /// The unexpanded text of a variable, for the `$(value)` built-in
    /// (spec.md §4.4 "value"). Simple variables have no unexpanded form, so
    /// their already-computed bytes stand in for it.
    pub fn raw_text(&self) -> Vec<u8> {
        match self {
            Var::Simple { value, .. } => value.clone(),
            Var::Recursive { value, .. } => value.to_string().into_bytes(),
            Var::Undefined => Vec::new(),
        }
    }
}

/// A target-specific variable binding: a `Var` plus the assignment operator
/// that produced it, so the dep builder can tell `:=` bindings from `+=`
/// bindings when layering parent-inherited bindings on top of a child's own
/// (spec.md §3 "A RuleVar wrapper attaches an assignment operator to a Var
/// for target-specific variables").
#[derive(Debug, Clone)]
pub struct RuleVar {
    pub var: Var,
    pub op: AssignOp,
}

/// Global + transient-scope variable storage (spec.md §3 "Variable table").
///
/// `global` is the process-wide table; `scope` is the "current scope" table
/// that `ScopedVar` pushes onto while expanding `foreach`/`call`/
/// target-specific variable bodies. Lookup checks `scope` first, then
/// `global`, matching the invariant in spec.md §3.
pub struct VariableTable {
    global: IndexMap<Symbol, Var>,
    scope: HashMap<Symbol, Var>,
}

impl VariableTable {
    pub fn new() -> Self {
        Self { global: IndexMap::new(), scope: HashMap::new() }
    }

    pub fn lookup(&self, sym: Symbol) -> &Var {
        self.scope.get(&sym).or_else(|| self.global.get(&sym)).unwrap_or(&Var::Undefined)
    }

    pub fn global_var(&self, sym: Symbol) -> &Var {
        self.global.get(&sym).unwrap_or(&Var::Undefined)
    }

    /// Iterate global bindings in declaration order (`IndexMap` preserves
    /// insertion order), used by `$(eval)`'s re-evaluation and by tests that
    /// assert on enumeration order.
    pub fn iter_global(&self) -> impl Iterator<Item = (Symbol, &Var)> {
        self.global.iter().map(|(s, v)| (*s, v))
    }

    /// Apply the precedence rule of spec.md §4.1 `set_global_var` and store
    /// the result. Returns `Err` only for the fatal "overwrite an automatic
    /// variable" case; a dropped write due to precedence is a silent no-op,
    /// matching GNU make.
    pub fn set_global_var(&mut self, sym: Symbol, var: Var, override_flag: bool) -> Result<(), String> {
        if let Some(existing) = self.global.get(&sym) {
            if matches!(existing.origin(), Origin::Automatic) {
                return Err("overriding automatic variable".to_string());
            }
            if !override_flag && matches!(existing.origin(), Origin::Override | Origin::EnvironmentOverride) {
                return Ok(());
            }
            if matches!(existing.origin(), Origin::CommandLine) && matches!(var.origin(), Origin::File) {
                return Ok(());
            }
        }
        self.global.insert(sym, var);
        Ok(())
    }

    /// Force-insert without precedence checks, used for environment/
    /// command-line seeding and for automatic variables.
    pub fn force_set_global(&mut self, sym: Symbol, var: Var) {
        self.global.insert(sym, var);
    }

    pub(crate) fn take_scope(&mut self, sym: Symbol) -> Option<Var> {
        self.scope.remove(&sym)
    }

    pub(crate) fn set_scope(&mut self, sym: Symbol, var: Var) {
        self.scope.insert(sym, var);
    }

    pub(crate) fn remove_scope(&mut self, sym: Symbol) {
        self.scope.remove(&sym);
    }
}

impl Default for VariableTable {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard that rebinds a symbol in the transient scope table and
/// restores whatever was bound there before on every exit path, including
/// evaluation failure (spec.md §3, §9 "Target-specific variable scope").
pub struct ScopedVar<'a> {
    table: &'a mut VariableTable,
    symbol: Symbol,
    previous: Option<Var>,
}

impl<'a> ScopedVar<'a> {
    pub fn new(table: &'a mut VariableTable, symbol: Symbol, value: Var) -> Self {
        let previous = table.take_scope(symbol);
        table.set_scope(symbol, value);
        Self { table, symbol, previous }
    }

    pub fn table(&mut self) -> &mut VariableTable {
        self.table
    }
}

impl<'a> Drop for ScopedVar<'a> {
    fn drop(&mut self) {
        match self.previous.take() {
            Some(v) => self.table.set_scope(self.symbol, v),
            None => self.table.remove_scope(self.symbol),
        }
    }
}

/// A non-fatal diagnostic surfaced per spec.md §7 "Warnings". Collected by
/// `EvaluatorState` rather than written straight to a logging facade, in the
/// teacher's accumulate-and-return idiom (`ExecResult.stderr`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    OverridingRecipe { target: String, loc: crate::ast::types::Loc },
    UndefinedVariable { name: String, loc: crate::ast::types::Loc },
    UnusualWhitespace { loc: crate::ast::types::Loc, detail: String },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::OverridingRecipe { target, loc } => {
                write!(f, "{loc}: warning: overriding recipe for target '{target}'")
            }
            Warning::UndefinedVariable { name, loc } => {
                write!(f, "{loc}: warning: undefined variable '{name}'")
            }
            Warning::UnusualWhitespace { loc, detail } => {
                write!(f, "{loc}: warning: {detail}")
            }
        }
    }
}

/// Recursion/expansion limits, mirroring the teacher's
/// `ExecutionLimits::max_recursion_depth` (spec.md §9 "recommended >= 100").
#[derive(Debug, Clone, Copy)]
pub struct EvalLimits {
    pub max_expansion_depth: usize,
    pub max_include_depth: usize,
}

impl Default for EvalLimits {
    fn default() -> Self {
        Self { max_expansion_depth: 200, max_include_depth: 64 }
    }
}

/// A single `$(shell)`/`$(info)`/`$(warning)`/`$(error)` invocation deferred
/// under `avoid_io` (spec.md §4.4 "avoid_io mode").
#[derive(Debug, Clone)]
pub struct DeferredCommand {
    pub index: usize,
    pub kind: &'static str,
    pub text: Vec<u8>,
}

/// A record of an included file, kept for the external cache-serialization
/// collaborator (spec.md §4.4 "Include" — "records each included file name
/// and a content hash").
#[derive(Debug, Clone)]
pub struct IncludeRecord {
    pub path: String,
    pub content_hash: u64,
}

/// All mutable state threaded through statement evaluation (spec.md §4.4
/// "Evaluator" — "State: variable table, current scope, rules collected so
/// far, per-target variables..., export list, current location, avoid_io
/// flag..., used undefined vars set").
pub struct EvaluatorState {
    pub symtab: SymbolTable,
    pub vars: VariableTable,
    pub rules: Vec<Rule>,
    /// Target-specific variable bindings keyed by target symbol, in
    /// declaration order (spec.md §4.4 "Rule" — re-parse as target-specific
    /// assignment; spec.md §4.5 Phase C consumes this map).
    pub rule_vars: HashMap<Symbol, IndexMap<Symbol, RuleVar>>,
    pub export_all: bool,
    pub export_set: HashSet<Symbol>,
    pub warnings: Vec<Warning>,
    pub loc: Loc,
    pub avoid_io: bool,
    pub used_undefined: HashSet<Symbol>,
    pub includes: Vec<IncludeRecord>,
    pub vpath: Vec<(Vec<u8>, Vec<Vec<u8>>)>,
    pub deferred: Vec<DeferredCommand>,
    pub default_target: Option<Symbol>,
    pub limits: EvalLimits,
    pub warnings_enabled: bool,
}

impl EvaluatorState {
    pub fn new(symtab: SymbolTable) -> Self {
        Self {
            symtab,
            vars: VariableTable::new(),
            rules: Vec::new(),
            rule_vars: HashMap::new(),
            export_all: false,
            export_set: HashSet::new(),
            warnings: Vec::new(),
            loc: Loc::default(),
            avoid_io: false,
            used_undefined: HashSet::new(),
            includes: Vec::new(),
            vpath: Vec::new(),
            deferred: Vec::new(),
            default_target: None,
            limits: EvalLimits::default(),
            warnings_enabled: true,
        }
    }

    pub fn warn(&mut self, w: Warning) {
        self.warnings.push(w);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::SymbolTable;

    #[test]
    fn lookup_checks_scope_before_global() {
        let symtab = SymbolTable::new();
        let sym = symtab.intern_str("X");
        let mut table = VariableTable::new();
        table.force_set_global(sym, Var::Simple { value: b"global".to_vec(), origin: Origin::File });
        assert_eq!(table.lookup(sym).raw_text(), b"global");
        {
            let _scope = ScopedVar::new(&mut table, sym, Var::Simple { value: b"scoped".to_vec(), origin: Origin::Automatic });
            assert_eq!(table.lookup(sym).raw_text(), b"scoped");
        }
        assert_eq!(table.lookup(sym).raw_text(), b"global");
    }

    #[test]
    fn command_line_origin_blocks_file_origin_overwrite() {
        let symtab = SymbolTable::new();
        let sym = symtab.intern_str("X");
        let mut table = VariableTable::new();
        table.force_set_global(sym, Var::Simple { value: b"cli".to_vec(), origin: Origin::CommandLine });
        table
            .set_global_var(sym, Var::Simple { value: b"file".to_vec(), origin: Origin::File }, false)
            .unwrap();
        assert_eq!(table.global_var(sym).raw_text(), b"cli");
    }

    #[test]
    fn override_directive_bypasses_command_line_precedence() {
        let symtab = SymbolTable::new();
        let sym = symtab.intern_str("X");
        let mut table = VariableTable::new();
        table.force_set_global(sym, Var::Simple { value: b"cli".to_vec(), origin: Origin::CommandLine });
        table
            .set_global_var(sym, Var::Simple { value: b"file".to_vec(), origin: Origin::Override }, true)
            .unwrap();
        assert_eq!(table.global_var(sym).raw_text(), b"file");
    }

    #[test]
    fn overriding_automatic_variable_is_fatal() {
        let symtab = SymbolTable::new();
        let sym = symtab.intern_str("@");
        let mut table = VariableTable::new();
        table.force_set_global(sym, Var::Simple { value: b"x".to_vec(), origin: Origin::Automatic });
        let err = table.set_global_var(sym, Var::Simple { value: b"y".to_vec(), origin: Origin::File }, false);
        assert!(err.is_err());
    }

    #[test]
    fn nested_scopes_restore_in_order() {
        let symtab = SymbolTable::new();
        let sym = symtab.intern_str("X");
        let mut table = VariableTable::new();
        table.force_set_global(sym, Var::Simple { value: b"g".to_vec(), origin: Origin::File });
        {
            let _outer = ScopedVar::new(&mut table, sym, Var::Simple { value: b"outer".to_vec(), origin: Origin::Automatic });
            {
                let _inner = ScopedVar::new(&mut table, sym, Var::Simple { value: b"inner".to_vec(), origin: Origin::Automatic });
                assert_eq!(table.lookup(sym).raw_text(), b"inner");
            }
            assert_eq!(table.lookup(sym).raw_text(), b"outer");
        }
        assert_eq!(table.lookup(sym).raw_text(), b"g");
    }
}
