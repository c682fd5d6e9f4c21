//! Top-level driver tying the parser, evaluator, and dep builder together.
//! One call loads a root Makefile, expands it, and the result can then be
//! turned into a `DepGraph` for one or more requested targets. Synchronous
//! throughout — evaluation is single-threaded cooperative, unlike a shell's
//! concurrent subprocess execution.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::depgraph::builder::{self, RealFilesystem};
use crate::depgraph::types::{DepGraph, Rule};
use crate::eval::errors::{MakeError, SystemError};
use crate::eval::evaluator::{Evaluator, MakeIo, SystemIo};
use crate::eval::types::{EvalLimits, Origin, RuleVar, Var, VariableTable, Warning};
use crate::parser;
use crate::symbol::{Symbol, SymbolTable};

/// Options for loading a Makefile tree: builder-style, `Default`-derived,
/// and passed into the constructor rather than threaded through every call.
pub struct MakefileOptions {
    /// `NAME=VALUE` pairs from the command line (`command_line` origin),
    /// applied after the environment and before the Makefile is parsed so
    /// they win precedence over `file`-origin assignments without
    /// `override`.
    pub command_line_vars: Vec<(String, String)>,
    /// Environment snapshot. `None` means seed from `std::env::vars()`.
    pub env: Option<HashMap<String, String>>,
    pub limits: EvalLimits,
    /// Defer `$(shell)`/`$(info)`/`$(warning)`/`$(error)` side effects
    /// instead of running them immediately, for callers building a graph
    /// for Ninja emission rather than running one Makefile top to bottom
    /// interactively.
    pub avoid_io: bool,
}

impl Default for MakefileOptions {
    fn default() -> Self {
        Self { command_line_vars: Vec::new(), env: None, limits: EvalLimits::default(), avoid_io: false }
    }
}

/// A fully evaluated Makefile tree: the collected rules, target-specific
/// variable bindings, and diagnostics, ready to resolve into a `DepGraph`
/// for any subset of its targets.
pub struct Makefile {
    pub symtab: SymbolTable,
    pub vars: VariableTable,
    pub warnings: Vec<Warning>,
    pub default_target: Option<Symbol>,
    rules: Vec<Rule>,
    rule_vars: HashMap<Symbol, IndexMap<Symbol, RuleVar>>,
}

impl Makefile {
    /// Load and evaluate `path` as a root Makefile. Seeds the environment
    /// (every variable interned and bound with origin `environment`) and
    /// parses `MAKEFLAGS` for `NAME=value` tokens, binding each as
    /// `command_line` origin, before anything else runs.
    pub fn load(path: &str, options: MakefileOptions) -> Result<Self, MakeError> {
        let symtab = SymbolTable::new();
        let io = SystemIo;
        let mut ev = Evaluator::new(symtab, &io);
        ev.state.limits = options.limits;
        ev.state.avoid_io = options.avoid_io;

        seed_environment(&mut ev, options.env.as_ref());
        seed_makeflags(&mut ev);
        seed_command_line_vars(&mut ev, &options.command_line_vars);

        let content = std::fs::read(path)
            .map_err(|e| SystemError::new(format!("{path}: No such file or directory"), e))?;
        let statements = parser::parse_statements(&content, path);
        ev.eval_statements(&statements)?;

        Ok(Self {
            symtab: ev.state.symtab.clone(),
            vars: ev.state.vars,
            warnings: ev.state.warnings,
            default_target: ev.state.default_target,
            rules: ev.state.rules,
            rule_vars: ev.state.rule_vars,
        })
    }

    /// Resolve `requested` targets (or the default target if empty) into a
    /// `DepGraph` against the rules collected during `load`. Any warnings
    /// raised during resolution
    /// (e.g. a target with a conflicting static pattern) are appended to
    /// `self.warnings`.
    pub fn build_graph(&mut self, requested: &[Symbol]) -> Result<DepGraph, MakeError> {
        let fs = RealFilesystem;
        let mut warnings = Vec::new();
        let graph = builder::build(&self.rules, &self.rule_vars, &self.symtab, requested, self.default_target, &fs, &mut warnings)?;
        self.warnings.extend(warnings);
        Ok(graph)
    }

    /// Intern a target name the caller typed on the command line, for use
    /// with `build_graph`.
    pub fn target(&self, name: &str) -> Symbol {
        self.symtab.intern_str(name)
    }
}

fn seed_environment(ev: &mut Evaluator<'_>, env: Option<&HashMap<String, String>>) {
    match env {
        Some(map) => {
            for (k, v) in map {
                seed_one(ev, k, v.as_bytes(), Origin::Environment);
            }
        }
        None => {
            for (k, v) in std::env::vars() {
                seed_one(ev, &k, v.as_bytes(), Origin::Environment);
            }
        }
    }
}

/// Parse `MAKEFLAGS` for `NAME=value` tokens and bind each as `command_line`
/// origin. Bare flag letters (`-k`, `--keep-going` equivalents) are not
/// meaningful to this crate's evaluator/dep-builder and are ignored; only
/// the variable-assignment tokens matter here.
fn seed_makeflags(ev: &mut Evaluator<'_>) {
    let sym = ev.state.symtab.intern(b"MAKEFLAGS");
    let raw = ev.state.vars.lookup(sym).raw_text();
    if raw.is_empty() {
        return;
    }
    for token in raw.split(|&b| b == b' ').filter(|t| !t.is_empty()) {
        if let Some(eq) = token.iter().position(|&b| b == b'=') {
            let (name, value) = (&token[..eq], &token[eq + 1..]);
            seed_one(ev, &String::from_utf8_lossy(name), value, Origin::CommandLine);
        }
    }
}

fn seed_command_line_vars(ev: &mut Evaluator<'_>, pairs: &[(String, String)]) {
    for (k, v) in pairs {
        seed_one(ev, k, v.as_bytes(), Origin::CommandLine);
    }
}

fn seed_one(ev: &mut Evaluator<'_>, name: &str, value: &[u8], origin: Origin) {
    let sym = ev.state.symtab.intern_str(name);
    ev.state.vars.force_set_global(sym, Var::Simple { value: value.to_vec(), origin });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &str) -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("just_make_test_{}.mk", std::process::id()));
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn loads_and_resolves_default_target() {
        let path = write_temp("all: foo.o\n\nfoo.o: foo.c\n\tcc -c foo.c\n\nfoo.c:\n\ttouch foo.c\n");
        let mut mk = Makefile::load(path.to_str().unwrap(), MakefileOptions::default()).unwrap();
        let graph = mk.build_graph(&[]).unwrap();
        assert_eq!(mk.symtab.name_str(graph.default_target.unwrap()), "all");
        assert!(!graph.is_empty());
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn command_line_override_beats_file_assignment() {
        let path = write_temp("CC = gcc\nall:\n\techo $(CC)\n");
        let options = MakefileOptions { command_line_vars: vec![("CC".to_string(), "clang".to_string())], ..Default::default() };
        let mk = Makefile::load(path.to_str().unwrap(), options).unwrap();
        let sym = mk.symtab.intern_str("CC");
        // Makefile::load seeds command-line vars before evaluating the file,
        // so the file's `CC = gcc` must not clobber it: command_line origin
        // beats file origin.
        assert_eq!(mk.vars.global_var(sym).raw_text(), b"clang");
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn missing_file_is_a_system_error() {
        let err = Makefile::load("/nonexistent/Makefile.does.not.exist", MakefileOptions::default()).unwrap_err();
        assert!(matches!(err, MakeError::System(_)));
    }
}
