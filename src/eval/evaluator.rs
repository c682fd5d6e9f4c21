//! Statement-walking evaluator (spec.md §4.4 "Evaluator").
//!
//! `expand_value` recursively turns a `Value` tree into bytes; `eval_statements`
//! walks a `Vec<Statement>`, mutating `EvaluatorState` as it goes. The two
//! halves split the same way the teacher splits `InterpreterState` (owned
//! data) from the functions that mutate it, except here both live together
//! behind `Evaluator` because nearly every statement kind needs both the
//! state and `expand_value` in the same breath.
//!
//! Side-effecting built-ins (`$(shell)`, `$(info)`, `$(warning)`, `$(error)`)
//! go through `MakeIo` so tests can substitute a fake without touching the
//! real filesystem or spawning a shell, mirroring the teacher's `FileSystem`
//! trait split from `InterpreterState`.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use indexmap::IndexMap;

use crate::ast::types::{AssignDirective, AssignOp, FuncKind, IfOp, Loc, RuleTerminator, Statement, StatementKind, Value};
use crate::depgraph::types::Rule;
use crate::eval::errors::{EvalError, MakeError, SystemError};
use crate::eval::functions;
use crate::eval::types::{DeferredCommand, EvaluatorState, IncludeRecord, Origin, RuleVar, Var, Warning};
use crate::parser;
use crate::symbol::{Symbol, SymbolTable};

/// The outside world an `Evaluator` is allowed to touch: reading included
/// Makefiles, testing for a prerequisite's existence, and running
/// `$(shell)` commands (spec.md §5 "the process's filesystem and a single
/// child-process shell").
pub trait MakeIo {
    fn read_file(&self, path: &str) -> std::io::Result<Vec<u8>>;
    fn file_exists(&self, path: &str) -> bool;
    fn run_shell(&self, cmd: &str) -> std::io::Result<Vec<u8>>;

    fn emit_info(&self, msg: &str) {
        println!("{msg}");
    }
    fn emit_warning(&self, msg: &str) {
        eprintln!("{msg}");
    }
    fn emit_error(&self, msg: &str) {
        eprintln!("{msg}");
    }
}

/// `MakeIo` backed by the real filesystem and `/bin/sh`.
pub struct SystemIo;

impl MakeIo for SystemIo {
    fn read_file(&self, path: &str) -> std::io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn file_exists(&self, path: &str) -> bool {
        std::path::Path::new(path).exists()
    }

    fn run_shell(&self, cmd: &str) -> std::io::Result<Vec<u8>> {
        let output = std::process::Command::new("/bin/sh").arg("-c").arg(cmd).output()?;
        Ok(output.stdout)
    }
}

/// Drives statement evaluation against an `EvaluatorState`, borrowing a
/// `MakeIo` for the duration (spec.md §4.4 "Evaluator").
pub struct Evaluator<'io> {
    pub state: EvaluatorState,
    io: &'io dyn MakeIo,
    depth: usize,
    include_depth: usize,
    /// Index into `state.rules` that trailing `Command` statements attach to
    /// (spec.md §4.4 "Rule": "Associate any subsequent Command statements
    /// with this rule until a non-command statement intervenes").
    pending_rule_idx: Option<usize>,
}

impl<'io> Evaluator<'io> {
    pub fn new(symtab: SymbolTable, io: &'io dyn MakeIo) -> Self {
        Self { state: EvaluatorState::new(symtab), io, depth: 0, include_depth: 0, pending_rule_idx: None }
    }

    pub fn eval_statements(&mut self, stmts: &[Statement]) -> Result<(), MakeError> {
        for stmt in stmts {
            self.state.loc = stmt.loc.clone();
            if !matches!(stmt.kind, StatementKind::Command { .. }) {
                self.pending_rule_idx = None;
            }
            match &stmt.kind {
                StatementKind::Assign { lhs, rhs, op, directive, .. } => {
                    let lhs_bytes = self.expand_value(lhs)?;
                    let sym = self.state.symtab.intern(&lhs_bytes);
                    self.perform_assign(sym, *op, rhs, *directive, &stmt.loc)?;
                }
                StatementKind::Rule { expr, terminator, after_terminator } => {
                    self.eval_rule(expr, *terminator, after_terminator.as_ref(), &stmt.loc)?;
                }
                StatementKind::Command { expr } => {
                    if let Some(idx) = self.pending_rule_idx {
                        self.state.rules[idx].commands.push(expr.clone());
                    }
                }
                StatementKind::If { op, lhs, rhs, then_branch, else_branch } => {
                    let taken = self.eval_condition(*op, lhs, rhs.as_ref())?;
                    if taken {
                        self.eval_statements(then_branch)?;
                    } else if let Some(eb) = else_branch {
                        self.eval_statements(eb)?;
                    }
                }
                StatementKind::Include { expr, optional } => {
                    self.eval_include(expr, *optional, &stmt.loc)?;
                }
                StatementKind::Export { expr, is_export } => {
                    self.eval_export(expr.as_ref(), *is_export)?;
                }
                StatementKind::Vpath { pattern, dirs } => {
                    self.eval_vpath(pattern.as_ref(), dirs.as_ref())?;
                }
                StatementKind::ParseError { message } => {
                    return Err(EvalError::new(message.clone(), stmt.loc.clone()).into());
                }
            }
        }
        Ok(())
    }

    // =========================================================================
    // Value expansion
    // =========================================================================

    /// Expand a `Value` tree to its final bytes, guarding against unbounded
    /// recursion (spec.md §9 "recommended >= 100").
    pub fn expand_value(&mut self, value: &Value) -> Result<Vec<u8>, MakeError> {
        self.depth += 1;
        if self.depth > self.state.limits.max_expansion_depth {
            self.depth -= 1;
            return Err(EvalError::new(
                "too many nested variable expansions (possible recursive variable reference)",
                self.state.loc.clone(),
            )
            .into());
        }
        let result = self.expand_value_inner(value);
        self.depth -= 1;
        result
    }

    fn expand_value_inner(&mut self, value: &Value) -> Result<Vec<u8>, MakeError> {
        match value {
            Value::Literal(b) => Ok(b.clone()),
            Value::VarRef(name) => {
                let name_bytes = self.expand_value(name)?;
                let sym = self.state.symtab.intern(&name_bytes);
                match self.state.vars.lookup(sym).clone() {
                    Var::Undefined => {
                        self.state.used_undefined.insert(sym);
                        Ok(Vec::new())
                    }
                    Var::Simple { value, .. } => Ok(value),
                    Var::Recursive { value, .. } => self.expand_value(&value),
                }
            }
            Value::Concat(parts) => {
                let mut out = Vec::new();
                for p in parts {
                    out.extend(self.expand_value(p)?);
                }
                Ok(out)
            }
            Value::Func(kind, args) => {
                if let Some(expected) = kind.fixed_arity() {
                    if args.len() != expected {
                        return Err(EvalError::new(
                            format!("insufficient number of arguments ({}) to function `{}'", args.len(), kind.as_str()),
                            self.state.loc.clone(),
                        )
                        .into());
                    }
                }
                let loc = self.state.loc.clone();
                self.call_function(*kind, args, &loc)
            }
        }
    }

    // =========================================================================
    // Function dispatch
    // =========================================================================

    fn call_function(&mut self, kind: FuncKind, args: &[Value], loc: &Loc) -> Result<Vec<u8>, MakeError> {
        use FuncKind::*;
        match kind {
            Subst => {
                let a = self.expand_value(&args[0])?;
                let b = self.expand_value(&args[1])?;
                let t = self.expand_value(&args[2])?;
                Ok(functions::subst(&a, &b, &t))
            }
            Patsubst => {
                let a = self.expand_value(&args[0])?;
                let b = self.expand_value(&args[1])?;
                let t = self.expand_value(&args[2])?;
                Ok(functions::patsubst(&a, &b, &t))
            }
            Strip => {
                let t = self.expand_value(&args[0])?;
                Ok(functions::strip(&t))
            }
            Findstring => {
                let a = self.expand_value(&args[0])?;
                let b = self.expand_value(&args[1])?;
                Ok(functions::findstring(&a, &b))
            }
            Filter => {
                let a = self.expand_value(&args[0])?;
                let b = self.expand_value(&args[1])?;
                Ok(functions::filter(&a, &b))
            }
            FilterOut => {
                let a = self.expand_value(&args[0])?;
                let b = self.expand_value(&args[1])?;
                Ok(functions::filter_out(&a, &b))
            }
            Sort => {
                let t = self.expand_value(&args[0])?;
                Ok(functions::sort(&t))
            }
            Word => {
                let n = self.expand_value(&args[0])?;
                let t = self.expand_value(&args[1])?;
                Ok(functions::word(&n, &t))
            }
            Wordlist => {
                let s = self.expand_value(&args[0])?;
                let e = self.expand_value(&args[1])?;
                let t = self.expand_value(&args[2])?;
                Ok(functions::wordlist(&s, &e, &t))
            }
            Words => Ok(functions::words(&self.expand_value(&args[0])?)),
            Firstword => Ok(functions::firstword(&self.expand_value(&args[0])?)),
            Lastword => Ok(functions::lastword(&self.expand_value(&args[0])?)),
            Dir => Ok(functions::dir(&self.expand_value(&args[0])?)),
            Notdir => Ok(functions::notdir(&self.expand_value(&args[0])?)),
            Suffix => Ok(functions::suffix(&self.expand_value(&args[0])?)),
            Basename => Ok(functions::basename(&self.expand_value(&args[0])?)),
            Addsuffix => {
                let a = self.expand_value(&args[0])?;
                let b = self.expand_value(&args[1])?;
                Ok(functions::addsuffix(&a, &b))
            }
            Addprefix => {
                let a = self.expand_value(&args[0])?;
                let b = self.expand_value(&args[1])?;
                Ok(functions::addprefix(&a, &b))
            }
            Join => {
                let a = self.expand_value(&args[0])?;
                let b = self.expand_value(&args[1])?;
                Ok(functions::join(&a, &b))
            }
            Wildcard => Ok(functions::wildcard(&self.expand_value(&args[0])?)),
            Realpath => Ok(functions::realpath(&self.expand_value(&args[0])?)),
            Abspath => Ok(functions::abspath(&self.expand_value(&args[0])?)),
            If => self.call_if(args),
            Or => self.call_or(args),
            And => self.call_and(args),
            Foreach => self.call_foreach(args),
            Call => self.call_call(args, loc),
            Value => self.call_value(args),
            Flavor => self.call_flavor(args),
            Origin => self.call_origin(args),
            Eval => self.call_eval(args, loc),
            Shell => {
                let cmd = self.expand_value(&args[0])?;
                self.run_shell_text(&cmd, loc)
            }
            Info => self.call_diag(args, "info", loc),
            Warning => self.call_diag(args, "warning", loc),
            Error => self.call_diag(args, "error", loc),
        }
    }

    fn call_if(&mut self, args: &[Value]) -> Result<Vec<u8>, MakeError> {
        let cond = match args.first() {
            Some(v) => self.expand_value(v)?,
            None => return Ok(Vec::new()),
        };
        if !functions::strip(&cond).is_empty() {
            match args.get(1) {
                Some(v) => self.expand_value(v),
                None => Ok(Vec::new()),
            }
        } else {
            match args.get(2) {
                Some(v) => self.expand_value(v),
                None => Ok(Vec::new()),
            }
        }
    }

    /// `$(or a,b,c)` — first arg whose expansion is non-empty (after
    /// `strip`), evaluated left to right.
    fn call_or(&mut self, args: &[Value]) -> Result<Vec<u8>, MakeError> {
        for a in args {
            let v = self.expand_value(a)?;
            if !functions::strip(&v).is_empty() {
                return Ok(v);
            }
        }
        Ok(Vec::new())
    }

    /// `$(and a,b,c)` — empty as soon as one arg expands empty; otherwise the
    /// last arg's expansion.
    fn call_and(&mut self, args: &[Value]) -> Result<Vec<u8>, MakeError> {
        let mut last = Vec::new();
        for a in args {
            let v = self.expand_value(a)?;
            if functions::strip(&v).is_empty() {
                return Ok(Vec::new());
            }
            last = v;
        }
        Ok(last)
    }

    fn call_foreach(&mut self, args: &[Value]) -> Result<Vec<u8>, MakeError> {
        let name_bytes = self.expand_value(&args[0])?;
        let sym = self.state.symtab.intern(trim(&name_bytes));
        let list = self.expand_value(&args[1])?;
        let words: Vec<Vec<u8>> = functions::split_words(&list).into_iter().map(|w| w.to_vec()).collect();
        let mut out: Vec<Vec<u8>> = Vec::with_capacity(words.len());
        for w in words {
            let body = &args[2];
            let v = self.with_scoped_var(sym, Var::Simple { value: w, origin: Origin::Automatic }, |ev| ev.expand_value(body))?;
            out.push(v);
        }
        Ok(functions::join_words(&out))
    }

    fn call_call(&mut self, args: &[Value], loc: &Loc) -> Result<Vec<u8>, MakeError> {
        if args.is_empty() {
            return Ok(Vec::new());
        }
        let name_bytes = self.expand_value(&args[0])?;
        let sym = self.state.symtab.intern(trim(&name_bytes));
        let mut params: Vec<Vec<u8>> = Vec::with_capacity(args.len());
        params.push(name_bytes.clone());
        for a in &args[1..] {
            params.push(self.expand_value(a)?);
        }
        let body = match self.state.vars.lookup(sym).clone() {
            Var::Recursive { value, .. } => value,
            Var::Simple { value, .. } => Value::literal(value),
            Var::Undefined => {
                self.state.warn(Warning::UndefinedVariable {
                    name: String::from_utf8_lossy(&name_bytes).into_owned(),
                    loc: loc.clone(),
                });
                return Ok(Vec::new());
            }
        };
        self.bind_params_and_expand(&params, 0, &body)
    }

    /// Binds `$(0)`, `$(1)`, ... one at a time via nested `with_scoped_var`
    /// calls, then expands `body` with all of them visible.
    fn bind_params_and_expand(&mut self, params: &[Vec<u8>], i: usize, body: &Value) -> Result<Vec<u8>, MakeError> {
        if i >= params.len() {
            return self.expand_value(body);
        }
        let sym = self.state.symtab.intern_str(&i.to_string());
        let value = Var::Simple { value: params[i].clone(), origin: Origin::Automatic };
        self.with_scoped_var(sym, value, |ev| ev.bind_params_and_expand(params, i + 1, body))
    }

    fn call_value(&mut self, args: &[Value]) -> Result<Vec<u8>, MakeError> {
        let name_bytes = self.expand_value(&args[0])?;
        let sym = self.state.symtab.intern(trim(&name_bytes));
        Ok(self.state.vars.lookup(sym).raw_text())
    }

    fn call_flavor(&mut self, args: &[Value]) -> Result<Vec<u8>, MakeError> {
        let name_bytes = self.expand_value(&args[0])?;
        let sym = self.state.symtab.intern(trim(&name_bytes));
        Ok(self.state.vars.lookup(sym).flavor().as_str().as_bytes().to_vec())
    }

    fn call_origin(&mut self, args: &[Value]) -> Result<Vec<u8>, MakeError> {
        let name_bytes = self.expand_value(&args[0])?;
        let sym = self.state.symtab.intern(trim(&name_bytes));
        Ok(self.state.vars.lookup(sym).origin().as_str().as_bytes().to_vec())
    }

    /// `$(eval text)` — parse `text` as Makefile syntax and evaluate it in
    /// place, re-running every time the enclosing Value is expanded (spec.md
    /// §9 Open Question: a `define`'d variable whose body calls `$(eval)`
    /// re-executes it on every reference, same as any other Recursive var).
    fn call_eval(&mut self, args: &[Value], loc: &Loc) -> Result<Vec<u8>, MakeError> {
        let text = self.expand_value(&args[0])?;
        let stmts = parser::parse_statements(&text, &loc.file);
        self.eval_statements(&stmts)?;
        Ok(Vec::new())
    }

    fn call_diag(&mut self, args: &[Value], kind: &'static str, loc: &Loc) -> Result<Vec<u8>, MakeError> {
        let mut msg = Vec::new();
        for (i, a) in args.iter().enumerate() {
            if i > 0 {
                msg.push(b',');
            }
            msg.extend(self.expand_value(a)?);
        }
        if self.state.avoid_io {
            let index = self.state.deferred.len();
            self.state.deferred.push(DeferredCommand { index, kind, text: msg });
            return Ok(Vec::new());
        }
        let text = String::from_utf8_lossy(&msg).into_owned();
        match kind {
            "info" => {
                self.io.emit_info(&text);
                Ok(Vec::new())
            }
            "warning" => {
                self.io.emit_warning(&format!("{loc}: {text}"));
                Ok(Vec::new())
            }
            "error" => {
                self.io.emit_error(&format!("{loc}: {text}"));
                Err(EvalError::new(text, loc.clone()).into())
            }
            _ => unreachable!("call_diag only called with info/warning/error"),
        }
    }

    fn run_shell_text(&mut self, cmd: &[u8], loc: &Loc) -> Result<Vec<u8>, MakeError> {
        if self.state.avoid_io {
            let index = self.state.deferred.len();
            self.state.deferred.push(DeferredCommand { index, kind: "shell", text: cmd.to_vec() });
            return Ok(format!("\u{1}DEFERRED:{index}\u{1}").into_bytes());
        }
        let cmd_str = String::from_utf8_lossy(cmd).into_owned();
        let out = self
            .io
            .run_shell(&cmd_str)
            .map_err(|e| SystemError::new(format!("{loc}: $(shell {cmd_str})"), e))?;
        Ok(normalize_shell_output(&out))
    }

    // =========================================================================
    // Scoped variables
    // =========================================================================

    /// Rebinds `sym` in the transient scope table for the duration of `f`,
    /// restoring whatever was there before on every return path. A closure
    /// rather than `ScopedVar`'s RAII guard (`eval::types`), because `f` here
    /// always needs `&mut Self` itself (to recurse into `expand_value`), and
    /// holding a guard that borrows `&mut self.state.vars` across that call
    /// would conflict with the guard's own borrow.
    fn with_scoped_var<R>(&mut self, sym: Symbol, value: Var, f: impl FnOnce(&mut Self) -> R) -> R {
        let previous = self.state.vars.take_scope(sym);
        self.state.vars.set_scope(sym, value);
        let result = f(self);
        match previous {
            Some(v) => self.state.vars.set_scope(sym, v),
            None => self.state.vars.remove_scope(sym),
        }
        result
    }

    // =========================================================================
    // Assignment
    // =========================================================================

    fn perform_assign(&mut self, sym: Symbol, op: AssignOp, rhs: &Value, directive: AssignDirective, loc: &Loc) -> Result<(), MakeError> {
        if matches!(op, AssignOp::Conditional) && self.state.vars.global_var(sym).defined() {
            if matches!(directive, AssignDirective::Export) {
                self.state.export_set.insert(sym);
            }
            return Ok(());
        }
        let origin = if matches!(directive, AssignDirective::Override) { Origin::Override } else { Origin::File };
        let var = match op {
            AssignOp::Recursive | AssignOp::Conditional => Var::Recursive { value: rhs.clone(), origin },
            AssignOp::Simple => {
                let bytes = self.expand_value(rhs)?;
                Var::Simple { value: bytes, origin }
            }
            AssignOp::Shell => {
                let cmd = self.expand_value(rhs)?;
                let out = self.run_shell_text(&cmd, loc)?;
                Var::Simple { value: out, origin }
            }
            AssignOp::Append => {
                let existing = self.state.vars.global_var(sym).clone();
                self.append_var(existing, rhs, origin)?
            }
        };
        let override_flag = matches!(directive, AssignDirective::Override);
        self.state
            .vars
            .set_global_var(sym, var, override_flag)
            .map_err(|msg| EvalError::new(msg, loc.clone()))?;
        if matches!(directive, AssignDirective::Export) {
            self.state.export_set.insert(sym);
        }
        Ok(())
    }

    /// `+=` preserves the existing binding's flavor and origin rather than
    /// always switching to Recursive (spec.md §9 Open Question: appending to
    /// an exported Recursive var keeps its origin, it isn't "upgraded").
    fn append_var(&mut self, existing: Var, rhs: &Value, origin_if_new: Origin) -> Result<Var, MakeError> {
        match existing {
            Var::Undefined => Ok(Var::Recursive { value: rhs.clone(), origin: origin_if_new }),
            Var::Simple { mut value, origin } => {
                let extra = self.expand_value(rhs)?;
                if !value.is_empty() {
                    value.push(b' ');
                }
                value.extend_from_slice(&extra);
                Ok(Var::Simple { value, origin })
            }
            Var::Recursive { value, origin } => {
                Ok(Var::Recursive { value: Value::concat(vec![value, Value::literal(" "), rhs.clone()]), origin })
            }
        }
    }

    fn apply_rule_var(&mut self, target: Symbol, var_sym: Symbol, op: AssignOp, rhs: &Value, loc: &Loc) -> Result<(), MakeError> {
        if matches!(op, AssignOp::Conditional) {
            if self.state.rule_vars.get(&target).and_then(|m| m.get(&var_sym)).is_some() {
                return Ok(());
            }
        }
        let new_var = match op {
            AssignOp::Recursive | AssignOp::Conditional => Var::Recursive { value: rhs.clone(), origin: Origin::File },
            AssignOp::Simple => {
                let bytes = self.expand_value(rhs)?;
                Var::Simple { value: bytes, origin: Origin::File }
            }
            AssignOp::Shell => {
                let cmd = self.expand_value(rhs)?;
                let out = self.run_shell_text(&cmd, loc)?;
                Var::Simple { value: out, origin: Origin::File }
            }
            AssignOp::Append => {
                let existing = self.state.rule_vars.get(&target).and_then(|m| m.get(&var_sym)).map(|rv| rv.var.clone());
                match existing {
                    Some(v) => self.append_var(v, rhs, Origin::File)?,
                    None => self.append_var(Var::Undefined, rhs, Origin::File)?,
                }
            }
        };
        let map = self.state.rule_vars.entry(target).or_insert_with(IndexMap::new);
        map.insert(var_sym, RuleVar { var: new_var, op });
        Ok(())
    }

    // =========================================================================
    // Rules
    // =========================================================================

    fn eval_rule(&mut self, expr: &Value, terminator: RuleTerminator, after_terminator: Option<&Value>, loc: &Loc) -> Result<(), MakeError> {
        match terminator {
            RuleTerminator::None => {
                // A line with no `:`/`=` at all is normally a syntax error, but it's
                // also what a standalone `$(eval ...)`, `$(info ...)`, `$(warning ...)`,
                // or `$(call macro)` line looks like before expansion. Expand first and
                // only fault if the result isn't blank, matching make's treatment of a
                // line that expands to nothing as a no-op.
                let expanded = self.expand_value(expr)?;
                if trim(&expanded).is_empty() {
                    Ok(())
                } else {
                    Err(EvalError::new("missing separator", loc.clone()).into())
                }
            }
            RuleTerminator::Equals => {
                let lhs_bytes = self.expand_value(expr)?;
                let targets = split_words_symbols(&lhs_bytes, &self.state.symtab);
                let raw = after_terminator.expect("Equals-terminated rule always carries after_terminator");
                let raw_bytes = self.expand_value(raw)?;
                let (lhs_expr, rhs_expr, _raw_rhs, op) = parser::parse_target_specific_assignment(&raw_bytes)
                    .ok_or_else(|| EvalError::new("invalid target-specific variable assignment", loc.clone()))?;
                let var_name_bytes = self.expand_value(&lhs_expr)?;
                let var_sym = self.state.symtab.intern(&var_name_bytes);
                for t in targets {
                    self.apply_rule_var(t, var_sym, op, &rhs_expr, loc)?;
                }
                Ok(())
            }
            RuleTerminator::Colon | RuleTerminator::DoubleColon => {
                let lhs_bytes = self.expand_value(expr)?;
                let outputs = split_words_symbols(&lhs_bytes, &self.state.symtab);
                let after_bytes = match after_terminator {
                    Some(v) => self.expand_value(v)?,
                    None => Vec::new(),
                };
                // A second top-level `:` in the (single-colon) RHS marks a
                // static pattern rule: `targets: target-pattern: prereqs`
                // (spec.md §4.4 "Rule" — "recognize ... a static-pattern
                // rule").
                let (output_patterns, prereq_bytes) = if matches!(terminator, RuleTerminator::Colon) {
                    match find_byte(&after_bytes, b':') {
                        Some(i) => (split_words_symbols(&after_bytes[..i], &self.state.symtab), after_bytes[i + 1..].to_vec()),
                        None => (Vec::new(), after_bytes),
                    }
                } else {
                    (Vec::new(), after_bytes)
                };
                let (normal_bytes, order_only_bytes) = split_on_pipe(&prereq_bytes);
                let inputs = split_words_symbols(&normal_bytes, &self.state.symtab);
                let order_only_inputs = split_words_symbols(&order_only_bytes, &self.state.symtab);
                if self.state.default_target.is_none() && output_patterns.is_empty() {
                    if let Some(&first) = outputs.iter().find(|&&o| !is_special_target(&self.state.symtab, o)) {
                        self.state.default_target = Some(first);
                    }
                }
                let rule = Rule {
                    outputs,
                    output_patterns,
                    inputs,
                    order_only_inputs,
                    commands: Vec::new(),
                    is_double_colon: matches!(terminator, RuleTerminator::DoubleColon),
                    loc: loc.clone(),
                };
                self.state.rules.push(rule);
                self.pending_rule_idx = Some(self.state.rules.len() - 1);
                Ok(())
            }
        }
    }

    // =========================================================================
    // Conditionals
    // =========================================================================

    fn eval_condition(&mut self, op: IfOp, lhs: &Value, rhs: Option<&Value>) -> Result<bool, MakeError> {
        match op {
            IfOp::Ifeq | IfOp::Ifneq => {
                let a = self.expand_value(lhs)?;
                let b = match rhs {
                    Some(r) => self.expand_value(r)?,
                    None => Vec::new(),
                };
                let eq = a == b;
                Ok(if matches!(op, IfOp::Ifeq) { eq } else { !eq })
            }
            IfOp::Ifdef | IfOp::Ifndef => {
                let name_bytes = self.expand_value(lhs)?;
                let sym = self.state.symtab.intern(trim(&name_bytes));
                let defined = self.state.vars.lookup(sym).defined();
                Ok(if matches!(op, IfOp::Ifdef) { defined } else { !defined })
            }
        }
    }

    // =========================================================================
    // Include / export / vpath
    // =========================================================================

    fn eval_include(&mut self, expr: &Value, optional: bool, loc: &Loc) -> Result<(), MakeError> {
        let path_bytes = self.expand_value(expr)?;
        for path in functions::split_words(&path_bytes) {
            let path_str = String::from_utf8_lossy(path).into_owned();
            let (found_path, read_result) = self.locate_include(&path_str);
            match read_result {
                Ok(content) => {
                    self.state.includes.push(IncludeRecord { path: found_path.clone(), content_hash: simple_hash(&content) });
                    if self.include_depth >= self.state.limits.max_include_depth {
                        return Err(EvalError::new("max include depth exceeded", loc.clone()).into());
                    }
                    let nested = parser::parse_statements(&content, &found_path);
                    self.include_depth += 1;
                    let res = self.eval_statements(&nested);
                    self.include_depth -= 1;
                    res?;
                }
                Err(e) => {
                    if !optional {
                        return Err(SystemError::new(format!("{path_str}: No such file or directory"), e).into());
                    }
                }
            }
        }
        Ok(())
    }

    /// Locate an `include` path the way spec.md §4.4 "Include" describes:
    /// the path as given, then each `VPATH` directory, then each directory
    /// of a `vpath` entry whose pattern matches the path. Returns the path
    /// actually read (for `IncludeRecord`) alongside the read result.
    fn locate_include(&self, path: &str) -> (String, std::io::Result<Vec<u8>>) {
        let direct = self.io.read_file(path);
        if direct.is_ok() {
            return (path.to_string(), direct);
        }
        let path_bytes = path.as_bytes();
        for dir in self.vpath_variable_dirs() {
            let candidate = join_dir(&dir, path_bytes);
            let candidate_str = String::from_utf8_lossy(&candidate).into_owned();
            let result = self.io.read_file(&candidate_str);
            if result.is_ok() {
                return (candidate_str, result);
            }
        }
        for (pattern, dirs) in &self.state.vpath {
            if functions::pattern_match(pattern, path_bytes).is_some() {
                for dir in dirs {
                    let candidate = join_dir(dir, path_bytes);
                    let candidate_str = String::from_utf8_lossy(&candidate).into_owned();
                    let result = self.io.read_file(&candidate_str);
                    if result.is_ok() {
                        return (candidate_str, result);
                    }
                }
            }
        }
        (path.to_string(), direct)
    }

    /// The `VPATH` variable's value, colon-separated (spec.md §4.4 "Include"
    /// — "searching VPATH / vpath"; GNU make separates `VPATH` entries by
    /// `:` rather than whitespace).
    fn vpath_variable_dirs(&self) -> Vec<Vec<u8>> {
        let sym = self.state.symtab.intern(b"VPATH");
        let raw = self.state.vars.lookup(sym).raw_text();
        raw.split(|&b| b == b':').filter(|s| !s.is_empty()).map(|s| s.to_vec()).collect()
    }

    fn eval_export(&mut self, expr: Option<&Value>, is_export: bool) -> Result<(), MakeError> {
        match expr {
            None => {
                self.state.export_all = is_export;
                if !is_export {
                    self.state.export_set.clear();
                }
            }
            Some(e) => {
                let bytes = self.expand_value(e)?;
                for w in functions::split_words(&bytes) {
                    let sym = self.state.symtab.intern(w);
                    if is_export {
                        self.state.export_set.insert(sym);
                    } else {
                        self.state.export_set.remove(&sym);
                    }
                }
            }
        }
        Ok(())
    }

    fn eval_vpath(&mut self, pattern: Option<&Value>, dirs: Option<&Value>) -> Result<(), MakeError> {
        match pattern {
            None => self.state.vpath.clear(),
            Some(p) => {
                let pat_bytes = self.expand_value(p)?;
                match dirs {
                    None => self.state.vpath.retain(|(pp, _)| pp != &pat_bytes),
                    Some(d) => {
                        let dirs_bytes = self.expand_value(d)?;
                        let list: Vec<Vec<u8>> = functions::split_words(&dirs_bytes).into_iter().map(|w| w.to_vec()).collect();
                        self.state.vpath.push((pat_bytes, list));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Join a `VPATH`/`vpath` directory with a relative path, mirroring
/// `Path::join`'s semantics without requiring a UTF-8 round trip.
fn join_dir(dir: &[u8], path: &[u8]) -> Vec<u8> {
    let mut out = dir.to_vec();
    if !out.ends_with(b"/") {
        out.push(b'/');
    }
    out.extend_from_slice(path);
    out
}

fn split_words_symbols(bytes: &[u8], symtab: &SymbolTable) -> Vec<Symbol> {
    functions::split_words(bytes).into_iter().map(|w| symtab.intern(w)).collect()
}

/// A rule output that can never itself be "the first explicit non-pattern
/// target" (spec.md §6): a `%`-pattern, or one of the dot-prefixed special
/// targets `depgraph::builder` also treats as non-buildable (spec.md §4.5
/// Phase A).
fn is_special_target(symtab: &SymbolTable, sym: Symbol) -> bool {
    let name = symtab.name_of(sym);
    name.contains(&b'%') || crate::depgraph::builder::SPECIAL_TARGETS.contains(&symtab.name_str(sym).as_str())
}

fn find_byte(s: &[u8], b: u8) -> Option<usize> {
    s.iter().position(|&c| c == b)
}

fn split_on_pipe(s: &[u8]) -> (Vec<u8>, Vec<u8>) {
    match find_byte(s, b'|') {
        Some(i) => (s[..i].to_vec(), s[i + 1..].to_vec()),
        None => (s.to_vec(), Vec::new()),
    }
}

fn trim(b: &[u8]) -> &[u8] {
    let start = b.iter().position(|c| !c.is_ascii_whitespace()).unwrap_or(b.len());
    let end = b.iter().rposition(|c| !c.is_ascii_whitespace()).map(|i| i + 1).unwrap_or(start);
    &b[start..end]
}

fn simple_hash(bytes: &[u8]) -> u64 {
    let mut h = DefaultHasher::new();
    bytes.hash(&mut h);
    h.finish()
}

/// GNU make's `$(shell)` post-processing: drop one trailing newline, fold
/// any embedded newlines to spaces.
fn normalize_shell_output(raw: &[u8]) -> Vec<u8> {
    let mut s = raw.to_vec();
    if s.last() == Some(&b'\n') {
        s.pop();
    }
    for b in s.iter_mut() {
        if *b == b'\n' {
            *b = b' ';
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FakeIo {
        files: HashMap<String, Vec<u8>>,
        shell_output: Vec<u8>,
    }

    impl FakeIo {
        fn new() -> Self {
            Self { files: HashMap::new(), shell_output: b"hi there\n".to_vec() }
        }
    }

    impl MakeIo for FakeIo {
        fn read_file(&self, path: &str) -> std::io::Result<Vec<u8>> {
            self.files
                .get(path)
                .cloned()
                .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"))
        }

        fn file_exists(&self, path: &str) -> bool {
            self.files.contains_key(path)
        }

        fn run_shell(&self, _cmd: &str) -> std::io::Result<Vec<u8>> {
            Ok(self.shell_output.clone())
        }
    }

    fn run(src: &[u8]) -> Evaluator<'static> {
        // Leaked on purpose: test-only, keeps the IO trait object's lifetime
        // simple for a function that returns the Evaluator by value.
        let io: &'static FakeIo = Box::leak(Box::new(FakeIo::new()));
        let symtab = SymbolTable::new();
        let mut ev = Evaluator::new(symtab, io);
        let stmts = parser::parse_statements(src, "Makefile");
        ev.eval_statements(&stmts).expect("evaluation should succeed");
        ev
    }

    #[test]
    fn simple_assignment_expands_eagerly() {
        let mut ev = run(b"X := a\nY := $(X)b\nX := z\n");
        let sym = ev.state.symtab.intern_str("Y");
        assert_eq!(ev.state.vars.global_var(sym).raw_text(), b"ab");
    }

    #[test]
    fn recursive_assignment_expands_lazily() {
        let mut ev = run(b"A := 1\nB = $(A)\nA := 2\n");
        let sym = ev.state.symtab.intern_str("B");
        let value = ev.state.vars.global_var(sym).clone();
        let bytes = match value {
            Var::Recursive { value, .. } => ev.expand_value(&value).unwrap(),
            other => panic!("expected Recursive, got {other:?}"),
        };
        assert_eq!(bytes, b"2");
    }

    #[test]
    fn append_to_undefined_behaves_like_recursive_assign() {
        let mut ev = run(b"X += a\n");
        let sym = ev.state.symtab.intern_str("X");
        assert_eq!(ev.state.vars.global_var(sym).flavor(), crate::eval::types::Flavor::Recursive);
    }

    #[test]
    fn conditional_assign_skips_when_already_defined() {
        let ev = run(b"X := first\nX ?= second\n");
        let sym = ev.state.symtab.intern_str("X");
        assert_eq!(ev.state.vars.global_var(sym).raw_text(), b"first");
    }

    #[test]
    fn ifeq_selects_then_branch() {
        let ev = run(b"A := x\nifeq ($(A),x)\nB := yes\nelse\nB := no\nendif\n");
        let sym = ev.state.symtab.intern_str("B");
        assert_eq!(ev.state.vars.global_var(sym).raw_text(), b"yes");
    }

    #[test]
    fn ifdef_is_true_for_empty_but_defined_variable() {
        let ev = run(b"A :=\nifdef A\nB := defined\nelse\nB := undefined\nendif\n");
        let sym = ev.state.symtab.intern_str("B");
        assert_eq!(ev.state.vars.global_var(sym).raw_text(), b"defined");
    }

    #[test]
    fn patsubst_function_call_dispatches() {
        let ev = run(b"SRCS := a.c b.c\nOBJS := $(patsubst %.c,%.o,$(SRCS))\n");
        let sym = ev.state.symtab.intern_str("OBJS");
        assert_eq!(ev.state.vars.global_var(sym).raw_text(), b"a.o b.o");
    }

    #[test]
    fn foreach_binds_loop_variable_per_word() {
        let ev = run(b"LIST := a b c\nOUT := $(foreach x,$(LIST),[$(x)])\n");
        let sym = ev.state.symtab.intern_str("OUT");
        assert_eq!(ev.state.vars.global_var(sym).raw_text(), b"[a] [b] [c]");
    }

    #[test]
    fn call_binds_numbered_parameters() {
        let ev = run(b"define double\n$(1) $(1)\nendef\nOUT := $(call double,x)\n");
        let sym = ev.state.symtab.intern_str("OUT");
        assert_eq!(ev.state.vars.global_var(sym).raw_text(), b"x x");
    }

    #[test]
    fn shell_function_runs_through_make_io() {
        let ev = run(b"OUT := $(shell echo hi there)\n");
        let sym = ev.state.symtab.intern_str("OUT");
        assert_eq!(ev.state.vars.global_var(sym).raw_text(), b"hi there");
    }

    #[test]
    fn shell_is_deferred_under_avoid_io() {
        let io = FakeIo::new();
        let symtab = SymbolTable::new();
        let mut ev = Evaluator::new(symtab, &io);
        ev.state.avoid_io = true;
        let stmts = parser::parse_statements(b"OUT := $(shell echo hi)\n", "Makefile");
        ev.eval_statements(&stmts).unwrap();
        assert_eq!(ev.state.deferred.len(), 1);
        assert_eq!(ev.state.deferred[0].kind, "shell");
    }

    #[test]
    fn rule_collects_outputs_inputs_and_inline_command() {
        let ev = run(b"all: main.o ; @echo done\n");
        assert_eq!(ev.state.rules.len(), 1);
        let rule = &ev.state.rules[0];
        assert_eq!(ev.state.symtab.name_str(rule.outputs[0]), "all");
        assert_eq!(ev.state.symtab.name_str(rule.inputs[0]), "main.o");
        assert_eq!(rule.commands.len(), 1);
    }

    #[test]
    fn static_pattern_rule_splits_target_pattern_from_prereq_pattern() {
        let ev = run(b"foo.o: %.o: %.c\n\t$(CC) -c $< -o $@\n");
        let rule = &ev.state.rules[0];
        assert_eq!(rule.output_patterns.len(), 1);
        assert_eq!(ev.state.symtab.name_str(rule.output_patterns[0]), "%.o");
        assert_eq!(ev.state.symtab.name_str(rule.inputs[0]), "%.c");
    }

    #[test]
    fn double_colon_rule_is_flagged() {
        let ev = run(b"all:: a.c\n\t@echo a\n");
        assert!(ev.state.rules[0].is_double_colon);
    }

    #[test]
    fn order_only_prerequisites_are_split_on_pipe() {
        let ev = run(b"out: in.c | builddir\n");
        let rule = &ev.state.rules[0];
        assert_eq!(ev.state.symtab.name_str(rule.inputs[0]), "in.c");
        assert_eq!(ev.state.symtab.name_str(rule.order_only_inputs[0]), "builddir");
    }

    #[test]
    fn target_specific_variable_binds_into_rule_vars() {
        let ev = run(b"foo: CFLAGS := -O2\n");
        let target = ev.state.symtab.intern_str("foo");
        let var_sym = ev.state.symtab.intern_str("CFLAGS");
        let rv = ev.state.rule_vars.get(&target).and_then(|m| m.get(&var_sym)).unwrap();
        assert_eq!(rv.var.raw_text(), b"-O2");
    }

    #[test]
    fn export_directive_adds_to_export_set() {
        let ev = run(b"export CC\n");
        let sym = ev.state.symtab.intern_str("CC");
        assert!(ev.state.export_set.contains(&sym));
    }

    #[test]
    fn include_reads_through_make_io() {
        let mut io = FakeIo::new();
        io.files.insert("extra.mk".to_string(), b"FOO := bar\n".to_vec());
        let symtab = SymbolTable::new();
        let mut ev = Evaluator::new(symtab, &io);
        let stmts = parser::parse_statements(b"include extra.mk\n", "Makefile");
        ev.eval_statements(&stmts).unwrap();
        let sym = ev.state.symtab.intern_str("FOO");
        assert_eq!(ev.state.vars.global_var(sym).raw_text(), b"bar");
    }

    #[test]
    fn optional_include_of_missing_file_is_not_an_error() {
        let io = FakeIo::new();
        let symtab = SymbolTable::new();
        let mut ev = Evaluator::new(symtab, &io);
        let stmts = parser::parse_statements(b"-include missing.mk\n", "Makefile");
        assert!(ev.eval_statements(&stmts).is_ok());
    }
}
