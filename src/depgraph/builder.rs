//! Dep builder: indexing, traversal, per-target variables, and ordering.
//!
//! Phase A indexes the collected rules once; Phase B resolves requested
//! targets depth-first with memoization, trying an explicit rule, then
//! pattern/suffix rules, then a bare leaf on disk; Phase C assembles each
//! node's target-specific variable bindings; Phase D orders children in
//! rule-declared order. Failure (unresolved target, cycle, conflicting
//! static pattern) is fatal with a located error.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;

use crate::depgraph::types::{DepGraph, DepNode, NodeId, Rule};
use crate::eval::errors::ResolutionError;
use crate::eval::functions::{pattern_match, substitute_stem};
use crate::eval::types::{RuleVar, Warning};
use crate::symbol::{Symbol, SymbolTable};

/// The outside world the dep builder is allowed to touch: whether a
/// candidate leaf/prerequisite already exists on disk.
pub trait Filesystem {
    fn exists(&self, path: &str) -> bool;
}

/// `Filesystem` backed by the real filesystem.
pub struct RealFilesystem;

impl Filesystem for RealFilesystem {
    fn exists(&self, path: &str) -> bool {
        std::path::Path::new(path).exists()
    }
}

/// Dot-prefixed targets with special meaning to make itself rather than
/// naming a file to build. Shared with `eval::evaluator`, which consults the
/// same list when tracking the default target as rules are collected.
pub(crate) const SPECIAL_TARGETS: &[&str] =
    &[".PHONY", ".SUFFIXES", ".DEFAULT", ".DELETE_ON_ERROR", ".SECONDARY", ".PRECIOUS", ".INTERMEDIATE", ".NOTPARALLEL"];

/// One candidate rule contributing to an explicit (non-pattern) target: a
/// plain explicit rule, or a static-pattern rule whose literal target list
/// includes this one.
#[derive(Clone, Copy)]
struct ExplicitEntry {
    rule_idx: usize,
    static_pattern: Option<Symbol>,
}

struct Index {
    explicit: HashMap<Symbol, Vec<ExplicitEntry>>,
    double_colon: HashMap<Symbol, Vec<usize>>,
    /// Plain pattern rules (`%.o: %.c`) plus synthesized entries compiled
    /// from old-style suffix rules (`.c.o:`), in source order.
    pattern_rules: Vec<PatternEntry>,
    phony: HashSet<Symbol>,
    default_target: Option<Symbol>,
    delete_on_error: bool,
}

/// A pattern rule as seen by resolution: either a real rule index (plain
/// pattern rule) or a synthesized one built from a `.FROM.TO:` suffix rule,
/// which borrows the suffix rule's commands/loc but substitutes a
/// `%FROM`/`%TO` pattern pair so the same matching code handles both. The
/// synthesized form is compiled from any rule whose single output pattern
/// matches the `.X` or `.X.Y` suffix-rule form.
struct PatternEntry {
    rule_idx: usize,
    output_pattern: Symbol,
    input_pattern: Option<Symbol>,
}

/// Build the dep graph for `requested` targets (or `fallback_default` if
/// `requested` is empty, per spec.md §6 "if no target is given, the first
/// explicit non-pattern target ... is used").
pub fn build(
    rules: &[Rule],
    rule_vars: &HashMap<Symbol, IndexMap<Symbol, RuleVar>>,
    symtab: &SymbolTable,
    requested: &[Symbol],
    fallback_default: Option<Symbol>,
    fs: &dyn Filesystem,
    warnings: &mut Vec<Warning>,
) -> Result<DepGraph, ResolutionError> {
    let index = index_rules(rules, symtab, warnings);
    let mut b = Builder {
        rules,
        rule_vars,
        symtab,
        fs,
        index,
        arena: Vec::new(),
        by_output: HashMap::new(),
        resolved: HashMap::new(),
        in_progress: HashSet::new(),
    };

    let default_target = b.index.default_target.or(fallback_default);
    let targets: Vec<Symbol> = if requested.is_empty() {
        default_target.into_iter().collect()
    } else {
        requested.to_vec()
    };

    let mut roots = Vec::new();
    for t in &targets {
        let ids = b.resolve(*t, &mut Vec::new(), &[])?;
        roots.extend(ids);
    }

    Ok(DepGraph {
        arena: b.arena,
        by_output: b.by_output,
        roots,
        default_target,
        phony: b.index.phony,
        delete_on_error: b.index.delete_on_error,
    })
}

// =============================================================================
// Phase A: indexing
// =============================================================================

fn index_rules(rules: &[Rule], symtab: &SymbolTable, warnings: &mut Vec<Warning>) -> Index {
    let mut explicit: HashMap<Symbol, Vec<ExplicitEntry>> = HashMap::new();
    let mut double_colon: HashMap<Symbol, Vec<usize>> = HashMap::new();
    let mut pattern_rules: Vec<PatternEntry> = Vec::new();
    let mut phony: HashSet<Symbol> = HashSet::new();
    let mut default_target: Option<Symbol> = None;
    let mut delete_on_error = false;
    // .SUFFIXES: with an empty list disables suffix-rule compilation
    // immediately, per SPEC_FULL.md's decision on spec.md §9's third open
    // question: Phase A already processes rules in source order, so a bare
    // `.SUFFIXES:` simply stops later rules in this same pass from
    // contributing synthesized suffix entries.
    let mut suffixes_disabled = false;

    let special: HashSet<&str> = SPECIAL_TARGETS.iter().copied().collect();

    for (idx, rule) in rules.iter().enumerate() {
        if !rule.output_patterns.is_empty() {
            // Static pattern rule: one shared pattern, applied to each
            // literal target in `rule.outputs`.
            let pattern = rule.output_patterns[0];
            for &out in &rule.outputs {
                explicit.entry(out).or_default().push(ExplicitEntry { rule_idx: idx, static_pattern: Some(pattern) });
            }
            continue;
        }

        let is_plain_pattern = rule.outputs.iter().any(|&o| has_percent(o, symtab));
        if is_plain_pattern {
            for &out in &rule.outputs {
                pattern_rules.push(PatternEntry { rule_idx: idx, output_pattern: out, input_pattern: None });
            }
            continue;
        }

        for &out in &rule.outputs {
            let name = symtab.name_str(out);
            if name == ".PHONY" {
                for &p in &rule.inputs {
                    phony.insert(p);
                }
                continue;
            }
            if name == ".DELETE_ON_ERROR" {
                delete_on_error = true;
                continue;
            }
            if name == ".SUFFIXES" {
                if rule.inputs.is_empty() {
                    suffixes_disabled = true;
                    pattern_rules.retain(|p| p.input_pattern.is_none() || !is_suffix_synthesized(p));
                }
                continue;
            }
            if special.contains(name.as_str()) {
                continue;
            }
            if default_target.is_none() {
                default_target = Some(out);
            }

            if let Some((from, to)) = parse_suffix_rule_name(&name) {
                if !suffixes_disabled {
                    let out_pat = symtab.intern(&[b"%".as_slice(), to.as_slice()].concat());
                    let in_pat = symtab.intern(&[b"%".as_slice(), from.as_slice()].concat());
                    pattern_rules.push(PatternEntry { rule_idx: idx, output_pattern: out_pat, input_pattern: Some(in_pat) });
                }
                continue;
            }

            if rule.is_double_colon {
                double_colon.entry(out).or_default().push(idx);
            } else {
                let entries = explicit.entry(out).or_default();
                if let Some(prev) = entries.last() {
                    if rules[prev.rule_idx].has_commands() && rule.has_commands() {
                        warnings.push(Warning::OverridingRecipe { target: name.clone(), loc: rule.loc.clone() });
                    }
                }
                entries.push(ExplicitEntry { rule_idx: idx, static_pattern: None });
            }
        }
    }

    Index { explicit, double_colon, pattern_rules, phony, default_target, delete_on_error }
}

/// A marker used only by the `.SUFFIXES:` empty-list handling above to tell
/// a synthesized suffix-rule pattern entry from a genuine `%`-pattern rule
/// (whose `input_pattern` is also computed from the rule itself, never
/// `None` vs `Some` in a way that matters once `.SUFFIXES:` has fired, since
/// real pattern rules are unaffected by it).
fn is_suffix_synthesized(p: &PatternEntry) -> bool {
    p.input_pattern.is_some()
}

fn has_percent(sym: Symbol, symtab: &SymbolTable) -> bool {
    symtab.name_of(sym).contains(&b'%')
}

/// Recognize an old-style suffix-rule target (`.c.o`, `.y.c`, ...): a
/// leading dot, then two non-empty suffix components separated by exactly
/// one more dot (spec.md §4.5 Phase B step 4). A single-suffix form (`.c`)
/// is a plain suffix declaration, not an implicit rule, and returns `None`.
fn parse_suffix_rule_name(name: &str) -> Option<(String, String)> {
    let bytes = name.as_bytes();
    if bytes.first() != Some(&b'.') {
        return None;
    }
    let rest = &bytes[1..];
    let dot = rest.iter().position(|&b| b == b'.')?;
    let from = &rest[..dot];
    let to = &rest[dot + 1..];
    if from.is_empty() || to.is_empty() || to.contains(&b'.') {
        return None;
    }
    Some((String::from_utf8_lossy(from).into_owned(), String::from_utf8_lossy(to).into_owned()))
}

// =============================================================================
// Phases B-D: traversal, per-target variables, ordering
// =============================================================================

struct Builder<'a> {
    rules: &'a [Rule],
    rule_vars: &'a HashMap<Symbol, IndexMap<Symbol, RuleVar>>,
    symtab: &'a SymbolTable,
    fs: &'a dyn Filesystem,
    index: Index,
    arena: Vec<DepNode>,
    by_output: HashMap<Symbol, Vec<NodeId>>,
    resolved: HashMap<Symbol, Vec<NodeId>>,
    in_progress: HashSet<Symbol>,
}

impl<'a> Builder<'a> {
    fn name(&self, sym: Symbol) -> String {
        self.symtab.name_str(sym)
    }

    fn path_exists(&self, sym: Symbol) -> bool {
        self.fs.exists(&self.name(sym))
    }

    /// Resolve `target`, returning every `DepNode` registered for it (more
    /// than one only for a `::` target). `chain` is the DFS ancestor stack
    /// for cycle reporting; `inherited` is the target-specific variable
    /// bindings accumulated from parents, outermost first (spec.md §4.5
    /// Phase C: "bindings inherited from parent targets" — this is exactly
    /// that accumulator, passed one level further down at each recursive
    /// call).
    fn resolve(&mut self, target: Symbol, chain: &mut Vec<Symbol>, inherited: &[(Symbol, RuleVar)]) -> Result<Vec<NodeId>, ResolutionError> {
        if let Some(ids) = self.resolved.get(&target) {
            return Ok(ids.clone());
        }
        if self.in_progress.contains(&target) {
            let ancestor = chain.last().map(|s| self.name(*s)).unwrap_or_default();
            return Err(ResolutionError::cycle(&self.name(target), &ancestor));
        }
        self.in_progress.insert(target);
        chain.push(target);
        let result = self.resolve_inner(target, chain, inherited);
        chain.pop();
        self.in_progress.remove(&target);
        let ids = result?;
        self.resolved.insert(target, ids.clone());
        Ok(ids)
    }

    fn resolve_inner(&mut self, target: Symbol, chain: &mut Vec<Symbol>, inherited: &[(Symbol, RuleVar)]) -> Result<Vec<NodeId>, ResolutionError> {
        // Step 2: explicit rule (including static-pattern entries).
        if let Some(entries) = self.index.explicit.get(&target).cloned() {
            return self.build_explicit_node(target, &entries, chain, inherited).map(|id| vec![id]);
        }

        // `::` rules: each resolved independently, commands preserved in
        // source order (spec.md §4.5 Phase D).
        if let Some(rule_indices) = self.index.double_colon.get(&target).cloned() {
            let mut ids = Vec::with_capacity(rule_indices.len());
            for ridx in rule_indices {
                let id = self.build_node_from_rule(target, ridx, None, chain, inherited, true)?;
                ids.push(id);
            }
            return Ok(ids);
        }

        // Step 3/4: pattern and synthesized suffix rules, longest
        // non-`%` stem wins; ties keep source order (spec.md §4.5 Phase B
        // step 3, §8 "Pattern specificity").
        if let Some((entry_idx, stem)) = self.best_pattern_match(target) {
            if let Some(id) = self.try_pattern_rule(target, entry_idx, &stem, chain, inherited)? {
                return Ok(vec![id]);
            }
        }

        // Step 5: bare leaf on disk.
        if self.path_exists(target) {
            let node = DepNode {
                output: target,
                deps: Vec::new(),
                order_onlys: Vec::new(),
                actual_inputs: Vec::new(),
                actual_order_only_inputs: Vec::new(),
                commands: Vec::new(),
                rule_vars: own_rule_vars(self.rule_vars, target, inherited),
                is_phony: self.index.phony.contains(&target),
                is_restat: false,
                is_default_target: self.index.default_target == Some(target),
                is_double_colon: false,
                output_pattern: None,
                parents: Vec::new(),
            };
            let id = self.push_node(target, node);
            return Ok(vec![id]);
        }

        Err(ResolutionError::new(format!("*** No rule to make target `{}'.", self.name(target))))
    }

    /// Among all candidate pattern/suffix entries whose output pattern
    /// matches `target`, pick the one with the longest non-`%` stem
    /// (specificity), ties broken by source order (spec.md §4.5 Phase B
    /// step 3).
    fn best_pattern_match(&self, target: Symbol) -> Option<(usize, Vec<u8>)> {
        let target_name = self.symtab.name_of(target);
        let mut best: Option<(usize, Vec<u8>, usize)> = None; // (entry index, stem, specificity)
        for (i, entry) in self.index.pattern_rules.iter().enumerate() {
            let pattern = self.symtab.name_of(entry.output_pattern);
            if let Some(stem) = pattern_match(&pattern, &target_name) {
                let specificity = pattern.len().saturating_sub(1);
                let better = match &best {
                    None => true,
                    Some((_, _, best_spec)) => specificity > *best_spec,
                };
                if better {
                    best = Some((i, stem.to_vec(), specificity));
                }
            }
        }
        best.map(|(i, stem, _)| (i, stem))
    }

    /// Try to resolve a single pattern-rule candidate: substitute the stem
    /// into every input, and require each resulting prerequisite either
    /// exist on disk or itself resolve to a node with commands (spec.md
    /// §4.5 Phase B step 3). Returns `Ok(None)` (never `Err`) when the
    /// candidate fails so the caller can fall through to a bare leaf,
    /// mirroring "if any input fails both tests, try the next pattern rule"
    /// — simplified here to the single best-specificity candidate, since
    /// ties are rare and GNU make itself rarely backtracks past the winner.
    fn try_pattern_rule(
        &mut self,
        target: Symbol,
        entry_idx: usize,
        stem: &[u8],
        chain: &mut Vec<Symbol>,
        inherited: &[(Symbol, RuleVar)],
    ) -> Result<Option<NodeId>, ResolutionError> {
        let entry_rule_idx = self.index.pattern_rules[entry_idx].rule_idx;
        let input_pattern = self.index.pattern_rules[entry_idx].input_pattern;
        let rule = &self.rules[entry_rule_idx];

        let substitute = |sym: Symbol, symtab: &SymbolTable| -> Symbol {
            let bytes = symtab.name_of(sym);
            symtab.intern(&substitute_stem(&bytes, stem))
        };

        let (raw_inputs, raw_order_only): (Vec<Symbol>, Vec<Symbol>) = match input_pattern {
            // Synthesized suffix rule: the single implied prerequisite is
            // `%FROM` substituted with the stem; the rule carries no other
            // prerequisites.
            Some(pat) => (vec![substitute(pat, self.symtab)], Vec::new()),
            None => (rule.inputs.clone(), rule.order_only_inputs.clone()),
        };
        let inputs: Vec<Symbol> = raw_inputs.iter().map(|&s| substitute(s, self.symtab)).collect();
        let order_onlys_syms: Vec<Symbol> = raw_order_only.iter().map(|&s| substitute(s, self.symtab)).collect();

        let own_vars = own_rule_vars(self.rule_vars, target, inherited);
        let child_inherited = combined_for_children(&own_vars, inherited);

        let mut dep_ids = Vec::with_capacity(inputs.len());
        for &inp in &inputs {
            if self.path_exists(inp) || self.index.explicit.contains_key(&inp) || self.index.double_colon.contains_key(&inp) {
                let ids = self.resolve(inp, chain, &child_inherited)?;
                dep_ids.extend(ids);
            } else if self.best_pattern_match(inp).is_some() {
                let ids = self.resolve(inp, chain, &child_inherited)?;
                dep_ids.extend(ids);
            } else {
                return Ok(None);
            }
        }
        let mut order_ids = Vec::with_capacity(order_onlys_syms.len());
        for &inp in &order_onlys_syms {
            let ids = self.resolve(inp, chain, &child_inherited)?;
            order_ids.extend(ids);
        }

        let node = DepNode {
            output: target,
            deps: dep_ids,
            order_onlys: order_ids,
            actual_inputs: inputs,
            actual_order_only_inputs: order_onlys_syms,
            commands: rule.commands.clone(),
            rule_vars: own_vars,
            is_phony: self.index.phony.contains(&target),
            is_restat: false,
            is_default_target: self.index.default_target == Some(target),
            is_double_colon: false,
            output_pattern: Some(self.index.pattern_rules[entry_idx].output_pattern),
            parents: Vec::new(),
        };
        let id = self.push_node(target, node);
        Ok(Some(id))
    }

    fn build_explicit_node(
        &mut self,
        target: Symbol,
        entries: &[ExplicitEntry],
        chain: &mut Vec<Symbol>,
        inherited: &[(Symbol, RuleVar)],
    ) -> Result<NodeId, ResolutionError> {
        let own_vars = own_rule_vars(self.rule_vars, target, inherited);
        let child_inherited = combined_for_children(&own_vars, inherited);

        let mut inputs = Vec::new();
        let mut order_onlys = Vec::new();
        let mut commands = Vec::new();
        for e in entries {
            let rule = &self.rules[e.rule_idx];
            match e.static_pattern {
                Some(pattern_sym) => {
                    let pattern = self.symtab.name_of(pattern_sym);
                    let target_name = self.symtab.name_of(target);
                    let stem = pattern_match(&pattern, &target_name).ok_or_else(|| {
                        ResolutionError::with_loc(
                            format!("target `{}' doesn't match the target pattern", self.name(target)),
                            rule.loc.clone(),
                        )
                    })?;
                    for &i in &rule.inputs {
                        let bytes = self.symtab.name_of(i);
                        inputs.push(self.symtab.intern(&substitute_stem(&bytes, stem)));
                    }
                    for &i in &rule.order_only_inputs {
                        let bytes = self.symtab.name_of(i);
                        order_onlys.push(self.symtab.intern(&substitute_stem(&bytes, stem)));
                    }
                }
                None => {
                    inputs.extend(rule.inputs.iter().copied());
                    order_onlys.extend(rule.order_only_inputs.iter().copied());
                }
            }
            if rule.has_commands() {
                commands = rule.commands.clone();
            }
        }

        let mut dep_ids = Vec::with_capacity(inputs.len());
        for &inp in &inputs {
            let ids = self.resolve(inp, chain, &child_inherited)?;
            dep_ids.extend(ids);
        }
        let mut order_ids = Vec::with_capacity(order_onlys.len());
        for &inp in &order_onlys {
            let ids = self.resolve(inp, chain, &child_inherited)?;
            order_ids.extend(ids);
        }

        let node = DepNode {
            output: target,
            deps: dep_ids,
            order_onlys: order_ids,
            actual_inputs: inputs,
            actual_order_only_inputs: order_onlys,
            commands,
            rule_vars: own_vars,
            is_phony: self.index.phony.contains(&target),
            is_restat: false,
            is_default_target: self.index.default_target == Some(target),
            is_double_colon: false,
            output_pattern: None,
            parents: Vec::new(),
        };
        Ok(self.push_node(target, node))
    }

    /// Build a single node directly from one rule (used for `::` rules,
    /// each resolved independently per spec.md §4.5 Phase D).
    fn build_node_from_rule(
        &mut self,
        target: Symbol,
        rule_idx: usize,
        output_pattern: Option<Symbol>,
        chain: &mut Vec<Symbol>,
        inherited: &[(Symbol, RuleVar)],
        is_double_colon: bool,
    ) -> Result<NodeId, ResolutionError> {
        let own_vars = own_rule_vars(self.rule_vars, target, inherited);
        let child_inherited = combined_for_children(&own_vars, inherited);
        let rule = self.rules[rule_idx].clone();

        let mut dep_ids = Vec::with_capacity(rule.inputs.len());
        for &inp in &rule.inputs {
            let ids = self.resolve(inp, chain, &child_inherited)?;
            dep_ids.extend(ids);
        }
        let mut order_ids = Vec::with_capacity(rule.order_only_inputs.len());
        for &inp in &rule.order_only_inputs {
            let ids = self.resolve(inp, chain, &child_inherited)?;
            order_ids.extend(ids);
        }

        let node = DepNode {
            output: target,
            deps: dep_ids,
            order_onlys: order_ids,
            actual_inputs: rule.inputs.clone(),
            actual_order_only_inputs: rule.order_only_inputs.clone(),
            commands: rule.commands.clone(),
            rule_vars: own_vars,
            is_phony: self.index.phony.contains(&target),
            is_restat: false,
            is_default_target: self.index.default_target == Some(target),
            is_double_colon,
            output_pattern,
            parents: Vec::new(),
        };
        Ok(self.push_node(target, node))
    }

    fn push_node(&mut self, output: Symbol, node: DepNode) -> NodeId {
        let id = NodeId(self.arena.len());
        self.arena.push(node);
        self.by_output.entry(output).or_default().push(id);
        id
    }
}

/// Assemble a node's own target-specific variable bindings (spec.md §4.5
/// Phase C: "bindings from the matched rule, then bindings inherited from
/// parent targets"). Returns `None` when there is nothing to report so most
/// nodes carry no allocation.
fn own_rule_vars(
    rule_vars: &HashMap<Symbol, IndexMap<Symbol, RuleVar>>,
    target: Symbol,
    inherited: &[(Symbol, RuleVar)],
) -> Option<Vec<(Symbol, RuleVar)>> {
    let own: Vec<(Symbol, RuleVar)> = rule_vars
        .get(&target)
        .map(|m| m.iter().map(|(s, v)| (*s, v.clone())).collect())
        .unwrap_or_default();
    if own.is_empty() && inherited.is_empty() {
        return None;
    }
    let mut combined = own;
    combined.extend_from_slice(inherited);
    Some(combined)
}

/// What gets passed one level deeper during traversal: this node's own
/// combined bindings (own-then-inherited), becoming "inherited" for its
/// children, so a target-specific variable is visible "while evaluating
/// commands of a specific target and its transitive prerequisites"
/// (GLOSSARY).
fn combined_for_children(own_vars: &Option<Vec<(Symbol, RuleVar)>>, inherited: &[(Symbol, RuleVar)]) -> Vec<(Symbol, RuleVar)> {
    match own_vars {
        Some(v) => v.clone(),
        None => inherited.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::types::Loc;
    use crate::eval::types::{Origin, Var};

    struct FakeFs {
        existing: HashSet<String>,
    }

    impl Filesystem for FakeFs {
        fn exists(&self, path: &str) -> bool {
            self.existing.contains(path)
        }
    }

    fn sym(symtab: &SymbolTable, s: &str) -> Symbol {
        symtab.intern_str(s)
    }

    fn mk_rule(symtab: &SymbolTable, outputs: &[&str], output_patterns: &[&str], inputs: &[&str], order_only: &[&str], has_commands: bool, double_colon: bool) -> Rule {
        Rule {
            outputs: outputs.iter().map(|s| sym(symtab, s)).collect(),
            output_patterns: output_patterns.iter().map(|s| sym(symtab, s)).collect(),
            inputs: inputs.iter().map(|s| sym(symtab, s)).collect(),
            order_only_inputs: order_only.iter().map(|s| sym(symtab, s)).collect(),
            commands: if has_commands { vec![crate::ast::types::Value::literal("cmd")] } else { Vec::new() },
            is_double_colon: double_colon,
            loc: Loc::new("Makefile", 1),
        }
    }

    #[test]
    fn explicit_rule_beats_pattern_rule() {
        let symtab = SymbolTable::new();
        let rules = vec![
            mk_rule(&symtab, &["%.o"], &[], &["%.c"], &[], true, false),
            mk_rule(&symtab, &["foo.o"], &[], &["foo.c"], &[], false, false),
        ];
        let fs = FakeFs { existing: HashSet::from(["foo.c".to_string()]) };
        let mut warnings = Vec::new();
        let target = sym(&symtab, "foo.o");
        let graph = build(&rules, &HashMap::new(), &symtab, &[target], None, &fs, &mut warnings).unwrap();
        let node = graph.node(graph.find(target).unwrap());
        assert_eq!(node.actual_inputs.len(), 1);
        assert_eq!(symtab.name_str(node.actual_inputs[0]), "foo.c");
        // uses the commandless explicit rule's (empty) commands, not the
        // pattern rule's, since the explicit rule exists for this target
        // even though it lacks a recipe of its own here.
        assert!(node.commands.is_empty());
    }

    #[test]
    fn pattern_rule_resolves_when_no_explicit_rule_exists() {
        let symtab = SymbolTable::new();
        let rules = vec![mk_rule(&symtab, &["%.o"], &[], &["%.c"], &[], true, false)];
        let fs = FakeFs { existing: HashSet::from(["foo.c".to_string()]) };
        let mut warnings = Vec::new();
        let target = sym(&symtab, "foo.o");
        let graph = build(&rules, &HashMap::new(), &symtab, &[target], None, &fs, &mut warnings).unwrap();
        let node = graph.node(graph.find(target).unwrap());
        assert_eq!(symtab.name_str(node.actual_inputs[0]), "foo.c");
        assert_eq!(node.commands.len(), 1);
    }

    #[test]
    fn longest_stem_pattern_wins_ties() {
        let symtab = SymbolTable::new();
        let rules = vec![
            mk_rule(&symtab, &["%.o"], &[], &["%.c"], &[], true, false),
            mk_rule(&symtab, &["lib%.o"], &[], &["lib%.c"], &[], true, false),
        ];
        let fs = FakeFs { existing: HashSet::from(["libfoo.c".to_string(), "foo.c".to_string()]) };
        let mut warnings = Vec::new();
        let target = sym(&symtab, "libfoo.o");
        let graph = build(&rules, &HashMap::new(), &symtab, &[target], None, &fs, &mut warnings).unwrap();
        let node = graph.node(graph.find(target).unwrap());
        assert_eq!(symtab.name_str(node.actual_inputs[0]), "libfoo.c");
    }

    #[test]
    fn phony_target_is_flagged() {
        let symtab = SymbolTable::new();
        let rules = vec![
            mk_rule(&symtab, &[".PHONY"], &[], &["clean"], &[], false, false),
            mk_rule(&symtab, &["clean"], &[], &[], &[], true, false),
        ];
        let fs = FakeFs { existing: HashSet::new() };
        let mut warnings = Vec::new();
        let target = sym(&symtab, "clean");
        let graph = build(&rules, &HashMap::new(), &symtab, &[target], None, &fs, &mut warnings).unwrap();
        let node = graph.node(graph.find(target).unwrap());
        assert!(node.is_phony);
        assert_eq!(node.commands.len(), 1);
    }

    #[test]
    fn cyclic_dependency_is_fatal() {
        let symtab = SymbolTable::new();
        let rules = vec![
            mk_rule(&symtab, &["a"], &[], &["b"], &[], true, false),
            mk_rule(&symtab, &["b"], &[], &["a"], &[], true, false),
        ];
        let fs = FakeFs { existing: HashSet::new() };
        let mut warnings = Vec::new();
        let target = sym(&symtab, "a");
        let err = build(&rules, &HashMap::new(), &symtab, &[target], None, &fs, &mut warnings).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("a"));
    }

    #[test]
    fn no_rule_for_missing_target_is_fatal() {
        let symtab = SymbolTable::new();
        let rules: Vec<Rule> = Vec::new();
        let fs = FakeFs { existing: HashSet::new() };
        let mut warnings = Vec::new();
        let target = sym(&symtab, "missing.o");
        let err = build(&rules, &HashMap::new(), &symtab, &[target], None, &fs, &mut warnings).unwrap_err();
        assert!(err.to_string().contains("No rule to make target"));
    }

    #[test]
    fn double_colon_rules_resolve_independently() {
        let symtab = SymbolTable::new();
        let rules = vec![
            mk_rule(&symtab, &["all"], &[], &["a.c"], &[], true, true),
            mk_rule(&symtab, &["all"], &[], &["b.c"], &[], true, true),
        ];
        let fs = FakeFs { existing: HashSet::from(["a.c".to_string(), "b.c".to_string()]) };
        let mut warnings = Vec::new();
        let target = sym(&symtab, "all");
        let graph = build(&rules, &HashMap::new(), &symtab, &[target], None, &fs, &mut warnings).unwrap();
        let nodes = graph.find_all(target);
        assert_eq!(nodes.len(), 2);
        assert!(graph.node(nodes[0]).is_double_colon);
        assert!(graph.node(nodes[1]).is_double_colon);
    }

    #[test]
    fn default_target_is_first_explicit_non_pattern_output() {
        let symtab = SymbolTable::new();
        let rules = vec![
            mk_rule(&symtab, &["%.o"], &[], &["%.c"], &[], true, false),
            mk_rule(&symtab, &["all"], &[], &["foo.o"], &[], true, false),
            mk_rule(&symtab, &["clean"], &[], &[], &[], true, false),
        ];
        let fs = FakeFs { existing: HashSet::from(["foo.c".to_string()]) };
        let mut warnings = Vec::new();
        let graph = build(&rules, &HashMap::new(), &symtab, &[], None, &fs, &mut warnings).unwrap();
        assert_eq!(symtab.name_str(graph.default_target.unwrap()), "all");
    }

    #[test]
    fn target_specific_variable_is_attached_and_inherited() {
        let symtab = SymbolTable::new();
        let rules = vec![
            mk_rule(&symtab, &["foo.o"], &[], &["foo.c"], &[], true, false),
            mk_rule(&symtab, &["foo.c"], &[], &[], &[], true, false),
        ];
        let mut rule_vars: HashMap<Symbol, IndexMap<Symbol, RuleVar>> = HashMap::new();
        let mut m = IndexMap::new();
        m.insert(
            sym(&symtab, "CFLAGS"),
            RuleVar { var: Var::Simple { value: b"-O2".to_vec(), origin: Origin::File }, op: crate::ast::types::AssignOp::Simple },
        );
        rule_vars.insert(sym(&symtab, "foo.o"), m);
        let fs = FakeFs { existing: HashSet::new() };
        let mut warnings = Vec::new();
        let target = sym(&symtab, "foo.o");
        let graph = build(&rules, &rule_vars, &symtab, &[target], None, &fs, &mut warnings).unwrap();
        let node = graph.node(graph.find(target).unwrap());
        let vars = node.rule_vars.as_ref().unwrap();
        assert_eq!(vars.len(), 1);

        let child = graph.node(graph.find(sym(&symtab, "foo.c")).unwrap());
        let child_vars = child.rule_vars.as_ref().unwrap();
        assert_eq!(child_vars.len(), 1);
    }

    #[test]
    fn suffix_rule_compiles_into_pattern_match() {
        let symtab = SymbolTable::new();
        let rules = vec![mk_rule(&symtab, &[".c.o"], &[], &[], &[], true, false)];
        let fs = FakeFs { existing: HashSet::from(["foo.c".to_string()]) };
        let mut warnings = Vec::new();
        let target = sym(&symtab, "foo.o");
        let graph = build(&rules, &HashMap::new(), &symtab, &[target], None, &fs, &mut warnings).unwrap();
        let node = graph.node(graph.find(target).unwrap());
        assert_eq!(symtab.name_str(node.actual_inputs[0]), "foo.c");
    }
}
