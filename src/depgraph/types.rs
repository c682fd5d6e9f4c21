//! Rule and DepNode data model.

use std::collections::HashMap;

use crate::ast::types::{Loc, Value};
use crate::symbol::Symbol;

/// Collected from a rule-like statement during evaluation.
#[derive(Debug, Clone)]
pub struct Rule {
    pub outputs: Vec<Symbol>,
    /// Static-pattern / implicit-rule output patterns, each either a plain
    /// target or containing exactly one `%`.
    pub output_patterns: Vec<Symbol>,
    pub inputs: Vec<Symbol>,
    pub order_only_inputs: Vec<Symbol>,
    pub commands: Vec<Value>,
    pub is_double_colon: bool,
    pub loc: Loc,
}

impl Rule {
    pub fn has_commands(&self) -> bool {
        !self.commands.is_empty()
    }
}

/// A vertex of the final DAG. Nodes live in a `DepGraph`'s arena and
/// reference each other by `NodeId` rather than through `Rc<RefCell<_>>`;
/// the arena is allocated and freed as a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone)]
pub struct DepNode {
    pub output: Symbol,
    pub deps: Vec<NodeId>,
    pub order_onlys: Vec<NodeId>,
    pub actual_inputs: Vec<Symbol>,
    pub actual_order_only_inputs: Vec<Symbol>,
    pub commands: Vec<Value>,
    /// Target-specific variable bindings visible while this node's recipe
    /// runs: this node's own bindings first, then bindings inherited from
    /// the parent that first reached it.
    pub rule_vars: Option<Vec<(Symbol, crate::eval::types::RuleVar)>>,
    pub is_phony: bool,
    pub is_restat: bool,
    pub is_default_target: bool,
    /// Set for nodes produced by a `::` rule: double-colon rules are each
    /// resolved independently, so such targets have more than one `DepNode`
    /// sharing the same `output`, one per rule.
    pub is_double_colon: bool,
    pub output_pattern: Option<Symbol>,
    pub parents: Vec<NodeId>,
}

/// The dep graph produced by `depgraph::build`: a list of root dep nodes
/// plus the final variable table and the export set.
pub struct DepGraph {
    pub(crate) arena: Vec<DepNode>,
    /// Nodes for a given output, in rule-declaration order. Length > 1 only
    /// for a target with multiple `::` rules.
    pub(crate) by_output: HashMap<Symbol, Vec<NodeId>>,
    pub roots: Vec<NodeId>,
    pub default_target: Option<Symbol>,
    pub phony: std::collections::HashSet<Symbol>,
    /// Set when a `.DELETE_ON_ERROR:` special target was declared anywhere
    /// in the loaded Makefiles.
    pub delete_on_error: bool,
}

impl DepGraph {
    pub fn node(&self, id: NodeId) -> &DepNode {
        &self.arena[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut DepNode {
        &mut self.arena[id.0]
    }

    /// The first node registered for `output`, if any.
    pub fn find(&self, output: Symbol) -> Option<NodeId> {
        self.by_output.get(&output).and_then(|v| v.first()).copied()
    }

    /// Every node registered for `output` (more than one only for `::`
    /// targets).
    pub fn find_all(&self, output: Symbol) -> &[NodeId] {
        self.by_output.get(&output).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &DepNode)> {
        self.arena.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }
}
