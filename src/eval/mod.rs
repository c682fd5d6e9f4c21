//! Evaluator module (spec.md §4.4).
//!
//! `types` holds the variable table and evaluator state, `functions` the pure
//! text/filename built-ins, `errors` the error kinds, and `evaluator` the
//! statement-walking driver plus the lazy/side-effecting built-ins.

pub mod errors;
pub mod evaluator;
pub mod functions;
pub mod types;

pub use errors::{EvalError, MakeError, ResolutionError, SystemError};
pub use evaluator::{Evaluator, MakeIo, SystemIo};
pub use types::{
    DeferredCommand, EvalLimits, EvaluatorState, Flavor, IncludeRecord, Origin, RuleVar, ScopedVar, Var, VariableTable, Warning,
};
