//! Closure compiler for hot expressions.
//!
//! An expression that has been interpreted often enough is turned into a
//! tree of boxed closures, one per node. The closures are specialized on
//! what the interpreter learned: the accessor or executor each navigation
//! node settled on and the operand types arithmetic saw. Every specialized
//! step checks that its input still has the type it was compiled for and
//! fails with [`EvalErrorKind::CompiledTypeMismatch`] otherwise, so the
//! owning expression can fall back to the interpreter.
//!
//! Nodes that cannot be compiled (selection, projection, assignment,
//! increments, `between`, bean references, inline maps, array
//! construction) make the whole expression stay interpreted.
//!
//! [`EvalErrorKind::CompiledTypeMismatch`]: crate::error::EvalErrorKind::CompiledTypeMismatch

mod compile;

use std::fmt;

use thiserror::Error;

pub use crate::config::CompilerMode;
pub use compile::Compiler;

use crate::{
    config::ParserConfig, context::EvaluationContext, error::EvaluationError, value::Value,
};

/// What compiled code sees while it runs.
pub struct Frame<'a> {
    pub context: &'a dyn EvaluationContext,
    pub root: &'a Value,
    pub config: &'a ParserConfig,
}

/// A compiled node. The second argument is the active object.
pub type CompiledCode =
    Box<dyn Fn(&Frame<'_>, &Value) -> Result<Value, EvaluationError> + Send + Sync>;

/// Why an expression could not be compiled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("{0} nodes cannot be compiled")]
    NotCompilable(&'static str),

    #[error("{0} has not been resolved by an interpreted evaluation yet")]
    Unresolved(String),

    #[error("{0} cannot be specialized")]
    NotSpecializable(String),
}

/// The compiled form of a whole expression.
pub struct CompiledExpression {
    code: CompiledCode,
    config: ParserConfig,
}

impl CompiledExpression {
    pub(crate) fn new(code: CompiledCode, config: ParserConfig) -> Self {
        CompiledExpression { code, config }
    }

    pub fn get_value(&self, context: &dyn EvaluationContext, root: &Value) -> Result<Value, EvaluationError> {
        let frame = Frame {
            context,
            root,
            config: &self.config,
        };
        (self.code)(&frame, root)
    }
}

impl fmt::Debug for CompiledExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledExpression").finish_non_exhaustive()
    }
}
