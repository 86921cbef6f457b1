//! CLI support for anise-lang
//!
//! Provides programmatic access to the `anise` commands so other tools can
//! embed them.

mod convert;
mod eval;

pub use convert::{json_to_value, value_to_json};
pub use eval::{EvalOptions, EvalOutcome, execute_ast, execute_eval, parse_variable};

use std::io;

use thiserror::Error;

/// Errors that can occur during CLI operations
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Parse error: {0}")]
    Parse(#[from] crate::ParseError),

    #[error("Evaluation error [{code}]: {0}", code = .0.code())]
    Eval(#[from] crate::EvaluationError),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid variable '{0}', expected name=value")]
    InvalidVariable(String),

    #[error("--repeat must be at least 1")]
    InvalidRepeat,
}
