//! Anise: an embeddable expression language.
//!
//! Expressions navigate an object graph (`order.customer.name`), call
//! methods and registered functions, filter and map collections
//! (`items.?[price > 10].![name]`) and compute with a ladder of numeric
//! types. Host objects are described to the engine through [`types`]; the
//! [`resolve`] strategies decide how properties, methods and constructors
//! are found, and an [`EvaluationContext`] bundles them with variables and a
//! root object.
//!
//! ```
//! use anise_lang::{parse, StandardEvaluationContext, Value};
//!
//! let expr = parse("{1, 2, 3, 4}.?[#this % 2 == 0]").unwrap();
//! let ctx = StandardEvaluationContext::new();
//! assert_eq!(expr.evaluate(&ctx).unwrap().to_string(), "[2, 4]");
//! ```

pub mod ast;
pub mod compiler;
pub mod config;
pub mod context;
pub mod error;
pub mod evaluator;
pub mod expression;
pub mod lexer;
pub mod numeric;
pub mod parser;
pub mod resolve;
pub mod template;
pub mod types;
pub mod value;

#[cfg(feature = "cli")]
pub mod cli;

pub use ast::{BinaryOp, Node, NodeKind, Token, TokenKind};
pub use config::{CompilerMode, ParserConfig};
pub use context::{EvaluationContext, StandardEvaluationContext};
pub use error::{
    AccessError, Error, EvalErrorKind, EvaluationError, LexError, LexErrorKind, ParseError,
    ParseErrorKind,
};
pub use expression::{Expression, FromValue};
pub use lexer::tokenize;
pub use parser::ExpressionParser;
pub use template::{TemplateContext, TemplateExpression};
pub use types::{TypeBuilder, TypeInfo, TypeRef, builtins};
pub use value::{HostObject, TypedValue, Value};

/// Parses `text` with the default configuration.
pub fn parse(text: &str) -> Result<Expression, ParseError> {
    ExpressionParser::default().parse_expression(text)
}

/// Parses and evaluates `text` against a fresh standard context.
pub fn eval(text: &str) -> Result<Value, Error> {
    Ok(parse(text)?.evaluate_default()?)
}
