use std::sync::{
    Arc, Mutex, PoisonError, RwLock,
    atomic::{AtomicU32, Ordering},
};

use num_bigint::BigInt;
use once_cell::sync::OnceCell;
use rust_decimal::Decimal;

use crate::{
    ast::Node,
    compiler::{CompiledExpression, Compiler},
    config::{CompilerMode, ParserConfig},
    context::{EvaluationContext, StandardEvaluationContext},
    error::{EvalErrorKind, EvaluationError},
    evaluator::ExpressionState,
    types::{TypeRef, builtins},
    value::{TypedValue, Value},
};

/// Rust types an expression result can be extracted as.
///
/// The value is first converted to [`FromValue::target_type`] through the
/// context's type converter.
pub trait FromValue: Sized {
    fn target_type() -> TypeRef;

    fn from_value(value: Value) -> Option<Self>;
}

impl FromValue for Value {
    fn target_type() -> TypeRef {
        builtins().object.clone()
    }

    fn from_value(value: Value) -> Option<Self> {
        Some(value)
    }
}

impl FromValue for bool {
    fn target_type() -> TypeRef {
        builtins().boolean.clone()
    }

    fn from_value(value: Value) -> Option<Self> {
        value.as_bool()
    }
}

impl FromValue for i32 {
    fn target_type() -> TypeRef {
        builtins().integer.clone()
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Int(n) => Some(n),
            _ => None,
        }
    }
}

impl FromValue for i64 {
    fn target_type() -> TypeRef {
        builtins().long.clone()
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Long(n) => Some(n),
            _ => None,
        }
    }
}

impl FromValue for f64 {
    fn target_type() -> TypeRef {
        builtins().double.clone()
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Double(n) => Some(n),
            _ => None,
        }
    }
}

impl FromValue for String {
    fn target_type() -> TypeRef {
        builtins().string.clone()
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl FromValue for Decimal {
    fn target_type() -> TypeRef {
        builtins().big_decimal.clone()
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::BigDecimal(d) => Some(d),
            _ => None,
        }
    }
}

impl FromValue for BigInt {
    fn target_type() -> TypeRef {
        builtins().big_integer.clone()
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::BigInteger(n) => Some(n),
            _ => None,
        }
    }
}

/// A parsed expression, ready to evaluate against any context.
///
/// Expressions are `Send + Sync` and meant to be parsed once and evaluated
/// many times. Depending on the parser's [`CompilerMode`], an expression
/// that has been interpreted often enough compiles itself; in `mixed` mode
/// a compiled expression that fails reverts to interpretation.
///
/// # Example
///
/// ```
/// use anise_lang::{ExpressionParser, ParserConfig, StandardEvaluationContext, Value};
///
/// let parser = ExpressionParser::new(ParserConfig::interpreted());
/// let expr = parser.parse_expression("'Hello' + ', ' + 'World'").unwrap();
/// let ctx = StandardEvaluationContext::new();
/// assert_eq!(expr.evaluate(&ctx).unwrap(), Value::string("Hello, World"));
/// assert_eq!(expr.evaluate_as::<String>(&ctx).unwrap(), "Hello, World");
/// ```
pub struct Expression {
    source: String,
    ast: Node,
    config: ParserConfig,
    compiled: RwLock<Option<Arc<CompiledExpression>>>,
    interpreted_count: AtomicU32,
    failed_attempts: AtomicU32,
    compile_lock: Mutex<()>,
    default_context: OnceCell<StandardEvaluationContext>,
}

impl std::fmt::Debug for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Expression")
            .field("source", &self.source)
            .field("compiled", &self.is_compiled())
            .finish()
    }
}

impl Expression {
    pub(crate) fn new(source: &str, ast: Node, config: ParserConfig) -> Self {
        Expression {
            source: source.to_string(),
            ast,
            config,
            compiled: RwLock::new(None),
            interpreted_count: AtomicU32::new(0),
            failed_attempts: AtomicU32::new(0),
            compile_lock: Mutex::new(()),
            default_context: OnceCell::new(),
        }
    }

    /// The text this expression was parsed from.
    pub fn expression_string(&self) -> &str {
        &self.source
    }

    pub fn ast(&self) -> &Node {
        &self.ast
    }

    /// The syntax tree rendered back to text, fully parenthesized.
    pub fn to_ast_string(&self) -> String {
        self.ast.to_ast_string()
    }

    /// Evaluates against the context's root object.
    pub fn evaluate(&self, ctx: &dyn EvaluationContext) -> Result<Value, EvaluationError> {
        self.get_value(ctx, ctx.root_object())
    }

    /// Evaluates against `root` instead of the context's root object.
    pub fn evaluate_with_root(&self, ctx: &dyn EvaluationContext, root: Value) -> Result<Value, EvaluationError> {
        self.get_value(ctx, TypedValue::new(root))
    }

    /// Evaluates against a private standard context with no root.
    pub fn evaluate_default(&self) -> Result<Value, EvaluationError> {
        let ctx = self.default_context.get_or_init(StandardEvaluationContext::new);
        self.evaluate(ctx)
    }

    pub fn evaluate_as<T: FromValue>(&self, ctx: &dyn EvaluationContext) -> Result<T, EvaluationError> {
        let value = self.evaluate(ctx)?;
        let target = T::target_type();
        let converted = ctx.type_converter().convert_value(&value, &target)?;
        T::from_value(converted).ok_or_else(|| {
            EvalErrorKind::TypeConversion {
                from: value.type_name().to_string(),
                to: target.name().to_string(),
            }
            .into()
        })
    }

    /// Evaluates and converts the result to `target`.
    pub fn evaluate_to_type(
        &self,
        ctx: &dyn EvaluationContext,
        target: &TypeRef,
    ) -> Result<Value, EvaluationError> {
        let value = self.evaluate(ctx)?;
        ctx.type_converter().convert_value(&value, target)
    }

    /// Writes `value` to the location this expression denotes.
    pub fn assign(&self, ctx: &dyn EvaluationContext, value: Value) -> Result<(), EvaluationError> {
        ExpressionState::new(ctx, ctx.root_object(), &self.config).assign(&self.ast, value)
    }

    pub fn assign_with_root(
        &self,
        ctx: &dyn EvaluationContext,
        root: Value,
        value: Value,
    ) -> Result<(), EvaluationError> {
        ExpressionState::new(ctx, TypedValue::new(root), &self.config).assign(&self.ast, value)
    }

    pub fn is_writable(&self, ctx: &dyn EvaluationContext) -> Result<bool, EvaluationError> {
        ExpressionState::new(ctx, ctx.root_object(), &self.config).is_writable(&self.ast)
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled_code().is_some()
    }

    /// Compiles now, regardless of mode and evaluation count. Returns whether
    /// compiled code is in place afterwards.
    pub fn compile(&self) -> bool {
        if self.is_compiled() {
            return true;
        }
        if self.failed_attempts.load(Ordering::Relaxed) > self.config.max_failed_compilations {
            return false;
        }
        let _guard = self
            .compile_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if self.is_compiled() {
            return true;
        }
        match Compiler::new(self.config.clone()).compile(&self.ast) {
            Ok(compiled) => {
                tracing::debug!(expression = %self.source, "compiled expression");
                *self.compiled.write().unwrap_or_else(PoisonError::into_inner) =
                    Some(Arc::new(compiled));
                true
            }
            Err(e) => {
                let failures = self.failed_attempts.fetch_add(1, Ordering::Relaxed) + 1;
                self.interpreted_count.store(0, Ordering::Relaxed);
                tracing::debug!(expression = %self.source, error = %e, failures, "expression not compiled");
                false
            }
        }
    }

    /// Drops compiled code and resets the counters.
    pub fn revert_to_interpreted(&self) {
        *self.compiled.write().unwrap_or_else(PoisonError::into_inner) = None;
        self.interpreted_count.store(0, Ordering::Relaxed);
        self.failed_attempts.store(0, Ordering::Relaxed);
    }

    fn compiled_code(&self) -> Option<Arc<CompiledExpression>> {
        self.compiled
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn get_value(&self, ctx: &dyn EvaluationContext, root: TypedValue) -> Result<Value, EvaluationError> {
        if let Some(compiled) = self.compiled_code() {
            match compiled.get_value(ctx, &root.value) {
                Ok(value) => return Ok(value),
                Err(e) if self.config.compiler_mode == CompilerMode::Mixed => {
                    tracing::debug!(expression = %self.source, error = %e, "compiled expression failed, reverting to interpreter");
                    self.revert_to_interpreted();
                }
                Err(e) => return Err(EvalErrorKind::CompiledExpressionFailed(Box::new(e)).into()),
            }
        }
        let mut state = ExpressionState::new(ctx, root, &self.config);
        let value = state.evaluate(&self.ast)?.value;
        self.check_compile();
        Ok(value)
    }

    /// Counts a successful interpretation and compiles once the mode's
    /// threshold is reached.
    fn check_compile(&self) {
        let count = self.interpreted_count.fetch_add(1, Ordering::Relaxed) + 1;
        let due = match self.config.compiler_mode {
            CompilerMode::Off => false,
            CompilerMode::Immediate => count >= 1,
            CompilerMode::Mixed => count >= self.config.compile_threshold,
        };
        if due {
            self.compile();
        }
    }
}

#[test]
fn test_immediate_mode_compiles_after_first_evaluation() {
    let config = ParserConfig::interpreted().with_compiler_mode(CompilerMode::Immediate);
    let expr = crate::parser::ExpressionParser::new(config)
        .parse_expression("1 + 2")
        .unwrap();
    assert!(!expr.is_compiled());
    assert_eq!(expr.evaluate_default().unwrap(), Value::Int(3));
    assert!(expr.is_compiled());
    assert_eq!(expr.evaluate_default().unwrap(), Value::Int(3));
}

#[test]
fn test_failed_compilation_restarts_the_count() {
    let config = ParserConfig::interpreted()
        .with_compiler_mode(CompilerMode::Mixed)
        .with_compile_threshold(3);
    let expr = crate::parser::ExpressionParser::new(config)
        .parse_expression("{1, 2}.?[#this > 1]")
        .unwrap();
    for _ in 0..8 {
        expr.evaluate_default().unwrap();
    }
    assert_eq!(expr.failed_attempts.load(Ordering::Relaxed), 2);
    assert_eq!(expr.interpreted_count.load(Ordering::Relaxed), 2);
}

#[test]
fn test_evaluate_as_converts() {
    let expr = crate::parser::ExpressionParser::new(ParserConfig::interpreted())
        .parse_expression("'42'")
        .unwrap();
    assert_eq!(expr.evaluate_as::<i32>(&StandardEvaluationContext::new()).unwrap(), 42);
}
