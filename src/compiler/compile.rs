use std::sync::Arc;

use crate::{
    ast::{BinaryOp, IndexedKind, Node, NodeKind, UnaryOp},
    compiler::{CompileError, CompiledCode, CompiledExpression, Frame},
    config::ParserConfig,
    error::{EvalErrorKind, EvaluationError},
    evaluator::{
        navigation::invoke_function,
        operators::{binary_operation, unary_operation},
        truth_value,
    },
    types::builtins,
    value::Value,
};

type CompileResult = Result<CompiledCode, CompileError>;

fn mismatch(expected: &str, actual: &Value) -> EvaluationError {
    EvalErrorKind::CompiledTypeMismatch {
        expected: expected.to_string(),
        actual: actual.type_name().to_string(),
    }
    .into()
}

fn keys_match(expected: &[Option<Arc<str>>], args: &[Value]) -> bool {
    expected.len() == args.len()
        && expected
            .iter()
            .zip(args)
            .all(|(key, arg)| *key == arg.dispatch_key())
}

fn describe_keys(keys: &[Option<Arc<str>>]) -> String {
    let names: Vec<&str> = keys
        .iter()
        .map(|k| k.as_deref().unwrap_or("null"))
        .collect();
    format!("({})", names.join(","))
}

/// Arguments are evaluated against the root, like the interpreter's scope
/// root outside selection and projection.
fn run_args(args: &[CompiledCode], frame: &Frame<'_>) -> Result<Vec<Value>, EvaluationError> {
    args.iter().map(|arg| arg(frame, frame.root)).collect()
}

fn int_index(frame: &Frame<'_>, key: &Value) -> Result<i64, EvaluationError> {
    if let Value::Int(i) = key {
        return Ok(*i as i64);
    }
    match frame
        .context
        .type_converter()
        .convert_value(key, &builtins().integer)?
    {
        Value::Int(i) => Ok(i as i64),
        _ => Err(EvalErrorKind::TypeConversion {
            from: key.type_name().to_string(),
            to: builtins::INTEGER.to_string(),
        }
        .into()),
    }
}

fn checked(index: i64, size: usize) -> Option<usize> {
    (index >= 0 && (index as usize) < size).then_some(index as usize)
}

fn read_indexed(
    frame: &Frame<'_>,
    kind: IndexedKind,
    target: &Value,
    key: &Value,
) -> Result<Value, EvaluationError> {
    match (kind, target) {
        (_, Value::Null) => Err(EvalErrorKind::IndexIntoNull.into()),
        (IndexedKind::Map, Value::Map(map)) => {
            Ok(map.read().get(key).cloned().unwrap_or(Value::Null))
        }
        (IndexedKind::List, Value::List(list)) => {
            let index = int_index(frame, key)?;
            let items = list.read();
            checked(index, items.len())
                .map(|i| items[i].clone())
                .ok_or_else(|| {
                    EvalErrorKind::CollectionIndexOutOfBounds {
                        size: items.len(),
                        index,
                    }
                    .into()
                })
        }
        (IndexedKind::Array, Value::Array(array)) => {
            let index = int_index(frame, key)?;
            let size = array.len();
            checked(index, size)
                .and_then(|i| array.get(i))
                .ok_or_else(|| EvalErrorKind::ArrayIndexOutOfBounds { size, index }.into())
        }
        (IndexedKind::String, Value::String(text)) => {
            let index = int_index(frame, key)?;
            let size = text.chars().count();
            checked(index, size)
                .and_then(|i| text.chars().nth(i))
                .map(|c| Value::String(c.to_string()))
                .ok_or_else(|| EvalErrorKind::StringIndexOutOfBounds { size, index }.into())
        }
        (kind, other) => Err(mismatch(&format!("{:?}", kind), other)),
    }
}

/// Turns interpreted syntax trees into [`CompiledExpression`]s.
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    config: ParserConfig,
}

impl Compiler {
    pub fn new(config: ParserConfig) -> Self {
        Compiler { config }
    }

    pub fn compile(&self, ast: &Node) -> Result<CompiledExpression, CompileError> {
        let code = self.compile_node(ast)?;
        Ok(CompiledExpression::new(code, self.config.clone()))
    }

    fn compile_node(&self, node: &Node) -> CompileResult {
        let code = self.compile_kind(node)?;
        let position = node.span.start;
        Ok(Box::new(move |frame, active| {
            code(frame, active).map_err(|e| e.or_position(position))
        }))
    }

    fn compile_all(&self, nodes: &[Node]) -> Result<Vec<CompiledCode>, CompileError> {
        nodes.iter().map(|n| self.compile_node(n)).collect()
    }

    fn compile_kind(&self, node: &Node) -> CompileResult {
        use NodeKind::*;
        match &node.kind {
            Int(_) | Long(_) | Float(_) | Double(_) | String(_) | Boolean(_) | Null => {
                let value = node.constant_value().unwrap_or(Value::Null);
                Ok(Box::new(move |_, _| Ok(value.clone())))
            }
            InlineList {
                constant: Some(value),
                ..
            }
            | InlineMap {
                constant: Some(value),
                ..
            } => {
                let value = value.clone();
                Ok(Box::new(move |_, _| Ok(value.clone())))
            }
            InlineList { elements, .. } => {
                let elements = self.compile_all(elements)?;
                Ok(Box::new(move |frame, active| {
                    let items = elements
                        .iter()
                        .map(|e| e(frame, active))
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(Value::list(items))
                }))
            }

            Compound(children) => {
                let steps = self.compile_all(children)?;
                Ok(Box::new(move |frame, active| {
                    let Some((first, rest)) = steps.split_first() else {
                        return Ok(Value::Null);
                    };
                    let mut current = first(frame, active)?;
                    for step in rest {
                        current = step(frame, &current)?;
                    }
                    Ok(current)
                }))
            }

            Property {
                name,
                null_safe,
                cache,
            } => {
                let cached = cache
                    .read
                    .get()
                    .ok_or_else(|| CompileError::Unresolved(format!("property '{}'", name)))?;
                let read = cached
                    .accessor
                    .specialize_read(&cached.target_type, cached.is_static, name)
                    .ok_or_else(|| CompileError::NotSpecializable(format!("property '{}'", name)))?;
                let key = cached.key.clone();
                let name = name.clone();
                let null_safe = *null_safe;
                Ok(Box::new(move |_, target| {
                    if target.is_null() {
                        if null_safe {
                            return Ok(Value::Null);
                        }
                        return Err(EvalErrorKind::PropertyNotReadableOnNull(name.clone()).into());
                    }
                    if target.dispatch_key().as_ref() != Some(&key) {
                        return Err(mismatch(&key, target));
                    }
                    read(target).map_err(|e| {
                        EvalErrorKind::PropertyReadFailed {
                            name: name.clone(),
                            cause: e.to_string(),
                        }
                        .into()
                    })
                }))
            }

            Method {
                name,
                args,
                null_safe,
                cache,
            } => {
                let cached = cache
                    .get()
                    .ok_or_else(|| CompileError::Unresolved(format!("method '{}'", name)))?;
                let invoker = cached
                    .executor
                    .specialize()
                    .ok_or_else(|| CompileError::NotSpecializable(format!("method '{}'", name)))?;
                let args = self.compile_all(args)?;
                let target_key = cached.target_key.clone();
                let arg_keys = cached.arg_keys.clone();
                let name = name.clone();
                let null_safe = *null_safe;
                Ok(Box::new(move |frame, target| {
                    let values = run_args(&args, frame)?;
                    if target.is_null() {
                        if null_safe {
                            return Ok(Value::Null);
                        }
                        return Err(EvalErrorKind::MethodOnNull(format!("{}{}", name, describe_keys(&arg_keys))).into());
                    }
                    if target.dispatch_key() != target_key {
                        return Err(mismatch(target_key.as_deref().unwrap_or("null"), target));
                    }
                    if !keys_match(&arg_keys, &values) {
                        return Err(EvalErrorKind::CompiledTypeMismatch {
                            expected: describe_keys(&arg_keys),
                            actual: describe_keys(&values.iter().map(Value::dispatch_key).collect::<Vec<_>>()),
                        }
                        .into());
                    }
                    invoker(target, &values).map_err(|e| {
                        EvalErrorKind::MethodInvocationFailed {
                            name: name.clone(),
                            type_name: target.type_name().to_string(),
                            cause: e.to_string(),
                        }
                        .into()
                    })
                }))
            }

            Indexer { index, indexed, .. } => {
                let kind = indexed
                    .get()
                    .ok_or_else(|| CompileError::Unresolved("indexer".to_string()))?;
                if kind == IndexedKind::Object {
                    return Err(CompileError::NotSpecializable("property indexer".to_string()));
                }
                let key: CompiledCode = match (&index.kind, kind) {
                    (Property { name, .. }, IndexedKind::Map) => {
                        let key = Value::string(name.clone());
                        Box::new(move |_, _| Ok(key.clone()))
                    }
                    _ => self.compile_node(index)?,
                };
                Ok(Box::new(move |frame, target| {
                    let key = key(frame, frame.root)?;
                    read_indexed(frame, kind, target, &key)
                }))
            }

            Variable(name) => Ok(match name.as_str() {
                "this" => Box::new(|_, active| Ok(active.clone())),
                "root" => Box::new(|frame, _| Ok(frame.root.clone())),
                _ => {
                    let name = name.clone();
                    Box::new(move |frame, _| {
                        Ok(frame.context.lookup_variable(&name).unwrap_or(Value::Null))
                    })
                }
            }),

            Function {
                name,
                args,
                resolved,
            } => {
                let bound = resolved
                    .get()
                    .ok_or_else(|| CompileError::Unresolved(format!("function '#{}'", name)))?;
                let args = self.compile_all(args)?;
                let name = name.clone();
                Ok(Box::new(move |frame, _| {
                    match frame.context.lookup_variable(&name) {
                        Some(Value::Function(current)) if Arc::ptr_eq(&current, &bound) => {}
                        other => {
                            return Err(mismatch(
                                &format!("function {}", bound.signature()),
                                &other.unwrap_or(Value::Null),
                            ));
                        }
                    }
                    let values = run_args(&args, frame)?;
                    invoke_function(frame.context.type_converter(), &name, &bound, values)
                }))
            }

            TypeReference { resolved, .. } => {
                let ty = resolved
                    .get()
                    .ok_or_else(|| CompileError::Unresolved("type reference".to_string()))?;
                let value = Value::Type(ty);
                Ok(Box::new(move |_, _| Ok(value.clone())))
            }

            Constructor {
                type_name,
                args,
                cache,
            } => {
                let type_name = type_name.to_ast_string();
                let cached = cache
                    .get()
                    .ok_or_else(|| CompileError::Unresolved(format!("constructor of {}", type_name)))?;
                let factory = cached.executor.specialize().ok_or_else(|| {
                    CompileError::NotSpecializable(format!("constructor of {}", type_name))
                })?;
                let args = self.compile_all(args)?;
                let arg_keys = cached.arg_keys.clone();
                Ok(Box::new(move |frame, _| {
                    let values = run_args(&args, frame)?;
                    if !keys_match(&arg_keys, &values) {
                        return Err(EvalErrorKind::CompiledTypeMismatch {
                            expected: describe_keys(&arg_keys),
                            actual: describe_keys(&values.iter().map(Value::dispatch_key).collect::<Vec<_>>()),
                        }
                        .into());
                    }
                    factory(&values).map_err(|e| {
                        EvalErrorKind::ConstructorInvocationFailed {
                            type_name: type_name.clone(),
                            cause: e.to_string(),
                        }
                        .into()
                    })
                }))
            }

            Binary { op, left, right } => self.compile_binary(*op, left, right),

            Unary { op, operand } => {
                let op = *op;
                let operand = self.compile_node(operand)?;
                Ok(Box::new(move |frame, active| {
                    let value = operand(frame, active)?;
                    match op {
                        UnaryOp::Not => Ok(Value::Boolean(!truth_value(frame.context, &value)?)),
                        _ => unary_operation(frame.context, op, &value),
                    }
                }))
            }

            Ternary {
                condition,
                if_true,
                if_false,
            } => {
                let condition = self.compile_node(condition)?;
                let if_true = self.compile_node(if_true)?;
                let if_false = self.compile_node(if_false)?;
                Ok(Box::new(move |frame, active| {
                    if truth_value(frame.context, &condition(frame, active)?)? {
                        if_true(frame, active)
                    } else {
                        if_false(frame, active)
                    }
                }))
            }

            Elvis { value, fallback } => {
                let value = self.compile_node(value)?;
                let fallback = self.compile_node(fallback)?;
                Ok(Box::new(move |frame, active| {
                    let result = value(frame, active)?;
                    match &result {
                        Value::Null => fallback(frame, active),
                        Value::String(s) if s.is_empty() => fallback(frame, active),
                        _ => Ok(result),
                    }
                }))
            }

            InlineMap { .. }
            | Identifier(_)
            | QualifiedIdentifier(_)
            | Selection { .. }
            | Projection { .. }
            | Bean { .. }
            | ArrayConstructor { .. }
            | Step { .. }
            | Assign { .. } => Err(CompileError::NotCompilable(node.kind_name())),
        }
    }

    fn compile_binary(&self, op: BinaryOp, left: &Node, right: &Node) -> CompileResult {
        match op {
            BinaryOp::Between => return Err(CompileError::NotCompilable("OperatorBetween")),
            BinaryOp::And | BinaryOp::Or => {
                let left = self.compile_node(left)?;
                let right = self.compile_node(right)?;
                return Ok(Box::new(move |frame, active| {
                    let l = truth_value(frame.context, &left(frame, active)?)?;
                    let result = match op {
                        BinaryOp::And => l && truth_value(frame.context, &right(frame, active)?)?,
                        _ => l || truth_value(frame.context, &right(frame, active)?)?,
                    };
                    Ok(Value::Boolean(result))
                }));
            }
            _ => {}
        }

        // arithmetic is specialized on the operand types seen so far
        let guards = if op.is_arithmetic() {
            let (Some(l), Some(r)) = (left.exit_type(), right.exit_type()) else {
                return Err(CompileError::Unresolved(format!(
                    "operand types of '{}'",
                    op.symbol()
                )));
            };
            Some((l, r))
        } else {
            None
        };
        let left = self.compile_node(left)?;
        let right = self.compile_node(right)?;
        Ok(Box::new(move |frame, active| {
            let l = left(frame, active)?;
            let r = right(frame, active)?;
            if let Some((lt, rt)) = &guards {
                if l.type_name() != *lt {
                    return Err(mismatch(lt, &l));
                }
                if r.type_name() != *rt {
                    return Err(mismatch(rt, &r));
                }
            }
            binary_operation(frame.context, frame.config, op, &l, &r)
        }))
    }
}

#[cfg(test)]
use crate::{context::StandardEvaluationContext, evaluator::ExpressionState, parser::parse_ast};

#[cfg(test)]
fn interpret_then_compile(text: &str, ctx: &StandardEvaluationContext) -> Result<CompiledExpression, CompileError> {
    let config = ParserConfig::interpreted();
    let ast = parse_ast(text, &config).unwrap();
    let mut state = ExpressionState::new(ctx, crate::context::EvaluationContext::root_object(ctx), &config);
    state.evaluate(&ast).unwrap();
    Compiler::new(config).compile(&ast)
}

#[test]
fn test_arithmetic_guards_operand_types() {
    let ctx = StandardEvaluationContext::new();
    ctx.set_variable("x", Value::Int(2));
    let compiled = interpret_then_compile("#x * 3", &ctx).unwrap();
    assert_eq!(compiled.get_value(&ctx, &Value::Null).unwrap(), Value::Int(6));

    ctx.set_variable("x", Value::Double(1.5));
    let err = compiled.get_value(&ctx, &Value::Null).unwrap_err();
    assert_eq!(err.code(), "COMPILED_TYPE_MISMATCH");
}

#[test]
fn test_selection_is_not_compilable() {
    let ctx = StandardEvaluationContext::new();
    let err = interpret_then_compile("{1,2,3}.?[#this > 1]", &ctx).unwrap_err();
    assert_eq!(err, CompileError::NotCompilable("Selection"));
}
