use std::cmp::Ordering;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    ast::{BinaryOp, Node, StepOp, UnaryOp},
    config::ParserConfig,
    context::EvaluationContext,
    error::{EvalErrorKind, EvaluationError},
    evaluator::{EvalResult, ExpressionState},
    numeric,
    types::builtins,
    value::{NumericKind, TypedValue, Value},
};

/// Compiled `matches` patterns, keyed by pattern text.
static PATTERNS: Lazy<DashMap<String, Regex>> = Lazy::new(DashMap::new);
const MAX_CACHED_PATTERNS: usize = 256;

fn not_supported(op: &str, left: &Value, right: &Value) -> EvaluationError {
    EvalErrorKind::OperatorNotSupported {
        operator: op.to_string(),
        left: left.type_name().to_string(),
        right: right.type_name().to_string(),
    }
    .into()
}

/// Hands an operation the built-in rules do not cover to the overloader.
pub(crate) fn operate(
    ctx: &dyn EvaluationContext,
    op: BinaryOp,
    left: &Value,
    right: &Value,
) -> EvalResult<Value> {
    let overloader = ctx.operator_overloader();
    if overloader.overrides_operation(op, left, right)? {
        overloader.operate(op, left, right)
    } else {
        Err(not_supported(op.symbol(), left, right))
    }
}

fn check_length(config: &ParserConfig, length: usize) -> EvalResult<()> {
    if length > config.max_concatenated_length {
        return Err(EvalErrorKind::MaxConcatenatedStringLength(length).into());
    }
    Ok(())
}

fn as_text(ctx: &dyn EvaluationContext, value: &Value) -> EvalResult<String> {
    match value {
        Value::Null => Ok("null".to_string()),
        Value::String(s) => Ok(s.clone()),
        other => match ctx.type_converter().convert_value(other, &builtins().string)? {
            Value::String(s) => Ok(s),
            converted => Ok(converted.to_string()),
        },
    }
}

fn concatenate(
    ctx: &dyn EvaluationContext,
    config: &ParserConfig,
    left: &Value,
    right: &Value,
) -> EvalResult<Value> {
    let left = as_text(ctx, left)?;
    check_length(config, left.chars().count())?;
    let right = as_text(ctx, right)?;
    check_length(config, right.chars().count())?;
    let result = left + &right;
    check_length(config, result.chars().count())?;
    Ok(Value::String(result))
}

fn repeat(config: &ParserConfig, text: &str, count: i32) -> EvalResult<Value> {
    if count < 0 {
        return Err(EvalErrorKind::NegativeRepeatCount(count).into());
    }
    let size = text.chars().count().saturating_mul(count as usize);
    if size > config.max_repeated_text_size {
        return Err(EvalErrorKind::MaxRepeatedTextSize(size).into());
    }
    Ok(Value::String(text.repeat(count as usize)))
}

/// `'c' - n`: shifts a single character down by `n` code points.
fn shift_char(text: &str, by: i32) -> Option<Value> {
    let mut chars = text.chars();
    let (Some(c), None) = (chars.next(), chars.next()) else {
        return None;
    };
    let code = (c as i64) - by as i64;
    let shifted = char::from_u32(u32::try_from(code).ok()?)?;
    Some(Value::String(shifted.to_string()))
}

/// Applies every binary operator except the short-circuiting `and`/`or`.
pub(crate) fn binary_operation(
    ctx: &dyn EvaluationContext,
    config: &ParserConfig,
    op: BinaryOp,
    left: &Value,
    right: &Value,
) -> EvalResult<Value> {
    match op {
        BinaryOp::Add => {
            if left.is_number() && right.is_number() {
                return numeric::arithmetic(op, left, right);
            }
            if matches!(left, Value::String(_)) || matches!(right, Value::String(_)) {
                return concatenate(ctx, config, left, right);
            }
            operate(ctx, op, left, right)
        }
        BinaryOp::Subtract => {
            if left.is_number() && right.is_number() {
                return numeric::arithmetic(op, left, right);
            }
            if let (Value::String(text), Value::Int(by)) = (left, right)
                && let Some(shifted) = shift_char(text, *by)
            {
                return Ok(shifted);
            }
            operate(ctx, op, left, right)
        }
        BinaryOp::Multiply => {
            if left.is_number() && right.is_number() {
                return numeric::arithmetic(op, left, right);
            }
            if let (Value::String(text), Value::Int(count)) = (left, right) {
                return repeat(config, text, *count);
            }
            operate(ctx, op, left, right)
        }
        BinaryOp::Divide | BinaryOp::Modulo => {
            if left.is_number() && right.is_number() {
                return numeric::arithmetic(op, left, right);
            }
            operate(ctx, op, left, right)
        }
        BinaryOp::Power => {
            if left.is_number() && right.is_number() {
                return numeric::power(left, right);
            }
            operate(ctx, op, left, right)
        }
        BinaryOp::Equal => Ok(Value::Boolean(equality_check(ctx, left, right)?)),
        BinaryOp::NotEqual => Ok(Value::Boolean(!equality_check(ctx, left, right)?)),
        BinaryOp::LessThan | BinaryOp::LessEqual | BinaryOp::GreaterThan | BinaryOp::GreaterEqual => {
            let ordering = compare_values(ctx, left, right)?;
            Ok(Value::Boolean(ordering_holds(op, ordering)))
        }
        BinaryOp::Instanceof => match right {
            Value::Type(ty) => Ok(Value::Boolean(
                left.runtime_type()
                    .is_some_and(|actual| ty.is_assignable_from(&actual)),
            )),
            other => Err(EvalErrorKind::InstanceofNeedsType(other.type_name().to_string()).into()),
        },
        BinaryOp::Matches => {
            let Value::String(input) = left else {
                return Err(EvalErrorKind::InvalidMatchesInput(left.type_name().to_string()).into());
            };
            let Value::String(pattern) = right else {
                return Err(EvalErrorKind::InvalidMatchesPattern(right.type_name().to_string()).into());
            };
            Ok(Value::Boolean(matches_pattern(config, input, pattern)?))
        }
        BinaryOp::Between => {
            let bounds = match right {
                Value::List(items) if items.read().len() == 2 => items.read().clone(),
                _ => return Err(EvalErrorKind::BetweenRightOperand.into()),
            };
            let comparator = ctx.type_comparator();
            Ok(Value::Boolean(
                comparator.compare(left, &bounds[0])? != Ordering::Less
                    && comparator.compare(left, &bounds[1])? != Ordering::Greater,
            ))
        }
        BinaryOp::And | BinaryOp::Or => match (left, right) {
            (Value::Boolean(l), Value::Boolean(r)) => Ok(Value::Boolean(if op == BinaryOp::And {
                *l && *r
            } else {
                *l || *r
            })),
            _ => Err(not_supported(op.symbol(), left, right)),
        },
    }
}

/// `None` means unordered (a NaN operand), which satisfies no comparison.
pub(crate) fn ordering_holds(op: BinaryOp, ordering: Option<Ordering>) -> bool {
    let Some(ordering) = ordering else {
        return false;
    };
    match op {
        BinaryOp::LessThan => ordering == Ordering::Less,
        BinaryOp::LessEqual => ordering != Ordering::Greater,
        BinaryOp::GreaterThan => ordering == Ordering::Greater,
        BinaryOp::GreaterEqual => ordering != Ordering::Less,
        _ => false,
    }
}

/// Orders two values for `< <= > >=`. Reals compare by IEEE rules; other
/// values go through the context's comparator.
pub(crate) fn compare_values(
    ctx: &dyn EvaluationContext,
    left: &Value,
    right: &Value,
) -> EvalResult<Option<Ordering>> {
    if let Some(kind) = numeric::promote(left, right)
        && matches!(kind, NumericKind::Float | NumericKind::Double)
    {
        let (l, r) = (left.to_f64(), right.to_f64());
        return Ok(l.zip(r).and_then(|(l, r)| l.partial_cmp(&r)));
    }
    ctx.type_comparator().compare(left, right).map(Some)
}

/// `==` semantics: numbers by value across kinds, then structural
/// equality, then the comparator for comparable values.
pub(crate) fn equality_check(
    ctx: &dyn EvaluationContext,
    left: &Value,
    right: &Value,
) -> EvalResult<bool> {
    if let Some(equal) = numeric::numbers_equal(left, right) {
        return Ok(equal);
    }
    if left == right {
        return Ok(true);
    }
    if left.is_null() || right.is_null() {
        return Ok(false);
    }
    if let (Value::Object(_), Value::Object(_)) = (left, right) {
        let comparator = ctx.type_comparator();
        if comparator.can_compare(left, right) {
            return Ok(comparator.compare(left, right)? == Ordering::Equal);
        }
    }
    Ok(false)
}

/// Whole-input regular expression match.
pub(crate) fn matches_pattern(config: &ParserConfig, input: &str, pattern: &str) -> EvalResult<bool> {
    let length = pattern.chars().count();
    if length > config.max_regex_length {
        return Err(EvalErrorKind::MaxRegexLengthExceeded(length).into());
    }
    if let Some(regex) = PATTERNS.get(pattern) {
        return Ok(regex.is_match(input));
    }
    let regex = Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| {
        EvaluationError::from(EvalErrorKind::InvalidPattern {
            pattern: pattern.to_string(),
            cause: e.to_string(),
        })
    })?;
    if PATTERNS.len() >= MAX_CACHED_PATTERNS {
        tracing::debug!(size = PATTERNS.len(), "clearing pattern cache");
        PATTERNS.clear();
    }
    let matched = regex.is_match(input);
    PATTERNS.insert(pattern.to_string(), regex);
    Ok(matched)
}

/// Unary `+` and `-`.
pub(crate) fn unary_operation(ctx: &dyn EvaluationContext, op: UnaryOp, operand: &Value) -> EvalResult<Value> {
    match op {
        UnaryOp::Plus if operand.is_number() => Ok(operand.clone()),
        UnaryOp::Plus => operate(ctx, BinaryOp::Add, operand, &Value::Null),
        UnaryOp::Minus => match numeric::negate(operand) {
            Some(negated) => Ok(negated),
            None => operate(ctx, BinaryOp::Subtract, operand, &Value::Null),
        },
        UnaryOp::Not => match operand {
            Value::Boolean(b) => Ok(Value::Boolean(!b)),
            other => Err(not_supported("!", other, &Value::Null)),
        },
    }
}

impl ExpressionState<'_> {
    pub(crate) fn apply_binop(&mut self, op: BinaryOp, left: &Node, right: &Node) -> EvalResult<TypedValue> {
        match op {
            BinaryOp::And => {
                let result = self.boolean_operand(left)? && self.boolean_operand(right)?;
                return Ok(TypedValue::new(Value::Boolean(result)));
            }
            BinaryOp::Or => {
                let result = self.boolean_operand(left)? || self.boolean_operand(right)?;
                return Ok(TypedValue::new(Value::Boolean(result)));
            }
            _ => {}
        }
        let l = self.evaluate_value(left)?;
        let r = self.evaluate_value(right)?;
        binary_operation(self.context(), self.config(), op, &l, &r).map(TypedValue::new)
    }

    pub(crate) fn apply_unary(&mut self, op: UnaryOp, operand: &Node) -> EvalResult<TypedValue> {
        let value = match op {
            UnaryOp::Not => Value::Boolean(!self.boolean_operand(operand)?),
            _ => {
                let value = self.evaluate_value(operand)?;
                unary_operation(self.context(), op, &value)?
            }
        };
        Ok(TypedValue::new(value))
    }

    /// `++`/`--`: reads the operand, writes the stepped value back, and
    /// yields the new value for prefix form or the old one for postfix.
    pub(crate) fn apply_step(&mut self, op: StepOp, prefix: bool, operand: &Node) -> EvalResult<TypedValue> {
        let not_steppable = || -> EvaluationError {
            let description = operand.to_ast_string();
            let kind = match op {
                StepOp::Increment => EvalErrorKind::OperandNotIncrementable(description),
                StepOp::Decrement => EvalErrorKind::OperandNotDecrementable(description),
            };
            EvaluationError::at(kind, operand.span.start)
        };
        let (delta, arithmetic_op) = match op {
            StepOp::Increment => (1, BinaryOp::Add),
            StepOp::Decrement => (-1, BinaryOp::Subtract),
        };

        let value_ref = self.value_ref(operand)?;
        let old = self.read_ref(&value_ref)?;
        let new = match numeric::step(&old.value, delta) {
            Some(v) => v,
            None => operate(self.context(), arithmetic_op, &old.value, &Value::Int(1)).map_err(|e| {
                if matches!(e.kind, EvalErrorKind::OperatorNotSupported { .. }) {
                    not_steppable()
                } else {
                    e
                }
            })?,
        };
        self.write_ref(&value_ref, new.clone()).map_err(|e| {
            if matches!(e.kind, EvalErrorKind::NotAssignable(_)) {
                not_steppable()
            } else {
                e
            }
        })?;
        Ok(if prefix { TypedValue::new(new) } else { old })
    }
}

#[cfg(test)]
use crate::context::StandardEvaluationContext;

#[test]
fn test_string_operators() {
    let ctx = StandardEvaluationContext::new();
    let config = ParserConfig::interpreted();
    let repeated = binary_operation(&ctx, &config, BinaryOp::Multiply, &Value::string("ab"), &Value::Int(3));
    assert_eq!(repeated.unwrap(), Value::string("ababab"));
    let shifted = binary_operation(&ctx, &config, BinaryOp::Subtract, &Value::string("c"), &Value::Int(2));
    assert_eq!(shifted.unwrap(), Value::string("a"));
    let joined = binary_operation(&ctx, &config, BinaryOp::Add, &Value::string("n="), &Value::Null);
    assert_eq!(joined.unwrap(), Value::string("n=null"));
    let negative = binary_operation(&ctx, &config, BinaryOp::Multiply, &Value::string("x"), &Value::Int(-1));
    assert_eq!(negative.unwrap_err().code(), "NEGATIVE_REPEATED_TEXT_COUNT");
}

#[test]
fn test_nan_is_unordered() {
    let ctx = StandardEvaluationContext::new();
    let nan = Value::Double(f64::NAN);
    let ordering = compare_values(&ctx, &nan, &Value::Int(1)).unwrap();
    assert!(!ordering_holds(BinaryOp::LessThan, ordering));
    assert!(!ordering_holds(BinaryOp::GreaterEqual, ordering));
}

#[test]
fn test_matches_is_anchored() {
    let config = ParserConfig::interpreted();
    assert!(matches_pattern(&config, "abc", "a.c").unwrap());
    assert!(!matches_pattern(&config, "abcd", "a.c").unwrap());
    let err = matches_pattern(&config, "x", "(").unwrap_err();
    assert_eq!(err.code(), "INVALID_PATTERN");
}
