//! Numeric promotion and arithmetic shared by the interpreter, the
//! compiler and the standard comparator.
//!
//! Both operands are promoted to the higher of their two kinds on the
//! ladder `Int < Long < Float < Double < BigInteger < BigDecimal`, and the
//! operation runs in that kind. `Int` and `Long` wrap on overflow.

use std::cmp::Ordering;

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};
use rust_decimal::{Decimal, MathematicalOps, RoundingStrategy};

use crate::{
    ast::BinaryOp,
    error::{EvalErrorKind, EvaluationError},
    value::{NumericKind, Value},
};

/// The kind both operands are promoted to, if both are numbers.
pub fn promote(left: &Value, right: &Value) -> Option<NumericKind> {
    Some(left.numeric_kind()?.max(right.numeric_kind()?))
}

fn overflow(op: BinaryOp) -> EvaluationError {
    EvalErrorKind::ArithmeticOverflow(op.symbol().to_string()).into()
}

fn unconvertible(value: &Value, kind: NumericKind) -> EvaluationError {
    EvalErrorKind::TypeConversion {
        from: value.type_name().to_string(),
        to: kind.type_name().to_string(),
    }
    .into()
}

fn as_i32(value: &Value) -> i32 {
    match value {
        Value::Int(n) => *n,
        other => other.to_i64().unwrap_or_default() as i32,
    }
}

fn as_i64(value: &Value) -> i64 {
    value.to_i64().unwrap_or_default()
}

fn as_f32(value: &Value) -> f32 {
    match value {
        Value::Float(n) => *n,
        other => other.to_f64().unwrap_or_default() as f32,
    }
}

fn as_f64(value: &Value) -> f64 {
    value.to_f64().unwrap_or_default()
}

fn as_bigint(value: &Value) -> Result<BigInt, EvaluationError> {
    value
        .to_bigint()
        .ok_or_else(|| unconvertible(value, NumericKind::BigInteger))
}

fn as_decimal(value: &Value) -> Result<Decimal, EvaluationError> {
    value
        .to_decimal()
        .ok_or_else(|| unconvertible(value, NumericKind::BigDecimal))
}

/// Applies one of `+ - * / %` to two numbers.
pub fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, EvaluationError> {
    let Some(kind) = promote(left, right) else {
        return Err(EvalErrorKind::OperatorNotSupported {
            operator: op.symbol().to_string(),
            left: left.type_name().to_string(),
            right: right.type_name().to_string(),
        }
        .into());
    };

    match kind {
        NumericKind::Int => {
            let (l, r) = (as_i32(left), as_i32(right));
            let result = match op {
                BinaryOp::Add => l.wrapping_add(r),
                BinaryOp::Subtract => l.wrapping_sub(r),
                BinaryOp::Multiply => l.wrapping_mul(r),
                BinaryOp::Divide if r == 0 => return Err(EvalErrorKind::DivisionByZero.into()),
                BinaryOp::Divide => l.wrapping_div(r),
                BinaryOp::Modulo if r == 0 => return Err(EvalErrorKind::DivisionByZero.into()),
                BinaryOp::Modulo => l.wrapping_rem(r),
                _ => return Err(overflow(op)),
            };
            Ok(Value::Int(result))
        }
        NumericKind::Long => {
            let (l, r) = (as_i64(left), as_i64(right));
            let result = match op {
                BinaryOp::Add => l.wrapping_add(r),
                BinaryOp::Subtract => l.wrapping_sub(r),
                BinaryOp::Multiply => l.wrapping_mul(r),
                BinaryOp::Divide if r == 0 => return Err(EvalErrorKind::DivisionByZero.into()),
                BinaryOp::Divide => l.wrapping_div(r),
                BinaryOp::Modulo if r == 0 => return Err(EvalErrorKind::DivisionByZero.into()),
                BinaryOp::Modulo => l.wrapping_rem(r),
                _ => return Err(overflow(op)),
            };
            Ok(Value::Long(result))
        }
        NumericKind::Float => {
            let (l, r) = (as_f32(left), as_f32(right));
            let result = match op {
                BinaryOp::Add => l + r,
                BinaryOp::Subtract => l - r,
                BinaryOp::Multiply => l * r,
                BinaryOp::Divide => l / r,
                BinaryOp::Modulo => l % r,
                _ => return Err(overflow(op)),
            };
            Ok(Value::Float(result))
        }
        NumericKind::Double => {
            let (l, r) = (as_f64(left), as_f64(right));
            let result = match op {
                BinaryOp::Add => l + r,
                BinaryOp::Subtract => l - r,
                BinaryOp::Multiply => l * r,
                BinaryOp::Divide => l / r,
                BinaryOp::Modulo => l % r,
                _ => return Err(overflow(op)),
            };
            Ok(Value::Double(result))
        }
        NumericKind::BigInteger => {
            let (l, r) = (as_bigint(left)?, as_bigint(right)?);
            let result = match op {
                BinaryOp::Add => l + r,
                BinaryOp::Subtract => l - r,
                BinaryOp::Multiply => l * r,
                BinaryOp::Divide | BinaryOp::Modulo if r.is_zero() => {
                    return Err(EvalErrorKind::DivisionByZero.into());
                }
                BinaryOp::Divide => l / r,
                BinaryOp::Modulo => l % r,
                _ => return Err(overflow(op)),
            };
            Ok(Value::BigInteger(result))
        }
        NumericKind::BigDecimal => {
            let (l, r) = (as_decimal(left)?, as_decimal(right)?);
            let result = match op {
                BinaryOp::Add => l.checked_add(r),
                BinaryOp::Subtract => l.checked_sub(r),
                BinaryOp::Multiply => l.checked_mul(r),
                BinaryOp::Divide | BinaryOp::Modulo if r.is_zero() => {
                    return Err(EvalErrorKind::DivisionByZero.into());
                }
                BinaryOp::Divide => {
                    let scale = l.scale().max(r.scale());
                    l.checked_div(r).map(|q| {
                        q.round_dp_with_strategy(scale, RoundingStrategy::MidpointNearestEven)
                    })
                }
                BinaryOp::Modulo => l.checked_rem(r),
                _ => None,
            };
            result.map(Value::BigDecimal).ok_or_else(|| overflow(op))
        }
    }
}

/// `left ^ right`. Arbitrary-precision bases keep their kind and take an
/// integral exponent; otherwise the power is computed in double and
/// narrowed to the widest fixed kind of the operands.
pub fn power(left: &Value, right: &Value) -> Result<Value, EvaluationError> {
    let (Some(lk), Some(rk)) = (left.numeric_kind(), right.numeric_kind()) else {
        return Err(EvalErrorKind::OperatorNotSupported {
            operator: "^".to_string(),
            left: left.type_name().to_string(),
            right: right.type_name().to_string(),
        }
        .into());
    };

    match left {
        Value::BigDecimal(base) => {
            let exponent = as_i64(right);
            return base
                .checked_powi(exponent)
                .map(Value::BigDecimal)
                .ok_or_else(|| overflow(BinaryOp::Power));
        }
        Value::BigInteger(base) => {
            let exponent = as_i64(right)
                .to_u32()
                .ok_or_else(|| overflow(BinaryOp::Power))?;
            return Ok(Value::BigInteger(base.pow(exponent)));
        }
        _ => {}
    }

    let result = as_f64(left).powf(as_f64(right));
    let widest = lk.max(rk);
    Ok(match widest {
        NumericKind::Double | NumericKind::BigInteger | NumericKind::BigDecimal => {
            Value::Double(result)
        }
        NumericKind::Float => Value::Float(result as f32),
        NumericKind::Long => Value::Long(result as i64),
        NumericKind::Int if result > i32::MAX as f64 => Value::Long(result as i64),
        NumericKind::Int => Value::Int(result as i32),
    })
}

/// Negates a number in its own kind.
pub fn negate(value: &Value) -> Option<Value> {
    Some(match value {
        Value::Int(n) => Value::Int(n.wrapping_neg()),
        Value::Long(n) => Value::Long(n.wrapping_neg()),
        Value::Float(n) => Value::Float(-n),
        Value::Double(n) => Value::Double(-n),
        Value::BigInteger(n) => Value::BigInteger(-n),
        Value::BigDecimal(n) => Value::BigDecimal(-*n),
        _ => return None,
    })
}

/// Adds one (or subtracts one) keeping the operand's kind.
pub fn step(value: &Value, delta: i32) -> Option<Value> {
    Some(match value {
        Value::Int(n) => Value::Int(n.wrapping_add(delta)),
        Value::Long(n) => Value::Long(n.wrapping_add(delta as i64)),
        Value::Float(n) => Value::Float(n + delta as f32),
        Value::Double(n) => Value::Double(n + delta as f64),
        Value::BigInteger(n) => Value::BigInteger(n + delta),
        Value::BigDecimal(n) => Value::BigDecimal(*n + Decimal::from(delta)),
        _ => return None,
    })
}

/// Orders two numbers on the ladder; doubles follow total ordering so NaN
/// sorts last.
pub fn compare_numbers(left: &Value, right: &Value) -> Option<Ordering> {
    let kind = promote(left, right)?;
    let mixed_real = matches!(
        (left.numeric_kind()?, right.numeric_kind()?),
        (NumericKind::Float | NumericKind::Double, NumericKind::BigInteger)
            | (NumericKind::BigInteger, NumericKind::Float | NumericKind::Double)
    );
    if mixed_real {
        return Some(as_f64(left).total_cmp(&as_f64(right)));
    }
    Some(match kind {
        NumericKind::Int | NumericKind::Long => as_i64(left).cmp(&as_i64(right)),
        NumericKind::Float => as_f32(left).total_cmp(&as_f32(right)),
        NumericKind::Double => as_f64(left).total_cmp(&as_f64(right)),
        NumericKind::BigInteger => left.to_bigint()?.cmp(&right.to_bigint()?),
        NumericKind::BigDecimal => match (left.to_decimal(), right.to_decimal()) {
            (Some(l), Some(r)) => l.cmp(&r),
            _ => as_f64(left).total_cmp(&as_f64(right)),
        },
    })
}

/// Numeric equality on the ladder. Reals compare by value, so `0.0 == -0.0`
/// and NaN equals nothing.
pub fn numbers_equal(left: &Value, right: &Value) -> Option<bool> {
    let kind = promote(left, right)?;
    Some(match kind {
        NumericKind::Float | NumericKind::Double => as_f64(left) == as_f64(right),
        _ if left.numeric_kind()? > NumericKind::Double
            && right.numeric_kind()? <= NumericKind::Double
            && !right.numeric_kind()?.is_integral() =>
        {
            as_f64(left) == as_f64(right)
        }
        _ if right.numeric_kind()? > NumericKind::Double
            && left.numeric_kind()? <= NumericKind::Double
            && !left.numeric_kind()?.is_integral() =>
        {
            as_f64(left) == as_f64(right)
        }
        _ => compare_numbers(left, right)? == Ordering::Equal,
    })
}

/// Whether a number is zero-valued, used by the truthiness-free boolean
/// conversions of the standard converter.
pub fn is_zero(value: &Value) -> bool {
    match value {
        Value::BigInteger(n) => n.is_zero(),
        Value::BigDecimal(n) => n.is_zero(),
        other => other.to_f64() == Some(0.0),
    }
}

/// Absolute value, used by `Math.abs` style helpers.
pub fn abs(value: &Value) -> Option<Value> {
    Some(match value {
        Value::Int(n) => Value::Int(n.wrapping_abs()),
        Value::Long(n) => Value::Long(n.wrapping_abs()),
        Value::Float(n) => Value::Float(n.abs()),
        Value::Double(n) => Value::Double(n.abs()),
        Value::BigInteger(n) => Value::BigInteger(n.abs()),
        Value::BigDecimal(n) => Value::BigDecimal(n.abs()),
        _ => return None,
    })
}

#[test]
fn test_promotion() {
    assert_eq!(
        arithmetic(BinaryOp::Add, &Value::Int(1), &Value::Double(1.0)).unwrap(),
        Value::Double(2.0)
    );
    assert_eq!(
        arithmetic(BinaryOp::Add, &Value::Int(1), &Value::Long(1)).unwrap(),
        Value::Long(2)
    );
    assert_eq!(
        arithmetic(BinaryOp::Add, &Value::BigDecimal(Decimal::ONE), &Value::Int(1)).unwrap(),
        Value::BigDecimal(Decimal::from(2))
    );
}

#[test]
fn test_int_wraps() {
    assert_eq!(
        arithmetic(BinaryOp::Add, &Value::Int(i32::MAX), &Value::Int(1)).unwrap(),
        Value::Int(i32::MIN)
    );
}

#[test]
fn test_integral_division_by_zero() {
    let err = arithmetic(BinaryOp::Divide, &Value::Int(1), &Value::Int(0)).unwrap_err();
    assert_eq!(err.kind, EvalErrorKind::DivisionByZero);
    assert_eq!(
        arithmetic(BinaryOp::Divide, &Value::Double(1.0), &Value::Int(0)).unwrap(),
        Value::Double(f64::INFINITY)
    );
}

#[test]
fn test_decimal_division_keeps_scale() {
    let l = Value::BigDecimal("1.00".parse().unwrap());
    let r = Value::BigDecimal("3".parse().unwrap());
    assert_eq!(
        arithmetic(BinaryOp::Divide, &l, &r).unwrap(),
        Value::BigDecimal("0.33".parse().unwrap())
    );
}

#[test]
fn test_power_narrows() {
    assert_eq!(power(&Value::Int(2), &Value::Int(10)).unwrap(), Value::Int(1024));
    assert_eq!(power(&Value::Int(2), &Value::Int(40)).unwrap(), Value::Long(1 << 40));
    assert_eq!(power(&Value::Long(2), &Value::Int(3)).unwrap(), Value::Long(8));
}
