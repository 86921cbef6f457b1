use std::str::FromStr;

use num_bigint::BigInt;
use num_traits::ToPrimitive;
use rust_decimal::Decimal;

use crate::{
    error::{EvalErrorKind, EvaluationError},
    resolve::TypeConverter,
    types::{TypeInfo, TypeRef, builtins},
    value::{NumericKind, Value},
};

/// Conversions between the built-in types.
///
/// - numbers convert to every other numeric type, failing when the value
///   does not fit an `Int` or `Long` target
/// - everything converts to `String` through its display form
/// - strings convert to numbers and to `Boolean` (`true`/`on`/`yes`/`1`,
///   `false`/`off`/`no`/`0`; the empty string becomes null)
/// - lists convert to arrays and arrays to lists, element by element
#[derive(Debug, Default)]
pub struct StandardTypeConverter;

impl StandardTypeConverter {
    pub fn new() -> Self {
        StandardTypeConverter
    }
}

fn failure(value: &Value, target: &TypeInfo) -> EvaluationError {
    EvalErrorKind::TypeConversion {
        from: value.type_name().to_string(),
        to: target.name().to_string(),
    }
    .into()
}

fn is_list_like(target: &TypeInfo) -> bool {
    let b = builtins();
    [&b.list, &b.collection, &b.iterable]
        .iter()
        .any(|t| t.name() == target.name())
}

fn parse_integral(text: &str) -> Option<BigInt> {
    let text = text.trim();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let parsed = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
        .or_else(|| digits.strip_prefix('#'))
    {
        Some(hex) => BigInt::parse_bytes(hex.as_bytes(), 16)?,
        None => BigInt::from_str(digits).ok()?,
    };
    Some(if negative { -parsed } else { parsed })
}

/// Converts a number or numeric string to `kind`, rejecting values that
/// overflow the fixed-width integer kinds.
fn to_numeric(value: &Value, kind: NumericKind) -> Option<Value> {
    if let Value::String(s) = value {
        let s = s.trim();
        return match kind {
            NumericKind::Int => parse_integral(s)?.to_i32().map(Value::Int),
            NumericKind::Long => parse_integral(s)?.to_i64().map(Value::Long),
            NumericKind::BigInteger => parse_integral(s).map(Value::BigInteger),
            NumericKind::Float => s.parse::<f32>().ok().map(Value::Float),
            NumericKind::Double => s.parse::<f64>().ok().map(Value::Double),
            NumericKind::BigDecimal => Decimal::from_str(s)
                .or_else(|_| Decimal::from_scientific(s))
                .ok()
                .map(Value::BigDecimal),
        };
    }

    value.numeric_kind()?;
    Some(match kind {
        NumericKind::Int => Value::Int(value.to_bigint()?.to_i32()?),
        NumericKind::Long => Value::Long(value.to_bigint()?.to_i64()?),
        NumericKind::Float => Value::Float(value.to_f64()? as f32),
        NumericKind::Double => Value::Double(value.to_f64()?),
        NumericKind::BigInteger => Value::BigInteger(value.to_bigint()?),
        NumericKind::BigDecimal => Value::BigDecimal(value.to_decimal()?),
    })
}

fn to_boolean(text: &str) -> Option<Value> {
    match text.trim().to_ascii_lowercase().as_str() {
        "" => Some(Value::Null),
        "true" | "on" | "yes" | "1" => Some(Value::Boolean(true)),
        "false" | "off" | "no" | "0" => Some(Value::Boolean(false)),
        _ => None,
    }
}

impl TypeConverter for StandardTypeConverter {
    fn can_convert(&self, source: Option<&TypeRef>, target: &TypeRef) -> bool {
        let Some(source) = source else {
            return true;
        };
        if target.is_assignable_from(source) {
            return true;
        }
        let b = builtins();
        let source_numeric = NumericKind::from_type_name(source.name()).is_some();
        let target_numeric = NumericKind::from_type_name(target.name()).is_some()
            || target.name() == b.number.name();
        if target.name() == b.string.name() {
            return true;
        }
        if source.name() == b.string.name() {
            return target_numeric || target.name() == b.boolean.name();
        }
        if source_numeric && target_numeric {
            return true;
        }
        if source.name() == b.list.name() && target.is_array() {
            return true;
        }
        source.is_array() && is_list_like(target)
    }

    fn convert_value(&self, value: &Value, target: &TypeRef) -> Result<Value, EvaluationError> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        if let Some(actual) = value.runtime_type()
            && target.is_assignable_from(&actual)
        {
            return Ok(value.clone());
        }

        let b = builtins();
        if target.name() == b.string.name() {
            return Ok(Value::String(value.to_string()));
        }
        if let Some(kind) = NumericKind::from_type_name(target.name()) {
            return to_numeric(value, kind).ok_or_else(|| failure(value, target));
        }
        if target.name() == b.number.name() {
            // a numeric string widens to the smallest kind that holds it
            if let Value::String(s) = value {
                return [NumericKind::Int, NumericKind::Long, NumericKind::Double]
                    .into_iter()
                    .find_map(|k| to_numeric(&Value::String(s.clone()), k))
                    .ok_or_else(|| failure(value, target));
            }
        }
        if target.name() == b.boolean.name() {
            if let Value::String(s) = value {
                return to_boolean(s).ok_or_else(|| failure(value, target));
            }
        }

        match value {
            Value::List(list) if target.is_array() => {
                let component = target
                    .component_type()
                    .cloned()
                    .unwrap_or_else(|| b.object.clone());
                let items = list
                    .read()
                    .iter()
                    .map(|item| self.convert_value(item, &component))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::array(&component, items))
            }
            Value::Array(array) if is_list_like(target) => Ok(Value::list(array.read().clone())),
            _ => Err(failure(value, target)),
        }
    }
}

#[test]
fn test_string_to_boolean() {
    let converter = StandardTypeConverter::new();
    let boolean = &builtins().boolean;
    assert_eq!(
        converter.convert_value(&Value::string("yes"), boolean).unwrap(),
        Value::Boolean(true)
    );
    assert_eq!(
        converter.convert_value(&Value::string(""), boolean).unwrap(),
        Value::Null
    );
    assert!(converter.convert_value(&Value::string("maybe"), boolean).is_err());
}

#[test]
fn test_narrowing_overflow_fails() {
    let converter = StandardTypeConverter::new();
    let integer = &builtins().integer;
    assert_eq!(
        converter.convert_value(&Value::Long(7), integer).unwrap(),
        Value::Int(7)
    );
    assert!(converter.convert_value(&Value::Long(1 << 40), integer).is_err());
    assert_eq!(
        converter.convert_value(&Value::Double(3.9), integer).unwrap(),
        Value::Int(3)
    );
}
