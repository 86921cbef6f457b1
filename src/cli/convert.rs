//! JSON <-> expression Value conversion

use indexmap::IndexMap;
use num_traits::ToPrimitive;

use crate::Value;

/// Convert a JSON document to a Value. Integers become `Int` when they fit,
/// `Long` otherwise; objects become maps keyed by strings.
pub fn json_to_value(v: serde_json::Value) -> Value {
    match v {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Boolean(b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i32::try_from(i).map(Value::Int).unwrap_or(Value::Long(i))
            } else if let Some(u) = n.as_u64() {
                Value::BigInteger(u.into())
            } else {
                Value::Double(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(arr) => Value::list(arr.into_iter().map(json_to_value).collect()),
        serde_json::Value::Object(obj) => Value::map(
            obj.into_iter()
                .map(|(k, v)| (Value::String(k), json_to_value(v)))
                .collect::<IndexMap<_, _>>(),
        ),
    }
}

fn number(n: f64) -> serde_json::Value {
    serde_json::Number::from_f64(n)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

/// Convert a Value to JSON. Big decimals keep their scale as strings; host
/// objects, types and functions render as their display text.
pub fn value_to_json(v: &Value) -> serde_json::Value {
    match v {
        Value::Null => serde_json::Value::Null,
        Value::Boolean(b) => serde_json::Value::Bool(*b),
        Value::Int(i) => serde_json::Value::Number((*i).into()),
        Value::Long(i) => serde_json::Value::Number((*i).into()),
        Value::Float(f) => number(f64::from(*f)),
        Value::Double(f) => number(*f),
        Value::BigInteger(n) => match n.to_i64() {
            Some(i) => serde_json::Value::Number(i.into()),
            None => serde_json::Value::String(n.to_string()),
        },
        Value::BigDecimal(d) => serde_json::Value::String(d.to_string()),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::List(list) => serde_json::Value::Array(list.read().iter().map(value_to_json).collect()),
        Value::Array(array) => serde_json::Value::Array(array.read().iter().map(value_to_json).collect()),
        Value::Map(map) => serde_json::Value::Object(
            map.read()
                .iter()
                .map(|(k, v)| {
                    let key = match k {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (key, value_to_json(v))
                })
                .collect(),
        ),
        Value::Object(_) | Value::Type(_) | Value::Function(_) => {
            serde_json::Value::String(v.to_string())
        }
    }
}

#[test]
fn test_json_numbers_pick_the_narrowest_type() {
    use pretty_assertions::assert_eq;

    let value = json_to_value(serde_json::json!([1, 3000000000i64, 1.5]));
    let Value::List(list) = value else {
        panic!("expected a list");
    };
    assert_eq!(
        *list.read(),
        vec![Value::Int(1), Value::Long(3_000_000_000), Value::Double(1.5)]
    );
}

#[test]
fn test_value_to_json_keeps_map_order() {
    let mut entries = IndexMap::new();
    entries.insert(Value::string("b"), Value::Int(1));
    entries.insert(Value::Int(2), Value::Boolean(true));
    let json = value_to_json(&Value::map(entries));
    assert_eq!(serde_json::to_string(&json).unwrap(), r#"{"b":1,"2":true}"#);
}
