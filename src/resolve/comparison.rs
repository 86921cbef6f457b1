use std::cmp::Ordering;

use crate::{
    error::{EvalErrorKind, EvaluationError},
    numeric,
    resolve::TypeComparator,
    value::Value,
};

/// Orders nulls first, numbers on the promotion ladder, strings
/// lexicographically, `false` before `true`, and host objects through
/// [`crate::value::HostObject::compare_to`].
#[derive(Debug, Default)]
pub struct StandardTypeComparator;

impl StandardTypeComparator {
    pub fn new() -> Self {
        StandardTypeComparator
    }
}

fn not_comparable(left: &Value, right: &Value) -> EvaluationError {
    EvalErrorKind::NotComparable {
        left: left.type_name().to_string(),
        right: right.type_name().to_string(),
    }
    .into()
}

impl TypeComparator for StandardTypeComparator {
    fn can_compare(&self, left: &Value, right: &Value) -> bool {
        match (left, right) {
            (Value::Null, _) | (_, Value::Null) => true,
            (l, r) if l.is_number() && r.is_number() => true,
            (Value::String(_), Value::String(_)) | (Value::Boolean(_), Value::Boolean(_)) => true,
            (Value::Object(l), Value::Object(r)) => l.compare_to(r.as_ref()).is_some(),
            _ => false,
        }
    }

    fn compare(&self, left: &Value, right: &Value) -> Result<Ordering, EvaluationError> {
        match (left, right) {
            (Value::Null, Value::Null) => Ok(Ordering::Equal),
            (Value::Null, _) => Ok(Ordering::Less),
            (_, Value::Null) => Ok(Ordering::Greater),
            (Value::String(l), Value::String(r)) => Ok(l.cmp(r)),
            (Value::Boolean(l), Value::Boolean(r)) => Ok(l.cmp(r)),
            (Value::Object(l), Value::Object(r)) => l
                .compare_to(r.as_ref())
                .ok_or_else(|| not_comparable(left, right)),
            _ => numeric::compare_numbers(left, right).ok_or_else(|| not_comparable(left, right)),
        }
    }
}

#[test]
fn test_nulls_sort_first() {
    let cmp = StandardTypeComparator::new();
    assert_eq!(cmp.compare(&Value::Null, &Value::Int(0)).unwrap(), Ordering::Less);
    assert_eq!(
        cmp.compare(&Value::Long(3), &Value::Double(2.5)).unwrap(),
        Ordering::Greater
    );
    assert!(cmp.compare(&Value::string("a"), &Value::Int(1)).is_err());
}
