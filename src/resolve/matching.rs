//! Matching supplied argument types against parameter lists, and the
//! conversions a chosen candidate needs.

use crate::{
    error::EvaluationError,
    resolve::TypeConverter,
    types::{TypeInfo, TypeRef},
    value::Value,
};

/// How well a candidate's parameters fit the supplied arguments, best
/// first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ArgumentsMatchKind {
    /// Every argument has exactly the parameter type
    Exact,
    /// Every argument is assignable to its parameter
    Close,
    /// At least one argument goes through the type converter
    RequiresConversion,
}

/// Folds one argument into the running match kind; `None` means no match.
fn match_argument(
    current: ArgumentsMatchKind,
    expected: &TypeRef,
    supplied: Option<&TypeRef>,
    converter: &dyn TypeConverter,
) -> Option<ArgumentsMatchKind> {
    let Some(supplied) = supplied else {
        return Some(current);
    };
    if expected.name() == supplied.name() {
        return Some(current);
    }
    if expected.is_assignable_from(supplied) {
        return Some(current.max(ArgumentsMatchKind::Close));
    }
    if converter.can_convert(Some(supplied), expected) {
        return Some(ArgumentsMatchKind::RequiresConversion);
    }
    None
}

/// Compares a fixed-arity parameter list with the supplied argument types.
pub fn compare_arguments(
    expected: &[TypeRef],
    supplied: &[Option<TypeRef>],
    converter: &dyn TypeConverter,
) -> Option<ArgumentsMatchKind> {
    if expected.len() != supplied.len() {
        return None;
    }
    expected
        .iter()
        .zip(supplied)
        .try_fold(ArgumentsMatchKind::Exact, |kind, (e, s)| {
            match_argument(kind, e, s.as_ref(), converter)
        })
}

/// Compares a parameter list whose last entry is a variable-arity array.
pub fn compare_arguments_varargs(
    expected: &[TypeRef],
    supplied: &[Option<TypeRef>],
    converter: &dyn TypeConverter,
) -> Option<ArgumentsMatchKind> {
    let (varargs, fixed) = expected.split_last()?;
    if supplied.len() < fixed.len() {
        return None;
    }

    let mut kind = ArgumentsMatchKind::Exact;
    for (e, s) in fixed.iter().zip(supplied) {
        kind = match_argument(kind, e, s.as_ref(), converter)?;
    }

    // an array passed in the varargs position goes through as is
    if supplied.len() == expected.len()
        && let Some(Some(last)) = supplied.last()
        && last.is_array()
        && varargs.is_assignable_from(last)
    {
        let kind = if last.name() == varargs.name() {
            kind
        } else {
            kind.max(ArgumentsMatchKind::Close)
        };
        return Some(kind);
    }

    let component = varargs.component_type()?;
    for s in &supplied[fixed.len()..] {
        kind = match_argument(kind, component, s.as_ref(), converter)?;
    }
    Some(kind)
}

/// Distance between parameter and argument types: two per superclass hop,
/// one more for an interface parameter. `u32::MAX` when an argument does
/// not fit.
pub fn type_difference_weight(params: &[TypeRef], args: &[Option<TypeRef>]) -> u32 {
    let mut result: u32 = 0;
    for (param, arg) in params.iter().zip(args) {
        let Some(arg) = arg else {
            continue;
        };
        if !param.is_assignable_from(arg) {
            return u32::MAX;
        }
        let mut superclass = arg.superclass().cloned();
        while let Some(sup) = superclass {
            if param.name() == sup.name() {
                result += 2;
                superclass = None;
            } else if param.is_assignable_from(&sup) {
                result += 2;
                superclass = sup.superclass().cloned();
            } else {
                superclass = None;
            }
        }
        if param.is_interface() {
            result += 1;
        }
    }
    result
}

fn needs_conversion(value: &Value, target: &TypeInfo) -> bool {
    match value.runtime_type() {
        None => false,
        Some(actual) => !target.is_assignable_from(&actual),
    }
}

/// Converts `args` to the parameter types, packing trailing arguments into
/// an array for variable-arity parameter lists. Returns whether anything
/// was converted or packed.
pub fn convert_arguments(
    converter: &dyn TypeConverter,
    mut args: Vec<Value>,
    params: &[TypeRef],
    varargs: bool,
) -> Result<(Vec<Value>, bool), EvaluationError> {
    let mut converted = false;

    if !varargs {
        for (arg, param) in args.iter_mut().zip(params) {
            if needs_conversion(arg, param) {
                *arg = converter.convert_value(arg, param)?;
                converted = true;
            }
        }
        return Ok((args, converted));
    }

    let Some((array_type, fixed)) = params.split_last() else {
        return Ok((args, false));
    };
    for (arg, param) in args.iter_mut().zip(fixed) {
        if needs_conversion(arg, param) {
            *arg = converter.convert_value(arg, param)?;
            converted = true;
        }
    }

    let passes_array = args.len() == params.len()
        && args.last().is_some_and(|last| {
            matches!(last, Value::Array(_)) && !needs_conversion(last, array_type)
        });
    if passes_array {
        return Ok((args, converted));
    }

    let component = array_type
        .component_type()
        .cloned()
        .unwrap_or_else(|| crate::types::builtins().object.clone());
    let rest = args.split_off(fixed.len().min(args.len()));
    let mut packed = Vec::with_capacity(rest.len());
    for arg in rest {
        if needs_conversion(&arg, &component) {
            packed.push(converter.convert_value(&arg, &component)?);
        } else {
            packed.push(arg);
        }
    }
    args.push(Value::array(&component, packed));
    Ok((args, true))
}

#[cfg(test)]
use crate::resolve::StandardTypeConverter;
#[cfg(test)]
use crate::types::builtins;

#[test]
fn test_exact_close_and_conversion() {
    let b = builtins();
    let converter = StandardTypeConverter::new();
    assert_eq!(
        compare_arguments(&[b.string.clone()], &[Some(b.string.clone())], &converter),
        Some(ArgumentsMatchKind::Exact)
    );
    assert_eq!(
        compare_arguments(&[b.object.clone()], &[Some(b.string.clone())], &converter),
        Some(ArgumentsMatchKind::Close)
    );
    assert_eq!(
        compare_arguments(&[b.integer.clone()], &[Some(b.string.clone())], &converter),
        Some(ArgumentsMatchKind::RequiresConversion)
    );
}

#[test]
fn test_weight_prefers_nearer_supertype() {
    let b = builtins();
    let long = [Some(b.long.clone())];
    assert!(
        type_difference_weight(&[b.number.clone()], &long)
            < type_difference_weight(&[b.object.clone()], &long)
    );
}

#[test]
fn test_varargs_packing() {
    let b = builtins();
    let converter = StandardTypeConverter::new();
    let params = [b.string.clone(), TypeInfo::array_of(&b.string)];
    let (args, packed) = convert_arguments(
        &converter,
        vec![Value::string(","), Value::string("a"), Value::string("b")],
        &params,
        true,
    )
    .unwrap();
    assert!(packed);
    assert_eq!(args.len(), 2);
    assert!(matches!(&args[1], Value::Array(a) if a.len() == 2));
}
