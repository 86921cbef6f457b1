//! The built-in `lang.*` types and their members.

use std::str::FromStr;

use indexmap::IndexMap;
use num_bigint::BigInt;
use once_cell::sync::Lazy;
use rust_decimal::Decimal;

use crate::error::AccessError;
use crate::types::{ConstructorInfo, FieldInfo, Members, MethodInfo, TypeInfo, TypeKind, TypeRef};
use crate::value::{ListRef, MapEntry, MapRef, Value};

pub const OBJECT: &str = "lang.Object";
pub const COMPARABLE: &str = "lang.Comparable";
pub const CHAR_SEQUENCE: &str = "lang.CharSequence";
pub const ITERABLE: &str = "lang.Iterable";
pub const COLLECTION: &str = "lang.Collection";
pub const NUMBER: &str = "lang.Number";
pub const BOOLEAN: &str = "lang.Boolean";
pub const INTEGER: &str = "lang.Integer";
pub const LONG: &str = "lang.Long";
pub const FLOAT: &str = "lang.Float";
pub const DOUBLE: &str = "lang.Double";
pub const BIG_INTEGER: &str = "lang.BigInteger";
pub const BIG_DECIMAL: &str = "lang.BigDecimal";
pub const STRING: &str = "lang.String";
pub const LIST: &str = "lang.List";
pub const MAP: &str = "lang.Map";
pub const MAP_ENTRY: &str = "lang.MapEntry";
pub const CLASS: &str = "lang.Class";
pub const FUNCTION: &str = "lang.Function";
pub const MATH: &str = "lang.Math";

pub struct Builtins {
    pub object: TypeRef,
    pub comparable: TypeRef,
    pub char_sequence: TypeRef,
    pub iterable: TypeRef,
    pub collection: TypeRef,
    pub number: TypeRef,
    pub boolean: TypeRef,
    pub integer: TypeRef,
    pub long: TypeRef,
    pub float: TypeRef,
    pub double: TypeRef,
    pub big_integer: TypeRef,
    pub big_decimal: TypeRef,
    pub string: TypeRef,
    pub list: TypeRef,
    pub map: TypeRef,
    pub map_entry: TypeRef,
    pub class: TypeRef,
    pub function: TypeRef,
    pub math: TypeRef,
}

static BUILTINS: Lazy<Builtins> = Lazy::new(Builtins::create);

/// The process-wide table of built-in types.
pub fn builtins() -> &'static Builtins {
    &BUILTINS
}

fn class(name: &str, superclass: &TypeRef, interfaces: &[&TypeRef]) -> TypeRef {
    TypeInfo::declare(
        name,
        TypeKind::Class,
        Some(superclass.clone()),
        interfaces.iter().map(|t| (*t).clone()).collect(),
    )
}

fn interface(name: &str, extends: &[&TypeRef]) -> TypeRef {
    TypeInfo::declare(
        name,
        TypeKind::Interface,
        None,
        extends.iter().map(|t| (*t).clone()).collect(),
    )
}

fn mismatch(expected: &str, actual: &Value) -> AccessError {
    AccessError::incompatible(format!(
        "expected {} but was {}",
        expected,
        actual.type_name()
    ))
}

fn arg(args: &[Value], i: usize) -> Result<&Value, AccessError> {
    args.get(i)
        .ok_or_else(|| AccessError::incompatible(format!("missing argument {}", i)))
}

fn int_arg(args: &[Value], i: usize) -> Result<i32, AccessError> {
    match arg(args, i)? {
        Value::Int(n) => Ok(*n),
        other => Err(mismatch(INTEGER, other)),
    }
}

fn long_arg(args: &[Value], i: usize) -> Result<i64, AccessError> {
    match arg(args, i)? {
        Value::Long(n) => Ok(*n),
        other => Err(mismatch(LONG, other)),
    }
}

fn double_arg(args: &[Value], i: usize) -> Result<f64, AccessError> {
    match arg(args, i)? {
        Value::Double(n) => Ok(*n),
        other => Err(mismatch(DOUBLE, other)),
    }
}

fn str_arg(args: &[Value], i: usize) -> Result<&str, AccessError> {
    match arg(args, i)? {
        Value::String(s) => Ok(s),
        other => Err(mismatch(STRING, other)),
    }
}

fn this_str(target: &Value) -> Result<&str, AccessError> {
    match target {
        Value::String(s) => Ok(s),
        other => Err(mismatch(STRING, other)),
    }
}

fn this_list(target: &Value) -> Result<&ListRef, AccessError> {
    match target {
        Value::List(l) => Ok(l),
        other => Err(mismatch(LIST, other)),
    }
}

fn this_map(target: &Value) -> Result<&MapRef, AccessError> {
    match target {
        Value::Map(m) => Ok(m),
        other => Err(mismatch(MAP, other)),
    }
}

fn this_entry(target: &Value) -> Result<&MapEntry, AccessError> {
    target
        .downcast_ref::<MapEntry>()
        .ok_or_else(|| mismatch(MAP_ENTRY, target))
}

fn this_type(target: &Value) -> Result<&TypeRef, AccessError> {
    match target {
        Value::Type(t) => Ok(t),
        other => Err(mismatch(CLASS, other)),
    }
}

fn this_number(target: &Value) -> Result<&Value, AccessError> {
    if target.is_number() {
        Ok(target)
    } else {
        Err(mismatch(NUMBER, target))
    }
}

fn char_index(s: &str, index: i32) -> Result<usize, AccessError> {
    let len = s.chars().count();
    if index < 0 || index as usize > len {
        return Err(AccessError::invocation(format!(
            "index {} out of bounds for length {}",
            index, len
        )));
    }
    Ok(index as usize)
}

fn substring(s: &str, begin: i32, end: i32) -> Result<Value, AccessError> {
    let b = char_index(s, begin)?;
    let e = char_index(s, end)?;
    if b > e {
        return Err(AccessError::invocation(format!(
            "begin {} greater than end {}",
            begin, end
        )));
    }
    Ok(Value::String(s.chars().skip(b).take(e - b).collect()))
}

fn checked_modification(list: &ListRef) -> Result<(), AccessError> {
    if list.is_read_only() {
        Err(AccessError::invocation("the collection cannot be modified"))
    } else {
        Ok(())
    }
}

fn parse_decimal(text: &str) -> Result<Decimal, AccessError> {
    Decimal::from_str_exact(text)
        .or_else(|_| Decimal::from_scientific(text))
        .map_err(|e| AccessError::invocation(format!("'{}' is not a decimal: {}", text, e)))
}

impl Builtins {
    fn create() -> Self {
        let object = TypeInfo::declare(OBJECT, TypeKind::Class, None, Vec::new());
        let comparable = interface(COMPARABLE, &[]);
        let char_sequence = interface(CHAR_SEQUENCE, &[]);
        let iterable = interface(ITERABLE, &[]);
        let collection = interface(COLLECTION, &[&iterable]);
        let number = class(NUMBER, &object, &[]);

        let b = Builtins {
            boolean: class(BOOLEAN, &object, &[&comparable]),
            integer: class(INTEGER, &number, &[&comparable]),
            long: class(LONG, &number, &[&comparable]),
            float: class(FLOAT, &number, &[&comparable]),
            double: class(DOUBLE, &number, &[&comparable]),
            big_integer: class(BIG_INTEGER, &number, &[&comparable]),
            big_decimal: class(BIG_DECIMAL, &number, &[&comparable]),
            string: class(STRING, &object, &[&comparable, &char_sequence]),
            list: class(LIST, &object, &[&collection]),
            map: class(MAP, &object, &[]),
            map_entry: class(MAP_ENTRY, &object, &[]),
            class: class(CLASS, &object, &[]),
            function: class(FUNCTION, &object, &[]),
            math: class(MATH, &object, &[]),
            object,
            comparable,
            char_sequence,
            iterable,
            collection,
            number,
        };

        b.define_object();
        b.define_numbers();
        b.define_string();
        b.define_collections();
        b.define_math();
        for t in [&b.comparable, &b.char_sequence, &b.iterable, &b.collection, &b.function] {
            t.define(Members::new());
        }
        b
    }

    fn define_object(&self) {
        let object = self.object.clone();
        self.object.define(
            Members::new()
                .method(
                    MethodInfo::new("toString", vec![], |target, _| {
                        Ok(Value::string(target.to_string()))
                    })
                    .returning(&self.string),
                )
                .method(
                    MethodInfo::new("equals", vec![object], |target, args| {
                        Ok(Value::Boolean(target == arg(args, 0)?))
                    })
                    .returning(&self.boolean),
                )
                .method(
                    MethodInfo::new("getClass", vec![], |target, _| {
                        target
                            .runtime_type()
                            .map(Value::Type)
                            .ok_or_else(|| AccessError::incompatible("null has no class"))
                    })
                    .returning(&self.class),
                ),
        );

        self.class.define(
            Members::new()
                .method(
                    MethodInfo::new("getName", vec![], |target, _| {
                        Ok(Value::string(this_type(target)?.name()))
                    })
                    .returning(&self.string),
                )
                .method(
                    MethodInfo::new("getSimpleName", vec![], |target, _| {
                        Ok(Value::string(this_type(target)?.simple_name()))
                    })
                    .returning(&self.string),
                )
                .method(
                    MethodInfo::new("isInstance", vec![self.object.clone()], |target, args| {
                        let ty = this_type(target)?;
                        let matches = arg(args, 0)?
                            .runtime_type()
                            .is_some_and(|t| ty.is_assignable_from(&t));
                        Ok(Value::Boolean(matches))
                    })
                    .returning(&self.boolean),
                ),
        );
    }

    fn define_numbers(&self) {
        self.number.define(
            Members::new()
                .method(
                    MethodInfo::new("intValue", vec![], |target, _| {
                        let n = this_number(target)?;
                        n.to_i64()
                            .map(|v| Value::Int(v as i32))
                            .ok_or_else(|| AccessError::invocation("value out of range"))
                    })
                    .returning(&self.integer),
                )
                .method(
                    MethodInfo::new("longValue", vec![], |target, _| {
                        this_number(target)?
                            .to_i64()
                            .map(Value::Long)
                            .ok_or_else(|| AccessError::invocation("value out of range"))
                    })
                    .returning(&self.long),
                )
                .method(
                    MethodInfo::new("floatValue", vec![], |target, _| {
                        let n = this_number(target)?;
                        Ok(Value::Float(n.to_f64().unwrap_or(f64::NAN) as f32))
                    })
                    .returning(&self.float),
                )
                .method(
                    MethodInfo::new("doubleValue", vec![], |target, _| {
                        let n = this_number(target)?;
                        Ok(Value::Double(n.to_f64().unwrap_or(f64::NAN)))
                    })
                    .returning(&self.double),
                ),
        );

        self.boolean.define(
            Members::new()
                .field(FieldInfo::constant("TRUE", &self.boolean, Value::Boolean(true)))
                .field(FieldInfo::constant("FALSE", &self.boolean, Value::Boolean(false)))
                .method(
                    MethodInfo::new("booleanValue", vec![], |target, _| {
                        target
                            .as_bool()
                            .map(Value::Boolean)
                            .ok_or_else(|| mismatch(BOOLEAN, target))
                    })
                    .returning(&self.boolean),
                )
                .method(
                    MethodInfo::static_fn("parseBoolean", vec![self.string.clone()], |args| {
                        Ok(Value::Boolean(str_arg(args, 0)?.eq_ignore_ascii_case("true")))
                    })
                    .returning(&self.boolean),
                ),
        );

        self.integer.define(
            Members::new()
                .field(FieldInfo::constant("MAX_VALUE", &self.integer, Value::Int(i32::MAX)))
                .field(FieldInfo::constant("MIN_VALUE", &self.integer, Value::Int(i32::MIN)))
                .method(
                    MethodInfo::static_fn("parseInt", vec![self.string.clone()], |args| {
                        let text = str_arg(args, 0)?;
                        text.trim()
                            .parse::<i32>()
                            .map(Value::Int)
                            .map_err(|e| AccessError::invocation(format!("'{}': {}", text, e)))
                    })
                    .returning(&self.integer),
                )
                .method(
                    MethodInfo::new("compareTo", vec![self.integer.clone()], |target, args| {
                        match target {
                            Value::Int(n) => Ok(Value::Int(n.cmp(&int_arg(args, 0)?) as i32)),
                            other => Err(mismatch(INTEGER, other)),
                        }
                    })
                    .returning(&self.integer),
                ),
        );

        self.long.define(
            Members::new()
                .field(FieldInfo::constant("MAX_VALUE", &self.long, Value::Long(i64::MAX)))
                .field(FieldInfo::constant("MIN_VALUE", &self.long, Value::Long(i64::MIN)))
                .method(
                    MethodInfo::static_fn("parseLong", vec![self.string.clone()], |args| {
                        let text = str_arg(args, 0)?;
                        text.trim()
                            .parse::<i64>()
                            .map(Value::Long)
                            .map_err(|e| AccessError::invocation(format!("'{}': {}", text, e)))
                    })
                    .returning(&self.long),
                ),
        );

        self.float.define(
            Members::new()
                .field(FieldInfo::constant("MAX_VALUE", &self.float, Value::Float(f32::MAX))),
        );

        self.double.define(
            Members::new()
                .field(FieldInfo::constant("MAX_VALUE", &self.double, Value::Double(f64::MAX)))
                .field(FieldInfo::constant("MIN_VALUE", &self.double, Value::Double(f64::MIN_POSITIVE)))
                .method(
                    MethodInfo::static_fn("parseDouble", vec![self.string.clone()], |args| {
                        let text = str_arg(args, 0)?;
                        text.trim()
                            .parse::<f64>()
                            .map(Value::Double)
                            .map_err(|e| AccessError::invocation(format!("'{}': {}", text, e)))
                    })
                    .returning(&self.double),
                ),
        );

        let big_integer = self.big_integer.clone();
        self.big_integer.define(
            Members::new()
                .field(FieldInfo::constant("ZERO", &big_integer, Value::BigInteger(BigInt::from(0))))
                .field(FieldInfo::constant("ONE", &big_integer, Value::BigInteger(BigInt::from(1))))
                .field(FieldInfo::constant("TEN", &big_integer, Value::BigInteger(BigInt::from(10))))
                .constructor(ConstructorInfo::new(vec![self.string.clone()], |args| {
                    let text = str_arg(args, 0)?;
                    BigInt::from_str(text)
                        .map(Value::BigInteger)
                        .map_err(|e| AccessError::invocation(format!("'{}': {}", text, e)))
                }))
                .method(
                    MethodInfo::new("add", vec![big_integer.clone()], |target, args| {
                        match (target, arg(args, 0)?) {
                            (Value::BigInteger(a), Value::BigInteger(b)) => {
                                Ok(Value::BigInteger(a + b))
                            }
                            (other, _) => Err(mismatch(BIG_INTEGER, other)),
                        }
                    })
                    .returning(&big_integer),
                )
                .method(
                    MethodInfo::new("pow", vec![self.integer.clone()], |target, args| {
                        let exponent = int_arg(args, 0)?;
                        if exponent < 0 {
                            return Err(AccessError::invocation("negative exponent"));
                        }
                        match target {
                            Value::BigInteger(a) => Ok(Value::BigInteger(a.pow(exponent as u32))),
                            other => Err(mismatch(BIG_INTEGER, other)),
                        }
                    })
                    .returning(&big_integer),
                ),
        );

        let big_decimal = self.big_decimal.clone();
        self.big_decimal.define(
            Members::new()
                .field(FieldInfo::constant("ZERO", &big_decimal, Value::BigDecimal(Decimal::ZERO)))
                .field(FieldInfo::constant("ONE", &big_decimal, Value::BigDecimal(Decimal::ONE)))
                .field(FieldInfo::constant("TEN", &big_decimal, Value::BigDecimal(Decimal::TEN)))
                .constructor(ConstructorInfo::new(vec![self.string.clone()], |args| {
                    parse_decimal(str_arg(args, 0)?).map(Value::BigDecimal)
                }))
                .constructor(ConstructorInfo::new(vec![self.integer.clone()], |args| {
                    Ok(Value::BigDecimal(Decimal::from(int_arg(args, 0)?)))
                }))
                .constructor(ConstructorInfo::new(vec![self.long.clone()], |args| {
                    Ok(Value::BigDecimal(Decimal::from(long_arg(args, 0)?)))
                }))
                .constructor(ConstructorInfo::new(vec![self.double.clone()], |args| {
                    let d = double_arg(args, 0)?;
                    Value::Double(d)
                        .to_decimal()
                        .map(Value::BigDecimal)
                        .ok_or_else(|| AccessError::invocation(format!("{} is not a decimal", d)))
                }))
                .method(
                    MethodInfo::new("scale", vec![], |target, _| match target {
                        Value::BigDecimal(d) => Ok(Value::Int(d.scale() as i32)),
                        other => Err(mismatch(BIG_DECIMAL, other)),
                    })
                    .returning(&self.integer),
                )
                .method(
                    MethodInfo::new("add", vec![big_decimal.clone()], |target, args| {
                        match (target, arg(args, 0)?) {
                            (Value::BigDecimal(a), Value::BigDecimal(b)) => a
                                .checked_add(*b)
                                .map(Value::BigDecimal)
                                .ok_or_else(|| AccessError::invocation("decimal overflow")),
                            (other, _) => Err(mismatch(BIG_DECIMAL, other)),
                        }
                    })
                    .returning(&big_decimal),
                ),
        );
    }

    fn define_string(&self) {
        let string = || self.string.clone();
        let char_sequences = TypeInfo::array_type(&self.char_sequence, &self.object);

        self.string.define(
            Members::new()
                .constructor(ConstructorInfo::new(vec![], |_| Ok(Value::string(""))))
                .constructor(ConstructorInfo::new(vec![string()], |args| {
                    Ok(Value::string(str_arg(args, 0)?))
                }))
                .method(
                    MethodInfo::new("length", vec![], |target, _| {
                        Ok(Value::Int(this_str(target)?.chars().count() as i32))
                    })
                    .returning(&self.integer),
                )
                .method(
                    MethodInfo::new("isEmpty", vec![], |target, _| {
                        Ok(Value::Boolean(this_str(target)?.is_empty()))
                    })
                    .returning(&self.boolean),
                )
                .method(
                    MethodInfo::new("toUpperCase", vec![], |target, _| {
                        Ok(Value::string(this_str(target)?.to_uppercase()))
                    })
                    .returning(&self.string),
                )
                .method(
                    MethodInfo::new("toLowerCase", vec![], |target, _| {
                        Ok(Value::string(this_str(target)?.to_lowercase()))
                    })
                    .returning(&self.string),
                )
                .method(
                    MethodInfo::new("trim", vec![], |target, _| {
                        Ok(Value::string(this_str(target)?.trim()))
                    })
                    .returning(&self.string),
                )
                .method(
                    MethodInfo::new("substring", vec![self.integer.clone()], |target, args| {
                        let s = this_str(target)?;
                        substring(s, int_arg(args, 0)?, s.chars().count() as i32)
                    })
                    .returning(&self.string),
                )
                .method(
                    MethodInfo::new(
                        "substring",
                        vec![self.integer.clone(), self.integer.clone()],
                        |target, args| substring(this_str(target)?, int_arg(args, 0)?, int_arg(args, 1)?),
                    )
                    .returning(&self.string),
                )
                .method(
                    MethodInfo::new("charAt", vec![self.integer.clone()], |target, args| {
                        let s = this_str(target)?;
                        let index = int_arg(args, 0)?;
                        usize::try_from(index)
                            .ok()
                            .and_then(|i| s.chars().nth(i))
                            .map(|c| Value::String(c.to_string()))
                            .ok_or_else(|| {
                                AccessError::invocation(format!("index {} out of bounds", index))
                            })
                    })
                    .returning(&self.string),
                )
                .method(
                    MethodInfo::new("indexOf", vec![string()], |target, args| {
                        let s = this_str(target)?;
                        let needle = str_arg(args, 0)?;
                        let index = s
                            .find(needle)
                            .map(|byte| s[..byte].chars().count() as i32)
                            .unwrap_or(-1);
                        Ok(Value::Int(index))
                    })
                    .returning(&self.integer),
                )
                .method(
                    MethodInfo::new("contains", vec![self.char_sequence.clone()], |target, args| {
                        Ok(Value::Boolean(this_str(target)?.contains(str_arg(args, 0)?)))
                    })
                    .returning(&self.boolean),
                )
                .method(
                    MethodInfo::new("startsWith", vec![string()], |target, args| {
                        Ok(Value::Boolean(this_str(target)?.starts_with(str_arg(args, 0)?)))
                    })
                    .returning(&self.boolean),
                )
                .method(
                    MethodInfo::new("endsWith", vec![string()], |target, args| {
                        Ok(Value::Boolean(this_str(target)?.ends_with(str_arg(args, 0)?)))
                    })
                    .returning(&self.boolean),
                )
                .method(
                    MethodInfo::new("concat", vec![string()], |target, args| {
                        Ok(Value::String(format!("{}{}", this_str(target)?, str_arg(args, 0)?)))
                    })
                    .returning(&self.string),
                )
                .method(
                    MethodInfo::new(
                        "replace",
                        vec![self.char_sequence.clone(), self.char_sequence.clone()],
                        |target, args| {
                            Ok(Value::String(
                                this_str(target)?.replace(str_arg(args, 0)?, str_arg(args, 1)?),
                            ))
                        },
                    )
                    .returning(&self.string),
                )
                .method(
                    MethodInfo::new("split", vec![string()], |target, args| {
                        let s = this_str(target)?;
                        let pattern = regex::Regex::new(str_arg(args, 0)?)
                            .map_err(|e| AccessError::invocation(e.to_string()))?;
                        let mut parts: Vec<Value> =
                            pattern.split(s).map(Value::string).collect();
                        // trailing empty strings are dropped
                        while parts.last().is_some_and(|p| p.as_str() == Some("")) {
                            parts.pop();
                        }
                        Ok(Value::array(&builtins().string, parts))
                    })
                    .returning(&TypeInfo::array_type(&self.string, &self.object)),
                )
                .method(
                    MethodInfo::new("equalsIgnoreCase", vec![string()], |target, args| {
                        let s = this_str(target)?;
                        Ok(Value::Boolean(s.to_lowercase() == str_arg(args, 0)?.to_lowercase()))
                    })
                    .returning(&self.boolean),
                )
                .method(
                    MethodInfo::new("compareTo", vec![string()], |target, args| {
                        Ok(Value::Int(this_str(target)?.cmp(str_arg(args, 0)?) as i32))
                    })
                    .returning(&self.integer),
                )
                .method(
                    MethodInfo::static_fn("valueOf", vec![self.object.clone()], |args| {
                        Ok(Value::String(arg(args, 0)?.to_string()))
                    })
                    .returning(&self.string),
                )
                .method(
                    MethodInfo::static_fn(
                        "join",
                        vec![self.char_sequence.clone(), char_sequences],
                        |args| {
                            let separator = str_arg(args, 0)?;
                            let parts: Vec<String> = match arg(args, 1)? {
                                Value::Array(a) => a.read().iter().map(|v| v.to_string()).collect(),
                                other => return Err(mismatch("lang.CharSequence[]", other)),
                            };
                            Ok(Value::String(parts.join(separator)))
                        },
                    )
                    .with_varargs()
                    .returning(&self.string),
                ),
        );
    }

    fn define_collections(&self) {
        let object = || self.object.clone();

        self.list.define(
            Members::new()
                .constructor(ConstructorInfo::new(vec![], |_| Ok(Value::list(Vec::new()))))
                .method(
                    MethodInfo::new("size", vec![], |target, _| {
                        Ok(Value::Int(this_list(target)?.read().len() as i32))
                    })
                    .returning(&self.integer),
                )
                .method(
                    MethodInfo::new("isEmpty", vec![], |target, _| {
                        Ok(Value::Boolean(this_list(target)?.read().is_empty()))
                    })
                    .returning(&self.boolean),
                )
                .method(MethodInfo::new("get", vec![self.integer.clone()], |target, args| {
                    let items = this_list(target)?.read();
                    let index = int_arg(args, 0)?;
                    usize::try_from(index)
                        .ok()
                        .and_then(|i| items.get(i).cloned())
                        .ok_or_else(|| {
                            AccessError::invocation(format!(
                                "index {} out of bounds for length {}",
                                index,
                                items.len()
                            ))
                        })
                }))
                .method(
                    MethodInfo::new("contains", vec![object()], |target, args| {
                        let needle = arg(args, 0)?;
                        Ok(Value::Boolean(this_list(target)?.read().contains(needle)))
                    })
                    .returning(&self.boolean),
                )
                .method(
                    MethodInfo::new("indexOf", vec![object()], |target, args| {
                        let needle = arg(args, 0)?;
                        let items = this_list(target)?.read();
                        let index = items.iter().position(|v| v == needle);
                        Ok(Value::Int(index.map(|i| i as i32).unwrap_or(-1)))
                    })
                    .returning(&self.integer),
                )
                .method(
                    MethodInfo::new("add", vec![object()], |target, args| {
                        let list = this_list(target)?;
                        checked_modification(list)?;
                        list.write().push(arg(args, 0)?.clone());
                        Ok(Value::Boolean(true))
                    })
                    .returning(&self.boolean),
                ),
        );

        self.map.define(
            Members::new()
                .constructor(ConstructorInfo::new(vec![], |_| Ok(Value::map(IndexMap::new()))))
                .method(
                    MethodInfo::new("size", vec![], |target, _| {
                        Ok(Value::Int(this_map(target)?.read().len() as i32))
                    })
                    .returning(&self.integer),
                )
                .method(
                    MethodInfo::new("isEmpty", vec![], |target, _| {
                        Ok(Value::Boolean(this_map(target)?.read().is_empty()))
                    })
                    .returning(&self.boolean),
                )
                .method(MethodInfo::new("get", vec![object()], |target, args| {
                    let key = arg(args, 0)?;
                    Ok(this_map(target)?.read().get(key).cloned().unwrap_or(Value::Null))
                }))
                .method(MethodInfo::new("put", vec![object(), object()], |target, args| {
                    let map = this_map(target)?;
                    if map.is_read_only() {
                        return Err(AccessError::invocation("the map cannot be modified"));
                    }
                    let previous = map
                        .write()
                        .insert(arg(args, 0)?.clone(), arg(args, 1)?.clone());
                    Ok(previous.unwrap_or(Value::Null))
                }))
                .method(
                    MethodInfo::new("containsKey", vec![object()], |target, args| {
                        let key = arg(args, 0)?;
                        Ok(Value::Boolean(this_map(target)?.read().contains_key(key)))
                    })
                    .returning(&self.boolean),
                )
                .method(
                    MethodInfo::new("containsValue", vec![object()], |target, args| {
                        let needle = arg(args, 0)?;
                        let found = this_map(target)?.read().values().any(|v| v == needle);
                        Ok(Value::Boolean(found))
                    })
                    .returning(&self.boolean),
                )
                .method(
                    MethodInfo::new("keySet", vec![], |target, _| {
                        Ok(Value::list(this_map(target)?.read().keys().cloned().collect()))
                    })
                    .returning(&self.list),
                )
                .method(
                    MethodInfo::new("values", vec![], |target, _| {
                        Ok(Value::list(this_map(target)?.read().values().cloned().collect()))
                    })
                    .returning(&self.list),
                )
                .method(
                    MethodInfo::new("entrySet", vec![], |target, _| {
                        let entries = this_map(target)?
                            .read()
                            .iter()
                            .map(|(k, v)| {
                                Value::object(MapEntry {
                                    key: k.clone(),
                                    value: v.clone(),
                                })
                            })
                            .collect();
                        Ok(Value::list(entries))
                    })
                    .returning(&self.list),
                ),
        );

        self.map_entry.define(
            Members::new()
                .method(MethodInfo::new("getKey", vec![], |target, _| {
                    Ok(this_entry(target)?.key.clone())
                }))
                .method(MethodInfo::new("getValue", vec![], |target, _| {
                    Ok(this_entry(target)?.value.clone())
                })),
        );
    }

    fn define_math(&self) {
        let (integer, long, double) = (&self.integer, &self.long, &self.double);
        let unary_double = |name: &str, f: fn(f64) -> f64| {
            MethodInfo::static_fn(name, vec![double.clone()], move |args| {
                Ok(Value::Double(f(double_arg(args, 0)?)))
            })
            .returning(double)
        };

        self.math.define(
            Members::new()
                .field(FieldInfo::constant("PI", double, Value::Double(std::f64::consts::PI)))
                .field(FieldInfo::constant("E", double, Value::Double(std::f64::consts::E)))
                .method(
                    MethodInfo::static_fn("abs", vec![integer.clone()], |args| {
                        Ok(Value::Int(int_arg(args, 0)?.wrapping_abs()))
                    })
                    .returning(integer),
                )
                .method(
                    MethodInfo::static_fn("abs", vec![long.clone()], |args| {
                        Ok(Value::Long(long_arg(args, 0)?.wrapping_abs()))
                    })
                    .returning(long),
                )
                .method(unary_double("abs", f64::abs))
                .method(
                    MethodInfo::static_fn("max", vec![integer.clone(), integer.clone()], |args| {
                        Ok(Value::Int(int_arg(args, 0)?.max(int_arg(args, 1)?)))
                    })
                    .returning(integer),
                )
                .method(
                    MethodInfo::static_fn("max", vec![long.clone(), long.clone()], |args| {
                        Ok(Value::Long(long_arg(args, 0)?.max(long_arg(args, 1)?)))
                    })
                    .returning(long),
                )
                .method(
                    MethodInfo::static_fn("max", vec![double.clone(), double.clone()], |args| {
                        Ok(Value::Double(double_arg(args, 0)?.max(double_arg(args, 1)?)))
                    })
                    .returning(double),
                )
                .method(
                    MethodInfo::static_fn("min", vec![integer.clone(), integer.clone()], |args| {
                        Ok(Value::Int(int_arg(args, 0)?.min(int_arg(args, 1)?)))
                    })
                    .returning(integer),
                )
                .method(
                    MethodInfo::static_fn("min", vec![long.clone(), long.clone()], |args| {
                        Ok(Value::Long(long_arg(args, 0)?.min(long_arg(args, 1)?)))
                    })
                    .returning(long),
                )
                .method(
                    MethodInfo::static_fn("min", vec![double.clone(), double.clone()], |args| {
                        Ok(Value::Double(double_arg(args, 0)?.min(double_arg(args, 1)?)))
                    })
                    .returning(double),
                )
                .method(unary_double("sqrt", f64::sqrt))
                .method(unary_double("floor", f64::floor))
                .method(unary_double("ceil", f64::ceil))
                .method(
                    MethodInfo::static_fn("pow", vec![double.clone(), double.clone()], |args| {
                        Ok(Value::Double(double_arg(args, 0)?.powf(double_arg(args, 1)?)))
                    })
                    .returning(double),
                )
                .method(
                    MethodInfo::static_fn("round", vec![double.clone()], |args| {
                        Ok(Value::Long((double_arg(args, 0)? + 0.5).floor() as i64))
                    })
                    .returning(long),
                ),
        );
    }
}

#[test]
fn test_string_members_are_found_through_the_hierarchy() {
    let b = builtins();
    assert_eq!(b.string.find_methods("substring").len(), 2);
    assert_eq!(b.string.find_methods("toString").len(), 1);
    assert!(b.integer.find_methods("intValue").len() == 1);
    assert!(b.integer.find_field("MAX_VALUE").is_some());
}
