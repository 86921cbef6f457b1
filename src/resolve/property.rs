use std::sync::Arc;

use dashmap::DashMap;

use crate::{
    context::EvaluationContext,
    error::AccessError,
    resolve::{PropertyAccessor, ReadFn},
    types::{FieldRef, MethodRef, TypeRef, builtins},
    value::{TypedValue, Value},
};

/// How a property is read or written on one type.
#[derive(Debug, Clone)]
enum Member {
    Method(MethodRef),
    Field(FieldRef),
    ArrayLength,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PropertyCacheKey {
    type_name: Arc<str>,
    property: String,
    is_static: bool,
}

/// Reads properties through `get<Name>()`/`is<Name>()` methods or fields of
/// the target's type, and writes them through `set<Name>(value)` or a
/// writable field. On a type value (`T(Integer)`) it sees the type's static
/// members and the instance members of `lang.Class`.
///
/// Lookups are cached per type, property name and staticness.
#[derive(Debug, Default)]
pub struct ReflectivePropertyAccessor {
    readers: DashMap<PropertyCacheKey, Member>,
    writers: DashMap<PropertyCacheKey, Member>,
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// The type whose members apply, and whether only statics count.
fn target_type(target: &Value) -> Option<(TypeRef, bool)> {
    match target {
        Value::Null => None,
        Value::Type(t) => Some((t.clone(), true)),
        other => other.runtime_type().map(|t| (t, false)),
    }
}

fn invoke(member: &Member, target: &Value) -> Result<Value, AccessError> {
    match member {
        Member::Method(m) => m.invoke(target, &[]),
        Member::Field(f) => f.get(target),
        Member::ArrayLength => match target {
            Value::Array(a) => Ok(Value::Int(a.len() as i32)),
            other => Err(AccessError::incompatible(format!(
                "'length' is only defined on arrays, not on {}",
                other.type_name()
            ))),
        },
    }
}

impl ReflectivePropertyAccessor {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(ty: &TypeRef, name: &str, is_static: bool) -> PropertyCacheKey {
        PropertyCacheKey {
            type_name: ty.name_arc(),
            property: name.to_string(),
            is_static,
        }
    }

    /// `get<Name>()`, or `is<Name>()` when it is declared to return a boolean.
    fn find_getter(ty: &TypeRef, name: &str, is_static: bool) -> Option<MethodRef> {
        let suffix = capitalize(name);
        let boolean = builtins().boolean.name();
        let candidates = [(format!("get{}", suffix), false), (format!("is{}", suffix), true)];
        let on_type = |owner: &TypeRef, statics_only: bool| {
            candidates.iter().find_map(|(candidate, boolean_only)| {
                owner.find_methods(candidate).into_iter().find(|m| {
                    m.params().is_empty()
                        && (!statics_only || m.is_static())
                        && (!boolean_only || m.return_type().is_some_and(|t| t.name() == boolean))
                })
            })
        };
        let found = on_type(ty, is_static);
        if found.is_none() && is_static {
            return on_type(&builtins().class, false);
        }
        found
    }

    fn find_setter(ty: &TypeRef, name: &str, is_static: bool) -> Option<MethodRef> {
        let setter = format!("set{}", capitalize(name));
        ty.find_methods(&setter)
            .into_iter()
            .find(|m| m.params().len() == 1 && (!is_static || m.is_static()))
    }

    fn find_field(ty: &TypeRef, name: &str, is_static: bool) -> Option<FieldRef> {
        ty.find_field(name)
            .filter(|f| !is_static || f.is_static())
    }

    fn reader(&self, ty: &TypeRef, name: &str, is_static: bool) -> Option<Member> {
        let key = Self::key(ty, name, is_static);
        if let Some(member) = self.readers.get(&key) {
            return Some(member.clone());
        }
        let member = if ty.is_array() && name == "length" {
            Member::ArrayLength
        } else if let Some(getter) = Self::find_getter(ty, name, is_static) {
            Member::Method(getter)
        } else {
            Member::Field(Self::find_field(ty, name, is_static)?)
        };
        tracing::trace!(type_name = ty.name(), property = name, "cached property reader");
        Some(self.readers.entry(key).or_insert(member).clone())
    }

    fn writer(&self, ty: &TypeRef, name: &str, is_static: bool) -> Option<Member> {
        let key = Self::key(ty, name, is_static);
        if let Some(member) = self.writers.get(&key) {
            return Some(member.clone());
        }
        let member = if let Some(setter) = Self::find_setter(ty, name, is_static) {
            Member::Method(setter)
        } else {
            Member::Field(Self::find_field(ty, name, is_static).filter(|f| f.is_writable())?)
        };
        Some(self.writers.entry(key).or_insert(member).clone())
    }
}

impl PropertyAccessor for ReflectivePropertyAccessor {
    fn can_read(
        &self,
        _ctx: &dyn EvaluationContext,
        target: &Value,
        name: &str,
    ) -> Result<bool, AccessError> {
        Ok(target_type(target)
            .and_then(|(ty, is_static)| self.reader(&ty, name, is_static))
            .is_some())
    }

    fn read(
        &self,
        _ctx: &dyn EvaluationContext,
        target: &Value,
        name: &str,
    ) -> Result<TypedValue, AccessError> {
        let (ty, is_static) = target_type(target)
            .ok_or_else(|| AccessError::incompatible(format!("cannot read '{}' of null", name)))?;
        let member = self.reader(&ty, name, is_static).ok_or_else(|| {
            AccessError::incompatible(format!("no property '{}' on {}", name, ty.name()))
        })?;
        let value = invoke(&member, target)?;
        Ok(match &member {
            Member::Method(m) => match m.return_type() {
                Some(rt) => TypedValue::with_descriptor(value, rt.clone()),
                None => TypedValue::new(value),
            },
            Member::Field(f) => TypedValue::with_descriptor(value, f.field_type().clone()),
            Member::ArrayLength => TypedValue::with_descriptor(value, builtins().integer.clone()),
        })
    }

    fn can_write(
        &self,
        _ctx: &dyn EvaluationContext,
        target: &Value,
        name: &str,
    ) -> Result<bool, AccessError> {
        Ok(target_type(target)
            .and_then(|(ty, is_static)| self.writer(&ty, name, is_static))
            .is_some())
    }

    fn write(
        &self,
        ctx: &dyn EvaluationContext,
        target: &Value,
        name: &str,
        value: Value,
    ) -> Result<(), AccessError> {
        let (ty, is_static) = target_type(target).ok_or_else(|| {
            AccessError::incompatible(format!("cannot write '{}' of null", name))
        })?;
        let member = self.writer(&ty, name, is_static).ok_or_else(|| {
            AccessError::incompatible(format!("no writable property '{}' on {}", name, ty.name()))
        })?;
        let expected = match &member {
            Member::Method(m) => m.params().first().cloned(),
            Member::Field(f) => Some(f.field_type().clone()),
            Member::ArrayLength => None,
        };
        let value = match expected {
            Some(expected) => ctx
                .type_converter()
                .convert_value(&value, &expected)
                .map_err(|e| AccessError::invocation(e.to_string()))?,
            None => value,
        };
        match &member {
            Member::Method(m) => m.invoke(target, &[value]).map(|_| ()),
            Member::Field(f) => f.set(target, value),
            Member::ArrayLength => Err(AccessError::incompatible("array length is read-only")),
        }
    }

    fn specialize_read(&self, target_type: &TypeRef, is_static: bool, name: &str) -> Option<ReadFn> {
        let member = self.reader(target_type, name, is_static)?;
        Some(Arc::new(move |target: &Value| invoke(&member, target)))
    }
}

/// Reads and writes map entries with property syntax: `map.key` is
/// `map['key']`. Reading a key that is not present is not this accessor's
/// business, so later accessors get their turn.
#[derive(Debug, Default)]
pub struct MapAccessor;

impl MapAccessor {
    pub fn new() -> Self {
        MapAccessor
    }
}

fn missing_key(name: &str) -> AccessError {
    AccessError::incompatible(format!("map has no value for key '{}'", name))
}

impl PropertyAccessor for MapAccessor {
    fn specific_target_types(&self) -> Option<Vec<TypeRef>> {
        Some(vec![builtins().map.clone()])
    }

    fn can_read(
        &self,
        _ctx: &dyn EvaluationContext,
        target: &Value,
        name: &str,
    ) -> Result<bool, AccessError> {
        Ok(match target {
            Value::Map(map) => map.read().contains_key(&Value::string(name)),
            _ => false,
        })
    }

    fn read(
        &self,
        _ctx: &dyn EvaluationContext,
        target: &Value,
        name: &str,
    ) -> Result<TypedValue, AccessError> {
        match target {
            Value::Map(map) => map
                .read()
                .get(&Value::string(name))
                .cloned()
                .map(TypedValue::new)
                .ok_or_else(|| missing_key(name)),
            _ => Err(missing_key(name)),
        }
    }

    fn can_write(
        &self,
        _ctx: &dyn EvaluationContext,
        target: &Value,
        _name: &str,
    ) -> Result<bool, AccessError> {
        Ok(matches!(target, Value::Map(_)))
    }

    fn write(
        &self,
        _ctx: &dyn EvaluationContext,
        target: &Value,
        name: &str,
        value: Value,
    ) -> Result<(), AccessError> {
        match target {
            Value::Map(map) if map.is_read_only() => {
                Err(AccessError::invocation("the map cannot be modified"))
            }
            Value::Map(map) => {
                map.write().insert(Value::string(name), value);
                Ok(())
            }
            _ => Err(missing_key(name)),
        }
    }

    fn specialize_read(&self, _target_type: &TypeRef, is_static: bool, name: &str) -> Option<ReadFn> {
        if is_static {
            return None;
        }
        let key = Value::string(name);
        let name = name.to_string();
        Some(Arc::new(move |target: &Value| match target {
            Value::Map(map) => map.read().get(&key).cloned().ok_or_else(|| missing_key(&name)),
            _ => Err(missing_key(&name)),
        }))
    }
}

#[cfg(test)]
use crate::context::StandardEvaluationContext;

#[test]
fn test_static_and_class_members() {
    let ctx = StandardEvaluationContext::new();
    let accessor = ReflectivePropertyAccessor::new();
    let integer = Value::Type(builtins().integer.clone());

    let max = accessor.read(&ctx, &integer, "MAX_VALUE").unwrap();
    assert_eq!(max.value, Value::Int(i32::MAX));
    let name = accessor.read(&ctx, &integer, "name").unwrap();
    assert_eq!(name.value, Value::string("lang.Integer"));
    assert!(!accessor.can_read(&ctx, &Value::Int(3), "MAX_VALUE_X").unwrap());
}

#[test]
fn test_map_accessor_reads_present_keys_only() {
    let ctx = StandardEvaluationContext::new();
    let mut entries = indexmap::IndexMap::new();
    entries.insert(Value::string("a"), Value::Int(1));
    let map = Value::map(entries);

    let accessor = MapAccessor::new();
    assert!(accessor.can_read(&ctx, &map, "a").unwrap());
    assert!(!accessor.can_read(&ctx, &map, "b").unwrap());
    accessor.write(&ctx, &map, "b", Value::Int(2)).unwrap();
    assert_eq!(accessor.read(&ctx, &map, "b").unwrap().value, Value::Int(2));
}
