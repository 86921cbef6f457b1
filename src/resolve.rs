//! Pluggable strategies that give expressions their meaning.
//!
//! Navigation nodes never touch host objects directly. Property reads and
//! writes go through [`PropertyAccessor`]s, calls through
//! [`MethodResolver`]s and [`ConstructorResolver`]s, and the operators
//! consult the [`TypeConverter`], [`TypeComparator`] and
//! [`OperatorOverloader`] of the evaluation context. The reflective
//! implementations over the [`crate::types`] model are always consulted
//! last.

pub mod comparison;
pub mod constructor;
pub mod conversion;
pub mod locator;
pub mod matching;
pub mod method;
pub mod overloader;
pub mod property;

use std::{cmp::Ordering, fmt, sync::Arc};

use crate::{
    ast::BinaryOp,
    context::EvaluationContext,
    error::{AccessError, EvaluationError},
    types::{Factory, Invoker, TypeRef},
    value::{TypedValue, Value},
};

pub use comparison::StandardTypeComparator;
pub use constructor::{ReflectiveConstructorExecutor, ReflectiveConstructorResolver};
pub use conversion::StandardTypeConverter;
pub use locator::StandardTypeLocator;
pub use matching::ArgumentsMatchKind;
pub use method::{ReflectiveMethodExecutor, ReflectiveMethodResolver};
pub use overloader::StandardOperatorOverloader;
pub use property::{MapAccessor, ReflectivePropertyAccessor};

/// A read specialized for one target type, used by compiled expressions.
pub type ReadFn = Arc<dyn Fn(&Value) -> Result<Value, AccessError> + Send + Sync>;

/// Reads and writes named properties.
pub trait PropertyAccessor: Send + Sync + fmt::Debug {
    /// Types this accessor is specific to. `None` makes it general: it is
    /// asked about every target, after the specific ones.
    fn specific_target_types(&self) -> Option<Vec<TypeRef>> {
        None
    }

    fn can_read(
        &self,
        ctx: &dyn EvaluationContext,
        target: &Value,
        name: &str,
    ) -> Result<bool, AccessError>;

    fn read(
        &self,
        ctx: &dyn EvaluationContext,
        target: &Value,
        name: &str,
    ) -> Result<TypedValue, AccessError>;

    fn can_write(
        &self,
        _ctx: &dyn EvaluationContext,
        _target: &Value,
        _name: &str,
    ) -> Result<bool, AccessError> {
        Ok(false)
    }

    fn write(
        &self,
        _ctx: &dyn EvaluationContext,
        _target: &Value,
        name: &str,
        _value: Value,
    ) -> Result<(), AccessError> {
        Err(AccessError::incompatible(format!(
            "property '{}' is read-only",
            name
        )))
    }

    /// A direct read for targets of `target_type`, when the accessor can
    /// offer one.
    fn specialize_read(
        &self,
        _target_type: &TypeRef,
        _is_static: bool,
        _name: &str,
    ) -> Option<ReadFn> {
        None
    }
}

/// A resolved method, ready to call.
pub trait MethodExecutor: Send + Sync + fmt::Debug {
    fn execute(
        &self,
        ctx: &dyn EvaluationContext,
        target: &Value,
        args: Vec<Value>,
    ) -> Result<TypedValue, AccessError>;

    /// A direct call, when the last execution needed no argument
    /// conversion.
    fn specialize(&self) -> Option<Invoker> {
        None
    }
}

pub trait MethodResolver: Send + Sync + fmt::Debug {
    /// Finds a method `name` on `target` accepting arguments of the given
    /// types (`None` for null arguments). `Ok(None)` lets the next
    /// resolver try.
    fn resolve(
        &self,
        ctx: &dyn EvaluationContext,
        target: &Value,
        name: &str,
        arg_types: &[Option<TypeRef>],
    ) -> Result<Option<Arc<dyn MethodExecutor>>, EvaluationError>;
}

pub trait ConstructorExecutor: Send + Sync + fmt::Debug {
    fn execute(
        &self,
        ctx: &dyn EvaluationContext,
        args: Vec<Value>,
    ) -> Result<TypedValue, AccessError>;

    fn specialize(&self) -> Option<Factory> {
        None
    }
}

pub trait ConstructorResolver: Send + Sync + fmt::Debug {
    fn resolve(
        &self,
        ctx: &dyn EvaluationContext,
        type_name: &str,
        arg_types: &[Option<TypeRef>],
    ) -> Result<Option<Arc<dyn ConstructorExecutor>>, EvaluationError>;
}

pub trait TypeConverter: Send + Sync + fmt::Debug {
    /// `source` is `None` for null.
    fn can_convert(&self, source: Option<&TypeRef>, target: &TypeRef) -> bool;

    fn convert_value(&self, value: &Value, target: &TypeRef) -> Result<Value, EvaluationError>;
}

pub trait TypeComparator: Send + Sync + fmt::Debug {
    fn can_compare(&self, left: &Value, right: &Value) -> bool;

    fn compare(&self, left: &Value, right: &Value) -> Result<Ordering, EvaluationError>;
}

/// Gives meaning to operators on operand types the language does not
/// handle itself.
pub trait OperatorOverloader: Send + Sync + fmt::Debug {
    fn overrides_operation(
        &self,
        op: BinaryOp,
        left: &Value,
        right: &Value,
    ) -> Result<bool, EvaluationError>;

    fn operate(&self, op: BinaryOp, left: &Value, right: &Value)
    -> Result<Value, EvaluationError>;
}

/// Resolves `@name` and `&name` references.
pub trait BeanResolver: Send + Sync + fmt::Debug {
    fn resolve(&self, ctx: &dyn EvaluationContext, name: &str) -> Result<Value, AccessError>;
}

pub trait TypeLocator: Send + Sync + fmt::Debug {
    fn find_type(&self, name: &str) -> Result<TypeRef, EvaluationError>;
}

/// Orders `accessors` for a target of `target_type`: accessors specific to
/// exactly that type first, then general ones and those specific to a
/// supertype, in registration order.
pub fn accessors_to_try(
    target_type: Option<&TypeRef>,
    accessors: &[Arc<dyn PropertyAccessor>],
) -> Vec<Arc<dyn PropertyAccessor>> {
    let mut specific = Vec::new();
    let mut general = Vec::new();
    for accessor in accessors {
        match (accessor.specific_target_types(), target_type) {
            (None, _) => general.push(accessor.clone()),
            (Some(_), None) => {}
            (Some(types), Some(target)) => {
                if types.iter().any(|t| t.name() == target.name()) {
                    specific.push(accessor.clone());
                } else if types.iter().any(|t| t.is_assignable_from(target)) {
                    general.push(accessor.clone());
                }
            }
        }
    }
    specific.extend(general);
    specific
}
