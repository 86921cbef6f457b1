use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use crate::{
    context::EvaluationContext,
    error::{AccessError, EvalErrorKind, EvaluationError},
    resolve::{
        MethodExecutor, MethodResolver,
        matching::{
            ArgumentsMatchKind, compare_arguments, compare_arguments_varargs,
            convert_arguments, type_difference_weight,
        },
    },
    types::{Invoker, MethodRef, TypeRef, builtins},
    value::{TypedValue, Value},
};

/// Calls one [`crate::types::MethodInfo`], converting arguments first.
#[derive(Debug)]
pub struct ReflectiveMethodExecutor {
    method: MethodRef,
    conversion_occurred: AtomicBool,
}

impl ReflectiveMethodExecutor {
    pub fn new(method: MethodRef) -> Self {
        ReflectiveMethodExecutor {
            method,
            conversion_occurred: AtomicBool::new(false),
        }
    }

    pub fn method(&self) -> &MethodRef {
        &self.method
    }

    /// Whether the last execution had to convert or pack any argument.
    pub fn did_argument_conversion_occur(&self) -> bool {
        self.conversion_occurred.load(Ordering::Relaxed)
    }
}

impl MethodExecutor for ReflectiveMethodExecutor {
    fn execute(
        &self,
        ctx: &dyn EvaluationContext,
        target: &Value,
        args: Vec<Value>,
    ) -> Result<TypedValue, AccessError> {
        let (args, converted) = convert_arguments(
            ctx.type_converter(),
            args,
            self.method.params(),
            self.method.is_varargs(),
        )
        .map_err(|e| AccessError::incompatible(e.to_string()))?;
        self.conversion_occurred.store(converted, Ordering::Relaxed);

        let value = self.method.invoke(target, &args)?;
        Ok(match self.method.return_type() {
            Some(rt) => TypedValue::with_descriptor(value, rt.clone()),
            None => TypedValue::new(value),
        })
    }

    fn specialize(&self) -> Option<Invoker> {
        if self.method.is_varargs() || self.did_argument_conversion_occur() {
            return None;
        }
        Some(self.method.invoker())
    }
}

/// Picks the best overload among the methods of the target's type.
///
/// An exact match wins immediately. Otherwise the closest assignable
/// candidate wins, measured by [`type_difference_weight`]. Failing that, a
/// single candidate reachable through argument conversion is used; several
/// such candidates are ambiguous. Variable-arity candidates are considered
/// after every fixed-arity one.
#[derive(Debug)]
pub struct ReflectiveMethodResolver {
    use_distance: bool,
}

impl Default for ReflectiveMethodResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ReflectiveMethodResolver {
    pub fn new() -> Self {
        ReflectiveMethodResolver { use_distance: true }
    }

    /// Without distance ranking the first close match is taken.
    pub fn without_distance() -> Self {
        ReflectiveMethodResolver {
            use_distance: false,
        }
    }

    /// Candidate methods: for a type value its static methods plus the
    /// instance methods of `lang.Class`.
    fn candidates(target: &Value, name: &str) -> Option<(TypeRef, Vec<MethodRef>)> {
        match target {
            Value::Null => None,
            Value::Type(ty) => {
                let mut methods: Vec<MethodRef> = ty
                    .find_methods(name)
                    .into_iter()
                    .filter(|m| m.is_static())
                    .collect();
                methods.extend(builtins().class.find_methods(name));
                Some((ty.clone(), methods))
            }
            other => {
                let ty = other.runtime_type()?;
                let methods = ty.find_methods(name);
                Some((ty, methods))
            }
        }
    }
}

impl MethodResolver for ReflectiveMethodResolver {
    fn resolve(
        &self,
        ctx: &dyn EvaluationContext,
        target: &Value,
        name: &str,
        arg_types: &[Option<TypeRef>],
    ) -> Result<Option<Arc<dyn MethodExecutor>>, EvaluationError> {
        let Some((ty, mut methods)) = Self::candidates(target, name) else {
            return Ok(None);
        };
        // stable: fixed arity keeps declaration order ahead of varargs
        methods.sort_by_key(|m| m.is_varargs());

        let converter = ctx.type_converter();
        let mut close_match: Option<MethodRef> = None;
        let mut close_distance = u32::MAX;
        let mut conversion_match: Option<MethodRef> = None;
        let mut multiple_options = false;

        for method in methods {
            let params = method.params();
            let matched = if method.is_varargs() && arg_types.len() + 1 >= params.len() {
                compare_arguments_varargs(params, arg_types, converter)
            } else if params.len() == arg_types.len() {
                compare_arguments(params, arg_types, converter)
            } else {
                None
            };
            match matched {
                Some(ArgumentsMatchKind::Exact) => {
                    return Ok(Some(Arc::new(ReflectiveMethodExecutor::new(method))));
                }
                Some(ArgumentsMatchKind::Close) => {
                    if self.use_distance {
                        let distance = type_difference_weight(params, arg_types);
                        if close_match.is_none() || distance < close_distance {
                            close_distance = distance;
                            close_match = Some(method);
                        }
                    } else if close_match.is_none() {
                        close_match = Some(method);
                    }
                }
                Some(ArgumentsMatchKind::RequiresConversion) => {
                    if conversion_match.is_some() {
                        multiple_options = true;
                    }
                    conversion_match = Some(method);
                }
                None => {}
            }
        }

        if let Some(method) = close_match {
            return Ok(Some(Arc::new(ReflectiveMethodExecutor::new(method))));
        }
        match conversion_match {
            Some(_) if multiple_options => Err(EvalErrorKind::AmbiguousMethod {
                name: name.to_string(),
                type_name: ty.name().to_string(),
            }
            .into()),
            Some(method) => Ok(Some(Arc::new(ReflectiveMethodExecutor::new(method)))),
            None => Ok(None),
        }
    }
}
