use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use crate::{
    context::EvaluationContext,
    error::{AccessError, EvalErrorKind, EvaluationError},
    resolve::{
        ConstructorExecutor, ConstructorResolver,
        matching::{
            ArgumentsMatchKind, compare_arguments, compare_arguments_varargs,
            convert_arguments,
        },
    },
    types::{ConstructorRef, Factory, TypeRef},
    value::{TypedValue, Value},
};

#[derive(Debug)]
pub struct ReflectiveConstructorExecutor {
    constructor: ConstructorRef,
    declaring_type: TypeRef,
    conversion_occurred: AtomicBool,
}

impl ReflectiveConstructorExecutor {
    pub fn new(constructor: ConstructorRef, declaring_type: TypeRef) -> Self {
        ReflectiveConstructorExecutor {
            constructor,
            declaring_type,
            conversion_occurred: AtomicBool::new(false),
        }
    }
}

impl ConstructorExecutor for ReflectiveConstructorExecutor {
    fn execute(
        &self,
        ctx: &dyn EvaluationContext,
        args: Vec<Value>,
    ) -> Result<TypedValue, AccessError> {
        let (args, converted) = convert_arguments(
            ctx.type_converter(),
            args,
            self.constructor.params(),
            self.constructor.is_varargs(),
        )
        .map_err(|e| AccessError::incompatible(e.to_string()))?;
        self.conversion_occurred.store(converted, Ordering::Relaxed);
        let value = self.constructor.construct(&args)?;
        Ok(TypedValue::with_descriptor(value, self.declaring_type.clone()))
    }

    fn specialize(&self) -> Option<Factory> {
        if self.constructor.is_varargs() || self.conversion_occurred.load(Ordering::Relaxed) {
            return None;
        }
        Some(self.constructor.factory())
    }
}

/// Chooses among a type's constructors: an exact match, else the first
/// close match, else the only match needing conversion.
#[derive(Debug, Default)]
pub struct ReflectiveConstructorResolver;

impl ReflectiveConstructorResolver {
    pub fn new() -> Self {
        ReflectiveConstructorResolver
    }
}

impl ConstructorResolver for ReflectiveConstructorResolver {
    fn resolve(
        &self,
        ctx: &dyn EvaluationContext,
        type_name: &str,
        arg_types: &[Option<TypeRef>],
    ) -> Result<Option<Arc<dyn ConstructorExecutor>>, EvaluationError> {
        let ty = ctx.type_locator().find_type(type_name)?;
        let mut constructors: Vec<ConstructorRef> = ty.constructors().to_vec();
        constructors.sort_by_key(|c| c.is_varargs());

        let converter = ctx.type_converter();
        let mut close_match = None;
        let mut conversion_match = None;
        let mut multiple_options = false;

        for constructor in constructors {
            let params = constructor.params();
            let matched = if constructor.is_varargs() && arg_types.len() + 1 >= params.len() {
                compare_arguments_varargs(params, arg_types, converter)
            } else if params.len() == arg_types.len() {
                compare_arguments(params, arg_types, converter)
            } else {
                None
            };
            match matched {
                Some(ArgumentsMatchKind::Exact) => {
                    return Ok(Some(Arc::new(ReflectiveConstructorExecutor::new(
                        constructor,
                        ty.clone(),
                    ))));
                }
                Some(ArgumentsMatchKind::Close) if close_match.is_none() => {
                    close_match = Some(constructor);
                }
                Some(ArgumentsMatchKind::RequiresConversion) => {
                    if conversion_match.is_some() {
                        multiple_options = true;
                    }
                    conversion_match = Some(constructor);
                }
                _ => {}
            }
        }

        let chosen = match (close_match, conversion_match) {
            (Some(close), _) => close,
            (None, Some(_)) if multiple_options => {
                return Err(EvalErrorKind::AmbiguousConstructor {
                    type_name: ty.name().to_string(),
                }
                .into());
            }
            (None, Some(conversion)) => conversion,
            (None, None) => return Ok(None),
        };
        Ok(Some(Arc::new(ReflectiveConstructorExecutor::new(
            chosen,
            ty.clone(),
        ))))
    }
}
