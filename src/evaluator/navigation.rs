use std::sync::Arc;

use crate::{
    ast::{AccessorCache, CachedAccessor, CachedExecutor, ConstructorCache, MethodCache, Node, Slot},
    error::{AccessError, EvalErrorKind, EvaluationError},
    evaluator::{EvalResult, ExpressionState, qualified_name},
    resolve::{ConstructorExecutor, MethodExecutor, accessors_to_try, matching::convert_arguments},
    types::{MethodRef, TypeRef},
    value::{TypedValue, Value},
};

fn describe_types(args: &[Value]) -> String {
    args.iter()
        .map(|a| a.type_name().to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn read_failed(name: &str, e: AccessError) -> EvaluationError {
    EvalErrorKind::PropertyReadFailed {
        name: name.to_string(),
        cause: e.to_string(),
    }
    .into()
}

fn write_failed(name: &str, e: AccessError) -> EvaluationError {
    EvalErrorKind::PropertyWriteFailed {
        name: name.to_string(),
        cause: e.to_string(),
    }
    .into()
}

/// Type the cached accessor is specialized against: the denoted type for
/// static access, the runtime type otherwise.
fn accessor_target(value: &Value) -> Option<(TypeRef, bool)> {
    match value {
        Value::Type(t) => Some((t.clone(), true)),
        other => other.runtime_type().map(|t| (t, false)),
    }
}

impl ExpressionState<'_> {
    /// Reads property `name` of `target`, trying the cached accessor first.
    pub(crate) fn read_property(
        &mut self,
        target: &TypedValue,
        name: &str,
        null_safe: bool,
        cache: &AccessorCache,
    ) -> EvalResult<TypedValue> {
        if target.is_null() {
            if null_safe {
                return Ok(TypedValue::NULL);
            }
            return Err(EvalErrorKind::PropertyNotReadableOnNull(name.to_string()).into());
        }
        let ctx = self.context();
        let key = target.value.dispatch_key();

        if let Some(cached) = cache.read.get()
            && Some(&cached.key) == key.as_ref()
        {
            match cached.accessor.read(ctx, &target.value, name) {
                Ok(value) => return Ok(value),
                Err(AccessError::Incompatible(_)) => cache.read.clear(),
                Err(e) => return Err(read_failed(name, e)),
            }
        }

        let runtime = target.value.runtime_type();
        for accessor in accessors_to_try(runtime.as_ref(), ctx.property_accessors()) {
            if !accessor
                .can_read(ctx, &target.value, name)
                .map_err(|e| read_failed(name, e))?
            {
                continue;
            }
            let value = accessor
                .read(ctx, &target.value, name)
                .map_err(|e| read_failed(name, e))?;
            if let (Some(key), Some((target_type, is_static))) =
                (key, accessor_target(&target.value))
            {
                cache.read.set(CachedAccessor {
                    key,
                    target_type,
                    is_static,
                    accessor,
                });
            }
            return Ok(value);
        }
        Err(EvalErrorKind::PropertyNotReadable {
            name: name.to_string(),
            type_name: target.value.type_name().to_string(),
        }
        .into())
    }

    pub(crate) fn write_property(&mut self, target: &TypedValue, name: &str, value: Value) -> EvalResult<()> {
        if target.is_null() {
            return Err(EvalErrorKind::PropertyNotWritableOnNull(name.to_string()).into());
        }
        let ctx = self.context();
        let runtime = target.value.runtime_type();
        for accessor in accessors_to_try(runtime.as_ref(), ctx.property_accessors()) {
            if accessor
                .can_write(ctx, &target.value, name)
                .map_err(|e| write_failed(name, e))?
            {
                return accessor
                    .write(ctx, &target.value, name, value)
                    .map_err(|e| write_failed(name, e));
            }
        }
        Err(EvalErrorKind::PropertyNotWritable {
            name: name.to_string(),
            type_name: target.value.type_name().to_string(),
        }
        .into())
    }

    pub(crate) fn is_property_writable(&self, target: &TypedValue, name: &str) -> bool {
        if target.is_null() {
            return false;
        }
        let ctx = self.context();
        let runtime = target.value.runtime_type();
        accessors_to_try(runtime.as_ref(), ctx.property_accessors())
            .iter()
            .any(|a| a.can_write(ctx, &target.value, name).unwrap_or(false))
    }

    /// Evaluates call arguments with the scope root as the active object.
    pub(crate) fn evaluate_arguments(&mut self, args: &[Node]) -> EvalResult<Vec<Value>> {
        let scope_root = self.scope_root();
        self.push_active_context_object(scope_root);
        let mut values = Vec::with_capacity(args.len());
        let mut result = Ok(());
        for arg in args {
            match self.evaluate_value(arg) {
                Ok(v) => values.push(v),
                Err(e) => {
                    result = Err(e);
                    break;
                }
            }
        }
        self.pop_active_context_object();
        result.map(|_| values)
    }

    pub(crate) fn call_method(
        &mut self,
        name: &str,
        args: &[Node],
        null_safe: bool,
        cache: &MethodCache,
    ) -> EvalResult<TypedValue> {
        let target = self.active_context_object();
        let arg_values = self.evaluate_arguments(args)?;
        if target.is_null() {
            if null_safe {
                return Ok(TypedValue::NULL);
            }
            return Err(EvalErrorKind::MethodOnNull(format!(
                "{}({})",
                name,
                describe_types(&arg_values)
            ))
            .into());
        }
        let ctx = self.context();
        let target_key = target.value.dispatch_key();
        let arg_keys: Vec<Option<Arc<str>>> = arg_values.iter().map(Value::dispatch_key).collect();

        if let Some(cached) = cache.get()
            && cached.is_suitable(&target_key, &arg_keys)
        {
            match cached.executor.execute(ctx, &target.value, arg_values.clone()) {
                Ok(value) => return Ok(value),
                Err(AccessError::Incompatible(_)) => cache.clear(),
                Err(e) => return Err(self.invocation_failed(name, &target.value, e)),
            }
        }

        let executor = self.find_method(&target.value, name, &arg_values)?;
        cache.set(CachedExecutor {
            target_key,
            arg_keys,
            executor: executor.clone(),
        });
        executor
            .execute(ctx, &target.value, arg_values)
            .map_err(|e| self.invocation_failed(name, &target.value, e))
    }

    fn find_method(
        &self,
        target: &Value,
        name: &str,
        args: &[Value],
    ) -> EvalResult<Arc<dyn MethodExecutor>> {
        let ctx = self.context();
        let arg_types: Vec<Option<TypeRef>> = args.iter().map(Value::runtime_type).collect();
        for resolver in ctx.method_resolvers() {
            if let Some(executor) = resolver.resolve(ctx, target, name, &arg_types)? {
                return Ok(executor);
            }
        }
        let type_name = match target {
            Value::Type(t) => t.name().to_string(),
            other => other.type_name().to_string(),
        };
        Err(EvalErrorKind::MethodNotFound {
            signature: format!("{}({})", name, describe_types(args)),
            type_name,
        }
        .into())
    }

    fn invocation_failed(&self, name: &str, target: &Value, e: AccessError) -> EvaluationError {
        EvalErrorKind::MethodInvocationFailed {
            name: name.to_string(),
            type_name: target.type_name().to_string(),
            cause: e.to_string(),
        }
        .into()
    }

    /// Calls the function stored in variable `name`.
    pub(crate) fn call_function(
        &mut self,
        name: &str,
        args: &[Node],
        resolved: &Slot<MethodRef>,
    ) -> EvalResult<TypedValue> {
        let function = match self.lookup_variable(name) {
            Value::Function(m) => m,
            Value::Null => return Err(EvalErrorKind::FunctionNotDefined(name.to_string()).into()),
            other => {
                return Err(EvalErrorKind::FunctionNotInvocable {
                    name: name.to_string(),
                    type_name: other.type_name().to_string(),
                }
                .into());
            }
        };
        let arg_values = self.evaluate_arguments(args)?;
        let value = invoke_function(self.context().type_converter(), name, &function, arg_values)?;
        resolved.set(function.clone());
        Ok(match function.return_type() {
            Some(rt) => TypedValue::with_descriptor(value, rt.clone()),
            None => TypedValue::new(value),
        })
    }

    pub(crate) fn construct(
        &mut self,
        type_name: &Node,
        args: &[Node],
        cache: &ConstructorCache,
    ) -> EvalResult<TypedValue> {
        let type_name = qualified_name(type_name);
        let arg_values = self.evaluate_arguments(args)?;
        let ctx = self.context();
        let target_key: Option<Arc<str>> = Some(Arc::from(type_name.as_str()));
        let arg_keys: Vec<Option<Arc<str>>> = arg_values.iter().map(Value::dispatch_key).collect();

        if let Some(cached) = cache.get()
            && cached.is_suitable(&target_key, &arg_keys)
        {
            match cached.executor.execute(ctx, arg_values.clone()) {
                Ok(value) => return Ok(value),
                Err(AccessError::Incompatible(_)) => cache.clear(),
                Err(e) => return Err(construction_failed(&type_name, e)),
            }
        }

        let executor = self.find_constructor(&type_name, &arg_values)?;
        cache.set(CachedExecutor {
            target_key,
            arg_keys,
            executor: executor.clone(),
        });
        executor
            .execute(ctx, arg_values)
            .map_err(|e| construction_failed(&type_name, e))
    }

    fn find_constructor(
        &self,
        type_name: &str,
        args: &[Value],
    ) -> EvalResult<Arc<dyn ConstructorExecutor>> {
        let ctx = self.context();
        let arg_types: Vec<Option<TypeRef>> = args.iter().map(Value::runtime_type).collect();
        for resolver in ctx.constructor_resolvers() {
            if let Some(executor) = resolver.resolve(ctx, type_name, &arg_types)? {
                return Ok(executor);
            }
        }
        Err(EvalErrorKind::ConstructorNotFound {
            type_name: type_name.to_string(),
            arguments: describe_types(args),
        }
        .into())
    }

    pub(crate) fn resolve_bean(&mut self, name: &str, factory: bool) -> EvalResult<TypedValue> {
        let lookup = if factory {
            format!("&{}", name)
        } else {
            name.to_string()
        };
        let ctx = self.context();
        let Some(resolver) = ctx.bean_resolver() else {
            return Err(EvalErrorKind::BeanResolverMissing(lookup).into());
        };
        resolver
            .resolve(ctx, &lookup)
            .map(TypedValue::new)
            .map_err(|e| {
                EvalErrorKind::BeanResolutionFailed {
                    name: lookup.clone(),
                    cause: e.to_string(),
                }
                .into()
            })
    }
}

fn construction_failed(type_name: &str, e: AccessError) -> EvaluationError {
    EvalErrorKind::ConstructorInvocationFailed {
        type_name: type_name.to_string(),
        cause: e.to_string(),
    }
    .into()
}

/// Checks arity, converts arguments and invokes a registered function.
/// Shared with compiled code.
pub(crate) fn invoke_function(
    converter: &dyn crate::resolve::TypeConverter,
    name: &str,
    function: &MethodRef,
    args: Vec<Value>,
) -> EvalResult<Value> {
    if !function.is_static() {
        return Err(EvalErrorKind::FunctionMustBeStatic(name.to_string()).into());
    }
    let expected = function.params().len();
    let arity_ok = if function.is_varargs() {
        args.len() + 1 >= expected
    } else {
        args.len() == expected
    };
    if !arity_ok {
        return Err(EvalErrorKind::IncorrectArgumentCount {
            name: name.to_string(),
            expected,
            actual: args.len(),
        }
        .into());
    }
    let (args, _) = convert_arguments(converter, args, function.params(), function.is_varargs())?;
    function.invoke(&Value::Null, &args).map_err(|e| {
        EvalErrorKind::FunctionInvocationFailed {
            name: name.to_string(),
            cause: e.to_string(),
        }
        .into()
    })
}
