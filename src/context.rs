use std::sync::Arc;

use dashmap::DashMap;

use crate::{
    error::{EvalErrorKind, EvaluationError},
    resolve::{
        BeanResolver, ConstructorResolver, MapAccessor, MethodResolver, OperatorOverloader,
        PropertyAccessor, ReflectiveConstructorResolver, ReflectiveMethodResolver,
        ReflectivePropertyAccessor, StandardOperatorOverloader, StandardTypeComparator,
        StandardTypeConverter, StandardTypeLocator, TypeComparator, TypeConverter, TypeLocator,
    },
    types::MethodInfo,
    value::{TypedValue, Value},
};

/// Everything an expression can see while it is evaluated: the root
/// object, variables and the resolution strategies.
pub trait EvaluationContext: Send + Sync {
    fn root_object(&self) -> TypedValue;

    fn property_accessors(&self) -> &[Arc<dyn PropertyAccessor>];

    fn method_resolvers(&self) -> &[Arc<dyn MethodResolver>];

    fn constructor_resolvers(&self) -> &[Arc<dyn ConstructorResolver>];

    fn type_locator(&self) -> &dyn TypeLocator;

    fn type_converter(&self) -> &dyn TypeConverter;

    fn type_comparator(&self) -> &dyn TypeComparator;

    fn operator_overloader(&self) -> &dyn OperatorOverloader;

    fn bean_resolver(&self) -> Option<&dyn BeanResolver>;

    fn set_variable(&self, name: &str, value: Value);

    fn lookup_variable(&self, name: &str) -> Option<Value>;
}

/// The general-purpose context.
///
/// Comes with a [`MapAccessor`] and the reflective strategies, the standard
/// converter, comparator and type locator, and no bean resolver. Strategies
/// added later are consulted before the reflective ones, which stay last
/// until the accessor list is replaced with [`Self::set_property_accessors`].
///
/// # Example
///
/// ```
/// use anise_lang::{parse, StandardEvaluationContext, Value};
///
/// let ctx = StandardEvaluationContext::new();
/// ctx.set_variable("greeting", Value::string("hi"));
/// let expr = parse("#greeting.toUpperCase()").unwrap();
/// assert_eq!(expr.evaluate(&ctx).unwrap(), Value::string("HI"));
/// ```
pub struct StandardEvaluationContext {
    root: TypedValue,
    variables: DashMap<String, Value>,
    property_accessors: Vec<Arc<dyn PropertyAccessor>>,
    /// Whether the last accessor is the built-in reflective one
    reflective_accessor_last: bool,
    method_resolvers: Vec<Arc<dyn MethodResolver>>,
    constructor_resolvers: Vec<Arc<dyn ConstructorResolver>>,
    type_locator: Arc<dyn TypeLocator>,
    type_converter: Arc<dyn TypeConverter>,
    type_comparator: Arc<dyn TypeComparator>,
    operator_overloader: Arc<dyn OperatorOverloader>,
    bean_resolver: Option<Arc<dyn BeanResolver>>,
}

impl Default for StandardEvaluationContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Inserts before the last (reflective) entry.
fn add_before_default<T: ?Sized>(list: &mut Vec<Arc<T>>, item: Arc<T>) {
    let at = list.len().saturating_sub(1);
    list.insert(at, item);
}

impl StandardEvaluationContext {
    pub fn new() -> Self {
        StandardEvaluationContext {
            root: TypedValue::NULL,
            variables: DashMap::new(),
            property_accessors: vec![
                Arc::new(MapAccessor::new()),
                Arc::new(ReflectivePropertyAccessor::new()),
            ],
            reflective_accessor_last: true,
            method_resolvers: vec![Arc::new(ReflectiveMethodResolver::new())],
            constructor_resolvers: vec![Arc::new(ReflectiveConstructorResolver::new())],
            type_locator: Arc::new(StandardTypeLocator::new()),
            type_converter: Arc::new(StandardTypeConverter::new()),
            type_comparator: Arc::new(StandardTypeComparator::new()),
            operator_overloader: Arc::new(StandardOperatorOverloader),
            bean_resolver: None,
        }
    }

    pub fn with_root(root: Value) -> Self {
        let mut ctx = Self::new();
        ctx.set_root_object(root);
        ctx
    }

    pub fn set_root_object(&mut self, root: Value) {
        self.root = TypedValue::new(root);
    }

    /// Adds an accessor ahead of the reflective one, or at the end of a list
    /// installed with [`Self::set_property_accessors`].
    pub fn add_property_accessor(&mut self, accessor: Arc<dyn PropertyAccessor>) {
        if self.reflective_accessor_last {
            add_before_default(&mut self.property_accessors, accessor);
        } else {
            self.property_accessors.push(accessor);
        }
    }

    /// Replaces every accessor, the reflective one included. The list is
    /// consulted in the given order.
    pub fn set_property_accessors(&mut self, accessors: Vec<Arc<dyn PropertyAccessor>>) {
        self.property_accessors = accessors;
        self.reflective_accessor_last = false;
    }

    pub fn add_method_resolver(&mut self, resolver: Arc<dyn MethodResolver>) {
        add_before_default(&mut self.method_resolvers, resolver);
    }

    pub fn add_constructor_resolver(&mut self, resolver: Arc<dyn ConstructorResolver>) {
        add_before_default(&mut self.constructor_resolvers, resolver);
    }

    pub fn set_type_locator(&mut self, locator: Arc<dyn TypeLocator>) {
        self.type_locator = locator;
    }

    pub fn set_type_converter(&mut self, converter: Arc<dyn TypeConverter>) {
        self.type_converter = converter;
    }

    pub fn set_type_comparator(&mut self, comparator: Arc<dyn TypeComparator>) {
        self.type_comparator = comparator;
    }

    pub fn set_operator_overloader(&mut self, overloader: Arc<dyn OperatorOverloader>) {
        self.operator_overloader = overloader;
    }

    pub fn set_bean_resolver(&mut self, resolver: Arc<dyn BeanResolver>) {
        self.bean_resolver = Some(resolver);
    }

    /// Makes a static method callable as `#name(...)`.
    pub fn register_function(&self, name: &str, function: MethodInfo) -> Result<(), EvaluationError> {
        if !function.is_static() {
            return Err(EvalErrorKind::FunctionMustBeStatic(name.to_string()).into());
        }
        self.variables
            .insert(name.to_string(), Value::Function(Arc::new(function)));
        Ok(())
    }

    /// Sets a variable; `Value::Null` removes it.
    pub fn set_variable(&self, name: &str, value: Value) {
        if value.is_null() {
            self.variables.remove(name);
        } else {
            self.variables.insert(name.to_string(), value);
        }
    }
}

impl EvaluationContext for StandardEvaluationContext {
    fn root_object(&self) -> TypedValue {
        self.root.clone()
    }

    fn property_accessors(&self) -> &[Arc<dyn PropertyAccessor>] {
        &self.property_accessors
    }

    fn method_resolvers(&self) -> &[Arc<dyn MethodResolver>] {
        &self.method_resolvers
    }

    fn constructor_resolvers(&self) -> &[Arc<dyn ConstructorResolver>] {
        &self.constructor_resolvers
    }

    fn type_locator(&self) -> &dyn TypeLocator {
        self.type_locator.as_ref()
    }

    fn type_converter(&self) -> &dyn TypeConverter {
        self.type_converter.as_ref()
    }

    fn type_comparator(&self) -> &dyn TypeComparator {
        self.type_comparator.as_ref()
    }

    fn operator_overloader(&self) -> &dyn OperatorOverloader {
        self.operator_overloader.as_ref()
    }

    fn bean_resolver(&self) -> Option<&dyn BeanResolver> {
        self.bean_resolver.as_deref()
    }

    fn set_variable(&self, name: &str, value: Value) {
        StandardEvaluationContext::set_variable(self, name, value)
    }

    fn lookup_variable(&self, name: &str) -> Option<Value> {
        self.variables.get(name).map(|v| v.clone())
    }
}

#[test]
fn test_added_accessors_precede_reflective() {
    let mut ctx = StandardEvaluationContext::new();
    ctx.add_property_accessor(Arc::new(MapAccessor::new()));
    assert_eq!(ctx.property_accessors().len(), 3);
    assert!(format!("{:?}", ctx.property_accessors()[2]).starts_with("ReflectivePropertyAccessor"));
}

#[test]
fn test_replaced_accessor_list_keeps_insertion_order() {
    let mut ctx = StandardEvaluationContext::new();
    ctx.set_property_accessors(vec![Arc::new(ReflectivePropertyAccessor::new())]);
    ctx.add_property_accessor(Arc::new(MapAccessor::new()));
    assert_eq!(ctx.property_accessors().len(), 2);
    assert!(format!("{:?}", ctx.property_accessors()[0]).starts_with("ReflectivePropertyAccessor"));
    assert!(format!("{:?}", ctx.property_accessors()[1]).starts_with("MapAccessor"));

    ctx.set_property_accessors(vec![]);
    ctx.add_property_accessor(Arc::new(MapAccessor::new()));
    assert_eq!(ctx.property_accessors().len(), 1);
}

#[test]
fn test_register_function_requires_static() {
    let ctx = StandardEvaluationContext::new();
    let instance = MethodInfo::new("f", vec![], |_, _| Ok(Value::Null));
    assert!(ctx.register_function("f", instance).is_err());
    let function = MethodInfo::static_fn("g", vec![], |_| Ok(Value::Int(1)));
    assert!(ctx.register_function("g", function).is_ok());
    assert!(matches!(ctx.lookup_variable("g"), Some(Value::Function(_))));
}
