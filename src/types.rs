//! The runtime type model consumed by the reflective resolution strategies.
//!
//! Every value the engine touches has a [`TypeInfo`]: a name, a supertype,
//! the interfaces it implements, and its members. Members are plain data
//! carrying closures ([`MethodInfo`], [`FieldInfo`], [`ConstructorInfo`]),
//! so host applications describe their own types with [`TypeBuilder`]
//! instead of relying on runtime reflection.
//!
//! Types are compared by name.

pub mod builtins;

use std::fmt;
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use once_cell::sync::Lazy;

use crate::error::AccessError;
use crate::value::Value;

pub use builtins::builtins;

pub type TypeRef = Arc<TypeInfo>;
pub type MethodRef = Arc<MethodInfo>;
pub type FieldRef = Arc<FieldInfo>;
pub type ConstructorRef = Arc<ConstructorInfo>;

/// Calls a method on a target (`Value::Null` for static methods).
pub type Invoker = Arc<dyn Fn(&Value, &[Value]) -> Result<Value, AccessError> + Send + Sync>;
pub type Getter = Arc<dyn Fn(&Value) -> Result<Value, AccessError> + Send + Sync>;
pub type Setter = Arc<dyn Fn(&Value, Value) -> Result<(), AccessError> + Send + Sync>;
pub type Factory = Arc<dyn Fn(&[Value]) -> Result<Value, AccessError> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Class,
    Interface,
    Array,
}

#[derive(Default)]
pub struct Members {
    methods: Vec<MethodRef>,
    fields: Vec<FieldRef>,
    constructors: Vec<ConstructorRef>,
}

/// Describes one runtime type.
pub struct TypeInfo {
    name: Arc<str>,
    kind: TypeKind,
    superclass: Option<TypeRef>,
    interfaces: Vec<TypeRef>,
    component: Option<TypeRef>,
    members: OnceLock<Members>,
}

static ARRAY_TYPES: Lazy<DashMap<Arc<str>, TypeRef>> = Lazy::new(DashMap::new);

impl TypeInfo {
    /// Declares a type whose members are attached later with
    /// [`TypeInfo::define`]. Lets members refer to their own type.
    pub fn declare(
        name: &str,
        kind: TypeKind,
        superclass: Option<TypeRef>,
        interfaces: Vec<TypeRef>,
    ) -> TypeRef {
        Arc::new(TypeInfo {
            name: Arc::from(name),
            kind,
            superclass,
            interfaces,
            component: None,
            members: OnceLock::new(),
        })
    }

    /// Attaches members to a declared type. Only the first call wins.
    pub fn define(&self, members: Members) {
        let _ = self.members.set(members);
    }

    /// Array type with the given component type; one instance per name.
    pub fn array_of(component: &TypeRef) -> TypeRef {
        TypeInfo::array_type(component, &builtins().object)
    }

    /// `array_of` for use while the built-in table is being populated.
    pub(crate) fn array_type(component: &TypeRef, object: &TypeRef) -> TypeRef {
        let name: Arc<str> = Arc::from(format!("{}[]", component.name));
        ARRAY_TYPES
            .entry(name.clone())
            .or_insert_with(|| {
                let members = OnceLock::new();
                let _ = members.set(Members::default());
                Arc::new(TypeInfo {
                    name,
                    kind: TypeKind::Array,
                    superclass: Some(object.clone()),
                    interfaces: Vec::new(),
                    component: Some(component.clone()),
                    members,
                })
            })
            .clone()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn name_arc(&self) -> Arc<str> {
        self.name.clone()
    }

    /// Name without the namespace prefix.
    pub fn simple_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn is_interface(&self) -> bool {
        self.kind == TypeKind::Interface
    }

    pub fn is_array(&self) -> bool {
        self.kind == TypeKind::Array
    }

    pub fn superclass(&self) -> Option<&TypeRef> {
        self.superclass.as_ref()
    }

    pub fn interfaces(&self) -> &[TypeRef] {
        &self.interfaces
    }

    pub fn component_type(&self) -> Option<&TypeRef> {
        self.component.as_ref()
    }

    fn members(&self) -> Option<&Members> {
        self.members.get()
    }

    pub fn declared_methods(&self) -> &[MethodRef] {
        self.members().map(|m| m.methods.as_slice()).unwrap_or(&[])
    }

    pub fn declared_fields(&self) -> &[FieldRef] {
        self.members().map(|m| m.fields.as_slice()).unwrap_or(&[])
    }

    pub fn constructors(&self) -> &[ConstructorRef] {
        self.members()
            .map(|m| m.constructors.as_slice())
            .unwrap_or(&[])
    }

    /// This type followed by every supertype, superclasses first, then
    /// interfaces breadth first. No duplicates.
    pub fn hierarchy(self: &Arc<Self>) -> Vec<TypeRef> {
        let mut classes = Vec::new();
        let mut current = Some(self.clone());
        while let Some(t) = current {
            current = t.superclass.clone();
            classes.push(t);
        }

        let mut result: Vec<TypeRef> = Vec::new();
        let mut interfaces: Vec<TypeRef> = Vec::new();
        for class in &classes {
            interfaces.extend(class.interfaces.iter().cloned());
        }
        // Object goes after the interfaces
        let object = if classes.len() > 1
            && classes
                .last()
                .is_some_and(|c| c.name.as_ref() == builtins::OBJECT)
        {
            classes.pop()
        } else {
            None
        };
        result.extend(classes);

        let mut i = 0;
        while i < interfaces.len() {
            let iface = interfaces[i].clone();
            if !result.iter().any(|t| t.name == iface.name) {
                interfaces.extend(iface.interfaces.iter().cloned());
                result.push(iface);
            }
            i += 1;
        }
        if let Some(object) = object {
            result.push(object);
        }
        result
    }

    /// Methods named `name` visible on this type, most derived first.
    /// A method overridden further down the hierarchy appears once.
    pub fn find_methods(self: &Arc<Self>, name: &str) -> Vec<MethodRef> {
        let mut found: Vec<MethodRef> = Vec::new();
        for t in self.hierarchy() {
            for m in t.declared_methods() {
                if m.name == name && !found.iter().any(|f| f.same_signature(m)) {
                    found.push(m.clone());
                }
            }
        }
        found
    }

    pub fn find_field(self: &Arc<Self>, name: &str) -> Option<FieldRef> {
        self.hierarchy()
            .iter()
            .find_map(|t| t.declared_fields().iter().find(|f| f.name == name).cloned())
    }

    /// True if a value of type `other` can be used where `self` is expected.
    pub fn is_assignable_from(&self, other: &TypeInfo) -> bool {
        if self.name == other.name {
            return true;
        }
        if self.name.as_ref() == builtins::OBJECT {
            return true;
        }
        if let (Some(mine), Some(theirs)) = (&self.component, &other.component) {
            return mine.is_assignable_from(theirs);
        }
        if let Some(sup) = &other.superclass
            && self.is_assignable_from(sup)
        {
            return true;
        }
        other.interfaces.iter().any(|i| self.is_assignable_from(i))
    }
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for TypeInfo {}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeInfo({})", self.name)
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A callable member. Varargs methods receive their trailing arguments
/// packed into one `Value::Array`.
pub struct MethodInfo {
    name: String,
    params: Vec<TypeRef>,
    varargs: bool,
    is_static: bool,
    returns: Option<TypeRef>,
    invoker: Invoker,
}

impl MethodInfo {
    pub fn new<F>(name: &str, params: Vec<TypeRef>, invoker: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Result<Value, AccessError> + Send + Sync + 'static,
    {
        MethodInfo {
            name: name.to_string(),
            params,
            varargs: false,
            is_static: false,
            returns: None,
            invoker: Arc::new(invoker),
        }
    }

    /// A static method; the invoker never sees a target.
    pub fn static_fn<F>(name: &str, params: Vec<TypeRef>, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, AccessError> + Send + Sync + 'static,
    {
        let mut method = MethodInfo::new(name, params, move |_, args| f(args));
        method.is_static = true;
        method
    }

    /// Marks the last parameter (an array type) as variable arity.
    pub fn with_varargs(mut self) -> Self {
        self.varargs = true;
        self
    }

    pub fn returning(mut self, ty: &TypeRef) -> Self {
        self.returns = Some(ty.clone());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[TypeRef] {
        &self.params
    }

    pub fn is_varargs(&self) -> bool {
        self.varargs
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    pub fn return_type(&self) -> Option<&TypeRef> {
        self.returns.as_ref()
    }

    pub fn invoker(&self) -> Invoker {
        self.invoker.clone()
    }

    pub fn invoke(&self, target: &Value, args: &[Value]) -> Result<Value, AccessError> {
        (self.invoker)(target, args)
    }

    fn same_signature(&self, other: &MethodInfo) -> bool {
        self.name == other.name
            && self.params.len() == other.params.len()
            && self.params.iter().zip(&other.params).all(|(a, b)| a == b)
    }

    /// `name(lang.String, lang.Integer)`
    pub fn signature(&self) -> String {
        let params: Vec<&str> = self.params.iter().map(|p| p.name()).collect();
        format!("{}({})", self.name, params.join(", "))
    }
}

impl fmt::Debug for MethodInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MethodInfo({})", self.signature())
    }
}

pub struct FieldInfo {
    name: String,
    ty: TypeRef,
    is_static: bool,
    getter: Getter,
    setter: Option<Setter>,
}

impl FieldInfo {
    pub fn new<G>(name: &str, ty: &TypeRef, getter: G) -> Self
    where
        G: Fn(&Value) -> Result<Value, AccessError> + Send + Sync + 'static,
    {
        FieldInfo {
            name: name.to_string(),
            ty: ty.clone(),
            is_static: false,
            getter: Arc::new(getter),
            setter: None,
        }
    }

    /// A static constant.
    pub fn constant(name: &str, ty: &TypeRef, value: Value) -> Self {
        let mut field = FieldInfo::new(name, ty, move |_| Ok(value.clone()));
        field.is_static = true;
        field
    }

    /// Makes the field writable.
    pub fn with_setter<S>(mut self, setter: S) -> Self
    where
        S: Fn(&Value, Value) -> Result<(), AccessError> + Send + Sync + 'static,
    {
        self.setter = Some(Arc::new(setter));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> &TypeRef {
        &self.ty
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    pub fn is_writable(&self) -> bool {
        self.setter.is_some()
    }

    pub fn getter(&self) -> Getter {
        self.getter.clone()
    }

    pub fn get(&self, target: &Value) -> Result<Value, AccessError> {
        (self.getter)(target)
    }

    pub fn set(&self, target: &Value, value: Value) -> Result<(), AccessError> {
        match &self.setter {
            Some(setter) => setter(target, value),
            None => Err(AccessError::incompatible(format!(
                "field '{}' is final",
                self.name
            ))),
        }
    }
}

impl fmt::Debug for FieldInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldInfo({}: {})", self.name, self.ty.name())
    }
}

pub struct ConstructorInfo {
    params: Vec<TypeRef>,
    varargs: bool,
    factory: Factory,
}

impl ConstructorInfo {
    pub fn new<F>(params: Vec<TypeRef>, factory: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, AccessError> + Send + Sync + 'static,
    {
        ConstructorInfo {
            params,
            varargs: false,
            factory: Arc::new(factory),
        }
    }

    pub fn with_varargs(mut self) -> Self {
        self.varargs = true;
        self
    }

    pub fn params(&self) -> &[TypeRef] {
        &self.params
    }

    pub fn is_varargs(&self) -> bool {
        self.varargs
    }

    pub fn factory(&self) -> Factory {
        self.factory.clone()
    }

    pub fn construct(&self, args: &[Value]) -> Result<Value, AccessError> {
        (self.factory)(args)
    }
}

impl fmt::Debug for ConstructorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<&str> = self.params.iter().map(|p| p.name()).collect();
        write!(f, "ConstructorInfo({})", params.join(", "))
    }
}

/// Describes a host type.
///
/// # Example
/// ```
/// use anise_lang::types::{builtins, FieldInfo, TypeBuilder};
/// use anise_lang::Value;
///
/// let b = builtins();
/// let point = TypeBuilder::class("geo.Point")
///     .field(FieldInfo::constant("ORIGIN_X", &b.integer, Value::Int(0)))
///     .build();
/// assert_eq!(point.simple_name(), "Point");
/// ```
pub struct TypeBuilder {
    name: String,
    kind: TypeKind,
    superclass: Option<TypeRef>,
    interfaces: Vec<TypeRef>,
    members: Members,
}

impl TypeBuilder {
    pub fn class(name: &str) -> Self {
        TypeBuilder {
            name: name.to_string(),
            kind: TypeKind::Class,
            superclass: Some(builtins().object.clone()),
            interfaces: Vec::new(),
            members: Members::default(),
        }
    }

    pub fn interface(name: &str) -> Self {
        TypeBuilder {
            name: name.to_string(),
            kind: TypeKind::Interface,
            superclass: None,
            interfaces: Vec::new(),
            members: Members::default(),
        }
    }

    pub fn extends(mut self, superclass: &TypeRef) -> Self {
        self.superclass = Some(superclass.clone());
        self
    }

    pub fn implements(mut self, interface: &TypeRef) -> Self {
        self.interfaces.push(interface.clone());
        self
    }

    pub fn method(mut self, method: MethodInfo) -> Self {
        self.members.methods.push(Arc::new(method));
        self
    }

    pub fn field(mut self, field: FieldInfo) -> Self {
        self.members.fields.push(Arc::new(field));
        self
    }

    pub fn constructor(mut self, constructor: ConstructorInfo) -> Self {
        self.members.constructors.push(Arc::new(constructor));
        self
    }

    pub fn build(self) -> TypeRef {
        let ty = TypeInfo::declare(&self.name, self.kind, self.superclass, self.interfaces);
        ty.define(self.members);
        ty
    }

    /// Builds the type without members, returning the builder's members so
    /// they can be attached with [`TypeInfo::define`] once the type exists.
    pub fn declare(self) -> (TypeRef, Members) {
        let ty = TypeInfo::declare(&self.name, self.kind, self.superclass, self.interfaces);
        (ty, self.members)
    }
}

impl Members {
    pub fn new() -> Self {
        Members::default()
    }

    pub fn method(mut self, method: MethodInfo) -> Self {
        self.methods.push(Arc::new(method));
        self
    }

    pub fn field(mut self, field: FieldInfo) -> Self {
        self.fields.push(Arc::new(field));
        self
    }

    pub fn constructor(mut self, constructor: ConstructorInfo) -> Self {
        self.constructors.push(Arc::new(constructor));
        self
    }
}

#[test]
fn test_assignability_follows_hierarchy() {
    let b = builtins();
    assert!(b.number.is_assignable_from(&b.long));
    assert!(b.comparable.is_assignable_from(&b.string));
    assert!(b.object.is_assignable_from(&b.map));
    assert!(!b.string.is_assignable_from(&b.object));
    assert!(!b.integer.is_assignable_from(&b.long));
}

#[test]
fn test_array_types_are_interned() {
    let b = builtins();
    let a = TypeInfo::array_of(&b.string);
    let c = TypeInfo::array_of(&b.string);
    assert!(Arc::ptr_eq(&a, &c));
    assert_eq!(a.name(), "lang.String[]");
    assert!(TypeInfo::array_of(&b.object).is_assignable_from(&a));
}
