//! The tree-walking interpreter.
//!
//! [`ExpressionState`] carries everything one evaluation needs: the
//! context, the root object, the stack of active objects that navigation
//! resolves against, and the scopes opened by selection and projection.
//! Node handling is split by concern:
//!
//! - **[operators]** - arithmetic, logic, relational operators, steps
//! - **[navigation]** - properties, methods, functions, constructors, beans
//! - **[collections]** - indexing, selection, projection, array creation

pub mod collections;
pub mod navigation;
pub mod operators;

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::{
    ast::{Node, NodeKind, Slot},
    config::ParserConfig,
    context::EvaluationContext,
    error::{EvalErrorKind, EvaluationError},
    types::{TypeInfo, TypeRef, builtins},
    value::{ArrayRef, ListRef, MapRef, TypedValue, Value},
};

pub type EvalResult<T> = Result<T, EvaluationError>;

/// Per-evaluation state.
pub struct ExpressionState<'a> {
    context: &'a dyn EvaluationContext,
    config: &'a ParserConfig,
    root: TypedValue,
    context_objects: Vec<TypedValue>,
    scope_roots: Vec<TypedValue>,
    local_scopes: Vec<HashMap<String, Value>>,
}

/// Something an assignment or a step operator can write to.
pub(crate) enum ValueRef {
    Property {
        target: TypedValue,
        name: String,
    },
    Variable(String),
    ListElement {
        list: ListRef,
        index: usize,
    },
    ArrayElement {
        array: ArrayRef,
        index: usize,
    },
    MapEntry {
        map: MapRef,
        key: Value,
    },
    /// A value with no location; `description` names it in errors.
    Constant {
        value: TypedValue,
        description: String,
    },
}

/// Dotted name of a `QualifiedIdentifier` or `Identifier` node.
pub(crate) fn qualified_name(node: &Node) -> String {
    match &node.kind {
        NodeKind::QualifiedIdentifier(parts) => parts
            .iter()
            .map(qualified_name)
            .collect::<Vec<_>>()
            .join("."),
        NodeKind::Identifier(name) => name.clone(),
        NodeKind::Property { name, .. } => name.clone(),
        _ => node.to_ast_string(),
    }
}

/// A condition value as a boolean, converting non-booleans through the
/// context's converter. Null is never a valid condition.
pub(crate) fn truth_value(ctx: &dyn EvaluationContext, value: &Value) -> EvalResult<bool> {
    let converted = match value {
        Value::Boolean(b) => return Ok(*b),
        Value::Null => Value::Null,
        other => ctx.type_converter().convert_value(other, &builtins().boolean)?,
    };
    match converted {
        Value::Boolean(b) => Ok(b),
        _ => Err(EvalErrorKind::TypeConversion {
            from: value.type_name().to_string(),
            to: builtins::BOOLEAN.to_string(),
        }
        .into()),
    }
}

impl<'a> ExpressionState<'a> {
    pub fn new(context: &'a dyn EvaluationContext, root: TypedValue, config: &'a ParserConfig) -> Self {
        ExpressionState {
            context,
            config,
            root,
            context_objects: Vec::new(),
            scope_roots: Vec::new(),
            local_scopes: Vec::new(),
        }
    }

    pub fn context(&self) -> &'a dyn EvaluationContext {
        self.context
    }

    pub fn config(&self) -> &'a ParserConfig {
        self.config
    }

    pub fn root_object(&self) -> &TypedValue {
        &self.root
    }

    /// The object property and method nodes resolve against.
    pub fn active_context_object(&self) -> TypedValue {
        self.context_objects
            .last()
            .cloned()
            .unwrap_or_else(|| self.root.clone())
    }

    pub fn push_active_context_object(&mut self, value: TypedValue) {
        self.context_objects.push(value);
    }

    pub fn pop_active_context_object(&mut self) {
        self.context_objects.pop();
    }

    /// The root, or the current element inside selection and projection.
    pub fn scope_root(&self) -> TypedValue {
        self.scope_roots
            .last()
            .cloned()
            .unwrap_or_else(|| self.root.clone())
    }

    /// Makes `element` the active object and scope root, with `locals`
    /// visible as variables.
    pub fn enter_scope(&mut self, element: TypedValue, locals: HashMap<String, Value>) {
        self.context_objects.push(element.clone());
        self.scope_roots.push(element);
        self.local_scopes.push(locals);
    }

    pub fn exit_scope(&mut self) {
        self.local_scopes.pop();
        self.scope_roots.pop();
        self.context_objects.pop();
    }

    /// Local scope variables first, then the context's; null when unset.
    pub fn lookup_variable(&self, name: &str) -> Value {
        self.local_scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).cloned())
            .or_else(|| self.context.lookup_variable(name))
            .unwrap_or(Value::Null)
    }

    pub fn set_variable(&self, name: &str, value: Value) {
        self.context.set_variable(name, value);
    }

    /// Evaluates `node`, recording its exit type and locating errors that
    /// do not carry a position yet.
    pub fn evaluate(&mut self, node: &Node) -> EvalResult<TypedValue> {
        let result = self
            .evaluate_kind(node)
            .map_err(|e| e.or_position(node.span.start))?;
        node.observe_exit(&result.value);
        Ok(result)
    }

    pub fn evaluate_value(&mut self, node: &Node) -> EvalResult<Value> {
        Ok(self.evaluate(node)?.value)
    }

    fn evaluate_kind(&mut self, node: &Node) -> EvalResult<TypedValue> {
        use NodeKind::*;
        match &node.kind {
            Int(_) | Long(_) | Float(_) | Double(_) | String(_) | Boolean(_) | Null => {
                Ok(TypedValue::new(node.constant_value().unwrap_or(Value::Null)))
            }

            InlineList { elements, constant } => {
                if let Some(constant) = constant {
                    return Ok(TypedValue::new(constant.clone()));
                }
                let mut items = Vec::with_capacity(elements.len());
                for element in elements {
                    items.push(self.evaluate_value(element)?);
                }
                Ok(TypedValue::new(Value::list(items)))
            }
            InlineMap { entries, constant } => {
                if let Some(constant) = constant {
                    return Ok(TypedValue::new(constant.clone()));
                }
                let mut map = IndexMap::with_capacity(entries.len());
                for (key, value) in entries {
                    // a bare name is the key itself
                    let key = match &key.kind {
                        Property { name, .. } => Value::string(name.clone()),
                        _ => self.evaluate_value(key)?,
                    };
                    let value = self.evaluate_value(value)?;
                    map.insert(key, value);
                }
                Ok(TypedValue::new(Value::map(map)))
            }

            Identifier(_) | QualifiedIdentifier(_) => {
                Ok(TypedValue::new(Value::string(qualified_name(node))))
            }

            Compound(children) => self.evaluate_compound(children),

            Property {
                name,
                null_safe,
                cache,
            } => {
                let target = self.active_context_object();
                self.read_property(&target, name, *null_safe, cache)
            }
            Method {
                name,
                args,
                null_safe,
                cache,
            } => self.call_method(name, args, *null_safe, cache),
            Indexer {
                index,
                cache,
                indexed,
            } => self.evaluate_indexer(index, cache, indexed),
            Selection {
                variant,
                criteria,
                null_safe,
            } => self.select(*variant, criteria, *null_safe),
            Projection {
                expression,
                null_safe,
            } => self.project(expression, *null_safe),

            Variable(name) => Ok(match name.as_str() {
                "this" => self.active_context_object(),
                "root" => self.root.clone(),
                _ => TypedValue::new(self.lookup_variable(name)),
            }),
            Function {
                name,
                args,
                resolved,
            } => self.call_function(name, args, resolved),
            Bean { name, factory } => self.resolve_bean(name, *factory),

            TypeReference {
                name,
                dimensions,
                resolved,
            } => Ok(TypedValue::new(Value::Type(
                self.resolve_type_reference(name, *dimensions, resolved)?,
            ))),
            Constructor {
                type_name,
                args,
                cache,
            } => self.construct(type_name, args, cache),
            ArrayConstructor {
                type_name,
                dimensions,
                initializer,
            } => self.construct_array(type_name, dimensions, initializer.as_deref()),

            Binary { op, left, right } => self.apply_binop(*op, left, right),
            Unary { op, operand } => self.apply_unary(*op, operand),
            Step {
                op,
                prefix,
                operand,
            } => self.apply_step(*op, *prefix, operand),

            Ternary {
                condition,
                if_true,
                if_false,
            } => {
                if self.boolean_operand(condition)? {
                    self.evaluate(if_true)
                } else {
                    self.evaluate(if_false)
                }
            }
            Elvis { value, fallback } => {
                let result = self.evaluate(value)?;
                match &result.value {
                    Value::Null => self.evaluate(fallback),
                    Value::String(s) if s.is_empty() => self.evaluate(fallback),
                    _ => Ok(result),
                }
            }
            Assign { target, value } => {
                let new_value = self.evaluate(value)?;
                let target_ref = self.value_ref(target)?;
                self.write_ref(&target_ref, new_value.value.clone())
                    .map_err(|e| e.or_position(target.span.start))?;
                Ok(new_value)
            }
        }
    }

    /// Evaluates each child against the result of the previous one.
    fn evaluate_compound(&mut self, children: &[Node]) -> EvalResult<TypedValue> {
        let Some((first, rest)) = children.split_first() else {
            return Ok(TypedValue::NULL);
        };
        let mut current = self.evaluate(first)?;
        for child in rest {
            self.push_active_context_object(current);
            let result = self.evaluate(child);
            self.pop_active_context_object();
            current = result?;
        }
        Ok(current)
    }

    fn resolve_type_reference(
        &mut self,
        name: &Node,
        dimensions: usize,
        resolved: &Slot<TypeRef>,
    ) -> EvalResult<TypeRef> {
        if let Some(ty) = resolved.get() {
            return Ok(ty);
        }
        let mut ty = self.context.type_locator().find_type(&qualified_name(name))?;
        for _ in 0..dimensions {
            ty = TypeInfo::array_of(&ty);
        }
        resolved.set(ty.clone());
        Ok(ty)
    }

    /// Evaluates a condition operand that must be a non-null boolean.
    pub(crate) fn boolean_operand(&mut self, node: &Node) -> EvalResult<bool> {
        let value = self.evaluate_value(node)?;
        self.to_boolean(&value)
            .map_err(|e| e.or_position(node.span.start))
    }

    pub(crate) fn to_boolean(&self, value: &Value) -> EvalResult<bool> {
        truth_value(self.context, value)
    }

    /// Resolves the location `node` denotes without reading it.
    pub(crate) fn value_ref(&mut self, node: &Node) -> EvalResult<ValueRef> {
        match &node.kind {
            NodeKind::Compound(children) => {
                let Some((last, init)) = children.split_last() else {
                    return Err(EvalErrorKind::NotAssignable(node.to_ast_string()).into());
                };
                if init.is_empty() {
                    return self.value_ref(last);
                }
                let target = self.evaluate_compound(init)?;
                self.push_active_context_object(target);
                let result = self.value_ref(last);
                self.pop_active_context_object();
                result.map_err(|e| e.or_position(last.span.start))
            }
            NodeKind::Property { name, .. } => Ok(ValueRef::Property {
                target: self.active_context_object(),
                name: name.clone(),
            }),
            NodeKind::Variable(name) if name == "this" || name == "root" => {
                Err(EvalErrorKind::VariableNotAssignable(format!("#{}", name)).into())
            }
            NodeKind::Variable(name) => Ok(ValueRef::Variable(name.clone())),
            NodeKind::Indexer { index, indexed, .. } => self.indexer_ref(index, indexed),
            _ => Ok(ValueRef::Constant {
                value: self.evaluate(node)?,
                description: node.to_ast_string(),
            }),
        }
    }

    pub(crate) fn read_ref(&mut self, value_ref: &ValueRef) -> EvalResult<TypedValue> {
        match value_ref {
            ValueRef::Property { target, name } => {
                let cache = crate::ast::AccessorCache::default();
                self.read_property(target, name, false, &cache)
            }
            ValueRef::Variable(name) => Ok(TypedValue::new(self.lookup_variable(name))),
            ValueRef::ListElement { list, index } => {
                Ok(TypedValue::new(list.read().get(*index).cloned().unwrap_or(Value::Null)))
            }
            ValueRef::ArrayElement { array, index } => {
                Ok(TypedValue::new(array.get(*index).unwrap_or(Value::Null)))
            }
            ValueRef::MapEntry { map, key } => {
                Ok(TypedValue::new(map.read().get(key).cloned().unwrap_or(Value::Null)))
            }
            ValueRef::Constant { value, .. } => Ok(value.clone()),
        }
    }

    pub(crate) fn write_ref(&mut self, value_ref: &ValueRef, value: Value) -> EvalResult<()> {
        match value_ref {
            ValueRef::Property { target, name } => self.write_property(target, name, value),
            ValueRef::Variable(name) => {
                self.set_variable(name, value);
                Ok(())
            }
            ValueRef::ListElement { list, index } => {
                if list.is_read_only() {
                    return Err(EvalErrorKind::UnmodifiableCollection.into());
                }
                let mut items = list.write();
                let size = items.len();
                match items.get_mut(*index) {
                    Some(slot) => {
                        *slot = value;
                        Ok(())
                    }
                    None => Err(EvalErrorKind::CollectionIndexOutOfBounds {
                        size,
                        index: *index as i64,
                    }
                    .into()),
                }
            }
            ValueRef::ArrayElement { array, index } => {
                let value = self
                    .context
                    .type_converter()
                    .convert_value(&value, array.element_type())?;
                if array.set(*index, value) {
                    Ok(())
                } else {
                    Err(EvalErrorKind::ArrayIndexOutOfBounds {
                        size: array.len(),
                        index: *index as i64,
                    }
                    .into())
                }
            }
            ValueRef::MapEntry { map, key } => {
                if map.is_read_only() {
                    return Err(EvalErrorKind::UnmodifiableCollection.into());
                }
                map.write().insert(key.clone(), value);
                Ok(())
            }
            ValueRef::Constant { description, .. } => {
                Err(EvalErrorKind::NotAssignable(description.clone()).into())
            }
        }
    }

    pub(crate) fn is_ref_writable(&self, value_ref: &ValueRef) -> bool {
        match value_ref {
            ValueRef::Property { target, name } => self.is_property_writable(target, name),
            ValueRef::Variable(_) => true,
            ValueRef::ListElement { list, .. } => !list.is_read_only(),
            ValueRef::ArrayElement { .. } => true,
            ValueRef::MapEntry { map, .. } => !map.is_read_only(),
            ValueRef::Constant { .. } => false,
        }
    }

    /// Whether `node` denotes a writable location.
    pub fn is_writable(&mut self, node: &Node) -> EvalResult<bool> {
        match self.value_ref(node) {
            Ok(value_ref) => Ok(self.is_ref_writable(&value_ref)),
            Err(e) if matches!(e.kind, EvalErrorKind::VariableNotAssignable(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Assigns `value` to the location `node` denotes.
    pub fn assign(&mut self, node: &Node, value: Value) -> EvalResult<()> {
        let value_ref = self.value_ref(node)?;
        self.write_ref(&value_ref, value)
            .map_err(|e| e.or_position(node.span.start))
    }
}
