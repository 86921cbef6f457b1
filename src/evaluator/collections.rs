use std::collections::HashMap;

use indexmap::IndexMap;

use crate::{
    ast::{AccessorCache, IndexedKind, Node, NodeKind, SelectionVariant, Slot},
    error::{EvalErrorKind, EvaluationError},
    evaluator::{EvalResult, ExpressionState, ValueRef, qualified_name},
    types::{TypeInfo, TypeRef, builtins},
    value::{MapEntry, TypedValue, Value},
};

/// Elements of a list or array, with the array's element type.
fn elements(value: &Value) -> Option<(Vec<Value>, Option<TypeRef>)> {
    match value {
        Value::List(items) => Some((items.read().clone(), None)),
        Value::Array(array) => Some((array.read().clone(), Some(array.element_type().clone()))),
        _ => None,
    }
}

fn check_bounds(index: i64, size: usize, error: fn(usize, i64) -> EvalErrorKind) -> EvalResult<usize> {
    if index < 0 || index as usize >= size {
        return Err(error(size, index).into());
    }
    Ok(index as usize)
}

/// Most specific type shared by every non-null value, else `lang.Object`.
fn common_type(values: &[Value]) -> TypeRef {
    let mut types = values.iter().filter_map(Value::runtime_type);
    let Some(first) = types.next() else {
        return builtins().object.clone();
    };
    if types.all(|t| t.name() == first.name()) {
        first
    } else {
        builtins().object.clone()
    }
}

/// An array of `sizes[0]` elements, each an array of the remaining sizes,
/// down to elements of `component` holding `fill`.
fn filled_array(component: &TypeRef, sizes: &[usize], fill: &Value) -> Value {
    match sizes {
        [] => fill.clone(),
        [size] => Value::array(component, vec![fill.clone(); *size]),
        [size, rest @ ..] => {
            let mut inner = component.clone();
            for _ in 0..rest.len() {
                inner = TypeInfo::array_of(&inner);
            }
            let items = (0..*size)
                .map(|_| filled_array(component, rest, fill))
                .collect();
            Value::array(&inner, items)
        }
    }
}

/// Element default for arrays declared with a primitive name.
fn primitive_default(name: &str) -> Value {
    match name {
        "int" => Value::Int(0),
        "long" => Value::Long(0),
        "float" => Value::Float(0.0),
        "double" => Value::Double(0.0),
        "boolean" => Value::Boolean(false),
        _ => Value::Null,
    }
}

impl ExpressionState<'_> {
    /// Converts an operand to an int through the context's converter.
    fn int_operand(&mut self, node: &Node) -> EvalResult<i64> {
        let value = self.evaluate_value(node)?;
        self.to_int(&value)
            .map_err(|e| e.or_position(node.span.start))
    }

    fn to_int(&self, value: &Value) -> EvalResult<i64> {
        let converted = match value {
            Value::Int(i) => return Ok(*i as i64),
            other => self
                .context()
                .type_converter()
                .convert_value(other, &builtins().integer)?,
        };
        match converted {
            Value::Int(i) => Ok(i as i64),
            _ => Err(EvalErrorKind::TypeConversion {
                from: value.type_name().to_string(),
                to: builtins::INTEGER.to_string(),
            }
            .into()),
        }
    }

    /// Resolves `target[index]` to a location. Maps take the key as is (a
    /// bare name is the key itself); lists, arrays and strings take an int
    /// index; any other target is read by property name.
    pub(crate) fn indexer_ref(&mut self, index: &Node, indexed: &Slot<IndexedKind>) -> EvalResult<ValueRef> {
        let target = self.active_context_object();
        let key = if matches!(target.value, Value::Map(_))
            && let NodeKind::Property { name, .. } = &index.kind
        {
            Value::string(name.clone())
        } else {
            let root = self.root_object().clone();
            self.push_active_context_object(root);
            let key = self.evaluate_value(index);
            self.pop_active_context_object();
            key?
        };

        match &target.value {
            Value::Null => Err(EvalErrorKind::IndexIntoNull.into()),
            Value::Map(map) => {
                indexed.set(IndexedKind::Map);
                Ok(ValueRef::MapEntry {
                    map: map.clone(),
                    key,
                })
            }
            Value::List(list) => {
                let position = self.to_int(&key)?;
                let size = list.read().len();
                let index = check_bounds(position, size, |size, index| {
                    EvalErrorKind::CollectionIndexOutOfBounds { size, index }
                })?;
                indexed.set(IndexedKind::List);
                Ok(ValueRef::ListElement {
                    list: list.clone(),
                    index,
                })
            }
            Value::Array(array) => {
                let position = self.to_int(&key)?;
                let index = check_bounds(position, array.len(), |size, index| {
                    EvalErrorKind::ArrayIndexOutOfBounds { size, index }
                })?;
                indexed.set(IndexedKind::Array);
                Ok(ValueRef::ArrayElement {
                    array: array.clone(),
                    index,
                })
            }
            Value::String(text) => {
                let position = self.to_int(&key)?;
                let size = text.chars().count();
                let index = check_bounds(position, size, |size, index| {
                    EvalErrorKind::StringIndexOutOfBounds { size, index }
                })?;
                indexed.set(IndexedKind::String);
                let c = text.chars().nth(index).map(String::from).unwrap_or_default();
                Ok(ValueRef::Constant {
                    value: TypedValue::new(Value::String(c)),
                    description: format!("{}[{}]", text, index),
                })
            }
            _ => match key {
                Value::String(name) => {
                    indexed.set(IndexedKind::Object);
                    Ok(ValueRef::Property { target, name })
                }
                _ => Err(EvalErrorKind::IndexingNotSupported(target.value.type_name().to_string()).into()),
            },
        }
    }

    pub(crate) fn evaluate_indexer(
        &mut self,
        index: &Node,
        cache: &AccessorCache,
        indexed: &Slot<IndexedKind>,
    ) -> EvalResult<TypedValue> {
        match self.indexer_ref(index, indexed)? {
            ValueRef::Property { target, name } => self.read_property(&target, &name, false, cache),
            other => self.read_ref(&other),
        }
    }

    /// Evaluates a selection criterion for one element.
    fn criteria_holds(
        &mut self,
        criteria: &Node,
        element: Value,
        locals: HashMap<String, Value>,
    ) -> EvalResult<bool> {
        self.enter_scope(TypedValue::new(element), locals);
        let result = self.evaluate_value(criteria);
        self.exit_scope();
        match result? {
            Value::Boolean(b) => Ok(b),
            _ => Err(EvaluationError::at(
                EvalErrorKind::SelectionCriteriaNotBoolean,
                criteria.span.start,
            )),
        }
    }

    /// Evaluates a projection expression for one element.
    fn project_element(
        &mut self,
        expression: &Node,
        element: Value,
        locals: HashMap<String, Value>,
    ) -> EvalResult<Value> {
        self.enter_scope(TypedValue::new(element), locals);
        let result = self.evaluate_value(expression);
        self.exit_scope();
        result
    }

    pub(crate) fn select(
        &mut self,
        variant: SelectionVariant,
        criteria: &Node,
        null_safe: bool,
    ) -> EvalResult<TypedValue> {
        let operand = self.active_context_object();
        if let Value::Map(map) = &operand.value {
            let entries: Vec<(Value, Value)> = map
                .read()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            let mut selected = IndexMap::new();
            for (key, value) in entries {
                let entry = Value::object(MapEntry {
                    key: key.clone(),
                    value: value.clone(),
                });
                if self.criteria_holds(criteria, entry, HashMap::new())? {
                    if variant == SelectionVariant::Last {
                        selected.clear();
                    }
                    selected.insert(key, value);
                    if variant == SelectionVariant::First {
                        break;
                    }
                }
            }
            if variant != SelectionVariant::All && selected.is_empty() {
                return Ok(TypedValue::NULL);
            }
            return Ok(TypedValue::new(Value::map(selected)));
        }

        let Some((items, element_type)) = elements(&operand.value) else {
            if operand.is_null() && null_safe {
                return Ok(TypedValue::NULL);
            }
            return Err(EvalErrorKind::InvalidSelectionTarget(operand.value.type_name().to_string()).into());
        };
        let mut selected = Vec::new();
        for (i, item) in items.into_iter().enumerate() {
            let locals = HashMap::from([("index".to_string(), Value::Int(i as i32))]);
            if self.criteria_holds(criteria, item.clone(), locals)? {
                if variant == SelectionVariant::First {
                    return Ok(TypedValue::new(item));
                }
                selected.push(item);
            }
        }
        Ok(TypedValue::new(match variant {
            SelectionVariant::First => Value::Null,
            SelectionVariant::Last => selected.pop().unwrap_or(Value::Null),
            SelectionVariant::All => match element_type {
                Some(element_type) => Value::array(&element_type, selected),
                None => Value::list(selected),
            },
        }))
    }

    pub(crate) fn project(&mut self, expression: &Node, null_safe: bool) -> EvalResult<TypedValue> {
        let operand = self.active_context_object();
        if let Value::Map(map) = &operand.value {
            let entries: Vec<(Value, Value)> = map
                .read()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            let mut projected = Vec::with_capacity(entries.len());
            for (key, value) in entries {
                let entry = Value::object(MapEntry { key, value });
                projected.push(self.project_element(expression, entry, HashMap::new())?);
            }
            return Ok(TypedValue::new(Value::list(projected)));
        }

        let Some((items, element_type)) = elements(&operand.value) else {
            if operand.is_null() && null_safe {
                return Ok(TypedValue::NULL);
            }
            return Err(EvalErrorKind::ProjectionNotSupported(operand.value.type_name().to_string()).into());
        };
        let mut projected = Vec::with_capacity(items.len());
        for (i, item) in items.into_iter().enumerate() {
            let locals = HashMap::from([("index".to_string(), Value::Int(i as i32))]);
            projected.push(self.project_element(expression, item, locals)?);
        }
        Ok(TypedValue::new(match element_type {
            Some(_) => Value::array(&common_type(&projected), projected),
            None => Value::list(projected),
        }))
    }

    pub(crate) fn construct_array(
        &mut self,
        type_name: &Node,
        dimensions: &[Option<Node>],
        initializer: Option<&Node>,
    ) -> EvalResult<TypedValue> {
        let name = qualified_name(type_name);
        let component = self.context().type_locator().find_type(&name)?;
        let max = self.config().max_array_elements;

        let Some(initializer) = initializer else {
            if dimensions.is_empty() {
                return Err(EvalErrorKind::MissingArrayDimension.into());
            }
            let mut sizes = Vec::with_capacity(dimensions.len());
            let mut total: usize = 1;
            for dimension in dimensions {
                let Some(dimension) = dimension else {
                    return Err(EvalErrorKind::MissingArrayDimension.into());
                };
                let size = self.int_operand(dimension)?;
                if size < 0 {
                    return Err(EvaluationError::at(
                        EvalErrorKind::NegativeArraySize(size),
                        dimension.span.start,
                    ));
                }
                total = total.saturating_mul(size as usize);
                if total >= max {
                    return Err(EvalErrorKind::ArrayTooLarge(total).into());
                }
                sizes.push(size as usize);
            }
            let fill = primitive_default(&name);
            return Ok(TypedValue::new(filled_array(&component, &sizes, &fill)));
        };

        if dimensions.len() != 1 {
            return Err(EvalErrorKind::MultidimArrayInitializer.into());
        }
        let NodeKind::InlineList { elements, .. } = &initializer.kind else {
            return Err(EvalErrorKind::TypeConversion {
                from: initializer.kind_name().to_string(),
                to: TypeInfo::array_of(&component).name().to_string(),
            }
            .into());
        };
        if let Some(dimension) = &dimensions[0] {
            let expected = self.int_operand(dimension)?;
            if expected != elements.len() as i64 {
                return Err(EvalErrorKind::InitializerLengthIncorrect {
                    expected: expected.max(0) as usize,
                    actual: elements.len(),
                }
                .into());
            }
        }
        if elements.len() >= max {
            return Err(EvalErrorKind::ArrayTooLarge(elements.len()).into());
        }
        let converter = self.context().type_converter();
        let mut values = Vec::with_capacity(elements.len());
        for element in elements {
            let value = self.evaluate_value(element)?;
            let value = converter
                .convert_value(&value, &component)
                .map_err(|e| e.or_position(element.span.start))?;
            values.push(value);
        }
        Ok(TypedValue::new(Value::array(&component, values)))
    }
}

#[test]
fn test_filled_array_nests() {
    let b = builtins();
    let value = filled_array(&b.integer, &[2, 3], &Value::Int(0));
    let Value::Array(outer) = value else {
        panic!("expected an array");
    };
    assert_eq!(outer.len(), 2);
    assert_eq!(outer.element_type().name(), "lang.Integer[]");
    assert_eq!(outer.get(1).unwrap().to_string(), "[0, 0, 0]");
}

#[test]
fn test_common_type_falls_back_to_object() {
    let b = builtins();
    assert_eq!(common_type(&[Value::Int(1), Value::Null]).name(), b.integer.name());
    assert_eq!(common_type(&[Value::Int(1), Value::string("a")]).name(), b.object.name());
}
