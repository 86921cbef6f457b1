use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::ast::{BinaryOp, SelectionVariant, StepOp, UnaryOp};
use crate::resolve::{ConstructorExecutor, MethodExecutor, PropertyAccessor};
use crate::types::{builtins, MethodRef, TypeRef};
use crate::value::Value;

/// Char offsets `[start, end)` of a node in the expression text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }

    pub fn to(self, other: Span) -> Span {
        Span::new(self.start, other.end)
    }
}

/// A lock-guarded optional value that nodes update as they evaluate.
pub struct Slot<T>(RwLock<Option<T>>);

impl<T: Clone> Slot<T> {
    pub fn empty() -> Self {
        Slot(RwLock::new(None))
    }

    pub fn with(value: T) -> Self {
        Slot(RwLock::new(Some(value)))
    }

    pub fn get(&self) -> Option<T> {
        self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn set(&self, value: T) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = Some(value);
    }

    pub fn clear(&self) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl<T: Clone> Default for Slot<T> {
    fn default() -> Self {
        Slot::empty()
    }
}

impl<T: fmt::Debug> fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_read() {
            Ok(guard) => write!(f, "Slot({:?})", *guard),
            Err(_) => f.write_str("Slot(<locked>)"),
        }
    }
}

/// The accessor a property node settled on for one target type.
#[derive(Debug, Clone)]
pub struct CachedAccessor {
    /// Dispatch key of the target the accessor was chosen for
    pub key: Arc<str>,
    /// Type to specialize against; the denoted type for static access
    pub target_type: TypeRef,
    pub is_static: bool,
    pub accessor: Arc<dyn PropertyAccessor>,
}

#[derive(Debug, Default)]
pub struct AccessorCache {
    pub read: Slot<CachedAccessor>,
    pub write: Slot<CachedAccessor>,
}

/// The executor a call node settled on for one target type and argument
/// type list.
#[derive(Debug)]
pub struct CachedExecutor<E: ?Sized> {
    pub target_key: Option<Arc<str>>,
    pub arg_keys: Vec<Option<Arc<str>>>,
    pub executor: Arc<E>,
}

impl<E: ?Sized> Clone for CachedExecutor<E> {
    fn clone(&self) -> Self {
        CachedExecutor {
            target_key: self.target_key.clone(),
            arg_keys: self.arg_keys.clone(),
            executor: self.executor.clone(),
        }
    }
}

impl<E: ?Sized> CachedExecutor<E> {
    pub fn is_suitable(&self, target_key: &Option<Arc<str>>, arg_keys: &[Option<Arc<str>>]) -> bool {
        &self.target_key == target_key && self.arg_keys == arg_keys
    }
}

pub type MethodCache = Slot<CachedExecutor<dyn MethodExecutor>>;
pub type ConstructorCache = Slot<CachedExecutor<dyn ConstructorExecutor>>;

/// What an indexer was last applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexedKind {
    List,
    Array,
    Map,
    String,
    Object,
}

/// A node of the abstract syntax tree.
///
/// The shape of a tree never changes after parsing. What does change is
/// what each node learns while it is evaluated: the type of value it
/// produces (its exit type) and, for navigation nodes, the resolution
/// handle it used. The compiler reads both. Resolution caches are boxed
/// so that nodes stay small while the parser recurses.
#[derive(Debug)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
    exit: Slot<Arc<str>>,
}

#[derive(Debug)]
pub enum NodeKind {
    // Literals
    /// 32-bit int literal
    ///
    /// # Example
    /// ```text
    /// 42
    /// 0xFF
    /// ```
    Int(i32),

    /// Long literal
    ///
    /// # Example
    /// ```text
    /// 42L
    /// ```
    Long(i64),

    /// Float literal
    ///
    /// # Example
    /// ```text
    /// 1.5f
    /// ```
    Float(f32),

    /// Double literal
    ///
    /// # Example
    /// ```text
    /// 3.14
    /// 1e10
    /// ```
    Double(f64),

    /// String literal, quotes removed and doubled quotes collapsed
    String(String),

    Boolean(bool),

    Null,

    /// Inline list
    ///
    /// `constant` holds the shared read-only value when every element is
    /// itself a literal or a constant inline collection.
    ///
    /// # Example
    /// ```text
    /// {1, 2, 3}
    /// {}
    /// ```
    InlineList {
        elements: Vec<Node>,
        constant: Option<Value>,
    },

    /// Inline map; keys that are bare identifiers are taken as strings
    ///
    /// # Example
    /// ```text
    /// {name: 'Ada', 'born': 1815}
    /// {:}
    /// ```
    InlineMap {
        entries: Vec<(Node, Node)>,
        constant: Option<Value>,
    },

    /// One segment of a qualified name
    Identifier(String),

    /// Dotted type name, as used by `T(...)` and `new`
    QualifiedIdentifier(Vec<Node>),

    // Navigation
    /// A start node followed by dotted nodes and indexers
    ///
    /// # Example
    /// ```text
    /// person.address?.city
    /// orders[0].total
    /// ```
    Compound(Vec<Node>),

    /// Property or field read on the active object
    Property {
        name: String,
        null_safe: bool,
        cache: Box<AccessorCache>,
    },

    /// Method call on the active object
    ///
    /// # Example
    /// ```text
    /// name.substring(0, 3)
    /// ```
    Method {
        name: String,
        args: Vec<Node>,
        null_safe: bool,
        cache: Box<MethodCache>,
    },

    /// Index into a list, array, string or map, or a property by name
    ///
    /// # Example
    /// ```text
    /// list[0]
    /// map['key']
    /// person['name']
    /// ```
    Indexer {
        index: Box<Node>,
        cache: Box<AccessorCache>,
        indexed: Slot<IndexedKind>,
    },

    /// Selection over a collection or map
    ///
    /// # Example
    /// ```text
    /// numbers.?[#this > 2]
    /// people.^[age > 30]
    /// ```
    Selection {
        variant: SelectionVariant,
        criteria: Box<Node>,
        null_safe: bool,
    },

    /// Projection over a collection or map
    ///
    /// # Example
    /// ```text
    /// people.![name]
    /// ```
    Projection {
        expression: Box<Node>,
        null_safe: bool,
    },

    /// Variable reference; `#this` and `#root` are reserved
    Variable(String),

    /// Call of a registered function
    ///
    /// # Example
    /// ```text
    /// #reverse('abc')
    /// ```
    Function {
        name: String,
        args: Vec<Node>,
        resolved: Slot<MethodRef>,
    },

    /// Bean lookup through the context's bean resolver
    ///
    /// # Example
    /// ```text
    /// @accountService
    /// &accountFactory
    /// @'name.with.dots'
    /// ```
    Bean { name: String, factory: bool },

    /// Type reference, optionally an array type
    ///
    /// # Example
    /// ```text
    /// T(Math)
    /// T(lang.String[])
    /// ```
    TypeReference {
        name: Box<Node>,
        dimensions: usize,
        resolved: Slot<TypeRef>,
    },

    /// Constructor call
    ///
    /// # Example
    /// ```text
    /// new BigDecimal('1.50')
    /// ```
    Constructor {
        type_name: Box<Node>,
        args: Vec<Node>,
        cache: Box<ConstructorCache>,
    },

    /// Array construction with dimensions or an initializer
    ///
    /// # Example
    /// ```text
    /// new int[3]
    /// new String[]{'a', 'b'}
    /// ```
    ArrayConstructor {
        type_name: Box<Node>,
        dimensions: Vec<Option<Node>>,
        initializer: Option<Box<Node>>,
    },

    // Operators
    Binary {
        op: BinaryOp,
        left: Box<Node>,
        right: Box<Node>,
    },

    Unary {
        op: UnaryOp,
        operand: Box<Node>,
    },

    /// `++`/`--`, prefix or postfix
    Step {
        op: StepOp,
        prefix: bool,
        operand: Box<Node>,
    },

    /// `condition ? if_true : if_false`
    Ternary {
        condition: Box<Node>,
        if_true: Box<Node>,
        if_false: Box<Node>,
    },

    /// `value ?: fallback`; the fallback is used for null or an empty string
    Elvis {
        value: Box<Node>,
        fallback: Box<Node>,
    },

    /// `target = value`
    Assign {
        target: Box<Node>,
        value: Box<Node>,
    },
}

impl Node {
    pub fn new(kind: NodeKind, span: Span) -> Self {
        let b = builtins();
        let exit = match &kind {
            NodeKind::Int(_) => Slot::with(b.integer.name_arc()),
            NodeKind::Long(_) => Slot::with(b.long.name_arc()),
            NodeKind::Float(_) => Slot::with(b.float.name_arc()),
            NodeKind::Double(_) => Slot::with(b.double.name_arc()),
            NodeKind::String(_) => Slot::with(b.string.name_arc()),
            NodeKind::Boolean(_) => Slot::with(b.boolean.name_arc()),
            NodeKind::InlineList {
                constant: Some(_), ..
            } => Slot::with(b.list.name_arc()),
            _ => Slot::empty(),
        };
        Node { kind, span, exit }
    }

    pub fn boxed(self) -> Box<Node> {
        Box::new(self)
    }

    /// Type of the values this node produced so far, if it was consistent.
    pub fn exit_type(&self) -> Option<Arc<str>> {
        self.exit.get()
    }

    /// Records the type of a produced value. Nulls carry no information;
    /// a type that disagrees with the recorded one clears it.
    pub(crate) fn observe_exit(&self, value: &Value) {
        let Some(observed) = value.runtime_type() else {
            return;
        };
        match self.exit.get() {
            Some(known) if known.as_ref() == observed.name() => {}
            Some(_) => self.exit.clear(),
            None => self.exit.set(observed.name_arc()),
        }
    }

    pub fn children(&self) -> Vec<&Node> {
        use NodeKind::*;
        match &self.kind {
            Int(_) | Long(_) | Float(_) | Double(_) | String(_) | Boolean(_) | Null => vec![],
            Identifier(_) | Property { .. } | Variable(_) | Bean { .. } => vec![],
            InlineList { elements, .. } => elements.iter().collect(),
            InlineMap { entries, .. } => entries.iter().flat_map(|(k, v)| [k, v]).collect(),
            QualifiedIdentifier(parts) | Compound(parts) => parts.iter().collect(),
            Method { args, .. } | Function { args, .. } => args.iter().collect(),
            Indexer { index, .. } => vec![index],
            Selection { criteria, .. } => vec![criteria],
            Projection { expression, .. } => vec![expression],
            TypeReference { name, .. } => vec![name],
            Constructor {
                type_name, args, ..
            } => std::iter::once(type_name.as_ref()).chain(args.iter()).collect(),
            ArrayConstructor {
                type_name,
                dimensions,
                initializer,
            } => std::iter::once(type_name.as_ref())
                .chain(dimensions.iter().flatten())
                .chain(initializer.iter().map(|n| n.as_ref()))
                .collect(),
            Binary { left, right, .. } => vec![left, right],
            Unary { operand, .. } | Step { operand, .. } => vec![operand],
            Ternary {
                condition,
                if_true,
                if_false,
            } => vec![condition, if_true, if_false],
            Elvis { value, fallback } => vec![value, fallback],
            Assign { target, value } => vec![target, value],
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Int(_)
                | NodeKind::Long(_)
                | NodeKind::Float(_)
                | NodeKind::Double(_)
                | NodeKind::String(_)
                | NodeKind::Boolean(_)
                | NodeKind::Null
        )
    }

    /// Value of a literal or constant-folded inline collection.
    pub fn constant_value(&self) -> Option<Value> {
        match &self.kind {
            NodeKind::Int(n) => Some(Value::Int(*n)),
            NodeKind::Long(n) => Some(Value::Long(*n)),
            NodeKind::Float(n) => Some(Value::Float(*n)),
            NodeKind::Double(n) => Some(Value::Double(*n)),
            NodeKind::String(s) => Some(Value::String(s.clone())),
            NodeKind::Boolean(b) => Some(Value::Boolean(*b)),
            NodeKind::Null => Some(Value::Null),
            NodeKind::InlineList { constant, .. } | NodeKind::InlineMap { constant, .. } => {
                constant.clone()
            }
            _ => None,
        }
    }

    /// Short name of the node kind, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        use NodeKind::*;
        match &self.kind {
            Int(_) => "IntLiteral",
            Long(_) => "LongLiteral",
            Float(_) => "FloatLiteral",
            Double(_) => "RealLiteral",
            String(_) => "StringLiteral",
            Boolean(_) => "BooleanLiteral",
            Null => "NullLiteral",
            InlineList { .. } => "InlineList",
            InlineMap { .. } => "InlineMap",
            Identifier(_) => "Identifier",
            QualifiedIdentifier(_) => "QualifiedIdentifier",
            Compound(_) => "CompoundExpression",
            Property { .. } => "PropertyOrFieldReference",
            Method { .. } => "MethodReference",
            Indexer { .. } => "Indexer",
            Selection { .. } => "Selection",
            Projection { .. } => "Projection",
            Variable(_) => "VariableReference",
            Function { .. } => "FunctionReference",
            Bean { .. } => "BeanReference",
            TypeReference { .. } => "TypeReference",
            Constructor { .. } => "ConstructorReference",
            ArrayConstructor { .. } => "ArrayConstructor",
            Binary { op, .. } => match op {
                BinaryOp::Add => "OpPlus",
                BinaryOp::Subtract => "OpMinus",
                BinaryOp::Multiply => "OpMultiply",
                BinaryOp::Divide => "OpDivide",
                BinaryOp::Modulo => "OpModulus",
                BinaryOp::Power => "OperatorPower",
                BinaryOp::And => "OpAnd",
                BinaryOp::Or => "OpOr",
                BinaryOp::Equal => "OpEQ",
                BinaryOp::NotEqual => "OpNE",
                BinaryOp::LessThan => "OpLT",
                BinaryOp::LessEqual => "OpLE",
                BinaryOp::GreaterThan => "OpGT",
                BinaryOp::GreaterEqual => "OpGE",
                BinaryOp::Instanceof => "OperatorInstanceof",
                BinaryOp::Matches => "OperatorMatches",
                BinaryOp::Between => "OperatorBetween",
            },
            Unary { op, .. } => match op {
                UnaryOp::Plus => "OpPlus",
                UnaryOp::Minus => "OpMinus",
                UnaryOp::Not => "OperatorNot",
            },
            Step { op, .. } => match op {
                StepOp::Increment => "OpInc",
                StepOp::Decrement => "OpDec",
            },
            Ternary { .. } => "Ternary",
            Elvis { .. } => "Elvis",
            Assign { .. } => "Assign",
        }
    }
}
