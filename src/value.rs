use std::any::Any;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::mem;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use indexmap::IndexMap;
use num_bigint::BigInt;
use num_traits::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

use crate::types::{builtins, MethodRef, TypeRef};

/// A runtime value flowing through expressions.
///
/// Numbers keep their width: `Int` is 32-bit and wraps, `Long` is 64-bit,
/// `BigInteger` and `BigDecimal` are arbitrary precision. Collections are
/// shared and interior-mutable, so cloning a `Value::List` clones a handle,
/// not the elements. Host objects are owned by the host and reached only
/// through the resolution strategies.
///
/// # Examples
///
/// ```
/// use anise_lang::Value;
///
/// let n = Value::Int(42);
/// let s = Value::string("hello");
/// let list = Value::list(vec![Value::Int(1), Value::Int(2)]);
/// assert_eq!(list.to_string(), "[1, 2]");
/// assert_eq!(Value::Double(1.0).to_string(), "1.0");
/// ```
#[derive(Debug, Clone)]
pub enum Value {
    Null,

    Boolean(bool),

    /// 32-bit integer, arithmetic wraps
    Int(i32),

    /// 64-bit integer
    Long(i64),

    Float(f32),

    Double(f64),

    /// Arbitrary-precision integer
    BigInteger(BigInt),

    /// Arbitrary-precision decimal, keeps its scale
    BigDecimal(Decimal),

    String(String),

    /// Growable list
    List(ListRef),

    /// Insertion-ordered map
    Map(MapRef),

    /// Fixed-length array with an element type
    Array(ArrayRef),

    /// Host object
    Object(ObjectRef),

    /// A type, as produced by `T(name)`
    Type(TypeRef),

    /// A registered function
    Function(MethodRef),
}

pub type ListRef = Arc<Shared<Vec<Value>>>;
pub type MapRef = Arc<Shared<IndexMap<Value, Value>>>;
pub type ArrayRef = Arc<ArrayValue>;
pub type ObjectRef = Arc<dyn HostObject>;

/// Interior-mutable container shared between values. Constant-folded
/// literals are marked read-only.
#[derive(Debug, Default)]
pub struct Shared<T> {
    data: RwLock<T>,
    read_only: bool,
}

impl<T> Shared<T> {
    pub fn new(data: T) -> Self {
        Shared {
            data: RwLock::new(data),
            read_only: false,
        }
    }

    pub fn read_only(data: T) -> Self {
        Shared {
            data: RwLock::new(data),
            read_only: true,
        }
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug)]
pub struct ArrayValue {
    element: TypeRef,
    items: Shared<Vec<Value>>,
}

impl ArrayValue {
    pub fn element_type(&self) -> &TypeRef {
        &self.element
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Vec<Value>> {
        self.items.read()
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.items.read().get(index).cloned()
    }

    /// Replaces an element; the length never changes.
    pub fn set(&self, index: usize, value: Value) -> bool {
        match self.items.write().get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}

/// An object owned by the host application.
///
/// The engine never looks inside a host object directly; it reads its
/// runtime type and goes through the members registered there.
pub trait HostObject: Any + Send + Sync + fmt::Debug {
    fn runtime_type(&self) -> TypeRef;

    fn as_any(&self) -> &dyn Any;

    /// Value equality; identity unless overridden.
    fn equals(&self, other: &dyn HostObject) -> bool {
        std::ptr::addr_eq(self as *const Self, other as *const dyn HostObject)
    }

    /// Must agree with [`HostObject::equals`].
    fn hash_code(&self) -> u64 {
        (self as *const Self).cast::<()>() as usize as u64
    }

    /// Natural ordering, for objects that are comparable.
    fn compare_to(&self, _other: &dyn HostObject) -> Option<Ordering> {
        None
    }

    fn to_display_string(&self) -> String {
        format!("{:?}", self)
    }
}

/// Entry of a map, as seen by selection and projection criteria.
#[derive(Debug, Clone)]
pub struct MapEntry {
    pub key: Value,
    pub value: Value,
}

impl HostObject for MapEntry {
    fn runtime_type(&self) -> TypeRef {
        builtins().map_entry.clone()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn equals(&self, other: &dyn HostObject) -> bool {
        other
            .as_any()
            .downcast_ref::<MapEntry>()
            .is_some_and(|e| e.key == self.key && e.value == self.value)
    }

    fn hash_code(&self) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.key.hash(&mut hasher);
        self.value.hash(&mut hasher);
        hasher.finish()
    }

    fn to_display_string(&self) -> String {
        format!("{}={}", self.key, self.value)
    }
}

/// Position of a numeric type on the promotion ladder, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NumericKind {
    Int,
    Long,
    Float,
    Double,
    BigInteger,
    BigDecimal,
}

impl NumericKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            NumericKind::Int => builtins::INTEGER,
            NumericKind::Long => builtins::LONG,
            NumericKind::Float => builtins::FLOAT,
            NumericKind::Double => builtins::DOUBLE,
            NumericKind::BigInteger => builtins::BIG_INTEGER,
            NumericKind::BigDecimal => builtins::BIG_DECIMAL,
        }
    }

    pub fn from_type_name(name: &str) -> Option<NumericKind> {
        match name {
            builtins::INTEGER => Some(NumericKind::Int),
            builtins::LONG => Some(NumericKind::Long),
            builtins::FLOAT => Some(NumericKind::Float),
            builtins::DOUBLE => Some(NumericKind::Double),
            builtins::BIG_INTEGER => Some(NumericKind::BigInteger),
            builtins::BIG_DECIMAL => Some(NumericKind::BigDecimal),
            _ => None,
        }
    }

    pub fn is_integral(&self) -> bool {
        matches!(
            self,
            NumericKind::Int | NumericKind::Long | NumericKind::BigInteger
        )
    }
}

impl Value {
    pub fn string(s: impl Into<String>) -> Value {
        Value::String(s.into())
    }

    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Arc::new(Shared::new(items)))
    }

    pub fn read_only_list(items: Vec<Value>) -> Value {
        Value::List(Arc::new(Shared::read_only(items)))
    }

    pub fn map(entries: IndexMap<Value, Value>) -> Value {
        Value::Map(Arc::new(Shared::new(entries)))
    }

    pub fn read_only_map(entries: IndexMap<Value, Value>) -> Value {
        Value::Map(Arc::new(Shared::read_only(entries)))
    }

    pub fn array(element: &TypeRef, items: Vec<Value>) -> Value {
        Value::Array(Arc::new(ArrayValue {
            element: element.clone(),
            items: Shared::new(items),
        }))
    }

    pub fn object<T: HostObject>(object: T) -> Value {
        Value::Object(Arc::new(object))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_number(&self) -> bool {
        self.numeric_kind().is_some()
    }

    pub fn numeric_kind(&self) -> Option<NumericKind> {
        match self {
            Value::Int(_) => Some(NumericKind::Int),
            Value::Long(_) => Some(NumericKind::Long),
            Value::Float(_) => Some(NumericKind::Float),
            Value::Double(_) => Some(NumericKind::Double),
            Value::BigInteger(_) => Some(NumericKind::BigInteger),
            Value::BigDecimal(_) => Some(NumericKind::BigDecimal),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Borrows the host object as `T`.
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        match self {
            Value::Object(o) => o.as_any().downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Runtime type; `None` for null.
    pub fn runtime_type(&self) -> Option<TypeRef> {
        let b = builtins();
        let ty = match self {
            Value::Null => return None,
            Value::Boolean(_) => &b.boolean,
            Value::Int(_) => &b.integer,
            Value::Long(_) => &b.long,
            Value::Float(_) => &b.float,
            Value::Double(_) => &b.double,
            Value::BigInteger(_) => &b.big_integer,
            Value::BigDecimal(_) => &b.big_decimal,
            Value::String(_) => &b.string,
            Value::List(_) => &b.list,
            Value::Map(_) => &b.map,
            Value::Array(a) => return Some(crate::types::TypeInfo::array_of(&a.element)),
            Value::Object(o) => return Some(o.runtime_type()),
            Value::Type(_) => &b.class,
            Value::Function(_) => &b.function,
        };
        Some(ty.clone())
    }

    /// Name of the runtime type, `"null"` for null.
    pub fn type_name(&self) -> Arc<str> {
        match self.runtime_type() {
            Some(t) => t.name_arc(),
            None => Arc::from("null"),
        }
    }

    pub fn to_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Long(n) => Some(*n as f64),
            Value::Float(n) => Some(*n as f64),
            Value::Double(n) => Some(*n),
            Value::BigInteger(n) => n.to_f64(),
            Value::BigDecimal(n) => n.to_f64(),
            _ => None,
        }
    }

    /// Integral value; reals are truncated. `None` when it does not fit.
    pub fn to_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n as i64),
            Value::Long(n) => Some(*n),
            Value::Float(n) if n.is_finite() => Some(*n as i64),
            Value::Double(n) if n.is_finite() => Some(*n as i64),
            Value::BigInteger(n) => n.to_i64(),
            Value::BigDecimal(n) => n.trunc().to_i64(),
            _ => None,
        }
    }

    pub fn to_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Int(n) => Some(Decimal::from(*n)),
            Value::Long(n) => Some(Decimal::from(*n)),
            Value::Float(n) => Decimal::from_f32(*n),
            // shortest round-trip text keeps 0.1 as 0.1
            Value::Double(n) => n
                .to_string()
                .parse::<Decimal>()
                .ok()
                .or_else(|| Decimal::from_f64(*n)),
            Value::BigInteger(n) => Decimal::from_str_exact(&n.to_string()).ok(),
            Value::BigDecimal(n) => Some(*n),
            _ => None,
        }
    }

    pub fn to_bigint(&self) -> Option<BigInt> {
        match self {
            Value::Int(n) => Some(BigInt::from(*n)),
            Value::Long(n) => Some(BigInt::from(*n)),
            Value::Float(n) => BigInt::from_f32(n.trunc()),
            Value::Double(n) => BigInt::from_f64(n.trunc()),
            Value::BigInteger(n) => Some(n.clone()),
            Value::BigDecimal(n) => n.trunc().to_string().parse::<BigInt>().ok(),
            _ => None,
        }
    }

    /// Key under which resolution caches remember handles for this value.
    /// Type values are keyed by the type they denote, so static members of
    /// different types never share a cache entry.
    pub fn dispatch_key(&self) -> Option<Arc<str>> {
        match self {
            Value::Null => None,
            Value::Type(t) => Some(Arc::from(format!("T({})", t.name()))),
            other => other.runtime_type().map(|t| t.name_arc()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (Null, Null) => true,
            (Boolean(a), Boolean(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Long(a), Long(b)) => a == b,
            (Float(a), Float(b)) => a.to_bits() == b.to_bits(),
            (Double(a), Double(b)) => a.to_bits() == b.to_bits(),
            (BigInteger(a), BigInteger(b)) => a == b,
            (BigDecimal(a), BigDecimal(b)) => a == b,
            (String(a), String(b)) => a == b,
            (List(a), List(b)) => Arc::ptr_eq(a, b) || *a.read() == *b.read(),
            (Map(a), Map(b)) => Arc::ptr_eq(a, b) || *a.read() == *b.read(),
            (Array(a), Array(b)) => {
                Arc::ptr_eq(a, b) || (a.element == b.element && *a.read() == *b.read())
            }
            (Object(a), Object(b)) => Arc::ptr_eq(a, b) || a.equals(b.as_ref()),
            (Type(a), Type(b)) => a == b,
            (Function(a), Function(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Boolean(b) => b.hash(state),
            Value::Int(n) => n.hash(state),
            Value::Long(n) => n.hash(state),
            Value::Float(n) => n.to_bits().hash(state),
            Value::Double(n) => n.to_bits().hash(state),
            Value::BigInteger(n) => n.hash(state),
            Value::BigDecimal(n) => n.hash(state),
            Value::String(s) => s.hash(state),
            Value::List(items) => items.read().hash(state),
            // map equality ignores order
            Value::Map(entries) => entries.read().len().hash(state),
            Value::Array(a) => a.read().hash(state),
            Value::Object(o) => o.hash_code().hash(state),
            Value::Type(t) => t.name().hash(state),
            Value::Function(m) => m.name().hash(state),
        }
    }
}

/// Formats a floating-point number the way the host platform prints
/// doubles: `1.0`, `0.001`, `1.0E10`, `1.5E-5`.
fn format_real(plain: String, scientific: String, magnitude: f64) -> String {
    if (1e-3..1e7).contains(&magnitude) {
        if plain.contains('.') {
            plain
        } else {
            format!("{}.0", plain)
        }
    } else {
        let (mantissa, exponent) = scientific
            .split_once('e')
            .unwrap_or((scientific.as_str(), "0"));
        if mantissa.contains('.') {
            format!("{}E{}", mantissa, exponent)
        } else {
            format!("{}.0E{}", mantissa, exponent)
        }
    }
}

fn format_double(d: f64) -> String {
    if d.is_nan() {
        "NaN".to_string()
    } else if d.is_infinite() {
        (if d > 0.0 { "Infinity" } else { "-Infinity" }).to_string()
    } else if d == 0.0 {
        (if d.is_sign_negative() { "-0.0" } else { "0.0" }).to_string()
    } else {
        format_real(format!("{}", d), format!("{:e}", d), d.abs())
    }
}

fn format_float(f: f32) -> String {
    if f.is_nan() || f.is_infinite() || f == 0.0 {
        format_double(f as f64)
    } else {
        format_real(format!("{}", f), format!("{:e}", f), f.abs() as f64)
    }
}

fn write_joined<'a>(
    f: &mut fmt::Formatter<'_>,
    items: impl Iterator<Item = &'a Value>,
) -> fmt::Result {
    for (i, item) in items.enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Long(n) => write!(f, "{}", n),
            Value::Float(n) => f.write_str(&format_float(*n)),
            Value::Double(n) => f.write_str(&format_double(*n)),
            Value::BigInteger(n) => write!(f, "{}", n),
            Value::BigDecimal(n) => write!(f, "{}", n),
            Value::String(s) => f.write_str(s),
            Value::List(items) => {
                f.write_str("[")?;
                write_joined(f, items.read().iter())?;
                f.write_str("]")
            }
            Value::Array(a) => {
                f.write_str("[")?;
                write_joined(f, a.read().iter())?;
                f.write_str("]")
            }
            Value::Map(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.read().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}={}", k, v)?;
                }
                f.write_str("}")
            }
            Value::Object(o) => f.write_str(&o.to_display_string()),
            Value::Type(t) => write!(f, "class {}", t.name()),
            Value::Function(m) => write!(f, "function {}", m.signature()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Long(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Double(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Decimal> for Value {
    fn from(d: Decimal) -> Self {
        Value::BigDecimal(d)
    }
}

impl From<BigInt> for Value {
    fn from(n: BigInt) -> Self {
        Value::BigInteger(n)
    }
}

/// A value together with the static type it was read through, when known.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedValue {
    pub value: Value,
    pub descriptor: Option<TypeRef>,
}

impl TypedValue {
    pub const NULL: TypedValue = TypedValue {
        value: Value::Null,
        descriptor: None,
    };

    pub fn new(value: Value) -> Self {
        TypedValue {
            value,
            descriptor: None,
        }
    }

    pub fn with_descriptor(value: Value, descriptor: TypeRef) -> Self {
        TypedValue {
            value,
            descriptor: Some(descriptor),
        }
    }

    /// Declared type if known, else the runtime type.
    pub fn type_descriptor(&self) -> Option<TypeRef> {
        self.descriptor
            .clone()
            .or_else(|| self.value.runtime_type())
    }

    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }
}

impl From<Value> for TypedValue {
    fn from(value: Value) -> Self {
        TypedValue::new(value)
    }
}

#[test]
fn test_double_formatting() {
    assert_eq!(Value::Double(1.0).to_string(), "1.0");
    assert_eq!(Value::Double(0.5).to_string(), "0.5");
    assert_eq!(Value::Double(1e10).to_string(), "1.0E10");
    assert_eq!(Value::Double(1.5e-5).to_string(), "1.5E-5");
    assert_eq!(Value::Float(2.5).to_string(), "2.5");
}

#[test]
fn test_float_equality_uses_bits() {
    assert_eq!(Value::Double(f64::NAN), Value::Double(f64::NAN));
    assert_ne!(Value::Double(0.0), Value::Double(-0.0));
    assert_ne!(Value::Int(1), Value::Long(1));
}

#[test]
fn test_map_display() {
    let mut entries = IndexMap::new();
    entries.insert(Value::string("a"), Value::Int(1));
    entries.insert(Value::string("b"), Value::Null);
    assert_eq!(Value::map(entries).to_string(), "{a=1, b=null}");
}
