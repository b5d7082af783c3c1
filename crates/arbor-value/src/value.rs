//! The persistent value model
//!
//! A [`Value`] is a leaf, a map or a sequence. Containers sit behind an
//! [`Arc`], so cloning a value is shallow and two values can be compared by
//! identity with [`Value::same`]. Nothing in this module mutates a container
//! once it is shared.

use crate::path::{Prop, ValuePath};
use indexmap::IndexMap;
use serde::ser::{Error as _, SerializeMap};
use std::any::Any;
use std::fmt::{self, Debug, Display, Formatter};
use std::sync::Arc;

/// Insertion-ordered map node contents
pub type Mapping = IndexMap<String, Value>;

/// Sequence node contents
pub type Sequence = Vec<Value>;

/// Coarse classification of a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Bool,
    Int,
    Float,
    Str,
    Opaque,
    Map,
    Seq,
}

impl ValueKind {
    /// Whether values of this kind are drafted containers
    #[inline]
    #[must_use]
    pub const fn is_container(self) -> bool {
        matches!(self, Self::Map | Self::Seq)
    }
}

impl Display for ValueKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Str => "string",
            Self::Opaque => "opaque",
            Self::Map => "map",
            Self::Seq => "sequence",
        };
        f.write_str(name)
    }
}

/// Host value carried through a tree untouched
///
/// Dates, handles, callbacks and any other foreign object live here. An
/// opaque value is never drafted and compares by identity only.
#[derive(Clone)]
pub struct Opaque {
    type_name: &'static str,
    inner: Arc<dyn Any + Send + Sync>,
}

impl Opaque {
    /// Wrap a host value
    #[must_use]
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            inner: Arc::new(value),
        }
    }

    /// Rust type name of the wrapped value
    #[inline]
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Borrow the wrapped value if it is a `T`
    #[inline]
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Identity comparison
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.inner).cast::<()>() as usize
    }
}

impl PartialEq for Opaque {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Debug for Opaque {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Opaque<{}>", self.type_name)
    }
}

/// Scalar or foreign value; never drafted
#[derive(Debug, Clone, PartialEq)]
pub enum Leaf {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Opaque(Opaque),
}

impl Leaf {
    /// Kind of this leaf
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Null => ValueKind::Null,
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Int,
            Self::Float(_) => ValueKind::Float,
            Self::Str(_) => ValueKind::Str,
            Self::Opaque(_) => ValueKind::Opaque,
        }
    }
}

/// Identity key of a container node
///
/// Only meaningful while the node it was taken from is alive; holders keep
/// the node alive alongside the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeKey(usize);

/// A node of a persistent tree
#[derive(Clone)]
pub enum Value {
    Leaf(Leaf),
    Map(Arc<Mapping>),
    Seq(Arc<Sequence>),
}

impl Value {
    /// The null leaf
    #[inline]
    #[must_use]
    pub const fn null() -> Self {
        Self::Leaf(Leaf::Null)
    }

    /// Map node from key/value pairs, keeping their order
    #[must_use]
    pub fn map<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self::Map(Arc::new(entries.into_iter().map(|(k, v)| (k.into(), v)).collect()))
    }

    /// Sequence node from items
    #[must_use]
    pub fn seq<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        Self::Seq(Arc::new(items.into_iter().collect()))
    }

    /// Opaque leaf wrapping a host value
    #[must_use]
    pub fn opaque<T: Any + Send + Sync>(value: T) -> Self {
        Self::Leaf(Leaf::Opaque(Opaque::new(value)))
    }

    /// Kind of this value
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Leaf(leaf) => leaf.kind(),
            Self::Map(_) => ValueKind::Map,
            Self::Seq(_) => ValueKind::Seq,
        }
    }

    /// True for maps and sequences, the only values that get drafted
    #[inline]
    #[must_use]
    pub fn is_container(&self) -> bool {
        matches!(self, Self::Map(_) | Self::Seq(_))
    }

    /// True for leaves
    #[inline]
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Leaf(_))
    }

    /// Identity comparison
    ///
    /// Containers are the same when they are the same allocation. Leaves are
    /// the same when they are equal, except opaque leaves which compare by
    /// identity.
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Map(a), Self::Map(b)) => Arc::ptr_eq(a, b),
            (Self::Seq(a), Self::Seq(b)) => Arc::ptr_eq(a, b),
            (Self::Leaf(a), Self::Leaf(b)) => a == b,
            _ => false,
        }
    }

    /// Identity key for containers
    #[must_use]
    pub fn node_key(&self) -> Option<NodeKey> {
        match self {
            Self::Map(m) => Some(NodeKey(Arc::as_ptr(m) as usize)),
            Self::Seq(s) => Some(NodeKey(Arc::as_ptr(s) as usize)),
            Self::Leaf(_) => None,
        }
    }

    /// Child at `prop`
    ///
    /// Maps accept indices spelled as keys, sequences accept canonical
    /// decimal keys as indices.
    #[must_use]
    pub fn get(&self, prop: &Prop) -> Option<&Value> {
        match self {
            Self::Map(m) => m.get(prop.to_key().as_ref()),
            Self::Seq(items) => prop.as_index().and_then(|i| items.get(i)),
            Self::Leaf(_) => None,
        }
    }

    /// Descendant at `path`
    #[must_use]
    pub fn get_path(&self, path: &ValuePath) -> Option<&Value> {
        path.iter().try_fold(self, |node, prop| node.get(prop))
    }

    /// Whether `prop` is present
    #[inline]
    #[must_use]
    pub fn contains(&self, prop: &Prop) -> bool {
        self.get(prop).is_some()
    }

    /// Props of the direct children, in order
    #[must_use]
    pub fn props(&self) -> Vec<Prop> {
        match self {
            Self::Map(m) => m.keys().map(|k| Prop::Key(k.clone())).collect(),
            Self::Seq(items) => (0..items.len()).map(Prop::Index).collect(),
            Self::Leaf(_) => Vec::new(),
        }
    }

    /// Number of direct children (zero for leaves)
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Map(m) => m.len(),
            Self::Seq(items) => items.len(),
            Self::Leaf(_) => 0,
        }
    }

    /// True when there are no direct children
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    #[must_use]
    pub fn as_map(&self) -> Option<&Mapping> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_seq(&self) -> Option<&Sequence> {
        match self {
            Self::Seq(items) => Some(items),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_leaf(&self) -> Option<&Leaf> {
        match self {
            Self::Leaf(leaf) => Some(leaf),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Leaf(Leaf::Str(s)) => Some(s),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Leaf(Leaf::Int(i)) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view; integers widen to floats
    #[inline]
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Leaf(Leaf::Float(x)) => Some(*x),
            Self::Leaf(Leaf::Int(i)) => Some(*i as f64),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Leaf(Leaf::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Leaf(Leaf::Null))
    }

    /// Convert to a JSON value
    ///
    /// # Errors
    /// Returns error for opaque leaves and non-finite floats
    pub fn to_json(&self) -> Result<serde_json::Value, ValueError> {
        Ok(match self {
            Self::Leaf(Leaf::Null) => serde_json::Value::Null,
            Self::Leaf(Leaf::Bool(b)) => serde_json::Value::Bool(*b),
            Self::Leaf(Leaf::Int(i)) => serde_json::Value::from(*i),
            Self::Leaf(Leaf::Float(x)) => serde_json::Number::from_f64(*x)
                .map(serde_json::Value::Number)
                .ok_or(ValueError::NonFiniteFloat(*x))?,
            Self::Leaf(Leaf::Str(s)) => serde_json::Value::String(s.clone()),
            Self::Leaf(Leaf::Opaque(o)) => {
                return Err(ValueError::OpaqueLeaf {
                    type_name: o.type_name(),
                })
            }
            Self::Map(m) => serde_json::Value::Object(
                m.iter()
                    .map(|(k, v)| Ok((k.clone(), v.to_json()?)))
                    .collect::<Result<_, ValueError>>()?,
            ),
            Self::Seq(items) => serde_json::Value::Array(
                items.iter().map(Value::to_json).collect::<Result<_, _>>()?,
            ),
        })
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::null()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Leaf(a), Self::Leaf(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => Arc::ptr_eq(a, b) || **a == **b,
            (Self::Seq(a), Self::Seq(b)) => Arc::ptr_eq(a, b) || **a == **b,
            _ => false,
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Leaf(Leaf::Null) => f.write_str("null"),
            Self::Leaf(Leaf::Bool(b)) => write!(f, "{b}"),
            Self::Leaf(Leaf::Int(i)) => write!(f, "{i}"),
            Self::Leaf(Leaf::Float(x)) => write!(f, "{x:?}"),
            Self::Leaf(Leaf::Str(s)) => write!(f, "{s:?}"),
            Self::Leaf(Leaf::Opaque(o)) => write!(f, "{o:?}"),
            Self::Map(m) => f.debug_map().entries(m.iter()).finish(),
            Self::Seq(items) => f.debug_list().entries(items.iter()).finish(),
        }
    }
}

impl From<Leaf> for Value {
    fn from(leaf: Leaf) -> Self {
        Self::Leaf(leaf)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Leaf(Leaf::Bool(b))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Leaf(Leaf::Int(i))
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Leaf(Leaf::Int(i64::from(i)))
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Self::Leaf(Leaf::Int(i64::from(i)))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Leaf(Leaf::Float(x))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Leaf(Leaf::Str(s.to_string()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Leaf(Leaf::Str(s))
    }
}

impl From<Opaque> for Value {
    fn from(o: Opaque) -> Self {
        Self::Leaf(Leaf::Opaque(o))
    }
}

impl From<Mapping> for Value {
    fn from(m: Mapping) -> Self {
        Self::Map(Arc::new(m))
    }
}

impl From<Sequence> for Value {
    fn from(items: Sequence) -> Self {
        Self::Seq(Arc::new(items))
    }
}

/// Numbers that fit `i64` become [`Leaf::Int`]; any other number, including
/// a `u64` above `i64::MAX`, becomes the nearest [`Leaf::Float`] and may lose
/// precision.
#[allow(clippy::cast_precision_loss)]
impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::null(),
            serde_json::Value::Bool(b) => Self::from(b),
            serde_json::Value::Number(n) => match (n.as_i64(), n.as_u64()) {
                (Some(i), _) => Self::from(i),
                (None, Some(u)) => Self::from(u as f64),
                _ => Self::from(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Self::from(s),
            serde_json::Value::Array(items) => Self::seq(items.into_iter().map(Self::from)),
            serde_json::Value::Object(obj) => {
                Self::map(obj.into_iter().map(|(k, v)| (k, Self::from(v))))
            }
        }
    }
}

impl serde::Serialize for Leaf {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::Float(x) => serializer.serialize_f64(*x),
            Self::Str(s) => serializer.serialize_str(s),
            Self::Opaque(o) => Err(S::Error::custom(format!(
                "opaque leaf of type {} cannot be serialized",
                o.type_name()
            ))),
        }
    }
}

impl serde::Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Self::Leaf(leaf) => leaf.serialize(serializer),
            Self::Map(m) => {
                let mut map = serializer.serialize_map(Some(m.len()))?;
                for (k, v) in m.iter() {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            Self::Seq(items) => serializer.collect_seq(items.iter()),
        }
    }
}

impl<'de> serde::Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        <serde_json::Value as serde::Deserialize>::deserialize(deserializer).map(Self::from)
    }
}

/// Errors converting values to external forms
#[derive(Debug, thiserror::Error)]
pub enum ValueError {
    /// Opaque leaves have no data representation
    #[error("opaque leaf of type {type_name} has no JSON form")]
    OpaqueLeaf { type_name: &'static str },

    /// NaN and infinities have no JSON form
    #[error("float {0} has no JSON form")]
    NonFiniteFloat(f64),
}
