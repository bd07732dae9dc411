use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

use crate::array::Array;
use crate::key::Key;
use crate::sparse::SparseMatrix;

/// A complex number with f64 parts.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Complex {
    pub re: f64,
    pub im: f64,
}

impl Complex {
    pub fn new(re: f64, im: f64) -> Self {
        Complex { re, im }
    }
}

impl fmt::Display for Complex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:?}{:+?}j)", self.re, self.im)
    }
}

/// Flavor of an ordered sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SequenceKind {
    List,
    Tuple,
}

/// Flavor of an unordered set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SetKind {
    Set,
    FrozenSet,
}

/// Structural view of a user-defined type: its identity and named fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Object {
    pub module: String,
    pub class: String,
    pub fields: IndexMap<String, Value>,
}

impl Object {
    pub fn new(module: impl Into<String>, class: impl Into<String>) -> Self {
        Object {
            module: module.into(),
            class: class.into(),
            fields: IndexMap::new(),
        }
    }

    /// Adds a field, builder style.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }
}

/// A payload with no structured encoding, stored as a pickled blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opaque {
    pub module: Option<String>,
    pub class: Option<String>,
    pub data: Vec<u8>,
}

impl Opaque {
    /// Creates an opaque payload without a type identity.
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        Opaque {
            module: None,
            class: None,
            data: data.into(),
        }
    }

    /// Creates an opaque payload tagged with the type it came from.
    pub fn with_identity(
        module: impl Into<String>,
        class: impl Into<String>,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        Opaque {
            module: Some(module.into()),
            class: Some(class.into()),
            data: data.into(),
        }
    }
}

/// Any value the codec can store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Complex(Complex),
    String(String),
    /// Ordered elements.
    Sequence(SequenceKind, Vec<Value>),
    /// Unordered, duplicate-free elements. Build with [`Value::set`] or
    /// [`Value::frozenset`] to get deduplication.
    Set(SetKind, Vec<Value>),
    /// Mapping with arbitrary hashable keys.
    Mapping(#[serde(with = "crate::serde_helpers::map_as_pairs")] IndexMap<Key, Value>),
    /// Plain structural group with string keys.
    Record(IndexMap<String, Value>),
    NumericArray(Array),
    SparseMatrix(SparseMatrix),
    Object(Object),
    Opaque(Opaque),
}

impl Value {
    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Sequence(SequenceKind::List, items.into_iter().collect())
    }

    pub fn tuple(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Sequence(SequenceKind::Tuple, items.into_iter().collect())
    }

    pub fn set(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Set(SetKind::Set, dedup(items))
    }

    pub fn frozenset(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Set(SetKind::FrozenSet, dedup(items))
    }

    pub fn mapping<K: Into<Key>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Mapping(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn record<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Record(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Returns the DTYPE tag recorded for this value.
    pub fn type_name(&self) -> Cow<'_, str> {
        match self {
            Value::Null => "NoneType".into(),
            Value::Boolean(_) => "bool".into(),
            Value::Integer(_) => "int".into(),
            Value::Float(_) => "float".into(),
            Value::Complex(_) => "complex".into(),
            Value::String(_) => "str".into(),
            Value::Sequence(SequenceKind::List, _) => "list".into(),
            Value::Sequence(SequenceKind::Tuple, _) => "tuple".into(),
            Value::Set(SetKind::Set, _) => "set".into(),
            Value::Set(SetKind::FrozenSet, _) => "frozenset".into(),
            Value::Mapping(_) => "dict".into(),
            Value::Record(_) => "Bundle".into(),
            Value::NumericArray(_) => "ndarray".into(),
            Value::SparseMatrix(m) => m.format().type_name().into(),
            Value::Object(o) => Cow::Borrowed(o.class.as_str()),
            Value::Opaque(o) => match &o.class {
                Some(class) => Cow::Borrowed(class.as_str()),
                None => "opaque".into(),
            },
        }
    }

    /// Returns true for scalars that can be packed into a flat array:
    /// booleans, integers, floats, complex numbers and strings.
    pub fn is_flat_scalar(&self) -> bool {
        matches!(
            self,
            Value::Boolean(_) | Value::Integer(_) | Value::Float(_) | Value::Complex(_) | Value::String(_)
        )
    }

    /// Returns true for instances of user-defined types.
    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Opaque(_))
    }

    /// Returns the (module, class) identity of user-defined values.
    pub fn identity(&self) -> Option<(&str, &str)> {
        match self {
            Value::Object(o) => Some((&o.module, &o.class)),
            Value::Opaque(Opaque {
                module: Some(module),
                class: Some(class),
                ..
            }) => Some((module, class)),
            _ => None,
        }
    }

    /// Returns the elements of a sequence or set.
    pub fn elements(&self) -> Option<&[Value]> {
        match self {
            Value::Sequence(_, items) | Value::Set(_, items) => Some(items),
            _ => None,
        }
    }
}

pub(crate) fn dedup(items: impl IntoIterator<Item = Value>) -> Vec<Value> {
    let mut out: Vec<Value> = Vec::new();
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

/// Set comparison: repeated members count once and order is ignored.
fn same_members(a: &[Value], b: &[Value]) -> bool {
    a.iter().all(|x| b.contains(x)) && b.iter().all(|x| a.contains(x))
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Complex(a), Value::Complex(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Sequence(ka, a), Value::Sequence(kb, b)) => ka == kb && a == b,
            (Value::Set(ka, a), Value::Set(kb, b)) => ka == kb && same_members(a, b),
            // IndexMap equality ignores insertion order.
            (Value::Mapping(a), Value::Mapping(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => a == b,
            (Value::NumericArray(a), Value::NumericArray(b)) => a == b,
            (Value::SparseMatrix(a), Value::SparseMatrix(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Opaque(a), Value::Opaque(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i.into())
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<Complex> for Value {
    fn from(c: Complex) -> Self {
        Value::Complex(c)
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

impl From<Array> for Value {
    fn from(a: Array) -> Self {
        Value::NumericArray(a)
    }
}

impl From<SparseMatrix> for Value {
    fn from(m: SparseMatrix) -> Self {
        Value::SparseMatrix(m)
    }
}

impl From<Object> for Value {
    fn from(o: Object) -> Self {
        Value::Object(o)
    }
}

impl From<Opaque> for Value {
    fn from(o: Opaque) -> Self {
        Value::Opaque(o)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_constructor_deduplicates() {
        let s = Value::set([Value::from(1), Value::from(2), Value::from(1)]);
        assert_eq!(s.elements().map(<[Value]>::len), Some(2));
    }

    #[test]
    fn set_equality_ignores_order() {
        let a = Value::set([Value::from("x"), Value::from("y")]);
        let b = Value::set([Value::from("y"), Value::from("x")]);
        assert_eq!(a, b);
        assert_ne!(a, Value::frozenset([Value::from("x"), Value::from("y")]));
    }

    #[test]
    fn set_equality_ignores_repeats() {
        let built = Value::Set(SetKind::Set, vec![Value::from(1), Value::from(1)]);
        assert_eq!(built, Value::set([Value::from(1)]));
        assert_ne!(built, Value::set([Value::from(1), Value::from(2)]));
    }

    #[test]
    fn sequence_equality_respects_order_and_flavor() {
        let a = Value::list([Value::from(1), Value::from(2)]);
        assert_ne!(a, Value::list([Value::from(2), Value::from(1)]));
        assert_ne!(a, Value::tuple([Value::from(1), Value::from(2)]));
    }

    #[test]
    fn mapping_equality_ignores_order() {
        let a = Value::mapping([(Key::Int(1), Value::Null), (Key::from("b"), Value::from(true))]);
        let b = Value::mapping([(Key::from("b"), Value::from(true)), (Key::Int(1), Value::Null)]);
        assert_eq!(a, b);
    }

    #[test]
    fn integers_and_floats_differ() {
        assert_ne!(Value::from(1), Value::from(1.0));
    }

    #[test]
    fn type_names() {
        assert_eq!(Value::Null.type_name(), "NoneType");
        assert_eq!(Value::tuple([]).type_name(), "tuple");
        assert_eq!(Value::frozenset([]).type_name(), "frozenset");
        assert_eq!(Value::Object(Object::new("app::model", "Point")).type_name(), "Point");
        assert_eq!(Value::Opaque(Opaque::from_bytes(vec![1])).type_name(), "opaque");
    }

    #[test]
    fn identity_only_for_user_types() {
        let obj = Value::Object(Object::new("app::model", "Point"));
        assert_eq!(obj.identity(), Some(("app::model", "Point")));
        assert_eq!(Value::Opaque(Opaque::from_bytes(vec![])).identity(), None);
        assert_eq!(Value::from(3).identity(), None);
    }

    #[test]
    fn complex_display() {
        assert_eq!(Complex::new(1.0, -2.5).to_string(), "(1.0-2.5j)");
    }
}
