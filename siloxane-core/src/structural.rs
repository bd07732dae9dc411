//! Conversions between Rust types and [`Value`].
//!
//! [`ToValue`] and [`FromValue`] cover the primitive and container types.
//! User-defined structs implement [`Structural`], usually through
//! `#[derive(Structural)]`, which also derives the two conversion traits so
//! the struct is stored as an [`Object`] group with one child per field.

use indexmap::IndexMap;

use crate::array::Array;
use crate::key::Key;
use crate::sparse::SparseMatrix;
use crate::value::{Complex, Object, SequenceKind, Value};

/// Named fields of a structural value.
pub type Fields = IndexMap<String, Value>;

/// Error converting a [`Value`] into a Rust type.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValueError {
    #[error("missing field {0:?}")]
    MissingField(String),
    #[error("expected {expected}, found {found}")]
    UnexpectedType { expected: &'static str, found: String },
    #[error("expected an instance of {expected}, found {found}")]
    ClassMismatch { expected: String, found: String },
}

impl ValueError {
    pub fn unexpected(expected: &'static str, found: &Value) -> Self {
        ValueError::UnexpectedType {
            expected,
            found: found.type_name().into_owned(),
        }
    }
}

pub trait ToValue {
    fn to_value(&self) -> Value;
}

pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, ValueError>;

    /// Called when a struct field is absent from the stored object.
    fn from_missing(field: &str) -> Result<Self, ValueError> {
        Err(ValueError::MissingField(field.to_string()))
    }
}

/// A user-defined type seen through its named fields.
pub trait Structural: Sized {
    /// Module path recorded in the MODULE attribute.
    const MODULE: &'static str;
    /// Type name recorded in the CLASS and DTYPE attributes.
    const CLASS: &'static str;

    fn to_fields(&self) -> Fields;

    fn from_fields(fields: Fields) -> Result<Self, ValueError>;

    fn to_object(&self) -> Object {
        Object {
            module: Self::MODULE.to_string(),
            class: Self::CLASS.to_string(),
            fields: self.to_fields(),
        }
    }

    fn from_object(object: Object) -> Result<Self, ValueError> {
        if object.class != Self::CLASS {
            return Err(ValueError::ClassMismatch {
                expected: Self::CLASS.to_string(),
                found: object.class,
            });
        }
        Self::from_fields(object.fields)
    }
}

/// Removes a field and converts it. Used by derived `from_fields`.
pub fn take_field<T: FromValue>(fields: &mut Fields, name: &str) -> Result<T, ValueError> {
    match fields.shift_remove(name) {
        Some(value) => T::from_value(value),
        None => T::from_missing(name),
    }
}

impl ToValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        Ok(value)
    }
}

impl ToValue for bool {
    fn to_value(&self) -> Value {
        Value::Boolean(*self)
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Boolean(b) => Ok(b),
            other => Err(ValueError::unexpected("bool", &other)),
        }
    }
}

macro_rules! integer_value {
    ($($t:ty),*) => {$(
        impl ToValue for $t {
            fn to_value(&self) -> Value {
                Value::Integer(i64::from(*self))
            }
        }

        impl FromValue for $t {
            fn from_value(value: Value) -> Result<Self, ValueError> {
                match value {
                    Value::Integer(i) => <$t>::try_from(i).map_err(|_| ValueError::UnexpectedType {
                        expected: stringify!($t),
                        found: format!("out-of-range int {i}"),
                    }),
                    other => Err(ValueError::unexpected(stringify!($t), &other)),
                }
            }
        }
    )*};
}

integer_value!(i8, i16, i32, i64, u8, u16, u32);

impl ToValue for f64 {
    fn to_value(&self) -> Value {
        Value::Float(*self)
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Float(x) => Ok(x),
            Value::Integer(i) => Ok(i as f64),
            other => Err(ValueError::unexpected("f64", &other)),
        }
    }
}

impl ToValue for f32 {
    fn to_value(&self) -> Value {
        Value::Float(f64::from(*self))
    }
}

impl FromValue for f32 {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        f64::from_value(value).map(|x| x as f32)
    }
}

impl ToValue for String {
    fn to_value(&self) -> Value {
        Value::String(self.clone())
    }
}

impl ToValue for str {
    fn to_value(&self) -> Value {
        Value::String(self.to_string())
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::String(s) => Ok(s),
            other => Err(ValueError::unexpected("str", &other)),
        }
    }
}

impl ToValue for Complex {
    fn to_value(&self) -> Value {
        Value::Complex(*self)
    }
}

impl FromValue for Complex {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Complex(c) => Ok(c),
            Value::Float(x) => Ok(Complex::new(x, 0.0)),
            Value::Integer(i) => Ok(Complex::new(i as f64, 0.0)),
            other => Err(ValueError::unexpected("complex", &other)),
        }
    }
}

impl ToValue for Array {
    fn to_value(&self) -> Value {
        Value::NumericArray(self.clone())
    }
}

impl FromValue for Array {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::NumericArray(a) => Ok(a),
            other => Err(ValueError::unexpected("ndarray", &other)),
        }
    }
}

impl ToValue for SparseMatrix {
    fn to_value(&self) -> Value {
        Value::SparseMatrix(self.clone())
    }
}

impl FromValue for SparseMatrix {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::SparseMatrix(m) => Ok(m),
            other => Err(ValueError::unexpected("sparse matrix", &other)),
        }
    }
}

impl<T: ToValue> ToValue for Vec<T> {
    fn to_value(&self) -> Value {
        Value::Sequence(SequenceKind::List, self.iter().map(ToValue::to_value).collect())
    }
}

/// Accepts any sequence or set.
impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Sequence(_, items) | Value::Set(_, items) => {
                items.into_iter().map(T::from_value).collect()
            }
            other => Err(ValueError::unexpected("list", &other)),
        }
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }

    fn from_missing(_field: &str) -> Result<Self, ValueError> {
        Ok(None)
    }
}

impl<T: ToValue> ToValue for IndexMap<String, T> {
    fn to_value(&self) -> Value {
        Value::Mapping(
            self.iter()
                .map(|(k, v)| (Key::Str(k.clone()), v.to_value()))
                .collect(),
        )
    }
}

/// Accepts a mapping with string keys or a record.
impl<T: FromValue> FromValue for IndexMap<String, T> {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Record(fields) => fields
                .into_iter()
                .map(|(k, v)| T::from_value(v).map(|v| (k, v)))
                .collect(),
            Value::Mapping(entries) => entries
                .into_iter()
                .map(|(k, v)| match k {
                    Key::Str(k) => T::from_value(v).map(|v| (k, v)),
                    other => Err(ValueError::UnexpectedType {
                        expected: "str key",
                        found: other.type_name().to_string(),
                    }),
                })
                .collect(),
            other => Err(ValueError::unexpected("dict", &other)),
        }
    }
}

impl<A: ToValue, B: ToValue> ToValue for (A, B) {
    fn to_value(&self) -> Value {
        Value::tuple([self.0.to_value(), self.1.to_value()])
    }
}

impl<A: FromValue, B: FromValue> FromValue for (A, B) {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Sequence(_, items) if items.len() == 2 => {
                let mut items = items.into_iter();
                match (items.next(), items.next()) {
                    (Some(a), Some(b)) => Ok((A::from_value(a)?, B::from_value(b)?)),
                    _ => Err(ValueError::MissingField("tuple element".into())),
                }
            }
            other => Err(ValueError::unexpected("2-tuple", &other)),
        }
    }
}

impl<A: ToValue, B: ToValue, C: ToValue> ToValue for (A, B, C) {
    fn to_value(&self) -> Value {
        Value::tuple([self.0.to_value(), self.1.to_value(), self.2.to_value()])
    }
}

impl<A: FromValue, B: FromValue, C: FromValue> FromValue for (A, B, C) {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Sequence(_, items) if items.len() == 3 => {
                let mut items = items.into_iter();
                match (items.next(), items.next(), items.next()) {
                    (Some(a), Some(b), Some(c)) => {
                        Ok((A::from_value(a)?, B::from_value(b)?, C::from_value(c)?))
                    }
                    _ => Err(ValueError::MissingField("tuple element".into())),
                }
            }
            other => Err(ValueError::unexpected("3-tuple", &other)),
        }
    }
}
