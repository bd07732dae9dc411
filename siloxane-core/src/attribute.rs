use serde::{Deserialize, Serialize};
use std::fmt;

/// Type tag of the stored value.
pub const DTYPE: &str = "DTYPE";
/// Type tag of the key the node was stored under.
pub const NTYPE: &str = "NTYPE";
/// Write timestamp, RFC 3339 in UTC.
pub const DATE: &str = "DATE";
/// Whether the payload is a pickled blob.
pub const PICKLED: &str = "PICKLED";
/// Defining module of a user-defined type.
pub const MODULE: &str = "MODULE";
/// Name of a user-defined type.
pub const CLASS: &str = "CLASS";

/// Original layout of a sparse matrix.
pub(crate) const FORMAT: &str = "FORMAT";
/// Element type of an empty array.
pub(crate) const ETYPE: &str = "ETYPE";
/// Dimensions of an empty array.
pub(crate) const SHAPE: &str = "SHAPE";

/// Value of a node attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    Bool(bool),
    I64(i64),
    U64(u64),
    F64(f64),
    String(String),
    I64Array(Vec<i64>),
    StringArray(Vec<String>),
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Reads a flag. Integers count as true when non-zero.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(b) => Some(*b),
            AttrValue::I64(i) => Some(*i != 0),
            AttrValue::U64(u) => Some(*u != 0),
            _ => None,
        }
    }

    pub fn as_i64_array(&self) -> Option<&[i64]> {
        match self {
            AttrValue::I64Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            AttrValue::Bool(_) => "bool",
            AttrValue::I64(_) => "i64",
            AttrValue::U64(_) => "u64",
            AttrValue::F64(_) => "f64",
            AttrValue::String(_) => "string",
            AttrValue::I64Array(_) => "i64 array",
            AttrValue::StringArray(_) => "string array",
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Bool(b) => write!(f, "{b}"),
            AttrValue::I64(i) => write!(f, "{i}"),
            AttrValue::U64(u) => write!(f, "{u}"),
            AttrValue::F64(x) => write!(f, "{x:?}"),
            AttrValue::String(s) => f.write_str(s),
            AttrValue::I64Array(v) => write!(f, "{v:?}"),
            AttrValue::StringArray(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        AttrValue::Bool(b)
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::String(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::String(s)
    }
}

impl From<Vec<i64>> for AttrValue {
    fn from(v: Vec<i64>) -> Self {
        AttrValue::I64Array(v)
    }
}
