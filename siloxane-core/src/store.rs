use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{PoisonError, RwLock};

use crate::array::Array;
use crate::attribute::AttrValue;
use crate::path::NodePath;
use crate::value::Complex;

/// Whether a node holds a payload or named children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Dataset,
    Group,
}

/// A single scalar stored in a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Complex(Complex),
    Str(String),
}

impl Scalar {
    pub fn type_name(&self) -> &'static str {
        match self {
            Scalar::Bool(_) => "bool",
            Scalar::Int(_) => "int",
            Scalar::Float(_) => "float",
            Scalar::Complex(_) => "complex",
            Scalar::Str(_) => "str",
        }
    }
}

/// Contents of a dataset node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    Scalar(Scalar),
    Array(Array),
    Blob(Vec<u8>),
}

impl Payload {
    /// Returns the string if this payload is a scalar string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Payload::Scalar(Scalar::Str(s)) => Some(s),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Payload::Scalar(s) => s.type_name(),
            Payload::Array(_) => "array",
            Payload::Blob(_) => "blob",
        }
    }
}

/// A hierarchical container of dataset and group nodes.
///
/// The encoder and decoder only talk to storage through this trait.
/// Child keys passed in are single path segments, never full paths.
///
/// All methods take `&self` to support stores with internal locking (e.g., RocksDB).
pub trait Store {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Creates a dataset child holding `payload`. Fails if the key exists.
    fn create_dataset(
        &self,
        parent: &NodePath,
        key: &str,
        payload: Payload,
    ) -> Result<NodePath, Self::Error>;

    /// Creates an empty group child. Fails if the key exists.
    fn create_group(&self, parent: &NodePath, key: &str) -> Result<NodePath, Self::Error>;

    fn has_child(&self, parent: &NodePath, key: &str) -> Result<bool, Self::Error>;

    /// Deletes a child and everything below it.
    fn delete_child(&self, parent: &NodePath, key: &str) -> Result<(), Self::Error>;

    /// Lists the keys of a group's children in creation order.
    fn list_child_keys(&self, group: &NodePath) -> Result<Vec<String>, Self::Error>;

    fn node_kind(&self, node: &NodePath) -> Result<NodeKind, Self::Error>;

    fn get_attribute(&self, node: &NodePath, name: &str) -> Result<Option<AttrValue>, Self::Error>;

    fn set_attribute(&self, node: &NodePath, name: &str, value: AttrValue) -> Result<(), Self::Error>;

    fn read_payload(&self, node: &NodePath) -> Result<Payload, Self::Error>;
}

impl<S: Store> Store for &S {
    type Error = S::Error;

    fn create_dataset(
        &self,
        parent: &NodePath,
        key: &str,
        payload: Payload,
    ) -> Result<NodePath, Self::Error> {
        (*self).create_dataset(parent, key, payload)
    }

    fn create_group(&self, parent: &NodePath, key: &str) -> Result<NodePath, Self::Error> {
        (*self).create_group(parent, key)
    }

    fn has_child(&self, parent: &NodePath, key: &str) -> Result<bool, Self::Error> {
        (*self).has_child(parent, key)
    }

    fn delete_child(&self, parent: &NodePath, key: &str) -> Result<(), Self::Error> {
        (*self).delete_child(parent, key)
    }

    fn list_child_keys(&self, group: &NodePath) -> Result<Vec<String>, Self::Error> {
        (*self).list_child_keys(group)
    }

    fn node_kind(&self, node: &NodePath) -> Result<NodeKind, Self::Error> {
        (*self).node_kind(node)
    }

    fn get_attribute(&self, node: &NodePath, name: &str) -> Result<Option<AttrValue>, Self::Error> {
        (*self).get_attribute(node, name)
    }

    fn set_attribute(&self, node: &NodePath, name: &str, value: AttrValue) -> Result<(), Self::Error> {
        (*self).set_attribute(node, name, value)
    }

    fn read_payload(&self, node: &NodePath) -> Result<Payload, Self::Error> {
        (*self).read_payload(node)
    }
}

/// A path-keyed store for encoded node records.
///
/// Record stores operate on raw bytes; the record format is owned by
/// [`Hierarchy`](crate::Hierarchy).
pub trait RecordStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Retrieves the record at a path, or None if not present.
    fn get(&self, path: &NodePath) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Stores a record at the given path, replacing any previous one.
    fn put(&self, path: &NodePath, record: &[u8]) -> Result<(), Self::Error>;

    fn has(&self, path: &NodePath) -> Result<bool, Self::Error>;

    /// Removes the record at a path. Removing a missing record is not an error.
    fn delete(&self, path: &NodePath) -> Result<(), Self::Error>;
}

impl<R: RecordStore> RecordStore for &R {
    type Error = R::Error;

    fn get(&self, path: &NodePath) -> Result<Option<Vec<u8>>, Self::Error> {
        (*self).get(path)
    }

    fn put(&self, path: &NodePath, record: &[u8]) -> Result<(), Self::Error> {
        (*self).put(path, record)
    }

    fn has(&self, path: &NodePath) -> Result<bool, Self::Error> {
        (*self).has(path)
    }

    fn delete(&self, path: &NodePath) -> Result<(), Self::Error> {
        (*self).delete(path)
    }
}

/// An in-memory record store backed by a HashMap.
///
/// Useful for testing and as a reference implementation.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<HashMap<NodePath, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.data.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordStore for MemoryStore {
    type Error = Infallible;

    fn get(&self, path: &NodePath) -> Result<Option<Vec<u8>>, Self::Error> {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        Ok(data.get(path).cloned())
    }

    fn put(&self, path: &NodePath, record: &[u8]) -> Result<(), Self::Error> {
        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        data.insert(path.clone(), record.to_vec());
        Ok(())
    }

    fn has(&self, path: &NodePath) -> Result<bool, Self::Error> {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        Ok(data.contains_key(path))
    }

    fn delete(&self, path: &NodePath) -> Result<(), Self::Error> {
        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        data.remove(path);
        Ok(())
    }
}
