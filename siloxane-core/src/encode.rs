//! Writes values into a [`Store`].
//!
//! Each value becomes exactly one node under its parent: a dataset for
//! scalars, flat homogeneous collections, arrays and blobs, a group for
//! everything with children. Every node is tagged with DTYPE, NTYPE, DATE
//! and PICKLED so the decoder can invert the choice.

use chrono::{SecondsFormat, Utc};
use std::mem;

use crate::array::{Array, ArrayData};
use crate::attribute::{self, AttrValue};
use crate::dtype::{EMPTY_SENTINEL, NONE_SENTINEL};
use crate::error::CodecError;
use crate::key::Key;
use crate::options::CodecOptions;
use crate::path::NodePath;
use crate::pickle::{CborPickler, Pickler};
use crate::sparse::SparseMatrix;
use crate::store::{Payload, Scalar, Store};
use crate::value::{dedup, Object, Value};

/// Name of the `index`-th positional child of a sequence or set group.
pub(crate) fn positional_key(index: usize) -> String {
    format!("key{index}")
}

/// Encodes values into a store.
pub struct Encoder<'a, S> {
    store: &'a S,
    options: CodecOptions,
    pickler: &'a dyn Pickler,
}

impl<'a, S: Store> Encoder<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Encoder {
            store,
            options: CodecOptions::default(),
            pickler: &CborPickler,
        }
    }

    pub fn with_options(mut self, options: CodecOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_pickler(mut self, pickler: &'a dyn Pickler) -> Self {
        self.pickler = pickler;
        self
    }

    /// Writes `value` as the child `name` of `parent`, replacing any
    /// existing child of that name. Returns the path of the new node.
    pub fn encode(
        &self,
        parent: &NodePath,
        name: impl Into<Key>,
        value: &Value,
    ) -> Result<NodePath, CodecError<S::Error>> {
        let key = name.into();
        log::debug!("encoding {} as {key} under {parent}", value.type_name());
        self.write(parent, &key, value)
    }

    fn write(
        &self,
        parent: &NodePath,
        key: &Key,
        value: &Value,
    ) -> Result<NodePath, CodecError<S::Error>> {
        let name = key.to_physical();
        if !Key::is_valid_physical(&name) {
            return Err(CodecError::InvalidName(name));
        }
        if self.store.has_child(parent, &name).map_err(CodecError::Store)? {
            log::trace!("replacing {}", parent.child(&name));
            self.store
                .delete_child(parent, &name)
                .map_err(CodecError::Store)?;
        }

        let mut pickled = false;
        let path = match value {
            Value::Null => self.dataset(parent, &name, Scalar::Str(NONE_SENTINEL.into()))?,
            Value::Boolean(b) => self.dataset(parent, &name, Scalar::Bool(*b))?,
            Value::Integer(i) => self.dataset(parent, &name, Scalar::Int(*i))?,
            Value::Float(x) => self.dataset(parent, &name, Scalar::Float(*x))?,
            Value::Complex(c) => self.dataset(parent, &name, Scalar::Complex(*c))?,
            Value::String(s) => self.dataset(parent, &name, Scalar::Str(s.clone()))?,
            Value::Sequence(_, items) => self.write_elements(parent, &name, items)?,
            Value::Set(_, items) => {
                self.write_elements(parent, &name, &dedup(items.iter().cloned()))?
            }
            Value::Mapping(entries) => {
                if distinct_physical_names(entries.keys()) {
                    let group = self.group(parent, &name)?;
                    for (k, v) in entries {
                        self.write(&group, k, v)?;
                    }
                    group
                } else {
                    log::warn!("mapping {} has keys without distinct names, pickling", parent.child(&name));
                    pickled = true;
                    self.pickle(parent, &name, value)?
                }
            }
            Value::Record(fields) => {
                if fields.keys().all(|f| Key::is_valid_physical(f)) {
                    self.write_fields(parent, &name, fields.iter())?
                } else {
                    log::warn!("record {} has invalid field names, pickling", parent.child(&name));
                    pickled = true;
                    self.pickle(parent, &name, value)?
                }
            }
            Value::NumericArray(array) => self.write_array(parent, &name, array)?,
            Value::SparseMatrix(matrix) => self.write_sparse(parent, &name, matrix)?,
            Value::Object(object) => {
                if self.pickles_object(object) {
                    pickled = true;
                    self.pickle(parent, &name, value)?
                } else {
                    self.write_fields(parent, &name, object.fields.iter())?
                }
            }
            Value::Opaque(_) => {
                pickled = true;
                self.pickle(parent, &name, value)?
            }
        };

        self.tag(&path, key, value, pickled)?;
        log::trace!("wrote {} at {path}", value.type_name());
        Ok(path)
    }

    fn tag(
        &self,
        path: &NodePath,
        key: &Key,
        value: &Value,
        pickled: bool,
    ) -> Result<(), CodecError<S::Error>> {
        let date = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        self.set(path, attribute::DTYPE, value.type_name().into_owned())?;
        self.set(path, attribute::NTYPE, key.type_name())?;
        self.set(path, attribute::DATE, date)?;
        self.set(path, attribute::PICKLED, pickled)?;
        if let Some((module, class)) = value.identity() {
            self.set(path, attribute::MODULE, module)?;
            self.set(path, attribute::CLASS, class)?;
        }
        Ok(())
    }

    fn set(
        &self,
        path: &NodePath,
        name: &str,
        value: impl Into<AttrValue>,
    ) -> Result<(), CodecError<S::Error>> {
        self.store
            .set_attribute(path, name, value.into())
            .map_err(CodecError::Store)
    }

    fn dataset(
        &self,
        parent: &NodePath,
        name: &str,
        scalar: Scalar,
    ) -> Result<NodePath, CodecError<S::Error>> {
        self.store
            .create_dataset(parent, name, Payload::Scalar(scalar))
            .map_err(CodecError::Store)
    }

    fn group(&self, parent: &NodePath, name: &str) -> Result<NodePath, CodecError<S::Error>> {
        self.store
            .create_group(parent, name)
            .map_err(CodecError::Store)
    }

    fn write_elements(
        &self,
        parent: &NodePath,
        name: &str,
        items: &[Value],
    ) -> Result<NodePath, CodecError<S::Error>> {
        if items.is_empty() {
            return self.dataset(parent, name, Scalar::Str(EMPTY_SENTINEL.into()));
        }
        if let Some(data) = flat_array(items) {
            return self
                .store
                .create_dataset(parent, name, Payload::Array(Array::from_vec(data)))
                .map_err(CodecError::Store);
        }
        let group = self.group(parent, name)?;
        for (index, item) in items.iter().enumerate() {
            self.write(&group, &Key::Str(positional_key(index)), item)?;
        }
        Ok(group)
    }

    fn write_fields<'v>(
        &self,
        parent: &NodePath,
        name: &str,
        fields: impl Iterator<Item = (&'v String, &'v Value)>,
    ) -> Result<NodePath, CodecError<S::Error>> {
        let group = self.group(parent, name)?;
        for (field, value) in fields {
            self.write(&group, &Key::Str(field.clone()), value)?;
        }
        Ok(group)
    }

    fn write_array(
        &self,
        parent: &NodePath,
        name: &str,
        array: &Array,
    ) -> Result<NodePath, CodecError<S::Error>> {
        if !array.is_empty() {
            return self
                .store
                .create_dataset(parent, name, Payload::Array(array.clone()))
                .map_err(CodecError::Store);
        }
        let path = self.dataset(parent, name, Scalar::Str(EMPTY_SENTINEL.into()))?;
        let shape = array.shape().iter().map(|&d| d as i64).collect::<Vec<_>>();
        self.set(&path, attribute::ETYPE, array.element_type().name())?;
        self.set(&path, attribute::SHAPE, shape)?;
        Ok(path)
    }

    /// Stores the CSR form as `data`, `indices`, `indptr` and `shape`
    /// children and records the original layout in FORMAT.
    fn write_sparse(
        &self,
        parent: &NodePath,
        name: &str,
        matrix: &SparseMatrix,
    ) -> Result<NodePath, CodecError<S::Error>> {
        matrix.validate().map_err(|e| {
            CodecError::UnsupportedValue(format!(
                "invalid {} at {}: {e}",
                matrix.format().type_name(),
                parent.child(name)
            ))
        })?;
        let csr = matrix.to_csr();
        let as_i64 = |v: &[usize]| v.iter().map(|&i| i as i64).collect::<Vec<_>>();
        let (rows, cols) = csr.shape;

        let group = self.group(parent, name)?;
        let parts = [
            ("data", Value::NumericArray(Array::from_vec(ArrayData::F64(csr.data.clone())))),
            ("indices", Value::NumericArray(Array::from_vec(ArrayData::I64(as_i64(&csr.indices))))),
            ("indptr", Value::NumericArray(Array::from_vec(ArrayData::I64(as_i64(&csr.indptr))))),
            ("shape", Value::tuple([Value::Integer(rows as i64), Value::Integer(cols as i64)])),
        ];
        for (part, value) in &parts {
            self.write(&group, &Key::from(*part), value)?;
        }
        self.set(&group, attribute::FORMAT, matrix.format().name())?;
        Ok(group)
    }

    fn pickles_object(&self, object: &Object) -> bool {
        if self.options.pickle_objects && self.options.pickle {
            return true;
        }
        if object.fields.keys().all(|f| Key::is_valid_physical(f)) {
            return false;
        }
        log::warn!("object {}::{} has invalid field names, pickling", object.module, object.class);
        true
    }

    fn pickle(
        &self,
        parent: &NodePath,
        name: &str,
        value: &Value,
    ) -> Result<NodePath, CodecError<S::Error>> {
        if !self.options.pickle {
            return Err(CodecError::UnsupportedValue(format!(
                "{} at {} needs pickling, which is disabled",
                value.type_name(),
                parent.child(name)
            )));
        }
        let blob = self.pickler.dumps(value)?;
        self.store
            .create_dataset(parent, name, Payload::Blob(blob))
            .map_err(CodecError::Store)
    }
}

/// Returns true if every key has a valid physical name and no two keys
/// share one.
fn distinct_physical_names<'k>(keys: impl Iterator<Item = &'k Key>) -> bool {
    let mut seen = std::collections::HashSet::new();
    for key in keys {
        let name = key.to_physical();
        if !Key::is_valid_physical(&name) || !seen.insert(name) {
            return false;
        }
    }
    true
}

/// Packs a non-empty run of flat scalars of one variant into a 1-D buffer.
fn flat_array(items: &[Value]) -> Option<ArrayData> {
    let first = items.first()?;
    if !first.is_flat_scalar()
        || !items
            .iter()
            .all(|v| mem::discriminant(v) == mem::discriminant(first))
    {
        return None;
    }
    Some(match first {
        Value::Boolean(_) => ArrayData::Bool(
            items
                .iter()
                .filter_map(|v| match v {
                    Value::Boolean(b) => Some(*b),
                    _ => None,
                })
                .collect(),
        ),
        Value::Integer(_) => ArrayData::I64(
            items
                .iter()
                .filter_map(|v| match v {
                    Value::Integer(i) => Some(*i),
                    _ => None,
                })
                .collect(),
        ),
        Value::Float(_) => ArrayData::F64(
            items
                .iter()
                .filter_map(|v| match v {
                    Value::Float(x) => Some(*x),
                    _ => None,
                })
                .collect(),
        ),
        Value::Complex(_) => ArrayData::Complex(
            items
                .iter()
                .filter_map(|v| match v {
                    Value::Complex(c) => Some(*c),
                    _ => None,
                })
                .collect(),
        ),
        Value::String(_) => ArrayData::Str(
            items
                .iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s.clone()),
                    _ => None,
                })
                .collect(),
        ),
        _ => return None,
    })
}

/// Encodes `value` with default options and the CBOR pickler.
pub fn encode<S: Store>(
    store: &S,
    parent: &NodePath,
    name: impl Into<Key>,
    value: &Value,
) -> Result<NodePath, CodecError<S::Error>> {
    Encoder::new(store).encode(parent, name, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::Hierarchy;
    use crate::store::{MemoryStore, NodeKind};

    fn store() -> Hierarchy<MemoryStore> {
        Hierarchy::open(MemoryStore::new()).unwrap()
    }

    fn attr(h: &Hierarchy<MemoryStore>, path: &NodePath, name: &str) -> Option<AttrValue> {
        h.get_attribute(path, name).unwrap()
    }

    #[test]
    fn every_node_is_tagged() {
        let h = store();
        let value = Value::mapping([
            ("a", Value::list([Value::from(1), Value::from("x")])),
            ("b", Value::Null),
        ]);
        let path = encode(&h, &NodePath::root(), "m", &value).unwrap();

        let mut pending = vec![path];
        while let Some(node) = pending.pop() {
            for name in [attribute::DTYPE, attribute::NTYPE, attribute::DATE, attribute::PICKLED] {
                assert!(attr(&h, &node, name).is_some(), "{node} lacks {name}");
            }
            if h.node_kind(&node).unwrap() == NodeKind::Group {
                for child in h.list_child_keys(&node).unwrap() {
                    pending.push(node.child(&child));
                }
            }
        }
    }

    #[test]
    fn homogeneous_list_is_one_dataset() {
        let h = store();
        let value = Value::list([Value::from(1), Value::from(2), Value::from(3)]);
        let path = encode(&h, &NodePath::root(), "xs", &value).unwrap();

        assert_eq!(h.node_kind(&path).unwrap(), NodeKind::Dataset);
        assert_eq!(
            h.read_payload(&path).unwrap(),
            Payload::Array(Array::from_vec(ArrayData::I64(vec![1, 2, 3])))
        );
    }

    #[test]
    fn mixed_list_uses_positional_children() {
        let h = store();
        let value = Value::list([Value::from(1), Value::from("a"), Value::from(2.0)]);
        let path = encode(&h, &NodePath::root(), "xs", &value).unwrap();

        assert_eq!(h.node_kind(&path).unwrap(), NodeKind::Group);
        assert_eq!(h.list_child_keys(&path).unwrap(), vec!["key0", "key1", "key2"]);
    }

    #[test]
    fn sentinels() {
        let h = store();
        let root = NodePath::root();
        let none = encode(&h, &root, "n", &Value::Null).unwrap();
        let empty = encode(&h, &root, "e", &Value::tuple([])).unwrap();

        assert_eq!(h.read_payload(&none).unwrap().as_str(), Some(NONE_SENTINEL));
        assert_eq!(h.read_payload(&empty).unwrap().as_str(), Some(EMPTY_SENTINEL));
        assert_eq!(attr(&h, &empty, attribute::DTYPE), Some(AttrValue::from("tuple")));
    }

    #[test]
    fn non_string_keys_record_ntype() {
        let h = store();
        let value = Value::mapping([(Key::Int(3), Value::from(true))]);
        let path = encode(&h, &NodePath::root(), "m", &value).unwrap();

        let child = path.child("3");
        assert_eq!(attr(&h, &child, attribute::NTYPE), Some(AttrValue::from("int")));
        assert_eq!(attr(&h, &path, attribute::NTYPE), Some(AttrValue::from("str")));
    }

    #[test]
    fn colliding_keys_pickle_the_mapping() {
        let h = store();
        let value = Value::mapping([(Key::Int(1), Value::Null), (Key::from("1"), Value::Null)]);
        let path = encode(&h, &NodePath::root(), "m", &value).unwrap();

        assert_eq!(h.node_kind(&path).unwrap(), NodeKind::Dataset);
        assert_eq!(attr(&h, &path, attribute::PICKLED), Some(AttrValue::Bool(true)));
        assert_eq!(attr(&h, &path, attribute::DTYPE), Some(AttrValue::from("dict")));
    }

    #[test]
    fn object_identity_on_node() {
        let h = store();
        let object = Object::new("shapes", "Point")
            .with_field("x", 1.0)
            .with_field("y", 2.0);
        let path = encode(&h, &NodePath::root(), "p", &Value::Object(object)).unwrap();

        assert_eq!(h.node_kind(&path).unwrap(), NodeKind::Group);
        assert_eq!(attr(&h, &path, attribute::DTYPE), Some(AttrValue::from("Point")));
        assert_eq!(attr(&h, &path, attribute::CLASS), Some(AttrValue::from("Point")));
        assert_eq!(attr(&h, &path, attribute::MODULE), Some(AttrValue::from("shapes")));
        assert_eq!(attr(&h, &NodePath::root(), attribute::CLASS), None);
    }

    #[test]
    fn pickle_objects_option() {
        let h = store();
        let options = CodecOptions {
            pickle_objects: true,
            ..CodecOptions::default()
        };
        let object = Value::Object(Object::new("shapes", "Point").with_field("x", 1.0));
        let path = Encoder::new(&h)
            .with_options(options)
            .encode(&NodePath::root(), "p", &object)
            .unwrap();

        assert!(matches!(h.read_payload(&path).unwrap(), Payload::Blob(_)));
        assert_eq!(attr(&h, &path, attribute::CLASS), Some(AttrValue::from("Point")));
    }

    #[test]
    fn empty_array_records_element_type_and_shape() {
        let h = store();
        let array = Array::empty(crate::array::ElementType::I16, vec![2, 0]).unwrap();
        let path = encode(&h, &NodePath::root(), "a", &Value::NumericArray(array)).unwrap();

        assert_eq!(h.read_payload(&path).unwrap().as_str(), Some(EMPTY_SENTINEL));
        assert_eq!(attr(&h, &path, attribute::ETYPE), Some(AttrValue::from("int16")));
        assert_eq!(attr(&h, &path, attribute::SHAPE), Some(AttrValue::I64Array(vec![2, 0])));
    }

    #[test]
    fn sparse_layout_is_recorded() {
        let h = store();
        let matrix = SparseMatrix::from_triplets(
            crate::sparse::SparseFormat::Coo,
            (2, 3),
            [(0, 1, 1.0), (1, 2, 2.0)],
        )
        .unwrap();
        let path = encode(&h, &NodePath::root(), "s", &Value::SparseMatrix(matrix)).unwrap();

        assert_eq!(
            h.list_child_keys(&path).unwrap(),
            vec!["data", "indices", "indptr", "shape"]
        );
        assert_eq!(attr(&h, &path, attribute::DTYPE), Some(AttrValue::from("coo_matrix")));
        assert_eq!(attr(&h, &path, attribute::FORMAT), Some(AttrValue::from("coo")));
    }

    #[test]
    fn invalid_sparse_layout_is_rejected() {
        let h = store();
        let matrix = SparseMatrix::Coo(crate::sparse::Coordinate {
            shape: (2, 2),
            row: vec![5],
            col: vec![0],
            data: vec![1.0],
        });
        let err = encode(&h, &NodePath::root(), "m", &Value::SparseMatrix(matrix)).unwrap_err();
        assert!(matches!(err, CodecError::UnsupportedValue(msg) if msg.contains("coo_matrix")));
        assert!(!h.has_child(&NodePath::root(), "m").unwrap());
    }

    #[test]
    fn unsorted_csr_is_stored_normalized() {
        let h = store();
        let matrix = SparseMatrix::Csr(crate::sparse::Compressed {
            shape: (1, 3),
            data: vec![2.0, 1.0, 3.0],
            indices: vec![2, 0, 2],
            indptr: vec![0, 3],
        });
        let path = encode(&h, &NodePath::root(), "m", &Value::SparseMatrix(matrix)).unwrap();

        assert_eq!(
            h.read_payload(&path.child("indices")).unwrap(),
            Payload::Array(Array::from_vec(ArrayData::I64(vec![0, 2])))
        );
        assert_eq!(
            h.read_payload(&path.child("data")).unwrap(),
            Payload::Array(Array::from_vec(ArrayData::F64(vec![1.0, 5.0])))
        );
    }

    #[test]
    fn set_with_repeated_members_is_stored_once() {
        let h = store();
        let set = Value::Set(
            crate::value::SetKind::Set,
            vec![Value::from(1), Value::from(1), Value::from(2)],
        );
        let path = encode(&h, &NodePath::root(), "s", &set).unwrap();

        assert_eq!(
            h.read_payload(&path).unwrap(),
            Payload::Array(Array::from_vec(ArrayData::I64(vec![1, 2])))
        );
        assert_eq!(crate::decode::decode(&h, &NodePath::root(), "s").unwrap(), set);
    }

    #[test]
    fn invalid_top_level_name() {
        let h = store();
        let err = encode(&h, &NodePath::root(), "a/b", &Value::Null).unwrap_err();
        assert!(matches!(err, CodecError::InvalidName(name) if name == "a/b"));
    }

    #[test]
    fn opaque_without_pickling_is_unsupported() {
        let h = store();
        let options = CodecOptions {
            pickle: false,
            ..CodecOptions::default()
        };
        let value = Value::Opaque(crate::value::Opaque::from_bytes(vec![1, 2, 3]));
        let err = Encoder::new(&h)
            .with_options(options)
            .encode(&NodePath::root(), "o", &value)
            .unwrap_err();
        assert!(matches!(err, CodecError::UnsupportedValue(_)));
    }
}
