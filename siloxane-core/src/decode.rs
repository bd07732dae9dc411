//! Rebuilds values from a [`Store`] using only the recorded node metadata.

use indexmap::IndexMap;
use std::cmp::Ordering;

use crate::array::{Array, ArrayData, ElementType};
use crate::attribute::{self, AttrValue};
use crate::dtype::{TypeTag, EMPTY_SENTINEL};
use crate::error::CodecError;
use crate::key::Key;
use crate::options::CodecOptions;
use crate::path::NodePath;
use crate::pickle::{CborPickler, Pickler};
use crate::sparse::{SparseFormat, SparseMatrix};
use crate::store::{NodeKind, Payload, Scalar, Store};
use crate::value::{Complex, Object, Opaque, SetKind, Value};

/// Parses the index out of a positional child name (`key7`, `key007`).
fn positional_index(name: &str) -> Option<u64> {
    let digits = name.strip_prefix("key")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Positional children first, in numeric order, then any other names.
fn positional_order(a: &String, b: &String) -> Ordering {
    match (positional_index(a), positional_index(b)) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// Splits an array into one value per element, in row-major order.
fn array_elements(array: Array) -> Vec<Value> {
    fn map<T>(v: Vec<T>, f: impl Fn(T) -> Value) -> Vec<Value> {
        v.into_iter().map(f).collect()
    }
    match array.into_data() {
        ArrayData::Bool(v) => map(v, Value::Boolean),
        ArrayData::I8(v) => map(v, |x| Value::Integer(x.into())),
        ArrayData::I16(v) => map(v, |x| Value::Integer(x.into())),
        ArrayData::I32(v) => map(v, |x| Value::Integer(x.into())),
        ArrayData::I64(v) => map(v, Value::Integer),
        ArrayData::U8(v) => map(v, |x| Value::Integer(x.into())),
        ArrayData::U16(v) => map(v, |x| Value::Integer(x.into())),
        ArrayData::U32(v) => map(v, |x| Value::Integer(x.into())),
        ArrayData::U64(v) => map(v, |x| match i64::try_from(x) {
            Ok(i) => Value::Integer(i),
            Err(_) => Value::Float(x as f64),
        }),
        ArrayData::F32(v) => map(v, |x| Value::Float(x.into())),
        ArrayData::F64(v) => map(v, Value::Float),
        ArrayData::Complex(v) => map(v, Value::Complex),
        ArrayData::Str(v) => map(v, Value::String),
    }
}

/// Wraps a lone scalar as a 0-d array.
fn scalar_array(scalar: Scalar) -> ArrayData {
    match scalar {
        Scalar::Bool(b) => ArrayData::Bool(vec![b]),
        Scalar::Int(i) => ArrayData::I64(vec![i]),
        Scalar::Float(x) => ArrayData::F64(vec![x]),
        Scalar::Complex(c) => ArrayData::Complex(vec![c]),
        Scalar::Str(s) => ArrayData::Str(vec![s]),
    }
}

/// Truncates toward zero. None when the result does not fit in an i64.
fn float_to_int(x: f64) -> Option<i64> {
    let t = x.trunc();
    // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive.
    if t >= i64::MIN as f64 && t < i64::MAX as f64 {
        Some(t as i64)
    } else {
        None
    }
}

fn scalar_value(scalar: Scalar) -> Value {
    match scalar {
        Scalar::Bool(b) => Value::Boolean(b),
        Scalar::Int(i) => Value::Integer(i),
        Scalar::Float(x) => Value::Float(x),
        Scalar::Complex(c) => Value::Complex(c),
        Scalar::Str(s) => Value::String(s),
    }
}

/// Decodes values from a store.
pub struct Decoder<'a, S> {
    store: &'a S,
    options: CodecOptions,
    pickler: &'a dyn Pickler,
}

impl<'a, S: Store> Decoder<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Decoder {
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

    /// Reads the child `name` of `parent` back into a value.
    pub fn decode(
        &self,
        parent: &NodePath,
        name: impl Into<Key>,
    ) -> Result<Value, CodecError<S::Error>> {
        let name = name.into().to_physical();
        log::debug!("decoding {name} under {parent}");
        if !self.store.has_child(parent, &name).map_err(CodecError::Store)? {
            return Err(CodecError::MissingChild {
                parent: parent.clone(),
                name,
            });
        }
        self.read(&parent.child(&name))
    }

    /// Decodes several children, returning values in request order.
    pub fn decode_all<K: Into<Key>>(
        &self,
        parent: &NodePath,
        names: impl IntoIterator<Item = K>,
    ) -> Result<Vec<Value>, CodecError<S::Error>> {
        names
            .into_iter()
            .map(|name| self.decode(parent, name))
            .collect()
    }

    /// Decodes the node at `path` itself.
    pub fn read(&self, path: &NodePath) -> Result<Value, CodecError<S::Error>> {
        let kind = self.store.node_kind(path).map_err(CodecError::Store)?;
        let pickled = self
            .attr(path, attribute::PICKLED)?
            .and_then(|a| a.as_bool())
            .unwrap_or(false);
        if pickled {
            return self.unpickle(path);
        }

        let dtype = self.attr_str(path, attribute::DTYPE)?;
        log::trace!("reading {path} ({kind:?}, DTYPE {dtype:?})");

        if kind == NodeKind::Group {
            if let Some(dtype) = &dtype {
                if self.attr_str(path, attribute::CLASS)?.as_ref() == Some(dtype) {
                    return self.read_object(path, dtype);
                }
            }
        }

        match dtype.as_deref().map(|d| (d, TypeTag::parse(d))) {
            Some((tag_name, Some(tag))) => self.read_tagged(path, kind, tag, tag_name),
            other => {
                if let Some((tag_name, None)) = other {
                    log::warn!("unknown DTYPE {tag_name:?} at {path}, reading raw node");
                }
                match kind {
                    NodeKind::Group => Ok(Value::Record(self.read_fields(path)?)),
                    NodeKind::Dataset => self.read_raw(path),
                }
            }
        }
    }

    fn attr(&self, path: &NodePath, name: &str) -> Result<Option<AttrValue>, CodecError<S::Error>> {
        self.store
            .get_attribute(path, name)
            .map_err(CodecError::Store)
    }

    fn attr_str(&self, path: &NodePath, name: &str) -> Result<Option<String>, CodecError<S::Error>> {
        Ok(self
            .attr(path, name)?
            .and_then(|a| a.as_str().map(str::to_string)))
    }

    fn payload(&self, path: &NodePath) -> Result<Payload, CodecError<S::Error>> {
        self.store.read_payload(path).map_err(CodecError::Store)
    }

    fn children(&self, path: &NodePath) -> Result<Vec<String>, CodecError<S::Error>> {
        self.store.list_child_keys(path).map_err(CodecError::Store)
    }

    fn unpickle(&self, path: &NodePath) -> Result<Value, CodecError<S::Error>> {
        let data = match self.payload(path)? {
            Payload::Blob(data) => data,
            other => return Err(CodecError::coercion(path, "pickled blob", other.type_name())),
        };
        if self.options.unpickle {
            return Ok(self.pickler.loads(&data)?);
        }
        log::warn!("unpickling disabled, returning {path} as an opaque blob");
        Ok(Value::Opaque(Opaque {
            module: self.attr_str(path, attribute::MODULE)?,
            class: self.attr_str(path, attribute::CLASS)?,
            data,
        }))
    }

    fn read_object(&self, path: &NodePath, class: &str) -> Result<Value, CodecError<S::Error>> {
        let module = self.attr_str(path, attribute::MODULE)?.unwrap_or_default();
        Ok(Value::Object(Object {
            module,
            class: class.to_string(),
            fields: self.read_fields(path)?,
        }))
    }

    fn read_fields(&self, path: &NodePath) -> Result<IndexMap<String, Value>, CodecError<S::Error>> {
        let mut fields = IndexMap::new();
        for name in self.children(path)? {
            let value = self.read(&path.child(&name))?;
            fields.insert(name, value);
        }
        Ok(fields)
    }

    fn read_tagged(
        &self,
        path: &NodePath,
        kind: NodeKind,
        tag: TypeTag,
        tag_name: &str,
    ) -> Result<Value, CodecError<S::Error>> {
        match (tag, kind) {
            (TypeTag::None, _) => Ok(Value::Null),
            (tag, NodeKind::Dataset) if tag.is_scalar() => {
                self.coerce(path, tag, tag_name, self.payload(path)?)
            }
            (TypeTag::Sequence(seq), _) => {
                Ok(Value::Sequence(seq, self.read_elements(path, kind, true)?))
            }
            (TypeTag::Set(SetKind::Set), _) => Ok(Value::set(self.read_elements(path, kind, false)?)),
            (TypeTag::Set(SetKind::FrozenSet), _) => {
                Ok(Value::frozenset(self.read_elements(path, kind, false)?))
            }
            (TypeTag::Dict, NodeKind::Group) => self.read_mapping(path),
            (TypeTag::Bundle, NodeKind::Group) => Ok(Value::Record(self.read_fields(path)?)),
            (TypeTag::NdArray, NodeKind::Dataset) => self.read_array(path),
            (TypeTag::Sparse(format), NodeKind::Group) => self.read_sparse(path, format),
            (_, NodeKind::Group) => Err(CodecError::coercion(path, tag_name, "group")),
            (_, NodeKind::Dataset) => Err(CodecError::coercion(path, tag_name, "dataset")),
        }
    }

    /// Converts a scalar payload to exactly the type named by the tag.
    fn coerce(
        &self,
        path: &NodePath,
        tag: TypeTag,
        tag_name: &str,
        payload: Payload,
    ) -> Result<Value, CodecError<S::Error>> {
        let scalar = match payload {
            Payload::Scalar(scalar) => scalar,
            other => return Err(CodecError::coercion(path, tag_name, other.type_name())),
        };
        let found = scalar.type_name();
        let value = match (tag, scalar) {
            (TypeTag::Bool, Scalar::Bool(b)) => Some(Value::Boolean(b)),
            (TypeTag::Bool, Scalar::Int(i)) => Some(Value::Boolean(i != 0)),
            (TypeTag::Int, Scalar::Int(i)) => Some(Value::Integer(i)),
            (TypeTag::Int, Scalar::Bool(b)) => Some(Value::Integer(b.into())),
            (TypeTag::Int, Scalar::Float(x)) => float_to_int(x).map(Value::Integer),
            (TypeTag::Int, Scalar::Str(s)) => s.trim().parse().ok().map(Value::Integer),
            (TypeTag::Float, Scalar::Float(x)) => Some(Value::Float(x)),
            (TypeTag::Float, Scalar::Int(i)) => Some(Value::Float(i as f64)),
            (TypeTag::Float, Scalar::Bool(b)) => Some(Value::Float(if b { 1.0 } else { 0.0 })),
            (TypeTag::Float, Scalar::Str(s)) => s.trim().parse().ok().map(Value::Float),
            (TypeTag::Complex, Scalar::Complex(c)) => Some(Value::Complex(c)),
            (TypeTag::Complex, Scalar::Float(x)) => Some(Value::Complex(Complex::new(x, 0.0))),
            (TypeTag::Complex, Scalar::Int(i)) => Some(Value::Complex(Complex::new(i as f64, 0.0))),
            (TypeTag::Str, Scalar::Str(s)) => Some(Value::String(s)),
            _ => None,
        };
        value.ok_or_else(|| CodecError::coercion(path, tag_name, found))
    }

    fn read_elements(
        &self,
        path: &NodePath,
        kind: NodeKind,
        ordered: bool,
    ) -> Result<Vec<Value>, CodecError<S::Error>> {
        if kind == NodeKind::Group {
            let mut names = self.children(path)?;
            if ordered {
                names.sort_by(positional_order);
            }
            return names
                .iter()
                .map(|name| self.read(&path.child(name)))
                .collect();
        }
        match self.payload(path)? {
            Payload::Scalar(Scalar::Str(s)) if s == EMPTY_SENTINEL => Ok(Vec::new()),
            Payload::Array(array) => Ok(array_elements(array)),
            other => Err(CodecError::coercion(path, "sequence", other.type_name())),
        }
    }

    fn read_mapping(&self, path: &NodePath) -> Result<Value, CodecError<S::Error>> {
        let mut entries = IndexMap::new();
        for name in self.children(path)? {
            let child = path.child(&name);
            let ntype = self.attr_str(&child, attribute::NTYPE)?;
            let key = Key::from_physical(&name, ntype.as_deref()).map_err(|e| {
                CodecError::coercion(&child, ntype.as_deref().unwrap_or("str"), e.to_string())
            })?;
            entries.insert(key, self.read(&child)?);
        }
        Ok(Value::Mapping(entries))
    }

    fn read_array(&self, path: &NodePath) -> Result<Value, CodecError<S::Error>> {
        match self.payload(path)? {
            Payload::Array(array) => Ok(Value::NumericArray(array)),
            Payload::Scalar(Scalar::Str(s)) if s == EMPTY_SENTINEL => {
                let element_type = self
                    .attr_str(path, attribute::ETYPE)?
                    .and_then(|name| ElementType::from_name(&name))
                    .unwrap_or(ElementType::F64);
                let shape = match self.attr(path, attribute::SHAPE)? {
                    Some(AttrValue::I64Array(dims)) => dims
                        .iter()
                        .map(|&d| usize::try_from(d))
                        .collect::<Result<Vec<_>, _>>()
                        .map_err(|_| CodecError::coercion(path, "array shape", format!("{dims:?}")))?,
                    _ => vec![0],
                };
                Array::empty(element_type, shape)
                    .map(Value::NumericArray)
                    .map_err(|e| CodecError::coercion(path, "empty array", e.to_string()))
            }
            Payload::Scalar(scalar) => Array::new(Vec::new(), scalar_array(scalar))
                .map(Value::NumericArray)
                .map_err(|e| CodecError::coercion(path, "ndarray", e.to_string())),
            Payload::Blob(_) => Err(CodecError::coercion(path, "ndarray", "blob")),
        }
    }

    fn read_sparse(
        &self,
        path: &NodePath,
        format: SparseFormat,
    ) -> Result<Value, CodecError<S::Error>> {
        let format = self
            .attr_str(path, attribute::FORMAT)?
            .and_then(|name| SparseFormat::from_name(&name))
            .unwrap_or(format);

        let data = match self.read_part(path, "data")? {
            Value::NumericArray(a) => a.data().to_f64(),
            _ => None,
        }
        .ok_or_else(|| CodecError::coercion(path, "sparse data", "non-numeric array"))?;
        let indices = self.read_indices(path, "indices")?;
        let indptr = self.read_indices(path, "indptr")?;
        let shape = match self.read_part(path, "shape")? {
            Value::Sequence(_, dims) => match dims.as_slice() {
                [Value::Integer(r), Value::Integer(c)] => {
                    usize::try_from(*r).ok().zip(usize::try_from(*c).ok())
                }
                _ => None,
            },
            _ => None,
        }
        .ok_or_else(|| CodecError::coercion(path, "sparse shape", "not two dimensions"))?;

        let matrix = SparseMatrix::csr(shape, data, indices, indptr)
            .map_err(|e| CodecError::coercion(path, format.type_name(), e.to_string()))?;
        Ok(Value::SparseMatrix(matrix.to_format(format)))
    }

    fn read_part(&self, path: &NodePath, part: &str) -> Result<Value, CodecError<S::Error>> {
        if !self.store.has_child(path, part).map_err(CodecError::Store)? {
            return Err(CodecError::MissingChild {
                parent: path.clone(),
                name: part.to_string(),
            });
        }
        self.read(&path.child(part))
    }

    fn read_indices(&self, path: &NodePath, part: &str) -> Result<Vec<usize>, CodecError<S::Error>> {
        let indices = match self.read_part(path, part)? {
            Value::NumericArray(a) => a.data().to_i64(),
            _ => None,
        };
        indices
            .and_then(|v| v.into_iter().map(|i| usize::try_from(i).ok()).collect())
            .ok_or_else(|| CodecError::coercion(&path.child(part), "index array", "non-index data"))
    }

    /// Converts a dataset without a known DTYPE directly from its payload.
    fn read_raw(&self, path: &NodePath) -> Result<Value, CodecError<S::Error>> {
        Ok(match self.payload(path)? {
            Payload::Scalar(scalar) => scalar_value(scalar),
            Payload::Array(array) => Value::NumericArray(array),
            Payload::Blob(data) => Value::Opaque(Opaque {
                module: self.attr_str(path, attribute::MODULE)?,
                class: self.attr_str(path, attribute::CLASS)?,
                data,
            }),
        })
    }
}

/// Decodes the child `name` of `parent` with default options.
pub fn decode<S: Store>(
    store: &S,
    parent: &NodePath,
    name: impl Into<Key>,
) -> Result<Value, CodecError<S::Error>> {
    Decoder::new(store).decode(parent, name)
}
