use serde::{Deserialize, Serialize};
use std::fmt;

use crate::value::Complex;

/// Element type of an [`Array`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Complex,
    Str,
}

impl ElementType {
    /// Returns all element types in declaration order.
    pub fn all() -> &'static [ElementType] {
        use ElementType::*;
        &[Bool, I8, I16, I32, I64, U8, U16, U32, U64, F32, F64, Complex, Str]
    }

    /// Returns the tag stored in the ETYPE attribute.
    pub fn name(&self) -> &'static str {
        match self {
            ElementType::Bool => "bool",
            ElementType::I8 => "int8",
            ElementType::I16 => "int16",
            ElementType::I32 => "int32",
            ElementType::I64 => "int64",
            ElementType::U8 => "uint8",
            ElementType::U16 => "uint16",
            ElementType::U32 => "uint32",
            ElementType::U64 => "uint64",
            ElementType::F32 => "float32",
            ElementType::F64 => "float64",
            ElementType::Complex => "complex128",
            ElementType::Str => "str",
        }
    }

    /// Looks up an element type by its ETYPE tag.
    pub fn from_name(name: &str) -> Option<ElementType> {
        ElementType::all().iter().copied().find(|t| t.name() == name)
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Flat, typed element storage of an [`Array`] (row-major).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArrayData {
    Bool(Vec<bool>),
    I8(Vec<i8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    U64(Vec<u64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    Complex(Vec<Complex>),
    Str(Vec<String>),
}

macro_rules! with_data {
    ($data:expr, $v:ident => $body:expr) => {
        match $data {
            ArrayData::Bool($v) => $body,
            ArrayData::I8($v) => $body,
            ArrayData::I16($v) => $body,
            ArrayData::I32($v) => $body,
            ArrayData::I64($v) => $body,
            ArrayData::U8($v) => $body,
            ArrayData::U16($v) => $body,
            ArrayData::U32($v) => $body,
            ArrayData::U64($v) => $body,
            ArrayData::F32($v) => $body,
            ArrayData::F64($v) => $body,
            ArrayData::Complex($v) => $body,
            ArrayData::Str($v) => $body,
        }
    };
}

impl ArrayData {
    /// Returns an empty buffer of the given element type.
    pub fn empty(element_type: ElementType) -> Self {
        match element_type {
            ElementType::Bool => ArrayData::Bool(Vec::new()),
            ElementType::I8 => ArrayData::I8(Vec::new()),
            ElementType::I16 => ArrayData::I16(Vec::new()),
            ElementType::I32 => ArrayData::I32(Vec::new()),
            ElementType::I64 => ArrayData::I64(Vec::new()),
            ElementType::U8 => ArrayData::U8(Vec::new()),
            ElementType::U16 => ArrayData::U16(Vec::new()),
            ElementType::U32 => ArrayData::U32(Vec::new()),
            ElementType::U64 => ArrayData::U64(Vec::new()),
            ElementType::F32 => ArrayData::F32(Vec::new()),
            ElementType::F64 => ArrayData::F64(Vec::new()),
            ElementType::Complex => ArrayData::Complex(Vec::new()),
            ElementType::Str => ArrayData::Str(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        with_data!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn element_type(&self) -> ElementType {
        match self {
            ArrayData::Bool(_) => ElementType::Bool,
            ArrayData::I8(_) => ElementType::I8,
            ArrayData::I16(_) => ElementType::I16,
            ArrayData::I32(_) => ElementType::I32,
            ArrayData::I64(_) => ElementType::I64,
            ArrayData::U8(_) => ElementType::U8,
            ArrayData::U16(_) => ElementType::U16,
            ArrayData::U32(_) => ElementType::U32,
            ArrayData::U64(_) => ElementType::U64,
            ArrayData::F32(_) => ElementType::F32,
            ArrayData::F64(_) => ElementType::F64,
            ArrayData::Complex(_) => ElementType::Complex,
            ArrayData::Str(_) => ElementType::Str,
        }
    }

    /// Widens any real numeric buffer to f64. Returns None for bool,
    /// complex and string data.
    pub fn to_f64(&self) -> Option<Vec<f64>> {
        Some(match self {
            ArrayData::I8(v) => v.iter().map(|&x| x as f64).collect(),
            ArrayData::I16(v) => v.iter().map(|&x| x as f64).collect(),
            ArrayData::I32(v) => v.iter().map(|&x| x as f64).collect(),
            ArrayData::I64(v) => v.iter().map(|&x| x as f64).collect(),
            ArrayData::U8(v) => v.iter().map(|&x| x as f64).collect(),
            ArrayData::U16(v) => v.iter().map(|&x| x as f64).collect(),
            ArrayData::U32(v) => v.iter().map(|&x| x as f64).collect(),
            ArrayData::U64(v) => v.iter().map(|&x| x as f64).collect(),
            ArrayData::F32(v) => v.iter().map(|&x| x as f64).collect(),
            ArrayData::F64(v) => v.clone(),
            ArrayData::Bool(_) | ArrayData::Complex(_) | ArrayData::Str(_) => return None,
        })
    }

    /// Converts any integer buffer to i64. Returns None for other data or
    /// when a u64 element does not fit.
    pub fn to_i64(&self) -> Option<Vec<i64>> {
        Some(match self {
            ArrayData::I8(v) => v.iter().map(|&x| x as i64).collect(),
            ArrayData::I16(v) => v.iter().map(|&x| x as i64).collect(),
            ArrayData::I32(v) => v.iter().map(|&x| x as i64).collect(),
            ArrayData::I64(v) => v.clone(),
            ArrayData::U8(v) => v.iter().map(|&x| x as i64).collect(),
            ArrayData::U16(v) => v.iter().map(|&x| x as i64).collect(),
            ArrayData::U32(v) => v.iter().map(|&x| x as i64).collect(),
            ArrayData::U64(v) => {
                return v.iter().map(|&x| i64::try_from(x).ok()).collect();
            }
            _ => return None,
        })
    }
}

/// Error returned when an array's shape does not match its data.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("shape {shape:?} holds {expected} elements, data has {actual}")]
pub struct ShapeError {
    pub shape: Vec<usize>,
    pub expected: usize,
    pub actual: usize,
}

/// A rectangular, typed n-dimensional array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawArray")]
pub struct Array {
    shape: Vec<usize>,
    data: ArrayData,
}

/// Unchecked serde form of [`Array`].
#[derive(Deserialize)]
struct RawArray {
    shape: Vec<usize>,
    data: ArrayData,
}

impl TryFrom<RawArray> for Array {
    type Error = ShapeError;

    fn try_from(raw: RawArray) -> Result<Self, Self::Error> {
        Array::new(raw.shape, raw.data)
    }
}

impl Array {
    /// Creates an array, checking that the shape covers the data exactly.
    pub fn new(shape: Vec<usize>, data: ArrayData) -> Result<Self, ShapeError> {
        let expected = shape.iter().product::<usize>();
        if expected != data.len() {
            return Err(ShapeError {
                shape,
                expected,
                actual: data.len(),
            });
        }
        Ok(Array { shape, data })
    }

    /// Creates a one-dimensional array over the given data.
    pub fn from_vec(data: ArrayData) -> Self {
        Array {
            shape: vec![data.len()],
            data,
        }
    }

    /// Creates an array with zero elements of the given type and shape.
    ///
    /// The shape must contain at least one zero dimension.
    pub fn empty(element_type: ElementType, shape: Vec<usize>) -> Result<Self, ShapeError> {
        Array::new(shape, ArrayData::empty(element_type))
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if any dimension is zero-length.
    pub fn is_empty(&self) -> bool {
        self.shape.contains(&0)
    }

    pub fn element_type(&self) -> ElementType {
        self.data.element_type()
    }

    pub fn data(&self) -> &ArrayData {
        &self.data
    }

    pub fn into_data(self) -> ArrayData {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_checks_shape() {
        let ok = Array::new(vec![2, 3], ArrayData::I32(vec![0; 6]));
        assert!(ok.is_ok());

        let err = Array::new(vec![2, 2], ArrayData::I32(vec![0; 6])).unwrap_err();
        assert_eq!(err.expected, 4);
        assert_eq!(err.actual, 6);
    }

    #[test]
    fn zero_dimension_is_empty() {
        let a = Array::empty(ElementType::F32, vec![3, 0]).unwrap();
        assert!(a.is_empty());
        assert_eq!(a.element_type(), ElementType::F32);

        // A 0-d array holds one scalar and is not empty.
        let scalar = Array::new(vec![], ArrayData::F64(vec![1.0])).unwrap();
        assert!(!scalar.is_empty());
    }

    #[test]
    fn element_type_names_roundtrip() {
        for t in ElementType::all() {
            assert_eq!(ElementType::from_name(t.name()), Some(*t));
        }
        assert_eq!(ElementType::from_name("float16"), None);
    }

    #[test]
    fn deserialize_checks_shape() {
        #[derive(Serialize)]
        struct Unchecked {
            shape: Vec<usize>,
            data: ArrayData,
        }

        let mut buf = Vec::new();
        let bad = Unchecked {
            shape: vec![3, 3],
            data: ArrayData::I8(vec![1, 2]),
        };
        ciborium::into_writer(&bad, &mut buf).unwrap();
        assert!(ciborium::from_reader::<Array, _>(buf.as_slice()).is_err());

        let mut buf = Vec::new();
        let good = Array::new(vec![1, 2], ArrayData::I8(vec![1, 2])).unwrap();
        ciborium::into_writer(&good, &mut buf).unwrap();
        assert_eq!(ciborium::from_reader::<Array, _>(buf.as_slice()).unwrap(), good);
    }

    #[test]
    fn widening() {
        let data = ArrayData::U8(vec![1, 2]);
        assert_eq!(data.to_f64(), Some(vec![1.0, 2.0]));
        assert_eq!(data.to_i64(), Some(vec![1, 2]));
        assert_eq!(ArrayData::U64(vec![u64::MAX]).to_i64(), None);
        assert_eq!(ArrayData::Str(vec![]).to_f64(), None);
    }
}
