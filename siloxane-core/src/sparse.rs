//! Sparse matrices in several physical layouts.
//!
//! All layouts convert through coordinate triplets. CSR is the canonical
//! layout: it is what gets written to a store, whatever layout the value had.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Physical layout of a [`SparseMatrix`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SparseFormat {
    Csr,
    Csc,
    Coo,
    Dok,
    Lil,
    Dia,
}

impl SparseFormat {
    pub fn all() -> &'static [SparseFormat] {
        &[
            SparseFormat::Csr,
            SparseFormat::Csc,
            SparseFormat::Coo,
            SparseFormat::Dok,
            SparseFormat::Lil,
            SparseFormat::Dia,
        ]
    }

    /// Three-letter layout name (`csr`, `csc`, ...).
    pub fn name(&self) -> &'static str {
        match self {
            SparseFormat::Csr => "csr",
            SparseFormat::Csc => "csc",
            SparseFormat::Coo => "coo",
            SparseFormat::Dok => "dok",
            SparseFormat::Lil => "lil",
            SparseFormat::Dia => "dia",
        }
    }

    pub fn from_name(name: &str) -> Option<SparseFormat> {
        SparseFormat::all().iter().copied().find(|f| f.name() == name)
    }

    /// DTYPE tag of a matrix in this layout (`csr_matrix`, ...).
    pub fn type_name(&self) -> &'static str {
        match self {
            SparseFormat::Csr => "csr_matrix",
            SparseFormat::Csc => "csc_matrix",
            SparseFormat::Coo => "coo_matrix",
            SparseFormat::Dok => "dok_matrix",
            SparseFormat::Lil => "lil_matrix",
            SparseFormat::Dia => "dia_matrix",
        }
    }

    pub fn from_type_name(name: &str) -> Option<SparseFormat> {
        SparseFormat::from_name(name.strip_suffix("_matrix")?)
    }
}

impl fmt::Display for SparseFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when layout arrays are inconsistent.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SparseError {
    #[error("indptr has length {actual}, expected {expected}")]
    IndptrLength { expected: usize, actual: usize },
    #[error("indptr is not non-decreasing or does not end at {nnz}")]
    IndptrOrder { nnz: usize },
    #[error("data has {data} entries but indices has {indices}")]
    LengthMismatch { data: usize, indices: usize },
    #[error("index {index} out of bounds for dimension {bound}")]
    OutOfBounds { index: usize, bound: usize },
    #[error("{what} has length {actual}, expected {expected}")]
    Ragged {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Compressed storage shared by CSR and CSC.
///
/// For CSR, `indptr` runs over rows and `indices` are column numbers; for
/// CSC the roles are swapped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Compressed {
    pub shape: (usize, usize),
    pub data: Vec<f64>,
    pub indices: Vec<usize>,
    pub indptr: Vec<usize>,
}

impl Compressed {
    /// Checks the arrays against each other. `major`/`minor` are the
    /// compressed and indexed dimensions.
    fn validate(&self, major: usize, minor: usize) -> Result<(), SparseError> {
        if self.indptr.len() != major + 1 {
            return Err(SparseError::IndptrLength {
                expected: major + 1,
                actual: self.indptr.len(),
            });
        }
        if self.data.len() != self.indices.len() {
            return Err(SparseError::LengthMismatch {
                data: self.data.len(),
                indices: self.indices.len(),
            });
        }
        let nnz = self.data.len();
        let ordered = self.indptr.first() == Some(&0)
            && self.indptr.windows(2).all(|w| w[0] <= w[1])
            && self.indptr.last() == Some(&nnz);
        if !ordered {
            return Err(SparseError::IndptrOrder { nnz });
        }
        if let Some(&index) = self.indices.iter().find(|&&i| i >= minor) {
            return Err(SparseError::OutOfBounds { index, bound: minor });
        }
        Ok(())
    }

    /// Expands to (major, minor, value) triplets. Slots that `indptr`
    /// points at but the arrays do not hold are skipped.
    fn entries(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.indptr.windows(2).enumerate().flat_map(move |(major, w)| {
            (w[0]..w[1]).filter_map(move |k| {
                Some((major, *self.indices.get(k)?, *self.data.get(k)?))
            })
        })
    }

    /// Builds from (major, minor, value) triplets, sorting and summing
    /// duplicates. Entries outside `major_len` x `minor_len` are dropped.
    fn from_entries(
        shape: (usize, usize),
        major_len: usize,
        minor_len: usize,
        entries: impl IntoIterator<Item = (usize, usize, f64)>,
    ) -> Self {
        let mut summed: BTreeMap<(usize, usize), f64> = BTreeMap::new();
        for (major, minor, value) in entries {
            if major < major_len && minor < minor_len {
                *summed.entry((major, minor)).or_insert(0.0) += value;
            }
        }

        let mut data = Vec::with_capacity(summed.len());
        let mut indices = Vec::with_capacity(summed.len());
        let mut indptr = vec![0; major_len + 1];
        for ((major, minor), value) in summed {
            data.push(value);
            indices.push(minor);
            indptr[major + 1] += 1;
        }
        for i in 0..major_len {
            indptr[i + 1] += indptr[i];
        }

        Compressed {
            shape,
            data,
            indices,
            indptr,
        }
    }
}

/// Coordinate layout: parallel row, column and value arrays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub shape: (usize, usize),
    pub row: Vec<usize>,
    pub col: Vec<usize>,
    pub data: Vec<f64>,
}

/// Dictionary-of-keys layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyMap {
    pub shape: (usize, usize),
    pub entries: BTreeMap<(usize, usize), f64>,
}

/// List-of-lists layout: per row, the (column, value) pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowLists {
    pub shape: (usize, usize),
    pub rows: Vec<Vec<(usize, f64)>>,
}

/// Diagonal layout.
///
/// `data[k][j]` is the element at row `j - offsets[k]`, column `j`; entries
/// that fall outside the matrix are padding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagonals {
    pub shape: (usize, usize),
    pub offsets: Vec<i64>,
    pub data: Vec<Vec<f64>>,
}

/// A sparse matrix of f64 values in one of the supported layouts.
///
/// The layout structs have public fields; coordinates must lie inside
/// `shape`. Use the checked constructors when the input is untrusted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SparseMatrix {
    Csr(Compressed),
    Csc(Compressed),
    Coo(Coordinate),
    Dok(KeyMap),
    Lil(RowLists),
    Dia(Diagonals),
}

impl SparseMatrix {
    /// Creates a CSR matrix, validating the arrays.
    pub fn csr(
        shape: (usize, usize),
        data: Vec<f64>,
        indices: Vec<usize>,
        indptr: Vec<usize>,
    ) -> Result<Self, SparseError> {
        let m = Compressed {
            shape,
            data,
            indices,
            indptr,
        };
        m.validate(shape.0, shape.1)?;
        Ok(SparseMatrix::Csr(m))
    }

    /// Creates a CSC matrix, validating the arrays.
    pub fn csc(
        shape: (usize, usize),
        data: Vec<f64>,
        indices: Vec<usize>,
        indptr: Vec<usize>,
    ) -> Result<Self, SparseError> {
        let m = Compressed {
            shape,
            data,
            indices,
            indptr,
        };
        m.validate(shape.1, shape.0)?;
        Ok(SparseMatrix::Csc(m))
    }

    /// Creates a matrix in the given layout from (row, col, value) triplets.
    /// Duplicate coordinates are summed.
    pub fn from_triplets(
        format: SparseFormat,
        shape: (usize, usize),
        triplets: impl IntoIterator<Item = (usize, usize, f64)>,
    ) -> Result<Self, SparseError> {
        let mut checked = Vec::new();
        for (r, c, v) in triplets {
            if r >= shape.0 {
                return Err(SparseError::OutOfBounds { index: r, bound: shape.0 });
            }
            if c >= shape.1 {
                return Err(SparseError::OutOfBounds { index: c, bound: shape.1 });
            }
            checked.push((r, c, v));
        }
        let csr = Compressed::from_entries(shape, shape.0, shape.1, checked);
        Ok(SparseMatrix::Csr(csr).to_format(format))
    }

    /// Checks that the layout arrays agree with each other and that every
    /// coordinate lies inside `shape`.
    pub fn validate(&self) -> Result<(), SparseError> {
        let (rows, cols) = self.shape();
        let in_bounds = |r: usize, c: usize| {
            if r >= rows {
                Err(SparseError::OutOfBounds { index: r, bound: rows })
            } else if c >= cols {
                Err(SparseError::OutOfBounds { index: c, bound: cols })
            } else {
                Ok(())
            }
        };
        let same_len = |what, expected: usize, actual: usize| {
            if expected == actual {
                Ok(())
            } else {
                Err(SparseError::Ragged {
                    what,
                    expected,
                    actual,
                })
            }
        };
        match self {
            SparseMatrix::Csr(m) => m.validate(rows, cols),
            SparseMatrix::Csc(m) => m.validate(cols, rows),
            SparseMatrix::Coo(m) => {
                same_len("row", m.data.len(), m.row.len())?;
                same_len("col", m.data.len(), m.col.len())?;
                m.row.iter().zip(&m.col).try_for_each(|(&r, &c)| in_bounds(r, c))
            }
            SparseMatrix::Dok(m) => m.entries.keys().try_for_each(|&(r, c)| in_bounds(r, c)),
            SparseMatrix::Lil(m) => {
                same_len("rows", rows, m.rows.len())?;
                m.rows
                    .iter()
                    .enumerate()
                    .flat_map(|(r, row)| row.iter().map(move |&(c, _)| (r, c)))
                    .try_for_each(|(r, c)| in_bounds(r, c))
            }
            SparseMatrix::Dia(m) => {
                same_len("offsets", m.data.len(), m.offsets.len())?;
                m.data
                    .iter()
                    .try_for_each(|diag| same_len("diagonal", cols, diag.len()))
            }
        }
    }

    pub fn format(&self) -> SparseFormat {
        match self {
            SparseMatrix::Csr(_) => SparseFormat::Csr,
            SparseMatrix::Csc(_) => SparseFormat::Csc,
            SparseMatrix::Coo(_) => SparseFormat::Coo,
            SparseMatrix::Dok(_) => SparseFormat::Dok,
            SparseMatrix::Lil(_) => SparseFormat::Lil,
            SparseMatrix::Dia(_) => SparseFormat::Dia,
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        match self {
            SparseMatrix::Csr(m) | SparseMatrix::Csc(m) => m.shape,
            SparseMatrix::Coo(m) => m.shape,
            SparseMatrix::Dok(m) => m.shape,
            SparseMatrix::Lil(m) => m.shape,
            SparseMatrix::Dia(m) => m.shape,
        }
    }

    /// Returns all stored (row, col, value) entries, in no particular order.
    /// Duplicates are not merged.
    pub fn triplets(&self) -> Vec<(usize, usize, f64)> {
        match self {
            SparseMatrix::Csr(m) => m.entries().collect(),
            SparseMatrix::Csc(m) => m.entries().map(|(c, r, v)| (r, c, v)).collect(),
            SparseMatrix::Coo(m) => m
                .row
                .iter()
                .zip(&m.col)
                .zip(&m.data)
                .map(|((&r, &c), &v)| (r, c, v))
                .collect(),
            SparseMatrix::Dok(m) => m.entries.iter().map(|(&(r, c), &v)| (r, c, v)).collect(),
            SparseMatrix::Lil(m) => m
                .rows
                .iter()
                .enumerate()
                .flat_map(|(r, row)| row.iter().map(move |&(c, v)| (r, c, v)))
                .collect(),
            SparseMatrix::Dia(m) => {
                let (rows, cols) = m.shape;
                let mut out = Vec::new();
                for (offset, diag) in m.offsets.iter().zip(&m.data) {
                    for (c, &v) in diag.iter().enumerate().take(cols) {
                        let r = c as i64 - offset;
                        if r >= 0 && (r as usize) < rows && v != 0.0 {
                            out.push((r as usize, c, v));
                        }
                    }
                }
                out
            }
        }
    }

    /// Returns the sorted nonzero entries with duplicates summed.
    pub fn nonzeros(&self) -> Vec<(usize, usize, f64)> {
        let mut summed: BTreeMap<(usize, usize), f64> = BTreeMap::new();
        for (r, c, v) in self.triplets() {
            *summed.entry((r, c)).or_insert(0.0) += v;
        }
        summed
            .into_iter()
            .filter(|&(_, v)| v != 0.0)
            .map(|((r, c), v)| (r, c, v))
            .collect()
    }

    /// Converts to the canonical CSR layout (sorted, duplicates summed).
    ///
    /// Coordinates outside `shape` are dropped; call [`validate`](Self::validate)
    /// first to reject them instead.
    pub fn to_csr(&self) -> Compressed {
        let shape = self.shape();
        Compressed::from_entries(shape, shape.0, shape.1, self.triplets())
    }

    /// Converts to the given layout.
    pub fn to_format(&self, format: SparseFormat) -> SparseMatrix {
        if self.format() == format {
            return self.clone();
        }
        let shape = self.shape();
        let csr = self.to_csr();
        match format {
            SparseFormat::Csr => SparseMatrix::Csr(csr),
            SparseFormat::Csc => SparseMatrix::Csc(Compressed::from_entries(
                shape,
                shape.1,
                shape.0,
                csr.entries().map(|(r, c, v)| (c, r, v)),
            )),
            SparseFormat::Coo => {
                let (mut row, mut col, mut data) = (Vec::new(), Vec::new(), Vec::new());
                for (r, c, v) in csr.entries() {
                    row.push(r);
                    col.push(c);
                    data.push(v);
                }
                SparseMatrix::Coo(Coordinate {
                    shape,
                    row,
                    col,
                    data,
                })
            }
            SparseFormat::Dok => SparseMatrix::Dok(KeyMap {
                shape,
                entries: csr.entries().map(|(r, c, v)| ((r, c), v)).collect(),
            }),
            SparseFormat::Lil => {
                let mut rows = vec![Vec::new(); shape.0];
                for (r, c, v) in csr.entries() {
                    rows[r].push((c, v));
                }
                SparseMatrix::Lil(RowLists { shape, rows })
            }
            SparseFormat::Dia => {
                let mut by_offset: BTreeMap<i64, Vec<f64>> = BTreeMap::new();
                for (r, c, v) in csr.entries() {
                    let offset = c as i64 - r as i64;
                    by_offset.entry(offset).or_insert_with(|| vec![0.0; shape.1])[c] = v;
                }
                let (offsets, data): (Vec<i64>, Vec<Vec<f64>>) = by_offset.into_iter().unzip();
                SparseMatrix::Dia(Diagonals {
                    shape,
                    offsets,
                    data,
                })
            }
        }
    }
}

impl From<Compressed> for SparseMatrix {
    fn from(m: Compressed) -> Self {
        SparseMatrix::Csr(m)
    }
}

/// Matrices are equal when layout, shape and nonzero entries agree.
impl PartialEq for SparseMatrix {
    fn eq(&self, other: &Self) -> bool {
        self.format() == other.format()
            && self.shape() == other.shape()
            && self.nonzeros() == other.nonzeros()
    }
}
