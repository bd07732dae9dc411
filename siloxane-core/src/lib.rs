//! Siloxane stores in-memory values in a hierarchical container of groups
//! and datasets, and reads them back using only the metadata it wrote.
//!
//! Core concepts:
//! - **Value**: the closed set of storable values (scalars, sequences, sets,
//!   mappings, records, arrays, sparse matrices, objects, opaque blobs)
//! - **Store**: the container interface (datasets, groups, attributes)
//! - **Hierarchy**: a `Store` kept as CBOR records in any `RecordStore`
//! - **Encoder** / **Decoder**: the type dispatch in both directions
//! - **Archive**: a group of a store used as a keyed container of values
//!
//! # Example
//!
//! ```
//! use siloxane_core::{Archive, Hierarchy, Key, MemoryStore, Value};
//!
//! let archive = Archive::new(Hierarchy::open(MemoryStore::new()).unwrap());
//!
//! let value = Value::mapping([
//!     (Key::Int(1), Value::list([Value::from(1), Value::from("a")])),
//!     (Key::from("b"), Value::Null),
//! ]);
//! archive.save("m", &value).unwrap();
//!
//! assert_eq!(archive.load("m").unwrap(), value);
//! ```
//!
//! # Node metadata
//!
//! Every node written carries `DTYPE` (value type), `NTYPE` (key type),
//! `DATE` and `PICKLED`. User-defined types add `MODULE` and `CLASS`.
//! Values with no structured encoding are pickled into a blob, by default
//! with [`CborPickler`].

// Lets derived impls refer to `::siloxane_core` inside this crate too.
extern crate self as siloxane_core;

mod archive;
mod array;
pub mod attribute;
mod decode;
mod dtype;
mod encode;
mod error;
mod hierarchy;
mod key;
mod options;
mod path;
mod pickle;
pub mod serde_helpers;
pub mod sparse;
mod store;
mod structural;
mod value;

pub use archive::{Archive, CopyError};
pub use array::{Array, ArrayData, ElementType, ShapeError};
pub use attribute::AttrValue;
pub use decode::{decode, Decoder};
pub use dtype::{TypeTag, EMPTY_SENTINEL, NONE_SENTINEL};
pub use encode::{encode, Encoder};
pub use error::CodecError;
pub use hierarchy::{Hierarchy, HierarchyError};
pub use indexmap::IndexMap;
pub use key::{Key, KeyParseError};
pub use options::{CodecOptions, ConfigError};
pub use path::NodePath;
pub use pickle::{CborPickler, PickleError, Pickler};
pub use sparse::{SparseError, SparseFormat, SparseMatrix};
pub use store::{MemoryStore, NodeKind, Payload, RecordStore, Scalar, Store};
pub use structural::{take_field, Fields, FromValue, Structural, ToValue, ValueError};
pub use value::{Complex, Object, Opaque, SequenceKind, SetKind, Value};

#[cfg(feature = "derive")]
pub use siloxane_derive::Structural;
