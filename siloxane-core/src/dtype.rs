use crate::sparse::SparseFormat;
use crate::value::{SequenceKind, SetKind};

/// Sentinel payload of a `NoneType` dataset.
pub const NONE_SENTINEL: &str = "__NONE__";
/// Sentinel payload of an empty sequence, set or array dataset.
pub const EMPTY_SENTINEL: &str = "__EMPTY__";

/// A DTYPE tag the decoder knows how to rebuild.
///
/// Tags outside this set (user class names, foreign tags) fall through to
/// the object and raw-node rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    None,
    Bool,
    Int,
    Float,
    Complex,
    Str,
    Sequence(SequenceKind),
    Set(SetKind),
    Dict,
    Bundle,
    NdArray,
    Sparse(SparseFormat),
}

impl TypeTag {
    /// Parses a DTYPE tag, accepting the legacy aliases written by older
    /// versions of the format.
    pub fn parse(tag: &str) -> Option<TypeTag> {
        Some(match tag {
            "NoneType" => TypeTag::None,
            "bool" => TypeTag::Bool,
            "int" | "long" => TypeTag::Int,
            "float" => TypeTag::Float,
            "complex" => TypeTag::Complex,
            "str" | "unicode" => TypeTag::Str,
            "list" => TypeTag::Sequence(SequenceKind::List),
            "tuple" => TypeTag::Sequence(SequenceKind::Tuple),
            "set" => TypeTag::Set(SetKind::Set),
            "frozenset" => TypeTag::Set(SetKind::FrozenSet),
            "dict" => TypeTag::Dict,
            "Bundle" | "struct" => TypeTag::Bundle,
            "ndarray" | "matrix" => TypeTag::NdArray,
            other => TypeTag::Sparse(SparseFormat::from_type_name(other)?),
        })
    }

    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            TypeTag::Bool | TypeTag::Int | TypeTag::Float | TypeTag::Complex | TypeTag::Str
        )
    }
}
