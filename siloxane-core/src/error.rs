use crate::path::NodePath;
use crate::pickle::PickleError;

/// Error type for encode and decode operations.
///
/// `E` is the error type of the underlying [`Store`](crate::Store).
#[derive(Debug, thiserror::Error)]
pub enum CodecError<E> {
    #[error("no child named {name:?} under {parent}")]
    MissingChild { parent: NodePath, name: String },
    #[error(transparent)]
    Pickle(#[from] PickleError),
    #[error("cannot read {path} as {expected}: found {found}")]
    TypeCoercion {
        path: NodePath,
        expected: String,
        found: String,
    },
    #[error("unsupported value: {0}")]
    UnsupportedValue(String),
    #[error("invalid node name: {0:?}")]
    InvalidName(String),
    #[error("store error: {0}")]
    Store(E),
}

impl<E> CodecError<E> {
    pub(crate) fn coercion(
        path: &NodePath,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        CodecError::TypeCoercion {
            path: path.clone(),
            expected: expected.into(),
            found: found.into(),
        }
    }
}
