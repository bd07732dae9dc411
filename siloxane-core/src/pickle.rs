use crate::value::Value;

/// Error type for pickling and unpickling.
#[derive(Debug, thiserror::Error)]
pub enum PickleError {
    #[error("failed to pickle value: {0}")]
    Dump(String),
    #[error("failed to unpickle blob: {0}")]
    Load(String),
}

/// Turns values that have no structured encoding into opaque blobs and back.
///
/// Whatever `dumps` produces must be accepted by `loads` of the same pickler.
pub trait Pickler {
    fn dumps(&self, value: &Value) -> Result<Vec<u8>, PickleError>;

    fn loads(&self, data: &[u8]) -> Result<Value, PickleError>;
}

/// The default pickler: the serde form of a [`Value`], encoded as CBOR.
#[derive(Debug, Clone, Copy, Default)]
pub struct CborPickler;

impl Pickler for CborPickler {
    fn dumps(&self, value: &Value) -> Result<Vec<u8>, PickleError> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf).map_err(|e| PickleError::Dump(e.to_string()))?;
        Ok(buf)
    }

    fn loads(&self, data: &[u8]) -> Result<Value, PickleError> {
        ciborium::from_reader(data).map_err(|e| PickleError::Load(e.to_string()))
    }
}
