use serde::Deserialize;
use std::path::Path;

/// Error loading [`CodecOptions`] from a file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Switches for the opaque-blob fallbacks.
///
/// ```toml
/// pickle = true
/// unpickle = false
/// pickle_objects = false
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CodecOptions {
    /// Allow values without a structured encoding to be stored as blobs.
    pub pickle: bool,
    /// Unpickle blobs on decode. When off, blobs come back as `Value::Opaque`.
    pub unpickle: bool,
    /// Store `Value::Object` as a blob instead of a group of fields.
    pub pickle_objects: bool,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            pickle: true,
            unpickle: true,
            pickle_objects: false,
        }
    }
}

impl CodecOptions {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Reads options from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}
