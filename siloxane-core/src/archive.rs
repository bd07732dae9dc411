//! A store bound to a group, with value-level load and save.

use crate::attribute;
use crate::decode::Decoder;
use crate::encode::Encoder;
use crate::error::CodecError;
use crate::key::Key;
use crate::options::CodecOptions;
use crate::path::NodePath;
use crate::store::{NodeKind, Store};
use crate::structural::{FromValue, ToValue};
use crate::value::Value;

/// Error copying a value between two archives.
#[derive(Debug, thiserror::Error)]
pub enum CopyError<S, D> {
    #[error("source: {0}")]
    Source(CodecError<S>),
    #[error("destination: {0}")]
    Dest(CodecError<D>),
}

/// A group in a store, used as a keyed container of values.
///
/// Sub-groups are archives too; see [`Archive::group`].
#[derive(Debug)]
pub struct Archive<S> {
    store: S,
    path: NodePath,
    options: CodecOptions,
}

impl<S: Store> Archive<S> {
    /// Binds the root group of `store`.
    pub fn new(store: S) -> Self {
        Self::at(store, NodePath::root())
    }

    /// Binds an existing group of `store`.
    pub fn at(store: S, path: NodePath) -> Self {
        Archive {
            store,
            path,
            options: CodecOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CodecOptions) -> Self {
        self.options = options;
        self
    }

    pub fn path(&self) -> &NodePath {
        &self.path
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    fn encoder(&self) -> Encoder<'_, S> {
        Encoder::new(&self.store).with_options(self.options)
    }

    fn decoder(&self) -> Decoder<'_, S> {
        Decoder::new(&self.store).with_options(self.options)
    }

    /// Stores `value` under `name`, replacing what was there.
    pub fn save(&self, name: impl Into<Key>, value: &Value) -> Result<NodePath, CodecError<S::Error>> {
        self.encoder().encode(&self.path, name, value)
    }

    pub fn load(&self, name: impl Into<Key>) -> Result<Value, CodecError<S::Error>> {
        self.decoder().decode(&self.path, name)
    }

    pub fn load_all<K: Into<Key>>(
        &self,
        names: impl IntoIterator<Item = K>,
    ) -> Result<Vec<Value>, CodecError<S::Error>> {
        self.decoder().decode_all(&self.path, names)
    }

    /// Converts `value` with [`ToValue`] and stores it.
    pub fn save_as<T: ToValue + ?Sized>(
        &self,
        name: impl Into<Key>,
        value: &T,
    ) -> Result<NodePath, CodecError<S::Error>> {
        self.save(name, &value.to_value())
    }

    /// Loads a value and converts it with [`FromValue`].
    pub fn load_as<T: FromValue>(&self, name: impl Into<Key>) -> Result<T, CodecError<S::Error>> {
        let key = name.into();
        let path = self.path.child(&key.to_physical());
        let value = self.load(key)?;
        T::from_value(value)
            .map_err(|e| CodecError::coercion(&path, std::any::type_name::<T>(), e.to_string()))
    }

    pub fn remove(&self, name: impl Into<Key>) -> Result<(), CodecError<S::Error>> {
        let name = name.into().to_physical();
        if !self.contains_physical(&name)? {
            return Err(CodecError::MissingChild {
                parent: self.path.clone(),
                name,
            });
        }
        log::debug!("removing {}", self.path.child(&name));
        self.store
            .delete_child(&self.path, &name)
            .map_err(CodecError::Store)
    }

    pub fn contains(&self, name: impl Into<Key>) -> Result<bool, CodecError<S::Error>> {
        self.contains_physical(&name.into().to_physical())
    }

    fn contains_physical(&self, name: &str) -> Result<bool, CodecError<S::Error>> {
        self.store
            .has_child(&self.path, name)
            .map_err(CodecError::Store)
    }

    /// Returns the keys of the stored children, restored through their NTYPE.
    pub fn keys(&self) -> Result<Vec<Key>, CodecError<S::Error>> {
        let names = self
            .store
            .list_child_keys(&self.path)
            .map_err(CodecError::Store)?;
        names
            .into_iter()
            .map(|name| -> Result<Key, CodecError<S::Error>> {
                let child = self.path.child(&name);
                let ntype = self
                    .store
                    .get_attribute(&child, attribute::NTYPE)
                    .map_err(CodecError::Store)?;
                let ntype = ntype.as_ref().and_then(|a| a.as_str());
                Key::from_physical(&name, ntype).map_err(|e| {
                    CodecError::coercion(&child, ntype.unwrap_or("str"), e.to_string())
                })
            })
            .collect()
    }

    pub fn len(&self) -> Result<usize, CodecError<S::Error>> {
        self.store
            .list_child_keys(&self.path)
            .map(|keys| keys.len())
            .map_err(CodecError::Store)
    }

    pub fn is_empty(&self) -> Result<bool, CodecError<S::Error>> {
        Ok(self.len()? == 0)
    }

    /// Opens an existing child group as an archive.
    pub fn group(&self, name: impl Into<Key>) -> Result<Archive<&S>, CodecError<S::Error>> {
        let name = name.into().to_physical();
        if !self.contains_physical(&name)? {
            return Err(CodecError::MissingChild {
                parent: self.path.clone(),
                name,
            });
        }
        let path = self.path.child(&name);
        match self.store.node_kind(&path).map_err(CodecError::Store)? {
            NodeKind::Group => Ok(Archive::at(&self.store, path).with_options(self.options)),
            NodeKind::Dataset => Err(CodecError::coercion(&path, "group", "dataset")),
        }
    }

    /// Opens a child group, creating an untagged one if it does not exist.
    pub fn require_group(&self, name: impl Into<Key>) -> Result<Archive<&S>, CodecError<S::Error>> {
        let key = name.into();
        let name = key.to_physical();
        if !Key::is_valid_physical(&name) {
            return Err(CodecError::InvalidName(name));
        }
        if !self.contains_physical(&name)? {
            log::debug!("creating group {}", self.path.child(&name));
            self.store
                .create_group(&self.path, &name)
                .map_err(CodecError::Store)?;
        }
        self.group(key)
    }

    /// Returns the paths of all stored values below this group: every node
    /// carrying a DTYPE whose parent carries none.
    pub fn object_paths(&self) -> Result<Vec<NodePath>, CodecError<S::Error>> {
        let mut found = Vec::new();
        self.collect_object_paths(&self.path, &mut found)?;
        Ok(found)
    }

    fn collect_object_paths(
        &self,
        group: &NodePath,
        found: &mut Vec<NodePath>,
    ) -> Result<(), CodecError<S::Error>> {
        let names = self
            .store
            .list_child_keys(group)
            .map_err(CodecError::Store)?;
        for name in names {
            let child = group.child(&name);
            let tagged = self
                .store
                .get_attribute(&child, attribute::DTYPE)
                .map_err(CodecError::Store)?
                .is_some();
            if tagged {
                found.push(child);
            } else if self.store.node_kind(&child).map_err(CodecError::Store)? == NodeKind::Group {
                self.collect_object_paths(&child, found)?;
            }
        }
        Ok(())
    }

    /// Decodes `name` here and encodes it as `dest_name` in `dest`.
    pub fn copy_to<D: Store>(
        &self,
        name: impl Into<Key>,
        dest: &Archive<D>,
        dest_name: impl Into<Key>,
    ) -> Result<NodePath, CopyError<S::Error, D::Error>> {
        let value = self.load(name).map_err(CopyError::Source)?;
        dest.save(dest_name, &value).map_err(CopyError::Dest)
    }
}
