//! RocksDB-backed record store for siloxane hierarchies.

use std::path::Path;

use rocksdb::{DB, Options};
use siloxane_core::{Hierarchy, HierarchyError, NodePath, RecordStore};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("RocksDB error: {0}")]
pub struct RocksError(#[from] rocksdb::Error);

/// A persistent record store backed by RocksDB.
///
/// Records are keyed by the textual form of their node path (`/a/key0`).
pub struct RocksStore {
    db: DB,
}

impl RocksStore {
    /// Opens a RocksDB store at the given path.
    ///
    /// Creates the database if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RocksError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, path)?;
        Ok(Self { db })
    }

    /// Opens the database and the hierarchy stored in it.
    pub fn open_hierarchy(
        path: impl AsRef<Path>,
    ) -> Result<Hierarchy<RocksStore>, HierarchyError<RocksError>> {
        let store = Self::open(path).map_err(HierarchyError::Backend)?;
        Hierarchy::open(store)
    }
}

fn record_key(path: &NodePath) -> Vec<u8> {
    path.to_string().into_bytes()
}

impl RecordStore for RocksStore {
    type Error = RocksError;

    fn get(&self, path: &NodePath) -> Result<Option<Vec<u8>>, Self::Error> {
        Ok(self.db.get(record_key(path))?)
    }

    fn put(&self, path: &NodePath, record: &[u8]) -> Result<(), Self::Error> {
        self.db.put(record_key(path), record)?;
        Ok(())
    }

    fn has(&self, path: &NodePath) -> Result<bool, Self::Error> {
        Ok(self.db.get_pinned(record_key(path))?.is_some())
    }

    fn delete(&self, path: &NodePath) -> Result<(), Self::Error> {
        self.db.delete(record_key(path))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_store() -> (RocksStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        (store, dir)
    }

    #[test]
    fn put_get() {
        let (store, _dir) = temp_store();
        let path = NodePath::parse("/a/key0");
        let value = b"hello world";

        store.put(&path, value).unwrap();
        let retrieved = store.get(&path).unwrap();

        assert_eq!(retrieved, Some(value.to_vec()));
    }

    #[test]
    fn get_missing() {
        let (store, _dir) = temp_store();

        let retrieved = store.get(&NodePath::parse("/nonexistent")).unwrap();

        assert_eq!(retrieved, None);
    }

    #[test]
    fn has_and_delete() {
        let (store, _dir) = temp_store();
        let path = NodePath::root();

        assert!(!store.has(&path).unwrap());

        store.put(&path, b"value").unwrap();
        assert!(store.has(&path).unwrap());

        store.delete(&path).unwrap();
        assert!(!store.has(&path).unwrap());
    }

    #[test]
    fn persistence() {
        let dir = TempDir::new().unwrap();
        let path = NodePath::parse("/persistent");
        let value = b"data survives restart";

        {
            let store = RocksStore::open(dir.path()).unwrap();
            store.put(&path, value).unwrap();
        }

        {
            let store = RocksStore::open(dir.path()).unwrap();
            let retrieved = store.get(&path).unwrap();
            assert_eq!(retrieved, Some(value.to_vec()));
        }
    }
}
