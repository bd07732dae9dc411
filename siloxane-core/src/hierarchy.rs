//! A [`Store`] built on top of any [`RecordStore`].
//!
//! Every node is one CBOR record keyed by its path. Groups record their
//! child keys, so listing children never scans the backend.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::attribute::AttrValue;
use crate::key::Key;
use crate::path::NodePath;
use crate::store::{NodeKind, Payload, RecordStore, Store};

/// Error type for hierarchy operations.
#[derive(Debug, thiserror::Error)]
pub enum HierarchyError<E> {
    #[error("node not found: {0}")]
    NotFound(NodePath),
    #[error("not a group: {0}")]
    NotAGroup(NodePath),
    #[error("not a dataset: {0}")]
    NotADataset(NodePath),
    #[error("node already exists: {0}")]
    AlreadyExists(NodePath),
    #[error("invalid child key: {0:?}")]
    InvalidKey(String),
    #[error("record encoding failed: {0}")]
    Encoding(String),
    #[error("backend error: {0}")]
    Backend(E),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum NodeBody {
    Group(Vec<String>),
    Dataset(Payload),
}

/// Stored form of a single node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct NodeRecord {
    body: NodeBody,
    attrs: IndexMap<String, AttrValue>,
}

impl NodeRecord {
    fn group() -> Self {
        NodeRecord {
            body: NodeBody::Group(Vec::new()),
            attrs: IndexMap::new(),
        }
    }

    fn dataset(payload: Payload) -> Self {
        NodeRecord {
            body: NodeBody::Dataset(payload),
            attrs: IndexMap::new(),
        }
    }
}

/// Groups and datasets persisted in a record store.
#[derive(Debug)]
pub struct Hierarchy<R> {
    records: R,
}

impl<R: RecordStore> Hierarchy<R> {
    /// Opens a hierarchy, creating the root group if the store is empty.
    pub fn open(records: R) -> Result<Self, HierarchyError<R::Error>> {
        let hierarchy = Hierarchy { records };
        let root = NodePath::root();
        if !hierarchy.records.has(&root).map_err(HierarchyError::Backend)? {
            log::debug!("initializing empty hierarchy");
            hierarchy.save(&root, &NodeRecord::group())?;
        }
        Ok(hierarchy)
    }

    pub fn records(&self) -> &R {
        &self.records
    }

    pub fn into_inner(self) -> R {
        self.records
    }

    fn load(&self, path: &NodePath) -> Result<NodeRecord, HierarchyError<R::Error>> {
        let bytes = self
            .records
            .get(path)
            .map_err(HierarchyError::Backend)?
            .ok_or_else(|| HierarchyError::NotFound(path.clone()))?;
        ciborium::from_reader(bytes.as_slice()).map_err(|e| HierarchyError::Encoding(e.to_string()))
    }

    fn save(&self, path: &NodePath, record: &NodeRecord) -> Result<(), HierarchyError<R::Error>> {
        let mut bytes = Vec::new();
        ciborium::into_writer(record, &mut bytes)
            .map_err(|e| HierarchyError::Encoding(e.to_string()))?;
        self.records.put(path, &bytes).map_err(HierarchyError::Backend)
    }

    fn load_group(
        &self,
        path: &NodePath,
    ) -> Result<(NodeRecord, Vec<String>), HierarchyError<R::Error>> {
        let record = self.load(path)?;
        match &record.body {
            NodeBody::Group(children) => {
                let children = children.clone();
                Ok((record, children))
            }
            NodeBody::Dataset(_) => Err(HierarchyError::NotAGroup(path.clone())),
        }
    }

    fn create_child(
        &self,
        parent: &NodePath,
        key: &str,
        child: NodeRecord,
    ) -> Result<NodePath, HierarchyError<R::Error>> {
        if !Key::is_valid_physical(key) {
            return Err(HierarchyError::InvalidKey(key.to_string()));
        }
        let (mut record, mut children) = self.load_group(parent)?;
        let path = parent.child(key);
        if children.iter().any(|c| c == key) {
            return Err(HierarchyError::AlreadyExists(path));
        }
        self.save(&path, &child)?;
        children.push(key.to_string());
        record.body = NodeBody::Group(children);
        self.save(parent, &record)?;
        Ok(path)
    }

    fn delete_tree(&self, path: &NodePath) -> Result<(), HierarchyError<R::Error>> {
        if let NodeBody::Group(children) = self.load(path)?.body {
            for child in &children {
                self.delete_tree(&path.child(child))?;
            }
        }
        self.records.delete(path).map_err(HierarchyError::Backend)
    }
}

impl<R: RecordStore> Store for Hierarchy<R> {
    type Error = HierarchyError<R::Error>;

    fn create_dataset(
        &self,
        parent: &NodePath,
        key: &str,
        payload: Payload,
    ) -> Result<NodePath, Self::Error> {
        self.create_child(parent, key, NodeRecord::dataset(payload))
    }

    fn create_group(&self, parent: &NodePath, key: &str) -> Result<NodePath, Self::Error> {
        self.create_child(parent, key, NodeRecord::group())
    }

    fn has_child(&self, parent: &NodePath, key: &str) -> Result<bool, Self::Error> {
        match self.load(parent)?.body {
            NodeBody::Group(children) => Ok(children.iter().any(|c| c == key)),
            NodeBody::Dataset(_) => Ok(false),
        }
    }

    fn delete_child(&self, parent: &NodePath, key: &str) -> Result<(), Self::Error> {
        let (mut record, mut children) = self.load_group(parent)?;
        let path = parent.child(key);
        let Some(position) = children.iter().position(|c| c == key) else {
            return Err(HierarchyError::NotFound(path));
        };
        self.delete_tree(&path)?;
        children.remove(position);
        record.body = NodeBody::Group(children);
        self.save(parent, &record)
    }

    fn list_child_keys(&self, group: &NodePath) -> Result<Vec<String>, Self::Error> {
        self.load_group(group).map(|(_, children)| children)
    }

    fn node_kind(&self, node: &NodePath) -> Result<NodeKind, Self::Error> {
        Ok(match self.load(node)?.body {
            NodeBody::Group(_) => NodeKind::Group,
            NodeBody::Dataset(_) => NodeKind::Dataset,
        })
    }

    fn get_attribute(&self, node: &NodePath, name: &str) -> Result<Option<AttrValue>, Self::Error> {
        Ok(self.load(node)?.attrs.swap_remove(name))
    }

    fn set_attribute(&self, node: &NodePath, name: &str, value: AttrValue) -> Result<(), Self::Error> {
        let mut record = self.load(node)?;
        record.attrs.insert(name.to_string(), value);
        self.save(node, &record)
    }

    fn read_payload(&self, node: &NodePath) -> Result<Payload, Self::Error> {
        match self.load(node)?.body {
            NodeBody::Dataset(payload) => Ok(payload),
            NodeBody::Group(_) => Err(HierarchyError::NotADataset(node.clone())),
        }
    }
}
