use serde::{Deserialize, Serialize};
use std::fmt;

/// Absolute location of a node in a hierarchy, as a list of child keys.
///
/// The root is the empty path and displays as `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct NodePath(Vec<String>);

impl NodePath {
    pub fn root() -> Self {
        NodePath(Vec::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the path of the child `key` below this node.
    pub fn child(&self, key: &str) -> NodePath {
        let mut segments = self.0.clone();
        segments.push(key.to_string());
        NodePath(segments)
    }

    /// Returns the parent path, or None for the root.
    pub fn parent(&self) -> Option<NodePath> {
        let (_, rest) = self.0.split_last()?;
        Some(NodePath(rest.to_vec()))
    }

    /// Returns the last key, or None for the root.
    pub fn name(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Returns true if `self` is `other` or lies below it.
    pub fn starts_with(&self, other: &NodePath) -> bool {
        self.0.starts_with(&other.0)
    }

    /// Parses a `/`-separated path. Empty segments are ignored, so `""`,
    /// `"/"` and `"//"` all name the root.
    pub fn parse(text: &str) -> NodePath {
        NodePath(
            text.split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.0 {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}
