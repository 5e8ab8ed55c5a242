//! Project tree value types and their wire representation.
//!
//! Nodes are shared through `Arc` so that edits can rebuild only the path to
//! the edited node and hand every untouched subtree to the new tree as-is.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};

use crate::core::id::new_id;

/// Opaque node identifier. Compared for equality only.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A file or folder in the project tree.
///
/// Serializes as `{ id, name, type: "file" | "folder", content | children }`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Node {
    File(FileNode),
    Folder(FolderNode),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileNode {
    pub id: NodeId,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderNode {
    pub id: NodeId,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub children: Vec<Arc<Node>>,
}

impl Node {
    /// New file with a freshly allocated id.
    pub fn file(name: impl Into<String>, content: impl Into<String>) -> Self {
        Node::File(FileNode {
            id: new_id(),
            name: name.into(),
            content: content.into(),
        })
    }

    /// New empty folder with a freshly allocated id.
    pub fn folder(name: impl Into<String>) -> Self {
        Node::Folder(FolderNode {
            id: new_id(),
            name: name.into(),
            children: Vec::new(),
        })
    }

    /// New folder holding `children`, with a freshly allocated id.
    pub fn folder_with(name: impl Into<String>, children: Vec<Node>) -> Self {
        Node::Folder(FolderNode {
            id: new_id(),
            name: name.into(),
            children: children.into_iter().map(Arc::new).collect(),
        })
    }

    pub fn id(&self) -> &NodeId {
        match self {
            Node::File(file) => &file.id,
            Node::Folder(folder) => &folder.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Node::File(file) => &file.name,
            Node::Folder(folder) => &folder.name,
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, Node::File(_))
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, Node::Folder(_))
    }

    /// File content, or `None` for folders.
    pub fn content(&self) -> Option<&str> {
        match self {
            Node::File(file) => Some(&file.content),
            Node::Folder(_) => None,
        }
    }

    /// Folder children; always empty for files.
    pub fn children(&self) -> &[Arc<Node>] {
        match self {
            Node::File(_) => &[],
            Node::Folder(folder) => &folder.children,
        }
    }

    /// Copy of this node with a different name. Children stay shared.
    pub fn renamed(&self, name: &str) -> Node {
        match self {
            Node::File(file) => Node::File(FileNode {
                name: name.to_string(),
                ..file.clone()
            }),
            Node::Folder(folder) => Node::Folder(FolderNode {
                name: name.to_string(),
                ..folder.clone()
            }),
        }
    }
}

/// Ordered sequence of root-level nodes.
///
/// Cloning is shallow: the clone shares every node with the original.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectTree {
    roots: Vec<Arc<Node>>,
}

impl ProjectTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_roots(roots: Vec<Arc<Node>>) -> Self {
        Self { roots }
    }

    pub fn from_nodes(nodes: Vec<Node>) -> Self {
        Self::from_roots(nodes.into_iter().map(Arc::new).collect())
    }

    pub fn roots(&self) -> &[Arc<Node>] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Arc<Node>> {
        self.roots.iter()
    }

    /// Whether a node with `id` exists anywhere in the tree.
    pub fn contains(&self, id: &NodeId) -> bool {
        crate::core::edit::find(self, id).is_some()
    }
}

impl<'a> IntoIterator for &'a ProjectTree {
    type Item = &'a Arc<Node>;
    type IntoIter = std::slice::Iter<'a, Arc<Node>>;

    fn into_iter(self) -> Self::IntoIter {
        self.roots.iter()
    }
}

/// Execution servers built on pydantic emit `null` for the absent side of a
/// node (`"children": null` on files, `"content": null` on folders).
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
