//! Copy-on-write edits over [`ProjectTree`].
//!
//! Every mutator rebuilds only the chain of folders from the root down to the
//! target node. Siblings along that chain, and everything below them, are the
//! same `Arc`s as in the input tree. When the target is missing (or the edit
//! does not apply to it) the input tree is returned as a shallow clone.

use std::sync::Arc;

use crate::tree::{FileNode, FolderNode, Node, NodeId, ProjectTree};

/// What to do with the node an edit resolved to.
enum Change {
    Keep,
    Replace(Node),
    Remove,
}

/// Find the node with `id` anywhere in the tree (depth-first).
pub fn find<'a>(tree: &'a ProjectTree, id: &NodeId) -> Option<&'a Arc<Node>> {
    find_in(tree.roots(), id)
}

fn find_in<'a>(nodes: &'a [Arc<Node>], id: &NodeId) -> Option<&'a Arc<Node>> {
    for node in nodes {
        if node.id() == id {
            return Some(node);
        }
        if let Some(found) = find_in(node.children(), id) {
            return Some(found);
        }
    }
    None
}

/// Root-level file named `name`, if any.
///
/// Used to re-resolve the well-known entry file after the execution server
/// hands back a tree with regenerated ids.
pub fn find_root_file<'a>(tree: &'a ProjectTree, name: &str) -> Option<&'a Arc<Node>> {
    tree.iter().find(|node| node.is_file() && node.name() == name)
}

/// Append `node` to the root sequence (`parent = None`) or to the children of
/// the folder `parent`.
///
/// An unknown parent, or a parent that is a file, leaves the tree unchanged.
/// Callers that care should check the parent with [`find`] first.
pub fn insert(tree: &ProjectTree, parent: Option<&NodeId>, node: Node) -> ProjectTree {
    let node = Arc::new(node);
    let Some(parent) = parent else {
        let mut roots = tree.roots().to_vec();
        roots.push(node);
        return ProjectTree::from_roots(roots);
    };

    apply(tree, parent, |target| match target {
        Node::Folder(folder) => {
            let mut children = folder.children.clone();
            children.push(Arc::clone(&node));
            Change::Replace(Node::Folder(FolderNode {
                children,
                ..folder.clone()
            }))
        }
        Node::File(_) => Change::Keep,
    })
}

/// Remove the node with `id` (and its subtree) from wherever it lives.
pub fn delete(tree: &ProjectTree, id: &NodeId) -> ProjectTree {
    apply(tree, id, |_| Change::Remove)
}

/// Change the name of the node with `id`. Sibling names are not checked.
pub fn rename(tree: &ProjectTree, id: &NodeId, name: &str) -> ProjectTree {
    apply(tree, id, |target| Change::Replace(target.renamed(name)))
}

/// Replace the content of the file with `id`. Folders are left unchanged.
pub fn update_content(tree: &ProjectTree, id: &NodeId, content: &str) -> ProjectTree {
    apply(tree, id, |target| match target {
        Node::File(file) => Change::Replace(Node::File(FileNode {
            content: content.to_string(),
            ..file.clone()
        })),
        Node::Folder(_) => Change::Keep,
    })
}

fn apply<F>(tree: &ProjectTree, id: &NodeId, mut change: F) -> ProjectTree
where
    F: FnMut(&Node) -> Change,
{
    match rebuild(tree.roots(), id, &mut change) {
        Some(roots) => ProjectTree::from_roots(roots),
        None => tree.clone(),
    }
}

/// Rebuild `nodes` with the change applied to the node `id`.
///
/// Returns `None` when nothing changed so the caller can keep its own `Arc`s.
fn rebuild<F>(nodes: &[Arc<Node>], id: &NodeId, change: &mut F) -> Option<Vec<Arc<Node>>>
where
    F: FnMut(&Node) -> Change,
{
    for (index, node) in nodes.iter().enumerate() {
        if node.id() == id {
            let mut out = nodes.to_vec();
            match change(node.as_ref()) {
                Change::Keep => return None,
                Change::Replace(replacement) => out[index] = Arc::new(replacement),
                Change::Remove => {
                    out.remove(index);
                }
            }
            return Some(out);
        }

        if let Node::Folder(folder) = node.as_ref()
            && let Some(children) = rebuild(&folder.children, id, change)
        {
            let mut out = nodes.to_vec();
            out[index] = Arc::new(Node::Folder(FolderNode {
                id: folder.id.clone(),
                name: folder.name.clone(),
                children,
            }));
            return Some(out);
        }
    }
    None
}
