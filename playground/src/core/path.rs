//! Helpers for rendering node paths.

use std::sync::Arc;

use crate::tree::{Node, NodeId, ProjectTree};

/// Return the `/`-separated name path to `target`, or `None` if it is absent.
pub fn path_of(tree: &ProjectTree, target: &NodeId) -> Option<String> {
    let mut path = Vec::new();
    if path_inner(tree.roots(), target, &mut path) {
        return Some(path.join("/"));
    }
    None
}

fn path_inner<'a>(nodes: &'a [Arc<Node>], target: &NodeId, path: &mut Vec<&'a str>) -> bool {
    for node in nodes {
        path.push(node.name());
        if node.id() == target || path_inner(node.children(), target, path) {
            return true;
        }
        path.pop();
    }
    false
}
