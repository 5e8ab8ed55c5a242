//! Semantic tree invariants not expressible via JSON Schema.

use std::collections::HashSet;
use std::sync::Arc;

use crate::tree::{Node, NodeId, ProjectTree};

/// Check semantic invariants of a project tree:
/// - No duplicate ids
/// - No empty names
///
/// Sibling names may repeat; that is allowed by the model.
pub fn validate_invariants(tree: &ProjectTree) -> Vec<String> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();
    validate_nodes(tree.roots(), "", &mut seen, &mut errors);
    errors
}

fn validate_nodes<'a>(
    nodes: &'a [Arc<Node>],
    prefix: &str,
    seen: &mut HashSet<&'a NodeId>,
    errors: &mut Vec<String>,
) {
    for node in nodes {
        let path = format!("{prefix}/{}", node.name());
        if !seen.insert(node.id()) {
            errors.push(format!("duplicate id '{}' at {}", node.id(), path));
        }
        if node.name().trim().is_empty() {
            errors.push(format!("{}: empty name (id '{}')", path, node.id()));
        }
        validate_nodes(node.children(), &path, seen, errors);
    }
}
