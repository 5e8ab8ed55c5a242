//! Flattened `path -> content` view of a project tree.
//!
//! Paths join node names with `/`. Files map to their content. An empty folder
//! has nothing to contribute, so it is kept as a sentinel entry whose key is
//! the folder path plus a trailing `/` and whose value is empty.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::tree::{Node, ProjectTree};

pub const SEPARATOR: char = '/';

/// Flatten the tree into a sorted `path -> content` map.
pub fn flatten(tree: &ProjectTree) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    flatten_into(tree.roots(), "", &mut out);
    out
}

fn flatten_into(nodes: &[Arc<Node>], prefix: &str, out: &mut BTreeMap<String, String>) {
    for node in nodes {
        let path = format!("{prefix}{}", node.name());
        match node.as_ref() {
            Node::File(file) => {
                out.insert(path, file.content.clone());
            }
            Node::Folder(folder) => {
                let folder_prefix = format!("{path}{SEPARATOR}");
                if folder.children.is_empty() {
                    out.insert(folder_prefix, String::new());
                } else {
                    flatten_into(&folder.children, &folder_prefix, out);
                }
            }
        }
    }
}

/// Rebuild a tree from a flattened map.
///
/// Folders are created on first use, in map order, and every node gets a fresh
/// id. A key with one trailing `/` is a sentinel for an empty folder. Empty
/// segments are kept as empty names, so `flatten` of the result reproduces
/// `entries` when they came from `flatten`.
pub fn from_flat(entries: &BTreeMap<String, String>) -> ProjectTree {
    let mut roots: Vec<Draft> = Vec::new();

    for (path, content) in entries {
        let (path, is_sentinel) = match path.strip_suffix(SEPARATOR) {
            Some(folder) => (folder, true),
            None => (path.as_str(), false),
        };
        let mut segments: Vec<&str> = path.split(SEPARATOR).collect();

        let leaf = if is_sentinel { None } else { segments.pop() };
        let mut level = &mut roots;
        for segment in segments {
            level = folder_entries(level, segment);
        }
        if let Some(name) = leaf {
            level.push(Draft::File {
                name: name.to_string(),
                content: content.clone(),
            });
        }
    }

    ProjectTree::from_nodes(roots.into_iter().map(Draft::into_node).collect())
}

enum Draft {
    File { name: String, content: String },
    Folder { name: String, entries: Vec<Draft> },
}

impl Draft {
    fn into_node(self) -> Node {
        match self {
            Draft::File { name, content } => Node::file(name, content),
            Draft::Folder { name, entries } => {
                Node::folder_with(name, entries.into_iter().map(Draft::into_node).collect())
            }
        }
    }
}

fn folder_entries<'a>(level: &'a mut Vec<Draft>, name: &str) -> &'a mut Vec<Draft> {
    let existing = level
        .iter()
        .position(|draft| matches!(draft, Draft::Folder { name: n, .. } if n == name));
    let index = match existing {
        Some(index) => index,
        None => {
            level.push(Draft::Folder {
                name: name.to_string(),
                entries: Vec::new(),
            });
            level.len() - 1
        }
    };
    match &mut level[index] {
        Draft::Folder { entries, .. } => entries,
        Draft::File { .. } => unreachable!("position only matches folders"),
    }
}
