//! Editor state: the current tree, the active file and the selected node.
//!
//! Every mutation is persisted to the [`SnapshotStore`]. Persistence failures
//! are logged and otherwise ignored; the in-memory state stays authoritative.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::core::edit::{self, find, find_root_file};
use crate::core::invariants::validate_invariants;
use crate::core::samples::default_project;
use crate::io::snapshot::{Snapshot, SnapshotStore};
use crate::tree::{Node, NodeId, ProjectTree};

#[derive(Debug)]
pub struct Workspace {
    tree: ProjectTree,
    active_file: Option<NodeId>,
    selected: Option<NodeId>,
    store: SnapshotStore,
    main_file: String,
}

impl Workspace {
    /// Restore the saved snapshot, or start from the default project.
    pub fn open(store: SnapshotStore, main_file: impl Into<String>) -> Self {
        let main_file = main_file.into();
        match store.restore() {
            Some(Snapshot {
                files,
                active_file,
                selected,
            }) => Self {
                tree: files,
                active_file,
                selected,
                store,
                main_file,
            },
            None => {
                debug!(path = %store.path().display(), "no snapshot, starting from default project");
                Self::with_tree(store, main_file, default_project())
            }
        }
    }

    /// Start from `tree` and persist it, replacing any saved snapshot.
    pub fn with_tree(store: SnapshotStore, main_file: impl Into<String>, tree: ProjectTree) -> Self {
        let mut workspace = Self {
            tree: ProjectTree::new(),
            active_file: None,
            selected: None,
            store,
            main_file: main_file.into(),
        };
        workspace.replace_tree(tree);
        workspace
    }

    pub fn tree(&self) -> &ProjectTree {
        &self.tree
    }

    pub fn active_file(&self) -> Option<&NodeId> {
        self.active_file.as_ref()
    }

    pub fn selected(&self) -> Option<&NodeId> {
        self.selected.as_ref()
    }

    pub fn main_file(&self) -> &str {
        &self.main_file
    }

    /// The node behind the active file id, if it still resolves.
    pub fn active_node(&self) -> Option<&Arc<Node>> {
        self.active_file.as_ref().and_then(|id| find(&self.tree, id))
    }

    /// Toggle selection of `id`. Selecting a file also makes it active.
    ///
    /// Returns `false` when `id` is not in the tree.
    pub fn select(&mut self, id: &NodeId) -> bool {
        let Some(node) = find(&self.tree, id) else {
            return false;
        };
        if self.selected.as_ref() == Some(id) {
            self.selected = None;
        } else {
            if node.is_file() {
                self.active_file = Some(id.clone());
            }
            self.selected = Some(id.clone());
        }
        self.persist();
        true
    }

    /// Folder new nodes go into: the selected node if it is a folder.
    fn target_folder(&self) -> Option<NodeId> {
        self.selected
            .as_ref()
            .filter(|id| find(&self.tree, id).is_some_and(|node| node.is_folder()))
            .cloned()
    }

    /// Create a file next to the selection and make it active and selected.
    pub fn create_file(&mut self, name: &str, content: &str) -> Option<NodeId> {
        let parent = self.target_folder();
        self.create_file_in(parent.as_ref(), name, content)
    }

    /// Create a folder next to the selection and select it.
    pub fn create_folder(&mut self, name: &str) -> Option<NodeId> {
        let parent = self.target_folder();
        self.create_folder_in(parent.as_ref(), name)
    }

    /// Create a file under `parent` (root when `None`).
    ///
    /// Returns `None` without changing anything when the name is blank or
    /// `parent` is not a folder of this tree.
    pub fn create_file_in(
        &mut self,
        parent: Option<&NodeId>,
        name: &str,
        content: &str,
    ) -> Option<NodeId> {
        let id = self.insert(parent, Node::file(name, content))?;
        self.active_file = Some(id.clone());
        self.selected = Some(id.clone());
        self.persist();
        Some(id)
    }

    pub fn create_folder_in(&mut self, parent: Option<&NodeId>, name: &str) -> Option<NodeId> {
        let id = self.insert(parent, Node::folder(name))?;
        self.selected = Some(id.clone());
        self.persist();
        Some(id)
    }

    fn insert(&mut self, parent: Option<&NodeId>, node: Node) -> Option<NodeId> {
        if node.name().trim().is_empty() {
            return None;
        }
        if let Some(parent) = parent
            && !find(&self.tree, parent).is_some_and(|target| target.is_folder())
        {
            debug!(%parent, "insert target is not a folder");
            return None;
        }
        let id = node.id().clone();
        self.tree = edit::insert(&self.tree, parent, node);
        Some(id)
    }

    /// Delete `id` and its subtree. Clears the active file and the selection
    /// when they no longer resolve.
    pub fn delete(&mut self, id: &NodeId) -> bool {
        if !self.tree.contains(id) {
            return false;
        }
        self.tree = edit::delete(&self.tree, id);
        self.drop_dangling();
        self.persist();
        true
    }

    /// Rename `id`. A blank or unchanged name is ignored.
    pub fn rename(&mut self, id: &NodeId, name: &str) -> bool {
        let Some(node) = find(&self.tree, id) else {
            return false;
        };
        if name.trim().is_empty() || node.name() == name {
            return false;
        }
        self.tree = edit::rename(&self.tree, id, name);
        self.persist();
        true
    }

    /// Replace the content of file `id`. Folders are left alone.
    pub fn update_content(&mut self, id: &NodeId, content: &str) -> bool {
        if !find(&self.tree, id).is_some_and(|node| node.is_file()) {
            return false;
        }
        self.tree = edit::update_content(&self.tree, id, content);
        self.persist();
        true
    }

    /// Replace the content of the active file.
    pub fn edit_active(&mut self, content: &str) -> bool {
        match self.active_file.clone() {
            Some(id) => self.update_content(&id, content),
            None => false,
        }
    }

    /// Swap in a whole new tree (import, sample, run result).
    ///
    /// Old ids are meaningless in the new tree: the active file is re-resolved
    /// by name among the root files, and the selection is cleared.
    pub fn replace_tree(&mut self, tree: ProjectTree) {
        self.active_file = find_root_file(&tree, &self.main_file).map(|node| node.id().clone());
        self.selected = None;
        self.tree = tree;
        self.persist();
    }

    /// Accept the tree returned by a completed run.
    pub fn apply_result(&mut self, tree: ProjectTree) {
        let errors = validate_invariants(&tree);
        if !errors.is_empty() {
            warn!(errors = %errors.join("; "), "execution server returned an inconsistent tree");
        }
        self.replace_tree(tree);
    }

    fn drop_dangling(&mut self) {
        for slot in [&mut self.active_file, &mut self.selected] {
            if slot.as_ref().is_some_and(|id| !self.tree.contains(id)) {
                *slot = None;
            }
        }
    }

    fn persist(&self) {
        let snapshot = Snapshot {
            files: self.tree.clone(),
            active_file: self.active_file.clone(),
            selected: self.selected.clone(),
        };
        if let Err(err) = self.store.save(&snapshot) {
            warn!(path = %self.store.path().display(), error = %format!("{err:#}"), "failed to save snapshot");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::core::samples::sample;
    use crate::test_support::{nested_project, temp_project};

    fn store_in(dir: &std::path::Path) -> SnapshotStore {
        SnapshotStore::new(dir.join(".playground/tree.json"))
    }

    #[test]
    fn open_without_snapshot_uses_default_project() {
        let temp = temp_project();
        let workspace = Workspace::open(store_in(temp.path()), "main.dingle");
        assert_eq!(workspace.tree().len(), 1);
        assert_eq!(
            workspace.active_node().map(|node| node.name()),
            Some("main.dingle")
        );
        assert!(temp.path().join(".playground/tree.json").exists());
    }

    #[test]
    fn mutations_survive_reopen() {
        let temp = temp_project();
        let mut workspace = Workspace::open(store_in(temp.path()), "main.dingle");
        let folder = workspace.create_folder("lib").expect("folder");
        let file = workspace
            .create_file("util.dingle", "define u() {}")
            .expect("file");

        let reopened = Workspace::open(store_in(temp.path()), "main.dingle");
        assert_eq!(reopened.tree(), workspace.tree());
        assert_eq!(reopened.active_file(), Some(&file));
        assert_eq!(reopened.selected(), Some(&file));
        assert_eq!(
            find(reopened.tree(), &folder).map(|node| node.children().len()),
            Some(1)
        );
    }

    #[test]
    fn corrupt_snapshot_falls_back_to_default() {
        let temp = temp_project();
        let store = store_in(temp.path());
        fs::create_dir_all(temp.path().join(".playground")).expect("mkdir");
        fs::write(store.path(), "garbage").expect("write");

        let workspace = Workspace::open(store, "main.dingle");
        assert_eq!(workspace.tree().roots()[0].name(), "main.dingle");
    }

    #[test]
    fn select_toggles_and_tracks_active_file() {
        let temp = temp_project();
        let mut workspace =
            Workspace::with_tree(store_in(temp.path()), "main.dingle", nested_project());
        let lib = workspace.tree().roots()[1].id().clone();
        let util = workspace.tree().roots()[1].children()[0].id().clone();

        assert!(workspace.select(&util));
        assert_eq!(workspace.active_file(), Some(&util));
        assert!(workspace.select(&lib));
        assert_eq!(workspace.selected(), Some(&lib));
        assert_eq!(workspace.active_file(), Some(&util));
        assert!(workspace.select(&lib));
        assert_eq!(workspace.selected(), None);
        assert!(!workspace.select(&NodeId::new("missing")));
    }

    #[test]
    fn create_goes_into_selected_folder_only() {
        let temp = temp_project();
        let mut workspace =
            Workspace::with_tree(store_in(temp.path()), "main.dingle", nested_project());
        let main = workspace.tree().roots()[0].id().clone();

        workspace.select(&main);
        workspace.create_file("top.dingle", "").expect("file");
        assert_eq!(workspace.tree().len(), 4);

        let lib = workspace.tree().roots()[1].id().clone();
        workspace.select(&lib);
        workspace.create_file("inner.dingle", "").expect("file");
        assert_eq!(workspace.tree().roots()[1].children().len(), 2);

        assert_eq!(workspace.create_file("   ", ""), None);
        assert_eq!(workspace.create_file_in(Some(&main), "x", ""), None);
    }

    #[test]
    fn deleting_folder_clears_contained_active_file() {
        let temp = temp_project();
        let mut workspace =
            Workspace::with_tree(store_in(temp.path()), "main.dingle", nested_project());
        let lib = workspace.tree().roots()[1].id().clone();
        let util = workspace.tree().roots()[1].children()[0].id().clone();
        workspace.select(&util);

        assert!(workspace.delete(&lib));
        assert_eq!(workspace.active_file(), None);
        assert_eq!(workspace.selected(), None);
        assert!(!workspace.delete(&lib));
    }

    #[test]
    fn rename_ignores_blank_and_unchanged_names() {
        let temp = temp_project();
        let mut workspace = Workspace::open(store_in(temp.path()), "main.dingle");
        let main = workspace.tree().roots()[0].id().clone();
        assert!(!workspace.rename(&main, ""));
        assert!(!workspace.rename(&main, "main.dingle"));
        assert!(workspace.rename(&main, "start.dingle"));
        assert_eq!(workspace.tree().roots()[0].name(), "start.dingle");
    }

    #[test]
    fn edit_active_updates_file_content() {
        let temp = temp_project();
        let mut workspace = Workspace::open(store_in(temp.path()), "main.dingle");
        assert!(workspace.edit_active("print 42;"));
        assert_eq!(
            workspace.active_node().and_then(|node| node.content()),
            Some("print 42;")
        );
    }

    #[test]
    fn apply_result_re_resolves_main_file() {
        let temp = temp_project();
        let mut workspace =
            Workspace::with_tree(store_in(temp.path()), "main.dingle", nested_project());
        let lib = workspace.tree().roots()[1].id().clone();
        workspace.select(&lib);

        let returned = sample("algorithms").expect("sample");
        let main = returned.roots()[0].id().clone();
        workspace.apply_result(returned);
        assert_eq!(workspace.active_file(), Some(&main));
        assert_eq!(workspace.selected(), None);

        workspace.apply_result(ProjectTree::from_nodes(vec![Node::folder_with(
            "src",
            vec![Node::file("main.dingle", "")],
        )]));
        assert_eq!(workspace.active_file(), None);
    }
}
