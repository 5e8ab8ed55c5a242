//! Import a project from a directory and export one onto disk.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::debug;

use crate::core::flat::{SEPARATOR, flatten, from_flat};
use crate::tree::ProjectTree;

/// Content recorded for files that are not valid UTF-8.
pub const BINARY_PLACEHOLDER: &str = "[Binary or Non-UTF8]";

/// Build a tree from the directory at `root`, with fresh ids.
///
/// Entries are visited in name order and hidden entries (leading `.`) are
/// skipped. Empty directories become empty folders.
pub fn import_dir(root: &Path) -> Result<ProjectTree> {
    let mut entries = BTreeMap::new();
    collect(root, "", &mut entries)?;
    debug!(root = %root.display(), entries = entries.len(), "imported directory");
    Ok(from_flat(&entries))
}

fn collect(dir: &Path, prefix: &str, entries: &mut BTreeMap<String, String>) -> Result<()> {
    let mut children = fs::read_dir(dir)
        .with_context(|| format!("read directory {}", dir.display()))?
        .collect::<std::io::Result<Vec<_>>>()
        .with_context(|| format!("list directory {}", dir.display()))?;
    children.sort_by_key(fs::DirEntry::file_name);

    let mut empty = true;
    for child in children {
        let Some(name) = child.file_name().to_str().map(str::to_string) else {
            debug!(path = %child.path().display(), "skipping non-utf8 file name");
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        empty = false;
        let path = child.path();
        let key = format!("{prefix}{name}");
        if child
            .file_type()
            .with_context(|| format!("stat {}", path.display()))?
            .is_dir()
        {
            collect(&path, &format!("{key}{SEPARATOR}"), entries)?;
        } else {
            let bytes = fs::read(&path).with_context(|| format!("read {}", path.display()))?;
            let content = String::from_utf8(bytes).unwrap_or_else(|_| BINARY_PLACEHOLDER.to_string());
            entries.insert(key, content);
        }
    }
    if empty && !prefix.is_empty() {
        entries.insert(prefix.to_string(), String::new());
    }
    Ok(())
}

/// Write every file of `tree` under `root` and create its empty folders.
///
/// Returns the number of files written. Paths that would escape `root` are
/// refused before anything is written.
pub fn export_dir(tree: &ProjectTree, root: &Path) -> Result<usize> {
    let entries = flatten(tree);
    let mut plan = Vec::with_capacity(entries.len());
    for (key, content) in &entries {
        let is_folder = key.ends_with(SEPARATOR);
        plan.push((safe_join(root, key.trim_end_matches(SEPARATOR))?, is_folder, content));
    }

    let mut written = 0;
    for (path, is_folder, content) in plan {
        if is_folder {
            fs::create_dir_all(&path)
                .with_context(|| format!("create directory {}", path.display()))?;
            continue;
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        fs::write(&path, content).with_context(|| format!("write {}", path.display()))?;
        written += 1;
    }
    Ok(written)
}

fn safe_join(root: &Path, relative: &str) -> Result<PathBuf> {
    let mut path = root.to_path_buf();
    for segment in relative.split(SEPARATOR) {
        let mut components = Path::new(segment).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(part)), None) => path.push(part),
            _ => bail!("refusing to export unsafe path '{relative}'"),
        }
    }
    Ok(path)
}
