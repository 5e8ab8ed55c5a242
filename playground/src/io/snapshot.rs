//! Local snapshot of the project tree and editor selection.
//!
//! The snapshot is a JSON file written atomically after every workspace
//! mutation. Loads are checked against the embedded JSON Schema and the tree
//! invariants; [`SnapshotStore::restore`] treats any failure as "nothing
//! saved".

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use jsonschema::validator_for;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::core::invariants::validate_invariants;
use crate::io::config::write_atomic;
use crate::tree::{NodeId, ProjectTree};

pub const SNAPSHOT_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/schemas/snapshot/v1.schema.json"
));

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub files: ProjectTree,
    #[serde(default)]
    pub active_file: Option<NodeId>,
    #[serde(default)]
    pub selected: Option<NodeId>,
}

impl Snapshot {
    pub fn new(files: ProjectTree) -> Self {
        Self {
            files,
            active_file: None,
            selected: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and validate the snapshot. `Ok(None)` when no snapshot exists.
    ///
    /// Selection ids that no longer resolve in the tree are dropped.
    pub fn load(&self) -> Result<Option<Snapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("read snapshot {}", self.path.display()))?;
        let value: Value = serde_json::from_str(&contents)
            .with_context(|| format!("parse snapshot {}", self.path.display()))?;
        validate_schema(&value)?;
        let mut snapshot: Snapshot = serde_json::from_value(value)
            .with_context(|| format!("deserialize snapshot {}", self.path.display()))?;
        let errors = validate_invariants(&snapshot.files);
        if !errors.is_empty() {
            return Err(anyhow!("snapshot invariants failed: {}", errors.join("; ")));
        }

        for slot in [&mut snapshot.active_file, &mut snapshot.selected] {
            if slot.as_ref().is_some_and(|id| !snapshot.files.contains(id)) {
                debug!(id = ?slot, "dropping dangling snapshot selection");
                *slot = None;
            }
        }
        Ok(Some(snapshot))
    }

    /// Like [`load`](Self::load), but a corrupt or unreadable snapshot is
    /// logged and reported as absent.
    pub fn restore(&self) -> Option<Snapshot> {
        match self.load() {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(path = %self.path.display(), error = %format!("{err:#}"), "ignoring unusable snapshot");
                None
            }
        }
    }

    /// Atomically replace the snapshot file.
    pub fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let mut buf = serde_json::to_string_pretty(snapshot).context("serialize snapshot")?;
        buf.push('\n');
        write_atomic(&self.path, &buf)
    }
}

fn validate_schema(instance: &Value) -> Result<()> {
    let schema: Value = serde_json::from_str(SNAPSHOT_SCHEMA).context("parse snapshot schema")?;
    let compiled = validator_for(&schema).map_err(|err| anyhow!("invalid schema: {}", err))?;
    if !compiled.is_valid(instance) {
        let messages = compiled
            .iter_errors(instance)
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        return Err(anyhow!(
            "snapshot schema validation failed: {}",
            messages.join("; ")
        ));
    }
    Ok(())
}
