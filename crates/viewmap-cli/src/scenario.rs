//! Scenario files: the initial store contents, the mappings a view shows, and
//! a script of steps to replay.
//!
//! ```json
//! {
//!   "sources": [{ "id": "inbox", "groups": [{ "name": "today", "rows": ["a"] }] }],
//!   "mappings": ["inbox"],
//!   "steps": [
//!     { "commit": [{ "op": "insert_row", "source": "inbox", "group": "today", "index": 0, "key": "b" }] },
//!     "pause",
//!     "resume"
//!   ]
//! }
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use viewmap_core::{ChangeStore, MapperConfig};
use viewmap_model::{MappingId, VersionToken};
use viewmap_store::{MemoryStore, StoreConfig, Transaction, TransactionError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub mapper: MapperConfig,
    #[serde(default)]
    pub store: StoreConfig,
    /// Columns of the grid view when replayed with `--sink grid`.
    #[serde(default = "default_grid_columns")]
    pub grid_columns: usize,
    #[serde(default)]
    pub sources: Vec<SourceSpec>,
    /// Mappings active when the view is first shown, in display order.
    pub mappings: Vec<MappingId>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

fn default_grid_columns() -> usize {
    3
}

fn animated() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceSpec {
    pub id: MappingId,
    #[serde(default)]
    pub groups: Vec<GroupSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupSpec {
    pub name: String,
    /// Row keys, top to bottom.
    #[serde(default)]
    pub rows: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Edits committed to the store as one version.
    Commit(Vec<Edit>),
    Pause,
    Resume,
    InsertMapping {
        id: MappingId,
        index: usize,
        #[serde(default = "animated")]
        animated: bool,
    },
    RemoveMapping {
        id: MappingId,
        #[serde(default = "animated")]
        animated: bool,
    },
    SetActiveMappings {
        ids: Vec<MappingId>,
        #[serde(default = "animated")]
        animated: bool,
    },
    SetAnimate(bool),
    /// Releases the view; the mapper keeps running without it.
    DropView,
}

impl Step {
    /// Short description used in logs and reports.
    pub fn label(&self) -> String {
        match self {
            Self::Commit(edits) => match edits.as_slice() {
                [edit] => format!("commit {}", edit.label()),
                _ => format!("commit {} edits", edits.len()),
            },
            Self::Pause => "pause".to_string(),
            Self::Resume => "resume".to_string(),
            Self::InsertMapping { id, index, .. } => format!("insert_mapping {id} at {index}"),
            Self::RemoveMapping { id, .. } => format!("remove_mapping {id}"),
            Self::SetActiveMappings { ids, .. } => {
                let ids: Vec<&str> = ids.iter().map(MappingId::as_str).collect();
                format!("set_active_mappings [{}]", ids.join(", "))
            }
            Self::SetAnimate(animate) => format!("set_animate {animate}"),
            Self::DropView => "drop_view".to_string(),
        }
    }
}

/// One store mutation inside a commit step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Edit {
    CreateSource {
        source: MappingId,
    },
    InsertGroup {
        source: MappingId,
        group: String,
        index: usize,
    },
    RemoveGroup {
        source: MappingId,
        group: String,
    },
    InsertRow {
        source: MappingId,
        group: String,
        index: usize,
        key: String,
    },
    RemoveRow {
        source: MappingId,
        key: String,
    },
    MoveRow {
        source: MappingId,
        key: String,
        group: String,
        index: usize,
    },
    TouchRow {
        source: MappingId,
        key: String,
    },
}

impl Edit {
    pub fn apply(&self, txn: &mut Transaction<'_>) -> Result<(), TransactionError> {
        match self {
            Self::CreateSource { source } => txn.create_source(source),
            Self::InsertGroup {
                source,
                group,
                index,
            } => txn.insert_group(source, group, *index),
            Self::RemoveGroup { source, group } => txn.remove_group(source, group),
            Self::InsertRow {
                source,
                group,
                index,
                key,
            } => txn.insert_row(source, group, *index, key),
            Self::RemoveRow { source, key } => txn.remove_row(source, key),
            Self::MoveRow {
                source,
                key,
                group,
                index,
            } => txn.move_row(source, key, group, *index),
            Self::TouchRow { source, key } => txn.touch_row(source, key),
        }
    }

    fn label(&self) -> String {
        match self {
            Self::CreateSource { source } => format!("create_source {source}"),
            Self::InsertGroup { source, group, .. } => format!("insert_group {source}/{group}"),
            Self::RemoveGroup { source, group } => format!("remove_group {source}/{group}"),
            Self::InsertRow { source, key, .. } => format!("insert_row {source}/{key}"),
            Self::RemoveRow { source, key } => format!("remove_row {source}/{key}"),
            Self::MoveRow {
                source, key, group, ..
            } => format!("move_row {source}/{key} to {group}"),
            Self::TouchRow { source, key } => format!("touch_row {source}/{key}"),
        }
    }
}

/// What a scenario contains, as counted by [`Scenario::validate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScenarioStats {
    pub sources: usize,
    pub groups: usize,
    pub rows: usize,
    pub mappings: usize,
    pub steps: usize,
    pub commits: usize,
    pub edits: usize,
    /// Store version after every commit has been applied.
    pub final_version: VersionToken,
}

impl Scenario {
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("read scenario {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("parse scenario {}", path.display()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// A store holding the initial sources, committed as the first version.
    pub fn seed_store(&self) -> Result<MemoryStore, TransactionError> {
        let store = MemoryStore::new(self.store.clone());
        store.commit(|txn| {
            for source in &self.sources {
                txn.create_source(&source.id)?;
                for (index, group) in source.groups.iter().enumerate() {
                    txn.insert_group(&source.id, &group.name, index)?;
                    for (row, key) in group.rows.iter().enumerate() {
                        txn.insert_row(&source.id, &group.name, row, key)?;
                    }
                }
            }
            Ok(())
        })?;
        Ok(store)
    }

    /// Checks the whole script without a view: every commit must apply and
    /// every mapping step must name sources that exist at that point.
    pub fn validate(&self) -> Result<ScenarioStats> {
        if self.grid_columns == 0 {
            bail!("grid_columns must be at least 1");
        }
        let store = self.seed_store().context("seed store")?;
        let mut stats = ScenarioStats {
            sources: self.sources.len(),
            groups: self.sources.iter().map(|s| s.groups.len()).sum(),
            rows: self
                .sources
                .iter()
                .flat_map(|s| &s.groups)
                .map(|g| g.rows.len())
                .sum(),
            mappings: self.mappings.len(),
            steps: self.steps.len(),
            ..ScenarioStats::default()
        };

        let mut active = Vec::new();
        require_mappings(&store, &mut active, &self.mappings).context("initial mappings")?;

        for (index, step) in self.steps.iter().enumerate() {
            let number = index + 1;
            match step {
                Step::Commit(edits) => {
                    store
                        .commit(|txn| edits.iter().try_for_each(|edit| edit.apply(txn)))
                        .with_context(|| format!("step {number}: {}", step.label()))?;
                    stats.commits += 1;
                    stats.edits += edits.len();
                }
                Step::InsertMapping { id, index, .. } => {
                    if active.contains(id) {
                        bail!("step {number}: mapping '{id}' is already active");
                    }
                    if *index > active.len() {
                        bail!(
                            "step {number}: insert index {index} is out of bounds (active mappings: {})",
                            active.len()
                        );
                    }
                    require_source(&store, id).with_context(|| format!("step {number}"))?;
                    active.insert(*index, id.clone());
                }
                Step::RemoveMapping { id, .. } => {
                    let Some(position) = active.iter().position(|m| m == id) else {
                        bail!("step {number}: mapping '{id}' is not active");
                    };
                    active.remove(position);
                }
                Step::SetActiveMappings { ids, .. } => {
                    require_mappings(&store, &mut active, ids)
                        .with_context(|| format!("step {number}"))?;
                }
                Step::Pause | Step::Resume | Step::SetAnimate(_) | Step::DropView => {}
            }
        }
        stats.final_version = store.current_version();
        Ok(stats)
    }
}

fn require_source(store: &MemoryStore, id: &MappingId) -> Result<()> {
    store.snapshot(id, store.current_version())?;
    Ok(())
}

fn require_mappings(
    store: &MemoryStore,
    active: &mut Vec<MappingId>,
    ids: &[MappingId],
) -> Result<()> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            bail!("mapping '{id}' is listed twice");
        }
        if !active.contains(id) {
            require_source(store, id)?;
        }
    }
    *active = ids.to_vec();
    Ok(())
}
