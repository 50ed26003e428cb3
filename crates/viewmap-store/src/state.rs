//! Contents of the store at one version.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use viewmap_core::{GroupLayout, MappingDescriptor};
use viewmap_model::{GroupPath, MappingId, VersionToken};

/// One keyed row. `revision` grows every time the row's content changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub key: String,
    pub revision: u64,
}

impl Row {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            revision: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    pub rows: Vec<Row>,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: Vec::new(),
        }
    }
}

/// One named source: ordered groups of rows. Row keys are unique across the
/// whole source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceState {
    pub groups: Vec<Group>,
}

impl SourceState {
    pub fn group_index(&self, name: &str) -> Option<usize> {
        self.groups.iter().position(|g| g.name == name)
    }

    /// Where the row with `key` sits.
    pub fn locate(&self, key: &str) -> Option<GroupPath> {
        self.groups.iter().enumerate().find_map(|(group, g)| {
            g.rows
                .iter()
                .position(|row| row.key == key)
                .map(|row| GroupPath::new(group, row))
        })
    }

    pub fn row(&self, path: GroupPath) -> Option<&Row> {
        self.groups.get(path.group)?.rows.get(path.row)
    }

    pub fn row_count(&self) -> usize {
        self.groups.iter().map(|g| g.rows.len()).sum()
    }

    /// The layout a view sees of this source at `version`.
    pub fn describe(&self, id: MappingId, version: VersionToken) -> MappingDescriptor {
        let groups = self
            .groups
            .iter()
            .map(|g| GroupLayout::new(g.name.clone(), g.rows.len()))
            .collect();
        MappingDescriptor::new(id, version, groups)
    }
}

/// Every source, at one version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreState {
    pub sources: BTreeMap<MappingId, SourceState>,
}

impl StoreState {
    pub fn source(&self, id: &MappingId) -> Option<&SourceState> {
        self.sources.get(id)
    }
}
