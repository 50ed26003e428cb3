//! Structural diffs reported by a store for one descriptor between two versions.
//!
//! Coordinates follow the usual batching convention: anything that existed
//! before the update (deletes, move sources, update sources) is expressed in
//! the old layout, anything that exists afterwards in the new layout.

use serde::{Deserialize, Serialize};

use crate::coordinate::GroupPath;

/// A whole group appearing or disappearing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SectionChange {
    /// `index` is the group's position in the new layout.
    Insert { group: String, index: usize },
    /// `index` is the group's position in the old layout.
    Delete { group: String, index: usize },
}

impl SectionChange {
    pub fn group(&self) -> &str {
        match self {
            Self::Insert { group, .. } | Self::Delete { group, .. } => group,
        }
    }
}

/// A single row changing.
///
/// `group` names the group the row originated from (for inserts, the group it
/// lands in).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RowChange {
    Insert {
        group: String,
        new: GroupPath,
    },
    Delete {
        group: String,
        old: GroupPath,
    },
    Move {
        group: String,
        old: GroupPath,
        new: GroupPath,
    },
    Update {
        group: String,
        old: GroupPath,
        new: GroupPath,
    },
}

impl RowChange {
    pub fn group(&self) -> &str {
        match self {
            Self::Insert { group, .. }
            | Self::Delete { group, .. }
            | Self::Move { group, .. }
            | Self::Update { group, .. } => group,
        }
    }

    /// Position before the update, if the row existed.
    pub fn old_path(&self) -> Option<GroupPath> {
        match self {
            Self::Insert { .. } => None,
            Self::Delete { old, .. } | Self::Move { old, .. } | Self::Update { old, .. } => {
                Some(*old)
            }
        }
    }

    /// Position after the update, if the row still exists.
    pub fn new_path(&self) -> Option<GroupPath> {
        match self {
            Self::Delete { .. } => None,
            Self::Insert { new, .. } | Self::Move { new, .. } | Self::Update { new, .. } => {
                Some(*new)
            }
        }
    }
}

/// Everything that changed in one descriptor between two versions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingDiff {
    pub section_changes: Vec<SectionChange>,
    pub row_changes: Vec<RowChange>,
}

impl MappingDiff {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.section_changes.is_empty() && self.row_changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.section_changes.len() + self.row_changes.len()
    }

    #[must_use]
    pub fn with_section(mut self, change: SectionChange) -> Self {
        self.section_changes.push(change);
        self
    }

    #[must_use]
    pub fn with_row(mut self, change: RowChange) -> Self {
        self.row_changes.push(change);
        self
    }
}
