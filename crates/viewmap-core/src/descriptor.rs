//! Mapping descriptors: one sectioned source at one version.

use serde::{Deserialize, Serialize};

use viewmap_model::{MappingDiff, MappingId, VersionToken};

use crate::error::StoreError;
use crate::store::ChangeStore;

/// One group of a descriptor and the number of rows it holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupLayout {
    pub name: String,
    pub rows: usize,
}

impl GroupLayout {
    pub fn new(name: impl Into<String>, rows: usize) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }
}

/// Snapshot of one sectioned source at one store version.
///
/// Descriptors are never mutated; moving to a newer version produces a new
/// descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingDescriptor {
    id: MappingId,
    version: VersionToken,
    groups: Vec<GroupLayout>,
}

impl MappingDescriptor {
    pub fn new(id: MappingId, version: VersionToken, groups: Vec<GroupLayout>) -> Self {
        Self {
            id,
            version,
            groups,
        }
    }

    /// Shorthand for building descriptors from `(group, rows)` pairs.
    pub fn from_counts(id: MappingId, version: VersionToken, counts: &[(&str, usize)]) -> Self {
        let groups = counts
            .iter()
            .map(|(name, rows)| GroupLayout::new(*name, *rows))
            .collect();
        Self::new(id, version, groups)
    }

    pub fn id(&self) -> &MappingId {
        &self.id
    }

    pub fn version(&self) -> VersionToken {
        self.version
    }

    pub fn groups(&self) -> &[GroupLayout] {
        &self.groups
    }

    pub fn number_of_groups(&self) -> usize {
        self.groups.len()
    }

    pub fn row_count(&self, group: usize) -> Option<usize> {
        self.groups.get(group).map(|g| g.rows)
    }

    /// Group name shown at a local section.
    pub fn group(&self, section: usize) -> Option<&str> {
        self.groups.get(section).map(|g| g.name.as_str())
    }

    pub fn group_index(&self, name: &str) -> Option<usize> {
        self.groups.iter().position(|g| g.name == name)
    }

    pub fn total_rows(&self) -> usize {
        self.groups.iter().map(|g| g.rows).sum()
    }

    /// Structural changes between this descriptor's version and `to`.
    pub fn diff<S>(&self, store: &S, to: VersionToken) -> Result<MappingDiff, StoreError>
    where
        S: ChangeStore + ?Sized,
    {
        if to == self.version {
            return Ok(MappingDiff::new());
        }
        store.diff(&self.id, self.version, to)
    }

    /// Same layout, stamped with a newer version.
    ///
    /// Only valid when the store reported no changes between the two versions.
    #[must_use]
    pub fn rebased(&self, version: VersionToken) -> Self {
        Self {
            id: self.id.clone(),
            version,
            groups: self.groups.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> MappingId {
        MappingId::new(name).unwrap()
    }

    #[test]
    fn queries_groups() {
        let descriptor = MappingDescriptor::from_counts(
            id("matches"),
            VersionToken::new(3),
            &[("live", 2), ("upcoming", 5)],
        );
        assert_eq!(descriptor.number_of_groups(), 2);
        assert_eq!(descriptor.row_count(1), Some(5));
        assert_eq!(descriptor.row_count(2), None);
        assert_eq!(descriptor.group(0), Some("live"));
        assert_eq!(descriptor.group_index("upcoming"), Some(1));
        assert_eq!(descriptor.total_rows(), 7);
    }

    #[test]
    fn rebased_keeps_layout() {
        let descriptor =
            MappingDescriptor::from_counts(id("matches"), VersionToken::new(3), &[("live", 2)]);
        let next = descriptor.rebased(VersionToken::new(7));
        assert_eq!(next.version(), VersionToken::new(7));
        assert_eq!(next.groups(), descriptor.groups());
    }
}
