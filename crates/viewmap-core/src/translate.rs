//! Change translator: per-descriptor diffs to one flat-space batch.
//!
//! # Coordinate rule
//!
//! Anything that existed before the update (deleted sections and items, move
//! sources, reloads) is resolved against the **old** index; anything that
//! exists afterwards (inserted sections and items, move destinations) against
//! the **new** index. List views require exactly this split within one batch.
//!
//! # Exclusions
//!
//! Item changes inside a section that is itself deleted or inserted are not
//! reported separately. A move out of a deleted section becomes an insert, a
//! move into an inserted section becomes a delete.
//!
//! # Reload after move
//!
//! When the same item is both moved and updated, the move is kept and the
//! reload addresses the move destination, emitted after all moves. This holds
//! whichever order the diff lists the two changes in.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use tracing::trace;

use viewmap_model::utils::longest_increasing_subsequence;
use viewmap_model::{Coordinate, GroupPath, MappingDiff, MappingId, RowChange, SectionChange};

use crate::changeset::{PendingChangeSet, ReloadReason, UpdateBatch};
use crate::descriptor::MappingDescriptor;
use crate::error::{IndexError, TranslateError};
use crate::index::CombinedSectionIndex;

/// Everything one translation looks at.
#[derive(Debug, Clone, Copy)]
pub struct TranslateInput<'a> {
    /// Layout currently shown, `None` when nothing has been shown yet.
    pub old_index: Option<&'a CombinedSectionIndex>,
    pub old_mappings: &'a [MappingDescriptor],
    /// Diffs of descriptors that changed; a missing entry means unchanged.
    pub diffs: &'a BTreeMap<MappingId, MappingDiff>,
    pub new_mappings: &'a [MappingDescriptor],
    pub new_index: &'a CombinedSectionIndex,
    pub animate: bool,
}

pub fn translate(input: &TranslateInput<'_>) -> Result<UpdateBatch, TranslateError> {
    let Some(old_index) = input.old_index else {
        return Ok(UpdateBatch::FullReload(ReloadReason::NoBaseline));
    };
    if is_unchanged(input, old_index) {
        return Ok(UpdateBatch::Changes(PendingChangeSet::new()));
    }
    if !input.animate {
        return Ok(UpdateBatch::FullReload(ReloadReason::AnimationDisabled));
    }

    let mut changes = PendingChangeSet::new();
    let kept = kept_mappings(input.old_mappings, input.new_mappings);

    for descriptor in input.old_mappings {
        if kept.contains(descriptor.id()) {
            continue;
        }
        let range = old_index
            .section_range(descriptor.id())
            .ok_or_else(|| not_active(descriptor.id()))?;
        changes.deleted_sections.extend(range);
    }
    for descriptor in input.new_mappings {
        if kept.contains(descriptor.id()) {
            continue;
        }
        let range = input
            .new_index
            .section_range(descriptor.id())
            .ok_or_else(|| not_active(descriptor.id()))?;
        changes.inserted_sections.extend(range);
    }

    for descriptor in input.new_mappings {
        if !kept.contains(descriptor.id()) {
            continue;
        }
        let Some(diff) = input.diffs.get(descriptor.id()) else {
            continue;
        };
        trace!(
            mapping = %descriptor.id(),
            sections = diff.section_changes.len(),
            rows = diff.row_changes.len(),
            "Translating diff"
        );
        DiffTranslator {
            mapping: descriptor.id(),
            old_index,
            new_index: input.new_index,
            changes: &mut changes,
        }
        .translate(diff)?;
    }

    changes.validate(old_index, input.new_index)?;
    Ok(UpdateBatch::Changes(changes))
}

/// Same descriptors in the same order and layout, none of them with changes.
fn is_unchanged(input: &TranslateInput<'_>, old_index: &CombinedSectionIndex) -> bool {
    old_index.row_counts() == input.new_index.row_counts()
        && input.old_mappings.len() == input.new_mappings.len()
        && input
            .old_mappings
            .iter()
            .zip(input.new_mappings)
            .all(|(old, new)| old.id() == new.id())
        && input.diffs.values().all(MappingDiff::is_empty)
}

/// Descriptors present in both lists whose relative order survived.
///
/// Everything else in the old list is removed and everything else in the new
/// list is inserted, so a reordered descriptor is removed and re-inserted.
fn kept_mappings<'a>(
    old: &'a [MappingDescriptor],
    new: &'a [MappingDescriptor],
) -> HashSet<&'a MappingId> {
    let old_positions: HashMap<&MappingId, usize> = old
        .iter()
        .enumerate()
        .map(|(pos, d)| (d.id(), pos))
        .collect();
    let common: Vec<(&MappingId, usize)> = new
        .iter()
        .filter_map(|d| old_positions.get(d.id()).map(|&pos| (d.id(), pos)))
        .collect();
    let order: Vec<usize> = common.iter().map(|(_, pos)| *pos).collect();
    longest_increasing_subsequence(&order)
        .into_iter()
        .map(|at| common[at].0)
        .collect()
}

fn not_active(mapping: &MappingId) -> TranslateError {
    TranslateError::Index(IndexError::NotFound {
        mapping: mapping.clone(),
        section: 0,
    })
}

struct DiffTranslator<'a> {
    mapping: &'a MappingId,
    old_index: &'a CombinedSectionIndex,
    new_index: &'a CombinedSectionIndex,
    changes: &'a mut PendingChangeSet,
}

impl DiffTranslator<'_> {
    fn translate(self, diff: &MappingDiff) -> Result<(), TranslateError> {
        let mut deleted_groups = BTreeSet::new();
        let mut inserted_groups = BTreeSet::new();
        for change in &diff.section_changes {
            match change {
                SectionChange::Delete { index, .. } => {
                    deleted_groups.insert(*index);
                    let section = self.old_index.flat_section(self.mapping, *index)?;
                    self.changes.deleted_sections.insert(section);
                }
                SectionChange::Insert { index, .. } => {
                    inserted_groups.insert(*index);
                    let section = self.new_index.flat_section(self.mapping, *index)?;
                    self.changes.inserted_sections.insert(section);
                }
            }
        }
        let was_deleted = |path: &GroupPath| deleted_groups.contains(&path.group);
        let was_inserted = |path: &GroupPath| inserted_groups.contains(&path.group);

        let mut moved: HashMap<Coordinate, Coordinate> = HashMap::new();
        let mut updates = Vec::new();
        for change in &diff.row_changes {
            match change {
                RowChange::Delete { old, .. } => {
                    if !was_deleted(old) {
                        let from = self.old(*old)?;
                        self.changes.deleted_items.insert(from);
                    }
                }
                RowChange::Insert { new, .. } => {
                    if !was_inserted(new) {
                        let to = self.new(*new)?;
                        self.changes.inserted_items.insert(to);
                    }
                }
                RowChange::Move { old, new, .. } => match (was_deleted(old), was_inserted(new)) {
                    (true, true) => {}
                    (true, false) => {
                        let to = self.new(*new)?;
                        self.changes.inserted_items.insert(to);
                    }
                    (false, true) => {
                        let from = self.old(*old)?;
                        self.changes.deleted_items.insert(from);
                    }
                    (false, false) => {
                        let from = self.old(*old)?;
                        let to = self.new(*new)?;
                        if moved.insert(from, to).is_none() {
                            self.changes.moved_items.push((from, to));
                        }
                    }
                },
                RowChange::Update { old, new, .. } => updates.push((*old, *new)),
            }
        }

        for (old, new) in updates {
            if was_deleted(&old) || was_inserted(&new) {
                continue;
            }
            let from = self.old(old)?;
            if let Some(&to) = moved.get(&from) {
                self.changes.reloaded_after_move.insert(to);
            } else if !self.changes.deleted_items.contains(&from) {
                self.changes.reloaded_items.insert(from);
            }
        }
        Ok(())
    }

    fn old(&self, path: GroupPath) -> Result<Coordinate, IndexError> {
        self.old_index.flat_coordinate(self.mapping, path)
    }

    fn new(&self, path: GroupPath) -> Result<Coordinate, IndexError> {
        self.new_index.flat_coordinate(self.mapping, path)
    }
}

#[cfg(test)]
mod tests {
    use viewmap_model::VersionToken;

    use super::*;

    fn descriptor(name: &str, counts: &[(&str, usize)]) -> MappingDescriptor {
        MappingDescriptor::from_counts(MappingId::new(name).unwrap(), VersionToken::new(1), counts)
    }

    #[test]
    fn kept_mappings_drop_reordered() {
        let a = descriptor("a", &[]);
        let b = descriptor("b", &[]);
        let c = descriptor("c", &[]);
        let old = vec![a.clone(), b.clone(), c.clone()];
        let new = vec![c, a, b];
        let kept = kept_mappings(&old, &new);
        assert_eq!(kept.len(), 2);
        assert!(kept.contains(&MappingId::new("a").unwrap()));
        assert!(kept.contains(&MappingId::new("b").unwrap()));
    }

    #[test]
    fn no_baseline_reloads() {
        let mappings = vec![descriptor("a", &[("x", 1)])];
        let index = CombinedSectionIndex::rebuild(&mappings).unwrap();
        let diffs = BTreeMap::new();
        let batch = translate(&TranslateInput {
            old_index: None,
            old_mappings: &[],
            diffs: &diffs,
            new_mappings: &mappings,
            new_index: &index,
            animate: true,
        })
        .unwrap();
        assert_eq!(batch, UpdateBatch::FullReload(ReloadReason::NoBaseline));
    }
}
