//! Structural diffs between two states of one source, by key identity.
//!
//! Groups are matched by name and rows by key. Among the groups present on
//! both sides, those in the longest order-preserving subsequence are kept;
//! every other old group is deleted and every other new group inserted. Rows
//! are treated the same way within each kept group, and a row that changes
//! group is always a move. A row whose revision changed is additionally
//! reported as updated.

use std::collections::{HashMap, HashSet};

use viewmap_model::utils::longest_increasing_subsequence;
use viewmap_model::{GroupPath, MappingDiff, RowChange, SectionChange};

use crate::state::{Row, SourceState};

pub fn diff_sources(old: &SourceState, new: &SourceState) -> MappingDiff {
    let mut diff = MappingDiff::new();
    let kept_groups = kept_groups(old, new);

    // old group index -> new group index for kept groups
    let group_pairs: HashMap<usize, usize> = kept_groups.iter().copied().collect();
    let kept_new: HashSet<usize> = kept_groups.iter().map(|&(_, n)| n).collect();

    for (index, group) in old.groups.iter().enumerate() {
        if !group_pairs.contains_key(&index) {
            diff.section_changes.push(SectionChange::Delete {
                group: group.name.clone(),
                index,
            });
        }
    }
    for (index, group) in new.groups.iter().enumerate() {
        if !kept_new.contains(&index) {
            diff.section_changes.push(SectionChange::Insert {
                group: group.name.clone(),
                index,
            });
        }
    }

    let old_rows = row_positions(old);
    let new_rows = row_positions(new);
    let stable = stable_rows(new, &group_pairs, &old_rows);

    for (key, &(old_path, _)) in &old_rows {
        if !new_rows.contains_key(key) {
            diff.row_changes.push(RowChange::Delete {
                group: old.groups[old_path.group].name.clone(),
                old: old_path,
            });
        }
    }
    for (key, &(new_path, new_row)) in &new_rows {
        let group = new.groups[new_path.group].name.clone();
        let Some(&(old_path, old_row)) = old_rows.get(key) else {
            diff.row_changes.push(RowChange::Insert {
                group,
                new: new_path,
            });
            continue;
        };
        let origin = old.groups[old_path.group].name.clone();
        if !stable.contains(key) {
            diff.row_changes.push(RowChange::Move {
                group: origin.clone(),
                old: old_path,
                new: new_path,
            });
        }
        if old_row.revision != new_row.revision {
            diff.row_changes.push(RowChange::Update {
                group: origin,
                old: old_path,
                new: new_path,
            });
        }
    }

    // hash map iteration order is arbitrary; keep diffs deterministic
    diff.row_changes.sort_by_key(|change| (change.old_path(), change.new_path()));
    diff
}

/// `(old index, new index)` of every group that keeps its place.
fn kept_groups(old: &SourceState, new: &SourceState) -> Vec<(usize, usize)> {
    let old_positions: HashMap<&str, usize> = old
        .groups
        .iter()
        .enumerate()
        .map(|(index, g)| (g.name.as_str(), index))
        .collect();
    let common: Vec<(usize, usize)> = new
        .groups
        .iter()
        .enumerate()
        .filter_map(|(new_index, g)| {
            old_positions
                .get(g.name.as_str())
                .map(|&old_index| (old_index, new_index))
        })
        .collect();
    let order: Vec<usize> = common.iter().map(|&(o, _)| o).collect();
    longest_increasing_subsequence(&order)
        .into_iter()
        .map(|at| common[at])
        .collect()
}

fn row_positions(source: &SourceState) -> HashMap<&str, (GroupPath, &Row)> {
    source
        .groups
        .iter()
        .enumerate()
        .flat_map(|(group, g)| {
            g.rows
                .iter()
                .enumerate()
                .map(move |(row, r)| (r.key.as_str(), (GroupPath::new(group, row), r)))
        })
        .collect()
}

/// Rows that stay in the same kept group without leaving its longest
/// order-preserving subsequence.
fn stable_rows<'a>(
    new: &'a SourceState,
    group_pairs: &HashMap<usize, usize>,
    old_rows: &HashMap<&str, (GroupPath, &Row)>,
) -> HashSet<&'a str> {
    let mut stable = HashSet::new();
    for (&old_group, &new_group) in group_pairs {
        let staying: Vec<(&'a str, usize)> = new.groups[new_group]
            .rows
            .iter()
            .filter_map(|row| {
                old_rows
                    .get(row.key.as_str())
                    .filter(|(path, _)| path.group == old_group)
                    .map(|(path, _)| (row.key.as_str(), path.row))
            })
            .collect();
        let order: Vec<usize> = staying.iter().map(|&(_, row)| row).collect();
        stable.extend(
            longest_increasing_subsequence(&order)
                .into_iter()
                .map(|at| staying[at].0),
        );
    }
    stable
}
