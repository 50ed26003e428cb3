//! Flat-space change sets and the batches built from them.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use viewmap_model::{Coordinate, ViewOperation};

use crate::error::TranslateError;
use crate::index::CombinedSectionIndex;
use crate::sink::ViewSink;

/// Why a batch degraded to reloading everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadReason {
    /// Nothing was shown before, so there is nothing to animate from.
    NoBaseline,
    AnimationDisabled,
    /// The mapping list changed while updates were paused.
    MappingsChangedWhilePaused,
    ReloadOnResume,
    LookupFailed,
    InconsistentBatch,
    StaleVersion,
    SourceUnavailable,
    /// The view's section count did not match the layout it was last given.
    ViewOutOfSync,
}

impl fmt::Display for ReloadReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::NoBaseline => "no baseline",
            Self::AnimationDisabled => "animation disabled",
            Self::MappingsChangedWhilePaused => "mappings changed while paused",
            Self::ReloadOnResume => "reload on resume",
            Self::LookupFailed => "coordinate lookup failed",
            Self::InconsistentBatch => "inconsistent batch",
            Self::StaleVersion => "stale version",
            Self::SourceUnavailable => "source unavailable",
            Self::ViewOutOfSync => "view out of sync",
        };
        f.write_str(text)
    }
}

/// What one update does to the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateBatch {
    /// Sentinel: a single reload of everything.
    FullReload(ReloadReason),
    Changes(PendingChangeSet),
}

impl UpdateBatch {
    pub fn is_full_reload(&self) -> bool {
        matches!(self, Self::FullReload(_))
    }

    /// The sink calls this batch turns into, in order.
    pub fn operations(&self) -> Vec<ViewOperation> {
        match self {
            Self::FullReload(_) => vec![ViewOperation::ReloadAll],
            Self::Changes(changes) => changes.operations(),
        }
    }
}

/// Flat-space operations for one batch.
///
/// Deletes, move sources and `reloaded_items` are in pre-update coordinates;
/// inserts, move destinations and `reloaded_after_move` in post-update
/// coordinates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingChangeSet {
    pub deleted_sections: BTreeSet<usize>,
    pub inserted_sections: BTreeSet<usize>,
    pub deleted_items: BTreeSet<Coordinate>,
    pub inserted_items: BTreeSet<Coordinate>,
    pub moved_items: Vec<(Coordinate, Coordinate)>,
    pub reloaded_items: BTreeSet<Coordinate>,
    pub reloaded_after_move: BTreeSet<Coordinate>,
}

impl PendingChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.deleted_sections.is_empty()
            && self.inserted_sections.is_empty()
            && self.deleted_items.is_empty()
            && self.inserted_items.is_empty()
            && self.moved_items.is_empty()
            && self.reloaded_items.is_empty()
            && self.reloaded_after_move.is_empty()
    }

    /// Emission order: section deletes, section inserts, item deletes, item
    /// inserts, moves, reloads, reloads of moved items.
    pub fn operations(&self) -> Vec<ViewOperation> {
        let mut ops = Vec::new();
        if !self.deleted_sections.is_empty() {
            ops.push(ViewOperation::DeleteSections {
                sections: self.deleted_sections.clone(),
            });
        }
        if !self.inserted_sections.is_empty() {
            ops.push(ViewOperation::InsertSections {
                sections: self.inserted_sections.clone(),
            });
        }
        if !self.deleted_items.is_empty() {
            ops.push(ViewOperation::DeleteItems {
                items: self.deleted_items.iter().copied().collect(),
            });
        }
        if !self.inserted_items.is_empty() {
            ops.push(ViewOperation::InsertItems {
                items: self.inserted_items.iter().copied().collect(),
            });
        }
        for &(from, to) in &self.moved_items {
            ops.push(ViewOperation::MoveItem { from, to });
        }
        if !self.reloaded_items.is_empty() {
            ops.push(ViewOperation::ReloadItems {
                items: self.reloaded_items.iter().copied().collect(),
            });
        }
        if !self.reloaded_after_move.is_empty() {
            ops.push(ViewOperation::ReloadItems {
                items: self.reloaded_after_move.iter().copied().collect(),
            });
        }
        ops
    }

    /// Issues every operation against `sink`, in emission order.
    ///
    /// Meant to run inside [`ViewSink::perform_batch`].
    pub fn apply_to(&self, sink: &mut dyn ViewSink) {
        for op in self.operations() {
            apply_operation(sink, &op);
        }
    }

    /// Rebuilds a change set from recorded sink calls.
    ///
    /// A reload issued after a move of the same item is read as addressing the
    /// move's destination.
    pub fn from_operations(ops: &[ViewOperation]) -> Self {
        let mut changes = Self::new();
        let mut destinations = BTreeSet::new();
        for op in ops {
            match op {
                ViewOperation::ReloadAll => {}
                ViewOperation::DeleteSections { sections } => {
                    changes.deleted_sections.extend(sections.iter().copied());
                }
                ViewOperation::InsertSections { sections } => {
                    changes.inserted_sections.extend(sections.iter().copied());
                }
                ViewOperation::DeleteItems { items } => {
                    changes.deleted_items.extend(items.iter().copied());
                }
                ViewOperation::InsertItems { items } => {
                    changes.inserted_items.extend(items.iter().copied());
                }
                ViewOperation::MoveItem { from, to } => {
                    changes.moved_items.push((*from, *to));
                    destinations.insert(*to);
                }
                ViewOperation::ReloadItems { items } => {
                    for item in items {
                        if destinations.contains(item) {
                            changes.reloaded_after_move.insert(*item);
                        } else {
                            changes.reloaded_items.insert(*item);
                        }
                    }
                }
            }
        }
        changes
    }

    /// Checks the batch against the layouts before and after the update.
    pub fn validate(
        &self,
        old: &CombinedSectionIndex,
        new: &CombinedSectionIndex,
    ) -> Result<(), TranslateError> {
        self.validate_counts(old.row_counts(), new.row_counts())
    }

    /// Checks the batch against per-section item counts before and after.
    ///
    /// These are the rules list views enforce when committing a batch: every
    /// coordinate in range for its layout, nothing addressed inside a section
    /// that is itself deleted or inserted, each item removed or placed at most
    /// once, and every surviving section ending with exactly the count the new
    /// layout reports.
    pub fn validate_counts(&self, old: &[usize], new: &[usize]) -> Result<(), TranslateError> {
        if let Some(&section) = self.deleted_sections.iter().find(|&&s| s >= old.len()) {
            return Err(TranslateError::inconsistent(format!(
                "deleted section {section} beyond {} sections",
                old.len()
            )));
        }
        if let Some(&section) = self.inserted_sections.iter().find(|&&s| s >= new.len()) {
            return Err(TranslateError::inconsistent(format!(
                "inserted section {section} beyond {} sections",
                new.len()
            )));
        }
        let surviving_old = old.len() - self.deleted_sections.len();
        if new.len() < self.inserted_sections.len()
            || surviving_old != new.len() - self.inserted_sections.len()
        {
            return Err(TranslateError::inconsistent(format!(
                "{} sections - {} deleted + {} inserted != {} sections",
                old.len(),
                self.deleted_sections.len(),
                self.inserted_sections.len(),
                new.len()
            )));
        }

        let check_old = |item: &Coordinate, what: &str| -> Result<(), TranslateError> {
            if self.deleted_sections.contains(&item.section) {
                return Err(TranslateError::inconsistent(format!(
                    "{what} {item} inside deleted section"
                )));
            }
            match old.get(item.section) {
                Some(&rows) if item.item < rows => Ok(()),
                _ => Err(TranslateError::inconsistent(format!(
                    "{what} {item} outside the previous layout"
                ))),
            }
        };
        let check_new = |item: &Coordinate, what: &str| -> Result<(), TranslateError> {
            if self.inserted_sections.contains(&item.section) {
                return Err(TranslateError::inconsistent(format!(
                    "{what} {item} inside inserted section"
                )));
            }
            match new.get(item.section) {
                Some(&rows) if item.item < rows => Ok(()),
                _ => Err(TranslateError::inconsistent(format!(
                    "{what} {item} outside the new layout"
                ))),
            }
        };

        let mut sources = BTreeSet::new();
        let mut destinations = BTreeSet::new();
        for item in &self.deleted_items {
            check_old(item, "delete")?;
            sources.insert(*item);
        }
        for item in &self.inserted_items {
            check_new(item, "insert")?;
            destinations.insert(*item);
        }
        for (from, to) in &self.moved_items {
            check_old(from, "move source")?;
            check_new(to, "move destination")?;
            if !sources.insert(*from) {
                return Err(TranslateError::inconsistent(format!(
                    "{from} removed more than once"
                )));
            }
            if !destinations.insert(*to) {
                return Err(TranslateError::inconsistent(format!(
                    "{to} filled more than once"
                )));
            }
        }
        for item in &self.reloaded_items {
            check_old(item, "reload")?;
            if sources.contains(item) {
                return Err(TranslateError::inconsistent(format!(
                    "reload of {item} which is deleted or moved"
                )));
            }
        }
        for item in &self.reloaded_after_move {
            if !self.moved_items.iter().any(|(_, to)| to == item) {
                return Err(TranslateError::inconsistent(format!(
                    "reload after move of {item} without a move"
                )));
            }
        }

        let mut removed: BTreeMap<usize, usize> = BTreeMap::new();
        for item in &sources {
            *removed.entry(item.section).or_default() += 1;
        }
        let mut added: BTreeMap<usize, usize> = BTreeMap::new();
        for item in &destinations {
            *added.entry(item.section).or_default() += 1;
        }

        let survivors_old = (0..old.len()).filter(|s| !self.deleted_sections.contains(s));
        let survivors_new = (0..new.len()).filter(|s| !self.inserted_sections.contains(s));
        for (before, after) in survivors_old.zip(survivors_new) {
            let expected = (old[before] + added.get(&after).copied().unwrap_or(0))
                .checked_sub(removed.get(&before).copied().unwrap_or(0));
            if expected != Some(new[after]) {
                return Err(TranslateError::inconsistent(format!(
                    "section {before} -> {after}: {} items, -{} +{} should give {}",
                    old[before],
                    removed.get(&before).copied().unwrap_or(0),
                    added.get(&after).copied().unwrap_or(0),
                    new[after]
                )));
            }
        }
        Ok(())
    }
}

pub(crate) fn apply_operation(sink: &mut dyn ViewSink, op: &ViewOperation) {
    match op {
        ViewOperation::ReloadAll => sink.reload_all(),
        ViewOperation::DeleteSections { sections } => sink.delete_sections(sections),
        ViewOperation::InsertSections { sections } => sink.insert_sections(sections),
        ViewOperation::DeleteItems { items } => sink.delete_items(items),
        ViewOperation::InsertItems { items } => sink.insert_items(items),
        ViewOperation::MoveItem { from, to } => sink.move_item(*from, *to),
        ViewOperation::ReloadItems { items } => sink.reload_items(items),
    }
}
