//! The view sink contract and the two views that implement it.
//!
//! A sink is whatever displays the combined sections: a single-column list or
//! a multi-column grid. The engine only ever talks to [`ViewSink`].

mod grid;
mod list;
mod recorder;

use std::collections::BTreeSet;

use viewmap_model::Coordinate;

pub use grid::GridSink;
pub use list::{ListSink, RowAnimation};
pub use recorder::{RecordedBatch, SinkRecorder};

/// Minimal capability set of a sectioned list view.
///
/// Inside a batch, deletes, move sources and reloads address the layout before
/// the batch; inserts and move destinations address the layout after it. A
/// reload issued after a move of the same item addresses the destination.
pub trait ViewSink {
    fn number_of_sections(&self) -> usize;

    fn reload_all(&mut self);

    fn insert_sections(&mut self, sections: &BTreeSet<usize>);

    fn delete_sections(&mut self, sections: &BTreeSet<usize>);

    fn insert_items(&mut self, items: &[Coordinate]);

    fn delete_items(&mut self, items: &[Coordinate]);

    fn reload_items(&mut self, items: &[Coordinate]);

    fn move_item(&mut self, from: Coordinate, to: Coordinate);

    /// Applies every call made by `updates` as one animated unit.
    ///
    /// Returns `true` when the batch was applied. When the view rejects the
    /// batch it falls back to reloading everything itself and returns
    /// `false`; either way the call has completed when it returns.
    fn perform_batch(&mut self, updates: &mut dyn FnMut(&mut dyn ViewSink)) -> bool;
}
