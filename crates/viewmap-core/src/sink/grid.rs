use std::collections::BTreeSet;

use viewmap_model::{Coordinate, ViewOperation};

use crate::layout::SharedLayout;
use crate::sink::ViewSink;
use crate::sink::recorder::{RecordedBatch, SinkRecorder};

/// Multi-column grid of items grouped in sections.
///
/// Items flow left to right and wrap every `columns` items, so each section
/// occupies `ceil(items / columns)` grid rows.
#[derive(Debug)]
pub struct GridSink {
    recorder: SinkRecorder,
    columns: usize,
}

impl GridSink {
    pub fn new(layout: SharedLayout, columns: usize) -> Self {
        Self {
            recorder: SinkRecorder::new(layout),
            columns: columns.max(1),
        }
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn number_of_items_in_section(&self, section: usize) -> usize {
        self.recorder.counts().get(section).copied().unwrap_or(0)
    }

    pub fn grid_rows_in_section(&self, section: usize) -> usize {
        self.number_of_items_in_section(section)
            .div_ceil(self.columns)
    }

    /// Column and grid row an item is drawn at.
    pub fn cell_for(&self, item: Coordinate) -> Option<(usize, usize)> {
        if item.item >= self.number_of_items_in_section(item.section) {
            return None;
        }
        Some((item.item % self.columns, item.item / self.columns))
    }

    pub fn item_counts(&self) -> &[usize] {
        self.recorder.counts()
    }

    pub fn batches(&self) -> &[RecordedBatch] {
        self.recorder.batches()
    }

    pub fn take_batches(&mut self) -> Vec<RecordedBatch> {
        self.recorder.take_batches()
    }

    pub fn reject_next_batch(&mut self) {
        self.recorder.reject_next_batch();
    }
}

impl ViewSink for GridSink {
    fn number_of_sections(&self) -> usize {
        self.recorder.counts().len()
    }

    fn reload_all(&mut self) {
        self.recorder.record(ViewOperation::ReloadAll);
    }

    fn insert_sections(&mut self, sections: &BTreeSet<usize>) {
        self.recorder.record(ViewOperation::InsertSections {
            sections: sections.clone(),
        });
    }

    fn delete_sections(&mut self, sections: &BTreeSet<usize>) {
        self.recorder.record(ViewOperation::DeleteSections {
            sections: sections.clone(),
        });
    }

    fn insert_items(&mut self, items: &[Coordinate]) {
        self.recorder.record(ViewOperation::InsertItems {
            items: items.to_vec(),
        });
    }

    fn delete_items(&mut self, items: &[Coordinate]) {
        self.recorder.record(ViewOperation::DeleteItems {
            items: items.to_vec(),
        });
    }

    fn reload_items(&mut self, items: &[Coordinate]) {
        self.recorder.record(ViewOperation::ReloadItems {
            items: items.to_vec(),
        });
    }

    fn move_item(&mut self, from: Coordinate, to: Coordinate) {
        self.recorder.record(ViewOperation::MoveItem { from, to });
    }

    fn perform_batch(&mut self, updates: &mut dyn FnMut(&mut dyn ViewSink)) -> bool {
        self.recorder.begin();
        updates(self);
        self.recorder.commit(true)
    }
}

#[cfg(test)]
mod tests {
    use crate::descriptor::MappingDescriptor;
    use crate::layout::LayoutSnapshot;
    use viewmap_model::{MappingId, VersionToken};

    use super::*;

    fn layout(counts: &[(&str, usize)]) -> SharedLayout {
        let layout = SharedLayout::new();
        layout.publish(LayoutSnapshot::from_mappings(&[MappingDescriptor::from_counts(
            MappingId::new("photos").unwrap(),
            VersionToken::new(1),
            counts,
        )]));
        layout
    }

    #[test]
    fn wraps_items_into_grid_rows() {
        let grid = GridSink::new(layout(&[("2024", 7), ("2023", 0)]), 3);
        assert_eq!(grid.grid_rows_in_section(0), 3);
        assert_eq!(grid.grid_rows_in_section(1), 0);
        assert_eq!(grid.cell_for(Coordinate::new(0, 4)), Some((1, 1)));
        assert_eq!(grid.cell_for(Coordinate::new(0, 7)), None);
    }

    #[test]
    fn rejected_batch_falls_back_to_reload() {
        let shared = layout(&[("2024", 2)]);
        let mut grid = GridSink::new(shared.clone(), 2);
        shared.publish(LayoutSnapshot::from_mappings(&[MappingDescriptor::from_counts(
            MappingId::new("photos").unwrap(),
            VersionToken::new(2),
            &[("2024", 3)],
        )]));

        // claims nothing changed although the layout gained an item
        let finished = grid.perform_batch(&mut |_| {});
        assert!(!finished);
        assert_eq!(grid.item_counts(), &[3]);
        assert!(grid.batches().last().is_some_and(RecordedBatch::is_reload));
    }
}
