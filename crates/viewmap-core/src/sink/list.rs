use std::collections::BTreeSet;

use viewmap_model::{Coordinate, ViewOperation};

use crate::layout::SharedLayout;
use crate::sink::ViewSink;
use crate::sink::recorder::{RecordedBatch, SinkRecorder};

/// How a list animates row changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RowAnimation {
    #[default]
    Automatic,
    Fade,
    /// Changes are applied without animation.
    None,
}

/// Single-column list of rows grouped in sections.
#[derive(Debug)]
pub struct ListSink {
    recorder: SinkRecorder,
    animation: RowAnimation,
}

impl ListSink {
    pub fn new(layout: SharedLayout) -> Self {
        Self {
            recorder: SinkRecorder::new(layout),
            animation: RowAnimation::default(),
        }
    }

    #[must_use]
    pub fn with_animation(mut self, animation: RowAnimation) -> Self {
        self.animation = animation;
        self
    }

    pub fn animation(&self) -> RowAnimation {
        self.animation
    }

    pub fn number_of_rows_in_section(&self, section: usize) -> usize {
        self.recorder.counts().get(section).copied().unwrap_or(0)
    }

    pub fn row_counts(&self) -> &[usize] {
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

impl ViewSink for ListSink {
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
        self.recorder.commit(self.animation != RowAnimation::None)
    }
}
