use viewmap_model::ViewOperation;

use crate::changeset::PendingChangeSet;
use crate::layout::SharedLayout;

/// One unit of work a view applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedBatch {
    pub operations: Vec<ViewOperation>,
    pub animated: bool,
    pub finished: bool,
}

impl RecordedBatch {
    pub fn is_reload(&self) -> bool {
        self.operations == [ViewOperation::ReloadAll]
    }
}

/// Item-count model shared by the bundled views.
///
/// Tracks the counts the view currently displays, checks each committed batch
/// against the published layout the way a platform list view would, and keeps
/// a log of everything applied.
#[derive(Debug)]
pub struct SinkRecorder {
    layout: SharedLayout,
    counts: Vec<usize>,
    batches: Vec<RecordedBatch>,
    open: Option<Vec<ViewOperation>>,
    reject_next: bool,
}

impl SinkRecorder {
    pub fn new(layout: SharedLayout) -> Self {
        let counts = layout.item_counts();
        Self {
            layout,
            counts,
            batches: Vec::new(),
            open: None,
            reject_next: false,
        }
    }

    /// Item counts per section as currently displayed.
    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    pub fn batches(&self) -> &[RecordedBatch] {
        &self.batches
    }

    pub fn take_batches(&mut self) -> Vec<RecordedBatch> {
        std::mem::take(&mut self.batches)
    }

    /// Makes the next batch fail as if the platform had rejected it.
    pub fn reject_next_batch(&mut self) {
        self.reject_next = true;
    }

    pub fn record(&mut self, op: ViewOperation) {
        match &mut self.open {
            Some(open) => open.push(op),
            None if op == ViewOperation::ReloadAll => self.reload(),
            None => {
                // an unbatched call is a batch of one
                self.begin();
                self.record(op);
                self.commit(true);
            }
        }
    }

    /// Opens a batch. Batches opened inside a batch merge into the outer one.
    pub fn begin(&mut self) {
        if self.open.is_none() {
            self.open = Some(Vec::new());
        }
    }

    pub fn commit(&mut self, animated: bool) -> bool {
        let operations = self.open.take().unwrap_or_default();
        let expected = self.layout.item_counts();
        let finished = if operations.contains(&ViewOperation::ReloadAll) {
            true
        } else if std::mem::take(&mut self.reject_next) {
            tracing::debug!("Batch rejected on request");
            false
        } else {
            match PendingChangeSet::from_operations(&operations)
                .validate_counts(&self.counts, &expected)
            {
                Ok(()) => true,
                Err(error) => {
                    tracing::warn!(%error, "View rejected batch");
                    false
                }
            }
        };
        self.counts = expected;
        self.batches.push(RecordedBatch {
            operations,
            animated,
            finished,
        });
        if !finished {
            self.batches.push(RecordedBatch {
                operations: vec![ViewOperation::ReloadAll],
                animated: false,
                finished: true,
            });
        }
        finished
    }

    fn reload(&mut self) {
        self.counts = self.layout.item_counts();
        self.batches.push(RecordedBatch {
            operations: vec![ViewOperation::ReloadAll],
            animated: false,
            finished: true,
        });
    }
}
