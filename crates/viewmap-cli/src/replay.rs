//! Drives a view mapper through a scenario against the memory store and
//! records what the view received at every step.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, info_span, trace, warn};

use viewmap_core::{
    GridSink, ListSink, MapperDelegate, RecordedBatch, SectionSource, SharedLayout, ViewMapper,
    ViewSink,
};
use viewmap_model::VersionToken;
use viewmap_store::MemoryStore;

use crate::scenario::{Scenario, Step};

/// Which bundled view the scenario is replayed into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SinkKind {
    #[default]
    List,
    Grid,
}

impl SinkKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Grid => "grid",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReplayOptions {
    pub sink: SinkKind,
    /// Forces reload-only updates regardless of the scenario's mapper config.
    pub no_animate: bool,
}

/// Everything one step did to the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub number: usize,
    pub label: String,
    /// Version the mapper reflects after the step.
    pub version: VersionToken,
    /// Delegate update cycles observed during the step.
    pub updates: usize,
    pub batches: Vec<RecordedBatch>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutRow {
    pub section: usize,
    pub mapping: String,
    pub group: String,
    pub items: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayReport {
    pub name: Option<String>,
    pub sink: SinkKind,
    pub steps: Vec<StepReport>,
    pub layout: Vec<LayoutRow>,
    /// Item counts the view shows at the end, `None` once it was dropped.
    pub view_counts: Option<Vec<usize>>,
}

impl ReplayReport {
    pub fn batch_count(&self) -> usize {
        self.steps.iter().map(|step| step.batches.len()).sum()
    }

    /// Batches the view refused and replaced with a reload.
    pub fn rejected_batches(&self) -> usize {
        self.steps
            .iter()
            .flat_map(|step| &step.batches)
            .filter(|batch| !batch.finished)
            .count()
    }

    /// Whether the view ended up showing exactly the published layout.
    pub fn in_sync(&self) -> bool {
        self.view_counts.as_ref().is_none_or(|counts| {
            counts.len() == self.layout.len()
                && counts.iter().zip(&self.layout).all(|(count, row)| *count == row.items)
        })
    }

    pub fn has_errors(&self) -> bool {
        self.rejected_batches() > 0 || !self.in_sync()
    }
}

enum View {
    List(Rc<RefCell<ListSink>>),
    Grid(Rc<RefCell<GridSink>>),
}

impl View {
    fn new(kind: SinkKind, layout: SharedLayout, columns: usize) -> Self {
        match kind {
            SinkKind::List => Self::List(Rc::new(RefCell::new(ListSink::new(layout)))),
            SinkKind::Grid => Self::Grid(Rc::new(RefCell::new(GridSink::new(layout, columns)))),
        }
    }

    fn sink(&self) -> Rc<RefCell<dyn ViewSink>> {
        match self {
            Self::List(list) => list.clone(),
            Self::Grid(grid) => grid.clone(),
        }
    }

    fn take_batches(&self) -> Vec<RecordedBatch> {
        match self {
            Self::List(list) => list.borrow_mut().take_batches(),
            Self::Grid(grid) => grid.borrow_mut().take_batches(),
        }
    }

    fn item_counts(&self) -> Vec<usize> {
        match self {
            Self::List(list) => list.borrow().row_counts().to_vec(),
            Self::Grid(grid) => grid.borrow().item_counts().to_vec(),
        }
    }
}

/// Counts update cycles and checks they are balanced.
#[derive(Debug, Default)]
struct UpdateCounter {
    open: Cell<bool>,
    completed: Cell<usize>,
}

impl UpdateCounter {
    fn take(&self) -> usize {
        self.completed.replace(0)
    }
}

impl MapperDelegate for UpdateCounter {
    fn will_begin_update(&self, source: &dyn SectionSource) {
        if self.open.replace(true) {
            warn!("Update began twice without ending");
        }
        trace!(sections = source.number_of_sections(), "Update began");
    }

    fn did_end_update(&self, source: &dyn SectionSource) {
        if !self.open.replace(false) {
            warn!("Update ended without beginning");
        }
        self.completed.set(self.completed.get() + 1);
        trace!(sections = source.number_of_sections(), "Update ended");
    }
}

/// Replays `scenario` and reports every batch the view received.
///
/// Activation counts as step 0. Store and mapping errors abort the replay
/// with the step that caused them.
pub fn replay(scenario: &Scenario, options: &ReplayOptions) -> Result<ReplayReport> {
    let store = Arc::new(scenario.seed_store().context("seed store")?);
    let mut config = scenario.mapper.clone();
    if options.no_animate {
        config.should_animate_updates = false;
    }

    let mut mapper = ViewMapper::new(Arc::clone(&store), config);
    mapper
        .set_active_mappings(&scenario.mappings, false)
        .context("initial mappings")?;
    let mut view = Some(View::new(
        options.sink,
        mapper.layout(),
        scenario.grid_columns,
    ));
    if let Some(view) = &view {
        mapper.set_view(Rc::downgrade(&view.sink()));
    }
    let counter = Rc::new(UpdateCounter::default());
    let delegate: Rc<dyn MapperDelegate> = counter.clone();
    mapper.set_delegate(Rc::downgrade(&delegate));

    mapper.activate();
    info!(
        sink = options.sink.name(),
        mappings = scenario.mappings.len(),
        steps = scenario.steps.len(),
        "Replaying scenario"
    );
    let mut steps = vec![StepReport {
        number: 0,
        label: "activate".to_string(),
        version: mapper.version(),
        updates: counter.take(),
        batches: view.as_ref().map(View::take_batches).unwrap_or_default(),
    }];

    for (index, step) in scenario.steps.iter().enumerate() {
        let number = index + 1;
        let label = step.label();
        let span = info_span!("step", number, step = %label);
        let _guard = span.enter();

        match step {
            Step::Commit(edits) => {
                let version = store
                    .commit(|txn| edits.iter().try_for_each(|edit| edit.apply(txn)))
                    .with_context(|| format!("step {number}: {label}"))?;
                debug!(%version, edits = edits.len(), "Committed");
                mapper.process_pending_notifications();
            }
            Step::Pause => mapper.pause(),
            Step::Resume => mapper.resume(),
            Step::InsertMapping {
                id,
                index,
                animated,
            } => mapper
                .insert_mapping(id.clone(), *index, *animated)
                .with_context(|| format!("step {number}: {label}"))?,
            Step::RemoveMapping { id, animated } => mapper
                .remove_mapping(id, *animated)
                .with_context(|| format!("step {number}: {label}"))?,
            Step::SetActiveMappings { ids, animated } => mapper
                .set_active_mappings(ids, *animated)
                .with_context(|| format!("step {number}: {label}"))?,
            Step::SetAnimate(animate) => mapper.set_should_animate_updates(*animate),
            Step::DropView => {
                view = None;
            }
        }

        let report = StepReport {
            number,
            label,
            version: mapper.version(),
            updates: counter.take(),
            batches: view.as_ref().map(View::take_batches).unwrap_or_default(),
        };
        debug!(
            version = %report.version,
            batches = report.batches.len(),
            updates = report.updates,
            "Step finished"
        );
        steps.push(report);
    }

    let layout = mapper
        .layout()
        .snapshot()
        .sections()
        .iter()
        .enumerate()
        .map(|(section, info)| LayoutRow {
            section,
            mapping: info.mapping.to_string(),
            group: info.group.clone(),
            items: info.items,
        })
        .collect();

    Ok(ReplayReport {
        name: scenario.name.clone(),
        sink: options.sink,
        steps,
        layout,
        view_counts: view.as_ref().map(View::item_counts),
    })
}
