//! View mapper lifecycle against a scripted store.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

use viewmap_core::{
    ChangeStore, ListSink, MapperConfig, MapperDelegate, MapperError, MappingDescriptor,
    SectionSource, SessionState, StoreError, VersionAdvanced, ViewMapper, ViewSink,
};
use viewmap_model::{
    Coordinate, GroupPath, MappingDiff, MappingId, RowChange, SectionChange, VersionToken,
    ViewOperation,
};

type Layout = Vec<(String, usize)>;

/// Store whose versions and diffs are written out by each test.
#[derive(Default)]
struct ScriptedStore {
    inner: Mutex<Script>,
}

#[derive(Default)]
struct Script {
    current: VersionToken,
    earliest: VersionToken,
    layouts: BTreeMap<VersionToken, HashMap<MappingId, Layout>>,
    diffs: HashMap<(MappingId, VersionToken, VersionToken), MappingDiff>,
    subscribers: Vec<Sender<VersionAdvanced>>,
}

impl ScriptedStore {
    fn with_sources(sources: &[(&str, &[(&str, usize)])]) -> Arc<Self> {
        let store = Arc::new(Self::default());
        {
            let mut script = store.inner.lock().expect("lock");
            let initial = sources
                .iter()
                .map(|(name, groups)| (id(name), layout(groups)))
                .collect();
            script.layouts.insert(VersionToken::INITIAL, initial);
        }
        store
    }

    /// Commits a new version where `changes` replace the named sources'
    /// layouts, with the diff each one reports from the previous version.
    fn commit(&self, changes: &[(&str, &[(&str, usize)], MappingDiff)]) -> VersionToken {
        let mut script = self.inner.lock().expect("lock");
        let previous = script.current;
        let next = previous.next();
        let mut layouts = script.layouts[&previous].clone();
        for (name, groups, diff) in changes {
            layouts.insert(id(name), layout(groups));
            script.diffs.insert((id(name), previous, next), diff.clone());
        }
        script.layouts.insert(next, layouts);
        script.current = next;
        script
            .subscribers
            .retain(|subscriber| subscriber.send(VersionAdvanced::single(next)).is_ok());
        next
    }

    fn script_diff(&self, name: &str, from: VersionToken, to: VersionToken, diff: MappingDiff) {
        let mut script = self.inner.lock().expect("lock");
        script.diffs.insert((id(name), from, to), diff);
    }

    fn forget_before(&self, earliest: VersionToken) {
        self.inner.lock().expect("lock").earliest = earliest;
    }

    fn subscriber_count(&self) -> usize {
        let mut script = self.inner.lock().expect("lock");
        script
            .subscribers
            .retain(|subscriber| subscriber.send(VersionAdvanced::new(Vec::new())).is_ok());
        script.subscribers.len()
    }
}

impl ChangeStore for ScriptedStore {
    fn current_version(&self) -> VersionToken {
        self.inner.lock().expect("lock").current
    }

    fn earliest_retained_version(&self) -> VersionToken {
        self.inner.lock().expect("lock").earliest
    }

    fn snapshot(
        &self,
        mapping: &MappingId,
        version: VersionToken,
    ) -> Result<MappingDescriptor, StoreError> {
        let script = self.inner.lock().expect("lock");
        if version < script.earliest {
            return Err(StoreError::StaleVersion {
                requested: version,
                earliest: script.earliest,
            });
        }
        let groups = script
            .layouts
            .get(&version)
            .and_then(|layouts| layouts.get(mapping))
            .ok_or_else(|| StoreError::UnknownSource(mapping.clone()))?;
        let groups: Vec<(&str, usize)> = groups.iter().map(|(n, r)| (n.as_str(), *r)).collect();
        Ok(MappingDescriptor::from_counts(mapping.clone(), version, &groups))
    }

    fn diff(
        &self,
        mapping: &MappingId,
        from: VersionToken,
        to: VersionToken,
    ) -> Result<MappingDiff, StoreError> {
        let script = self.inner.lock().expect("lock");
        if from < script.earliest {
            return Err(StoreError::StaleVersion {
                requested: from,
                earliest: script.earliest,
            });
        }
        if let Some(diff) = script.diffs.get(&(mapping.clone(), from, to)) {
            return Ok(diff.clone());
        }
        let before = script.layouts.get(&from).and_then(|l| l.get(mapping));
        let after = script.layouts.get(&to).and_then(|l| l.get(mapping));
        match (before, after) {
            (Some(before), Some(after)) if before == after => Ok(MappingDiff::new()),
            (_, None) => Err(StoreError::UnknownSource(mapping.clone())),
            _ => panic!("no diff scripted for {mapping} {from}..{to}"),
        }
    }

    fn subscribe(&self) -> Receiver<VersionAdvanced> {
        let (sender, receiver) = mpsc::channel();
        self.inner.lock().expect("lock").subscribers.push(sender);
        receiver
    }
}

#[derive(Default)]
struct RecordingDelegate {
    events: RefCell<Vec<String>>,
}

impl MapperDelegate for RecordingDelegate {
    fn will_begin_update(&self, source: &dyn SectionSource) {
        self.events
            .borrow_mut()
            .push(format!("begin {}", source.number_of_sections()));
    }

    fn did_end_update(&self, source: &dyn SectionSource) {
        self.events
            .borrow_mut()
            .push(format!("end {}", source.number_of_sections()));
    }
}

fn id(name: &str) -> MappingId {
    MappingId::new(name).expect("valid id")
}

fn layout(groups: &[(&str, usize)]) -> Layout {
    groups.iter().map(|(n, r)| (n.to_string(), *r)).collect()
}

struct Harness {
    store: Arc<ScriptedStore>,
    mapper: ViewMapper<ScriptedStore>,
    list: Rc<RefCell<ListSink>>,
    delegate: Rc<RecordingDelegate>,
}

impl Harness {
    fn new(store: Arc<ScriptedStore>, config: MapperConfig, mappings: &[&str]) -> Self {
        let mut mapper = ViewMapper::new(Arc::clone(&store), config);
        let list = Rc::new(RefCell::new(ListSink::new(mapper.layout())));
        let delegate = Rc::new(RecordingDelegate::default());
        let ids: Vec<MappingId> = mappings.iter().map(|name| id(name)).collect();
        mapper.set_active_mappings(&ids, false).expect("set mappings");
        let view: Rc<RefCell<dyn ViewSink>> = list.clone();
        mapper.set_view(Rc::downgrade(&view));
        let observer: Rc<dyn MapperDelegate> = delegate.clone();
        mapper.set_delegate(Rc::downgrade(&observer));
        Self {
            store,
            mapper,
            list,
            delegate,
        }
    }

    fn operations(&self) -> Vec<Vec<ViewOperation>> {
        self.list
            .borrow()
            .batches()
            .iter()
            .map(|batch| batch.operations.clone())
            .collect()
    }

    fn take_operations(&self) -> Vec<Vec<ViewOperation>> {
        self.list
            .borrow_mut()
            .take_batches()
            .into_iter()
            .map(|batch| batch.operations)
            .collect()
    }

    fn events(&self) -> Vec<String> {
        std::mem::take(&mut *self.delegate.events.borrow_mut())
    }
}

fn two_three_layout() -> Arc<ScriptedStore> {
    ScriptedStore::with_sources(&[
        ("first", &[("a", 1), ("b", 1)]),
        ("second", &[("c", 2)]),
        ("third", &[("d", 4), ("e", 4), ("f", 4)]),
    ])
}

#[test]
fn activation_reloads_view() {
    let mut harness = Harness::new(two_three_layout(), MapperConfig::default(), &["first", "second", "third"]);
    assert!(harness.operations().is_empty());

    harness.mapper.activate();
    assert_eq!(harness.mapper.state(), SessionState::Active);
    assert_eq!(harness.operations(), vec![vec![ViewOperation::ReloadAll]]);
    assert_eq!(harness.list.borrow().row_counts(), &[1, 1, 2, 4, 4, 4]);
    assert_eq!(harness.events(), vec!["begin 6", "end 6"]);
}

#[test]
fn removing_second_descriptor_reindexes_third() {
    let mut harness = Harness::new(two_three_layout(), MapperConfig::default(), &["first", "second", "third"]);
    harness.mapper.activate();
    harness.take_operations();
    harness.events();

    assert_eq!(harness.mapper.section_range_for_mapping(&id("third")), Some(3..6));
    assert_eq!(
        harness.mapper.index().flat_coordinate(&id("third"), GroupPath::new(1, 3)),
        Ok(Coordinate::new(4, 3))
    );
    let (owner, local) = harness.mapper.mapping_for_section(4).expect("section 4");
    assert_eq!((owner.id(), local), (&id("third"), 1));

    harness.mapper.remove_mapping(&id("second"), true).expect("remove");
    assert_eq!(
        harness.take_operations(),
        vec![vec![ViewOperation::DeleteSections {
            sections: BTreeSet::from([2])
        }]]
    );
    assert_eq!(harness.mapper.section_range_for_mapping(&id("third")), Some(2..5));
    assert_eq!(
        harness.mapper.index().flat_coordinate(&id("third"), GroupPath::new(0, 3)),
        Ok(Coordinate::new(2, 3))
    );
    assert_eq!(harness.mapper.group_for_section(2), Some("d"));
    let (owner, local) = harness.mapper.mapping_for_section(2).expect("section 2");
    assert_eq!((owner.id(), local), (&id("third"), 0));
    let (owner, local) = harness.mapper.mapping_for_section(1).expect("section 1");
    assert_eq!((owner.id(), local), (&id("first"), 1));
    assert!(harness.mapper.mapping_for_section(5).is_none());
    assert!(harness.list.borrow().batches().is_empty());
    assert_eq!(harness.events(), vec!["begin 5", "end 5"]);
}

#[test]
fn replacing_the_view_while_active_is_one_reload() {
    let mut harness = Harness::new(two_three_layout(), MapperConfig::default(), &["first", "second", "third"]);
    harness.mapper.activate();
    harness.events();

    let replacement = Rc::new(RefCell::new(ListSink::new(harness.mapper.layout())));
    let view: Rc<RefCell<dyn ViewSink>> = replacement.clone();
    harness.mapper.set_view(Rc::downgrade(&view));

    let batches = replacement.borrow().batches().to_vec();
    assert_eq!(batches.len(), 1);
    assert!(batches[0].is_reload());
    assert_eq!(harness.events(), vec!["begin 6", "end 6"]);
}

#[test]
fn view_attached_while_paused_loads_on_resume() {
    let mut harness = Harness::new(two_three_layout(), MapperConfig::default(), &["first"]);
    harness.mapper.activate();
    harness.mapper.pause();
    harness.events();

    let replacement = Rc::new(RefCell::new(ListSink::new(harness.mapper.layout())));
    let view: Rc<RefCell<dyn ViewSink>> = replacement.clone();
    harness.mapper.set_view(Rc::downgrade(&view));
    assert!(replacement.borrow().batches().is_empty());
    assert!(harness.events().is_empty());

    harness.mapper.resume();
    let batches = replacement.borrow().batches().to_vec();
    assert_eq!(batches.len(), 1);
    assert!(batches[0].is_reload());
    assert_eq!(harness.events(), vec!["begin 2", "end 2"]);
}

#[test]
fn batch_missed_by_a_busy_view_is_made_up_with_a_reload() {
    let store = ScriptedStore::with_sources(&[("inbox", &[("today", 2)])]);
    let mut harness = Harness::new(Arc::clone(&store), MapperConfig::default(), &["inbox"]);
    harness.mapper.activate();
    harness.take_operations();
    harness.events();

    {
        let _busy = harness.list.borrow();
        store.commit(&[(
            "inbox",
            &[("today", 1)],
            MappingDiff::new().with_row(RowChange::Delete {
                group: "today".to_string(),
                old: GroupPath::new(0, 0),
            }),
        )]);
        harness.mapper.process_pending_notifications();
    }
    assert!(harness.operations().is_empty());
    assert_eq!(harness.events(), vec!["begin 1", "end 1"]);

    store.commit(&[(
        "inbox",
        &[("today", 2)],
        MappingDiff::new().with_row(RowChange::Insert {
            group: "today".to_string(),
            new: GroupPath::new(0, 1),
        }),
    )]);
    harness.mapper.process_pending_notifications();
    assert_eq!(harness.take_operations(), vec![vec![ViewOperation::ReloadAll]]);
    assert_eq!(harness.list.borrow().row_counts(), &[2]);
    assert_eq!(harness.events(), vec!["begin 1", "end 1"]);

    // back in sync: the next change is animated again
    store.commit(&[(
        "inbox",
        &[("today", 3)],
        MappingDiff::new().with_row(RowChange::Insert {
            group: "today".to_string(),
            new: GroupPath::new(0, 0),
        }),
    )]);
    harness.mapper.process_pending_notifications();
    assert_eq!(
        harness.take_operations(),
        vec![vec![ViewOperation::InsertItems {
            items: vec![Coordinate::new(0, 0)]
        }]]
    );
}

#[test]
fn store_commit_becomes_one_animated_batch() {
    let store = ScriptedStore::with_sources(&[("inbox", &[("today", 2)])]);
    let mut harness = Harness::new(Arc::clone(&store), MapperConfig::default(), &["inbox"]);
    harness.mapper.activate();
    harness.take_operations();
    harness.events();

    let v1 = store.commit(&[(
        "inbox",
        &[("today", 3)],
        MappingDiff::new().with_row(RowChange::Insert {
            group: "today".to_string(),
            new: GroupPath::new(0, 0),
        }),
    )]);
    assert_eq!(harness.mapper.process_pending_notifications(), 1);
    assert_eq!(harness.mapper.version(), v1);

    let batches = harness.list.borrow_mut().take_batches();
    assert_eq!(batches.len(), 1);
    assert!(batches[0].finished);
    assert!(batches[0].animated);
    assert_eq!(
        batches[0].operations,
        vec![ViewOperation::InsertItems {
            items: vec![Coordinate::new(0, 0)]
        }]
    );
    assert_eq!(harness.events(), vec!["begin 1", "end 1"]);
}

#[test]
fn disabled_animation_always_reloads() {
    let store = ScriptedStore::with_sources(&[("inbox", &[("today", 2)])]);
    let mut harness = Harness::new(Arc::clone(&store), MapperConfig::unanimated(), &["inbox"]);
    harness.mapper.activate();
    harness.take_operations();

    store.commit(&[(
        "inbox",
        &[("today", 1)],
        MappingDiff::new().with_row(RowChange::Delete {
            group: "today".to_string(),
            old: GroupPath::new(0, 1),
        }),
    )]);
    harness.mapper.process_pending_notifications();
    assert_eq!(harness.take_operations(), vec![vec![ViewOperation::ReloadAll]]);
    assert_eq!(harness.list.borrow().row_counts(), &[1]);
}

#[test]
fn no_op_commit_touches_nothing() {
    let store = ScriptedStore::with_sources(&[("inbox", &[("today", 2)])]);
    let mut harness = Harness::new(Arc::clone(&store), MapperConfig::default(), &["inbox"]);
    harness.mapper.activate();
    harness.take_operations();
    harness.events();

    let v1 = store.commit(&[]);
    harness.mapper.process_pending_notifications();
    assert_eq!(harness.mapper.version(), v1);
    assert!(harness.operations().is_empty());
    assert!(harness.events().is_empty());
}

#[test]
fn resume_collapses_paused_versions_into_one_batch() {
    let store = ScriptedStore::with_sources(&[("inbox", &[("today", 2)])]);
    let mut harness = Harness::new(Arc::clone(&store), MapperConfig::default(), &["inbox"]);
    harness.mapper.activate();
    harness.take_operations();
    harness.events();
    let start = harness.mapper.version();

    harness.mapper.pause();
    assert_eq!(harness.mapper.state(), SessionState::Paused);
    assert_eq!(store.subscriber_count(), 0);
    let mut last = start;
    for rows in 3..=5 {
        last = store.commit(&[(
            "inbox",
            &[("today", rows)],
            MappingDiff::new().with_row(RowChange::Insert {
                group: "today".to_string(),
                new: GroupPath::new(0, rows - 1),
            }),
        )]);
    }
    assert_eq!(harness.mapper.process_pending_notifications(), 0);
    assert!(harness.operations().is_empty());

    let gap = (2..5).fold(MappingDiff::new(), |diff, row| {
        diff.with_row(RowChange::Insert {
            group: "today".to_string(),
            new: GroupPath::new(0, row),
        })
    });
    store.script_diff("inbox", start, last, gap);
    harness.mapper.resume();

    let batches = harness.take_operations();
    assert_eq!(batches.len(), 1);
    assert_eq!(
        batches[0],
        vec![ViewOperation::InsertItems {
            items: (2..5).map(|row| Coordinate::new(0, row)).collect()
        }]
    );
    assert_eq!(harness.mapper.version(), last);
    assert_eq!(harness.events(), vec!["begin 1", "end 1"]);
}

#[test]
fn list_change_while_paused_reloads_on_resume() {
    let mut harness = Harness::new(two_three_layout(), MapperConfig::default(), &["first"]);
    harness.mapper.activate();
    harness.take_operations();

    harness.mapper.pause();
    harness
        .mapper
        .insert_mapping(id("third"), 1, true)
        .expect("insert while paused");
    assert!(harness.operations().is_empty());

    harness.mapper.resume();
    assert_eq!(harness.take_operations(), vec![vec![ViewOperation::ReloadAll]]);
    assert_eq!(harness.list.borrow().row_counts(), &[1, 1, 4, 4, 4]);
}

#[test]
fn reload_on_resume_config_forces_reload() {
    let config = MapperConfig::default().with_reload_on_resume(true);
    let mut harness = Harness::new(two_three_layout(), config, &["first"]);
    harness.mapper.activate();
    harness.take_operations();

    harness.mapper.pause();
    harness.mapper.resume();
    assert_eq!(harness.take_operations(), vec![vec![ViewOperation::ReloadAll]]);
}

#[test]
fn delegate_fires_after_view_is_dropped() {
    let store = ScriptedStore::with_sources(&[("inbox", &[("today", 2)])]);
    let mut harness = Harness::new(Arc::clone(&store), MapperConfig::default(), &["inbox"]);
    harness.mapper.activate();
    harness.events();

    let weak = Rc::downgrade(&harness.list);
    harness.list = Rc::new(RefCell::new(ListSink::new(harness.mapper.layout())));
    assert!(weak.upgrade().is_none());

    store.commit(&[(
        "inbox",
        &[("today", 3)],
        MappingDiff::new().with_row(RowChange::Insert {
            group: "today".to_string(),
            new: GroupPath::new(0, 2),
        }),
    )]);
    harness.mapper.process_pending_notifications();
    assert_eq!(harness.events(), vec!["begin 1", "end 1"]);
    assert_eq!(harness.mapper.number_of_items_in_section(0), 3);
}

#[test]
fn rejected_batch_still_ends_update() {
    let store = ScriptedStore::with_sources(&[("inbox", &[("today", 2)])]);
    let mut harness = Harness::new(Arc::clone(&store), MapperConfig::default(), &["inbox"]);
    harness.mapper.activate();
    harness.take_operations();
    harness.events();

    harness.list.borrow_mut().reject_next_batch();
    store.commit(&[(
        "inbox",
        &[("today", 1)],
        MappingDiff::new().with_row(RowChange::Delete {
            group: "today".to_string(),
            old: GroupPath::new(0, 0),
        }),
    )]);
    harness.mapper.process_pending_notifications();

    let batches = harness.list.borrow_mut().take_batches();
    assert_eq!(batches.len(), 2);
    assert!(!batches[0].finished);
    assert!(batches[1].is_reload());
    assert_eq!(harness.list.borrow().row_counts(), &[1]);
    assert_eq!(harness.events(), vec!["begin 1", "end 1"]);
}

#[test]
fn lookup_failure_degrades_to_reload() {
    let store = ScriptedStore::with_sources(&[("inbox", &[("today", 2)])]);
    let mut harness = Harness::new(Arc::clone(&store), MapperConfig::default(), &["inbox"]);
    harness.mapper.activate();
    harness.take_operations();

    store.commit(&[(
        "inbox",
        &[("today", 2), ("later", 1)],
        MappingDiff::new().with_section(SectionChange::Insert {
            group: "later".to_string(),
            index: 4,
        }),
    )]);
    harness.mapper.process_pending_notifications();
    assert_eq!(harness.take_operations(), vec![vec![ViewOperation::ReloadAll]]);
    assert_eq!(harness.list.borrow().row_counts(), &[2, 1]);
}

#[test]
fn inconsistent_diff_degrades_to_reload() {
    let store = ScriptedStore::with_sources(&[("inbox", &[("today", 2)])]);
    let mut harness = Harness::new(Arc::clone(&store), MapperConfig::default(), &["inbox"]);
    harness.mapper.activate();
    harness.take_operations();

    // the diff forgets the second inserted row
    store.commit(&[(
        "inbox",
        &[("today", 4)],
        MappingDiff::new().with_row(RowChange::Insert {
            group: "today".to_string(),
            new: GroupPath::new(0, 0),
        }),
    )]);
    harness.mapper.process_pending_notifications();
    assert_eq!(harness.take_operations(), vec![vec![ViewOperation::ReloadAll]]);
    assert_eq!(harness.list.borrow().row_counts(), &[4]);
}

#[test]
fn stale_version_rebaselines_with_reload() {
    let store = ScriptedStore::with_sources(&[("inbox", &[("today", 2)])]);
    let mut harness = Harness::new(Arc::clone(&store), MapperConfig::default(), &["inbox"]);
    harness.mapper.activate();
    harness.take_operations();

    harness.mapper.pause();
    store.commit(&[("inbox", &[("today", 3)], MappingDiff::new())]);
    let last = store.commit(&[("inbox", &[("today", 5)], MappingDiff::new())]);
    store.forget_before(last);

    harness.mapper.resume();
    assert_eq!(harness.take_operations(), vec![vec![ViewOperation::ReloadAll]]);
    assert_eq!(harness.mapper.version(), last);
    assert_eq!(harness.list.borrow().row_counts(), &[5]);
}

#[test]
fn mutation_errors_are_reported() {
    let mut harness = Harness::new(two_three_layout(), MapperConfig::default(), &["first"]);
    harness.mapper.activate();

    assert_eq!(
        harness.mapper.insert_mapping(id("first"), 0, true),
        Err(MapperError::DuplicateMapping(id("first")))
    );
    assert_eq!(
        harness.mapper.insert_mapping(id("second"), 3, true),
        Err(MapperError::InsertIndexOutOfBounds { index: 3, len: 1 })
    );
    assert_eq!(
        harness.mapper.remove_mapping(&id("third"), true),
        Err(MapperError::MappingNotActive(id("third")))
    );
    assert_eq!(
        harness.mapper.insert_mapping(id("missing"), 0, true),
        Err(MapperError::Store(StoreError::UnknownSource(id("missing"))))
    );
    assert_eq!(
        harness.mapper.set_active_mappings(&[id("second"), id("second")], true),
        Err(MapperError::DuplicateMapping(id("second")))
    );
    assert_eq!(harness.mapper.active_mappings().len(), 1);
}

#[test]
fn deactivation_unsubscribes() {
    let store = two_three_layout();
    let mut harness = Harness::new(Arc::clone(&store), MapperConfig::default(), &["first"]);
    harness.mapper.activate();
    assert_eq!(store.subscriber_count(), 1);

    harness.mapper.deactivate();
    assert_eq!(harness.mapper.state(), SessionState::Idle);
    assert_eq!(store.subscriber_count(), 0);

    harness.mapper.activate();
    drop(harness.mapper);
    assert_eq!(store.subscriber_count(), 0);
    assert_eq!(harness.store.current_version(), VersionToken::INITIAL);
}
