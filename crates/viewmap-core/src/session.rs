//! The view mapper: owns the active descriptor list and keeps one view in
//! sync with the store.
//!
//! # Threading
//!
//! A mapper lives on the thread that owns its view. The store may commit from
//! any thread; its notifications arrive through the subscription channel and
//! are only acted on in [`ViewMapper::process_pending_notifications`], called
//! from the owning thread. Each notification runs to completion, batch
//! included, before the next one is looked at.
//!
//! # Lifecycle
//!
//! `Idle -> Active <-> Paused -> Idle`. Only an active mapper is subscribed.
//! Resuming diffs the whole gap since the pause in one step, so a view sees
//! exactly one batch however many versions went by.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::ops::Range;
use std::rc::Weak;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, TryRecvError};

use tracing::{debug, error, info, trace, warn};

use viewmap_model::{MappingId, VersionToken};

use crate::changeset::{ReloadReason, UpdateBatch};
use crate::config::MapperConfig;
use crate::delegate::MapperDelegate;
use crate::descriptor::MappingDescriptor;
use crate::error::{MapperError, Result, StoreError, TranslateError};
use crate::index::CombinedSectionIndex;
use crate::layout::{LayoutSnapshot, SectionSource, SharedLayout};
use crate::sink::ViewSink;
use crate::store::{ChangeStore, VersionAdvanced};
use crate::translate::{TranslateInput, translate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Active,
    Paused,
}

pub struct ViewMapper<S: ChangeStore> {
    store: Arc<S>,
    config: MapperConfig,
    state: SessionState,
    mappings: Vec<MappingDescriptor>,
    index: CombinedSectionIndex,
    version: VersionToken,
    subscription: Option<Receiver<VersionAdvanced>>,
    pending: VecDeque<VersionAdvanced>,
    list_changed_while_paused: bool,
    /// Set when a batch could not reach the view; the next batch is a reload.
    view_stale: Cell<bool>,
    view: Option<Weak<RefCell<dyn ViewSink>>>,
    delegate: Option<Weak<dyn MapperDelegate>>,
    layout: SharedLayout,
}

impl<S: ChangeStore> ViewMapper<S> {
    pub fn new(store: Arc<S>, config: MapperConfig) -> Self {
        Self {
            store,
            config,
            state: SessionState::Idle,
            mappings: Vec::new(),
            index: CombinedSectionIndex::empty(),
            version: VersionToken::INITIAL,
            subscription: None,
            pending: VecDeque::new(),
            list_changed_while_paused: false,
            view_stale: Cell::new(false),
            view: None,
            delegate: None,
            layout: SharedLayout::new(),
        }
    }

    /// Layout the mapper publishes before each batch. Views check batches
    /// against it.
    pub fn layout(&self) -> SharedLayout {
        self.layout.clone()
    }

    /// Attaches the view. An active mapper reloads it right away; a paused
    /// one reloads it on resume.
    pub fn set_view(&mut self, view: Weak<RefCell<dyn ViewSink>>) {
        self.view = Some(view);
        match self.state {
            SessionState::Active => self.apply(
                &UpdateBatch::FullReload(ReloadReason::NoBaseline),
                self.index.total_sections(),
            ),
            SessionState::Paused => self.view_stale.set(true),
            SessionState::Idle => {}
        }
    }

    pub fn set_delegate(&mut self, delegate: Weak<dyn MapperDelegate>) {
        self.delegate = Some(delegate);
    }

    pub fn set_should_animate_updates(&mut self, animate: bool) {
        self.config.should_animate_updates = animate;
    }

    pub fn should_animate_updates(&self) -> bool {
        self.config.should_animate_updates
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Store version the view currently reflects.
    pub fn version(&self) -> VersionToken {
        self.version
    }

    pub fn active_mappings(&self) -> &[MappingDescriptor] {
        &self.mappings
    }

    pub fn index(&self) -> &CombinedSectionIndex {
        &self.index
    }

    /// Descriptor owning a flat section, with the section's local index.
    pub fn mapping_for_section(&self, section: usize) -> Option<(&MappingDescriptor, usize)> {
        let (mapping, local) = self.index.local_section(section).ok()?;
        let descriptor = self.mappings.iter().find(|d| d.id() == mapping)?;
        Some((descriptor, local))
    }

    pub fn section_range_for_mapping(&self, mapping: &MappingId) -> Option<Range<usize>> {
        self.index.section_range(mapping)
    }

    /// Starts observing the store and reloads the view at its current version.
    pub fn activate(&mut self) {
        if self.state != SessionState::Idle {
            debug!(state = ?self.state, "Mapper already activated");
            return;
        }
        self.subscription = Some(self.store.subscribe());
        self.state = SessionState::Active;
        self.list_changed_while_paused = false;

        let target = self.store.current_version();
        let (version, mappings) = self.resnapshot(target);
        info!(%version, mappings = mappings.len(), "Activated view mapper");
        self.install(mappings, version, UpdateBatch::FullReload(ReloadReason::NoBaseline));
    }

    /// Stops observing the store. The view keeps showing the current version.
    pub fn pause(&mut self) {
        if self.state != SessionState::Active {
            debug!(state = ?self.state, "Only an active mapper can pause");
            return;
        }
        self.subscription = None;
        self.pending.clear();
        self.list_changed_while_paused = false;
        self.state = SessionState::Paused;
        debug!(version = %self.version, "Paused view mapper");
    }

    /// Catches up with everything committed while paused, in one batch.
    pub fn resume(&mut self) {
        if self.state != SessionState::Paused {
            debug!(state = ?self.state, "Only a paused mapper can resume");
            return;
        }
        self.subscription = Some(self.store.subscribe());
        self.state = SessionState::Active;

        let forced = if std::mem::take(&mut self.list_changed_while_paused) {
            Some(ReloadReason::MappingsChangedWhilePaused)
        } else if self.view_stale.get() {
            Some(ReloadReason::ViewOutOfSync)
        } else if self.config.reload_on_resume {
            Some(ReloadReason::ReloadOnResume)
        } else {
            None
        };
        let target = self.store.current_version();
        debug!(from = %self.version, to = %target, ?forced, "Resuming view mapper");
        self.advance_to(target, forced);
    }

    /// Stops observing the store for good. Further notifications are ignored.
    pub fn deactivate(&mut self) {
        if self.state == SessionState::Idle {
            return;
        }
        self.subscription = None;
        self.pending.clear();
        self.state = SessionState::Idle;
        debug!(version = %self.version, "Deactivated view mapper");
    }

    /// Replaces the whole descriptor list.
    ///
    /// Descriptors already active are kept as they are; new ones are read from
    /// the store.
    pub fn set_active_mappings(&mut self, ids: &[MappingId], animated: bool) -> Result<()> {
        self.catch_up();
        let mut seen = HashSet::with_capacity(ids.len());
        let mut next = Vec::with_capacity(ids.len());
        for id in ids {
            if !seen.insert(id) {
                return Err(MapperError::DuplicateMapping(id.clone()));
            }
            let descriptor = match self.mappings.iter().find(|d| d.id() == id) {
                Some(existing) => existing.clone(),
                None => self.store.snapshot(id, self.list_version())?,
            };
            next.push(descriptor);
        }
        self.replace_mappings(next, animated)
    }

    pub fn insert_mapping(&mut self, id: MappingId, index: usize, animated: bool) -> Result<()> {
        self.catch_up();
        if self.index.contains(&id) {
            return Err(MapperError::DuplicateMapping(id));
        }
        if index > self.mappings.len() {
            return Err(MapperError::InsertIndexOutOfBounds {
                index,
                len: self.mappings.len(),
            });
        }
        let descriptor = self.store.snapshot(&id, self.list_version())?;
        let mut next = self.mappings.clone();
        next.insert(index, descriptor);
        self.replace_mappings(next, animated)
    }

    pub fn remove_mapping(&mut self, id: &MappingId, animated: bool) -> Result<()> {
        self.catch_up();
        let position = self
            .mappings
            .iter()
            .position(|d| d.id() == id)
            .ok_or_else(|| MapperError::MappingNotActive(id.clone()))?;
        let mut next = self.mappings.clone();
        next.remove(position);
        self.replace_mappings(next, animated)
    }

    /// Applies one store notification. Ignored unless active.
    pub fn handle_notification(&mut self, notification: VersionAdvanced) {
        if self.state != SessionState::Active {
            trace!(state = ?self.state, "Ignoring notification");
            return;
        }
        let Some(target) = notification.latest() else {
            return;
        };
        if target <= self.version {
            trace!(%target, current = %self.version, "Notification already applied");
            return;
        }
        self.advance_to(target, None);
    }

    /// Drains the subscription and applies every queued notification in
    /// order. Returns how many were handled.
    ///
    /// Must be called on the thread that owns the view.
    pub fn process_pending_notifications(&mut self) -> usize {
        let mut disconnected = false;
        if let Some(receiver) = &self.subscription {
            loop {
                match receiver.try_recv() {
                    Ok(notification) => self.pending.push_back(notification),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        disconnected = true;
                        break;
                    }
                }
            }
        }
        if disconnected {
            warn!("Store dropped the subscription");
            self.subscription = None;
        }
        let mut handled = 0;
        while let Some(notification) = self.pending.pop_front() {
            self.handle_notification(notification);
            handled += 1;
        }
        handled
    }

    fn catch_up(&mut self) {
        if self.state == SessionState::Active {
            self.process_pending_notifications();
        }
    }

    /// Version new descriptors are read at. An active mapper reads at the
    /// version the view reflects; otherwise the next activation or resume
    /// re-reads everything, so the store's latest is used.
    fn list_version(&self) -> VersionToken {
        match self.state {
            SessionState::Active => self.version,
            SessionState::Idle | SessionState::Paused => self.store.current_version(),
        }
    }

    fn replace_mappings(&mut self, next: Vec<MappingDescriptor>, animated: bool) -> Result<()> {
        let new_index = CombinedSectionIndex::rebuild(&next)?;

        match self.state {
            SessionState::Idle => {
                self.mappings = next;
                self.index = new_index;
            }
            SessionState::Paused => {
                self.mappings = next;
                self.index = new_index;
                self.list_changed_while_paused = true;
            }
            SessionState::Active => {
                let diffs = BTreeMap::new();
                let batch = translate_or_reload(&TranslateInput {
                    old_index: Some(&self.index),
                    old_mappings: &self.mappings,
                    diffs: &diffs,
                    new_mappings: &next,
                    new_index: &new_index,
                    animate: animated && self.config.should_animate_updates,
                });
                debug!(mappings = next.len(), sections = new_index.total_sections(), "Mapping list changed");
                let version = self.version;
                self.commit(next, new_index, version, batch);
            }
        }
        Ok(())
    }

    /// Moves the view from its current version to `target`.
    ///
    /// With `forced` set, or when any descriptor cannot be diffed, the view
    /// is reloaded from fresh snapshots instead.
    fn advance_to(&mut self, target: VersionToken, forced: Option<ReloadReason>) {
        if let Some(reason) = forced {
            self.reload_at(target, reason);
            return;
        }
        if target <= self.version {
            return;
        }

        let mut diffs = BTreeMap::new();
        let mut next = Vec::with_capacity(self.mappings.len());
        let mut failure = None;
        for descriptor in &self.mappings {
            let step = descriptor.diff(self.store.as_ref(), target).and_then(|diff| {
                if diff.is_empty() {
                    Ok((descriptor.rebased(target), None))
                } else {
                    let snapshot = self.store.snapshot(descriptor.id(), target)?;
                    Ok((snapshot, Some(diff)))
                }
            });
            match step {
                Ok((snapshot, diff)) => {
                    if let Some(diff) = diff {
                        diffs.insert(snapshot.id().clone(), diff);
                    }
                    next.push(snapshot);
                }
                Err(error) => {
                    failure = Some(self.reason_for(descriptor.id(), &error));
                    break;
                }
            }
        }
        if let Some(reason) = failure {
            self.reload_at(target, reason);
            return;
        }

        let new_index = match CombinedSectionIndex::rebuild(&next) {
            Ok(index) => index,
            Err(error) => {
                error!(%error, "Active mappings no longer form a valid index");
                return;
            }
        };
        let batch = translate_or_reload(&TranslateInput {
            old_index: Some(&self.index),
            old_mappings: &self.mappings,
            diffs: &diffs,
            new_mappings: &next,
            new_index: &new_index,
            animate: self.config.should_animate_updates,
        });
        debug!(from = %self.version, to = %target, changed = diffs.len(), "Advancing view");
        self.commit(next, new_index, target, batch);
    }

    fn reason_for(&self, mapping: &MappingId, error: &StoreError) -> ReloadReason {
        match error {
            StoreError::StaleVersion { earliest, .. } => {
                warn!(
                    mapping = %mapping,
                    from = %self.version,
                    %earliest,
                    "Version no longer retained, re-baselining"
                );
                ReloadReason::StaleVersion
            }
            StoreError::UnknownSource(_) => {
                warn!(mapping = %mapping, "Source no longer available");
                ReloadReason::SourceUnavailable
            }
            StoreError::FutureVersion { .. } => {
                warn!(mapping = %mapping, %error, "Store cannot diff to the notified version");
                ReloadReason::LookupFailed
            }
        }
    }

    /// Reloads the view from snapshots at `target`. A stale baseline reloads
    /// at the notified version rather than the earliest retained one, so the
    /// view lands on the newest state in one step.
    fn reload_at(&mut self, target: VersionToken, reason: ReloadReason) {
        let (version, mappings) = self.resnapshot(target);
        info!(%version, %reason, "Reloading view");
        self.install(mappings, version, UpdateBatch::FullReload(reason));
    }

    fn install(&mut self, mappings: Vec<MappingDescriptor>, version: VersionToken, batch: UpdateBatch) {
        match CombinedSectionIndex::rebuild(&mappings) {
            Ok(index) => self.commit(mappings, index, version, batch),
            Err(error) => error!(%error, "Active mappings no longer form a valid index"),
        }
    }

    /// Fresh snapshots of every active descriptor at `target`, falling back
    /// to the store's current version when `target` cannot be read. The
    /// earliest retained version is never used as a baseline.
    fn resnapshot(&self, target: VersionToken) -> (VersionToken, Vec<MappingDescriptor>) {
        match self.snapshot_all(target) {
            Ok(mappings) => (target, mappings),
            Err(first) => {
                let current = self.store.current_version();
                warn!(
                    error = %first,
                    %target,
                    %current,
                    earliest = %self.store.earliest_retained_version(),
                    "Snapshot failed, re-baselining at the current version"
                );
                match self.snapshot_all(current) {
                    Ok(mappings) => (current, mappings),
                    Err(error) => {
                        error!(%error, "Store cannot produce snapshots, clearing the view");
                        (current, Vec::new())
                    }
                }
            }
        }
    }

    fn snapshot_all(&self, version: VersionToken) -> std::result::Result<Vec<MappingDescriptor>, StoreError> {
        let mut mappings = Vec::with_capacity(self.mappings.len());
        for descriptor in &self.mappings {
            match self.store.snapshot(descriptor.id(), version) {
                Ok(snapshot) => mappings.push(snapshot),
                Err(StoreError::UnknownSource(id)) => {
                    warn!(mapping = %id, "Source no longer available, dropping mapping");
                }
                Err(error) => return Err(error),
            }
        }
        Ok(mappings)
    }

    /// Swaps in the new state in one step, publishes it and applies `batch`.
    fn commit(
        &mut self,
        mappings: Vec<MappingDescriptor>,
        index: CombinedSectionIndex,
        version: VersionToken,
        batch: UpdateBatch,
    ) {
        let old_total = self.index.total_sections();
        self.layout.publish(LayoutSnapshot::from_mappings(&mappings));
        self.mappings = mappings;
        self.index = index;
        self.version = version;
        self.apply(&batch, old_total);
    }

    fn apply(&self, batch: &UpdateBatch, old_total: usize) {
        let stale = self.view_stale.get();
        if let UpdateBatch::Changes(changes) = batch {
            if changes.is_empty() && !stale {
                trace!(version = %self.version, "Nothing to apply");
                return;
            }
        }
        let recovery = UpdateBatch::FullReload(ReloadReason::ViewOutOfSync);
        let batch = if stale { &recovery } else { batch };

        let delegate = self.delegate.as_ref().and_then(Weak::upgrade);
        if let Some(delegate) = &delegate {
            delegate.will_begin_update(self);
        }
        match self.view.as_ref().and_then(Weak::upgrade) {
            Some(view) => match view.try_borrow_mut() {
                Ok(mut sink) => {
                    drive(&mut *sink, batch, old_total);
                    self.view_stale.set(false);
                }
                Err(_) => {
                    warn!("View is busy, reloading it with the next batch");
                    self.view_stale.set(true);
                }
            },
            None => trace!("No view attached, skipping batch"),
        }
        if let Some(delegate) = &delegate {
            delegate.did_end_update(self);
        }
    }
}

impl<S: ChangeStore> SectionSource for ViewMapper<S> {
    fn number_of_sections(&self) -> usize {
        self.index.total_sections()
    }

    fn number_of_items_in_section(&self, section: usize) -> usize {
        self.index.rows_in_section(section).unwrap_or(0)
    }

    fn group_for_section(&self, section: usize) -> Option<&str> {
        self.mapping_for_section(section)
            .and_then(|(descriptor, local)| descriptor.group(local))
    }
}

impl<S: ChangeStore> Drop for ViewMapper<S> {
    fn drop(&mut self) {
        self.deactivate();
    }
}

fn translate_or_reload(input: &TranslateInput<'_>) -> UpdateBatch {
    match translate(input) {
        Ok(batch) => batch,
        Err(TranslateError::InconsistentBatch { reason }) => {
            error!(%reason, "Inconsistent batch, reloading view");
            UpdateBatch::FullReload(ReloadReason::InconsistentBatch)
        }
        Err(TranslateError::Index(error)) => {
            warn!(%error, "Coordinate lookup failed, reloading view");
            UpdateBatch::FullReload(ReloadReason::LookupFailed)
        }
    }
}

fn drive(sink: &mut dyn ViewSink, batch: &UpdateBatch, old_total: usize) {
    match batch {
        UpdateBatch::FullReload(reason) => {
            debug!(%reason, "Reloading view");
            sink.reload_all();
        }
        UpdateBatch::Changes(changes) => {
            let shown = sink.number_of_sections();
            if shown != old_total {
                warn!(
                    shown,
                    expected = old_total,
                    reason = %ReloadReason::ViewOutOfSync,
                    "Reloading view"
                );
                sink.reload_all();
                return;
            }
            debug!(
                sections_deleted = changes.deleted_sections.len(),
                sections_inserted = changes.inserted_sections.len(),
                items_deleted = changes.deleted_items.len(),
                items_inserted = changes.inserted_items.len(),
                moves = changes.moved_items.len(),
                reloads = changes.reloaded_items.len() + changes.reloaded_after_move.len(),
                "Applying batch"
            );
            let finished = sink.perform_batch(&mut |sink: &mut dyn ViewSink| changes.apply_to(sink));
            if !finished {
                warn!("View rejected batch and reloaded");
            }
        }
    }
}
