//! The in-memory store.

use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::{debug, trace};

use viewmap_core::{ChangeStore, MappingDescriptor, StoreError, VersionAdvanced};
use viewmap_model::{MappingDiff, MappingId, VersionToken};

use crate::config::StoreConfig;
use crate::diff::diff_sources;
use crate::error::TransactionError;
use crate::state::{SourceState, StoreState};
use crate::transaction::Transaction;

/// Versioned store of named sources, safe to share across threads.
///
/// Every successful [`commit`](Self::commit) produces the next version and
/// notifies every live subscriber. The last
/// [`max_retained_versions`](StoreConfig::max_retained_versions) versions stay
/// available for snapshots and diffs.
#[derive(Debug)]
pub struct MemoryStore {
    config: StoreConfig,
    history: RwLock<VecDeque<(VersionToken, Arc<StoreState>)>>,
    notifier: Mutex<Notifier>,
}

#[derive(Debug, Default)]
struct Notifier {
    subscribers: Vec<Sender<VersionAdvanced>>,
    /// Versions committed while notifications are held.
    held: Option<Vec<VersionToken>>,
}

impl Notifier {
    fn send(&mut self, notification: &VersionAdvanced) {
        self.subscribers
            .retain(|subscriber| subscriber.send(notification.clone()).is_ok());
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl MemoryStore {
    /// An empty store at the initial version.
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            history: RwLock::new(VecDeque::from([(
                VersionToken::INITIAL,
                Arc::new(StoreState::default()),
            )])),
            notifier: Mutex::new(Notifier::default()),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Applies `changes` atomically and returns the new version.
    ///
    /// When `changes` fails nothing is committed and no one is notified.
    pub fn commit<F>(&self, changes: F) -> Result<VersionToken, TransactionError>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<(), TransactionError>,
    {
        let mut history = self.history.write().unwrap_or_else(PoisonError::into_inner);
        let (current, latest) = history
            .back()
            .map(|(version, state)| (*version, Arc::clone(state)))
            .unwrap_or_default();
        let mut next = StoreState::clone(&latest);
        let mut txn = Transaction::new(&mut next);
        changes(&mut txn)?;
        let operations = txn.operations();

        let version = current.next();
        history.push_back((version, Arc::new(next)));
        while history.len() > self.config.retained() {
            history.pop_front();
        }
        debug!(%version, operations, "Committed store version");

        // notify before releasing the history so subscribers see versions in order
        let mut notifier = self.notifier.lock().unwrap_or_else(PoisonError::into_inner);
        drop(history);
        match &mut notifier.held {
            Some(held) => held.push(version),
            None => notifier.send(&VersionAdvanced::single(version)),
        }
        Ok(version)
    }

    /// Queues notifications instead of sending them, until
    /// [`release_notifications`](Self::release_notifications).
    pub fn hold_notifications(&self) {
        let mut notifier = self.notifier.lock().unwrap_or_else(PoisonError::into_inner);
        notifier.held.get_or_insert_with(Vec::new);
    }

    /// Sends every held version as one notification.
    pub fn release_notifications(&self) {
        let mut notifier = self.notifier.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(held) = notifier.held.take() {
            if !held.is_empty() {
                trace!(versions = held.len(), "Releasing held notifications");
                notifier.send(&VersionAdvanced::new(held));
            }
        }
    }

    /// Number of subscribers whose receiving end is still alive as of the
    /// last notification.
    pub fn subscriber_count(&self) -> usize {
        self.notifier
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .subscribers
            .len()
    }

    /// Full contents at `version`.
    pub fn state_at(&self, version: VersionToken) -> Result<Arc<StoreState>, StoreError> {
        let history = self.history.read().unwrap_or_else(PoisonError::into_inner);
        let (earliest, current) = bounds(&history);
        if version > current {
            return Err(StoreError::FutureVersion {
                requested: version,
                current,
            });
        }
        history
            .iter()
            .find(|(token, _)| *token == version)
            .map(|(_, state)| Arc::clone(state))
            .ok_or(StoreError::StaleVersion {
                requested: version,
                earliest,
            })
    }
}

fn source_in<'a>(state: &'a StoreState, mapping: &MappingId) -> Result<&'a SourceState, StoreError> {
    state
        .source(mapping)
        .ok_or_else(|| StoreError::UnknownSource(mapping.clone()))
}

fn bounds(history: &VecDeque<(VersionToken, Arc<StoreState>)>) -> (VersionToken, VersionToken) {
    let earliest = history.front().map(|(v, _)| *v).unwrap_or_default();
    let current = history.back().map(|(v, _)| *v).unwrap_or_default();
    (earliest, current)
}

impl ChangeStore for MemoryStore {
    fn current_version(&self) -> VersionToken {
        bounds(&self.history.read().unwrap_or_else(PoisonError::into_inner)).1
    }

    fn earliest_retained_version(&self) -> VersionToken {
        bounds(&self.history.read().unwrap_or_else(PoisonError::into_inner)).0
    }

    fn snapshot(
        &self,
        mapping: &MappingId,
        version: VersionToken,
    ) -> Result<MappingDescriptor, StoreError> {
        let state = self.state_at(version)?;
        Ok(source_in(&state, mapping)?.describe(mapping.clone(), version))
    }

    fn diff(
        &self,
        mapping: &MappingId,
        from: VersionToken,
        to: VersionToken,
    ) -> Result<MappingDiff, StoreError> {
        let old_state = self.state_at(from)?;
        let old = source_in(&old_state, mapping)?;
        if from == to {
            return Ok(MappingDiff::new());
        }
        let new_state = self.state_at(to)?;
        let diff = diff_sources(old, source_in(&new_state, mapping)?);
        trace!(
            mapping = %mapping,
            %from,
            %to,
            sections = diff.section_changes.len(),
            rows = diff.row_changes.len(),
            "Computed diff"
        );
        Ok(diff)
    }

    fn subscribe(&self) -> Receiver<VersionAdvanced> {
        let (sender, receiver) = mpsc::channel();
        self.notifier
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .subscribers
            .push(sender);
        receiver
    }
}
