//! The store collaborator: versioned snapshots, diffs and change notifications.

use std::sync::mpsc::Receiver;

use serde::{Deserialize, Serialize};

use viewmap_model::{MappingDiff, MappingId, VersionToken};

use crate::descriptor::MappingDescriptor;
use crate::error::StoreError;

/// A store advanced through one or more versions.
///
/// `versions` lists every version committed since the previous notification,
/// oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionAdvanced {
    pub versions: Vec<VersionToken>,
}

impl VersionAdvanced {
    pub fn new(versions: Vec<VersionToken>) -> Self {
        Self { versions }
    }

    pub fn single(version: VersionToken) -> Self {
        Self {
            versions: vec![version],
        }
    }

    /// The newest version this notification advanced to.
    pub fn latest(&self) -> Option<VersionToken> {
        self.versions.iter().copied().max()
    }
}

/// Everything the view mapper needs from the underlying store.
///
/// Diffs must be computable in time proportional to the size of the change,
/// and must cover the whole `from..to` gap in one answer.
pub trait ChangeStore: Send + Sync {
    fn current_version(&self) -> VersionToken;

    /// Oldest version still answerable by [`snapshot`](Self::snapshot) and
    /// [`diff`](Self::diff).
    fn earliest_retained_version(&self) -> VersionToken;

    /// Read-only layout of one source at `version`.
    fn snapshot(
        &self,
        mapping: &MappingId,
        version: VersionToken,
    ) -> Result<MappingDescriptor, StoreError>;

    fn diff(
        &self,
        mapping: &MappingId,
        from: VersionToken,
        to: VersionToken,
    ) -> Result<MappingDiff, StoreError>;

    /// Registers for change notifications.
    ///
    /// Notifications may be sent from any thread; the receiving end is drained
    /// on the thread that owns the view mapper. Dropping the receiver
    /// unsubscribes.
    fn subscribe(&self) -> Receiver<VersionAdvanced>;
}
