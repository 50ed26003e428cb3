//! Memory store configuration.

use serde::{Deserialize, Serialize};

/// How much history a [`MemoryStore`](crate::MemoryStore) keeps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Number of versions kept for snapshots and diffs, current one included.
    ///
    /// Older versions are dropped on commit; asking for them afterwards
    /// yields a stale-version error. Values below 1 are treated as 1.
    pub max_retained_versions: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_retained_versions: 64,
        }
    }
}

impl StoreConfig {
    #[must_use]
    pub fn with_max_retained_versions(mut self, versions: usize) -> Self {
        self.max_retained_versions = versions;
        self
    }

    pub(crate) fn retained(&self) -> usize {
        self.max_retained_versions.max(1)
    }
}
