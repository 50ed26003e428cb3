//! Error types for the mapping engine.
//!
//! Lookup and translation errors are recovered inside the engine by degrading
//! to a full reload; only [`MapperError`] reaches callers, and only for
//! mistakes made on the mutation entry points.

use thiserror::Error;

use viewmap_model::{MappingId, VersionToken};

/// Failed lookups in a [`CombinedSectionIndex`](crate::CombinedSectionIndex).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    /// Mapping is not active, or has no such local section.
    #[error("mapping '{mapping}' has no active section {section}")]
    NotFound { mapping: MappingId, section: usize },

    /// Flat section beyond the combined space.
    #[error("flat section {section} is out of range (total sections: {total})")]
    OutOfRange { section: usize, total: usize },

    /// The same mapping appears twice in one list.
    #[error("mapping '{0}' appears more than once")]
    DuplicateMapping(MappingId),
}

/// Errors reported by a [`ChangeStore`](crate::ChangeStore).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store has no source with this id.
    #[error("unknown source '{0}'")]
    UnknownSource(MappingId),

    /// The requested version is no longer retained.
    #[error("version {requested} is no longer retained (earliest: {earliest})")]
    StaleVersion {
        requested: VersionToken,
        earliest: VersionToken,
    },

    /// The requested version has not been committed yet.
    #[error("version {requested} does not exist yet (current: {current})")]
    FutureVersion {
        requested: VersionToken,
        current: VersionToken,
    },
}

/// Errors from turning descriptor diffs into flat operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslateError {
    #[error(transparent)]
    Index(#[from] IndexError),

    /// The produced batch breaks the structural rules of a list view.
    #[error("inconsistent batch: {reason}")]
    InconsistentBatch { reason: String },
}

impl TranslateError {
    pub(crate) fn inconsistent(reason: impl Into<String>) -> Self {
        Self::InconsistentBatch {
            reason: reason.into(),
        }
    }
}

/// Errors returned from [`ViewMapper`](crate::ViewMapper) mutation calls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapperError {
    #[error("mapping '{0}' is already active")]
    DuplicateMapping(MappingId),

    #[error("mapping '{0}' is not active")]
    MappingNotActive(MappingId),

    #[error("insert index {index} is out of bounds (active mappings: {len})")]
    InsertIndexOutOfBounds { index: usize, len: usize },

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, MapperError>;
