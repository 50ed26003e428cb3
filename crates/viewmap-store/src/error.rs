//! Transaction errors.
//!
//! A failing operation aborts the whole commit; the store keeps its previous
//! version untouched.

use thiserror::Error;

use viewmap_model::{MappingId, ModelError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    #[error("source '{0}' already exists")]
    DuplicateSource(MappingId),

    #[error("unknown source '{0}'")]
    UnknownSource(MappingId),

    #[error("source '{source_id}' already has a group named '{group}'")]
    DuplicateGroup { source_id: MappingId, group: String },

    #[error("source '{source_id}' has no group named '{group}'")]
    UnknownGroup { source_id: MappingId, group: String },

    #[error("source '{source_id}' already has a row with key '{key}'")]
    DuplicateRow { source_id: MappingId, key: String },

    #[error("source '{source_id}' has no row with key '{key}'")]
    UnknownRow { source_id: MappingId, key: String },

    /// Insert position past the end of the target list.
    #[error("position {index} is out of bounds in '{source_id}' (length: {len})")]
    IndexOutOfBounds {
        source_id: MappingId,
        index: usize,
        len: usize,
    },

    #[error(transparent)]
    Model(#[from] ModelError),
}

pub type Result<T> = std::result::Result<T, TransactionError>;
