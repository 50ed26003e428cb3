//! In-memory implementation of the [`ChangeStore`](viewmap_core::ChangeStore)
//! contract: named sources of grouped, keyed rows, a bounded version history
//! and structural diffs computed by key identity.

pub mod config;
pub mod diff;
pub mod error;
pub mod state;
pub mod store;
pub mod transaction;

pub use config::StoreConfig;
pub use diff::diff_sources;
pub use error::{Result, TransactionError};
pub use state::{Group, Row, SourceState, StoreState};
pub use store::MemoryStore;
pub use transaction::Transaction;
