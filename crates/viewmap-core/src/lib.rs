//! Combines independently versioned, sectioned sources into one flat section
//! space and keeps a list or grid view in sync with their changes.
//!
//! The [`ViewMapper`] owns an ordered list of [`MappingDescriptor`]s, lays
//! them out end to end through a [`CombinedSectionIndex`], and turns every
//! store change into one batch of flat-space operations on a [`ViewSink`].

pub mod changeset;
pub mod config;
pub mod delegate;
pub mod descriptor;
pub mod error;
pub mod index;
pub mod layout;
pub mod session;
pub mod sink;
pub mod store;
pub mod translate;

pub use changeset::{PendingChangeSet, ReloadReason, UpdateBatch};
pub use config::MapperConfig;
pub use delegate::MapperDelegate;
pub use descriptor::{GroupLayout, MappingDescriptor};
pub use error::{IndexError, MapperError, Result, StoreError, TranslateError};
pub use index::{CombinedSectionIndex, SectionRange};
pub use layout::{LayoutSnapshot, SectionInfo, SectionSource, SharedLayout};
pub use session::{SessionState, ViewMapper};
pub use sink::{GridSink, ListSink, RecordedBatch, RowAnimation, ViewSink};
pub use store::{ChangeStore, VersionAdvanced};
pub use translate::{TranslateInput, translate};
