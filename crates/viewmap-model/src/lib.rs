pub mod coordinate;
pub mod diff;
pub mod error;
pub mod ids;
pub mod operation;
pub mod utils;

pub use coordinate::{Coordinate, GroupPath};
pub use diff::{MappingDiff, RowChange, SectionChange};
pub use error::{ModelError, Result};
pub use ids::{MappingId, VersionToken};
pub use operation::ViewOperation;
