//! Library side of the `viewmap` binary: logging setup, scenario files and
//! the replay driver.

pub mod logging;
pub mod replay;
pub mod scenario;
pub mod summary;
