//! Local and flat positions.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A row inside one descriptor, addressed by the descriptor's own group index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupPath {
    pub group: usize,
    pub row: usize,
}

impl GroupPath {
    pub const fn new(group: usize, row: usize) -> Self {
        Self { group, row }
    }
}

impl fmt::Display for GroupPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}:{}", self.group, self.row)
    }
}

/// An item in the combined, UI-facing section space.
///
/// Ordered by section first, then item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Coordinate {
    pub section: usize,
    pub item: usize,
}

impl Coordinate {
    pub const fn new(section: usize, item: usize) -> Self {
        Self { section, item }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.section, self.item)
    }
}
