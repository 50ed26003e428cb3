//! One call against a view sink, as data.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::coordinate::Coordinate;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ViewOperation {
    ReloadAll,
    DeleteSections { sections: BTreeSet<usize> },
    InsertSections { sections: BTreeSet<usize> },
    DeleteItems { items: Vec<Coordinate> },
    InsertItems { items: Vec<Coordinate> },
    MoveItem { from: Coordinate, to: Coordinate },
    ReloadItems { items: Vec<Coordinate> },
}

impl ViewOperation {
    /// Short name used in logs and tables.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ReloadAll => "reload_all",
            Self::DeleteSections { .. } => "delete_sections",
            Self::InsertSections { .. } => "insert_sections",
            Self::DeleteItems { .. } => "delete_items",
            Self::InsertItems { .. } => "insert_items",
            Self::MoveItem { .. } => "move_item",
            Self::ReloadItems { .. } => "reload_items",
        }
    }

    pub fn is_section_level(&self) -> bool {
        matches!(
            self,
            Self::DeleteSections { .. } | Self::InsertSections { .. }
        )
    }

    pub fn is_item_level(&self) -> bool {
        matches!(
            self,
            Self::DeleteItems { .. }
                | Self::InsertItems { .. }
                | Self::MoveItem { .. }
                | Self::ReloadItems { .. }
        )
    }
}

impl fmt::Display for ViewOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReloadAll => f.write_str("reload_all"),
            Self::DeleteSections { sections } | Self::InsertSections { sections } => {
                write!(f, "{}(", self.name())?;
                write_joined(f, sections.iter())?;
                f.write_str(")")
            }
            Self::DeleteItems { items }
            | Self::InsertItems { items }
            | Self::ReloadItems { items } => {
                write!(f, "{}(", self.name())?;
                write_joined(f, items.iter())?;
                f.write_str(")")
            }
            Self::MoveItem { from, to } => write!(f, "move_item({from} -> {to})"),
        }
    }
}

fn write_joined<T: fmt::Display>(
    f: &mut fmt::Formatter<'_>,
    values: impl Iterator<Item = T>,
) -> fmt::Result {
    for (idx, value) in values.enumerate() {
        if idx > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{value}")?;
    }
    Ok(())
}
