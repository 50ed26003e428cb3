//! The data-source side of the view: what sections exist and how many items
//! each one holds.

use std::cell::RefCell;
use std::rc::Rc;

use viewmap_model::MappingId;

use crate::descriptor::MappingDescriptor;

/// Read access to the combined layout, as a list view's data source sees it.
pub trait SectionSource {
    fn number_of_sections(&self) -> usize;

    /// Zero for sections that do not exist.
    fn number_of_items_in_section(&self, section: usize) -> usize;

    fn group_for_section(&self, section: usize) -> Option<&str>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionInfo {
    pub mapping: MappingId,
    pub group: String,
    pub items: usize,
}

/// Flattened layout of an ordered descriptor list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayoutSnapshot {
    sections: Vec<SectionInfo>,
}

impl LayoutSnapshot {
    pub fn from_mappings(mappings: &[MappingDescriptor]) -> Self {
        let sections = mappings
            .iter()
            .flat_map(|descriptor| {
                descriptor.groups().iter().map(|group| SectionInfo {
                    mapping: descriptor.id().clone(),
                    group: group.name.clone(),
                    items: group.rows,
                })
            })
            .collect();
        Self { sections }
    }

    pub fn sections(&self) -> &[SectionInfo] {
        &self.sections
    }

    pub fn item_counts(&self) -> Vec<usize> {
        self.sections.iter().map(|s| s.items).collect()
    }
}

impl SectionSource for LayoutSnapshot {
    fn number_of_sections(&self) -> usize {
        self.sections.len()
    }

    fn number_of_items_in_section(&self, section: usize) -> usize {
        self.sections.get(section).map_or(0, |s| s.items)
    }

    fn group_for_section(&self, section: usize) -> Option<&str> {
        self.sections.get(section).map(|s| s.group.as_str())
    }
}

/// Layout published by a view mapper for the views it drives.
///
/// The mapper replaces the snapshot before it issues any batch, so a view
/// reading it while committing a batch sees the post-update layout.
#[derive(Debug, Clone, Default)]
pub struct SharedLayout(Rc<RefCell<LayoutSnapshot>>);

impl SharedLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, snapshot: LayoutSnapshot) {
        *self.0.borrow_mut() = snapshot;
    }

    pub fn snapshot(&self) -> LayoutSnapshot {
        self.0.borrow().clone()
    }

    pub fn item_counts(&self) -> Vec<usize> {
        self.0.borrow().item_counts()
    }

    pub fn number_of_sections(&self) -> usize {
        self.0.borrow().number_of_sections()
    }
}
