//! Combined section index: one flat section space over an ordered list of
//! descriptors.
//!
//! The index is the only place flat coordinates are computed. It is rebuilt
//! from scratch whenever the descriptor list (or any descriptor's version)
//! changes, and a rebuilt index replaces the previous one in a single
//! assignment, so a half-built index is never observable.

use std::collections::HashMap;
use std::ops::Range;

use viewmap_model::{Coordinate, GroupPath, MappingId};

use crate::descriptor::MappingDescriptor;
use crate::error::IndexError;

/// Contiguous block of flat sections owned by one descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionRange {
    pub mapping: MappingId,
    pub start: usize,
    pub len: usize,
}

impl SectionRange {
    pub fn end(&self) -> usize {
        self.start + self.len
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CombinedSectionIndex {
    ranges: Vec<SectionRange>,
    slots: HashMap<MappingId, usize>,
    rows: Vec<usize>,
}

impl CombinedSectionIndex {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Concatenates the descriptors' groups in list order.
    pub fn rebuild(mappings: &[MappingDescriptor]) -> Result<Self, IndexError> {
        let mut ranges = Vec::with_capacity(mappings.len());
        let mut slots = HashMap::with_capacity(mappings.len());
        let mut rows = Vec::new();
        let mut start = 0;

        for (slot, descriptor) in mappings.iter().enumerate() {
            if slots.insert(descriptor.id().clone(), slot).is_some() {
                return Err(IndexError::DuplicateMapping(descriptor.id().clone()));
            }
            let len = descriptor.number_of_groups();
            rows.extend(descriptor.groups().iter().map(|g| g.rows));
            ranges.push(SectionRange {
                mapping: descriptor.id().clone(),
                start,
                len,
            });
            start += len;
        }

        Ok(Self {
            ranges,
            slots,
            rows,
        })
    }

    pub fn total_sections(&self) -> usize {
        self.rows.len()
    }

    pub fn ranges(&self) -> &[SectionRange] {
        &self.ranges
    }

    /// Item counts per flat section.
    pub fn row_counts(&self) -> &[usize] {
        &self.rows
    }

    pub fn rows_in_section(&self, section: usize) -> Option<usize> {
        self.rows.get(section).copied()
    }

    pub fn contains(&self, mapping: &MappingId) -> bool {
        self.slots.contains_key(mapping)
    }

    pub fn section_range(&self, mapping: &MappingId) -> Option<Range<usize>> {
        self.slots
            .get(mapping)
            .map(|&slot| self.ranges[slot].range())
    }

    pub fn flat_section(&self, mapping: &MappingId, local: usize) -> Result<usize, IndexError> {
        let not_found = || IndexError::NotFound {
            mapping: mapping.clone(),
            section: local,
        };
        let slot = *self.slots.get(mapping).ok_or_else(not_found)?;
        let range = &self.ranges[slot];
        if local >= range.len {
            return Err(not_found());
        }
        Ok(range.start + local)
    }

    pub fn local_section(&self, flat: usize) -> Result<(&MappingId, usize), IndexError> {
        if flat >= self.total_sections() {
            return Err(IndexError::OutOfRange {
                section: flat,
                total: self.total_sections(),
            });
        }
        // ends are non-decreasing; the first range ending past `flat` holds it
        let slot = self.ranges.partition_point(|r| r.end() <= flat);
        let range = &self.ranges[slot];
        Ok((&range.mapping, flat - range.start))
    }

    pub fn flat_coordinate(
        &self,
        mapping: &MappingId,
        path: GroupPath,
    ) -> Result<Coordinate, IndexError> {
        let section = self.flat_section(mapping, path.group)?;
        Ok(Coordinate::new(section, path.row))
    }

    /// Ranges are contiguous, in order, and cover exactly `[0, total_sections)`.
    pub fn is_consistent(&self) -> bool {
        let mut expected_start = 0;
        for range in &self.ranges {
            if range.start != expected_start {
                return false;
            }
            expected_start = range.end();
        }
        expected_start == self.total_sections() && self.slots.len() == self.ranges.len()
    }
}
