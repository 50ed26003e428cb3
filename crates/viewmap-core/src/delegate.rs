//! Observer notified around every batch a view mapper applies.

use crate::layout::SectionSource;

/// Both callbacks fire exactly once per batch, full reloads included, and
/// also when the view has already been released.
pub trait MapperDelegate {
    fn will_begin_update(&self, _source: &dyn SectionSource) {}

    fn did_end_update(&self, _source: &dyn SectionSource) {}
}
