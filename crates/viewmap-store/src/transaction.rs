//! Mutations applied inside one commit.

use viewmap_model::{GroupPath, MappingId, ModelError};

use crate::error::{Result, TransactionError};
use crate::state::{Group, Row, SourceState, StoreState};

/// Working copy handed to a commit closure.
///
/// Changes only become visible when the closure returns `Ok`.
#[derive(Debug)]
pub struct Transaction<'a> {
    state: &'a mut StoreState,
    operations: usize,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(state: &'a mut StoreState) -> Self {
        Self {
            state,
            operations: 0,
        }
    }

    /// Number of operations applied so far.
    pub fn operations(&self) -> usize {
        self.operations
    }

    /// The source as changed so far in this transaction.
    pub fn source(&self, id: &MappingId) -> Option<&SourceState> {
        self.state.source(id)
    }

    pub fn create_source(&mut self, id: &MappingId) -> Result<()> {
        if self.state.sources.contains_key(id) {
            return Err(TransactionError::DuplicateSource(id.clone()));
        }
        self.state.sources.insert(id.clone(), SourceState::default());
        self.operations += 1;
        Ok(())
    }

    pub fn insert_group(&mut self, id: &MappingId, name: &str, index: usize) -> Result<()> {
        if name.trim().is_empty() {
            return Err(ModelError::InvalidGroupName(name.to_string()).into());
        }
        let name = name.trim();
        let source = self.source_mut(id)?;
        if source.group_index(name).is_some() {
            return Err(TransactionError::DuplicateGroup {
                source_id: id.clone(),
                group: name.to_string(),
            });
        }
        check_position(id, index, source.groups.len())?;
        source.groups.insert(index, Group::new(name));
        self.operations += 1;
        Ok(())
    }

    /// Removes a group together with its rows.
    pub fn remove_group(&mut self, id: &MappingId, name: &str) -> Result<()> {
        let source = self.source_mut(id)?;
        let index = group_index(id, source, name)?;
        source.groups.remove(index);
        self.operations += 1;
        Ok(())
    }

    pub fn insert_row(&mut self, id: &MappingId, group: &str, index: usize, key: &str) -> Result<()> {
        let source = self.source_mut(id)?;
        if source.locate(key).is_some() {
            return Err(TransactionError::DuplicateRow {
                source_id: id.clone(),
                key: key.to_string(),
            });
        }
        let target = group_index(id, source, group)?;
        let rows = &mut source.groups[target].rows;
        check_position(id, index, rows.len())?;
        rows.insert(index, Row::new(key));
        self.operations += 1;
        Ok(())
    }

    pub fn remove_row(&mut self, id: &MappingId, key: &str) -> Result<()> {
        let source = self.source_mut(id)?;
        let path = locate(id, source, key)?;
        source.groups[path.group].rows.remove(path.row);
        self.operations += 1;
        Ok(())
    }

    /// Moves a row to `index` of `group`, counted after the row has been
    /// taken out of its current place.
    pub fn move_row(&mut self, id: &MappingId, key: &str, group: &str, index: usize) -> Result<()> {
        let source = self.source_mut(id)?;
        let from = locate(id, source, key)?;
        let target = group_index(id, source, group)?;
        let len = source.groups[target].rows.len() - usize::from(from.group == target);
        check_position(id, index, len)?;
        let row = source.groups[from.group].rows.remove(from.row);
        source.groups[target].rows.insert(index, row);
        self.operations += 1;
        Ok(())
    }

    /// Marks a row's content as changed.
    pub fn touch_row(&mut self, id: &MappingId, key: &str) -> Result<()> {
        let source = self.source_mut(id)?;
        let path = locate(id, source, key)?;
        source.groups[path.group].rows[path.row].revision += 1;
        self.operations += 1;
        Ok(())
    }

    fn source_mut(&mut self, id: &MappingId) -> Result<&mut SourceState> {
        self.state
            .sources
            .get_mut(id)
            .ok_or_else(|| TransactionError::UnknownSource(id.clone()))
    }
}

fn group_index(id: &MappingId, source: &SourceState, name: &str) -> Result<usize> {
    source
        .group_index(name)
        .ok_or_else(|| TransactionError::UnknownGroup {
            source_id: id.clone(),
            group: name.to_string(),
        })
}

fn locate(id: &MappingId, source: &SourceState, key: &str) -> Result<GroupPath> {
    source.locate(key).ok_or_else(|| TransactionError::UnknownRow {
        source_id: id.clone(),
        key: key.to_string(),
    })
}

fn check_position(id: &MappingId, index: usize, len: usize) -> Result<()> {
    if index > len {
        return Err(TransactionError::IndexOutOfBounds {
            source_id: id.clone(),
            index,
            len,
        });
    }
    Ok(())
}
