// pending.rs - Locally staged cell toggles awaiting submission

use indexmap::IndexMap;

use crate::error::ClientError;

/// Cell indices the user has toggled but not yet submitted.
///
/// Toggling and membership checks are constant time. Unstaging leaves a
/// tombstone instead of shifting later entries, so a flush submits cells in
/// the order they were first clicked.
#[derive(Debug, Clone)]
pub struct PendingEditBuffer {
    cell_count: usize,
    // index -> currently staged
    cells: IndexMap<usize, bool>,
    staged: usize,
}

impl PendingEditBuffer {
    pub fn new(cell_count: usize) -> Self {
        Self { cell_count, cells: IndexMap::new(), staged: 0 }
    }

    /// Local XOR: stages `index` if absent, unstages it otherwise. Returns
    /// whether the cell is staged afterwards.
    pub fn toggle(&mut self, index: usize) -> Result<bool, ClientError> {
        if index >= self.cell_count {
            return Err(ClientError::CellOutOfRange { index, cell_count: self.cell_count });
        }
        let staged = self.cells.entry(index).or_insert(false);
        *staged = !*staged;
        if *staged {
            self.staged += 1;
        } else {
            self.staged -= 1;
        }
        Ok(*staged)
    }

    pub fn contains(&self, index: usize) -> bool {
        self.cells.get(&index).copied().unwrap_or(false)
    }

    /// Takes the staged cells and leaves the buffer empty in one step.
    /// Toggles made afterwards start a new, separate batch.
    pub fn flush_and_get(&mut self) -> Vec<usize> {
        self.staged = 0;
        std::mem::take(&mut self.cells)
            .into_iter()
            .filter_map(|(index, staged)| staged.then_some(index))
            .collect()
    }

    /// Puts a flushed batch back in front of anything staged since, for a
    /// submission the backend refused. A cell toggled again in the meantime
    /// stays unstaged.
    pub fn restore(&mut self, indices: Vec<usize>) {
        let later = std::mem::take(&mut self.cells);
        let cell_count = self.cell_count;
        self.staged = 0;
        for index in indices.into_iter().filter(|&index| index < cell_count) {
            if self.cells.insert(index, true).is_none() {
                self.staged += 1;
            }
        }
        for (index, staged) in later {
            if !staged {
                continue;
            }
            match self.cells.get_mut(&index) {
                Some(existing) => {
                    *existing = false;
                    self.staged -= 1;
                }
                None => {
                    self.cells.insert(index, true);
                    self.staged += 1;
                }
            }
        }
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.staged = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.staged == 0
    }

    pub fn len(&self) -> usize {
        self.staged
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.cells.iter().filter_map(|(&index, &staged)| staged.then_some(index))
    }
}
