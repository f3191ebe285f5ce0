// state.rs - Local mirror of the authoritative grid and grid_info rows

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::error::ClientError;
use crate::grid::{CellMatrix, GridId, GridInfoRow, GridRow};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridSnapshot {
    pub grid_id: GridId,
    pub cells: CellMatrix,
    pub generation: u64,
}

/// Generation/status record reported independently of the cells.
pub type GridInfo = GridInfoRow;

/// Holds at most one snapshot and one info record per grid id.
///
/// Every insert or update replaces the stored value wholesale. The old row
/// of an update is accepted but never consulted.
#[derive(Debug)]
pub struct GridStateStore {
    grid_size: usize,
    grids: HashMap<GridId, GridSnapshot>,
    infos: HashMap<GridId, GridInfo>,
}

impl GridStateStore {
    pub fn new(grid_size: usize) -> Self {
        Self { grid_size, grids: HashMap::new(), infos: HashMap::new() }
    }

    pub fn grid_size(&self) -> usize {
        self.grid_size
    }

    pub fn apply_insert(&mut self, row: GridRow) -> Result<(), ClientError> {
        self.replace(row)
    }

    pub fn apply_update(&mut self, _old: &GridRow, new: GridRow) -> Result<(), ClientError> {
        self.replace(new)
    }

    fn replace(&mut self, row: GridRow) -> Result<(), ClientError> {
        let GridRow { grid_id, cells, generation } = row;
        let cells = CellMatrix::from_cells(grid_id, self.grid_size, cells).inspect_err(|err| {
            warn!(%err, "rejecting grid row");
        })?;
        debug!(%grid_id, generation, "grid row replaced");
        self.grids.insert(grid_id, GridSnapshot { grid_id, cells, generation });
        Ok(())
    }

    pub fn apply_info_insert(&mut self, row: GridInfoRow) {
        self.infos.insert(row.grid_id, row);
    }

    pub fn apply_info_update(&mut self, _old: &GridInfoRow, new: GridInfoRow) {
        self.infos.insert(new.grid_id, new);
    }

    /// `None` until at least one row has been seen for `grid_id`.
    pub fn get(&self, grid_id: GridId) -> Option<&GridSnapshot> {
        self.grids.get(&grid_id)
    }

    pub fn get_info(&self, grid_id: GridId) -> Option<&GridInfo> {
        self.infos.get(&grid_id)
    }

    /// Forgets everything held for `grid_id`.
    pub fn discard(&mut self, grid_id: GridId) {
        self.grids.remove(&grid_id);
        self.infos.remove(&grid_id);
    }
}
