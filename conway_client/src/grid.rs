// grid.rs - Grid identifiers, cell matrix and the two authoritative row types

use std::fmt;

use crate::error::ClientError;

// Default board side used by the server (200x200 playing area)
pub const GRID_SIZE: usize = 200;

/// Identifies one automaton board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct GridId(pub u32);

impl fmt::Display for GridId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Row of the `grid` relation, keyed by `grid_id`. Always a full replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridRow {
    pub grid_id: GridId,
    pub cells: Vec<bool>,
    pub generation: u64,
}

/// Row of the `grid_info` relation, keyed by `grid_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridInfoRow {
    pub grid_id: GridId,
    pub generation: u64,
    pub status: String,
}

impl GridInfoRow {
    pub fn placeholder(grid_id: GridId) -> Self {
        Self { grid_id, generation: 0, status: String::new() }
    }
}

/// Square boolean matrix addressed by `x * side + y`.
///
/// The length is always exactly `side * side`; reads outside that range
/// report a dead cell instead of indexing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellMatrix {
    side: usize,
    cells: Vec<bool>,
}

impl CellMatrix {
    /// All-dead matrix shown before the first snapshot arrives.
    pub fn placeholder(side: usize) -> Self {
        Self { side, cells: vec![false; side * side] }
    }

    pub fn from_cells(grid_id: GridId, side: usize, cells: Vec<bool>) -> Result<Self, ClientError> {
        let expected = side * side;
        if cells.len() != expected {
            return Err(ClientError::MalformedRow { grid_id, expected, actual: cells.len() });
        }
        Ok(Self { side, cells })
    }

    pub fn side(&self) -> usize {
        self.side
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn is_alive(&self, index: usize) -> bool {
        self.cells.get(index).copied().unwrap_or(false)
    }

    pub fn alive_count(&self) -> usize {
        self.cells.iter().filter(|&&alive| alive).count()
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.cells
    }
}

/// Maps `(x, y)` to a flat index, or `None` when either coordinate is off the board.
pub fn cell_index(side: usize, x: usize, y: usize) -> Option<usize> {
    (x < side && y < side).then(|| x * side + y)
}

/// Inverse of [`cell_index`].
pub fn cell_coords(side: usize, index: usize) -> (usize, usize) {
    (index / side, index % side)
}
