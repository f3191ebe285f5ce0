// life.rs - Generation stepping with row coroutines, plus cycle detection

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::SimError;

// Row coroutines yield this often so no single row hogs a worker.
const YIELD_EVERY: usize = 32;

/// Live neighbours of `(x, y)` on a board that wraps at its edges.
pub fn count_neighbors(cells: &[bool], side: usize, x: usize, y: usize) -> u32 {
    let mut count = 0;
    for dx in [side - 1, 0, 1] {
        for dy in [side - 1, 0, 1] {
            if dx == 0 && dy == 0 {
                continue;
            }
            let nx = (x + dx) % side;
            let ny = (y + dy) % side;
            if cells[nx * side + ny] {
                count += 1;
            }
        }
    }
    count
}

/// Row coroutine: computes the next state of every cell in row `x`.
async fn process_row(x: usize, side: usize, cells: Arc<Vec<bool>>) -> (usize, Vec<bool>) {
    let mut row = vec![false; side];
    for (y, next) in row.iter_mut().enumerate() {
        let alive = cells[x * side + y];
        *next = match (alive, count_neighbors(&cells, side, x, y)) {
            (true, 2) | (true, 3) => true, // Survival
            (false, 3) => true,            // Birth
            _ => false,                    // Death or stays dead
        };
        if y % YIELD_EVERY == YIELD_EVERY - 1 {
            tokio::task::yield_now().await;
        }
    }
    (x, row)
}

/// Next generation of a `side * side` board, one spawned task per row.
pub async fn step_cells(cells: Arc<Vec<bool>>, side: usize) -> Result<Vec<bool>, SimError> {
    let handles: Vec<_> = (0..side)
        .map(|x| tokio::spawn(process_row(x, side, cells.clone())))
        .collect();

    let mut next = vec![false; side * side];
    for handle in handles {
        let (x, row) = handle.await?;
        next[x * side..(x + 1) * side].copy_from_slice(&row);
    }
    Ok(next)
}

/// Remembers hashes of the last few generations to spot still lifes and
/// short oscillators.
#[derive(Debug, Clone, Default)]
pub struct CycleDetector {
    history: [u64; 10],
    count: usize,
}

impl CycleDetector {
    pub fn hash_cells(cells: &[bool]) -> u64 {
        let mut hasher = DefaultHasher::new();
        cells.hash(&mut hasher);
        hasher.finish()
    }

    /// Records `cells` and reports whether it repeats a remembered generation.
    pub fn check(&mut self, cells: &[bool]) -> bool {
        let current = Self::hash_cells(cells);
        let seen = self.history[..self.count.min(self.history.len())].contains(&current);
        self.history[self.count % self.history.len()] = current;
        self.count += 1;
        seen
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
