use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

pub struct Pattern {
    pub name: &'static str,
    /// `(row, col)` offsets inside a 50x50 frame
    pub cells: &'static [(usize, usize)],
}

const FRAME: usize = 50;

pub const PATTERNS: &[Pattern] = &[
    Pattern {
        name: "Glider",
        cells: &[(6, 7), (7, 8), (8, 6), (8, 7), (8, 8)],
    },
    Pattern {
        name: "Pulsar",
        cells: &[
            (20, 24), (20, 25), (20, 26), (20, 30), (20, 31), (20, 32),
            (22, 22), (22, 27), (22, 29), (22, 34),
            (23, 22), (23, 27), (23, 29), (23, 34),
            (24, 22), (24, 27), (24, 29), (24, 34),
            (25, 24), (25, 25), (25, 26), (25, 30), (25, 31), (25, 32),
            (27, 24), (27, 25), (27, 26), (27, 30), (27, 31), (27, 32),
            (28, 22), (28, 27), (28, 29), (28, 34),
            (29, 22), (29, 27), (29, 29), (29, 34),
            (30, 22), (30, 27), (30, 29), (30, 34),
            (32, 24), (32, 25), (32, 26), (32, 30), (32, 31), (32, 32),
        ],
    },
    Pattern {
        name: "Gosper Glider Gun",
        cells: &[
            (5, 1), (5, 2), (6, 1), (6, 2),
            (5, 11), (6, 11), (7, 11), (4, 12), (8, 12), (3, 13), (9, 13),
            (3, 14), (9, 14), (6, 15), (4, 16), (8, 16), (5, 17), (6, 17),
            (7, 17), (6, 18), (3, 21), (4, 21), (5, 21), (3, 22), (4, 22),
            (5, 22), (2, 23), (6, 23), (1, 25), (2, 25), (6, 25), (7, 25),
            (3, 35), (4, 35), (3, 36), (4, 36),
        ],
    },
    Pattern {
        name: "R-pentomino",
        cells: &[(25, 25), (25, 26), (24, 26), (26, 25), (26, 24)],
    },
    Pattern {
        name: "Beacon",
        cells: &[(10, 10), (10, 11), (11, 10), (11, 11), (12, 12), (12, 13), (13, 12), (13, 13)],
    },
];

/// A `side * side` board holding `pattern`, its frame centred on the board.
/// Cells that fall off a small board are dropped.
pub fn pattern_cells(side: usize, pattern: &Pattern) -> Vec<bool> {
    let mut cells = vec![false; side * side];
    let offset = side.saturating_sub(FRAME) / 2;
    for &(row, col) in pattern.cells {
        let (x, y) = (col + offset, row + offset);
        if x < side && y < side {
            cells[x * side + y] = true;
        }
    }
    cells
}

/// Pseudo-random board where roughly `density` of the cells are alive.
pub fn random_cells(side: usize, density: f32, seed_value: u64) -> Vec<bool> {
    let mut hasher = DefaultHasher::new();
    seed_value.hash(&mut hasher);
    let mut seed = hasher.finish();

    let threshold = (density.clamp(0.0, 1.0) * 1000.0) as u64;
    (0..side * side)
        .map(|_| {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (seed >> 33) % 1000 < threshold
        })
        .collect()
}
