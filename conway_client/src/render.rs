// render.rs - Incremental raster rendering of the composed grid view

use egui::{Color32, ColorImage};

use crate::grid::{CellMatrix, cell_coords};
use crate::pending::PendingEditBuffer;

// Beyond this many repainted cells a single full upload is cheaper than patches.
const MAX_DAMAGE_RECTS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Palette {
    pub dead: Color32,
    pub alive: Color32,
    pub staged: Color32,
    pub hover: Color32,
    pub gutter: Color32,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            dead: Color32::BLACK,
            alive: Color32::WHITE,
            staged: Color32::YELLOW,
            hover: Color32::from_rgb(0x34, 0x98, 0xdb),
            gutter: Color32::from_gray(40),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellPaint {
    Dead,
    Alive,
    Staged,
}

impl CellPaint {
    /// Staged beats alive beats dead.
    pub fn resolve(matrix: &CellMatrix, pending: &PendingEditBuffer, index: usize) -> Self {
        if pending.contains(index) {
            CellPaint::Staged
        } else if matrix.is_alive(index) {
            CellPaint::Alive
        } else {
            CellPaint::Dead
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Painted {
    paint: CellPaint,
    hovered: bool,
}

/// Pixel rectangle on the surface, `x` to the right and `y` down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl PixelRect {
    pub fn contains(&self, x: usize, y: usize) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }
}

/// What changed on the raster since the previous `render`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Damage {
    None,
    Full,
    Rects(Vec<PixelRect>),
}

/// Draws cells onto a square raster, repainting only cells whose visible
/// state changed. The hover outline lives inside the cell bounds, so moving
/// the pointer away erases it by repainting that one cell.
pub struct GridRenderer {
    grid_size: usize,
    side: usize,
    palette: Palette,
    image: ColorImage,
    painted: Vec<Option<Painted>>,
    full_redraw: bool,
}

impl GridRenderer {
    pub fn new(grid_size: usize, side: usize) -> Self {
        Self {
            grid_size,
            side,
            palette: Palette::default(),
            image: ColorImage::new([side, side], Color32::TRANSPARENT),
            painted: vec![None; grid_size * grid_size],
            full_redraw: true,
        }
    }

    pub fn with_palette(mut self, palette: Palette) -> Self {
        self.palette = palette;
        self
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn set_palette(&mut self, palette: Palette) {
        if palette != self.palette {
            self.palette = palette;
            self.invalidate();
        }
    }

    pub fn side(&self) -> usize {
        self.side
    }

    pub fn cell_size(&self) -> f32 {
        self.side as f32 / self.grid_size as f32
    }

    /// Follows the container. Returns `true` when the surface changed size.
    pub fn resize(&mut self, side: usize) -> bool {
        if side == self.side {
            return false;
        }
        self.side = side;
        self.image = ColorImage::new([side, side], Color32::TRANSPARENT);
        self.invalidate();
        true
    }

    /// Forces the next `render` to repaint every cell.
    pub fn invalidate(&mut self) {
        self.painted.iter_mut().for_each(|cell| *cell = None);
        self.full_redraw = true;
    }

    /// Maps a pointer position relative to the surface origin to a cell.
    pub fn hit_test(&self, pointer_x: f32, pointer_y: f32) -> Option<usize> {
        if self.side == 0 || self.grid_size == 0 || !pointer_x.is_finite() || !pointer_y.is_finite() {
            return None;
        }
        if pointer_x < 0.0 || pointer_y < 0.0 {
            return None;
        }
        let (px, py) = (pointer_x.floor() as usize, pointer_y.floor() as usize);
        if px >= self.side || py >= self.side {
            return None;
        }
        crate::grid::cell_index(self.grid_size, self.cell_at(px), self.cell_at(py))
    }

    // Inverse of the floored edges in `cell_bounds`: the cell whose
    // `[c*side/G, (c+1)*side/G)` span holds `pixel`.
    fn cell_at(&self, pixel: usize) -> usize {
        ((pixel + 1) * self.grid_size - 1) / self.side
    }

    pub fn cell_bounds(&self, index: usize) -> PixelRect {
        let (x, y) = cell_coords(self.grid_size, index);
        let x0 = x * self.side / self.grid_size;
        let x1 = (x + 1) * self.side / self.grid_size;
        let y0 = y * self.side / self.grid_size;
        let y1 = (y + 1) * self.side / self.grid_size;
        PixelRect { x: x0, y: y0, width: x1 - x0, height: y1 - y0 }
    }

    pub fn render(
        &mut self,
        matrix: &CellMatrix,
        pending: &PendingEditBuffer,
        hover: Option<usize>,
    ) -> Damage {
        if self.side == 0 {
            return Damage::None;
        }
        let cell_count = self.grid_size * self.grid_size;
        let hover = hover.filter(|&index| index < cell_count);

        let mut repainted = Vec::new();
        for index in 0..cell_count {
            let wanted = Painted {
                paint: CellPaint::resolve(matrix, pending, index),
                hovered: hover == Some(index),
            };
            if self.painted[index] == Some(wanted) {
                continue;
            }
            self.fill_cell(index, wanted.paint);
            self.painted[index] = Some(wanted);
            repainted.push(index);
        }

        // Outline last so no fill can cover it.
        if let Some(index) = hover {
            if repainted.contains(&index) {
                self.outline_cell(index);
            }
        }

        if std::mem::take(&mut self.full_redraw) || repainted.len() > MAX_DAMAGE_RECTS {
            Damage::Full
        } else if repainted.is_empty() {
            Damage::None
        } else {
            Damage::Rects(repainted.into_iter().map(|index| self.cell_bounds(index)).collect())
        }
    }

    fn fill_cell(&mut self, index: usize, paint: CellPaint) {
        let bounds = self.cell_bounds(index);
        let color = match paint {
            CellPaint::Dead => self.palette.dead,
            CellPaint::Alive => self.palette.alive,
            CellPaint::Staged => self.palette.staged,
        };
        let gutter = bounds.width >= 3 && bounds.height >= 3;
        for y in bounds.y..bounds.y + bounds.height {
            for x in bounds.x..bounds.x + bounds.width {
                let edge = x + 1 == bounds.x + bounds.width || y + 1 == bounds.y + bounds.height;
                let pixel = if gutter && edge { self.palette.gutter } else { color };
                self.put(x, y, pixel);
            }
        }
    }

    fn outline_cell(&mut self, index: usize) {
        let bounds = self.cell_bounds(index);
        let thickness = (bounds.width.min(bounds.height) / 4).max(1);
        let color = self.palette.hover;
        for y in bounds.y..bounds.y + bounds.height {
            for x in bounds.x..bounds.x + bounds.width {
                let near_edge = x < bounds.x + thickness
                    || y < bounds.y + thickness
                    || x + thickness >= bounds.x + bounds.width
                    || y + thickness >= bounds.y + bounds.height;
                if near_edge {
                    self.put(x, y, color);
                }
            }
        }
    }

    fn put(&mut self, x: usize, y: usize, color: Color32) {
        if x < self.side && y < self.side {
            self.image.pixels[y * self.side + x] = color;
        }
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<Color32> {
        (x < self.side && y < self.side).then(|| self.image.pixels[y * self.side + x])
    }

    pub fn image(&self) -> &ColorImage {
        &self.image
    }

    /// Copies one damaged rectangle out of the raster for a partial upload.
    pub fn region(&self, rect: PixelRect) -> ColorImage {
        let mut pixels = Vec::with_capacity(rect.width * rect.height);
        for y in rect.y..rect.y + rect.height {
            let start = y * self.side + rect.x;
            pixels.extend_from_slice(&self.image.pixels[start..start + rect.width]);
        }
        ColorImage { size: [rect.width, rect.height], pixels }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridId;

    fn matrix(alive: &[usize]) -> CellMatrix {
        let mut cells = vec![false; 16];
        for &index in alive {
            cells[index] = true;
        }
        CellMatrix::from_cells(GridId(0), 4, cells).unwrap()
    }

    fn top_left(renderer: &GridRenderer, index: usize) -> Color32 {
        let bounds = renderer.cell_bounds(index);
        renderer.pixel(bounds.x, bounds.y).unwrap()
    }

    #[test]
    fn hit_test_maps_cell_centers() {
        for side in [100, 37, 800, 4] {
            let renderer = GridRenderer::new(4, side);
            let cell_size = renderer.cell_size();
            for x in 0..4 {
                for y in 0..4 {
                    let px = (x as f32 + 0.5) * cell_size;
                    let py = (y as f32 + 0.5) * cell_size;
                    assert_eq!(renderer.hit_test(px, py), Some(x * 4 + y), "side {side} cell ({x},{y})");
                }
            }
        }
    }

    #[test]
    fn hit_test_agrees_with_drawn_bounds() {
        for (grid_size, side) in [(4, 37), (200, 700), (7, 50), (4, 40)] {
            let renderer = GridRenderer::new(grid_size, side);
            for index in 0..grid_size * grid_size {
                let bounds = renderer.cell_bounds(index);
                if bounds.width == 0 || bounds.height == 0 {
                    continue;
                }
                let first = (bounds.x as f32 + 0.1, bounds.y as f32 + 0.1);
                let last = (
                    (bounds.x + bounds.width - 1) as f32 + 0.9,
                    (bounds.y + bounds.height - 1) as f32 + 0.9,
                );
                assert_eq!(renderer.hit_test(first.0, first.1), Some(index), "{grid_size}/{side} cell {index}");
                assert_eq!(renderer.hit_test(last.0, last.1), Some(index), "{grid_size}/{side} cell {index}");
            }
        }
        // left column of cell 4 at 37px starts at x = 9
        assert_eq!(GridRenderer::new(4, 37).hit_test(9.1, 1.0), Some(4));
        assert_eq!(GridRenderer::new(200, 700).hit_test(3.2, 1.0), Some(200));
    }

    #[test]
    fn hit_test_outside_surface_is_none() {
        let renderer = GridRenderer::new(4, 100);
        assert_eq!(renderer.hit_test(-0.5, 10.0), None);
        assert_eq!(renderer.hit_test(10.0, -3.0), None);
        assert_eq!(renderer.hit_test(100.0, 10.0), None);
        assert_eq!(renderer.hit_test(10.0, 250.0), None);
        assert_eq!(renderer.hit_test(f32::NAN, 1.0), None);
        assert_eq!(GridRenderer::new(4, 0).hit_test(0.0, 0.0), None);
    }

    #[test]
    fn hit_test_follows_resize() {
        let mut renderer = GridRenderer::new(4, 40);
        assert_eq!(renderer.hit_test(15.0, 35.0), Some(4 + 3));
        assert!(renderer.resize(80));
        assert_eq!(renderer.hit_test(15.0, 35.0), Some(1));
        assert!(!renderer.resize(80));
    }

    #[test]
    fn staged_beats_alive_beats_dead() {
        let mut renderer = GridRenderer::new(4, 40);
        let mut pending = PendingEditBuffer::new(16);
        pending.toggle(1).unwrap();
        pending.toggle(2).unwrap();
        renderer.render(&matrix(&[1, 3]), &pending, None);

        let palette = *renderer.palette();
        assert_eq!(top_left(&renderer, 0), palette.dead);
        assert_eq!(top_left(&renderer, 1), palette.staged);
        assert_eq!(top_left(&renderer, 2), palette.staged);
        assert_eq!(top_left(&renderer, 3), palette.alive);
    }

    #[test]
    fn placeholder_renders_dead_board() {
        let mut renderer = GridRenderer::new(4, 40);
        let pending = PendingEditBuffer::new(16);
        assert_eq!(renderer.render(&CellMatrix::placeholder(4), &pending, None), Damage::Full);
        let dead = renderer.palette().dead;
        assert!((0..16).all(|index| top_left(&renderer, index) == dead));
    }

    #[test]
    fn unchanged_frame_has_no_damage() {
        let mut renderer = GridRenderer::new(4, 40);
        let pending = PendingEditBuffer::new(16);
        let board = matrix(&[0, 5]);
        assert_eq!(renderer.render(&board, &pending, Some(6)), Damage::Full);
        assert_eq!(renderer.render(&board, &pending, Some(6)), Damage::None);
    }

    #[test]
    fn only_changed_cells_are_damaged() {
        let mut renderer = GridRenderer::new(4, 40);
        let mut pending = PendingEditBuffer::new(16);
        renderer.render(&matrix(&[]), &pending, None);

        pending.toggle(9).unwrap();
        let damage = renderer.render(&matrix(&[4]), &pending, None);
        assert_eq!(
            damage,
            Damage::Rects(vec![renderer.cell_bounds(4), renderer.cell_bounds(9)])
        );
    }

    #[test]
    fn moving_hover_away_leaves_no_highlight() {
        let mut renderer = GridRenderer::new(4, 40);
        let pending = PendingEditBuffer::new(16);
        let board = matrix(&[7]);
        let palette = *renderer.palette();
        renderer.render(&board, &pending, None);

        renderer.render(&board, &pending, Some(3));
        assert_eq!(top_left(&renderer, 3), palette.hover);

        let damage = renderer.render(&board, &pending, Some(7));
        assert_eq!(damage, Damage::Rects(vec![renderer.cell_bounds(3), renderer.cell_bounds(7)]));
        assert_eq!(top_left(&renderer, 3), palette.dead);
        assert_eq!(top_left(&renderer, 7), palette.hover);

        renderer.render(&board, &pending, None);
        assert_eq!(top_left(&renderer, 3), palette.dead);
        assert_eq!(top_left(&renderer, 7), palette.alive);
        let hover_pixels = renderer.image().pixels.iter().filter(|&&p| p == palette.hover).count();
        assert_eq!(hover_pixels, 0);
    }

    #[test]
    fn large_change_falls_back_to_full_upload() {
        let mut renderer = GridRenderer::new(20, 200);
        let pending = PendingEditBuffer::new(400);
        renderer.render(&CellMatrix::placeholder(20), &pending, None);
        let everything = CellMatrix::from_cells(GridId(0), 20, vec![true; 400]).unwrap();
        assert_eq!(renderer.render(&everything, &pending, None), Damage::Full);
    }

    #[test]
    fn resize_forces_full_redraw() {
        let mut renderer = GridRenderer::new(4, 40);
        let pending = PendingEditBuffer::new(16);
        renderer.render(&matrix(&[]), &pending, None);
        renderer.resize(64);
        assert_eq!(renderer.image().size, [64, 64]);
        assert_eq!(renderer.render(&matrix(&[]), &pending, None), Damage::Full);
    }

    #[test]
    fn region_copies_cell_pixels() {
        let mut renderer = GridRenderer::new(4, 40);
        let pending = PendingEditBuffer::new(16);
        renderer.render(&matrix(&[5]), &pending, None);
        let bounds = renderer.cell_bounds(5);
        let patch = renderer.region(bounds);
        assert_eq!(patch.size, [bounds.width, bounds.height]);
        assert_eq!(patch.pixels[0], renderer.palette().alive);
        assert!(bounds.contains(bounds.x, bounds.y));
    }
}
