//! Rectangular, row-major grid of tile references. First row is the top.

use super::tile_ref::TileRef;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grid {
    width: usize,
    cells: Vec<TileRef>,
}

impl Grid {
    /// Builds a grid from a flat cell list. `cells.len()` must be a multiple of
    /// `width`; the codec checks this before calling.
    pub fn from_cells(width: usize, cells: Vec<TileRef>) -> Self {
        debug_assert!(width == 0 || cells.len() % width == 0);
        Grid { width, cells }
    }

    pub fn from_rows(rows: &[Vec<u32>]) -> Self {
        let width = rows.first().map_or(0, |r| r.len());
        let cells = rows
            .iter()
            .flat_map(|row| row.iter().copied().map(TileRef))
            .collect();
        Grid { width, cells }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        if self.width == 0 {
            0
        } else {
            self.cells.len() / self.width
        }
    }

    pub fn cells(&self) -> &[TileRef] {
        &self.cells
    }

    pub fn get(&self, x: usize, y: usize) -> Option<TileRef> {
        if x >= self.width {
            return None;
        }
        self.cells.get(y * self.width + x).copied()
    }

    pub fn rows(&self) -> impl Iterator<Item = &[TileRef]> {
        self.cells.chunks(self.width.max(1))
    }

    pub fn to_rows(&self) -> Vec<Vec<u32>> {
        self.rows()
            .map(|row| row.iter().map(|r| r.0).collect())
            .collect()
    }

    /// Applies `f` to every non-empty cell, keeping positions.
    pub fn map_cells(&self, mut f: impl FnMut(TileRef) -> TileRef) -> Grid {
        let cells = self
            .cells
            .iter()
            .map(|&r| if r.is_empty() { r } else { f(r) })
            .collect();
        Grid {
            width: self.width,
            cells,
        }
    }

    /// Number of positions where the two grids hold different references
    pub fn count_differences(&self, other: &Grid) -> usize {
        self.cells
            .iter()
            .zip(other.cells.iter())
            .filter(|(a, b)| a != b)
            .count()
    }

    /// Mirrors the grid horizontally: each row is reversed and every tile
    /// gets its horizontal flag toggled.
    pub fn flip(&self) -> Grid {
        let cells = self
            .rows()
            .flat_map(|row| row.iter().rev().map(|r| r.flip_cell()))
            .collect();
        Grid {
            width: self.width,
            cells,
        }
    }

    /// Rotates the grid 90 degrees clockwise. Width and height swap.
    pub fn rotate(&self) -> Grid {
        let height = self.height();
        let mut cells = Vec::with_capacity(self.cells.len());
        for x in 0..self.width {
            for y in (0..height).rev() {
                cells.push(self.cells[y * self.width + x].rotate_cell());
            }
        }
        Grid {
            width: height,
            cells,
        }
    }
}
