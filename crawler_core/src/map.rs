use std::ops::Index;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::{Cell, Rect};

/// A generic 2D grid structure.
///
/// Stores elements of type `T` in a flat vector using row-major order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid<T> {
    width: usize,
    height: usize,
    cells: Vec<T>,
}

impl<T> Grid<T> {
    /// Creates a new grid with the specified dimensions, filled by a generator function.
    ///
    /// The generator function `f` takes `(x, y)` coordinates and returns the value for that cell.
    ///
    /// # Panics
    ///
    /// Panics if `width * height` overflows `usize`.
    pub fn from_generator<F>(width: usize, height: usize, mut f: F) -> Self
    where
        F: FnMut(usize, usize) -> T,
    {
        let size = width.checked_mul(height).expect("Grid size overflow");
        let mut cells = Vec::with_capacity(size);
        for y in 0..height {
            for x in 0..width {
                cells.push(f(x, y));
            }
        }
        Grid {
            width,
            height,
            cells,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Converts signed coordinates to a flat vector index.
    ///
    /// Returns `None` if the coordinates are out of bounds.
    #[inline]
    fn index_of(&self, x: i32, y: i32) -> Option<usize> {
        let x = usize::try_from(x).ok()?;
        let y = usize::try_from(y).ok()?;
        (x < self.width && y < self.height).then(|| y * self.width + x)
    }

    /// Gets a reference to the cell at the given coordinates, or `None` when out of bounds.
    pub fn get(&self, x: i32, y: i32) -> Option<&T> {
        self.index_of(x, y).and_then(|index| self.cells.get(index))
    }

    /// Returns an iterator that yields `(cell, &T)` for each cell in row-major order.
    pub fn enumerate(&self) -> impl Iterator<Item = (Cell, &T)> {
        let width = self.width;
        self.cells.iter().enumerate().map(move |(index, value)| {
            let cell = Cell::new((index % width) as i32, (index / width) as i32);
            (cell, value)
        })
    }
}

/// Indexing by cell; panics when out of bounds, use [`Grid::get`] for fallible access.
impl<T> Index<Cell> for Grid<T> {
    type Output = T;

    #[inline]
    fn index(&self, cell: Cell) -> &Self::Output {
        match self.index_of(cell.x, cell.y) {
            Some(idx) => &self.cells[idx],
            None => panic!(
                "Grid index ({}, {}) out of bounds for grid size ({}, {})",
                cell.x, cell.y, self.width, self.height
            ),
        }
    }
}

/// Static kind of a tile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TileKind {
    #[default]
    Floor,
    Wall,
}

/// Tile occupancy of one room, plus the grid/world conversion.
///
/// Immutable once built; every pathing query in the crate reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridMap {
    tiles: Grid<TileKind>,
    tile_size: i32,
}

impl GridMap {
    pub fn new(tiles: Grid<TileKind>, tile_size: i32) -> Self {
        GridMap { tiles, tile_size }
    }

    /// Builds a map from rows of `#` (wall) and anything else (floor).
    /// Short rows are padded with floor.
    pub fn from_rows(rows: &[&str], tile_size: i32) -> Self {
        let width = rows.iter().map(|row| row.chars().count()).max().unwrap_or(0);
        let tiles = Grid::from_generator(width, rows.len(), |x, y| {
            match rows[y].chars().nth(x) {
                Some('#') => TileKind::Wall,
                _ => TileKind::Floor,
            }
        });
        GridMap::new(tiles, tile_size)
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.tiles.width()
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.tiles.height()
    }

    #[inline]
    pub fn tile_size(&self) -> i32 {
        self.tile_size
    }

    pub fn tile(&self, gx: i32, gy: i32) -> Option<TileKind> {
        self.tiles.get(gx, gy).copied()
    }

    /// True for walls and for every cell outside the map.
    pub fn is_blocked(&self, gx: i32, gy: i32) -> bool {
        !matches!(self.tiles.get(gx, gy), Some(TileKind::Floor))
    }

    #[inline]
    pub fn is_cell_blocked(&self, cell: Cell) -> bool {
        self.is_blocked(cell.x, cell.y)
    }

    /// World-space rectangle covered by a tile.
    pub fn tile_rect(&self, gx: i32, gy: i32) -> Rect {
        let t = self.tile_size;
        Rect::new(gx * t, gy * t, t, t)
    }

    /// Cell containing a world position.
    pub fn cell_at(&self, pos: Vec2) -> Cell {
        let t = self.tile_size as f32;
        Cell::new((pos.x / t).floor() as i32, (pos.y / t).floor() as i32)
    }

    /// Cell containing an integer world point.
    pub fn cell_at_point(&self, x: i32, y: i32) -> Cell {
        Cell::new(x.div_euclid(self.tile_size), y.div_euclid(self.tile_size))
    }

    /// World position of a tile's centre.
    pub fn center_of(&self, cell: Cell) -> Vec2 {
        let t = self.tile_size;
        Vec2::new((cell.x * t + t / 2) as f32, (cell.y * t + t / 2) as f32)
    }

    /// Collision rectangles for every wall tile.
    pub fn wall_rects(&self) -> Vec<Rect> {
        self.tiles
            .enumerate()
            .filter(|(_, kind)| **kind == TileKind::Wall)
            .map(|(cell, _)| self.tile_rect(cell.x, cell.y))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_map() -> GridMap {
        GridMap::from_rows(&["###", "#.#", "###"], 32)
    }

    #[test]
    fn out_of_bounds_is_blocked() {
        let map = small_map();
        assert!(map.is_blocked(-1, 1));
        assert!(map.is_blocked(1, -1));
        assert!(map.is_blocked(3, 1));
        assert!(map.is_blocked(1, 3));
        assert!(!map.is_blocked(1, 1));
        assert!(map.is_blocked(0, 0));
    }

    #[test]
    fn world_and_grid_conversions() {
        let map = small_map();
        assert_eq!(map.tile_rect(1, 2), Rect::new(32, 64, 32, 32));
        assert_eq!(map.cell_at(Vec2::new(63.9, 32.0)), Cell::new(1, 1));
        assert_eq!(map.cell_at(Vec2::new(-0.5, 10.0)), Cell::new(-1, 0));
        assert_eq!(map.cell_at_point(-1, 64), Cell::new(-1, 2));
        assert_eq!(map.center_of(Cell::new(1, 1)), Vec2::new(48.0, 48.0));
    }

    #[test]
    fn wall_rects_cover_every_wall() {
        let map = small_map();
        let walls = map.wall_rects();
        assert_eq!(walls.len(), 8);
        assert!(!walls.contains(&map.tile_rect(1, 1)));
    }
}
