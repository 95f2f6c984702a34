// Dense 2-D grid of per-tile values.
//
// Stored as a flat `Vec<T>` indexed by `x + y * width`, giving O(1) access.
// Reads outside the bounds return `None`; writes outside the bounds are
// no-ops. Every per-tile table owned by a `Level` (squares, furniture slots,
// dirty flags, unavailable marks, sector labels) is a `Grid`.
//
// See also: `level.rs` which owns the grids, `sectors.rs` which keeps its
// component labels in one.

use crate::types::{Rect, Vec2};
use serde::{Deserialize, Serialize};

/// Dense 2-D grid.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Grid<T> {
    /// Flat storage: index = x + y * width.
    cells: Vec<T>,
    width: u32,
    height: u32,
}

impl<T: Clone> Grid<T> {
    /// Create a grid with every cell set to `fill`.
    pub fn new(width: u32, height: u32, fill: T) -> Self {
        Self {
            cells: vec![fill; width as usize * height as usize],
            width,
            height,
        }
    }

    /// Reset every cell to `value`.
    pub fn fill(&mut self, value: T) {
        for c in &mut self.cells {
            *c = value.clone();
        }
    }
}

impl<T> Grid<T> {
    /// Create a grid by calling `f` for every coordinate, row-major.
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(Vec2) -> T) -> Self {
        let mut cells = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height as i32 {
            for x in 0..width as i32 {
                cells.push(f(Vec2::new(x, y)));
            }
        }
        Self {
            cells,
            width,
            height,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(
            Vec2::new(0, 0),
            Vec2::new(self.width as i32, self.height as i32),
        )
    }

    pub fn in_bounds(&self, coord: Vec2) -> bool {
        coord.x >= 0
            && coord.y >= 0
            && (coord.x as u32) < self.width
            && (coord.y as u32) < self.height
    }

    /// Flat index of a coordinate, `None` if out of bounds.
    fn index(&self, coord: Vec2) -> Option<usize> {
        if self.in_bounds(coord) {
            Some(coord.x as usize + coord.y as usize * self.width as usize)
        } else {
            None
        }
    }

    pub fn get(&self, coord: Vec2) -> Option<&T> {
        self.index(coord).map(|i| &self.cells[i])
    }

    pub fn get_mut(&mut self, coord: Vec2) -> Option<&mut T> {
        self.index(coord).map(|i| &mut self.cells[i])
    }

    /// Write a cell. No-op for out-of-bounds coordinates.
    pub fn set(&mut self, coord: Vec2, value: T) {
        if let Some(i) = self.index(coord) {
            self.cells[i] = value;
        }
    }

    /// Replace a cell, returning the previous value. `None` if out of bounds
    /// (the new value is dropped).
    pub fn replace(&mut self, coord: Vec2, value: T) -> Option<T> {
        self.index(coord)
            .map(|i| std::mem::replace(&mut self.cells[i], value))
    }

    /// Iterate `(coord, &value)` row-major.
    pub fn iter(&self) -> impl Iterator<Item = (Vec2, &T)> + '_ {
        let w = self.width.max(1) as usize;
        self.cells.iter().enumerate().map(move |(i, v)| {
            (Vec2::new((i % w) as i32, (i / w) as i32), v)
        })
    }
}

impl<T: Copy + Default> Grid<T> {
    /// Copy out a cell, `T::default()` when out of bounds.
    pub fn value(&self, coord: Vec2) -> T {
        self.get(coord).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_grid_is_filled() {
        let g = Grid::new(4, 3, 7u8);
        assert_eq!(g.iter().count(), 12);
        assert!(g.iter().all(|(_, v)| *v == 7));
    }

    #[test]
    fn set_and_get() {
        let mut g = Grid::new(8, 8, 0u32);
        g.set(Vec2::new(3, 5), 9);
        assert_eq!(g.value(Vec2::new(3, 5)), 9);
        assert_eq!(g.value(Vec2::new(5, 3)), 0);
    }

    #[test]
    fn out_of_bounds_reads_are_none() {
        let g = Grid::new(4, 4, 1u8);
        assert!(g.get(Vec2::new(-1, 0)).is_none());
        assert!(g.get(Vec2::new(0, 4)).is_none());
        assert_eq!(g.value(Vec2::new(100, 100)), 0);
    }

    #[test]
    fn out_of_bounds_write_is_noop() {
        let mut g = Grid::new(2, 2, false);
        g.set(Vec2::new(-1, 0), true);
        g.set(Vec2::new(2, 0), true);
        assert!(g.iter().all(|(_, v)| !*v));
        assert_eq!(g.replace(Vec2::new(5, 5), true), None);
    }

    #[test]
    fn iteration_coordinates_match_indexing() {
        let g = Grid::from_fn(5, 3, |v| v.x * 10 + v.y);
        for (coord, v) in g.iter() {
            assert_eq!(*v, coord.x * 10 + coord.y);
        }
        assert_eq!(g.bounds().iter().count(), 15);
    }

    #[test]
    fn default_grid_is_empty() {
        let g: Grid<u8> = Grid::default();
        assert_eq!(g.width(), 0);
        assert!(!g.in_bounds(Vec2::new(0, 0)));
        assert_eq!(g.iter().count(), 0);
    }
}
