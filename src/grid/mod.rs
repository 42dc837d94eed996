//! Padded raster grids shared by every simulation component.
//!
//! A [`Grid`] stores `rows x cols` interior cells surrounded by a one-cell
//! border. Interior cells are addressed with 1-based `(row, col)` so that the
//! eight neighbours of any interior cell are always inside storage; the border
//! carries the no-data value for elevation-like fields.

mod neighbour;

pub use neighbour::{Neighbour, CARDINALS, NEIGHBOURS};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

/// Sentinel marking cells outside the modelled domain.
pub const NO_DATA: f64 = -9999.0;

/// Returns true when `v` is the no-data sentinel.
#[inline]
pub fn is_no_data(v: f64) -> bool {
    v <= NO_DATA + 1.0e-6
}

/// Dense 2-D field with a one-cell border.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid<T> {
    rows: usize,
    cols: usize,
    data: Vec<T>,
}

impl<T: Copy> Grid<T> {
    /// Allocates a grid of `rows x cols` interior cells, border included, filled with `fill`.
    pub fn new(rows: usize, cols: usize, fill: T) -> Self {
        Self {
            rows,
            cols,
            data: vec![fill; (rows + 2) * (cols + 2)],
        }
    }

    /// Number of interior rows.
    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of interior columns.
    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Length of one stored row (border included).
    #[inline]
    pub fn stride(&self) -> usize {
        self.cols + 2
    }

    /// Flat storage index of `(row, col)`.
    #[inline]
    pub fn idx(&self, row: usize, col: usize) -> usize {
        row * self.stride() + col
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> T {
        self.data[self.idx(row, col)]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: T) {
        let i = self.idx(row, col);
        self.data[i] = value;
    }

    /// Value of the neighbour of `(row, col)` in direction `n`.
    #[inline]
    pub fn neighbour(&self, row: usize, col: usize, n: Neighbour) -> T {
        let (r, c) = n.step(row, col);
        self.get(r, c)
    }

    pub fn fill(&mut self, value: T) {
        self.data.iter_mut().for_each(|v| *v = value);
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// True when both grids cover the same extent.
    pub fn same_shape<U: Copy>(&self, other: &Grid<U>) -> bool {
        self.rows == other.rows() && self.cols == other.cols()
    }

    /// True for interior cells on the first or last interior row/column.
    #[inline]
    pub fn is_domain_edge(&self, row: usize, col: usize) -> bool {
        row == 1 || col == 1 || row == self.rows || col == self.cols
    }

    /// True for interior cells (not part of the border).
    #[inline]
    pub fn is_interior(&self, row: usize, col: usize) -> bool {
        row >= 1 && col >= 1 && row <= self.rows && col <= self.cols
    }

    /// Iterates interior coordinates in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize)> {
        let cols = self.cols;
        (1..=self.rows).flat_map(move |r| (1..=cols).map(move |c| (r, c)))
    }

    /// Builds a new grid of the same shape by mapping every stored value.
    pub fn map<U: Copy, F: Fn(T) -> U>(&self, f: F) -> Grid<U> {
        Grid {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }
}

impl<T: Copy + Send + Sync> Grid<T> {
    /// Parallel iterator over stored rows as `(row_index, row_slice)`.
    pub fn par_rows_mut(&mut self) -> rayon::iter::Enumerate<rayon::slice::ChunksMut<'_, T>> {
        let stride = self.stride();
        self.data.par_chunks_mut(stride).enumerate()
    }
}

impl Grid<f64> {
    /// Largest interior value, ignoring no-data cells.
    pub fn max_value(&self) -> Option<f64> {
        self.cells()
            .map(|(r, c)| self.get(r, c))
            .filter(|v| !is_no_data(*v))
            .fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.max(v))))
    }

    /// `(min, max)` over interior data cells.
    pub fn value_range(&self) -> Option<(f64, f64)> {
        let mut range: Option<(f64, f64)> = None;
        for (r, c) in self.cells() {
            let v = self.get(r, c);
            if is_no_data(v) {
                continue;
            }
            range = Some(match range {
                None => (v, v),
                Some((lo, hi)) => (lo.min(v), hi.max(v)),
            });
        }
        range
    }

    /// Sum over interior data cells.
    pub fn sum(&self) -> f64 {
        self.cells()
            .map(|(r, c)| self.get(r, c))
            .filter(|v| !is_no_data(*v))
            .sum()
    }
}

impl<T: Copy> Index<(usize, usize)> for Grid<T> {
    type Output = T;

    #[inline]
    fn index(&self, (row, col): (usize, usize)) -> &T {
        &self.data[row * (self.cols + 2) + col]
    }
}

impl<T: Copy> IndexMut<(usize, usize)> for Grid<T> {
    #[inline]
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut T {
        let stride = self.cols + 2;
        &mut self.data[row * stride + col]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_border_surrounds_interior() {
        let g = Grid::new(3, 4, 0.0f64);
        assert_eq!(g.stride(), 6);
        assert_eq!(g.as_slice().len(), 5 * 6);
        assert!(g.is_interior(1, 1));
        assert!(g.is_interior(3, 4));
        assert!(!g.is_interior(0, 2));
        assert!(!g.is_interior(4, 2));
        assert_eq!(g.cells().count(), 12);
    }

    #[test]
    fn test_domain_edge_detection() {
        let g = Grid::new(4, 4, 0u8);
        assert!(g.is_domain_edge(1, 2));
        assert!(g.is_domain_edge(3, 4));
        assert!(!g.is_domain_edge(2, 3));
    }

    #[test]
    fn test_index_and_neighbour_agree() {
        let mut g = Grid::new(3, 3, 0.0f64);
        g[(1, 2)] = 5.0;
        assert_eq!(g.neighbour(2, 2, Neighbour::North), 5.0);
        g.set(3, 3, 7.0);
        assert_eq!(g.neighbour(2, 2, Neighbour::SouthEast), 7.0);
    }

    #[test]
    fn test_value_range_skips_no_data() {
        let mut g = Grid::new(2, 2, NO_DATA);
        g.set(1, 1, 3.0);
        g.set(2, 2, -1.0);
        assert_eq!(g.value_range(), Some((-1.0, 3.0)));
        assert_eq!(g.max_value(), Some(3.0));
        assert!((g.sum() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_par_rows_cover_storage() {
        let mut g = Grid::new(3, 2, 0usize);
        g.par_rows_mut().for_each(|(r, row)| {
            for v in row.iter_mut() {
                *v = r;
            }
        });
        assert_eq!(g.get(0, 0), 0);
        assert_eq!(g.get(2, 1), 2);
        assert_eq!(g.get(4, 3), 4);
    }
}
