//! Wetted-area scanning.

use rayon::prelude::*;

use crate::grid::{is_no_data, Grid};

/// Per-row lists of columns that hold water or touch a wet cell.
#[derive(Debug, Clone, Default)]
pub struct WetMask {
    /// `rows[r]` lists the wetted columns of storage row `r`; the border rows stay empty.
    rows: Vec<Vec<usize>>,
}

impl WetMask {
    /// Lists every data cell whose 3x3 neighbourhood holds any water.
    pub fn scan(depth: &Grid<f64>, elev: &Grid<f64>) -> Self {
        let nrows = depth.rows();
        let ncols = depth.cols();
        let rows = (0..nrows + 2)
            .into_par_iter()
            .map(|r| {
                if r == 0 || r > nrows {
                    return Vec::new();
                }
                (1..=ncols)
                    .filter(|&c| {
                        if is_no_data(elev.get(r, c)) {
                            return false;
                        }
                        (r - 1..=r + 1).any(|rr| (c - 1..=c + 1).any(|cc| depth.get(rr, cc) > 0.0))
                    })
                    .collect()
            })
            .collect();
        Self { rows }
    }

    /// Wetted columns of storage row `row`.
    #[inline]
    pub fn row(&self, row: usize) -> &[usize] {
        self.rows.get(row).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Iterates every wetted `(row, col)`.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.rows
            .iter()
            .enumerate()
            .flat_map(|(r, cols)| cols.iter().map(move |&c| (r, c)))
    }

    pub fn len(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(Vec::is_empty)
    }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        self.row(row).binary_search(&col).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_covers_wet_neighbourhood() {
        let elev = Grid::new(5, 5, 1.0);
        let mut depth = Grid::new(5, 5, 0.0);
        depth.set(3, 3, 0.5);
        let mask = WetMask::scan(&depth, &elev);
        assert_eq!(mask.len(), 9);
        assert!(mask.contains(2, 2));
        assert!(mask.contains(4, 4));
        assert!(!mask.contains(1, 3));
        assert!(!mask.contains(3, 5));
    }

    #[test]
    fn test_dry_grid_gives_empty_mask() {
        let elev = Grid::new(3, 3, 1.0);
        let depth = Grid::new(3, 3, 0.0);
        let mask = WetMask::scan(&depth, &elev);
        assert!(mask.is_empty());
        assert_eq!(mask.iter().count(), 0);
    }

    #[test]
    fn test_no_data_cells_are_skipped() {
        let mut elev = Grid::new(3, 3, 1.0);
        elev.set(2, 3, crate::grid::NO_DATA);
        let mut depth = Grid::new(3, 3, 0.0);
        depth.set(2, 2, 0.1);
        let mask = WetMask::scan(&depth, &elev);
        assert!(!mask.contains(2, 3));
        assert!(mask.contains(2, 1));
    }
}
