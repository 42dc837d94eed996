//! Contributing drainage area.
//!
//! Cells are visited from highest to lowest; each passes its accumulated area
//! to every lower neighbour in proportion to the drop (multiple flow directions).

use std::cmp::Ordering;

use crate::grid::{is_no_data, Grid, NEIGHBOURS};

/// Drop scaling applied to diagonal neighbours.
const DIAGONAL_DROP_DIVISOR: f64 = 1.414;

/// Contributing area (in cells) of every data cell; zero on no-data cells.
pub fn drainage_area(elev: &Grid<f64>) -> Grid<f64> {
    let mut area = Grid::new(elev.rows(), elev.cols(), 0.0);
    let mut pending = Grid::new(elev.rows(), elev.cols(), 0.0);

    let mut order: Vec<(usize, usize)> = elev.cells().filter(|&(r, c)| !is_no_data(elev.get(r, c))).collect();
    for &(r, c) in &order {
        pending.set(r, c, 1.0);
    }
    // Sort by elevation descending so every donor is processed before its receivers.
    order.sort_by(|&a, &b| {
        let ha = elev.get(a.0, a.1);
        let hb = elev.get(b.0, b.1);
        hb.partial_cmp(&ha).unwrap_or(Ordering::Equal)
    });

    let mut drops = [0.0f64; 8];
    for &(r, c) in &order {
        let own = pending.get(r, c);
        if own <= 0.0 {
            continue;
        }
        if own > area.get(r, c) {
            area.set(r, c, own);
        }

        let h = elev.get(r, c);
        let mut total = 0.0;
        for (i, n) in NEIGHBOURS.iter().enumerate() {
            let hn = elev.neighbour(r, c, *n);
            drops[i] = 0.0;
            if is_no_data(hn) || hn >= h {
                continue;
            }
            let mut drop = h - hn;
            if n.is_diagonal() {
                drop /= DIAGONAL_DROP_DIVISOR;
            }
            drops[i] = drop;
            total += drop;
        }

        if total > 0.0 {
            for (i, n) in NEIGHBOURS.iter().enumerate() {
                if drops[i] > 0.0 {
                    let (nr, nc) = n.step(r, c);
                    pending[(nr, nc)] += own * drops[i] / total;
                }
            }
        }
        pending.set(r, c, 0.0);
    }

    area
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::NO_DATA;

    fn plane(rows: usize, cols: usize) -> Grid<f64> {
        let mut g = Grid::new(rows, cols, NO_DATA);
        for (r, c) in g.cells().collect::<Vec<_>>() {
            g.set(r, c, 100.0 - r as f64);
        }
        g
    }

    #[test]
    fn test_area_grows_downslope() {
        let elev = plane(6, 3);
        let area = drainage_area(&elev);
        for c in 1..=3 {
            for r in 1..6 {
                assert!(area.get(r + 1, c) >= area.get(r, c), "row {r} col {c}");
            }
        }
        assert!((area.get(1, 2) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_total_outflow_equals_cell_count() {
        let elev = plane(5, 4);
        let area = drainage_area(&elev);
        // Each lowest-row cell only drains out of the grid.
        let bottom: f64 = (1..=4).map(|c| area.get(5, c)).sum();
        assert!((bottom - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_flat_cells_keep_own_area() {
        let elev = Grid::new(3, 3, 10.0);
        let area = drainage_area(&elev);
        for (r, c) in area.cells() {
            assert_eq!(area.get(r, c), 1.0);
        }
    }

    #[test]
    fn test_no_data_cells_have_no_area() {
        let mut elev = plane(3, 3);
        elev.set(2, 2, NO_DATA);
        let area = drainage_area(&elev);
        assert_eq!(area.get(2, 2), 0.0);
        assert!(area.get(3, 2) >= 1.0);
    }
}
