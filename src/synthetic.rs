//! Seeded synthetic catchments for demos and tests.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::grid::{Grid, NO_DATA};
use crate::io::RasterHeader;

/// Shape of a V-shaped valley draining toward the last row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticValley {
    pub rows: usize,
    pub cols: usize,
    /// Cell width (m).
    pub cell_size: f64,
    /// Down-valley gradient (m/m).
    pub valley_slope: f64,
    /// Gradient of the valley sides toward the axis (m/m).
    pub side_slope: f64,
    /// Amplitude of the random surface perturbation (m).
    pub roughness: f64,
    /// Elevation of the outlet (m).
    pub base_elevation: f64,
    pub seed: u64,
}

impl Default for SyntheticValley {
    fn default() -> Self {
        Self {
            rows: 60,
            cols: 40,
            cell_size: 10.0,
            valley_slope: 0.02,
            side_slope: 0.1,
            roughness: 0.05,
            base_elevation: 100.0,
            seed: 42,
        }
    }
}

impl SyntheticValley {
    /// Builds the DEM and its raster header.
    ///
    /// The outlet sits on the valley axis in the last row and is the lowest
    /// cell, so water always has a way off the grid.
    pub fn generate(&self) -> (RasterHeader, Grid<f64>) {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut elev = Grid::new(self.rows, self.cols, NO_DATA);
        let axis = (self.cols as f64 + 1.0) / 2.0;
        let dx = self.cell_size;

        for r in 1..=self.rows {
            for c in 1..=self.cols {
                let down = (self.rows - r) as f64 * dx * self.valley_slope;
                let across = (c as f64 - axis).abs() * dx * self.side_slope;
                let noise = (rng.random::<f64>() * 2.0 - 1.0) * self.roughness;
                elev.set(r, c, self.base_elevation + down + across + noise.abs());
            }
        }

        let outlet = axis.round().clamp(1.0, self.cols as f64) as usize;
        let lowest = elev
            .cells()
            .map(|(r, c)| elev.get(r, c))
            .fold(f64::INFINITY, f64::min);
        elev.set(self.rows, outlet, lowest - self.roughness.max(0.01));

        (RasterHeader::new(self.rows, self.cols, dx), elev)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_surface() {
        let valley = SyntheticValley {
            rows: 12,
            cols: 9,
            ..Default::default()
        };
        let (_, a) = valley.generate();
        let (_, b) = valley.generate();
        assert_eq!(a.as_slice(), b.as_slice());

        let other = SyntheticValley { seed: 7, ..valley };
        let (_, c) = other.generate();
        assert_ne!(a.as_slice(), c.as_slice());
    }

    #[test]
    fn test_outlet_is_lowest_edge_cell() {
        let valley = SyntheticValley {
            rows: 15,
            cols: 11,
            ..Default::default()
        };
        let (header, elev) = valley.generate();
        assert_eq!(header.nrows, 15);
        assert_eq!(header.ncols, 11);
        let outlet = elev.get(15, 6);
        for (r, c) in elev.cells() {
            if (r, c) != (15, 6) {
                assert!(elev.get(r, c) > outlet);
            }
        }
    }

    #[test]
    fn test_head_is_higher_than_mouth() {
        let (_, elev) = SyntheticValley::default().generate();
        let cols = elev.cols();
        let axis = (cols + 1) / 2;
        assert!(elev.get(1, axis) > elev.get(elev.rows() - 1, axis));
    }
}
