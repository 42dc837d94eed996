//! Explicit shallow-water flow routing.
//!
//! Discharge lives on cell edges. The row-axis edge stored at `(r, c)` joins
//! `(r - 1, c)` and `(r, c)`; the column-axis edge joins `(r, c - 1)` and
//! `(r, c)`. Positive discharge flows toward the larger index.

use rayon::prelude::*;

use crate::engine::{EngineError, SimulationState};
use crate::grid::{is_no_data, Grid, Neighbour};
use crate::hydrology::{HydrologyConfig, WetMask};
use crate::timestep::GRAVITY;

/// Negative depths larger than this are a stability fault rather than round-off.
const NEGATIVE_DEPTH_TOLERANCE: f64 = 1.0e-9;

/// Discharge, suspended discharge and velocity on the two upstream edges of a cell.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EdgeFlux {
    /// Row-axis unit discharge (m^2/s).
    pub qx: f64,
    /// Column-axis unit discharge (m^2/s).
    pub qy: f64,
    pub qsx: f64,
    pub qsy: f64,
    /// Row-axis velocity (m/s).
    pub vx: f64,
    /// Column-axis velocity (m/s).
    pub vy: f64,
}

/// Velocity of water leaving `(row, col)` toward cardinal neighbour `dir`; zero if it flows the other way.
#[inline]
pub fn outflow_velocity(flux: &Grid<EdgeFlux>, row: usize, col: usize, dir: Neighbour) -> f64 {
    match dir {
        Neighbour::North => (-flux.get(row, col).vx).max(0.0),
        Neighbour::South => flux.get(row + 1, col).vx.max(0.0),
        Neighbour::West => (-flux.get(row, col).vy).max(0.0),
        Neighbour::East => flux.get(row, col + 1).vy.max(0.0),
        _ => 0.0,
    }
}

/// Edge parameters shared by every discharge update in a pass.
struct EdgeUpdate {
    dt: f64,
    dx: f64,
    n2: f64,
    threshold: f64,
    froude: f64,
    suspended: bool,
}

/// One side of an edge: `(bed elevation, depth, suspended volume)`.
type Side = (f64, f64, f64);

impl EdgeUpdate {
    /// New `(q, qs, v)` across an edge from `prev` (lower index) to `this`.
    ///
    /// `edge_slope` overrides the water-surface slope at the domain boundary.
    fn discharge(&self, q_old: f64, prev: Side, this: Side, edge_slope: Option<f64>) -> (f64, f64, f64) {
        let surf_prev = prev.0 + prev.1;
        let surf_this = this.0 + this.1;
        let hflow = surf_prev.max(surf_this) - prev.0.max(this.0);
        if hflow <= self.threshold {
            return (0.0, 0.0, 0.0);
        }

        let slope = edge_slope.unwrap_or((surf_this - surf_prev) / self.dx);
        let mut q = (q_old - GRAVITY * hflow * self.dt * slope)
            / (1.0 + GRAVITY * hflow * self.dt * self.n2 * q_old.abs() / hflow.powf(10.0 / 3.0));

        let q_froude = hflow * (GRAVITY * hflow).sqrt() * self.froude;
        if q.abs() > q_froude {
            q = q_froude.copysign(q);
        }

        let donor = if q > 0.0 { prev } else { this };
        let (donor_depth, donor_susp) = (donor.1, donor.2);
        if q.abs() * self.dt / self.dx > donor_depth / 4.0 {
            q = (donor_depth * self.dx / 5.0 / self.dt).copysign(q);
        }

        let mut qs = 0.0;
        if self.suspended && donor_depth > 0.0 && donor_susp > 0.0 {
            qs = q * (donor_susp / donor_depth);
            if qs.abs() * self.dt > donor_susp * self.dx / 4.0 {
                qs = (donor_susp * self.dx / 5.0 / self.dt).copysign(q);
            }
        }

        (q, qs, q / hflow)
    }
}

/// Updates edge discharges around every wetted cell.
///
/// An edge carries discharge only while both of its cells are in the wet mask;
/// the depth update visits masked cells alone, so any other edge is held at zero
/// until the next rescan.
pub fn route(state: &mut SimulationState, config: &HydrologyConfig, suspended: bool, dt: f64) {
    let SimulationState {
        flux,
        elev,
        water_depth,
        vsusp,
        wet,
        dx,
        ..
    } = state;
    let nrows = elev.rows();
    let ncols = elev.cols();
    let edge_slope = config.slope_on_edge_cell;
    let update = EdgeUpdate {
        dt,
        dx: *dx,
        n2: config.mannings_n * config.mannings_n,
        threshold: config.hflow_threshold,
        froude: config.froude_num_limit,
        suspended,
    };
    let elev: &Grid<f64> = elev;
    let depth: &Grid<f64> = water_depth;
    let vsusp: &Grid<f64> = vsusp;
    let wet: &WetMask = wet;

    flux.par_rows_mut().for_each(|(r, row)| {
        if r == 0 || r > nrows {
            return;
        }
        for &c in wet.row(r) {
            let h = elev.get(r, c);
            if is_no_data(h) {
                continue;
            }
            let this = (h, depth.get(r, c), vsusp.get(r, c));
            let cell = &mut row[c];

            // Row axis: edge with the cell above.
            let above = elev.get(r - 1, c);
            if r > 1
                && !is_no_data(above)
                && wet.contains(r - 1, c)
                && (this.1 > 0.0 || depth.get(r - 1, c) > 0.0)
            {
                let prev = (above, depth.get(r - 1, c), vsusp.get(r - 1, c));
                let forced = if r == nrows {
                    Some(-edge_slope)
                } else if r <= 2 {
                    Some(edge_slope)
                } else {
                    None
                };
                let (q, qs, v) = update.discharge(cell.qx, prev, this, forced);
                cell.qx = q;
                cell.qsx = qs;
                cell.vx = v;
            } else {
                cell.qx = 0.0;
                cell.qsx = 0.0;
                cell.vx = 0.0;
            }

            // Column axis: edge with the cell to the left.
            let left = elev.get(r, c - 1);
            if c > 1
                && !is_no_data(left)
                && wet.contains(r, c - 1)
                && (this.1 > 0.0 || depth.get(r, c - 1) > 0.0)
            {
                let prev = (left, depth.get(r, c - 1), vsusp.get(r, c - 1));
                let forced = if c == ncols {
                    Some(-edge_slope)
                } else if c <= 2 {
                    Some(edge_slope)
                } else {
                    None
                };
                let (q, qs, v) = update.discharge(cell.qy, prev, this, forced);
                cell.qy = q;
                cell.qsy = qs;
                cell.vy = v;
            } else {
                cell.qy = 0.0;
                cell.qsy = 0.0;
                cell.vy = 0.0;
            }
        }
    });
}

/// Applies the discharge divergence to depth (and suspended volume) on wetted cells.
///
/// Records the deepest wetted cell in `state.budget.max_depth`.
pub fn update_depth(state: &mut SimulationState, suspended: bool, dt: f64) -> Result<(), EngineError> {
    let SimulationState {
        flux,
        elev,
        water_depth,
        vsusp,
        wet,
        dx,
        budget,
        ..
    } = state;
    let nrows = elev.rows();
    let dx = *dx;
    let flux: &Grid<EdgeFlux> = flux;
    let elev: &Grid<f64> = elev;
    let wet: &WetMask = wet;

    let results: Vec<Result<f64, EngineError>> = water_depth
        .par_rows_mut()
        .zip(vsusp.par_rows_mut())
        .map(|((r, depth_row), (_, susp_row))| {
            let mut row_max = 0.0f64;
            if r == 0 || r > nrows {
                return Ok(row_max);
            }
            for &c in wet.row(r) {
                if is_no_data(elev.get(r, c)) {
                    depth_row[c] = 0.0;
                    continue;
                }
                let here = flux.get(r, c);
                let below = flux.get(r + 1, c);
                let right = flux.get(r, c + 1);

                let mut d = depth_row[c] + dt * (here.qx - below.qx + here.qy - right.qy) / dx;
                if !d.is_finite() || d < -NEGATIVE_DEPTH_TOLERANCE {
                    return Err(EngineError::Stability(format!(
                        "water depth {} at cell ({}, {}) after a {:.3} s flow step",
                        d, r, c, dt
                    )));
                }
                if d < 0.0 {
                    d = 0.0;
                }
                depth_row[c] = d;

                if suspended {
                    let s = susp_row[c] + dt * (here.qsx - below.qsx + here.qsy - right.qsy) / dx;
                    susp_row[c] = s.max(0.0);
                }
                row_max = row_max.max(d);
            }
            Ok(row_max)
        })
        .collect();

    let mut max_depth = 0.0f64;
    for r in results {
        max_depth = max_depth.max(r?);
    }
    budget.max_depth = max_depth;
    Ok(())
}

/// Drains boundary cells down to the erosion threshold; returns the outflow (m^3/s).
pub fn edge_outflow(state: &mut SimulationState, config: &HydrologyConfig, dt: f64) -> f64 {
    let threshold = config.water_depth_erosion_threshold;
    let rows = state.rows();
    let cols = state.cols();
    let area = state.dx * state.dx;
    let mut out = 0.0;

    for (r, c) in state.elev.cells() {
        if !(r == 1 || r == rows || c == 1 || c == cols) || !state.is_data(r, c) {
            continue;
        }
        let d = state.water_depth.get(r, c);
        if d > threshold {
            out += (d - threshold) * area / dt;
            state.water_depth.set(r, c, threshold);
        }
    }
    out
}

/// Removes `rate` metres per day of water over `minutes` of model time from every wetted cell.
pub fn evaporate(state: &mut SimulationState, rate: f64, minutes: f64, limit: f64) {
    let amount = (rate * (minutes / 1440.0)).min(limit);
    if amount <= 0.0 {
        return;
    }
    let cells: Vec<(usize, usize)> = state.wet.iter().collect();
    for (r, c) in cells {
        let d = &mut state.water_depth[(r, c)];
        if *d > 0.0 {
            *d = (*d - amount).max(0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;
    use crate::grid::NO_DATA;
    use crate::io::{ModelInputs, RainfallSeries, RasterHeader};

    fn state_from(elev: Grid<f64>) -> SimulationState {
        let header = RasterHeader::new(elev.rows(), elev.cols(), 10.0);
        let inputs = ModelInputs::from_dem(header, elev, RainfallSeries::uniform(1, 0.0));
        SimulationState::new(&ModelConfig::default(), &inputs).unwrap()
    }

    fn flat(rows: usize, cols: usize, h: f64) -> Grid<f64> {
        let mut g = Grid::new(rows, cols, NO_DATA);
        for (r, c) in g.cells().collect::<Vec<_>>() {
            g.set(r, c, h);
        }
        g
    }

    fn rescan(state: &mut SimulationState) {
        state.wet = WetMask::scan(&state.water_depth, &state.elev);
    }

    #[test]
    fn test_water_flows_toward_lower_surface() {
        let mut state = state_from(flat(5, 5, 10.0));
        state.water_depth.set(3, 3, 1.0);
        rescan(&mut state);
        let config = HydrologyConfig::default();

        route(&mut state, &config, false, 1.0);
        // Edge above (3,3): flow toward the smaller row index is negative.
        assert!(state.flux.get(3, 3).qx < 0.0);
        // Edge below (3,3): flow toward the larger row index is positive.
        assert!(state.flux.get(4, 3).qx > 0.0);
        assert!(state.flux.get(3, 4).qy > 0.0);
        assert!(outflow_velocity(&state.flux, 3, 3, Neighbour::North) > 0.0);
        assert_eq!(outflow_velocity(&state.flux, 2, 3, Neighbour::South), 0.0);
    }

    #[test]
    fn test_depth_update_conserves_interior_water() {
        let mut state = state_from(flat(7, 7, 10.0));
        state.water_depth.set(4, 4, 0.5);
        let before = state.water_volume();
        let config = HydrologyConfig::default();
        for _ in 0..20 {
            rescan(&mut state);
            route(&mut state, &config, false, 0.5);
            update_depth(&mut state, false, 0.5).unwrap();
        }
        let after = state.water_volume();
        assert!((before - after).abs() < 1e-9, "{before} vs {after}");
        for (r, c) in state.water_depth.cells() {
            assert!(state.water_depth.get(r, c) >= 0.0);
        }
        assert!(state.budget.max_depth < 0.5);
    }

    #[test]
    fn test_steps_between_rescans_conserve_water() {
        let mut state = state_from(flat(7, 7, 10.0));
        state.water_depth.set(4, 4, 0.5);
        let before = state.water_volume();
        let config = HydrologyConfig::default();
        rescan(&mut state);
        for _ in 0..4 {
            route(&mut state, &config, false, 0.5);
            update_depth(&mut state, false, 0.5).unwrap();
        }
        let after = state.water_volume();
        assert!((before - after).abs() < 1e-9, "{before} vs {after}");
        for (r, c) in state.water_depth.cells() {
            if !state.wet.contains(r, c) {
                assert_eq!(state.water_depth.get(r, c), 0.0, "({r}, {c}) outside the mask");
            }
        }
    }

    #[test]
    fn test_edges_leaving_the_mask_stay_dry() {
        let mut state = state_from(flat(7, 7, 10.0));
        state.water_depth.set(4, 4, 0.5);
        rescan(&mut state);
        // Water that arrived after the scan, on the mask's top-left corner.
        state.water_depth.set(3, 3, 0.4);
        route(&mut state, &HydrologyConfig::default(), false, 0.5);
        assert!(!state.wet.contains(2, 3));
        assert_eq!(state.flux.get(3, 3).qx, 0.0);
        assert_eq!(state.flux.get(3, 3).qy, 0.0);
        assert!(state.flux.get(4, 4).qx < 0.0);
    }

    #[test]
    fn test_volume_cap_limits_single_step_loss() {
        let mut state = state_from(flat(5, 5, 10.0));
        state.water_depth.set(3, 3, 0.01);
        rescan(&mut state);
        route(&mut state, &HydrologyConfig::default(), false, 100.0);
        update_depth(&mut state, false, 100.0).unwrap();
        assert!(state.water_depth.get(3, 3) >= 0.0);
    }

    #[test]
    fn test_dry_edges_carry_no_discharge() {
        let mut state = state_from(flat(4, 4, 10.0));
        state.flux.set(3, 3, EdgeFlux { qx: 1.0, ..Default::default() });
        state.water_depth.set(3, 3, 0.000001);
        rescan(&mut state);
        route(&mut state, &HydrologyConfig::default(), false, 1.0);
        assert_eq!(state.flux.get(3, 3).qx, 0.0);
    }

    #[test]
    fn test_edge_outflow_drains_boundary() {
        let mut state = state_from(flat(4, 4, 10.0));
        state.water_depth.set(1, 2, 0.11);
        state.water_depth.set(2, 2, 0.5);
        let out = edge_outflow(&mut state, &HydrologyConfig::default(), 10.0);
        assert!((out - 0.1 * 100.0 / 10.0).abs() < 1e-9);
        assert!((state.water_depth.get(1, 2) - 0.01).abs() < 1e-12);
        assert_eq!(state.water_depth.get(2, 2), 0.5);
    }

    #[test]
    fn test_evaporation_floors_at_zero() {
        let mut state = state_from(flat(3, 3, 1.0));
        state.water_depth.set(2, 2, 0.001);
        state.water_depth.set(2, 3, 0.2);
        rescan(&mut state);
        evaporate(&mut state, 0.01, 1440.0, 0.05);
        assert_eq!(state.water_depth.get(2, 2), 0.0);
        assert!((state.water_depth.get(2, 3) - 0.19).abs() < 1e-12);
    }
}
