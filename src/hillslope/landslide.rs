//! Slope failure: local landsliding around active channels and the daily global sweep.

use log::debug;

use crate::engine::SimulationState;
use crate::grid::{is_no_data, NEIGHBOURS};

/// Global sweeps use a threshold of this many cell widths where the surface sits on bedrock.
const BEDROCK_THRESHOLD_CELLS: f64 = 10.0;
/// Diagonal drops are reduced by this factor before comparing to the threshold.
const DIAGONAL_FACTOR: f64 = 1.41;
/// Upper bound on global sweeps per call.
pub const MAX_GLOBAL_SWEEPS: usize = 200;

/// Critical height difference between neighbouring cells for a failure angle in degrees.
#[inline]
pub fn critical_drop(angle_degrees: f64, dx: f64) -> f64 {
    angle_degrees.to_radians().tan() * dx
}

/// Moves the excess over `threshold` from a cell to each of its neighbours in turn.
///
/// The cell is never taken below `floor`; single moves are capped at `limit`.
/// Returns the total height moved.
fn fail_cell(state: &mut SimulationState, r: usize, c: usize, threshold: f64, floor: f64, limit: f64) -> f64 {
    let mut moved = 0.0;
    for n in NEIGHBOURS {
        let (nr, nc) = n.step(r, c);
        let h = state.elev.get(r, c);
        let nh = state.elev.get(nr, nc);
        if is_no_data(nh) {
            continue;
        }
        let mut drop = h - nh;
        if n.is_diagonal() {
            drop /= DIAGONAL_FACTOR;
        }
        if drop <= threshold {
            continue;
        }
        let diff = (drop - threshold).min(h - floor).min(limit);
        if diff <= 0.0 {
            continue;
        }
        let surface = (nh, state.bedrock.get(nr, nc));
        state.grains.slide((r, c), (nr, nc), diff, surface);
        state.elev[(r, c)] -= diff;
        state.elev[(nr, nc)] += diff;
        moved += diff;
    }
    moved
}

/// Collapses over-steep slopes on the wetted cells. Returns the height moved (m).
pub fn local_landslide(state: &mut SimulationState, angle_degrees: f64) -> f64 {
    let critical = critical_drop(angle_degrees, state.dx);
    let active = state.grains.active_thickness();
    let cells: Vec<(usize, usize)> = state
        .wet
        .iter()
        .filter(|&(r, c)| !state.elev.is_domain_edge(r, c) && state.is_data(r, c))
        .collect();

    let mut moved = 0.0;
    for (r, c) in cells {
        let floor = state.bedrock.get(r, c) + active;
        if state.elev.get(r, c) <= floor {
            continue;
        }
        moved += fail_cell(state, r, c, critical, floor, f64::INFINITY);
    }
    moved
}

/// Sweeps the whole domain until no slope exceeds the failure angle or the sweep cap is hit.
///
/// Single moves are limited to `erosion_limit`. Returns `(height moved, sweeps)`.
pub fn global_landslide(state: &mut SimulationState, angle_degrees: f64, erosion_limit: f64) -> (f64, usize) {
    let dx = state.dx;
    let critical = critical_drop(angle_degrees, dx);
    let active = state.grains.active_thickness();
    let cells: Vec<(usize, usize)> = state
        .elev
        .cells()
        .filter(|&(r, c)| !state.elev.is_domain_edge(r, c) && state.is_data(r, c))
        .collect();

    let mut total = 0.0;
    let mut sweeps = 0;
    loop {
        let mut moved = 0.0;
        for &(r, c) in &cells {
            let floor = state.bedrock.get(r, c) + active;
            let threshold = if state.elev.get(r, c) <= floor {
                BEDROCK_THRESHOLD_CELLS * dx
            } else {
                critical
            };
            moved += fail_cell(state, r, c, threshold, floor, erosion_limit);
        }
        sweeps += 1;
        total += moved;
        if moved <= 0.0 || sweeps >= MAX_GLOBAL_SWEEPS {
            break;
        }
    }
    debug!("global landslide: {:.4} m moved in {} sweep(s)", total, sweeps);
    (total, sweeps)
}
