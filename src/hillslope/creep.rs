//! Slope-driven diffusion: soil creep and area-dependent soil erosion.

use crate::engine::SimulationState;
use crate::grid::{is_no_data, Grid, NEIGHBOURS};

/// Moves material from every interior cell to each lower neighbour.
///
/// The move toward a neighbour at distance `d` is `(drop / d) * rate * time / d`,
/// scaled by `sqrt(area * dx^2)` when `area_weighted`. The donor's combined
/// moves never take it below bedrock. Moves are accumulated and applied
/// together; grains follow when the donor has a record. Returns the total volume moved (m^3).
pub fn diffuse(state: &mut SimulationState, rate: f64, time: f64, area_weighted: bool) -> f64 {
    let dx = state.dx;
    let mut delta = Grid::new(state.rows(), state.cols(), 0.0);
    let mut moved = 0.0;

    let cells: Vec<(usize, usize)> = state.elev.cells().collect();
    for (r, c) in cells {
        let h = state.elev.get(r, c);
        let floor = state.bedrock.get(r, c);
        if is_no_data(h) || state.elev.is_domain_edge(r, c) || h <= floor {
            continue;
        }
        let mut available = h - floor;
        let scale = if area_weighted {
            (state.area.get(r, c) * dx * dx).sqrt()
        } else {
            1.0
        };

        for n in NEIGHBOURS {
            let (nr, nc) = n.step(r, c);
            let nh = state.elev.get(nr, nc);
            if is_no_data(nh) || nh >= h {
                continue;
            }
            let dist = dx * n.distance();
            let amount = (((h - nh) / dist) * rate * time / dist * scale).min(available);
            if amount <= 0.0 {
                continue;
            }
            available -= amount;
            delta[(r, c)] -= amount;
            delta[(nr, nc)] += amount;
            moved += amount;
            if state.grains.has_record(r, c) {
                let surface = (nh, state.bedrock.get(nr, nc));
                state.grains.slide((r, c), (nr, nc), amount, surface);
            }
        }
    }

    for (r, c) in state.elev.cells().collect::<Vec<_>>() {
        let d = delta.get(r, c);
        if d != 0.0 {
            state.elev[(r, c)] += d;
        }
    }
    moved * dx * dx
}
