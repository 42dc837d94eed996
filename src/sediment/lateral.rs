//! Bank-curvature detection for lateral erosion.
//!
//! Channel cells are those carrying shear stress. Dry cells touching the
//! channel are banks; their curvature is estimated on a twice-upscaled
//! wet/dry image, smoothed along the bank, nudged downstream and converted to
//! an erodibility that lateral bank erosion reads from `state.edge`.

use log::{debug, warn};

use crate::config::ModelConfig;
use crate::engine::SimulationState;
use crate::grid::{Grid, CARDINALS, NEIGHBOURS};

/// Shear stress marking a channel cell (Pa).
const CHANNEL_TAU: f64 = 0.1;
/// Channel cells with more dry neighbours than this are isolated and ignored.
const MAX_DRY_NEIGHBOURS: usize = 6;
/// Bound on cross-channel averaging sweeps.
const MAX_CROSS_CHANNEL_SWEEPS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubCell {
    Dry,
    Wet,
    Bank,
}

/// Recomputes `state.edge` from the current shear-stress field.
pub fn update_bank_curvature(state: &mut SimulationState, config: &ModelConfig) {
    let rows = state.rows();
    let cols = state.cols();
    let lateral = &config.sediment.lateral;
    let threshold = config.hydrology.water_depth_erosion_threshold;

    let channel = channel_mask(state);
    let mut edge = bank_cells(&channel, rows, cols);
    curvature(&channel, &mut edge, rows, cols);

    let ws = mean_surface(state, threshold);
    let passes = lateral.edge_filter_passes + lateral.cells_shift_lat;
    for n in 1..=passes {
        let downstream = n > lateral.edge_filter_passes;
        smooth_along_bank(&channel, &mut edge, &ws, downstream);
    }

    let dx = state.dx;
    for (r, c) in channel.cells() {
        if let Some(e) = edge.get(r, c) {
            let e = -e.min(0.0);
            let value = if e > 0.0 { 1.0 / (2.131 * e.powf(-1.0794) * dx) } else { 0.0 };
            edge.set(r, c, Some(value));
        }
        if state.water_depth.get(r, c) > threshold && edge.get(r, c).is_none() {
            edge.set(r, c, Some(0.0));
        }
    }

    let sweeps = smooth_across_channel(&channel, &mut edge, lateral.max_diff_cross_chann);
    if sweeps >= MAX_CROSS_CHANNEL_SWEEPS {
        warn!("cross-channel smoothing stopped after {} sweeps without settling", sweeps);
    }

    let mut banks = 0usize;
    for (r, c) in channel.cells() {
        let v = edge.get(r, c).unwrap_or(0.0);
        if v > 0.0 {
            banks += 1;
        }
        state.edge.set(r, c, v);
    }
    debug!("bank curvature refreshed: {} erodible bank cells, {} cross-channel sweeps", banks, sweeps);
}

/// Channel flags from shear stress over the wetted area.
fn channel_mask(state: &SimulationState) -> Grid<bool> {
    let mut channel = Grid::new(state.rows(), state.cols(), false);
    for (r, c) in state.wet.iter() {
        if state.elev.is_domain_edge(r, c) || state.tau.get(r, c) <= CHANNEL_TAU {
            continue;
        }
        let dry = NEIGHBOURS
            .iter()
            .filter(|n| state.tau.neighbour(r, c, **n) < CHANNEL_TAU)
            .count();
        if dry <= MAX_DRY_NEIGHBOURS {
            channel.set(r, c, true);
        }
    }
    channel
}

/// Dry cells beside the channel (but not enclosed by it) start with `Some(0)`.
fn bank_cells(channel: &Grid<bool>, rows: usize, cols: usize) -> Grid<Option<f64>> {
    let mut edge = Grid::new(rows, cols, None);
    for (r, c) in channel.cells() {
        if channel.get(r, c) || channel.is_domain_edge(r, c) {
            continue;
        }
        let wet = CARDINALS.iter().filter(|n| channel.neighbour(r, c, **n)).count();
        if wet > 0 && wet < 4 {
            edge.set(r, c, Some(0.0));
        }
    }
    edge
}

/// Net wet-minus-dry count of each bank cell, estimated on a 2x upscaled image.
fn curvature(channel: &Grid<bool>, edge: &mut Grid<Option<f64>>, rows: usize, cols: usize) {
    let urows = (rows + 2) * 2;
    let ucols = (cols + 2) * 2;
    let mut image = vec![SubCell::Dry; urows * ucols];
    let at = |r: usize, c: usize| r * ucols + c;

    for (r, c) in channel.cells() {
        if channel.is_domain_edge(r, c) || !channel.get(r, c) {
            continue;
        }
        for (sr, sc) in sub_cells(r, c) {
            image[at(sr, sc)] = SubCell::Wet;
        }
    }

    for r in 1..urows - 1 {
        for c in 1..ucols - 1 {
            if image[at(r, c)] != SubCell::Dry {
                continue;
            }
            let touches = [(r - 1, c), (r + 1, c), (r, c - 1), (r, c + 1)]
                .iter()
                .any(|&(nr, nc)| image[at(nr, nc)] == SubCell::Wet);
            if touches {
                image[at(r, c)] = SubCell::Bank;
            }
        }
    }

    let mut score = vec![0i32; urows * ucols];
    for r in 1..urows - 1 {
        for c in 1..ucols - 1 {
            if image[at(r, c)] != SubCell::Bank {
                continue;
            }
            let (mut wet, mut dry, mut banks) = (0i32, 0i32, 1i32);
            for (nr, nc) in [(r - 1, c), (r + 1, c), (r, c - 1), (r, c + 1)] {
                match image[at(nr, nc)] {
                    SubCell::Wet => wet += 1,
                    SubCell::Dry => dry += 1,
                    SubCell::Bank => banks += 1,
                }
            }
            if banks > 3 {
                dry += banks - 2;
            }
            score[at(r, c)] = wet - dry;
        }
    }

    for (r, c) in channel.cells() {
        if edge.get(r, c).is_some() {
            let total: i32 = sub_cells(r, c).iter().map(|&(sr, sc)| score[at(sr, sc)]).sum();
            edge.set(r, c, Some(f64::from(total.clamp(-2, 2))));
        }
    }
}

/// The four upscaled sub-cells of `(row, col)`.
#[inline]
fn sub_cells(row: usize, col: usize) -> [(usize, usize); 4] {
    [
        (row * 2 - 1, col * 2 - 1),
        (row * 2 - 1, col * 2),
        (row * 2, col * 2 - 1),
        (row * 2, col * 2),
    ]
}

/// Mean water-surface elevation of the deep neighbours of every cell.
fn mean_surface(state: &SimulationState, threshold: f64) -> Grid<f64> {
    let mut ws = Grid::new(state.rows(), state.cols(), 0.0);
    for (r, c) in state.elev.cells() {
        let (mut total, mut count) = (0.0, 0usize);
        for n in NEIGHBOURS {
            let (nr, nc) = n.step(r, c);
            let d = state.water_depth.get(nr, nc);
            if d > threshold {
                total += d + state.elev.get(nr, nc);
                count += 1;
            }
        }
        if count > 0 {
            ws.set(r, c, total / count as f64);
        }
    }
    ws
}

/// One averaging pass over bank cells.
///
/// Cardinal neighbours count when they share a wet diagonal with the cell;
/// diagonal ones when the corner between them is dry. Downstream passes only
/// take neighbours with a higher mean water surface.
fn smooth_along_bank(channel: &Grid<bool>, edge: &mut Grid<Option<f64>>, ws: &Grid<f64>, downstream: bool) {
    let rows = channel.rows();
    let cols = channel.cols();
    let mut next = edge.clone();

    for (r, c) in channel.cells() {
        let Some(value) = edge.get(r, c) else {
            continue;
        };
        let mut mean = value;
        let mut num = 1.0;
        for n in NEIGHBOURS {
            let (nr, nc) = n.step(r, c);
            let Some(other) = edge.get(nr, nc) else {
                continue;
            };
            if channel.get(nr, nc) || (downstream && ws.get(nr, nc) <= ws.get(r, c)) {
                continue;
            }
            let (dr, _) = n.offset();
            let linked = if n.is_diagonal() {
                !channel.get(r, nc) || !channel.get(nr, c)
            } else if dr != 0 {
                channel.get(nr, c - 1) || channel.get(nr, c + 1)
            } else {
                channel.get(r - 1, nc) || channel.get(r + 1, nc)
            };
            if linked {
                mean += other;
                num += 1.0;
            }
        }
        let mut smoothed = if mean != 0.0 { mean / num } else { 0.0 };
        if r < 3 || r + 3 > rows || c < 3 || c + 3 > cols {
            smoothed = 0.0;
        }
        next.set(r, c, Some(smoothed));
    }
    *edge = next;
}

/// Averages values across wet channel cells until the largest change drops below `tolerance`.
///
/// Returns the number of sweeps.
fn smooth_across_channel(channel: &Grid<bool>, edge: &mut Grid<Option<f64>>, tolerance: f64) -> usize {
    let cells: Vec<(usize, usize)> = channel.cells().filter(|&(r, c)| channel.get(r, c)).collect();
    if cells.is_empty() {
        return 0;
    }
    for &(r, c) in &cells {
        if edge.get(r, c).is_none() {
            edge.set(r, c, Some(0.0));
        }
    }

    let mut sweeps = 0;
    loop {
        sweeps += 1;
        let mut updates = Vec::with_capacity(cells.len());
        for &(r, c) in &cells {
            let (mut mean, mut num) = (0.0, 0.0);
            for n in CARDINALS {
                let (nr, nc) = n.step(r, c);
                if let Some(v) = edge.get(nr, nc) {
                    mean += v;
                    num += 1.0;
                }
            }
            if num > 0.0 {
                updates.push((r, c, mean / num));
            }
        }

        let mut largest = 0.0f64;
        for (r, c, v) in updates {
            let old = edge.get(r, c).unwrap_or(0.0);
            largest = largest.max((old - v).abs());
            edge.set(r, c, Some(v));
        }
        if largest <= tolerance || sweeps >= MAX_CROSS_CHANNEL_SWEEPS {
            return sweeps;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::NO_DATA;
    use crate::hydrology::refresh_wet_mask;
    use crate::io::{ModelInputs, RainfallSeries, RasterHeader};

    /// A straight channel down column 6 of an 11 x 11 grid.
    fn channel_state() -> SimulationState {
        let mut elev = Grid::new(11, 11, NO_DATA);
        for (r, c) in elev.cells().collect::<Vec<_>>() {
            elev.set(r, c, 10.0 + (c as f64 - 6.0).abs());
        }
        let header = RasterHeader::new(11, 11, 5.0);
        let inputs = ModelInputs::from_dem(header, elev, RainfallSeries::uniform(1, 0.0));
        let mut state = SimulationState::new(&ModelConfig::default(), &inputs).unwrap();
        for r in 1..=11 {
            state.water_depth.set(r, 6, 0.5);
            state.tau.set(r, 6, 5.0);
        }
        refresh_wet_mask(&mut state);
        state
    }

    #[test]
    fn test_channel_mask_follows_shear() {
        let state = channel_state();
        let channel = channel_mask(&state);
        assert!(channel.get(5, 6));
        assert!(!channel.get(5, 5));
        // Domain-edge cells never count as channel.
        assert!(!channel.get(1, 6));
    }

    #[test]
    fn test_banks_flank_channel() {
        let state = channel_state();
        let channel = channel_mask(&state);
        let edge = bank_cells(&channel, 11, 11);
        assert_eq!(edge.get(5, 5), Some(0.0));
        assert_eq!(edge.get(5, 7), Some(0.0));
        assert_eq!(edge.get(5, 4), None);
        assert_eq!(edge.get(5, 6), None);
    }

    #[test]
    fn test_straight_bank_has_bounded_curvature() {
        let state = channel_state();
        let channel = channel_mask(&state);
        let mut edge = bank_cells(&channel, 11, 11);
        curvature(&channel, &mut edge, 11, 11);
        let v = edge.get(5, 5).unwrap();
        assert!((-2.0..=2.0).contains(&v));
    }

    #[test]
    fn test_update_writes_finite_values() {
        let mut state = channel_state();
        let mut config = ModelConfig::default();
        config.sediment.lateral.enabled = true;
        config.sediment.lateral.edge_filter_passes = 5;
        config.sediment.lateral.cells_shift_lat = 2;
        update_bank_curvature(&mut state, &config);
        for (r, c) in state.edge.cells() {
            let v = state.edge.get(r, c);
            assert!(v.is_finite() && v >= 0.0, "({r}, {c}) = {v}");
        }
    }

    #[test]
    fn test_cross_channel_smoothing_settles() {
        let mut channel = Grid::new(3, 3, false);
        channel.set(2, 2, true);
        let mut edge = Grid::new(3, 3, None);
        edge.set(2, 1, Some(1.0));
        edge.set(2, 3, Some(3.0));
        let sweeps = smooth_across_channel(&channel, &mut edge, 1e-6);
        assert!(sweeps >= 1);
        assert!((edge.get(2, 2).unwrap() - 2.0).abs() < 1e-12);
    }
}
