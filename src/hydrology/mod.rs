//! Rainfall-runoff, flow routing and wetted-area tracking.

pub mod config;
pub mod routing;
pub mod runoff;
pub mod scan;

pub use config::HydrologyConfig;
pub use routing::{edge_outflow, evaporate, outflow_velocity, route, update_depth, EdgeFlux};
pub use runoff::{find_input_points, store_step, RainZone, RunoffModel};
pub use scan::WetMask;

use log::debug;

use crate::config::ModelConfig;
use crate::engine::SimulationState;
use crate::io::RainfallSeries;

/// Threshold rate per unit catchment area above which a storm may cap the timestep.
const STORM_RATE_FACTOR: f64 = 0.2;

/// Adds this tick's runoff at the input points and catches the stores up with the clock.
///
/// Returns the water added (m^3/s).
pub fn apply_runoff(state: &mut SimulationState, config: &ModelConfig, rainfall: &RainfallSeries, flow_dt: f64) -> f64 {
    let limit = config.sediment.erosion_limit;
    let cell_area = state.dx * state.dx;

    let rates: Vec<f64> = state
        .runoff
        .zones
        .iter()
        .map(|z| z.j_mean * z.cells as f64 / z.input_points as f64)
        .collect();

    let mut water_input = 0.0;
    if flow_dt > 0.0 {
        for (r, c) in state.elev.cells() {
            if !state.input_point.get(r, c) {
                continue;
            }
            let add = (rates[state.rain_zone.get(r, c)] * flow_dt).min(limit);
            if add <= 0.0 {
                continue;
            }
            water_input += add / flow_dt * cell_area;
            state.water_depth[(r, c)] += add;
        }
    }

    let cycle = state.clock.cycle;
    if cycle >= state.runoff.time_1 {
        let storm_rate = STORM_RATE_FACTOR / (state.data_cells as f64 * cell_area);
        loop {
            state.runoff.time_1 += 1.0;
            let minute = state.runoff.time_1;
            state.runoff.advance(rainfall, minute);

            let ts = &mut state.timestep;
            if ts.time_factor() > ts.max_time_step() && state.runoff.max_new_j_mean() > storm_rate {
                ts.cap_for_runoff();
                state.clock.cycle = minute + ts.max_time_step() / 60.0;
                debug!("storm onset at minute {}: timestep capped", minute);
            }
            if state.runoff.time_1 >= state.clock.cycle {
                break;
            }
        }
    }
    let offset = state.runoff.time_1 - state.clock.cycle;
    state.runoff.interpolate(offset);

    if state.runoff.adjust_baseflow() {
        state.refresh_drainage(config);
    }

    water_input
}

/// Rescans the wetted area and clears discharge on edges that left it.
pub fn refresh_wet_mask(state: &mut SimulationState) {
    state.wet = WetMask::scan(&state.water_depth, &state.elev);
    let cells: Vec<(usize, usize)> = state.elev.cells().collect();
    for (r, c) in cells {
        if !state.wet.contains(r, c) {
            state.flux.set(r, c, EdgeFlux::default());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Grid, NO_DATA};
    use crate::io::{ModelInputs, RasterHeader};

    fn valley_state(config: &ModelConfig) -> SimulationState {
        let mut elev = Grid::new(8, 5, NO_DATA);
        for (r, c) in elev.cells().collect::<Vec<_>>() {
            elev.set(r, c, 40.0 - r as f64 + (c as f64 - 3.0).abs());
        }
        let header = RasterHeader::new(8, 5, 10.0);
        let inputs = ModelInputs::from_dem(header, elev, RainfallSeries::uniform(1, 10.0));
        SimulationState::new(config, &inputs).unwrap()
    }

    #[test]
    fn test_runoff_adds_water_at_input_points() {
        let mut config = ModelConfig::default();
        // Every data cell qualifies as an input point.
        config.hydrology.min_q_for_depth_calc = 1e-12;
        let mut state = valley_state(&config);
        let rain = RainfallSeries::uniform(1, 10.0);

        let mut added = 0.0;
        for _ in 0..30 {
            state.clock.cycle += 1.0;
            added += apply_runoff(&mut state, &config, &rain, 10.0);
        }
        assert!(added > 0.0);
        assert!(state.water_depth.sum() > 0.0);
        assert!(state.runoff.zones[0].j_mean > 0.0);
        assert!(state.runoff.time_1 >= state.clock.cycle);
    }

    #[test]
    fn test_dry_weather_adds_nothing() {
        let config = ModelConfig::default();
        let mut state = valley_state(&config);
        let rain = RainfallSeries::uniform(1, 0.0);
        for _ in 0..5 {
            state.clock.cycle += 1.0;
            apply_runoff(&mut state, &config, &rain, 10.0);
        }
        assert!(state.water_depth.sum() < 1e-6);
    }

    #[test]
    fn test_refresh_clears_abandoned_edges() {
        let config = ModelConfig::default();
        let mut state = valley_state(&config);
        state.flux.set(2, 2, EdgeFlux { qx: 0.3, ..Default::default() });
        refresh_wet_mask(&mut state);
        assert_eq!(state.flux.get(2, 2).qx, 0.0);
    }
}
