//! Whole-model runs on small synthetic catchments.

use tempfile::tempdir;

use super::*;
use crate::grid::{is_no_data, Grid, NO_DATA};
use crate::io::RasterHeader;
use crate::synthetic::SyntheticValley;
use crate::timestep::cfl_limit;

fn config_in(dir: &std::path::Path, hours: f64) -> ModelConfig {
    let mut config = ModelConfig::default();
    config.io.write_path = dir.to_path_buf();
    config.io.raster_output_interval = 1.0e9;
    config.time.max_run_duration = hours;
    config
}

fn build(config: ModelConfig, header: RasterHeader, elev: Grid<f64>, bedrock: Option<Grid<f64>>, rain: f64) -> Simulation {
    let mut inputs = ModelInputs::from_dem(header, elev, RainfallSeries::uniform(1, rain));
    inputs.bedrock = bedrock;
    Simulation::new(config, inputs).unwrap()
}

fn plane(rows: usize, cols: usize, slope: f64, dx: f64) -> Grid<f64> {
    let mut g = Grid::new(rows, cols, NO_DATA);
    for (r, c) in g.cells().collect::<Vec<_>>() {
        g.set(r, c, 50.0 + (rows - r) as f64 * dx * slope);
    }
    g
}

#[test]
fn test_flat_basin_without_rain_stays_put() {
    let dir = tempdir().unwrap();
    let mut flat = Grid::new(10, 10, NO_DATA);
    for (r, c) in flat.cells().collect::<Vec<_>>() {
        flat.set(r, c, 10.0);
    }
    let initial = flat.clone();
    let mut sim = build(config_in(dir.path(), 2.0), RasterHeader::new(10, 10, 10.0), flat, None, 0.0);

    for _ in 0..200 {
        sim.tick().unwrap();
    }
    let state = sim.state();
    assert_eq!(state.elev.as_slice(), initial.as_slice());
    assert!(state.water_depth.max_value().unwrap_or(0.0) < 1e-6);
    assert_eq!(state.sediment_out.total, 0.0);
}

#[test]
fn test_hydrology_only_never_moves_the_surface() {
    let dir = tempdir().unwrap();
    let mut config = config_in(dir.path(), 1.0);
    config.hydro_model_only = true;
    config.hydrology.min_q_for_depth_calc = 0.0;
    let elev = plane(12, 6, 0.05, 10.0);
    let initial = elev.clone();
    let mut sim = build(config, RasterHeader::new(12, 6, 10.0), elev, None, 100.0);

    sim.run(|_| {}).unwrap();
    assert_eq!(sim.state().elev.as_slice(), initial.as_slice());
    assert!(sim.state().water_volume() > 0.0);
}

#[test]
fn test_state_stays_physical_every_tick() {
    let dir = tempdir().unwrap();
    let mut config = config_in(dir.path(), 2.0);
    config.sediment.bedrock_layer_on = true;
    let valley = SyntheticValley {
        rows: 14,
        cols: 9,
        ..Default::default()
    };
    let (header, elev) = valley.generate();
    let bedrock = elev.map(|h| if is_no_data(h) { h } else { h - 0.3 });
    let courant = config.time.courant_number;
    let mut sim = build(config, header, elev, Some(bedrock), 30.0);
    let dx = sim.state().dx;

    let mut ticks = 0;
    while !sim.is_finished() && ticks < 3000 {
        let prior_depth = sim.state().budget.max_depth;
        let report = sim.tick().unwrap();
        ticks += 1;
        assert!(
            report.flow_dt <= cfl_limit(courant, dx, prior_depth) + 1e-9,
            "tick {}: dt {} above the CFL bound for depth {}",
            report.counter,
            report.flow_dt,
            prior_depth
        );

        let state = sim.state();
        for (r, c) in state.elev.cells() {
            if !state.is_data(r, c) {
                continue;
            }
            assert!(state.water_depth.get(r, c) >= 0.0, "negative depth at ({r}, {c})");
            assert!(
                state.elev.get(r, c) >= state.bedrock.get(r, c) - 1e-9,
                "tick {}: surface below bedrock at ({r}, {c})",
                report.counter
            );
        }
        for (r, c, record) in state.grains.iter() {
            let negative = record.active.iter().chain(record.strata.iter().flatten()).any(|&v| v < -1e-12);
            assert!(!negative, "tick {}: negative grain amount at ({r}, {c})", report.counter);
        }
    }
    assert!(ticks > 0);
}

#[test]
fn test_single_cell_reaches_steady_discharge() {
    let dir = tempdir().unwrap();
    let mut config = config_in(dir.path(), 3.0);
    config.hydrology.min_q_for_depth_calc = 0.0;
    let mut elev = Grid::new(1, 1, NO_DATA);
    elev.set(1, 1, 5.0);
    // 36 mm/hr is 1e-5 m/s over a 100 m^2 cell.
    let mut sim = build(config, RasterHeader::new(1, 1, 10.0), elev, None, 36.0);

    let mut last = TickReport::default();
    sim.run(|report| last = report.clone()).unwrap();

    let expected = 1.0e-5 * 100.0;
    assert!((last.water_input - expected).abs() / expected < 0.01, "input {}", last.water_input);
    assert!(
        (last.water_out - last.water_input).abs() / last.water_input < 1e-3,
        "in {} out {}",
        last.water_input,
        last.water_out
    );
}

#[test]
fn test_plane_erodes_more_downslope() {
    let dir = tempdir().unwrap();
    let mut config = config_in(dir.path(), 2.0);
    config.hillslope.creep_rate = 0.0;
    config.hillslope.soil_erosion_rate = 0.0;
    config.hillslope.landslide_on = false;
    let rows = 16;
    let elev = plane(rows, 8, 0.05, 10.0);
    let mut sim = build(config, RasterHeader::new(rows, 8, 10.0), elev, None, 200.0);
    sim.run(|_| {}).unwrap();

    let state = sim.state();
    let diff = state.elevation_change();
    let lowering = |range: std::ops::RangeInclusive<usize>| -> f64 {
        range
            .flat_map(|r| (2..state.cols()).map(move |c| (r, c)))
            .map(|(r, c)| diff.get(r, c).max(0.0))
            .sum()
    };
    let upper = lowering(2..=rows / 2);
    let lower = lowering(rows / 2 + 1..=rows - 1);
    assert!(lower >= upper, "upper {} lower {}", upper, lower);
}
