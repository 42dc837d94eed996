//! TOPMODEL-style rainfall-runoff.
//!
//! Each rain zone carries an exponential soil store. Every simulated minute the
//! store is advanced analytically under that minute's rainfall and the mean
//! runoff rate over the minute becomes the zone's new target rate. Runoff is
//! injected at "input points", the cells whose baseflow discharge lies in a
//! configured window.

use log::{debug, info};

use crate::grid::{is_no_data, Grid};
use crate::hydrology::HydrologyConfig;
use crate::io::RainfallSeries;

/// Length of one store update (s).
pub const RUNOFF_STEP: f64 = 60.0;
/// Baseflow (m/s) the input-point search starts from.
pub const INITIAL_BASEFLOW: f64 = 0.000000005;
/// Initial store state (m/s).
const INITIAL_J: f64 = 0.000000001;

/// Store and rate state of one rain zone.
#[derive(Debug, Clone)]
pub struct RainZone {
    pub j: f64,
    pub jo: f64,
    /// Runoff rate applied this tick (m/s).
    pub j_mean: f64,
    pub old_j_mean: f64,
    pub new_j_mean: f64,
    /// Data cells in the zone.
    pub cells: usize,
    /// Input points in the zone (never zero once computed).
    pub input_points: usize,
}

impl Default for RainZone {
    fn default() -> Self {
        Self {
            j: INITIAL_J,
            jo: INITIAL_J,
            j_mean: 0.0,
            old_j_mean: 0.0,
            new_j_mean: 0.0,
            cells: 0,
            input_points: 1,
        }
    }
}

/// Advances a store over `dt` seconds under rainfall `rate` (m/s).
///
/// Returns the new store value and the mean runoff rate over the step.
pub fn store_step(rate: f64, jo: f64, m: f64, dt: f64) -> (f64, f64) {
    if rate == 0.0 {
        let j = jo / (1.0 + (jo * dt) / m);
        let mean = (m / dt) * (1.0 + (jo * dt) / m).ln();
        (j, mean.max(0.0))
    } else {
        let j = rate / (((rate - jo) / jo) * (-rate * dt / m).exp() + 1.0);
        let mean = (m / dt) * (((rate - jo) + jo * (rate * dt / m).exp()) / rate).ln();
        (j, mean.max(0.0))
    }
}

/// Per-zone runoff state plus the baseflow used to place input points.
#[derive(Debug, Clone)]
pub struct RunoffModel {
    pub zones: Vec<RainZone>,
    pub baseflow: f64,
    /// Last simulated minute the stores were advanced to.
    pub time_1: f64,
    m: f64,
    rain_factor: f64,
}

impl RunoffModel {
    pub fn new(zones: usize, config: &HydrologyConfig) -> Self {
        Self {
            zones: vec![RainZone::default(); zones.max(1)],
            baseflow: INITIAL_BASEFLOW,
            time_1: 0.0,
            m: config.topmodel_m,
            rain_factor: config.rain_factor,
        }
    }

    /// Advances every zone's store by one minute using the rainfall at `minute`.
    pub fn advance(&mut self, rainfall: &RainfallSeries, minute: f64) {
        for (n, zone) in self.zones.iter_mut().enumerate() {
            zone.old_j_mean = zone.new_j_mean;
            zone.jo = zone.j;
            let rate = self.rain_factor * rainfall.rate(minute, n) / 1000.0 / 3600.0;
            let (j, mean) = store_step(rate, zone.jo, self.m, RUNOFF_STEP);
            zone.j = j;
            zone.new_j_mean = mean;
        }
    }

    /// Interpolates the applied rate between the last two store means.
    ///
    /// `offset` is how far (minutes) the stores run ahead of the model clock.
    pub fn interpolate(&mut self, offset: f64) {
        for zone in &mut self.zones {
            zone.j_mean = zone.old_j_mean + ((zone.new_j_mean - zone.old_j_mean) / 2.0) * (2.0 - offset);
        }
    }

    pub fn max_j_mean(&self) -> f64 {
        self.zones.iter().map(|z| z.j_mean).fold(0.0, f64::max)
    }

    pub fn max_new_j_mean(&self) -> f64 {
        self.zones.iter().map(|z| z.new_j_mean).fold(0.0, f64::max)
    }

    /// Adjusts baseflow to the current runoff rate.
    ///
    /// Returns true when input points must be recomputed.
    pub fn adjust_baseflow(&mut self) -> bool {
        let jmax = self.max_j_mean();
        if jmax >= self.baseflow {
            self.baseflow *= 3.0;
            debug!("baseflow raised to {:e}", self.baseflow);
            return true;
        }
        if self.baseflow > jmax * 3.0 && self.baseflow > 0.0000001 {
            self.baseflow = jmax * 1.25;
            debug!("baseflow lowered to {:e}", self.baseflow);
            return true;
        }
        false
    }
}

/// Marks cells whose baseflow discharge falls inside the input window and counts them per zone.
pub fn find_input_points(
    area: &Grid<f64>,
    elev: &Grid<f64>,
    rain_zone: &Grid<usize>,
    runoff: &mut RunoffModel,
    input_point: &mut Grid<bool>,
    dx: f64,
    config: &HydrologyConfig,
) {
    input_point.fill(false);
    let mut counts = vec![0usize; runoff.zones.len()];
    let scale = runoff.baseflow * 3.0 * dx * dx;

    for (r, c) in elev.cells() {
        if is_no_data(elev.get(r, c)) {
            continue;
        }
        let q = area.get(r, c) * scale;
        if q > config.min_q_for_depth_calc && q < config.max_q_for_depth_calc {
            input_point.set(r, c, true);
            counts[rain_zone.get(r, c)] += 1;
        }
    }

    let total: usize = counts.iter().sum();
    for (zone, count) in runoff.zones.iter_mut().zip(&counts) {
        zone.input_points = (*count).max(1);
    }
    info!("{} rainfall input points at baseflow {:e}", total, runoff.baseflow);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dry_store_drains() {
        let (j, mean) = store_step(0.0, 1e-6, 0.005, 60.0);
        assert!(j < 1e-6);
        assert!(mean > 0.0 && mean < 1e-6);
    }

    #[test]
    fn test_wet_store_approaches_rainfall() {
        let rate = 10.0 / 1000.0 / 3600.0;
        let mut jo = INITIAL_J;
        let mut mean = 0.0;
        for _ in 0..2000 {
            let (j, m) = store_step(rate, jo, 0.005, 60.0);
            jo = j;
            mean = m;
        }
        assert!((jo - rate).abs() / rate < 1e-3);
        assert!((mean - rate).abs() / rate < 1e-3);
    }

    #[test]
    fn test_interpolation_endpoints() {
        let mut model = RunoffModel::new(1, &HydrologyConfig::default());
        model.zones[0].old_j_mean = 1.0;
        model.zones[0].new_j_mean = 3.0;
        model.interpolate(2.0);
        assert_eq!(model.zones[0].j_mean, 1.0);
        model.interpolate(0.0);
        assert_eq!(model.zones[0].j_mean, 3.0);
    }

    #[test]
    fn test_baseflow_tracks_runoff() {
        let mut model = RunoffModel::new(1, &HydrologyConfig::default());
        model.zones[0].j_mean = 1e-8;
        assert!(model.adjust_baseflow());
        assert!((model.baseflow - 1.5e-8).abs() < 1e-20);

        model.zones[0].j_mean = 1e-9;
        model.baseflow = 1e-6;
        assert!(model.adjust_baseflow());
        assert!((model.baseflow - 1.25e-9).abs() < 1e-20);
    }

    #[test]
    fn test_input_points_in_window() {
        let config = HydrologyConfig::default();
        let mut model = RunoffModel::new(1, &config);
        model.baseflow = 1e-4;
        let elev = Grid::new(1, 3, 1.0);
        let mut area = Grid::new(1, 3, 0.0);
        // q = area * 1e-4 * 3 * 100
        area.set(1, 1, 0.1);
        area.set(1, 2, 10.0);
        area.set(1, 3, 1.0e6);
        let zones = Grid::new(1, 3, 0usize);
        let mut points = Grid::new(1, 3, false);
        find_input_points(&area, &elev, &zones, &mut model, &mut points, 10.0, &config);
        assert!(!points.get(1, 1));
        assert!(points.get(1, 2));
        assert!(!points.get(1, 3));
        assert_eq!(model.zones[0].input_points, 1);
    }
}
