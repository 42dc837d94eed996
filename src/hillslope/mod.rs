//! Hillslope relaxation: creep, soil erosion, slope failure and soil production.
//!
//! Each process runs on its own schedule, driven either by the iteration
//! counter or by model time. [`relax`] checks every trigger once per tick.

mod config;
pub mod creep;
pub mod landslide;
pub mod soil;

pub use config::{HillslopeConfig, SoilDevelopmentConfig};
pub use creep::diffuse;
pub use landslide::{critical_drop, global_landslide, local_landslide, MAX_GLOBAL_SWEEPS};
pub use soil::soil_development;

use log::debug;

use crate::config::ModelConfig;
use crate::engine::SimulationState;
use crate::sediment::grow_grass;

/// Model minutes between creep events.
pub const CREEP_INTERVAL: f64 = 14_400.0;
/// Model minutes in a day.
pub const DAY: f64 = 1440.0;
/// Model minutes in a month.
pub const MONTH: f64 = DAY * 365.0 / 12.0;
/// Iterations between local landslide passes.
pub const LANDSLIDE_EVERY: u64 = 10;

const CREEP_TIME: f64 = 0.028;
const SOIL_EROSION_TIME: f64 = 0.0028;

/// What the hillslope processes did during one tick.
#[derive(Debug, Clone, Default)]
pub struct HillslopeReport {
    /// Volume moved by creep (m^3).
    pub creep: f64,
    /// Volume moved by area-dependent soil erosion (m^3).
    pub soil_erosion: f64,
    /// Height moved by local landslides (m).
    pub local_slides: f64,
    /// Height moved by the daily global sweep (m).
    pub global_slides: f64,
    pub soil_developed: bool,
    pub grass_grown: bool,
}

impl HillslopeReport {
    /// True when any process ran.
    pub fn any(&self) -> bool {
        self.creep > 0.0
            || self.soil_erosion > 0.0
            || self.local_slides > 0.0
            || self.global_slides > 0.0
            || self.soil_developed
            || self.grass_grown
    }
}

/// Runs every hillslope process whose trigger has come due.
pub fn relax(state: &mut SimulationState, config: &ModelConfig) -> HillslopeReport {
    let hs = &config.hillslope;
    let mut report = HillslopeReport::default();
    let cycle = state.clock.cycle;

    if cycle > state.schedule.creep_time {
        state.schedule.creep_time += CREEP_INTERVAL;
        report.creep = diffuse(state, hs.creep_rate, CREEP_TIME, false);
    }

    if hs.soil_erosion_rate > 0.0 && cycle > state.schedule.soil_erosion_time {
        state.schedule.soil_erosion_time += DAY;
        state.refresh_drainage(config);
        report.soil_erosion = diffuse(state, hs.soil_erosion_rate, SOIL_EROSION_TIME, true);
    }

    if hs.landslide_on && state.clock.counter % LANDSLIDE_EVERY == 0 {
        report.local_slides = local_landslide(state, hs.slope_failure_thresh);
    }

    if hs.soil.enabled && cycle > state.schedule.soil_development_time {
        state.schedule.soil_development_time += MONTH;
        soil_development(state, &hs.soil);
        report.soil_developed = true;
    }

    if report.any() {
        debug!(
            "hillslope: creep {:.3e} m3, soil erosion {:.3e} m3, local slides {:.3e} m",
            report.creep, report.soil_erosion, report.local_slides
        );
    }
    report
}

/// Once-a-day hillslope work: the global landslide sweep and grass growth.
pub fn daily(state: &mut SimulationState, config: &ModelConfig, report: &mut HillslopeReport) {
    let hs = &config.hillslope;
    if hs.global_landslide_on {
        let (moved, _) = global_landslide(state, hs.slope_failure_thresh, config.sediment.erosion_limit);
        report.global_slides = moved;
    }
    let veg = &config.sediment.vegetation;
    if veg.enabled {
        grow_grass(
            &mut state.veg,
            &state.elev,
            &state.water_depth,
            veg.grass_grow_rate,
            config.hydrology.water_depth_erosion_threshold,
        );
        report.grass_grown = true;
    }
}
