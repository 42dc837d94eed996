//! Adaptive timestep control.
//!
//! One scalar, `time_factor`, advances the model clock and scales erosion.
//! The hydraulic update never uses more than the CFL limit; erosion may shrink
//! `time_factor` further when a pass would move too much material.

use log::debug;
use serde::{Deserialize, Serialize};

/// Gravitational acceleration (m/s^2).
pub const GRAVITY: f64 = 9.81;

/// Depth used in the CFL bound when the domain is shallower than this.
pub const MIN_CFL_DEPTH: f64 = 0.1;

/// Run length and timestep bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestepConfig {
    /// Model time to simulate (hours).
    pub max_run_duration: f64,
    /// Initial timestep (s).
    pub min_time_step: f64,
    /// Largest timestep (s).
    pub max_time_step: f64,
    pub courant_number: f64,
    /// Water in/out imbalance (m^3/s) above which the CFL step is enforced.
    pub in_out_difference: f64,
}

impl Default for TimestepConfig {
    fn default() -> Self {
        Self {
            max_run_duration: 1000.0,
            min_time_step: 1.0,
            max_time_step: 3600.0,
            courant_number: 0.7,
            in_out_difference: 0.0,
        }
    }
}

/// CFL bound for an explicit shallow-water update on cells of width `dx`.
pub fn cfl_limit(courant: f64, dx: f64, max_depth: f64) -> f64 {
    courant * dx / (GRAVITY * max_depth.max(MIN_CFL_DEPTH)).sqrt()
}

/// Carries `time_factor` between ticks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestepController {
    time_factor: f64,
    max_time_step: f64,
    courant: f64,
    in_out_difference: f64,
    last_cfl: f64,
}

impl TimestepController {
    /// Builds a controller whose ceiling never exceeds one rainfall row.
    pub fn new(config: &TimestepConfig, rain_data_time_step: f64) -> Self {
        let rain_step = rain_data_time_step.max(1.0);
        let max_time_step = config.max_time_step.min(rain_step * 60.0);
        if max_time_step < config.max_time_step {
            debug!(
                "max_time_step lowered from {} s to {} s to match the rainfall step",
                config.max_time_step, max_time_step
            );
        }
        Self {
            time_factor: config.min_time_step.min(max_time_step),
            max_time_step,
            courant: config.courant_number,
            in_out_difference: config.in_out_difference,
            last_cfl: f64::INFINITY,
        }
    }

    #[inline]
    pub fn time_factor(&self) -> f64 {
        self.time_factor
    }

    #[inline]
    pub fn max_time_step(&self) -> f64 {
        self.max_time_step
    }

    /// CFL bound computed by the last [`begin_tick`](Self::begin_tick).
    #[inline]
    pub fn last_cfl(&self) -> f64 {
        self.last_cfl
    }

    pub fn set_time_factor(&mut self, value: f64) {
        self.time_factor = value;
    }

    /// Starts a tick and returns the hydraulic timestep.
    ///
    /// `time_factor` is raised to at least the CFL bound so that erosion can
    /// grow it again, unless water in and out disagree by more than the
    /// tolerance, in which case it is pinned to the bound.
    pub fn begin_tick(&mut self, dx: f64, max_depth: f64, water_imbalance: f64) -> f64 {
        let cfl = cfl_limit(self.courant, dx, max_depth);
        self.last_cfl = cfl;

        if self.time_factor < cfl {
            self.time_factor = cfl;
        }
        if water_imbalance.abs() > self.in_out_difference && self.time_factor > cfl {
            self.time_factor = cfl;
        }
        self.time_factor.min(cfl)
    }

    /// Grows `time_factor` before an erosion pass.
    pub fn expand_for_erosion(&mut self) {
        self.time_factor = (self.time_factor * 1.5).min(self.max_time_step);
    }

    /// Shrinks `time_factor` after a pass predicted `predicted` metres of change against `limit`.
    pub fn shrink_for_erosion(&mut self, limit: f64, predicted: f64) {
        if predicted > 0.0 {
            self.time_factor *= (limit / predicted) * 0.5;
        }
    }

    /// Pins `time_factor` to the runoff ceiling during a storm.
    pub fn cap_for_runoff(&mut self) {
        self.time_factor = self.max_time_step;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cfl_uses_minimum_depth() {
        let shallow = cfl_limit(0.7, 5.0, 0.0);
        let floor = cfl_limit(0.7, 5.0, MIN_CFL_DEPTH);
        assert!((shallow - floor).abs() < 1e-12);
        assert!(cfl_limit(0.7, 5.0, 2.0) < floor);
    }

    #[test]
    fn test_flow_step_never_exceeds_cfl() {
        let mut ctl = TimestepController::new(&TimestepConfig::default(), 60.0);
        ctl.set_time_factor(500.0);
        let dt = ctl.begin_tick(10.0, 1.0, 0.0);
        assert!(dt <= cfl_limit(0.7, 10.0, 1.0) + 1e-12);
        assert!(ctl.time_factor() >= dt);
    }

    #[test]
    fn test_imbalance_pins_time_factor_to_cfl() {
        let mut ctl = TimestepController::new(&TimestepConfig::default(), 60.0);
        ctl.set_time_factor(500.0);
        ctl.begin_tick(10.0, 1.0, 3.0);
        assert!((ctl.time_factor() - ctl.last_cfl()).abs() < 1e-12);
    }

    #[test]
    fn test_max_step_bounded_by_rain_step() {
        let ctl = TimestepController::new(&TimestepConfig::default(), 10.0);
        assert_eq!(ctl.max_time_step(), 600.0);
    }

    #[test]
    fn test_erosion_expand_and_shrink() {
        let mut ctl = TimestepController::new(&TimestepConfig::default(), 60.0);
        ctl.set_time_factor(100.0);
        ctl.expand_for_erosion();
        assert_eq!(ctl.time_factor(), 150.0);
        ctl.shrink_for_erosion(0.05, 0.1);
        assert!((ctl.time_factor() - 37.5).abs() < 1e-9);
        ctl.set_time_factor(3000.0);
        ctl.expand_for_erosion();
        assert_eq!(ctl.time_factor(), 3600.0);
    }
}
