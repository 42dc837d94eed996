//! Hydrology configuration.

use serde::{Deserialize, Serialize};

/// Rainfall-runoff and shallow-water routing parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HydrologyConfig {
    /// Read rainfall from the timeseries file; otherwise use `uniform_rainfall`.
    pub rainfall_data_on: bool,
    /// Rainfall rate (mm/hr) applied everywhere when no timeseries is loaded.
    pub uniform_rainfall: f64,
    /// Minutes covered by one row of the rainfall timeseries.
    pub rain_data_time_step: f64,
    /// Use one rainfall column per hydro-index zone.
    pub spatial_var_rain: bool,
    /// Number of rain zones when `spatial_var_rain` is on.
    pub num_rain_zones: usize,
    /// Multiplier applied to every rainfall rate.
    pub rain_factor: f64,
    /// TOPMODEL `m` (store decay) in metres.
    pub topmodel_m: f64,

    /// Lower bound of baseflow discharge that makes a cell an input point.
    pub min_q_for_depth_calc: f64,
    /// Upper bound of baseflow discharge that makes a cell an input point.
    pub max_q_for_depth_calc: f64,

    /// Minimum flow depth across an edge for discharge to be computed (m).
    pub hflow_threshold: f64,
    /// Depth above which a cell counts as wet for erosion and outflow (m).
    pub water_depth_erosion_threshold: f64,
    /// Water-surface slope imposed across the domain boundary.
    pub slope_on_edge_cell: f64,
    /// Manning's roughness coefficient.
    pub mannings_n: f64,
    /// Upper bound on the Froude number of any edge.
    pub froude_num_limit: f64,
    /// Evaporation rate (m/day); zero disables evaporation.
    pub evaporation_rate: f64,
}

impl Default for HydrologyConfig {
    fn default() -> Self {
        Self {
            rainfall_data_on: true,
            uniform_rainfall: 0.0,
            rain_data_time_step: 60.0,
            spatial_var_rain: false,
            num_rain_zones: 1,
            rain_factor: 1.0,
            topmodel_m: 0.005,

            min_q_for_depth_calc: 0.01,
            max_q_for_depth_calc: 1000.0,

            hflow_threshold: 0.00001,
            water_depth_erosion_threshold: 0.01,
            slope_on_edge_cell: 0.001,
            mannings_n: 0.04,
            froude_num_limit: 0.8,
            evaporation_rate: 0.0,
        }
    }
}

impl HydrologyConfig {
    /// Number of rain zones actually simulated.
    pub fn zone_count(&self) -> usize {
        if self.spatial_var_rain {
            self.num_rain_zones.max(1)
        } else {
            1
        }
    }
}
