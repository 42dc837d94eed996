//! Hillslope process configuration.

use serde::{Deserialize, Serialize};

/// Soil production and weathering coefficients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoilDevelopmentConfig {
    pub enabled: bool,
    pub bedrock_lowering_on: bool,
    pub physical_weathering_on: bool,
    /// Maximum bedrock lowering rate (m/yr).
    pub p1: f64,
    /// Depth decay of bedrock lowering (1/m).
    pub b1: f64,
    /// Physical weathering rate constant.
    pub k1: f64,
    /// Depth decay of physical weathering (1/m).
    pub c1: f64,
    /// Grain-size dependence of physical weathering.
    pub c2: f64,
}

impl Default for SoilDevelopmentConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bedrock_lowering_on: true,
            physical_weathering_on: true,
            p1: 0.000268,
            b1: 2.0,
            k1: 0.0001,
            c1: 2.0,
            c2: 1.0,
        }
    }
}

/// Creep, soil erosion and slope failure parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HillslopeConfig {
    /// Diffusive creep coefficient.
    pub creep_rate: f64,
    /// Area-dependent soil erosion coefficient; zero disables it.
    pub soil_erosion_rate: f64,
    /// Slope failure angle (degrees).
    pub slope_failure_thresh: f64,
    /// Local landsliding on wetted cells every few iterations.
    pub landslide_on: bool,
    /// Daily global landsliding sweep over the whole domain.
    pub global_landslide_on: bool,

    pub soil: SoilDevelopmentConfig,
}

impl Default for HillslopeConfig {
    fn default() -> Self {
        Self {
            creep_rate: 0.0025,
            soil_erosion_rate: 0.0025,
            slope_failure_thresh: 45.0,
            landslide_on: true,
            global_landslide_on: false,

            soil: SoilDevelopmentConfig::default(),
        }
    }
}
