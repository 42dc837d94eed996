//! Bed-load transport closures.

use crate::sediment::config::TransportLaw;
use crate::timestep::GRAVITY;

/// Density of water (kg/m^3).
pub const WATER_DENSITY: f64 = 1000.0;
/// Submerged specific gravity of sediment used by Wilcock & Crowe.
const SUBMERGED_SPECIFIC_GRAVITY: f64 = 2.65 - 1.0;
/// Sediment density used by the Einstein function (kg/m^3).
const EINSTEIN_SEDIMENT_DENSITY: f64 = 2650.0;
/// Density in the Einstein fall-parameter term (kg/m^3).
const EINSTEIN_FALL_DENSITY: f64 = 2250.0;

/// Active-layer statistics a closure may need.
#[derive(Debug, Clone, Copy)]
pub struct BedSurface {
    /// Median diameter (m), already floored at the finest class.
    pub d50: f64,
    /// Share of the two finest classes.
    pub sand_fraction: f64,
}

impl TransportLaw {
    /// Volumetric entrainment rate per unit width (m^2/s) of one class.
    ///
    /// `fraction` is the class share of the active layer; only Wilcock & Crowe uses it.
    pub fn entrainment(&self, tau: f64, diameter: f64, fraction: f64, bed: &BedSurface) -> f64 {
        if tau <= 0.0 || diameter <= 0.0 {
            return 0.0;
        }
        match self {
            TransportLaw::Wilcock => {
                let d50 = bed.d50;
                let ratio = diameter / d50;
                let tau_ri = (0.021 + 0.015 * (-20.0 * bed.sand_fraction).exp())
                    * (WATER_DENSITY * GRAVITY * d50)
                    * ratio.powf(0.67 / (1.0 + (1.5 - ratio).exp()));
                let u_star = (tau / WATER_DENSITY).sqrt();
                let phi = tau / tau_ri;
                let w_star = if phi < 1.35 {
                    0.002 * phi.powf(7.5)
                } else {
                    14.0 * (1.0 - 0.894 / phi.sqrt()).powf(4.5)
                };
                fraction * u_star.powi(3) / (SUBMERGED_SPECIFIC_GRAVITY * GRAVITY) * w_star
            }
            TransportLaw::Einstein => {
                let psi_inv = tau / GRAVITY / ((EINSTEIN_SEDIMENT_DENSITY - WATER_DENSITY) * diameter);
                let fall = (WATER_DENSITY
                    / ((EINSTEIN_FALL_DENSITY - WATER_DENSITY) * GRAVITY * diameter.powi(3)))
                .sqrt();
                40.0 * psi_inv.powi(3) / fall
            }
        }
    }

    /// True when the closure depends on the active-layer composition.
    pub fn uses_bed_surface(&self) -> bool {
        matches!(self, TransportLaw::Wilcock)
    }
}
