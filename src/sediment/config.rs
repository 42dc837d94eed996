//! Sediment transport configuration.

use serde::{Deserialize, Serialize};

/// Upper bound on the number of grain-size classes.
pub const MAX_CLASSES: usize = 10;

/// Bed-load closure used to turn shear stress into entrainment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportLaw {
    /// Wilcock & Crowe (2003) mixed-size surface-based transport.
    Wilcock,
    /// Einstein (1950) bed-load function.
    Einstein,
}

impl Default for TransportLaw {
    fn default() -> Self {
        Self::Wilcock
    }
}

impl TransportLaw {
    pub fn name(&self) -> &'static str {
        match self {
            TransportLaw::Wilcock => "wilcock",
            TransportLaw::Einstein => "einstein",
        }
    }
}

/// One grain-size class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GrainClass {
    /// Diameter (m).
    pub diameter: f64,
    /// Share of freshly created active layers.
    pub proportion: f64,
    /// Settling velocity (m/s); only used for the suspended class.
    pub fall_velocity: f64,
    /// Carried in suspension when suspended sediment is on.
    pub suspended: bool,
}

/// Vegetation cover parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VegetationConfig {
    pub enabled: bool,
    /// Years for grass to reach full cover.
    pub grass_grow_rate: f64,
    /// Shear stress above which vegetation is stripped (Pa).
    pub critical_shear: f64,
    /// Fraction of lateral erosion still allowed under full cover.
    pub lateral_restriction: f64,
}

impl Default for VegetationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            grass_grow_rate: 1.0,
            critical_shear: 100.0,
            lateral_restriction: 0.1,
        }
    }
}

/// Lateral (bank) erosion parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LateralConfig {
    pub enabled: bool,
    /// Bank erosion rate constant.
    pub lateral_constant: f64,
    /// Smoothing passes applied to the bank-curvature field.
    pub edge_filter_passes: u32,
    /// Extra smoothing passes that shift curvature downstream.
    pub cells_shift_lat: u32,
    /// Convergence bound of the cross-channel averaging.
    pub max_diff_cross_chann: f64,
    /// Share of a cell's bed-load outflow taken from wet, higher neighbours.
    pub bed_proportion: f64,
}

impl Default for LateralConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            lateral_constant: 0.0000002,
            edge_filter_passes: 100,
            cells_shift_lat: 5,
            max_diff_cross_chann: 0.0001,
            bed_proportion: 0.01,
        }
    }
}

/// Parameters of the erosion / sediment-transport engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SedimentConfig {
    pub transport_law: TransportLaw,
    /// Grain-size classes, finest first.
    pub classes: Vec<GrainClass>,
    /// Thickness of the active layer (m).
    pub active_layer_thickness: f64,
    /// Cap on flow velocity used for shear stress (m/s).
    pub max_tau_velocity: f64,
    /// Largest elevation change allowed in one erosion pass (m).
    pub erosion_limit: f64,

    /// Move the suspended class as suspended load.
    pub suspended_sediment_on: bool,
    /// Largest suspended concentration (volume fraction).
    pub max_suspended_concentration: f64,

    /// Erode bedrock by stream power once the bed is stripped.
    pub bedrock_layer_on: bool,
    /// Shear stress needed to incise bedrock (Pa).
    pub bedrock_erosion_threshold: f64,
    /// Stream-power exponent.
    pub stream_power_pb: f64,
    /// Stream-power coefficient.
    pub stream_power_ke: f64,

    pub lateral: LateralConfig,
    pub vegetation: VegetationConfig,
}

impl Default for SedimentConfig {
    fn default() -> Self {
        let diameters = [0.0005, 0.001, 0.002, 0.004, 0.008, 0.016, 0.032, 0.064, 0.128];
        let proportions = [0.144, 0.022, 0.019, 0.029, 0.068, 0.146, 0.22, 0.231, 0.121];
        let fall = [0.066, 0.109, 0.164, 0.237, 0.338, 0.479, 0.678, 0.959, 1.357];
        let classes = (0..diameters.len())
            .map(|k| GrainClass {
                diameter: diameters[k],
                proportion: proportions[k],
                fall_velocity: fall[k],
                suspended: k == 0,
            })
            .collect();

        Self {
            transport_law: TransportLaw::Wilcock,
            classes,
            active_layer_thickness: 0.2,
            max_tau_velocity: 5.0,
            erosion_limit: 0.05,

            suspended_sediment_on: false,
            max_suspended_concentration: 0.05,

            bedrock_layer_on: false,
            bedrock_erosion_threshold: 25.0,
            stream_power_pb: 1.5,
            stream_power_ke: 0.001,

            lateral: LateralConfig::default(),
            vegetation: VegetationConfig::default(),
        }
    }
}

impl SedimentConfig {
    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    /// Index of the class moved as suspended load, if suspension is on.
    pub fn suspended_class(&self) -> Option<usize> {
        if !self.suspended_sediment_on {
            return None;
        }
        self.classes.iter().position(|c| c.suspended)
    }

    /// Default proportions padded to [`MAX_CLASSES`].
    pub fn proportions(&self) -> [f64; MAX_CLASSES] {
        let mut p = [0.0; MAX_CLASSES];
        for (k, c) in self.classes.iter().enumerate().take(MAX_CLASSES) {
            p[k] = c.proportion;
        }
        p
    }

    /// Diameters padded to [`MAX_CLASSES`].
    pub fn diameters(&self) -> [f64; MAX_CLASSES] {
        let mut d = [0.0; MAX_CLASSES];
        for (k, c) in self.classes.iter().enumerate().take(MAX_CLASSES) {
            d[k] = c.diameter;
        }
        d
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_classes_sum_to_one() {
        let cfg = SedimentConfig::default();
        let total: f64 = cfg.classes.iter().map(|c| c.proportion).sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert_eq!(cfg.class_count(), 9);
    }

    #[test]
    fn test_suspended_class_requires_flag() {
        let mut cfg = SedimentConfig::default();
        assert_eq!(cfg.suspended_class(), None);
        cfg.suspended_sediment_on = true;
        assert_eq!(cfg.suspended_class(), Some(0));
    }

    #[test]
    fn test_transport_law_serializes_lowercase() {
        let json = serde_json::to_string(&TransportLaw::Einstein).unwrap();
        assert_eq!(json, "\"einstein\"");
    }
}
