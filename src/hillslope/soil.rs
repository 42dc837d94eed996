//! Soil production: bedrock lowering and physical weathering of the grain layers.

use crate::engine::SimulationState;
use crate::grid::is_no_data;
use crate::sediment::{GrainRecord, MAX_CLASSES};

use super::config::SoilDevelopmentConfig;

/// Months per year; every coefficient is an annual rate applied monthly.
const MONTHS: f64 = 12.0;
/// Soil thickness used where the surface sits exactly on bedrock (m).
const MIN_SOIL_DEPTH: f64 = 0.001;
/// Share of a weathered class passed one class finer; the rest skips a class.
const ONE_STEP_SHARE: f64 = 0.05;

/// Monthly weathering rate of grains of diameter `d` at depth factor `decay`.
#[inline]
fn weathering_rate(config: &SoilDevelopmentConfig, d: f64, decay: f64) -> f64 {
    -(config.k1 * decay * config.c2 / (d * 0.001).ln()) / MONTHS
}

/// Breaks class `k` of `layer` down by `rate`, passing the product to finer classes.
fn weather_layer(layer: &mut [f64; MAX_CLASSES], k: usize, rate: f64) {
    let amount = layer[k] * rate;
    if amount <= 0.0 {
        return;
    }
    layer[k] -= amount;
    if k == 1 {
        layer[0] += amount;
    } else {
        layer[k - 1] += amount * ONE_STEP_SHARE;
        layer[k - 2] += amount * (1.0 - ONE_STEP_SHARE);
    }
}

/// Weathers every class coarser than the finest, in the active layer and each stratum.
fn weather_record(record: &mut GrainRecord, diameters: &[f64], active: f64, config: &SoilDevelopmentConfig) {
    for (k, &d) in diameters.iter().enumerate().skip(1) {
        if record.active[k] <= 0.0 || d <= 0.0 {
            continue;
        }
        let rate = weathering_rate(config, d, (-config.c1 * active * 0.5).exp());
        weather_layer(&mut record.active, k, rate);

        for (z, layer) in record.strata.iter_mut().enumerate() {
            let decay = (-config.c1 * active * (z as f64 + 1.0)).exp();
            weather_layer(layer, k, weathering_rate(config, d, decay));
        }
    }
}

/// Applies one month of soil development to every data cell.
pub fn soil_development(state: &mut SimulationState, config: &SoilDevelopmentConfig) {
    let classes = state.grains.class_count();
    let diameters = *state.grains.diameters();
    let active = state.grains.active_thickness();

    let cells: Vec<(usize, usize)> = state.elev.cells().collect();
    for (r, c) in cells {
        let h = state.elev.get(r, c);
        if is_no_data(h) {
            continue;
        }
        let id = state.grains.ensure_record(r, c, h, state.bedrock.get(r, c));

        if config.bedrock_lowering_on {
            let floor = state.bedrock.get(r, c);
            if !is_no_data(floor) && h >= floor {
                let depth = (h - floor).max(MIN_SOIL_DEPTH);
                state.bedrock[(r, c)] -= config.p1 * (-config.b1 * depth).exp() / MONTHS;
            }
        }

        if config.physical_weathering_on {
            weather_record(state.grains.get_mut(id), &diameters[..classes], active, config);
        }
    }
}
