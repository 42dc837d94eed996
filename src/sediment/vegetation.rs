//! Grass cover.

use crate::grid::{is_no_data, Grid};

/// Cover density above which the surface under vegetation resists erosion.
pub const ARMOUR_DENSITY: f64 = 0.25;

/// Vegetation state of one cell.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vegetation {
    /// Surface elevation when the cover established (m).
    pub elevation: f64,
    /// Cover fraction in `[0, 1]`.
    pub density: f64,
}

impl Vegetation {
    /// True when cover is dense enough to limit scour to its rooting surface.
    #[inline]
    pub fn armours(&self) -> bool {
        self.density > ARMOUR_DENSITY
    }
}

/// Grows grass on dry cells by one day's worth of cover.
pub fn grow_grass(veg: &mut Grid<Vegetation>, elev: &Grid<f64>, depth: &Grid<f64>, grow_rate: f64, wet_threshold: f64) {
    if grow_rate <= 0.0 {
        return;
    }
    let daily = 1.0 / (grow_rate * 365.0);
    for (r, c) in elev.cells() {
        let h = elev.get(r, c);
        if is_no_data(h) || depth.get(r, c) >= wet_threshold {
            continue;
        }
        let v = &mut veg[(r, c)];
        if v.density <= 0.0 {
            v.elevation = h;
        }
        v.density = (v.density + daily).min(1.0);
    }
}
