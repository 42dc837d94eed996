//! Per-cell grain-size records.
//!
//! Records live in an append-only arena; a padded index grid maps cells to
//! record ids. A record is created the first time a cell takes part in
//! sediment transport and is never freed.

use crate::grid::Grid;
use crate::sediment::config::{SedimentConfig, MAX_CLASSES};

/// Number of subsurface strata kept under the active layer.
pub const STRATA: usize = 10;

/// Below this active-layer total the sand fraction is reported as zero.
const SAND_TOTAL_FLOOR: f64 = 0.0001;
/// Below this active-layer total the median diameter is reported as zero.
const D50_TOTAL_FLOOR: f64 = 0.0000001;

/// Active layer plus subsurface strata of one cell, in metres of material per class.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrainRecord {
    pub active: [f64; MAX_CLASSES],
    /// Stratum 0 sits directly beneath the active layer.
    pub strata: [[f64; MAX_CLASSES]; STRATA],
}

impl GrainRecord {
    pub fn empty() -> Self {
        Self {
            active: [0.0; MAX_CLASSES],
            strata: [[0.0; MAX_CLASSES]; STRATA],
        }
    }

    /// Active-layer thickness over the first `classes` classes.
    #[inline]
    pub fn active_total(&self, classes: usize) -> f64 {
        self.active[..classes].iter().sum()
    }
}

/// Arena of grain records indexed by cell.
#[derive(Debug, Clone)]
pub struct GrainStore {
    classes: usize,
    active_thickness: f64,
    proportions: [f64; MAX_CLASSES],
    diameters: [f64; MAX_CLASSES],
    records: Vec<GrainRecord>,
    index: Grid<Option<u32>>,
}

impl GrainStore {
    pub fn new(rows: usize, cols: usize, config: &SedimentConfig) -> Self {
        Self {
            classes: config.class_count().min(MAX_CLASSES),
            active_thickness: config.active_layer_thickness,
            proportions: config.proportions(),
            diameters: config.diameters(),
            records: Vec::new(),
            index: Grid::new(rows, cols, None),
        }
    }

    #[inline]
    pub fn class_count(&self) -> usize {
        self.classes
    }

    #[inline]
    pub fn active_thickness(&self) -> f64 {
        self.active_thickness
    }

    #[inline]
    pub fn proportions(&self) -> &[f64; MAX_CLASSES] {
        &self.proportions
    }

    #[inline]
    pub fn diameters(&self) -> &[f64; MAX_CLASSES] {
        &self.diameters
    }

    /// Number of records created so far.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[inline]
    pub fn id(&self, row: usize, col: usize) -> Option<u32> {
        self.index.get(row, col)
    }

    #[inline]
    pub fn has_record(&self, row: usize, col: usize) -> bool {
        self.index.get(row, col).is_some()
    }

    #[inline]
    pub fn get(&self, id: u32) -> &GrainRecord {
        &self.records[id as usize]
    }

    #[inline]
    pub fn get_mut(&mut self, id: u32) -> &mut GrainRecord {
        &mut self.records[id as usize]
    }

    pub fn at(&self, row: usize, col: usize) -> Option<&GrainRecord> {
        self.id(row, col).map(|id| self.get(id))
    }

    /// Iterates `(row, col, record)` over every cell holding a record.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, &GrainRecord)> + '_ {
        self.index
            .cells()
            .filter_map(move |(r, c)| self.at(r, c).map(|rec| (r, c, rec)))
    }

    /// Returns the record of `(row, col)`, creating it with default proportions if needed.
    ///
    /// Strata that would lie below the bedrock surface start empty.
    pub fn ensure_record(&mut self, row: usize, col: usize, elev: f64, bedrock: f64) -> u32 {
        if let Some(id) = self.index.get(row, col) {
            return id;
        }
        let active = self.active_thickness;
        let mut rec = GrainRecord::empty();
        for k in 0..self.classes {
            rec.active[k] = active * self.proportions[k];
        }
        for z in 0..STRATA {
            let below_bedrock = elev - active * (z as f64 + 1.0) < bedrock - active;
            for k in 0..self.classes {
                rec.strata[z][k] = if below_bedrock {
                    0.0
                } else {
                    active * self.proportions[k]
                };
            }
        }
        let id = self.push(row, col, rec);
        self.sort_active(id);
        id
    }

    /// Stores `record` for `(row, col)`, replacing any existing record.
    pub fn insert(&mut self, row: usize, col: usize, record: GrainRecord) -> u32 {
        match self.index.get(row, col) {
            Some(id) => {
                self.records[id as usize] = record;
                id
            }
            None => self.push(row, col, record),
        }
    }

    fn push(&mut self, row: usize, col: usize, record: GrainRecord) -> u32 {
        let id = self.records.len() as u32;
        self.records.push(record);
        self.index.set(row, col, Some(id));
        id
    }

    /// Active-layer total of a record.
    #[inline]
    pub fn active_total(&self, id: u32) -> f64 {
        self.get(id).active_total(self.classes)
    }

    /// Adds `amount` of material with the default proportions to the active layer.
    pub fn add_default(&mut self, id: u32, amount: f64) {
        let (classes, props) = (self.classes, self.proportions);
        let rec = self.get_mut(id);
        for k in 0..classes {
            rec.active[k] += amount * props[k];
        }
    }

    /// Keeps the active layer between a quarter and one and a half of its nominal thickness.
    ///
    /// A thick layer pushes the strata stack down and buries part of itself; a thin
    /// one absorbs the top stratum and the stack is refilled from below.
    pub fn sort_active(&mut self, id: u32) {
        let classes = self.classes;
        let active = self.active_thickness;
        let props = self.proportions;
        let rec = &mut self.records[id as usize];

        let total = rec.active_total(classes);
        if total > active * 1.5 {
            for z in (1..STRATA).rev() {
                rec.strata[z] = rec.strata[z - 1];
            }
            let coeff = active / total;
            for k in 0..classes {
                let buried = coeff * rec.active[k];
                rec.strata[0][k] = buried;
                rec.active[k] -= buried;
            }
        } else if total < active / 4.0 {
            for k in 0..classes {
                rec.active[k] += rec.strata[0][k];
            }
            for z in 0..STRATA - 1 {
                rec.strata[z] = rec.strata[z + 1];
            }
            for k in 0..classes {
                rec.strata[STRATA - 1][k] = active * props[k];
            }
        }
    }

    /// Moves `amount` metres of material from `from` to `to`, composition following the donor.
    ///
    /// `to_surface` is `(elevation, bedrock)` of the receiver, used if its record must be created.
    pub fn slide(&mut self, from: (usize, usize), to: (usize, usize), amount: f64, to_surface: (f64, f64)) {
        if amount <= 0.0 {
            return;
        }
        let classes = self.classes;
        let props = self.proportions;
        let donor = self.id(from.0, from.1);
        let receiver = self.id(to.0, to.1);

        match (donor, receiver) {
            (Some(a), Some(b)) => {
                let total: f64 = self.get(a).active[..classes].iter().filter(|v| **v > 0.0).sum();
                let mut amount = amount;
                if amount > total {
                    let excess = amount - total;
                    let rec = self.get_mut(b);
                    for k in 0..classes {
                        rec.active[k] += excess * props[k];
                    }
                    amount = total;
                }
                self.transfer(a, b, amount, total);
                self.sort_active(a);
                self.sort_active(b);
            }
            (None, Some(b)) => {
                self.add_default(b, amount);
                self.sort_active(b);
            }
            (Some(a), None) => {
                let b = self.ensure_record(to.0, to.1, to_surface.0, to_surface.1);
                let mut amount = amount;
                if amount > self.active_thickness {
                    self.add_default(b, amount - self.active_thickness);
                    amount = self.active_thickness;
                }
                let total = self.active_total(a);
                self.transfer(a, b, amount, total);
                self.sort_active(a);
                self.sort_active(b);
            }
            (None, None) => {}
        }
    }

    /// Moves `amount` from record `a` to `b` in proportion to `a`'s active composition.
    fn transfer(&mut self, a: u32, b: u32, amount: f64, total: f64) {
        if total <= 0.0 || amount <= 0.0 {
            return;
        }
        let classes = self.classes;
        let mut moved = [0.0; MAX_CLASSES];
        {
            let src = self.get_mut(a);
            for k in 0..classes {
                if src.active[k] > 0.0 {
                    moved[k] = amount * (src.active[k] / total);
                    src.active[k] = (src.active[k] - moved[k]).max(0.0);
                }
            }
        }
        let dst = self.get_mut(b);
        for k in 0..classes {
            dst.active[k] += moved[k];
        }
    }

    /// Share of the two finest classes in the active layer.
    pub fn sand_fraction(&self, id: u32) -> f64 {
        let rec = self.get(id);
        let total = rec.active_total(self.classes);
        if total < SAND_TOTAL_FLOOR {
            return 0.0;
        }
        let sand: f64 = rec.active[..self.classes.min(2)].iter().sum();
        sand / total
    }

    /// Median diameter of the active layer, interpolated on log diameter.
    pub fn d50(&self, id: u32) -> f64 {
        median_diameter(&self.get(id).active[..self.classes], &self.diameters[..self.classes])
    }
}

/// Log-interpolated median diameter of a class distribution.
pub fn median_diameter(amounts: &[f64], diameters: &[f64]) -> f64 {
    let total: f64 = amounts.iter().sum();
    if total < D50_TOTAL_FLOOR || amounts.is_empty() {
        return 0.0;
    }
    let half = total * 0.5;

    let mut cum = 0.0;
    let mut prev_cum = 0.0;
    let mut i = amounts.len() - 1;
    for (k, a) in amounts.iter().enumerate() {
        prev_cum = cum;
        cum += a;
        if cum >= half {
            i = k;
            break;
        }
    }

    let max = diameters[i].ln();
    let min = if i == 0 { max } else { diameters[i - 1].ln() };
    let span = cum - prev_cum;
    let ratio = if span > 0.0 {
        ((cum - half) / span).clamp(0.0, 1.0)
    } else {
        0.0
    };
    (max - (max - min) * ratio).exp()
}
