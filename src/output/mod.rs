//! Discharge and sediment-yield time series.
//!
//! Ticks rarely line up with the reporting interval, so every row is
//! interpolated: the part of a tick past the interval mark is carried into
//! the next row instead of being counted twice or dropped.

use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::engine::SimulationState;

/// Errors raised while writing the time series.
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Values of one finished tick the recorder needs.
#[derive(Debug, Clone, Default)]
pub struct TickSample {
    /// Model time at the end of the tick (minutes).
    pub cycle: f64,
    /// Model time at the start of the tick (minutes).
    pub previous: f64,
    /// Water leaving the domain (m^3/s).
    pub water_out: f64,
    /// Runoff-model inflow over the whole catchment (m^3/s).
    pub expected_inflow: f64,
    /// Sediment yield since the start of the run (m^3).
    pub sediment_total: f64,
    /// Same, per grain class.
    pub per_class: Vec<f64>,
}

impl TickSample {
    pub fn from_state(state: &SimulationState) -> Self {
        let cell_area = state.dx * state.dx;
        let expected_inflow = state
            .runoff
            .zones
            .iter()
            .map(|z| z.j_mean * cell_area * z.cells as f64)
            .sum();
        Self {
            cycle: state.clock.cycle,
            previous: state.clock.previous,
            water_out: state.budget.water_out,
            expected_inflow,
            sediment_total: state.sediment_out.total,
            per_class: state.sediment_out.per_class.clone(),
        }
    }
}

/// One row of the time series.
#[derive(Debug, Clone, PartialEq)]
pub struct DischargeRow {
    /// Interval count since the start of the run.
    pub hours: u64,
    /// Mean discharge leaving the domain (m^3/s).
    pub qw: f64,
    /// Mean discharge expected from the runoff model (m^3/s).
    pub jw: f64,
    /// Sediment yield over the interval (m^3).
    pub qs: f64,
    pub per_class: Vec<f64>,
}

impl DischargeRow {
    /// `hours Qw Jw 0 Qs Qg_1 .. Qg_K`.
    pub fn format(&self) -> String {
        let mut line = format!(
            "{} {:.6} {:.6} {:.6} {:.10}",
            self.hours, self.qw, self.jw, 0.0, self.qs
        );
        for q in &self.per_class {
            line.push_str(&format!(" {:.10}", q));
        }
        line
    }
}

/// Running volume of a flux with the share of the last tick past the mark carried forward.
#[derive(Debug, Clone, Copy, Default)]
struct VolumeTracker {
    new: f64,
    old: f64,
    last: f64,
}

impl VolumeTracker {
    /// Closes an interval; `over` is the volume that belongs to the next one.
    fn close(&mut self, over: f64, large_step: bool) -> f64 {
        let volume = self.new - self.old - over + self.last;
        if large_step {
            self.last = 0.0;
            self.old = self.new - over;
        } else {
            self.last = over;
            self.old = self.new;
        }
        volume
    }
}

/// Interval total of a cumulative quantity, interpolated linearly across the tick.
#[derive(Debug, Clone, Copy, Default)]
struct YieldTracker {
    old: f64,
    last: f64,
}

impl YieldTracker {
    fn close(&mut self, current: f64, fraction_over: f64, large_step: bool) -> f64 {
        let step = current - self.old;
        let over = step * fraction_over;
        let total = step - over + self.last;
        if large_step {
            self.last = 0.0;
            self.old = current - over;
        } else {
            self.last = over;
            self.old = current;
        }
        total
    }
}

/// Accumulates ticks and emits one row per reporting interval.
#[derive(Debug, Clone)]
pub struct DischargeRecorder {
    path: PathBuf,
    /// Reporting interval (minutes).
    interval: f64,
    /// Next interval mark (minutes).
    next_mark: f64,
    /// Model time of the last tick that crossed a mark.
    last_calc: f64,
    hours: u64,
    water: VolumeTracker,
    expected: VolumeTracker,
    sediment: YieldTracker,
    classes: Vec<YieldTracker>,
}

impl DischargeRecorder {
    pub fn new(path: impl Into<PathBuf>, interval: f64, classes: usize) -> Self {
        Self {
            path: path.into(),
            interval,
            next_mark: interval,
            last_calc: 0.0,
            hours: 0,
            water: VolumeTracker::default(),
            expected: VolumeTracker::default(),
            sediment: YieldTracker::default(),
            classes: vec![YieldTracker::default(); classes],
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Folds one tick in and returns the rows of every interval mark it crossed.
    pub fn observe(&mut self, sample: &TickSample) -> Vec<DischargeRow> {
        let seconds = (sample.cycle - sample.previous) * 60.0;
        self.water.new += sample.water_out * seconds;
        self.expected.new += sample.expected_inflow * seconds;

        let mut rows = Vec::new();
        let span = sample.cycle - self.last_calc;
        while self.next_mark > sample.previous && sample.cycle >= self.next_mark {
            self.hours += 1;
            let mark = self.next_mark;
            let large_step = sample.cycle >= mark + self.interval;
            let fraction_over = if span > 0.0 { (sample.cycle - mark) / span } else { 0.0 };

            let qs = self.sediment.close(sample.sediment_total, fraction_over, large_step);
            let per_class = self
                .classes
                .iter_mut()
                .enumerate()
                .map(|(k, t)| {
                    let current = sample.per_class.get(k).copied().unwrap_or(0.0);
                    t.close(current, fraction_over, large_step)
                })
                .collect();

            let over_seconds = (sample.cycle - mark) * 60.0;
            let qw = self.water.close(sample.water_out * over_seconds, large_step);
            let jw = self.expected.close(sample.expected_inflow * over_seconds, large_step);
            let interval_seconds = self.interval * 60.0;

            rows.push(DischargeRow {
                hours: self.hours,
                qw: qw / interval_seconds,
                jw: jw / interval_seconds,
                qs,
                per_class,
            });
            self.next_mark = mark + self.interval;
        }
        if !rows.is_empty() {
            self.last_calc = sample.cycle;
        }
        rows
    }

    /// Appends rows to the time-series file, creating it and its directory if needed.
    pub fn append(&self, rows: &[DischargeRow]) -> Result<(), OutputError> {
        if rows.is_empty() {
            return Ok(());
        }
        let io_err = |path: &Path| {
            let path = path.display().to_string();
            move |source: std::io::Error| OutputError::Io { path, source }
        };
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_err(parent))?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(io_err(&self.path))?;
        let mut writer = BufWriter::new(file);
        for row in rows {
            writeln!(writer, "{}", row.format()).map_err(io_err(&self.path))?;
        }
        writer.flush().map_err(io_err(&self.path))
    }

    /// `observe` followed by `append`.
    pub fn record(&mut self, sample: &TickSample) -> Result<Vec<DischargeRow>, OutputError> {
        let rows = self.observe(sample);
        self.append(&rows)?;
        Ok(rows)
    }
}
