//! Simulation engine: the state aggregate, the tick pipeline and the run loop.
//!
//! A [`Simulation`] owns the configuration, the forcing and the state. Each
//! [`Simulation::tick`] picks a timestep, runs the stages of
//! [`TickPipeline::standard`] in order, records discharge and sediment yield,
//! and writes raster snapshots when their interval comes due.

pub mod stage;
mod state;

#[cfg(test)]
mod scenarios;

pub use stage::{StageId, TickContext, TickPipeline, TickReport, TickStage};
pub use state::{Clock, Schedule, SedimentYield, SimulationState, WaterBudget};

use std::fs;
use std::path::PathBuf;

use log::{debug, info};
use thiserror::Error;

use crate::config::{ConfigError, ModelConfig};
use crate::io::{
    export_grid_png, load_inputs, read_grain_file, write_grain_file, write_grid, GrainFileError, InputError,
    ModelInputs, PngExportError, PngExportOptions, RainfallSeries, RasterError,
};
use crate::output::{DischargeRecorder, OutputError, TickSample};

/// Errors raised while setting up or advancing a simulation.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    ConfigFile(#[from] ConfigError),
    #[error(transparent)]
    Input(#[from] InputError),
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Raster(#[from] RasterError),
    #[error(transparent)]
    GrainFile(#[from] GrainFileError),
    #[error(transparent)]
    Png(#[from] PngExportError),
    #[error(transparent)]
    Output(#[from] OutputError),
    #[error("Numerical instability: {0}")]
    Stability(String),
    #[error("Missing dependency: stage '{0}' requires '{1}'")]
    MissingDependency(String, String),
    #[error("DEM has no data cell on its edge, so water can never leave the domain")]
    NoOutlet,
}

/// Totals of a finished run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub ticks: u64,
    /// Model time reached (minutes).
    pub time_minutes: f64,
    /// Sediment that left the domain (m^3).
    pub sediment_yield: f64,
    /// Water still on the grid (m^3).
    pub water_volume: f64,
}

/// A configured run.
pub struct Simulation {
    config: ModelConfig,
    rainfall: RainfallSeries,
    state: SimulationState,
    pipeline: TickPipeline,
    recorder: DischargeRecorder,
}

impl Simulation {
    /// Builds a run from already loaded inputs.
    pub fn new(config: ModelConfig, inputs: ModelInputs) -> Result<Self, EngineError> {
        config.validate()?;
        let state = SimulationState::new(&config, &inputs)?;
        let pipeline = TickPipeline::standard();
        pipeline.validate()?;

        let io = &config.io;
        let recorder = DischargeRecorder::new(
            io.output(&io.timeseries_file),
            io.timeseries_save_interval,
            config.sediment.class_count(),
        );
        info!(
            "simulation ready: {} h of model time, {} transport, {} grain class(es)",
            config.time.max_run_duration,
            config.sediment.transport_law.name(),
            config.sediment.class_count()
        );

        Ok(Self {
            config,
            rainfall: inputs.rainfall,
            state,
            pipeline,
            recorder,
        })
    }

    /// Loads every input file named by the configuration and builds the run.
    pub fn from_config(config: ModelConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let inputs = load_inputs(&config)?;
        let mut sim = Self::new(config, inputs)?;

        let io = &sim.config.io;
        if io.read_grain_data {
            if let Some(name) = &io.grain_data_file {
                let path = io.input(name);
                let rows = sim.state.rows();
                let cols = sim.state.cols();
                let count = read_grain_file(&path, &mut sim.state.grains, rows, cols)?;
                info!("read {} grain record(s) from {}", count, path.display());
            }
        }

        let write_path = &sim.config.io.write_path;
        fs::create_dir_all(write_path).map_err(|source| EngineError::Io {
            path: write_path.display().to_string(),
            source,
        })?;
        Ok(sim)
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut SimulationState {
        &mut self.state
    }

    /// Model time reached (minutes).
    pub fn time_minutes(&self) -> f64 {
        self.state.clock.cycle
    }

    pub fn is_finished(&self) -> bool {
        self.state.clock.cycle >= self.state.clock.end
    }

    /// Advances the model by one timestep.
    pub fn tick(&mut self) -> Result<TickReport, EngineError> {
        let state = &mut self.state;
        state.clock.previous = state.clock.cycle;

        let imbalance = state.budget.water_input - state.budget.water_out;
        let flow_dt = state.timestep.begin_tick(state.dx, state.budget.max_depth, imbalance);
        state.budget.flow_dt = flow_dt;
        state.clock.counter += 1;
        state.clock.cycle += state.timestep.time_factor() / 60.0;

        let mut report = TickReport {
            counter: state.clock.counter,
            flow_dt,
            cfl_dt: state.timestep.last_cfl(),
            ..Default::default()
        };
        let ctx = TickContext {
            config: &self.config,
            rainfall: &self.rainfall,
        };
        self.pipeline.run(state, &ctx, &mut report)?;
        report.time_minutes = state.clock.cycle;

        let rows = self.recorder.record(&TickSample::from_state(state))?;
        for row in &rows {
            debug!("{}", row.format());
        }

        if self.state.clock.cycle >= self.state.schedule.save_time {
            let tag = format!("{}", self.state.clock.cycle.round() as i64);
            self.save_rasters(&tag)?;
            self.state.schedule.save_time += self.config.io.raster_output_interval;
            report.saved_rasters = true;
        }
        Ok(report)
    }

    /// Ticks until the configured duration is reached, calling `callback` after every tick.
    pub fn run<F>(&mut self, mut callback: F) -> Result<RunSummary, EngineError>
    where
        F: FnMut(&TickReport),
    {
        while !self.is_finished() {
            let report = self.tick()?;
            callback(&report);
        }
        let summary = RunSummary {
            ticks: self.state.clock.counter,
            time_minutes: self.state.clock.cycle,
            sediment_yield: self.state.sediment_out.total,
            water_volume: self.state.water_volume(),
        };
        info!(
            "run finished after {} ticks: {:.1} min, {:.4} m3 of sediment out",
            summary.ticks, summary.time_minutes, summary.sediment_yield
        );
        Ok(summary)
    }

    /// Writes every enabled raster with `tag` appended to its prefix; returns the files written.
    pub fn save_rasters(&self, tag: &str) -> Result<Vec<PathBuf>, EngineError> {
        let io = &self.config.io;
        let out = &io.rasters;
        let state = &self.state;
        let header = &state.header;
        let mut written = Vec::new();

        if let Some(prefix) = &out.elevation {
            let path = io.output(&format!("{}{}.asc", prefix, tag));
            write_grid(&path, header, &state.elev)?;
            written.push(path);
        }
        if let Some(prefix) = &out.water_depth {
            let path = io.output(&format!("{}{}.asc", prefix, tag));
            write_grid(&path, header, &state.water_depth)?;
            written.push(path);
        }
        if let Some(prefix) = &out.elev_diff {
            let path = io.output(&format!("{}{}.asc", prefix, tag));
            write_grid(&path, header, &state.elevation_change())?;
            written.push(path);
        }
        if let Some(prefix) = &out.flow_velocity {
            let path = io.output(&format!("{}{}.asc", prefix, tag));
            write_grid(&path, header, &state.vel)?;
            written.push(path);
        }
        if let Some(prefix) = &out.grain_size {
            let path = io.output(&format!("{}{}.dat", prefix, tag));
            write_grain_file(&path, &state.grains)?;
            written.push(path);
        }
        if out.png_previews {
            for (name, grid) in [("elev", &state.elev), ("waterdepth", &state.water_depth)] {
                let path = io.output(&format!("{}{}.png", name, tag));
                export_grid_png(grid, &path, &PngExportOptions::auto_range(grid))?;
                written.push(path);
            }
        }
        debug!("saved {} raster(s) at {}", written.len(), tag);
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Grid, NO_DATA};
    use crate::io::RasterHeader;
    use tempfile::tempdir;

    fn tilted(rows: usize, cols: usize) -> Grid<f64> {
        let mut g = Grid::new(rows, cols, NO_DATA);
        for (r, c) in g.cells().collect::<Vec<_>>() {
            g.set(r, c, 10.0 + (rows - r) as f64 * 0.2);
        }
        g
    }

    fn config_in(dir: &std::path::Path) -> ModelConfig {
        let mut config = ModelConfig::default();
        config.io.write_path = dir.to_path_buf();
        config.time.max_run_duration = 0.5;
        config
    }

    fn simulation(config: ModelConfig, rain: f64) -> Simulation {
        let elev = tilted(8, 6);
        let header = RasterHeader::new(8, 6, 5.0);
        let inputs = ModelInputs::from_dem(header, elev, RainfallSeries::uniform(1, rain));
        Simulation::new(config, inputs).unwrap()
    }

    #[test]
    fn test_tick_advances_clock() {
        let dir = tempdir().unwrap();
        let mut sim = simulation(config_in(dir.path()), 0.0);
        let report = sim.tick().unwrap();
        assert_eq!(report.counter, 1);
        assert!(sim.time_minutes() > 0.0);
        assert!(report.flow_dt > 0.0);
        assert!(report.flow_dt <= report.cfl_dt + 1e-12);
    }

    #[test]
    fn test_run_reaches_end_and_writes_outputs() {
        let dir = tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.io.raster_output_interval = 10.0;
        config.io.timeseries_save_interval = 10.0;
        let mut sim = simulation(config, 10.0);

        let mut ticks = 0u64;
        let summary = sim.run(|_| ticks += 1).unwrap();
        assert!(sim.is_finished());
        assert_eq!(summary.ticks, ticks);
        assert!(summary.time_minutes >= 30.0);
        let series = fs::read_to_string(dir.path().join("catchment.dat")).unwrap();
        assert!(series.lines().count() >= 3);
        let snapshots = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with("elev"))
            .count();
        assert!(snapshots >= 1);
    }

    #[test]
    fn test_save_rasters_names_files_by_tag() {
        let dir = tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.io.rasters.png_previews = true;
        config.io.rasters.grain_size = Some("grain".to_string());
        let sim = simulation(config, 0.0);
        let written = sim.save_rasters("42").unwrap();
        assert!(written.iter().any(|p| p.ends_with("elev42.asc")));
        assert!(written.iter().any(|p| p.ends_with("waterdepth42.png")));
        assert!(written.iter().any(|p| p.ends_with("grain42.dat")));
        for p in &written {
            assert!(p.exists(), "{} missing", p.display());
        }
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = ModelConfig::default();
        config.time.courant_number = 2.0;
        let header = RasterHeader::new(8, 6, 5.0);
        let inputs = ModelInputs::from_dem(header, tilted(8, 6), RainfallSeries::uniform(1, 0.0));
        assert!(matches!(Simulation::new(config, inputs), Err(EngineError::ConfigFile(_))));
    }
}
