//! Grid-based hydro-geomorphic catchment simulator.
//!
//! This crate routes time-varying rainfall across a digital elevation model,
//! moves sediment in several grain-size classes, and relaxes hillslopes by
//! creep and slope failure.

pub mod grid;
pub mod config;
pub mod io;
pub mod drainage;
pub mod timestep;
pub mod hydrology;
pub mod sediment;
pub mod hillslope;
pub mod output;
pub mod engine;
pub mod synthetic;

pub use grid::{Grid, Neighbour, NO_DATA};
pub use config::{ConfigError, ModelConfig};
pub use io::{load_inputs, load_params, ModelInputs, RainfallSeries, RasterHeader};
pub use engine::{EngineError, RunSummary, Simulation, SimulationState, TickReport};
pub use output::{DischargeRecorder, DischargeRow};
pub use sediment::TransportLaw;
pub use synthetic::SyntheticValley;
