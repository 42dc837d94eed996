//! File formats read and written by the simulator.

pub mod ascii;
pub mod config;
pub mod grains;
pub mod params;
pub mod png;
pub mod rainfall;

pub use ascii::{read_ascii, write_ascii, write_grid, AsciiRaster, RasterError, RasterHeader};
pub use config::{IoConfig, RasterOutputs};
pub use grains::{read_grain_file, write_grain_file, GrainFileError};
pub use params::{load_params, parse_params, ParamError};
pub use png::{export_grid_png, PngExportError, PngExportOptions};
pub use rainfall::{RainfallError, RainfallSeries};

use log::info;
use thiserror::Error;

use crate::config::ModelConfig;
use crate::grid::Grid;

/// Errors raised while assembling the inputs of a run.
#[derive(Error, Debug)]
pub enum InputError {
    #[error(transparent)]
    Raster(#[from] RasterError),
    #[error(transparent)]
    Rainfall(#[from] RainfallError),
    #[error(transparent)]
    GrainFile(#[from] GrainFileError),
    #[error(transparent)]
    Params(#[from] ParamError),
}

/// Rasters and forcing a run starts from.
#[derive(Debug, Clone)]
pub struct ModelInputs {
    pub header: RasterHeader,
    pub elevation: Grid<f64>,
    pub bedrock: Option<Grid<f64>>,
    /// Rain-zone ids as read (1-based; no-data outside the catchment).
    pub rain_zones: Option<Grid<f64>>,
    pub rainfall: RainfallSeries,
}

impl ModelInputs {
    /// Inputs for a synthetic run: a DEM and uniform rainfall (mm/hr).
    pub fn from_dem(header: RasterHeader, elevation: Grid<f64>, rainfall: RainfallSeries) -> Self {
        Self {
            header,
            elevation,
            bedrock: None,
            rain_zones: None,
            rainfall,
        }
    }
}

/// Reads the DEM, optional bedrock and rain-zone rasters, and the rainfall record.
pub fn load_inputs(config: &ModelConfig) -> Result<ModelInputs, InputError> {
    let io = &config.io;
    let dem_path = io.input(&io.dem_file);
    let dem = read_ascii(&dem_path)?;
    info!(
        "read DEM {} ({} x {}, cell size {})",
        dem_path.display(),
        dem.header.nrows,
        dem.header.ncols,
        dem.header.cellsize
    );
    let header = dem.header;
    let elevation = dem.to_grid();

    let bedrock = match (&io.bedrock_file, config.sediment.bedrock_layer_on) {
        (Some(name), true) => {
            let path = io.input(name);
            Some(read_ascii(&path)?.to_grid_matching(&header, &path)?)
        }
        _ => None,
    };

    let rain_zones = match (&io.hydroindex_file, config.hydrology.spatial_var_rain) {
        (Some(name), true) => {
            let path = io.input(name);
            Some(read_ascii(&path)?.to_grid_matching(&header, &path)?)
        }
        _ => None,
    };

    let hydro = &config.hydrology;
    let rainfall = match (&io.rainfall_file, hydro.rainfall_data_on) {
        (Some(name), true) => {
            let series = RainfallSeries::load(&io.input(name), hydro.rain_data_time_step, hydro.zone_count())?;
            info!("read {} rainfall rows from {}", series.len(), name);
            series
        }
        _ => RainfallSeries::uniform(hydro.zone_count(), hydro.uniform_rainfall),
    };

    Ok(ModelInputs {
        header,
        elevation,
        bedrock,
        rain_zones,
        rainfall,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_load_inputs_reads_dem_and_rain() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("dem.asc"),
            "ncols 2\nnrows 2\nxllcorner 0\nyllcorner 0\ncellsize 10\nNODATA_value -9999\n5 4\n3 2\n",
        )
        .unwrap();
        fs::write(dir.path().join("rain.txt"), "2.5\n0\n").unwrap();

        let mut config = ModelConfig::default();
        config.io.read_path = dir.path().to_path_buf();
        config.io.rainfall_file = Some("rain.txt".to_string());

        let inputs = load_inputs(&config).unwrap();
        assert_eq!(inputs.header.cellsize, 10.0);
        assert_eq!(inputs.elevation.get(2, 2), 2.0);
        assert!(inputs.bedrock.is_none());
        assert_eq!(inputs.rainfall.rate(0.0, 0), 2.5);
        assert_eq!(inputs.rainfall.rate(61.0, 0), 0.0);
    }

    #[test]
    fn test_missing_dem_is_raster_error() {
        let dir = tempdir().unwrap();
        let mut config = ModelConfig::default();
        config.io.read_path = dir.path().to_path_buf();
        assert!(matches!(load_inputs(&config), Err(InputError::Raster(_))));
    }
}
