//! Input and output file configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raster snapshots written every `raster_output_interval` minutes.
///
/// Each entry is a file-name prefix; `None` disables that raster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RasterOutputs {
    pub elevation: Option<String>,
    pub water_depth: Option<String>,
    pub elev_diff: Option<String>,
    pub flow_velocity: Option<String>,
    pub grain_size: Option<String>,
    /// Also write 16-bit PNG previews of elevation and water depth.
    pub png_previews: bool,
}

impl Default for RasterOutputs {
    fn default() -> Self {
        Self {
            elevation: Some("elev".to_string()),
            water_depth: Some("waterdepth".to_string()),
            elev_diff: Some("elevdiff".to_string()),
            flow_velocity: None,
            grain_size: None,
            png_previews: false,
        }
    }
}

/// Where inputs are read from and outputs are written to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IoConfig {
    pub read_path: PathBuf,
    /// DEM file name, relative to `read_path`.
    pub dem_file: String,
    /// Rain-zone raster (integer zone ids starting at 1).
    pub hydroindex_file: Option<String>,
    pub bedrock_file: Option<String>,
    pub rainfall_file: Option<String>,
    /// Initial grain records, used when `read_grain_data` is set.
    pub grain_data_file: Option<String>,
    pub read_grain_data: bool,

    pub write_path: PathBuf,
    /// Discharge and sediment yield record appended every `timeseries_save_interval`.
    pub timeseries_file: String,
    /// Minutes between rows of the timeseries record.
    pub timeseries_save_interval: f64,
    /// Minutes between raster snapshots.
    pub raster_output_interval: f64,
    pub rasters: RasterOutputs,
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            read_path: PathBuf::from("."),
            dem_file: "dem.asc".to_string(),
            hydroindex_file: None,
            bedrock_file: None,
            rainfall_file: None,
            grain_data_file: None,
            read_grain_data: false,

            write_path: PathBuf::from("."),
            timeseries_file: "catchment.dat".to_string(),
            timeseries_save_interval: 60.0,
            raster_output_interval: 1000.0,
            rasters: RasterOutputs::default(),
        }
    }
}

impl IoConfig {
    /// Resolves a file name against `read_path`.
    pub fn input(&self, name: &str) -> PathBuf {
        self.read_path.join(name)
    }

    /// Resolves a file name against `write_path`.
    pub fn output(&self, name: &str) -> PathBuf {
        self.write_path.join(name)
    }
}
