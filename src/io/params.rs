//! Key/value parameter files.
//!
//! Each line reads `key: value # comment`. Keys are case-insensitive and only
//! the first token after the colon is used. Unknown keys are logged and skipped.

use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::{ConfigError, ModelConfig};
use crate::sediment::TransportLaw;

#[derive(Error, Debug)]
pub enum ParamError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("line {line}: '{key}' expects {expected}, got '{value}'")]
    Value {
        line: usize,
        key: String,
        expected: &'static str,
        value: String,
    },
    #[error("line {line}: unknown transport law '{value}' (expected wilcock or einstein)")]
    TransportLaw { line: usize, value: String },
    #[error("no transport_law given (expected wilcock or einstein)")]
    MissingTransportLaw,
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Parses a parameter file on top of the default configuration.
pub fn load_params(path: &Path) -> Result<ModelConfig, ParamError> {
    let text = fs::read_to_string(path).map_err(|source| ParamError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_params(&text)
}

/// Parses parameter text on top of the default configuration.
pub fn parse_params(text: &str) -> Result<ModelConfig, ParamError> {
    let mut config = ModelConfig::default();
    let mut dem_name: Option<String> = None;
    let mut dem_ext: Option<String> = None;
    let mut transport_law_set = false;

    for (i, raw) in text.lines().enumerate() {
        let line_no = i + 1;
        let line = raw.split('#').next().unwrap_or_default().trim();
        if line.is_empty() {
            continue;
        }
        let Some((key, rest)) = line.split_once(':') else {
            debug!("line {}: no ':' separator, skipped", line_no);
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let Some(value) = rest.split_whitespace().next() else {
            debug!("line {}: '{}' has no value, skipped", line_no, key);
            continue;
        };

        let num = |expected: &'static str| -> Result<f64, ParamError> {
            value.parse::<f64>().map_err(|_| ParamError::Value {
                line: line_no,
                key: key.clone(),
                expected,
                value: value.to_string(),
            })
        };
        let flag = || -> Result<bool, ParamError> {
            match value.to_ascii_lowercase().as_str() {
                "yes" | "true" | "on" | "1" => Ok(true),
                "no" | "false" | "off" | "0" => Ok(false),
                _ => Err(ParamError::Value {
                    line: line_no,
                    key: key.clone(),
                    expected: "yes or no",
                    value: value.to_string(),
                }),
            }
        };
        let name = || value.to_string();
        let optional_output = |enabled: bool, current: &Option<String>, fallback: &str| {
            if enabled {
                Some(current.clone().unwrap_or_else(|| fallback.to_string()))
            } else {
                None
            }
        };

        let io = &mut config.io;
        let time = &mut config.time;
        let hydro = &mut config.hydrology;
        let sed = &mut config.sediment;
        let hill = &mut config.hillslope;

        match key.as_str() {
            // files
            "read_path" => io.read_path = PathBuf::from(value),
            "read_fname" => dem_name = Some(name()),
            "dem_read_extension" => dem_ext = Some(name()),
            "write_path" => io.write_path = PathBuf::from(value),
            "hydroindex_file" => io.hydroindex_file = Some(name()),
            "rainfall_data_file" => io.rainfall_file = Some(name()),
            "grain_data_file" | "grain_size_frac_file" => io.grain_data_file = Some(name()),
            "bedrock_data_file" => io.bedrock_file = Some(name()),
            "read_in_graindata_from_file" => io.read_grain_data = flag()?,
            "timeseries_file" => io.timeseries_file = name(),
            "timeseries_save_interval" => io.timeseries_save_interval = num("minutes")?,
            "raster_output_interval" => io.raster_output_interval = num("minutes")?,
            "elevation_file" => io.rasters.elevation = Some(name()),
            "write_elevation_file" | "write_elev_file" => {
                io.rasters.elevation = optional_output(flag()?, &io.rasters.elevation, "elev")
            }
            "waterdepth_outfile_name" => io.rasters.water_depth = Some(name()),
            "write_waterdepth_file" => {
                io.rasters.water_depth = optional_output(flag()?, &io.rasters.water_depth, "waterdepth")
            }
            "elevdiff_outfile_name" => io.rasters.elev_diff = Some(name()),
            "write_elevdiff_file" => {
                io.rasters.elev_diff = optional_output(flag()?, &io.rasters.elev_diff, "elevdiff")
            }
            "flowvelocity_file" => io.rasters.flow_velocity = Some(name()),
            "write_flowvelocity_file" => {
                io.rasters.flow_velocity = optional_output(flag()?, &io.rasters.flow_velocity, "velocity")
            }
            "grainsize_file" => io.rasters.grain_size = Some(name()),
            "write_grainsize_file" => {
                io.rasters.grain_size = optional_output(flag()?, &io.rasters.grain_size, "grainsize")
            }
            "write_png_previews" => io.rasters.png_previews = flag()?,

            // clock
            "max_run_duration" => time.max_run_duration = num("hours")?,
            "min_time_step" => time.min_time_step = num("seconds")?,
            "max_time_step" => time.max_time_step = num("seconds")?,
            "courant_number" => time.courant_number = num("a number")?,
            "in_out_diff" => time.in_out_difference = num("a discharge")?,

            // hydrology
            "rainfall_data_on" => hydro.rainfall_data_on = flag()?,
            "uniform_rainfall" => hydro.uniform_rainfall = num("mm/hr")?,
            "rain_data_time_step" => hydro.rain_data_time_step = num("minutes")?,
            "spatial_var_rain" => hydro.spatial_var_rain = flag()?,
            "num_unique_rain_cells" => hydro.num_rain_zones = num("a count")? as usize,
            "rain_factor" => hydro.rain_factor = num("a number")?,
            "topmodel_m_value" => hydro.topmodel_m = num("metres")?,
            "min_q_for_depth_calc" => hydro.min_q_for_depth_calc = num("a discharge")?,
            "max_q_for_depth_calc" => hydro.max_q_for_depth_calc = num("a discharge")?,
            "hflow_threshold" => hydro.hflow_threshold = num("metres")?,
            "water_depth_erosion_threshold" => hydro.water_depth_erosion_threshold = num("metres")?,
            "slope_on_edge_cell" => hydro.slope_on_edge_cell = num("a slope")?,
            "evaporation_rate" => hydro.evaporation_rate = num("m/day")?,
            "froude_num_limit" => hydro.froude_num_limit = num("a number")?,
            "mannings_n" => hydro.mannings_n = num("a number")?,

            // sediment
            "hydro_model_only" => config.hydro_model_only = flag()?,
            "transport_law" => {
                sed.transport_law = match value.to_ascii_lowercase().as_str() {
                    "wilcock" => TransportLaw::Wilcock,
                    "einstein" => TransportLaw::Einstein,
                    _ => {
                        return Err(ParamError::TransportLaw {
                            line: line_no,
                            value: value.to_string(),
                        })
                    }
                };
                transport_law_set = true;
            }
            "max_tau_velocity" => sed.max_tau_velocity = num("m/s")?,
            "active_layer_thickness" => sed.active_layer_thickness = num("metres")?,
            "erosion_limit" => sed.erosion_limit = num("metres")?,
            "suspended_sediment_on" => sed.suspended_sediment_on = flag()?,
            "max_suspended_concentration" => sed.max_suspended_concentration = num("a fraction")?,
            "bedrock_layer_on" => sed.bedrock_layer_on = flag()?,
            "bedrock_erosion_threshold" => sed.bedrock_erosion_threshold = num("Pa")?,
            "stream_power_pb" => sed.stream_power_pb = num("a number")?,
            "stream_power_ke" => sed.stream_power_ke = num("a number")?,
            "lateral_erosion_on" => sed.lateral.enabled = flag()?,
            "lateral_erosion_constant" => sed.lateral.lateral_constant = num("a number")?,
            "edge_filter_passes" => sed.lateral.edge_filter_passes = num("a count")? as u32,
            "cells_shift_lat" => sed.lateral.cells_shift_lat = num("a count")? as u32,
            "max_diff_cross_chann" => sed.lateral.max_diff_cross_chann = num("a number")?,
            "bed_proportion" => sed.lateral.bed_proportion = num("a fraction")?,
            "vegetation_on" => sed.vegetation.enabled = flag()?,
            "grass_grow_rate" => sed.vegetation.grass_grow_rate = num("years")?,
            "vegetation_crit_shear" => sed.vegetation.critical_shear = num("Pa")?,
            "veg_erosion_prop" => sed.vegetation.lateral_restriction = num("a fraction")?,

            // hillslope
            "creep_rate" => hill.creep_rate = num("a number")?,
            "slope_failure_thresh" => hill.slope_failure_thresh = num("degrees")?,
            "soil_erosion_rate" => hill.soil_erosion_rate = num("a number")?,
            "landslide_on" => hill.landslide_on = flag()?,
            "global_landslide_on" => hill.global_landslide_on = flag()?,
            "soil_development_on" => hill.soil.enabled = flag()?,

            _ => warn!("line {}: unknown parameter '{}' ignored", line_no, key),
        }
    }

    if !transport_law_set && !config.hydro_model_only {
        return Err(ParamError::MissingTransportLaw);
    }
    if let Some(dem) = dem_name {
        config.io.dem_file = match dem_ext {
            Some(ext) => format!("{}.{}", dem, ext.trim_start_matches('.')),
            None => dem,
        };
    }

    config.validate()?;
    Ok(config)
}
