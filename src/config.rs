//! Top-level model configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::hillslope::HillslopeConfig;
use crate::hydrology::HydrologyConfig;
use crate::io::IoConfig;
use crate::sediment::{SedimentConfig, MAX_CLASSES};
use crate::timestep::TimestepConfig;

/// Errors raised while loading or validating a configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Every parameter of a simulation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelConfig {
    pub io: IoConfig,
    pub time: TimestepConfig,
    pub hydrology: HydrologyConfig,
    pub sediment: SedimentConfig,
    pub hillslope: HillslopeConfig,
    /// Route water only; skip erosion and hillslope processes.
    pub hydro_model_only: bool,
}

impl ModelConfig {
    /// Reads a JSON configuration.
    pub fn load_json(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: ModelConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Writes this configuration as pretty-printed JSON.
    pub fn save_json(&self, path: &Path) -> Result<(), ConfigError> {
        let text = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                    path: parent.display().to_string(),
                    source,
                })?;
            }
        }
        fs::write(path, text).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    /// Checks the parameters the numerical core relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sed = &self.sediment;
        let n = sed.classes.len();
        if n == 0 || n > MAX_CLASSES {
            return Err(ConfigError::Invalid(format!(
                "expected 1 to {} grain classes, got {}",
                MAX_CLASSES, n
            )));
        }
        for pair in sed.classes.windows(2) {
            if pair[1].diameter <= pair[0].diameter {
                return Err(ConfigError::Invalid(
                    "grain diameters must increase from finest to coarsest".to_string(),
                ));
            }
        }
        if sed.classes.iter().any(|c| c.diameter <= 0.0 || c.proportion < 0.0) {
            return Err(ConfigError::Invalid(
                "grain diameters must be positive and proportions non-negative".to_string(),
            ));
        }
        let total: f64 = sed.classes.iter().map(|c| c.proportion).sum();
        if (total - 1.0).abs() > 1e-3 {
            return Err(ConfigError::Invalid(format!(
                "grain proportions sum to {:.4}, expected 1",
                total
            )));
        }
        let suspended: Vec<usize> = sed
            .classes
            .iter()
            .enumerate()
            .filter(|(_, c)| c.suspended)
            .map(|(k, _)| k)
            .collect();
        if suspended.len() > 1 || suspended.first().is_some_and(|&k| k != 0) {
            return Err(ConfigError::Invalid(
                "only the finest grain class may be suspended".to_string(),
            ));
        }
        if sed.active_layer_thickness <= 0.0 || sed.erosion_limit <= 0.0 {
            return Err(ConfigError::Invalid(
                "active layer thickness and erosion limit must be positive".to_string(),
            ));
        }

        let t = &self.time;
        if !(t.courant_number > 0.0 && t.courant_number <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "courant number {} outside (0, 1]",
                t.courant_number
            )));
        }
        if t.min_time_step <= 0.0 || t.max_time_step < t.min_time_step {
            return Err(ConfigError::Invalid(format!(
                "time steps must satisfy 0 < min ({}) <= max ({})",
                t.min_time_step, t.max_time_step
            )));
        }
        if t.max_run_duration <= 0.0 {
            return Err(ConfigError::Invalid("max_run_duration must be positive".to_string()));
        }

        let h = &self.hydrology;
        if h.mannings_n <= 0.0 || h.topmodel_m <= 0.0 {
            return Err(ConfigError::Invalid(
                "mannings_n and topmodel_m must be positive".to_string(),
            ));
        }
        if h.min_q_for_depth_calc >= h.max_q_for_depth_calc {
            return Err(ConfigError::Invalid(
                "min_q_for_depth_calc must be below max_q_for_depth_calc".to_string(),
            ));
        }
        if self.io.timeseries_save_interval <= 0.0 || self.io.raster_output_interval <= 0.0 {
            return Err(ConfigError::Invalid(
                "output intervals must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        ModelConfig::default().validate().unwrap();
    }

    #[test]
    fn test_json_round_trip_keeps_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("model.json");

        let mut config = ModelConfig::default();
        config.hydrology.mannings_n = 0.035;
        config.sediment.lateral.enabled = true;
        config.save_json(&path).unwrap();
        assert!(path.exists());

        let loaded = ModelConfig::load_json(&path).unwrap();
        assert_eq!(loaded.hydrology.mannings_n, 0.035);
        assert!(loaded.sediment.lateral.enabled);
    }

    #[test]
    fn test_rejects_unsorted_grains() {
        let mut config = ModelConfig::default();
        config.sediment.classes.swap(0, 1);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_bad_courant() {
        let mut config = ModelConfig::default();
        config.time.courant_number = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_coarse_suspended_class() {
        let mut config = ModelConfig::default();
        config.sediment.classes[0].suspended = false;
        config.sediment.classes[3].suspended = true;
        assert!(config.validate().is_err());
    }
}
