//! Rainfall timeseries loader.

use log::warn;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RainfallError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}:{line}: cannot parse '{token}' as a rainfall rate")]
    Number {
        path: String,
        line: usize,
        token: String,
    },
    #[error("{path}: row {line} has {found} zones, expected {expected}")]
    Columns {
        path: String,
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("{path}: no rainfall rows")]
    Empty { path: String },
}

/// Rainfall rates (mm/hr) per time step and rain zone.
#[derive(Debug)]
pub struct RainfallSeries {
    step_minutes: f64,
    rows: Vec<Vec<f64>>,
    past_end_warned: AtomicBool,
}

impl Clone for RainfallSeries {
    fn clone(&self) -> Self {
        Self {
            step_minutes: self.step_minutes,
            rows: self.rows.clone(),
            past_end_warned: AtomicBool::new(self.past_end_warned.load(Ordering::Relaxed)),
        }
    }
}

impl RainfallSeries {
    pub fn new(step_minutes: f64, rows: Vec<Vec<f64>>) -> Self {
        Self {
            step_minutes: step_minutes.max(1.0),
            rows,
            past_end_warned: AtomicBool::new(false),
        }
    }

    /// The same rate in every zone for all time.
    pub fn uniform(zones: usize, rate: f64) -> Self {
        Self {
            step_minutes: f64::INFINITY,
            rows: vec![vec![rate; zones.max(1)]],
            past_end_warned: AtomicBool::new(false),
        }
    }

    /// Reads whitespace- or comma-separated rows, one column per zone.
    ///
    /// Only the first `zones` columns are used.
    pub fn load(path: &Path, step_minutes: f64, zones: usize) -> Result<Self, RainfallError> {
        let name = path.display().to_string();
        let text = fs::read_to_string(path).map_err(|source| RainfallError::Io {
            path: name.clone(),
            source,
        })?;

        let mut rows = Vec::new();
        for (i, line) in text.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let row = trimmed
                .split(|ch: char| ch.is_whitespace() || ch == ',')
                .filter(|t| !t.is_empty())
                .map(|t| {
                    t.parse::<f64>().map_err(|_| RainfallError::Number {
                        path: name.clone(),
                        line: i + 1,
                        token: t.to_string(),
                    })
                })
                .collect::<Result<Vec<f64>, _>>()?;
            if row.len() < zones {
                return Err(RainfallError::Columns {
                    path: name,
                    line: i + 1,
                    expected: zones,
                    found: row.len(),
                });
            }
            rows.push(row.into_iter().take(zones.max(1)).collect());
        }
        if rows.is_empty() {
            return Err(RainfallError::Empty { path: name });
        }
        Ok(Self::new(step_minutes, rows))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn step_minutes(&self) -> f64 {
        self.step_minutes
    }

    /// Minutes of model time covered by the series.
    pub fn duration_minutes(&self) -> f64 {
        self.step_minutes * self.rows.len() as f64
    }

    /// Rate (mm/hr) in `zone` at model time `minutes`; zero past the end of the record.
    pub fn rate(&self, minutes: f64, zone: usize) -> f64 {
        let step = if self.step_minutes.is_finite() {
            (minutes / self.step_minutes).max(0.0) as usize
        } else {
            0
        };
        match self.rows.get(step) {
            Some(row) => row.get(zone).copied().unwrap_or(0.0),
            None => {
                if !self.past_end_warned.swap(true, Ordering::Relaxed) {
                    warn!(
                        "rainfall record ends after {} rows; treating later times as dry",
                        self.rows.len()
                    );
                }
                0.0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_rows_map_to_time_steps() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rain.txt");
        fs::write(&path, "1.0 2.0\n3.0, 4.0\n\n5 6\n").unwrap();

        let rain = RainfallSeries::load(&path, 60.0, 2).unwrap();
        assert_eq!(rain.len(), 3);
        assert_eq!(rain.rate(0.0, 0), 1.0);
        assert_eq!(rain.rate(59.9, 1), 2.0);
        assert_eq!(rain.rate(60.0, 1), 4.0);
        assert_eq!(rain.rate(150.0, 0), 5.0);
        assert_eq!(rain.duration_minutes(), 180.0);
    }

    #[test]
    fn test_past_end_is_dry() {
        let rain = RainfallSeries::new(10.0, vec![vec![7.0]]);
        assert_eq!(rain.rate(5.0, 0), 7.0);
        assert_eq!(rain.rate(500.0, 0), 0.0);
    }

    #[test]
    fn test_uniform_never_ends() {
        let rain = RainfallSeries::uniform(2, 3.5);
        assert_eq!(rain.rate(1.0e6, 1), 3.5);
    }

    #[test]
    fn test_missing_zone_column_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rain.txt");
        fs::write(&path, "1.0\n").unwrap();
        assert!(matches!(
            RainfallSeries::load(&path, 60.0, 2),
            Err(RainfallError::Columns { expected: 2, found: 1, .. })
        ));
    }
}
