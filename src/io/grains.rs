//! Grain record files.
//!
//! One record per line: `row col id a_1..a_K s0_1..s0_K .. s9_1..s9_K`, rows and
//! columns 1-based, `K` the number of grain classes.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

use crate::sediment::{GrainRecord, GrainStore, STRATA};

#[derive(Error, Debug)]
pub enum GrainFileError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}:{line}: expected {expected} fields, found {found}")]
    Fields {
        path: String,
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("{path}:{line}: cannot parse '{token}'")]
    Number {
        path: String,
        line: usize,
        token: String,
    },
    #[error("{path}:{line}: cell ({row}, {col}) is outside the grid")]
    OutOfGrid {
        path: String,
        line: usize,
        row: usize,
        col: usize,
    },
}

/// Loads records into `store`, replacing records of the same cells. Returns the count read.
pub fn read_grain_file(path: &Path, store: &mut GrainStore, rows: usize, cols: usize) -> Result<usize, GrainFileError> {
    let name = path.display().to_string();
    let text = fs::read_to_string(path).map_err(|source| GrainFileError::Io {
        path: name.clone(),
        source,
    })?;

    let k = store.class_count();
    let expected = 3 + k * (STRATA + 1);
    let mut count = 0;

    for (i, line) in text.lines().enumerate() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }
        if fields.len() < expected {
            return Err(GrainFileError::Fields {
                path: name,
                line: i + 1,
                expected,
                found: fields.len(),
            });
        }
        let values = fields
            .iter()
            .take(expected)
            .map(|t| {
                t.parse::<f64>().map_err(|_| GrainFileError::Number {
                    path: name.clone(),
                    line: i + 1,
                    token: t.to_string(),
                })
            })
            .collect::<Result<Vec<f64>, _>>()?;

        let (row, col) = (values[0] as usize, values[1] as usize);
        if row == 0 || col == 0 || row > rows || col > cols {
            return Err(GrainFileError::OutOfGrid {
                path: name,
                line: i + 1,
                row,
                col,
            });
        }

        let mut rec = GrainRecord::empty();
        rec.active[..k].copy_from_slice(&values[3..3 + k]);
        for z in 0..STRATA {
            let start = 3 + k * (z + 1);
            rec.strata[z][..k].copy_from_slice(&values[start..start + k]);
        }
        store.insert(row, col, rec);
        count += 1;
    }
    Ok(count)
}

/// Writes every record of `store`.
pub fn write_grain_file(path: &Path, store: &GrainStore) -> Result<(), GrainFileError> {
    let name = path.display().to_string();
    let io_err = |source| GrainFileError::Io {
        path: name.clone(),
        source,
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
    }
    let mut w = BufWriter::new(File::create(path).map_err(io_err)?);
    let k = store.class_count();

    let mut write = || -> std::io::Result<()> {
        for (row, col, rec) in store.iter() {
            let id = store.id(row, col).unwrap_or_default();
            write!(w, "{} {} {}", row, col, id)?;
            for v in &rec.active[..k] {
                write!(w, " {:.8}", v)?;
            }
            for stratum in &rec.strata {
                for v in &stratum[..k] {
                    write!(w, " {:.8}", v)?;
                }
            }
            writeln!(w)?;
        }
        w.flush()
    };
    write().map_err(io_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sediment::SedimentConfig;
    use tempfile::tempdir;

    #[test]
    fn test_written_records_load_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("grains.dat");
        let config = SedimentConfig::default();

        let mut store = GrainStore::new(5, 5, &config);
        let id = store.ensure_record(2, 3, 10.0, -9999.0);
        store.get_mut(id).active[4] = 0.5;
        store.ensure_record(4, 1, 8.0, 7.5);
        write_grain_file(&path, &store).unwrap();

        let mut loaded = GrainStore::new(5, 5, &config);
        let n = read_grain_file(&path, &mut loaded, 5, 5).unwrap();
        assert_eq!(n, 2);
        let rec = loaded.at(2, 3).unwrap();
        assert!((rec.active[4] - 0.5).abs() < 1e-8);
        let original = store.at(4, 1).unwrap();
        let copy = loaded.at(4, 1).unwrap();
        assert!((original.strata[3][2] - copy.strata[3][2]).abs() < 1e-8);
    }

    #[test]
    fn test_short_line_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("grains.dat");
        fs::write(&path, "1 1 0 0.1 0.1\n").unwrap();
        let mut store = GrainStore::new(3, 3, &SedimentConfig::default());
        assert!(matches!(
            read_grain_file(&path, &mut store, 3, 3),
            Err(GrainFileError::Fields { line: 1, .. })
        ));
    }

    #[test]
    fn test_cell_outside_grid_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("grains.dat");
        let fields = vec!["0.01"; 9 * (STRATA + 1)].join(" ");
        fs::write(&path, format!("9 1 0 {}\n", fields)).unwrap();
        let mut store = GrainStore::new(3, 3, &SedimentConfig::default());
        assert!(matches!(
            read_grain_file(&path, &mut store, 3, 3),
            Err(GrainFileError::OutOfGrid { row: 9, .. })
        ));
    }
}
