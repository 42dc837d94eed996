//! ESRI ASCII grid reader and writer.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

use crate::grid::{Grid, NO_DATA};

/// Errors raised while reading or writing ASCII rasters.
#[derive(Error, Debug)]
pub enum RasterError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}: malformed header line '{line}'")]
    Header { path: String, line: String },
    #[error("{path}: missing header key '{key}'")]
    MissingKey { path: String, key: &'static str },
    #[error("{path}: expected {expected} values, found {found}")]
    ValueCount {
        path: String,
        expected: usize,
        found: usize,
    },
    #[error("{path}: cannot parse '{token}' as a number")]
    Number { path: String, token: String },
    #[error("{path}: raster is {found_rows}x{found_cols}, expected {rows}x{cols}")]
    Shape {
        path: String,
        rows: usize,
        cols: usize,
        found_rows: usize,
        found_cols: usize,
    },
}

/// Georeferencing header of an ASCII grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterHeader {
    pub ncols: usize,
    pub nrows: usize,
    pub xllcorner: f64,
    pub yllcorner: f64,
    pub cellsize: f64,
    pub nodata: f64,
}

impl RasterHeader {
    /// Header for a synthetic grid anchored at the origin.
    pub fn new(nrows: usize, ncols: usize, cellsize: f64) -> Self {
        Self {
            ncols,
            nrows,
            xllcorner: 0.0,
            yllcorner: 0.0,
            cellsize,
            nodata: NO_DATA,
        }
    }
}

/// A raster as read from disk, row-major from the top row.
#[derive(Debug, Clone)]
pub struct AsciiRaster {
    pub header: RasterHeader,
    pub values: Vec<f64>,
}

impl AsciiRaster {
    /// Copies values into a padded grid; the border and no-data cells get [`NO_DATA`].
    pub fn to_grid(&self) -> Grid<f64> {
        let h = &self.header;
        let mut grid = Grid::new(h.nrows, h.ncols, NO_DATA);
        for r in 0..h.nrows {
            for c in 0..h.ncols {
                let v = self.values[r * h.ncols + c];
                let v = if (v - h.nodata).abs() < 1e-6 { NO_DATA } else { v };
                grid.set(r + 1, c + 1, v);
            }
        }
        grid
    }

    /// Copies values into a padded grid checked against an existing header.
    pub fn to_grid_matching(&self, header: &RasterHeader, path: &Path) -> Result<Grid<f64>, RasterError> {
        if self.header.nrows != header.nrows || self.header.ncols != header.ncols {
            return Err(RasterError::Shape {
                path: path.display().to_string(),
                rows: header.nrows,
                cols: header.ncols,
                found_rows: self.header.nrows,
                found_cols: self.header.ncols,
            });
        }
        Ok(self.to_grid())
    }
}

/// Reads an ASCII grid.
pub fn read_ascii(path: &Path) -> Result<AsciiRaster, RasterError> {
    let name = path.display().to_string();
    let file = File::open(path).map_err(|source| RasterError::Io {
        path: name.clone(),
        source,
    })?;
    let reader = BufReader::new(file);

    let mut ncols = None;
    let mut nrows = None;
    let mut xll = 0.0;
    let mut yll = 0.0;
    let mut cellsize = None;
    let mut nodata = NO_DATA;
    let mut values = Vec::new();

    let parse = |token: &str| -> Result<f64, RasterError> {
        token.parse::<f64>().map_err(|_| RasterError::Number {
            path: name.clone(),
            token: token.to_string(),
        })
    };

    for line in reader.lines() {
        let line = line.map_err(|source| RasterError::Io {
            path: name.clone(),
            source,
        })?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let first = trimmed.chars().next().unwrap_or('0');
        if values.is_empty() && first.is_ascii_alphabetic() {
            let mut parts = trimmed.split_whitespace();
            let key = parts.next().unwrap_or_default().to_ascii_lowercase();
            let value = match parts.next() {
                Some(v) => parse(v)?,
                None => {
                    return Err(RasterError::Header {
                        path: name.clone(),
                        line: trimmed.to_string(),
                    })
                }
            };
            match key.as_str() {
                "ncols" => ncols = Some(value as usize),
                "nrows" => nrows = Some(value as usize),
                "xllcorner" | "xllcenter" => xll = value,
                "yllcorner" | "yllcenter" => yll = value,
                "cellsize" => cellsize = Some(value),
                "nodata_value" => nodata = value,
                _ => {
                    return Err(RasterError::Header {
                        path: name.clone(),
                        line: trimmed.to_string(),
                    })
                }
            }
            continue;
        }
        for token in trimmed.split_whitespace() {
            values.push(parse(token)?);
        }
    }

    let ncols = ncols.ok_or(RasterError::MissingKey { path: name.clone(), key: "ncols" })?;
    let nrows = nrows.ok_or(RasterError::MissingKey { path: name.clone(), key: "nrows" })?;
    let cellsize = cellsize.ok_or(RasterError::MissingKey { path: name.clone(), key: "cellsize" })?;

    if values.len() != ncols * nrows {
        return Err(RasterError::ValueCount {
            path: name,
            expected: ncols * nrows,
            found: values.len(),
        });
    }

    Ok(AsciiRaster {
        header: RasterHeader {
            ncols,
            nrows,
            xllcorner: xll,
            yllcorner: yll,
            cellsize,
            nodata,
        },
        values,
    })
}

/// Writes the interior of a grid as an ASCII raster, creating parent directories.
pub fn write_ascii<F>(path: &Path, header: &RasterHeader, rows: usize, cols: usize, value: F) -> Result<(), RasterError>
where
    F: Fn(usize, usize) -> f64,
{
    let name = path.display().to_string();
    let io_err = |source| RasterError::Io {
        path: name.clone(),
        source,
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
    }
    let file = File::create(path).map_err(io_err)?;
    let mut w = BufWriter::new(file);

    let mut write = || -> std::io::Result<()> {
        writeln!(w, "ncols {}", cols)?;
        writeln!(w, "nrows {}", rows)?;
        writeln!(w, "xllcorner {}", header.xllcorner)?;
        writeln!(w, "yllcorner {}", header.yllcorner)?;
        writeln!(w, "cellsize {}", header.cellsize)?;
        writeln!(w, "NODATA_value {}", header.nodata)?;
        for r in 1..=rows {
            let line: Vec<String> = (1..=cols).map(|c| format!("{:.6}", value(r, c))).collect();
            writeln!(w, "{}", line.join(" "))?;
        }
        w.flush()
    };
    write().map_err(io_err)
}

/// Writes a padded grid.
pub fn write_grid(path: &Path, header: &RasterHeader, grid: &Grid<f64>) -> Result<(), RasterError> {
    write_ascii(path, header, grid.rows(), grid.cols(), |r, c| grid.get(r, c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_sample(path: &Path) {
        fs::write(
            path,
            "ncols 3\nnrows 2\nxllcorner 100.0\nyllcorner 200.0\ncellsize 5\nNODATA_value -9999\n\
             1 2 3\n4 -9999 6\n",
        )
        .unwrap();
    }

    #[test]
    fn test_read_places_values_inside_border() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dem.asc");
        write_sample(&path);

        let raster = read_ascii(&path).unwrap();
        assert_eq!(raster.header.ncols, 3);
        assert_eq!(raster.header.nrows, 2);
        assert_eq!(raster.header.cellsize, 5.0);

        let grid = raster.to_grid();
        assert_eq!(grid.get(1, 1), 1.0);
        assert_eq!(grid.get(2, 3), 6.0);
        assert_eq!(grid.get(2, 2), NO_DATA);
        assert_eq!(grid.get(0, 0), NO_DATA);
        assert_eq!(grid.get(3, 4), NO_DATA);
    }

    #[test]
    fn test_write_then_read_keeps_header() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("dem.asc");
        write_sample(&src);
        let raster = read_ascii(&src).unwrap();
        let grid = raster.to_grid();

        let out = dir.path().join("out").join("copy.asc");
        write_grid(&out, &raster.header, &grid).unwrap();
        assert!(out.exists());

        let again = read_ascii(&out).unwrap();
        assert_eq!(again.header.xllcorner, 100.0);
        assert_eq!(again.values, raster.values);
    }

    #[test]
    fn test_short_raster_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.asc");
        fs::write(&path, "ncols 2\nnrows 2\ncellsize 1\n1 2 3\n").unwrap();
        assert!(matches!(
            read_ascii(&path),
            Err(RasterError::ValueCount { expected: 4, found: 3, .. })
        ));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = read_ascii(Path::new("/nonexistent/dem.asc")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/dem.asc"));
    }
}
