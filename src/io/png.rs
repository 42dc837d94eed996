//! 16-bit grayscale PNG previews of simulation grids.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ImageBuffer, ImageEncoder, Luma};
use thiserror::Error;

use crate::grid::{is_no_data, Grid};

/// Errors that can occur during PNG export.
#[derive(Error, Debug)]
pub enum PngExportError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Image encoding error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Invalid value range: min ({0}) >= max ({1})")]
    InvalidRange(f64, f64),
}

/// Options for PNG export.
#[derive(Debug, Clone)]
pub struct PngExportOptions {
    /// Value mapped to black.
    pub min_value: f64,
    /// Value mapped to white.
    pub max_value: f64,
    pub compression: CompressionType,
    pub filter: FilterType,
}

impl Default for PngExportOptions {
    fn default() -> Self {
        Self {
            min_value: 0.0,
            max_value: 1.0,
            compression: CompressionType::Default,
            filter: FilterType::Adaptive,
        }
    }
}

impl PngExportOptions {
    /// Options spanning the data range of `grid`.
    ///
    /// A constant grid gets a unit-wide range so it still exports.
    pub fn auto_range(grid: &Grid<f64>) -> Self {
        let (min, max) = grid.value_range().unwrap_or((0.0, 1.0));
        let max = if max > min { max } else { min + 1.0 };
        Self {
            min_value: min,
            max_value: max,
            ..Default::default()
        }
    }
}

/// Exports the interior of a grid; no-data cells are written black.
pub fn export_grid_png(grid: &Grid<f64>, path: &Path, options: &PngExportOptions) -> Result<(), PngExportError> {
    let min = options.min_value;
    let max = options.max_value;
    if min >= max {
        return Err(PngExportError::InvalidRange(min, max));
    }

    let width = grid.cols() as u32;
    let height = grid.rows() as u32;
    let range = max - min;

    let mut img: ImageBuffer<Luma<u16>, Vec<u16>> = ImageBuffer::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let v = grid.get(y as usize + 1, x as usize + 1);
            let value = if is_no_data(v) {
                0
            } else {
                (((v - min) / range).clamp(0.0, 1.0) * 65535.0) as u16
            };
            img.put_pixel(x, y, Luma([value]));
        }
    }

    let io_error = |source: std::io::Error| PngExportError::Io {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
    }
    let file = File::create(path).map_err(io_error)?;
    let writer = BufWriter::new(file);
    let encoder = PngEncoder::new_with_quality(writer, options.compression, options.filter);

    let byte_slice: &[u8] = bytemuck::cast_slice(img.as_raw());
    encoder.write_image(byte_slice, width, height, image::ExtendedColorType::L16)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::NO_DATA;
    use tempfile::tempdir;

    fn ramp() -> Grid<f64> {
        let mut g = Grid::new(6, 8, NO_DATA);
        for (r, c) in g.cells().collect::<Vec<_>>() {
            g.set(r, c, (r + c) as f64);
        }
        g
    }

    #[test]
    fn test_export_grid_png() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("previews").join("elev.png");
        let grid = ramp();
        export_grid_png(&grid, &path, &PngExportOptions::auto_range(&grid)).unwrap();
        assert!(path.exists());

        let img = image::open(&path).unwrap().into_luma16();
        assert_eq!(img.dimensions(), (8, 6));
        assert_eq!(img.get_pixel(0, 0)[0], 0);
        assert_eq!(img.get_pixel(7, 5)[0], 65535);
    }

    #[test]
    fn test_invalid_range() {
        let dir = tempdir().unwrap();
        let options = PngExportOptions {
            min_value: 1.0,
            max_value: 1.0,
            ..Default::default()
        };
        let result = export_grid_png(&ramp(), &dir.path().join("x.png"), &options);
        assert!(matches!(result, Err(PngExportError::InvalidRange(_, _))));
    }

    #[test]
    fn test_write_failure_names_the_file() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();
        let path = blocker.join("elev.png");
        let grid = ramp();
        let err = export_grid_png(&grid, &path, &PngExportOptions::auto_range(&grid)).unwrap_err();
        match err {
            PngExportError::Io { path: reported, .. } => assert!(reported.ends_with("elev.png"), "{reported}"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_auto_range_of_flat_grid() {
        let g = Grid::new(2, 2, 3.0);
        let options = PngExportOptions::auto_range(&g);
        assert_eq!(options.min_value, 3.0);
        assert_eq!(options.max_value, 4.0);
    }
}
