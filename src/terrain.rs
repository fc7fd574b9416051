//! Terrain elevation input.
//!
//! `TerrainField` is what the simulation consumes. `TerrainRaster` reads an
//! ESRI ASCII grid, flips it so row 0 is the southern edge and keeps the
//! georeferencing needed for export.

use std::path::Path;

use crate::error::ConfigError;
use crate::grid::{flip_rows, GeoTransform, Grid};

/// Elevation per vertex of an `(R+1)²` grid, row 0 south.
#[derive(Clone, Debug, PartialEq)]
pub struct TerrainField {
    elevation: Vec<f32>,
    resolution: usize,
}

impl TerrainField {
    pub fn new(elevation: Vec<f32>, resolution: usize) -> Result<Self, ConfigError> {
        if resolution == 0 {
            return Err(ConfigError::InvalidResolution);
        }
        let expected = (resolution + 1) * (resolution + 1);
        if elevation.len() != expected {
            return Err(ConfigError::TerrainSizeMismatch {
                expected,
                actual: elevation.len(),
            });
        }
        if let Some((index, &value)) = elevation.iter().enumerate().find(|(_, h)| !h.is_finite()) {
            return Err(ConfigError::NonFiniteElevation { index, value });
        }
        Ok(Self {
            elevation,
            resolution,
        })
    }

    /// All-zero terrain.
    pub fn flat(resolution: usize) -> Self {
        let side = resolution + 1;
        Self {
            elevation: vec![0.0; side * side],
            resolution,
        }
    }

    #[inline]
    pub fn resolution(&self) -> usize {
        self.resolution
    }

    #[inline]
    pub fn elevation(&self) -> &[f32] {
        &self.elevation
    }

    pub fn into_elevation(self) -> Vec<f32> {
        self.elevation
    }

    pub fn min_max(&self) -> (f32, f32) {
        self.elevation
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &h| (lo.min(h), hi.max(h)))
    }
}

/// A loaded raster: elevation plus where it sits in the world.
#[derive(Clone, Debug, PartialEq)]
pub struct TerrainRaster {
    pub field: TerrainField,
    pub geo: GeoTransform,
}

impl TerrainRaster {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ascii_grid(&text)
    }

    /// Parse an ESRI ASCII grid. NODATA samples become zero elevation.
    pub fn from_ascii_grid(text: &str) -> Result<Self, ConfigError> {
        let mut header = AsciiHeader::default();
        let mut values = Vec::new();

        for (line_no, line) in text.lines().enumerate() {
            let line_no = line_no + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let first = trimmed.split_whitespace().next().unwrap_or_default();
            if values.is_empty() && first.starts_with(|c: char| c.is_ascii_alphabetic()) {
                header.apply(trimmed, line_no)?;
                continue;
            }
            for token in trimmed.split_whitespace() {
                let value: f32 = token.parse().map_err(|_| ConfigError::RasterParse {
                    line: line_no,
                    message: format!("invalid sample {token:?}"),
                })?;
                values.push(value);
            }
        }

        let (cols, rows, cell_size) = header.dimensions()?;
        if cols != rows {
            return Err(ConfigError::NonSquareRaster { cols, rows });
        }
        if cols < 2 {
            return Err(ConfigError::InvalidResolution);
        }
        if values.len() != cols * rows {
            return Err(ConfigError::TerrainSizeMismatch {
                expected: cols * rows,
                actual: values.len(),
            });
        }
        if let Some(nodata) = header.nodata {
            for value in values.iter_mut().filter(|v| **v == nodata) {
                *value = 0.0;
            }
        }

        let resolution = cols - 1;
        let field = TerrainField::new(flip_rows(&values, resolution), resolution)?;
        let (west, south) = header.lower_left(cell_size)?;
        let geo = GeoTransform {
            origin_x: west,
            origin_y: south + rows as f64 * cell_size,
            pixel_width: cell_size,
            pixel_height: -cell_size,
        };
        Ok(Self { field, geo })
    }

    /// World width of the mesh: cells per edge times the pixel size.
    pub fn width(&self) -> f32 {
        (self.field.resolution() as f64 * self.geo.pixel_width) as f32
    }

    pub fn grid(&self) -> Result<Grid, ConfigError> {
        Grid::new(self.field.resolution(), self.width())
    }
}

#[derive(Default)]
struct AsciiHeader {
    ncols: Option<usize>,
    nrows: Option<usize>,
    xll: Option<(f64, bool)>,
    yll: Option<(f64, bool)>,
    cell_size: Option<f64>,
    nodata: Option<f32>,
}

impl AsciiHeader {
    fn apply(&mut self, line: &str, line_no: usize) -> Result<(), ConfigError> {
        let mut parts = line.split_whitespace();
        let key = parts.next().unwrap_or_default().to_ascii_lowercase();
        let value = parts.next().ok_or_else(|| ConfigError::RasterParse {
            line: line_no,
            message: format!("header {key} has no value"),
        })?;
        let bad = |_| ConfigError::RasterParse {
            line: line_no,
            message: format!("invalid value {value:?} for {key}"),
        };
        match key.as_str() {
            "ncols" => self.ncols = Some(value.parse().map_err(|_| bad(()))?),
            "nrows" => self.nrows = Some(value.parse().map_err(|_| bad(()))?),
            "xllcorner" => self.xll = Some((value.parse().map_err(|_| bad(()))?, false)),
            "xllcenter" => self.xll = Some((value.parse().map_err(|_| bad(()))?, true)),
            "yllcorner" => self.yll = Some((value.parse().map_err(|_| bad(()))?, false)),
            "yllcenter" => self.yll = Some((value.parse().map_err(|_| bad(()))?, true)),
            "cellsize" => self.cell_size = Some(value.parse().map_err(|_| bad(()))?),
            "nodata_value" => self.nodata = Some(value.parse().map_err(|_| bad(()))?),
            _ => {
                return Err(ConfigError::RasterParse {
                    line: line_no,
                    message: format!("unknown header {key}"),
                })
            }
        }
        Ok(())
    }

    fn dimensions(&self) -> Result<(usize, usize, f64), ConfigError> {
        let missing = |name: &str| ConfigError::RasterParse {
            line: 0,
            message: format!("missing header {name}"),
        };
        let cols = self.ncols.ok_or_else(|| missing("ncols"))?;
        let rows = self.nrows.ok_or_else(|| missing("nrows"))?;
        let cell_size = self.cell_size.ok_or_else(|| missing("cellsize"))?;
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(ConfigError::InvalidWidth(cell_size as f32));
        }
        Ok((cols, rows, cell_size))
    }

    /// South-west corner of the raster extent.
    fn lower_left(&self, cell_size: f64) -> Result<(f64, f64), ConfigError> {
        let corner = |value: Option<(f64, bool)>, name: &str| {
            value
                .map(|(v, center)| if center { v - cell_size / 2.0 } else { v })
                .ok_or_else(|| ConfigError::RasterParse {
                    line: 0,
                    message: format!("missing header {name}"),
                })
        };
        Ok((corner(self.xll, "xllcorner")?, corner(self.yll, "yllcorner")?))
    }
}
