//! Open raster tile handles

use crate::error::Result;
use crate::io::{self, RasterHeader};
use crate::raster::GeoTransform;
use ndarray::Array2;
use std::path::{Path, PathBuf};

/// Pixel sampling method for elevation queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SamplingMethod {
    /// Value of the pixel covering the point
    #[default]
    Nearest,
    /// Bilinear interpolation of the four surrounding pixel centers,
    /// falling back to nearest when a neighbor is missing
    Bilinear,
}

/// An open, decoded elevation tile bound to one file on disk.
///
/// The whole grid is held in memory; handles are pooled and evicted by
/// [`crate::cache::RasterCache`], which bounds the total footprint.
#[derive(Debug)]
pub struct RasterHandle {
    path: PathBuf,
    data: Array2<f32>,
    transform: GeoTransform,
    nodata: Option<f32>,
}

impl RasterHandle {
    /// Open and decode a tile file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let (data, header) = io::read_geotiff(path.as_ref())?;
        Ok(Self::from_parts(path.as_ref().to_path_buf(), data, header))
    }

    pub(crate) fn from_parts(path: PathBuf, data: Array2<f32>, header: RasterHeader) -> Self {
        Self {
            path,
            data,
            transform: header.transform,
            nodata: header.nodata,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    /// Declared no-data sentinel, if any. NaN cells are always treated
    /// as missing.
    pub fn nodata(&self) -> Option<f32> {
        self.nodata
    }

    /// Sample the elevation at projected coordinates (x, y).
    ///
    /// Returns `None` when the point falls outside the tile or on a
    /// no-data cell.
    pub fn sample(&self, x: f64, y: f64, method: SamplingMethod) -> Option<f64> {
        match method {
            SamplingMethod::Nearest => self.sample_nearest(x, y),
            SamplingMethod::Bilinear => self
                .sample_bilinear(x, y)
                .or_else(|| self.sample_nearest(x, y)),
        }
    }

    fn sample_nearest(&self, x: f64, y: f64) -> Option<f64> {
        let (col, row) = self.transform.geo_to_pixel(x, y);
        self.value_at(row.floor(), col.floor())
    }

    fn sample_bilinear(&self, x: f64, y: f64) -> Option<f64> {
        let (col, row) = self.transform.geo_to_pixel(x, y);
        // Interpolate between pixel centers
        let u = col - 0.5;
        let v = row - 0.5;
        let c0 = u.floor();
        let r0 = v.floor();
        let fu = u - c0;
        let fv = v - r0;

        let v00 = self.value_at(r0, c0)?;
        let v01 = self.value_at(r0, c0 + 1.0)?;
        let v10 = self.value_at(r0 + 1.0, c0)?;
        let v11 = self.value_at(r0 + 1.0, c0 + 1.0)?;

        let top = v00 * (1.0 - fu) + v01 * fu;
        let bottom = v10 * (1.0 - fu) + v11 * fu;
        Some(top * (1.0 - fv) + bottom * fv)
    }

    fn value_at(&self, row: f64, col: f64) -> Option<f64> {
        if row < 0.0 || col < 0.0 {
            return None;
        }
        let (r, c) = (row as usize, col as usize);
        let (rows, cols) = self.data.dim();
        if r >= rows || c >= cols {
            return None;
        }
        let v = self.data[[r, c]];
        if v.is_nan() {
            return None;
        }
        if let Some(nd) = self.nodata {
            if v == nd {
                return None;
            }
        }
        Some(v as f64)
    }
}
