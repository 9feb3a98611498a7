//! Altitude resolution against the elevation tile mosaic

mod augment;

pub use augment::{augment_elevations, AugmentParams, AugmentReport};

use ecotope_core::cache::RasterCache;
use ecotope_core::crs;
use ecotope_core::error::Result;
use ecotope_core::raster::SamplingMethod;
use ecotope_core::tile::TileIndex;
use std::path::Path;

/// Resolves the elevation of a single WGS84 point from the tile mosaic.
///
/// Owns the tile index and the handle cache; cheap to share by
/// reference across augmentation workers.
#[derive(Debug)]
pub struct AltitudeSampler {
    index: TileIndex,
    cache: RasterCache,
    method: SamplingMethod,
}

impl AltitudeSampler {
    pub fn new(index: TileIndex, cache: RasterCache, method: SamplingMethod) -> Self {
        Self {
            index,
            cache,
            method,
        }
    }

    /// Build a sampler for a tile directory.
    pub fn from_tile_dir(
        dir: impl AsRef<Path>,
        cache_capacity: usize,
        method: SamplingMethod,
    ) -> Result<Self> {
        let index = TileIndex::from_dir(dir)?;
        Ok(Self::new(index, RasterCache::new(cache_capacity), method))
    }

    pub fn index(&self) -> &TileIndex {
        &self.index
    }

    /// Resolve the elevation under a WGS84 point.
    ///
    /// `Ok(None)` means the point is valid but has no elevation: it
    /// falls outside the mosaic or on a no-data cell. Errors are
    /// reprojection failures and unreadable tiles; the augmenter
    /// downgrades both to missing values per row.
    pub fn sample(&self, lon: f64, lat: f64) -> Result<Option<f64>> {
        let (e, n) = crs::wgs84_to_lv95(lon, lat)?;

        let Some(tile) = self.index.resolve(e, n) else {
            return Ok(None);
        };

        let handle = self.cache.get_handle(&tile.path)?;
        Ok(handle.sample(e, n, self.method))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecotope_core::io::write_geotiff;
    use ecotope_core::raster::GeoTransform;
    use ndarray::Array2;
    use std::path::Path;

    /// One 1 km tile at (e_km, n_km) with 10 m pixels, every pixel set
    /// to `value`.
    pub(crate) fn write_km_tile(dir: &Path, e_km: u64, n_km: u64, value: f32) {
        let name = format!("alti_{e_km}-{n_km}.tif");
        let grid = Array2::from_elem((100, 100), value);
        let gt = GeoTransform::new(
            (e_km * 1000) as f64,
            (n_km * 1000 + 1000) as f64,
            10.0,
            -10.0,
        );
        write_geotiff(dir.join(name), &grid, &gt).unwrap();
    }

    // Bern (7.4474 E, 46.9480 N) projects to roughly E 2600090 / N 1199670,
    // i.e. the km tile 2600-1199.
    const BERN_LON: f64 = 7.4474;
    const BERN_LAT: f64 = 46.9480;

    #[test]
    fn test_sample_inside_mosaic() {
        let dir = tempfile::tempdir().unwrap();
        write_km_tile(dir.path(), 2600, 1199, 540.0);

        let sampler =
            AltitudeSampler::from_tile_dir(dir.path(), 4, SamplingMethod::Nearest).unwrap();
        let elev = sampler.sample(BERN_LON, BERN_LAT).unwrap();
        assert_eq!(elev, Some(540.0));
    }

    #[test]
    fn test_sample_outside_mosaic_is_none() {
        let dir = tempfile::tempdir().unwrap();
        write_km_tile(dir.path(), 2700, 1250, 1000.0);

        let sampler =
            AltitudeSampler::from_tile_dir(dir.path(), 4, SamplingMethod::Nearest).unwrap();
        assert_eq!(sampler.sample(BERN_LON, BERN_LAT).unwrap(), None);
    }

    #[test]
    fn test_non_finite_coordinate_is_error() {
        let dir = tempfile::tempdir().unwrap();
        write_km_tile(dir.path(), 2600, 1199, 540.0);

        let sampler =
            AltitudeSampler::from_tile_dir(dir.path(), 4, SamplingMethod::Nearest).unwrap();
        assert!(sampler.sample(f64::NAN, BERN_LAT).is_err());
    }

    #[test]
    fn test_empty_tile_dir_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        assert!(AltitudeSampler::from_tile_dir(dir.path(), 4, SamplingMethod::Nearest).is_err());
    }
}
