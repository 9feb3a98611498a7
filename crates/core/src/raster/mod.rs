//! Raster primitives: georeferencing and open tile handles

mod geotransform;
mod handle;

pub use geotransform::GeoTransform;
pub use handle::{RasterHandle, SamplingMethod};
