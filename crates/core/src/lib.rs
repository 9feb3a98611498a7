//! # ecotope core
//!
//! Core types and I/O for the ecotope pipeline, which turns geolocated
//! biodiversity observations into altitude-aware ecosystem clusters.
//!
//! This crate provides:
//! - `crs`: the fixed WGS84 <-> CH1903+/LV95 transform pair
//! - `TileIndex`: spatial index over a directory of elevation tiles
//! - `RasterHandle` / `RasterCache`: bounded pool of open tiles
//! - `ObservationTable`: header-preserving CSV observation tables

pub mod cache;
pub mod crs;
pub mod error;
pub mod io;
pub mod observation;
pub mod raster;
pub mod table;
pub mod tile;

pub use cache::{RasterCache, DEFAULT_CACHE_CAPACITY};
pub use error::{Error, Result};
pub use observation::{Observation, NOISE};
pub use raster::{GeoTransform, RasterHandle, SamplingMethod};
pub use table::ObservationTable;
pub use tile::{TileBounds, TileDescriptor, TileIndex};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::cache::RasterCache;
    pub use crate::error::{Error, Result};
    pub use crate::observation::{Observation, NOISE};
    pub use crate::raster::{GeoTransform, RasterHandle, SamplingMethod};
    pub use crate::table::ObservationTable;
    pub use crate::tile::{TileDescriptor, TileIndex};
}
