//! Observation data model

/// One geolocated biodiversity observation, as the pipeline sees it.
///
/// `row` indexes the backing [`crate::table::ObservationTable`]; the
/// table keeps identifier and metadata columns, this struct carries
/// only what the spatial stages consume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    /// Row index in the source table
    pub row: usize,
    /// Longitude, WGS84 degrees
    pub lon: f64,
    /// Latitude, WGS84 degrees
    pub lat: f64,
    /// Resolved elevation in meters, if any
    pub elevation: Option<f64>,
}

/// Cluster label for noise points, matching the density-clustering
/// convention.
pub const NOISE: i32 = -1;
