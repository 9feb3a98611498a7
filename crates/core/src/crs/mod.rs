//! Coordinate transforms between WGS84 and CH1903+ / LV95
//!
//! The pipeline works with exactly one coordinate reference pair:
//! geographic WGS84 (EPSG:4326) on the observation side and the metric
//! Swiss national grid CH1903+ / LV95 (EPSG:2056) on the raster and
//! clustering side. The pairing is a contract of the system, not a
//! per-call option.
//!
//! The forward transform is the swisstopo sexagesimal approximation
//! (accurate to about a meter over Switzerland). The inverse seeds with
//! the published approximate inverse polynomial and then refines against
//! the forward transform until the residual drops below 0.1 mm, so a
//! forward/inverse round trip is well inside 1 cm.

use crate::error::{Error, Result};

/// EPSG code of the metric projected system (CH1903+ / LV95)
pub const EPSG_LV95: u32 = 2056;
/// EPSG code of the geographic system (WGS84)
pub const EPSG_WGS84: u32 = 4326;

/// Meters of easting per degree of longitude near the projection origin
const M_PER_DEG_LON: f64 = 211_455.93 * 0.36;
/// Meters of northing per degree of latitude near the projection origin
const M_PER_DEG_LAT: f64 = 308_807.95 * 0.36;

/// Residual tolerance for the inverse refinement, in meters
const INVERSE_TOLERANCE_M: f64 = 1e-4;

/// Project WGS84 (lon, lat) degrees to LV95 (E, N) meters.
pub fn wgs84_to_lv95(lon: f64, lat: f64) -> Result<(f64, f64)> {
    if !lon.is_finite() || !lat.is_finite() {
        return Err(Error::ReprojectionFailure {
            lon,
            lat,
            reason: "non-finite coordinate".into(),
        });
    }

    let lat_aux = (lat * 3600.0 - 169_028.66) / 10_000.0;
    let lon_aux = (lon * 3600.0 - 26_782.5) / 10_000.0;

    let e = 2_600_072.37
        + 211_455.93 * lon_aux
        - 10_938.51 * lon_aux * lat_aux
        - 0.36 * lon_aux * lat_aux * lat_aux
        - 44.54 * lon_aux.powi(3);
    let n = 1_200_147.07
        + 308_807.95 * lat_aux
        + 3_745.25 * lon_aux * lon_aux
        + 76.63 * lat_aux * lat_aux
        - 194.56 * lon_aux * lon_aux * lat_aux
        + 119.79 * lat_aux.powi(3);

    Ok((e, n))
}

/// Unproject LV95 (E, N) meters back to WGS84 (lon, lat) degrees.
pub fn lv95_to_wgs84(e: f64, n: f64) -> Result<(f64, f64)> {
    if !e.is_finite() || !n.is_finite() {
        return Err(Error::ReprojectionFailure {
            lon: e,
            lat: n,
            reason: "non-finite coordinate".into(),
        });
    }

    // Approximate inverse polynomial (swisstopo), then fixed-point
    // refinement against the forward transform. The local scale factors
    // vary by under 15% over the valid area, so convergence is fast.
    let (mut lon, mut lat) = approx_inverse(e, n);

    for _ in 0..8 {
        let (e1, n1) = wgs84_to_lv95(lon, lat)?;
        let de = e - e1;
        let dn = n - n1;
        if de.hypot(dn) < INVERSE_TOLERANCE_M {
            break;
        }
        lon += de / M_PER_DEG_LON;
        lat += dn / M_PER_DEG_LAT;
    }

    Ok((lon, lat))
}

fn approx_inverse(e: f64, n: f64) -> (f64, f64) {
    let y = (e - 2_600_000.0) / 1_000_000.0;
    let x = (n - 1_200_000.0) / 1_000_000.0;

    let lon = 2.677_909_4 + 4.728_982 * y + 0.791_484 * y * x + 0.1306 * y * x * x
        - 0.0436 * y.powi(3);
    let lat = 16.902_389_2 + 3.238_272 * x
        - 0.270_978 * y * y
        - 0.002_528 * x * x
        - 0.0447 * y * y * x
        - 0.0140 * x.powi(3);

    // The polynomials yield units of 10^4 seconds of arc
    (lon * 100.0 / 36.0, lat * 100.0 / 36.0)
}
