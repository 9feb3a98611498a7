//! Feature space construction for clustering

use ecotope_core::crs;
use ecotope_core::error::{Error, Result};
use ecotope_core::observation::Observation;

/// Ephemeral clustering feature: projected position plus scaled
/// altitude. `x`/`y` are the real LV95 coordinates; only `z` carries
/// the altitude weighting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    /// Source table row of the backing observation
    pub row: usize,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Feature vectors plus the rows that could not participate.
#[derive(Debug, Clone)]
pub struct FeatureSpace {
    pub vectors: Vec<FeatureVector>,
    /// Rows excluded from clustering: missing elevation or coordinates
    /// that failed reprojection. Reported, never silently dropped.
    pub skipped: Vec<usize>,
}

/// Project observations to (x, y, elevation * altitude_scale).
///
/// `altitude_scale` sets the weight of vertical versus horizontal
/// distance in the clustering metric; meters of altitude are not
/// ecologically equivalent to meters of horizontal separation, so the
/// knob is explicit rather than derived.
pub fn build_feature_space(
    observations: &[Observation],
    altitude_scale: f64,
) -> Result<FeatureSpace> {
    if !(altitude_scale.is_finite() && altitude_scale > 0.0) {
        return Err(Error::InvalidParameter {
            name: "altitude_scale",
            value: altitude_scale.to_string(),
            reason: "must be a positive finite number".into(),
        });
    }

    let mut vectors = Vec::with_capacity(observations.len());
    let mut skipped = Vec::new();

    for obs in observations {
        let Some(elevation) = obs.elevation else {
            skipped.push(obs.row);
            continue;
        };
        match crs::wgs84_to_lv95(obs.lon, obs.lat) {
            Ok((x, y)) => vectors.push(FeatureVector {
                row: obs.row,
                x,
                y,
                z: elevation * altitude_scale,
            }),
            Err(_) => skipped.push(obs.row),
        }
    }

    if vectors.is_empty() {
        return Err(Error::EmptyFeatureSet);
    }

    Ok(FeatureSpace { vectors, skipped })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn obs(row: usize, lon: f64, lat: f64, elevation: Option<f64>) -> Observation {
        Observation {
            row,
            lon,
            lat,
            elevation,
        }
    }

    #[test]
    fn test_scale_applies_to_z_only() {
        let observations = [obs(0, 7.4474, 46.9480, Some(540.0))];
        let space = build_feature_space(&observations, 100.0).unwrap();

        assert_eq!(space.vectors.len(), 1);
        let v = space.vectors[0];
        assert_relative_eq!(v.z, 54_000.0);
        // x/y are the unscaled LV95 projection
        assert!((2_599_000.0..2_601_000.0).contains(&v.x));
        assert!((1_199_000.0..1_200_500.0).contains(&v.y));
    }

    #[test]
    fn test_missing_elevation_reported_not_dropped_silently() {
        let observations = [
            obs(0, 7.4474, 46.9480, Some(540.0)),
            obs(1, 7.4480, 46.9485, None),
            obs(2, 7.4490, 46.9490, Some(550.0)),
        ];
        let space = build_feature_space(&observations, 1.0).unwrap();

        assert_eq!(space.vectors.len(), 2);
        assert_eq!(space.skipped, vec![1]);
    }

    #[test]
    fn test_every_vector_maps_to_one_observation() {
        let observations = [
            obs(3, 7.44, 46.94, Some(500.0)),
            obs(7, 7.45, 46.95, Some(510.0)),
        ];
        let space = build_feature_space(&observations, 1.0).unwrap();
        let rows: Vec<usize> = space.vectors.iter().map(|v| v.row).collect();
        assert_eq!(rows, vec![3, 7]);
    }

    #[test]
    fn test_no_feature_complete_rows_is_fatal() {
        let observations = [obs(0, 7.44, 46.94, None)];
        assert!(matches!(
            build_feature_space(&observations, 1.0),
            Err(Error::EmptyFeatureSet)
        ));
    }

    #[test]
    fn test_invalid_scale_fails_fast() {
        let observations = [obs(0, 7.44, 46.94, Some(500.0))];
        assert!(build_feature_space(&observations, 0.0).is_err());
        assert!(build_feature_space(&observations, -2.0).is_err());
        assert!(build_feature_space(&observations, f64::NAN).is_err());
    }
}
