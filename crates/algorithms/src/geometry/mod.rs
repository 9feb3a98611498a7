//! Cluster geometry synthesis
//!
//! One polygon per non-noise cluster: the union of fixed-radius disks
//! centered at the members' real projected positions (never the
//! altitude-scaled feature points). Sub-clusters that altitude keeps
//! apart but that share a cluster id stay together as one multi-part
//! polygon.

mod export;

pub use export::{to_feature_collection, write_geojson, OutputCrs};

use crate::cluster::FeatureVector;
use ecotope_core::crs;
use ecotope_core::error::{Error, Result};
use ecotope_core::observation::NOISE;
use geo::{BooleanOps, MapCoords, Simplify};
use geo_types::{coord, LineString, MultiPolygon, Polygon};
use std::collections::BTreeMap;
use std::f64::consts::PI;
use tracing::debug;

/// Parameters for geometry synthesis
#[derive(Debug, Clone)]
pub struct GeometryParams {
    /// Disk radius in meters; conventionally the clustering `eps`
    pub radius: f64,
    /// Segments per disk polygon
    pub segments: usize,
    /// Douglas-Peucker tolerance as a fraction of the radius
    pub simplify_factor: f64,
}

impl Default for GeometryParams {
    fn default() -> Self {
        Self {
            radius: 500.0,
            segments: 32,
            simplify_factor: 0.2,
        }
    }
}

/// One observation as geometry input: real LV95 position plus the
/// metadata that feeds the summary attributes.
#[derive(Debug, Clone)]
pub struct ClusterMember {
    pub e: f64,
    pub n: f64,
    /// Real (unscaled) elevation, meters
    pub elevation: f64,
    pub taxon: Option<String>,
    pub year: Option<String>,
}

/// Synthesized cluster: dual-CRS polygon plus summary attributes.
#[derive(Debug, Clone)]
pub struct ClusterFeature {
    pub cluster_id: i32,
    pub n_points: usize,
    /// Mean member elevation, meters
    pub alt_mean: f64,
    /// Distinct-value counts over the taxon column
    pub taxa: BTreeMap<String, usize>,
    /// Distinct-value counts over the year column
    pub years: BTreeMap<String, usize>,
    /// Polygon in the metric projected system (EPSG:2056)
    pub polygon_lv95: MultiPolygon<f64>,
    /// The same polygon reprojected to WGS84 (EPSG:4326)
    pub polygon_wgs84: MultiPolygon<f64>,
}

/// Group clustered feature vectors into geometry inputs, keyed by
/// cluster id. Noise is dropped here; `meta` supplies the real
/// elevation and metadata for a source row.
pub fn collect_members(
    vectors: &[FeatureVector],
    labels: &[i32],
    meta: impl Fn(usize) -> (f64, Option<String>, Option<String>),
) -> BTreeMap<i32, Vec<ClusterMember>> {
    let mut by_cluster: BTreeMap<i32, Vec<ClusterMember>> = BTreeMap::new();
    for (vector, &label) in vectors.iter().zip(labels) {
        if label == NOISE {
            continue;
        }
        let (elevation, taxon, year) = meta(vector.row);
        by_cluster.entry(label).or_default().push(ClusterMember {
            e: vector.x,
            n: vector.y,
            elevation,
            taxon,
            year,
        });
    }
    by_cluster
}

/// Build one [`ClusterFeature`] per cluster, in ascending id order.
pub fn synthesize(
    members_by_cluster: &BTreeMap<i32, Vec<ClusterMember>>,
    params: &GeometryParams,
) -> Result<Vec<ClusterFeature>> {
    if !(params.radius.is_finite() && params.radius > 0.0) {
        return Err(Error::InvalidParameter {
            name: "radius",
            value: params.radius.to_string(),
            reason: "must be a positive finite number".into(),
        });
    }

    let mut features = Vec::with_capacity(members_by_cluster.len());
    for (&cluster_id, members) in members_by_cluster {
        if cluster_id == NOISE || members.is_empty() {
            continue;
        }

        let disks: Vec<MultiPolygon<f64>> = members
            .iter()
            .map(|m| MultiPolygon::new(vec![disk(m.e, m.n, params.radius, params.segments)]))
            .collect();
        let merged = union_all(disks);
        let tolerance = params.radius * params.simplify_factor;
        let polygon_lv95 = merged.simplify(&tolerance);
        let polygon_wgs84 = reproject_to_wgs84(&polygon_lv95)?;

        let mut taxa = BTreeMap::new();
        let mut years = BTreeMap::new();
        let mut alt_sum = 0.0;
        for m in members {
            alt_sum += m.elevation;
            if let Some(t) = &m.taxon {
                *taxa.entry(t.clone()).or_insert(0) += 1;
            }
            if let Some(y) = &m.year {
                *years.entry(y.clone()).or_insert(0) += 1;
            }
        }

        debug!(
            cluster_id,
            members = members.len(),
            parts = polygon_lv95.0.len(),
            "cluster geometry synthesized"
        );
        features.push(ClusterFeature {
            cluster_id,
            n_points: members.len(),
            alt_mean: alt_sum / members.len() as f64,
            taxa,
            years,
            polygon_lv95,
            polygon_wgs84,
        });
    }

    Ok(features)
}

/// Circle approximation around a point, counter-clockwise closed ring.
fn disk(cx: f64, cy: f64, radius: f64, segments: usize) -> Polygon<f64> {
    let n = segments.max(8);
    let mut coords = Vec::with_capacity(n + 1);
    for i in 0..n {
        let angle = 2.0 * PI * i as f64 / n as f64;
        coords.push((cx + radius * angle.cos(), cy + radius * angle.sin()));
    }
    coords.push(coords[0]);
    Polygon::new(LineString::from(coords), vec![])
}

/// Balanced pairwise union; log-depth keeps intermediate geometries
/// small compared to a left fold.
fn union_all(mut parts: Vec<MultiPolygon<f64>>) -> MultiPolygon<f64> {
    while parts.len() > 1 {
        parts = parts
            .chunks(2)
            .map(|pair| match pair {
                [a, b] => a.union(b),
                [a] => a.clone(),
                _ => MultiPolygon::new(vec![]),
            })
            .collect();
    }
    parts.pop().unwrap_or_else(|| MultiPolygon::new(vec![]))
}

fn reproject_to_wgs84(mp: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>> {
    mp.try_map_coords(|c| {
        let (lon, lat) = crs::lv95_to_wgs84(c.x, c.y)?;
        Ok(coord! { x: lon, y: lat })
    })
}
