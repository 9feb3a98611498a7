//! GeoJSON export of synthesized clusters

use crate::geometry::ClusterFeature;
use ecotope_core::crs::{EPSG_LV95, EPSG_WGS84};
use ecotope_core::error::Result;
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, JsonValue};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

/// Which of the two polygon representations to export
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputCrs {
    /// Metric projected system, EPSG:2056
    Lv95,
    /// Geographic system, EPSG:4326
    Wgs84,
}

impl OutputCrs {
    fn epsg(self) -> u32 {
        match self {
            OutputCrs::Lv95 => EPSG_LV95,
            OutputCrs::Wgs84 => EPSG_WGS84,
        }
    }

    fn layer_name(self) -> String {
        format!("ecosystems_{}", self.epsg())
    }
}

/// Build a FeatureCollection with one feature per cluster.
///
/// Foreign members carry the layer name and a named CRS, so GIS tools
/// pick up the projected variant correctly.
pub fn to_feature_collection(features: &[ClusterFeature], crs: OutputCrs) -> FeatureCollection {
    let features = features
        .iter()
        .map(|f| {
            let polygon = match crs {
                OutputCrs::Lv95 => &f.polygon_lv95,
                OutputCrs::Wgs84 => &f.polygon_wgs84,
            };

            let mut properties = JsonObject::new();
            properties.insert("cluster_id".into(), JsonValue::from(f.cluster_id));
            properties.insert("n_points".into(), JsonValue::from(f.n_points));
            properties.insert("alt_mean".into(), JsonValue::from(f.alt_mean));
            if !f.taxa.is_empty() {
                let counts: JsonObject = f
                    .taxa
                    .iter()
                    .map(|(k, &v)| (k.clone(), JsonValue::from(v)))
                    .collect();
                properties.insert("taxon_counts".into(), JsonValue::from(counts));
            }
            if !f.years.is_empty() {
                let counts: JsonObject = f
                    .years
                    .iter()
                    .map(|(k, &v)| (k.clone(), JsonValue::from(v)))
                    .collect();
                properties.insert("year_counts".into(), JsonValue::from(counts));
            }

            Feature {
                bbox: None,
                geometry: Some(Geometry::new(geojson::Value::from(polygon))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    let mut foreign = JsonObject::new();
    foreign.insert("name".into(), JsonValue::from(crs.layer_name()));
    foreign.insert(
        "crs".into(),
        serde_json::json!({
            "type": "name",
            "properties": { "name": format!("EPSG:{}", crs.epsg()) }
        }),
    );

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: Some(foreign),
    }
}

/// Write a FeatureCollection atomically: temporary sibling first, then
/// rename, so a failure leaves no partial file.
pub fn write_geojson(path: impl AsRef<Path>, collection: &FeatureCollection) -> Result<()> {
    let path = path.as_ref();
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = std::path::PathBuf::from(tmp_name);

    {
        let writer = BufWriter::new(File::create(&tmp)?);
        serde_json::to_writer(writer, collection)
            .map_err(|e| ecotope_core::Error::Other(format!("GeoJSON serialization: {e}")))?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{synthesize, ClusterMember, GeometryParams};
    use std::collections::BTreeMap;

    fn sample_features() -> Vec<ClusterFeature> {
        let mut clusters = BTreeMap::new();
        clusters.insert(
            0,
            vec![ClusterMember {
                e: 2_600_000.0,
                n: 1_200_000.0,
                elevation: 540.0,
                taxon: Some("Picea abies".into()),
                year: Some("2021".into()),
            }],
        );
        synthesize(&clusters, &GeometryParams::default()).unwrap()
    }

    #[test]
    fn test_feature_collection_attributes() {
        let fc = to_feature_collection(&sample_features(), OutputCrs::Lv95);

        assert_eq!(fc.features.len(), 1);
        let props = fc.features[0].properties.as_ref().unwrap();
        assert_eq!(props["cluster_id"], JsonValue::from(0));
        assert_eq!(props["n_points"], JsonValue::from(1usize));
        assert_eq!(props["taxon_counts"]["Picea abies"], JsonValue::from(1usize));

        let foreign = fc.foreign_members.as_ref().unwrap();
        assert_eq!(foreign["crs"]["properties"]["name"], "EPSG:2056");
        assert_eq!(foreign["name"], "ecosystems_2056");
    }

    #[test]
    fn test_wgs84_variant_uses_geographic_polygon() {
        let fc = to_feature_collection(&sample_features(), OutputCrs::Wgs84);
        let geom = fc.features[0].geometry.as_ref().unwrap();
        if let geojson::Value::MultiPolygon(polys) = &geom.value {
            let lon = polys[0][0][0][0];
            assert!((5.0..11.0).contains(&lon), "lon {lon}");
        } else {
            panic!("expected a MultiPolygon geometry");
        }
    }

    #[test]
    fn test_write_is_atomic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.geojson");

        let fc = to_feature_collection(&sample_features(), OutputCrs::Lv95);
        write_geojson(&path, &fc).unwrap();

        assert!(path.exists());
        assert!(!dir.path().join("out.geojson.tmp").exists());

        let text = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["type"], "FeatureCollection");
    }
}
