//! # ecotope algorithms
//!
//! The spatial stages of the ecotope pipeline:
//!
//! - **altitude**: per-observation elevation lookup against the tile
//!   mosaic, with a bounded parallel augmenter over whole tables
//! - **cluster**: feature-space construction and density clustering
//!   in (x, y, scaled altitude)
//! - **geometry**: per-cluster disk-union polygons in both coordinate
//!   systems, plus GeoJSON export

pub mod altitude;
pub mod cluster;
pub mod geometry;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::altitude::{augment_elevations, AltitudeSampler, AugmentParams, AugmentReport};
    pub use crate::cluster::{
        cluster_observations, ClusterOutcome, ClusterParams, DbscanParams, FeatureVector,
    };
    pub use crate::geometry::{
        collect_members, synthesize, to_feature_collection, write_geojson, ClusterFeature,
        GeometryParams, OutputCrs,
    };
    pub use ecotope_core::prelude::*;
}
