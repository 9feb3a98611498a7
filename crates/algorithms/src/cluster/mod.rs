//! Joint spatial/altitudinal clustering of observations

pub mod dbscan;
pub mod feature;

pub use dbscan::{cluster_count, dbscan, DbscanParams};
pub use feature::{build_feature_space, FeatureSpace, FeatureVector};

use ecotope_core::error::Result;
use ecotope_core::observation::Observation;
use tracing::info;

/// Parameters for the full clustering stage
#[derive(Debug, Clone)]
pub struct ClusterParams {
    /// DBSCAN neighborhood radius, meters
    pub eps: f64,
    /// DBSCAN minimum neighborhood size
    pub min_samples: usize,
    /// Weight of the altitude dimension in the distance metric
    pub altitude_scale: f64,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            eps: 500.0,
            min_samples: 10,
            altitude_scale: 1.0,
        }
    }
}

/// Result of clustering a set of observations
#[derive(Debug, Clone)]
pub struct ClusterOutcome {
    /// Feature vectors that participated, with their source rows
    pub vectors: Vec<FeatureVector>,
    /// Cluster labels aligned with `vectors` (-1 = noise)
    pub labels: Vec<i32>,
    /// Rows excluded for lacking a resolved elevation
    pub skipped: Vec<usize>,
    /// Number of clusters found
    pub n_clusters: usize,
}

/// Build the feature space and run DBSCAN over it.
pub fn cluster_observations(
    observations: &[Observation],
    params: &ClusterParams,
) -> Result<ClusterOutcome> {
    let space = build_feature_space(observations, params.altitude_scale)?;
    let labels = dbscan(
        &space.vectors,
        &DbscanParams {
            eps: params.eps,
            min_samples: params.min_samples,
        },
    )?;
    let n_clusters = cluster_count(&labels);

    info!(
        points = space.vectors.len(),
        skipped = space.skipped.len(),
        clusters = n_clusters,
        "clustering done"
    );

    Ok(ClusterOutcome {
        vectors: space.vectors,
        labels,
        skipped: space.skipped,
        n_clusters,
    })
}
