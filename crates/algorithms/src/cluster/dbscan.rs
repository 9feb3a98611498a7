//! Density-based clustering (DBSCAN) over 3D feature vectors
//!
//! Textbook DBSCAN with Euclidean distance: a core point has at least
//! `min_samples` neighbors (itself included) within `eps`; a cluster is
//! the transitive closure of core neighborhoods plus border points;
//! everything else is noise. Neighbor queries use a uniform grid with
//! cell size `eps`, so only the 27 surrounding cells are scanned.
//!
//! Labels are assigned by scanning points in input order, which makes
//! both the partition and the label numbers deterministic for a fixed
//! input order. A border point reachable from two clusters joins the
//! cluster discovered first.

use crate::cluster::feature::FeatureVector;
use ecotope_core::error::{Error, Result};
use ecotope_core::observation::NOISE;
use std::collections::{HashMap, VecDeque};

const UNCLASSIFIED: i32 = -2;

/// Parameters for density clustering
#[derive(Debug, Clone)]
pub struct DbscanParams {
    /// Neighborhood radius in meters (feature-space units)
    pub eps: f64,
    /// Minimum neighborhood size for a core point, self included
    pub min_samples: usize,
}

impl Default for DbscanParams {
    fn default() -> Self {
        Self {
            eps: 500.0,
            min_samples: 10,
        }
    }
}

impl DbscanParams {
    fn validate(&self) -> Result<()> {
        if !(self.eps.is_finite() && self.eps > 0.0) {
            return Err(Error::InvalidParameter {
                name: "eps",
                value: self.eps.to_string(),
                reason: "must be a positive finite number".into(),
            });
        }
        if self.min_samples == 0 {
            return Err(Error::InvalidParameter {
                name: "min_samples",
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

/// Run DBSCAN over the feature vectors.
///
/// Returns one label per input vector, aligned by index: a cluster id
/// in `0..k`, or [`NOISE`] (-1).
pub fn dbscan(points: &[FeatureVector], params: &DbscanParams) -> Result<Vec<i32>> {
    params.validate()?;

    let grid = NeighborGrid::build(points, params.eps);
    let mut labels = vec![UNCLASSIFIED; points.len()];
    let mut next_cluster = 0i32;

    for i in 0..points.len() {
        if labels[i] != UNCLASSIFIED {
            continue;
        }
        let neighbors = grid.query(points, i);
        if neighbors.len() < params.min_samples {
            labels[i] = NOISE;
            continue;
        }

        let cluster = next_cluster;
        next_cluster += 1;
        labels[i] = cluster;

        let mut frontier: VecDeque<usize> = neighbors.into();
        while let Some(j) = frontier.pop_front() {
            if labels[j] == NOISE {
                // Border point: density-reachable but not core
                labels[j] = cluster;
            }
            if labels[j] != UNCLASSIFIED {
                continue;
            }
            labels[j] = cluster;

            let reach = grid.query(points, j);
            if reach.len() >= params.min_samples {
                frontier.extend(reach);
            }
        }
    }

    Ok(labels)
}

/// Number of clusters in a label vector.
pub fn cluster_count(labels: &[i32]) -> usize {
    labels
        .iter()
        .copied()
        .filter(|&l| l != NOISE)
        .max()
        .map(|m| (m + 1) as usize)
        .unwrap_or(0)
}

/// Uniform grid over 3D feature space with cell size `eps`.
struct NeighborGrid {
    cell: f64,
    cells: HashMap<(i64, i64, i64), Vec<usize>>,
}

impl NeighborGrid {
    fn build(points: &[FeatureVector], eps: f64) -> Self {
        let mut cells: HashMap<(i64, i64, i64), Vec<usize>> = HashMap::new();
        for (i, p) in points.iter().enumerate() {
            cells.entry(Self::key(p, eps)).or_default().push(i);
        }
        Self { cell: eps, cells }
    }

    fn key(p: &FeatureVector, cell: f64) -> (i64, i64, i64) {
        (
            (p.x / cell).floor() as i64,
            (p.y / cell).floor() as i64,
            (p.z / cell).floor() as i64,
        )
    }

    /// Indices of all points within `eps` of point `i`, itself included,
    /// in ascending index order.
    fn query(&self, points: &[FeatureVector], i: usize) -> Vec<usize> {
        let p = &points[i];
        let (kx, ky, kz) = Self::key(p, self.cell);
        let eps2 = self.cell * self.cell;

        let mut found = Vec::new();
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let Some(bucket) = self.cells.get(&(kx + dx, ky + dy, kz + dz)) else {
                        continue;
                    };
                    for &j in bucket {
                        let q = &points[j];
                        let d2 = (p.x - q.x).powi(2) + (p.y - q.y).powi(2) + (p.z - q.z).powi(2);
                        if d2 <= eps2 {
                            found.push(j);
                        }
                    }
                }
            }
        }
        found.sort_unstable();
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fv(row: usize, x: f64, y: f64, z: f64) -> FeatureVector {
        FeatureVector { row, x, y, z }
    }

    /// (0,0) and (10,0) are within eps=50 of each other and form a
    /// cluster; (500,500) is noise.
    #[test]
    fn test_pair_plus_outlier() {
        let points = [
            fv(0, 0.0, 0.0, 100.0),
            fv(1, 10.0, 0.0, 105.0),
            fv(2, 500.0, 500.0, 100.0),
        ];
        let params = DbscanParams {
            eps: 50.0,
            min_samples: 2,
        };
        let labels = dbscan(&points, &params).unwrap();
        assert_eq!(labels, vec![0, 0, NOISE]);
        assert_eq!(cluster_count(&labels), 1);
    }

    /// Scaling the altitude by 100 turns the 5 m elevation gap into a
    /// 500-unit feature distance, breaking the pair apart.
    #[test]
    fn test_altitude_participates_in_distance() {
        let points = [
            fv(0, 0.0, 0.0, 100.0 * 100.0),
            fv(1, 10.0, 0.0, 105.0 * 100.0),
            fv(2, 500.0, 500.0, 100.0 * 100.0),
        ];
        let params = DbscanParams {
            eps: 50.0,
            min_samples: 2,
        };
        let labels = dbscan(&points, &params).unwrap();
        assert_eq!(labels, vec![NOISE, NOISE, NOISE]);
        assert_eq!(cluster_count(&labels), 0);
    }

    #[test]
    fn test_border_point_joins_cluster() {
        // Three collinear points 40 apart with min_samples = 3: the
        // middle point is core (3 neighbors), the ends are border.
        let points = [
            fv(0, 0.0, 0.0, 0.0),
            fv(1, 40.0, 0.0, 0.0),
            fv(2, 80.0, 0.0, 0.0),
        ];
        let params = DbscanParams {
            eps: 50.0,
            min_samples: 3,
        };
        let labels = dbscan(&points, &params).unwrap();
        assert_eq!(labels, vec![0, 0, 0]);
    }

    #[test]
    fn test_two_separate_clusters() {
        let points = [
            fv(0, 0.0, 0.0, 0.0),
            fv(1, 10.0, 0.0, 0.0),
            fv(2, 10_000.0, 0.0, 0.0),
            fv(3, 10_010.0, 0.0, 0.0),
        ];
        let params = DbscanParams {
            eps: 50.0,
            min_samples: 2,
        };
        let labels = dbscan(&points, &params).unwrap();
        assert_eq!(labels, vec![0, 0, 1, 1]);
    }

    #[test]
    fn test_deterministic_partition() {
        // A blob around the origin plus scattered noise; repeated runs
        // must give the identical labeling.
        let mut points = Vec::new();
        for i in 0..30 {
            let a = i as f64 * 0.7;
            points.push(fv(i, a.sin() * 20.0, a.cos() * 20.0, 0.0));
        }
        for i in 0..5 {
            points.push(fv(30 + i, 5000.0 + 900.0 * i as f64, -3000.0, 0.0));
        }
        let params = DbscanParams {
            eps: 60.0,
            min_samples: 4,
        };

        let first = dbscan(&points, &params).unwrap();
        for _ in 0..5 {
            assert_eq!(dbscan(&points, &params).unwrap(), first);
        }
    }

    #[test]
    fn test_partition_stable_under_input_rotation() {
        // Same point set presented in a rotated order: label numbers may
        // differ, the grouping may not.
        let base = [
            fv(0, 0.0, 0.0, 0.0),
            fv(1, 10.0, 0.0, 0.0),
            fv(2, 20.0, 0.0, 0.0),
            fv(3, 9_000.0, 0.0, 0.0),
            fv(4, 9_010.0, 0.0, 0.0),
        ];
        let params = DbscanParams {
            eps: 50.0,
            min_samples: 2,
        };
        let labels_a = dbscan(&base, &params).unwrap();

        let rotated: Vec<FeatureVector> = (0..base.len())
            .map(|i| base[(i + 2) % base.len()])
            .collect();
        let labels_b = dbscan(&rotated, &params).unwrap();

        // Compare partitions via same-cluster relations on row ids.
        let by_row_a: std::collections::HashMap<usize, i32> = base
            .iter()
            .zip(&labels_a)
            .map(|(p, &l)| (p.row, l))
            .collect();
        let by_row_b: std::collections::HashMap<usize, i32> = rotated
            .iter()
            .zip(&labels_b)
            .map(|(p, &l)| (p.row, l))
            .collect();
        for i in 0..base.len() {
            for j in 0..base.len() {
                let same_a = by_row_a[&i] == by_row_a[&j] && by_row_a[&i] != NOISE;
                let same_b = by_row_b[&i] == by_row_b[&j] && by_row_b[&i] != NOISE;
                assert_eq!(same_a, same_b, "rows {i} and {j} disagree");
            }
        }
    }

    #[test]
    fn test_invalid_parameters_fail_fast() {
        let points = [fv(0, 0.0, 0.0, 0.0)];
        assert!(dbscan(
            &points,
            &DbscanParams {
                eps: 0.0,
                min_samples: 2
            }
        )
        .is_err());
        assert!(dbscan(
            &points,
            &DbscanParams {
                eps: 50.0,
                min_samples: 0
            }
        )
        .is_err());
    }

    #[test]
    fn test_empty_input() {
        let labels = dbscan(&[], &DbscanParams::default()).unwrap();
        assert!(labels.is_empty());
        assert_eq!(cluster_count(&labels), 0);
    }
}
