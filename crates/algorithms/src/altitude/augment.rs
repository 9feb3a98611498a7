//! Parallel altitude augmentation over a full observation table

use crate::altitude::AltitudeSampler;
use ecotope_core::error::{Error, Result};
use ecotope_core::table::ObservationTable;
use rayon::prelude::*;
use tracing::{debug, info};

/// Parameters for the augmentation stage
#[derive(Debug, Clone)]
pub struct AugmentParams {
    /// Worker pool size; 0 uses the rayon default (one per core).
    /// Keep within a small multiple of the raster cache capacity, or
    /// the workers thrash the cache with evict/reopen cycles.
    pub workers: usize,
    /// Name of the elevation column to fill (appended when absent)
    pub elevation_column: String,
}

impl Default for AugmentParams {
    fn default() -> Self {
        Self {
            workers: 0,
            elevation_column: "elevation_m".into(),
        }
    }
}

/// Outcome of an augmentation run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AugmentReport {
    /// Input (and output) row count
    pub total: usize,
    /// Rows that received an elevation value
    pub resolved: usize,
    /// Rows downgraded to an empty elevation (uncovered point,
    /// no-data cell, unreadable tile, bad coordinates)
    pub unresolved: usize,
}

/// Fill the elevation column of `table` by sampling the tile mosaic,
/// fanning the per-row lookups over a bounded worker pool.
///
/// Output row count and order always match the input: results are
/// reassembled by row index, not completion time. Row-level failures
/// are downgraded to empty cells and counted; only infrastructure
/// failures abort the stage.
pub fn augment_elevations(
    table: &mut ObservationTable,
    sampler: &AltitudeSampler,
    lon_col: usize,
    lat_col: usize,
    params: &AugmentParams,
) -> Result<AugmentReport> {
    let elev_col = table.ensure_column(&params.elevation_column);
    let total = table.n_rows();

    let coords: Vec<Option<(f64, f64)>> = (0..total)
        .map(|row| {
            let lon = table.parse_f64(row, lon_col)?;
            let lat = table.parse_f64(row, lat_col)?;
            Some((lon, lat))
        })
        .collect();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(params.workers)
        .build()
        .map_err(|e| Error::Other(format!("cannot build worker pool: {e}")))?;

    // Indexed parallel map: the collected Vec lines up with the input
    // rows regardless of which worker finished first.
    let sampled: Vec<Result<Option<f64>>> = pool.install(|| {
        coords
            .par_iter()
            .map(|coord| match coord {
                Some((lon, lat)) => sampler.sample(*lon, *lat),
                None => Ok(None),
            })
            .collect()
    });

    let mut resolved = 0usize;
    let mut unresolved = 0usize;
    for (row, outcome) in sampled.into_iter().enumerate() {
        let elevation = match outcome {
            Ok(v) => v,
            Err(e) if e.is_row_recoverable() => {
                debug!(row, error = %e, "elevation downgraded to missing");
                None
            }
            Err(e) => return Err(e),
        };
        match elevation {
            Some(v) => {
                table.set_value(row, elev_col, format!("{v:.3}"));
                resolved += 1;
            }
            None => {
                table.set_value(row, elev_col, String::new());
                unresolved += 1;
            }
        }
    }

    info!(total, resolved, unresolved, "altitude augmentation done");
    Ok(AugmentReport {
        total,
        resolved,
        unresolved,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::altitude::tests::write_km_tile;
    use ecotope_core::raster::SamplingMethod;

    const BERN: (&str, &str) = ("7.4474", "46.9480");

    fn table_with_rows(rows: Vec<Vec<String>>) -> ObservationTable {
        ObservationTable::from_parts(
            vec!["id".into(), "longitude".into(), "latitude".into()],
            rows,
        )
    }

    fn row(id: &str, lon: &str, lat: &str) -> Vec<String> {
        vec![id.into(), lon.into(), lat.into()]
    }

    #[test]
    fn test_rows_and_order_preserved() {
        let dir = tempfile::tempdir().unwrap();
        write_km_tile(dir.path(), 2600, 1199, 540.0);
        let sampler =
            AltitudeSampler::from_tile_dir(dir.path(), 4, SamplingMethod::Nearest).unwrap();

        let mut table = table_with_rows(vec![
            row("1", BERN.0, BERN.1),
            row("2", "9.9999", "47.9999"), // outside the mosaic
            row("3", BERN.0, BERN.1),
        ]);

        let report =
            augment_elevations(&mut table, &sampler, 1, 2, &AugmentParams::default()).unwrap();

        assert_eq!(report.total, 3);
        assert_eq!(report.resolved, 2);
        assert_eq!(report.unresolved, 1);
        assert_eq!(table.n_rows(), 3);

        let col = table.column("elevation_m").unwrap();
        assert_eq!(table.value(0, col), "540.000");
        assert_eq!(table.value(1, col), "");
        assert_eq!(table.value(2, col), "540.000");
        // Identifier order untouched
        assert_eq!(table.value(1, 0), "2");
    }

    #[test]
    fn test_unparseable_coordinates_downgrade() {
        let dir = tempfile::tempdir().unwrap();
        write_km_tile(dir.path(), 2600, 1199, 540.0);
        let sampler =
            AltitudeSampler::from_tile_dir(dir.path(), 4, SamplingMethod::Nearest).unwrap();

        let mut table = table_with_rows(vec![row("1", "not-a-number", BERN.1)]);
        let report =
            augment_elevations(&mut table, &sampler, 1, 2, &AugmentParams::default()).unwrap();

        assert_eq!(report.unresolved, 1);
        assert_eq!(report.resolved, 0);
    }

    #[test]
    fn test_unreadable_tile_downgrades_row() {
        let dir = tempfile::tempdir().unwrap();
        write_km_tile(dir.path(), 2600, 1199, 540.0);
        let sampler =
            AltitudeSampler::from_tile_dir(dir.path(), 4, SamplingMethod::Nearest).unwrap();

        // Corrupt the tile after indexing; the lazy open at sample time
        // fails and the row downgrades instead of aborting the stage.
        std::fs::write(dir.path().join("alti_2600-1199.tif"), b"not a tiff").unwrap();

        let mut table = table_with_rows(vec![row("1", BERN.0, BERN.1)]);
        let report =
            augment_elevations(&mut table, &sampler, 1, 2, &AugmentParams::default()).unwrap();

        assert_eq!(report.unresolved, 1);
        assert_eq!(report.resolved, 0);
        let col = table.column("elevation_m").unwrap();
        assert_eq!(table.value(0, col), "");
    }

    #[test]
    fn test_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        write_km_tile(dir.path(), 2600, 1199, 540.0);
        let sampler =
            AltitudeSampler::from_tile_dir(dir.path(), 4, SamplingMethod::Nearest).unwrap();

        let mut table = table_with_rows(vec![row("1", BERN.0, BERN.1)]);
        augment_elevations(&mut table, &sampler, 1, 2, &AugmentParams::default()).unwrap();
        let first = table.clone();
        augment_elevations(&mut table, &sampler, 1, 2, &AugmentParams::default()).unwrap();

        let col = table.column("elevation_m").unwrap();
        assert_eq!(table.value(0, col), first.value(0, col));
        assert_eq!(table.headers(), first.headers());
    }

    #[test]
    fn test_bounded_workers() {
        let dir = tempfile::tempdir().unwrap();
        write_km_tile(dir.path(), 2600, 1199, 540.0);
        let sampler =
            AltitudeSampler::from_tile_dir(dir.path(), 2, SamplingMethod::Nearest).unwrap();

        let rows: Vec<_> = (0..64).map(|i| row(&i.to_string(), BERN.0, BERN.1)).collect();
        let mut table = table_with_rows(rows);

        let params = AugmentParams {
            workers: 4,
            ..Default::default()
        };
        let report = augment_elevations(&mut table, &sampler, 1, 2, &params).unwrap();
        assert_eq!(report.resolved, 64);
    }
}
