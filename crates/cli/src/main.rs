//! ecotope CLI - altitude-aware ecosystem clustering of observations

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use ecotope_algorithms::altitude::{augment_elevations, AltitudeSampler, AugmentParams};
use ecotope_algorithms::cluster::{cluster_observations, ClusterParams};
use ecotope_algorithms::geometry::{
    collect_members, synthesize, to_feature_collection, write_geojson, GeometryParams, OutputCrs,
};
use ecotope_core::cache::DEFAULT_CACHE_CAPACITY;
use ecotope_core::observation::NOISE;
use ecotope_core::raster::SamplingMethod;
use ecotope_core::table::ObservationTable;
use ecotope_core::tile::TileIndex;

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "ecotope")]
#[command(author, version, about = "Altitude-aware ecosystem clustering", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a tile directory
    Tiles {
        /// Directory of elevation tiles
        #[arg(long)]
        tile_dir: PathBuf,
    },
    /// Resolve an elevation for every observation from the tile mosaic
    Augment {
        /// Input observations CSV
        #[arg(long = "in")]
        input: PathBuf,
        /// Output CSV (input columns + elevation)
        #[arg(long = "out")]
        output: PathBuf,
        /// Directory of elevation tiles
        #[arg(long)]
        tile_dir: PathBuf,
        /// Longitude column name (default: auto-detect longitude/lon)
        #[arg(long)]
        lon_field: Option<String>,
        /// Latitude column name (default: auto-detect latitude/lat)
        #[arg(long)]
        lat_field: Option<String>,
        /// Elevation column to fill
        #[arg(long, default_value = "elevation_m")]
        elev_field: String,
        /// Worker pool size (0 = one per core)
        #[arg(long, default_value_t = 0)]
        workers: usize,
        /// Max simultaneously open tiles
        #[arg(long, default_value_t = DEFAULT_CACHE_CAPACITY)]
        cache_size: usize,
        /// Bilinear sampling instead of nearest pixel
        #[arg(long)]
        bilinear: bool,
    },
    /// Cluster observations and synthesize ecosystem polygons
    Cluster {
        /// Input observations CSV (with elevation column)
        #[arg(long = "in")]
        input: PathBuf,
        /// Output CSV (feature-complete rows + cluster_id)
        #[arg(long = "out-csv")]
        out_csv: PathBuf,
        /// Output GeoJSON in EPSG:2056
        #[arg(long = "out-geojson-2056")]
        out_geojson_2056: PathBuf,
        /// Output GeoJSON in EPSG:4326
        #[arg(long = "out-geojson-4326")]
        out_geojson_4326: PathBuf,
        /// DBSCAN neighborhood radius, meters
        #[arg(long, default_value_t = 500.0)]
        eps: f64,
        /// DBSCAN minimum neighborhood size
        #[arg(long, default_value_t = 10)]
        min_samples: usize,
        /// Altitude weight in the clustering metric
        #[arg(long, default_value_t = 1.0)]
        alt_scale: f64,
        /// Longitude column name (default: auto-detect longitude/lon)
        #[arg(long)]
        lon_field: Option<String>,
        /// Latitude column name (default: auto-detect latitude/lat)
        #[arg(long)]
        lat_field: Option<String>,
        /// Elevation column name
        #[arg(long, default_value = "elevation_m")]
        elev_field: String,
        /// Taxon column for per-cluster counts
        #[arg(long)]
        taxon_field: Option<String>,
        /// Year column for per-cluster counts
        #[arg(long)]
        year_field: Option<String>,
    },
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Tiles { tile_dir } => run_tiles(&tile_dir),
        Commands::Augment {
            input,
            output,
            tile_dir,
            lon_field,
            lat_field,
            elev_field,
            workers,
            cache_size,
            bilinear,
        } => run_augment(
            &input,
            &output,
            &tile_dir,
            lon_field.as_deref(),
            lat_field.as_deref(),
            elev_field,
            workers,
            cache_size,
            bilinear,
        ),
        Commands::Cluster {
            input,
            out_csv,
            out_geojson_2056,
            out_geojson_4326,
            eps,
            min_samples,
            alt_scale,
            lon_field,
            lat_field,
            elev_field,
            taxon_field,
            year_field,
        } => run_cluster(ClusterArgs {
            input,
            out_csv,
            out_geojson_2056,
            out_geojson_4326,
            eps,
            min_samples,
            alt_scale,
            lon_field,
            lat_field,
            elev_field,
            taxon_field,
            year_field,
        }),
    }
}

// ─── Tiles ──────────────────────────────────────────────────────────────

fn run_tiles(tile_dir: &PathBuf) -> Result<()> {
    let pb = spinner("Indexing tiles...");
    let index = TileIndex::from_dir(tile_dir).context("Failed to index tile directory")?;
    pb.finish_and_clear();

    let coverage = index.coverage();
    println!("Tile directory: {}", tile_dir.display());
    println!("Tiles indexed: {}", index.len());
    println!(
        "Coverage: ({:.1}, {:.1}) - ({:.1}, {:.1})",
        coverage.min_x, coverage.min_y, coverage.max_x, coverage.max_y
    );
    Ok(())
}

// ─── Augment ────────────────────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
fn run_augment(
    input: &PathBuf,
    output: &PathBuf,
    tile_dir: &PathBuf,
    lon_field: Option<&str>,
    lat_field: Option<&str>,
    elev_field: String,
    workers: usize,
    cache_size: usize,
    bilinear: bool,
) -> Result<()> {
    let start = Instant::now();

    let mut table = read_table(input)?;
    let (lon_col, lat_col) = table
        .detect_lon_lat(lon_field, lat_field)
        .context("Cannot resolve coordinate columns")?;

    let method = if bilinear {
        SamplingMethod::Bilinear
    } else {
        SamplingMethod::Nearest
    };
    let pb = spinner("Indexing tiles...");
    let sampler = AltitudeSampler::from_tile_dir(tile_dir, cache_size, method)
        .context("Failed to index tile directory")?;
    pb.finish_and_clear();
    info!("Tiles indexed: {}", sampler.index().len());

    let params = AugmentParams {
        workers,
        elevation_column: elev_field,
    };
    let pb = spinner("Sampling elevations...");
    let report = augment_elevations(&mut table, &sampler, lon_col, lat_col, &params)
        .context("Augmentation failed")?;
    pb.finish_and_clear();

    write_table(&table, output)?;

    println!("Observations: {}", report.total);
    println!("Resolved: {}", report.resolved);
    println!("Unresolved: {}", report.unresolved);
    done("Augmented observations", output, start.elapsed());
    Ok(())
}

// ─── Cluster ────────────────────────────────────────────────────────────

struct ClusterArgs {
    input: PathBuf,
    out_csv: PathBuf,
    out_geojson_2056: PathBuf,
    out_geojson_4326: PathBuf,
    eps: f64,
    min_samples: usize,
    alt_scale: f64,
    lon_field: Option<String>,
    lat_field: Option<String>,
    elev_field: String,
    taxon_field: Option<String>,
    year_field: Option<String>,
}

fn run_cluster(args: ClusterArgs) -> Result<()> {
    let start = Instant::now();

    let table = read_table(&args.input)?;
    let (lon_col, lat_col) = table
        .detect_lon_lat(args.lon_field.as_deref(), args.lat_field.as_deref())
        .context("Cannot resolve coordinate columns")?;
    let elev_col = table
        .require_column(&args.elev_field)
        .context("Cannot resolve elevation column; run `ecotope augment` first")?;
    let taxon_col = resolve_optional_column(&table, args.taxon_field.as_deref(), "taxon")?;
    let year_col = resolve_optional_column(&table, args.year_field.as_deref(), "year")?;

    let observations: Vec<_> = (0..table.n_rows())
        .filter_map(|row| table.observation(row, lon_col, lat_col, Some(elev_col)))
        .collect();
    let unparseable = table.n_rows() - observations.len();

    let params = ClusterParams {
        eps: args.eps,
        min_samples: args.min_samples,
        altitude_scale: args.alt_scale,
    };
    let pb = spinner("Clustering observations...");
    let outcome = cluster_observations(&observations, &params).context("Clustering failed")?;
    pb.finish_and_clear();

    let noise = outcome.labels.iter().filter(|&&l| l == NOISE).count();
    info!(
        "{} clusters, {} noise points, {} rows without elevation",
        outcome.n_clusters,
        noise,
        outcome.skipped.len() + unparseable
    );

    // Annotated CSV: feature-complete rows only, original columns plus
    // the cluster id.
    let mut headers = table.headers().to_vec();
    headers.push("cluster_id".into());
    let rows = outcome
        .vectors
        .iter()
        .zip(&outcome.labels)
        .map(|(v, &label)| {
            let mut cells = table.row(v.row).to_vec();
            cells.push(label.to_string());
            cells
        })
        .collect();
    let annotated = ObservationTable::from_parts(headers, rows);
    write_table(&annotated, &args.out_csv)?;

    let pb = spinner("Synthesizing cluster geometries...");
    let members = collect_members(&outcome.vectors, &outcome.labels, |row| {
        (
            table.parse_f64(row, elev_col).unwrap_or(0.0),
            taxon_col.map(|c| table.value(row, c).to_string()).filter(|v| !v.is_empty()),
            year_col.map(|c| table.value(row, c).to_string()).filter(|v| !v.is_empty()),
        )
    });
    let geometry_params = GeometryParams {
        radius: args.eps,
        ..Default::default()
    };
    let features = synthesize(&members, &geometry_params).context("Geometry synthesis failed")?;
    pb.finish_and_clear();

    write_geojson(
        &args.out_geojson_2056,
        &to_feature_collection(&features, OutputCrs::Lv95),
    )
    .context("Failed to write EPSG:2056 GeoJSON")?;
    write_geojson(
        &args.out_geojson_4326,
        &to_feature_collection(&features, OutputCrs::Wgs84),
    )
    .context("Failed to write EPSG:4326 GeoJSON")?;

    println!("Clustered rows: {}", outcome.vectors.len());
    println!("Clusters: {}", outcome.n_clusters);
    println!("Noise points: {}", noise);
    println!(
        "Skipped (no elevation / bad coordinates): {}",
        outcome.skipped.len() + unparseable
    );
    println!("GeoJSON 2056: {}", args.out_geojson_2056.display());
    println!("GeoJSON 4326: {}", args.out_geojson_4326.display());
    done("Clustered observations", &args.out_csv, start.elapsed());
    Ok(())
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn read_table(path: &PathBuf) -> Result<ObservationTable> {
    let pb = spinner("Reading observations...");
    let table = ObservationTable::read_csv(path).context("Failed to read observations CSV")?;
    pb.finish_and_clear();
    info!("Input: {} rows", table.n_rows());
    Ok(table)
}

fn write_table(table: &ObservationTable, path: &PathBuf) -> Result<()> {
    let pb = spinner("Writing output...");
    table.write_csv(path).context("Failed to write output CSV")?;
    pb.finish_and_clear();
    Ok(())
}

/// Resolve a metadata column: an explicit override must exist, the
/// default name is used only when present.
fn resolve_optional_column(
    table: &ObservationTable,
    field_override: Option<&str>,
    default_name: &str,
) -> Result<Option<usize>> {
    match field_override {
        Some(name) => {
            let col = table
                .require_column(name)
                .with_context(|| format!("Unknown column '{name}'"))?;
            Ok(Some(col))
        }
        None => Ok(table.column(default_name)),
    }
}

fn done(name: &str, path: &PathBuf, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}
