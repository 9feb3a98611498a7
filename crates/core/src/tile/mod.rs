//! Tile index: maps projected coordinates to elevation tile files
//!
//! The index is built once per run by scanning a tile directory and
//! reading each file's GeoTIFF header. Lookup uses uniform grid
//! bucketing keyed on the smallest tile edge, so `resolve` is O(1) in
//! the number of tiles.

use crate::error::{Error, Result};
use crate::io;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Axis-aligned bounding box of a tile in projected coordinates.
///
/// Containment is half-open: a tile owns its west and north edges, and
/// the east and south edges belong to the neighboring tile. A point on
/// a shared edge therefore resolves to exactly one tile, matching the
/// pixel coverage of a north-up raster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileBounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl TileBounds {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x < self.max_x && y > self.min_y && y <= self.max_y
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// One indexed tile: bounding box plus file path. Immutable once built.
#[derive(Debug, Clone)]
pub struct TileDescriptor {
    pub path: PathBuf,
    pub bounds: TileBounds,
}

/// Spatial index over a directory of elevation tiles.
#[derive(Debug)]
pub struct TileIndex {
    tiles: Vec<TileDescriptor>,
    cell: f64,
    buckets: HashMap<(i64, i64), Vec<usize>>,
}

impl TileIndex {
    /// Build the index from a directory tree of `.tif`/`.tiff` files.
    ///
    /// Files whose header cannot be parsed are skipped with a warning.
    /// An empty result is an error; the caller cannot do anything
    /// useful with an index that covers nothing.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut paths = Vec::new();
        collect_tile_paths(dir, &mut paths)?;
        paths.sort();

        let mut tiles = Vec::with_capacity(paths.len());
        let mut skipped = 0usize;
        for path in paths {
            match io::read_geotiff_header(&path) {
                Ok(header) => {
                    let (min_x, min_y, max_x, max_y) = header.bounds();
                    tiles.push(TileDescriptor {
                        path,
                        bounds: TileBounds::new(min_x, min_y, max_x, max_y),
                    });
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable tile");
                    skipped += 1;
                }
            }
        }

        if tiles.is_empty() {
            return Err(Error::EmptyTileIndex {
                dir: dir.to_path_buf(),
            });
        }
        debug!(indexed = tiles.len(), skipped, "tile index built");

        Self::from_descriptors(tiles)
    }

    /// Build the index from pre-computed descriptors.
    ///
    /// Tiles are sorted by path first; when malformed input makes two
    /// tiles claim the same point, `resolve` deterministically returns
    /// the one with the lexicographically smallest path.
    pub fn from_descriptors(mut tiles: Vec<TileDescriptor>) -> Result<Self> {
        if tiles.is_empty() {
            return Err(Error::EmptyTileIndex {
                dir: PathBuf::new(),
            });
        }
        tiles.sort_by(|a, b| a.path.cmp(&b.path));

        let cell = tiles
            .iter()
            .map(|t| t.bounds.width().min(t.bounds.height()))
            .fold(f64::INFINITY, f64::min)
            .max(1.0);

        let mut buckets: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
        for (i, tile) in tiles.iter().enumerate() {
            let b = &tile.bounds;
            let kx0 = (b.min_x / cell).floor() as i64;
            let kx1 = (b.max_x / cell).floor() as i64;
            let ky0 = (b.min_y / cell).floor() as i64;
            let ky1 = (b.max_y / cell).floor() as i64;
            for kx in kx0..=kx1 {
                for ky in ky0..=ky1 {
                    buckets.entry((kx, ky)).or_default().push(i);
                }
            }
        }

        Ok(Self {
            tiles,
            cell,
            buckets,
        })
    }

    /// Resolve the tile containing the projected point, or `None` when
    /// the point is uncovered.
    pub fn resolve(&self, x: f64, y: f64) -> Option<&TileDescriptor> {
        let key = ((x / self.cell).floor() as i64, (y / self.cell).floor() as i64);
        self.buckets
            .get(&key)?
            .iter()
            .map(|&i| &self.tiles[i])
            .find(|t| t.bounds.contains(x, y))
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn tiles(&self) -> &[TileDescriptor] {
        &self.tiles
    }

    /// Overall coverage bounds of the indexed mosaic.
    pub fn coverage(&self) -> TileBounds {
        let mut b = self.tiles[0].bounds;
        for t in &self.tiles[1..] {
            b.min_x = b.min_x.min(t.bounds.min_x);
            b.min_y = b.min_y.min(t.bounds.min_y);
            b.max_x = b.max_x.max(t.bounds.max_x);
            b.max_y = b.max_y.max(t.bounds.max_y);
        }
        b
    }
}

fn collect_tile_paths(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_tile_paths(&path, out)?;
        } else if is_tiff(&path) {
            out.push(path);
        }
    }
    Ok(())
}

fn is_tiff(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("tif") || e.eq_ignore_ascii_case("tiff"))
        .unwrap_or(false)
}
