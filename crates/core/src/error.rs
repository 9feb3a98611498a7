//! Error types for ecotope

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for ecotope operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("TIFF error: {0}")]
    Tiff(String),

    #[error("Tile unavailable: {path}: {reason}")]
    TileUnavailable { path: PathBuf, reason: String },

    #[error("No raster tiles found under {dir}")]
    EmptyTileIndex { dir: PathBuf },

    #[error("Cannot reproject ({lon}, {lat}): {reason}")]
    ReprojectionFailure { lon: f64, lat: f64, reason: String },

    #[error("No observations with a resolved elevation")]
    EmptyFeatureSet,

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Column '{0}' not found in input")]
    UnknownColumn(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error downgrades a single observation to a missing
    /// elevation during augmentation instead of aborting the stage.
    pub fn is_row_recoverable(&self) -> bool {
        matches!(
            self,
            Error::TileUnavailable { .. } | Error::ReprojectionFailure { .. }
        )
    }
}

/// Result type alias for ecotope operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_recoverable() {
        let e = Error::TileUnavailable {
            path: "x.tif".into(),
            reason: "missing".into(),
        };
        assert!(e.is_row_recoverable());
        assert!(!Error::EmptyFeatureSet.is_row_recoverable());
    }
}
