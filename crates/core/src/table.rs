//! Header-preserving CSV observation tables
//!
//! The pipeline treats the observation file as an opaque table with a
//! few known columns: every input column passes through to the outputs
//! untouched, and stages only append their own column (`elevation_m`,
//! `cluster_id`). Column lookups are case-insensitive.

use crate::error::{Error, Result};
use crate::observation::Observation;
use std::fs;
use std::path::Path;

/// A CSV table held in memory: header row plus string records.
#[derive(Debug, Clone)]
pub struct ObservationTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl ObservationTable {
    pub fn from_parts(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Read a CSV file, preserving column order and all values as text.
    pub fn read_csv(path: impl AsRef<Path>) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path.as_ref())?;
        let headers = reader.headers()?.iter().map(str::to_string).collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self { headers, rows })
    }

    /// Write the table to `path` atomically: the data goes to a
    /// temporary sibling first and is renamed into place only once the
    /// write fully succeeded, so a failure never leaves a partial file.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let tmp = tmp_sibling(path);

        {
            let mut writer = csv::Writer::from_path(&tmp)?;
            writer.write_record(&self.headers)?;
            for row in &self.rows {
                writer.write_record(row)?;
            }
            writer.flush()?;
        }

        fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// Case-insensitive column lookup.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name))
    }

    /// Column lookup that fails fast on an unknown name.
    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column(name)
            .ok_or_else(|| Error::UnknownColumn(name.to_string()))
    }

    /// Index of `name`, appending an empty column when absent.
    pub fn ensure_column(&mut self, name: &str) -> usize {
        if let Some(idx) = self.column(name) {
            return idx;
        }
        self.headers.push(name.to_string());
        for row in &mut self.rows {
            row.push(String::new());
        }
        self.headers.len() - 1
    }

    pub fn row(&self, row: usize) -> &[String] {
        &self.rows[row]
    }

    pub fn value(&self, row: usize, col: usize) -> &str {
        self.rows[row].get(col).map(String::as_str).unwrap_or("")
    }

    pub fn set_value(&mut self, row: usize, col: usize, value: String) {
        let cells = &mut self.rows[row];
        if col >= cells.len() {
            cells.resize(col + 1, String::new());
        }
        cells[col] = value;
    }

    /// Parse a cell as f64, treating empty/garbage cells as missing.
    pub fn parse_f64(&self, row: usize, col: usize) -> Option<f64> {
        let v = self.value(row, col).trim();
        if v.is_empty() {
            return None;
        }
        v.parse().ok()
    }

    /// Resolve the longitude/latitude columns.
    ///
    /// An explicit override must exist (fail-fast on typos). Without
    /// overrides, `longitude`/`latitude` are tried first, then
    /// `lon`/`lat`.
    pub fn detect_lon_lat(
        &self,
        lon_override: Option<&str>,
        lat_override: Option<&str>,
    ) -> Result<(usize, usize)> {
        let lon = match lon_override {
            Some(name) => self.require_column(name)?,
            None => self
                .column("longitude")
                .or_else(|| self.column("lon"))
                .ok_or_else(|| Error::UnknownColumn("longitude".into()))?,
        };
        let lat = match lat_override {
            Some(name) => self.require_column(name)?,
            None => self
                .column("latitude")
                .or_else(|| self.column("lat"))
                .ok_or_else(|| Error::UnknownColumn("latitude".into()))?,
        };
        Ok((lon, lat))
    }

    /// Parse one row into an [`Observation`]; `None` when the
    /// coordinates are missing or unparseable.
    pub fn observation(
        &self,
        row: usize,
        lon_col: usize,
        lat_col: usize,
        elev_col: Option<usize>,
    ) -> Option<Observation> {
        let lon = self.parse_f64(row, lon_col)?;
        let lat = self.parse_f64(row, lat_col)?;
        let elevation = elev_col.and_then(|c| self.parse_f64(row, c));
        Some(Observation {
            row,
            lon,
            lat,
            elevation,
        })
    }
}

fn tmp_sibling(path: &Path) -> std::path::PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    std::path::PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ObservationTable {
        ObservationTable::from_parts(
            vec!["id".into(), "Longitude".into(), "latitude".into(), "taxon".into()],
            vec![
                vec!["1".into(), "7.44".into(), "46.95".into(), "Picea abies".into()],
                vec!["2".into(), "".into(), "46.96".into(), "Fagus".into()],
            ],
        )
    }

    #[test]
    fn test_column_lookup_case_insensitive() {
        let t = sample();
        assert_eq!(t.column("longitude"), Some(1));
        assert_eq!(t.column("LONGITUDE"), Some(1));
        assert!(t.column("elevation_m").is_none());
    }

    #[test]
    fn test_detect_lon_lat_auto_and_override() {
        let t = sample();
        assert_eq!(t.detect_lon_lat(None, None).unwrap(), (1, 2));
        assert_eq!(t.detect_lon_lat(Some("Longitude"), None).unwrap(), (1, 2));
        assert!(matches!(
            t.detect_lon_lat(Some("x"), None),
            Err(Error::UnknownColumn(_))
        ));
    }

    #[test]
    fn test_ensure_column_pads_rows() {
        let mut t = sample();
        let idx = t.ensure_column("elevation_m");
        assert_eq!(idx, 4);
        assert_eq!(t.value(0, idx), "");
        // Idempotent
        assert_eq!(t.ensure_column("elevation_m"), 4);
    }

    #[test]
    fn test_observation_parsing() {
        let t = sample();
        let obs = t.observation(0, 1, 2, None).unwrap();
        assert_eq!(obs.lon, 7.44);
        assert!(obs.elevation.is_none());
        // Empty longitude cell
        assert!(t.observation(1, 1, 2, None).is_none());
    }

    #[test]
    fn test_csv_roundtrip_preserves_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("obs.csv");

        let t = sample();
        t.write_csv(&path).unwrap();
        let back = ObservationTable::read_csv(&path).unwrap();

        assert_eq!(back.headers(), t.headers());
        assert_eq!(back.n_rows(), 2);
        assert_eq!(back.value(0, 3), "Picea abies");
        assert!(!path.with_extension("csv.tmp").exists());
    }
}
