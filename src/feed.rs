//! Static feed tables for one region.
//!
//! Each region directory holds the eight standard delimited files. They are
//! read with the `csv` crate into plain row structs; numeric columns are
//! coerced leniently (a value that does not parse becomes `None`), and rows
//! missing a key column are skipped and counted.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use std::path::Path;
use tracing::{debug, warn};

/// Files that must all be present before a region is processed.
pub const REQUIRED_FILES: [&str; 8] = [
    "stops.txt",
    "stop_times.txt",
    "trips.txt",
    "routes.txt",
    "calendar.txt",
    "shapes.txt",
    "calendar_dates.txt",
    "agency.txt",
];

#[derive(Debug, Clone, Deserialize)]
pub struct Stop {
    pub stop_id: String,
    #[serde(default)]
    pub stop_name: Option<String>,
    #[serde(default, deserialize_with = "finite")]
    pub stop_lat: Option<f64>,
    #[serde(default, deserialize_with = "finite")]
    pub stop_lon: Option<f64>,
}

/// One row of stop_times.txt. The arrival time is kept raw; normalization
/// happens in [`crate::analyzers::time`].
#[derive(Debug, Clone, Deserialize)]
pub struct StopTime {
    pub trip_id: String,
    pub stop_id: String,
    #[serde(default)]
    pub arrival_time: String,
    #[serde(default, deserialize_with = "lenient")]
    pub stop_sequence: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Trip {
    pub trip_id: String,
    pub route_id: String,
    #[serde(default)]
    pub shape_id: Option<String>,
    #[serde(default)]
    pub service_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Route {
    pub route_id: String,
    #[serde(default)]
    pub route_short_name: Option<String>,
    #[serde(default)]
    pub route_long_name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub route_type: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalendarEntry {
    pub service_id: String,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShapePoint {
    pub shape_id: String,
    #[serde(default, deserialize_with = "finite")]
    pub shape_pt_lat: Option<f64>,
    #[serde(default, deserialize_with = "finite")]
    pub shape_pt_lon: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub shape_pt_sequence: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalendarDate {
    pub service_id: String,
    /// `YYYYMMDD`, parsed by the exceptional-day extractor.
    #[serde(default)]
    pub date: String,
    /// `None` when the cell is empty or not an integer.
    #[serde(default, deserialize_with = "lenient")]
    pub exception_type: Option<i32>,
}

impl ShapePoint {
    /// `[lon, lat]` coordinate, when both values are usable.
    pub fn coord(&self) -> Option<geo::Coord<f64>> {
        Some(geo::Coord {
            x: self.shape_pt_lon?,
            y: self.shape_pt_lat?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Agency {
    #[serde(default)]
    pub agency_id: Option<String>,
    #[serde(default)]
    pub agency_name: Option<String>,
}

/// All tables of one region, loaded once and read-only afterwards.
#[derive(Debug, Default, Clone)]
pub struct FeedTables {
    pub stops: Vec<Stop>,
    pub stop_times: Vec<StopTime>,
    pub trips: Vec<Trip>,
    pub routes: Vec<Route>,
    pub calendar: Vec<CalendarEntry>,
    pub shapes: Vec<ShapePoint>,
    pub calendar_dates: Vec<CalendarDate>,
    pub agencies: Vec<Agency>,
}

impl FeedTables {
    /// Reads every required table from `dir`.
    pub fn load(dir: &Path) -> Result<Self> {
        Ok(FeedTables {
            stops: read_table(dir, "stops.txt")?,
            stop_times: read_table(dir, "stop_times.txt")?,
            trips: read_table(dir, "trips.txt")?,
            routes: read_table(dir, "routes.txt")?,
            calendar: read_table(dir, "calendar.txt")?,
            shapes: read_table(dir, "shapes.txt")?,
            calendar_dates: read_table(dir, "calendar_dates.txt")?,
            agencies: read_table(dir, "agency.txt")?,
        })
    }
}

/// Names of the required files absent from `dir`, in [`REQUIRED_FILES`] order.
pub fn missing_files(dir: &Path) -> Vec<String> {
    REQUIRED_FILES
        .iter()
        .filter(|file| !dir.join(file).is_file())
        .map(|file| file.to_string())
        .collect()
}

fn read_table<T: DeserializeOwned>(dir: &Path, file: &str) -> Result<Vec<T>> {
    let path = dir.join(file);
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(&path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for result in rdr.deserialize() {
        match result {
            Ok(row) => rows.push(row),
            Err(e) => {
                skipped += 1;
                debug!(file, error = %e, "Skipping unreadable row");
            }
        }
    }

    if skipped > 0 {
        warn!(file, skipped, "Skipped rows that could not be read");
    }
    debug!(file, rows = rows.len(), "Table loaded");
    Ok(rows)
}

/// Empty or malformed cells become `None` instead of failing the row.
fn lenient<'de, D, T>(de: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: std::str::FromStr,
{
    let s: Option<String> = Option::deserialize(de)?;
    Ok(s.and_then(|s| s.trim().parse().ok()))
}

/// Like [`lenient`], but also turns `nan` and infinities into `None`.
fn finite<'de, D>(de: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<f64> = lenient(de)?;
    Ok(value.filter(|v| v.is_finite()))
}
