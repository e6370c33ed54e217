//! Output formatting and persistence for region reports.
//!
//! Supports pretty-printing, JSON files, CSV tables, and the exceptional-days
//! CSV report. File writes are retried a bounded number of times.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::analyzers::exceptions::ExceptionalDay;
use crate::stats::RegionKpis;
use csv::WriterBuilder;
use std::path::Path;

/// Logs region KPIs using Rust's debug pretty-print format.
pub fn print_pretty(kpis: &RegionKpis) {
    debug!("{:#?}", kpis);
}

/// Logs region KPIs as pretty-printed JSON.
pub fn print_json(kpis: &RegionKpis) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(kpis)?);
    Ok(())
}

/// Runs `write` up to `1 + retries` times, returning the last error.
pub fn with_retries<T>(path: &Path, retries: u32, mut write: impl FnMut() -> Result<T>) -> Result<T> {
    let mut attempt = 0;
    loop {
        match write() {
            Ok(value) => return Ok(value),
            Err(e) if attempt < retries => {
                attempt += 1;
                warn!(path = %path.display(), attempt, error = %e, "Write failed, retrying");
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Giving up on {}", path.display()));
            }
        }
    }
}

/// Writes `contents` to `path`, creating parent directories.
pub fn write_file(path: &Path, contents: &[u8], retries: u32) -> Result<()> {
    with_retries(path, retries, || {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    })?;
    debug!(path = %path.display(), bytes = contents.len(), "File written");
    Ok(())
}

/// Serializes `value` as pretty JSON into `path`.
pub fn write_json(path: &Path, value: &impl Serialize, retries: u32) -> Result<()> {
    let body = serde_json::to_vec_pretty(value)?;
    write_file(path, &body, retries)
}

/// Writes `records` as one CSV file with a header row, replacing any
/// previous content.
pub fn write_records<T: Serialize>(path: &Path, records: &[T], retries: u32) -> Result<()> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    for record in records {
        writer.serialize(record)?;
    }
    let body = writer.into_inner().context("Failed to finish CSV buffer")?;
    debug!(path = %path.display(), rows = records.len(), "Writing CSV records");
    write_file(path, &body, retries)
}

/// Writes the exceptional-days report: `date,service_id,exception`.
pub fn write_exceptional_days(path: &Path, days: &[ExceptionalDay], retries: u32) -> Result<()> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    if days.is_empty() {
        writer.write_record(["date", "service_id", "exception"])?;
    }
    for day in days {
        writer.serialize(day)?;
    }
    let body = writer.into_inner().context("Failed to finish CSV buffer")?;
    write_file(path, &body, retries)
}
