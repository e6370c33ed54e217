//! Serializable per-region summary, written as `summary.json`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::analyzers::exceptions::RejectedException;
use crate::analyzers::geometry::ShapeLength;
use crate::analyzers::travel_time::TravelTimeEstimate;

/// Everything the charts were drawn from, in one JSON document.
#[derive(Debug, Serialize)]
pub struct RegionSummary {
    pub schema_version: u8,
    pub region: String,
    pub generated_at: DateTime<Utc>,
    pub peak_hour: Option<u32>,
    /// Dense, index = hour.
    pub counts_by_hour: Vec<usize>,
    pub top_routes: Vec<RouteCount>,
    pub longest_shapes: Vec<ShapeLength>,
    pub exception_counts: BTreeMap<String, usize>,
    pub rejected_exceptions: Vec<RejectedException>,
    pub travel_time: Option<TravelTimeEstimate>,
}

#[derive(Debug, Serialize)]
pub struct RouteCount {
    pub route_id: String,
    pub trips: usize,
}
