//! Per-region counts and headline KPIs over normalized stop events.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::analyzers::time::StopEvent;
use crate::analyzers::utility::{mean, ratio};
use crate::feed::Trip;

/// Grouped counts and KPIs for one region.
///
/// Scalar KPIs use `None` as the "undefined" sentinel; `peak_hour` is `None`
/// when no event could be parsed.
#[derive(Debug, Default, Clone)]
pub struct RegionAggregates {
    /// Hour -> events. All 24 hours present when any event was parsed.
    pub counts_by_hour: BTreeMap<u32, usize>,
    pub peak_hour: Option<u32>,
    /// (weekday, hour) -> events. Absent cells are zero.
    pub counts_by_weekday_hour: BTreeMap<(u32, u32), usize>,
    /// Stop id -> events, parsed or not.
    pub counts_by_stop: HashMap<String, usize>,
    /// Route id -> trips.
    pub counts_by_route: HashMap<String, usize>,
    pub mean_trips_per_route: Option<f64>,
    pub mean_station_load: Option<f64>,
    pub parsed_events: usize,
    pub unparsed_events: usize,
}

/// Aggregates a region's normalized stop events.
///
/// An empty event collection short-circuits to empty maps and sentinel KPIs,
/// regardless of what the trips table holds.
pub fn aggregate_region(events: &[StopEvent], trips: &[Trip]) -> RegionAggregates {
    if events.is_empty() {
        return RegionAggregates::default();
    }

    let mut counts_by_hour = BTreeMap::new();
    let mut counts_by_weekday_hour = BTreeMap::new();
    let mut counts_by_stop: HashMap<String, usize> = HashMap::new();
    let mut parsed_events = 0usize;

    for event in events {
        *counts_by_stop.entry(event.stop_id.clone()).or_default() += 1;

        let Some(fields) = &event.fields else {
            continue;
        };
        parsed_events += 1;
        *counts_by_hour.entry(fields.hour).or_insert(0usize) += 1;
        *counts_by_weekday_hour
            .entry((fields.weekday, fields.hour))
            .or_insert(0usize) += 1;
    }

    if parsed_events > 0 {
        for hour in 0..24 {
            counts_by_hour.entry(hour).or_insert(0);
        }
    }

    let mut counts_by_route: HashMap<String, usize> = HashMap::new();
    let mut distinct_trips = HashSet::new();
    for trip in trips {
        *counts_by_route.entry(trip.route_id.clone()).or_default() += 1;
        distinct_trips.insert(trip.trip_id.as_str());
    }

    let loads: Vec<f64> = counts_by_stop.values().map(|c| *c as f64).collect();

    RegionAggregates {
        peak_hour: peak_hour(&counts_by_hour),
        counts_by_hour,
        counts_by_weekday_hour,
        mean_station_load: mean(&loads),
        counts_by_stop,
        mean_trips_per_route: ratio(distinct_trips.len(), counts_by_route.len()),
        counts_by_route,
        parsed_events,
        unparsed_events: events.len() - parsed_events,
    }
}

/// Hour with the highest count; the earliest hour wins a tie.
pub fn peak_hour(counts_by_hour: &BTreeMap<u32, usize>) -> Option<u32> {
    let mut best: Option<(u32, usize)> = None;
    for (&hour, &count) in counts_by_hour {
        if best.is_none_or(|(_, c)| count > c) {
            best = Some((hour, count));
        }
    }
    best.map(|(hour, _)| hour)
}

/// Hourly counts as a dense 24-slot series.
pub fn hourly_series(counts_by_hour: &BTreeMap<u32, usize>) -> [usize; 24] {
    let mut series = [0usize; 24];
    for (&hour, &count) in counts_by_hour {
        if let Some(slot) = series.get_mut(hour as usize) {
            *slot = count;
        }
    }
    series
}

/// Weekday x hour counts as a dense 7 x 24 grid.
pub fn weekday_hour_grid(counts: &BTreeMap<(u32, u32), usize>) -> [[usize; 24]; 7] {
    let mut grid = [[0usize; 24]; 7];
    for (&(weekday, hour), &count) in counts {
        if let Some(cell) = grid
            .get_mut(weekday as usize)
            .and_then(|row| row.get_mut(hour as usize))
        {
            *cell = count;
        }
    }
    grid
}
