//! Approximate average travel time per route.
//!
//! Works on deterministic samples of the shape points and of the stop events
//! to bound the cost on large feeds. Sampled stop events are joined to their
//! trip and kept only when the trip's shape is among the sampled shapes;
//! consecutive events of a trip then give time deltas that are averaged per
//! route.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::Timelike;
use serde::Serialize;
use tracing::debug;

use crate::analyzers::time::StopEvent;
use crate::analyzers::utility::{mean, stddev};
use crate::config::SamplingConfig;
use crate::feed::{ShapePoint, Trip};
use crate::sampling::sample;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteTravelTime {
    pub route_id: String,
    pub mean_minutes: f64,
    pub stddev_minutes: f64,
    pub deltas: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TravelTimeEstimate {
    /// Sorted by route id.
    pub per_route: Vec<RouteTravelTime>,
    pub sampled_shape_points: usize,
    pub sampled_events: usize,
    pub joined_events: usize,
    /// Sampled events whose trip id is not in the trips table.
    pub dropped_without_trip: usize,
    /// Sampled events whose trip's shape was not sampled.
    pub dropped_without_shape: usize,
}

struct Joined<'a> {
    trip_id: &'a str,
    route_id: &'a str,
    event: &'a StopEvent,
}

/// Returns `None` when either input or either sample is empty.
pub fn estimate_travel_times(
    events: &[StopEvent],
    trips: &[Trip],
    shapes: &[ShapePoint],
    sampling: &SamplingConfig,
) -> Option<TravelTimeEstimate> {
    if events.is_empty() || shapes.is_empty() {
        return None;
    }

    let shape_sample = sample(shapes, sampling.shape_fraction, sampling.seed);
    let sampled_shape_ids: HashSet<&str> =
        shape_sample.iter().map(|p| p.shape_id.as_str()).collect();

    // Unparsed times sort after parsed ones within a trip.
    let mut ordered: Vec<&StopEvent> = events.iter().collect();
    ordered.sort_by(|a, b| {
        a.trip_id
            .cmp(&b.trip_id)
            .then_with(|| b.is_parsed().cmp(&a.is_parsed()))
            .then_with(|| {
                let ka = a.fields.map(|f| f.normalized);
                let kb = b.fields.map(|f| f.normalized);
                ka.cmp(&kb)
            })
            .then_with(|| a.sequence.cmp(&b.sequence))
    });
    let event_sample = sample(&ordered, sampling.stop_event_fraction, sampling.seed);

    if shape_sample.is_empty() || event_sample.is_empty() {
        debug!(
            shape_points = shape_sample.len(),
            events = event_sample.len(),
            "Travel-time sample empty, skipping"
        );
        return None;
    }

    let mut trip_index: HashMap<&str, &Trip> = HashMap::new();
    for trip in trips {
        trip_index.entry(trip.trip_id.as_str()).or_insert(trip);
    }

    let mut joined = Vec::new();
    let mut dropped_without_trip = 0usize;
    let mut dropped_without_shape = 0usize;
    for event in event_sample.iter().map(|e| **e) {
        let Some(&trip) = trip_index.get(event.trip_id.as_str()) else {
            dropped_without_trip += 1;
            continue;
        };
        let in_sample = trip
            .shape_id
            .as_deref()
            .is_some_and(|id| sampled_shape_ids.contains(id));
        if !in_sample {
            dropped_without_shape += 1;
            continue;
        }
        joined.push(Joined {
            trip_id: trip.trip_id.as_str(),
            route_id: trip.route_id.as_str(),
            event,
        });
    }

    let mut deltas_by_route: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for pair in joined.windows(2) {
        let (prev, cur) = (&pair[0], &pair[1]);
        if prev.trip_id != cur.trip_id {
            continue;
        }
        if let Some(delta) = delta_minutes(prev.event, cur.event) {
            deltas_by_route.entry(cur.route_id).or_default().push(delta);
        }
    }

    let per_route = deltas_by_route
        .into_iter()
        .filter_map(|(route_id, deltas)| {
            let m = mean(&deltas)?;
            Some(RouteTravelTime {
                route_id: route_id.to_string(),
                mean_minutes: m,
                stddev_minutes: stddev(&deltas, m),
                deltas: deltas.len(),
            })
        })
        .collect();

    Some(TravelTimeEstimate {
        per_route,
        sampled_shape_points: shape_sample.len(),
        sampled_events: event_sample.len(),
        joined_events: joined.len(),
        dropped_without_trip,
        dropped_without_shape,
    })
}

/// Minutes between two events' clock times, made non-negative.
///
/// Only the time of day is compared, so a step across midnight comes out as
/// the absolute clock difference rather than the elapsed time.
pub fn delta_minutes(prev: &StopEvent, cur: &StopEvent) -> Option<f64> {
    let a = prev.fields?.normalized.time.num_seconds_from_midnight() as f64;
    let b = cur.fields?.normalized.time.num_seconds_from_midnight() as f64;
    Some(((b - a) / 60.0).abs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::time::{normalize, time_fields};
    use chrono::NaiveDate;

    fn event(trip: &str, raw: &str) -> StopEvent {
        let anchor = NaiveDate::from_ymd_opt(1900, 1, 1).unwrap();
        StopEvent {
            trip_id: trip.into(),
            stop_id: "S".into(),
            raw_arrival: raw.into(),
            sequence: None,
            fields: normalize(raw).map(|n| time_fields(n, anchor)),
        }
    }

    fn trip(trip_id: &str, route_id: &str, shape_id: &str) -> Trip {
        Trip {
            trip_id: trip_id.into(),
            route_id: route_id.into(),
            shape_id: Some(shape_id.into()),
            service_id: None,
        }
    }

    fn shape(id: &str) -> ShapePoint {
        ShapePoint {
            shape_id: id.into(),
            shape_pt_lat: Some(0.0),
            shape_pt_lon: Some(0.0),
            shape_pt_sequence: Some(1),
        }
    }

    fn full_sample() -> SamplingConfig {
        SamplingConfig {
            shape_fraction: 1.0,
            stop_event_fraction: 1.0,
            seed: 42,
        }
    }

    #[test]
    fn test_mean_per_route() {
        let events = vec![
            event("T1", "08:10:00"),
            event("T1", "08:00:00"),
            event("T1", "08:30:00"),
            event("T2", "09:00:00"),
            event("T2", "09:05:00"),
        ];
        let trips = vec![trip("T1", "R1", "SH1"), trip("T2", "R2", "SH1")];
        let est = estimate_travel_times(&events, &trips, &[shape("SH1")], &full_sample()).unwrap();

        assert_eq!(est.per_route.len(), 2);
        assert_eq!(est.per_route[0].route_id, "R1");
        assert_eq!(est.per_route[0].mean_minutes, 15.0);
        assert_eq!(est.per_route[0].deltas, 2);
        assert_eq!(est.per_route[1].mean_minutes, 5.0);
        assert_eq!(est.joined_events, 5);
    }

    #[test]
    fn test_deltas_across_midnight_are_non_negative() {
        let events = vec![event("T1", "23:50:00"), event("T1", "24:10:00")];
        let trips = vec![trip("T1", "R1", "SH1")];
        let est = estimate_travel_times(&events, &trips, &[shape("SH1")], &full_sample()).unwrap();

        let r = &est.per_route[0];
        assert!(r.mean_minutes >= 0.0);
        assert_eq!(r.mean_minutes, 1420.0);
    }

    #[test]
    fn test_join_drops_are_counted() {
        let events = vec![
            event("T1", "08:00:00"),
            event("T1", "08:05:00"),
            event("GHOST", "08:00:00"),
            event("T2", "08:00:00"),
        ];
        let trips = vec![trip("T1", "R1", "SH1"), trip("T2", "R2", "OTHER")];
        let est = estimate_travel_times(&events, &trips, &[shape("SH1")], &full_sample()).unwrap();

        assert_eq!(est.dropped_without_trip, 1);
        assert_eq!(est.dropped_without_shape, 1);
        assert_eq!(est.joined_events, 2);
        assert_eq!(est.per_route.len(), 1);
    }

    #[test]
    fn test_unparsed_neighbours_give_no_delta() {
        let events = vec![event("T1", "08:00:00"), event("T1", "garbage")];
        let trips = vec![trip("T1", "R1", "SH1")];
        let est = estimate_travel_times(&events, &trips, &[shape("SH1")], &full_sample()).unwrap();
        assert!(est.per_route.is_empty());
    }

    #[test]
    fn test_empty_inputs_skip() {
        let trips = vec![trip("T1", "R1", "SH1")];
        assert!(estimate_travel_times(&[], &trips, &[shape("SH1")], &full_sample()).is_none());
        assert!(
            estimate_travel_times(&[event("T1", "08:00:00")], &trips, &[], &full_sample())
                .is_none()
        );
    }

    #[test]
    fn test_empty_sample_skips() {
        let sampling = SamplingConfig {
            shape_fraction: 0.1,
            stop_event_fraction: 1.0,
            seed: 42,
        };
        let events = vec![event("T1", "08:00:00")];
        let trips = vec![trip("T1", "R1", "SH1")];
        assert!(estimate_travel_times(&events, &trips, &[shape("SH1")], &sampling).is_none());
    }
}
