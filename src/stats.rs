//! The per-region KPI record written to `kpis.csv`.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::analyzers::aggregate::RegionAggregates;
use crate::feed::FeedTables;

/// Headline numbers for one region, one row of `kpis.csv`.
///
/// `None` marks an undefined value (nothing to count) and is written as an
/// empty CSV cell.
#[derive(Debug, Default, Clone, Serialize)]
pub struct RegionKpis {
    pub timestamp: DateTime<Utc>,
    pub region: String,

    // table sizes
    pub total_stops: usize,
    pub total_routes: usize,
    pub total_trips: usize,
    pub total_services: usize,
    pub total_shape_points: usize,

    // stop events
    pub total_stop_events: usize,
    pub unparsed_stop_events: usize,

    // derived
    pub peak_hour: Option<u32>,
    pub mean_trips_per_route: Option<f64>,
    pub mean_station_load: Option<f64>,
}

impl RegionKpis {
    pub fn from_region(region: &str, tables: &FeedTables, agg: &RegionAggregates) -> Self {
        RegionKpis {
            timestamp: Utc::now(),
            region: region.to_string(),
            total_stops: tables.stops.len(),
            total_routes: tables.routes.len(),
            total_trips: tables.trips.len(),
            total_services: tables.calendar.len(),
            total_shape_points: tables.shapes.len(),
            total_stop_events: tables.stop_times.len(),
            unparsed_stop_events: agg.unparsed_events,
            peak_hour: agg.peak_hour,
            mean_trips_per_route: agg.mean_trips_per_route,
            mean_station_load: agg.mean_station_load,
        }
    }

    pub fn pct(part: usize, total: usize) -> f64 {
        if total == 0 {
            0.0
        } else {
            (part as f64 / total as f64) * 100.0
        }
    }

    pub fn unparsed_pct(&self) -> f64 {
        Self::pct(self.unparsed_stop_events, self.total_stop_events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{Stop, Trip};

    #[test]
    fn test_pct_with_zero_total() {
        assert_eq!(RegionKpis::pct(10, 0), 0.0);
    }

    #[test]
    fn test_pct_normal_values() {
        assert_eq!(RegionKpis::pct(50, 100), 50.0);
        assert_eq!(RegionKpis::pct(1, 4), 25.0);
    }

    #[test]
    fn test_from_region_empty() {
        let kpis = RegionKpis::from_region("Bronx", &FeedTables::default(), &RegionAggregates::default());

        assert_eq!(kpis.region, "Bronx");
        assert_eq!(kpis.total_stops, 0);
        assert_eq!(kpis.peak_hour, None);
        assert_eq!(kpis.mean_station_load, None);
    }

    #[test]
    fn test_from_region_counts_tables() {
        let tables = FeedTables {
            stops: vec![Stop {
                stop_id: "S1".into(),
                stop_name: None,
                stop_lat: None,
                stop_lon: None,
            }],
            trips: vec![Trip {
                trip_id: "T1".into(),
                route_id: "R1".into(),
                shape_id: None,
                service_id: None,
            }],
            ..Default::default()
        };
        let agg = RegionAggregates {
            peak_hour: Some(8),
            ..Default::default()
        };

        let kpis = RegionKpis::from_region("Queens", &tables, &agg);
        assert_eq!(kpis.total_stops, 1);
        assert_eq!(kpis.total_trips, 1);
        assert_eq!(kpis.peak_hour, Some(8));
    }

    #[test]
    fn test_unparsed_pct() {
        let kpis = RegionKpis {
            total_stop_events: 200,
            unparsed_stop_events: 50,
            ..Default::default()
        };
        assert_eq!(kpis.unparsed_pct(), 25.0);
    }
}
