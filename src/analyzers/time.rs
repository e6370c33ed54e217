//! Normalization of feed arrival times.
//!
//! Feed times are `H:MM:SS` where the hour may run past 23 for service that
//! continues after midnight but still belongs to the previous service day.
//! [`normalize`] folds the hour back into a clock time and reports how many
//! whole days were folded away.

use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};

use crate::feed::StopTime;

/// A clock time plus the number of service days it lies past its own date.
/// Ordering is service order: day offset first, then clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct NormalizedTime {
    pub day_offset: u32,
    pub time: NaiveTime,
}

/// Parses a raw feed time. Returns `None` unless the string is three
/// colon-separated unsigned integers with minutes and seconds in `0..=59`.
pub fn normalize(raw: &str) -> Option<NormalizedTime> {
    let mut parts = raw.trim().split(':');
    let h = parts.next()?;
    let m = parts.next()?;
    let s = parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    let hours = parse_component(h)?;
    let minutes = parse_component(m)?;
    let seconds = parse_component(s)?;
    if minutes > 59 || seconds > 59 {
        return None;
    }

    let time = NaiveTime::from_hms_opt(hours % 24, minutes, seconds)?;
    Some(NormalizedTime {
        day_offset: hours / 24,
        time,
    })
}

fn parse_component(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Derived time fields of a parsed stop event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeFields {
    pub normalized: NormalizedTime,
    pub hour: u32,
    pub minute: u32,
    /// Monday = 0 .. Sunday = 6
    pub weekday: u32,
}

/// A stop_times row with its derived fields computed once. `fields` is
/// `None` when the raw arrival time could not be parsed; such events are kept
/// but never counted in hour or weekday aggregates.
#[derive(Debug, Clone)]
pub struct StopEvent {
    pub trip_id: String,
    pub stop_id: String,
    pub raw_arrival: String,
    pub sequence: Option<u32>,
    pub fields: Option<TimeFields>,
}

impl StopEvent {
    pub fn is_parsed(&self) -> bool {
        self.fields.is_some()
    }
}

/// Builds the derived fields. The weekday is read from `anchor` and is not
/// shifted by the day offset: a post-midnight event stays in the bucket of
/// the service day it belongs to.
pub fn time_fields(normalized: NormalizedTime, anchor: NaiveDate) -> TimeFields {
    let time = normalized.time;
    TimeFields {
        normalized,
        hour: time.hour(),
        minute: time.minute(),
        weekday: anchor.and_time(time).weekday().num_days_from_monday(),
    }
}

/// Normalizes every stop_times row of a region.
pub fn normalize_stop_times(stop_times: &[StopTime], anchor: NaiveDate) -> Vec<StopEvent> {
    stop_times
        .iter()
        .map(|st| StopEvent {
            trip_id: st.trip_id.clone(),
            stop_id: st.stop_id.clone(),
            raw_arrival: st.arrival_time.clone(),
            sequence: st.stop_sequence,
            fields: normalize(&st.arrival_time).map(|n| time_fields(n, anchor)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anchor() -> NaiveDate {
        NaiveDate::from_ymd_opt(1900, 1, 1).unwrap()
    }

    #[test]
    fn test_normalize_same_day_is_identity() {
        for h in 0..24 {
            let raw = format!("{h:02}:15:42");
            let n = normalize(&raw).unwrap();
            assert_eq!(n.time, NaiveTime::from_hms_opt(h, 15, 42).unwrap());
            assert_eq!(n.day_offset, 0);
        }
    }

    #[test]
    fn test_normalize_after_midnight() {
        let n = normalize("25:30:00").unwrap();
        assert_eq!(n.time, NaiveTime::from_hms_opt(1, 30, 0).unwrap());
        assert_eq!(n.day_offset, 1);

        for h in 24..48 {
            let n = normalize(&format!("{h}:00:00")).unwrap();
            assert_eq!(n.time.hour(), h - 24);
            assert_eq!(n.day_offset, 1);
        }
    }

    #[test]
    fn test_normalize_two_days_over() {
        let n = normalize("49:05:00").unwrap();
        assert_eq!(n.time.hour(), 1);
        assert_eq!(n.day_offset, 2);
    }

    #[test]
    fn test_normalize_single_digit_hour() {
        let n = normalize("7:05:09").unwrap();
        assert_eq!(n.time, NaiveTime::from_hms_opt(7, 5, 9).unwrap());
    }

    #[test]
    fn test_normalize_rejects_malformed() {
        for raw in [
            "", "nan", "12:00", "12:00:00:00", "12:60:00", "12:00:60", "-1:00:00", "ab:00:00",
            "12::00", "12:0x:00",
        ] {
            assert_eq!(normalize(raw), None, "{raw:?} should not parse");
        }
    }

    #[test]
    fn test_time_fields_weekday_ignores_offset() {
        let same_day = time_fields(normalize("01:30:00").unwrap(), anchor());
        let next_day = time_fields(normalize("25:30:00").unwrap(), anchor());
        assert_eq!(same_day.weekday, 0);
        assert_eq!(next_day.weekday, same_day.weekday);
        assert_eq!(next_day.hour, 1);
        assert_eq!(next_day.minute, 30);
    }

    #[test]
    fn test_time_fields_weekday_follows_anchor() {
        let saturday = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let fields = time_fields(normalize("08:00:00").unwrap(), saturday);
        assert_eq!(fields.weekday, 5);
    }

    #[test]
    fn test_ordering_is_service_order() {
        let late = normalize("23:59:00").unwrap();
        let after = normalize("24:01:00").unwrap();
        assert!(after > late);
    }

    #[test]
    fn test_normalize_stop_times_keeps_unparsed_rows() {
        let rows = vec![
            StopTime {
                trip_id: "T1".into(),
                stop_id: "S1".into(),
                arrival_time: "08:00:00".into(),
                stop_sequence: Some(1),
            },
            StopTime {
                trip_id: "T1".into(),
                stop_id: "S2".into(),
                arrival_time: "".into(),
                stop_sequence: Some(2),
            },
        ];

        let events = normalize_stop_times(&rows, anchor());
        assert_eq!(events.len(), 2);
        assert!(events[0].is_parsed());
        assert!(!events[1].is_parsed());
    }
}
