//! Exceptional service days from calendar_dates.txt.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Serialize, Serializer};

use crate::error::ReportError;
use crate::feed::CalendarDate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExceptionLabel {
    Added,
    Removed,
}

impl ExceptionLabel {
    /// 1 = service added, 2 = service removed
    pub fn from_type(exception_type: i32) -> Option<Self> {
        match exception_type {
            1 => Some(ExceptionLabel::Added),
            2 => Some(ExceptionLabel::Removed),
            _ => None,
        }
    }
}

impl fmt::Display for ExceptionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExceptionLabel::Added => f.write_str("added"),
            ExceptionLabel::Removed => f.write_str("removed"),
        }
    }
}

/// One row of the exceptional-days CSV report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExceptionalDay {
    #[serde(serialize_with = "serialize_iso_date")]
    pub date: NaiveDate,
    pub service_id: String,
    pub exception: ExceptionLabel,
}

/// A calendar_dates row that could not be placed in the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedException {
    pub service_id: String,
    pub date: String,
    /// `None` when the cell was empty or not an integer.
    pub exception_type: Option<i32>,
    pub reason: String,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct ExceptionalDays {
    /// Added rows first, then removed rows, each in source order.
    pub days: Vec<ExceptionalDay>,
    pub rejected: Vec<RejectedException>,
}

impl ExceptionalDays {
    pub fn counts_by_label(&self) -> BTreeMap<ExceptionLabel, usize> {
        let mut counts = BTreeMap::new();
        for day in &self.days {
            *counts.entry(day.exception).or_insert(0usize) += 1;
        }
        counts
    }
}

/// Parses an 8-digit `YYYYMMDD` service date.
pub fn parse_service_date(s: &str) -> Result<NaiveDate, ReportError> {
    let s = s.trim();
    if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ReportError::InvalidDate(s.to_string()));
    }
    NaiveDate::parse_from_str(s, "%Y%m%d").map_err(|_| ReportError::InvalidDate(s.to_string()))
}

/// Splits calendar exceptions into added and removed service days.
pub fn extract_exceptional_days(rows: &[CalendarDate]) -> ExceptionalDays {
    let mut added = Vec::new();
    let mut removed = Vec::new();
    let mut rejected = Vec::new();

    for row in rows {
        let reject = |reason: String| RejectedException {
            service_id: row.service_id.clone(),
            date: row.date.clone(),
            exception_type: row.exception_type,
            reason,
        };

        let Some(exception_type) = row.exception_type else {
            rejected.push(reject("missing or invalid exception type".to_string()));
            continue;
        };
        let Some(label) = ExceptionLabel::from_type(exception_type) else {
            rejected.push(reject(format!("unknown exception type {exception_type}")));
            continue;
        };

        match parse_service_date(&row.date) {
            Ok(date) => {
                let day = ExceptionalDay {
                    date,
                    service_id: row.service_id.clone(),
                    exception: label,
                };
                match label {
                    ExceptionLabel::Added => added.push(day),
                    ExceptionLabel::Removed => removed.push(day),
                }
            }
            Err(e) => rejected.push(reject(e.to_string())),
        }
    }

    added.extend(removed);
    ExceptionalDays {
        days: added,
        rejected,
    }
}

fn serialize_iso_date<S>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&date.format("%Y-%m-%d").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(service: &str, date: &str, exception_type: i32) -> CalendarDate {
        CalendarDate {
            service_id: service.into(),
            date: date.into(),
            exception_type: Some(exception_type),
        }
    }

    #[test]
    fn test_partition_keeps_every_row() {
        let rows = vec![
            row("WKD", "20240704", 2),
            row("HOL", "20240704", 1),
            row("WKD", "20241225", 2),
            row("HOL", "20241225", 1),
        ];
        let report = extract_exceptional_days(&rows);

        assert_eq!(report.days.len(), rows.len());
        assert!(report.rejected.is_empty());
        assert!(report.days[..2].iter().all(|d| d.exception == ExceptionLabel::Added));
        assert!(report.days[2..].iter().all(|d| d.exception == ExceptionLabel::Removed));
        assert_eq!(report.days[0].date, NaiveDate::from_ymd_opt(2024, 7, 4).unwrap());
        assert_eq!(report.days[1].date, NaiveDate::from_ymd_opt(2024, 12, 25).unwrap());
    }

    #[test]
    fn test_malformed_date_fails_row_only() {
        let rows = vec![row("A", "2024-07-04", 1), row("A", "20240230", 2), row("A", "20240101", 1)];
        let report = extract_exceptional_days(&rows);

        assert_eq!(report.days.len(), 1);
        assert_eq!(report.rejected.len(), 2);
        assert_eq!(report.rejected[0].reason, "Invalid service date: 2024-07-04");
    }

    #[test]
    fn test_unknown_type_rejected() {
        let report = extract_exceptional_days(&[row("A", "20240101", 3)]);
        assert!(report.days.is_empty());
        assert_eq!(report.rejected.len(), 1);
    }

    #[test]
    fn test_every_row_is_a_day_or_rejected() {
        let mut rows = vec![row("A", "20240101", 1), row("B", "20240102", 1), row("C", "20240103", 1)];
        rows[1].exception_type = None;
        rows[2].exception_type = None;
        let report = extract_exceptional_days(&rows);

        assert_eq!(report.days.len() + report.rejected.len(), rows.len());
        assert_eq!(report.days.len(), 1);
        assert_eq!(report.rejected[0].service_id, "B");
        assert_eq!(report.rejected[0].exception_type, None);
        assert_eq!(report.rejected[0].reason, "missing or invalid exception type");
    }

    #[test]
    fn test_counts_by_label() {
        let rows = vec![row("A", "20240101", 1), row("B", "20240102", 2), row("C", "20240103", 2)];
        let counts = extract_exceptional_days(&rows).counts_by_label();
        assert_eq!(counts[&ExceptionLabel::Added], 1);
        assert_eq!(counts[&ExceptionLabel::Removed], 2);
    }

    #[test]
    fn test_csv_row_shape() {
        let day = ExceptionalDay {
            date: NaiveDate::from_ymd_opt(2024, 7, 4).unwrap(),
            service_id: "HOL".into(),
            exception: ExceptionLabel::Added,
        };
        let mut wtr = csv::Writer::from_writer(vec![]);
        wtr.serialize(&day).unwrap();
        let out = String::from_utf8(wtr.into_inner().unwrap()).unwrap();
        assert_eq!(out, "date,service_id,exception\n2024-07-04,HOL,added\n");
    }
}
