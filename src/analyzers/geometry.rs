//! Shape ordering and route lengths.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use geo::{EuclideanLength, LineString};
use serde::Serialize;
use tracing::warn;

use crate::feed::ShapePoint;

/// How the length of a shape is measured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RouteLengthPolicy {
    /// Euclidean length in raw coordinate degrees. Not a geodesic length;
    /// it only ranks shapes of the same region against each other.
    #[default]
    ApproximateRouteLength,
}

impl RouteLengthPolicy {
    pub fn length(&self, line: &LineString<f64>) -> f64 {
        match self {
            RouteLengthPolicy::ApproximateRouteLength => line.euclidean_length(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShapeLength {
    pub shape_id: String,
    pub length: f64,
    pub points: usize,
}

/// Groups shape points by shape id, each as an ordered line of `[lon, lat]`
/// coordinates.
///
/// A shape is sorted by `shape_pt_sequence` when every one of its points
/// carries one; otherwise its points stay in source order. Points without
/// usable coordinates are left out, and a shape left with no points is
/// dropped.
pub fn ordered_shapes(points: &[ShapePoint]) -> BTreeMap<String, LineString<f64>> {
    let mut grouped: BTreeMap<&str, Vec<&ShapePoint>> = BTreeMap::new();
    for p in points {
        grouped.entry(p.shape_id.as_str()).or_default().push(p);
    }

    let mut dropped = 0usize;
    let shapes = grouped
        .into_iter()
        .filter_map(|(shape_id, mut pts)| {
            if pts.iter().all(|p| p.shape_pt_sequence.is_some()) {
                pts.sort_by_key(|p| p.shape_pt_sequence);
            }
            let coords: Vec<_> = pts.iter().filter_map(|p| p.coord()).collect();
            dropped += pts.len() - coords.len();
            if coords.is_empty() {
                return None;
            }
            Some((shape_id.to_string(), LineString::new(coords)))
        })
        .collect();

    if dropped > 0 {
        warn!(dropped, "Shape points without usable coordinates left out");
    }
    shapes
}

/// Ranks shapes by descending total length, ties by ascending shape id.
pub fn route_lengths(points: &[ShapePoint], policy: RouteLengthPolicy) -> Vec<ShapeLength> {
    let mut lengths: Vec<ShapeLength> = ordered_shapes(points)
        .into_iter()
        .map(|(shape_id, line)| ShapeLength {
            length: policy.length(&line),
            points: line.0.len(),
            shape_id,
        })
        .collect();

    lengths.sort_by(|a, b| match b.length.total_cmp(&a.length) {
        Ordering::Equal => a.shape_id.cmp(&b.shape_id),
        other => other,
    });
    lengths
}
