//! Chart and map rendering.
//!
//! The pipeline only talks to [`ChartRenderer`] and [`MapRenderer`].
//! [`SvgChartRenderer`] writes standalone SVG images and
//! [`LeafletMapRenderer`] writes self-contained HTML maps with the data
//! embedded as GeoJSON.

mod leaflet;
mod svg;

pub use leaflet::LeafletMapRenderer;
pub use svg::SvgChartRenderer;

use anyhow::Result;
use geo::LineString;
use std::path::Path;

/// Labelled bars, drawn in the given order.
#[derive(Debug, Clone, Default)]
pub struct BarChart {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub bars: Vec<(String, f64)>,
    /// Cycled over the bars; empty means the renderer's default.
    pub colors: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct LineSeries {
    pub name: String,
    pub values: Vec<f64>,
}

/// Several series over a shared set of x ticks.
#[derive(Debug, Clone, Default)]
pub struct LineChart {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub x_ticks: Vec<String>,
    pub series: Vec<LineSeries>,
}

/// Annotated grid; `cells[row][col]`.
#[derive(Debug, Clone, Default)]
pub struct Heatmap {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub x_ticks: Vec<String>,
    pub y_ticks: Vec<String>,
    pub cells: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, Copy)]
pub struct MapView {
    /// `[lat, lon]`
    pub center: [f64; 2],
    pub zoom: u8,
}

#[derive(Debug, Clone)]
pub struct Marker {
    pub lat: f64,
    pub lon: f64,
    pub popup: String,
}

#[derive(Debug, Clone)]
pub struct Polyline {
    pub id: String,
    /// `[lon, lat]` coordinates in drawing order.
    pub line: LineString<f64>,
    pub color: String,
}

pub trait ChartRenderer: Send + Sync {
    /// File extension of the images this renderer writes.
    fn extension(&self) -> &'static str;
    fn bar_chart(&self, path: &Path, chart: &BarChart) -> Result<()>;
    fn line_chart(&self, path: &Path, chart: &LineChart) -> Result<()>;
    fn heatmap(&self, path: &Path, chart: &Heatmap) -> Result<()>;
}

pub trait MapRenderer: Send + Sync {
    /// File extension of the maps this renderer writes.
    fn extension(&self) -> &'static str;
    fn markers(&self, path: &Path, view: &MapView, markers: &[Marker]) -> Result<()>;
    /// Density heatmap over `[lat, lon]` points.
    fn density(&self, path: &Path, view: &MapView, points: &[[f64; 2]]) -> Result<()>;
    fn polylines(&self, path: &Path, view: &MapView, lines: &[Polyline]) -> Result<()>;
}

/// Palette the route polylines cycle through.
pub const ROUTE_COLORS: [&str; 10] = [
    "#FF6347", "#4682B4", "#32CD32", "#FFD700", "#8A2BE2", "#FF4500", "#2E8B57", "#D2691E",
    "#00008B", "#B8860B",
];

/// Escapes text for inclusion in SVG or HTML.
pub(crate) fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape() {
        assert_eq!(escape("A & B <\"x\">"), "A &amp; B &lt;&quot;x&quot;&gt;");
    }
}
