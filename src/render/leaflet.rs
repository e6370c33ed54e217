//! Leaflet HTML maps with the data embedded as GeoJSON.

use anyhow::{Context, Result};
use geojson::{Feature, FeatureCollection, GeoJson, Geometry, Value};
use std::path::Path;
use tracing::debug;

use super::{MapRenderer, MapView, Marker, Polyline, escape};
use crate::output::write_file;

const LEAFLET_CSS: &str = "https://unpkg.com/leaflet@1.9.4/dist/leaflet.css";
const LEAFLET_JS: &str = "https://unpkg.com/leaflet@1.9.4/dist/leaflet.js";
const LEAFLET_HEAT_JS: &str = "https://unpkg.com/leaflet.heat@0.2.0/dist/leaflet-heat.js";

const MARKER_LAYER: &str = r#"L.geoJSON(data, {
  pointToLayer: (f, latlng) => L.circleMarker(latlng, {radius: 5, color: "red", fill: true, fillOpacity: 0.6}),
  onEachFeature: (f, layer) => layer.bindPopup(f.properties.popup)
}).addTo(map);"#;

const DENSITY_LAYER: &str = r#"L.heatLayer(data.features.map(f => [f.geometry.coordinates[1], f.geometry.coordinates[0]])).addTo(map);"#;

const POLYLINE_LAYER: &str = r#"L.geoJSON(data, {
  style: f => ({color: f.properties.color, weight: 2.5, opacity: 0.7})
}).addTo(map);"#;

/// Writes interactive maps as single HTML files. Leaflet is loaded from a
/// CDN; the data travels inline as a GeoJSON `FeatureCollection`.
pub struct LeafletMapRenderer {
    pub write_retries: u32,
}

impl LeafletMapRenderer {
    pub fn new(write_retries: u32) -> Self {
        Self { write_retries }
    }

    fn write_page(
        &self,
        path: &Path,
        view: &MapView,
        data: FeatureCollection,
        layer: &str,
        heat: bool,
    ) -> Result<()> {
        let feature_count = data.features.len();
        let geojson = GeoJson::from(data);
        let json = serde_json::to_string(&geojson).context("Failed to serialize GeoJSON")?;

        let mut html = String::new();
        html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
        html.push_str(&format!("<link rel=\"stylesheet\" href=\"{LEAFLET_CSS}\"/>\n"));
        html.push_str(&format!("<script src=\"{LEAFLET_JS}\"></script>\n"));
        if heat {
            html.push_str(&format!("<script src=\"{LEAFLET_HEAT_JS}\"></script>\n"));
        }
        html.push_str("<style>html, body, #map { height: 100%; margin: 0; }</style>\n");
        html.push_str("</head>\n<body>\n<div id=\"map\"></div>\n<script>\n");
        html.push_str(&format!(
            "const map = L.map(\"map\").setView([{}, {}], {});\n",
            view.center[0], view.center[1], view.zoom
        ));
        html.push_str(
            "L.tileLayer(\"https://tile.openstreetmap.org/{z}/{x}/{y}.png\", \
             {attribution: \"&copy; OpenStreetMap contributors\"}).addTo(map);\n",
        );
        html.push_str("const data = ");
        html.push_str(&json.replace("</", "<\\/"));
        html.push_str(";\n");
        html.push_str(layer);
        html.push_str("\n</script>\n</body>\n</html>\n");

        write_file(path, html.as_bytes(), self.write_retries)?;
        debug!(path = %path.display(), features = feature_count, "Map written");
        Ok(())
    }
}

impl MapRenderer for LeafletMapRenderer {
    fn extension(&self) -> &'static str {
        "html"
    }

    fn markers(&self, path: &Path, view: &MapView, markers: &[Marker]) -> Result<()> {
        self.write_page(path, view, markers_collection(markers), MARKER_LAYER, false)
    }

    fn density(&self, path: &Path, view: &MapView, points: &[[f64; 2]]) -> Result<()> {
        self.write_page(path, view, points_collection(points), DENSITY_LAYER, true)
    }

    fn polylines(&self, path: &Path, view: &MapView, lines: &[Polyline]) -> Result<()> {
        self.write_page(path, view, polylines_collection(lines), POLYLINE_LAYER, false)
    }
}

fn feature(value: Value, properties: Option<serde_json::Map<String, serde_json::Value>>) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(value)),
        id: None,
        properties,
        foreign_members: None,
    }
}

fn collection(features: Vec<Feature>) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

/// GeoJSON positions are `[lon, lat]`.
fn markers_collection(markers: &[Marker]) -> FeatureCollection {
    collection(
        markers
            .iter()
            .map(|m| {
                let mut properties = serde_json::Map::new();
                properties.insert("popup".to_string(), serde_json::json!(escape(&m.popup)));
                feature(Value::Point(vec![m.lon, m.lat]), Some(properties))
            })
            .collect(),
    )
}

fn points_collection(points: &[[f64; 2]]) -> FeatureCollection {
    collection(
        points
            .iter()
            .map(|p| feature(Value::Point(vec![p[1], p[0]]), None))
            .collect(),
    )
}

fn polylines_collection(lines: &[Polyline]) -> FeatureCollection {
    collection(
        lines
            .iter()
            .map(|line| {
                let coords = line.line.0.iter().map(|c| vec![c.x, c.y]).collect();
                let mut properties = serde_json::Map::new();
                properties.insert("shape_id".to_string(), serde_json::json!(line.id));
                properties.insert("color".to_string(), serde_json::json!(line.color));
                feature(Value::LineString(coords), Some(properties))
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::LineString;
    use std::fs;

    fn view() -> MapView {
        MapView {
            center: [40.7128, -74.0060],
            zoom: 12,
        }
    }

    #[test]
    fn test_markers_collection_swaps_to_lon_lat() {
        let fc = markers_collection(&[Marker {
            lat: 40.0,
            lon: -73.0,
            popup: "Station: A & B".into(),
        }]);

        assert_eq!(fc.features.len(), 1);
        match &fc.features[0].geometry.as_ref().unwrap().value {
            Value::Point(p) => assert_eq!(p, &vec![-73.0, 40.0]),
            _ => panic!("Expected Point value"),
        }
        let popup = &fc.features[0].properties.as_ref().unwrap()["popup"];
        assert_eq!(popup, "Station: A &amp; B");
    }

    #[test]
    fn test_polylines_collection() {
        let fc = polylines_collection(&[Polyline {
            id: "SH1".into(),
            line: LineString::from(vec![(2.0, 1.0), (4.0, 3.0)]),
            color: "#FF6347".into(),
        }]);

        match &fc.features[0].geometry.as_ref().unwrap().value {
            Value::LineString(coords) => {
                assert_eq!(coords, &vec![vec![2.0, 1.0], vec![4.0, 3.0]]);
            }
            _ => panic!("Expected LineString value"),
        }
    }

    #[test]
    fn test_density_page_loads_heat_plugin() {
        let path = std::env::temp_dir().join("gtfs_region_report_test_density.html");
        LeafletMapRenderer::new(0)
            .density(&path, &view(), &[[40.7, -74.0], [40.8, -73.9]])
            .unwrap();

        let html = fs::read_to_string(&path).unwrap();
        assert!(html.contains(LEAFLET_HEAT_JS));
        assert!(html.contains("L.heatLayer"));
        assert!(html.contains("setView([40.7128, -74.006], 12)"));
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_script_close_tag_is_escaped() {
        let path = std::env::temp_dir().join("gtfs_region_report_test_markers.html");
        LeafletMapRenderer::new(0)
            .markers(
                &path,
                &view(),
                &[Marker {
                    lat: 0.0,
                    lon: 0.0,
                    popup: "</script>".into(),
                }],
            )
            .unwrap();

        let html = fs::read_to_string(&path).unwrap();
        assert_eq!(html.matches("</script>").count(), 2);
        fs::remove_file(&path).unwrap();
    }
}
